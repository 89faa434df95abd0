// Report model and helpers shared by the engine, its renderers and the CLI.
pub mod models;
pub mod utils;
