// Engine library root
// Calculators, the report renderers and the service that ties them together.

pub mod calculators;
pub mod config;
pub mod data;
pub mod error;
pub mod render;
pub mod services;

pub use error::{CalcError, CalcResult};
