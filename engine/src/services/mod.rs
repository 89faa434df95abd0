// Service layer: dispatches named calculator runs and turns input problems into error reports.
pub mod calculator_service;

pub use calculator_service::{CalculatorInfo, CalculatorService};
