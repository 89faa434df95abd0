// Form-value decoding for calculator parameters
pub mod form;
