// Calculators module
pub mod amortization;
pub mod arm;
pub mod debt_payoff;
pub mod deadline;
pub mod essentials;
pub mod floor_joist;
pub mod fraction;
pub mod gpa;
pub mod investment;
pub mod payment_trap;
pub mod rent_vs_buy;
pub mod resistor;

use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::models::Report;

use crate::config::settings::Defaults;
use crate::error::{CalcError, CalcResult};

// Common trait for all calculators. `run` decodes the raw parameters, computes,
// and builds a report; the typed `calculate` functions in each module stay pure.
pub trait Calculator: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn run(&self, params: &Value, defaults: &Defaults) -> CalcResult<Report>;
}

pub(crate) fn decode<T: DeserializeOwned>(params: &Value) -> CalcResult<T> {
    // An absent parameter object behaves like an empty form
    let params = if params.is_null() { Value::Object(Default::default()) } else { params.clone() };
    Ok(serde_json::from_value(params)?)
}

pub(crate) fn require_positive(value: Option<f64>, label: &str) -> CalcResult<f64> {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => Ok(v),
        _ => Err(CalcError::invalid(format!("Enter a valid {} greater than 0.", label))),
    }
}

pub(crate) fn require_non_negative(value: Option<f64>, label: &str) -> CalcResult<f64> {
    match value {
        Some(v) if v.is_finite() && v >= 0.0 => Ok(v),
        _ => Err(CalcError::invalid(format!("Enter a valid {} (0 or higher).", label))),
    }
}

/// Blank means `fallback`; anything provided must still be a valid non-negative number.
pub(crate) fn optional_non_negative(value: Option<f64>, label: &str, fallback: f64) -> CalcResult<f64> {
    match value {
        None => Ok(fallback),
        some => require_non_negative(some, label),
    }
}

pub(crate) fn require_percent(value: Option<f64>, label: &str) -> CalcResult<f64> {
    match value {
        Some(v) if v.is_finite() && (0.0..=100.0).contains(&v) => Ok(v),
        _ => Err(CalcError::invalid(format!("Enter a valid {} between 0 and 100.", label))),
    }
}

pub struct CalculatorRegistry {
    calculators: Vec<Box<dyn Calculator>>,
}

impl CalculatorRegistry {
    pub fn empty() -> Self {
        Self { calculators: Vec::new() }
    }

    /// Registry holding every calculator shipped with the engine.
    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(amortization::AmortizationScheduleCalculator));
        registry.register(Box::new(amortization::MortgageRepaymentCalculator));
        registry.register(Box::new(arm::ArmCalculator));
        registry.register(Box::new(rent_vs_buy::RentVsBuyCalculator));
        registry.register(Box::new(debt_payoff::DebtPayoffCalculator));
        registry.register(Box::new(payment_trap::PaymentTrapCalculator));
        registry.register(Box::new(investment::InvestmentGrowthCalculator));
        registry.register(Box::new(investment::PresentValueCalculator));
        registry.register(Box::new(essentials::EssentialsCalculator));
        registry.register(Box::new(floor_joist::FloorJoistCalculator));
        registry.register(Box::new(gpa::GpaCalculator));
        registry.register(Box::new(fraction::DecimalToFractionCalculator));
        registry.register(Box::new(fraction::FractionToDecimalCalculator));
        registry.register(Box::new(deadline::DeadlineCalculator));
        registry.register(Box::new(deadline::BusinessDaysCalculator));
        registry.register(Box::new(resistor::ResistorCalculator));
        registry
    }

    /// Later registrations replace earlier ones with the same name.
    pub fn register(&mut self, calculator: Box<dyn Calculator>) {
        self.calculators.retain(|c| c.name() != calculator.name());
        self.calculators.push(calculator);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Calculator> {
        let wanted = name.trim().to_lowercase().replace('_', "-");
        self.calculators
            .iter()
            .find(|c| c.name() == wanted)
            .map(|c| c.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Calculator> {
        self.calculators.iter().map(|c| c.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.calculators.iter().map(|c| c.name()).collect()
    }
}

impl Default for CalculatorRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_names_are_unique_and_kebab_case() {
        let registry = CalculatorRegistry::with_builtin();
        let names = registry.names();
        let mut sorted = names.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), names.len());
        for name in names {
            assert!(name.chars().all(|c| c.is_ascii_lowercase() || c == '-'), "bad name {}", name);
        }
    }

    #[test]
    fn test_lookup_normalizes_name() {
        let registry = CalculatorRegistry::with_builtin();
        assert!(registry.get("floor-joist-spacing").is_some());
        assert!(registry.get(" Floor_Joist_Spacing ").is_some());
        assert!(registry.get("stock-picker").is_none());
    }

    #[test]
    fn test_validation_messages() {
        assert_eq!(
            require_positive(Some(0.0), "loan amount").unwrap_err().to_string(),
            "Enter a valid loan amount greater than 0."
        );
        assert_eq!(
            require_non_negative(Some(f64::NAN), "extra monthly payment").unwrap_err().to_string(),
            "Enter a valid extra monthly payment (0 or higher)."
        );
        assert_eq!(optional_non_negative(None, "extra", 0.0).unwrap(), 0.0);
        assert!(optional_non_negative(Some(-1.0), "extra", 0.0).is_err());
        assert!(require_percent(Some(101.0), "down payment").is_err());
        assert_eq!(require_percent(Some(20.0), "down payment").unwrap(), 20.0);
    }
}
