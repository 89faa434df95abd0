// engine/src/services/calculator_service/mod.rs
// Hub for the calculator service: the CalculatorService struct plus one
// handler module per operation.
use serde_json::Value;
use shared::models::Report;

use crate::calculators::CalculatorRegistry;
use crate::config::settings::EngineSettings;
use crate::error::CalcResult;

pub mod helpers;
pub mod list_calculators;
pub mod run_calculator;

pub use list_calculators::CalculatorInfo;

pub struct CalculatorService {
    registry: CalculatorRegistry,
    settings: EngineSettings,
}

impl CalculatorService {
    pub fn new(settings: EngineSettings) -> Self {
        Self::with_registry(CalculatorRegistry::with_builtin(), settings)
    }

    pub fn with_registry(registry: CalculatorRegistry, settings: EngineSettings) -> Self {
        CalculatorService { registry, settings }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Runs one calculator. Input problems come back as an error report;
    /// only an unknown name or an engine failure is an `Err`.
    pub fn run(&self, name: &str, params: &Value) -> CalcResult<Report> {
        tracing::debug!(calculator = %name, "Received run request, dispatching to handler.");
        run_calculator::handle_run(&self.registry, &self.settings.defaults, name, params)
    }

    pub fn list(&self) -> Vec<CalculatorInfo> {
        list_calculators::handle_list(&self.registry)
    }
}

impl Default for CalculatorService {
    fn default() -> Self {
        Self::new(EngineSettings::default())
    }
}

/// One-shot run with built-in calculators and default settings.
pub fn run(name: &str, params: &Value) -> CalcResult<Report> {
    CalculatorService::default().run(name, params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculators::Calculator;
    use crate::config::settings::Defaults;
    use crate::error::CalcError;
    use serde_json::json;

    struct Failing;

    impl Calculator for Failing {
        fn name(&self) -> &str {
            "always-fails"
        }

        fn description(&self) -> &str {
            "Fails with a render error"
        }

        fn run(&self, _params: &Value, _defaults: &Defaults) -> CalcResult<Report> {
            Err(CalcError::Render("boom".to_string()))
        }
    }

    #[test]
    fn test_run_success() {
        let service = CalculatorService::default();
        let report = service
            .run(
                "mortgage-repayment",
                &json!({"loan_amount": "200,000", "annual_rate": 6, "term_years": 30}),
            )
            .unwrap();
        assert!(report.is_success());
        assert_eq!(report.calculator, "mortgage-repayment");
    }

    #[test]
    fn test_input_error_becomes_error_report() {
        let report = run("floor-joist-spacing", &json!({"span": ""})).unwrap();
        assert!(!report.is_success());
        assert_eq!(report.calculator, "floor-joist-spacing");
        assert!(report.message.is_some());
    }

    #[test]
    fn test_bad_parameter_shape_becomes_error_report() {
        let report = run("cumulative-gpa", &json!({"courses": "not a list"})).unwrap();
        assert!(!report.is_success());
        assert!(report.message.unwrap_or_default().starts_with("Invalid parameters"));
    }

    #[test]
    fn test_unknown_calculator_is_err() {
        let err = run("stock-picker", &json!({})).unwrap_err();
        assert!(matches!(err, CalcError::UnknownCalculator(ref n) if n == "stock-picker"));
    }

    #[test]
    fn test_engine_failure_propagates() {
        let mut registry = CalculatorRegistry::empty();
        registry.register(Box::new(Failing));
        let service = CalculatorService::with_registry(registry, EngineSettings::default());
        assert!(matches!(service.run("always-fails", &Value::Null), Err(CalcError::Render(_))));
    }

    #[test]
    fn test_settings_defaults_reach_calculators() {
        let settings = EngineSettings::from_json_str(r#"{"defaults": {"essentials": {"policy": "coverage"}}}"#).unwrap();
        let service = CalculatorService::new(settings);
        let report = service
            .run("income-vs-essentials", &json!({"income": 3000, "housing": 2450}))
            .unwrap();
        assert_eq!(report.field("Scoring policy"), Some("coverage"));
        assert_eq!(service.list().len(), 16);
    }
}
