// Handler for a single calculator run
use serde_json::Value;
use shared::models::Report;

use super::helpers::error_report;
use crate::calculators::CalculatorRegistry;
use crate::config::settings::Defaults;
use crate::error::{CalcError, CalcResult};

pub fn handle_run(
    registry: &CalculatorRegistry,
    defaults: &Defaults,
    name: &str,
    params: &Value,
) -> CalcResult<Report> {
    let calculator = match registry.get(name) {
        Some(c) => c,
        None => {
            tracing::warn!(calculator = %name, "Unknown calculator requested");
            return Err(CalcError::UnknownCalculator(name.to_string()));
        }
    };

    match calculator.run(params, defaults) {
        Ok(report) => {
            tracing::debug!(
                calculator = calculator.name(),
                sections = report.sections.len(),
                "Calculation completed"
            );
            Ok(report)
        }
        Err(e) if e.is_user_facing() => {
            tracing::warn!(calculator = calculator.name(), error = %e, "Calculation rejected input");
            Ok(error_report(calculator.name(), &e))
        }
        Err(e) => {
            tracing::error!(calculator = calculator.name(), error_detail = ?e, "Calculation failed");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalized_name_reports_canonical_name() {
        let registry = CalculatorRegistry::with_builtin();
        let report = handle_run(
            &registry,
            &Defaults::default(),
            "Decimal_To_Fraction",
            &json!({"decimal": "0.375"}),
        )
        .unwrap();
        assert!(report.is_success());
        assert_eq!(report.calculator, "decimal-to-fraction");
    }

    #[test]
    fn test_null_params_are_an_empty_form() {
        let registry = CalculatorRegistry::with_builtin();
        let report = handle_run(&registry, &Defaults::default(), "present-value", &Value::Null).unwrap();
        assert!(!report.is_success());
        assert_eq!(report.title, "Present Value");
    }
}
