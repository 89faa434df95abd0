// Engine settings, loaded from an optional JSON file.
// Every calculator fallback lives here as a named default so a settings file can
// override it, e.g. {"defaults": {"floor_joist": {"deflection_ratio": 480}}}.
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::calculators::amortization::ScheduleDefaults;
use crate::calculators::arm::ArmDefaults;
use crate::calculators::deadline::DeadlineDefaults;
use crate::calculators::debt_payoff::DebtDefaults;
use crate::calculators::essentials::EssentialsDefaults;
use crate::calculators::floor_joist::JoistDefaults;
use crate::calculators::fraction::FractionDefaults;
use crate::calculators::gpa::GpaDefaults;
use crate::calculators::investment::InvestmentDefaults;
use crate::calculators::payment_trap::TrapDefaults;
use crate::error::{CalcError, CalcResult};
use crate::render::OutputFormat;

#[derive(Debug, Deserialize, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSettings {
    pub output_format: OutputFormat,
    pub log_level: String,
    pub defaults: Defaults,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default)]
pub struct Defaults {
    pub schedule: ScheduleDefaults,
    pub arm: ArmDefaults,
    pub debt: DebtDefaults,
    pub payment_trap: TrapDefaults,
    pub investment: InvestmentDefaults,
    pub essentials: EssentialsDefaults,
    pub floor_joist: JoistDefaults,
    pub gpa: GpaDefaults,
    pub fraction: FractionDefaults,
    pub deadline: DeadlineDefaults,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            output_format: OutputFormat::Text,
            log_level: "warn".to_string(),
            defaults: Defaults::default(),
        }
    }
}

impl EngineSettings {
    pub fn from_json_str(raw: &str) -> CalcResult<Self> {
        serde_json::from_str(raw).map_err(|e| CalcError::Config(format!("Invalid settings: {}", e)))
    }

    pub fn load(path: &Path) -> CalcResult<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| CalcError::Config(format!("Cannot read settings file '{}': {}", path.display(), e)))?;
        let settings = Self::from_json_str(&raw)?;
        tracing::debug!(path = %path.display(), "Loaded engine settings");
        Ok(settings)
    }

    pub fn load_or_default(path: Option<&Path>) -> CalcResult<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_match_documented_values() {
        let settings = EngineSettings::default();
        assert_eq!(settings.output_format, OutputFormat::Text);
        assert_eq!(settings.defaults.floor_joist.deflection_ratio, 360.0);
        assert_eq!(settings.defaults.gpa.rounding_digits, 2);
        assert_eq!(settings.defaults.fraction.max_denominator, 10_000);
        assert_eq!(settings.defaults.payment_trap.min_rate_percent, 2.0);
        assert_eq!(settings.defaults.payment_trap.min_floor, 25.0);
        assert_eq!(settings.defaults.schedule.rows_to_show, 24);
        assert_eq!(settings.defaults.deadline.workday_start, "09:00");
    }

    #[test]
    fn test_partial_file_overrides_only_given_keys() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"output_format": "json", "defaults": {{"floor_joist": {{"deflection_ratio": 480}}, "gpa": {{"rounding_digits": 3}}}}}}"#
        )
        .unwrap();

        let settings = EngineSettings::load(file.path()).unwrap();
        assert_eq!(settings.output_format, OutputFormat::Json);
        assert_eq!(settings.log_level, "warn");
        assert_eq!(settings.defaults.floor_joist.deflection_ratio, 480.0);
        assert_eq!(settings.defaults.floor_joist.joist_size, "2x8");
        assert_eq!(settings.defaults.gpa.rounding_digits, 3);
        assert_eq!(settings.defaults.arm.margin, 2.25);
    }

    #[test]
    fn test_bad_settings_are_config_errors() {
        assert!(matches!(EngineSettings::from_json_str("{not json"), Err(CalcError::Config(_))));
        assert!(matches!(EngineSettings::from_json_str(r#"{"port": 50051}"#), Err(CalcError::Config(_))));
        let missing = EngineSettings::load(Path::new("/definitely/not/here.json"));
        assert!(matches!(missing, Err(CalcError::Config(_))));
        assert!(EngineSettings::load_or_default(None).is_ok());
    }
}
