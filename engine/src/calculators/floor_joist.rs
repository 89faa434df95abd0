// Floor joist spacing screen: simply supported joist under uniform load,
// checked for bending stress and mid-span deflection.
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::models::{Report, Section};
use shared::utils::format_two_decimals;

use super::{decode, require_positive, Calculator};
use crate::config::settings::Defaults;
use crate::data::form;
use crate::error::{CalcError, CalcResult};

/// Standard on-center spacings in inches, widest first.
pub const CANDIDATE_SPACINGS: [f64; 4] = [24.0, 19.2, 16.0, 12.0];

const INCHES_PER_METER: f64 = 39.37007874;
const NOMINAL_WIDTH: f64 = 1.5;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct JoistDefaults {
    pub deflection_ratio: f64,
    pub joist_size: String,
    pub wood: String,
    pub load_preset: String,
}

impl Default for JoistDefaults {
    fn default() -> Self {
        Self {
            deflection_ratio: 360.0,
            joist_size: "2x8".to_string(),
            wood: "spf2".to_string(),
            load_preset: "res".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JoistSize {
    #[serde(rename = "2x6")]
    TwoBySix,
    #[serde(rename = "2x8")]
    TwoByEight,
    #[serde(rename = "2x10")]
    TwoByTen,
    #[serde(rename = "2x12")]
    TwoByTwelve,
}

impl JoistSize {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().replace('×', "x").as_str() {
            "2x6" => Some(JoistSize::TwoBySix),
            "2x8" => Some(JoistSize::TwoByEight),
            "2x10" => Some(JoistSize::TwoByTen),
            "2x12" => Some(JoistSize::TwoByTwelve),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            JoistSize::TwoBySix => "2x6",
            JoistSize::TwoByEight => "2x8",
            JoistSize::TwoByTen => "2x10",
            JoistSize::TwoByTwelve => "2x12",
        }
    }

    /// Actual depth in inches of dressed lumber.
    pub fn depth(&self) -> f64 {
        match self {
            JoistSize::TwoBySix => 5.5,
            JoistSize::TwoByEight => 7.25,
            JoistSize::TwoByTen => 9.25,
            JoistSize::TwoByTwelve => 11.25,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Wood {
    Spf2,
    Dfl2,
    Syp2,
}

impl Wood {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "spf2" => Some(Wood::Spf2),
            "dfl2" => Some(Wood::Dfl2),
            "syp2" => Some(Wood::Syp2),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Wood::Spf2 => "SPF No. 2",
            Wood::Dfl2 => "Douglas Fir-Larch No. 2",
            Wood::Syp2 => "Southern Yellow Pine No. 2",
        }
    }

    /// Modulus of elasticity, psi.
    pub fn modulus(&self) -> f64 {
        match self {
            Wood::Spf2 => 1_300_000.0,
            Wood::Dfl2 => 1_600_000.0,
            Wood::Syp2 => 1_800_000.0,
        }
    }

    /// Allowable bending stress, psi.
    pub fn allowable_bending(&self) -> f64 {
        match self {
            Wood::Spf2 => 875.0,
            Wood::Dfl2 => 900.0,
            Wood::Syp2 => 1100.0,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JoistInput {
    #[serde(default, deserialize_with = "form::optional_number")]
    pub span: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_text")]
    pub span_unit: Option<String>,
    #[serde(default, deserialize_with = "form::optional_text")]
    pub joist_size: Option<String>,
    #[serde(default, deserialize_with = "form::optional_text")]
    pub wood: Option<String>,
    #[serde(default, deserialize_with = "form::optional_text")]
    pub load_preset: Option<String>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub custom_load_psf: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub deflection_ratio: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpacingCheck {
    pub spacing: f64,
    /// Line load on one joist, lb/ft.
    pub line_load_plf: f64,
    pub moment: f64,
    pub bending_stress: f64,
    pub deflection: f64,
    pub bending_ok: bool,
    pub deflection_ok: bool,
}

impl SpacingCheck {
    pub fn passes(&self) -> bool {
        self.bending_ok && self.deflection_ok
    }

    pub fn failure_reason(&self) -> &'static str {
        match (self.bending_ok, self.deflection_ok) {
            (false, false) => "bending and deflection",
            (false, true) => "bending",
            (true, false) => "deflection",
            (true, true) => "neither check",
        }
    }
}

/// Geometry and material fixed for one run; evaluates any spacing.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct JoistModel {
    pub span_in: f64,
    pub size: JoistSize,
    pub wood: Wood,
    pub load_psf: f64,
    pub deflection_ratio: f64,
}

impl JoistModel {
    pub fn section_modulus(&self) -> f64 {
        NOMINAL_WIDTH * self.size.depth().powi(2) / 6.0
    }

    pub fn moment_of_inertia(&self) -> f64 {
        NOMINAL_WIDTH * self.size.depth().powi(3) / 12.0
    }

    pub fn allowable_deflection(&self) -> f64 {
        self.span_in / self.deflection_ratio
    }

    pub fn check(&self, spacing: f64) -> SpacingCheck {
        let l = self.span_in;
        let line_load_plf = self.load_psf * spacing / 12.0;
        let w = line_load_plf / 12.0;
        let moment = w * l * l / 8.0;
        let bending_stress = moment / self.section_modulus();
        let deflection = 5.0 * w * l.powi(4) / (384.0 * self.wood.modulus() * self.moment_of_inertia());
        SpacingCheck {
            spacing,
            line_load_plf,
            moment,
            bending_stress,
            deflection,
            bending_ok: bending_stress <= self.wood.allowable_bending(),
            deflection_ok: deflection <= self.allowable_deflection(),
        }
    }

    /// Widest standard spacing that passes both checks.
    pub fn recommend(&self) -> Option<SpacingCheck> {
        CANDIDATE_SPACINGS.iter().map(|&s| self.check(s)).find(|c| c.passes())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JoistResult {
    pub model: JoistModel,
    pub span_value: f64,
    pub span_unit: &'static str,
    pub recommended: Option<SpacingCheck>,
    /// The next wider standard spacing, evaluated, when one exists.
    pub next_wider: Option<SpacingCheck>,
}

fn next_wider_spacing(spacing: f64) -> Option<f64> {
    let idx = CANDIDATE_SPACINGS.iter().position(|&s| s == spacing)?;
    idx.checked_sub(1).map(|i| CANDIDATE_SPACINGS[i])
}

fn pick<T>(raw: Option<&str>, fallback: &str, parse: fn(&str) -> Option<T>, message: &str) -> CalcResult<T> {
    parse(raw.unwrap_or(fallback)).ok_or_else(|| CalcError::invalid(message))
}

pub fn calculate(input: &JoistInput, defaults: &JoistDefaults) -> CalcResult<JoistResult> {
    let span_value = require_positive(input.span, "span")?;
    let metric = match input.span_unit.as_deref().map(str::to_lowercase).as_deref() {
        None | Some("ft") | Some("feet") => false,
        Some("m") | Some("meters") | Some("metres") => true,
        Some(_) => return Err(CalcError::invalid("Select a span unit: ft or m.")),
    };
    let size = pick(input.joist_size.as_deref(), &defaults.joist_size, JoistSize::parse, "Select a valid joist size.")?;
    let wood = pick(input.wood.as_deref(), &defaults.wood, Wood::parse, "Select a valid wood species and grade.")?;

    let preset = input.load_preset.as_deref().unwrap_or(&defaults.load_preset).to_lowercase();
    let load_psf = match preset.as_str() {
        "light" => 40.0,
        "res" => 50.0,
        "heavy" => 75.0,
        "custom" => {
            let custom = require_positive(input.custom_load_psf, "custom total load (psf)")?;
            if !(10.0..=200.0).contains(&custom) {
                return Err(CalcError::out_of_range(
                    "Custom total load looks unusual. Enter a value between 10 and 200 psf.",
                ));
            }
            custom
        }
        _ => return Err(CalcError::invalid("Select a valid load preset.")),
    };

    let deflection_ratio = match input.deflection_ratio {
        Some(v) if v.is_finite() && v > 0.0 => v,
        _ => defaults.deflection_ratio,
    };
    if !(180.0..=720.0).contains(&deflection_ratio) {
        return Err(CalcError::out_of_range(
            "Deflection limit looks unusual. Use a value between L/180 and L/720.",
        ));
    }

    let span_in = if metric { span_value * INCHES_PER_METER } else { span_value * 12.0 };
    if span_in < 24.0 {
        return Err(CalcError::out_of_range(
            "Span is too small to be realistic. Enter a span of at least 2 feet (or 0.6 m).",
        ));
    }
    if span_in > 360.0 {
        return Err(CalcError::out_of_range(
            "Span is very large for typical joists. Consider beams, engineered framing, or an engineered design.",
        ));
    }

    let model = JoistModel {
        span_in,
        size,
        wood,
        load_psf,
        deflection_ratio,
    };
    let recommended = model.recommend();
    let next_wider = recommended
        .and_then(|r| next_wider_spacing(r.spacing))
        .map(|s| model.check(s));

    Ok(JoistResult {
        model,
        span_value,
        span_unit: if metric { "m" } else { "ft" },
        recommended,
        next_wider,
    })
}

fn spacing_label(spacing: f64) -> String {
    if spacing.fract() == 0.0 {
        format!("{}", spacing as u32)
    } else {
        format!("{}", spacing)
    }
}

impl JoistResult {
    pub fn to_report(&self, calculator: &str) -> Report {
        let m = &self.model;
        let report = Report::success(calculator, "Floor Joist Spacing");

        let Some(best) = &self.recommended else {
            return report.with_section(
                Section::titled("Result")
                    .field(
                        "Result",
                        "None of the standard spacings (24, 19.2, 16, 12 inches on-center) passed with the inputs provided.",
                    )
                    .field(
                        "What to do",
                        "Reduce spacing below 12 inches, choose a deeper joist (for example 2x10 or 2x12), reduce the assumed load, or confirm requirements using local code tables or an engineered design.",
                    )
                    .field(
                        "Inputs used",
                        format!(
                            "Span {} {}, Joist {}, Wood {}, Total load {} psf, Deflection limit L/{}.",
                            self.span_value,
                            self.span_unit,
                            m.size.label(),
                            m.wood.label(),
                            format_two_decimals(m.load_psf),
                            m.deflection_ratio.round()
                        ),
                    ),
            );
        };

        let spacing = spacing_label(best.spacing);
        let mut section = Section::titled("Recommendation")
            .field("Recommended spacing", format!("{} inches on-center", spacing))
            .field(
                "Estimated bending stress",
                format!(
                    "{} psi (limit {} psi)",
                    format_two_decimals(best.bending_stress),
                    format_two_decimals(m.wood.allowable_bending())
                ),
            )
            .field(
                "Estimated mid-span deflection",
                format!(
                    "{} in (limit {} in, based on L/{})",
                    format_two_decimals(best.deflection),
                    format_two_decimals(m.allowable_deflection()),
                    m.deflection_ratio.round()
                ),
            )
            .field(
                "Inputs used",
                format!(
                    "Span {} {} ({} in), Joist {} (actual {}x{} in), Wood {}, Total load {} psf.",
                    self.span_value,
                    self.span_unit,
                    m.span_in.round(),
                    m.size.label(),
                    NOMINAL_WIDTH,
                    m.size.depth(),
                    m.wood.label(),
                    format_two_decimals(m.load_psf)
                ),
            );

        if let Some(next) = &self.next_wider {
            let wider = spacing_label(next.spacing);
            section = section.field(
                format!("Why not {} in?", wider),
                format!(
                    "At {} inches on-center, the limiting issue is {}.",
                    wider,
                    next.failure_reason()
                ),
            );
        }

        report.with_section(section.note(
            "Practical note: This is a screening estimate. If your project is permitted or inspected, confirm against local span tables and code requirements.",
        ))
    }
}

pub struct FloorJoistCalculator;

impl Calculator for FloorJoistCalculator {
    fn name(&self) -> &str {
        "floor-joist-spacing"
    }

    fn description(&self) -> &str {
        "Widest standard joist spacing that passes bending and deflection checks"
    }

    fn run(&self, params: &Value, defaults: &Defaults) -> CalcResult<Report> {
        let input: JoistInput = decode(params)?;
        Ok(calculate(&input, &defaults.floor_joist)?.to_report(self.name()))
    }
}
