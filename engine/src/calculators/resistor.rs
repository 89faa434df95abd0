// Resistor colour code: decode 4/5/6 band resistors, or pick bands for a target value.
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::models::{Report, Section};

use super::{decode, require_positive, Calculator};
use crate::config::settings::Defaults;
use crate::data::form;
use crate::error::{CalcError, CalcResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Black,
    Brown,
    Red,
    Orange,
    Yellow,
    Green,
    Blue,
    Violet,
    Gray,
    White,
    Gold,
    Silver,
}

const DIGIT_COLORS: [Color; 10] = [
    Color::Black,
    Color::Brown,
    Color::Red,
    Color::Orange,
    Color::Yellow,
    Color::Green,
    Color::Blue,
    Color::Violet,
    Color::Gray,
    Color::White,
];

/// Multiplier bands, smallest factor first.
const MULTIPLIER_COLORS: [Color; 12] = [
    Color::Silver,
    Color::Gold,
    Color::Black,
    Color::Brown,
    Color::Red,
    Color::Orange,
    Color::Yellow,
    Color::Green,
    Color::Blue,
    Color::Violet,
    Color::Gray,
    Color::White,
];

impl Color {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "black" => Some(Color::Black),
            "brown" => Some(Color::Brown),
            "red" => Some(Color::Red),
            "orange" => Some(Color::Orange),
            "yellow" => Some(Color::Yellow),
            "green" => Some(Color::Green),
            "blue" => Some(Color::Blue),
            "violet" | "purple" => Some(Color::Violet),
            "gray" | "grey" => Some(Color::Gray),
            "white" => Some(Color::White),
            "gold" => Some(Color::Gold),
            "silver" => Some(Color::Silver),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Color::Black => "black",
            Color::Brown => "brown",
            Color::Red => "red",
            Color::Orange => "orange",
            Color::Yellow => "yellow",
            Color::Green => "green",
            Color::Blue => "blue",
            Color::Violet => "violet",
            Color::Gray => "gray",
            Color::White => "white",
            Color::Gold => "gold",
            Color::Silver => "silver",
        }
    }

    pub fn digit(&self) -> Option<u32> {
        DIGIT_COLORS.iter().position(|c| c == self).map(|d| d as u32)
    }

    pub fn multiplier(&self) -> f64 {
        match self {
            Color::Silver => 0.01,
            Color::Gold => 0.1,
            // Every digit colour is a power of ten
            other => 10f64.powi(other.digit().unwrap_or(0) as i32),
        }
    }

    pub fn tolerance_percent(&self) -> Option<f64> {
        match self {
            Color::Brown => Some(1.0),
            Color::Red => Some(2.0),
            Color::Green => Some(0.5),
            Color::Blue => Some(0.25),
            Color::Violet => Some(0.1),
            Color::Gray => Some(0.05),
            Color::Gold => Some(5.0),
            Color::Silver => Some(10.0),
            _ => None,
        }
    }

    pub fn tempco_ppm(&self) -> Option<f64> {
        match self {
            Color::Brown => Some(100.0),
            Color::Red => Some(50.0),
            Color::Orange => Some(15.0),
            Color::Yellow => Some(25.0),
            Color::Blue => Some(10.0),
            Color::Violet => Some(5.0),
            _ => None,
        }
    }
}

/// "4.7 kΩ": three decimals with trailing zeros trimmed.
pub fn readable_ohms(ohms: f64) -> String {
    let abs = ohms.abs();
    let (scaled, unit) = if abs >= 1e9 {
        (ohms / 1e9, "GΩ")
    } else if abs >= 1e6 {
        (ohms / 1e6, "MΩ")
    } else if abs >= 1e3 {
        (ohms / 1e3, "kΩ")
    } else {
        (ohms, "Ω")
    };
    let fixed = format!("{:.3}", scaled);
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, unit)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResistorInput {
    #[serde(default, deserialize_with = "form::optional_text")]
    pub mode: Option<String>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub bands: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_text")]
    pub band1: Option<String>,
    #[serde(default, deserialize_with = "form::optional_text")]
    pub band2: Option<String>,
    #[serde(default, deserialize_with = "form::optional_text")]
    pub band3: Option<String>,
    #[serde(default, deserialize_with = "form::optional_text")]
    pub multiplier: Option<String>,
    #[serde(default, deserialize_with = "form::optional_text")]
    pub tolerance: Option<String>,
    #[serde(default, deserialize_with = "form::optional_text")]
    pub tempco: Option<String>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub value: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_text")]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Decoded {
    pub bands: u32,
    pub significant: u32,
    pub multiplier: Color,
    pub ohms: f64,
    pub tolerance_percent: f64,
    /// ppm/°C, six-band resistors only.
    pub tempco_ppm: Option<f64>,
}

impl Decoded {
    pub fn range(&self) -> (f64, f64) {
        let t = self.tolerance_percent / 100.0;
        (self.ohms * (1.0 - t), self.ohms * (1.0 + t))
    }

    /// Percent and ohms of drift over a 10 °C change.
    pub fn drift_per_10c(&self) -> Option<(f64, f64)> {
        self.tempco_ppm.map(|ppm| {
            let percent = ppm * 10.0 / 10_000.0;
            (percent, self.ohms * percent / 100.0)
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Encoded {
    pub target_ohms: f64,
    pub digits: Vec<Color>,
    pub multiplier: Color,
    pub tolerance: Color,
    pub represented_ohms: f64,
}

impl Encoded {
    pub fn band_names(&self) -> Vec<&'static str> {
        self.digits
            .iter()
            .chain([&self.multiplier, &self.tolerance])
            .map(|c| c.name())
            .collect()
    }

    pub fn error_percent(&self) -> f64 {
        (self.represented_ohms - self.target_ohms).abs() / self.target_ohms * 100.0
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ResistorResult {
    Decode(Decoded),
    Encode(Encoded),
}

fn color_field(raw: Option<&str>, fallback: Option<Color>, message: &str) -> CalcResult<Color> {
    match raw {
        Some(r) => Color::parse(r).ok_or_else(|| CalcError::invalid(message)),
        None => fallback.ok_or_else(|| CalcError::invalid(message)),
    }
}

fn band_count(raw: Option<f64>, allowed: &[u32]) -> CalcResult<u32> {
    let n = raw.unwrap_or(allowed[0] as f64);
    allowed
        .iter()
        .copied()
        .find(|a| *a as f64 == n)
        .ok_or_else(|| CalcError::invalid(format!(
            "Select a band count of {}.",
            allowed.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ")
        )))
}

pub fn decode_bands(input: &ResistorInput) -> CalcResult<Decoded> {
    let bands = band_count(input.bands, &[4, 5, 6])?;
    let digit = |raw: Option<&str>| -> CalcResult<u32> {
        color_field(raw, None, "Select valid colors for all required bands.")?
            .digit()
            .ok_or_else(|| CalcError::invalid("Digit bands must be black through white."))
    };

    let d1 = digit(input.band1.as_deref())?;
    if d1 == 0 {
        return Err(CalcError::invalid("The first band cannot be black."));
    }
    let d2 = digit(input.band2.as_deref())?;
    let significant = if bands == 4 {
        d1 * 10 + d2
    } else {
        let d3 = digit(input.band3.as_deref()).map_err(|_| {
            CalcError::invalid("Select a valid third digit color for 5-band or 6-band resistors.")
        })?;
        d1 * 100 + d2 * 10 + d3
    };

    let multiplier = color_field(input.multiplier.as_deref(), None, "Select valid colors for all required bands.")?;
    let tolerance_percent = color_field(input.tolerance.as_deref(), Some(Color::Gold), "Select a valid tolerance color.")?
        .tolerance_percent()
        .ok_or_else(|| CalcError::invalid("Select a valid tolerance color."))?;
    let tempco_ppm = if bands == 6 {
        let ppm = color_field(input.tempco.as_deref(), Some(Color::Brown), "Select a valid temperature coefficient color.")?
            .tempco_ppm()
            .ok_or_else(|| CalcError::invalid("Select a valid temperature coefficient color."))?;
        Some(ppm)
    } else {
        None
    };

    Ok(Decoded {
        bands,
        significant,
        multiplier,
        ohms: significant as f64 * multiplier.multiplier(),
        tolerance_percent,
        tempco_ppm,
    })
}

pub fn encode_value(input: &ResistorInput) -> CalcResult<Encoded> {
    let base = require_positive(input.value, "target resistance")?;
    let scale = match input.unit.as_deref().map(str::to_lowercase).as_deref() {
        None | Some("ohm") | Some("ohms") => 1.0,
        Some("kohm") | Some("k") => 1e3,
        Some("mohm") | Some("m") => 1e6,
        Some(_) => return Err(CalcError::invalid("Select a unit: ohm, kohm or mohm.")),
    };
    let ohms = base * scale;
    if !(0.01..=1e9).contains(&ohms) {
        return Err(CalcError::out_of_range(
            "Enter a target resistance between 0.01 Ω and 1 GΩ for typical resistor color coding.",
        ));
    }
    let bands = band_count(input.bands, &[4, 5])?;
    let tolerance = color_field(input.tolerance.as_deref(), Some(Color::Gold), "Select a valid tolerance color.")?;
    if tolerance.tolerance_percent().is_none() {
        return Err(CalcError::invalid("Select a valid tolerance color."));
    }

    let (low, high) = if bands == 5 { (100.0, 999.0) } else { (10.0, 99.0) };
    // Prefer multipliers that put the value inside the significant-digit range;
    // otherwise clamp and take the least-bad one.
    let candidate = |strict: bool| {
        let mut best: Option<(f64, Color, f64)> = None;
        for mult in MULTIPLIER_COLORS {
            let factor = mult.multiplier();
            let scaled = ohms / factor;
            if strict && !(low..=high).contains(&scaled) {
                continue;
            }
            let rounded = scaled.round().clamp(low, high);
            let err = (rounded * factor - ohms).abs();
            if best.map_or(true, |(_, _, e)| err < e) {
                best = Some((rounded, mult, err));
            }
        }
        best
    };
    let (rounded, multiplier, _) = candidate(true)
        .or_else(|| candidate(false))
        .ok_or_else(|| CalcError::out_of_range("No color code can represent this value."))?;

    let significant = rounded as u32;
    let digits = significant
        .to_string()
        .chars()
        .filter_map(|c| c.to_digit(10))
        .map(|d| DIGIT_COLORS[d as usize])
        .collect();

    Ok(Encoded {
        target_ohms: ohms,
        digits,
        multiplier,
        tolerance,
        represented_ohms: rounded * multiplier.multiplier(),
    })
}

pub fn calculate(input: &ResistorInput) -> CalcResult<ResistorResult> {
    match input.mode.as_deref().map(str::to_lowercase).as_deref() {
        None | Some("decode") => decode_bands(input).map(ResistorResult::Decode),
        Some("encode") => encode_value(input).map(ResistorResult::Encode),
        Some(_) => Err(CalcError::invalid("Select a mode: decode or encode.")),
    }
}

impl ResistorResult {
    pub fn to_report(&self, calculator: &str) -> Report {
        let section = match self {
            ResistorResult::Decode(d) => {
                let (min, max) = d.range();
                let mut s = Section::titled("Decoded resistor")
                    .field("Nominal resistance", readable_ohms(d.ohms))
                    .field(
                        "Digits",
                        format!("{} x {} ({})", d.significant, d.multiplier.multiplier(), d.multiplier.name()),
                    )
                    .field("Tolerance", format!("±{}%", d.tolerance_percent))
                    .field("Expected range", format!("{} to {}", readable_ohms(min), readable_ohms(max)));
                if let (Some(ppm), Some((percent, ohms))) = (d.tempco_ppm, d.drift_per_10c()) {
                    s = s.field(
                        "Tempco",
                        format!(
                            "{} ppm/°C (≈ {:.3}% per 10°C, ≈ {} per 10°C)",
                            ppm,
                            percent,
                            readable_ohms(ohms)
                        ),
                    );
                }
                s
            }
            ResistorResult::Encode(e) => {
                let tol = e.tolerance.tolerance_percent().unwrap_or(0.0);
                let min = e.represented_ohms * (1.0 - tol / 100.0);
                let max = e.represented_ohms * (1.0 + tol / 100.0);
                Section::titled("Suggested bands")
                    .field("Suggested bands", e.band_names().join(", "))
                    .field("Represents", readable_ohms(e.represented_ohms))
                    .field("Tolerance", format!("±{}% ({})", tol, e.tolerance.name()))
                    .field("Range", format!("{} to {}", readable_ohms(min), readable_ohms(max)))
                    .field(
                        "Difference vs target",
                        format!(
                            "{} ({:.2}%)",
                            readable_ohms((e.represented_ohms - e.target_ohms).abs()),
                            e.error_percent()
                        ),
                    )
            }
        };
        Report::success(calculator, "Resistor Color Code").with_section(section)
    }
}

pub struct ResistorCalculator;

impl Calculator for ResistorCalculator {
    fn name(&self) -> &str {
        "resistor-color-code"
    }

    fn description(&self) -> &str {
        "Decode resistor color bands or suggest bands for a value"
    }

    fn run(&self, params: &Value, _defaults: &Defaults) -> CalcResult<Report> {
        let input: ResistorInput = decode(params)?;
        Ok(calculate(&input)?.to_report(self.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bands(colors: &[&str]) -> ResistorInput {
        let c = |i: usize| colors.get(i).map(|s| s.to_string());
        match colors.len() {
            4 => ResistorInput {
                bands: Some(4.0),
                band1: c(0),
                band2: c(1),
                multiplier: c(2),
                tolerance: c(3),
                ..Default::default()
            },
            n => ResistorInput {
                bands: Some(n as f64),
                band1: c(0),
                band2: c(1),
                band3: c(2),
                multiplier: c(3),
                tolerance: c(4),
                tempco: c(5),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_readable_units() {
        assert_eq!(readable_ohms(4700.0), "4.7 kΩ");
        assert_eq!(readable_ohms(0.47), "0.47 Ω");
        assert_eq!(readable_ohms(100.0), "100 Ω");
        assert_eq!(readable_ohms(2_200_000.0), "2.2 MΩ");
        assert_eq!(readable_ohms(1e9), "1 GΩ");
    }

    #[test]
    fn test_decode_four_band() {
        let d = decode_bands(&bands(&["yellow", "violet", "red", "gold"])).unwrap();
        assert_eq!(d.significant, 47);
        assert!((d.ohms - 4700.0).abs() < 1e-9);
        let (min, max) = d.range();
        assert!((min - 4465.0).abs() < 1e-9);
        assert!((max - 4935.0).abs() < 1e-9);
        let report = ResistorResult::Decode(d).to_report("resistor-color-code");
        assert_eq!(report.field("Nominal resistance"), Some("4.7 kΩ"));
    }

    #[test]
    fn test_decode_five_and_six_band() {
        let d = decode_bands(&bands(&["brown", "black", "black", "brown", "brown"])).unwrap();
        assert!((d.ohms - 1000.0).abs() < 1e-9);
        assert_eq!(d.tolerance_percent, 1.0);
        assert!(d.tempco_ppm.is_none());

        let d = decode_bands(&bands(&["brown", "black", "black", "brown", "brown", "red"])).unwrap();
        let (percent, ohms) = d.drift_per_10c().unwrap();
        assert!((percent - 0.05).abs() < 1e-12);
        assert!((ohms - 0.5).abs() < 1e-9);

        let d = decode_bands(&bands(&["red", "red", "silver", "gold"])).unwrap();
        assert!((d.ohms - 0.22).abs() < 1e-12);
    }

    #[test]
    fn test_decode_rejects_bad_bands() {
        assert_eq!(
            decode_bands(&bands(&["black", "red", "red", "gold"])).unwrap_err().to_string(),
            "The first band cannot be black."
        );
        assert!(decode_bands(&bands(&["gold", "red", "red", "gold"])).is_err());
        assert!(decode_bands(&bands(&["red", "red", "red", "orange"])).is_err());
        assert!(decode_bands(&bands(&["red", "red", "red", "gold", "brown", "green"])).is_err());
        let mut seven = bands(&["red", "red", "red", "gold"]);
        seven.bands = Some(7.0);
        assert!(decode_bands(&seven).is_err());
    }

    #[test]
    fn test_encode_picks_exact_multiplier() {
        let input = ResistorInput {
            mode: Some("encode".into()),
            value: Some(4.7),
            unit: Some("kohm".into()),
            ..Default::default()
        };
        let e = encode_value(&input).unwrap();
        assert_eq!(e.band_names(), vec!["yellow", "violet", "red", "gold"]);
        assert!(e.error_percent() < 1e-9);

        let input = ResistorInput {
            bands: Some(5.0),
            tolerance: Some("brown".into()),
            ..input
        };
        let e = encode_value(&input).unwrap();
        assert_eq!(e.band_names(), vec!["yellow", "violet", "black", "brown", "brown"]);
    }

    #[test]
    fn test_encode_rounds_to_nearest_representable() {
        let input = ResistorInput {
            value: Some(1234.0),
            ..Default::default()
        };
        let e = encode_value(&input).unwrap();
        assert!((e.represented_ohms - 1200.0).abs() < 1e-9);
        assert_eq!(e.band_names(), vec!["brown", "red", "red", "gold"]);

        let input = ResistorInput {
            value: Some(2.0),
            unit: Some("mohm".into()),
            ..Default::default()
        };
        assert!(encode_value(&input).is_ok());

        let input = ResistorInput {
            value: Some(0.001),
            ..Default::default()
        };
        assert!(matches!(encode_value(&input), Err(CalcError::OutOfRange(_))));
    }
}
