// Decimal <-> fraction conversion.
//
// Terminating decimal strings convert exactly (scale by 10^k, reduce by gcd).
// Anything else goes through a continued-fraction approximation bounded by a
// maximum denominator. The reverse direction does exact long division and
// marks the repeating block, e.g. 1/6 -> 0.1(6).
use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::models::{Report, Section};
use shared::utils::{format_two_decimals, gcd, round_to};

use super::{decode, Calculator};
use crate::config::settings::Defaults;
use crate::data::form;
use crate::error::{CalcError, CalcResult};

/// Long division stops after this many digits when no cycle has been found.
pub const MAX_EXPANSION_DIGITS: usize = 400;
pub const MAX_DENOMINATOR_LIMIT: u32 = 1_000_000;
const MAX_ROUND_DIGITS: u32 = 12;
const MAX_DECIMAL_PLACES: u32 = 18;
// Fraction parts are capped so every intermediate product fits in u128
const MAX_PART: u128 = 1_000_000_000_000_000_000;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FractionDefaults {
    pub max_denominator: u32,
    pub decimal_places: u32,
}

impl Default for FractionDefaults {
    fn default() -> Self {
        Self {
            max_denominator: 10_000,
            decimal_places: 6,
        }
    }
}

/// Signed fraction in lowest terms with a positive denominator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Fraction {
    pub negative: bool,
    pub numerator: u128,
    pub denominator: u128,
}

impl Fraction {
    /// Reduces `numerator/denominator`; `None` when the denominator is zero.
    pub fn new(negative: bool, numerator: u128, denominator: u128) -> Option<Self> {
        if denominator == 0 {
            return None;
        }
        let g = gcd(numerator, denominator).max(1);
        Some(Self {
            // There is no negative zero
            negative: negative && numerator != 0,
            numerator: numerator / g,
            denominator: denominator / g,
        })
    }

    pub fn value(&self) -> f64 {
        let v = self.numerator as f64 / self.denominator as f64;
        if self.negative {
            -v
        } else {
            v
        }
    }

    pub fn mixed(&self) -> MixedNumber {
        MixedNumber {
            negative: self.negative,
            whole: self.numerator / self.denominator,
            remainder: self.numerator % self.denominator,
            denominator: self.denominator,
        }
    }

    /// "3/4", or just "3" for whole numbers.
    pub fn reduced_text(&self) -> String {
        if self.denominator == 1 {
            format!("{}{}", self.sign(), self.numerator)
        } else {
            self.to_string()
        }
    }

    fn sign(&self) -> &'static str {
        if self.negative {
            "-"
        } else {
            ""
        }
    }
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/{}", self.sign(), self.numerator, self.denominator)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MixedNumber {
    pub negative: bool,
    pub whole: u128,
    pub remainder: u128,
    pub denominator: u128,
}

impl fmt::Display for MixedNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.negative { "-" } else { "" };
        if self.remainder == 0 {
            write!(f, "{}{}", sign, self.whole)
        } else if self.whole == 0 {
            write!(f, "{}{}/{}", sign, self.remainder, self.denominator)
        } else {
            write!(f, "{}{} {}/{}", sign, self.whole, self.remainder, self.denominator)
        }
    }
}

fn strip_number_text(raw: &str) -> String {
    raw.trim().chars().filter(|c| *c != ',' && !c.is_whitespace()).collect()
}

fn split_sign(s: &str) -> (bool, &str) {
    match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    }
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Exact fraction for a terminating decimal string: optional sign, digits,
/// optional point and fraction digits, no exponent. `None` when the text has
/// another shape or its reduced denominator is above `MAX_PART`.
pub fn parse_terminating(raw: &str) -> Option<(Fraction, &'static str)> {
    let cleaned = strip_number_text(raw);
    let (negative, unsigned) = split_sign(&cleaned);
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((i, f)) => (i, f),
        None => (unsigned, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if (!int_part.is_empty() && !all_digits(int_part)) || (!frac_part.is_empty() && !all_digits(frac_part)) {
        return None;
    }

    let whole: u128 = if int_part.is_empty() { 0 } else { int_part.parse().ok()? };
    if !unsigned.contains('.') {
        return Fraction::new(negative, whole, 1).map(|f| (f, "Interpreted as a whole number."));
    }

    let trimmed = frac_part.trim_end_matches('0');
    if trimmed.is_empty() {
        return Fraction::new(negative, whole, 1)
            .map(|f| (f, "Decimal has no fractional part after trimming zeros."));
    }

    let scale = 10u128.checked_pow(trimmed.len() as u32)?;
    let digits: u128 = trimmed.parse().ok()?;
    let numerator = whole.checked_mul(scale)?.checked_add(digits)?;
    let note = if trimmed.len() != frac_part.len() {
        "Trimmed trailing zeros from the decimal for an exact fraction."
    } else {
        "Converted the terminating decimal into an exact fraction by scaling."
    };
    Fraction::new(negative, numerator, scale)
        .filter(|f| f.denominator <= MAX_PART)
        .map(|f| (f, note))
}

/// Plain decimal text whose exact fraction would be too fine to handle.
fn too_many_decimal_digits(raw: &str) -> bool {
    let cleaned = strip_number_text(raw);
    let (_, unsigned) = split_sign(&cleaned);
    match unsigned.split_once('.') {
        Some((i, f)) => (i.is_empty() || all_digits(i)) && all_digits(f) && parse_terminating(raw).is_none(),
        None => false,
    }
}

/// Best rational approximation of `x` with denominator at most `max_denominator`,
/// from the convergents of its continued fraction.
pub fn approximate(x: f64, max_denominator: u128) -> Option<Fraction> {
    if !x.is_finite() {
        return None;
    }
    let negative = x < 0.0;
    let value = x.abs();
    if value > MAX_PART as f64 {
        return None;
    }
    if (value - value.round()).abs() < 1e-15 {
        return Fraction::new(negative, value.round() as u128, 1);
    }

    let (mut h0, mut h1) = (0u128, 1u128);
    let (mut k0, mut k1) = (1u128, 0u128);
    let mut rest = value;

    for _ in 0..64 {
        let a_f = rest.floor();
        if a_f >= 1e30 {
            break;
        }
        let a = a_f as u128;
        let (Some(h2), Some(k2)) = (
            a.checked_mul(h1).and_then(|v| v.checked_add(h0)),
            a.checked_mul(k1).and_then(|v| v.checked_add(k0)),
        ) else {
            break;
        };
        if k2 > max_denominator {
            break;
        }
        h0 = h1;
        h1 = h2;
        k0 = k1;
        k1 = k2;

        let frac = rest - a_f;
        if frac < 1e-15 {
            break;
        }
        rest = 1.0 / frac;
    }

    if k1 == 0 {
        return None;
    }
    Fraction::new(negative, h1, k1)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DecimalToFractionInput {
    #[serde(default, deserialize_with = "form::optional_text")]
    pub decimal: Option<String>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub round_digits: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub max_denominator: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_flag")]
    pub show_mixed: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DecimalToFractionResult {
    pub fraction: Fraction,
    pub value: f64,
    pub approximate: bool,
    pub max_denominator: u32,
    pub round_digits: Option<u32>,
    /// Digits shown when the fraction is read back as a decimal.
    pub check_places: u32,
    pub mixed: Option<MixedNumber>,
    pub notes: Vec<String>,
}

fn whole_number_in(value: Option<f64>, label: &str, max: u32, too_big: &str) -> CalcResult<Option<u32>> {
    match value {
        None => Ok(None),
        Some(v) if v.is_finite() && v > 0.0 && v.fract() == 0.0 => {
            if v > max as f64 {
                Err(CalcError::out_of_range(too_big))
            } else {
                Ok(Some(v as u32))
            }
        }
        Some(_) => Err(CalcError::invalid(format!(
            "Enter a valid {} as a whole number greater than 0.",
            label
        ))),
    }
}

pub fn decimal_to_fraction(input: &DecimalToFractionInput, defaults: &FractionDefaults) -> CalcResult<DecimalToFractionResult> {
    let raw = input
        .decimal
        .as_deref()
        .ok_or_else(|| CalcError::invalid("Enter a decimal value to convert."))?;
    let cleaned = strip_number_text(raw);

    let round_digits = whole_number_in(
        input.round_digits,
        "rounding digits",
        MAX_ROUND_DIGITS,
        "Rounding digits above 12 is not recommended. Use 12 or less.",
    )?;
    let max_denominator = whole_number_in(
        input.max_denominator,
        "maximum denominator",
        MAX_DENOMINATOR_LIMIT,
        "Maximum denominator above 1,000,000 is usually not practical. Use 1,000,000 or less.",
    )?
    .unwrap_or_else(|| defaults.max_denominator.clamp(1, MAX_DENOMINATOR_LIMIT));

    let numeric = cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| CalcError::invalid("Enter a valid decimal value."))?;

    let mut notes = Vec::new();
    let has_exponent = cleaned.contains(&['e', 'E'][..]);

    // Rounding re-renders the value as a terminating decimal so the exact path still applies
    let (text, value) = match round_digits {
        Some(rd) => {
            let rounded = round_to(numeric, rd);
            notes.push(format!("Rounded input to {} decimal places before converting.", rd));
            (format!("{:.*}", rd as usize, rounded), rounded)
        }
        None => (cleaned.clone(), numeric),
    };

    let exact = if has_exponent && round_digits.is_none() {
        None
    } else {
        parse_terminating(&text)
    };

    let (fraction, used_approximation) = match exact {
        Some((fraction, note)) => {
            notes.push(note.to_string());
            (fraction, false)
        }
        None if value.abs() > MAX_PART as f64 => {
            return Err(CalcError::out_of_range(
                "Value is too large to convert. Use a number no bigger than 1,000,000,000,000,000,000.",
            ))
        }
        None => {
            let fraction = approximate(value, max_denominator as u128)
                .ok_or_else(|| CalcError::out_of_range("Could not convert this value. Please check the input format."))?;
            notes.push(format!(
                "Used a closest-fraction approximation with a maximum denominator of {}.",
                max_denominator
            ));
            (fraction, true)
        }
    };

    let mixed = (input.show_mixed.unwrap_or(true) && fraction.numerator >= fraction.denominator)
        .then(|| fraction.mixed());

    Ok(DecimalToFractionResult {
        fraction,
        value,
        approximate: used_approximation,
        max_denominator,
        round_digits,
        check_places: round_digits.unwrap_or_else(|| defaults.decimal_places.min(MAX_DECIMAL_PLACES)),
        mixed,
        notes,
    })
}

impl DecimalToFractionResult {
    pub fn to_report(&self, calculator: &str) -> Report {
        let mut section = Section::titled("Result")
            .field("Simplified fraction", self.fraction.to_string())
            .field(
                "Decimal check",
                format!("{:.*}", self.check_places as usize, self.fraction.value()),
            );
        if let Some(mixed) = &self.mixed {
            section = section.field("Mixed number", mixed.to_string());
        }
        if self.value.abs() <= 1e9 {
            section = section.field("As a percentage", format!("{}%", format_two_decimals(self.value * 100.0)));
        }
        section = section
            .field("Approximation used", if self.approximate { "Yes" } else { "No" })
            .field("Maximum denominator", self.max_denominator.to_string())
            .field(
                "Rounding applied",
                match self.round_digits {
                    Some(d) => format!("{} decimal places", d),
                    None => "None".to_string(),
                },
            );
        for note in &self.notes {
            section = section.note(note.clone());
        }
        Report::success(calculator, "Decimal to Fraction").with_section(section)
    }
}

/// Exact decimal expansion of a fraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Expansion {
    /// "0.125", "0.1(6)", or a preview ending in "…" when truncated.
    pub text: String,
    pub terminates: bool,
    pub repeating: Option<String>,
    pub truncated: bool,
}

/// Long division of `fraction`, marking the repeating block in parentheses.
pub fn expand(fraction: &Fraction, max_digits: usize) -> Expansion {
    let d = fraction.denominator;
    let sign = fraction.sign();
    let int_part = fraction.numerator / d;
    let mut remainder = fraction.numerator % d;

    if remainder == 0 {
        return Expansion {
            text: format!("{}{}", sign, int_part),
            terminates: true,
            repeating: None,
            truncated: false,
        };
    }

    let mut seen: HashMap<u128, usize> = HashMap::new();
    let mut digits = String::new();
    while remainder != 0 && digits.len() < max_digits {
        if let Some(&start) = seen.get(&remainder) {
            let (fixed, cycle) = digits.split_at(start);
            return Expansion {
                text: format!("{}{}.{}({})", sign, int_part, fixed, cycle),
                terminates: false,
                repeating: Some(cycle.to_string()),
                truncated: false,
            };
        }
        seen.insert(remainder, digits.len());
        // remainder < d <= MAX_PART, so this stays far inside u128
        remainder *= 10;
        digits.push(char::from(b'0' + (remainder / d) as u8));
        remainder %= d;
    }

    if remainder == 0 {
        return Expansion {
            text: format!("{}{}.{}", sign, int_part, digits),
            terminates: true,
            repeating: None,
            truncated: false,
        };
    }
    // A cycle may close exactly at the cap
    if let Some(&start) = seen.get(&remainder) {
        let (fixed, cycle) = digits.split_at(start);
        return Expansion {
            text: format!("{}{}.{}({})", sign, int_part, fixed, cycle),
            terminates: false,
            repeating: Some(cycle.to_string()),
            truncated: false,
        };
    }
    Expansion {
        text: format!("{}{}.{}…", sign, int_part, digits),
        terminates: false,
        repeating: None,
        truncated: true,
    }
}

/// `numerator/denominator * scale` rounded half-up to `places`, computed in integers
/// when it fits and in floating point otherwise.
fn rounded_decimal(fraction: &Fraction, scale: u128, places: u32) -> String {
    let exact = 10u128
        .checked_pow(places)
        .and_then(|p| fraction.numerator.checked_mul(scale)?.checked_mul(p))
        .map(|scaled| {
            let d = fraction.denominator;
            let mut q = scaled / d;
            if (scaled % d) * 2 >= d {
                q += 1;
            }
            q
        });

    let Some(q) = exact else {
        return format!("{:.*}", places as usize, fraction.value() * scale as f64);
    };
    let digits = q.to_string();
    let places = places as usize;
    let body = if places == 0 {
        digits
    } else if digits.len() > places {
        format!("{}.{}", &digits[..digits.len() - places], &digits[digits.len() - places..])
    } else {
        format!("0.{}{}", "0".repeat(places - digits.len()), digits)
    };
    let sign = if fraction.negative && q != 0 { "-" } else { "" };
    format!("{}{}", sign, body)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FractionToDecimalInput {
    #[serde(default, deserialize_with = "form::optional_text")]
    pub fraction: Option<String>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub whole: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub numerator: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub denominator: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub decimal_places: Option<f64>,
}

/// What the user typed, after parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedFraction {
    pub negative: bool,
    pub whole: u128,
    pub numerator: u128,
    pub denominator: u128,
}

impl ParsedFraction {
    pub fn to_fraction(&self) -> CalcResult<Fraction> {
        if self.denominator == 0 {
            return Err(CalcError::invalid("Denominator cannot be 0."));
        }
        let top = self.whole * self.denominator + self.numerator;
        Fraction::new(self.negative, top, self.denominator)
            .ok_or_else(|| CalcError::invalid("Denominator cannot be 0."))
    }

    fn summary(&self) -> String {
        let sign = if self.negative { "-" } else { "" };
        if self.whole > 0 {
            format!("{}{} {}/{}", sign, self.whole, self.numerator, self.denominator)
        } else {
            format!("{}{}/{}", sign, self.numerator, self.denominator)
        }
    }
}

fn small_part(raw: &str) -> Option<u128> {
    raw.parse::<u128>().ok().filter(|v| *v <= MAX_PART)
}

/// Accepts "3/8", "1 3/4", "-1 3/4" and "-3/8". Commas are read as spaces.
pub fn parse_fraction_text(raw: &str) -> Option<ParsedFraction> {
    let cleaned = raw.replace(',', " ");
    let cleaned = cleaned.trim();
    let (negative, rest) = split_sign(cleaned);
    let (left, right) = rest.split_once('/')?;
    let denominator = small_part(right.trim())?;

    let tokens: Vec<&str> = left.split_whitespace().collect();
    let (whole, numerator) = match tokens.as_slice() {
        [n] => (0, small_part(n)?),
        [w, n] => (small_part(w)?, small_part(n)?),
        _ => return None,
    };
    Some(ParsedFraction {
        negative,
        whole,
        numerator,
        denominator,
    })
}

fn integral_part(value: f64, message: &str) -> CalcResult<u128> {
    if value.is_finite() && value.fract() == 0.0 && value.abs() <= MAX_PART as f64 {
        Ok(value.abs() as u128)
    } else {
        Err(CalcError::invalid(message))
    }
}

fn parts_input(input: &FractionToDecimalInput) -> CalcResult<ParsedFraction> {
    let (Some(n), Some(d)) = (input.numerator, input.denominator) else {
        return Err(CalcError::invalid("Enter a numerator and denominator."));
    };
    let numerator = integral_part(n, "Numerator and denominator must be whole numbers.")?;
    let denominator = integral_part(d, "Numerator and denominator must be whole numbers.")?;
    if denominator == 0 {
        return Err(CalcError::invalid("Denominator cannot be 0."));
    }
    if n < 0.0 {
        return Err(CalcError::invalid(
            "Numerator should be 0 or higher. Use the sign on the whole number if needed.",
        ));
    }
    let (negative, whole) = match input.whole {
        None => (d < 0.0, 0),
        Some(w) => (
            (w < 0.0) != (d < 0.0),
            integral_part(w, "Whole number must be a valid whole number if provided.")?,
        ),
    };
    Ok(ParsedFraction {
        negative,
        whole,
        numerator,
        denominator,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct FractionToDecimalResult {
    pub entered: String,
    pub fraction: Fraction,
    pub places: u32,
    pub rounded: String,
    pub percent: String,
    pub expansion: Expansion,
    /// Set when a plain decimal was typed instead of a fraction.
    pub decimal_entered: bool,
}

pub fn fraction_to_decimal(input: &FractionToDecimalInput, defaults: &FractionDefaults) -> CalcResult<FractionToDecimalResult> {
    let places = match input.decimal_places {
        None => defaults.decimal_places.min(MAX_DECIMAL_PLACES) as f64,
        Some(p) if !p.is_finite() => defaults.decimal_places.min(MAX_DECIMAL_PLACES) as f64,
        Some(p) => p.round(),
    };
    if places < 0.0 {
        return Err(CalcError::invalid("Decimal places must be 0 or higher."));
    }
    if places > MAX_DECIMAL_PLACES as f64 {
        return Err(CalcError::out_of_range("Decimal places is too high. Use 18 or less."));
    }
    let places = places as u32;

    let (entered, fraction, decimal_entered) = match input.fraction.as_deref() {
        Some(text) => match parse_fraction_text(text) {
            Some(parsed) => (parsed.summary(), parsed.to_fraction()?, false),
            // A plain decimal is accepted as a convenience
            None => match parse_terminating(text).filter(|_| !text.contains('/')) {
                Some((fraction, _)) => (strip_number_text(text), fraction, true),
                None if too_many_decimal_digits(text) => {
                    return Err(CalcError::out_of_range(
                        "That decimal has too many digits to convert exactly. Use 18 decimal places or fewer.",
                    ))
                }
                None => {
                    return Err(CalcError::invalid(
                        "Enter a fraction like 3/8 or a mixed number like 1 3/4.",
                    ))
                }
            },
        },
        None if input.numerator.is_some() || input.denominator.is_some() => {
            let parsed = parts_input(input)?;
            (parsed.summary(), parsed.to_fraction()?, false)
        }
        None => {
            return Err(CalcError::invalid(
                "Enter a fraction like 3/8 or a mixed number like 1 3/4.",
            ))
        }
    };

    Ok(FractionToDecimalResult {
        entered,
        rounded: rounded_decimal(&fraction, 1, places),
        percent: format!("{}%", rounded_decimal(&fraction, 100, places)),
        expansion: expand(&fraction, MAX_EXPANSION_DIGITS),
        fraction,
        places,
        decimal_entered,
    })
}

impl FractionToDecimalResult {
    pub fn to_report(&self, calculator: &str) -> Report {
        let mut section = Section::titled("Result").field("You entered", self.entered.clone());
        if !self.decimal_entered {
            section = section.field("Simplified fraction", self.fraction.reduced_text());
        }
        section = section
            .field(format!("Decimal (rounded to {} places)", self.places), self.rounded.clone())
            .field("Percent", self.percent.clone());

        if self.expansion.terminates {
            section = section
                .field("Decimal type", "Terminating decimal")
                .field("Exact decimal", self.expansion.text.clone());
        } else {
            section = section
                .field("Decimal type", "Repeating decimal")
                .field("Repeating form", self.expansion.text.clone());
            if self.expansion.truncated {
                section = section.note("The repeating pattern is long, so only a shortened decimal preview is shown.");
            }
        }
        if self.decimal_entered {
            section = section.note("You entered a decimal. This tool is primarily for fractions, but the decimal is shown for convenience.");
        }
        Report::success(calculator, "Fraction to Decimal").with_section(section)
    }
}

pub struct DecimalToFractionCalculator;

impl Calculator for DecimalToFractionCalculator {
    fn name(&self) -> &str {
        "decimal-to-fraction"
    }

    fn description(&self) -> &str {
        "Exact or best-approximation fraction for a decimal"
    }

    fn run(&self, params: &Value, defaults: &Defaults) -> CalcResult<Report> {
        let input: DecimalToFractionInput = decode(params)?;
        Ok(decimal_to_fraction(&input, &defaults.fraction)?.to_report(self.name()))
    }
}

pub struct FractionToDecimalCalculator;

impl Calculator for FractionToDecimalCalculator {
    fn name(&self) -> &str {
        "fraction-to-decimal"
    }

    fn description(&self) -> &str {
        "Rounded and exact decimal expansion of a fraction"
    }

    fn run(&self, params: &Value, defaults: &Defaults) -> CalcResult<Report> {
        let input: FractionToDecimalInput = decode(params)?;
        Ok(fraction_to_decimal(&input, &defaults.fraction)?.to_report(self.name()))
    }
}
