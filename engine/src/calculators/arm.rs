// Adjustable-rate mortgage projection
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::models::{Report, Section, Table};
use shared::utils::{clamp, format_percent, format_two_decimals};

use super::amortization::standard_payment;
use super::{decode, require_non_negative, require_positive, Calculator};
use crate::config::settings::Defaults;
use crate::data::form;
use crate::error::{CalcError, CalcResult};

const MAX_EVENTS_SHOWN: usize = 6;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ArmDefaults {
    pub adjustment_years: f64,
    pub index_rate: f64,
    pub margin: f64,
    pub periodic_cap: f64,
    pub lifetime_cap: f64,
    pub floor_rate: f64,
}

impl Default for ArmDefaults {
    fn default() -> Self {
        Self {
            adjustment_years: 1.0,
            index_rate: 3.0,
            margin: 2.25,
            periodic_cap: 2.0,
            lifetime_cap: 5.0,
            floor_rate: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArmInput {
    #[serde(default, deserialize_with = "form::optional_number")]
    pub loan_amount: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub initial_rate: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub term_years: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub fixed_years: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub adjustment_years: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub index_rate: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub margin: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub periodic_cap: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub lifetime_cap: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub floor_rate: Option<f64>,
}

/// Rate terms after optional fields have been resolved against the defaults.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RateTerms {
    pub adjustment_years: f64,
    pub index_rate: f64,
    pub margin: f64,
    pub periodic_cap: f64,
    pub lifetime_cap: f64,
    pub floor_rate: f64,
}

impl RateTerms {
    fn resolve(input: &ArmInput, defaults: &ArmDefaults) -> Self {
        // Blank or negative optional fields use the default rather than failing
        let pick = |v: Option<f64>, fallback: f64| match v {
            Some(x) if x.is_finite() && x >= 0.0 => x,
            _ => fallback,
        };
        let adjustment_years = match input.adjustment_years {
            Some(x) if x.is_finite() && x > 0.0 => x,
            _ => defaults.adjustment_years,
        };
        Self {
            adjustment_years,
            index_rate: pick(input.index_rate, defaults.index_rate),
            margin: pick(input.margin, defaults.margin),
            periodic_cap: pick(input.periodic_cap, defaults.periodic_cap),
            lifetime_cap: pick(input.lifetime_cap, defaults.lifetime_cap),
            floor_rate: pick(input.floor_rate, defaults.floor_rate),
        }
    }

    /// Next rate from the current one: fully indexed, held within floor and lifetime
    /// ceiling, then within the periodic cap of `current`, then the hard bounds again.
    pub fn next_rate(&self, current: f64, initial: f64) -> f64 {
        let ceiling = initial + self.lifetime_cap;
        let target = clamp(self.index_rate + self.margin, self.floor_rate, ceiling);
        let stepped = clamp(target, current - self.periodic_cap, current + self.periodic_cap);
        clamp(stepped, self.floor_rate, ceiling)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AdjustmentEvent {
    pub month: u32,
    pub year: u32,
    pub rate: f64,
    pub payment: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArmResult {
    pub loan_amount: f64,
    pub initial_rate: f64,
    pub terms: RateTerms,
    pub initial_payment: f64,
    pub first_adjusted_payment: f64,
    pub first_adjusted_rate: f64,
    pub max_payment: f64,
    pub total_interest: f64,
    pub events: Vec<AdjustmentEvent>,
}

pub fn calculate(input: &ArmInput, defaults: &ArmDefaults) -> CalcResult<ArmResult> {
    let loan_amount = require_positive(input.loan_amount, "loan amount")?;
    let initial_rate = require_positive(input.initial_rate, "initial interest rate")?;
    let term_years = require_positive(input.term_years, "loan term (years)")?;
    let fixed_years = require_non_negative(input.fixed_years, "initial fixed period (years)")?;

    if term_years > 50.0 {
        return Err(CalcError::out_of_range("Enter a realistic loan term (50 years or less)."));
    }
    if initial_rate > 40.0 {
        return Err(CalcError::out_of_range("Enter a realistic initial interest rate (40% or less)."));
    }
    if fixed_years >= term_years {
        return Err(CalcError::out_of_range("The initial fixed period must be less than the full loan term."));
    }

    let terms = RateTerms::resolve(input, defaults);
    let total_months = (term_years * 12.0).round() as u32;
    let fixed_months = (fixed_years * 12.0).round() as u32;
    let adjust_every = ((terms.adjustment_years * 12.0).round() as u32).max(1);

    let mut balance = loan_amount;
    let mut rate = initial_rate;
    let mut payment = standard_payment(balance, rate / 100.0 / 12.0, total_months);
    if !payment.is_finite() || payment <= 0.0 {
        return Err(CalcError::invalid("Unable to calculate a payment with these inputs. Check your values and try again."));
    }

    let initial_payment = payment;
    let mut max_payment = payment;
    let mut total_interest = 0.0;
    let mut first_adjusted: Option<(f64, f64)> = None;
    let mut events = Vec::new();

    for m in 1..=total_months {
        let first_adjustment = fixed_months + 1;
        if m >= first_adjustment && (m - first_adjustment) % adjust_every == 0 {
            rate = terms.next_rate(rate, initial_rate);
            payment = standard_payment(balance, rate / 100.0 / 12.0, total_months - (m - 1));
            if !payment.is_finite() || payment <= 0.0 {
                return Err(CalcError::invalid(
                    "Unable to calculate a future payment with these inputs. Try simplifying optional fields.",
                ));
            }
            first_adjusted.get_or_insert((payment, rate));
            if events.len() < MAX_EVENTS_SHOWN {
                events.push(AdjustmentEvent {
                    month: m,
                    year: (m + 11) / 12,
                    rate,
                    payment,
                });
            }
        }

        let interest = balance * rate / 100.0 / 12.0;
        let principal = payment - interest;
        if principal <= 0.0 {
            return Err(CalcError::PaymentTrap(
                "Your inputs produce a payment that does not reduce the balance. Adjust rates/caps and try again.".to_string(),
            ));
        }

        total_interest += interest;
        balance -= principal.min(balance);
        max_payment = max_payment.max(payment);

        if balance <= 0.00001 {
            break;
        }
    }

    let (first_adjusted_payment, first_adjusted_rate) = first_adjusted.unwrap_or((initial_payment, initial_rate));

    Ok(ArmResult {
        loan_amount,
        initial_rate,
        terms,
        initial_payment,
        first_adjusted_payment,
        first_adjusted_rate,
        max_payment,
        total_interest,
        events,
    })
}

impl ArmResult {
    pub fn to_report(&self, calculator: &str) -> Report {
        let t = &self.terms;
        let mut report = Report::success(calculator, "Adjustable-Rate Mortgage").with_section(
            Section::titled("Projection")
                .field("Loan amount", format_two_decimals(self.loan_amount))
                .field("Initial rate", format_percent(self.initial_rate))
                .field("Initial monthly payment (P&I)", format_two_decimals(self.initial_payment))
                .field(
                    "Payment after first adjustment (projected)",
                    format!(
                        "{} (rate: {})",
                        format_two_decimals(self.first_adjusted_payment),
                        format_percent(self.first_adjusted_rate)
                    ),
                )
                .field("Projected maximum monthly payment (under caps)", format_two_decimals(self.max_payment))
                .field("Projected total interest (P&I only)", format_two_decimals(self.total_interest))
                .note(format!(
                    "Assumption used for projection: Fully indexed rate = index ({}) + margin ({}), with periodic cap ({}) and lifetime cap (initial + {}), floor ({}).",
                    format_percent(t.index_rate),
                    format_percent(t.margin),
                    format_percent(t.periodic_cap),
                    format_percent(t.lifetime_cap),
                    format_percent(t.floor_rate)
                )),
        );

        if !self.events.is_empty() {
            let mut table = Table::new(["Event", "Timing", "Rate", "Payment"]);
            for (i, e) in self.events.iter().enumerate() {
                let label = if i == 0 { "First adjustment".to_string() } else { format!("Adjustment {}", i + 1) };
                table.push_row([
                    label,
                    format!("Year {}", e.year),
                    format_percent(e.rate),
                    format_two_decimals(e.payment),
                ]);
            }
            report = report.with_section(
                Section::titled("Projected adjustment snapshots")
                    .table(table)
                    .note("Note: This is a projection. Real ARM payments depend on future index values and your exact loan terms."),
            );
        }
        report
    }
}

pub struct ArmCalculator;

impl Calculator for ArmCalculator {
    fn name(&self) -> &str {
        "adjustable-rate-mortgage"
    }

    fn description(&self) -> &str {
        "ARM payment projection under index, margin, caps and floor"
    }

    fn run(&self, params: &Value, defaults: &Defaults) -> CalcResult<Report> {
        let input: ArmInput = decode(params)?;
        Ok(calculate(&input, &defaults.arm)?.to_report(self.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_input() -> ArmInput {
        ArmInput {
            loan_amount: Some(300_000.0),
            initial_rate: Some(4.0),
            term_years: Some(30.0),
            fixed_years: Some(5.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_next_rate_respects_caps() {
        let terms = RateTerms {
            adjustment_years: 1.0,
            index_rate: 6.0,
            margin: 2.25,
            periodic_cap: 2.0,
            lifetime_cap: 5.0,
            floor_rate: 0.0,
        };
        // Fully indexed 8.25, periodic cap allows 6.0 from 4.0
        assert!((terms.next_rate(4.0, 4.0) - 6.0).abs() < 1e-12);
        // Next step would reach 8.0 but 8.25 is the target and the lifetime ceiling is 9.0
        assert!((terms.next_rate(6.0, 4.0) - 8.0).abs() < 1e-12);
        assert!((terms.next_rate(8.0, 4.0) - 8.25).abs() < 1e-12);

        let falling = RateTerms { index_rate: 0.5, margin: 0.5, floor_rate: 2.0, ..terms };
        assert!((falling.next_rate(5.0, 5.0) - 3.0).abs() < 1e-12);
        assert!((falling.next_rate(3.0, 5.0) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_first_adjustment_after_fixed_period() {
        let result = calculate(&base_input(), &ArmDefaults::default()).unwrap();
        // Defaults: index 3.0 + margin 2.25 = 5.25, within the 2 point step from 4.0
        assert!((result.first_adjusted_rate - 5.25).abs() < 1e-12);
        assert_eq!(result.events[0].month, 61);
        assert_eq!(result.events[0].year, 6);
        assert_eq!(result.events[1].month, 73);
        assert!(result.first_adjusted_payment > result.initial_payment);
        assert!(result.max_payment >= result.first_adjusted_payment);
        assert!(result.events.len() <= MAX_EVENTS_SHOWN);
    }

    #[test]
    fn test_validation() {
        let mut i = base_input();
        i.fixed_years = Some(30.0);
        let err = calculate(&i, &ArmDefaults::default()).unwrap_err();
        assert_eq!(err.to_string(), "The initial fixed period must be less than the full loan term.");

        let mut i = base_input();
        i.term_years = Some(60.0);
        assert!(matches!(calculate(&i, &ArmDefaults::default()), Err(CalcError::OutOfRange(_))));

        let mut i = base_input();
        i.initial_rate = Some(45.0);
        assert!(calculate(&i, &ArmDefaults::default()).is_err());
    }

    #[test]
    fn test_optional_fields_fall_back_to_defaults() {
        let mut i = base_input();
        i.margin = Some(-1.0);
        i.adjustment_years = Some(0.0);
        let result = calculate(&i, &ArmDefaults::default()).unwrap();
        assert_eq!(result.terms.margin, 2.25);
        assert_eq!(result.terms.adjustment_years, 1.0);
        let report = result.to_report("adjustable-rate-mortgage");
        assert_eq!(report.sections.len(), 2);
        assert_eq!(report.sections[1].table.as_ref().unwrap().rows[0][0], "First adjustment");
    }
}
