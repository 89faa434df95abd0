// Minimum-payment trap: how long a card balance takes to clear on the issuer's
// minimum rule, what an extra payment saves, and the fixed payment for a target.
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::models::{Report, Section};
use shared::utils::{clamp, format_months_years, format_two_decimals};

use super::amortization::{run_payoff, LoopFailure, PaymentRule, Schedule, BALANCE_EPSILON, MAX_PERIODS};
use super::{decode, require_positive, Calculator};
use crate::config::settings::Defaults;
use crate::data::form;
use crate::error::{CalcError, CalcResult};

const TRAP_MESSAGE: &str = "Your payment is not enough to cover monthly interest. This is the minimum payment trap. Increase the payment (or reduce the APR) so the payment is higher than the monthly interest.";
const HORIZON_MESSAGE: &str = "Payoff exceeds the maximum model horizon. This typically means payments are extremely close to interest-only or the terms are unrealistic. Increase the payment or verify the APR and minimum payment settings.";

const BISECTION_STEPS: u32 = 60;
const MAX_TARGET_MONTHS: f64 = 600.0;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TrapDefaults {
    pub min_rate_percent: f64,
    pub min_floor: f64,
}

impl Default for TrapDefaults {
    fn default() -> Self {
        Self {
            min_rate_percent: 2.0,
            min_floor: 25.0,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrapInput {
    #[serde(default, deserialize_with = "form::optional_number")]
    pub balance: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub apr: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub min_rate_percent: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub min_floor: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub extra_payment: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub target_months: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioSummary {
    pub months: u32,
    pub total_paid: f64,
    pub total_interest: f64,
    pub first_payment: f64,
    pub first_interest: f64,
    pub first_principal: f64,
}

impl From<&Schedule> for ScenarioSummary {
    fn from(schedule: &Schedule) -> Self {
        let (first_payment, first_interest, first_principal) = schedule
            .first()
            .map(|r| (r.payment, r.interest, r.principal))
            .unwrap_or((0.0, 0.0, 0.0));
        Self {
            months: schedule.periods(),
            total_paid: schedule.total_paid,
            total_interest: schedule.total_interest,
            first_payment,
            first_interest,
            first_principal,
        }
    }
}

/// A scenario either clears the balance or fails with the reason shown to the user.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Scenario {
    PaidOff(ScenarioSummary),
    Stuck { reason: String },
}

impl Scenario {
    fn from_loop(result: Result<Schedule, LoopFailure>) -> Self {
        match result {
            Ok(schedule) => Scenario::PaidOff(ScenarioSummary::from(&schedule)),
            Err(LoopFailure::Trap { .. }) => Scenario::Stuck { reason: TRAP_MESSAGE.to_string() },
            Err(LoopFailure::Horizon { .. }) => Scenario::Stuck { reason: HORIZON_MESSAGE.to_string() },
        }
    }

    pub fn summary(&self) -> Option<&ScenarioSummary> {
        match self {
            Scenario::PaidOff(s) => Some(s),
            Scenario::Stuck { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TargetEstimate {
    pub months: u32,
    pub payment: f64,
    pub first_month_interest: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrapResult {
    pub balance: f64,
    pub apr: f64,
    pub min_rate_percent: f64,
    pub min_floor: f64,
    pub extra_payment: f64,
    pub minimum_only: Scenario,
    pub with_extra: Option<Scenario>,
    pub target: Option<TargetEstimate>,
}

fn clears_within(balance: f64, monthly_rate: f64, payment: f64, months: u32) -> Result<bool, ()> {
    match run_payoff(balance, monthly_rate, PaymentRule::Fixed(payment), months) {
        Ok(_) => Ok(true),
        Err(LoopFailure::Horizon { .. }) => Ok(false),
        Err(LoopFailure::Trap { .. }) => Err(()),
    }
}

/// Bisects the smallest fixed monthly payment that clears `balance` within `months`.
pub fn payment_for_target(balance: f64, monthly_rate: f64, months: u32) -> f64 {
    let first_interest = balance * monthly_rate;
    let mut low = first_interest + 0.01;
    let mut high = balance * (1.0 + monthly_rate) + 1.0;

    for _ in 0..20 {
        if clears_within(balance, monthly_rate, high, months) == Ok(true) {
            break;
        }
        high *= 1.5;
        if high > 1e9 {
            break;
        }
    }

    for _ in 0..BISECTION_STEPS {
        let mid = (low + high) / 2.0;
        match clears_within(balance, monthly_rate, mid, months) {
            Err(()) => low = mid + 0.01,
            Ok(true) => high = mid,
            Ok(false) => low = mid,
        }
    }
    high
}

pub fn calculate(input: &TrapInput, defaults: &TrapDefaults) -> CalcResult<TrapResult> {
    let balance = require_positive(input.balance, "current balance")?;
    let apr = require_positive(input.apr, "APR")?;

    // Optional inputs fall back instead of blocking the result
    let min_rate_percent = match input.min_rate_percent {
        Some(v) if v.is_finite() && v > 0.0 => v,
        _ => defaults.min_rate_percent,
    };
    let min_floor = match input.min_floor {
        Some(v) if v.is_finite() && v >= 0.0 => v,
        _ => defaults.min_floor,
    };
    let extra_payment = match input.extra_payment {
        Some(v) if v.is_finite() && v >= 0.0 => v,
        _ => 0.0,
    };
    let min_rate_percent = clamp(min_rate_percent, 0.1, 50.0);
    let min_floor = clamp(min_floor, 0.0, 1_000_000.0);
    let extra_payment = clamp(extra_payment, 0.0, 1_000_000.0);

    let monthly_rate = apr / 100.0 / 12.0;
    let rule = |extra| PaymentRule::Minimum {
        percent_of_balance: min_rate_percent,
        floor: min_floor,
        extra,
    };

    let minimum_only = Scenario::from_loop(run_payoff(balance, monthly_rate, rule(0.0), MAX_PERIODS));
    let with_extra = if extra_payment > 0.0 {
        Some(Scenario::from_loop(run_payoff(balance, monthly_rate, rule(extra_payment), MAX_PERIODS)))
    } else {
        None
    };

    if with_extra.is_none() {
        if let Scenario::Stuck { reason } = &minimum_only {
            return Err(if reason == TRAP_MESSAGE {
                CalcError::PaymentTrap(reason.clone())
            } else {
                CalcError::HorizonExceeded(reason.clone())
            });
        }
    }

    let target = match input.target_months {
        Some(v) if v.is_finite() && v > 0.0 => {
            let months = clamp(v, 1.0, MAX_TARGET_MONTHS).round() as u32;
            let payment = payment_for_target(balance, monthly_rate, months);
            (payment.is_finite() && payment > BALANCE_EPSILON).then(|| TargetEstimate {
                months,
                payment,
                first_month_interest: balance * monthly_rate,
            })
        }
        _ => None,
    };

    Ok(TrapResult {
        balance,
        apr,
        min_rate_percent,
        min_floor,
        extra_payment,
        minimum_only,
        with_extra,
        target,
    })
}

impl TrapResult {
    pub fn to_report(&self, calculator: &str) -> Report {
        let mut min_section = Section::titled("Minimum payment only");
        match &self.minimum_only {
            Scenario::PaidOff(s) => {
                min_section = min_section
                    .field("Balance", format_two_decimals(self.balance))
                    .field("APR", format!("{}%", format_two_decimals(self.apr)))
                    .field(
                        "Minimum rule",
                        format!(
                            "{}% of balance (min {})",
                            format_two_decimals(self.min_rate_percent),
                            format_two_decimals(self.min_floor)
                        ),
                    )
                    .field("Estimated payoff time", format_months_years(s.months))
                    .field("Total interest", format_two_decimals(s.total_interest))
                    .field("Total paid", format_two_decimals(s.total_paid))
                    .note(format!(
                        "First month (approx): payment {}, interest {}, principal {}.",
                        format_two_decimals(s.first_payment),
                        format_two_decimals(s.first_interest),
                        format_two_decimals(s.first_principal)
                    ));
            }
            Scenario::Stuck { reason } => min_section = min_section.note(reason.clone()),
        }
        let mut report = Report::success(calculator, "Minimum Payment Trap").with_section(min_section);

        if let Some(with_extra) = &self.with_extra {
            let mut section = Section::titled("With extra payment");
            match (with_extra, self.minimum_only.summary()) {
                (Scenario::PaidOff(s), base) => {
                    section = section
                        .field("Extra per month", format_two_decimals(self.extra_payment))
                        .field("Estimated payoff time", format_months_years(s.months))
                        .field("Total interest", format_two_decimals(s.total_interest))
                        .field("Total paid", format_two_decimals(s.total_paid));
                    if let Some(base) = base {
                        let months_saved = base.months.saturating_sub(s.months);
                        let interest_saved = (base.total_interest - s.total_interest).max(0.0);
                        section = section
                            .field("Time saved", format_months_years(months_saved))
                            .field("Interest saved", format_two_decimals(interest_saved));
                    }
                }
                (Scenario::Stuck { .. }, _) => {
                    section = section.note(
                        "Even with the extra payment, the model indicates the payment may not reduce the balance meaningfully. Increase the payment so it stays above the monthly interest.",
                    );
                }
            }
            report = report.with_section(section);
        }

        if let Some(target) = &self.target {
            report = report.with_section(
                Section::titled("Payment needed for your target")
                    .field("Target payoff time", format!("{} months", target.months))
                    .field("Estimated fixed monthly payment", format_two_decimals(target.payment))
                    .field("First-month interest (approx)", format_two_decimals(target.first_month_interest))
                    .note("This is a fixed-payment estimate. If you keep spending on the card, miss payments, or your APR changes, you will need a higher payment to hit the same target."),
            );
        }

        report.with_section(Section::new().note(
            "Assumptions used: no new purchases, APR stays constant, monthly interest compounding, minimum payment is max(percent of balance, floor) plus optional extra.",
        ))
    }
}

pub struct PaymentTrapCalculator;

impl Calculator for PaymentTrapCalculator {
    fn name(&self) -> &str {
        "minimum-payment-trap"
    }

    fn description(&self) -> &str {
        "Payoff time on minimum payments, with extra payment and target estimates"
    }

    fn run(&self, params: &Value, defaults: &Defaults) -> CalcResult<Report> {
        let input: TrapInput = decode(params)?;
        Ok(calculate(&input, &defaults.payment_trap)?.to_report(self.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(balance: f64, apr: f64, rate: f64, floor: f64) -> TrapInput {
        TrapInput {
            balance: Some(balance),
            apr: Some(apr),
            min_rate_percent: Some(rate),
            min_floor: Some(floor),
            ..Default::default()
        }
    }

    #[test]
    fn test_payment_below_interest_is_reported_as_trap() {
        // 1% of 1000 is 10, the floor is 10, and interest at 24% APR is 20
        let err = calculate(&input(1000.0, 24.0, 1.0, 10.0), &TrapDefaults::default()).unwrap_err();
        assert!(matches!(err, CalcError::PaymentTrap(_)));
        assert!(err.to_string().contains("minimum payment trap"));
    }

    #[test]
    fn test_extra_payment_rescues_a_trap() {
        let mut i = input(1000.0, 24.0, 1.0, 10.0);
        i.extra_payment = Some(50.0);
        let result = calculate(&i, &TrapDefaults::default()).unwrap();
        assert!(matches!(result.minimum_only, Scenario::Stuck { .. }));
        let extra = result.with_extra.as_ref().and_then(|s| s.summary()).unwrap();
        assert!(extra.months > 0 && extra.months < 40);

        let report = result.to_report("minimum-payment-trap");
        assert!(report.is_success());
        assert!(report.sections[0].notes[0].contains("minimum payment trap"));
        assert!(report.field("Time saved").is_none());
    }

    #[test]
    fn test_minimum_only_payoff_and_savings() {
        let mut i = input(5000.0, 18.0, 2.0, 25.0);
        i.extra_payment = Some(100.0);
        let result = calculate(&i, &TrapDefaults::default()).unwrap();
        let base = result.minimum_only.summary().unwrap();
        let extra = result.with_extra.as_ref().and_then(|s| s.summary()).unwrap();
        assert!((base.first_payment - 100.0).abs() < 1e-9);
        assert!((base.first_interest - 75.0).abs() < 1e-9);
        assert!(extra.months < base.months);
        assert!(extra.total_interest < base.total_interest);
        assert!(result.to_report("x").field("Interest saved").is_some());
    }

    #[test]
    fn test_optional_fields_fall_back_and_clamp() {
        let i = TrapInput {
            balance: Some(2000.0),
            apr: Some(20.0),
            min_rate_percent: Some(-3.0),
            min_floor: Some(f64::NAN),
            extra_payment: None,
            target_months: None,
        };
        let result = calculate(&i, &TrapDefaults::default()).unwrap();
        assert_eq!(result.min_rate_percent, 2.0);
        assert_eq!(result.min_floor, 25.0);

        let clamped = calculate(&input(2000.0, 20.0, 90.0, 10.0), &TrapDefaults::default()).unwrap();
        assert_eq!(clamped.min_rate_percent, 50.0);
    }

    #[test]
    fn test_target_payment_clears_in_target_months() {
        let mut i = input(3000.0, 22.0, 2.0, 25.0);
        i.target_months = Some(24.0);
        let result = calculate(&i, &TrapDefaults::default()).unwrap();
        let target = result.target.as_ref().unwrap();
        assert_eq!(target.months, 24);

        let r = 22.0 / 100.0 / 12.0;
        let expected = crate::calculators::amortization::standard_payment(3000.0, r, 24);
        assert!((target.payment - expected).abs() < 0.05, "{} vs {}", target.payment, expected);
        assert_eq!(clears_within(3000.0, r, target.payment, 24), Ok(true));
    }

    #[test]
    fn test_missing_apr_message() {
        let i = TrapInput { balance: Some(100.0), ..Default::default() };
        let err = calculate(&i, &TrapDefaults::default()).unwrap_err();
        assert_eq!(err.to_string(), "Enter a valid APR greater than 0.");
    }
}
