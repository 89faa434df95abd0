// Amortization: the bounded period-by-period payoff loop shared by the loan
// calculators, plus the schedule and mortgage repayment calculators built on it.
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::models::{Report, Section, Table};
use shared::utils::{add_months, format_months_years, format_two_decimals, format_year_month, parse_iso_date};

use super::{decode, optional_non_negative, require_non_negative, require_positive, Calculator};
use crate::config::settings::Defaults;
use crate::data::form;
use crate::error::{CalcError, CalcResult};

/// Hard cap on simulated periods (100 years of months).
pub const MAX_PERIODS: u32 = 1200;
/// Balances at or below this are treated as paid off.
pub const BALANCE_EPSILON: f64 = 0.005;

/// Closed-form level payment; straight-line when the rate is zero.
pub fn standard_payment(principal: f64, periodic_rate: f64, periods: u32) -> f64 {
    if periods == 0 {
        return 0.0;
    }
    let n = periods as f64;
    if periodic_rate == 0.0 {
        return principal / n;
    }
    let pow = (1.0 + periodic_rate).powf(n);
    principal * periodic_rate * pow / (pow - 1.0)
}

/// How much the borrower pays in a period, before capping at the payoff amount.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PaymentRule {
    Fixed(f64),
    /// `max(percent_of_balance% × balance, floor) + extra`
    Minimum { percent_of_balance: f64, floor: f64, extra: f64 },
}

impl PaymentRule {
    pub fn requested(&self, balance: f64) -> f64 {
        match *self {
            PaymentRule::Fixed(amount) => amount,
            PaymentRule::Minimum { percent_of_balance, floor, extra } => {
                (percent_of_balance / 100.0 * balance).max(floor) + extra
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScheduleRow {
    pub period: u32,
    pub payment: f64,
    pub principal: f64,
    pub interest: f64,
    pub balance: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Schedule {
    pub rows: Vec<ScheduleRow>,
    pub total_interest: f64,
    pub total_paid: f64,
}

impl Schedule {
    pub fn periods(&self) -> u32 {
        self.rows.len() as u32
    }

    pub fn first(&self) -> Option<&ScheduleRow> {
        self.rows.first()
    }
}

/// Why a payoff loop stopped before clearing the balance.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopFailure {
    /// The requested payment did not exceed the interest accrued in `period`.
    Trap { period: u32, interest: f64, payment: f64 },
    /// The period cap was reached with `balance` still owed.
    Horizon { balance: f64, partial: Schedule },
}

impl LoopFailure {
    pub fn into_error(self, trap_message: &str, horizon_message: &str) -> CalcError {
        match self {
            LoopFailure::Trap { .. } => CalcError::PaymentTrap(trap_message.to_string()),
            LoopFailure::Horizon { .. } => CalcError::HorizonExceeded(horizon_message.to_string()),
        }
    }
}

/// Runs the payoff loop for a single balance.
///
/// Each period accrues `balance × periodic_rate`, applies the rule's payment
/// (interest first, then principal) and caps the last payment at the payoff
/// amount. Stops when the balance is within `BALANCE_EPSILON` of zero, when the
/// payment no longer beats the interest, or after `max_periods`.
pub fn run_payoff(principal: f64, periodic_rate: f64, rule: PaymentRule, max_periods: u32) -> Result<Schedule, LoopFailure> {
    let mut balance = principal;
    let mut schedule = Schedule::default();
    let mut period = 0;

    while balance > BALANCE_EPSILON && period < max_periods {
        period += 1;
        let interest = balance * periodic_rate;
        let requested = rule.requested(balance);

        if requested <= interest + BALANCE_EPSILON {
            return Err(LoopFailure::Trap { period, interest, payment: requested });
        }

        let payment = requested.min(balance + interest);
        let principal_paid = payment - interest;
        balance -= principal_paid;
        if !balance.is_finite() || balance <= BALANCE_EPSILON {
            balance = 0.0;
        }

        schedule.total_interest += interest;
        schedule.total_paid += payment;
        schedule.rows.push(ScheduleRow {
            period,
            payment,
            principal: principal_paid,
            interest,
            balance,
        });
    }

    if balance > BALANCE_EPSILON {
        return Err(LoopFailure::Horizon { balance, partial: schedule });
    }
    Ok(schedule)
}

/// Fixed-payment amortization capped at `MAX_PERIODS`.
pub fn amortize(principal: f64, periodic_rate: f64, payment: f64) -> CalcResult<Schedule> {
    run_payoff(principal, periodic_rate, PaymentRule::Fixed(payment), MAX_PERIODS).map_err(|failure| {
        failure.into_error(
            "Your payment is not enough to cover monthly interest. Increase the payment or reduce the interest rate.",
            "The loan does not pay off within 100 years at this payment. Increase the payment or reduce the interest rate.",
        )
    })
}

// ---------------------------------------------------------------------------
// Amortization schedule
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScheduleDefaults {
    /// Schedule rows shown in the report; 0 shows every month.
    pub rows_to_show: usize,
}

impl Default for ScheduleDefaults {
    fn default() -> Self {
        Self { rows_to_show: 24 }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScheduleInput {
    #[serde(default, deserialize_with = "form::optional_number")]
    pub loan_amount: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub annual_rate: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub term_years: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub extra_payment: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_text")]
    pub start_date: Option<String>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub rows_to_show: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleResult {
    pub base_payment: f64,
    pub payment_with_extra: f64,
    pub start_date: NaiveDate,
    pub schedule: Schedule,
    /// 0 means the whole schedule.
    pub rows_to_show: usize,
}

impl ScheduleResult {
    pub fn payoff_date(&self) -> NaiveDate {
        add_months(self.start_date, self.schedule.periods().saturating_sub(1))
    }

    pub fn to_report(&self, calculator: &str) -> Report {
        let total = self.schedule.rows.len();
        let shown = if self.rows_to_show == 0 { total } else { self.rows_to_show.min(total) };
        let shown_note = if shown == total {
            format!("Showing full schedule ({} months).", total)
        } else {
            format!(
                "Showing first {} of {} months. Set Schedule display to 0 to show all months.",
                shown, total
            )
        };

        let mut table = Table::new(["Month", "Payment", "Principal", "Interest", "Balance"]);
        for row in self.schedule.rows.iter().take(shown) {
            table.push_row([
                format_year_month(add_months(self.start_date, row.period - 1)),
                format_two_decimals(row.payment),
                format_two_decimals(row.principal),
                format_two_decimals(row.interest),
                format_two_decimals(row.balance),
            ]);
        }

        Report::success(calculator, "Amortization Schedule")
            .with_section(
                Section::titled("Summary")
                    .field("Base monthly payment", format_two_decimals(self.base_payment))
                    .field("Monthly payment with extra", format_two_decimals(self.payment_with_extra))
                    .field("Total interest paid", format_two_decimals(self.schedule.total_interest))
                    .field("Total amount repaid", format_two_decimals(self.schedule.total_paid))
                    .field(
                        "Estimated payoff date",
                        format!("{} ({} months)", format_year_month(self.payoff_date()), total),
                    )
                    .note(shown_note),
            )
            .with_section(Section::titled("Schedule").table(table))
    }
}

fn loan_term_months(term_years: f64) -> CalcResult<u32> {
    let n = (term_years * 12.0).round();
    if !n.is_finite() || n <= 0.0 || n > MAX_PERIODS as f64 {
        return Err(CalcError::invalid("Enter a valid loan term in years."));
    }
    Ok(n as u32)
}

pub fn calculate_schedule(input: &ScheduleInput, defaults: &ScheduleDefaults, today: NaiveDate) -> CalcResult<ScheduleResult> {
    let principal = require_positive(input.loan_amount, "loan amount")?;
    let annual_rate = require_non_negative(input.annual_rate, "interest rate")?;
    let term_years = require_positive(input.term_years, "loan term (years)")?;
    let extra = optional_non_negative(input.extra_payment, "extra monthly payment", 0.0)?;

    let start_date = match input.start_date.as_deref() {
        None => today,
        Some(raw) => parse_iso_date(raw)
            .ok_or_else(|| CalcError::invalid("Enter a valid start date in YYYY-MM-DD format, or leave it blank."))?,
    };

    let n = loan_term_months(term_years)?;
    let r = annual_rate / 100.0 / 12.0;
    let base_payment = standard_payment(principal, r, n);
    if !base_payment.is_finite() || base_payment <= 0.0 {
        return Err(CalcError::invalid("Unable to calculate a monthly payment with the values provided."));
    }

    let payment_with_extra = base_payment + extra;
    let schedule = amortize(principal, r, payment_with_extra)?;

    let rows_to_show = match input.rows_to_show {
        Some(v) if v.is_finite() && v.round() >= 0.0 => v.round() as usize,
        _ => defaults.rows_to_show,
    };

    Ok(ScheduleResult {
        base_payment,
        payment_with_extra,
        start_date,
        schedule,
        rows_to_show,
    })
}

pub struct AmortizationScheduleCalculator;

impl Calculator for AmortizationScheduleCalculator {
    fn name(&self) -> &str {
        "amortization-schedule"
    }

    fn description(&self) -> &str {
        "Month-by-month loan schedule with optional extra payment"
    }

    fn run(&self, params: &Value, defaults: &Defaults) -> CalcResult<Report> {
        let input: ScheduleInput = decode(params)?;
        let today = chrono::Local::now().date_naive();
        let result = calculate_schedule(&input, &defaults.schedule, today)?;
        Ok(result.to_report(self.name()))
    }
}

// ---------------------------------------------------------------------------
// Mortgage repayment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MortgageInput {
    #[serde(default, deserialize_with = "form::optional_number")]
    pub loan_amount: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub annual_rate: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub term_years: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub extra_payment: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtraPaymentImpact {
    pub extra_payment: f64,
    pub months: u32,
    pub months_saved: u32,
    pub total_interest: f64,
    pub interest_saved: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MortgageResult {
    pub monthly_payment: f64,
    pub months: u32,
    pub total_paid: f64,
    pub total_interest: f64,
    pub with_extra: Option<ExtraPaymentImpact>,
}

pub fn calculate_mortgage(input: &MortgageInput) -> CalcResult<MortgageResult> {
    let principal = require_positive(input.loan_amount, "loan amount")?;
    let annual_rate = require_non_negative(input.annual_rate, "interest rate")?;
    let term_years = require_positive(input.term_years, "loan term (years)")?;
    let extra = optional_non_negative(input.extra_payment, "extra monthly payment", 0.0)?;

    let months = loan_term_months(term_years)?;
    let r = annual_rate / 100.0 / 12.0;
    let monthly_payment = standard_payment(principal, r, months);
    let total_paid = monthly_payment * months as f64;
    let total_interest = total_paid - principal;

    let with_extra = if extra > 0.0 {
        let accelerated = amortize(principal, r, monthly_payment + extra)?;
        Some(ExtraPaymentImpact {
            extra_payment: extra,
            months: accelerated.periods(),
            months_saved: months.saturating_sub(accelerated.periods()),
            total_interest: accelerated.total_interest,
            interest_saved: (total_interest - accelerated.total_interest).max(0.0),
        })
    } else {
        None
    };

    Ok(MortgageResult {
        monthly_payment,
        months,
        total_paid,
        total_interest,
        with_extra,
    })
}

impl MortgageResult {
    pub fn to_report(&self, calculator: &str) -> Report {
        let mut report = Report::success(calculator, "Mortgage Repayment").with_section(
            Section::titled("Standard repayment")
                .field("Monthly repayment", format_two_decimals(self.monthly_payment))
                .field("Number of payments", self.months.to_string())
                .field("Total paid", format_two_decimals(self.total_paid))
                .field("Total interest", format_two_decimals(self.total_interest)),
        );
        if let Some(extra) = &self.with_extra {
            report = report.with_section(
                Section::titled("With extra payment")
                    .field("Extra per month", format_two_decimals(extra.extra_payment))
                    .field("Payoff time", format_months_years(extra.months))
                    .field("Time saved", format_months_years(extra.months_saved))
                    .field("Total interest", format_two_decimals(extra.total_interest))
                    .field("Interest saved", format_two_decimals(extra.interest_saved)),
            );
        }
        report
    }
}

pub struct MortgageRepaymentCalculator;

impl Calculator for MortgageRepaymentCalculator {
    fn name(&self) -> &str {
        "mortgage-repayment"
    }

    fn description(&self) -> &str {
        "Monthly repayment, total interest and the effect of overpaying"
    }

    fn run(&self, params: &Value, _defaults: &Defaults) -> CalcResult<Report> {
        let input: MortgageInput = decode(params)?;
        Ok(calculate_mortgage(&input)?.to_report(self.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_standard_payment() {
        // 200k over 30 years at 6%
        let p = standard_payment(200_000.0, 0.06 / 12.0, 360);
        assert!((p - 1199.10).abs() < 0.01, "payment was {}", p);
        assert!((standard_payment(1200.0, 0.0, 12) - 100.0).abs() < 1e-9);
        assert_eq!(standard_payment(1000.0, 0.01, 0), 0.0);
    }

    #[test]
    fn test_amortize_pays_off_in_term() {
        let r = 0.05 / 12.0;
        let payment = standard_payment(10_000.0, r, 36);
        let schedule = amortize(10_000.0, r, payment).unwrap();
        assert_eq!(schedule.periods(), 36);
        assert_eq!(schedule.rows.last().unwrap().balance, 0.0);
        let principal_sum: f64 = schedule.rows.iter().map(|r| r.principal).sum();
        assert!((principal_sum - 10_000.0).abs() < 0.01);
        assert!((schedule.total_paid - schedule.total_interest - 10_000.0).abs() < 0.01);
    }

    #[test]
    fn test_final_payment_is_capped() {
        let schedule = amortize(250.0, 0.0, 100.0).unwrap();
        assert_eq!(schedule.periods(), 3);
        assert!((schedule.rows[2].payment - 50.0).abs() < 1e-9);
        assert!((schedule.total_paid - 250.0).abs() < 1e-9);
    }

    #[test]
    fn test_payment_below_interest_is_a_trap() {
        // 1% a month on 10k is 100 of interest
        let err = amortize(10_000.0, 0.01, 100.0).unwrap_err();
        assert!(matches!(err, CalcError::PaymentTrap(_)));
    }

    #[test]
    fn test_minimum_rule_and_horizon() {
        let rule = PaymentRule::Minimum { percent_of_balance: 2.0, floor: 25.0, extra: 0.0 };
        assert!((rule.requested(5000.0) - 100.0).abs() < 1e-9);
        assert!((rule.requested(100.0) - 25.0).abs() < 1e-9);

        let result = run_payoff(10_000.0, 0.0, PaymentRule::Fixed(1.0), 12);
        match result {
            Err(LoopFailure::Horizon { balance, partial }) => {
                assert!((balance - 9_988.0).abs() < 1e-9);
                assert_eq!(partial.periods(), 12);
            }
            other => panic!("expected horizon failure, got {:?}", other),
        }
    }

    #[test]
    fn test_schedule_calculator_rows_and_dates() {
        let input = ScheduleInput {
            loan_amount: Some(12_000.0),
            annual_rate: Some(0.0),
            term_years: Some(1.0),
            extra_payment: None,
            start_date: Some("2025-01-31".into()),
            rows_to_show: Some(3.0),
        };
        let result = calculate_schedule(&input, &ScheduleDefaults::default(), day(2000, 1, 1)).unwrap();
        assert!((result.base_payment - 1000.0).abs() < 1e-9);
        assert_eq!(result.payoff_date(), day(2025, 12, 31));

        let report = result.to_report("amortization-schedule");
        assert_eq!(report.field("Estimated payoff date"), Some("2025-12 (12 months)"));
        let table = report.sections[1].table.as_ref().unwrap();
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[1][0], "2025-02");
        assert!(report.sections[0].notes[0].starts_with("Showing first 3 of 12 months"));
    }

    #[test]
    fn test_schedule_defaults_and_validation() {
        let today = day(2026, 3, 15);
        let mut input = ScheduleInput {
            loan_amount: Some(5000.0),
            annual_rate: Some(6.0),
            term_years: Some(1.0),
            ..Default::default()
        };
        let result = calculate_schedule(&input, &ScheduleDefaults::default(), today).unwrap();
        assert_eq!(result.start_date, today);
        assert_eq!(result.rows_to_show, 24);
        assert!(result.to_report("x").sections[0].notes[0].starts_with("Showing full schedule"));

        input.start_date = Some("03/15/2026".into());
        let err = calculate_schedule(&input, &ScheduleDefaults::default(), today).unwrap_err();
        assert!(err.to_string().contains("YYYY-MM-DD"));

        input.start_date = None;
        input.loan_amount = Some(-1.0);
        let err = calculate_schedule(&input, &ScheduleDefaults::default(), today).unwrap_err();
        assert_eq!(err.to_string(), "Enter a valid loan amount greater than 0.");
    }

    #[test]
    fn test_mortgage_with_extra_saves_time() {
        let input = MortgageInput {
            loan_amount: Some(200_000.0),
            annual_rate: Some(6.0),
            term_years: Some(30.0),
            extra_payment: Some(200.0),
        };
        let result = calculate_mortgage(&input).unwrap();
        assert_eq!(result.months, 360);
        let extra = result.with_extra.as_ref().unwrap();
        assert!(extra.months < 360);
        assert!(extra.months_saved > 0);
        assert!(extra.interest_saved > 0.0);
        assert_eq!(result.to_report("mortgage-repayment").sections.len(), 2);
    }

    proptest! {
        #[test]
        fn prop_standard_payment_clears_loan(
            principal in 1_000.0f64..1_000_000.0,
            annual_rate in 0.0f64..20.0,
            months in 1u32..=480,
        ) {
            let r = annual_rate / 100.0 / 12.0;
            let payment = standard_payment(principal, r, months);
            let schedule = amortize(principal, r, payment).unwrap();
            // Floating error may shave or add one period at the very end
            prop_assert!(schedule.periods() <= months + 1);
            prop_assert!(schedule.periods() + 1 >= months);
        }
    }
}
