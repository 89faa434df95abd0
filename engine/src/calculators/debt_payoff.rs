// Multi-debt payoff simulation: avalanche (highest APR first) and snowball
// (smallest balance first), with freed minimums rolling into the extra pool.
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::models::{Report, Section, Table};
use shared::utils::{add_months, format_month_year, format_months_years, format_two_decimals};

use super::amortization::{BALANCE_EPSILON, MAX_PERIODS};
use super::{decode, optional_non_negative, require_non_negative, require_positive, Calculator};
use crate::config::settings::Defaults;
use crate::data::form;
use crate::error::{CalcError, CalcResult};

pub const MAX_DEBTS: usize = 6;
const PREVIEW_MONTHS: u32 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Avalanche,
    Snowball,
}

impl Strategy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "avalanche" => Some(Strategy::Avalanche),
            "snowball" => Some(Strategy::Snowball),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Strategy::Avalanche => "Debt avalanche (highest APR first)",
            Strategy::Snowball => "Debt snowball (smallest balance first)",
        }
    }

    pub fn other(&self) -> Self {
        match self {
            Strategy::Avalanche => Strategy::Snowball,
            Strategy::Snowball => Strategy::Avalanche,
        }
    }

    // True when `a` should be paid before `b`.
    fn prefers(&self, a: &DebtState, b: &DebtState) -> bool {
        match self {
            Strategy::Avalanche => a.apr > b.apr || (a.apr == b.apr && a.balance > b.balance),
            Strategy::Snowball => a.balance < b.balance || (a.balance == b.balance && a.apr > b.apr),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DebtDefaults {
    pub strategy: Strategy,
}

impl Default for DebtDefaults {
    fn default() -> Self {
        Self { strategy: Strategy::Avalanche }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DebtRow {
    #[serde(default, deserialize_with = "form::optional_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub balance: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub apr: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub minimum: Option<f64>,
}

impl DebtRow {
    fn is_blank(&self) -> bool {
        self.name.is_none() && self.balance.is_none() && self.apr.is_none() && self.minimum.is_none()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DebtPayoffInput {
    #[serde(default)]
    pub debts: Vec<DebtRow>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub extra_payment: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_text")]
    pub strategy: Option<String>,
    #[serde(default, deserialize_with = "form::optional_flag")]
    pub compare: Option<bool>,
}

/// A validated debt ready for simulation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Debt {
    pub name: String,
    pub balance: f64,
    pub apr: f64,
    pub minimum: f64,
}

impl Debt {
    pub fn new(name: impl Into<String>, balance: f64, apr: f64, minimum: f64) -> Self {
        Self { name: name.into(), balance, apr, minimum }
    }
}

pub fn validate_debts(rows: &[DebtRow]) -> CalcResult<Vec<Debt>> {
    let used: Vec<(usize, &DebtRow)> = rows.iter().enumerate().filter(|(_, r)| !r.is_blank()).collect();
    if used.is_empty() {
        return Err(CalcError::invalid("Enter at least one debt (balance, APR, and minimum payment)."));
    }
    if used.len() > MAX_DEBTS {
        return Err(CalcError::out_of_range(format!("Enter up to {} debts.", MAX_DEBTS)));
    }

    let mut debts = Vec::with_capacity(used.len());
    for (i, row) in used {
        let name = row.name.clone().unwrap_or_else(|| format!("Debt {}", i + 1));
        let balance = require_positive(row.balance, &format!("{} balance", name))?;
        let apr = require_non_negative(row.apr, &format!("{} APR", name))?;
        if apr > 100.0 {
            return Err(CalcError::out_of_range(format!("{} APR looks unusual. Enter a value between 0 and 100.", name)));
        }
        let minimum = require_positive(row.minimum, &format!("{} minimum payment", name))?;
        debts.push(Debt { name, balance, apr, minimum });
    }
    Ok(debts)
}

#[derive(Debug, Clone)]
struct DebtState {
    balance: f64,
    apr: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DebtOutcome {
    pub name: String,
    pub apr: f64,
    pub start_balance: f64,
    pub minimum: f64,
    pub interest_paid: f64,
    pub total_paid: f64,
    pub payoff_month: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthSummary {
    pub month: u32,
    pub payment: f64,
    pub interest: f64,
    pub remaining: f64,
    pub paid_off: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PayoffPlan {
    pub strategy: Strategy,
    pub months: u32,
    pub total_interest: f64,
    pub total_paid: f64,
    pub debts: Vec<DebtOutcome>,
    /// Indexes into `debts`, in the order they were cleared.
    pub payoff_order: Vec<usize>,
    /// Debt that received the first extra dollar, if any extra was applied.
    pub first_target: Option<usize>,
    pub preview: Vec<MonthSummary>,
}

fn pick_target(states: &[DebtState], strategy: Strategy) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, d) in states.iter().enumerate() {
        if d.balance <= BALANCE_EPSILON {
            continue;
        }
        best = match best {
            Some(b) if !strategy.prefers(d, &states[b]) => Some(b),
            _ => Some(i),
        };
    }
    best
}

/// Simulates paying `debts` month by month with `extra` on top of the minimums.
///
/// Order of a month: interest accrues on every open balance, every minimum is
/// paid (capped at the balance), then the extra pool goes to the strategy's
/// target and rolls to the next target when one clears mid-month. A cleared
/// debt's minimum joins the pool from the following month.
///
/// A month in which every payment was at or below the interest it met, so no
/// balance went down and none cleared, can only repeat; that plan fails with
/// `PaymentTrap` straight away.
pub fn simulate(debts: &[Debt], extra: f64, strategy: Strategy) -> CalcResult<PayoffPlan> {
    let mut states: Vec<DebtState> = debts.iter().map(|d| DebtState { balance: d.balance, apr: d.apr }).collect();
    let mut outcomes: Vec<DebtOutcome> = debts
        .iter()
        .map(|d| DebtOutcome {
            name: d.name.clone(),
            apr: d.apr,
            start_balance: d.balance,
            minimum: d.minimum,
            interest_paid: 0.0,
            total_paid: 0.0,
            payoff_month: None,
        })
        .collect();

    let mut months = 0;
    let mut total_interest = 0.0;
    let mut total_paid = 0.0;
    let mut rollover = 0.0;
    let mut payoff_order = Vec::new();
    let mut first_target = None;
    let mut preview = Vec::new();

    while months < MAX_PERIODS {
        if states.iter().all(|d| d.balance <= BALANCE_EPSILON) {
            break;
        }
        months += 1;
        let mut month_interest = 0.0;
        let mut month_payment = 0.0;
        let mut cleared_this_month = Vec::new();
        let mut pool = extra + rollover;
        let opening: Vec<f64> = states.iter().map(|d| d.balance).collect();

        for (i, d) in states.iter_mut().enumerate() {
            if d.balance <= BALANCE_EPSILON {
                continue;
            }
            let interest = d.balance * d.apr / 100.0 / 12.0;
            d.balance += interest;
            outcomes[i].interest_paid += interest;
            month_interest += interest;
        }

        for (i, d) in states.iter_mut().enumerate() {
            if d.balance <= BALANCE_EPSILON {
                continue;
            }
            let pay = debts[i].minimum.min(d.balance);
            d.balance -= pay;
            outcomes[i].total_paid += pay;
            month_payment += pay;
            if d.balance <= BALANCE_EPSILON {
                d.balance = 0.0;
                cleared_this_month.push(i);
            }
        }

        while pool > BALANCE_EPSILON {
            let Some(t) = pick_target(&states, strategy) else { break };
            first_target.get_or_insert(t);
            let pay = pool.min(states[t].balance);
            states[t].balance -= pay;
            outcomes[t].total_paid += pay;
            month_payment += pay;
            pool -= pay;
            if states[t].balance <= BALANCE_EPSILON {
                states[t].balance = 0.0;
                cleared_this_month.push(t);
            }
        }

        for &i in &cleared_this_month {
            if outcomes[i].payoff_month.is_none() {
                outcomes[i].payoff_month = Some(months);
                payoff_order.push(i);
                rollover += debts[i].minimum;
            }
        }

        let reduced = states
            .iter()
            .zip(&opening)
            .any(|(d, &before)| before > BALANCE_EPSILON && d.balance < before - BALANCE_EPSILON);
        if cleared_this_month.is_empty() && !reduced && month_payment <= month_interest {
            return Err(CalcError::PaymentTrap(format!(
                "Your payments do not cover the interest ({} paid vs {} interest in month {}), so balances would never reach zero. Increase the extra monthly payment or minimum payments and try again.",
                format_two_decimals(month_payment),
                format_two_decimals(month_interest),
                months
            )));
        }

        total_interest += month_interest;
        total_paid += month_payment;

        if months <= PREVIEW_MONTHS {
            preview.push(MonthSummary {
                month: months,
                payment: month_payment,
                interest: month_interest,
                remaining: states.iter().map(|d| d.balance.max(0.0)).sum(),
                paid_off: cleared_this_month.iter().map(|&i| debts[i].name.clone()).collect(),
            });
        }
    }

    if states.iter().any(|d| d.balance > BALANCE_EPSILON) {
        return Err(CalcError::HorizonExceeded(
            "Your payments appear too low to pay off these debts (balances are not reaching zero). Increase the extra monthly payment or minimum payments and try again.".to_string(),
        ));
    }

    Ok(PayoffPlan {
        strategy,
        months,
        total_interest,
        total_paid,
        debts: outcomes,
        payoff_order,
        first_target,
        preview,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct DebtPayoffResult {
    pub primary: PayoffPlan,
    pub alternative: Option<PayoffPlan>,
    /// Debts whose minimum does not cover their first month of interest.
    pub underwater: Vec<String>,
    pub start_date: NaiveDate,
}

impl DebtPayoffResult {
    fn plan_summary(&self, plan: &PayoffPlan) -> Section {
        Section::titled(plan.strategy.label())
            .field(
                "Estimated payoff time",
                format!("{} ({} months)", format_months_years(plan.months), plan.months),
            )
            .field("Estimated payoff date", format_month_year(add_months(self.start_date, plan.months)))
            .field("Total interest paid (estimate)", format_two_decimals(plan.total_interest))
            .field("Total paid (principal + interest)", format_two_decimals(plan.total_paid))
    }

    fn plan_detail(&self, plan: &PayoffPlan, heading: &str) -> Section {
        let mut ordered: Vec<&DebtOutcome> = plan.debts.iter().collect();
        ordered.sort_by(|a, b| {
            let am = a.payoff_month.unwrap_or(u32::MAX);
            let bm = b.payoff_month.unwrap_or(u32::MAX);
            am.cmp(&bm).then(b.apr.total_cmp(&a.apr))
        });

        let mut table = Table::new(["Debt", "APR", "Start balance", "Min / month", "Payoff month", "Est. paid off"]);
        for d in ordered {
            let month = d.payoff_month.unwrap_or(0);
            table.push_row([
                d.name.clone(),
                format!("{}%", format_two_decimals(d.apr)),
                format_two_decimals(d.start_balance),
                format_two_decimals(d.minimum),
                month.to_string(),
                format_month_year(add_months(self.start_date, month)),
            ]);
        }
        Section::titled(heading).table(table)
    }

    fn preview_section(plan: &PayoffPlan) -> Section {
        let mut table = Table::new(["Month", "Payment", "Interest", "Remaining", "Paid off"]);
        for m in &plan.preview {
            let paid_off = if m.paid_off.is_empty() { "-".to_string() } else { m.paid_off.join(", ") };
            table.push_row([
                m.month.to_string(),
                format_two_decimals(m.payment),
                format_two_decimals(m.interest),
                format_two_decimals(m.remaining),
                paid_off,
            ]);
        }
        Section::titled("First 12 months").table(table)
    }

    pub fn comparison_line(&self) -> Option<String> {
        let alt = self.alternative.as_ref()?;
        let (avalanche, snowball) = match self.primary.strategy {
            Strategy::Avalanche => (&self.primary, alt),
            Strategy::Snowball => (alt, &self.primary),
        };
        let interest_diff = snowball.total_interest - avalanche.total_interest;
        let months_diff = snowball.months as i64 - avalanche.months as i64;

        if interest_diff.abs() < 0.01 && months_diff == 0 {
            return Some("Both methods estimate the same payoff time and interest with these inputs.".to_string());
        }
        let mut line = String::new();
        if interest_diff > 0.01 {
            line.push_str(&format!("Avalanche estimates {} less interest than snowball. ", format_two_decimals(interest_diff)));
        } else if interest_diff < -0.01 {
            line.push_str(&format!("Snowball estimates {} less interest than avalanche. ", format_two_decimals(-interest_diff)));
        }
        if months_diff > 0 {
            line.push_str(&format!("Avalanche also pays off about {} months sooner.", months_diff));
        } else if months_diff < 0 {
            line.push_str(&format!("Snowball also pays off about {} months sooner.", -months_diff));
        }
        Some(line.trim_end().to_string())
    }

    pub fn to_report(&self, calculator: &str) -> Report {
        let mut report = Report::success(calculator, "Debt Payoff Plan").with_section(self.plan_summary(&self.primary));

        if let Some(alt) = &self.alternative {
            if let Some(line) = self.comparison_line() {
                report = report.with_section(Section::titled("Comparison").note(line));
            }
            report = report
                .with_section(self.plan_summary(alt))
                .with_section(self.plan_detail(&self.primary, &format!("{} payoff detail", title_case(self.primary.strategy))))
                .with_section(self.plan_detail(alt, &format!("{} payoff detail", title_case(alt.strategy))));
        } else {
            report = report.with_section(self.plan_detail(
                &self.primary,
                &format!("Payoff detail ({})", title_case(self.primary.strategy).to_lowercase()),
            ));
        }

        report = report.with_section(Self::preview_section(&self.primary));

        if !self.underwater.is_empty() {
            report = report.with_section(Section::titled("Note").note(format!(
                "The minimum payment on {} may not cover monthly interest. Payoff estimates rely on extra payments reaching those debts.",
                self.underwater.join(", ")
            )));
        }
        report
    }
}

fn title_case(strategy: Strategy) -> &'static str {
    match strategy {
        Strategy::Avalanche => "Avalanche",
        Strategy::Snowball => "Snowball",
    }
}

pub fn calculate(input: &DebtPayoffInput, defaults: &DebtDefaults, today: NaiveDate) -> CalcResult<DebtPayoffResult> {
    let extra = optional_non_negative(input.extra_payment, "extra monthly payment", 0.0)?;
    let strategy = match input.strategy.as_deref() {
        None => defaults.strategy,
        Some(raw) => Strategy::parse(raw)
            .ok_or_else(|| CalcError::invalid("Choose a payoff strategy: avalanche or snowball."))?,
    };
    let debts = validate_debts(&input.debts)?;

    let underwater = debts
        .iter()
        .filter(|d| d.apr > 0.0 && d.minimum <= d.balance * d.apr / 100.0 / 12.0)
        .map(|d| d.name.clone())
        .collect();

    let primary = simulate(&debts, extra, strategy)?;
    let alternative = if input.compare.unwrap_or(false) {
        Some(simulate(&debts, extra, strategy.other())?)
    } else {
        None
    };

    Ok(DebtPayoffResult {
        primary,
        alternative,
        underwater,
        start_date: today,
    })
}

pub struct DebtPayoffCalculator;

impl Calculator for DebtPayoffCalculator {
    fn name(&self) -> &str {
        "debt-payoff"
    }

    fn description(&self) -> &str {
        "Avalanche or snowball payoff timeline for up to six debts"
    }

    fn run(&self, params: &Value, defaults: &Defaults) -> CalcResult<Report> {
        let input: DebtPayoffInput = decode(params)?;
        let today = chrono::Local::now().date_naive();
        Ok(calculate(&input, &defaults.debt, today)?.to_report(self.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_debts() -> Vec<Debt> {
        vec![Debt::new("Card", 1000.0, 20.0, 30.0), Debt::new("Loan", 500.0, 5.0, 20.0)]
    }

    #[test]
    fn test_avalanche_targets_highest_apr_first() {
        let plan = simulate(&sample_debts(), 50.0, Strategy::Avalanche).unwrap();
        assert_eq!(plan.first_target, Some(0));
        assert!(plan.months < MAX_PERIODS);
        assert!(plan.debts.iter().all(|d| d.payoff_month.is_some()));
    }

    #[test]
    fn test_snowball_targets_smallest_balance_first() {
        let plan = simulate(&sample_debts(), 50.0, Strategy::Snowball).unwrap();
        assert_eq!(plan.first_target, Some(1));
        assert_eq!(plan.payoff_order[0], 1);
    }

    #[test]
    fn test_avalanche_never_costs_more_interest() {
        let avalanche = simulate(&sample_debts(), 50.0, Strategy::Avalanche).unwrap();
        let snowball = simulate(&sample_debts(), 50.0, Strategy::Snowball).unwrap();
        assert!(avalanche.total_interest <= snowball.total_interest + 1e-9);
        let principal: f64 = sample_debts().iter().map(|d| d.balance).sum();
        assert!((avalanche.total_paid - avalanche.total_interest - principal).abs() < 0.05);
    }

    #[test]
    fn test_rollover_speeds_up_payoff() {
        // Without rollover the second debt would take 500/20 = 25 months at 0%
        let debts = vec![Debt::new("A", 100.0, 0.0, 50.0), Debt::new("B", 500.0, 0.0, 20.0)];
        let plan = simulate(&debts, 0.0, Strategy::Snowball).unwrap();
        assert_eq!(plan.debts[0].payoff_month, Some(2));
        // Month 3 onwards B receives 20 + 50
        assert!(plan.debts[1].payoff_month.unwrap() < 25);
        assert_eq!(plan.payoff_order, vec![0, 1]);
    }

    #[test]
    fn test_tie_breaks() {
        let same_apr = vec![
            DebtState { balance: 500.0, apr: 10.0 },
            DebtState { balance: 900.0, apr: 10.0 },
        ];
        assert_eq!(pick_target(&same_apr, Strategy::Avalanche), Some(1));
        assert_eq!(pick_target(&same_apr, Strategy::Snowball), Some(0));

        let same_balance = vec![
            DebtState { balance: 500.0, apr: 5.0 },
            DebtState { balance: 500.0, apr: 15.0 },
        ];
        assert_eq!(pick_target(&same_balance, Strategy::Snowball), Some(1));

        let cleared = vec![DebtState { balance: 0.0, apr: 30.0 }];
        assert_eq!(pick_target(&cleared, Strategy::Avalanche), None);
    }

    #[test]
    fn test_payments_below_interest_are_a_trap() {
        // 10,000 at 24% accrues 200 a month against a 50 minimum
        let debts = vec![Debt::new("Card", 10_000.0, 24.0, 50.0)];
        let err = simulate(&debts, 0.0, Strategy::Avalanche).unwrap_err();
        assert!(matches!(err, CalcError::PaymentTrap(_)));
        assert!(err.is_user_facing());
        assert!(err.to_string().contains("do not cover the interest"));

        // Payment exactly equal to interest never moves the balance either
        let debts = vec![Debt::new("Card", 12_000.0, 12.0, 120.0)];
        assert!(matches!(simulate(&debts, 0.0, Strategy::Snowball), Err(CalcError::PaymentTrap(_))));
    }

    #[test]
    fn test_underwater_minimum_rescued_by_extra() {
        let input = DebtPayoffInput {
            debts: vec![DebtRow { name: Some("Card".into()), balance: Some(10_000.0), apr: Some(24.0), minimum: Some(50.0) }],
            extra_payment: Some(400.0),
            ..Default::default()
        };
        let today = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        let result = calculate(&input, &DebtDefaults::default(), today).unwrap();
        assert_eq!(result.underwater, vec!["Card".to_string()]);
        let report = result.to_report("debt-payoff");
        assert!(report.sections.iter().any(|s| s.heading.as_deref() == Some("Note")));
    }

    #[test]
    fn test_row_validation() {
        let err = validate_debts(&[DebtRow::default(), DebtRow::default()]).unwrap_err();
        assert_eq!(err.to_string(), "Enter at least one debt (balance, APR, and minimum payment).");

        let rows = vec![
            DebtRow::default(),
            DebtRow { balance: Some(500.0), apr: Some(5.0), minimum: None, ..Default::default() },
        ];
        let err = validate_debts(&rows).unwrap_err();
        assert_eq!(err.to_string(), "Enter a valid Debt 2 minimum payment greater than 0.");
    }

    #[test]
    fn test_compare_report() {
        let input = DebtPayoffInput {
            debts: vec![
                DebtRow { name: Some("Card".into()), balance: Some(1000.0), apr: Some(20.0), minimum: Some(30.0) },
                DebtRow { name: Some("Loan".into()), balance: Some(500.0), apr: Some(5.0), minimum: Some(20.0) },
            ],
            extra_payment: Some(50.0),
            strategy: None,
            compare: Some(true),
        };
        let today = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        let result = calculate(&input, &DebtDefaults::default(), today).unwrap();
        assert_eq!(result.primary.strategy, Strategy::Avalanche);
        assert_eq!(result.alternative.as_ref().unwrap().strategy, Strategy::Snowball);
        assert!(result.comparison_line().is_some());

        let report = result.to_report("debt-payoff");
        assert!(report.sections.iter().any(|s| s.heading.as_deref() == Some("Comparison")));
        assert!(report.sections.iter().any(|s| s.heading.as_deref() == Some("First 12 months")));
    }

    #[test]
    fn test_unknown_strategy_is_rejected() {
        let input = DebtPayoffInput {
            debts: vec![DebtRow { balance: Some(100.0), apr: Some(1.0), minimum: Some(10.0), ..Default::default() }],
            strategy: Some("hurricane".into()),
            ..Default::default()
        };
        let today = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        assert!(calculate(&input, &DebtDefaults::default(), today).is_err());
    }
}
