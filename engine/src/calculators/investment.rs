// Time value of money: future value of a lump sum plus contributions, and
// present value of an annuity with an optional lump sum.
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::models::{Report, Section, Table};
use shared::utils::{format_percent, format_two_decimals};

use super::{decode, optional_non_negative, require_non_negative, require_positive, Calculator};
use crate::config::settings::Defaults;
use crate::data::form;
use crate::error::{CalcError, CalcResult};

const MAX_TABLE_YEARS: u32 = 60;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InvestmentDefaults {
    pub compounds_per_year: u32,
}

impl Default for InvestmentDefaults {
    fn default() -> Self {
        Self { compounds_per_year: 12 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Timing {
    End,
    Begin,
}

impl Timing {
    fn parse(raw: Option<&str>) -> CalcResult<Self> {
        match raw.map(|s| s.to_lowercase()) {
            None => Ok(Timing::End),
            Some(s) if s == "end" => Ok(Timing::End),
            Some(s) if s == "begin" || s == "start" => Ok(Timing::Begin),
            Some(_) => Err(CalcError::invalid("Select when contributions are made: start or end of each period.")),
        }
    }
}

fn periods_per_year(raw: Option<f64>, fallback: u32, label: &str) -> CalcResult<f64> {
    match raw {
        None => Ok(fallback as f64),
        Some(v) if v.is_finite() && v >= 1.0 && v <= 365.0 => Ok(v.round()),
        Some(_) => Err(CalcError::invalid(format!("Select a valid {}.", label))),
    }
}

fn rate_in_range(value: Option<f64>, label: &str) -> CalcResult<f64> {
    match value {
        Some(v) if v.is_finite() && (-100.0..=100.0).contains(&v) => Ok(v),
        _ => Err(CalcError::invalid(format!("Enter a valid {} between -100 and 100.", label))),
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GrowthInput {
    #[serde(default, deserialize_with = "form::optional_number")]
    pub initial_amount: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub contribution: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub annual_rate: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub years: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub compounds_per_year: Option<f64>,
    /// Defaults to the compounding frequency.
    #[serde(default, deserialize_with = "form::optional_number")]
    pub contributions_per_year: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_text")]
    pub timing: Option<String>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub inflation_rate: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct GrowthTerms {
    pub initial: f64,
    pub contribution: f64,
    pub annual_rate: f64,
    pub compounds_per_year: f64,
    pub contributions_per_year: f64,
    pub timing: Timing,
}

impl GrowthTerms {
    /// Effective rate per contribution period: `(1 + r/m)^(m/n) - 1`.
    pub fn period_rate(&self) -> f64 {
        let r = self.annual_rate / 100.0;
        (1.0 + r / self.compounds_per_year).powf(self.compounds_per_year / self.contributions_per_year) - 1.0
    }

    pub fn contribution_periods(&self, years: f64) -> f64 {
        (self.contributions_per_year * years).round()
    }

    pub fn future_value(&self, years: f64) -> f64 {
        let r = self.annual_rate / 100.0;
        let lump = self.initial * (1.0 + r / self.compounds_per_year).powf(self.compounds_per_year * years);

        let n = self.contribution_periods(years);
        let i = self.period_rate();
        let annuity = if i.abs() < 1e-12 {
            self.contribution * n
        } else {
            let mut fv = self.contribution * ((1.0 + i).powf(n) - 1.0) / i;
            if self.timing == Timing::Begin {
                fv *= 1.0 + i;
            }
            fv
        };
        lump + annuity
    }

    pub fn contributed(&self, years: f64) -> f64 {
        self.initial + self.contribution * self.contribution_periods(years)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct YearRow {
    pub year: u32,
    pub contributed: f64,
    pub value: f64,
    pub growth: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GrowthResult {
    pub terms: GrowthTerms,
    pub years: f64,
    pub future_value: f64,
    pub total_contributed: f64,
    pub growth: f64,
    pub inflation_rate: Option<f64>,
    pub real_value: Option<f64>,
    pub yearly: Vec<YearRow>,
    pub table_truncated: bool,
}

pub fn calculate_growth(input: &GrowthInput, defaults: &InvestmentDefaults) -> CalcResult<GrowthResult> {
    let initial = require_non_negative(input.initial_amount, "initial amount")?;
    let contribution = optional_non_negative(input.contribution, "regular contribution", 0.0)?;
    let annual_rate = rate_in_range(input.annual_rate, "annual return")?;
    let years = require_positive(input.years, "time horizon (years)")?;
    if years > 100.0 {
        return Err(CalcError::out_of_range("Enter a time horizon of 100 years or less."));
    }
    let compounds_per_year = periods_per_year(input.compounds_per_year, defaults.compounds_per_year, "compounding frequency")?;
    let contributions_per_year = periods_per_year(
        input.contributions_per_year,
        compounds_per_year as u32,
        "contribution frequency",
    )?;
    let timing = Timing::parse(input.timing.as_deref())?;
    let inflation_rate = match input.inflation_rate {
        None => None,
        some => Some(rate_in_range(some, "inflation rate")?),
    };

    if initial == 0.0 && contribution == 0.0 {
        return Err(CalcError::invalid(
            "Enter an initial amount and/or a regular contribution to calculate a future value.",
        ));
    }

    let terms = GrowthTerms {
        initial,
        contribution,
        annual_rate,
        compounds_per_year,
        contributions_per_year,
        timing,
    };

    let future_value = terms.future_value(years);
    let total_contributed = terms.contributed(years);
    let real_value = inflation_rate.map(|inf| future_value / (1.0 + inf / 100.0).powf(years));

    let whole_years = years.ceil() as u32;
    let shown_years = whole_years.min(MAX_TABLE_YEARS);
    let yearly = (1..=shown_years)
        .map(|y| {
            // The final row lands on the exact horizon, which may be a partial year
            let t = (y as f64).min(years);
            let value = terms.future_value(t);
            let contributed = terms.contributed(t);
            YearRow {
                year: y,
                contributed,
                value,
                growth: value - contributed,
            }
        })
        .collect();

    Ok(GrowthResult {
        terms,
        years,
        future_value,
        total_contributed,
        growth: future_value - total_contributed,
        inflation_rate,
        real_value,
        yearly,
        table_truncated: whole_years > MAX_TABLE_YEARS,
    })
}

impl GrowthResult {
    pub fn to_report(&self, calculator: &str) -> Report {
        let mut summary = Section::titled("Summary")
            .field("Future value", format_two_decimals(self.future_value))
            .field("Total contributed", format_two_decimals(self.total_contributed))
            .field("Estimated growth (interest/returns)", format_two_decimals(self.growth))
            .field(
                "Contribution periods",
                format!("{}", self.terms.contribution_periods(self.years) as u64),
            );
        if let (Some(real), Some(inf)) = (self.real_value, self.inflation_rate) {
            summary = summary.field(
                "Inflation-adjusted value",
                format!("{} (at {} inflation)", format_two_decimals(real), format_percent(inf)),
            );
        }
        if self.terms.annual_rate == 0.0 {
            summary = summary.note("With a 0% rate, your future value equals your total contributions.");
        } else if self.growth < 0.0 {
            summary = summary.note("The result shows negative growth. Double-check your inputs.");
        }

        let mut table = Table::new(["Year", "Contributed", "Value", "Growth"]);
        for row in &self.yearly {
            table.push_row([
                row.year.to_string(),
                format_two_decimals(row.contributed),
                format_two_decimals(row.value),
                format_two_decimals(row.growth),
            ]);
        }
        let mut by_year = Section::titled("Year by year").table(table);
        if self.table_truncated {
            by_year = by_year.note(format!("Table limited to the first {} years.", MAX_TABLE_YEARS));
        }

        Report::success(calculator, "Investment Growth")
            .with_section(summary)
            .with_section(by_year)
    }
}

pub struct InvestmentGrowthCalculator;

impl Calculator for InvestmentGrowthCalculator {
    fn name(&self) -> &str {
        "investment-growth"
    }

    fn description(&self) -> &str {
        "Future value of a lump sum and regular contributions"
    }

    fn run(&self, params: &Value, defaults: &Defaults) -> CalcResult<Report> {
        let input: GrowthInput = decode(params)?;
        Ok(calculate_growth(&input, &defaults.investment)?.to_report(self.name()))
    }
}

// ---------------------------------------------------------------------------
// Present value
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PresentValueInput {
    #[serde(default, deserialize_with = "form::optional_number")]
    pub payment: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub annual_rate: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub years: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub periods_per_year: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub future_value: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_text")]
    pub timing: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PresentValueResult {
    pub present_value: f64,
    pub periods: f64,
    pub total_nominal: f64,
    pub discount: f64,
}

pub fn present_value(payment: f64, period_rate: f64, periods: f64, future_value: f64, timing: Timing) -> f64 {
    if period_rate.abs() < 1e-12 {
        return payment * periods + future_value;
    }
    let discount = (1.0 + period_rate).powf(-periods);
    let mut annuity = payment * (1.0 - discount) / period_rate;
    if timing == Timing::Begin {
        annuity *= 1.0 + period_rate;
    }
    annuity + future_value * discount
}

pub fn calculate_present_value(input: &PresentValueInput, defaults: &InvestmentDefaults) -> CalcResult<PresentValueResult> {
    let payment = optional_non_negative(input.payment, "payment per period", 0.0)?;
    let annual_rate = require_non_negative(input.annual_rate, "discount rate")?;
    let years = require_positive(input.years, "number of years")?;
    let per_year = periods_per_year(input.periods_per_year, defaults.compounds_per_year, "payment frequency")?;
    let future_value = optional_non_negative(input.future_value, "future lump sum", 0.0)?;
    let timing = Timing::parse(input.timing.as_deref())?;

    if payment == 0.0 && future_value == 0.0 {
        return Err(CalcError::invalid("Enter a payment and/or a future lump sum to discount."));
    }

    let periods = (per_year * years).round();
    let pv = present_value(payment, annual_rate / 100.0 / per_year, periods, future_value, timing);
    let total_nominal = payment * periods + future_value;

    Ok(PresentValueResult {
        present_value: pv,
        periods,
        total_nominal,
        discount: total_nominal - pv,
    })
}

impl PresentValueResult {
    pub fn to_report(&self, calculator: &str) -> Report {
        Report::success(calculator, "Present Value").with_section(
            Section::titled("Summary")
                .field("Present value", format_two_decimals(self.present_value))
                .field("Number of payments", format!("{}", self.periods as u64))
                .field("Total nominal amount", format_two_decimals(self.total_nominal))
                .field("Discount (time value)", format_two_decimals(self.discount)),
        )
    }
}

pub struct PresentValueCalculator;

impl Calculator for PresentValueCalculator {
    fn name(&self) -> &str {
        "present-value"
    }

    fn description(&self) -> &str {
        "Today's value of a stream of payments and a future lump sum"
    }

    fn run(&self, params: &Value, defaults: &Defaults) -> CalcResult<Report> {
        let input: PresentValueInput = decode(params)?;
        Ok(calculate_present_value(&input, &defaults.investment)?.to_report(self.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn growth(initial: f64, contribution: f64, rate: f64, years: f64) -> GrowthInput {
        GrowthInput {
            initial_amount: Some(initial),
            contribution: Some(contribution),
            annual_rate: Some(rate),
            years: Some(years),
            ..Default::default()
        }
    }

    #[test]
    fn test_lump_sum_compounding() {
        let input = GrowthInput { compounds_per_year: Some(1.0), ..growth(1000.0, 0.0, 10.0, 2.0) };
        let result = calculate_growth(&input, &InvestmentDefaults::default()).unwrap();
        assert!((result.future_value - 1210.0).abs() < 1e-9);
        assert!((result.growth - 210.0).abs() < 1e-9);
        assert_eq!(result.yearly.len(), 2);
        assert!((result.yearly[0].value - 1100.0).abs() < 1e-9);
    }

    #[test]
    fn test_annuity_due_vs_ordinary() {
        let end = calculate_growth(
            &GrowthInput { compounds_per_year: Some(1.0), ..growth(0.0, 100.0, 10.0, 2.0) },
            &InvestmentDefaults::default(),
        )
        .unwrap();
        // 100 + 110
        assert!((end.future_value - 210.0).abs() < 1e-9);

        let begin = calculate_growth(
            &GrowthInput {
                compounds_per_year: Some(1.0),
                timing: Some("begin".into()),
                ..growth(0.0, 100.0, 10.0, 2.0)
            },
            &InvestmentDefaults::default(),
        )
        .unwrap();
        assert!((begin.future_value - 231.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_rate_is_linear() {
        let result = calculate_growth(&growth(500.0, 50.0, 0.0, 1.0), &InvestmentDefaults::default()).unwrap();
        assert!((result.future_value - 1100.0).abs() < 1e-9);
        assert!(result.growth.abs() < 1e-9);
        let report = result.to_report("investment-growth");
        assert!(report.sections[0].notes[0].contains("0% rate"));
    }

    #[test]
    fn test_inflation_and_table_cap() {
        let input = GrowthInput { inflation_rate: Some(2.0), ..growth(1000.0, 0.0, 5.0, 80.0) };
        let result = calculate_growth(&input, &InvestmentDefaults::default()).unwrap();
        let real = result.real_value.unwrap();
        assert!((real - result.future_value / 1.02f64.powf(80.0)).abs() < 1e-6);
        assert_eq!(result.yearly.len(), 60);
        assert!(result.table_truncated);
    }

    #[test]
    fn test_growth_validation() {
        let err = calculate_growth(&growth(0.0, 0.0, 5.0, 10.0), &InvestmentDefaults::default()).unwrap_err();
        assert!(err.to_string().starts_with("Enter an initial amount"));
        assert!(calculate_growth(&growth(100.0, 0.0, 150.0, 10.0), &InvestmentDefaults::default()).is_err());
        let bad_timing = GrowthInput { timing: Some("middle".into()), ..growth(100.0, 0.0, 5.0, 1.0) };
        assert!(calculate_growth(&bad_timing, &InvestmentDefaults::default()).is_err());
    }

    #[test]
    fn test_present_value() {
        // 100 a year for 2 years at 10%: 90.909 + 82.645
        let pv = present_value(100.0, 0.10, 2.0, 0.0, Timing::End);
        assert!((pv - 173.553_719).abs() < 1e-5);
        let due = present_value(100.0, 0.10, 2.0, 0.0, Timing::Begin);
        assert!((due - 190.909_090).abs() < 1e-5);
        assert!((present_value(100.0, 0.0, 3.0, 50.0, Timing::End) - 350.0).abs() < 1e-9);

        let input = PresentValueInput {
            payment: Some(0.0),
            annual_rate: Some(10.0),
            years: Some(1.0),
            periods_per_year: Some(1.0),
            future_value: Some(1100.0),
            timing: None,
        };
        let result = calculate_present_value(&input, &InvestmentDefaults::default()).unwrap();
        assert!((result.present_value - 1000.0).abs() < 1e-9);
        assert!((result.discount - 100.0).abs() < 1e-9);
    }
}
