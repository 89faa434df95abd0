// Rent vs buy: month-by-month net worth comparison over a holding horizon.
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::models::{Report, Section};
use shared::utils::format_two_decimals;

use super::amortization::{standard_payment, MAX_PERIODS};
use super::{decode, require_non_negative, require_percent, require_positive, Calculator};
use crate::config::settings::Defaults;
use crate::data::form;
use crate::error::{CalcError, CalcResult};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RentVsBuyInput {
    #[serde(default, deserialize_with = "form::optional_number")]
    pub home_price: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub down_payment_percent: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub interest_rate: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub loan_term_years: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub property_tax_percent: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub insurance_annual: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub maintenance_percent: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub hoa_monthly: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub closing_costs_percent: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub selling_costs_percent: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub rent_monthly: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub rent_increase_percent: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub home_appreciation_percent: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub investment_return_percent: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub horizon_years: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    Buy,
    Rent,
    Tie,
}

#[derive(Debug, Clone, Serialize)]
pub struct RentVsBuyResult {
    pub mortgage_payment: f64,
    pub out_of_pocket_buy: f64,
    pub out_of_pocket_rent: f64,
    pub buyer_net_worth: f64,
    pub renter_net_worth: f64,
    pub home_value: f64,
    pub loan_balance: f64,
    pub home_proceeds: f64,
    pub winner: Winner,
    /// Absolute net worth gap between the two paths.
    pub margin: f64,
}

/// Effective monthly rate equivalent to an annual percentage.
pub fn monthly_rate(annual_percent: f64) -> f64 {
    (1.0 + annual_percent / 100.0).powf(1.0 / 12.0) - 1.0
}

pub fn calculate(input: &RentVsBuyInput) -> CalcResult<RentVsBuyResult> {
    let home_price = require_positive(input.home_price, "home price")?;
    let down_pct = require_percent(input.down_payment_percent, "down payment percent")?;
    let tax_pct = require_percent(input.property_tax_percent, "property tax percent")?;
    let maintenance_pct = require_percent(input.maintenance_percent, "maintenance percent")?;
    let closing_pct = require_percent(input.closing_costs_percent, "closing costs percent")?;
    let selling_pct = require_percent(input.selling_costs_percent, "selling costs percent")?;
    let rent_growth_pct = require_percent(input.rent_increase_percent, "rent increase percent")?;
    let appreciation_pct = require_percent(input.home_appreciation_percent, "home appreciation percent")?;
    let return_pct = require_percent(input.investment_return_percent, "investment return percent")?;

    let insurance_annual = require_non_negative(input.insurance_annual, "home insurance (annual amount)")?;
    let hoa_monthly = require_non_negative(input.hoa_monthly, "HOA or levies (monthly amount)")?;
    let rent_start = require_positive(input.rent_monthly, "current monthly rent")?;

    let interest_rate = require_positive(input.interest_rate, "interest rate")?;
    let loan_term_years = require_positive(input.loan_term_years, "loan term (years)")?;
    let horizon_years = require_positive(input.horizon_years, "time horizon (years)")?;

    let horizon_months = ((horizon_years * 12.0).floor() as u32).max(1);
    if horizon_months > MAX_PERIODS {
        return Err(CalcError::out_of_range("Enter a time horizon of 100 years or less."));
    }
    let loan_months = ((loan_term_years * 12.0).floor() as u32).max(1);

    let down_payment = home_price * down_pct / 100.0;
    let loan_amount = (home_price - down_payment).max(0.0);
    let closing_costs = home_price * closing_pct / 100.0;

    let mortgage_rate = monthly_rate(interest_rate);
    let mortgage_payment = if loan_amount <= 0.0 {
        0.0
    } else {
        standard_payment(loan_amount, mortgage_rate, loan_months)
    };

    let invest_rate = monthly_rate(return_pct);
    let appreciation_rate = monthly_rate(appreciation_pct);
    let rent_rate = monthly_rate(rent_growth_pct);

    let mut home_value = home_price;
    let mut loan_balance = loan_amount;
    // The renter keeps the upfront cash the buyer spent and invests it
    let mut renter_investment = down_payment + closing_costs;
    let mut buyer_investment = 0.0;
    let mut out_of_pocket_buy = down_payment + closing_costs;
    let mut out_of_pocket_rent = 0.0;
    let mut rent = rent_start;

    for m in 1..=horizon_months {
        rent *= 1.0 + rent_rate;
        home_value *= 1.0 + appreciation_rate;

        let in_term = m <= loan_months;
        if loan_balance > 0.0 && in_term {
            let interest = loan_balance * mortgage_rate;
            let principal = (mortgage_payment - interest).max(0.0);
            loan_balance = (loan_balance - principal).max(0.0);
        }

        let buyer_cost = (if in_term { mortgage_payment } else { 0.0 })
            + home_value * tax_pct / 100.0 / 12.0
            + insurance_annual / 12.0
            + home_value * maintenance_pct / 100.0 / 12.0
            + hoa_monthly;

        out_of_pocket_buy += buyer_cost;
        out_of_pocket_rent += rent;

        renter_investment *= 1.0 + invest_rate;
        buyer_investment *= 1.0 + invest_rate;

        // Whichever path is cheaper this month invests the difference
        let diff = buyer_cost - rent;
        if diff > 0.0 {
            renter_investment += diff;
        } else if diff < 0.0 {
            buyer_investment += -diff;
        }
    }

    let selling_costs = home_value * selling_pct / 100.0;
    let equity = (home_value - loan_balance).max(0.0);
    let home_proceeds = (equity - selling_costs).max(0.0);
    let buyer_net_worth = home_proceeds + buyer_investment;
    let renter_net_worth = renter_investment;
    let gap = buyer_net_worth - renter_net_worth;

    let winner = if gap > 0.0 {
        Winner::Buy
    } else if gap < 0.0 {
        Winner::Rent
    } else {
        Winner::Tie
    };

    Ok(RentVsBuyResult {
        mortgage_payment,
        out_of_pocket_buy,
        out_of_pocket_rent,
        buyer_net_worth,
        renter_net_worth,
        home_value,
        loan_balance,
        home_proceeds,
        winner,
        margin: gap.abs(),
    })
}

impl RentVsBuyResult {
    pub fn winner_line(&self) -> String {
        match self.winner {
            Winner::Buy => format!("Buying by {} (net worth difference).", format_two_decimals(self.margin)),
            Winner::Rent => format!("Renting by {} (net worth difference).", format_two_decimals(self.margin)),
            Winner::Tie => "Tie (based on these assumptions).".to_string(),
        }
    }

    pub fn to_report(&self, calculator: &str) -> Report {
        Report::success(calculator, "Rent vs Buy")
            .with_section(
                Section::titled("Total out-of-pocket cost over horizon")
                    .field("Buy", format_two_decimals(self.out_of_pocket_buy))
                    .field("Rent", format_two_decimals(self.out_of_pocket_rent)),
            )
            .with_section(
                Section::titled("Estimated end-of-horizon net worth")
                    .field("Buy", format_two_decimals(self.buyer_net_worth))
                    .field("Rent", format_two_decimals(self.renter_net_worth))
                    .field("Estimated winner", self.winner_line()),
            )
            .with_section(
                Section::titled("Buying details at end")
                    .field("Monthly mortgage payment", format_two_decimals(self.mortgage_payment))
                    .field("Estimated home value", format_two_decimals(self.home_value))
                    .field("Remaining loan balance", format_two_decimals(self.loan_balance))
                    .field("Estimated home proceeds after selling costs", format_two_decimals(self.home_proceeds)),
            )
    }
}

pub struct RentVsBuyCalculator;

impl Calculator for RentVsBuyCalculator {
    fn name(&self) -> &str {
        "rent-vs-buy"
    }

    fn description(&self) -> &str {
        "Net worth after renting and investing versus buying a home"
    }

    fn run(&self, params: &Value, _defaults: &Defaults) -> CalcResult<Report> {
        let input: RentVsBuyInput = decode(params)?;
        Ok(calculate(&input)?.to_report(self.name()))
    }
}
