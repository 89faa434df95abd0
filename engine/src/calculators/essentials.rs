// Income vs essentials readiness diagnostic.
//
// The same coverage ratio (income / essentials) is scored by several named
// policies. Each policy owns its stable threshold, its wording, and which
// income and cost figures it feeds into the ratio.
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::models::{Report, Section, Table};
use shared::utils::{clamp, format_two_decimals, format_with_commas};

use super::{decode, optional_non_negative, require_positive, Calculator};
use crate::config::settings::Defaults;
use crate::data::form;
use crate::error::{CalcError, CalcResult};

const UNDERPREPARED_BELOW: f64 = 1.0;
const MAX_LEVERS: usize = 5;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EssentialsDefaults {
    pub policy: String,
    pub buffer_months: f64,
}

impl Default for EssentialsDefaults {
    fn default() -> Self {
        Self {
            policy: "basic".to_string(),
            buffer_months: 3.0,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EssentialsInput {
    #[serde(default, deserialize_with = "form::optional_number")]
    pub income: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub housing: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub utilities: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub groceries: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub transport: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub debt_minimums: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub medical: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub other: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub commitments: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub reliability: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub variability_percent: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub error_margin_percent: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub buffer_months: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub confidence_percent: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_text")]
    pub policy: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Expense {
    pub label: &'static str,
    pub amount: f64,
}

/// Validated monthly figures. Percent inputs are kept as fractions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Household {
    pub income: f64,
    pub expenses: Vec<Expense>,
    pub commitments: f64,
    pub reliability: f64,
    pub variability: f64,
    pub error_margin: f64,
    pub buffer_months: f64,
    pub confidence_percent: f64,
}

impl Household {
    pub fn essentials(&self) -> f64 {
        self.expenses.iter().map(|e| e.amount).sum()
    }

    /// Largest essential categories first; equal amounts keep input order.
    pub fn top_drivers(&self, count: usize) -> Vec<&'static str> {
        let mut sorted: Vec<&Expense> = self.expenses.iter().filter(|e| e.amount > 0.0).collect();
        sorted.sort_by(|a, b| b.amount.total_cmp(&a.amount));
        sorted.into_iter().take(count).map(|e| e.label).collect()
    }
}

fn bounded(value: Option<f64>, fallback: f64, min: f64, max: f64, message: &str) -> CalcResult<f64> {
    match value {
        None => Ok(fallback),
        Some(v) if v.is_finite() && (min..=max).contains(&v) => Ok(v),
        Some(_) => Err(CalcError::out_of_range(message)),
    }
}

impl EssentialsInput {
    pub fn household(&self, defaults: &EssentialsDefaults) -> CalcResult<Household> {
        let income = require_positive(self.income, "monthly take-home income")?;
        let categories = [
            ("Housing", self.housing, "housing"),
            ("Utilities", self.utilities, "utilities"),
            ("Groceries and supplies", self.groceries, "groceries and essential supplies"),
            ("Transport", self.transport, "transport"),
            ("Minimum debt payments", self.debt_minimums, "minimum debt payments"),
            ("Insurance and medical", self.medical, "insurance and medical"),
            ("Other essentials", self.other, "other essentials"),
        ];
        let mut expenses = Vec::with_capacity(categories.len());
        for (label, value, field) in categories {
            let amount = optional_non_negative(value, field, 0.0)?;
            expenses.push(Expense { label, amount });
        }
        let commitments = optional_non_negative(self.commitments, "non-negotiable commitments", 0.0)?;

        let reliability = bounded(
            self.reliability,
            1.0,
            0.5,
            1.0,
            "Enter a valid income reliability factor between 0.50 and 1.00.",
        )?;
        let variability = bounded(
            self.variability_percent,
            0.0,
            0.0,
            40.0,
            "Enter a valid income variability percent between 0 and 40.",
        )?;
        let buffer_months = bounded(
            self.buffer_months,
            defaults.buffer_months.clamp(0.0, 12.0),
            0.0,
            12.0,
            "Enter a valid target buffer depth between 0 and 12 months.",
        )?;
        let error_margin = bounded(
            self.error_margin_percent,
            0.0,
            0.0,
            30.0,
            "Enter a valid estimation error margin percent between 0 and 30.",
        )?;
        let confidence_percent = bounded(
            self.confidence_percent,
            100.0,
            50.0,
            100.0,
            "Enter a valid estimation confidence percent between 50 and 100.",
        )?;

        let household = Household {
            income,
            expenses,
            commitments,
            reliability,
            variability: variability / 100.0,
            error_margin: error_margin / 100.0,
            buffer_months,
            confidence_percent,
        };
        if !(household.essentials() > 0.0) {
            return Err(CalcError::invalid("Essentials must be greater than 0."));
        }
        Ok(household)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Readiness {
    Underprepared,
    Borderline,
    Stable,
}

impl Readiness {
    pub fn classify(ratio: f64, stable_threshold: f64) -> Self {
        if ratio < UNDERPREPARED_BELOW {
            Readiness::Underprepared
        } else if ratio < stable_threshold {
            Readiness::Borderline
        } else {
            Readiness::Stable
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Readiness::Underprepared => "Underprepared",
            Readiness::Borderline => "Borderline",
            Readiness::Stable => "Stable",
        }
    }
}

/// One income figure measured against one essentials figure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coverage {
    pub income: f64,
    pub essentials: f64,
    pub threshold: f64,
    pub ratio: f64,
    pub readiness: Readiness,
}

impl Coverage {
    pub fn assess(income: f64, essentials: f64, threshold: f64) -> Self {
        let ratio = income / essentials;
        Coverage {
            income,
            essentials,
            threshold,
            ratio,
            readiness: Readiness::classify(ratio, threshold),
        }
    }

    pub fn margin(&self) -> f64 {
        self.income - self.essentials
    }

    /// Extra income needed to reach the stable threshold.
    pub fn income_lift(&self) -> f64 {
        (self.essentials * self.threshold - self.income).max(0.0)
    }

    /// Essentials reduction needed to reach the stable threshold at current income.
    pub fn essentials_cut(&self) -> f64 {
        (self.essentials - self.income / self.threshold).max(0.0)
    }

    pub fn headline(&self) -> String {
        format!("Readiness: {} ({}× coverage)", self.readiness.label(), format_ratio(self.ratio))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Narrative {
    pub interpretation: String,
    pub actions: [String; 2],
}

impl Narrative {
    fn new(interpretation: impl Into<String>, first: impl Into<String>, second: impl Into<String>) -> Self {
        Narrative {
            interpretation: interpretation.into(),
            actions: [first.into(), second.into()],
        }
    }
}

fn money(value: f64) -> String {
    format_with_commas(value, 0)
}

fn format_ratio(ratio: f64) -> String {
    format!("{:.2}", ratio)
}

/// Scoring strategy for the coverage diagnostic.
pub trait ScoringPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    fn stable_threshold(&self) -> f64;

    fn income_basis(&self, household: &Household) -> f64 {
        household.income
    }

    fn essentials_basis(&self, household: &Household) -> f64 {
        household.essentials()
    }

    fn narrative(&self, coverage: &Coverage) -> Narrative;

    /// Extended planning output. Only the pro policy produces one.
    fn stress_test(&self, _household: &Household, _coverage: &Coverage) -> Option<StressTest> {
        None
    }
}

pub struct BasicPolicy;

impl ScoringPolicy for BasicPolicy {
    fn name(&self) -> &'static str {
        "basic"
    }

    fn stable_threshold(&self) -> f64 {
        1.25
    }

    fn narrative(&self, c: &Coverage) -> Narrative {
        match c.readiness {
            Readiness::Underprepared => Narrative::new(
                "Your essential expenses exceed your income. Your baseline is structurally negative.",
                format!(
                    "Increase monthly income by at least {} to stop the shortfall.",
                    money(c.essentials - c.income)
                ),
                format!(
                    "To reach stable buffer, increase income by {} or reduce essentials by the same amount.",
                    money(c.income_lift())
                ),
            ),
            Readiness::Borderline => Narrative::new(
                "Your essentials are covered, but your buffer is thin. Normal variability can push you behind.",
                format!("Build buffer: increase income by {} to reach stable coverage.", money(c.income_lift())),
                format!(
                    "Or reduce essential expenses by {} to reach the same stability threshold.",
                    money(c.essentials_cut())
                ),
            ),
            Readiness::Stable => Narrative::new(
                "Your income covers essentials with clear margin. Your baseline is viable under normal conditions.",
                format!(
                    "Keep essentials steady. Preserve at least {} of monthly buffer above the stability threshold.",
                    money((c.income - c.essentials * c.threshold).max(0.0))
                ),
                format!(
                    "Direct at least {} of your monthly margin into one goal (debt reduction or cash buffer).",
                    money((c.margin() * 0.5).round().max(0.0))
                ),
            ),
        }
    }
}

pub struct CoveragePolicy;

impl ScoringPolicy for CoveragePolicy {
    fn name(&self) -> &'static str {
        "coverage"
    }

    fn stable_threshold(&self) -> f64 {
        1.2
    }

    fn narrative(&self, c: &Coverage) -> Narrative {
        match c.readiness {
            Readiness::Underprepared => Narrative::new(
                "Your essentials exceed your income, so the baseline system cannot hold without a structural change.",
                "Target the biggest essential driver first and reduce it.",
                "Restructure minimum payments or raise reliable income to restore coverage.",
            ),
            Readiness::Borderline => Narrative::new(
                "Your income covers essentials, but the margin is thin and normal variance can create pressure.",
                "Reduce the largest essential driver by a small fixed amount.",
                "Increase reliable income or cut a fixed obligation to build buffer.",
            ),
            Readiness::Stable => Narrative::new(
                "Your income comfortably covers essentials, giving you buffer for normal variability.",
                "Protect your buffer by keeping fixed costs from creeping up.",
                "Allocate the surplus deliberately so it does not disappear by default.",
            ),
        }
    }
}

pub struct ReadinessCheckPolicy;

impl ScoringPolicy for ReadinessCheckPolicy {
    fn name(&self) -> &'static str {
        "readiness-check"
    }

    fn stable_threshold(&self) -> f64 {
        1.2
    }

    fn narrative(&self, c: &Coverage) -> Narrative {
        match c.readiness {
            Readiness::Underprepared => Narrative::new(
                "Essentials exceed income. The base month is structurally short until the gap is closed.",
                "Close the immediate monthly gap by increasing income, reducing essentials, or both, until the ratio reaches at least 1.00.",
                "Identify the largest essential driver and apply one direct change there before trying multiple small cuts.",
            ),
            Readiness::Borderline => Narrative::new(
                "Income covers essentials, but margin is thin. One meaningful change is needed to move into stable territory.",
                "Target one major essential driver and reduce it, or increase stable income, until the ratio reaches at least 1.20.",
                "Avoid adding new fixed costs until margin improves; treat any new commitment as a ratio test first.",
            ),
            Readiness::Stable => Narrative::new(
                "Income covers essentials with usable margin. Protect the ratio and build a buffer.",
                "Lock the current essentials baseline and avoid new fixed commitments that shrink margin.",
                "Build a buffer using the surplus above essentials before attempting major lifestyle upgrades.",
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lever {
    pub label: &'static str,
    pub amount: f64,
    pub share_percent: f64,
    /// Cut on this lever alone that would reach the stable threshold, capped at its amount.
    pub single_lever_change: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scenario {
    pub name: &'static str,
    pub coverage: Coverage,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StressTest {
    pub buffer_target: f64,
    pub levers: Vec<Lever>,
    pub scenarios: Vec<Scenario>,
    pub combined_split: Vec<(&'static str, f64)>,
    pub plan: Vec<String>,
}

/// Conservative variant: discounted income, padded costs, buffer sizing and stress scenarios.
pub struct ProPolicy;

impl ProPolicy {
    const SCENARIOS: [(&'static str, f64, f64); 3] = [
        ("Income stress (10% drop)", 0.90, 1.0),
        ("Cost stress (10% increase)", 1.0, 1.10),
        ("Combined stress (7% + 7%)", 0.93, 1.07),
    ];

    fn levers(&self, household: &Household, coverage: &Coverage) -> Vec<Lever> {
        let fixed_total = household.essentials() + household.commitments;
        let denom = fixed_total.max(1.0);
        let mut candidates: Vec<(&'static str, f64)> = household
            .expenses
            .iter()
            .map(|e| (e.label, e.amount))
            .chain(std::iter::once(("Commitments", household.commitments)))
            .filter(|(_, amount)| *amount > 0.0)
            .collect();
        candidates.sort_by(|a, b| b.1.total_cmp(&a.1));
        candidates
            .into_iter()
            .take(MAX_LEVERS)
            .map(|(label, amount)| Lever {
                label,
                amount,
                share_percent: amount / denom * 100.0,
                single_lever_change: clamp(coverage.essentials_cut(), 0.0, amount),
            })
            .collect()
    }

    fn buffer_target(&self, household: &Household, adjusted_essentials: f64) -> f64 {
        let confidence_factor = 100.0 / household.confidence_percent;
        let variability_factor = 1.0 + household.variability * 0.5;
        adjusted_essentials * household.buffer_months * confidence_factor * variability_factor
    }
}

impl ScoringPolicy for ProPolicy {
    fn name(&self) -> &'static str {
        "pro"
    }

    fn stable_threshold(&self) -> f64 {
        1.25
    }

    fn income_basis(&self, h: &Household) -> f64 {
        h.income * h.reliability * (1.0 - h.variability)
    }

    fn essentials_basis(&self, h: &Household) -> f64 {
        (h.essentials() + h.commitments) * (1.0 + h.error_margin)
    }

    fn narrative(&self, c: &Coverage) -> Narrative {
        let second = if c.income_lift() > 0.0 {
            "Do not add new fixed commitments until the Combined stress scenario remains Stable."
        } else {
            "Maintain Stable by protecting conservative income against variability and reliability slippage."
        };
        Narrative::new(
            format!(
                "{}. Conservative coverage ratio is {} with a monthly margin of {}.",
                c.readiness.label(),
                format_ratio(c.ratio),
                money(c.margin())
            ),
            format!(
                "To reach Stable: increase income by {} or reduce essentials by {}.",
                money(c.income_lift()),
                money(c.essentials_cut())
            ),
            second,
        )
    }

    fn stress_test(&self, household: &Household, coverage: &Coverage) -> Option<StressTest> {
        let levers = self.levers(household, coverage);
        let scenarios = Self::SCENARIOS
            .iter()
            .map(|&(name, income_factor, cost_factor)| Scenario {
                name,
                coverage: Coverage::assess(
                    coverage.income * income_factor,
                    coverage.essentials * cost_factor,
                    coverage.threshold,
                ),
            })
            .collect();

        let top: Vec<&Lever> = levers.iter().take(3).collect();
        let top_sum: f64 = top.iter().map(|l| l.amount).sum();
        let combined_split: Vec<(&'static str, f64)> = top
            .iter()
            .map(|l| {
                let portion = if top_sum > 0.0 { l.amount / top_sum } else { 0.0 };
                (l.label, clamp(coverage.essentials_cut() * portion, 0.0, l.amount))
            })
            .collect();
        let buffer_target = self.buffer_target(household, coverage.essentials);

        let mut plan = Vec::new();
        if coverage.income_lift() > 0.0 {
            plan.push(format!(
                "Close the Stable gap by increasing conservative income by {} if costs cannot move enough.",
                money(coverage.income_lift())
            ));
        } else {
            plan.push("Maintain Stable by protecting conservative income against variability and reliability slippage.".to_string());
        }
        if coverage.essentials_cut() > 0.0 {
            if let Some(first) = levers.first() {
                plan.push(format!(
                    "Start with {} because it has the largest share. Target {} change for a single lever route.",
                    first.label,
                    money(first.single_lever_change)
                ));
            }
            if !combined_split.is_empty() {
                plan.push(format!(
                    "Use the combined split route for feasibility: {}.",
                    split_text(&combined_split)
                ));
            }
        }
        plan.push("Do not add new fixed commitments until the Combined stress scenario remains Stable.".to_string());
        if household.buffer_months > 0.0 {
            plan.push(format!(
                "Build the buffer target of {} using your selected buffer depth of {:.1} months.",
                money(buffer_target),
                household.buffer_months
            ));
        } else {
            plan.push("Set a non-zero buffer depth to generate a buffer target and reduce fragility.".to_string());
        }
        plan.push("Re-run this tool after changes to housing, transport, commitments, or reliability to confirm the Stable gap stays closed.".to_string());

        Some(StressTest {
            buffer_target,
            levers,
            scenarios,
            combined_split,
            plan,
        })
    }
}

fn split_text(split: &[(&'static str, f64)]) -> String {
    split
        .iter()
        .map(|(label, amount)| format!("{} {}", label, money(*amount)))
        .collect::<Vec<_>>()
        .join(", ")
}

pub const POLICY_NAMES: [&str; 4] = ["basic", "coverage", "readiness-check", "pro"];

pub fn policy_by_name(name: &str) -> Option<Box<dyn ScoringPolicy>> {
    match name.trim().to_lowercase().replace('_', "-").as_str() {
        "basic" => Some(Box::new(BasicPolicy)),
        "coverage" => Some(Box::new(CoveragePolicy)),
        "readiness-check" | "readiness" => Some(Box::new(ReadinessCheckPolicy)),
        "pro" | "planner-pro" => Some(Box::new(ProPolicy)),
        _ => None,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EssentialsResult {
    pub policy: &'static str,
    pub household: Household,
    pub coverage: Coverage,
    pub narrative: Narrative,
    pub drivers: Vec<&'static str>,
    pub stress: Option<StressTest>,
}

pub fn assess(household: Household, policy: &dyn ScoringPolicy) -> EssentialsResult {
    let coverage = Coverage::assess(
        policy.income_basis(&household),
        policy.essentials_basis(&household),
        policy.stable_threshold(),
    );
    let stress = policy.stress_test(&household, &coverage);
    EssentialsResult {
        policy: policy.name(),
        narrative: policy.narrative(&coverage),
        drivers: household.top_drivers(3),
        household,
        coverage,
        stress,
    }
}

pub fn calculate(input: &EssentialsInput, defaults: &EssentialsDefaults) -> CalcResult<EssentialsResult> {
    let name = input.policy.as_deref().unwrap_or(defaults.policy.as_str());
    let policy = policy_by_name(name).ok_or_else(|| {
        CalcError::out_of_range("Select a scoring policy: basic, coverage, readiness-check or pro.")
    })?;
    let household = input.household(defaults)?;
    Ok(assess(household, policy.as_ref()))
}

impl EssentialsResult {
    pub fn to_report(&self, calculator: &str) -> Report {
        let c = &self.coverage;
        let drivers = if self.drivers.is_empty() {
            "None identified".to_string()
        } else {
            self.drivers.join(", ")
        };
        let summary = Section::titled("Result")
            .field("Headline", c.headline())
            .field("Interpretation", self.narrative.interpretation.clone())
            .field("Income", money(self.household.income))
            .field("Essentials", money(self.household.essentials()))
            .field("Action 1", self.narrative.actions[0].clone())
            .field("Action 2", self.narrative.actions[1].clone())
            .field("Top drivers", drivers)
            .field("Scoring policy", self.policy);
        let mut report = Report::success(calculator, "Income vs Essentials").with_section(summary);

        if let Some(stress) = &self.stress {
            let h = &self.household;
            let conservative = Section::titled("Conservative view")
                .field("Classification", format!("{} (based on conservative coverage)", c.readiness.label()))
                .field("Adjusted essentials", money(c.essentials))
                .field("Conservative income", money(c.income))
                .field("Coverage ratio", format_ratio(c.ratio))
                .field("Monthly margin", money(c.margin()))
                .field(
                    "Targets",
                    format!(
                        "Stable threshold is {}. Income increase target is {}. Essentials decrease target is {}.",
                        format_ratio(c.threshold),
                        money(c.income_lift()),
                        money(c.essentials_cut())
                    ),
                )
                .field(
                    "Buffer target",
                    format!(
                        "Buffer target is {} based on {:.1} months, confidence {}%, error margin {}%, and variability {}%.",
                        money(stress.buffer_target),
                        h.buffer_months,
                        h.confidence_percent.round(),
                        (h.error_margin * 100.0).round(),
                        (h.variability * 100.0).round()
                    ),
                );
            report = report.with_section(conservative);

            let mut levers = Table::new(["Lever", "Amount", "Share", "Single lever change"]);
            for lever in &stress.levers {
                levers.push_row([
                    lever.label.to_string(),
                    money(lever.amount),
                    format!("{}%", format_two_decimals(lever.share_percent)),
                    money(lever.single_lever_change),
                ]);
            }
            let combined = if stress.combined_split.is_empty() {
                "Add at least one positive lever amount to generate a combined correction option.".to_string()
            } else {
                format!(
                    "Split the essentials decrease target across top levers: {}.",
                    split_text(&stress.combined_split)
                )
            };
            report = report.with_section(
                Section::titled("Levers")
                    .table(levers)
                    .field("Combined correction", combined),
            );

            let mut scenarios = Table::new([
                "Scenario",
                "Classification",
                "Coverage ratio",
                "Income increase",
                "Essentials decrease",
            ]);
            for s in &stress.scenarios {
                scenarios.push_row([
                    s.name.to_string(),
                    s.coverage.readiness.label().to_string(),
                    format_ratio(s.coverage.ratio),
                    money(s.coverage.income_lift()),
                    money(s.coverage.essentials_cut()),
                ]);
            }
            report = report.with_section(Section::titled("Stress scenarios").table(scenarios));

            let plan = stress
                .plan
                .iter()
                .fold(Section::titled("Plan"), |section, step| section.note(step.clone()));
            report = report.with_section(plan);
        }
        report
    }
}

pub struct EssentialsCalculator;

impl Calculator for EssentialsCalculator {
    fn name(&self) -> &str {
        "income-vs-essentials"
    }

    fn description(&self) -> &str {
        "Income coverage of essential costs, scored by a named policy"
    }

    fn run(&self, params: &Value, defaults: &Defaults) -> CalcResult<Report> {
        let input: EssentialsInput = decode(params)?;
        Ok(calculate(&input, &defaults.essentials)?.to_report(self.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EssentialsInput {
        EssentialsInput {
            income: Some(30_000.0),
            housing: Some(12_000.0),
            utilities: Some(2_500.0),
            groceries: Some(5_000.0),
            transport: Some(3_000.0),
            debt_minimums: Some(2_000.0),
            ..Default::default()
        }
    }

    fn with_policy(mut input: EssentialsInput, policy: &str) -> EssentialsInput {
        input.policy = Some(policy.to_string());
        input
    }

    #[test]
    fn test_basic_borderline_actions() {
        let result = calculate(&sample(), &EssentialsDefaults::default()).unwrap();
        assert_eq!(result.policy, "basic");
        assert_eq!(result.coverage.readiness, Readiness::Borderline);
        assert_eq!(result.coverage.headline(), "Readiness: Borderline (1.22× coverage)");
        assert_eq!(
            result.narrative.actions[0],
            "Build buffer: increase income by 625 to reach stable coverage."
        );
        assert_eq!(
            result.narrative.actions[1],
            "Or reduce essential expenses by 500 to reach the same stability threshold."
        );
        assert_eq!(result.drivers, vec!["Housing", "Groceries and supplies", "Transport"]);
    }

    #[test]
    fn test_policies_disagree_on_the_same_household() {
        let coverage = calculate(&with_policy(sample(), "coverage"), &EssentialsDefaults::default()).unwrap();
        assert_eq!(coverage.coverage.readiness, Readiness::Stable);
        let readiness = calculate(&with_policy(sample(), "readiness_check"), &EssentialsDefaults::default()).unwrap();
        assert_eq!(readiness.policy, "readiness-check");
        assert_eq!(readiness.coverage.readiness, Readiness::Stable);
        assert!(readiness.narrative.interpretation.starts_with("Income covers essentials with usable margin"));
    }

    #[test]
    fn test_underprepared_and_stable_wording() {
        let input = EssentialsInput {
            income: Some(2_000.0),
            housing: Some(2_500.0),
            ..Default::default()
        };
        let result = calculate(&input, &EssentialsDefaults::default()).unwrap();
        assert_eq!(result.coverage.readiness, Readiness::Underprepared);
        assert_eq!(
            result.narrative.actions[0],
            "Increase monthly income by at least 500 to stop the shortfall."
        );
        assert_eq!(
            result.narrative.actions[1],
            "To reach stable buffer, increase income by 1,125 or reduce essentials by the same amount."
        );

        let input = EssentialsInput {
            income: Some(5_000.0),
            housing: Some(2_000.0),
            ..Default::default()
        };
        let result = calculate(&input, &EssentialsDefaults::default()).unwrap();
        assert_eq!(result.coverage.readiness, Readiness::Stable);
        assert_eq!(
            result.narrative.actions[0],
            "Keep essentials steady. Preserve at least 2,500 of monthly buffer above the stability threshold."
        );
        assert_eq!(
            result.narrative.actions[1],
            "Direct at least 1,500 of your monthly margin into one goal (debt reduction or cash buffer)."
        );
        assert_eq!(result.drivers, vec!["Housing"]);
    }

    #[test]
    fn test_classification_boundaries() {
        assert_eq!(Readiness::classify(0.99, 1.25), Readiness::Underprepared);
        assert_eq!(Readiness::classify(1.0, 1.25), Readiness::Borderline);
        assert_eq!(Readiness::classify(1.25, 1.25), Readiness::Stable);
    }

    #[test]
    fn test_validation() {
        let defaults = EssentialsDefaults::default();
        let err = calculate(&EssentialsInput { income: Some(1000.0), ..Default::default() }, &defaults);
        assert_eq!(err.unwrap_err().to_string(), "Essentials must be greater than 0.");

        let mut input = sample();
        input.income = Some(0.0);
        assert_eq!(
            calculate(&input, &defaults).unwrap_err().to_string(),
            "Enter a valid monthly take-home income greater than 0."
        );

        let mut input = sample();
        input.reliability = Some(0.4);
        assert_eq!(
            calculate(&input, &defaults).unwrap_err().to_string(),
            "Enter a valid income reliability factor between 0.50 and 1.00."
        );

        assert!(calculate(&with_policy(sample(), "lenient"), &defaults).is_err());
    }

    #[test]
    fn test_pro_conservative_view_and_scenarios() {
        let input = EssentialsInput {
            income: Some(10_000.0),
            housing: Some(4_000.0),
            utilities: Some(1_000.0),
            commitments: Some(1_000.0),
            reliability: Some(0.9),
            variability_percent: Some(10.0),
            error_margin_percent: Some(5.0),
            buffer_months: Some(3.0),
            policy: Some("pro".to_string()),
            ..Default::default()
        };
        let result = calculate(&input, &EssentialsDefaults::default()).unwrap();
        let c = result.coverage;
        assert!((c.income - 8_100.0).abs() < 1e-6);
        assert!((c.essentials - 6_300.0).abs() < 1e-6);
        assert_eq!(c.readiness, Readiness::Stable);

        let stress = result.stress.as_ref().unwrap();
        assert!((stress.buffer_target - 19_845.0).abs() < 1e-6);
        let classes: Vec<Readiness> = stress.scenarios.iter().map(|s| s.coverage.readiness).collect();
        assert_eq!(classes, vec![Readiness::Borderline; 3]);

        let labels: Vec<&str> = stress.levers.iter().map(|l| l.label).collect();
        assert_eq!(labels, vec!["Housing", "Utilities", "Commitments"]);
        assert!((stress.levers[0].share_percent - 66.666_666).abs() < 1e-3);
        // Already stable, so no single lever needs to move
        assert!(stress.levers.iter().all(|l| l.single_lever_change == 0.0));

        let report = result.to_report("income-vs-essentials");
        assert_eq!(report.field("Conservative income"), Some("8,100"));
        assert_eq!(report.field("Coverage ratio"), Some("1.29"));
        assert_eq!(report.sections.len(), 5);
    }

    #[test]
    fn test_pro_split_targets_largest_levers() {
        let input = EssentialsInput {
            income: Some(6_250.0),
            housing: Some(3_000.0),
            transport: Some(1_000.0),
            groceries: Some(1_000.0),
            policy: Some("pro".to_string()),
            ..Default::default()
        };
        let result = calculate(&input, &EssentialsDefaults::default()).unwrap();
        // Exactly at the threshold counts as stable
        assert_eq!(result.coverage.readiness, Readiness::Stable);

        let mut input = input;
        input.income = Some(5_500.0);
        let result = calculate(&input, &EssentialsDefaults::default()).unwrap();
        assert_eq!(result.coverage.readiness, Readiness::Borderline);
        let stress = result.stress.unwrap();
        // Cut of 5,000 - 5,500 / 1.25 = 600 split 3:1:1
        let split: Vec<(&str, f64)> = stress.combined_split.clone();
        assert_eq!(split[0].0, "Housing");
        assert!((split[0].1 - 360.0).abs() < 1e-6);
        assert!((split[1].1 - 120.0).abs() < 1e-6);
        assert!(stress.plan.iter().any(|p| p.starts_with("Use the combined split route")));
    }

    #[test]
    fn test_pro_threshold_between_coverage_and_basic() {
        // 1.22 coverage: stable for the 1.20 policies, borderline for pro
        let input = EssentialsInput {
            income: Some(6_100.0),
            housing: Some(5_000.0),
            ..Default::default()
        };
        let pro = calculate(&with_policy(input.clone(), "pro"), &EssentialsDefaults::default()).unwrap();
        assert_eq!(policy_by_name("pro").unwrap().stable_threshold(), 1.25);
        assert_eq!(pro.coverage.readiness, Readiness::Borderline);
        assert!((pro.coverage.income_lift() - 150.0).abs() < 1e-6);

        let coverage = calculate(&with_policy(input, "coverage"), &EssentialsDefaults::default()).unwrap();
        assert_eq!(coverage.coverage.readiness, Readiness::Stable);
    }

    #[test]
    fn test_run_with_form_strings() {
        let params = serde_json::json!({
            "income": "4,000",
            "housing": "1,500",
            "utilities": "",
            "policy": "coverage"
        });
        let report = EssentialsCalculator.run(&params, &Defaults::default()).unwrap();
        assert!(report.is_success());
        assert_eq!(report.field("Headline"), Some("Readiness: Stable (2.67× coverage)"));
        assert_eq!(report.field("Scoring policy"), Some("coverage"));
    }
}
