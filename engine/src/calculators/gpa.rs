// Cumulative GPA from course rows, optionally merged into an existing record,
// with target planning over future credits.
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::models::{Report, Section};
use shared::utils::round_to;

use super::{decode, Calculator};
use crate::config::settings::Defaults;
use crate::data::form;
use crate::error::{CalcError, CalcResult};

pub const SUPPORTED_SCALES: [f64; 4] = [4.0, 5.0, 7.0, 10.0];

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GpaDefaults {
    pub scale: f64,
    pub rounding_digits: u32,
}

impl Default for GpaDefaults {
    fn default() -> Self {
        Self {
            scale: 4.0,
            rounding_digits: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GpaMode {
    FromScratch,
    UpdateExisting,
}

impl GpaMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().replace('-', "_").as_str() {
            "from_scratch" | "fromscratch" => Some(GpaMode::FromScratch),
            "update_existing" | "updateexisting" => Some(GpaMode::UpdateExisting),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CourseRow {
    #[serde(default, deserialize_with = "form::optional_number")]
    pub credits: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub grade: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GpaInput {
    #[serde(default, deserialize_with = "form::optional_number")]
    pub scale: Option<f64>,
    #[serde(default)]
    pub courses: Vec<CourseRow>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub rounding_digits: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_text")]
    pub mode: Option<String>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub current_credits: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub current_gpa: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub target_gpa: Option<f64>,
    #[serde(default, deserialize_with = "form::optional_number")]
    pub planned_credits: Option<f64>,
}

/// Credits and quality points for a set of courses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Tally {
    pub credits: f64,
    pub quality_points: f64,
    pub courses: usize,
}

impl Tally {
    pub fn gpa(&self) -> f64 {
        if self.credits > 0.0 {
            self.quality_points / self.credits
        } else {
            0.0
        }
    }

    fn merge(&self, other: &Tally) -> Tally {
        Tally {
            credits: self.credits + other.credits,
            quality_points: self.quality_points + other.quality_points,
            courses: self.courses + other.courses,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TargetPlan {
    AlreadyAchievable,
    Reachable { required_average: f64 },
    NotReachable { required_average: f64 },
}

#[derive(Debug, Clone, Serialize)]
pub struct GpaResult {
    pub scale: f64,
    pub digits: u32,
    pub mode: GpaMode,
    pub new_courses: Tally,
    /// Existing record when updating with a known current GPA.
    pub previous: Option<(Tally, f64)>,
    pub cumulative: Tally,
    pub target: Option<(f64, f64, TargetPlan)>,
}

/// Sums the course rows. Rows with neither credits nor grade are skipped.
pub fn tally_courses(rows: &[CourseRow], scale: f64) -> CalcResult<Tally> {
    let mut tally = Tally::default();
    for row in rows {
        if row.credits.is_none() && row.grade.is_none() {
            continue;
        }
        let credits = match row.credits {
            Some(c) if c.is_finite() && c > 0.0 => c,
            _ => {
                return Err(CalcError::invalid(
                    "Enter a valid credits value greater than 0 for each course you include.",
                ))
            }
        };
        let grade = match row.grade {
            Some(g) if g.is_finite() && (0.0..=scale).contains(&g) => g,
            _ => {
                return Err(CalcError::invalid(
                    "Enter valid grade points between 0 and the selected scale maximum.",
                ))
            }
        };
        tally.credits += credits;
        tally.quality_points += credits * grade;
        tally.courses += 1;
    }
    if tally.courses == 0 {
        return Err(CalcError::invalid(
            "Add at least one course (credits and grade points) to calculate GPA.",
        ));
    }
    Ok(tally)
}

/// Average grade needed on `planned` future credits to lift `base` to `target`.
pub fn plan_target(base: &Tally, target: f64, planned: f64, scale: f64) -> TargetPlan {
    let needed = target * (base.credits + planned) - base.quality_points;
    let required_average = needed / planned;
    if required_average <= 0.0 {
        TargetPlan::AlreadyAchievable
    } else if required_average > scale {
        TargetPlan::NotReachable { required_average }
    } else {
        TargetPlan::Reachable { required_average }
    }
}

pub fn calculate(input: &GpaInput, defaults: &GpaDefaults) -> CalcResult<GpaResult> {
    let scale = input.scale.unwrap_or(defaults.scale);
    if !SUPPORTED_SCALES.contains(&scale) {
        return Err(CalcError::out_of_range("Select a GPA scale of 4, 5, 7 or 10."));
    }
    // Anything other than 3 or 4 digits uses the configured rounding
    let digits = match input.rounding_digits {
        Some(d) if d == 2.0 || d == 3.0 || d == 4.0 => d as u32,
        _ => defaults.rounding_digits.clamp(2, 4),
    };
    let mode = match input.mode.as_deref() {
        None => GpaMode::FromScratch,
        Some(raw) => GpaMode::parse(raw)
            .ok_or_else(|| CalcError::invalid("Select a mode: from_scratch or update_existing."))?,
    };

    let target = input.target_gpa.filter(|t| t.is_finite() && *t > 0.0);
    if let Some(t) = target {
        if t > scale {
            return Err(CalcError::out_of_range(
                "Target GPA must be between 0 and the selected scale maximum.",
            ));
        }
    }
    let planned = match input.planned_credits {
        None => None,
        Some(p) if p.is_finite() && p > 0.0 => Some(p),
        Some(_) => {
            return Err(CalcError::invalid(
                "Future credits must be a valid number greater than 0 if you enter it.",
            ))
        }
    };

    let mut previous = None;
    if mode == GpaMode::UpdateExisting {
        let completed = match input.current_credits {
            Some(c) if c.is_finite() && c > 0.0 => c,
            _ => {
                return Err(CalcError::invalid(
                    "Enter your total completed credits (a number greater than 0).",
                ))
            }
        };
        if let Some(gpa) = input.current_gpa {
            if !gpa.is_finite() || !(0.0..=scale).contains(&gpa) {
                return Err(CalcError::out_of_range(
                    "Current cumulative GPA must be between 0 and the selected scale maximum.",
                ));
            }
            let tally = Tally {
                credits: completed,
                quality_points: completed * gpa,
                courses: 0,
            };
            previous = Some((tally, gpa));
        }
    }

    let new_courses = tally_courses(&input.courses, scale)?;
    let cumulative = match &previous {
        Some((base, _)) => base.merge(&new_courses),
        None => new_courses,
    };

    let target = match (target, planned) {
        (Some(t), Some(p)) => Some((t, p, plan_target(&cumulative, t, p, scale))),
        _ => None,
    };

    Ok(GpaResult {
        scale,
        digits,
        mode,
        new_courses,
        previous,
        cumulative,
        target,
    })
}

fn fixed(value: f64, digits: u32) -> String {
    format!("{:.*}", digits as usize, round_to(value, digits))
}

impl GpaResult {
    pub fn rounded_gpa(&self) -> f64 {
        round_to(self.cumulative.gpa(), self.digits)
    }

    fn planning_line(&self) -> Option<String> {
        let (target, planned, plan) = self.target?;
        let d = self.digits;
        Some(match plan {
            TargetPlan::AlreadyAchievable => "Based on your inputs, your target GPA is already achievable without needing a positive average on future credits (mathematically).".to_string(),
            TargetPlan::NotReachable { required_average } => format!(
                "To reach {} with {} future credits, you would need an average of {}. That exceeds the selected scale maximum of {}, so the target is not reachable under these assumptions.",
                fixed(target, d),
                fixed(planned, 0),
                fixed(required_average, d),
                fixed(self.scale, 1)
            ),
            TargetPlan::Reachable { required_average } => format!(
                "To reach {} with {} future credits, you would need an average of {} on those future credits (on a {} scale).",
                fixed(target, d),
                fixed(planned, 0),
                fixed(required_average, d),
                fixed(self.scale, 1)
            ),
        })
    }

    pub fn to_report(&self, calculator: &str) -> Report {
        let d = self.digits;
        let scale = fixed(self.scale, 1);
        let mut section = Section::titled("Result");

        match (self.mode, &self.previous) {
            (GpaMode::FromScratch, _) => {
                section = section
                    .field("Cumulative GPA", format!("{} (on a {} scale)", fixed(self.cumulative.gpa(), d), scale))
                    .field("Total credits counted", fixed(self.cumulative.credits, 0))
                    .field("Total quality points", fixed(self.cumulative.quality_points, d))
                    .field("Courses included", self.cumulative.courses.to_string());
            }
            (GpaMode::UpdateExisting, None) => {
                section = section
                    .field("New courses GPA", format!("{} (on a {} scale)", fixed(self.new_courses.gpa(), d), scale))
                    .field("New credits counted", fixed(self.new_courses.credits, 0))
                    .field("New quality points", fixed(self.new_courses.quality_points, d))
                    .note("To calculate an updated cumulative GPA, enter your current cumulative GPA as well.");
            }
            (GpaMode::UpdateExisting, Some((_, before))) => {
                let after = self.cumulative.gpa();
                let delta = after - before;
                section = section
                    .field("Updated cumulative GPA", format!("{} (was {})", fixed(after, d), fixed(*before, d)))
                    .field("Change", format!("{}{}", if delta >= 0.0 { "+" } else { "" }, fixed(delta, d)))
                    .field("Total credits (after update)", fixed(self.cumulative.credits, 0))
                    .field("Total quality points (after update)", fixed(self.cumulative.quality_points, d))
                    .field("New courses GPA", fixed(self.new_courses.gpa(), d))
                    .field("New credits counted", fixed(self.new_courses.credits, 0));
            }
        }

        if let Some(line) = self.planning_line() {
            section = section.field("Target planning", line);
        }
        Report::success(calculator, "Cumulative GPA").with_section(section)
    }
}

pub struct GpaCalculator;

impl Calculator for GpaCalculator {
    fn name(&self) -> &str {
        "cumulative-gpa"
    }

    fn description(&self) -> &str {
        "Credit-weighted GPA with update and target planning modes"
    }

    fn run(&self, params: &Value, defaults: &Defaults) -> CalcResult<Report> {
        let input: GpaInput = decode(params)?;
        Ok(calculate(&input, &defaults.gpa)?.to_report(self.name()))
    }
}
