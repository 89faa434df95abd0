// Helpers shared by the calculator service handlers.
use shared::models::Report;

use crate::error::CalcError;

/// "floor-joist-spacing" -> "Floor Joist Spacing"
pub fn display_title(name: &str) -> String {
    name.split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn error_report(calculator: &str, err: &CalcError) -> Report {
    Report::error(calculator, display_title(calculator), err.to_string())
}
