use shared::models::Report;

use super::Renderer;
use crate::error::{CalcError, CalcResult};

/// Pretty-printed serde form of the report.
pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn render(&self, report: &Report) -> CalcResult<String> {
        report
            .to_json_pretty()
            .map_err(|e| CalcError::Render(format!("JSON serialization failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::Section;

    #[test]
    fn test_json_reads_back() {
        let report = Report::success("cumulative-gpa", "Cumulative GPA")
            .with_section(Section::titled("Result").field("Cumulative GPA", "3.43 (on a 4.0 scale)"));
        let json = JsonRenderer.render(&report).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["outcome"], "success");
        assert_eq!(value["sections"][0]["fields"][0]["value"], "3.43 (on a 4.0 scale)");

        let back: Report = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }

    #[test]
    fn test_error_message_present() {
        let json = JsonRenderer.render(&Report::error("gpa", "GPA", "Add at least one course.")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["outcome"], "error");
        assert_eq!(value["message"], "Add at least one course.");
    }
}
