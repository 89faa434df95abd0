// Report renderers
pub mod csv_writer;
pub mod html;
pub mod json;
pub mod text;

use serde::{Deserialize, Serialize};
use shared::models::Report;

use crate::error::CalcResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Html,
    Json,
    #[default]
    Text,
    Csv,
}

/// Turns a finished report into one output format.
pub trait Renderer {
    fn render(&self, report: &Report) -> CalcResult<String>;
}

pub fn renderer_for(format: OutputFormat) -> Box<dyn Renderer> {
    match format {
        OutputFormat::Html => Box::new(html::HtmlRenderer),
        OutputFormat::Json => Box::new(json::JsonRenderer),
        OutputFormat::Text => Box::new(text::TextRenderer),
        OutputFormat::Csv => Box::new(csv_writer::CsvRenderer),
    }
}

pub fn render(report: &Report, format: OutputFormat) -> CalcResult<String> {
    renderer_for(format).render(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::Section;

    #[test]
    fn test_format_names_deserialize_lowercase() {
        let format: OutputFormat = serde_json::from_str("\"html\"").unwrap();
        assert_eq!(format, OutputFormat::Html);
        assert!(serde_json::from_str::<OutputFormat>("\"HTML\"").is_err());
        assert_eq!(OutputFormat::default(), OutputFormat::Text);
    }

    #[test]
    fn test_every_format_renders_error_reports() {
        let report = Report::error("mortgage-repayment", "Mortgage Repayment", "Enter a valid loan amount greater than 0.");
        for format in [OutputFormat::Html, OutputFormat::Json, OutputFormat::Text, OutputFormat::Csv] {
            let out = render(&report, format).unwrap();
            assert!(out.contains("Enter a valid loan amount greater than 0."), "{:?}: {}", format, out);
        }
    }

    #[test]
    fn test_every_format_renders_fields() {
        let report = Report::success("demo", "Demo").with_section(Section::titled("Result").field("Monthly payment", "1,073.64"));
        for format in [OutputFormat::Html, OutputFormat::Json, OutputFormat::Text, OutputFormat::Csv] {
            let out = render(&report, format).unwrap();
            assert!(out.contains("1,073.64"), "{:?}: {}", format, out);
        }
    }
}
