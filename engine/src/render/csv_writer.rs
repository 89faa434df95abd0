// CSV output. Every section table is written in order; a report without tables
// falls back to one label/value row per field.
use csv::WriterBuilder;
use shared::models::{Outcome, Report};

use super::Renderer;
use crate::error::{CalcError, CalcResult};

pub struct CsvRenderer;

impl Renderer for CsvRenderer {
    fn render(&self, report: &Report) -> CalcResult<String> {
        // Tables differ in width, so records are not forced to one length
        let mut writer = WriterBuilder::new().flexible(true).from_writer(Vec::new());

        if report.outcome == Outcome::Error {
            writer.write_record(["Error"])?;
            writer.write_record([report.message.as_deref().unwrap_or("")])?;
        } else {
            let tables: Vec<_> = report
                .sections
                .iter()
                .filter_map(|s| s.table.as_ref().map(|t| (s.heading.as_deref(), t)))
                .collect();
            if tables.is_empty() {
                writer.write_record(["Field", "Value"])?;
                for field in report.sections.iter().flat_map(|s| s.fields.iter()) {
                    writer.write_record([field.label.as_str(), field.value.as_str()])?;
                }
            } else {
                let titled = tables.len() > 1;
                for (heading, table) in tables {
                    if titled {
                        writer.write_record([heading.unwrap_or("Table")])?;
                    }
                    writer.write_record(&table.headers)?;
                    for row in &table.rows {
                        writer.write_record(row)?;
                    }
                }
            }
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| CalcError::Render(format!("CSV flush failed: {}", e)))?;
        String::from_utf8(bytes).map_err(|e| CalcError::Render(e.to_string()))
    }
}
