// Plain terminal listing: title, headed sections, indented fields and aligned tables.
use std::fmt::Write;

use shared::models::{Outcome, Report, Table};
use unicode_width::UnicodeWidthStr;

use super::Renderer;
use crate::error::{CalcError, CalcResult};

pub struct TextRenderer;

// Display columns rather than chars; CJK glyphs take two
fn width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

fn pad_left(cell: &str, columns: usize) -> String {
    format!("{}{}", " ".repeat(columns.saturating_sub(width(cell))), cell)
}

fn write_table(out: &mut String, table: &Table) -> std::fmt::Result {
    let columns = table
        .rows
        .iter()
        .map(|r| r.len())
        .chain(std::iter::once(table.headers.len()))
        .max()
        .unwrap_or(0);
    let mut widths = vec![0usize; columns];
    for row in std::iter::once(&table.headers).chain(table.rows.iter()) {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(width(cell));
        }
    }

    let line = |out: &mut String, row: &[String]| -> std::fmt::Result {
        let cells: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| pad_left(cell, widths[i]))
            .collect();
        writeln!(out, "  {}", cells.join("  ").trim_end())
    };
    line(out, &table.headers)?;
    let rule: usize = widths.iter().sum::<usize>() + 2 * columns.saturating_sub(1);
    writeln!(out, "  {}", "-".repeat(rule))?;
    for row in &table.rows {
        line(out, row)?;
    }
    Ok(())
}

fn write_report(out: &mut String, report: &Report) -> std::fmt::Result {
    if report.outcome == Outcome::Error {
        let message = report.message.as_deref().unwrap_or("Something went wrong.");
        return writeln!(out, "Error: {}", message);
    }

    writeln!(out, "{}", report.title)?;
    writeln!(out, "{}", "=".repeat(width(&report.title)))?;
    for section in &report.sections {
        writeln!(out)?;
        if let Some(heading) = &section.heading {
            writeln!(out, "{}", heading)?;
        }
        for field in &section.fields {
            writeln!(out, "  {}: {}", field.label, field.value)?;
        }
        if let Some(table) = &section.table {
            write_table(out, table)?;
        }
        for note in &section.notes {
            writeln!(out, "  * {}", note)?;
        }
    }
    Ok(())
}

impl Renderer for TextRenderer {
    fn render(&self, report: &Report) -> CalcResult<String> {
        let mut out = String::new();
        write_report(&mut out, report).map_err(|e| CalcError::Render(e.to_string()))?;
        Ok(out)
    }
}
