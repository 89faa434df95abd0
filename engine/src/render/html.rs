// HTML fragment in the shape of a calculator result panel.
use std::fmt::Write;

use shared::models::{Outcome, Report, Section, Table};

use super::Renderer;
use crate::error::{CalcError, CalcResult};

pub struct HtmlRenderer;

pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn write_table(out: &mut String, table: &Table) -> std::fmt::Result {
    writeln!(out, "<table class=\"result-table\">")?;
    write!(out, "<thead><tr>")?;
    for header in &table.headers {
        write!(out, "<th>{}</th>", escape(header))?;
    }
    writeln!(out, "</tr></thead>")?;
    writeln!(out, "<tbody>")?;
    for row in &table.rows {
        write!(out, "<tr>")?;
        for cell in row {
            write!(out, "<td>{}</td>", escape(cell))?;
        }
        writeln!(out, "</tr>")?;
    }
    writeln!(out, "</tbody>")?;
    writeln!(out, "</table>")
}

fn write_section(out: &mut String, section: &Section) -> std::fmt::Result {
    if let Some(heading) = &section.heading {
        writeln!(out, "<h4>{}</h4>", escape(heading))?;
    }
    for field in &section.fields {
        writeln!(out, "<p><strong>{}:</strong> {}</p>", escape(&field.label), escape(&field.value))?;
    }
    if let Some(table) = &section.table {
        write_table(out, table)?;
    }
    if !section.notes.is_empty() {
        writeln!(out, "<ul>")?;
        for note in &section.notes {
            writeln!(out, "<li>{}</li>", escape(note))?;
        }
        writeln!(out, "</ul>")?;
    }
    Ok(())
}

fn write_report(out: &mut String, report: &Report) -> std::fmt::Result {
    writeln!(out, "<div class=\"result {}\">", report.outcome.css_class())?;
    match report.outcome {
        Outcome::Error => {
            let message = report.message.as_deref().unwrap_or("Something went wrong.");
            writeln!(out, "<p>{}</p>", escape(message))?;
        }
        Outcome::Success => {
            writeln!(out, "<h3>{}</h3>", escape(&report.title))?;
            for section in &report.sections {
                write_section(out, section)?;
            }
        }
    }
    writeln!(out, "</div>")
}

impl Renderer for HtmlRenderer {
    fn render(&self, report: &Report) -> CalcResult<String> {
        let mut out = String::new();
        write_report(&mut out, report).map_err(|e| CalcError::Render(e.to_string()))?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_panel() {
        let mut table = Table::new(["Month", "Balance"]);
        table.push_row(["1", "9,900.00"]);
        let report = Report::success("amortization-schedule", "Amortization Schedule").with_section(
            Section::titled("Summary")
                .field("Monthly payment", "1,073.64")
                .table(table)
                .note("Figures are estimates."),
        );
        let html = HtmlRenderer.render(&report).unwrap();
        assert!(html.starts_with("<div class=\"result success\">"));
        assert!(html.contains("<p><strong>Monthly payment:</strong> 1,073.64</p>"));
        assert!(html.contains("<table class=\"result-table\">"));
        assert!(html.contains("<td>9,900.00</td>"));
        assert!(html.contains("<li>Figures are estimates.</li>"));
        assert!(html.trim_end().ends_with("</div>"));
    }

    #[test]
    fn test_error_panel_is_escaped() {
        let report = Report::error("demo", "Demo", "Value must be < 10 & > 0");
        let html = HtmlRenderer.render(&report).unwrap();
        assert!(html.starts_with("<div class=\"result error\">"));
        assert!(html.contains("<p>Value must be &lt; 10 &amp; &gt; 0</p>"));
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("<b>\"x\" & 'y'</b>"), "&lt;b&gt;&quot;x&quot; &amp; &#39;y&#39;&lt;/b&gt;");
        assert_eq!(escape("plain"), "plain");
    }
}
