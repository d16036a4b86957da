/// Command output
///
/// Commands print through a [`Printer`], which renders either aligned text
/// tables for people or pretty JSON for scripts (`--json`).
///
/// # Example
///
/// ```
/// use tenantdesk_cli::output::{OutputFormat, Printer};
///
/// let mut buf = Vec::new();
/// let mut printer = Printer::new(OutputFormat::Text, &mut buf);
/// printer
///     .table(&["NAME", "PLAN"], vec![vec!["Max".into(), "Pro".into()]], &serde_json::json!([]))
///     .unwrap();
///
/// let text = String::from_utf8(buf).unwrap();
/// assert!(text.starts_with("NAME  PLAN"));
/// ```

use serde::Serialize;
use std::io::{self, Write};

/// How results are written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Writes command results in the chosen format
pub struct Printer<'a> {
    format: OutputFormat,
    out: &'a mut dyn Write,
}

impl<'a> Printer<'a> {
    pub fn new(format: OutputFormat, out: &'a mut dyn Write) -> Self {
        Printer { format, out }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// A list: `rows` as a table, or `value` as JSON
    pub fn table<T: Serialize + ?Sized>(
        &mut self,
        headers: &[&str],
        rows: Vec<Vec<String>>,
        value: &T,
    ) -> io::Result<()> {
        match self.format {
            OutputFormat::Text if rows.is_empty() => writeln!(self.out, "No results"),
            OutputFormat::Text => write!(self.out, "{}", render_table(headers, &rows)),
            OutputFormat::Json => self.json(value),
        }
    }

    /// A single record: `fields` as `label: value` lines, or `value` as JSON
    pub fn record<T: Serialize + ?Sized>(
        &mut self,
        fields: &[(&str, String)],
        value: &T,
    ) -> io::Result<()> {
        match self.format {
            OutputFormat::Text => {
                let width = fields.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
                for (label, text) in fields {
                    writeln!(self.out, "{:<width$}  {}", format!("{}:", label), text, width = width + 1)?;
                }
                Ok(())
            }
            OutputFormat::Json => self.json(value),
        }
    }

    /// A one-line confirmation, or `value` as JSON
    pub fn message<T: Serialize + ?Sized>(&mut self, text: &str, value: &T) -> io::Result<()> {
        match self.format {
            OutputFormat::Text => writeln!(self.out, "{}", text),
            OutputFormat::Json => self.json(value),
        }
    }

    /// A line of text that is dropped in JSON mode
    pub fn note(&mut self, text: &str) -> io::Result<()> {
        match self.format {
            OutputFormat::Text => writeln!(self.out, "{}", text),
            OutputFormat::Json => Ok(()),
        }
    }

    /// Pretty JSON regardless of the format
    pub fn json<T: Serialize + ?Sized>(&mut self, value: &T) -> io::Result<()> {
        serde_json::to_writer_pretty(&mut *self.out, value)?;
        writeln!(self.out)
    }
}

/// Left-aligned columns separated by two spaces, without trailing padding
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let render_row = |cells: Vec<&str>| {
        let last = cells.len().saturating_sub(1);
        let mut line = String::new();
        for (i, cell) in cells.into_iter().enumerate() {
            line.push_str(cell);
            if i < last {
                let pad = widths[i] - cell.chars().count() + 2;
                line.extend(std::iter::repeat(' ').take(pad));
            }
        }
        line.push('\n');
        line
    };

    let mut table = render_row(headers.to_vec());
    for row in rows {
        table.push_str(&render_row(row.iter().take(headers.len()).map(String::as_str).collect()));
    }
    table
}

/// `-` for missing values
pub fn or_dash(value: Option<impl ToString>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn printed(format: OutputFormat, f: impl FnOnce(&mut Printer<'_>) -> io::Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut Printer::new(format, &mut buf)).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_render_table_aligns_columns() {
        let table = render_table(
            &["ID", "NAME", "STATUS"],
            &[
                vec!["1".into(), "Acme Fitness".into(), "active".into()],
                vec!["22".into(), "Bo".into(), "inactive".into()],
            ],
        );

        assert_eq!(
            table,
            "ID  NAME          STATUS\n\
             1   Acme Fitness  active\n\
             22  Bo            inactive\n"
        );
    }

    #[test]
    fn test_empty_table_says_so() {
        let text = printed(OutputFormat::Text, |p| p.table(&["ID"], vec![], &json!([])));
        assert_eq!(text, "No results\n");
    }

    #[test]
    fn test_json_mode_prints_value() {
        let text = printed(OutputFormat::Json, |p| {
            p.note("ignored")?;
            p.message("Deleted", &json!({ "deleted": true }))
        });

        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, json!({ "deleted": true }));
    }

    #[test]
    fn test_record_labels_are_aligned() {
        let text = printed(OutputFormat::Text, |p| {
            p.record(&[("Email", "a@b.test".into()), ("Role", "admin".into())], &json!({}))
        });
        assert_eq!(text, "Email:  a@b.test\nRole:   admin\n");
    }

    #[test]
    fn test_or_dash() {
        assert_eq!(or_dash(Some(3)), "3");
        assert_eq!(or_dash(None::<String>), "-");
    }
}
