//! Plain-text rendering of normalized results.
//!
//! The presentation adapter for ad hoc preview: consumes the core's
//! plain data structures and produces a padded text table. The core has
//! no dependency on this module.

use crate::db::NormalizedResult;

/// Renders a normalized result as an aligned text table.
///
/// NULLs have already collapsed to the empty sentinel, so they render
/// as empty cells.
pub fn render_table(result: &NormalizedResult) -> String {
    if result.columns.is_empty() && result.rows.is_empty() {
        return "(no rows)\n".to_string();
    }

    let labels = result.column_labels();
    let width = labels.len().max(
        result
            .rows
            .first()
            .map(|r| r.len())
            .unwrap_or(labels.len()),
    );

    // Column widths from header and every cell
    let mut widths: Vec<usize> = (0..width)
        .map(|i| labels.get(i).map(|l| l.chars().count()).unwrap_or(0))
        .collect();
    for row in &result.rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
    }

    let mut out = String::new();
    if !labels.is_empty() {
        render_row(&mut out, &labels, &widths);
        let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        let separator_refs: Vec<&str> = separator.iter().map(String::as_str).collect();
        render_row(&mut out, &separator_refs, &widths);
    }
    for row in &result.rows {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        render_row(&mut out, &cells, &widths);
    }

    let noun = if result.row_count() == 1 { "row" } else { "rows" };
    out.push_str(&format!("({} {})\n", result.row_count(), noun));
    out
}

fn render_row(out: &mut String, cells: &[&str], widths: &[usize]) {
    for (i, width) in widths.iter().enumerate() {
        if i > 0 {
            out.push_str(" | ");
        }
        let cell = cells.get(i).copied().unwrap_or("");
        out.push_str(cell);
        for _ in cell.chars().count()..*width {
            out.push(' ');
        }
    }
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ColumnInfo, NormalizedResult};

    #[test]
    fn test_render_empty_result() {
        let result = NormalizedResult::new();
        assert_eq!(render_table(&result), "(no rows)\n");
    }

    #[test]
    fn test_render_table_aligns_columns() {
        let result = NormalizedResult::with_data(
            vec![
                ColumnInfo::new("id", "INT4"),
                ColumnInfo::new("name", "VARCHAR"),
            ],
            vec![
                vec!["1".to_string(), "Alice".to_string()],
                vec!["2".to_string(), "Bob".to_string()],
            ],
        );

        let rendered = render_table(&result);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "id | name ");
        assert_eq!(lines[1], "-- | -----");
        assert_eq!(lines[2], "1  | Alice");
        assert_eq!(lines[3], "2  | Bob  ");
        assert_eq!(lines[4], "(2 rows)");
    }

    #[test]
    fn test_render_headers_when_no_rows_returned() {
        let result = NormalizedResult::with_data(
            vec![
                ColumnInfo::new("id", "INT4"),
                ColumnInfo::new("name", "VARCHAR"),
            ],
            vec![],
        );

        let rendered = render_table(&result);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "id | name");
        assert_eq!(lines[1], "-- | ----");
        assert_eq!(lines[2], "(0 rows)");
    }

    #[test]
    fn test_render_null_as_empty_cell() {
        let result = NormalizedResult::with_data(
            vec![ColumnInfo::new("a", "TEXT"), ColumnInfo::new("b", "TEXT")],
            vec![vec!["".to_string(), "x".to_string()]],
        );

        let rendered = render_table(&result);
        assert!(rendered.contains("  | x"));
        assert!(rendered.contains("(1 row)"));
    }
}
