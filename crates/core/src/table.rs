use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

/// A small in-memory table attached to content when no export file exists.
///
/// Cells are kept as display strings; the rendering stage is responsible for
/// number and date formatting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddedTable {
    /// Column headers.
    pub columns: Vec<String>,
    /// Rows of cells. Short rows are padded with empty cells when rendered.
    #[serde(default)]
    pub rows: Vec<Vec<String>>,
}

impl EmbeddedTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render the table as an aligned plain-text grid.
    ///
    /// The first column is a zero-based row index (left-aligned); data cells
    /// and headers are right-aligned and separated by two spaces.
    ///
    /// ```
    /// use herald_core::EmbeddedTable;
    ///
    /// let table = EmbeddedTable::new(
    ///     vec!["a".into(), "b".into()],
    ///     vec![vec!["1".into(), "x".into()], vec!["2".into(), "yy".into()]],
    /// );
    /// assert_eq!(table.to_text(), "   a   b\n0  1   x\n1  2  yy");
    /// ```
    pub fn to_text(&self) -> String {
        if self.rows.is_empty() {
            return format!(
                "Empty DataFrame\nColumns: [{}]\nIndex: []",
                self.columns.join(", ")
            );
        }

        let width_count = self
            .rows
            .iter()
            .map(Vec::len)
            .max()
            .unwrap_or(0)
            .max(self.columns.len());

        let mut widths = vec![0usize; width_count];
        for (i, header) in self.columns.iter().enumerate() {
            widths[i] = widths[i].max(header.chars().count());
        }
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
        let index_width = (self.rows.len() - 1).to_string().len();

        let mut out = String::new();
        out.push_str(&" ".repeat(index_width));
        for (i, width) in widths.iter().copied().enumerate() {
            let header = self.columns.get(i).map_or("", String::as_str);
            let _ = write!(out, "  {header:>width$}");
        }

        for (index, row) in self.rows.iter().enumerate() {
            out.push('\n');
            let _ = write!(out, "{index:<index_width$}");
            for (i, width) in widths.iter().copied().enumerate() {
                let cell = row.get(i).map_or("", String::as_str);
                let _ = write!(out, "  {cell:>width$}");
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_owned()).collect()
    }

    #[test]
    fn renders_aligned_grid() {
        let table = EmbeddedTable::new(
            cells(&["region", "total"]),
            vec![cells(&["north", "10"]), cells(&["south-east", "7"])],
        );
        let expected = "       region  total\n\
                        0       north     10\n\
                        1  south-east      7";
        assert_eq!(table.to_text(), expected);
    }

    #[test]
    fn index_column_grows_with_row_count() {
        let rows = (0..11).map(|i| vec![i.to_string()]).collect();
        let table = EmbeddedTable::new(cells(&["n"]), rows);
        let text = table.to_text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "     n");
        assert_eq!(lines[1], "0    0");
        assert_eq!(lines[11], "10  10");
    }

    #[test]
    fn ragged_rows_are_padded() {
        let table = EmbeddedTable::new(cells(&["a", "b"]), vec![cells(&["1"])]);
        assert_eq!(table.to_text(), "   a  b\n0  1   ");
    }

    #[test]
    fn empty_table_mentions_columns() {
        let table = EmbeddedTable::new(cells(&["a", "b"]), Vec::new());
        assert_eq!(
            table.to_text(),
            "Empty DataFrame\nColumns: [a, b]\nIndex: []"
        );
    }

    #[test]
    fn deserializes_without_rows() {
        let table: EmbeddedTable = serde_json::from_str(r#"{"columns":["x"]}"#).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.columns, vec!["x".to_owned()]);
    }
}
