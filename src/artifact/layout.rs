// src/artifact/layout.rs
//! Pure worksheet layout: what goes in which cell and how wide each column
//! is. No I/O happens here.

use crate::constants::{COLUMN_WIDTH_PADDING, MAX_COLUMN_WIDTH};
use crate::extraction::{CellValue, QueryResult};

/// Width of one column given the widest value in it, header included.
pub fn column_width(max_content_length: usize) -> usize {
    (max_content_length + COLUMN_WIDTH_PADDING).min(MAX_COLUMN_WIDTH)
}

/// A worksheet ready to be written: a header row, the data rows in result
/// order, and one width per column.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetLayout<'a> {
    pub header: &'a [String],
    pub rows: &'a [Vec<CellValue>],
    pub widths: Vec<usize>,
}

impl<'a> SheetLayout<'a> {
    pub fn from_result(result: &'a QueryResult) -> Self {
        let widths = result
            .columns()
            .iter()
            .enumerate()
            .map(|(index, name)| {
                let widest_value = result
                    .rows()
                    .iter()
                    .map(|row| row[index].rendered_width())
                    .max()
                    .unwrap_or(0);
                column_width(widest_value.max(name.chars().count()))
            })
            .collect();

        Self {
            header: result.columns(),
            rows: result.rows(),
            widths,
        }
    }

    /// Header plus data rows.
    pub fn total_rows(&self) -> usize {
        1 + self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn result(columns: &[&str], rows: Vec<Vec<CellValue>>) -> QueryResult {
        QueryResult::new(columns.iter().map(|c| c.to_string()).collect(), rows).unwrap()
    }

    #[test]
    fn width_is_longest_value_plus_padding() {
        let r = result(
            &["ID", "NAME"],
            vec![
                vec![CellValue::from(1i64), "Alice".into()],
                vec![CellValue::from(22i64), "Bob".into()],
            ],
        );
        let layout = SheetLayout::from_result(&r);
        assert_eq!(layout.widths, vec![4, 7]);
    }

    #[test]
    fn header_counts_towards_width() {
        let r = result(&["PATIENT_NAME"], vec![vec!["Al".into()]]);
        assert_eq!(SheetLayout::from_result(&r).widths, vec![14]);
    }

    #[test]
    fn width_never_exceeds_cap() {
        let long = "x".repeat(500);
        let r = result(&["REMARK"], vec![vec![long.as_str().into()]]);
        assert_eq!(SheetLayout::from_result(&r).widths, vec![MAX_COLUMN_WIDTH]);
    }

    #[test]
    fn width_formula_holds_for_every_length() {
        for len in 0..120 {
            let value = "y".repeat(len);
            let r = result(&["C"], vec![vec![value.as_str().into()]]);
            let expected = (len.max(1) + 2).min(50);
            assert_eq!(SheetLayout::from_result(&r).widths, vec![expected], "len {}", len);
        }
    }

    #[test]
    fn empty_result_sizes_from_header() {
        let r = result(&["ID", "NAME"], vec![]);
        let layout = SheetLayout::from_result(&r);
        assert_eq!(layout.widths, vec![4, 6]);
        assert_eq!(layout.total_rows(), 1);
    }

    #[test]
    fn nulls_do_not_widen_columns() {
        let r = result(&["A"], vec![vec![CellValue::Null]]);
        assert_eq!(SheetLayout::from_result(&r).widths, vec![3]);
    }
}
