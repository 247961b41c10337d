// src/artifact/workbook.rs
//! Writes a [`SheetLayout`] to an `.xlsx` file.
//!
//! This module is the only place where workbook I/O happens. The file is
//! saved next to its target and renamed into place, so a failed write never
//! leaves a truncated workbook under the final name.

use super::layout::SheetLayout;
use super::paths::partial_path;
use crate::constants::{HEADER_FILL_RGB, HEADER_FONT_RGB};
use crate::error::AppError;
use crate::extraction::CellValue;
use crate::types::SheetName;
use rust_xlsxwriter::{Color, Format, FormatAlign, Workbook, Worksheet, XlsxError};
use std::fs;
use std::path::Path;

/// Saves the layout as a single-sheet workbook at `target`.
pub fn write_workbook(layout: &SheetLayout<'_>, target: &Path, sheet_name: &SheetName) -> Result<(), AppError> {
    let scratch = partial_path(target);
    let render_error = |message: String| AppError::Render {
        path: target.to_path_buf(),
        message,
    };

    let mut workbook = Workbook::new();
    fill_worksheet(workbook.add_worksheet(), layout, sheet_name)
        .map_err(|e| render_error(e.to_string()))?;

    if let Err(e) = workbook.save(&scratch) {
        discard(&scratch);
        return Err(render_error(format!("save failed: {}", e)));
    }

    if let Err(e) = fs::rename(&scratch, target) {
        discard(&scratch);
        return Err(render_error(format!("could not move workbook into place: {}", e)));
    }

    log::debug!(
        "Wrote {} row(s) x {} column(s) to {}",
        layout.total_rows(),
        layout.header.len(),
        target.display()
    );
    Ok(())
}

fn header_format() -> Format {
    Format::new()
        .set_bold()
        .set_font_color(Color::RGB(HEADER_FONT_RGB))
        .set_background_color(Color::RGB(HEADER_FILL_RGB))
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
}

fn fill_worksheet(
    worksheet: &mut Worksheet,
    layout: &SheetLayout<'_>,
    sheet_name: &SheetName,
) -> Result<(), WorksheetError> {
    worksheet.set_name(sheet_name.as_str())?;

    let header = header_format();
    for (index, name) in layout.header.iter().enumerate() {
        let col = column_number(index)?;
        worksheet.write_string_with_format(0, col, name.as_str(), &header)?;
    }

    for (row_index, row) in layout.rows.iter().enumerate() {
        let row_number = u32::try_from(row_index + 1).map_err(|_| WorksheetError::TooManyRows)?;
        for (index, value) in row.iter().enumerate() {
            write_cell(worksheet, row_number, column_number(index)?, value)?;
        }
    }

    for (index, width) in layout.widths.iter().enumerate() {
        worksheet.set_column_width(column_number(index)?, *width as f64)?;
    }

    Ok(())
}

/// Largest magnitude a spreadsheet number holds without rounding (2^53).
const MAX_EXACT_INTEGER: u64 = 1 << 53;

fn write_cell(worksheet: &mut Worksheet, row: u32, col: u16, value: &CellValue) -> Result<(), XlsxError> {
    match value {
        CellValue::Null => {}
        CellValue::Text(text) => {
            worksheet.write_string(row, col, text.as_str())?;
        }
        CellValue::Integer(i) if i.unsigned_abs() > MAX_EXACT_INTEGER => {
            worksheet.write_string(row, col, i.to_string())?;
        }
        CellValue::Integer(i) => {
            worksheet.write_number(row, col, *i as f64)?;
        }
        CellValue::Float(f) => {
            worksheet.write_number(row, col, *f)?;
        }
        CellValue::DateTime(_) => {
            worksheet.write_string(row, col, value.rendered())?;
        }
    }
    Ok(())
}

fn column_number(index: usize) -> Result<u16, WorksheetError> {
    u16::try_from(index).map_err(|_| WorksheetError::TooManyColumns)
}

fn discard(scratch: &Path) {
    if scratch.exists() {
        if let Err(e) = fs::remove_file(scratch) {
            log::warn!("Could not remove partial workbook {}: {}", scratch.display(), e);
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum WorksheetError {
    #[error("{0}")]
    Xlsx(#[from] XlsxError),
    #[error("result has more rows than a worksheet can hold")]
    TooManyRows,
    #[error("result has more columns than a worksheet can hold")]
    TooManyColumns,
}
