use chrono::{Datelike, NaiveDate};
use rust_xlsxwriter::{Color, ExcelDateTime, Format, FormatBorder, Workbook, Worksheet, XlsxError};
use std::path::Path;

use crate::error::ExportError;
use crate::models::{ColumnSpec, DATE_DISPLAY_FORMAT, DATE_PATTERN};
use crate::sanitize;
use crate::types::{DocumentMode, ResultTable};

const FONT_NAME: &str = "微软雅黑";
const FONT_SIZE: f64 = 12.0;
const ROW_HEIGHT: f64 = 15.0;
const ZEBRA_FILL: u32 = 0xF2F2F2;
const PLAIN_FILL: u32 = 0xFFFFFF;

/// What ends up in a data cell after column rules are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellValue {
    Text(String),
    Date(NaiveDate),
}

/// Apply the column's export rules: upper-case plate numbers, typed dates when the text parses.
pub fn cell_value(column: &ColumnSpec, raw: &str) -> CellValue {
    let text = sanitize::clean(raw);
    if column.date {
        if let Ok(date) = NaiveDate::parse_from_str(&text, DATE_PATTERN) {
            return CellValue::Date(date);
        }
    }
    if column.uppercase && !text.is_empty() {
        return CellValue::Text(text.to_uppercase());
    }
    CellValue::Text(text)
}

/// Estimate column width: 1.1 per ASCII char, 2.0 per other char, clamped to 10–50.
fn estimate_text_width(text: &str) -> f64 {
    let w = text.chars().map(|c| if c.is_ascii() { 1.1 } else { 2.0 }).sum::<f64>();
    w.clamp(10.0, 50.0)
}

fn column_widths(table: &ResultTable) -> Vec<f64> {
    let mut widths: Vec<f64> = table.schema.headers().map(estimate_text_width).collect();
    for row in &table.rows {
        for (w, cell) in widths.iter_mut().zip(row.cells()) {
            *w = w.max(estimate_text_width(cell));
        }
    }
    widths
}

fn sheet_name(mode: DocumentMode) -> &'static str {
    match mode {
        DocumentMode::License => "行驶证",
        DocumentMode::Invoice => "机动车销售发票",
    }
}

/// Write header plus rows to a new workbook at `destination`. Not retried on failure.
pub fn export_table(table: &ResultTable, destination: &Path) -> Result<(), ExportError> {
    if destination.as_os_str().is_empty() {
        return Err(ExportError::InvalidPath("empty output path".to_string()));
    }
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name(table.schema.mode))?;
    write_table(worksheet, table)?;
    workbook.save(destination)?;
    tracing::info!("Saved {} row(s) to {}", table.rows.len(), destination.display());
    Ok(())
}

fn write_table(worksheet: &mut Worksheet, table: &ResultTable) -> Result<(), XlsxError> {
    let base = Format::new()
        .set_font_name(FONT_NAME)
        .set_font_size(FONT_SIZE)
        .set_border(FormatBorder::Thin);
    let header_format = base.clone().set_bold();

    for (col, &w) in column_widths(table).iter().enumerate() {
        worksheet.set_column_width(col as u16, w)?;
    }
    for (col, header) in table.schema.headers().enumerate() {
        worksheet.write_string_with_format(0, col as u16, header, &header_format)?;
    }

    for (idx, row) in table.rows.iter().enumerate() {
        let excel_row = (idx + 1) as u32;
        // Alternate fills, starting with the shaded one on the first data row.
        let fill = if excel_row % 2 == 1 { ZEBRA_FILL } else { PLAIN_FILL };
        let text_format = base.clone().set_background_color(Color::RGB(fill));
        let date_format = text_format.clone().set_num_format(DATE_DISPLAY_FORMAT);

        for (col, (spec, raw)) in table.schema.columns.iter().zip(row.cells()).enumerate() {
            let col = col as u16;
            match cell_value(spec, raw) {
                CellValue::Date(date) => {
                    // Dates outside Excel's range fall back to text.
                    match ExcelDateTime::from_ymd(date.year() as u16, date.month() as u8, date.day() as u8) {
                        Ok(dt) => worksheet.write_datetime_with_format(excel_row, col, &dt, &date_format)?,
                        Err(_) => worksheet.write_string_with_format(excel_row, col, sanitize::clean(raw), &text_format)?,
                    };
                }
                CellValue::Text(text) => {
                    worksheet.write_string_with_format(excel_row, col, &text, &text_format)?;
                }
            }
        }
        worksheet.set_row_height(excel_row, ROW_HEIGHT)?;
        tracing::debug!("Writing row {}: {:?}", excel_row + 1, row.cells());
    }

    worksheet.set_freeze_panes(1, 0)?;
    Ok(())
}
