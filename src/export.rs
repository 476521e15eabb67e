use crate::error::Result;
use crate::filter::{Sheet, View};
use crate::models::{Cell, Column, Dataset};
use calamine::{open_workbook, Data, Reader, Xlsx};
use rust_xlsxwriter::{Format, FormatAlign, Workbook, Worksheet};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

pub const ALL_STUDENTS_SHEET: &str = "All Students";
pub const FILTERED_STUDENTS_SHEET: &str = "Filtered Students";

const WIDTH_PADDING: usize = 2;
const WIDTH_SCALE: f64 = 1.2;

/// Renders each sheet in order into one workbook and returns the xlsx bytes.
pub fn export_views(sheets: &[Sheet<'_>]) -> Result<Vec<u8>> {
    let mut workbook = build_workbook(sheets)?;
    Ok(workbook.save_to_buffer()?)
}

/// "All Students" with every column, followed by "Filtered Students" when
/// `filtered` is given.
pub fn export_dataset(dataset: &Dataset, filtered: Option<View<'_>>) -> Result<Vec<u8>> {
    export_views(&dataset_sheets(dataset, filtered))
}

pub fn dataset_sheets<'a>(dataset: &'a Dataset, filtered: Option<View<'a>>) -> Vec<Sheet<'a>> {
    let mut sheets = vec![Sheet::new(ALL_STUDENTS_SHEET, View::full(dataset))];
    if let Some(view) = filtered {
        sheets.push(Sheet::new(FILTERED_STUDENTS_SHEET, view));
    }
    sheets
}

pub fn write_workbook(sheets: &[Sheet<'_>], output_path: &Path) -> Result<()> {
    let bytes = export_views(sheets)?;
    fs::write(output_path, bytes)?;
    info!(path = %output_path.display(), sheets = sheets.len(), "wrote workbook");
    Ok(())
}

/// Presentation shared by every cell: centered and wrapped, with the integer
/// number format on numeric marks.
pub(crate) struct CellFormats {
    plain: Format,
    number: Format,
}

impl CellFormats {
    pub(crate) fn new() -> Self {
        let plain = Format::new()
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter)
            .set_text_wrap();
        let number = plain.clone().set_num_format("0");
        Self { plain, number }
    }

    pub(crate) fn for_cell(&self, column: &Column, cell: &Cell<'_>) -> &Format {
        match cell {
            Cell::Number(_) if column.is_marks() => &self.number,
            _ => &self.plain,
        }
    }
}

/// `(longest cell text + padding) * scale`, header included in the longest.
pub(crate) fn column_width(max_len: usize) -> f64 {
    (max_len + WIDTH_PADDING) as f64 * WIDTH_SCALE
}

fn build_workbook(sheets: &[Sheet<'_>]) -> Result<Workbook> {
    let mut workbook = Workbook::new();
    let formats = CellFormats::new();

    for sheet in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(sheet.name.as_str())?;
        write_view(worksheet, &sheet.view, &formats)?;
        debug!(sheet = %sheet.name, rows = sheet.view.len(), "rendered sheet");
    }

    Ok(workbook)
}

fn write_view(worksheet: &mut Worksheet, view: &View<'_>, formats: &CellFormats) -> Result<()> {
    for (col_idx, column) in view.columns.iter().enumerate() {
        let col = col_idx as u16;
        let header = column.header();
        let mut max_len = header.chars().count();
        worksheet.write_string_with_format(0, col, &header, &formats.plain)?;

        for (row_idx, record) in view.records.iter().enumerate() {
            let row = (row_idx + 1) as u32;
            let cell = record.cell(column);
            max_len = max_len.max(cell.to_text().chars().count());
            let format = formats.for_cell(column, &cell);
            match cell {
                Cell::Number(n) => {
                    worksheet.write_number_with_format(row, col, n as f64, format)?;
                }
                Cell::Text(text) if !text.is_empty() => {
                    worksheet.write_string_with_format(row, col, text, format)?;
                }
                _ => {
                    worksheet.write_blank(row, col, format)?;
                }
            }
        }

        worksheet.set_column_width(col, column_width(max_len))?;
    }
    Ok(())
}

/// Writes a sheet as `<output_dir>/<prefix>_<sheet name>.csv`, or
/// `<output_dir>/<sheet name>.csv` when `prefix` is empty.
pub fn write_csv(sheet: &Sheet<'_>, output_dir: &Path, prefix: &str) -> Result<()> {
    let file_name = csv_file_name(&sheet.name, prefix);
    let mut writer = csv::Writer::from_path(output_dir.join(file_name))?;

    writer.write_record(sheet.view.headers())?;
    for record in &sheet.view.records {
        let row: Vec<String> = sheet
            .view
            .columns
            .iter()
            .map(|column| record.cell(column).to_text())
            .collect();
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}

fn csv_file_name(sheet_name: &str, prefix: &str) -> String {
    let sheet_name = sheet_name.replace(' ', "_");
    if prefix.is_empty() {
        format!("{}.csv", sheet_name)
    } else {
        format!("{}_{}.csv", prefix, sheet_name)
    }
}

/// The first sheet of an exported workbook, read back for display.
#[derive(Debug, Clone)]
pub struct WorkbookPreview {
    pub sheet_names: Vec<String>,
    pub columns: Vec<String>,
    pub total_rows: usize,
    pub rows: Vec<Vec<String>>,
}

pub fn preview_workbook(path: &Path, max_rows: usize) -> Result<WorkbookPreview> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let sheet_names = workbook.sheet_names();
    let Some(first) = sheet_names.first().cloned() else {
        return Ok(WorkbookPreview {
            sheet_names,
            columns: Vec::new(),
            total_rows: 0,
            rows: Vec::new(),
        });
    };

    let range = workbook.worksheet_range(&first)?;
    let mut rows = range.rows();
    let columns = rows
        .next()
        .map(|header| header.iter().map(cell_to_string).collect())
        .unwrap_or_default();
    let body: Vec<Vec<String>> = rows.map(|row| row.iter().map(cell_to_string).collect()).collect();

    Ok(WorkbookPreview {
        sheet_names,
        columns,
        total_rows: body.len(),
        rows: body.into_iter().take(max_rows).collect(),
    })
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        _ => cell.to_string().trim().to_string(),
    }
}
