use std::io::Write;

use csv::WriterBuilder;
use rust_xlsxwriter::{Format, Workbook};

use crate::models::{Cell, ScheduleTable};
use crate::store::StoreError;

/// Write the schedule table as CSV. The first column carries the row label
/// and has an empty header; absent cells are written as "".
pub fn write_schedule_csv<W: Write>(table: &ScheduleTable, writer: W) -> Result<(), StoreError> {
    let mut wtr = WriterBuilder::new().from_writer(writer);

    let mut header = Vec::with_capacity(table.columns.len() + 1);
    header.push(String::new());
    header.extend(table.columns.iter().cloned());
    wtr.write_record(&header)?;

    for row in &table.rows {
        let mut record = Vec::with_capacity(row.cells.len() + 1);
        record.push(row.label.clone());
        record.extend(row.cells.iter().map(|c| c.display()));
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn schedule_csv_string(table: &ScheduleTable) -> Result<String, StoreError> {
    let mut buf = Vec::new();
    write_schedule_csv(table, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

pub const SHEET_NAME: &str = "Diving Schedule";

/// Render the schedule table as an .xlsx workbook with a single sheet.
/// Row labels go in column A; empty cells are left blank.
pub fn write_schedule_xlsx(table: &ScheduleTable) -> Result<Vec<u8>, StoreError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;
    sheet.set_column_width(0, 30)?;

    for (col, name) in table.columns.iter().enumerate() {
        sheet.write_string_with_format(0, (col + 1) as u16, name, &header)?;
    }

    for (idx, row) in table.rows.iter().enumerate() {
        let xl_row = (idx + 1) as u32;
        sheet.write_string_with_format(xl_row, 0, &row.label, &header)?;
        for (col, cell) in row.cells.iter().enumerate() {
            let xl_col = (col + 1) as u16;
            match cell {
                Cell::Empty => {}
                Cell::Number(n) => {
                    sheet.write_number(xl_row, xl_col, *n as f64)?;
                }
                Cell::Text(text) => {
                    sheet.write_string(xl_row, xl_col, text)?;
                }
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}
