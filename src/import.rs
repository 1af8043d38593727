//! CSV ingestion of the desktop database export.

use std::io::Read;

use csv::{ReaderBuilder, StringRecord};
use tracing::info;

use crate::lookup::LookupKind;
use crate::models::BookingInput;
use crate::store::StoreError;

/// Header pairs written by the desktop export for each lookup table.
fn export_columns(kind: LookupKind) -> (&'static str, &'static str) {
    match kind {
        LookupKind::TourOperators => ("ID Tour", "Tour Operators"),
        LookupKind::Hotels => ("Hotel ID", "Hotel Name"),
        LookupKind::Countries => ("Country ID", "Country Name"),
    }
}

/// Read booking rows. Unknown columns are ignored and missing ones left empty.
pub fn read_bookings<R: Read>(reader: R) -> Result<Vec<BookingInput>, StoreError> {
    let mut rdr = ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let rows = rdr
        .deserialize::<BookingInput>()
        .collect::<Result<Vec<_>, _>>()?;
    info!(rows = rows.len(), "read booking export");
    Ok(rows)
}

/// Read an `id,name` lookup export. Columns are found by the export's own
/// header names, then by `id`/`name`, then by position.
pub fn read_lookup<R: Read>(
    kind: LookupKind,
    reader: R,
) -> Result<Vec<(String, String)>, StoreError> {
    let mut rdr = ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let (id_col, name_col) = lookup_columns(kind, &headers);

    let mut entries = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let (Some(id), Some(name)) = (record.get(id_col), record.get(name_col)) else {
            continue;
        };
        if id.is_empty() {
            continue;
        }
        entries.push((id.to_string(), name.to_string()));
    }
    info!(table = kind.table_name(), rows = entries.len(), "read lookup export");
    Ok(entries)
}

fn lookup_columns(kind: LookupKind, headers: &StringRecord) -> (usize, usize) {
    let position = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
    let (id_header, name_header) = export_columns(kind);

    let id_col = position(id_header).or_else(|| position("id")).unwrap_or(0);
    let name_col = position(name_header)
        .or_else(|| position("name"))
        .unwrap_or(if id_col == 0 { 1 } else { 0 });
    (id_col, name_col)
}
