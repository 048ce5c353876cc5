use crate::domain::{DATA_FAMILY, FileBatch, FileMetadata, Row};
use crate::error::LandingError;
use crate::sources::{CsvSheet, file_stem};

const YEAR: usize = 0;
const DISTRICT_CODE: usize = 1;
const NEIGHBORHOOD_CODE: usize = 3;

pub type ColumnMap = &'static [(&'static str, usize)];

pub const INCOME_COLUMNS: ColumnMap = &[
    ("District_Name", 2),
    ("Neighborhood_Name", 4),
    ("Population", 5),
    ("Index RFD Barcelona = 100", 6),
];

pub const VEHICLE_COLUMNS: ColumnMap = &[
    ("District_Name", 2),
    ("Neighborhood_Name", 4),
    ("Seccio_Censal", 5),
    ("Tipus_Vehicle", 6),
    ("Index_Motoritzacio", 7),
];

pub fn row_key(table: &str, district: &str, neighborhood: &str, year: &str) -> String {
    format!("{table}_{district}_{neighborhood}_{year}")
}

pub fn transform(
    table: &str,
    columns: ColumnMap,
    file_name: &str,
    content: &[u8],
    ingested_at: &str,
) -> Result<FileBatch, LandingError> {
    let sheet = CsvSheet::parse(file_name, content)?;
    let expected = columns
        .iter()
        .map(|(_, idx)| *idx)
        .chain([YEAR, DISTRICT_CODE, NEIGHBORHOOD_CODE])
        .max()
        .unwrap_or(0)
        + 1;

    let mut rows = Vec::with_capacity(sheet.records.len());
    let mut last_year = None;
    for (line, record) in sheet.numbered() {
        sheet.require_columns(line, record, expected)?;
        let year = &record[YEAR];
        let mut row = Row::new(row_key(
            table,
            &record[DISTRICT_CODE],
            &record[NEIGHBORHOOD_CODE],
            year,
        ));
        for (qualifier, idx) in columns {
            row = row.cell(DATA_FAMILY, qualifier, &record[*idx]);
        }
        rows.push(row);
        last_year = Some(year.to_string());
    }

    // A header-only file has no year to key on.
    let key_part = last_year.unwrap_or_else(|| file_stem(file_name).to_string());
    Ok(FileBatch {
        rows,
        metadata: FileMetadata {
            key: format!("{table}_{key_part}_metadata"),
            num_rows: sheet.records.len(),
            column_names: sheet.header,
            ingested_at: ingested_at.to_string(),
        },
    })
}
