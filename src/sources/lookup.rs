use crate::domain::{FileBatch, FileMetadata, Row, SourceDescriptor};
use crate::error::LandingError;
use crate::sources::CsvSheet;

const DISTRICT_ID: usize = 4;
const NEIGHBORHOOD_ID: usize = 7;

const COLUMNS: &[(&str, usize)] = &[
    ("district", 0),
    ("neighborhood", 1),
    ("district_n_reconciled", 2),
    ("district_n", 3),
    ("neighborhood_n_reconciled", 5),
    ("neighborhood_n", 6),
];

pub fn file_prefix(file_name: &str) -> &str {
    file_name.split('_').next().unwrap_or_default()
}

// `income_lookup_neighborhood.csv` writes into the `income_data` family.
pub fn column_family_for(
    descriptor: &SourceDescriptor,
    file_name: &str,
) -> Result<String, LandingError> {
    let prefix = file_prefix(file_name);
    let well_formed = !prefix.is_empty()
        && file_name.contains('_')
        && prefix.chars().all(|ch| ch.is_ascii_alphanumeric());
    if !well_formed {
        return Err(LandingError::InvalidFileName {
            file: file_name.to_string(),
            reason: "expected a `{source}_...` prefix".to_string(),
        });
    }

    let family = format!("{prefix}_data");
    if !descriptor.families.contains(&family) {
        return Err(LandingError::InvalidColumnFamily {
            file: file_name.to_string(),
            family,
            table: descriptor.table.to_string(),
        });
    }
    Ok(family)
}

pub fn row_key(table: &str, district_id: &str, neighborhood_id: &str) -> String {
    format!("{table}_{district_id}_{neighborhood_id}")
        .trim()
        .to_string()
}

pub fn transform(
    descriptor: &SourceDescriptor,
    file_name: &str,
    content: &[u8],
    ingested_at: &str,
) -> Result<FileBatch, LandingError> {
    let family = column_family_for(descriptor, file_name)?;
    let sheet = CsvSheet::parse(file_name, content)?;
    let table = descriptor.table;

    let mut rows = Vec::with_capacity(sheet.records.len());
    for (line, record) in sheet.numbered() {
        sheet.require_columns(line, record, NEIGHBORHOOD_ID + 1)?;
        let mut row = Row::new(row_key(
            table,
            &record[DISTRICT_ID],
            &record[NEIGHBORHOOD_ID],
        ));
        for (qualifier, idx) in COLUMNS {
            row = row.cell(&family, qualifier, &record[*idx]);
        }
        rows.push(row);
    }

    Ok(FileBatch {
        rows,
        metadata: FileMetadata {
            key: format!("{table}_{}_metadata", file_prefix(file_name)),
            num_rows: sheet.records.len(),
            column_names: sheet.header,
            ingested_at: ingested_at.to_string(),
        },
    })
}
