pub mod idealista;
pub mod lookup;
pub mod neighborhood;

use csv::{ReaderBuilder, StringRecord};

use crate::domain::{FileBatch, SourceKind};
use crate::error::LandingError;

pub fn transform(
    kind: SourceKind,
    file_name: &str,
    content: &[u8],
    ingested_at: &str,
) -> Result<FileBatch, LandingError> {
    let descriptor = kind.descriptor();
    match kind {
        SourceKind::Income => neighborhood::transform(
            descriptor.table,
            neighborhood::INCOME_COLUMNS,
            file_name,
            content,
            ingested_at,
        ),
        SourceKind::VehicleIndex => neighborhood::transform(
            descriptor.table,
            neighborhood::VEHICLE_COLUMNS,
            file_name,
            content,
            ingested_at,
        ),
        SourceKind::LookupTables => lookup::transform(&descriptor, file_name, content, ingested_at),
        SourceKind::Idealista => {
            idealista::transform(descriptor.table, file_name, content, ingested_at)
        }
    }
}

#[derive(Debug)]
pub struct CsvSheet {
    pub file: String,
    pub header: Vec<String>,
    pub records: Vec<StringRecord>,
}

impl CsvSheet {
    pub fn parse(file_name: &str, content: &[u8]) -> Result<Self, LandingError> {
        let malformed = |err: csv::Error| LandingError::MalformedCsv {
            file: file_name.to_string(),
            message: err.to_string(),
        };

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(content);
        let mut records = reader.records();
        let header = match records.next() {
            Some(record) => record.map_err(malformed)?,
            None => return Err(LandingError::EmptyFile(file_name.to_string())),
        };
        let header = header
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                if idx == 0 {
                    name.trim_start_matches('\u{feff}').to_string()
                } else {
                    name.to_string()
                }
            })
            .collect();
        let records = records
            .collect::<Result<Vec<_>, _>>()
            .map_err(malformed)?;

        Ok(Self {
            file: file_name.to_string(),
            header,
            records,
        })
    }

    pub fn numbered(&self) -> impl Iterator<Item = (usize, &StringRecord)> {
        self.records
            .iter()
            .enumerate()
            .map(|(idx, record)| (idx + 2, record))
    }

    pub fn require_columns(
        &self,
        line: usize,
        record: &StringRecord,
        expected: usize,
    ) -> Result<(), LandingError> {
        if record.len() < expected {
            return Err(LandingError::ShortRow {
                file: self.file.clone(),
                line,
                expected,
                found: record.len(),
            });
        }
        Ok(())
    }
}

pub fn file_stem(file_name: &str) -> &str {
    file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(file_name)
}
