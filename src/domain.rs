use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::LandingError;

pub const DATA_FAMILY: &str = "data";
pub const METADATA_FAMILY: &str = "metadata";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Csv,
    Json,
}

impl FileFormat {
    pub fn extension(self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Json => "json",
        }
    }

    pub fn matches(self, file_name: &str) -> bool {
        file_name.ends_with(&format!(".{}", self.extension()))
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    Income,
    VehicleIndex,
    LookupTables,
    Idealista,
}

impl SourceKind {
    pub const ALL: [SourceKind; 4] = [
        SourceKind::Income,
        SourceKind::VehicleIndex,
        SourceKind::LookupTables,
        SourceKind::Idealista,
    ];

    pub fn descriptor(self) -> SourceDescriptor {
        match self {
            SourceKind::Income => SourceDescriptor {
                kind: self,
                table: "opendatabcn-income",
                format: FileFormat::Csv,
                families: ColumnFamilies::Generic,
            },
            SourceKind::VehicleIndex => SourceDescriptor {
                kind: self,
                table: "veh_index_motoritzacio",
                format: FileFormat::Csv,
                families: ColumnFamilies::Generic,
            },
            SourceKind::LookupTables => SourceDescriptor {
                kind: self,
                table: "lookup_tables",
                format: FileFormat::Csv,
                families: ColumnFamilies::Joined,
            },
            SourceKind::Idealista => SourceDescriptor {
                kind: self,
                table: "idealista",
                format: FileFormat::Json,
                families: ColumnFamilies::Generic,
            },
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.descriptor().table)
    }
}

impl FromStr for SourceKind {
    type Err = LandingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        SourceKind::ALL
            .into_iter()
            .find(|kind| kind.descriptor().table == trimmed)
            .ok_or_else(|| LandingError::InvalidSetting {
                name: "source".to_string(),
                message: format!("unknown source {trimmed}"),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnFamilies {
    Generic,
    Joined,
}

impl ColumnFamilies {
    pub fn names(self) -> &'static [&'static str] {
        match self {
            ColumnFamilies::Generic => &[DATA_FAMILY, METADATA_FAMILY],
            ColumnFamilies::Joined => &["idealista_data", "income_data", METADATA_FAMILY],
        }
    }

    pub fn contains(self, family: &str) -> bool {
        self.names().contains(&family)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceDescriptor {
    pub kind: SourceKind,
    pub table: &'static str,
    pub format: FileFormat,
    pub families: ColumnFamilies,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub key: String,
    pub cells: BTreeMap<String, Vec<u8>>,
}

impl Row {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            cells: BTreeMap::new(),
        }
    }

    pub fn cell(mut self, family: &str, qualifier: &str, value: impl AsRef<[u8]>) -> Self {
        self.cells
            .insert(format!("{family}:{qualifier}"), value.as_ref().to_vec());
        self
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .get(column)
            .and_then(|value| std::str::from_utf8(value).ok())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub key: String,
    pub num_rows: usize,
    pub column_names: Vec<String>,
    pub ingested_at: String,
}

impl FileMetadata {
    pub fn to_row(&self) -> Row {
        Row::new(self.key.clone())
            .cell(METADATA_FAMILY, "num_rows", self.num_rows.to_string())
            .cell(
                METADATA_FAMILY,
                "num_cols",
                self.column_names.len().to_string(),
            )
            .cell(METADATA_FAMILY, "column_names", self.column_names.join(","))
            .cell(METADATA_FAMILY, "ingestion_date", &self.ingested_at)
    }
}

#[derive(Debug, Clone)]
pub struct FileBatch {
    pub rows: Vec<Row>,
    pub metadata: FileMetadata,
}
