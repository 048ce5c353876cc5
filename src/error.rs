use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum LandingError {
    #[error("missing environment setting: {0}")]
    MissingSetting(String),

    #[error("invalid value for {name}: {message}")]
    InvalidSetting { name: String, message: String },

    #[error("failed to read local file {path}: {message}")]
    LocalRead { path: String, message: String },

    #[error("HDFS request failed: {0}")]
    HdfsHttp(String),

    #[error("HDFS returned status {status}: {message}")]
    HdfsStatus { status: u16, message: String },

    #[error("staging filesystem error: {0}")]
    Staging(String),

    #[error("failed to read staged file {path}: {message}")]
    StagedRead { path: String, message: String },

    #[error("HBase request failed: {0}")]
    HbaseHttp(String),

    #[error("HBase returned status {status}: {message}")]
    HbaseStatus { status: u16, message: String },

    #[error("HBase connection is closed")]
    StoreClosed,

    #[error("catalog request failed: {0}")]
    CatalogHttp(String),

    #[error("catalog returned status {status}: {message}")]
    CatalogStatus { status: u16, message: String },

    #[error("unexpected catalog payload: {0}")]
    CatalogPayload(String),

    #[error("invalid catalog resource name: {0}")]
    InvalidResourceName(String),

    #[error("malformed CSV in {file}: {message}")]
    MalformedCsv { file: String, message: String },

    #[error("malformed JSON in {file}: {message}")]
    MalformedJson { file: String, message: String },

    #[error("{file} line {line}: expected at least {expected} columns, found {found}")]
    ShortRow {
        file: String,
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("{file}: record {index} is missing field {field}")]
    MissingField {
        file: String,
        index: usize,
        field: String,
    },

    #[error("{0} has no header row")]
    EmptyFile(String),

    #[error("invalid file name {file}: {reason}")]
    InvalidFileName { file: String, reason: String },

    #[error("{file}: column family {family} is not defined on table {table}")]
    InvalidColumnFamily {
        file: String,
        family: String,
        table: String,
    },
}

impl LandingError {
    /// Connection-level failures end the run; everything else is scoped to one file.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LandingError::MissingSetting(_)
                | LandingError::InvalidSetting { .. }
                | LandingError::HdfsHttp(_)
                | LandingError::HdfsStatus { .. }
                | LandingError::Staging(_)
                | LandingError::HbaseHttp(_)
                | LandingError::HbaseStatus { .. }
                | LandingError::StoreClosed
                | LandingError::CatalogHttp(_)
        )
    }
}
