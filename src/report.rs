use serde::Serialize;

use crate::progress::PipelineState;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StagedFile {
    pub source: String,
    pub path: String,
    pub bytes: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SkippedFile {
    pub file: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CollectionReport {
    pub staged: Vec<StagedFile>,
    pub skipped: Vec<SkippedFile>,
}

impl CollectionReport {
    pub fn merge(&mut self, other: CollectionReport) {
        self.staged.extend(other.staged);
        self.skipped.extend(other.skipped);
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FileLoad {
    pub file: String,
    pub rows_written: usize,
    pub metadata_key: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableLoad {
    pub table: String,
    pub created: bool,
    pub files: Vec<FileLoad>,
    pub skipped: Vec<SkippedFile>,
}

impl TableLoad {
    pub fn rows_written(&self) -> usize {
        self.files.iter().map(|file| file.rows_written).sum()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub tables: Vec<TableLoad>,
    pub state: PipelineState,
}

impl LoadReport {
    pub fn skipped(&self) -> usize {
        self.tables.iter().map(|table| table.skipped.len()).sum()
    }
}
