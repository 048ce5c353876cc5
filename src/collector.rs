use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use csv::{ReaderBuilder, Terminator, WriterBuilder};
use walkdir::WalkDir;

use crate::catalog::{CatalogClient, CatalogResource, staging_folder_for};
use crate::domain::FileFormat;
use crate::error::LandingError;
use crate::progress::{PipelineState, ProgressEvent, ProgressSink};
use crate::report::{CollectionReport, SkippedFile, StagedFile};
use crate::staging::{StagingFs, StagingLayout, join_path};

pub struct Collector<F: StagingFs, C: CatalogClient> {
    staging: F,
    catalog: C,
    layout: StagingLayout,
    data_dir: Utf8PathBuf,
    state: PipelineState,
}

impl<F: StagingFs, C: CatalogClient> Collector<F, C> {
    pub fn connect(
        staging: F,
        catalog: C,
        layout: StagingLayout,
        data_dir: Utf8PathBuf,
        sink: &dyn ProgressSink,
    ) -> Result<Self, LandingError> {
        let mut collector = Self {
            staging,
            catalog,
            layout,
            data_dir,
            state: PipelineState::Disconnected,
        };
        collector.transition(PipelineState::Connecting, sink);
        let root = collector.layout.root().to_string();
        let connected = collector.ensure_staging_dir(&root, sink);
        collector.settle(connected, sink)?;
        collector.transition(PipelineState::Connected, sink);
        Ok(collector)
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn staging(&self) -> &F {
        &self.staging
    }

    /// Creates `path` unless it already exists. Returns whether a directory was created.
    pub fn ensure_staging_dir(
        &self,
        path: &str,
        sink: &dyn ProgressSink,
    ) -> Result<bool, LandingError> {
        if self.staging.exists(path)? {
            sink.event(ProgressEvent::info(format!(
                "phase=Stage; directory {path} already exists"
            )));
            return Ok(false);
        }
        self.staging.make_dirs(path)?;
        sink.event(ProgressEvent::info(format!(
            "phase=Stage; directory {path} created"
        )));
        Ok(true)
    }

    pub fn upload_local_files(
        &mut self,
        format: FileFormat,
        staging_subdir: &str,
        sink: &dyn ProgressSink,
    ) -> Result<CollectionReport, LandingError> {
        let result = self.upload_local_files_inner(format, staging_subdir, sink);
        self.settle(result, sink)
    }

    pub fn harvest_remote_catalog(
        &mut self,
        dataset_id: &str,
        sink: &dyn ProgressSink,
    ) -> Result<CollectionReport, LandingError> {
        let result = self.harvest_inner(dataset_id, sink);
        self.settle(result, sink)
    }

    pub fn run(
        &mut self,
        dataset_id: &str,
        sink: &dyn ProgressSink,
    ) -> Result<CollectionReport, LandingError> {
        let mut report = CollectionReport::default();
        for format in [FileFormat::Csv, FileFormat::Json] {
            let subdir = self.layout.format_subdir(format).to_string();
            report.merge(self.upload_local_files(format, &subdir, sink)?);
        }
        report.merge(self.harvest_remote_catalog(dataset_id, sink)?);
        self.transition(PipelineState::Closed, sink);
        Ok(report)
    }

    fn upload_local_files_inner(
        &mut self,
        format: FileFormat,
        staging_subdir: &str,
        sink: &dyn ProgressSink,
    ) -> Result<CollectionReport, LandingError> {
        self.transition(PipelineState::Processing(format.to_string()), sink);
        let mut report = CollectionReport::default();
        let files = self.local_files(format, &mut report, sink);

        let format_dir = join_path(self.layout.root(), staging_subdir);
        self.ensure_staging_dir(&format_dir, sink)?;

        for path in files {
            match self.stage_local_file(&format_dir, format, &path, sink) {
                Ok(staged) => report.staged.push(staged),
                Err(err) if !err.is_fatal() => {
                    sink.event(ProgressEvent::warn(format!("skipping {path}: {err}")));
                    report.skipped.push(SkippedFile {
                        file: path.to_string(),
                        reason: err.to_string(),
                    });
                }
                Err(err) => return Err(err),
            }
        }
        Ok(report)
    }

    fn local_files(
        &self,
        format: FileFormat,
        report: &mut CollectionReport,
        sink: &dyn ProgressSink,
    ) -> Vec<Utf8PathBuf> {
        let mut files = Vec::new();
        for entry in WalkDir::new(self.data_dir.as_std_path()).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    sink.event(ProgressEvent::warn(format!("cannot scan data dir: {err}")));
                    report.skipped.push(SkippedFile {
                        file: self.data_dir.to_string(),
                        reason: err.to_string(),
                    });
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            match Utf8PathBuf::from_path_buf(entry.into_path()) {
                Ok(path) if path.extension() == Some(format.extension()) => files.push(path),
                Ok(_) => {}
                Err(path) => report.skipped.push(SkippedFile {
                    file: path.display().to_string(),
                    reason: "non-utf8 path".to_string(),
                }),
            }
        }
        files
    }

    fn stage_local_file(
        &self,
        format_dir: &str,
        format: FileFormat,
        path: &Utf8Path,
        sink: &dyn ProgressSink,
    ) -> Result<StagedFile, LandingError> {
        let (folder, file_name) = match (
            path.parent().and_then(Utf8Path::file_name),
            path.file_name(),
        ) {
            (Some(folder), Some(file_name)) => (folder, file_name),
            _ => {
                return Err(LandingError::InvalidFileName {
                    file: path.to_string(),
                    reason: "file has no parent folder".to_string(),
                });
            }
        };

        let content = fs::read(path.as_std_path()).map_err(|err| LandingError::LocalRead {
            path: path.to_string(),
            message: err.to_string(),
        })?;
        let normalized = match format {
            FileFormat::Csv => normalize_csv(file_name, &content)?,
            FileFormat::Json => normalize_json(file_name, &content)?,
        };

        let folder_dir = join_path(format_dir, folder);
        self.ensure_staging_dir(&folder_dir, sink)?;
        let staged_path = join_path(&folder_dir, file_name);
        self.staging.write_overwrite(&staged_path, &normalized)?;
        sink.event(ProgressEvent::info(format!(
            "phase=Stage; file {path} uploaded to {staged_path}"
        )));
        Ok(StagedFile {
            source: folder.to_string(),
            path: staged_path,
            bytes: normalized.len(),
        })
    }

    fn harvest_inner(
        &mut self,
        dataset_id: &str,
        sink: &dyn ProgressSink,
    ) -> Result<CollectionReport, LandingError> {
        self.transition(PipelineState::Processing(dataset_id.to_string()), sink);
        let resources = self.catalog.resources(dataset_id)?;
        sink.event(ProgressEvent::info(format!(
            "phase=Harvest; dataset {dataset_id} lists {} resources",
            resources.len()
        )));

        let mut report = CollectionReport::default();
        for resource in resources {
            match self.stage_resource(&resource, sink) {
                Ok(staged) => report.staged.push(staged),
                Err(err) if !err.is_fatal() => {
                    sink.event(ProgressEvent::warn(format!(
                        "skipping resource {}: {err}",
                        resource.name
                    )));
                    report.skipped.push(SkippedFile {
                        file: resource.name.clone(),
                        reason: err.to_string(),
                    });
                }
                Err(err) => return Err(err),
            }
        }
        Ok(report)
    }

    fn stage_resource(
        &self,
        resource: &CatalogResource,
        sink: &dyn ProgressSink,
    ) -> Result<StagedFile, LandingError> {
        let folder = staging_folder_for(&resource.name)?;
        let folder_dir = self.layout.source_dir(FileFormat::Csv, &folder);
        self.ensure_staging_dir(&folder_dir, sink)?;

        let content = self.catalog.download(&resource.url)?;
        let staged_path = join_path(&folder_dir, &resource.name);
        self.staging.write_overwrite(&staged_path, &content)?;
        sink.event(ProgressEvent::info(format!(
            "phase=Harvest; resource {} downloaded to {staged_path}",
            resource.url
        )));
        Ok(StagedFile {
            source: folder,
            path: staged_path,
            bytes: content.len(),
        })
    }

    fn transition(&mut self, next: PipelineState, sink: &dyn ProgressSink) {
        sink.event(ProgressEvent::info(format!(
            "collector: {} -> {next}",
            self.state
        )));
        self.state = next;
    }

    fn settle<T>(
        &mut self,
        result: Result<T, LandingError>,
        sink: &dyn ProgressSink,
    ) -> Result<T, LandingError> {
        if let Err(err) = &result {
            sink.event(ProgressEvent::error(format!("data collection failed: {err}")));
            self.transition(PipelineState::ClosedWithError, sink);
        }
        result
    }
}

pub fn normalize_csv(file_name: &str, content: &[u8]) -> Result<Vec<u8>, LandingError> {
    let malformed = |message: String| LandingError::MalformedCsv {
        file: file_name.to_string(),
        message,
    };
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content);
    let mut writer = WriterBuilder::new()
        .flexible(true)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::with_capacity(content.len()));
    for record in reader.records() {
        let record = record.map_err(|err| malformed(err.to_string()))?;
        writer
            .write_record(&record)
            .map_err(|err| malformed(err.to_string()))?;
    }
    writer
        .into_inner()
        .map_err(|err| malformed(err.to_string()))
}

pub fn normalize_json(file_name: &str, content: &[u8]) -> Result<Vec<u8>, LandingError> {
    let malformed = |message: String| LandingError::MalformedJson {
        file: file_name.to_string(),
        message,
    };
    let value: serde_json::Value =
        serde_json::from_slice(content).map_err(|err| malformed(err.to_string()))?;
    serde_json::to_vec(&value).map_err(|err| malformed(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_line_endings_are_normalized() {
        let normalized = normalize_csv("a.csv", b"Any,Nom\r\n2021,\"Sant Andreu, Nord\"\r\n").unwrap();
        assert_eq!(normalized, b"Any,Nom\n2021,\"Sant Andreu, Nord\"\n".to_vec());
    }

    #[test]
    fn json_whitespace_is_dropped() {
        let normalized = normalize_json("a.json", b"[ {\"a\" : 1} ]\n").unwrap();
        assert_eq!(normalized, b"[{\"a\":1}]".to_vec());
    }
}
