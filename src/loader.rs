use crate::domain::{FileBatch, FileMetadata, SourceDescriptor, SourceKind};
use crate::error::LandingError;
use crate::hbase::ColumnStore;
use crate::progress::{PipelineState, ProgressEvent, ProgressSink};
use crate::report::{FileLoad, LoadReport, SkippedFile, TableLoad};
use crate::sources;
use crate::staging::{StagingFs, StagingLayout, join_path};

pub type FileOutcome<T> = (String, Result<T, LandingError>);

pub struct Loader<F: StagingFs, S: ColumnStore> {
    staging: F,
    store: S,
    layout: StagingLayout,
    state: PipelineState,
}

impl<F: StagingFs, S: ColumnStore> Loader<F, S> {
    pub fn connect(
        staging: F,
        store: S,
        layout: StagingLayout,
        sink: &dyn ProgressSink,
    ) -> Self {
        let mut loader = Self {
            staging,
            store,
            layout,
            state: PipelineState::Disconnected,
        };
        loader.transition(PipelineState::Connecting, sink);
        loader.transition(PipelineState::Connected, sink);
        loader
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn ensure_table(
        &self,
        descriptor: &SourceDescriptor,
        sink: &dyn ProgressSink,
    ) -> Result<bool, LandingError> {
        if self.store.table_exists(descriptor.table)? {
            sink.event(ProgressEvent::info(format!(
                "phase=Load; table '{}' already exists",
                descriptor.table
            )));
            return Ok(false);
        }
        self.store
            .create_table(descriptor.table, descriptor.families.names())?;
        sink.event(ProgressEvent::info(format!(
            "phase=Load; table '{}' created with families {}",
            descriptor.table,
            descriptor.families.names().join(",")
        )));
        Ok(true)
    }

    pub fn write_metadata_row(
        &self,
        table: &str,
        metadata: &FileMetadata,
    ) -> Result<(), LandingError> {
        let row = metadata.to_row();
        self.store.put(table, row.key.as_bytes(), &row.cells)
    }

    pub fn staged_files(&self, descriptor: &SourceDescriptor) -> Result<Vec<String>, LandingError> {
        let dir = self.layout.source_dir(descriptor.format, descriptor.table);
        if !self.staging.exists(&dir)? {
            return Ok(Vec::new());
        }
        let mut names = self
            .staging
            .list(&dir)?
            .into_iter()
            .filter(|name| descriptor.format.matches(name))
            .collect::<Vec<_>>();
        names.sort();
        Ok(names)
    }

    /// Reads each staged file of the source and hands its bytes to `handle`.
    ///
    /// Unreadable files and handler errors that are not fatal are returned per file; fatal
    /// ones stop the walk.
    pub fn for_each_staged_file<T, H>(
        &self,
        descriptor: &SourceDescriptor,
        mut handle: H,
    ) -> Result<Vec<FileOutcome<T>>, LandingError>
    where
        H: FnMut(&str, &[u8]) -> Result<T, LandingError>,
    {
        let dir = self.layout.source_dir(descriptor.format, descriptor.table);
        let mut outcomes = Vec::new();
        for name in self.staged_files(descriptor)? {
            let path = join_path(&dir, &name);
            let content = match self.staging.read_all(&path) {
                Ok(content) => content,
                Err(LandingError::HdfsStatus { status, message }) => {
                    outcomes.push((
                        name,
                        Err(LandingError::StagedRead {
                            path,
                            message: format!("status {status}: {message}"),
                        }),
                    ));
                    continue;
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    outcomes.push((name, Err(err)));
                    continue;
                }
            };
            match handle(&name, &content) {
                Err(err) if err.is_fatal() => return Err(err),
                outcome => outcomes.push((name, outcome)),
            }
        }
        Ok(outcomes)
    }

    pub fn write_batch(&self, table: &str, batch: &FileBatch) -> Result<usize, LandingError> {
        for row in &batch.rows {
            self.store.put(table, row.key.as_bytes(), &row.cells)?;
        }
        self.write_metadata_row(table, &batch.metadata)?;
        Ok(batch.rows.len())
    }

    pub fn load_source(
        &mut self,
        kind: SourceKind,
        sink: &dyn ProgressSink,
    ) -> Result<TableLoad, LandingError> {
        let descriptor = kind.descriptor();
        self.transition(PipelineState::Processing(descriptor.table.to_string()), sink);
        let result = self.load_source_inner(&descriptor, sink);
        self.settle(result, sink)
    }

    pub fn run(&mut self, sink: &dyn ProgressSink) -> Result<LoadReport, LandingError> {
        let mut tables = Vec::new();
        for kind in SourceKind::ALL {
            tables.push(self.load_source(kind, sink)?);
        }
        self.close(sink)?;
        Ok(LoadReport {
            tables,
            state: self.state.clone(),
        })
    }

    pub fn close(&mut self, sink: &dyn ProgressSink) -> Result<(), LandingError> {
        sink.event(ProgressEvent::info("closing HBase connection"));
        let closed = self.store.close();
        self.settle(closed, sink)?;
        self.transition(PipelineState::Closed, sink);
        Ok(())
    }

    fn load_source_inner(
        &self,
        descriptor: &SourceDescriptor,
        sink: &dyn ProgressSink,
    ) -> Result<TableLoad, LandingError> {
        let created = self.ensure_table(descriptor, sink)?;
        let table = descriptor.table;

        let outcomes = self.for_each_staged_file(descriptor, |name, content| {
            let batch = sources::transform(descriptor.kind, name, content, &ingestion_timestamp())?;
            let rows_written = self.write_batch(table, &batch)?;
            Ok(FileLoad {
                file: name.to_string(),
                rows_written,
                metadata_key: batch.metadata.key,
            })
        })?;

        let mut load = TableLoad {
            table: table.to_string(),
            created,
            files: Vec::new(),
            skipped: Vec::new(),
        };
        for (name, outcome) in outcomes {
            match outcome {
                Ok(file) => {
                    sink.event(ProgressEvent::info(format!(
                        "phase=Load; imported {} rows into table '{table}' from file: {name}",
                        file.rows_written
                    )));
                    load.files.push(file);
                }
                Err(err) => {
                    sink.event(ProgressEvent::warn(format!(
                        "phase=Load; skipping {name} for table '{table}': {err}"
                    )));
                    load.skipped.push(SkippedFile {
                        file: name,
                        reason: err.to_string(),
                    });
                }
            }
        }
        Ok(load)
    }

    fn transition(&mut self, next: PipelineState, sink: &dyn ProgressSink) {
        sink.event(ProgressEvent::info(format!("loader: {} -> {next}", self.state)));
        self.state = next;
    }

    fn settle<T>(
        &mut self,
        result: Result<T, LandingError>,
        sink: &dyn ProgressSink,
    ) -> Result<T, LandingError> {
        if let Err(err) = &result {
            sink.event(ProgressEvent::error(format!("persistence loading failed: {err}")));
            if let Err(close_err) = self.store.close() {
                sink.event(ProgressEvent::warn(format!(
                    "closing HBase connection failed: {close_err}"
                )));
            }
            self.transition(PipelineState::ClosedWithError, sink);
        }
        result
    }
}

pub fn ingestion_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
