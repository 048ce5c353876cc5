mod common;

use std::sync::atomic::Ordering;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use common::{MemoryStore, RecordingSink};
use temporal_landing_zone::domain::{FileFormat, SourceKind};
use temporal_landing_zone::error::LandingError;
use temporal_landing_zone::loader::Loader;
use temporal_landing_zone::progress::{EventLevel, PipelineState};
use temporal_landing_zone::staging::{LocalStaging, StagingFs, StagingLayout};

const INCOME_HEADER: &str = "Any,Codi_Districte,Nom_Districte,Codi_Barri,Nom_Barri,Població,Índex\n";

/// Local staging whose reads of one file are refused by the name node.
struct RefusingStaging {
    inner: LocalStaging,
    refused: &'static str,
}

impl StagingFs for RefusingStaging {
    fn exists(&self, path: &str) -> Result<bool, LandingError> {
        self.inner.exists(path)
    }

    fn make_dirs(&self, path: &str) -> Result<(), LandingError> {
        self.inner.make_dirs(path)
    }

    fn list(&self, dir: &str) -> Result<Vec<String>, LandingError> {
        self.inner.list(dir)
    }

    fn read_all(&self, path: &str) -> Result<Vec<u8>, LandingError> {
        if path.ends_with(self.refused) {
            return Err(LandingError::HdfsStatus {
                status: 403,
                message: "Permission denied".to_string(),
            });
        }
        self.inner.read_all(path)
    }

    fn write_overwrite(&self, path: &str, content: &[u8]) -> Result<(), LandingError> {
        self.inner.write_overwrite(path, content)
    }
}

fn layout() -> StagingLayout {
    StagingLayout::new("/user/bdm/temporal_landing", "csv", "json")
}

fn staging(dir: &tempfile::TempDir) -> LocalStaging {
    LocalStaging::new(Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap())
}

fn stage(staging: &LocalStaging, format: FileFormat, source: &str, name: &str, content: &str) {
    staging
        .write_overwrite(&layout().file_path(format, source, name), content.as_bytes())
        .unwrap();
}

#[test]
fn ensure_table_creates_once() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::default();
    let sink = RecordingSink::default();
    let loader = Loader::connect(staging(&dir), &store, layout(), &sink);
    let descriptor = SourceKind::LookupTables.descriptor();

    assert!(loader.ensure_table(&descriptor, &sink).unwrap());
    assert!(!loader.ensure_table(&descriptor, &sink).unwrap());
    assert_eq!(store.creates.load(Ordering::SeqCst), 1);
    assert_eq!(
        store.tables.lock().unwrap()["lookup_tables"],
        vec!["idealista_data", "income_data", "metadata"]
    );
}

#[test]
fn full_run_loads_every_source() {
    let dir = tempfile::tempdir().unwrap();
    let local = staging(&dir);
    stage(
        &local,
        FileFormat::Csv,
        "opendatabcn-income",
        "income_2021.csv",
        &format!("{INCOME_HEADER}2021,1,Ciutat Vella,1,Raval,50000,80\n"),
    );
    stage(
        &local,
        FileFormat::Json,
        "idealista",
        "idealista_2022_05_10.json",
        r#"[{"propertyCode":"P1","district":"D1","neighborhood":"N1","price":1000}]"#,
    );

    let store = MemoryStore::default();
    let sink = RecordingSink::default();
    let mut loader = Loader::connect(local, &store, layout(), &sink);
    let report = loader.run(&sink).unwrap();

    assert_eq!(loader.state(), &PipelineState::Closed);
    assert_eq!(report.tables.len(), 4);
    assert_eq!(report.skipped(), 0);
    assert_eq!(store.creates.load(Ordering::SeqCst), 4);
    assert_eq!(store.closes.load(Ordering::SeqCst), 1);

    let income = store.row("opendatabcn-income", "opendatabcn-income_1_1_2021").unwrap();
    assert_eq!(income["data:Neighborhood_Name"], "Raval");
    let metadata = store
        .row("opendatabcn-income", "opendatabcn-income_2021_metadata")
        .unwrap();
    assert_eq!(metadata["metadata:num_rows"], "1");

    let listing = store.row("idealista", "P1_D1_N1_1652140800").unwrap();
    assert_eq!(listing["data:property_info"], r#"{"price":1000}"#);

    // Sources without a staging folder are created but stay empty.
    assert!(store.row_keys("veh_index_motoritzacio").is_empty());
}

#[test]
fn reloading_overwrites_without_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let local = staging(&dir);
    stage(
        &local,
        FileFormat::Csv,
        "opendatabcn-income",
        "income_2021.csv",
        &format!("{INCOME_HEADER}2021,1,Ciutat Vella,1,Raval,50000,80\n2021,1,Ciutat Vella,2,Gòtic,16000,95\n"),
    );

    let store = MemoryStore::default();
    let sink = RecordingSink::default();
    for _ in 0..2 {
        let mut loader = Loader::connect(local.clone(), &store, layout(), &sink);
        let load = loader.load_source(SourceKind::Income, &sink).unwrap();
        assert_eq!(load.rows_written(), 2);
    }

    assert_eq!(store.creates.load(Ordering::SeqCst), 1);
    assert_eq!(
        store.row_keys("opendatabcn-income"),
        vec![
            "opendatabcn-income_1_1_2021",
            "opendatabcn-income_1_2_2021",
            "opendatabcn-income_2021_metadata",
        ]
    );
}

#[test]
fn malformed_file_is_skipped_and_the_rest_loads() {
    let dir = tempfile::tempdir().unwrap();
    let local = staging(&dir);
    stage(
        &local,
        FileFormat::Csv,
        "opendatabcn-income",
        "income_2020.csv",
        &format!("{INCOME_HEADER}2020,1,Ciutat Vella\n"),
    );
    stage(
        &local,
        FileFormat::Csv,
        "opendatabcn-income",
        "income_2021.csv",
        &format!("{INCOME_HEADER}2021,1,Ciutat Vella,1,Raval,50000,80\n"),
    );
    stage(
        &local,
        FileFormat::Csv,
        "opendatabcn-income",
        "notes.txt",
        "not a source file",
    );

    let store = MemoryStore::default();
    let sink = RecordingSink::default();
    let mut loader = Loader::connect(local, &store, layout(), &sink);
    let load = loader.load_source(SourceKind::Income, &sink).unwrap();

    assert_eq!(load.files.len(), 1);
    assert_eq!(load.files[0].file, "income_2021.csv");
    assert_eq!(load.skipped.len(), 1);
    assert_eq!(load.skipped[0].file, "income_2020.csv");
    // Nothing from the malformed file reaches the store, not even its metadata.
    assert!(store.row("opendatabcn-income", "opendatabcn-income_2020_metadata").is_none());
    assert_eq!(sink.messages(EventLevel::Warn).len(), 1);
    assert_eq!(loader.state(), &PipelineState::Processing("opendatabcn-income".to_string()));
}

#[test]
fn header_only_file_records_zero_rows() {
    let dir = tempfile::tempdir().unwrap();
    let local = staging(&dir);
    stage(
        &local,
        FileFormat::Csv,
        "opendatabcn-income",
        "income_2019.csv",
        INCOME_HEADER,
    );

    let store = MemoryStore::default();
    let sink = RecordingSink::default();
    let mut loader = Loader::connect(local, &store, layout(), &sink);
    let load = loader.load_source(SourceKind::Income, &sink).unwrap();

    assert_eq!(load.rows_written(), 0);
    assert_eq!(load.files[0].metadata_key, "opendatabcn-income_income_2019_metadata");
    let metadata = store
        .row("opendatabcn-income", "opendatabcn-income_income_2019_metadata")
        .unwrap();
    assert_eq!(metadata["metadata:num_rows"], "0");
    assert_eq!(metadata["metadata:num_cols"], "7");
}

#[test]
fn store_failure_closes_the_connection() {
    let dir = tempfile::tempdir().unwrap();
    let local = staging(&dir);
    stage(
        &local,
        FileFormat::Csv,
        "opendatabcn-income",
        "income_2021.csv",
        &format!("{INCOME_HEADER}2021,1,Ciutat Vella,1,Raval,50000,80\n"),
    );

    let store = MemoryStore::default();
    store.fail_puts.store(true, Ordering::SeqCst);
    let sink = RecordingSink::default();
    let mut loader = Loader::connect(local, &store, layout(), &sink);
    let err = loader.run(&sink).unwrap_err();

    assert_matches!(err, LandingError::HbaseHttp(_));
    assert_eq!(loader.state(), &PipelineState::ClosedWithError);
    assert_eq!(store.closes.load(Ordering::SeqCst), 1);
    assert_eq!(sink.messages(EventLevel::Error).len(), 1);
}

#[test]
fn unreadable_file_is_skipped_and_the_rest_loads() {
    let dir = tempfile::tempdir().unwrap();
    let local = staging(&dir);
    for year in ["2020", "2021"] {
        stage(
            &local,
            FileFormat::Csv,
            "opendatabcn-income",
            &format!("income_{year}.csv"),
            &format!("{INCOME_HEADER}{year},1,Ciutat Vella,1,Raval,50000,80\n"),
        );
    }

    let store = MemoryStore::default();
    let sink = RecordingSink::default();
    let refusing = RefusingStaging {
        inner: local,
        refused: "income_2020.csv",
    };
    let mut loader = Loader::connect(refusing, &store, layout(), &sink);
    let report = loader.run(&sink).unwrap();

    assert_eq!(loader.state(), &PipelineState::Closed);
    assert_eq!(report.skipped(), 1);
    let income = &report.tables[0];
    assert_eq!(income.skipped[0].file, "income_2020.csv");
    assert!(income.skipped[0].reason.contains("403"));
    assert!(store.row("opendatabcn-income", "opendatabcn-income_1_1_2021").is_some());
    assert!(store.row("opendatabcn-income", "opendatabcn-income_1_1_2020").is_none());
    assert_eq!(store.closes.load(Ordering::SeqCst), 1);
}

#[test]
fn transport_failure_while_reading_ends_the_run() {
    struct Unreachable(LocalStaging);

    impl StagingFs for Unreachable {
        fn exists(&self, path: &str) -> Result<bool, LandingError> {
            self.0.exists(path)
        }

        fn make_dirs(&self, path: &str) -> Result<(), LandingError> {
            self.0.make_dirs(path)
        }

        fn list(&self, dir: &str) -> Result<Vec<String>, LandingError> {
            self.0.list(dir)
        }

        fn read_all(&self, _path: &str) -> Result<Vec<u8>, LandingError> {
            Err(LandingError::HdfsHttp("connection reset".to_string()))
        }

        fn write_overwrite(&self, path: &str, content: &[u8]) -> Result<(), LandingError> {
            self.0.write_overwrite(path, content)
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let local = staging(&dir);
    stage(
        &local,
        FileFormat::Csv,
        "opendatabcn-income",
        "income_2021.csv",
        &format!("{INCOME_HEADER}2021,1,Ciutat Vella,1,Raval,50000,80\n"),
    );

    let store = MemoryStore::default();
    let sink = RecordingSink::default();
    let mut loader = Loader::connect(Unreachable(local), &store, layout(), &sink);
    let err = loader.run(&sink).unwrap_err();

    assert_matches!(err, LandingError::HdfsHttp(_));
    assert_eq!(loader.state(), &PipelineState::ClosedWithError);
    assert_eq!(store.closes.load(Ordering::SeqCst), 1);
}
