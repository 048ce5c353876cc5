#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use temporal_landing_zone::catalog::{CatalogClient, CatalogResource};
use temporal_landing_zone::error::LandingError;
use temporal_landing_zone::hbase::ColumnStore;
use temporal_landing_zone::progress::{EventLevel, ProgressEvent, ProgressSink};
use temporal_landing_zone::staging::{LocalStaging, StagingFs};

/// Collects events so tests can assert on what a pipeline reported.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingSink {
    pub fn messages(&self, level: EventLevel) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| event.level == level)
            .map(|event| event.message.clone())
            .collect()
    }
}

impl ProgressSink for RecordingSink {
    fn event(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// In-memory column store. Puts merge into existing rows the way HBase does.
#[derive(Default)]
pub struct MemoryStore {
    pub tables: Mutex<BTreeMap<String, Vec<String>>>,
    pub rows: Mutex<BTreeMap<(String, String), BTreeMap<String, Vec<u8>>>>,
    pub creates: AtomicUsize,
    pub puts: AtomicUsize,
    pub closes: AtomicUsize,
    pub fail_puts: AtomicBool,
}

impl MemoryStore {
    pub fn row(&self, table: &str, key: &str) -> Option<BTreeMap<String, String>> {
        self.rows
            .lock()
            .unwrap()
            .get(&(table.to_string(), key.to_string()))
            .map(|cells| {
                cells
                    .iter()
                    .map(|(column, value)| {
                        (column.clone(), String::from_utf8_lossy(value).into_owned())
                    })
                    .collect()
            })
    }

    pub fn row_keys(&self, table: &str) -> Vec<String> {
        self.rows
            .lock()
            .unwrap()
            .keys()
            .filter(|(owner, _)| owner == table)
            .map(|(_, key)| key.clone())
            .collect()
    }
}

impl ColumnStore for &MemoryStore {
    fn table_exists(&self, table: &str) -> Result<bool, LandingError> {
        Ok(self.tables.lock().unwrap().contains_key(table))
    }

    fn create_table(&self, table: &str, families: &[&str]) -> Result<(), LandingError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.tables.lock().unwrap().insert(
            table.to_string(),
            families.iter().map(|family| family.to_string()).collect(),
        );
        Ok(())
    }

    fn put(
        &self,
        table: &str,
        row_key: &[u8],
        columns: &BTreeMap<String, Vec<u8>>,
    ) -> Result<(), LandingError> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(LandingError::HbaseHttp("connection refused".to_string()));
        }
        self.puts.fetch_add(1, Ordering::SeqCst);
        let key = String::from_utf8_lossy(row_key).into_owned();
        let mut rows = self.rows.lock().unwrap();
        let row = rows.entry((table.to_string(), key)).or_default();
        for (column, value) in columns {
            row.insert(column.clone(), value.clone());
        }
        Ok(())
    }

    fn close(&self) -> Result<(), LandingError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Local staging that counts directory creations.
pub struct CountingStaging {
    pub inner: LocalStaging,
    pub mkdirs: AtomicUsize,
}

impl CountingStaging {
    pub fn new(inner: LocalStaging) -> Self {
        Self {
            inner,
            mkdirs: AtomicUsize::new(0),
        }
    }
}

impl StagingFs for CountingStaging {
    fn exists(&self, path: &str) -> Result<bool, LandingError> {
        self.inner.exists(path)
    }

    fn make_dirs(&self, path: &str) -> Result<(), LandingError> {
        self.mkdirs.fetch_add(1, Ordering::SeqCst);
        self.inner.make_dirs(path)
    }

    fn list(&self, dir: &str) -> Result<Vec<String>, LandingError> {
        self.inner.list(dir)
    }

    fn read_all(&self, path: &str) -> Result<Vec<u8>, LandingError> {
        self.inner.read_all(path)
    }

    fn write_overwrite(&self, path: &str, content: &[u8]) -> Result<(), LandingError> {
        self.inner.write_overwrite(path, content)
    }
}

/// Catalog serving fixed resources from memory. Unknown URLs answer 404.
#[derive(Default)]
pub struct FakeCatalog {
    pub resources: Vec<CatalogResource>,
    pub files: BTreeMap<String, Vec<u8>>,
}

impl FakeCatalog {
    pub fn with_resource(mut self, name: &str, content: &[u8]) -> Self {
        let url = format!("https://catalog.test/download/{name}");
        self.resources.push(CatalogResource {
            url: url.clone(),
            name: name.to_string(),
        });
        self.files.insert(url, content.to_vec());
        self
    }
}

impl CatalogClient for FakeCatalog {
    fn resources(&self, _dataset_id: &str) -> Result<Vec<CatalogResource>, LandingError> {
        Ok(self.resources.clone())
    }

    fn download(&self, url: &str) -> Result<Vec<u8>, LandingError> {
        self.files
            .get(url)
            .cloned()
            .ok_or_else(|| LandingError::CatalogStatus {
                status: 404,
                message: url.to_string(),
            })
    }
}
