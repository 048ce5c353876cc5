use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::StatusCode;
use reqwest::Url;
use reqwest::blocking::{Client, Response};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;

use crate::error::LandingError;

pub trait ColumnStore: Send + Sync {
    fn table_exists(&self, table: &str) -> Result<bool, LandingError>;
    fn create_table(&self, table: &str, families: &[&str]) -> Result<(), LandingError>;
    /// Writes `columns` (keyed `family:qualifier`) under `row_key`, overwriting existing cells.
    fn put(
        &self,
        table: &str,
        row_key: &[u8],
        columns: &BTreeMap<String, Vec<u8>>,
    ) -> Result<(), LandingError>;
    fn close(&self) -> Result<(), LandingError>;
}

#[derive(Debug, Serialize)]
struct TableSchema<'a> {
    name: &'a str,
    #[serde(rename = "ColumnSchema")]
    column_schema: Vec<ColumnSchema<'a>>,
}

#[derive(Debug, Serialize)]
struct ColumnSchema<'a> {
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct CellSet {
    #[serde(rename = "Row")]
    rows: Vec<CellRow>,
}

#[derive(Debug, Serialize)]
struct CellRow {
    key: String,
    #[serde(rename = "Cell")]
    cells: Vec<Cell>,
}

#[derive(Debug, Serialize)]
struct Cell {
    column: String,
    #[serde(rename = "$")]
    value: String,
}

pub struct HBaseRestClient {
    client: Client,
    base_url: Url,
    closed: AtomicBool,
}

impl HBaseRestClient {
    pub fn new(host: &str, port: u16) -> Result<Self, LandingError> {
        Self::with_base_url(&format!("http://{host}:{port}"))
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, LandingError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("landing-zone/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| LandingError::HbaseHttp(err.to_string()))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| LandingError::HbaseHttp(err.to_string()))?;
        let base_url = Url::parse(base_url).map_err(|err| LandingError::InvalidSetting {
            name: "HDFS_HBASE_HOST".to_string(),
            message: err.to_string(),
        })?;
        Ok(Self {
            client,
            base_url,
            closed: AtomicBool::new(false),
        })
    }

    pub fn resource_url(&self, segments: &[&str]) -> Result<Url, LandingError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| LandingError::HbaseHttp(format!("invalid base url {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn ensure_open(&self) -> Result<(), LandingError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(LandingError::StoreClosed);
        }
        Ok(())
    }

    fn handle_status(response: Response) -> Result<Response, LandingError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "HBase request failed".to_string());
        Err(LandingError::HbaseStatus { status, message })
    }
}

pub fn encode_row(
    row_key: &[u8],
    columns: &BTreeMap<String, Vec<u8>>,
) -> Result<serde_json::Value, LandingError> {
    let cell_set = CellSet {
        rows: vec![CellRow {
            key: STANDARD.encode(row_key),
            cells: columns
                .iter()
                .map(|(column, value)| Cell {
                    column: STANDARD.encode(column.as_bytes()),
                    value: STANDARD.encode(value),
                })
                .collect(),
        }],
    };
    serde_json::to_value(cell_set).map_err(|err| LandingError::HbaseHttp(err.to_string()))
}

impl ColumnStore for HBaseRestClient {
    fn table_exists(&self, table: &str) -> Result<bool, LandingError> {
        self.ensure_open()?;
        let url = self.resource_url(&[table, "schema"])?;
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| LandingError::HbaseHttp(err.to_string()))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        Self::handle_status(response)?;
        Ok(true)
    }

    fn create_table(&self, table: &str, families: &[&str]) -> Result<(), LandingError> {
        self.ensure_open()?;
        let url = self.resource_url(&[table, "schema"])?;
        let schema = TableSchema {
            name: table,
            column_schema: families
                .iter()
                .map(|&name| ColumnSchema { name })
                .collect(),
        };
        let response = self
            .client
            .put(url)
            .header(CONTENT_TYPE, "application/json")
            .json(&schema)
            .send()
            .map_err(|err| LandingError::HbaseHttp(err.to_string()))?;
        Self::handle_status(response)?;
        Ok(())
    }

    fn put(
        &self,
        table: &str,
        row_key: &[u8],
        columns: &BTreeMap<String, Vec<u8>>,
    ) -> Result<(), LandingError> {
        self.ensure_open()?;
        let key = String::from_utf8_lossy(row_key);
        let url = self.resource_url(&[table, key.as_ref()])?;
        let response = self
            .client
            .put(url)
            .header(CONTENT_TYPE, "application/json")
            .json(&encode_row(row_key, columns)?)
            .send()
            .map_err(|err| LandingError::HbaseHttp(err.to_string()))?;
        Self::handle_status(response)?;
        Ok(())
    }

    fn close(&self) -> Result<(), LandingError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
