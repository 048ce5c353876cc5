use std::time::Duration;

use reqwest::StatusCode;
use reqwest::Url;
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, LOCATION, USER_AGENT};
use reqwest::redirect::Policy;
use serde::Deserialize;

use crate::error::LandingError;
use crate::staging::StagingFs;

#[derive(Debug, Deserialize)]
struct BooleanResponse {
    boolean: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListStatusResponse {
    file_statuses: FileStatuses,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FileStatuses {
    #[serde(default)]
    file_status: Vec<FileStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileStatus {
    path_suffix: String,
}

#[derive(Clone)]
pub struct WebHdfsClient {
    client: Client,
    base_url: Url,
    user: String,
}

impl WebHdfsClient {
    pub fn new(host: &str, port: u16, user: &str) -> Result<Self, LandingError> {
        Self::with_base_url(&format!("http://{host}:{port}"), user)
    }

    pub fn with_base_url(base_url: &str, user: &str) -> Result<Self, LandingError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("landing-zone/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| LandingError::HdfsHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .redirect(Policy::none())
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| LandingError::HdfsHttp(err.to_string()))?;
        let base_url = Url::parse(base_url).map_err(|err| LandingError::InvalidSetting {
            name: "HDFS_HBASE_HOST".to_string(),
            message: err.to_string(),
        })?;
        Ok(Self {
            client,
            base_url,
            user: user.to_string(),
        })
    }

    pub fn operation_url(
        &self,
        path: &str,
        op: &str,
        extra: &[(&str, &str)],
    ) -> Result<Url, LandingError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| LandingError::HdfsHttp(format!("invalid base url {}", self.base_url)))?
            .pop_if_empty()
            .extend(["webhdfs", "v1"])
            .extend(path.split('/').filter(|segment| !segment.is_empty()));
        url.query_pairs_mut()
            .append_pair("op", op)
            .append_pair("user.name", &self.user)
            .extend_pairs(extra.iter().copied());
        Ok(url)
    }

    fn handle_status(response: Response) -> Result<Response, LandingError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "WebHDFS request failed".to_string());
        Err(LandingError::HdfsStatus { status, message })
    }

    fn redirect_target(response: &Response) -> Result<String, LandingError> {
        response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                LandingError::HdfsHttp("redirect without a Location header".to_string())
            })
    }
}

impl StagingFs for WebHdfsClient {
    fn exists(&self, path: &str) -> Result<bool, LandingError> {
        let url = self.operation_url(path, "GETFILESTATUS", &[])?;
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| LandingError::HdfsHttp(err.to_string()))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        Self::handle_status(response)?;
        Ok(true)
    }

    fn make_dirs(&self, path: &str) -> Result<(), LandingError> {
        let url = self.operation_url(path, "MKDIRS", &[])?;
        let response = self
            .client
            .put(url)
            .send()
            .map_err(|err| LandingError::HdfsHttp(err.to_string()))?;
        let created: BooleanResponse = Self::handle_status(response)?
            .json()
            .map_err(|err| LandingError::HdfsHttp(err.to_string()))?;
        if !created.boolean {
            return Err(LandingError::Staging(format!("MKDIRS {path} returned false")));
        }
        Ok(())
    }

    fn list(&self, dir: &str) -> Result<Vec<String>, LandingError> {
        let url = self.operation_url(dir, "LISTSTATUS", &[])?;
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| LandingError::HdfsHttp(err.to_string()))?;
        let listing: ListStatusResponse = Self::handle_status(response)?
            .json()
            .map_err(|err| LandingError::HdfsHttp(err.to_string()))?;
        Ok(listing
            .file_statuses
            .file_status
            .into_iter()
            .map(|status| status.path_suffix)
            .collect())
    }

    fn read_all(&self, path: &str) -> Result<Vec<u8>, LandingError> {
        let url = self.operation_url(path, "OPEN", &[])?;
        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|err| LandingError::HdfsHttp(err.to_string()))?;
        if response.status().is_redirection() {
            let target = Self::redirect_target(&response)?;
            response = self
                .client
                .get(target)
                .send()
                .map_err(|err| LandingError::HdfsHttp(err.to_string()))?;
        }
        let bytes = Self::handle_status(response)?
            .bytes()
            .map_err(|err| LandingError::HdfsHttp(err.to_string()))?;
        Ok(bytes.to_vec())
    }

    fn write_overwrite(&self, path: &str, content: &[u8]) -> Result<(), LandingError> {
        let url = self.operation_url(path, "CREATE", &[("overwrite", "true")])?;
        let response = self
            .client
            .put(url)
            .send()
            .map_err(|err| LandingError::HdfsHttp(err.to_string()))?;
        if !response.status().is_redirection() {
            Self::handle_status(response)?;
            return Err(LandingError::HdfsHttp(format!(
                "CREATE {path} was not redirected to a data node"
            )));
        }
        let target = Self::redirect_target(&response)?;
        let response = self
            .client
            .put(target)
            .body(content.to_vec())
            .send()
            .map_err(|err| LandingError::HdfsHttp(err.to_string()))?;
        Self::handle_status(response)?;
        Ok(())
    }
}
