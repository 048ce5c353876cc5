use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;

use crate::error::LandingError;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CatalogResource {
    pub url: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct PackageShow {
    result: PackageResult,
}

#[derive(Debug, Deserialize)]
struct PackageResult {
    #[serde(default)]
    resources: Vec<CatalogResource>,
}

pub trait CatalogClient: Send + Sync {
    fn resources(&self, dataset_id: &str) -> Result<Vec<CatalogResource>, LandingError>;
    fn download(&self, url: &str) -> Result<Vec<u8>, LandingError>;
}

#[derive(Clone)]
pub struct OpenDataHttpClient {
    client: Client,
    base_url: String,
}

impl OpenDataHttpClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, LandingError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("landing-zone/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| LandingError::CatalogHttp(err.to_string()))?,
        );
        let mut credential = HeaderValue::from_str(api_key.trim()).map_err(|err| {
            LandingError::InvalidSetting {
                name: "OPEN_DATA_API_KEY".to_string(),
                message: err.to_string(),
            }
        })?;
        credential.set_sensitive(true);
        headers.insert(AUTHORIZATION, credential);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| LandingError::CatalogHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    fn handle_status(response: Response) -> Result<Response, LandingError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "catalog request failed".to_string());
        Err(LandingError::CatalogStatus { status, message })
    }
}

impl CatalogClient for OpenDataHttpClient {
    fn resources(&self, dataset_id: &str) -> Result<Vec<CatalogResource>, LandingError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("id", dataset_id)])
            .send()
            .map_err(|err| LandingError::CatalogHttp(err.to_string()))?;
        let body = Self::handle_status(response)?
            .bytes()
            .map_err(|err| LandingError::CatalogHttp(err.to_string()))?;
        parse_package(&body)
    }

    fn download(&self, url: &str) -> Result<Vec<u8>, LandingError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| LandingError::CatalogHttp(err.to_string()))?;
        let bytes = Self::handle_status(response)?
            .bytes()
            .map_err(|err| LandingError::CatalogHttp(err.to_string()))?;
        Ok(bytes.to_vec())
    }
}

pub fn parse_package(body: &[u8]) -> Result<Vec<CatalogResource>, LandingError> {
    let package: PackageShow =
        serde_json::from_slice(body).map_err(|err| LandingError::CatalogPayload(err.to_string()))?;
    Ok(package.result.resources)
}

/// Staging folder for a catalog resource: the name without its extension and without its
/// first `_` token, so `2019_veh_index_motoritzacio.csv` lands in `veh_index_motoritzacio`.
pub fn staging_folder_for(resource_name: &str) -> Result<String, LandingError> {
    let stem = resource_name.split('.').next().unwrap_or_default();
    let folder = stem.split('_').skip(1).collect::<Vec<_>>().join("_");
    if folder.is_empty() {
        return Err(LandingError::InvalidResourceName(resource_name.to_string()));
    }
    Ok(folder)
}
