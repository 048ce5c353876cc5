use camino::Utf8PathBuf;

use crate::error::LandingError;

pub const DEFAULT_CATALOG_URL: &str =
    "https://opendata-ajuntament.barcelona.cat/data/api/3/action/package_show";
pub const DEFAULT_DATASET_ID: &str = "est_vehicles_index_motor";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingSettings {
    pub landing_dir: String,
    pub csv_dir: String,
    pub json_dir: String,
    pub backend: StagingBackend,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagingBackend {
    WebHdfs {
        host: String,
        port: u16,
        user: String,
    },
    Local {
        root: Utf8PathBuf,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogSettings {
    pub base_url: String,
    pub api_key: String,
    pub dataset_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSettings {
    pub data_dir: Utf8PathBuf,
    pub staging: StagingSettings,
    pub catalog: CatalogSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadingSettings {
    pub staging: StagingSettings,
    pub hbase_host: String,
    pub hbase_port: u16,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn collection() -> Result<CollectionSettings, LandingError> {
        Self::collection_from(|name| std::env::var(name).ok())
    }

    pub fn loading() -> Result<LoadingSettings, LandingError> {
        Self::loading_from(|name| std::env::var(name).ok())
    }

    pub fn collection_from<F>(lookup: F) -> Result<CollectionSettings, LandingError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);
        Ok(CollectionSettings {
            data_dir: Utf8PathBuf::from(normalize_path(&vars.required("GLOBAL_DATA_DIR_PATH")?)),
            staging: Self::staging(&vars)?,
            catalog: CatalogSettings {
                base_url: vars
                    .optional("OPEN_DATA_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_CATALOG_URL.to_string()),
                api_key: vars.required("OPEN_DATA_API_KEY")?,
                dataset_id: vars
                    .optional("OPEN_DATA_DATASET_ID")
                    .unwrap_or_else(|| DEFAULT_DATASET_ID.to_string()),
            },
        })
    }

    pub fn loading_from<F>(lookup: F) -> Result<LoadingSettings, LandingError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);
        Ok(LoadingSettings {
            staging: Self::staging(&vars)?,
            hbase_host: vars.required("HDFS_HBASE_HOST")?,
            hbase_port: vars.port("HBASE_PORT")?,
        })
    }

    fn staging(vars: &Vars<'_>) -> Result<StagingSettings, LandingError> {
        let backend = match vars.optional("STAGING_BACKEND").as_deref() {
            None | Some("webhdfs") => StagingBackend::WebHdfs {
                host: vars.required("HDFS_HBASE_HOST")?,
                port: vars.port("HDFS_PORT")?,
                user: vars.required("HDFS_USER")?,
            },
            Some("local") => StagingBackend::Local {
                root: Utf8PathBuf::from(normalize_path(&vars.required("LOCAL_STAGING_ROOT")?)),
            },
            Some(other) => {
                return Err(LandingError::InvalidSetting {
                    name: "STAGING_BACKEND".to_string(),
                    message: format!("expected webhdfs or local, got {other}"),
                });
            }
        };

        Ok(StagingSettings {
            landing_dir: normalize_path(&vars.required("TEMPORAL_LANDING_DIR_PATH")?),
            csv_dir: normalize_path(&vars.required("TEMPORAL_LANDING_CSV_DIR_PATH")?),
            json_dir: normalize_path(&vars.required("TEMPORAL_LANDING_JSON_DIR_PATH")?),
            backend,
        })
    }
}

struct Vars<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Vars<'_> {
    fn optional(&self, name: &str) -> Option<String> {
        (self.0)(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn required(&self, name: &str) -> Result<String, LandingError> {
        self.optional(name)
            .ok_or_else(|| LandingError::MissingSetting(name.to_string()))
    }

    fn port(&self, name: &str) -> Result<u16, LandingError> {
        let value = self.required(name)?;
        value.parse().map_err(|_| LandingError::InvalidSetting {
            name: name.to_string(),
            message: format!("not a port number: {value}"),
        })
    }
}

pub fn normalize_path(value: &str) -> String {
    value.replace('\\', "/")
}
