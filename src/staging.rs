use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};

use crate::config::StagingSettings;
use crate::domain::FileFormat;
use crate::error::LandingError;

pub trait StagingFs: Send + Sync {
    /// `Ok(false)` when the path does not exist; absence is not an error.
    fn exists(&self, path: &str) -> Result<bool, LandingError>;
    fn make_dirs(&self, path: &str) -> Result<(), LandingError>;
    /// Names (not paths) of the entries directly under `dir`.
    fn list(&self, dir: &str) -> Result<Vec<String>, LandingError>;
    fn read_all(&self, path: &str) -> Result<Vec<u8>, LandingError>;
    fn write_overwrite(&self, path: &str, content: &[u8]) -> Result<(), LandingError>;
}

impl<T: StagingFs + ?Sized> StagingFs for Box<T> {
    fn exists(&self, path: &str) -> Result<bool, LandingError> {
        (**self).exists(path)
    }

    fn make_dirs(&self, path: &str) -> Result<(), LandingError> {
        (**self).make_dirs(path)
    }

    fn list(&self, dir: &str) -> Result<Vec<String>, LandingError> {
        (**self).list(dir)
    }

    fn read_all(&self, path: &str) -> Result<Vec<u8>, LandingError> {
        (**self).read_all(path)
    }

    fn write_overwrite(&self, path: &str, content: &[u8]) -> Result<(), LandingError> {
        (**self).write_overwrite(path, content)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingLayout {
    landing_dir: String,
    csv_dir: String,
    json_dir: String,
}

impl StagingLayout {
    pub fn new(
        landing_dir: impl Into<String>,
        csv_dir: impl Into<String>,
        json_dir: impl Into<String>,
    ) -> Self {
        Self {
            landing_dir: landing_dir.into(),
            csv_dir: csv_dir.into(),
            json_dir: json_dir.into(),
        }
    }

    pub fn from_settings(settings: &StagingSettings) -> Self {
        Self::new(
            settings.landing_dir.clone(),
            settings.csv_dir.clone(),
            settings.json_dir.clone(),
        )
    }

    pub fn root(&self) -> &str {
        &self.landing_dir
    }

    pub fn format_subdir(&self, format: FileFormat) -> &str {
        match format {
            FileFormat::Csv => &self.csv_dir,
            FileFormat::Json => &self.json_dir,
        }
    }

    pub fn format_dir(&self, format: FileFormat) -> String {
        join_path(&self.landing_dir, self.format_subdir(format))
    }

    pub fn source_dir(&self, format: FileFormat, source: &str) -> String {
        join_path(&self.format_dir(format), source)
    }

    pub fn file_path(&self, format: FileFormat, source: &str, file_name: &str) -> String {
        join_path(&self.source_dir(format, source), file_name)
    }
}

pub fn join_path(base: &str, child: &str) -> String {
    if child.starts_with('/') || base.is_empty() {
        return child.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), child)
}

/// Staging backend rooted in a local directory. Staging paths are resolved relative to
/// `root`, so `/landing/csv` lands in `{root}/landing/csv`.
#[derive(Debug, Clone)]
pub struct LocalStaging {
    root: Utf8PathBuf,
}

impl LocalStaging {
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn resolve(&self, path: &str) -> Utf8PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

impl StagingFs for LocalStaging {
    fn exists(&self, path: &str) -> Result<bool, LandingError> {
        Ok(self.resolve(path).as_std_path().exists())
    }

    fn make_dirs(&self, path: &str) -> Result<(), LandingError> {
        fs::create_dir_all(self.resolve(path).as_std_path())
            .map_err(|err| LandingError::Staging(format!("mkdir {path}: {err}")))
    }

    fn list(&self, dir: &str) -> Result<Vec<String>, LandingError> {
        let resolved = self.resolve(dir);
        let entries = fs::read_dir(resolved.as_std_path())
            .map_err(|err| LandingError::Staging(format!("list {dir}: {err}")))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| LandingError::Staging(err.to_string()))?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    fn read_all(&self, path: &str) -> Result<Vec<u8>, LandingError> {
        fs::read(self.resolve(path).as_std_path())
            .map_err(|err| LandingError::StagedRead {
                path: path.to_string(),
                message: err.to_string(),
            })
    }

    fn write_overwrite(&self, path: &str, content: &[u8]) -> Result<(), LandingError> {
        let dest = self.resolve(path);
        let parent = dest
            .parent()
            .map(Utf8Path::to_path_buf)
            .ok_or_else(|| LandingError::Staging(format!("invalid staging path {path}")))?;
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| LandingError::Staging(err.to_string()))?;
        let mut temp = tempfile::Builder::new()
            .prefix("landing-zone-file")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| LandingError::Staging(err.to_string()))?;
        temp.write_all(content)
            .map_err(|err| LandingError::Staging(err.to_string()))?;
        if dest.as_std_path().exists() {
            fs::remove_file(dest.as_std_path())
                .map_err(|err| LandingError::Staging(err.to_string()))?;
        }
        temp.persist(dest.as_std_path())
            .map_err(|err| LandingError::Staging(err.to_string()))?;
        Ok(())
    }
}
