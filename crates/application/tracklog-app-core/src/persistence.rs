use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use directories::ProjectDirs;

use crate::domain::AppSettings;
use crate::ports::SettingsRepo;

const QUALIFIER: &str = "org";
const ORG: &str = "tracklog";
const APP: &str = "tracklog";

/// Settings file in the platform config directory, or under an explicit root.
pub struct FilePersistence {
    root: Option<PathBuf>,
}

impl Default for FilePersistence {
    fn default() -> Self {
        Self::new()
    }
}

impl FilePersistence {
    pub fn new() -> Self {
        Self { root: None }
    }

    /// Keeps settings under `root` instead of the platform config dir.
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn config_dir(&self) -> Result<PathBuf> {
        let config_dir = match &self.root {
            Some(root) => root.clone(),
            None => ProjectDirs::from(QUALIFIER, ORG, APP)
                .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
                .config_dir()
                .to_path_buf(),
        };
        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)?;
        }
        Ok(config_dir)
    }

    fn settings_path(&self) -> Result<PathBuf> {
        Ok(self.config_dir()?.join("settings.json"))
    }

    pub fn load_settings(&self) -> Result<AppSettings> {
        let path = self.settings_path()?;
        if !path.exists() {
            return Ok(AppSettings::default());
        }
        let content = fs::read_to_string(&path).context("Failed to read settings")?;
        let settings: AppSettings = serde_json::from_str(&content)
            .with_context(|| format!("Invalid settings file {}", path.to_string_lossy()))?;
        Ok(settings)
    }

    pub fn save_settings(&self, settings: &AppSettings) -> Result<()> {
        let path = self.settings_path()?;
        let json = serde_json::to_string_pretty(settings)?;
        atomic_write(&path, json.as_bytes()).context("Failed to write settings")?;
        Ok(())
    }
}

impl SettingsRepo for FilePersistence {
    fn load(&self) -> Result<AppSettings> {
        self.load_settings()
    }

    fn save(&self, settings: &AppSettings) -> Result<()> {
        self.save_settings(settings)
    }
}

/// Directory holding the local database: the configured one, else the
/// platform data dir.
pub fn data_dir(settings: &AppSettings) -> Result<Utf8PathBuf> {
    if let Some(dir) = settings.data_dir.as_deref().filter(|d| !d.trim().is_empty()) {
        return Ok(Utf8PathBuf::from(dir));
    }
    let proj_dirs = ProjectDirs::from(QUALIFIER, ORG, APP)
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
    Utf8PathBuf::from_path_buf(proj_dirs.data_dir().to_path_buf())
        .map_err(|p| anyhow::anyhow!("Data directory is not UTF-8: {}", p.to_string_lossy()))
}

fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp_path = {
        let mut name = path.as_os_str().to_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    };

    let mut file = fs::File::create(&tmp_path)
        .with_context(|| format!("Failed to create temp file {}", tmp_path.to_string_lossy()))?;
    file.write_all(contents)
        .with_context(|| format!("Failed to write temp file {}", tmp_path.to_string_lossy()))?;
    file.sync_all()
        .with_context(|| format!("Failed to sync temp file {}", tmp_path.to_string_lossy()))?;
    drop(file);

    match fs::rename(&tmp_path, path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            fs::remove_file(path).ok();
            fs::rename(&tmp_path, path).with_context(|| {
                format!("Failed to replace settings file {}", path.to_string_lossy())
            })?;
        }
        Err(e) => {
            return Err(e).with_context(|| {
                format!(
                    "Failed to rename temp file {} to {}",
                    tmp_path.to_string_lossy(),
                    path.to_string_lossy()
                )
            });
        }
    }

    if let Some(parent) = path.parent() {
        if let Ok(dir) = fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracklog_core::EntityKind;

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FilePersistence::at(dir.path());
        assert_eq!(repo.load().unwrap(), AppSettings::default());
    }

    #[test]
    fn saved_settings_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FilePersistence::at(dir.path().join("nested"));
        let mut settings = AppSettings {
            remote_url: "https://api.example.org/rest/v1".into(),
            api_key: Some("anon".into()),
            push_concurrency: 8,
            ..AppSettings::default()
        };
        settings.collections.insert(EntityKind::Trip, "journeys".into());

        repo.save(&settings).unwrap();
        assert_eq!(repo.load().unwrap(), settings);
        assert!(!dir.path().join("nested").join("settings.json.tmp").exists());
    }

    #[test]
    fn configured_data_dir_wins() {
        let settings = AppSettings {
            data_dir: Some("/srv/tracklog".into()),
            ..AppSettings::default()
        };
        assert_eq!(data_dir(&settings).unwrap(), Utf8PathBuf::from("/srv/tracklog"));
    }
}
