use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use tracklog_app_core::persistence::FilePersistence;
use tracklog_app_core::AppSettings;
use tracklog_config::{MAX_PUSH_CONCURRENCY, MIN_PUSH_CONCURRENCY};

pub struct SettingsManager {
    persistence: FilePersistence,
}

impl Default for SettingsManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsManager {
    pub fn new() -> Self {
        Self {
            persistence: FilePersistence::new(),
        }
    }

    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self {
            persistence: FilePersistence::at(root),
        }
    }

    pub fn load(&self) -> Result<AppSettings> {
        self.persistence.load_settings()
    }

    pub fn set_remote(&self, url: &str, api_key: Option<String>) -> Result<AppSettings> {
        let parsed = reqwest::Url::parse(url).with_context(|| format!("Invalid URL '{url}'"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(anyhow!("Remote URL must use http or https"));
        }

        let mut settings = self.load()?;
        settings.remote_url = url.trim_end_matches('/').to_string();
        if api_key.is_some() {
            settings.api_key = api_key;
        }
        self.persistence.save_settings(&settings)?;
        Ok(settings)
    }

    pub fn set_concurrency(&self, n: usize) -> Result<AppSettings> {
        if !(MIN_PUSH_CONCURRENCY..=MAX_PUSH_CONCURRENCY).contains(&n) {
            return Err(anyhow!(
                "Concurrency must be between {MIN_PUSH_CONCURRENCY} and {MAX_PUSH_CONCURRENCY}"
            ));
        }
        let mut settings = self.load()?;
        settings.push_concurrency = n;
        self.persistence.save_settings(&settings)?;
        Ok(settings)
    }
}

pub fn handle_show(mgr: &SettingsManager) -> Result<()> {
    let settings = mgr.load()?;
    let remote = if settings.is_configured() {
        settings.remote_url.as_str()
    } else {
        "(not set)"
    };
    println!("Remote:            {remote}");
    println!(
        "API key:           {}",
        if settings.api_key.is_some() { "set" } else { "none" }
    );
    println!(
        "Data directory:    {}",
        tracklog_app_core::persistence::data_dir(&settings)?
    );
    println!("Push concurrency:  {}", settings.push_concurrency);
    println!("Requests/second:   {}", settings.requests_per_second);
    println!("Window (days):     {}", settings.window_days);
    for (kind, name) in &settings.collections {
        println!("Collection {:<8} {name}", kind.as_str());
    }
    Ok(())
}

pub fn handle_set_remote(
    mgr: &SettingsManager,
    url: String,
    api_key: Option<String>,
) -> Result<()> {
    let settings = mgr.set_remote(&url, api_key)?;
    println!("Remote set to {}", settings.remote_url);
    Ok(())
}

pub fn handle_set_concurrency(mgr: &SettingsManager, n: usize) -> Result<()> {
    let settings = mgr.set_concurrency(n)?;
    println!("Push concurrency set to {}", settings.push_concurrency);
    Ok(())
}
