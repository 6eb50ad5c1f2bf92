use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracklog_core::EntityKind;

fn default_push_concurrency() -> usize {
    tracklog_config::DEFAULT_PUSH_CONCURRENCY
}

fn default_requests_per_second() -> u32 {
    tracklog_config::DEFAULT_REQUESTS_PER_SECOND
}

fn default_window_days() -> u32 {
    tracklog_config::DEFAULT_WINDOW_DAYS
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    /// Base URL of the REST API, e.g. `https://example.org/rest/v1`.
    pub remote_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Where the local database lives. Defaults to the platform data dir.
    #[serde(default)]
    pub data_dir: Option<String>,
    #[serde(default = "default_push_concurrency")]
    pub push_concurrency: usize,
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
    #[serde(default = "default_window_days")]
    pub window_days: u32,
    /// Remote collection names that differ from the defaults.
    #[serde(default)]
    pub collections: BTreeMap<EntityKind, String>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            remote_url: String::new(),
            api_key: None,
            data_dir: None,
            push_concurrency: default_push_concurrency(),
            requests_per_second: default_requests_per_second(),
            window_days: default_window_days(),
            collections: BTreeMap::new(),
        }
    }
}

impl AppSettings {
    pub fn collection_name(&self, kind: EntityKind) -> &str {
        self.collections
            .get(&kind)
            .map(String::as_str)
            .unwrap_or_else(|| kind.default_collection())
    }

    pub fn is_configured(&self) -> bool {
        !self.remote_url.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparse_settings_file_gets_defaults() {
        let settings: AppSettings =
            serde_json::from_str(r#"{ "remote_url": "http://localhost:3000/rest/v1" }"#).unwrap();
        assert_eq!(settings.push_concurrency, tracklog_config::DEFAULT_PUSH_CONCURRENCY);
        assert_eq!(settings.window_days, 7);
        assert!(settings.is_configured());
        assert_eq!(settings.collection_name(EntityKind::AgendaEntry), "agenda_entries");
    }

    #[test]
    fn collection_overrides_apply_per_kind() {
        let mut settings = AppSettings::default();
        settings
            .collections
            .insert(EntityKind::Person, "contacts".into());
        assert_eq!(settings.collection_name(EntityKind::Person), "contacts");
        assert_eq!(settings.collection_name(EntityKind::Vehicle), "vehicles");
        assert!(!settings.is_configured());
    }
}
