//! Display names from the Steam store API, best effort.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, instrument};

use crate::core::types::AppId;
use crate::io::config::SteamConfig;
use crate::io::inventory::USER_AGENT;

const DEFAULT_BASE_URL: &str = "https://store.steampowered.com";

/// Extract `name` from an `appdetails` response body.
pub fn parse_app_name(body: &str, app_id: AppId) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let entry = value.get(app_id.to_string())?;
    if entry.get("success").and_then(Value::as_bool) != Some(true) {
        return None;
    }
    entry
        .pointer("/data/name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// Caching name resolver. Lookups never fail; the AppID is the fallback.
pub struct GameNames {
    http: Option<reqwest::blocking::Client>,
    base_url: String,
    cache: HashMap<AppId, String>,
}

impl GameNames {
    pub fn new(steam: &SteamConfig) -> Self {
        let http = if steam.lookup_game_names {
            reqwest::blocking::Client::builder()
                .user_agent(USER_AGENT)
                .timeout(Duration::from_secs(steam.request_timeout_secs))
                .build()
                .ok()
        } else {
            None
        };
        Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            cache: HashMap::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    #[instrument(skip(self), fields(app_id = %app_id))]
    pub fn name(&mut self, app_id: AppId) -> String {
        if let Some(name) = self.cache.get(&app_id) {
            return name.clone();
        }
        let name = self
            .fetch(app_id)
            .unwrap_or_else(|| format!("AppID {app_id}"));
        self.cache.insert(app_id, name.clone());
        name
    }

    fn fetch(&self, app_id: AppId) -> Option<String> {
        let http = self.http.as_ref()?;
        let url = format!("{}/api/appdetails", self.base_url);
        let resp = http
            .get(&url)
            .query(&[("appids", app_id.to_string())])
            .send()
            .inspect_err(|err| debug!(err = %err, "store lookup failed"))
            .ok()?;
        if !resp.status().is_success() {
            debug!(status = %resp.status(), "store lookup returned an error status");
            return None;
        }
        let body = resp.text().ok()?;
        let name = parse_app_name(&body, app_id);
        debug!(name = ?name, "store lookup finished");
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FixtureServer;

    #[test]
    fn parses_name_from_appdetails() {
        let body = r#"{"220": {"success": true, "data": {"name": "Half-Life 2", "type": "game"}}}"#;
        assert_eq!(
            parse_app_name(body, AppId(220)).as_deref(),
            Some("Half-Life 2")
        );
        assert_eq!(parse_app_name(body, AppId(620)), None);
        assert_eq!(
            parse_app_name(r#"{"220": {"success": false}}"#, AppId(220)),
            None
        );
        assert_eq!(parse_app_name("<html>", AppId(220)), None);
    }

    #[test]
    fn lookups_are_cached() {
        let server = FixtureServer::serve(vec![(
            200,
            r#"{"220": {"success": true, "data": {"name": "Half-Life 2"}}}"#.to_string(),
        )]);
        let mut names = GameNames::new(&SteamConfig::default()).with_base_url(server.base_url());
        assert_eq!(names.name(AppId(220)), "Half-Life 2");
        assert_eq!(names.name(AppId(220)), "Half-Life 2");
        assert_eq!(server.requests().len(), 1);
        assert!(server.requests()[0].contains("appids=220"));
    }

    #[test]
    fn disabled_or_failed_lookup_falls_back_to_app_id() {
        let steam = SteamConfig {
            lookup_game_names: false,
            ..SteamConfig::default()
        };
        assert_eq!(GameNames::new(&steam).name(AppId(220)), "AppID 220");

        let server = FixtureServer::serve(vec![(500, String::new())]);
        let mut names = GameNames::new(&SteamConfig::default()).with_base_url(server.base_url());
        assert_eq!(names.name(AppId(620)), "AppID 620");
    }
}
