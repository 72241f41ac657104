//! Public Steam Community inventory client.
//!
//! Counts the trading cards a game has dropped into an account's inventory.
//! Pages through the listing (Steam caps a page at 2500 items) and classifies
//! failures so the session controller can tell a private inventory (fatal)
//! from a hiccup (retried on the next poll).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::core::types::{AppId, ProgressSnapshot, SourceKind};
use crate::io::config::SteamConfig;
use crate::io::progress::{ProgressError, ProgressSource};

const DEFAULT_BASE_URL: &str = "https://steamcommunity.com";
const PAGE_SIZE: u32 = 2500;
const PAGE_DELAY: Duration = Duration::from_millis(500);
pub(crate) const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// One page of `/inventory/{steamid}/{appid}/{contextid}`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct InventoryPage {
    pub success: Option<Value>,
    #[serde(alias = "Error")]
    pub error: Option<String>,
    pub assets: Vec<Asset>,
    pub descriptions: Vec<Description>,
    pub more_items: Option<Value>,
    pub last_assetid: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Asset {
    pub classid: String,
    pub amount: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Description {
    pub classid: String,
    pub market_fee_app: Option<Value>,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Tag {
    pub category: Option<String>,
    pub internal_name: Option<String>,
    pub localized_tag_name: Option<String>,
}

impl InventoryPage {
    fn is_failure(&self) -> bool {
        matches!(&self.success, Some(Value::Bool(false)))
            || self.success.as_ref().and_then(value_as_u64) == Some(0)
    }

    fn has_more(&self) -> bool {
        self.more_items.as_ref().and_then(value_as_u64) == Some(1)
            || matches!(self.more_items, Some(Value::Bool(true)))
    }
}

impl Description {
    fn belongs_to(&self, app_id: AppId) -> bool {
        if self.market_fee_app.as_ref().and_then(value_as_u64) == Some(u64::from(app_id.0)) {
            return true;
        }
        let game_tag = format!("appid_{app_id}");
        self.tags.iter().any(|tag| {
            tag.category.as_deref() == Some("Game")
                && tag.internal_name.as_deref() == Some(game_tag.as_str())
        })
    }

    fn is_trading_card(&self) -> bool {
        self.tags.iter().any(|tag| {
            tag.category.as_deref() == Some("item_class")
                && tag.internal_name.as_deref() == Some("item_class_2")
                && tag.localized_tag_name.as_deref() == Some("Trading Card")
        })
    }
}

/// Steam encodes numbers as JSON numbers or decimal strings, depending on the field.
fn value_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Steam's "no items in this context" error, as a name or as EResult 42.
fn is_no_match(message: &str) -> bool {
    message.contains("k_EResultNoMatch")
        || message
            .split(|c: char| !c.is_ascii_alphanumeric())
            .any(|token| token == "42")
}

/// Trading cards for `app_id` on one page; stacked assets count by `amount`.
pub fn count_cards(page: &InventoryPage, app_id: AppId) -> u32 {
    let descriptions: HashMap<&str, &Description> = page
        .descriptions
        .iter()
        .map(|desc| (desc.classid.as_str(), desc))
        .collect();
    page.assets
        .iter()
        .filter(|asset| {
            descriptions
                .get(asset.classid.as_str())
                .is_some_and(|desc| desc.belongs_to(app_id) && desc.is_trading_card())
        })
        .map(|asset| {
            let amount = asset.amount.as_ref().and_then(value_as_u64).unwrap_or(1);
            u32::try_from(amount).unwrap_or(u32::MAX)
        })
        .fold(0u32, u32::saturating_add)
}

/// Blocking HTTP client for the inventory listing.
pub struct InventoryClient {
    http: reqwest::blocking::Client,
    base_url: String,
    community_app_id: u32,
    context_id: u64,
    page_delay: Duration,
}

impl InventoryClient {
    pub fn new(steam: &SteamConfig) -> anyhow::Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(steam.request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            community_app_id: steam.community_app_id,
            context_id: steam.trading_card_context_id,
            page_delay: PAGE_DELAY,
        })
    }

    /// Points the client at a local fixture server.
    #[cfg(test)]
    pub(crate) fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self.page_delay = Duration::ZERO;
        self
    }

    /// Total trading cards for `app_id` in `steam_id`'s inventory.
    #[instrument(skip(self), fields(app_id = %app_id))]
    pub fn card_count(&self, steam_id: &str, app_id: AppId) -> Result<u32, ProgressError> {
        let url = format!(
            "{}/inventory/{}/{}/{}",
            self.base_url, steam_id, self.community_app_id, self.context_id
        );
        let mut start_assetid: Option<String> = None;
        let mut page_num = 1u32;
        let mut total = 0u32;
        let mut items = 0usize;

        loop {
            let page = self.fetch_page(&url, start_assetid.as_deref(), page_num)?;

            if page.is_failure() {
                let message = page.error.clone().unwrap_or_else(|| "unknown error".to_string());
                if is_no_match(&message) {
                    info!(
                        page_num,
                        "no matching items in card context, assuming the rest of the inventory is empty"
                    );
                    return Ok(total);
                }
                if message.to_ascii_lowercase().contains("private") {
                    return Err(ProgressError::PrivateInventory(message));
                }
                return Err(ProgressError::InventoryUnavailable(format!(
                    "Steam error on page {page_num}: {message}"
                )));
            }

            if page.assets.is_empty() && page.descriptions.is_empty() {
                if page_num == 1 {
                    debug!("inventory listing is empty");
                }
                break;
            }

            let cards = count_cards(&page, app_id);
            total = total.saturating_add(cards);
            items += page.assets.len();
            debug!(page_num, cards, items = page.assets.len(), "inventory page counted");

            if !page.has_more() {
                break;
            }
            let Some(last_assetid) = page.last_assetid else {
                warn!(page_num, "more_items set without last_assetid, stopping pagination");
                break;
            };
            start_assetid = Some(last_assetid);
            page_num += 1;
            std::thread::sleep(self.page_delay);
        }

        debug!(pages = page_num, items, cards = total, "inventory fetch complete");
        Ok(total)
    }

    fn fetch_page(
        &self,
        url: &str,
        start_assetid: Option<&str>,
        page_num: u32,
    ) -> Result<InventoryPage, ProgressError> {
        let mut query = vec![
            ("l", "english".to_string()),
            ("count", PAGE_SIZE.to_string()),
        ];
        if let Some(start) = start_assetid {
            query.push(("start_assetid", start.to_string()));
        }
        debug!(page_num, url, "fetching inventory page");

        let resp = self
            .http
            .get(url)
            .query(&query)
            .send()
            .map_err(request_error)?;
        let status = resp.status();
        if status == StatusCode::FORBIDDEN {
            return Err(ProgressError::PrivateInventory(format!(
                "HTTP 403 on page {page_num}; the inventory is private or inaccessible"
            )));
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProgressError::InventoryUnavailable(
                "rate limited by Steam (HTTP 429); consider a longer monitoring interval"
                    .to_string(),
            ));
        }
        if !status.is_success() {
            return Err(ProgressError::InventoryUnavailable(format!(
                "HTTP {status} on page {page_num}"
            )));
        }

        let body = resp.text().map_err(request_error)?;
        serde_json::from_str(&body).map_err(|err| {
            ProgressError::InventoryUnavailable(format!(
                "could not decode inventory page {page_num}: {err}"
            ))
        })
    }
}

fn request_error(err: reqwest::Error) -> ProgressError {
    if err.is_connect() {
        return ProgressError::EnvironmentUnavailable(format!("cannot reach Steam: {err}"));
    }
    if err.is_timeout() {
        return ProgressError::InventoryUnavailable(format!("request timed out: {err}"));
    }
    ProgressError::InventoryUnavailable(err.to_string())
}

/// Progress source backed by live inventory counts.
pub struct InventorySnapshotSource {
    client: InventoryClient,
    steam_id: String,
}

impl InventorySnapshotSource {
    pub fn new(client: InventoryClient, steam_id: impl Into<String>) -> Self {
        Self {
            client,
            steam_id: steam_id.into(),
        }
    }
}

impl ProgressSource for InventorySnapshotSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Inventory
    }

    fn snapshot(&mut self, app_id: AppId, now: Instant) -> Result<ProgressSnapshot, ProgressError> {
        let absolute_count = self.client.card_count(&self.steam_id, app_id)?;
        Ok(ProgressSnapshot {
            absolute_count,
            observed_at: now,
        })
    }
}
