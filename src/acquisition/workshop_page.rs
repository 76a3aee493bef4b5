use super::ExistenceCheck;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::warn;

const ITEM_URL: &str = "https://steamcommunity.com/sharedfiles/filedetails/";

/// Checks the public workshop page to see whether an item is still published.
pub struct WorkshopPageCheck {
    client: Client,
}

impl WorkshopPageCheck {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0")
            .build()?;
        Ok(Self { client })
    }
}

impl ExistenceCheck for WorkshopPageCheck {
    fn exists(&self, workshop_id: &str) -> bool {
        let response = match self
            .client
            .get(format!("{ITEM_URL}?id={workshop_id}"))
            .send()
        {
            Ok(response) => response,
            Err(err) => {
                warn!("Error checking workshop {}: {}", workshop_id, err);
                return true;
            }
        };
        if response.status() == StatusCode::NOT_FOUND {
            return false;
        }
        if !response.status().is_success() {
            return true;
        }
        match response.text() {
            Ok(html) => page_shows_item(&html),
            Err(err) => {
                warn!("Error reading workshop page {}: {}", workshop_id, err);
                true
            }
        }
    }
}

/// Interprets a workshop page body.
pub(crate) fn page_shows_item(html: &str) -> bool {
    if html.contains("error_ctn") && (html.contains("problem accessing") || html.contains("removed"))
    {
        return false;
    }
    html.contains("workshopItemTitle") || html.contains("workshopItemDescription")
}
