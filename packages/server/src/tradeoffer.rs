//! Forwards owners' trade offer URLs to the trade-offer-URL service.

use std::time::Duration;

use reqwest::{Client, Url};
use serde::Serialize;
use tracing::{debug, instrument};

/// Credentials extracted from a trade offer URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TradeOfferUrl {
    pub steamid64: String,
    pub partner: String,
    pub token: String,
}

impl TradeOfferUrl {
    /// `None` unless the URL carries both `partner` and `token`.
    pub fn parse(steamid64: &str, url: &str) -> Option<Self> {
        let url = Url::parse(url).ok()?;
        let mut partner = None;
        let mut token = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "partner" if !value.is_empty() => partner = Some(value.into_owned()),
                "token" if !value.is_empty() => token = Some(value.into_owned()),
                _ => {}
            }
        }

        Some(Self {
            steamid64: steamid64.to_string(),
            partner: partner?,
            token: token?,
        })
    }
}

#[derive(Clone)]
pub struct TradeOfferUrlForwarder {
    client: Client,
    endpoint: String,
}

impl TradeOfferUrlForwarder {
    pub fn new(base_url: &str) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/tradeofferurls", base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    #[instrument(skip(self, record), fields(steamid64 = %record.steamid64))]
    pub async fn forward(&self, record: &TradeOfferUrl) -> Result<(), reqwest::Error> {
        self.client
            .post(&self.endpoint)
            .json(record)
            .send()
            .await?
            .error_for_status()?;
        debug!("Forwarded trade offer URL");
        Ok(())
    }
}
