use serde::Deserialize;

/// App-level MQ configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct MqAppConfig {
    /// Redis connection URL. Default: "redis://localhost:6379".
    #[serde(default = "default_mq_url")]
    pub url: String,
    /// Connection pool size. Default: 5.
    #[serde(default = "default_mq_pool_size")]
    pub pool_size: u8,
    /// Concurrent handlers per consumed queue. Default: 4.
    #[serde(default = "default_mq_concurrency")]
    pub concurrency: usize,
    /// Queue bound to `bptf-event.created` / `listing-update`. Default: "saveListingsFromEvents".
    #[serde(default = "default_listing_update_queue")]
    pub listing_update_queue: String,
    /// Queue bound to `bptf-event.created` / `listing-delete`. Default: "deleteListingsFromEvents".
    #[serde(default = "default_listing_delete_queue")]
    pub listing_delete_queue: String,
    /// Queue bound to `bptf-snapshot.created` / `snapshot`. Default: "saveListingsFromSnapshots".
    #[serde(default = "default_snapshot_queue")]
    pub snapshot_queue: String,
    /// Queues that receive a copy of each outbound destination.
    /// A destination without a binding is published to a queue of the same name.
    #[serde(default)]
    pub fanout: Vec<FanoutBinding>,
}

/// Queues subscribed to one outbound destination.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct FanoutBinding {
    pub destination: String,
    pub queues: Vec<String>,
}

fn default_mq_url() -> String {
    "redis://localhost:6379".into()
}
fn default_mq_pool_size() -> u8 {
    5
}
fn default_mq_concurrency() -> usize {
    4
}
fn default_listing_update_queue() -> String {
    "saveListingsFromEvents".into()
}
fn default_listing_delete_queue() -> String {
    "deleteListingsFromEvents".into()
}
fn default_snapshot_queue() -> String {
    "saveListingsFromSnapshots".into()
}

impl Default for MqAppConfig {
    fn default() -> Self {
        Self {
            url: default_mq_url(),
            pool_size: default_mq_pool_size(),
            concurrency: default_mq_concurrency(),
            listing_update_queue: default_listing_update_queue(),
            listing_delete_queue: default_listing_delete_queue(),
            snapshot_queue: default_snapshot_queue(),
            fanout: Vec::new(),
        }
    }
}

impl MqAppConfig {
    /// Queues a message for `destination` must be copied to.
    pub fn queues_for(&self, destination: &str) -> Vec<String> {
        self.fanout
            .iter()
            .find(|b| b.destination == destination)
            .map(|b| b.queues.clone())
            .unwrap_or_else(|| vec![destination.to_string()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbound_destination_uses_own_queue() {
        let config = MqAppConfig::default();
        assert_eq!(
            config.queues_for("bptf-listing.updated"),
            vec!["bptf-listing.updated".to_string()]
        );
    }

    #[test]
    fn test_bound_destination_fans_out() {
        let config = MqAppConfig {
            fanout: vec![FanoutBinding {
                destination: "bptf-listing.updated".into(),
                queues: vec!["prices".into(), "search".into()],
            }],
            ..Default::default()
        };
        assert_eq!(
            config.queues_for("bptf-listing.updated"),
            vec!["prices".to_string(), "search".to_string()]
        );
        assert_eq!(
            config.queues_for("bptf-listing.deleted"),
            vec!["bptf-listing.deleted".to_string()]
        );
    }
}
