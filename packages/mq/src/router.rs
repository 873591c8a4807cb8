//! Explicit routing table from `(exchange, routing key)` to typed handlers.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::error::HandlerError;
use crate::models::{BroccoliError, BrokerMessage, MqQueue};

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send>>;
pub type Handler = Arc<dyn Fn(serde_json::Value) -> HandlerFuture + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey {
    pub exchange: String,
    pub routing_key: String,
}

impl RouteKey {
    pub fn new(exchange: impl Into<String>, routing_key: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
            routing_key: routing_key.into(),
        }
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.exchange, self.routing_key)
    }
}

/// A registered route: the queue it consumes and the handler it feeds.
#[derive(Clone)]
pub struct Route {
    pub key: RouteKey,
    pub queue: String,
    handler: Handler,
}

#[derive(Default, Clone)]
pub struct Router {
    routes: HashMap<RouteKey, Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a typed handler for `(exchange, routing_key)`, consumed from `queue`.
    ///
    /// Payloads that fail to deserialize into `T` are reported as
    /// [`HandlerError::Malformed`].
    pub fn route<T, F, Fut>(
        mut self,
        exchange: &str,
        routing_key: &str,
        queue: &str,
        handler: F,
    ) -> Self
    where
        T: DeserializeOwned + Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        let key = RouteKey::new(exchange, routing_key);
        let handler = Arc::new(handler);
        let erased: Handler = Arc::new(move |payload: serde_json::Value| -> HandlerFuture {
            let handler = Arc::clone(&handler);
            Box::pin(async move {
                let message: T = serde_json::from_value(payload).map_err(HandlerError::malformed)?;
                handler(message).await
            })
        });

        if self.routes.contains_key(&key) {
            warn!(route = %key, "Replacing existing route");
        }
        self.routes.insert(
            key.clone(),
            Route {
                key,
                queue: queue.to_string(),
                handler: erased,
            },
        );
        self
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.values()
    }

    /// Deliver one payload to the handler registered for `key`.
    pub async fn dispatch(
        &self,
        key: &RouteKey,
        payload: serde_json::Value,
    ) -> Result<(), HandlerError> {
        let route = self
            .routes
            .get(key)
            .ok_or_else(|| HandlerError::Malformed(format!("No route for {key}")))?;
        (route.handler)(payload).await
    }

    /// Consume every registered queue until all consumers stop.
    pub async fn run(self, mq: Arc<MqQueue>, concurrency: Option<usize>) {
        let mut consumers = JoinSet::new();
        for route in self.routes.into_values() {
            consumers.spawn(consume(Arc::clone(&mq), route, concurrency));
        }
        while let Some(joined) = consumers.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Consumer task panicked");
            }
        }
    }
}

async fn consume(mq: Arc<MqQueue>, route: Route, concurrency: Option<usize>) {
    info!(route = %route.key, queue = %route.queue, "Starting consumer");

    let key = route.key.clone();
    let handler = Arc::clone(&route.handler);
    let result = mq
        .process_messages(
            &route.queue,
            concurrency,
            None,
            move |message: BrokerMessage<serde_json::Value>| {
                let handler = Arc::clone(&handler);
                let key = key.clone();
                async move {
                    let task_id = message.task_id.to_string();
                    match handler(message.payload).await {
                        Ok(()) => {
                            debug!(route = %key, task_id = %task_id, "Message handled");
                            Ok(())
                        }
                        Err(HandlerError::Malformed(reason)) => {
                            error!(
                                route = %key,
                                task_id = %task_id,
                                reason = %reason,
                                "Dropping malformed message"
                            );
                            Ok(())
                        }
                        Err(HandlerError::Transient(reason)) => {
                            error!(
                                route = %key,
                                task_id = %task_id,
                                reason = %reason,
                                "Message handling failed, requeueing"
                            );
                            Err(BroccoliError::Job(reason))
                        }
                    }
                }
            },
        )
        .await;

    if let Err(e) = result {
        error!(route = %route.key, error = %e, "Consumer stopped unexpectedly");
    }
}
