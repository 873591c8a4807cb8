pub mod error;
pub mod models;
pub mod publisher;
pub mod router;

pub use error::{HandlerError, MqError};
pub use models::{BrokerMessage, BroccoliError, MqConfig, MqQueue, init_mq};
pub use publisher::{BrokerPublisher, MemoryPublisher, Publisher};
pub use router::{RouteKey, Router};

pub type Mq = MqQueue;
