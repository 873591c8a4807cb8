use std::sync::Arc;

use crate::ingest::Ingestor;
use crate::recheck::RecheckScheduler;
use crate::store::ListingStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ListingStore>,
    pub ingestor: Arc<Ingestor>,
    pub scheduler: Arc<RecheckScheduler>,
}

impl AppState {
    /// Reads go to the same store the ingestor writes to.
    pub fn new(ingestor: Arc<Ingestor>, scheduler: Arc<RecheckScheduler>) -> Self {
        Self {
            store: Arc::clone(ingestor.store()),
            ingestor,
            scheduler,
        }
    }
}
