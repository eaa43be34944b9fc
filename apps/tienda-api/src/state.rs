//! Shared application state.

use std::sync::Arc;

use crate::config::ProcessorSettings;
use crate::processor::PaymentProcessor;
use tienda_core::receipt::StoreProfile;
use tienda_db::Database;

/// Cloned into every handler; all fields are cheap handles.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    /// Store details printed on receipts.
    pub store: Arc<StoreProfile>,
    pub processor: Arc<dyn PaymentProcessor>,
    /// Return and notification URLs sent with each preference.
    pub processor_settings: Arc<ProcessorSettings>,
}

impl AppState {
    pub fn new(
        db: Database,
        store: StoreProfile,
        processor: Arc<dyn PaymentProcessor>,
        processor_settings: ProcessorSettings,
    ) -> Self {
        AppState {
            db,
            store: Arc::new(store),
            processor,
            processor_settings: Arc::new(processor_settings),
        }
    }
}
