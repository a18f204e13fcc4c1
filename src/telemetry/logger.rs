//! Per-provider logging sink
//!
//! Each provider instance owns a [`ProviderLogger`]. It starts out discarding
//! everything and can be pointed at any [`Dispatch`] before or after the
//! provider is used.

use std::future::Future;
use std::sync::{Arc, RwLock};

use tracing::instrument::{WithDispatch, WithSubscriber};
use tracing::Dispatch;

#[derive(Clone, Debug)]
pub struct ProviderLogger {
    dispatch: Arc<RwLock<Dispatch>>,
}

impl Default for ProviderLogger {
    fn default() -> Self {
        Self::discard()
    }
}

impl ProviderLogger {
    /// Logger that drops every event
    pub fn discard() -> Self {
        Self::new(Dispatch::none())
    }

    pub fn new(dispatch: Dispatch) -> Self {
        Self {
            dispatch: Arc::new(RwLock::new(dispatch)),
        }
    }

    /// Replace the sink; affects operations started afterwards
    pub fn set(&self, dispatch: Dispatch) {
        let mut current = self.dispatch.write().unwrap_or_else(|e| e.into_inner());
        *current = dispatch;
    }

    pub fn dispatch(&self) -> Dispatch {
        self.dispatch.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Run `operation` with this logger as its default subscriber
    pub fn scope<F: Future>(&self, operation: F) -> WithDispatch<F> {
        operation.with_subscriber(self.dispatch())
    }
}
