//! Set-once, read-many predictor handle shared by request handlers.

use std::sync::{Arc, OnceLock};

use super::Predictor;

/// Shared slot holding the process-wide predictor.
///
/// The slot starts empty and can be filled exactly once. Clones share the
/// same slot, so the handle can be given to the router before acquisition
/// finishes. Reads after publication take no lock.
#[derive(Clone, Default)]
pub struct ModelHandle {
    slot: Arc<OnceLock<Arc<dyn Predictor>>>,
}

impl ModelHandle {
    /// Create an empty handle.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a handle that already holds `predictor`.
    pub fn loaded(predictor: Arc<dyn Predictor>) -> Self {
        let handle = Self::empty();
        // A fresh slot cannot already be filled.
        let _ = handle.slot.set(predictor);
        handle
    }

    /// Publish a predictor.
    ///
    /// Returns the rejected predictor if the handle was already filled; the
    /// existing predictor is kept.
    pub fn publish(&self, predictor: Arc<dyn Predictor>) -> Result<(), Arc<dyn Predictor>> {
        self.slot.set(predictor)
    }

    /// The published predictor, if any.
    pub fn get(&self) -> Option<&Arc<dyn Predictor>> {
        self.slot.get()
    }

    /// Whether a predictor has been published.
    pub fn is_loaded(&self) -> bool {
        self.slot.get().is_some()
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
