//! Scroll offsets remembered per view.
//!
//! Offsets are keyed by `PageState::view_key`. A remembered offset is handed
//! back only once the data for that same view has finished loading, so a
//! slow response for an old page cannot move the viewport of the new one.

use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
pub struct ScrollMemory {
    offsets: HashMap<String, f64>,
    pending: Option<String>,
}

impl ScrollMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the offset for a view. Negative or non-finite offsets become 0.
    pub fn remember(&mut self, view_key: &str, offset: f64) {
        let offset = if offset.is_finite() && offset > 0.0 { offset } else { 0.0 };
        self.offsets.insert(view_key.to_string(), offset);
    }

    /// Offset to apply after a successful load of `view_key`; 0 for unseen views.
    pub fn restore_after_load(&self, view_key: &str) -> f64 {
        self.offsets.get(view_key).copied().unwrap_or(0.0)
    }

    /// Mark `view_key` as the load currently in progress.
    pub fn begin_load(&mut self, view_key: &str) {
        self.pending = Some(view_key.to_string());
    }

    /// Finish a load. Returns the offset to apply if `view_key` is still the
    /// pending load, `None` if a newer load superseded it.
    pub fn finish_load(&mut self, view_key: &str) -> Option<f64> {
        if self.pending.as_deref() != Some(view_key) {
            tracing::debug!(view_key, pending = ?self.pending, "ignoring superseded load");
            return None;
        }
        self.pending = None;
        Some(self.restore_after_load(view_key))
    }

    pub fn pending(&self) -> Option<&str> {
        self.pending.as_deref()
    }
}
