//! Deferred-work scheduling for debounced effect recomputes.
//!
//! Instead of a real animation-frame callback, pending work is an explicit
//! queue drained by [`crate::pipeline::CompositingPipeline::tick`], which
//! makes the debounce behavior testable by advancing virtual frames.

use crate::core::LayerId;

/// Single-slot-per-layer pending work queue. Scheduling the same layer
/// twice before a tick coalesces into one entry, and drain order is
/// deterministic (first scheduled, first served).
#[derive(Debug, Default)]
pub struct TickScheduler {
    pending: Vec<LayerId>,
}

impl TickScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `id` for the next tick. Returns `false` when the layer was
    /// already queued (the request coalesces).
    pub fn schedule(&mut self, id: LayerId) -> bool {
        if self.pending.contains(&id) {
            return false;
        }
        self.pending.push(id);
        true
    }

    pub fn has_pending(&self, id: LayerId) -> bool {
        self.pending.contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drain all queued work for this tick.
    pub fn take(&mut self) -> Vec<LayerId> {
        std::mem::take(&mut self.pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_schedules_coalesce() {
        let mut scheduler = TickScheduler::new();
        assert!(scheduler.schedule(LayerId(1)));
        assert!(!scheduler.schedule(LayerId(1)));
        assert!(scheduler.schedule(LayerId(2)));
        assert_eq!(scheduler.take(), vec![LayerId(1), LayerId(2)]);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn take_resets_pending_state() {
        let mut scheduler = TickScheduler::new();
        scheduler.schedule(LayerId(5));
        assert!(scheduler.has_pending(LayerId(5)));
        scheduler.take();
        assert!(!scheduler.has_pending(LayerId(5)));
        // the same layer may be scheduled again after a drain
        assert!(scheduler.schedule(LayerId(5)));
    }
}
