//! Active instance registry
//!
//! Only one player on a page plays at a time. The instance that starts
//! playing claims the registry, and the previous holder is paused before the
//! claim completes.

use crate::types::InstanceId;
use std::sync::{Mutex, MutexGuard, Weak};
use tracing::debug;

/// An instance the registry can pause
pub trait Pausable: Send + Sync {
    fn instance_id(&self) -> InstanceId;

    /// Pause right away, without touching the registry
    fn force_pause(&self);
}

struct Holder {
    id: InstanceId,
    instance: Weak<dyn Pausable>,
}

/// Page-wide record of the currently playing instance
#[derive(Default)]
pub struct ActiveInstanceRegistry {
    holder: Mutex<Option<Holder>>,
}

impl ActiveInstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn holder(&self) -> MutexGuard<'_, Option<Holder>> {
        match self.holder.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Make `instance` the active one, pausing any other holder first
    ///
    /// The caller must not hold locks the previous holder's `force_pause`
    /// needs.
    pub fn claim(&self, id: InstanceId, instance: Weak<dyn Pausable>) {
        let mut holder = self.holder();

        if let Some(previous) = holder.as_ref().filter(|h| h.id != id) {
            if let Some(previous) = previous.instance.upgrade() {
                debug!(previous = %previous.instance_id(), next = %id, "Pausing previous active instance");
                previous.force_pause();
            }
        }

        *holder = Some(Holder { id, instance });
    }

    /// Clear the claim if `id` still holds it
    pub fn release(&self, id: InstanceId) -> bool {
        let mut holder = self.holder();
        if holder.as_ref().is_some_and(|h| h.id == id) {
            *holder = None;
            true
        } else {
            false
        }
    }

    pub fn active(&self) -> Option<InstanceId> {
        self.holder().as_ref().map(|h| h.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Fake {
        id: InstanceId,
        paused: AtomicUsize,
    }

    impl Fake {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                id: InstanceId::new(),
                paused: AtomicUsize::new(0),
            })
        }

        fn weak(self: &Arc<Self>) -> Weak<dyn Pausable> {
            let weak: Weak<Fake> = Arc::downgrade(self);
            weak
        }
    }

    impl Pausable for Fake {
        fn instance_id(&self) -> InstanceId {
            self.id
        }

        fn force_pause(&self) {
            self.paused.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_claim_pauses_previous() {
        let registry = ActiveInstanceRegistry::new();
        let a = Fake::new();
        let b = Fake::new();

        registry.claim(a.id, a.weak());
        registry.claim(b.id, b.weak());

        assert_eq!(a.paused.load(Ordering::SeqCst), 1);
        assert_eq!(b.paused.load(Ordering::SeqCst), 0);
        assert_eq!(registry.active(), Some(b.id));
    }

    #[test]
    fn test_reclaim_does_not_pause_self() {
        let registry = ActiveInstanceRegistry::new();
        let a = Fake::new();

        registry.claim(a.id, a.weak());
        registry.claim(a.id, a.weak());

        assert_eq!(a.paused.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_release_only_by_holder() {
        let registry = ActiveInstanceRegistry::new();
        let a = Fake::new();
        let b = Fake::new();

        registry.claim(a.id, a.weak());
        assert!(!registry.release(b.id));
        assert_eq!(registry.active(), Some(a.id));
        assert!(registry.release(a.id));
        assert_eq!(registry.active(), None);
    }

    #[test]
    fn test_dropped_holder_is_skipped() {
        let registry = ActiveInstanceRegistry::new();
        let a = Fake::new();
        let b = Fake::new();

        registry.claim(a.id, a.weak());
        drop(a);
        registry.claim(b.id, b.weak());

        assert_eq!(registry.active(), Some(b.id));
    }
}
