//! Cancellation registry: request id -> the token that stops its work.
//!
//! The lock is only held for the map operation itself. Each registration
//! carries a generation so a guard never removes an entry that a later run
//! with the same id put in place.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio_util::sync::CancellationToken;

struct ActiveRequest {
    token: CancellationToken,
    generation: u64,
}

#[derive(Default)]
pub struct CancellationRegistry {
    active: Mutex<HashMap<String, ActiveRequest>>,
    next_generation: AtomicU64,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ActiveRequest>> {
        self.active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register `token` under `id`. Returns `None` when `id` is already active.
    pub fn register(
        self: &Arc<Self>,
        id: &str,
        token: CancellationToken,
    ) -> Option<ActiveRequestGuard> {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let mut active = self.lock();
        if active.contains_key(id) {
            return None;
        }
        active.insert(
            id.to_string(),
            ActiveRequest {
                token: token.clone(),
                generation,
            },
        );
        Some(ActiveRequestGuard {
            registry: Arc::clone(self),
            id: id.to_string(),
            token,
            generation,
        })
    }

    /// Cancel and forget `id`. Unknown ids are ignored.
    pub fn cancel(&self, id: &str) -> bool {
        let removed = self.lock().remove(id);
        match removed {
            Some(request) => {
                request.token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) -> usize {
        let drained: Vec<ActiveRequest> = self.lock().drain().map(|(_, request)| request).collect();
        for request in &drained {
            request.token.cancel();
        }
        drained.len()
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn release(&self, id: &str, generation: u64) {
        let mut active = self.lock();
        if active
            .get(id)
            .map(|request| request.generation == generation)
            .unwrap_or(false)
        {
            active.remove(id);
        }
    }
}

/// Removes its registry entry when dropped, on every exit path of a run.
pub struct ActiveRequestGuard {
    registry: Arc<CancellationRegistry>,
    id: String,
    token: CancellationToken,
    generation: u64,
}

impl ActiveRequestGuard {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for ActiveRequestGuard {
    fn drop(&mut self) {
        self.registry.release(&self.id, self.generation);
    }
}
