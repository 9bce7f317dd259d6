//! One-shot cancellation shared between a controller and any number of
//! workers.
//!
//! The controller keeps the [`Trigger`], workers hold a [`Tripwire`] which is
//! a future that resolves once the trigger is cancelled or dropped. After it
//! resolved, polling it again resolves immediately, so a worker can keep a
//! `&mut Tripwire` in a `select!` loop.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};

use tracing::debug;

#[derive(Default)]
struct Shared {
    tripped: AtomicBool,

    next_id: AtomicU64,
    wakers: Mutex<HashMap<u64, Waker>>,
}

impl Shared {
    fn tripped(&self) -> bool {
        self.tripped.load(Ordering::Acquire)
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn wakers(&self) -> MutexGuard<'_, HashMap<u64, Waker>> {
        self.wakers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn trip(&self) {
        if self.tripped.swap(true, Ordering::AcqRel) {
            return;
        }

        self.wakers().drain().for_each(|(_id, waker)| waker.wake());
    }
}

/// The controlling half, cancelling or dropping it resolves every
/// associated `Tripwire`.
pub struct Trigger {
    shared: Arc<Shared>,
}

impl Trigger {
    /// Cancel all associated tripwires, make them immediately resolved.
    pub fn cancel(self) {
        debug!(message = "trigger cancelled");

        self.shared.trip();
    }
}

impl Drop for Trigger {
    fn drop(&mut self) {
        self.shared.trip();
    }
}

pub struct Tripwire {
    shared: Arc<Shared>,
    id: u64,
}

impl Tripwire {
    pub fn new() -> (Trigger, Tripwire) {
        let shared = Arc::new(Shared::default());

        (
            Trigger {
                shared: Arc::clone(&shared),
            },
            Tripwire {
                id: shared.next_id(),
                shared,
            },
        )
    }

    /// Returns true once the trigger has been cancelled or dropped, without
    /// registering interest.
    pub fn is_cancelled(&self) -> bool {
        self.shared.tripped()
    }
}

impl Clone for Tripwire {
    fn clone(&self) -> Self {
        let shared = Arc::clone(&self.shared);
        let id = shared.next_id();

        Self { shared, id }
    }
}

impl Drop for Tripwire {
    fn drop(&mut self) {
        self.shared.wakers().remove(&self.id);
    }
}

impl Future for Tripwire {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.shared.tripped() {
            return Poll::Ready(());
        }

        let mut wakers = self.shared.wakers();
        // checked again with the lock held, `trip` drains under the same lock
        if self.shared.tripped() {
            return Poll::Ready(());
        }
        wakers.insert(self.id, cx.waker().clone());

        Poll::Pending
    }
}
