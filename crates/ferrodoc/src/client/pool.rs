//! Pool of RPC client handles.
//!
//! This module defines [`ClientPool`], which multiplexes operations over a
//! growable set of handles while keeping every handle below a fixed number of
//! in-flight operations. The ceiling mirrors the backend's limit on
//! concurrent streams per connection; it is not a load balancer.
//!
//! Handles are created on demand by the factory and never evicted, so the
//! pool grows monotonically to the peak concurrency it has seen.

use core::future::Future;
use parking_lot::Mutex;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

type Factory<C> = Box<dyn Fn() -> C + Send + Sync>;

struct PooledClient<C> {
    id: usize,
    client: Arc<C>,
    load: Arc<AtomicUsize>,
}

/// Growable set of client handles with a per-handle concurrency ceiling.
pub struct ClientPool<C> {
    concurrency_limit: usize,
    clients: Mutex<Vec<PooledClient<C>>>,
    factory: Factory<C>,
}

impl<C> ClientPool<C> {
    /// Creates an empty pool. Handles are created lazily by `factory`.
    pub fn new<F>(concurrency_limit: usize, factory: F) -> Self
    where
        F: Fn() -> C + Send + Sync + 'static,
    {
        Self {
            concurrency_limit,
            clients: Mutex::new(Vec::new()),
            factory: Box::new(factory),
        }
    }

    /// Borrows a handle whose load is below the ceiling, creating one when
    /// every existing handle is saturated.
    ///
    /// The handle's load is incremented before this returns and decremented
    /// when the returned [`Lease`] (or its [`LoadGuard`]) is dropped.
    pub fn acquire(&self) -> Lease<C> {
        let mut clients = self.clients.lock();
        let index = match clients
            .iter()
            .position(|c| c.load.load(Ordering::Acquire) < self.concurrency_limit)
        {
            Some(index) => index,
            None => {
                let id = clients.len();
                clients.push(PooledClient {
                    id,
                    client: Arc::new((self.factory)()),
                    load: Arc::new(AtomicUsize::new(0)),
                });
                id
            }
        };

        // Increment under the lock so no other acquirer can observe the slot
        // below the ceiling in between.
        let slot = &clients[index];
        slot.load.fetch_add(1, Ordering::AcqRel);
        Lease {
            id: slot.id,
            client: Arc::clone(&slot.client),
            guard: LoadGuard {
                load: Arc::clone(&slot.load),
            },
        }
    }

    /// Runs `operation` with a pooled handle and releases the handle once the
    /// returned future settles, whatever its outcome.
    pub async fn run<F, Fut, R>(&self, operation: F) -> R
    where
        F: FnOnce(Arc<C>) -> Fut,
        Fut: Future<Output = R>,
    {
        let lease = self.acquire();
        operation(Arc::clone(lease.client())).await
    }

    /// Number of handles created so far.
    pub fn size(&self) -> usize {
        self.clients.lock().len()
    }

    /// Number of operations currently holding a handle.
    pub fn op_count(&self) -> usize {
        self.clients
            .lock()
            .iter()
            .map(|c| c.load.load(Ordering::Acquire))
            .sum()
    }

    /// In-flight operations per handle, in creation order.
    pub fn loads(&self) -> Vec<usize> {
        self.clients
            .lock()
            .iter()
            .map(|c| c.load.load(Ordering::Acquire))
            .collect()
    }

    pub fn concurrency_limit(&self) -> usize {
        self.concurrency_limit
    }
}

/// A borrowed handle. Dropping it releases the slot.
pub struct Lease<C> {
    id: usize,
    client: Arc<C>,
    guard: LoadGuard,
}

impl<C> Lease<C> {
    /// Position of the handle in the pool.
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    /// Keeps the slot occupied independently of the handle, e.g. for the
    /// lifetime of a stream opened through it.
    pub fn into_guard(self) -> LoadGuard {
        self.guard
    }
}

/// Occupies one slot of a pooled handle until dropped.
#[derive(Debug)]
pub struct LoadGuard {
    load: Arc<AtomicUsize>,
}

impl Drop for LoadGuard {
    fn drop(&mut self) {
        self.load.fetch_sub(1, Ordering::AcqRel);
    }
}
