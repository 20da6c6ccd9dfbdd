// Copyright 2026 action-engine contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! The engine's worker pools.
//!
//! Everything here sits on top of a single tokio [`Runtime`], matching the rest of this
//! workspace's rule of "one shared runtime, several named bounded gates" rather than a pool
//! of independent runtimes. [`Executor`] owns (or borrows) the runtime; [`WorkerPool`]
//! bounds concurrency on top of it with a two-tier priority queue; [`BackgroundQueue`] is the
//! fire-and-forget low-priority queue used for asynchronous cache writes, which the driver
//! must drain at shutdown.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::oneshot;
use tokio::task::{Id, JoinSet};

/// Wraps a tokio [`Handle`], either owning the [`Runtime`] it was built from or merely
/// borrowing one created elsewhere (e.g. by `#[tokio::main]` or `#[tokio::test]`).
///
/// An owned Executor shuts its Runtime down when explicitly asked to; a borrowed one treats
/// `shutdown` as a no-op, since some other owner is responsible for the Runtime's lifecycle.
#[derive(Clone)]
pub struct Executor {
    runtime: Arc<Mutex<Option<Runtime>>>,
    handle: Handle,
}

impl Executor {
    /// Wrap the ambient runtime (e.g. inside `#[tokio::test]`). Dropping every clone of the
    /// returned Executor will not shut that runtime down.
    pub fn new() -> Executor {
        Executor {
            runtime: Arc::new(Mutex::new(None)),
            handle: Handle::current(),
        }
    }

    /// Build and own a fresh multi-threaded runtime with `worker_threads` core threads.
    pub fn new_owned(worker_threads: usize) -> Result<Executor, String> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(worker_threads.max(1))
            .enable_all()
            .build()
            .map_err(|e| format!("failed to start tokio runtime: {e}"))?;
        let handle = runtime.handle().clone();
        Ok(Executor {
            runtime: Arc::new(Mutex::new(Some(runtime))),
            handle,
        })
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn spawn<F>(&self, future: F) -> tokio::task::JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(future)
    }

    pub fn spawn_blocking<F, R>(&self, f: F) -> tokio::task::JoinHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.handle.spawn_blocking(f)
    }

    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.handle.block_on(future)
    }

    /// Shut down an owned Runtime, leaking any tasks that don't complete within `timeout`.
    /// A no-op on a borrowed Executor.
    pub fn shutdown(&self, timeout: Duration) {
        let Some(runtime) = self.runtime.lock().take() else {
            return;
        };
        let start = Instant::now();
        runtime.shutdown_timeout(timeout);
        if start.elapsed() > timeout {
            log::warn!("executor shutdown took longer than {timeout:?}; tasks may have been leaked");
        }
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

/// Which of two priority lanes a submission should queue behind.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Priority {
    High,
    Normal,
}

struct PoolState {
    available: usize,
    high_waiters: VecDeque<oneshot::Sender<()>>,
    normal_waiters: VecDeque<oneshot::Sender<()>>,
}

/// A named, bounded gate: at most `capacity` bodies run concurrently through [`WorkerPool::run`].
/// High-priority submissions are released ahead of normal-priority ones whenever a slot frees,
/// but never preempt a body that has already started — this is admission ordering, not
/// cooperative preemption.
#[derive(Clone)]
pub struct WorkerPool {
    name: &'static str,
    capacity: usize,
    state: Arc<Mutex<PoolState>>,
}

impl WorkerPool {
    pub fn new(name: &'static str, capacity: usize) -> WorkerPool {
        WorkerPool {
            name,
            capacity: capacity.max(1),
            state: Arc::new(Mutex::new(PoolState {
                available: capacity.max(1),
                high_waiters: VecDeque::new(),
                normal_waiters: VecDeque::new(),
            })),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    async fn acquire(&self, priority: Priority) -> PoolPermit {
        let waiter = {
            let mut state = self.state.lock();
            if state.available > 0 {
                state.available -= 1;
                None
            } else {
                let (tx, rx) = oneshot::channel();
                match priority {
                    Priority::High => state.high_waiters.push_back(tx),
                    Priority::Normal => state.normal_waiters.push_back(tx),
                }
                Some(rx)
            }
        };
        if let Some(rx) = waiter {
            let _ = rx.await;
        }
        log::trace!("pool `{}`: acquired a slot at {priority:?} priority", self.name);
        PoolPermit {
            state: self.state.clone(),
        }
    }

    /// Run `body` once a slot is available, releasing the slot when it completes (including
    /// on panic-unwind, via `Drop`).
    pub async fn run<F: Future>(&self, priority: Priority, body: F) -> F::Output {
        let _permit = self.acquire(priority).await;
        body.await
    }
}

struct PoolPermit {
    state: Arc<Mutex<PoolState>>,
}

impl Drop for PoolPermit {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if let Some(tx) = state
            .high_waiters
            .pop_front()
            .or_else(|| state.normal_waiters.pop_front())
        {
            // If the receiver already dropped (cancelled wait), just hand the slot back.
            if tx.send(()).is_err() {
                state.available += 1;
            }
        } else {
            state.available += 1;
        }
    }
}

/// The low-priority, fire-and-forget queue used for asynchronous cache writes (§4.G). Tasks
/// are spawned immediately but tracked, so that [`BackgroundQueue::drain`] can be awaited at
/// shutdown without the caller needing to hold onto individual JoinHandles.
#[derive(Clone)]
pub struct BackgroundQueue {
    inner: Arc<Mutex<Option<BackgroundQueueInner>>>,
}

struct BackgroundQueueInner {
    tasks: JoinSet<()>,
}

impl BackgroundQueue {
    pub fn new() -> BackgroundQueue {
        BackgroundQueue {
            inner: Arc::new(Mutex::new(Some(BackgroundQueueInner {
                tasks: JoinSet::new(),
            }))),
        }
    }

    /// Enqueue a background task on `executor`. Returns immediately; the body may still be
    /// running when this returns.
    pub fn submit<F>(&self, executor: &Executor, body: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut guard = self.inner.lock();
        let Some(inner) = guard.as_mut() else {
            log::warn!("background task submitted after the queue was drained; dropping it");
            return;
        };
        inner.tasks.spawn_on(body, executor.handle());
    }

    /// Wait for all outstanding background tasks to complete, up to `timeout`. Must be called
    /// exactly once; subsequent calls are no-ops that log and return immediately.
    pub async fn drain(&self, timeout: Duration) {
        let mut inner = match self.inner.lock().take() {
            Some(inner) => inner,
            None => {
                log::debug!("background queue drained more than once");
                return;
            }
        };

        if inner.tasks.is_empty() {
            return;
        }

        let mut deadline = Box::pin(tokio::time::sleep(timeout));
        loop {
            tokio::select! {
                biased;
                _ = &mut deadline => break,
                next = inner.tasks.join_next_with_id() => {
                    match next {
                        Some(Ok((_id, ()))) => continue,
                        Some(Err(err)) => log_join_error(err.id(), &err),
                        None => break,
                    }
                }
            }
        }

        if !inner.tasks.is_empty() {
            log::warn!(
                "{} background cache write(s) did not complete within {timeout:?}; aborting them",
                inner.tasks.len()
            );
            inner.tasks.abort_all();
        }
    }
}

impl Default for BackgroundQueue {
    fn default() -> Self {
        Self::new()
    }
}

fn log_join_error(id: Id, err: &tokio::task::JoinError) {
    log::error!("background cache write task {id:?} failed: {err}");
}

#[cfg(test)]
mod tests;
