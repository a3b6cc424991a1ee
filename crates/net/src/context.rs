//! The shared thread pool every channel's strand and timers run on.
//!
//! Exposed only as a runtime handle: callers never reach into the pool
//! directly, they go through [`Strand`](crate::strand::Strand) or
//! [`Timer`](crate::timers::Timer), both of which schedule work onto it.

use std::future::Future;

use tokio::runtime::{Handle, Runtime};

/// A process-wide pool of worker threads. One `Context` is normally created
/// at startup and shared by every channel the process opens.
pub struct Context {
    runtime: Runtime,
}

impl Context {
    /// Build a pool with `worker_threads` OS threads (minimum 1) driving a
    /// shared multi-threaded tokio runtime.
    pub fn new(worker_threads: usize) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(worker_threads.max(1))
            .thread_name("satoshi-net-worker")
            .enable_all()
            .build()?;
        Ok(Self { runtime })
    }

    /// A cheap, cloneable handle callers can use to spawn work from outside
    /// the runtime (e.g. from a synchronous caller).
    pub fn handle(&self) -> Handle {
        self.runtime.handle().clone()
    }

    /// Spawn a future onto the pool directly.
    pub fn spawn<F>(&self, fut: F) -> tokio::task::JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.runtime.spawn(fut)
    }

    /// Enter the runtime, running `fut` to completion on the calling thread.
    /// Used at process startup to drive the top-level accept/connect loop.
    pub fn block_on<F: Future>(&self, fut: F) -> F::Output {
        self.runtime.block_on(fut)
    }

    /// Wait for all outstanding work to finish and shut the pool down.
    /// Consumes the context: once joined there is no pool left to spawn on.
    pub fn join(self) {
        self.runtime.shutdown_background();
    }
}
