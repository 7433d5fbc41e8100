//! Authoritative-thread dispatch queue.
//!
//! Worker jobs never touch the world directly. They push closures through a
//! `Dispatcher`; the thread that owns the `DispatchQueue` drains them between
//! simulation steps. Every closure re-checks its projectile's stopped flag
//! before mutating anything.

use std::thread::{self, ThreadId};

use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use tracing::trace;

/// A deferred world mutation.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Sending half. Cheap to clone, usable from any thread.
#[derive(Clone)]
pub struct Dispatcher {
    tx: UnboundedSender<Job>,
}

/// Receiving half, owned by the authoritative thread.
pub struct DispatchQueue {
    rx: UnboundedReceiver<Job>,
    owner: ThreadId,
}

/// Create a queue owned by the calling thread.
pub fn channel() -> (Dispatcher, DispatchQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        Dispatcher { tx },
        DispatchQueue {
            rx,
            owner: thread::current().id(),
        },
    )
}

impl Dispatcher {
    /// Queue `job` for the authoritative thread.
    pub fn defer(&self, job: impl FnOnce() + Send + 'static) {
        if self.tx.send(Box::new(job)).is_err() {
            trace!("dispatch queue closed, dropping job");
        }
    }
}

impl DispatchQueue {
    /// Run every queued job, including ones queued by jobs run here.
    /// Returns the number of jobs run.
    pub fn drain(&mut self) -> usize {
        debug_assert_eq!(
            thread::current().id(),
            self.owner,
            "dispatch queue drained off the authoritative thread"
        );
        let mut ran = 0;
        loop {
            match self.rx.try_recv() {
                Ok(job) => {
                    job();
                    ran += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        ran
    }

    /// Hand ownership to the calling thread (e.g. after moving the engine).
    pub fn adopt_current_thread(&mut self) {
        self.owner = thread::current().id();
    }
}
