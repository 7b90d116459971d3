//! Single FIFO delivery lane served by a dedicated thread.

use std::sync::mpsc as std_mpsc;
use std::thread::{self, ThreadId};

use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, warn};

use crate::error::Result;

pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs enqueued jobs one at a time, in enqueue order.
///
/// The thread drains its queue with `blocking_recv`, so no async runtime is
/// needed. It exits once the lane is dropped and the queue is empty.
pub(crate) struct DeliveryLane {
    sender: UnboundedSender<Job>,
    worker: ThreadId,
}

impl DeliveryLane {
    pub(crate) fn spawn(thread_name: &str) -> Result<Self> {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();
        let handle = thread::Builder::new()
            .name(thread_name.to_string())
            .spawn(move || {
                while let Some(job) = receiver.blocking_recv() {
                    job();
                }
                debug!("delivery lane drained and stopped");
            })?;
        Ok(Self {
            sender,
            worker: handle.thread().id(),
        })
    }

    pub(crate) fn enqueue(&self, job: Job) {
        if self.sender.send(job).is_err() {
            warn!("delivery lane closed, dropping job");
        }
    }

    /// Whether the caller is running on the lane's own thread.
    pub(crate) fn is_current(&self) -> bool {
        thread::current().id() == self.worker
    }

    /// Block until every job enqueued before this call has run.
    ///
    /// Returns immediately when called from the lane thread itself, where
    /// waiting would deadlock.
    pub(crate) fn flush(&self) {
        if self.is_current() {
            debug!("flush called from the delivery lane, skipping");
            return;
        }
        let (done_tx, done_rx) = std_mpsc::channel::<()>();
        self.enqueue(Box::new(move || {
            let _ = done_tx.send(());
        }));
        // A closed lane drops the job and with it the sender, so this
        // returns instead of hanging.
        let _ = done_rx.recv();
    }
}
