//! Deferred render work.
//!
//! A multi-producer queue of work items that only the render owner may run.
//! Producers never block and never touch the GPU themselves.

use crossbeam_channel::{Receiver, Sender};

use super::RenderOwner;

/// Queue of pending work for the render-owning thread.
///
/// Items are opaque to the queue; the owner decides how to run them in
/// [`RenderWorkQueue::run_all`].
pub struct RenderWorkQueue<W> {
    sender: Sender<W>,
    receiver: Receiver<W>,
    owner: RenderOwner,
}

impl<W: Send> RenderWorkQueue<W> {
    /// Creates an unbounded queue owned by `owner`.
    #[must_use]
    pub fn new(owner: RenderOwner) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            sender,
            receiver,
            owner,
        }
    }

    /// Returns a cloneable handle producers use to enqueue work.
    #[must_use]
    pub fn sender(&self) -> RenderWorkSender<W> {
        RenderWorkSender {
            sender: self.sender.clone(),
            owner: self.owner,
        }
    }

    /// Returns the thread allowed to run the queued work.
    #[inline]
    #[must_use]
    pub const fn owner(&self) -> RenderOwner {
        self.owner
    }

    /// Returns the number of items waiting to run.
    #[inline]
    #[must_use]
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Runs every item queued so far, in submission order.
    ///
    /// Items enqueued while draining are picked up in the same call.
    /// Returns the number of items run.
    ///
    /// # Panics
    ///
    /// Panics if called off the render-owning thread.
    #[track_caller]
    pub fn run_all(&self, mut run: impl FnMut(W)) -> usize {
        self.owner.assert_owner("RenderWorkQueue::run_all");

        let mut count = 0;
        for work in self.receiver.try_iter() {
            run(work);
            count += 1;
        }

        if count > 0 {
            tracing::debug!(count, "ran deferred render work");
        }
        count
    }
}

impl<W> std::fmt::Debug for RenderWorkQueue<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderWorkQueue")
            .field("pending", &self.receiver.len())
            .field("owner", &self.owner)
            .finish()
    }
}

/// Producer side of a [`RenderWorkQueue`]. Safe to use from any thread.
pub struct RenderWorkSender<W> {
    sender: Sender<W>,
    owner: RenderOwner,
}

impl<W> RenderWorkSender<W> {
    /// Returns the thread that runs the work this sender enqueues.
    #[inline]
    #[must_use]
    pub const fn owner(&self) -> RenderOwner {
        self.owner
    }
}

impl<W: Send> RenderWorkSender<W> {
    /// Enqueues work for the render owner.
    ///
    /// Returns false if the queue has been dropped, in which case the work
    /// is dropped too: with no render owner left there is nothing to release into.
    pub fn enqueue(&self, work: W) -> bool {
        match self.sender.send(work) {
            Ok(()) => true,
            Err(_) => {
                tracing::debug!("render work queue is gone, dropping work item");
                false
            }
        }
    }
}

impl<W> Clone for RenderWorkSender<W> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            owner: self.owner,
        }
    }
}

impl<W> std::fmt::Debug for RenderWorkSender<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderWorkSender")
            .field("pending", &self.sender.len())
            .field("owner", &self.owner)
            .finish()
    }
}
