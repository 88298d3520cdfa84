//! Single-producer, single-consumer FIFO of install URLs
//!
//! The listener thread owns the only [`InstallSender`]; the main context owns
//! the only [`InstallReceiver`]. Neither side ever blocks.

use crossbeam_channel::{Receiver, Sender, TryRecvError, unbounded};

/// Create a connected sender/receiver pair.
#[must_use]
pub fn install_queue() -> (InstallSender, InstallReceiver) {
    let (tx, rx) = unbounded();
    (InstallSender { tx }, InstallReceiver { rx })
}

/// Producer half. Not `Clone`: there is one producer.
#[derive(Debug)]
pub struct InstallSender {
    tx: Sender<String>,
}

impl InstallSender {
    /// Enqueue a URL. Returns `false` if the receiver is gone.
    pub fn push(&self, url: String) -> bool {
        self.tx.send(url).is_ok()
    }
}

/// Consumer half. Not `Clone`: there is one consumer.
#[derive(Debug)]
pub struct InstallReceiver {
    rx: Receiver<String>,
}

impl InstallReceiver {
    /// Dequeue the oldest URL, or `None` if the queue is empty.
    #[must_use]
    pub fn try_pop(&self) -> Option<String> {
        match self.rx.try_recv() {
            Ok(url) => Some(url),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
