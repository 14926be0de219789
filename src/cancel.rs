//! Cancellation shared by a command, its listing and every task it spawns.

use std::future::Future;
use tokio::sync::watch;
use tracing::{info, warn};

/// A level-triggered cancellation signal.
///
/// Once cancelled it stays cancelled; clones observe the same state.
#[derive(Clone)]
pub struct Cancellation {
    sender: watch::Sender<bool>,
}

impl Cancellation {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self { sender }
    }

    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Completes once the signal has been raised.
    pub async fn cancelled(&self) {
        let mut receiver = self.sender.subscribe();
        // The sender lives in `self`, so `wait_for` can only fail after drop.
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }

    /// Runs `future` unless cancellation fires first.
    pub async fn run<F, T>(&self, future: F) -> Option<T>
    where
        F: Future<Output = T>,
    {
        tokio::select! {
            biased;
            _ = self.cancelled() => None,
            result = future => Some(result),
        }
    }

    /// Cancels on Ctrl-C. The listener lives as long as the runtime.
    pub fn cancel_on_ctrl_c(&self) {
        let cancellation = self.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("received Ctrl-C, cancelling outstanding work");
                    cancellation.cancel();
                }
                Err(err) => warn!("failed to install Ctrl-C handler: {err}"),
            }
        });
    }
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}
