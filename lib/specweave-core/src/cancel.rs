use std::sync::Arc;

use tokio::sync::watch;

use crate::BundleError;

/// Cooperative cancellation signal shared by a bundling run.
///
/// Clones observe the same signal. Once cancelled, it stays cancelled.
///
/// # Example
///
/// ```rust
/// use specweave_core::Cancellation;
///
/// let cancellation = Cancellation::new();
/// let observer = cancellation.clone();
///
/// cancellation.cancel();
/// assert!(observer.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct Cancellation {
    sender: Arc<watch::Sender<bool>>,
}

impl Cancellation {
    /// Creates a signal that is not cancelled yet.
    pub fn new() -> Self {
        let (sender, _receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Fires the signal.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    /// Returns `true` once [`Self::cancel`] has been called on any clone.
    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Fails with [`BundleError::Cancelled`] if the signal has fired.
    ///
    /// # Errors
    ///
    /// Returns [`BundleError::Cancelled`] when cancelled.
    pub fn check(&self) -> Result<(), BundleError> {
        if self.is_cancelled() {
            Err(BundleError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Completes when the signal fires.
    pub async fn cancelled(&self) {
        let mut receiver = self.sender.subscribe();
        if receiver.wait_for(|cancelled| *cancelled).await.is_err() {
            // the sender lives as long as `self`
            std::future::pending::<()>().await;
        }
    }
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}
