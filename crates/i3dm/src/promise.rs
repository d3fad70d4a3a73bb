//! Settle-once promises observable by any number of waiters.

use tokio::sync::watch;

use crate::error::{Error, Result};

type Slot<T> = Option<Result<T>>;

/// The settling side of a [`Promise`].
///
/// Only the first call to [`resolve`](Self::resolve) or
/// [`reject`](Self::reject) has any effect.
#[derive(Debug)]
pub struct Deferred<T> {
    tx: watch::Sender<Slot<T>>,
}

impl<T: Clone> Deferred<T> {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// A handle for observing the outcome.
    #[must_use]
    pub fn promise(&self) -> Promise<T> {
        Promise {
            rx: self.tx.subscribe(),
        }
    }

    /// Resolve with `value`. Returns `false` if already settled.
    pub fn resolve(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    /// Reject with `error`. Returns `false` if already settled.
    pub fn reject(&self, error: Error) -> bool {
        self.settle(Err(error))
    }

    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.tx.borrow().is_some()
    }

    fn settle(&self, outcome: Result<T>) -> bool {
        self.tx.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(outcome);
            true
        })
    }
}

impl<T: Clone> Default for Deferred<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// An awaitable view of a [`Deferred`] outcome.
#[derive(Debug, Clone)]
pub struct Promise<T> {
    rx: watch::Receiver<Slot<T>>,
}

impl<T: Clone> Promise<T> {
    /// The outcome, if settled.
    #[must_use]
    pub fn peek(&self) -> Option<Result<T>> {
        self.rx.borrow().clone()
    }

    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// Wait for the outcome.
    ///
    /// If the settling side is dropped without settling, this yields
    /// [`Error::Destroyed`].
    pub async fn wait(&self) -> Result<T> {
        let mut rx = self.rx.clone();
        let outcome = match rx.wait_for(Option::is_some).await {
            Ok(slot) => (*slot).clone(),
            Err(_) => None,
        };
        outcome.unwrap_or(Err(Error::Destroyed))
    }
}
