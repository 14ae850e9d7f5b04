//! Deferred-completion handles.
//!
//! A [`Deferred`] is the runtime's future: either already settled with an
//! outcome, or pending on some computation. Hosts running in sync mode only
//! ever produce settled handles.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::error::PhpError;
use crate::Value;

/// Result a deferred handle completes with.
pub type Outcome = Result<Value, PhpError>;

/// A value that may not have been computed yet.
pub struct Deferred {
    state: State,
}

enum State {
    /// Outcome is known. `None` once it has been taken by polling.
    Settled(Option<Outcome>),
    Pending(BoxFuture<'static, Outcome>),
}

impl Deferred {
    /// Create a handle already resolved with `value`.
    pub fn resolved(value: Value) -> Self {
        Self::settled(Ok(value))
    }

    /// Create a handle already rejected with `error`.
    pub fn rejected(error: PhpError) -> Self {
        Self::settled(Err(error))
    }

    /// Create a handle already settled with `outcome`.
    pub fn settled(outcome: Outcome) -> Self {
        Self {
            state: State::Settled(Some(outcome)),
        }
    }

    /// Create a handle completing when `future` does.
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = Outcome> + Send + 'static,
    {
        Self {
            state: State::Pending(future.boxed()),
        }
    }

    /// Create a handle that completes with `outcome` on a later scheduler tick.
    ///
    /// The handle yields to the executor once before completing, so it is
    /// queued behind any work already scheduled.
    pub fn on_next_tick(outcome: Outcome) -> Self {
        Self::pending(async move {
            tokio::task::yield_now().await;
            outcome
        })
    }

    /// Whether the outcome is already known.
    pub fn is_settled(&self) -> bool {
        matches!(self.state, State::Settled(Some(_)))
    }

    /// Take the outcome of a settled handle, or give the handle back.
    pub fn into_settled(self) -> Result<Outcome, Deferred> {
        match self.state {
            State::Settled(Some(outcome)) => Ok(outcome),
            state => Err(Deferred { state }),
        }
    }
}

impl Future for Deferred {
    type Output = Outcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.state {
            State::Settled(outcome) => match outcome.take() {
                Some(outcome) => Poll::Ready(outcome),
                // Already completed
                None => Poll::Pending,
            },
            State::Pending(future) => {
                let outcome = futures::ready!(future.as_mut().poll(cx));
                self.state = State::Settled(None);
                Poll::Ready(outcome)
            }
        }
    }
}

impl From<Value> for Deferred {
    fn from(value: Value) -> Self {
        Self::resolved(value)
    }
}

impl std::fmt::Debug for Deferred {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.state {
            State::Settled(Some(outcome)) => f.debug_tuple("Deferred::Settled").field(outcome).finish(),
            State::Settled(None) => f.write_str("Deferred::Completed"),
            State::Pending(_) => f.write_str("Deferred::Pending"),
        }
    }
}
