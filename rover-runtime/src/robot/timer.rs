// Copyright (C) 2024 Laixer Equipment B.V.
// All rights reserved.
//
// This software may be modified and distributed under the terms
// of the included license.  See the LICENSE file for details.

use std::{
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::task::JoinHandle;

/// Identifies one arming of a `TimedAction`.
///
/// The token is handed to the callback so it can verify, under whatever lock
/// guards the owner, that it still is the armed action.
#[derive(Clone, Debug)]
pub struct ActionToken(Arc<AtomicBool>);

impl ActionToken {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn same(&self, other: &ActionToken) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

struct Pending {
    token: ActionToken,
    handle: JoinHandle<()>,
}

/// One-shot cancellable delayed callback.
///
/// At most one action is armed at any time. The action runs as a background
/// task, so scheduling never blocks the caller.
#[derive(Default)]
pub struct TimedAction {
    pending: Option<Pending>,
}

impl TimedAction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer to invoke `callback` after `delay`.
    ///
    /// A zero delay arms nothing, the action never fires. Any previously
    /// armed action is cancelled.
    pub fn schedule<F, Fut>(&mut self, delay: Duration, callback: F)
    where
        F: FnOnce(ActionToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();

        if delay.is_zero() {
            return;
        }

        let token = ActionToken::new();
        let task_token = token.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            if !task_token.is_cancelled() {
                callback(task_token).await;
            }
        });

        self.pending = Some(Pending { token, handle });
    }

    /// Cancel the armed action, if any.
    pub fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.token.cancel();
            pending.handle.abort();
        }
    }

    /// Whether an action is armed and has not yet completed.
    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    /// Disarm on expiry.
    ///
    /// Returns `true` if `token` belongs to the armed action, which is then
    /// considered fired. A stale or cancelled token returns `false` and
    /// leaves the timer untouched.
    pub fn complete(&mut self, token: &ActionToken) -> bool {
        match &self.pending {
            Some(pending) if pending.token.same(token) && !token.is_cancelled() => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }
}

impl Drop for TimedAction {
    fn drop(&mut self) {
        self.cancel();
    }
}
