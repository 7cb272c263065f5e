//! Cooperative cancellation for long-running section operations.
//!
//! Cancellation is advisory: running operations poll
//! [`CancellationToken::is_cancelled`] or register a listener; nothing is
//! interrupted forcibly.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use dashmap::DashMap;

use crate::error::LockResultExt;
use crate::reference::panic_message;

type Listener = Box<dyn FnOnce() + Send>;
type TokenMap = DashMap<String, CancellationToken>;

struct TokenInner {
    id: String,
    cancelled: AtomicBool,
    listeners: Mutex<Vec<Listener>>,
    registry: Weak<TokenMap>,
}

/// Single-shot, thread-safe cancellation signal with listener fan-out.
///
/// Clones share the same signal.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("id", &self.inner.id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl CancellationToken {
    /// Create a token not tied to any registry.
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_registry(id.into(), Weak::new())
    }

    fn with_registry(id: String, registry: Weak<TokenMap>) -> Self {
        Self {
            inner: Arc::new(TokenInner {
                id,
                cancelled: AtomicBool::new(false),
                listeners: Mutex::new(Vec::new()),
                registry,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Run `callback` when the token is cancelled.
    ///
    /// If the token is already cancelled the callback runs immediately on
    /// the calling thread, before this method returns.
    pub fn listener<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut listeners = self
                .inner
                .listeners
                .lock()
                .recover_poison("CancellationToken::listener");
            // Checked under the lock so a concurrent cancel cannot miss us.
            if !self.is_cancelled() {
                listeners.push(Box::new(callback));
                return;
            }
        }
        self.run_listener(Box::new(callback));
    }

    /// Cancel the token. Only the first call has an effect.
    ///
    /// Listeners run in registration order; a panicking listener is logged
    /// and the remaining ones still run.
    pub fn cancel(&self) {
        let listeners = {
            let mut listeners = self
                .inner
                .listeners
                .lock()
                .recover_poison("CancellationToken::cancel");
            if self.inner.cancelled.swap(true, Ordering::AcqRel) {
                return;
            }
            std::mem::take(&mut *listeners)
        };

        log::debug!(
            target: "seclsp::cancel",
            "cancelling '{}' ({} listeners)",
            self.inner.id,
            listeners.len()
        );
        for listener in listeners {
            self.run_listener(listener);
        }
    }

    /// Remove the token from the registry that issued it. Does not cancel.
    pub fn close(&self) {
        if let Some(registry) = self.inner.registry.upgrade() {
            registry.remove_if(&self.inner.id, |_, token| {
                Arc::ptr_eq(&token.inner, &self.inner)
            });
        }
    }

    fn run_listener(&self, listener: Listener) {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(listener)) {
            log::error!(
                target: "seclsp::cancel",
                "cancellation listener for '{}' panicked: {}",
                self.inner.id,
                panic_message(payload.as_ref())
            );
        }
    }
}

/// Issues tokens for externally-initiated operations, keyed by id.
#[derive(Debug, Default)]
pub struct CancellationRegistry {
    tokens: Arc<TokenMap>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh token under `id`, replacing any token previously held
    /// under the same id.
    pub fn issue(&self, id: impl Into<String>) -> CancellationToken {
        let id = id.into();
        let token = CancellationToken::with_registry(id.clone(), Arc::downgrade(&self.tokens));
        self.tokens.insert(id, token.clone());
        token
    }

    pub fn get(&self, id: &str) -> Option<CancellationToken> {
        self.tokens.get(id).map(|token| token.clone())
    }

    /// Cancel the token held under `id`. Returns false if none is held.
    pub fn cancel(&self, id: &str) -> bool {
        match self.get(id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Cancels and closes a token when dropped.
///
/// Held across an async request so that abandoning the request (the client
/// cancelled it and the future was dropped) cancels the work it started.
#[derive(Debug)]
pub struct CancelOnDrop(Option<CancellationToken>);

impl CancelOnDrop {
    pub fn new(token: CancellationToken) -> Self {
        Self(Some(token))
    }

    /// Close the token without cancelling it.
    pub fn disarm(mut self) {
        if let Some(token) = self.0.take() {
            token.close();
        }
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(token) = self.0.take() {
            token.cancel();
            token.close();
        }
    }
}
