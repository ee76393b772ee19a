//! Session lock manager for the Keyfold crypto core.
//!
//! An unlocked session holds the derived master key in memory for a bounded
//! window; when the window lapses or [`SessionManager::lock`] is called the
//! key is dropped (zeroized) and every subscriber is told exactly once. The
//! manager is an ordinary constructible value with an injected [`Clock`], so
//! tests drive expiry deterministically and embedders can run several
//! independent sessions side by side.
//!
//! Expiry is evaluated lazily: every read-path method checks the clock before
//! answering, so a caller can never observe a stale `Unlocked` past the
//! deadline even if no background task is running.

mod clock;
mod error;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{SessionError, SessionResult};

use chrono::{DateTime, Duration, Utc};
use keyfold_crypto::DerivedKey;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{debug, info};

/// Session timing knobs.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// How long a session stays unlocked after `start`/`extend`.
    pub duration: Duration,
    /// Remaining time at or below which [`SessionManager::is_warning`]
    /// reports true.
    pub warning_threshold: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            duration: Duration::seconds(300),
            warning_threshold: Duration::seconds(30),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Locked,
    Unlocked,
}

/// Handle returned by [`SessionManager::subscribe`]; pass it back to
/// [`SessionManager::unsubscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

type StateListener = Arc<dyn Fn(SessionState) + Send + Sync>;

struct SessionInner {
    state: SessionState,
    expiry: Option<DateTime<Utc>>,
    master_key: Option<DerivedKey>,
    listeners: HashMap<u64, StateListener>,
    next_listener: u64,
}

/// Lock-state machine guarding resident key material.
///
/// All methods take `&self`; the manager is safe to share behind an `Arc`.
pub struct SessionManager {
    config: SessionConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<SessionInner>,
    /// true = locked. Drives [`SessionManager::run_cancellable`].
    lock_signal: watch::Sender<bool>,
}

impl SessionManager {
    /// A manager on the system clock.
    pub fn new(config: SessionConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: SessionConfig, clock: Arc<dyn Clock>) -> Self {
        let (lock_signal, _) = watch::channel(true);
        Self {
            config,
            clock,
            inner: Mutex::new(SessionInner {
                state: SessionState::Locked,
                expiry: None,
                master_key: None,
                listeners: HashMap::new(),
                next_listener: 0,
            }),
            lock_signal,
        }
    }

    /// Unlocks the session without shelving a key. Expiry is armed at
    /// now + duration.
    pub fn start(&self) {
        self.unlock_with(None);
    }

    /// Unlocks the session and shelves the master key until the next Locked
    /// transition.
    pub fn start_with_key(&self, master_key: DerivedKey) {
        self.unlock_with(Some(master_key));
    }

    fn unlock_with(&self, master_key: Option<DerivedKey>) {
        let expiry = self.clock.now() + self.config.duration;
        let (was_locked, listeners) = {
            let mut inner = self.inner.lock().unwrap();
            let was_locked = inner.state == SessionState::Locked;
            inner.state = SessionState::Unlocked;
            inner.expiry = Some(expiry);
            inner.master_key = master_key;
            (was_locked, snapshot_listeners(&inner))
        };

        self.lock_signal.send_replace(false);
        if was_locked {
            info!(%expiry, "session unlocked");
            notify(&listeners, SessionState::Unlocked);
        }
    }

    /// Re-arms the expiry to now + duration. Extending does not stack; two
    /// extends in a row leave one window, not two.
    pub fn extend(&self) -> SessionResult<()> {
        let now = self.clock.now();
        let expired = {
            let mut inner = self.inner.lock().unwrap();
            match self.expire_if_due(&mut inner, now) {
                Some(listeners) => Some(listeners),
                None => {
                    if inner.state == SessionState::Locked {
                        return Err(SessionError::SessionExpired);
                    }
                    inner.expiry = Some(now + self.config.duration);
                    None
                }
            }
        };
        if let Some(listeners) = expired {
            self.signal_locked(&listeners);
            return Err(SessionError::SessionExpired);
        }
        debug!("session extended");
        Ok(())
    }

    /// Locks immediately. The resident key is dropped; subscribers are
    /// notified once, and only if the session was actually unlocked.
    pub fn lock(&self) {
        let listeners = {
            let mut inner = self.inner.lock().unwrap();
            if inner.state == SessionState::Locked {
                return;
            }
            Some(self.transition_locked(&mut inner))
        };
        if let Some(listeners) = listeners {
            self.signal_locked(&listeners);
        }
    }

    /// Whether the session is currently unlocked and before its expiry.
    pub fn is_valid(&self) -> bool {
        self.poll() == SessionState::Unlocked
    }

    /// Validation a decrypt path must run immediately before each use of key
    /// material.
    pub fn validate(&self) -> SessionResult<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(SessionError::SessionExpired)
        }
    }

    /// Current state after applying any due timeout.
    pub fn poll(&self) -> SessionState {
        let now = self.clock.now();
        let listeners = {
            let mut inner = self.inner.lock().unwrap();
            let state = inner.state;
            match self.expire_if_due(&mut inner, now) {
                Some(listeners) => listeners,
                None => return state,
            }
        };
        self.signal_locked(&listeners);
        SessionState::Locked
    }

    /// Time left before auto-lock. `None` when locked; clamped at zero.
    pub fn remaining(&self) -> Option<Duration> {
        if self.poll() == SessionState::Locked {
            return None;
        }
        let inner = self.inner.lock().unwrap();
        let expiry = inner.expiry?;
        Some((expiry - self.clock.now()).max(Duration::zero()))
    }

    /// True when the session is unlocked but inside the warning window.
    pub fn is_warning(&self) -> bool {
        matches!(self.remaining(), Some(left) if left <= self.config.warning_threshold)
    }

    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().unwrap().expiry
    }

    /// Restores a persisted expiry. Honored only if still in the future;
    /// a stale expiry leaves the session Locked. The key shelf is never
    /// restored — resumed sessions hold no resident key.
    pub fn resume(&self, expiry: DateTime<Utc>) -> bool {
        if expiry <= self.clock.now() {
            debug!(%expiry, "stale expiry ignored, session stays locked");
            return false;
        }
        let (was_locked, listeners) = {
            let mut inner = self.inner.lock().unwrap();
            let was_locked = inner.state == SessionState::Locked;
            inner.state = SessionState::Unlocked;
            inner.expiry = Some(expiry);
            (was_locked, snapshot_listeners(&inner))
        };
        self.lock_signal.send_replace(false);
        if was_locked {
            info!(%expiry, "session resumed");
            notify(&listeners, SessionState::Unlocked);
        }
        true
    }

    /// A copy of the shelved master key, if the session is valid and one was
    /// shelved at unlock. Validates first; a resumed session yields `None`.
    pub fn master_key(&self) -> SessionResult<Option<DerivedKey>> {
        self.validate()?;
        Ok(self.inner.lock().unwrap().master_key.clone())
    }

    /// Registers a callback invoked on every Locked/Unlocked transition.
    pub fn subscribe<F>(&self, listener: F) -> SubscriberId
    where
        F: Fn(SessionState) + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_listener;
        inner.next_listener += 1;
        inner.listeners.insert(id, Arc::new(listener));
        SubscriberId(id)
    }

    /// Removes a subscriber. Removing twice is a no-op.
    pub fn unsubscribe(&self, id: SubscriberId) {
        self.inner.lock().unwrap().listeners.remove(&id.0);
    }

    /// Runs a future that must not outlive the unlocked session.
    ///
    /// If the session locks while the future is pending, the future is
    /// dropped and `Cancelled` is returned. If the session turns out to be
    /// expired once the future completes, its output is discarded rather
    /// than handed to the caller.
    pub async fn run_cancellable<F, T>(&self, fut: F) -> SessionResult<T>
    where
        F: Future<Output = T>,
    {
        // Subscribe before validating. lock() flips the state before it
        // signals, so a lock that lands between these two lines is caught by
        // validate; one that lands after is caught by the watch.
        let mut locked = self.lock_signal.subscribe();
        self.validate()?;
        tokio::pin!(fut);
        loop {
            tokio::select! {
                out = &mut fut => {
                    self.validate().map_err(|_| SessionError::Cancelled)?;
                    return Ok(out);
                }
                changed = locked.changed() => {
                    if changed.is_err() || *locked.borrow() {
                        debug!("in-flight operation cancelled by lock");
                        return Err(SessionError::Cancelled);
                    }
                }
            }
        }
    }

    /// Runs a blocking closure (typically a slow KDF) on the blocking thread
    /// pool, still subject to cancellation by lock.
    ///
    /// Unlike handing a compute-bound body to [`Self::run_cancellable`]
    /// directly, this never occupies an executor thread, so the lock signal
    /// can preempt it. A cancelled closure keeps running detached on the
    /// pool; its output is dropped, never handed out.
    pub async fn run_blocking_cancellable<F, T>(&self, work: F) -> SessionResult<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.run_cancellable(async {
            tokio::task::spawn_blocking(work)
                .await
                .map_err(|e| SessionError::TaskFailed(e.to_string()))
        })
        .await?
    }

    /// Applies the timeout transition if the expiry has passed. Returns the
    /// listeners to notify, which the caller invokes after dropping the lock.
    fn expire_if_due(
        &self,
        inner: &mut SessionInner,
        now: DateTime<Utc>,
    ) -> Option<Vec<StateListener>> {
        if inner.state == SessionState::Unlocked && inner.expiry.is_some_and(|e| now >= e) {
            return Some(self.transition_locked(inner));
        }
        None
    }

    fn transition_locked(&self, inner: &mut SessionInner) -> Vec<StateListener> {
        inner.state = SessionState::Locked;
        inner.expiry = None;
        // DerivedKey zeroizes on drop.
        inner.master_key = None;
        snapshot_listeners(inner)
    }

    fn signal_locked(&self, listeners: &[StateListener]) {
        info!("session locked");
        self.lock_signal.send_replace(true);
        notify(listeners, SessionState::Locked);
    }
}

fn snapshot_listeners(inner: &SessionInner) -> Vec<StateListener> {
    inner.listeners.values().cloned().collect()
}

// Callbacks run outside the state lock so a listener may call back into the
// manager without deadlocking.
fn notify(listeners: &[StateListener], state: SessionState) {
    for listener in listeners {
        listener(state);
    }
}
