//! Resolution session: local cache, update policy and event sinks shared by
//! every resolution call on one connector.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime};

use crate::cache::LocalCache;
use crate::error::{RepoError, Result};
use crate::events::{
    LoggingRepositoryListener, LoggingTransferListener, RepositoryEvent, RepositoryListener,
    TransferListener,
};

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// When cached metadata and snapshot artifacts are checked again remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdatePolicy {
    /// On every request.
    Always,
    /// Never once cached.
    Never,
    /// Once per calendar day (UTC).
    #[default]
    Daily,
    /// After the given number of minutes.
    Interval(u64),
}

impl UpdatePolicy {
    /// Whether something last checked at `last` must be checked again at `now`.
    pub fn is_due(&self, last: SystemTime, now: SystemTime) -> bool {
        match self {
            UpdatePolicy::Always => true,
            UpdatePolicy::Never => false,
            UpdatePolicy::Daily => {
                let day = |t: SystemTime| {
                    t.duration_since(SystemTime::UNIX_EPOCH)
                        .map(|d| d.as_secs() / SECS_PER_DAY)
                        .unwrap_or(0)
                };
                day(last) < day(now)
            }
            UpdatePolicy::Interval(minutes) => {
                let age = now.duration_since(last).unwrap_or(Duration::ZERO);
                age >= Duration::from_secs(minutes.saturating_mul(60))
            }
        }
    }
}

impl FromStr for UpdatePolicy {
    type Err = RepoError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || RepoError::InvalidPolicy {
            value: s.to_string(),
        };
        match s.trim() {
            "always" => Ok(UpdatePolicy::Always),
            "never" => Ok(UpdatePolicy::Never),
            "daily" => Ok(UpdatePolicy::Daily),
            other => other
                .strip_prefix("interval:")
                .and_then(|m| m.trim().parse().ok())
                .map(UpdatePolicy::Interval)
                .ok_or_else(invalid),
        }
    }
}

impl fmt::Display for UpdatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdatePolicy::Always => f.write_str("always"),
            UpdatePolicy::Never => f.write_str("never"),
            UpdatePolicy::Daily => f.write_str("daily"),
            UpdatePolicy::Interval(m) => write!(f, "interval:{m}"),
        }
    }
}

/// Memoised remote answer for one URL.
#[derive(Debug, Clone, Copy)]
struct Check {
    at: SystemTime,
    found: bool,
}

/// What the session knows about a remote resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Known {
    /// Nothing fresh; ask the repository.
    Unknown,
    /// Fresh and present; use the cached copy.
    Present,
    /// Fresh and absent; do not ask again.
    Missing,
}

/// Mutable per-session state, guarded by the session lock.
#[derive(Debug, Default)]
pub struct SessionState {
    checks: HashMap<String, Check>,
}

impl SessionState {
    /// Classify a URL given its cached copy's age, if any.
    pub(crate) fn known(
        &self,
        url: &str,
        cached: Option<SystemTime>,
        policy: UpdatePolicy,
        now: SystemTime,
    ) -> Known {
        if let Some(check) = self.checks.get(url) {
            if !policy.is_due(check.at, now) {
                return match (check.found, cached) {
                    (false, _) => Known::Missing,
                    (true, Some(_)) => Known::Present,
                    (true, None) => Known::Unknown,
                };
            }
            return Known::Unknown;
        }
        match cached {
            Some(at) if !policy.is_due(at, now) => Known::Present,
            _ => Known::Unknown,
        }
    }

    pub(crate) fn record(&mut self, url: &str, found: bool, at: SystemTime) {
        self.checks.insert(url.to_string(), Check { at, found });
    }

    /// Forget everything learned so far.
    pub fn reset(&mut self) {
        self.checks.clear();
    }
}

/// Long-lived state shared by all resolution calls on one connector.
///
/// Calls serialise on the internal lock, so one session may be used from
/// several threads.
pub struct ResolutionSession {
    cache: LocalCache,
    update_policy: UpdatePolicy,
    offline: bool,
    transfer_listener: Arc<dyn TransferListener>,
    repository_listener: Arc<dyn RepositoryListener>,
    state: Mutex<SessionState>,
}

impl fmt::Debug for ResolutionSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolutionSession")
            .field("cache", &self.cache.root())
            .field("update_policy", &self.update_policy)
            .field("offline", &self.offline)
            .finish()
    }
}

impl ResolutionSession {
    /// A session caching under `cache_root`, logging all events.
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        ResolutionSession {
            cache: LocalCache::new(cache_root),
            update_policy: UpdatePolicy::default(),
            offline: false,
            transfer_listener: Arc::new(LoggingTransferListener),
            repository_listener: Arc::new(LoggingRepositoryListener),
            state: Mutex::new(SessionState::default()),
        }
    }

    /// How often cached snapshot data and not-found answers are rechecked.
    pub fn with_update_policy(mut self, policy: UpdatePolicy) -> Self {
        self.update_policy = policy;
        self
    }

    /// Serve everything from the local cache and never contact a repository.
    pub fn with_offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    /// Replace the default logging transfer listener.
    pub fn with_transfer_listener(
        mut self,
        listener: impl TransferListener + 'static,
    ) -> Self {
        self.transfer_listener = Arc::new(listener);
        self
    }

    /// Replace the default logging repository listener.
    pub fn with_repository_listener(
        mut self,
        listener: impl RepositoryListener + 'static,
    ) -> Self {
        self.repository_listener = Arc::new(listener);
        self
    }

    /// The local artifact cache.
    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    /// Recheck interval for snapshots and not-found answers.
    pub fn update_policy(&self) -> UpdatePolicy {
        self.update_policy
    }

    /// Whether repositories are never contacted.
    pub fn is_offline(&self) -> bool {
        self.offline
    }

    /// Listener notified of every transfer.
    pub fn transfer_listener(&self) -> &dyn TransferListener {
        self.transfer_listener.as_ref()
    }

    pub(crate) fn emit(&self, event: RepositoryEvent<'_>) {
        self.repository_listener.on_event(&event);
    }

    /// Acquire the session lock for the duration of one resolution call.
    pub fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
