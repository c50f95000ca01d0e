//!
//! Upstream credential pool and its rotation cycle.
//!
//! The pool holds either an ordered key list (primary first, then fallbacks)
//! or a single refreshable token. One [RotationCycle] is shared by every
//! request in the process: each dispatch starts a new cycle at the current
//! index and rotates forward on quota/auth failures until it would come back
//! to where it started.
//!
//! Concurrent dispatches may interleave their cycles. That is accepted; the
//! cycle record sits behind a single mutex so no read ever sees a torn or
//! out-of-range index.
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

/* --- uses ------------------------------------------------------------------------------------ */

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::auth::{HttpTokenRefresher, TokenRefresher};
use crate::config::Config;
use crate::error::{ProxyError, Result};

/* --- types ----------------------------------------------------------------------------------- */

///
/// One upstream secret and its position in the pool.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub index: usize,
    pub total: usize,
    pub secret: String,
}

///
/// Process-wide rotation state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RotationCycle {
    pub current_index: usize,
    pub cycle_start_index: usize,
    pub cycle_exhausted: bool,
}

///
/// Where secrets come from.
enum Source {
    /// Ordered key list; never empty.
    Keys(Vec<String>),
    /// Single token exchanged through a refresher and cached for `ttl`.
    Refreshable {
        refresher: Arc<dyn TokenRefresher>,
        ttl: Duration,
        cached: tokio::sync::Mutex<Option<CachedToken>>,
    },
}

struct CachedToken {
    secret: String,
    expires_at: Instant,
}

///
/// Credential pool shared by every request handler.
pub struct CredentialPool {
    source: Source,
    cycle: Mutex<RotationCycle>,
}

/* --- constants ------------------------------------------------------------------------------ */

/** refreshed tokens are treated as stale this long before they expire */
const EXPIRY_MARGIN: Duration = Duration::from_secs(30);

/* --- start of code -------------------------------------------------------------------------- */

impl CredentialPool {
    ///
    /// Pool over an ordered key list.
    ///
    /// # Returns
    ///  * Pool positioned on the first key
    ///  * `ProxyError::CredentialUnavailable` if the list has no usable key
    pub fn from_keys(keys: Vec<String>) -> Result<Self> {
        let keys: Vec<String> =
            keys.into_iter().map(|k| k.trim().to_string()).filter(|k| !k.is_empty()).collect();

        if keys.is_empty() {
            return Err(ProxyError::CredentialUnavailable(
                "credential key list is empty".to_string(),
            ));
        }

        tracing::info!("Credential pool initialised with {} key(s)", keys.len());
        Ok(Self { source: Source::Keys(keys), cycle: Mutex::new(RotationCycle::default()) })
    }

    ///
    /// Pool over a single refreshable token.
    ///
    /// # Arguments
    ///  * `refresher` - token exchange collaborator
    ///  * `ttl` - lifetime assumed when the exchange reports none
    pub fn refreshable(refresher: Arc<dyn TokenRefresher>, ttl: Duration) -> Self {
        tracing::info!("Credential pool initialised with a refreshable token");
        Self {
            source: Source::Refreshable { refresher, ttl, cached: tokio::sync::Mutex::new(None) },
            cycle: Mutex::new(RotationCycle::default()),
        }
    }

    ///
    /// Build the pool described by the configuration.
    ///
    /// A refreshable token wins over a key list when both are configured.
    pub fn from_config(config: &Config, client: reqwest::Client) -> Result<Self> {
        match &config.credentials.refresh {
            Some(refresh) => Ok(Self::refreshable(
                Arc::new(HttpTokenRefresher::new(client, refresh)),
                Duration::from_secs(refresh.ttl_secs),
            )),
            None => Self::from_keys(config.load_credential_keys()?),
        }
    }

    /// Number of credentials in the pool
    pub fn size(&self) -> usize {
        match &self.source {
            Source::Keys(keys) => keys.len(),
            Source::Refreshable { .. } => 1,
        }
    }

    /// Whether the pool is backed by a refreshable token
    pub fn is_refreshable(&self) -> bool {
        matches!(self.source, Source::Refreshable { .. })
    }

    ///
    /// Begin a new rotation cycle at the current index.
    pub fn start_cycle(&self) {
        let mut cycle = self.lock_cycle();
        cycle.cycle_start_index = cycle.current_index;
        cycle.cycle_exhausted = false;
    }

    ///
    /// Advance to the next credential.
    ///
    /// Refuses (and marks the cycle exhausted) when the next index would be
    /// the cycle start; the current index then stays on the last tried key.
    ///
    /// # Returns
    ///  * `true` if the pool moved to a credential not yet tried in this cycle
    pub fn rotate(&self) -> bool {
        let size = self.size();
        let mut cycle = self.lock_cycle();

        if size <= 1 || cycle.cycle_exhausted {
            return false;
        }

        let next = (cycle.current_index + 1) % size;
        if next == cycle.cycle_start_index {
            cycle.cycle_exhausted = true;
            tracing::warn!("Credential cycle exhausted after trying all {} key(s)", size);
            return false;
        }

        tracing::info!("Rotating credential {}/{} -> {}/{}", cycle.current_index + 1, size, next + 1, size);
        cycle.current_index = next;
        true
    }

    /// Copy of the rotation state
    pub fn cycle(&self) -> RotationCycle {
        *self.lock_cycle()
    }

    ///
    /// Credential at the current index.
    ///
    /// For the refreshable source this refreshes the cached token when stale.
    ///
    /// # Returns
    ///  * Current credential
    ///  * `ProxyError::CredentialUnavailable` if the token could not be refreshed
    pub async fn current(&self) -> Result<Credential> {
        match &self.source {
            Source::Keys(keys) => {
                let index = self.lock_cycle().current_index % keys.len();
                Ok(Credential { index, total: keys.len(), secret: keys[index].clone() })
            }
            Source::Refreshable { refresher, ttl, cached } => {
                let mut guard = cached.lock().await;

                if let Some(token) = guard.as_ref().filter(|t| t.expires_at > Instant::now()) {
                    return Ok(Credential { index: 0, total: 1, secret: token.secret.clone() });
                }

                let refreshed = refresher.refresh().await.map_err(|e| {
                    ProxyError::CredentialUnavailable(format!("token refresh failed: {}", e))
                })?;
                let lifetime = refreshed.expires_in.unwrap_or(*ttl);
                let expires_at = Instant::now() + lifetime.saturating_sub(EXPIRY_MARGIN);

                tracing::info!("Refreshed upstream token {}", preview(&refreshed.secret));
                *guard = Some(CachedToken { secret: refreshed.secret.clone(), expires_at });

                Ok(Credential { index: 0, total: 1, secret: refreshed.secret })
            }
        }
    }

    ///
    /// Drop the cached refreshable token so the next dispatch refreshes it.
    ///
    /// No effect on key lists.
    pub async fn invalidate(&self) {
        if let Source::Refreshable { cached, .. } = &self.source {
            tracing::debug!("Invalidating cached upstream token");
            *cached.lock().await = None;
        }
    }

    fn lock_cycle(&self) -> MutexGuard<'_, RotationCycle> {
        // the record is plain data, a poisoned lock still holds a valid cycle
        self.cycle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Credential {
    /// Log-safe rendering of the secret
    pub fn preview(&self) -> String {
        preview(&self.secret)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("index", &self.index)
            .field("total", &self.total)
            .field("secret", &self.preview())
            .finish()
    }
}

///
/// First and last four characters of a secret; short secrets are fully masked.
pub fn preview(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}
