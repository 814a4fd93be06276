//! Per-scope mutual exclusion for automation and alert reconciliation
//!
//! One lease per scope. Holding it means no other automation run or alert
//! merge for that scope is in flight. Different scopes never contend.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::Scope;

/// Why a lease is being taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeasePurpose {
    Automation,
    Alerts,
}

impl LeasePurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Automation => "automation",
            Self::Alerts => "alert reconciliation",
        }
    }
}

impl fmt::Display for LeasePurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub struct LeaseRegistry {
    inflight: Mutex<HashMap<Scope, Arc<Mutex<()>>>>,
    wait: Duration,
}

impl LeaseRegistry {
    /// `wait` bounds how long `acquire` blocks before failing
    pub fn new(wait: Duration) -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
            wait,
        }
    }

    /// Take the scope's lease, failing with a retryable
    /// [`Error::LeaseUnavailable`] if it isn't free within the bounded wait
    pub async fn acquire(&self, scope: Scope, purpose: LeasePurpose) -> Result<ScopeLease> {
        let lock = {
            let mut inflight = self.inflight.lock().await;
            Arc::clone(
                inflight
                    .entry(scope)
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };

        match tokio::time::timeout(self.wait, lock.lock_owned()).await {
            Ok(guard) => {
                debug!(%scope, %purpose, "Lease acquired");
                Ok(ScopeLease {
                    scope,
                    purpose,
                    _guard: guard,
                })
            }
            Err(_) => {
                warn!(
                    %scope,
                    %purpose,
                    wait_ms = self.wait.as_millis() as u64,
                    "Lease not available"
                );
                Err(Error::LeaseUnavailable {
                    scope: scope.to_string(),
                    purpose: purpose.to_string(),
                })
            }
        }
    }
}

/// Held for the duration of a run; released when dropped, on every exit path
pub struct ScopeLease {
    scope: Scope,
    purpose: LeasePurpose,
    _guard: OwnedMutexGuard<()>,
}

impl ScopeLease {
    pub fn scope(&self) -> Scope {
        self.scope
    }
}

impl Drop for ScopeLease {
    fn drop(&mut self) {
        debug!(scope = %self.scope, purpose = %self.purpose, "Lease released");
    }
}
