//! # Login Throttle
//!
//! Sliding-window failure counter per normalized username. The table lives for
//! the process lifetime and is shared by every request; each read-modify-write
//! runs under the owning shard's lock.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rf_core::clock::Clock;
use rf_core::error::{AppError, Result};
use tracing::{debug, warn};

use crate::validation::normalize_username;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottlePolicy {
    pub max_failures: usize,
    pub window: Duration,
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self {
            max_failures: 5,
            window: Duration::minutes(10),
        }
    }
}

pub struct LoginThrottle {
    failures: DashMap<String, VecDeque<DateTime<Utc>>>,
    policy: ThrottlePolicy,
    clock: Arc<dyn Clock>,
}

impl LoginThrottle {
    pub fn new(policy: ThrottlePolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            failures: DashMap::new(),
            policy,
            clock,
        }
    }

    fn prune(&self, entries: &mut VecDeque<DateTime<Utc>>, now: DateTime<Utc>) {
        while entries
            .front()
            .is_some_and(|&failed_at| now - failed_at >= self.policy.window)
        {
            entries.pop_front();
        }
    }

    /// Prunes the window and reports whether another attempt may proceed.
    /// Checking never records anything, so a blocked caller does not push the
    /// window forward.
    pub fn is_allowed(&self, username: &str) -> bool {
        let key = normalize_username(username);
        let now = self.clock.now();

        let remaining = match self.failures.get_mut(&key) {
            Some(mut entries) => {
                self.prune(&mut entries, now);
                entries.len()
            }
            None => return true,
        };

        if remaining == 0 {
            self.failures.remove_if(&key, |_, entries| entries.is_empty());
        }
        remaining < self.policy.max_failures
    }

    /// Admits one attempt and counts it as a failure up front, in the same
    /// entry lock as the check. Parallel attempts therefore cannot all slip
    /// past a nearly full window. The caller settles the attempt with
    /// `record_success` or `release`; an attempt that is never settled stays a
    /// failure until it leaves the window.
    pub fn begin_attempt(&self, username: &str) -> Result<DateTime<Utc>> {
        let key = normalize_username(username);
        let now = self.clock.now();

        let mut entries = self.failures.entry(key.clone()).or_default();
        self.prune(&mut entries, now);
        if entries.len() >= self.policy.max_failures {
            drop(entries);
            warn!(username = %key, "login throttled");
            return Err(AppError::TooManyAttempts);
        }

        entries.push_back(now);
        debug!(failures = entries.len(), "login attempt admitted");
        Ok(now)
    }

    /// Hands back a slot taken by `begin_attempt` when the attempt ended for a
    /// reason that says nothing about the password.
    pub fn release(&self, username: &str, admitted_at: DateTime<Utc>) {
        let key = normalize_username(username);
        if let Some(mut entries) = self.failures.get_mut(&key) {
            if let Some(pos) = entries.iter().rposition(|&at| at == admitted_at) {
                entries.remove(pos);
            }
        }
        self.failures.remove_if(&key, |_, entries| entries.is_empty());
    }

    pub fn record_success(&self, username: &str) {
        self.failures.remove(&normalize_username(username));
    }

    /// Number of usernames currently holding failures.
    pub fn tracked(&self) -> usize {
        self.failures.len()
    }
}
