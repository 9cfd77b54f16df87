//! Reentrancy lock state machine and the verifier that judges reentrancy scenarios.
//!
//! `Unlocked -> Locked` on entry of a mutating call, `Locked -> Unlocked` on normal exit. An entry
//! while `Locked` is a reentrant invocation and is rejected without disturbing the outer call.

use super::{CheckContext, InvariantChecker, InvariantVerdict};
use crate::scenario::ScenarioKind;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LockState {
    Unlocked,
    Locked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LockError {
    #[error("reentrant call rejected: lock already held")]
    Reentrant,
    #[error("exit without matching entry")]
    NotLocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockTracker {
    state: LockState,
}

impl Default for LockTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl LockTracker {
    pub fn new() -> Self {
        Self {
            state: LockState::Unlocked,
        }
    }

    pub fn state(&self) -> LockState {
        self.state
    }

    pub fn is_locked(&self) -> bool {
        self.state == LockState::Locked
    }

    pub fn enter(&mut self) -> Result<LockState, LockError> {
        match self.state {
            LockState::Unlocked => {
                self.state = LockState::Locked;
                Ok(self.state)
            }
            LockState::Locked => Err(LockError::Reentrant),
        }
    }

    pub fn exit(&mut self) -> Result<LockState, LockError> {
        match self.state {
            LockState::Locked => {
                self.state = LockState::Unlocked;
                Ok(self.state)
            }
            LockState::Unlocked => Err(LockError::NotLocked),
        }
    }
}

/// Judges reentrancy scenarios: every nested call failed, the lock was observed held inside the
/// callback, and reserves match the non-reentrant baseline (or the pre-scenario state when the
/// outer call reverted).
pub struct LockVerifier;

impl InvariantChecker for LockVerifier {
    fn name(&self) -> &'static str {
        "lock"
    }

    fn applies(&self, kind: ScenarioKind) -> bool {
        kind == ScenarioKind::Reentrancy
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Vec<InvariantVerdict> {
        let attempts = &ctx.outcome.evidence.nested;
        let mut verdicts = Vec::with_capacity(3);

        if attempts.is_empty() {
            let reason = "no nested call was attempted (outer call failed before its callback)";
            verdicts.push(InvariantVerdict::unevaluated("nested-call-rejected", reason));
            verdicts.push(InvariantVerdict::unevaluated("lock-held-during-callback", reason));
        } else {
            let accepted: Vec<String> = attempts
                .iter()
                .filter(|a| a.error.is_none())
                .map(|a| format!("{} inside {}", a.nested, a.entry))
                .collect();
            verdicts.push(InvariantVerdict::check(
                "nested-call-rejected",
                accepted.is_empty(),
                if accepted.is_empty() {
                    let reasons: Vec<String> = attempts
                        .iter()
                        .filter_map(|a| a.error.as_ref().map(|e| e.to_string()))
                        .collect();
                    format!("{} nested call(s) rejected: {}", attempts.len(), reasons.join("; "))
                } else {
                    format!("nested call succeeded: {}", accepted.join(", "))
                },
            ));

            let unlocked_inside = attempts.iter().filter(|a| !a.locked_during_callback).count();
            verdicts.push(InvariantVerdict::check(
                "lock-held-during-callback",
                unlocked_inside == 0,
                format!(
                    "{unlocked_inside} of {} callback(s) observed the pool unlocked",
                    attempts.len()
                ),
            ));
        }

        let expected = if ctx.reverted() {
            Some(("pre-scenario", ctx.before.reserves))
        } else {
            ctx.baseline.map(|b| ("non-reentrant baseline", b.reserves))
        };
        match expected {
            Some((label, reserves)) => verdicts.push(InvariantVerdict::check(
                "reserves-match-baseline",
                ctx.after.reserves == reserves,
                format!(
                    "reserves after ({}, {}) vs {label} ({}, {})",
                    ctx.after.reserves.0, ctx.after.reserves.1, reserves.0, reserves.1
                ),
            )),
            None => verdicts.push(InvariantVerdict::unevaluated(
                "reserves-match-baseline",
                "no baseline run available",
            )),
        }
        verdicts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enter_exit_cycle() {
        let mut lock = LockTracker::new();
        assert_eq!(lock.state(), LockState::Unlocked);
        assert_eq!(lock.enter(), Ok(LockState::Locked));
        assert!(lock.is_locked());
        assert_eq!(lock.exit(), Ok(LockState::Unlocked));
    }

    #[test]
    fn test_reentry_rejected_without_releasing_outer_hold() {
        let mut lock = LockTracker::new();
        lock.enter().unwrap();
        assert_eq!(lock.enter(), Err(LockError::Reentrant));
        assert!(lock.is_locked());
        assert_eq!(lock.exit(), Ok(LockState::Unlocked));
        assert_eq!(lock.exit(), Err(LockError::NotLocked));
    }
}
