//! Attacker agents. One capability, `attack`, over a closed set of variants; each variant
//! drives the pool through the facade and records what it saw as [`Evidence`].

pub mod flash_loan;
pub mod front_run;
pub mod oracle;
pub mod reentrant;
pub mod sandwich;

pub use flash_loan::{FlashLoanAbuser, FlashRepayer};
pub use front_run::FrontRunner;
pub use oracle::OracleManipulator;
pub use reentrant::{EntryPoint, ReentrantCaller};
pub use sandwich::Sandwicher;

use crate::error::{PoolError, ScenarioError};
use crate::oracle::TickWindow;
use crate::pool::{AccountSnapshot, PoolCollaborator, PoolFacade, SwapOutcome};
use crate::scenario::{ScenarioKind, ScenarioSpec};
use crate::utils::config::{HarnessConfig, Identities};
use alloy_primitives::{I256, U256};

/// One nested call attempted from inside a pool callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestedAttempt {
    pub entry: EntryPoint,
    pub nested: EntryPoint,
    pub locked_during_callback: bool,
    /// `None` when the nested call went through.
    pub error: Option<PoolError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashEvidence {
    pub amount0: U256,
    pub amount1: U256,
    pub fee0: U256,
    pub fee1: U256,
    pub repaid0: U256,
    pub repaid1: U256,
    pub callback_ran: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapRole {
    FrontRun,
    Victim,
    BackRun,
    Manipulation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapTrace {
    pub role: SwapRole,
    pub zero_for_one: bool,
    pub amount_specified: I256,
    pub sqrt_price_start_x96: U256,
    pub sqrt_price_limit_x96: U256,
    pub amount_out_minimum: Option<U256>,
    pub result: Result<SwapOutcome, PoolError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleEvidence {
    pub window_seconds: u32,
    pub block_seconds: u32,
    pub tick_before: i32,
    /// Ticks the pool held after each manipulation step.
    pub ticks_during: Vec<i32>,
    pub twap_before: Result<TickWindow, PoolError>,
    /// Same read repeated without any state change in between.
    pub twap_before_repeat: Result<TickWindow, PoolError>,
    pub twap_after: Option<Result<TickWindow, PoolError>>,
    /// One second older than the oldest recorded observation.
    pub lookback_seconds: u32,
    /// Read reaching back before any recorded history.
    pub lookback_probe: Result<i64, PoolError>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Evidence {
    pub nested: Vec<NestedAttempt>,
    pub flash: Option<FlashEvidence>,
    pub swaps: Vec<SwapTrace>,
    pub oracle: Option<OracleEvidence>,
    /// Free-form notes carried into the result detail (e.g. sandwich profit).
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackOutcome {
    /// First failure of an attacker-issued top-level call. Victim failures are evidence, not
    /// attack reverts.
    pub result: Result<(), PoolError>,
    pub evidence: Evidence,
}

impl AttackOutcome {
    pub fn new(result: Result<(), PoolError>, evidence: Evidence) -> Self {
        Self { result, evidence }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttackerAgent {
    FlashLoanAbuser(FlashLoanAbuser),
    ReentrantCaller(ReentrantCaller),
    FrontRunner(FrontRunner),
    Sandwicher(Sandwicher),
    OracleManipulator(OracleManipulator),
}

impl AttackerAgent {
    /// Validates the scenario's parameters into a typed agent. Never touches the pool.
    pub fn for_spec(spec: &ScenarioSpec, cfg: &HarnessConfig) -> Result<Self, ScenarioError> {
        Ok(match spec.kind() {
            ScenarioKind::FlashLoan => Self::FlashLoanAbuser(FlashLoanAbuser::from_spec(spec)?),
            ScenarioKind::Reentrancy => Self::ReentrantCaller(ReentrantCaller::from_spec(spec)?),
            ScenarioKind::FrontRun => Self::FrontRunner(FrontRunner::from_spec(spec)?),
            ScenarioKind::Sandwich => Self::Sandwicher(Sandwicher::from_spec(spec)?),
            ScenarioKind::OracleManipulation => {
                Self::OracleManipulator(OracleManipulator::from_spec(spec, cfg.block_seconds)?)
            }
        })
    }

    pub fn kind(&self) -> ScenarioKind {
        match self {
            Self::FlashLoanAbuser(_) => ScenarioKind::FlashLoan,
            Self::ReentrantCaller(_) => ScenarioKind::Reentrancy,
            Self::FrontRunner(_) => ScenarioKind::FrontRun,
            Self::Sandwicher(_) => ScenarioKind::Sandwich,
            Self::OracleManipulator(_) => ScenarioKind::OracleManipulation,
        }
    }

    pub fn attack<P: PoolCollaborator + ?Sized>(
        &self,
        facade: &mut PoolFacade<'_, P>,
        ids: &Identities,
    ) -> AttackOutcome {
        match self {
            Self::FlashLoanAbuser(agent) => agent.attack(facade, ids),
            Self::ReentrantCaller(agent) => agent.attack(facade, ids),
            Self::FrontRunner(agent) => agent.attack(facade, ids),
            Self::Sandwicher(agent) => agent.attack(facade, ids),
            Self::OracleManipulator(agent) => agent.attack(facade, ids),
        }
    }

    /// The same outer call with the adversarial part removed, for scenarios whose checks
    /// compare against an honest run.
    pub fn baseline(&self) -> Option<AttackerAgent> {
        match self {
            Self::ReentrantCaller(agent) => Some(Self::ReentrantCaller(agent.without_reentry())),
            _ => None,
        }
    }
}

pub(crate) fn signed(amount: U256) -> Result<I256, PoolError> {
    I256::try_from(amount).map_err(|_| PoolError::reverted("SafeCast"))
}

pub(crate) fn account_delta(before: &AccountSnapshot, after: &AccountSnapshot) -> (I256, I256) {
    let delta = |b: U256, a: U256| {
        let b = I256::try_from(b).unwrap_or(I256::MAX);
        let a = I256::try_from(a).unwrap_or(I256::MAX);
        a.saturating_sub(b)
    };
    (
        delta(before.balance0, after.balance0),
        delta(before.balance1, after.balance1),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_selection_follows_kind() {
        let cfg = HarnessConfig::default();
        for kind in ScenarioKind::ALL {
            let agent = AttackerAgent::for_spec(&ScenarioSpec::new(kind, "defaults"), &cfg)
                .expect("defaults are valid");
            assert_eq!(agent.kind(), kind);
            assert_eq!(agent.baseline().is_some(), kind == ScenarioKind::Reentrancy);
        }
    }

    #[test]
    fn test_invalid_parameters_rejected_before_attack() {
        let cfg = HarnessConfig::default();
        let spec = ScenarioSpec::new(ScenarioKind::Reentrancy, "bad").with("entry", 7);
        assert!(matches!(
            AttackerAgent::for_spec(&spec, &cfg),
            Err(ScenarioError::InvalidParameter { .. })
        ));
    }
}
