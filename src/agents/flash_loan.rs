use super::{AttackOutcome, Evidence, FlashEvidence};
use crate::error::{PoolError, ScenarioError};
use crate::pool::math::units;
use crate::pool::{FlashCallback, PoolCollaborator, PoolFacade};
use crate::scenario::ScenarioSpec;
use crate::utils::config::Identities;
use alloy_primitives::{Address, U256};

/// Repays a flash loan from one account: principal plus fee, minus `shortfall` per borrowed
/// token.
#[derive(Debug, Clone)]
pub struct FlashRepayer {
    account: Address,
    amount0: U256,
    amount1: U256,
    shortfall: U256,
    evidence: FlashEvidence,
}

impl FlashRepayer {
    pub fn new(account: Address, amount0: U256, amount1: U256, shortfall: U256) -> Self {
        Self {
            account,
            amount0,
            amount1,
            shortfall,
            evidence: FlashEvidence {
                amount0,
                amount1,
                fee0: U256::ZERO,
                fee1: U256::ZERO,
                repaid0: U256::ZERO,
                repaid1: U256::ZERO,
                callback_ran: false,
            },
        }
    }

    pub fn evidence(&self) -> &FlashEvidence {
        &self.evidence
    }

    pub fn into_evidence(self) -> FlashEvidence {
        self.evidence
    }

    fn repayment(&self, amount: U256, fee: U256) -> U256 {
        if amount.is_zero() {
            return U256::ZERO;
        }
        let owed = amount.saturating_add(fee);
        owed - self.shortfall.min(owed)
    }
}

impl FlashCallback for FlashRepayer {
    fn on_flash(
        &mut self,
        pool: &mut dyn PoolCollaborator,
        fee0: U256,
        fee1: U256,
    ) -> Result<(), PoolError> {
        let repaid0 = self.repayment(self.amount0, fee0);
        let repaid1 = self.repayment(self.amount1, fee1);
        self.evidence.fee0 = fee0;
        self.evidence.fee1 = fee1;
        self.evidence.callback_ran = true;
        pool.transfer_to_pool(self.account, repaid0, repaid1)?;
        self.evidence.repaid0 = repaid0;
        self.evidence.repaid1 = repaid1;
        Ok(())
    }
}

/// Borrows through the pool's flash path and repays fully, partially, or not at all
/// (borrowing beyond reserves).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashLoanAbuser {
    pub amount0: U256,
    pub amount1: U256,
    pub shortfall: U256,
}

impl FlashLoanAbuser {
    pub fn from_spec(spec: &ScenarioSpec) -> Result<Self, ScenarioError> {
        let amount0 = spec.amount("amount0", units(100))?;
        let amount1 = spec.amount("amount1", units(100))?;
        if amount0.is_zero() && amount1.is_zero() {
            return Err(ScenarioError::InvalidParameter {
                name: "amount0".to_string(),
                reason: "at least one of amount0/amount1 must be > 0".to_string(),
            });
        }
        Ok(Self {
            amount0,
            amount1,
            shortfall: spec.amount("shortfall", U256::ZERO)?,
        })
    }

    pub fn attack<P: PoolCollaborator + ?Sized>(
        &self,
        facade: &mut PoolFacade<'_, P>,
        ids: &Identities,
    ) -> AttackOutcome {
        let mut repayer = FlashRepayer::new(ids.attacker, self.amount0, self.amount1, self.shortfall);
        let result = facade.execute_flash(ids.attacker, self.amount0, self.amount1, &mut repayer);
        tracing::debug!(
            "[FLASH] borrow ({}, {}) shortfall {} -> {:?}",
            self.amount0,
            self.amount1,
            self.shortfall,
            result
        );
        let evidence = Evidence {
            flash: Some(repayer.into_evidence()),
            ..Evidence::default()
        };
        AttackOutcome::new(result, evidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::math::units_frac;
    use crate::pool::SimulatedPool;
    use crate::utils::config::HarnessConfig;

    #[test]
    fn test_full_repayment_pays_exact_fee() {
        let cfg = HarnessConfig::default();
        let mut pool = SimulatedPool::bootstrap(&cfg).unwrap();
        let mut facade = PoolFacade::new(&mut pool);
        let before = facade.read_snapshot();
        let agent = FlashLoanAbuser {
            amount0: units(100),
            amount1: units(100),
            shortfall: U256::ZERO,
        };
        let outcome = agent.attack(&mut facade, &cfg.identities);
        assert_eq!(outcome.result, Ok(()));
        let flash = outcome.evidence.flash.unwrap();
        assert_eq!(flash.repaid0, units_frac(1003, 1));
        let after = facade.read_snapshot();
        assert_eq!(after.reserves.0, before.reserves.0 + units_frac(3, 1));
    }

    #[test]
    fn test_principal_only_repayment_is_insufficient() {
        let cfg = HarnessConfig::default();
        let mut pool = SimulatedPool::bootstrap(&cfg).unwrap();
        let mut facade = PoolFacade::new(&mut pool);
        let agent = FlashLoanAbuser {
            amount0: units(100),
            amount1: units(100),
            shortfall: units_frac(3, 1),
        };
        let outcome = agent.attack(&mut facade, &cfg.identities);
        assert!(matches!(
            outcome.result,
            Err(PoolError::InsufficientRepayment { token: 0, .. })
        ));
    }
}
