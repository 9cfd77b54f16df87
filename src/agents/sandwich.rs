use super::front_run::FrontRunner;
use super::{account_delta, signed, AttackOutcome, Evidence, SwapRole, SwapTrace};
use crate::error::ScenarioError;
use crate::pool::math::{unbounded_limit, units};
use crate::pool::{PoolCollaborator, PoolFacade};
use crate::scenario::ScenarioSpec;
use crate::utils::config::Identities;

/// Front-run, let the victim swap, then sell the front-run proceeds back. Profit is recorded as
/// a note only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sandwicher {
    pub front: FrontRunner,
}

impl Sandwicher {
    pub fn from_spec(spec: &ScenarioSpec) -> Result<Self, ScenarioError> {
        let mut front = FrontRunner::from_spec(spec)?;
        // Victim tolerance wide enough for the sandwich to complete unless overridden.
        if spec.param("slippage_bps").is_none() {
            front.slippage_bps = 200;
        }
        if spec.param("attacker_amount").is_none() {
            front.attacker_amount = units(3_000);
        }
        Ok(Self { front })
    }

    pub fn attack<P: PoolCollaborator + ?Sized>(
        &self,
        facade: &mut PoolFacade<'_, P>,
        ids: &Identities,
    ) -> AttackOutcome {
        let mut evidence = Evidence::default();
        let attacker_start = facade.balances(ids.attacker);
        let front = match self.front.front_and_victim(facade, ids, &mut evidence) {
            Ok(front) => front,
            Err(err) => return AttackOutcome::new(Err(err), evidence),
        };

        let proceeds = front.amount_out();
        let start = facade.read_snapshot().sqrt_price_x96;
        let limit = unbounded_limit(false);
        match signed(proceeds) {
            Ok(amount) => {
                let back = facade.execute_swap(ids.attacker, false, amount, limit);
                if let Err(err) = &back {
                    evidence.notes.push(format!("back-run failed: {err}"));
                }
                evidence.swaps.push(SwapTrace {
                    role: SwapRole::BackRun,
                    zero_for_one: false,
                    amount_specified: amount,
                    sqrt_price_start_x96: start,
                    sqrt_price_limit_x96: limit,
                    amount_out_minimum: None,
                    result: back,
                });
            }
            Err(err) => evidence.notes.push(format!("back-run skipped: {err}")),
        }

        let (d0, d1) = account_delta(&attacker_start, &facade.balances(ids.attacker));
        evidence
            .notes
            .push(format!("attacker net token0 {d0}, token1 {d1}"));
        tracing::debug!("[SANDWICH] attacker net token0 {} token1 {}", d0, d1);
        AttackOutcome::new(Ok(()), evidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::SimulatedPool;
    use crate::scenario::ScenarioKind;
    use crate::utils::config::HarnessConfig;

    #[test]
    fn test_sandwich_runs_three_legs_and_victim_gets_minimum() {
        let cfg = HarnessConfig::default();
        let mut pool = SimulatedPool::bootstrap(&cfg).unwrap();
        let mut facade = PoolFacade::new(&mut pool);
        let agent = Sandwicher::from_spec(&ScenarioSpec::new(ScenarioKind::Sandwich, "t")).unwrap();
        let outcome = agent.attack(&mut facade, &cfg.identities);
        assert_eq!(outcome.result, Ok(()));
        let roles: Vec<SwapRole> = outcome.evidence.swaps.iter().map(|s| s.role).collect();
        assert_eq!(roles, vec![SwapRole::FrontRun, SwapRole::Victim, SwapRole::BackRun]);
        let victim = &outcome.evidence.swaps[1];
        let received = victim.result.as_ref().unwrap().amount_out();
        assert!(received >= victim.amount_out_minimum.unwrap());
        assert!(!facade.read_snapshot().locked);
    }
}
