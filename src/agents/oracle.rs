use super::{signed, AttackOutcome, Evidence, OracleEvidence, SwapRole, SwapTrace};
use crate::error::{PoolError, ScenarioError};
use crate::oracle::TickWindow;
use crate::pool::math::{unbounded_limit, units};
use crate::pool::{PoolCollaborator, PoolFacade};
use crate::scenario::ScenarioSpec;
use crate::utils::config::Identities;
use alloy_primitives::U256;

/// Pushes the tick with one large swap, optionally swaps back in the same block, and compares
/// the TWAP window before and one block after.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleManipulator {
    pub window_seconds: u32,
    pub block_seconds: u32,
    pub warmup_blocks: u32,
    pub swap_amount: U256,
    pub back_run: bool,
}

impl OracleManipulator {
    pub fn from_spec(spec: &ScenarioSpec, block_seconds: u32) -> Result<Self, ScenarioError> {
        let block_seconds = block_seconds.max(1);
        let default_window = 60u32.max(block_seconds.saturating_mul(5));
        let window_seconds = spec.u32_in("window", default_window, 1..=(u32::MAX / 2))?;
        if window_seconds <= block_seconds {
            return Err(ScenarioError::InvalidParameter {
                name: "window".to_string(),
                reason: format!("must exceed block time {block_seconds}s, got {window_seconds}s"),
            });
        }
        let default_warmup = window_seconds / block_seconds + 1;
        Ok(Self {
            window_seconds,
            block_seconds,
            warmup_blocks: spec.u32_in("warmup_blocks", default_warmup, 0..=100_000)?,
            swap_amount: spec.positive_amount("swap_amount", units(5_000))?,
            back_run: spec.flag("back_run", false)?,
        })
    }

    pub fn attack<P: PoolCollaborator + ?Sized>(
        &self,
        facade: &mut PoolFacade<'_, P>,
        ids: &Identities,
    ) -> AttackOutcome {
        for _ in 0..self.warmup_blocks {
            facade.advance_time(self.block_seconds);
        }

        let tick_before = facade.read_snapshot().tick;
        let twap_before = TickWindow::read(facade, self.window_seconds);
        let twap_before_repeat = TickWindow::read(facade, self.window_seconds);
        let history = facade.history_seconds();
        let lookback_seconds = history
            .as_ref()
            .map(|h| h.saturating_add(1))
            .unwrap_or(u32::MAX);
        let lookback_probe = history.and_then(|_| {
            facade
                .observe(&[lookback_seconds])
                .map(|obs| obs.first().map(|o| o.tick_cumulative).unwrap_or_default())
        });

        let mut evidence = Evidence::default();
        let mut oracle = OracleEvidence {
            window_seconds: self.window_seconds,
            block_seconds: self.block_seconds,
            tick_before,
            ticks_during: Vec::new(),
            twap_before,
            twap_before_repeat,
            twap_after: None,
            lookback_seconds,
            lookback_probe,
        };

        let result = self.manipulate(facade, ids, &mut evidence, &mut oracle);
        if result.is_ok() {
            facade.advance_time(self.block_seconds);
            let after = TickWindow::read(facade, self.window_seconds);
            if let Ok(window) = &after {
                tracing::debug!(
                    "[ORACLE] mean tick over {}s after manipulation: {:?}",
                    self.window_seconds,
                    window.arithmetic_mean_tick()
                );
            }
            oracle.twap_after = Some(after);
        }
        evidence.oracle = Some(oracle);
        AttackOutcome::new(result, evidence)
    }

    fn manipulate<P: PoolCollaborator + ?Sized>(
        &self,
        facade: &mut PoolFacade<'_, P>,
        ids: &Identities,
        evidence: &mut Evidence,
        oracle: &mut OracleEvidence,
    ) -> Result<(), PoolError> {
        let amount = signed(self.swap_amount)?;
        let start = facade.read_snapshot().sqrt_price_x96;
        let limit = unbounded_limit(true);
        let push = facade.execute_swap(ids.attacker, true, amount, limit);
        evidence.swaps.push(SwapTrace {
            role: SwapRole::Manipulation,
            zero_for_one: true,
            amount_specified: amount,
            sqrt_price_start_x96: start,
            sqrt_price_limit_x96: limit,
            amount_out_minimum: None,
            result: push.clone(),
        });
        let push = push?;
        oracle.ticks_during.push(push.tick_after);

        if self.back_run {
            let amount = signed(push.amount_out())?;
            let start = push.sqrt_price_after_x96;
            let limit = unbounded_limit(false);
            let back = facade.execute_swap(ids.attacker, false, amount, limit);
            evidence.swaps.push(SwapTrace {
                role: SwapRole::BackRun,
                zero_for_one: false,
                amount_specified: amount,
                sqrt_price_start_x96: start,
                sqrt_price_limit_x96: limit,
                amount_out_minimum: None,
                result: back.clone(),
            });
            match back {
                Ok(back) => oracle.ticks_during.push(back.tick_after),
                Err(err) => evidence.notes.push(format!("back-run failed: {err}")),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{PoolQuirks, SimulatedPool};
    use crate::scenario::ScenarioKind;
    use crate::utils::config::HarnessConfig;

    fn run(quirks: PoolQuirks) -> OracleEvidence {
        let cfg = HarnessConfig::default();
        let mut pool = SimulatedPool::bootstrap(&cfg).unwrap().with_quirks(quirks);
        let mut facade = PoolFacade::new(&mut pool);
        let agent = OracleManipulator::from_spec(
            &ScenarioSpec::new(ScenarioKind::OracleManipulation, "t"),
            cfg.block_seconds,
        )
        .unwrap();
        let outcome = agent.attack(&mut facade, &cfg.identities);
        assert_eq!(outcome.result, Ok(()));
        outcome.evidence.oracle.unwrap()
    }

    #[test]
    fn test_manipulated_tick_only_counts_for_one_block() {
        let evidence = run(PoolQuirks::default());
        let before = evidence.twap_before.unwrap();
        let after = evidence.twap_after.unwrap().unwrap();
        let moved = evidence.ticks_during[0];
        assert!(moved < 0);
        assert_eq!(before.tick_delta(), 0);
        assert_eq!(after.tick_delta(), moved as i64 * 12);
        assert_eq!(evidence.twap_before_repeat.unwrap(), before);
        // Six warm-up blocks of 12s since genesis, so the lookback asks for 73s.
        assert_eq!(evidence.lookback_seconds, 73);
        assert!(matches!(
            evidence.lookback_probe,
            Err(PoolError::UnsupportedLookback { requested: 73, .. })
        ));
    }

    #[test]
    fn test_post_swap_accumulation_rewrites_whole_window() {
        let evidence = run(PoolQuirks {
            accumulate_post_swap_tick: true,
            ..PoolQuirks::default()
        });
        let after = evidence.twap_after.unwrap().unwrap();
        let moved = evidence.ticks_during[0] as i64;
        assert_eq!(after.tick_delta(), moved * 60);
    }

    #[test]
    fn test_window_must_exceed_block_time() {
        let spec = ScenarioSpec::new(ScenarioKind::OracleManipulation, "t").with("window", 12);
        assert!(OracleManipulator::from_spec(&spec, 12).is_err());
    }
}
