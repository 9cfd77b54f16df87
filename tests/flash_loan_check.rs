use alloy_primitives::{I256, U256};
use pool_sentinel::agents::FlashRepayer;
use pool_sentinel::error::PoolError;
use pool_sentinel::orchestrator::Orchestrator;
use pool_sentinel::pool::math::{units, units_frac};
use pool_sentinel::pool::{PoolFacade, PoolQuirks, SimulatedPool};
use pool_sentinel::scenario::{ScenarioKind, ScenarioSpec};
use pool_sentinel::utils::config::HarnessConfig;

fn flash_spec(label: &str, shortfall: U256) -> ScenarioSpec {
    ScenarioSpec::new(ScenarioKind::FlashLoan, label)
        .with_u256("amount0", units(100))
        .with_u256("amount1", units(100))
        .with_u256("shortfall", shortfall)
}

#[test]
fn test_repaying_100_3_succeeds_and_100_0_fails() {
    let cfg = HarnessConfig::default();
    let attacker = cfg.identities.attacker;

    let mut pool = SimulatedPool::bootstrap(&cfg).unwrap();
    let mut facade = PoolFacade::new(&mut pool);
    let before = facade.read_snapshot();
    let mut full = FlashRepayer::new(attacker, units(100), units(100), U256::ZERO);
    facade
        .execute_flash(attacker, units(100), units(100), &mut full)
        .expect("100.3 repays principal plus 0.3% fee");
    assert_eq!(full.evidence().repaid0, units_frac(1003, 1));
    let after = facade.read_snapshot();
    assert_eq!(after.reserves.0 - before.reserves.0, units_frac(3, 1));
    assert_eq!(after.reserves.1 - before.reserves.1, units_frac(3, 1));

    let mut short = FlashRepayer::new(attacker, units(100), units(100), units_frac(3, 1));
    let err = facade
        .execute_flash(attacker, units(100), units(100), &mut short)
        .unwrap_err();
    assert_eq!(
        err,
        PoolError::InsufficientRepayment {
            token: 0,
            required: units_frac(1003, 1),
            returned: units(100),
        }
    );
    assert_eq!(facade.read_snapshot().reserves, after.reserves);
}

#[test]
fn test_flash_verdicts_hold_on_healthy_pool() {
    let cfg = HarnessConfig::default();
    let orchestrator = Orchestrator::new(cfg.clone());
    for (label, shortfall) in [("full", U256::ZERO), ("under", units_frac(3, 1))] {
        let mut pool = SimulatedPool::bootstrap(&cfg).unwrap();
        let result = orchestrator
            .run_scenario(&mut pool, &flash_spec(label, shortfall))
            .unwrap();
        assert!(result.passed(), "{label}: {:?}", result.invariant_verdicts);
        assert_eq!(result.reverted, label == "under");
    }
}

#[test]
fn test_full_repayment_moves_borrower_by_exactly_the_fee() {
    let cfg = HarnessConfig::default();
    let orchestrator = Orchestrator::new(cfg.clone());
    let mut pool = SimulatedPool::bootstrap(&cfg).unwrap();
    let result = orchestrator
        .run_scenario(&mut pool, &flash_spec("full", U256::ZERO))
        .unwrap();
    let fee = I256::try_from(units_frac(3, 1)).unwrap();
    let before = I256::try_from(result.attacker_before.balance0).unwrap();
    let after = I256::try_from(result.attacker_after.balance0).unwrap();
    assert_eq!(after - before, -fee);
    assert!(result.verdict("flash-borrower-net-fee").unwrap().held);
}

#[test]
fn test_skipped_repayment_check_is_detected() {
    let cfg = HarnessConfig::default();
    let orchestrator = Orchestrator::new(cfg.clone());
    let mut pool = SimulatedPool::bootstrap(&cfg).unwrap().with_quirks(PoolQuirks {
        skip_flash_repayment_check: true,
        ..PoolQuirks::default()
    });
    let result = orchestrator
        .run_scenario(&mut pool, &flash_spec("under", units_frac(3, 1)))
        .unwrap();
    assert!(!result.reverted);
    assert!(result.verdict("flash-repayment-enforced").unwrap().is_violation());
    assert!(result.verdict("flash-reserve-delta").unwrap().is_violation());
}

#[test]
fn test_drain_fails_before_the_callback() {
    let cfg = HarnessConfig::default();
    let orchestrator = Orchestrator::new(cfg.clone());
    let mut pool = SimulatedPool::bootstrap(&cfg).unwrap();
    let spec = ScenarioSpec::new(ScenarioKind::FlashLoan, "drain")
        .with_u256("amount0", units(cfg.initial_liquidity_tokens + 1))
        .with("amount1", 0);
    let result = orchestrator.run_scenario(&mut pool, &spec).unwrap();
    assert!(result.reverted);
    assert_eq!(result.before.reserves, result.after.reserves);
    assert!(result.verdict("flash-drain-rejected-upfront").unwrap().held);
    assert!(result.passed());
}
