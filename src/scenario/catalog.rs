use super::{ScenarioKind, ScenarioSpec};
use crate::pool::math::{flash_fee, units};
use crate::utils::config::HarnessConfig;
use alloy_primitives::U256;

/// The standard audit suite, sized from the configured pool.
pub fn default_catalog(cfg: &HarnessConfig) -> Vec<ScenarioSpec> {
    let flash = units(100);
    // Withholding exactly the fee means repaying the bare principal.
    let fee = flash_fee(flash, cfg.fee_pips).unwrap_or(flash);
    let drain = units(cfg.initial_liquidity_tokens.saturating_add(1));

    vec![
        ScenarioSpec::new(ScenarioKind::FlashLoan, "flash-full-repay")
            .with_u256("amount0", flash)
            .with_u256("amount1", flash),
        ScenarioSpec::new(ScenarioKind::FlashLoan, "flash-under-repay")
            .with_u256("amount0", flash)
            .with_u256("amount1", flash)
            .with_u256("shortfall", fee),
        ScenarioSpec::new(ScenarioKind::FlashLoan, "flash-drain")
            .with_u256("amount0", drain)
            .with_u256("amount1", U256::ZERO),
        ScenarioSpec::new(ScenarioKind::Reentrancy, "reenter-swap-from-flash")
            .with("entry", 0)
            .with("nested", 1),
        ScenarioSpec::new(ScenarioKind::Reentrancy, "reenter-flash-from-swap")
            .with("entry", 1)
            .with("nested", 0),
        ScenarioSpec::new(ScenarioKind::Reentrancy, "reenter-mint-from-mint")
            .with("entry", 2)
            .with("nested", 2),
        ScenarioSpec::new(ScenarioKind::FrontRun, "front-run-50bps").with("slippage_bps", 50),
        ScenarioSpec::new(ScenarioKind::FrontRun, "front-run-stale-limit")
            .with("stale_limit", 1)
            .with("limit_bps", 25),
        ScenarioSpec::new(ScenarioKind::Sandwich, "sandwich"),
        ScenarioSpec::new(ScenarioKind::OracleManipulation, "oracle-single-block-push"),
        ScenarioSpec::new(ScenarioKind::OracleManipulation, "oracle-push-and-revert")
            .with("back_run", 1),
    ]
}
