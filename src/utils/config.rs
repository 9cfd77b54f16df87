use crate::error::{ConfigError, Result};
use crate::scenario::ScenarioKind;
use alloy_primitives::{address, Address, U256};
use std::collections::BTreeSet;
use std::str::FromStr;

pub const DEFAULT_POOL_ADDRESS: Address = address!("8ad599c3a0ff1de082011efddc58f1908eb6e6d8");
pub const DEFAULT_OWNER: Address = address!("f39fd6e51aad88f6f4ce6ab8827279cfffb92266");
pub const DEFAULT_ATTACKER: Address = address!("70997970c51812dc3a010c7d01b50e0d17dc79c8");
pub const DEFAULT_USER: Address = address!("3c44cdddb6a900fa2b585dd299e03d12fa4293bc");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolBackend {
    /// In-memory reference collaborator (`pool::sim::SimulatedPool`).
    Simulated,
}

/// Opaque caller handles for the three roles the scenarios need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identities {
    pub owner: Address,
    pub attacker: Address,
    pub user: Address,
}

impl Default for Identities {
    fn default() -> Self {
        Self {
            owner: DEFAULT_OWNER,
            attacker: DEFAULT_ATTACKER,
            user: DEFAULT_USER,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub backend: PoolBackend,
    pub pool_address: Address,
    pub identities: Identities,
    pub fee_pips: u32,
    pub tick_spacing: i32,
    pub block_seconds: u32,
    pub observation_cardinality: u16,
    pub initial_sqrt_price_x96: U256,
    pub initial_liquidity_tokens: u64,
    pub account_funding_tokens: u64,
    pub max_parallel: usize,
    pub scenario_allowlist: Option<BTreeSet<ScenarioKind>>,
    pub scenario_denylist: BTreeSet<ScenarioKind>,
    pub report_json: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            backend: PoolBackend::Simulated,
            pool_address: DEFAULT_POOL_ADDRESS,
            identities: Identities::default(),
            fee_pips: 3_000,
            tick_spacing: 60,
            block_seconds: 12,
            observation_cardinality: 16,
            initial_sqrt_price_x96: crate::pool::math::Q96,
            initial_liquidity_tokens: 1_000_000,
            account_funding_tokens: 10_000,
            max_parallel: default_parallelism(),
            scenario_allowlist: None,
            scenario_denylist: BTreeSet::new(),
            report_json: false,
        }
    }
}

fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
        .clamp(1, 32)
}

fn parse_bool_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn tick_spacing_for_fee(fee_pips: u32) -> Option<i32> {
    match fee_pips {
        100 => Some(1),
        500 => Some(10),
        3_000 => Some(60),
        10_000 => Some(200),
        _ => None,
    }
}

fn parse_kind_list(name: &str, raw: &str) -> Result<BTreeSet<ScenarioKind>> {
    let mut out = BTreeSet::new();
    for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let kind = ScenarioKind::from_str(item).map_err(|_| {
            ConfigError::InvalidConfig(format!("{name} contains unknown scenario kind `{item}`"))
        })?;
        out.insert(kind);
    }
    Ok(out)
}

struct Lookup<F> {
    get: F,
}

impl<F> Lookup<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn raw(&self, key: &str) -> Option<String> {
        (self.get)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parsed<T: FromStr>(&self, key: &str, default: T) -> Result<T> {
        match self.raw(key) {
            None => Ok(default),
            Some(raw) => raw.parse::<T>().map_err(|_| {
                ConfigError::InvalidConfig(format!("{key} could not be parsed, got `{raw}`")).into()
            }),
        }
    }

    fn address(&self, key: &str, default: Address) -> Result<Address> {
        match self.raw(key) {
            None => Ok(default),
            Some(raw) => Address::from_str(&raw).map_err(|e| {
                ConfigError::InvalidConfig(format!("{key} must be a 20-byte hex address, got `{raw}`: {e}"))
                    .into()
            }),
        }
    }
}

impl HarnessConfig {
    /// Reads the process environment (after `.env` loading).
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Lookup { get };
        let defaults = Self::default();

        let backend = match env.raw("HARNESS_POOL_BACKEND").as_deref() {
            None | Some("sim") | Some("simulated") => PoolBackend::Simulated,
            Some(other) => {
                return Err(ConfigError::InvalidConfig(format!(
                    "HARNESS_POOL_BACKEND `{other}` is not available in this build (supported: sim)"
                ))
                .into())
            }
        };

        let pool_address = env.address("HARNESS_POOL_ADDRESS", defaults.pool_address)?;
        if pool_address == Address::ZERO {
            return Err(
                ConfigError::MissingConfig("HARNESS_POOL_ADDRESS must not be zero".to_string()).into(),
            );
        }

        let identities = Identities {
            owner: env.address("HARNESS_OWNER_ADDRESS", defaults.identities.owner)?,
            attacker: env.address("HARNESS_ATTACKER_ADDRESS", defaults.identities.attacker)?,
            user: env.address("HARNESS_USER_ADDRESS", defaults.identities.user)?,
        };
        let distinct: BTreeSet<Address> = [identities.owner, identities.attacker, identities.user]
            .into_iter()
            .collect();
        if distinct.len() != 3 || distinct.contains(&pool_address) {
            return Err(ConfigError::InvalidConfig(
                "owner, attacker, user and pool addresses must all be distinct".to_string(),
            )
            .into());
        }

        let fee_pips: u32 = env.parsed("HARNESS_FEE_PIPS", defaults.fee_pips)?;
        let tick_spacing = tick_spacing_for_fee(fee_pips).ok_or_else(|| {
            ConfigError::InvalidConfig(format!(
                "HARNESS_FEE_PIPS must be one of 100, 500, 3000, 10000, got {fee_pips}"
            ))
        })?;

        let block_seconds: u32 = env.parsed("HARNESS_BLOCK_SECONDS", defaults.block_seconds)?;
        if block_seconds == 0 {
            return Err(
                ConfigError::InvalidConfig("HARNESS_BLOCK_SECONDS must be > 0".to_string()).into(),
            );
        }

        let observation_cardinality: u16 = env.parsed(
            "HARNESS_OBSERVATION_CARDINALITY",
            defaults.observation_cardinality,
        )?;
        if observation_cardinality == 0 {
            return Err(ConfigError::InvalidConfig(
                "HARNESS_OBSERVATION_CARDINALITY must be > 0".to_string(),
            )
            .into());
        }

        let initial_sqrt_price_x96: U256 = env.parsed(
            "HARNESS_INITIAL_SQRT_PRICE_X96",
            defaults.initial_sqrt_price_x96,
        )?;
        if initial_sqrt_price_x96 < crate::pool::math::MIN_SQRT_RATIO
            || initial_sqrt_price_x96 >= crate::pool::math::MAX_SQRT_RATIO
        {
            return Err(ConfigError::InvalidConfig(format!(
                "HARNESS_INITIAL_SQRT_PRICE_X96 out of range: {initial_sqrt_price_x96}"
            ))
            .into());
        }

        let initial_liquidity_tokens: u64 = env.parsed(
            "HARNESS_INITIAL_LIQUIDITY_TOKENS",
            defaults.initial_liquidity_tokens,
        )?;
        if initial_liquidity_tokens == 0 {
            return Err(ConfigError::InvalidConfig(
                "HARNESS_INITIAL_LIQUIDITY_TOKENS must be > 0".to_string(),
            )
            .into());
        }
        let account_funding_tokens: u64 = env.parsed(
            "HARNESS_ACCOUNT_FUNDING_TOKENS",
            defaults.account_funding_tokens,
        )?;

        let max_parallel = env
            .parsed("HARNESS_MAX_PARALLEL", defaults.max_parallel)?
            .clamp(1, 64);

        let scenario_allowlist = match env.raw("HARNESS_SCENARIO_ALLOWLIST") {
            Some(raw) => Some(parse_kind_list("HARNESS_SCENARIO_ALLOWLIST", &raw)?),
            None => None,
        };
        let scenario_denylist = match env.raw("HARNESS_SCENARIO_DENYLIST") {
            Some(raw) => parse_kind_list("HARNESS_SCENARIO_DENYLIST", &raw)?,
            None => BTreeSet::new(),
        };

        let report_json = match env.raw("HARNESS_REPORT_JSON") {
            None => defaults.report_json,
            Some(raw) => parse_bool_flag(&raw).ok_or_else(|| {
                ConfigError::InvalidConfig(format!("HARNESS_REPORT_JSON must be a boolean, got `{raw}`"))
            })?,
        };

        Ok(Self {
            backend,
            pool_address,
            identities,
            fee_pips,
            tick_spacing,
            block_seconds,
            observation_cardinality,
            initial_sqrt_price_x96,
            initial_liquidity_tokens,
            account_funding_tokens,
            max_parallel,
            scenario_allowlist,
            scenario_denylist,
            report_json,
        })
    }

    /// Whether the run is allowed to execute scenarios of this kind.
    pub fn kind_enabled(&self, kind: ScenarioKind) -> bool {
        if self.scenario_denylist.contains(&kind) {
            return false;
        }
        match &self.scenario_allowlist {
            Some(allow) => allow.contains(&kind),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_from_lookup_defaults_match_mainnet_style_pool() {
        let cfg = HarnessConfig::from_lookup(lookup(&[])).expect("defaults must load");
        assert_eq!(cfg.backend, PoolBackend::Simulated);
        assert_eq!(cfg.fee_pips, 3_000);
        assert_eq!(cfg.tick_spacing, 60);
        assert_eq!(cfg.initial_sqrt_price_x96, crate::pool::math::Q96);
        assert!(cfg.kind_enabled(ScenarioKind::Sandwich));
    }

    #[test]
    fn test_from_lookup_rejects_unknown_backend_and_fee_tier() {
        let err = HarnessConfig::from_lookup(lookup(&[("HARNESS_POOL_BACKEND", "rpc")]))
            .expect_err("rpc backend is not built");
        assert!(err.to_string().contains("HARNESS_POOL_BACKEND"));

        let err = HarnessConfig::from_lookup(lookup(&[("HARNESS_FEE_PIPS", "2500")]))
            .expect_err("2500 is not a fee tier");
        assert!(err.to_string().contains("HARNESS_FEE_PIPS"));
    }

    #[test]
    fn test_from_lookup_rejects_bad_or_colliding_addresses() {
        assert!(HarnessConfig::from_lookup(lookup(&[("HARNESS_POOL_ADDRESS", "0x1234")])).is_err());
        let attacker = format!("{:#x}", DEFAULT_OWNER);
        assert!(
            HarnessConfig::from_lookup(lookup(&[("HARNESS_ATTACKER_ADDRESS", &attacker)])).is_err()
        );
    }

    #[test]
    fn test_scenario_allow_and_deny_lists_gate_kinds() {
        let cfg = HarnessConfig::from_lookup(lookup(&[
            ("HARNESS_SCENARIO_ALLOWLIST", "flash_loan, reentrancy"),
            ("HARNESS_SCENARIO_DENYLIST", "reentrancy"),
            ("HARNESS_REPORT_JSON", "yes"),
        ]))
        .expect("lists must parse");
        assert!(cfg.kind_enabled(ScenarioKind::FlashLoan));
        assert!(!cfg.kind_enabled(ScenarioKind::Reentrancy));
        assert!(!cfg.kind_enabled(ScenarioKind::OracleManipulation));
        assert!(cfg.report_json);

        assert!(HarnessConfig::from_lookup(lookup(&[(
            "HARNESS_SCENARIO_DENYLIST",
            "flash_loan,governance"
        )]))
        .is_err());
    }
}
