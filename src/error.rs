use alloy_primitives::U256;
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HarnessError>;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("pool error: {0}")]
    Pool(#[from] PoolError),
    #[error("scenario error: {0}")]
    Scenario(#[from] ScenarioError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    /// The collaborator could not be built. Fatal: the run halts before the next scenario.
    #[error("pool setup failed for `{label}`: {source}")]
    Setup { label: String, source: PoolError },
}

/// Outcomes the pool collaborator may legitimately produce. These are captured into
/// scenario results, never treated as harness bugs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("price limit reached: {0}")]
    PriceLimitReached(String),
    #[error("insufficient repayment of token{token}: required {required}, returned {returned}")]
    InsufficientRepayment {
        token: u8,
        required: U256,
        returned: U256,
    },
    #[error("reverted: {0}")]
    Reverted(String),
    #[error("unsupported lookback: requested {requested}s, history covers {available}s")]
    UnsupportedLookback { requested: u32, available: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RevertCategory {
    PriceLimitReached,
    InsufficientRepayment,
    Reverted,
    UnsupportedLookback,
}

impl PoolError {
    pub fn category(&self) -> RevertCategory {
        match self {
            Self::PriceLimitReached(_) => RevertCategory::PriceLimitReached,
            Self::InsufficientRepayment { .. } => RevertCategory::InsufficientRepayment,
            Self::Reverted(_) => RevertCategory::Reverted,
            Self::UnsupportedLookback { .. } => RevertCategory::UnsupportedLookback,
        }
    }

    pub fn reverted(reason: impl Into<String>) -> Self {
        Self::Reverted(reason.into())
    }

    /// True when the revert carries the given reason string (e.g. `"LOK"`).
    pub fn is_reason(&self, reason: &str) -> bool {
        match self {
            Self::Reverted(r) | Self::PriceLimitReached(r) => r == reason,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScenarioError {
    #[error("unsupported scenario: {0}")]
    UnsupportedScenario(String),
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: String, reason: String },
    #[error("scenario aborted before start")]
    Aborted,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration: {0}")]
    MissingConfig(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
