//! Scenario definitions: which adversarial archetype to run and with what parameters.

pub mod catalog;

use crate::error::ScenarioError;
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    FlashLoan,
    Reentrancy,
    FrontRun,
    Sandwich,
    OracleManipulation,
}

impl ScenarioKind {
    pub const ALL: [ScenarioKind; 5] = [
        ScenarioKind::FlashLoan,
        ScenarioKind::Reentrancy,
        ScenarioKind::FrontRun,
        ScenarioKind::Sandwich,
        ScenarioKind::OracleManipulation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ScenarioKind::FlashLoan => "flash_loan",
            ScenarioKind::Reentrancy => "reentrancy",
            ScenarioKind::FrontRun => "front_run",
            ScenarioKind::Sandwich => "sandwich",
            ScenarioKind::OracleManipulation => "oracle_manipulation",
        }
    }
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScenarioKind {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        ScenarioKind::ALL
            .into_iter()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| ScenarioError::UnsupportedScenario(s.trim().to_string()))
    }
}

/// One scenario: a kind, a human label and integer parameters. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioSpec {
    kind: ScenarioKind,
    label: String,
    parameters: BTreeMap<String, i128>,
}

impl ScenarioSpec {
    pub fn new(kind: ScenarioKind, label: impl Into<String>) -> Self {
        Self {
            kind,
            label: label.into(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn with(mut self, name: &str, value: i128) -> Self {
        self.parameters.insert(name.to_string(), value);
        self
    }

    pub fn with_u256(self, name: &str, value: U256) -> Self {
        let value = i128::try_from(value).unwrap_or(i128::MAX);
        self.with(name, value)
    }

    pub fn kind(&self) -> ScenarioKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn parameters(&self) -> &BTreeMap<String, i128> {
        &self.parameters
    }

    pub fn param(&self, name: &str) -> Option<i128> {
        self.parameters.get(name).copied()
    }

    /// Non-negative token amount; `default` when absent.
    pub fn amount(&self, name: &str, default: U256) -> Result<U256, ScenarioError> {
        match self.param(name) {
            None => Ok(default),
            Some(v) if v < 0 => Err(invalid(name, format!("must be >= 0, got {v}"))),
            Some(v) => Ok(U256::from(v as u128)),
        }
    }

    /// Strictly positive token amount.
    pub fn positive_amount(&self, name: &str, default: U256) -> Result<U256, ScenarioError> {
        let value = self.amount(name, default)?;
        if value.is_zero() {
            return Err(invalid(name, "must be > 0"));
        }
        Ok(value)
    }

    pub fn u32_in(
        &self,
        name: &str,
        default: u32,
        range: RangeInclusive<u32>,
    ) -> Result<u32, ScenarioError> {
        let value = match self.param(name) {
            None => default,
            Some(v) => u32::try_from(v).map_err(|_| invalid(name, format!("not a u32: {v}")))?,
        };
        if !range.contains(&value) {
            return Err(invalid(
                name,
                format!("{value} outside {}..={}", range.start(), range.end()),
            ));
        }
        Ok(value)
    }

    pub fn flag(&self, name: &str, default: bool) -> Result<bool, ScenarioError> {
        match self.param(name) {
            None => Ok(default),
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            Some(v) => Err(invalid(name, format!("expected 0 or 1, got {v}"))),
        }
    }
}

fn invalid(name: &str, reason: impl Into<String>) -> ScenarioError {
    ScenarioError::InvalidParameter {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// A scenario as it arrives from outside the crate, with its kind still a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawScenario {
    pub kind: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, i128>,
}

impl TryFrom<RawScenario> for ScenarioSpec {
    type Error = ScenarioError;

    fn try_from(raw: RawScenario) -> Result<Self, Self::Error> {
        let kind = raw.kind.parse::<ScenarioKind>()?;
        let label = if raw.label.is_empty() {
            kind.to_string()
        } else {
            raw.label
        };
        Ok(Self {
            kind,
            label,
            parameters: raw.parameters,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parses_case_and_dash_insensitively() {
        assert_eq!("Front-Run".parse::<ScenarioKind>().unwrap(), ScenarioKind::FrontRun);
        assert_eq!(" sandwich ".parse::<ScenarioKind>().unwrap(), ScenarioKind::Sandwich);
        assert_eq!(
            "governance".parse::<ScenarioKind>().unwrap_err(),
            ScenarioError::UnsupportedScenario("governance".to_string())
        );
    }

    #[test]
    fn test_parameter_accessors_validate() {
        let spec = ScenarioSpec::new(ScenarioKind::FlashLoan, "t")
            .with("amount0", -1)
            .with("flag", 2)
            .with("bps", 20_000);
        assert!(matches!(
            spec.amount("amount0", U256::ZERO),
            Err(ScenarioError::InvalidParameter { .. })
        ));
        assert!(spec.flag("flag", false).is_err());
        assert!(spec.u32_in("bps", 50, 0..=10_000).is_err());
        assert_eq!(spec.u32_in("missing", 50, 0..=10_000).unwrap(), 50);
        assert_eq!(spec.amount("missing", U256::from(7u8)).unwrap(), U256::from(7u8));
    }

    #[test]
    fn test_raw_scenario_from_json() {
        let raw: RawScenario =
            serde_json::from_str(r#"{"kind":"flash_loan","parameters":{"shortfall":5}}"#).unwrap();
        let spec = ScenarioSpec::try_from(raw).unwrap();
        assert_eq!(spec.kind(), ScenarioKind::FlashLoan);
        assert_eq!(spec.label(), "flash_loan");
        assert_eq!(spec.param("shortfall"), Some(5));

        let raw = RawScenario {
            kind: "liquidation".to_string(),
            label: String::new(),
            parameters: BTreeMap::new(),
        };
        assert!(matches!(
            ScenarioSpec::try_from(raw),
            Err(ScenarioError::UnsupportedScenario(_))
        ));
    }
}
