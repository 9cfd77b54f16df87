//! Pool Sentinel library surface.
//!
//! Drives attacker agents against a concentrated-liquidity pool through a narrow collaborator
//! interface and judges a fixed set of safety invariants: the reentrancy lock, atomic flash
//! settlement, TWAP manipulation resistance and slippage-bounded swaps.
//!
//! The binary (`src/main.rs`) runs the default catalog against the in-memory reference pool.

pub mod agents;
pub mod error;
pub mod invariants;
pub mod oracle;
pub mod orchestrator;
pub mod pool;
pub mod scenario;
pub mod utils;
