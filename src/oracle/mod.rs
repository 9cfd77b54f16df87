//! TWAP oracle: the observation ring the pool writes, and the analysis of what an attacker can
//! make it report.

pub mod analyzer;
pub mod ring;

pub use analyzer::ManipulationAnalyzer;
pub use ring::ObservationRing;

use crate::error::PoolError;
use crate::pool::{Observation, PoolCollaborator, PoolFacade};

/// Two observations bounding a TWAP window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickWindow {
    pub start: Observation,
    pub end: Observation,
}

impl TickWindow {
    /// `observe([window, 0])` at the facade's current block.
    pub fn read<P: PoolCollaborator + ?Sized>(
        facade: &PoolFacade<'_, P>,
        window_seconds: u32,
    ) -> Result<Self, PoolError> {
        let obs = facade.observe(&[window_seconds, 0])?;
        match obs.as_slice() {
            [start, end] => Ok(Self {
                start: *start,
                end: *end,
            }),
            _ => Err(PoolError::reverted("observe returned a malformed window")),
        }
    }

    pub fn seconds(&self) -> u32 {
        self.end
            .timestamp_seconds
            .saturating_sub(self.start.timestamp_seconds)
    }

    /// `cum(end) - cum(start)`.
    pub fn tick_delta(&self) -> i64 {
        self.end.tick_cumulative - self.start.tick_cumulative
    }

    pub fn mean_tick(&self) -> Option<f64> {
        match self.seconds() {
            0 => None,
            secs => Some(self.tick_delta() as f64 / secs as f64),
        }
    }

    /// Integer mean tick rounded toward negative infinity.
    pub fn arithmetic_mean_tick(&self) -> Option<i32> {
        let secs = self.seconds() as i64;
        if secs == 0 {
            return None;
        }
        let delta = self.tick_delta();
        let mut mean = delta / secs;
        if delta < 0 && delta % secs != 0 {
            mean -= 1;
        }
        i32::try_from(mean).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(delta: i64, secs: u32) -> TickWindow {
        TickWindow {
            start: Observation {
                timestamp_seconds: 100,
                tick_cumulative: 1_000,
            },
            end: Observation {
                timestamp_seconds: 100 + secs,
                tick_cumulative: 1_000 + delta,
            },
        }
    }

    #[test]
    fn test_arithmetic_mean_tick_rounds_toward_negative_infinity() {
        assert_eq!(window(120, 60).arithmetic_mean_tick(), Some(2));
        assert_eq!(window(-61, 60).arithmetic_mean_tick(), Some(-2));
        assert_eq!(window(-60, 60).arithmetic_mean_tick(), Some(-1));
        assert_eq!(window(10, 0).arithmetic_mean_tick(), None);
        assert_eq!(window(-30, 60).mean_tick(), Some(-0.5));
    }
}
