use crate::error::PoolError;
use crate::pool::Observation;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Slot {
    timestamp: u32,
    tick_cumulative: i64,
    initialized: bool,
}

impl Slot {
    fn transform(self, timestamp: u32, tick: i32) -> Self {
        let elapsed = timestamp.wrapping_sub(self.timestamp) as i64;
        Self {
            timestamp,
            tick_cumulative: self
                .tick_cumulative
                .wrapping_add((tick as i64).wrapping_mul(elapsed)),
            initialized: true,
        }
    }

    fn observation(self) -> Observation {
        Observation {
            timestamp_seconds: self.timestamp,
            tick_cumulative: self.tick_cumulative,
        }
    }
}

/// Cumulative-tick accumulator: a bounded ring of observations, at most one per block
/// timestamp, oldest entry overwritten once the ring is full.
///
/// Growth requested through [`ObservationRing::grow`] takes effect when the write index wraps,
/// so existing history is never reordered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservationRing {
    slots: Vec<Slot>,
    index: u16,
    cardinality: u16,
    cardinality_next: u16,
}

impl ObservationRing {
    pub fn initialize(timestamp: u32) -> Self {
        Self {
            slots: vec![Slot {
                timestamp,
                tick_cumulative: 0,
                initialized: true,
            }],
            index: 0,
            cardinality: 1,
            cardinality_next: 1,
        }
    }

    pub fn index(&self) -> u16 {
        self.index
    }

    pub fn cardinality(&self) -> u16 {
        self.cardinality
    }

    pub fn cardinality_next(&self) -> u16 {
        self.cardinality_next
    }

    /// Requests capacity for `next` observations. Never shrinks.
    pub fn grow(&mut self, next: u16) -> u16 {
        if next <= self.cardinality_next {
            return self.cardinality_next;
        }
        self.slots.resize(next as usize, Slot::default());
        self.cardinality_next = next;
        next
    }

    /// Accumulates `tick` over the time since the newest entry and appends an observation.
    /// Returns false when an entry for `timestamp` already exists.
    pub fn write(&mut self, timestamp: u32, tick: i32) -> bool {
        let last = self.slots[self.index as usize];
        if last.timestamp == timestamp {
            return false;
        }
        if self.cardinality_next > self.cardinality && self.index == self.cardinality - 1 {
            self.cardinality = self.cardinality_next;
        }
        self.index = (self.index + 1) % self.cardinality;
        self.slots[self.index as usize] = last.transform(timestamp, tick);
        true
    }

    pub fn newest(&self) -> Observation {
        self.slots[self.index as usize].observation()
    }

    /// Entry stored at ring position `index`, if that slot has been written.
    pub fn at(&self, index: u16) -> Option<Observation> {
        (index < self.cardinality)
            .then(|| self.slots.get(index as usize))
            .flatten()
            .filter(|slot| slot.initialized)
            .map(|slot| slot.observation())
    }

    pub fn oldest(&self) -> Observation {
        self.slots[self.oldest_position()].observation()
    }

    fn oldest_position(&self) -> usize {
        let next = (self.index as usize + 1) % self.cardinality as usize;
        if self.slots[next].initialized {
            next
        } else {
            0
        }
    }

    /// Recorded entries, oldest first.
    pub fn chronological(&self) -> Vec<Observation> {
        let start = self.oldest_position();
        let len = if start == 0 {
            self.index as usize + 1
        } else {
            self.cardinality as usize
        };
        (0..len)
            .map(|i| self.slots[(start + i) % self.cardinality as usize].observation())
            .collect()
    }

    /// Seconds of history available at `now`.
    pub fn history_seconds(&self, now: u32) -> u32 {
        now.saturating_sub(self.oldest().timestamp_seconds)
    }

    /// Cumulative tick `seconds_ago` before `now`, given the pool's current tick. Exact on
    /// recorded entries, interpolated between them, extrapolated past the newest.
    pub fn observe_single(&self, now: u32, seconds_ago: u32, tick: i32) -> Result<i64, PoolError> {
        let newest = self.slots[self.index as usize];
        let lookback_error = || PoolError::UnsupportedLookback {
            requested: seconds_ago,
            available: self.history_seconds(now),
        };
        let target = now.checked_sub(seconds_ago).ok_or_else(lookback_error)?;

        if target >= newest.timestamp {
            return Ok(newest.transform(target, tick).tick_cumulative);
        }
        if target < self.oldest().timestamp_seconds {
            return Err(lookback_error());
        }

        let entries = self.chronological();
        let after_pos = entries.partition_point(|o| o.timestamp_seconds <= target);
        let before = entries[after_pos - 1];
        if before.timestamp_seconds == target {
            return Ok(before.tick_cumulative);
        }
        let after = entries[after_pos];
        let span = (after.timestamp_seconds - before.timestamp_seconds) as i64;
        let offset = (target - before.timestamp_seconds) as i64;
        let slope = (after.tick_cumulative - before.tick_cumulative) / span;
        Ok(before.tick_cumulative + slope * offset)
    }

    pub fn observe(&self, now: u32, seconds_agos: &[u32], tick: i32) -> Result<Vec<i64>, PoolError> {
        seconds_agos
            .iter()
            .map(|ago| self.observe_single(now, *ago, tick))
            .collect()
    }
}
