//! Effect scheduler: an uncapped tick loop that fires payloads whenever
//! `counter % period == phase` for an entry of the active stage.
//!
//! The stage is read from a [`StageCell`] on every tick; the tone sequencer
//! is the only writer. The scheduler never advances it itself.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::gdi::Gdi;
use crate::payloads::PayloadSpec;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    First = 0,
    Second = 1,
    Third = 2,
    /// Observing this ends the run.
    Terminal = 3,
}

impl Stage {
    pub fn from_u8(v: u8) -> Stage {
        match v {
            0 => Stage::First,
            1 => Stage::Second,
            2 => Stage::Third,
            _ => Stage::Terminal,
        }
    }

    pub fn index(self) -> usize { self as usize }

    pub fn next(self) -> Stage { Stage::from_u8(self as u8 + 1) }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Terminal => f.write_str("terminal"),
            other => write!(f, "{}", *other as u8 + 1),
        }
    }
}

/// Shared stage value: one writer (tone sequencer), one reader (scheduler).
#[derive(Clone, Debug)]
pub struct StageCell(Arc<AtomicU8>);

impl StageCell {
    pub fn new(stage: Stage) -> Self {
        Self(Arc::new(AtomicU8::new(stage as u8)))
    }

    pub fn get(&self) -> Stage {
        Stage::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, stage: Stage) {
        self.0.store(stage as u8, Ordering::Release);
    }

    /// Move to the next stage (saturating at Terminal); returns the new stage.
    pub fn advance(&self) -> Stage {
        let next = self.get().next();
        self.set(next);
        next
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchEntry {
    pub period: u64,
    #[serde(default)]
    pub phase: u64,
    pub payload: PayloadSpec,
}

impl DispatchEntry {
    pub fn new(period: u64, phase: u64, payload: PayloadSpec) -> Self {
        Self { period, phase, payload }
    }

    #[inline]
    pub fn fires_on(&self, tick: u64) -> bool {
        tick % self.period == self.phase
    }
}

/// Entries for stages 0, 1 and 2, evaluated in order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchTable {
    pub stages: [Vec<DispatchEntry>; 3],
}

impl DispatchTable {
    /// Zero periods, out-of-range phases and unusable payload bounds are rejected up front.
    pub fn validate(&self) -> Result<(), Error> {
        for (stage, entries) in self.stages.iter().enumerate() {
            for e in entries {
                if e.period == 0 {
                    return Err(Error::Config(format!("stage {}: period must be at least 1", stage + 1)));
                }
                if e.phase >= e.period {
                    return Err(Error::Config(format!(
                        "stage {}: phase {} must be below period {}",
                        stage + 1,
                        e.phase,
                        e.period
                    )));
                }
                e.payload
                    .validate()
                    .map_err(|msg| Error::Config(format!("stage {}: {:?}: {msg}", stage + 1, e.payload)))?;
            }
        }
        Ok(())
    }

    pub fn entries(&self, stage: Stage) -> &[DispatchEntry] {
        self.stages.get(stage.index()).map_or(&[], |v| v.as_slice())
    }
}

impl Default for DispatchTable {
    fn default() -> Self {
        use PayloadSpec::*;
        let e = DispatchEntry::new;
        Self {
            stages: [
                vec![
                    e(2, 0, Melt { min_width: 50, max_width: 500, max_shift: 10 }),
                    e(200, 0, Tunnel { divisor: 50, invert: false, rainbow: false }),
                    e(200, 0, DrawError { cursor: false, error: true }),
                    e(200, 50, DrawError { cursor: true, error: true }),
                ],
                vec![
                    e(5, 0, Rotate { max_amount: 100 }),
                    e(1, 0, Puzzle { bound: 500 }),
                    e(5, 0, Invert),
                    e(30, 0, DrawError { cursor: false, error: true }),
                    e(30, 15, DrawError { cursor: true, error: true }),
                ],
                vec![
                    e(2, 0, Melt { min_width: 50, max_width: 500, max_shift: 50 }),
                    e(5, 0, Invert),
                    e(15, 0, Blur { jitter: 2 }),
                    e(10, 0, Tunnel { divisor: 100, invert: true, rainbow: true }),
                    e(1, 0, DrawError { cursor: false, error: false }),
                    e(1, 0, DrawError { cursor: true, error: true }),
                    e(1, 0, Puzzle { bound: 500 }),
                    e(5, 0, Rotate { max_amount: 100 }),
                ],
            ],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FinishReason {
    TickCeiling,
    TerminalStage,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Still going; `fired` payloads ran this tick.
    Running { fired: usize },
    Finished(FinishReason),
}

pub struct Scheduler<R: Rng> {
    counter: u64,
    tick_limit: Option<u64>,
    stage: StageCell,
    table: DispatchTable,
    rng: R,
}

impl<R: Rng> Scheduler<R> {
    pub fn new(table: DispatchTable, stage: StageCell, tick_limit: Option<u64>, rng: R) -> Self {
        Self { counter: 0, tick_limit, stage, table, rng }
    }

    pub fn counter(&self) -> u64 { self.counter }

    pub fn stage(&self) -> Stage { self.stage.get() }

    /// One loop iteration. Payloads due this tick run back to back, each
    /// releasing its handles before the next starts.
    pub fn tick<G: Gdi + ?Sized>(&mut self, gdi: &G) -> TickOutcome {
        self.counter += 1;
        let tick = self.counter;

        if self.tick_limit.is_some_and(|limit| tick >= limit) {
            log::info!("tick ceiling reached at tick {tick}");
            return TickOutcome::Finished(FinishReason::TickCeiling);
        }

        let stage = self.stage.get();
        if stage == Stage::Terminal {
            log::info!("terminal stage observed at tick {tick}");
            return TickOutcome::Finished(FinishReason::TerminalStage);
        }

        let (w, h) = gdi.screen_size();
        let mut fired = 0;
        for entry in self.table.entries(stage) {
            if !entry.fires_on(tick) { continue; }
            let payload = entry.payload.sample(&mut self.rng, w, h);
            match payload.run(gdi, &mut self.rng) {
                Some(()) => log::trace!("tick {tick}: {} {:?}", payload.name(), payload),
                None => log::debug!("tick {tick}: {} skipped, graphics resource unavailable", payload.name()),
            }
            fired += 1;
        }
        TickOutcome::Running { fired }
    }
}
