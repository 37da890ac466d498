//! Composite health scoring and trend tracking
//!
//! A server's score is the sum of four component scores, each nominally in `[0, 1]`:
//!
//! ```text
//! latency = (5000 - latency_ms) / 5000     (negative above the ceiling)
//! status  = 1 if the last probe returned 200, else 0
//! memory  = 1 - memory_load / 100
//! cpu     = 1 - cpu / 100
//! ```
//!
//! The raw sum (nominally `[0, 4]`) is normalized to `[0, 1]` and mapped to a color band.
//! Every recomputation appends the "badness" `4 - raw` to the server's trend.

use std::collections::VecDeque;

use serde::{Serialize, Serializer};
use tracing::trace;

use crate::registry::HealthState;

/// Latency recorded for a failed probe, also the zero point of the latency score
pub const LATENCY_CEILING_MS: f64 = 5000.0;

/// Maximum number of trend samples kept per server
pub const TREND_CAPACITY: usize = 100;

/// Highest possible raw score (four components of 1.0)
pub const MAX_SCORE: f64 = 4.0;

/// Color band derived from the normalized score
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum StatusColor {
    /// No score computed yet
    #[default]
    Unknown,
    Red,
    Amber,
    Green,
    BrightGreen,
}

impl StatusColor {
    /// Map a normalized score onto its band.
    ///
    /// Band boundaries are inclusive on the upper end, so `0.25` is still red.
    pub fn from_normalized(normalized: f64) -> Self {
        if normalized <= 0.25 {
            StatusColor::Red
        } else if normalized <= 0.50 {
            StatusColor::Amber
        } else if normalized <= 0.75 {
            StatusColor::Green
        } else {
            StatusColor::BrightGreen
        }
    }

    pub fn hex(self) -> &'static str {
        match self {
            StatusColor::Unknown => "#cccccc",
            StatusColor::Red => "#ff0000",
            StatusColor::Amber => "#ffcc00",
            StatusColor::Green => "#00cc00",
            StatusColor::BrightGreen => "#00ff00",
        }
    }
}

impl Serialize for StatusColor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.hex())
    }
}

/// Current signal values a score is computed from
///
/// A missing signal contributes a component score of 0.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoreInputs {
    pub cpu: Option<f64>,
    pub memory_load: Option<f64>,
    /// HTTP status of the last successful probe, `None` if never probed or failed
    pub http_status: Option<u16>,
    pub latency_ms: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthScore {
    pub latency: f64,
    pub status: f64,
    pub memory: f64,
    pub cpu: f64,
}

impl HealthScore {
    pub fn compute(inputs: &ScoreInputs) -> Self {
        Self {
            latency: inputs
                .latency_ms
                .map_or(0.0, |latency| (LATENCY_CEILING_MS - latency) / LATENCY_CEILING_MS),
            status: if inputs.http_status == Some(200) { 1.0 } else { 0.0 },
            memory: inputs.memory_load.map_or(0.0, |load| 1.0 - load / 100.0),
            cpu: inputs.cpu.map_or(0.0, |cpu| 1.0 - cpu / 100.0),
        }
    }

    pub fn raw(&self) -> f64 {
        self.latency + self.status + self.memory + self.cpu
    }

    pub fn normalized(&self) -> f64 {
        self.raw() / MAX_SCORE
    }

    pub fn color(&self) -> StatusColor {
        StatusColor::from_normalized(self.normalized())
    }

    /// Value appended to the trend; grows as health degrades.
    pub fn badness(&self) -> f64 {
        MAX_SCORE - self.raw()
    }
}

/// Bounded FIFO of badness samples
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreTrend(VecDeque<f64>);

impl ScoreTrend {
    /// A trend holding the single seed sample `0`.
    pub fn seeded() -> Self {
        let mut samples = VecDeque::with_capacity(TREND_CAPACITY + 1);
        samples.push_back(0.0);
        Self(samples)
    }

    pub fn push(&mut self, badness: f64) {
        self.0.push_back(badness);
        while self.0.len() > TREND_CAPACITY {
            self.0.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn latest(&self) -> Option<f64> {
        self.0.back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.0.iter()
    }
}

impl Default for ScoreTrend {
    fn default() -> Self {
        Self::seeded()
    }
}

impl Serialize for ScoreTrend {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

/// Recomputes a server's score from its current field values
pub struct HealthScorer;

impl HealthScorer {
    /// Full recomputation: updates the color band and appends to the trend.
    ///
    /// Only `status` and `score_trend` are written; signal fields are left alone.
    pub fn recompute(state: &mut HealthState) -> HealthScore {
        let score = HealthScore::compute(&state.score_inputs());

        state.status = score.color();
        state.score_trend.push(score.badness());

        trace!(
            "score {:.3} (normalized {:.3}) -> {}",
            score.raw(),
            score.normalized(),
            state.status.hex()
        );

        score
    }
}
