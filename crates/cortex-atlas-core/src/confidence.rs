//! Conservative confidence scoring.
//!
//! ```text
//! n < MIN_CHUNKS_FOR_INFERENCE  →  INSUFFICIENT_DATA_CONFIDENCE
//! otherwise                     →  min(n/20, 1) × max(0, 1 − 0.1·states) × coherence
//! ```
//!
//! More distinct states lower confidence; the result is capped at `1.0` and
//! rounded to two decimals.

/// Below this many chunks a report is degenerate.
pub const MIN_CHUNKS_FOR_INFERENCE: usize = 5;

/// Fixed score reported for degenerate input.
pub const INSUFFICIENT_DATA_CONFIDENCE: f64 = 0.2;

/// Chunk volume at which the volume factor saturates.
const FULL_VOLUME_CHUNKS: f64 = 20.0;

/// Confidence lost per distinct automaton state.
const STATE_PENALTY_STEP: f64 = 0.1;

pub fn compute_confidence(num_chunks: usize, num_states: usize, coherence_score: f64) -> f64 {
    if num_chunks < MIN_CHUNKS_FOR_INFERENCE {
        return INSUFFICIENT_DATA_CONFIDENCE;
    }

    let base = (num_chunks as f64 / FULL_VOLUME_CHUNKS).min(1.0);
    let state_penalty = (1.0 - num_states as f64 * STATE_PENALTY_STEP).max(0.0);

    round2((base * state_penalty * coherence_score).min(1.0))
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
