//! First-order state machine inference.
//!
//! Treats each distinct label in an ordered sequence as a state and
//! estimates transition probabilities by raw frequency:
//!
//! - `support(s) = count(s) / len(sequence)`
//! - `P(a → b) = count(a, b) / count(a)`
//!
//! Pairs are taken over consecutive positions, self-transitions included.
//! There is no smoothing and no mass reserved for unseen transitions, so
//! the row of the sequence's final label sums to less than one (its last
//! occurrence has no successor).

use std::collections::HashMap;

use crate::models::{Automaton, AutomatonState, AutomatonTransition};

/// Infer an [`Automaton`] from a label sequence.
///
/// States and transitions are listed in order of first appearance.
pub fn infer_automaton<S: AsRef<str>>(sequence: &[S]) -> Automaton {
    if sequence.is_empty() {
        return Automaton::default();
    }

    let mut state_order: Vec<&str> = Vec::new();
    let mut state_counts: HashMap<&str, usize> = HashMap::new();
    for label in sequence {
        let label = label.as_ref();
        let count = state_counts.entry(label).or_insert(0);
        if *count == 0 {
            state_order.push(label);
        }
        *count += 1;
    }

    let mut pair_order: Vec<(&str, &str)> = Vec::new();
    let mut pair_counts: HashMap<(&str, &str), usize> = HashMap::new();
    for window in sequence.windows(2) {
        let pair = (window[0].as_ref(), window[1].as_ref());
        let count = pair_counts.entry(pair).or_insert(0);
        if *count == 0 {
            pair_order.push(pair);
        }
        *count += 1;
    }

    let total = sequence.len() as f64;
    let states = state_order
        .iter()
        .map(|&label| AutomatonState {
            state_id: label.to_string(),
            label: label.to_string(),
            support: state_counts[label] as f64 / total,
        })
        .collect();

    let transitions = pair_order
        .iter()
        .map(|&(from, to)| AutomatonTransition {
            from_state: from.to_string(),
            to_state: to.to_string(),
            probability: pair_counts[&(from, to)] as f64 / state_counts[from] as f64,
        })
        .collect();

    Automaton {
        states,
        transitions,
    }
}
