//! Scratch storage reused by every integration call.

use crate::Float;

/// Work vectors for one integrator instance.
///
/// Each vector is sized for `states * max_lineages + 1` entries at setup;
/// a call with fewer lineages works on the leading `len` entries.
#[derive(Clone, Debug)]
pub(crate) struct StateBuffer {
    /// Working copy of the caller's vector; written back only when the
    /// whole call succeeds.
    pub(crate) y: Vec<Float>,
    /// Derivative at the start of the sub-step.
    pub(crate) dp0: Vec<Float>,
    /// Derivative after the first half step.
    pub(crate) dp_half: Vec<Float>,
    /// State after the first half step.
    pub(crate) y_half: Vec<Float>,
    /// Candidate state at the end of the sub-step.
    pub(crate) y_new: Vec<Float>,
    /// Per-state lineage sums used by the dynamic kernel.
    pub(crate) sums: Vec<Float>,
}

impl StateBuffer {
    pub(crate) fn new(states: usize, max_lineages: usize) -> Self {
        let capacity = states * max_lineages + 1;
        Self {
            y: vec![0.0; capacity],
            dp0: vec![0.0; capacity],
            dp_half: vec![0.0; capacity],
            y_half: vec![0.0; capacity],
            y_new: vec![0.0; capacity],
            sums: vec![0.0; states],
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.dp0.len()
    }
}
