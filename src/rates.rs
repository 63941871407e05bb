//! Migration and coalescent rates, and the epoch schedule that stores them.

use tracing::{debug, trace};

use crate::{Float, error::Error};

/// Borrowed view of the rates active during one integration call.
///
/// `migration` is a flat row-major `states x states` matrix where entry
/// `from * states + to` is the rate at which a lineage in state `from`
/// moves to state `to`. Diagonal entries are ignored. `coalescent[j]` is
/// the pairwise coalescent rate inside state `j`.
///
/// A view can only be obtained through [`Rates::new`] or a
/// [`RateSchedule`], so its shapes always match its state count:
///
/// ```compile_fail
/// use lineage_ode::Rates;
///
/// let short = Rates { migration: &[0.0], coalescent: &[1.0, 1.0] };
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rates<'a> {
    pub(crate) migration: &'a [Float],
    pub(crate) coalescent: &'a [Float],
}

impl<'a> Rates<'a> {
    /// Validate shapes and values for a model with `states` states.
    pub fn new(states: usize, migration: &'a [Float], coalescent: &'a [Float]) -> Result<Self, Error> {
        if migration.len() != states * states {
            return Err(Error::MigrationLength {
                expected: states * states,
                got: migration.len(),
            });
        }
        if coalescent.len() != states {
            return Err(Error::CoalescentLength {
                expected: states,
                got: coalescent.len(),
            });
        }
        check_migration(states, migration, 0)?;
        check_coalescent(coalescent, 0)?;
        Ok(Self { migration, coalescent })
    }

    pub fn states(&self) -> usize {
        self.coalescent.len()
    }

    /// Rate of moving from state `from` to state `to`.
    pub fn migration(&self, from: usize, to: usize) -> Float {
        self.migration[from * self.states() + to]
    }

    /// Pairwise coalescent rate inside state `state`.
    pub fn coalescent(&self, state: usize) -> Float {
        self.coalescent[state]
    }
}

/// Off-diagonal migration rates must be finite and non-negative. `offset`
/// is added to reported indices so schedule errors point into the flat
/// caller array.
fn check_migration(states: usize, migration: &[Float], offset: usize) -> Result<(), Error> {
    for (i, &value) in migration.iter().enumerate() {
        let (from, to) = ((i / states) % states, i % states);
        if from != to && !(value.is_finite() && value >= 0.0) {
            return Err(Error::InvalidRate { index: offset + i, value });
        }
    }
    Ok(())
}

fn check_coalescent(coalescent: &[Float], offset: usize) -> Result<(), Error> {
    for (i, &value) in coalescent.iter().enumerate() {
        if !(value.is_finite() && value >= 0.0) {
            return Err(Error::InvalidRate { index: offset + i, value });
        }
    }
    Ok(())
}

/// Zero every migration entry whose indicator is unset.
fn apply_indicators(migration: &mut [Float], indicators: &[bool]) -> usize {
    let mut masked = 0;
    for (rate, &on) in migration.iter_mut().zip(indicators) {
        if !on && *rate != 0.0 {
            *rate = 0.0;
            masked += 1;
        }
    }
    masked
}

/// Instance-owned copy of the rates used by the next integration calls.
///
/// Storage is sized once for `states` so refreshing the rates never
/// allocates.
#[derive(Clone, Debug)]
pub(crate) struct RateBuffer {
    migration: Vec<Float>,
    coalescent: Vec<Float>,
    installed: bool,
}

impl RateBuffer {
    pub(crate) fn new(states: usize) -> Self {
        Self {
            migration: vec![0.0; states * states],
            coalescent: vec![0.0; states],
            installed: false,
        }
    }

    /// Copy validated rates in, masking migration entries if indicators are
    /// given. The indicator length must already be checked.
    pub(crate) fn install(&mut self, rates: Rates<'_>, indicators: Option<&[bool]>) {
        self.migration.copy_from_slice(rates.migration);
        self.coalescent.copy_from_slice(rates.coalescent);
        if let Some(mask) = indicators {
            let masked = apply_indicators(&mut self.migration, mask);
            trace!(masked, "migration rates switched off by indicators");
        }
        self.installed = true;
    }

    pub(crate) fn view(&self) -> Option<Rates<'_>> {
        self.installed.then(|| Rates {
            migration: &self.migration,
            coalescent: &self.coalescent,
        })
    }
}

/// Rate-shift schedule: one migration matrix, coalescent vector and end
/// time per epoch, with epochs ordered by time.
///
/// The schedule owns copies of the caller's arrays. Looking up an epoch
/// index past the end returns the last epoch's rates; this clamp is the
/// defined behaviour for out-of-range indices.
#[derive(Clone, Debug, PartialEq)]
pub struct RateSchedule {
    states: usize,
    migration: Vec<Float>,
    coalescent: Vec<Float>,
    end_times: Vec<Float>,
}

impl RateSchedule {
    /// Partition flat per-epoch arrays into a schedule.
    ///
    /// The epoch count is inferred from `coalescent.len() / states`;
    /// `migration` must then hold `count * states²` entries and `end_times`
    /// exactly `count`.
    pub fn new(
        states: usize,
        migration: &[Float],
        coalescent: &[Float],
        end_times: &[Float],
    ) -> Result<Self, Error> {
        if states < 2 {
            return Err(Error::UnsupportedStates(states));
        }
        if coalescent.is_empty() {
            return Err(Error::EmptySchedule);
        }
        if coalescent.len() % states != 0 {
            return Err(Error::CoalescentLength {
                expected: coalescent.len().div_ceil(states) * states,
                got: coalescent.len(),
            });
        }
        let count = coalescent.len() / states;
        let block = states * states;
        if migration.len() != count * block {
            return Err(Error::MigrationLength {
                expected: count * block,
                got: migration.len(),
            });
        }
        if end_times.len() != count {
            return Err(Error::EndTimesLength {
                expected: count,
                got: end_times.len(),
            });
        }

        for (epoch, rates) in migration.chunks_exact(block).enumerate() {
            check_migration(states, rates, epoch * block)?;
        }
        check_coalescent(coalescent, 0)?;
        for (i, pair) in end_times.windows(2).enumerate() {
            if pair[1] < pair[0] || pair[1].is_nan() {
                return Err(Error::UnorderedEpochs { index: i + 1 });
            }
        }
        if end_times[0].is_nan() {
            return Err(Error::UnorderedEpochs { index: 0 });
        }

        debug!(states, epochs = count, "rate schedule installed");

        Ok(Self {
            states,
            migration: migration.to_vec(),
            coalescent: coalescent.to_vec(),
            end_times: end_times.to_vec(),
        })
    }

    /// Like [`RateSchedule::new`], with one indicator per migration entry
    /// (`count * states²`). Entries whose indicator is `false` become
    /// structural zeros in every epoch.
    pub fn with_indicators(
        states: usize,
        migration: &[Float],
        indicators: &[bool],
        coalescent: &[Float],
        end_times: &[Float],
    ) -> Result<Self, Error> {
        let mut schedule = Self::new(states, migration, coalescent, end_times)?;
        if indicators.len() != schedule.migration.len() {
            return Err(Error::IndicatorLength {
                expected: schedule.migration.len(),
                got: indicators.len(),
            });
        }
        let masked = apply_indicators(&mut schedule.migration, indicators);
        debug!(masked, "schedule migration rates switched off by indicators");
        Ok(schedule)
    }

    pub fn states(&self) -> usize {
        self.states
    }

    pub fn epoch_count(&self) -> usize {
        self.end_times.len()
    }

    /// The epoch actually used for index `i`.
    pub fn clamp(&self, i: usize) -> usize {
        i.min(self.epoch_count() - 1)
    }

    /// Rates for epoch `min(i, epoch_count - 1)`.
    pub fn rates_for_epoch(&self, i: usize) -> Rates<'_> {
        let i = self.clamp(i);
        let block = self.states * self.states;
        Rates {
            migration: &self.migration[i * block..(i + 1) * block],
            coalescent: &self.coalescent[i * self.states..(i + 1) * self.states],
        }
    }

    /// End time of epoch `i`. The last epoch is open-ended, so it (and any
    /// clamped index) reports infinity.
    pub fn end_time(&self, i: usize) -> Float {
        if i + 1 >= self.epoch_count() {
            Float::INFINITY
        } else {
            self.end_times[i]
        }
    }

    /// End times exactly as supplied.
    pub fn end_times(&self) -> &[Float] {
        &self.end_times
    }

    /// Index of the epoch containing time `t`: the first epoch whose end
    /// time is strictly greater than `t`, or the last epoch.
    pub fn epoch_at(&self, t: Float) -> usize {
        let bounded = &self.end_times[..self.epoch_count() - 1];
        bounded.partition_point(|&end| end <= t)
    }
}
