//! Per-context integrator handle.
//!
//! An [`Integrator`] owns everything one model evaluation needs: the
//! monomorphized stepper chosen for its state count, scratch buffers, a
//! copy of the active rates and, optionally, a rate-shift schedule. Nothing
//! is shared between handles, so independent handles can be driven from
//! different threads.

use tracing::debug;

use crate::{
    Float,
    error::Error,
    euler::{Euler, Propagator},
    kernel::{Dynamic, Fixed, Variant},
    observer::StepObserver,
    rates::{RateBuffer, RateSchedule, Rates},
    result::IntegrationStats,
    settings::Settings,
};

/// Adaptive integrator for the lineage-state probability vector.
///
/// # Example
///
/// ```
/// use lineage_ode::{Integrator, Settings};
///
/// let mut integrator = Integrator::setup(1, 2, Settings::new(1e-6, 0.1)).unwrap();
/// integrator.init(&[0.0, 0.1, 0.1, 0.0], &[1.0, 1.0], 1).unwrap();
///
/// let mut p = [1.0, 0.0, 0.0];
/// integrator.calculate_values(1.0, &mut p).unwrap();
/// assert!(p[0] < 1.0 && p[1] > 0.0);
/// ```
pub struct Integrator {
    stepper: Box<dyn Propagator>,
    states: usize,
    max_lineages: usize,
    lineages: usize,
    rates: RateBuffer,
    schedule: Option<RateSchedule>,
}

impl std::fmt::Debug for Integrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Integrator")
            .field("variant", &self.stepper.variant())
            .field("states", &self.states)
            .field("max_lineages", &self.max_lineages)
            .field("lineages", &self.lineages)
            .field("epochs", &self.schedule.as_ref().map(RateSchedule::epoch_count))
            .finish()
    }
}

impl Integrator {
    /// Create an integrator for `states` states and up to `max_lineages`
    /// lineages. State counts 2 through 10 get a const-generic kernel; any
    /// larger count uses the runtime-sized one.
    pub fn setup(max_lineages: usize, states: usize, settings: Settings) -> Result<Self, Error> {
        Self::check_setup(max_lineages, states, &settings)?;
        let stepper: Box<dyn Propagator> = match states {
            2 => Box::new(Euler::new(Fixed::<2>, settings, max_lineages)),
            3 => Box::new(Euler::new(Fixed::<3>, settings, max_lineages)),
            4 => Box::new(Euler::new(Fixed::<4>, settings, max_lineages)),
            5 => Box::new(Euler::new(Fixed::<5>, settings, max_lineages)),
            6 => Box::new(Euler::new(Fixed::<6>, settings, max_lineages)),
            7 => Box::new(Euler::new(Fixed::<7>, settings, max_lineages)),
            8 => Box::new(Euler::new(Fixed::<8>, settings, max_lineages)),
            9 => Box::new(Euler::new(Fixed::<9>, settings, max_lineages)),
            10 => Box::new(Euler::new(Fixed::<10>, settings, max_lineages)),
            _ => Box::new(Euler::new(Dynamic::new(states), settings, max_lineages)),
        };
        Ok(Self::with_stepper(stepper, states, max_lineages))
    }

    /// Like [`Integrator::setup`] but always uses the runtime-sized kernel.
    pub fn setup_dynamic(max_lineages: usize, states: usize, settings: Settings) -> Result<Self, Error> {
        Self::check_setup(max_lineages, states, &settings)?;
        let stepper = Box::new(Euler::new(Dynamic::new(states), settings, max_lineages));
        Ok(Self::with_stepper(stepper, states, max_lineages))
    }

    fn check_setup(max_lineages: usize, states: usize, settings: &Settings) -> Result<(), Error> {
        if states < 2 {
            return Err(Error::UnsupportedStates(states));
        }
        if max_lineages == 0 {
            return Err(Error::ZeroLineageCapacity);
        }
        settings.validate()
    }

    fn with_stepper(stepper: Box<dyn Propagator>, states: usize, max_lineages: usize) -> Self {
        debug!(
            states,
            max_lineages,
            variant = ?stepper.variant(),
            epsilon = stepper.settings().epsilon,
            max_step = stepper.settings().max_step,
            "integrator set up"
        );
        Self {
            stepper,
            states,
            max_lineages,
            lineages: 0,
            rates: RateBuffer::new(states),
            schedule: None,
        }
    }

    pub fn states(&self) -> usize {
        self.states
    }

    pub fn max_lineages(&self) -> usize {
        self.max_lineages
    }

    /// Lineage count installed by the last `init`.
    pub fn lineages(&self) -> usize {
        self.lineages
    }

    pub fn variant(&self) -> Variant {
        self.stepper.variant()
    }

    pub fn settings(&self) -> &Settings {
        self.stepper.settings()
    }

    pub fn schedule(&self) -> Option<&RateSchedule> {
        self.schedule.as_ref()
    }

    /// Length of the probability vector for the installed lineage count.
    pub fn vector_len(&self) -> usize {
        self.states * self.lineages + 1
    }

    /// Install the rates and lineage count for subsequent
    /// [`calculate_values`](Self::calculate_values) calls. The rates are
    /// copied.
    pub fn init(&mut self, migration: &[Float], coalescent: &[Float], lineages: usize) -> Result<(), Error> {
        let rates = Rates::new(self.states, migration, coalescent)?;
        self.check_lineages(lineages)?;
        self.rates.install(rates, None);
        self.lineages = lineages;
        Ok(())
    }

    /// [`init`](Self::init) with one indicator per migration entry;
    /// entries whose indicator is `false` are treated as zero.
    pub fn init_with_indicators(
        &mut self,
        migration: &[Float],
        indicators: &[bool],
        coalescent: &[Float],
        lineages: usize,
    ) -> Result<(), Error> {
        let rates = Rates::new(self.states, migration, coalescent)?;
        if indicators.len() != migration.len() {
            return Err(Error::IndicatorLength {
                expected: migration.len(),
                got: indicators.len(),
            });
        }
        self.check_lineages(lineages)?;
        self.rates.install(rates, Some(indicators));
        self.lineages = lineages;
        Ok(())
    }

    /// Install a rate-shift schedule from flat per-epoch arrays. The epoch
    /// count is inferred from `coalescent.len() / states`.
    pub fn set_up_dynamics(
        &mut self,
        migration: &[Float],
        coalescent: &[Float],
        end_times: &[Float],
    ) -> Result<(), Error> {
        self.schedule = Some(RateSchedule::new(self.states, migration, coalescent, end_times)?);
        Ok(())
    }

    /// [`set_up_dynamics`](Self::set_up_dynamics) with a migration
    /// indicator mask covering every epoch.
    pub fn set_up_dynamics_with_indicators(
        &mut self,
        migration: &[Float],
        indicators: &[bool],
        coalescent: &[Float],
        end_times: &[Float],
    ) -> Result<(), Error> {
        self.schedule = Some(RateSchedule::with_indicators(
            self.states,
            migration,
            indicators,
            coalescent,
            end_times,
        )?);
        Ok(())
    }

    /// Rates of epoch `epoch`, clamped to the last epoch.
    pub fn rates_for_epoch(&self, epoch: usize) -> Result<Rates<'_>, Error> {
        let schedule = self.schedule.as_ref().ok_or(Error::NoSchedule)?;
        Ok(schedule.rates_for_epoch(epoch))
    }

    /// Advance `p` in place by `duration` using the installed rates. On error
    /// `p` is left exactly as it was passed in.
    pub fn calculate_values(&mut self, duration: Float, p: &mut [Float]) -> Result<IntegrationStats, Error> {
        self.advance(duration, p, None)
    }

    /// [`calculate_values`](Self::calculate_values), reporting every
    /// accepted sub-step to `observer`.
    pub fn calculate_values_observed(
        &mut self,
        duration: Float,
        p: &mut [Float],
        observer: &mut dyn StepObserver,
    ) -> Result<IntegrationStats, Error> {
        self.advance(duration, p, Some(observer))
    }

    /// `init` followed by `calculate_values`.
    pub fn init_and_calculate_values(
        &mut self,
        migration: &[Float],
        coalescent: &[Float],
        lineages: usize,
        duration: Float,
        p: &mut [Float],
    ) -> Result<IntegrationStats, Error> {
        self.init(migration, coalescent, lineages)?;
        self.calculate_values(duration, p)
    }

    /// Install the rates of schedule epoch `epoch` (clamped to the last
    /// epoch) and advance `p` by `duration`.
    pub fn init_epoch_and_calculate_values(
        &mut self,
        epoch: usize,
        lineages: usize,
        duration: Float,
        p: &mut [Float],
    ) -> Result<IntegrationStats, Error> {
        self.install_epoch(epoch, lineages)?;
        self.calculate_values(duration, p)
    }

    /// Advance `p` from `start_time` by `duration`, switching rates at every
    /// schedule epoch boundary crossed on the way. Time runs in the same
    /// direction as the schedule's end times. Each epoch span is one
    /// [`calculate_values`](Self::calculate_values) call, so on error `p`
    /// holds the state at the start of the span that failed.
    pub fn calculate_values_through_schedule(
        &mut self,
        start_time: Float,
        lineages: usize,
        duration: Float,
        p: &mut [Float],
    ) -> Result<IntegrationStats, Error> {
        check_duration(duration)?;
        if !start_time.is_finite() {
            return Err(Error::InvalidStartTime(start_time));
        }
        let schedule = self.schedule.as_ref().ok_or(Error::NoSchedule)?;
        let mut epoch = schedule.epoch_at(start_time);
        let end = start_time + duration;
        let mut t = start_time;
        let mut total = IntegrationStats::default();
        loop {
            let boundary = self.schedule.as_ref().map_or(Float::INFINITY, |s| s.end_time(epoch));
            let span = if boundary >= end { end - t } else { boundary - t };
            self.install_epoch(epoch, lineages)?;
            let stats = self.calculate_values(span.max(0.0), p)?;
            total.merge(&stats);
            if boundary >= end {
                break;
            }
            t = boundary;
            epoch += 1;
        }
        Ok(total)
    }

    fn install_epoch(&mut self, epoch: usize, lineages: usize) -> Result<(), Error> {
        self.check_lineages(lineages)?;
        let schedule = self.schedule.as_ref().ok_or(Error::NoSchedule)?;
        self.rates.install(schedule.rates_for_epoch(epoch), None);
        self.lineages = lineages;
        Ok(())
    }

    fn check_lineages(&self, lineages: usize) -> Result<(), Error> {
        if lineages > self.max_lineages {
            return Err(Error::TooManyLineages {
                lineages,
                max_lineages: self.max_lineages,
            });
        }
        Ok(())
    }

    fn advance(
        &mut self,
        duration: Float,
        p: &mut [Float],
        observer: Option<&mut dyn StepObserver>,
    ) -> Result<IntegrationStats, Error> {
        check_duration(duration)?;
        let rates = self.rates.view().ok_or(Error::RatesNotInitialized)?;
        let expected = self.states * self.lineages + 1;
        if p.len() != expected {
            return Err(Error::VectorLength {
                expected,
                got: p.len(),
            });
        }
        if let Some((index, &value)) = p.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(Error::NonFiniteProbability { index, value });
        }

        let stats = self.stepper.propagate(rates, self.lineages, duration, p, observer)?;
        debug!(
            duration,
            lineages = self.lineages,
            naccpt = stats.naccpt,
            nrejct = stats.nrejct,
            nfev = stats.nfev,
            "probabilities advanced"
        );
        Ok(stats)
    }
}

fn check_duration(duration: Float) -> Result<(), Error> {
    if duration.is_finite() && duration >= 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidDuration(duration))
    }
}
