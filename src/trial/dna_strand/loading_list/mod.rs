use rand::Rng;

use super::random::exponential;
use super::settings::LoadingPattern;
use crate::ProtsimError;

/// Whether a schedule is gated by a two state (on/off) promoter.
///
/// Dwell times are expressed in steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Burst {
    Plain,
    Bursty { tau_off: f64, tau_loading: f64 },
}

/// One stretch of the promoter process generated for a bursty schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PromoterSegment {
    pub open: bool,
    pub start: f64,
    pub duration: f64,
}

/// An ascending, duplicate free list of step indices at which an event (a RNAP or
/// ribosome loading) may happen, read through a monotone cursor.
#[derive(Debug, Clone)]
pub struct LoadingList {
    schedule: Vec<u64>,
    original: Vec<u64>,
    location: usize,
    start_location: usize,
    promoter_segments: Vec<PromoterSegment>,
}

impl LoadingList {
    /// Builds a schedule spanning `duration` steps for events arriving at `rate` per step.
    ///
    /// A rate of exactly zero gives a single slot which is already consumed, so the list
    /// never fires.
    pub fn build<R: Rng + ?Sized>(
        rng: &mut R,
        duration: f64,
        rate: f64,
        pattern: LoadingPattern,
        burst: Burst,
    ) -> Result<Self, ProtsimError> {
        if !rate.is_finite() || rate < 0.0 {
            return Err(ProtsimError::Config(format!("loading rate must be finite and non-negative, got {}", rate)));
        }

        if rate == 0.0 {
            return Ok(Self::never());
        }

        match burst {
            Burst::Plain => Ok(Self::plain(rng, duration, rate, pattern)),
            Burst::Bursty { tau_off, tau_loading } => {
                let (times, segments) = bursty_times(rng, duration, rate, pattern, tau_off, tau_loading)?;
                Ok(Self::from_times(times, segments))
            }
        }
    }

    /// Builds a schedule without promoter gating. A rate which is not strictly positive
    /// and finite never fires.
    pub fn plain<R: Rng + ?Sized>(rng: &mut R, duration: f64, rate: f64, pattern: LoadingPattern) -> Self {
        if !(rate.is_finite() && rate > 0.0) {
            return Self::never();
        }
        Self::from_times(plain_times(rng, duration, rate, pattern), Vec::new())
    }

    /// The degenerate schedule: a single slot at zero which is already consumed.
    fn never() -> Self {
        Self {
            schedule: vec![0],
            original: vec![0],
            location: 1,
            start_location: 1,
            promoter_segments: Vec::new(),
        }
    }

    fn from_times(times: Vec<f64>, promoter_segments: Vec<PromoterSegment>) -> Self {
        let mut schedule: Vec<u64> = times.into_iter().map(|t| t.floor() as u64).collect();
        // the times are cumulative, so flooring leaves repeats next to each other
        schedule.dedup();

        Self {
            original: schedule.clone(),
            schedule,
            location: 0,
            start_location: 0,
            promoter_segments,
        }
    }

    /// Builds a list from an explicit set of step indices.
    pub fn from_indices(mut indices: Vec<u64>) -> Self {
        indices.sort_unstable();
        indices.dedup();
        Self {
            original: indices.clone(),
            schedule: indices,
            location: 0,
            start_location: 0,
            promoter_segments: Vec::new(),
        }
    }

    /// Consumes the next slot and returns true if `time_index` has reached it.
    pub fn can_load(&mut self, time_index: u64, base_time: u64) -> bool {
        if !self.is_empty() && time_index >= self.schedule[self.location] + base_time {
            self.location += 1;
            return true;
        }
        false
    }

    /// True once the cursor has passed every slot.
    pub fn is_empty(&self) -> bool {
        self.location >= self.schedule.len()
    }

    /// Drops every remaining slot so the list never fires again.
    pub fn dump(&mut self) {
        self.schedule.clear();
        self.location = 0;
    }

    /// Removes every slot past `t_stop`.
    pub fn trim(&mut self, t_stop: u64) {
        self.schedule.retain(|&index| index <= t_stop);
        self.original.retain(|&index| index <= t_stop);
    }

    /// Restores the schedule as built (and trimmed) and moves the cursor back to the start.
    pub fn rewind(&mut self) {
        self.schedule = self.original.clone();
        self.location = self.start_location;
    }

    pub fn get_schedule(&self) -> &[u64] {
        &self.schedule
    }

    pub fn get_location(&self) -> usize {
        self.location
    }

    pub fn get_length(&self) -> usize {
        self.schedule.len()
    }

    /// Promoter on/off segments, only populated for bursty schedules.
    pub fn get_promoter_segments(&self) -> &[PromoterSegment] {
        &self.promoter_segments
    }

    /// Mean gap between consecutive slots, zero if there are fewer than two.
    pub fn get_average_loading_interval(&self) -> f64 {
        if self.schedule.len() < 2 {
            return 0.0;
        }
        let span = self.schedule[self.schedule.len() - 1] - self.schedule[0];
        span as f64 / (self.schedule.len() - 1) as f64
    }
}

/// Cumulative event times starting at zero, stopping before `duration` is exceeded.
fn plain_times<R: Rng + ?Sized>(rng: &mut R, duration: f64, rate: f64, pattern: LoadingPattern) -> Vec<f64> {
    let mut t = 0.0;
    let mut slots = vec![0.0];
    while t <= duration {
        let add_time = match pattern {
            LoadingPattern::Uniform => 1.0 / rate,
            LoadingPattern::Stochastic => exponential(rng, rate),
        };
        if add_time < duration - t {
            t += add_time;
            slots.push(t);
        } else {
            break;
        }
    }
    slots
}

/// Alternating open/closed promoter segments covering `duration`, starting open.
fn promoter_segments<R: Rng + ?Sized>(rng: &mut R, duration: f64, tau_on: f64, tau_off: f64) -> Vec<PromoterSegment> {
    let mut t = 0.0;
    let mut open = true;
    let mut segments = Vec::new();
    while t <= duration {
        let mean = if open { tau_on } else { tau_off };
        let add_time = exponential(rng, 1.0 / mean);
        if add_time < duration - t {
            segments.push(PromoterSegment { open, start: t, duration: add_time });
            t += add_time;
            open = !open;
        } else {
            segments.push(PromoterSegment { open, start: t, duration: duration - t });
            break;
        }
    }
    segments
}

fn bursty_times<R: Rng + ?Sized>(
    rng: &mut R,
    duration: f64,
    rate: f64,
    pattern: LoadingPattern,
    tau_off: f64,
    tau_loading: f64,
) -> Result<(Vec<f64>, Vec<PromoterSegment>), ProtsimError> {
    let duty = rate * tau_loading;
    if duty >= 1.0 {
        return Err(ProtsimError::Config(format!(
            "bursty promoter needs rate * tau_loading < 1, got {}",
            duty
        )));
    }
    let tau_on = duty * tau_off / (1.0 - duty);
    let segments = promoter_segments(rng, duration, tau_on, tau_off);

    let mut times = Vec::new();
    for segment in segments.iter().filter(|segment| segment.open) {
        for offset in plain_times(rng, segment.duration, 1.0 / tau_loading, pattern) {
            times.push(segment.start + offset);
        }
    }

    Ok((times, segments))
}
