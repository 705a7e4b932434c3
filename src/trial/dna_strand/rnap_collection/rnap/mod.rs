pub mod ribosomes;

use rand::Rng;

use super::super::loading_list::LoadingList;
use super::super::random::{coin, exponential, stepwise_exponential};
use super::super::settings::{DegradationProfile, PauseProfile, Settings, StrandConfig};
use ribosomes::Ribosomes;

/// Load order of a RNAP, unique within a strand
pub type Serial = usize;

/// State changes a RNAP went through during one step, for the collection to act on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Transitions {
    pub detached: bool,
    pub degrading: bool,
    pub degraded: bool,
}

impl Transitions {
    pub fn any(&self) -> bool {
        self.detached || self.degrading || self.degraded
    }
}

/// What a single RNAP step produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RnapStep {
    pub proteins: u64,
    pub transitions: Transitions,
}

/// A RNA polymerase together with the mRNA it transcribes and the ribosomes on it.
///
/// Lifecycle: attached -> detached once it reaches the end of the gene -> degraded once
/// its mRNA lifetime is over and the last ribosome has run off. A RNAP may instead be
/// interrupted (knocked off the chain by supercoiling); both end states are terminal.
#[derive(Debug, Clone)]
pub struct Rnap {
    serial: Serial,
    initial_t: u64,
    position: f64,
    attached: bool,
    detached_time: Option<u64>,
    interrupted: bool,

    passed_site: [bool; 2],
    passing_site: [bool; 2],

    initiated: bool,
    degrading: bool,
    degraded: bool,
    t_degrade: u64,

    loading_list: LoadingList,
    ribosomes: Ribosomes,
}

impl Rnap {
    /// Loads a new RNAP at step `initial_t`, drawing its pause behaviour, mRNA lifetime
    /// and ribosome schedule.
    pub fn new<R: Rng + ?Sized>(
        serial: Serial,
        initial_t: u64,
        config: &StrandConfig,
        settings: &Settings,
        rng: &mut R,
    ) -> Self {
        let bypass = settings.pause_bypass_probability;
        let passed_site = match config.pause_profile {
            PauseProfile::Flat => [true, true],
            PauseProfile::OnePause => [coin(rng, bypass), true],
            PauseProfile::TwoPause => [coin(rng, bypass), coin(rng, bypass)],
        };

        let lifetime = match config.degradation_profile {
            DegradationProfile::Determined => settings.steps(settings.determined_mrna_lifetime),
            DegradationProfile::Exponential => settings.steps(exponential(rng, 1.0 / settings.mean_mrna_lifetime)),
            DegradationProfile::StepwiseExponential => {
                settings.steps(stepwise_exponential(rng, settings.m1, settings.m2, settings.t_crit))
            }
        };

        let mut loading_list = LoadingList::plain(
            rng,
            lifetime as f64,
            settings.k_ribo_loading * settings.dt,
            config.ribo_loading_pattern,
        );
        if config.protein_production_off {
            loading_list.dump();
        }

        Self {
            serial,
            initial_t,
            position: 0.0,
            attached: true,
            detached_time: None,
            interrupted: false,
            passed_site,
            passing_site: [false, false],
            initiated: false,
            degrading: false,
            degraded: false,
            t_degrade: initial_t.saturating_add(lifetime),
            loading_list,
            ribosomes: Ribosomes::new(),
        }
    }

    /// Advances the RNAP by `pace` and steps its ribosomes.
    pub fn step(&mut self, time_index: u64, pace: f64, settings: &Settings) -> RnapStep {
        if self.degraded {
            return RnapStep::default();
        }
        let mut transitions = Transitions::default();

        self.position += pace;

        if self.attached && self.position >= settings.length {
            self.attached = false;
            self.detached_time = Some(time_index);
            transitions.detached = true;
        }

        if !self.degrading && time_index >= self.t_degrade {
            self.degrading = true;
            transitions.degrading = true;
        }

        // a degrading mRNA takes no new ribosomes
        if !self.degrading {
            if !self.initiated && self.position >= settings.initiation_nt {
                self.initiated = true;
            }
            if self.initiated && self.loading_list.can_load(time_index, self.initial_t) {
                self.ribosomes.admit(settings);
            }
        }

        let transcribed = if self.attached { Some(self.position) } else { None };
        let proteins = self.ribosomes.step(transcribed, settings);

        if !self.attached && self.degrading && self.ribosomes.all_detached() {
            self.degraded = true;
            transitions.degraded = true;
        }

        RnapStep { proteins, transitions }
    }

    /// Overrides a proposed displacement at the pause sites, first site first.
    ///
    /// A RNAP about to reach a site is sent no further than one unit before it, then creeps
    /// forward at `1 / steps(pause duration)` per step until it has crossed the site.
    /// The collision clamp may still hold a parked RNAP short of `site - 1`; it then keeps
    /// closing in at its proposed pace and only starts to creep once it gets there.
    pub fn apply_pausing(&mut self, proposed: f64, settings: &Settings) -> f64 {
        for site in 0..2 {
            if self.passed_site[site] {
                continue;
            }
            let boundary = settings.pause_sites[site];
            let creep = 1.0 / settings.steps(settings.pause_durations[site]).max(1) as f64;

            if self.passing_site[site] {
                // held back by a collision before reaching the site
                if self.position < boundary - 1.0 {
                    return (boundary - 1.0 - self.position).min(proposed);
                }
                if self.position + creep < boundary {
                    return creep;
                }
                self.passing_site[site] = false;
                self.passed_site[site] = true;
                return proposed;
            }

            if self.position < boundary - 1.0 && self.position + proposed >= boundary - 1.0 {
                self.passing_site[site] = true;
                return boundary - 1.0 - self.position;
            }
        }
        proposed
    }

    /// Marks the RNAP as knocked off the chain.
    pub fn interrupt(&mut self) {
        assert!(self.attached && !self.interrupted, "RNAP {} interrupted while not on the chain", self.serial);
        self.attached = false;
        self.interrupted = true;
    }

    pub fn get_serial(&self) -> Serial {
        self.serial
    }

    pub fn get_position(&self) -> f64 {
        self.position
    }

    pub fn get_initial_time(&self) -> u64 {
        self.initial_t
    }

    /// Absolute step at which the mRNA starts degrading
    pub fn get_degradation_time(&self) -> u64 {
        self.t_degrade
    }

    pub fn get_detached_time(&self) -> Option<u64> {
        self.detached_time
    }

    pub fn get_ribosomes(&self) -> &Ribosomes {
        &self.ribosomes
    }

    pub fn get_loading_list(&self) -> &LoadingList {
        &self.loading_list
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn is_initiated(&self) -> bool {
        self.initiated
    }

    pub fn is_degrading(&self) -> bool {
        self.degrading
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted
    }

    pub fn is_pausing(&self) -> bool {
        self.passing_site[0] || self.passing_site[1]
    }

    pub fn has_passed_all_sites(&self) -> bool {
        self.passed_site[0] && self.passed_site[1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trial::dna_strand::settings::LoadingPattern;
    use rand::{rngs::StdRng, SeedableRng};

    fn determined(config: StrandConfig) -> StrandConfig {
        config.degradation(DegradationProfile::Determined)
    }

    #[test]
    fn flat_profile_never_pauses() {
        let settings = Settings::default();
        let mut rng = StdRng::seed_from_u64(1);
        let config = StrandConfig::new(0.1);
        let mut rnap = Rnap::new(0, 0, &config, &settings, &mut rng);
        assert!(rnap.has_passed_all_sites());
        assert_eq!(rnap.apply_pausing(1.0, &settings), 1.0);
    }

    #[test]
    fn sites_are_bypassed_at_the_configured_rate() {
        let settings = Settings::default();
        let mut rng = StdRng::seed_from_u64(2);
        let config = StrandConfig::new(0.1).pause(PauseProfile::OnePause);
        let samples = 2_000;
        let bypassed = (0..samples)
            .filter(|&serial| Rnap::new(serial, 0, &config, &settings, &mut rng).has_passed_all_sites())
            .count();
        let fraction = bypassed as f64 / samples as f64;
        assert!((fraction - 0.8).abs() < 0.04, "fraction was {}", fraction);
    }

    #[test]
    fn pause_site_parks_then_creeps_through() {
        let settings = Settings::default();
        let mut rng = StdRng::seed_from_u64(3);
        let config = StrandConfig::new(0.1).pause(PauseProfile::TwoPause);
        let mut rnap = Rnap::new(0, 0, &config, &settings, &mut rng);
        rnap.passed_site = [false, true];

        rnap.position = 1498.5;
        let pace = rnap.apply_pausing(1.0, &settings);
        assert_eq!(pace, 0.5);
        assert!(rnap.is_pausing());
        rnap.step(0, pace, &settings);
        assert_eq!(rnap.get_position(), 1499.0);

        let creep = rnap.apply_pausing(1.0, &settings);
        assert!((creep - 1.0 / 300.0).abs() < 1e-12);

        let mut steps = 0;
        while rnap.is_pausing() {
            let pace = rnap.apply_pausing(1.0, &settings);
            steps += 1;
            rnap.step(steps, pace, &settings);
            assert!(steps < 1_000);
        }
        // ten seconds of pausing at dt = 1/30
        assert!((299..=301).contains(&steps), "paused for {} steps", steps);
        assert!(rnap.has_passed_all_sites());
    }

    #[test]
    fn rnap_held_short_of_a_site_closes_in_before_creeping() {
        let settings = Settings::default();
        let mut rng = StdRng::seed_from_u64(5);
        let config = StrandConfig::new(0.1).pause(PauseProfile::OnePause);
        let mut rnap = Rnap::new(0, 0, &config, &settings, &mut rng);
        rnap.passed_site = [false, true];

        rnap.position = 1498.5;
        assert_eq!(rnap.apply_pausing(1.0, &settings), 0.5);
        // a leader in the way let it move only part of the way
        rnap.step(0, 0.1, &settings);
        assert!(rnap.is_pausing());

        assert_eq!(rnap.apply_pausing(0.2, &settings), 0.2);
        rnap.step(1, 0.2, &settings);
        let remaining = 1499.0 - rnap.get_position();
        assert!((rnap.apply_pausing(1.0, &settings) - remaining).abs() < 1e-12);
        rnap.step(2, remaining, &settings);

        let creep = rnap.apply_pausing(1.0, &settings);
        assert!((creep - 1.0 / 300.0).abs() < 1e-12);
        assert!(rnap.is_pausing());
    }

    #[test]
    fn rnap_detaches_then_degrades_without_ribosomes() {
        let settings = Settings {
            length: 100.0,
            determined_mrna_lifetime: 10.0,
            ..Settings::default()
        };
        let mut rng = StdRng::seed_from_u64(4);
        let config = determined(StrandConfig::new(0.1)).protein_production_off();
        let mut rnap = Rnap::new(0, 0, &config, &settings, &mut rng);
        assert_eq!(rnap.get_degradation_time(), 300);

        let mut detached_at = None;
        let mut degraded_at = None;
        for t in 0..400 {
            let step = rnap.step(t, 1.0, &settings);
            assert_eq!(step.proteins, 0);
            if step.transitions.detached {
                assert!(detached_at.is_none());
                detached_at = Some(t);
            }
            if step.transitions.degraded {
                assert!(degraded_at.is_none());
                degraded_at = Some(t);
            }
        }
        assert_eq!(detached_at, Some(99));
        assert_eq!(rnap.get_detached_time(), Some(99));
        assert_eq!(degraded_at, Some(300));
        assert!(rnap.is_degraded());
        assert_eq!(rnap.get_ribosomes().get_loaded(), 0);
    }

    #[test]
    fn degraded_rnap_is_inert() {
        let settings = Settings {
            length: 10.0,
            determined_mrna_lifetime: 0.0,
            ..Settings::default()
        };
        let mut rng = StdRng::seed_from_u64(5);
        let config = determined(StrandConfig::new(0.1));
        let mut rnap = Rnap::new(0, 0, &config, &settings, &mut rng);
        let step = rnap.step(0, 20.0, &settings);
        assert!(step.transitions.detached && step.transitions.degrading && step.transitions.degraded);

        let position = rnap.get_position();
        for t in 1..10 {
            assert_eq!(rnap.step(t, 5.0, &settings), RnapStep::default());
        }
        assert_eq!(rnap.get_position(), position);
        assert!(rnap.is_degraded());
    }

    #[test]
    fn translation_waits_for_initiation() {
        let settings = Settings::default();
        let mut rng = StdRng::seed_from_u64(6);
        let config = determined(StrandConfig::new(0.1)).ribo_loading(LoadingPattern::Uniform);
        let mut rnap = Rnap::new(0, 0, &config, &settings, &mut rng);
        for t in 0..32 {
            rnap.step(t, 1.0, &settings);
            assert_eq!(rnap.get_ribosomes().get_loaded(), 0);
        }
        assert!(!rnap.is_initiated());
        rnap.step(32, 1.0, &settings);
        assert!(rnap.is_initiated());
        assert_eq!(rnap.get_ribosomes().get_loaded(), 1);
    }

    #[test]
    fn ribosomes_stay_behind_the_rnap_and_proteins_match_detachments() {
        let settings = Settings::default();
        let mut rng = StdRng::seed_from_u64(7);
        let config = determined(StrandConfig::new(0.1));
        let mut rnap = Rnap::new(0, 0, &config, &settings, &mut rng);
        let mut proteins = 0;
        for t in 0..20_000 {
            proteins += rnap.step(t, settings.rnap_displacement(), &settings).proteins;
            if rnap.is_attached() {
                assert!(rnap.get_ribosomes().get_positions().all(|&p| p <= rnap.get_position()));
            }
        }
        assert!(rnap.is_degraded());
        assert!(proteins > 0);
        assert_eq!(proteins as usize, rnap.get_ribosomes().get_detached());
        assert_eq!(proteins as usize, rnap.get_ribosomes().get_loaded());
    }
}
