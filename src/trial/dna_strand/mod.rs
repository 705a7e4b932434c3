pub mod loading_list;
pub mod random;
pub mod rnap_collection;
pub mod settings;
pub mod supercoiling;

use log::{debug, warn};
use rand::{rngs::StdRng, SeedableRng};

use crate::ProtsimError;
use loading_list::{Burst, LoadingList};
use rnap_collection::{rnap::Serial, RnapCollection, RnapCounts};
use settings::{PauseProfile, Settings, StrandConfig};
use supercoiling::Supercoiling;

/// Supercoiling state of the latest step together with the serial numbers it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostics {
    pub serials: Vec<Serial>,
    pub supercoiling: Supercoiling,
}

/// One gene: a promoter loading RNAPs onto a strand of DNA.
///
/// Everything random about a strand is drawn from its own seeded `StdRng`, so two strands
/// built from the same settings, config and seed step identically.
///
/// # Usage
/// ```
/// use protsim_engine::trial::dna_strand::{DnaStrand, settings::{Settings, StrandConfig}};
///
/// let settings = Settings::default();
/// let mut strand = DnaStrand::new(settings, StrandConfig::new(0.1), [7; 32]).unwrap();
/// strand.init();
/// let proteins: u64 = (0..300).map(|t| strand.step(t)).sum();
/// assert_eq!(proteins, 0);
/// ```
#[derive(Debug, Clone)]
pub struct DnaStrand {
    settings: Settings,
    config: StrandConfig,
    seed: [u8; 32],
    rng: StdRng,
    rng_after_build: StdRng,

    rnaps: RnapCollection,
    loading_list: LoadingList,

    promoter_open: bool,
    just_loaded: bool,
    t_open: u64,
    t_stop: u64,
    shutoff_applied: bool,

    fall_off_count: usize,
    protein_total: u64,
    diagnostics: Option<Diagnostics>,
}

impl DnaStrand {
    /// Builds a strand and draws its RNAP loading schedule.
    ///
    /// Fails if the settings or the config are invalid, or if a bursty promoter cannot
    /// reach the requested loading rate.
    pub fn new(settings: Settings, config: StrandConfig, seed: [u8; 32]) -> Result<Self, ProtsimError> {
        settings.validate()?;
        config.validate()?;

        let mut rng = StdRng::from_seed(seed);
        let burst = if config.bursty_promoter {
            Burst::Bursty {
                tau_off: settings.tau_off / settings.dt,
                tau_loading: settings.tau_loading / settings.dt,
            }
        } else {
            Burst::Plain
        };
        let mut loading_list = LoadingList::build(
            &mut rng,
            settings.total_steps() as f64,
            config.rnap_loading_rate * settings.dt,
            config.rnap_loading_pattern,
            burst,
        )?;

        let t_stop = match config.promoter_shutoff_time {
            Some(seconds) => settings.steps(seconds),
            None => settings.total_steps(),
        };
        loading_list.trim(t_stop);

        debug!(
            "strand built with {} loading slots, average interval {:.2} steps",
            loading_list.get_length(),
            loading_list.get_average_loading_interval()
        );

        Ok(Self {
            settings,
            config,
            seed,
            rng_after_build: rng.clone(),
            rng,
            rnaps: RnapCollection::new(),
            loading_list,
            promoter_open: false,
            just_loaded: false,
            t_open: 0,
            t_stop,
            shutoff_applied: false,
            fall_off_count: 0,
            protein_total: 0,
            diagnostics: None,
        })
    }

    /// Puts the strand back into its freshly built state. Calling it more than once has
    /// no further effect.
    pub fn init(&mut self) {
        self.rng = self.rng_after_build.clone();
        self.loading_list.rewind();
        self.rnaps = RnapCollection::new();
        self.promoter_open = false;
        self.just_loaded = false;
        self.t_open = 0;
        self.shutoff_applied = false;
        self.fall_off_count = 0;
        self.protein_total = 0;
        self.diagnostics = None;
    }

    /// Advances the strand by one step and returns the proteins made during it.
    ///
    /// `time_index` must not decrease between calls.
    pub fn step(&mut self, time_index: u64) -> u64 {
        self.load(time_index);
        self.update_promoter(time_index);

        let mut displacements = if self.config.include_supercoiling {
            self.supercoiled_displacements()
        } else {
            vec![self.settings.rnap_displacement(); self.rnaps.get_attached().len()]
        };

        if self.config.pause_profile != PauseProfile::Flat {
            for (rnap, displacement) in self.rnaps.attached_mut().zip(displacements.iter_mut()) {
                if !rnap.has_passed_all_sites() {
                    *displacement = rnap.apply_pausing(*displacement, &self.settings);
                }
            }
        }

        self.resolve_collisions(&mut displacements);

        let proteins = self.rnaps.dispatch(time_index, &displacements, &self.settings);
        self.protein_total += proteins;
        proteins
    }

    fn load(&mut self, time_index: u64) {
        if time_index >= self.t_stop || !self.loading_list.can_load(time_index, 0) {
            return;
        }
        // a due slot is used up even when the site is blocked
        if !self.rnaps.site_is_clear(&self.settings) {
            return;
        }

        if self.config.include_supercoiling {
            self.rnaps.snapshot_rearmost();
        }
        self.rnaps.load(time_index, &self.config, &self.settings, &mut self.rng);

        if self.config.include_supercoiling {
            if !self.promoter_open {
                debug!("promoter opened at step {}", time_index);
            }
            self.promoter_open = true;
            self.just_loaded = true;
            self.t_open = time_index + self.settings.steps(self.settings.t_on);
        }
    }

    fn update_promoter(&mut self, time_index: u64) {
        if self.just_loaded && time_index >= self.t_open {
            self.just_loaded = false;
            if self.promoter_open {
                self.close_promoter(time_index);
            }
        }

        if !self.shutoff_applied && time_index >= self.t_stop {
            self.shutoff_applied = true;
            self.just_loaded = false;
            if self.promoter_open {
                debug!("promoter shut off at step {}", time_index);
                self.close_promoter(time_index);
            }
        }
    }

    /// Closes an open promoter and pins the rearmost RNAP's twist reference where it stands.
    fn close_promoter(&mut self, time_index: u64) {
        debug!("promoter closed at step {}", time_index);
        self.promoter_open = false;
        self.rnaps.snapshot_rearmost();
    }

    /// Proposed displacements from the torque on every attached RNAP, after removing any
    /// RNAP that falls off this step.
    fn supercoiled_displacements(&mut self) -> Vec<f64> {
        if self.rnaps.get_attached().is_empty() {
            self.diagnostics = None;
            return Vec::new();
        }

        let mut serials = self.rnaps.get_attached_serials();
        let mut supercoiling = Supercoiling::evaluate(
            &self.rnaps.get_attached_positions(),
            &self.rnaps.get_references(),
            self.promoter_open,
            &self.settings,
        );

        if let Some(fall_off) = self.config.fall_off {
            let budget = fall_off.max_removals.saturating_sub(self.fall_off_count);
            let stalled = supercoiling.stalled(fall_off.stall_twist, budget);
            // back to front so the remaining indices stay valid
            for &index in stalled.iter().rev() {
                let serial = serials.remove(index);
                warn!(
                    "RNAP {} fell off with net twist {:.3}",
                    serial,
                    supercoiling.net_twist(index)
                );
                self.rnaps.interrupted(serial);
                supercoiling.remove(index);
                self.fall_off_count += 1;
            }
        }

        let displacements = supercoiling.displacement.clone();
        if self.config.store_supercoiling {
            self.diagnostics = Some(Diagnostics { serials, supercoiling });
        }
        displacements
    }

    /// Clamps displacements front to back so no RNAP ends up within a footprint of the one ahead.
    fn resolve_collisions(&self, displacements: &mut [f64]) {
        let positions = self.rnaps.get_attached_positions();
        let mut leader: Option<f64> = None;
        for (position, displacement) in positions.iter().zip(displacements.iter_mut()) {
            if let Some(leader_position) = leader {
                let limit = leader_position - self.settings.rnap_size;
                if position + *displacement > limit {
                    *displacement = (limit - position).max(0.0);
                }
            }
            leader = Some(position + *displacement);
        }
    }

    pub fn get_rnaps(&self) -> &RnapCollection {
        &self.rnaps
    }

    pub fn get_counts(&self) -> RnapCounts {
        self.rnaps.get_counts()
    }

    /// Serial numbers and positions of the attached RNAPs, front to back
    pub fn get_position_for_recorder(&self) -> Vec<(Serial, f64)> {
        self.rnaps.get_position_for_recorder()
    }

    /// The supercoiling of the latest step, kept only when the config asks for it.
    pub fn get_diagnostics(&self) -> Option<&Diagnostics> {
        self.diagnostics.as_ref()
    }

    pub fn get_loading_list(&self) -> &LoadingList {
        &self.loading_list
    }

    pub fn is_promoter_open(&self) -> bool {
        self.promoter_open
    }

    pub fn get_protein_total(&self) -> u64 {
        self.protein_total
    }

    pub fn get_fall_off_count(&self) -> usize {
        self.fall_off_count
    }

    pub fn get_settings(&self) -> &Settings {
        &self.settings
    }

    pub fn get_config(&self) -> &StrandConfig {
        &self.config
    }

    pub fn get_seed(&self) -> [u8; 32] {
        self.seed
    }
}
