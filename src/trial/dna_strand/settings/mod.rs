use std::io::Read;
use std::str::FromStr;

use crate::ProtsimError;

/// Physical constants of a simulation. Built once and never changed afterwards,
/// every component receives a reference to the same value.
///
/// Lengths are in base pairs (or nucleotides), times in seconds, rates per second.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub total_time: f64,
    pub dt: f64,
    pub data_collection_interval: f64,

    pub length: f64,
    pub rnap_size: f64,
    pub ribo_size: f64,

    /// ribosome elongation speed
    pub k_elong: f64,
    /// unperturbed RNAP speed
    pub v_0: f64,
    pub tau_0: f64,
    pub tau_c: f64,
    pub gamma: f64,

    pub pause_sites: [f64; 2],
    pub pause_durations: [f64; 2],
    /// chance that a RNAP skips a pause site
    pub pause_bypass_probability: f64,

    pub initiation_nt: f64,
    pub k_ribo_loading: f64,

    pub mean_mrna_lifetime: f64,
    pub determined_mrna_lifetime: f64,
    pub m1: f64,
    pub m2: f64,
    pub t_crit: f64,

    /// how long the promoter stays open after a RNAP loads
    pub t_on: f64,
    pub tau_off: f64,
    pub tau_loading: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            total_time: 300.0,
            dt: 1.0 / 30.0,
            data_collection_interval: 0.1,
            length: 3072.0,
            rnap_size: 35.0,
            ribo_size: 30.0,
            k_elong: 30.5,
            v_0: 30.5,
            tau_0: 0.386,
            tau_c: 11.0,
            gamma: 0.01,
            pause_sites: [1500.0, 2500.0],
            pause_durations: [10.0, 15.0],
            pause_bypass_probability: 0.8,
            initiation_nt: 33.0,
            k_ribo_loading: 0.2,
            mean_mrna_lifetime: 90.0,
            determined_mrna_lifetime: 60.0,
            m1: 90.0,
            m2: 45.0,
            t_crit: 102.0,
            t_on: 7.8,
            tau_off: 143.0,
            tau_loading: 2.2,
        }
    }
}

impl Settings {
    /// Converts a duration in seconds to a whole number of steps.
    pub fn steps(&self, seconds: f64) -> u64 {
        // tolerance keeps e.g. 7.8 s at dt = 1/30 from flooring to 233
        let steps = (seconds / self.dt + 1e-9).floor();
        if steps.is_finite() && steps > 0.0 {
            steps as u64
        } else {
            0
        }
    }

    /// Total number of steps in a trial
    pub fn total_steps(&self) -> u64 {
        self.steps(self.total_time)
    }

    /// Distance an unhindered RNAP covers in one step
    pub fn rnap_displacement(&self) -> f64 {
        self.v_0 * self.dt
    }

    pub fn validate(&self) -> Result<(), ProtsimError> {
        let positive = [
            ("total_time", self.total_time),
            ("dt", self.dt),
            ("data_collection_interval", self.data_collection_interval),
            ("length", self.length),
            ("rnap_size", self.rnap_size),
            ("ribo_size", self.ribo_size),
            ("k_elong", self.k_elong),
            ("v_0", self.v_0),
            ("tau_c", self.tau_c),
            ("pause_duration_1", self.pause_durations[0]),
            ("pause_duration_2", self.pause_durations[1]),
            ("mean_mrna_lifetime", self.mean_mrna_lifetime),
            ("m1", self.m1),
            ("m2", self.m2),
            ("tau_off", self.tau_off),
            ("tau_loading", self.tau_loading),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ProtsimError::Config(format!("{} must be positive, got {}", name, value)));
            }
        }
        let non_negative = [
            ("initiation_nt", self.initiation_nt),
            ("k_ribo_loading", self.k_ribo_loading),
            ("determined_mrna_lifetime", self.determined_mrna_lifetime),
            ("t_crit", self.t_crit),
            ("t_on", self.t_on),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ProtsimError::Config(format!("{} must not be negative, got {}", name, value)));
            }
        }
        let finite = [
            ("tau_0", self.tau_0),
            ("gamma", self.gamma),
            ("pause_site_1", self.pause_sites[0]),
            ("pause_site_2", self.pause_sites[1]),
        ];
        for (name, value) in finite {
            if !value.is_finite() {
                return Err(ProtsimError::Config(format!("{} must be a finite number, got {}", name, value)));
            }
        }
        if !(0.0..=1.0).contains(&self.pause_bypass_probability) {
            return Err(ProtsimError::Config(format!(
                "pause_bypass_probability must lie in [0, 1], got {}",
                self.pause_bypass_probability
            )));
        }
        if self.data_collection_interval < self.dt {
            return Err(ProtsimError::Config("data_collection_interval is shorter than dt".to_string()));
        }
        Ok(())
    }

    /// Reads `name,value` rows over the defaults. The first row is a header.
    pub fn from_csv<R: Read>(reader: R) -> Result<Self, ProtsimError> {
        let mut settings = Self::default();
        let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

        for record in csv_reader.records() {
            let record = record?;
            let name = record.get(0).unwrap_or_default();
            let raw = record.get(1).unwrap_or_default();
            let value = raw
                .parse::<f64>()
                .map_err(|_| ProtsimError::Config(format!("value '{}' for {} is not a number", raw, name)))?;
            settings.set(name, value)?;
        }

        settings.validate()?;
        Ok(settings)
    }

    fn set(&mut self, name: &str, value: f64) -> Result<(), ProtsimError> {
        let slot = match name {
            "total_time" => &mut self.total_time,
            "dt" => &mut self.dt,
            "data_collection_interval" => &mut self.data_collection_interval,
            "length" => &mut self.length,
            "rnap_size" => &mut self.rnap_size,
            "ribo_size" => &mut self.ribo_size,
            "k_elong" => &mut self.k_elong,
            "v_0" => &mut self.v_0,
            "tau_0" => &mut self.tau_0,
            "tau_c" => &mut self.tau_c,
            "gamma" => &mut self.gamma,
            "pause_site_1" => &mut self.pause_sites[0],
            "pause_site_2" => &mut self.pause_sites[1],
            "pause_duration_1" => &mut self.pause_durations[0],
            "pause_duration_2" => &mut self.pause_durations[1],
            "pause_bypass_probability" => &mut self.pause_bypass_probability,
            "initiation_nt" => &mut self.initiation_nt,
            "k_ribo_loading" => &mut self.k_ribo_loading,
            "mean_mrna_lifetime" => &mut self.mean_mrna_lifetime,
            "determined_mrna_lifetime" => &mut self.determined_mrna_lifetime,
            "m1" => &mut self.m1,
            "m2" => &mut self.m2,
            "t_crit" => &mut self.t_crit,
            "t_on" => &mut self.t_on,
            "tau_off" => &mut self.tau_off,
            "tau_loading" => &mut self.tau_loading,
            unknown => return Err(ProtsimError::Config(format!("unknown setting '{}'", unknown))),
        };
        *slot = value;
        Ok(())
    }
}

/// How many pause sites a RNAP may stall at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseProfile {
    Flat,
    OnePause,
    TwoPause,
}

impl PauseProfile {
    pub fn site_count(&self) -> usize {
        match self {
            PauseProfile::Flat => 0,
            PauseProfile::OnePause => 1,
            PauseProfile::TwoPause => 2,
        }
    }
}

impl FromStr for PauseProfile {
    type Err = ProtsimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "flat" => Ok(PauseProfile::Flat),
            "OnepauseAbs" | "one pause" => Ok(PauseProfile::OnePause),
            "TwopauseAbs" | "two pause" => Ok(PauseProfile::TwoPause),
            other => Err(ProtsimError::Config(format!("unknown pause profile '{}'", other))),
        }
    }
}

/// Spacing of scheduled loading events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadingPattern {
    Uniform,
    Stochastic,
}

impl FromStr for LoadingPattern {
    type Err = ProtsimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uniform" => Ok(LoadingPattern::Uniform),
            "stochastic" => Ok(LoadingPattern::Stochastic),
            other => Err(ProtsimError::Config(format!("unknown loading pattern '{}'", other))),
        }
    }
}

/// Distribution of mRNA lifetimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegradationProfile {
    Determined,
    Exponential,
    StepwiseExponential,
}

impl FromStr for DegradationProfile {
    type Err = ProtsimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "determined" => Ok(DegradationProfile::Determined),
            "exponential" => Ok(DegradationProfile::Exponential),
            "stepwise exponential" => Ok(DegradationProfile::StepwiseExponential),
            other => Err(ProtsimError::Config(format!("unknown degradation profile '{}'", other))),
        }
    }
}

/// Removal of RNAPs whose twist leaves `[-1, stall_twist]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FallOff {
    pub stall_twist: f64,
    pub max_removals: usize,
}

impl Default for FallOff {
    fn default() -> Self {
        Self {
            stall_twist: 1.0,
            max_removals: 1,
        }
    }
}

/// Mode selectors for one DNA strand.
#[derive(Debug, Clone, PartialEq)]
pub struct StrandConfig {
    /// RNAP loading rate per second
    pub rnap_loading_rate: f64,
    pub include_supercoiling: bool,
    pub bursty_promoter: bool,
    pub rnap_loading_pattern: LoadingPattern,
    /// seconds, `None` shuts the promoter at the end of the trial
    pub promoter_shutoff_time: Option<f64>,
    pub pause_profile: PauseProfile,
    pub ribo_loading_pattern: LoadingPattern,
    pub degradation_profile: DegradationProfile,
    pub protein_production_off: bool,
    pub store_supercoiling: bool,
    pub fall_off: Option<FallOff>,
}

impl StrandConfig {
    /// Builds a config with the default modes
    ///
    /// supercoiling = on
    /// bursty promoter = off
    /// loading = stochastic (RNAP and ribosome)
    /// pause profile = flat
    /// degradation = exponential
    pub fn new(rnap_loading_rate: f64) -> Self {
        Self {
            rnap_loading_rate,
            include_supercoiling: true,
            bursty_promoter: false,
            rnap_loading_pattern: LoadingPattern::Stochastic,
            promoter_shutoff_time: None,
            pause_profile: PauseProfile::Flat,
            ribo_loading_pattern: LoadingPattern::Stochastic,
            degradation_profile: DegradationProfile::Exponential,
            protein_production_off: false,
            store_supercoiling: false,
            fall_off: None,
        }
    }

    pub fn supercoiling(mut self, include: bool) -> Self {
        self.include_supercoiling = include;
        self
    }

    pub fn bursty(mut self, bursty: bool) -> Self {
        self.bursty_promoter = bursty;
        self
    }

    pub fn rnap_loading(mut self, pattern: LoadingPattern) -> Self {
        self.rnap_loading_pattern = pattern;
        self
    }

    pub fn shutoff(mut self, seconds: f64) -> Self {
        self.promoter_shutoff_time = Some(seconds);
        self
    }

    pub fn pause(mut self, profile: PauseProfile) -> Self {
        self.pause_profile = profile;
        self
    }

    pub fn ribo_loading(mut self, pattern: LoadingPattern) -> Self {
        self.ribo_loading_pattern = pattern;
        self
    }

    pub fn degradation(mut self, profile: DegradationProfile) -> Self {
        self.degradation_profile = profile;
        self
    }

    /// Dumps every ribosome schedule so no protein is ever made
    pub fn protein_production_off(mut self) -> Self {
        self.protein_production_off = true;
        self
    }

    /// Keeps the twist, torque and velocity vectors of the latest step
    pub fn store_supercoiling(mut self) -> Self {
        self.store_supercoiling = true;
        self
    }

    pub fn fall_off(mut self, fall_off: FallOff) -> Self {
        self.fall_off = Some(fall_off);
        self
    }

    /// Builds a config from the reference mode tags, failing on any unknown tag.
    pub fn from_tags(
        rnap_loading_rate: f64,
        rnap_loading_pattern: &str,
        pause_profile: &str,
        ribo_loading_pattern: &str,
        degradation_profile: &str,
    ) -> Result<Self, ProtsimError> {
        Ok(Self::new(rnap_loading_rate)
            .rnap_loading(rnap_loading_pattern.parse()?)
            .pause(pause_profile.parse()?)
            .ribo_loading(ribo_loading_pattern.parse()?)
            .degradation(degradation_profile.parse()?))
    }

    pub fn validate(&self) -> Result<(), ProtsimError> {
        if !(self.rnap_loading_rate.is_finite() && self.rnap_loading_rate >= 0.0) {
            return Err(ProtsimError::Config(format!(
                "rnap loading rate must be finite and non-negative, got {}",
                self.rnap_loading_rate
            )));
        }
        if let Some(time) = self.promoter_shutoff_time {
            if !(time.is_finite() && time >= 0.0) {
                return Err(ProtsimError::Config(format!("promoter shutoff time must be non-negative, got {}", time)));
            }
        }
        if let Some(fall_off) = self.fall_off {
            if !(fall_off.stall_twist > -1.0) {
                return Err(ProtsimError::Config(format!("stall twist must exceed -1, got {}", fall_off.stall_twist)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_scale_seconds_by_dt() {
        let settings = Settings::default();
        assert_eq!(settings.total_steps(), 9000);
        assert_eq!(settings.steps(7.8), 234);
        assert_eq!(settings.steps(-1.0), 0);
        assert!((settings.rnap_displacement() - 30.5 / 30.0).abs() < 1e-12);
    }

    #[test]
    fn csv_rows_override_defaults() {
        let data = "name,value\nlength, 1000\ntotal_time,60\npause_site_2,800\n";
        let settings = Settings::from_csv(data.as_bytes()).unwrap();
        assert_eq!(settings.length, 1000.0);
        assert_eq!(settings.total_time, 60.0);
        assert_eq!(settings.pause_sites, [1500.0, 800.0]);
        assert_eq!(settings.rnap_size, 35.0);
    }

    #[test]
    fn csv_with_unknown_name_fails() {
        let data = "name,value\nlenght,1000\n";
        assert!(matches!(Settings::from_csv(data.as_bytes()), Err(ProtsimError::Config(_))));
    }

    #[test]
    fn csv_with_bad_value_fails() {
        let data = "name,value\nlength,long\n";
        assert!(matches!(Settings::from_csv(data.as_bytes()), Err(ProtsimError::Config(_))));
    }

    #[test]
    fn csv_with_nan_fails() {
        let data = "name,value\nt_crit,NaN\n";
        assert!(matches!(Settings::from_csv(data.as_bytes()), Err(ProtsimError::Config(_))));
        let data = "name,value\npause_site_1,inf\n";
        assert!(matches!(Settings::from_csv(data.as_bytes()), Err(ProtsimError::Config(_))));
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let settings = Settings { dt: 0.0, ..Settings::default() };
        assert!(settings.validate().is_err());
        assert!(Settings::default().validate().is_ok());

        let settings = Settings { t_on: -1.0, ..Settings::default() };
        assert!(matches!(settings.validate(), Err(ProtsimError::Config(_))));
        let settings = Settings { gamma: f64::NAN, ..Settings::default() };
        assert!(settings.validate().is_err());
        let settings = Settings { t_crit: 0.0, k_ribo_loading: 0.0, ..Settings::default() };
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn mode_tags_parse() {
        assert_eq!("flat".parse::<PauseProfile>().unwrap(), PauseProfile::Flat);
        assert_eq!("TwopauseAbs".parse::<PauseProfile>().unwrap().site_count(), 2);
        assert_eq!("uniform".parse::<LoadingPattern>().unwrap(), LoadingPattern::Uniform);
        assert_eq!(
            "stepwise exponential".parse::<DegradationProfile>().unwrap(),
            DegradationProfile::StepwiseExponential
        );
    }

    #[test]
    fn unknown_mode_tag_fails_fast() {
        let result = StrandConfig::from_tags(0.1, "stochastic", "ThreepauseAbs", "uniform", "exponential");
        assert!(matches!(result, Err(ProtsimError::Config(_))));
        assert!(StrandConfig::from_tags(0.1, "stochastic", "OnepauseAbs", "uniform", "determined").is_ok());
    }
}
