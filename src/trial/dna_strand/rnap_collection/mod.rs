pub mod rnap;

use std::collections::{BTreeMap, VecDeque};

use log::debug;
use rand::Rng;

use super::settings::{Settings, StrandConfig};
use super::supercoiling::ReferenceSlot;
use rnap::{Rnap, Serial, Transitions};

/// Snapshot of how many RNAPs are in each state.
///
/// `loaded`, `detached`, `degrading`, `degraded` and `interrupted` only ever grow;
/// `attached` is the number currently on the chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RnapCounts {
    pub loaded: usize,
    pub attached: usize,
    pub detached: usize,
    pub degrading: usize,
    pub degraded: usize,
    pub interrupted: usize,
}

impl RnapCounts {
    /// mRNAs whose 5' end still exists
    pub fn five_prime(&self) -> usize {
        self.loaded - self.degrading
    }

    /// Complete mRNAs that are not yet degraded
    pub fn three_prime(&self) -> usize {
        self.detached - self.degraded
    }
}

/// Owner of every RNAP loaded on a strand.
///
/// RNAPs are split into the attached chain (front-most first, which is also load order
/// since RNAPs cannot overtake), detached RNAPs whose mRNA is still around, and the
/// inert ones that have degraded or been interrupted. Each attached RNAP has a
/// reference slot used by the supercoiling model.
#[derive(Debug, Clone, Default)]
pub struct RnapCollection {
    attached: VecDeque<Rnap>,
    references: VecDeque<ReferenceSlot>,
    detached: BTreeMap<Serial, Rnap>,
    inert: Vec<Rnap>,
    next_serial: Serial,

    detached_count: usize,
    degrading_count: usize,
    degraded_count: usize,
    interrupted_count: usize,
}

impl RnapCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a new RNAP to the rear of the chain and returns its serial number.
    /// Whether loading is allowed is up to the caller.
    pub fn load<R: Rng + ?Sized>(
        &mut self,
        time_index: u64,
        config: &StrandConfig,
        settings: &Settings,
        rng: &mut R,
    ) -> Serial {
        let serial = self.next_serial;
        self.next_serial += 1;
        self.attached.push_back(Rnap::new(serial, time_index, config, settings, rng));
        self.references.push_back(ReferenceSlot::default());
        debug!("RNAP {} loaded at step {}", serial, time_index);
        serial
    }

    /// True if the rearmost attached RNAP has moved a footprint away from the load site
    pub fn site_is_clear(&self, settings: &Settings) -> bool {
        match self.attached.back() {
            Some(rnap) => rnap.get_position() - settings.rnap_size >= 0.0,
            None => true,
        }
    }

    fn attached_index(&self, serial: Serial) -> Option<usize> {
        self.attached.binary_search_by_key(&serial, |rnap| rnap.get_serial()).ok()
    }

    /// Moves a RNAP that ran off the end of the gene from the chain to the detached set.
    pub fn attached_to_detached(&mut self, serial: Serial) {
        let index = self
            .attached_index(serial)
            .unwrap_or_else(|| panic!("RNAP {} detached while not attached", serial));
        let rnap = self.attached.remove(index).unwrap_or_else(|| unreachable!());
        self.references.remove(index);
        assert!(!rnap.is_attached(), "RNAP {} left the chain while still attached", serial);

        debug!("RNAP {} detached at step {:?}", serial, rnap.get_detached_time());
        self.detached.insert(serial, rnap);
        self.detached_count += 1;
    }

    /// Records that the mRNA of a RNAP started degrading.
    pub fn degrading(&mut self, serial: Serial) {
        let rnap = self
            .get(serial)
            .unwrap_or_else(|| panic!("RNAP {} started degrading while not tracked", serial));
        assert!(rnap.is_degrading());
        self.degrading_count += 1;
    }

    /// Moves a fully degraded RNAP from the detached set to the inert set.
    pub fn degraded(&mut self, serial: Serial) {
        let rnap = self
            .detached
            .remove(&serial)
            .unwrap_or_else(|| panic!("RNAP {} degraded while not detached", serial));
        assert!(rnap.is_degraded(), "RNAP {} moved to inert before degrading", serial);

        debug!("RNAP {} degraded", serial);
        self.inert.push(rnap);
        self.degraded_count += 1;
    }

    /// Takes a RNAP off the chain without detaching it normally.
    ///
    /// A reference the RNAP still held is handed to the RNAP in front of it.
    pub fn interrupted(&mut self, serial: Serial) {
        let index = self
            .attached_index(serial)
            .unwrap_or_else(|| panic!("RNAP {} interrupted while not attached", serial));

        let slot = self.references.remove(index).unwrap_or_default();
        if index > 0 && slot.set {
            self.references[index - 1] = slot;
        }

        let mut rnap = self.attached.remove(index).unwrap_or_else(|| unreachable!());
        rnap.interrupt();
        self.inert.push(rnap);
        self.interrupted_count += 1;
    }

    fn apply(&mut self, serial: Serial, transitions: Transitions) {
        if transitions.detached {
            self.attached_to_detached(serial);
        }
        if transitions.degrading {
            self.degrading(serial);
        }
        if transitions.degraded {
            self.degraded(serial);
        }
    }

    /// Steps every attached RNAP by its displacement and every detached one in place,
    /// then moves RNAPs between sets. Returns the proteins made this step.
    pub fn dispatch(&mut self, time_index: u64, displacements: &[f64], settings: &Settings) -> u64 {
        assert_eq!(displacements.len(), self.attached.len());
        let mut proteins = 0;
        let mut changed: Vec<(Serial, Transitions)> = Vec::new();

        for rnap in self.detached.values_mut() {
            let step = rnap.step(time_index, 0.0, settings);
            proteins += step.proteins;
            if step.transitions.any() {
                changed.push((rnap.get_serial(), step.transitions));
            }
        }

        for (rnap, &pace) in self.attached.iter_mut().zip(displacements) {
            let step = rnap.step(time_index, pace, settings);
            proteins += step.proteins;
            if step.transitions.any() {
                changed.push((rnap.get_serial(), step.transitions));
            }
        }

        for (serial, transitions) in changed {
            self.apply(serial, transitions);
        }
        proteins
    }

    /// Looks a RNAP up among the attached and detached ones
    pub fn get(&self, serial: Serial) -> Option<&Rnap> {
        match self.attached_index(serial) {
            Some(index) => self.attached.get(index),
            None => self.detached.get(&serial),
        }
    }

    pub fn get_mut(&mut self, serial: Serial) -> Option<&mut Rnap> {
        match self.attached_index(serial) {
            Some(index) => self.attached.get_mut(index),
            None => self.detached.get_mut(&serial),
        }
    }

    /// Attached RNAPs front to back
    pub fn get_attached(&self) -> &VecDeque<Rnap> {
        &self.attached
    }

    pub fn attached_mut(&mut self) -> impl Iterator<Item = &mut Rnap> {
        self.attached.iter_mut()
    }

    pub fn get_detached(&self) -> impl Iterator<Item = &Rnap> {
        self.detached.values()
    }

    pub fn get_inert(&self) -> &[Rnap] {
        &self.inert
    }

    pub fn get_attached_positions(&self) -> Vec<f64> {
        self.attached.iter().map(|rnap| rnap.get_position()).collect()
    }

    pub fn get_attached_serials(&self) -> Vec<Serial> {
        self.attached.iter().map(|rnap| rnap.get_serial()).collect()
    }

    pub fn get_references(&self) -> Vec<ReferenceSlot> {
        self.references.iter().copied().collect()
    }

    /// Serial numbers and positions of attached RNAPs, front to back
    pub fn get_position_for_recorder(&self) -> Vec<(Serial, f64)> {
        self.attached.iter().map(|rnap| (rnap.get_serial(), rnap.get_position())).collect()
    }

    /// Resets the twist baseline of the rearmost attached RNAP to where it is now.
    pub fn snapshot_rearmost(&mut self) {
        if let (Some(rnap), Some(slot)) = (self.attached.back(), self.references.back_mut()) {
            *slot = ReferenceSlot::at(rnap.get_position());
        }
    }

    pub fn get_counts(&self) -> RnapCounts {
        RnapCounts {
            loaded: self.next_serial,
            attached: self.attached.len(),
            detached: self.detached_count,
            degrading: self.degrading_count,
            degraded: self.degraded_count,
            interrupted: self.interrupted_count,
        }
    }

    pub fn has_loaded(&self) -> bool {
        self.next_serial > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trial::dna_strand::settings::DegradationProfile;
    use rand::{rngs::StdRng, SeedableRng};

    fn setup() -> (Settings, StrandConfig, StdRng) {
        let settings = Settings {
            length: 200.0,
            determined_mrna_lifetime: 1.0,
            ..Settings::default()
        };
        let config = StrandConfig::new(0.1)
            .degradation(DegradationProfile::Determined)
            .protein_production_off();
        (settings, config, StdRng::seed_from_u64(8))
    }

    #[test]
    fn serials_increase_and_site_clears_after_a_footprint() {
        let (settings, config, mut rng) = setup();
        let mut rnaps = RnapCollection::new();
        assert!(rnaps.site_is_clear(&settings));
        assert_eq!(rnaps.load(0, &config, &settings, &mut rng), 0);
        assert!(!rnaps.site_is_clear(&settings));

        rnaps.dispatch(1, &[35.0], &settings);
        assert!(rnaps.site_is_clear(&settings));
        assert_eq!(rnaps.load(2, &config, &settings, &mut rng), 1);
        assert_eq!(rnaps.get_attached_serials(), vec![0, 1]);
        assert_eq!(rnaps.get_counts().loaded, 2);
    }

    #[test]
    fn rnaps_flow_through_detached_to_inert() {
        let (settings, config, mut rng) = setup();
        let mut rnaps = RnapCollection::new();
        rnaps.load(0, &config, &settings, &mut rng);
        rnaps.dispatch(0, &[100.0], &settings);
        rnaps.load(1, &config, &settings, &mut rng);

        rnaps.dispatch(1, &[100.0, 10.0], &settings);
        let counts = rnaps.get_counts();
        assert_eq!(counts.attached, 1);
        assert_eq!(counts.detached, 1);
        assert_eq!(rnaps.get_references().len(), 1);
        assert!(rnaps.get(0).is_some());
        assert!(!rnaps.get(0).unwrap().is_attached());
        assert_eq!(rnaps.get(1).unwrap().get_position(), 10.0);

        // lifetime is 30 steps
        for t in 2..40 {
            rnaps.dispatch(t, &[0.0], &settings);
        }
        let counts = rnaps.get_counts();
        assert_eq!(counts.degraded, 1);
        assert_eq!(counts.degrading, 2);
        assert_eq!(counts.three_prime(), 0);
        assert_eq!(counts.five_prime(), 0);
        assert!(rnaps.get(0).is_none());
        assert_eq!(rnaps.get_inert().len(), 1);
    }

    #[test]
    fn interruption_hands_reference_to_the_rnap_in_front() {
        let (settings, config, mut rng) = setup();
        let mut rnaps = RnapCollection::new();
        rnaps.load(0, &config, &settings, &mut rng);
        rnaps.dispatch(0, &[80.0], &settings);
        rnaps.snapshot_rearmost();
        rnaps.load(1, &config, &settings, &mut rng);
        rnaps.dispatch(1, &[0.0, 40.0], &settings);
        rnaps.snapshot_rearmost();
        rnaps.load(2, &config, &settings, &mut rng);

        assert_eq!(rnaps.get_references()[0], ReferenceSlot::at(80.0));
        assert_eq!(rnaps.get_references()[1], ReferenceSlot::at(40.0));

        rnaps.interrupted(1);
        assert_eq!(rnaps.get_attached_serials(), vec![0, 2]);
        assert_eq!(rnaps.get_references(), vec![ReferenceSlot::at(40.0), ReferenceSlot::default()]);
        assert_eq!(rnaps.get_counts().interrupted, 1);
        assert_eq!(rnaps.get_counts().attached, 2);
        assert!(rnaps.get(1).is_none());
        assert!(rnaps.get_inert()[0].is_interrupted());
    }

    #[test]
    #[should_panic]
    fn marking_an_attached_rnap_degraded_panics() {
        let (settings, config, mut rng) = setup();
        let mut rnaps = RnapCollection::new();
        rnaps.load(0, &config, &settings, &mut rng);
        rnaps.degraded(0);
    }
}
