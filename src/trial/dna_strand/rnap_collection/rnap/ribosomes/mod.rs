use std::collections::VecDeque;

use super::super::super::settings::Settings;

/// The ribosomes translating a single transcript.
///
/// Positions are kept in load order, so the front of the queue is the oldest and
/// front-most ribosome. A ribosome leaves the queue once it runs off the end of the
/// transcript, which counts as one protein.
#[derive(Debug, Clone, Default)]
pub struct Ribosomes {
    positions: VecDeque<f64>,
    loaded: usize,
    detached: usize,
}

impl Ribosomes {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if the newest ribosome has cleared one footprint past the load site
    pub fn is_clear_at_start(&self, settings: &Settings) -> bool {
        match self.positions.back() {
            Some(position) => position - settings.ribo_size >= 0.0,
            None => true,
        }
    }

    /// Puts a ribosome on the start of the transcript if there is room for it.
    pub fn admit(&mut self, settings: &Settings) -> bool {
        if !self.is_clear_at_start(settings) {
            return false;
        }
        self.positions.push_back(0.0);
        self.loaded += 1;
        true
    }

    /// Moves every ribosome forward one step and returns the number of proteins completed.
    ///
    /// `transcribed` is the length of RNA made so far while the RNAP is still attached;
    /// the front ribosome cannot pass it. Every other ribosome stays one footprint
    /// behind the new position of the ribosome ahead of it.
    pub fn step(&mut self, transcribed: Option<f64>, settings: &Settings) -> u64 {
        let base_advance = settings.k_elong * settings.dt;

        let mut leader: Option<f64> = None;
        for position in self.positions.iter_mut() {
            let limit = match leader {
                Some(leader_position) => Some(leader_position - settings.ribo_size),
                None => transcribed,
            };
            let mut advance = base_advance;
            if let Some(limit) = limit {
                if *position + advance > limit {
                    advance = limit - *position;
                }
            }
            *position += advance.max(0.0);
            leader = Some(*position);
        }

        let mut proteins = 0;
        while let Some(&front) = self.positions.front() {
            if front <= settings.length {
                break;
            }
            self.positions.pop_front();
            self.detached += 1;
            proteins += 1;
        }
        proteins
    }

    pub fn all_detached(&self) -> bool {
        self.loaded == self.detached
    }

    pub fn get_loaded(&self) -> usize {
        self.loaded
    }

    pub fn get_attached(&self) -> usize {
        self.positions.len()
    }

    pub fn get_detached(&self) -> usize {
        self.detached
    }

    /// Positions of attached ribosomes, front-most first
    pub fn get_positions(&self) -> impl Iterator<Item = &f64> {
        self.positions.iter()
    }
}
