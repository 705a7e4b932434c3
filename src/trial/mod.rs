use chrono::Local;
use log::{info, trace};
use std::sync::mpsc::SyncSender;

use crate::ProtsimError;
use dna_strand::DnaStrand;
use results::{RecordConfig, Recording, TrialResult, ID};

pub mod dna_strand;
pub mod results;

/// Object specifiying return granularity for a trial
///  - Minimal returns only the finished recording
///  - Full also returns a snapshot every data collection interval
#[derive(Clone)]
pub enum TrialReturn {
    Minimal(SyncSender<TrialResult>),
    Full(SyncSender<TrialResult>),
}

impl TrialReturn {
    fn sender(&self) -> &SyncSender<TrialResult> {
        match self {
            TrialReturn::Minimal(sender) | TrialReturn::Full(sender) => sender,
        }
    }
}

/// The runtime environment for a single trial. Once the object has been initialized
/// the simulate method may be called on it in order to run its strand to the end of the
/// simulated time.
pub struct Trial {
    strand: DnaStrand,
    recording: Recording,
    record_config: RecordConfig,
    id: ID,
    trial_return: TrialReturn,
}

impl Trial {
    pub fn from(strand: DnaStrand, record_config: RecordConfig, id: ID, trial_return: TrialReturn) -> Self {
        let recording = Recording::new(record_config, strand.get_settings());
        Self {
            strand,
            recording,
            record_config,
            id,
            trial_return,
        }
    }

    /// Steps the strand through every time index of the trial and sends the requested data back.
    ///
    /// Fails only if the receiving end of the trial's channel has been dropped.
    pub fn simulate(&mut self) -> Result<(), ProtsimError> {
        let started = Local::now();
        self.strand.init();
        self.recording = Recording::new(self.record_config, self.strand.get_settings());

        for time_index in 0..self.strand.get_settings().total_steps() {
            let proteins = self.strand.step(time_index);
            if proteins > 0 {
                trace!("trial {} made {} proteins at step {}", self.id, proteins, time_index);
            }

            if let Some(snapshot) = self.recording.record(time_index, proteins, &self.strand) {
                if let TrialReturn::Full(sender) = &self.trial_return {
                    sender
                        .send(TrialResult::IntermediateStep(snapshot, self.id, time_index))
                        .map_err(|_| self.disconnected())?;
                }
            }
        }

        let elapsed = Local::now().signed_duration_since(started);
        let counts = self.strand.get_counts();
        info!(
            "Trial {} finished in {} ms: {} proteins, {} RNAPs loaded, {} interrupted",
            self.id,
            elapsed.num_milliseconds(),
            self.recording.get_total_protein(),
            counts.loaded,
            counts.interrupted
        );

        self.trial_return
            .sender()
            .send(TrialResult::Finished(self.recording.clone(), self.id))
            .map_err(|_| self.disconnected())
    }

    fn disconnected(&self) -> ProtsimError {
        ProtsimError::Disconnected(format!("Reciever thread for trial {} dropped", self.id))
    }

    pub fn get_recording(&self) -> &Recording {
        &self.recording
    }

    pub fn get_strand(&self) -> &DnaStrand {
        &self.strand
    }

    pub fn get_id(&self) -> ID {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::dna_strand::settings::{Settings, StrandConfig};
    use std::sync::mpsc::sync_channel;

    fn strand() -> DnaStrand {
        let settings = Settings {
            total_time: 3.0,
            ..Settings::default()
        };
        DnaStrand::new(settings, StrandConfig::new(1.0), [31; 32]).unwrap()
    }

    #[test]
    fn minimal_trial_sends_only_the_recording() {
        let (sender, receiver) = sync_channel(8);
        let mut trial = Trial::from(strand(), RecordConfig::default(), 4, TrialReturn::Minimal(sender));
        trial.simulate().unwrap();

        match receiver.try_recv().unwrap() {
            TrialResult::Finished(recording, id) => {
                assert_eq!(id, 4);
                assert_eq!(recording.get_time().len(), 30);
                assert_eq!(&recording, trial.get_recording());
            }
            other => panic!("unexpected result {:?}", other),
        }
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn full_trial_streams_snapshots_before_the_recording() {
        let (sender, receiver) = sync_channel(64);
        let mut trial = Trial::from(strand(), RecordConfig::default(), 1, TrialReturn::Full(sender));
        trial.simulate().unwrap();

        let results: Vec<TrialResult> = receiver.try_iter().collect();
        assert_eq!(results.len(), 31);
        for (i, result) in results[..30].iter().enumerate() {
            match result {
                TrialResult::IntermediateStep(snapshot, 1, step) => {
                    assert_eq!(*step, i as u64 * 3);
                    assert_eq!(snapshot.positions.len(), snapshot.counts.attached);
                }
                other => panic!("unexpected result {:?}", other),
            }
        }
        assert!(matches!(results[30], TrialResult::Finished(_, 1)));
    }

    #[test]
    fn repeated_simulation_gives_the_same_recording() {
        let (sender, receiver) = sync_channel(8);
        let mut trial = Trial::from(strand(), RecordConfig::default(), 0, TrialReturn::Minimal(sender));
        trial.simulate().unwrap();
        trial.simulate().unwrap();
        let first = receiver.try_recv().unwrap();
        let second = receiver.try_recv().unwrap();
        match (first, second) {
            (TrialResult::Finished(a, _), TrialResult::Finished(b, _)) => {
                assert_eq!(a.get_protein_amount(), b.get_protein_amount());
                assert_eq!(a.get_states(), b.get_states());
            }
            _ => panic!("expected two finished recordings"),
        }
    }

    #[test]
    fn dropped_receiver_is_reported() {
        let (sender, receiver) = sync_channel(8);
        drop(receiver);
        let mut trial = Trial::from(strand(), RecordConfig::default(), 2, TrialReturn::Full(sender));
        assert!(matches!(trial.simulate(), Err(ProtsimError::Disconnected(_))));
    }
}
