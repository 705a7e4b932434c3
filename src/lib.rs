//! # Description
//! This is the simulation engine of protsim. It takes the physical constants of a gene
//! together with the modes of its promoter and uses them to simulate transcription by
//! RNA polymerases, translation of the nascent mRNAs by ribosomes and their degradation.
//! Independent seeded trials run in parallel and their protein output is averaged over time.
//!
//! # Arguments
//! - <settings>
//!     Physical constants, see `Settings`. May be read from a `name,value` CSV file
//! - <strand_config>
//!     Mode selectors of the strand, see `StrandConfig`
//! - <num_trials>
//!     Specifies the number of trials to be used in making a predicted average
//!     - defaults to 10
//! - <max_runtime>
//!     Specifies the maximum time the engine may wait for trials in seconds
//!     Is of type Option which may be None
//!     - if None the engine waits for every trial
//! - <seed>
//!     Base seed every trial seed is derived from
//!     - random if not given

pub mod trial;

use std::sync::mpsc::{sync_channel, Receiver, RecvTimeoutError, SyncSender};
use std::time::Duration;

use chrono::Local;
use log::{info, warn};
use rand::Rng;
use thiserror::Error;
use threadpool::ThreadPool;

use trial::dna_strand::{
    settings::{Settings, StrandConfig},
    DnaStrand,
};
use trial::results::{RecordConfig, Recording, Snapshot, TrialResult};
use trial::{Trial, TrialReturn};

/// Protsim Error Types
#[derive(Error, Debug)]
pub enum ProtsimError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("channel disconnected: {0}")]
    Disconnected(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}

pub type TrialID = usize;
pub type StepCounter = u64;

/// Protsim Response types
#[derive(Debug, Clone)]
pub enum ProtsimResponse {
    IntermediateStep(Snapshot, TrialID, StepCounter),
    TrialFinished(Recording, TrialID),
    /// Protein amount averaged over trials at every sampled time
    SimulationResult(Vec<(f64, f64)>),
}

#[derive(Clone)]
pub enum ProtsimReturn {
    Full(SyncSender<ProtsimResponse>),
    Minimal(SyncSender<ProtsimResponse>),
}

impl ProtsimReturn {
    fn sender(&self) -> &SyncSender<ProtsimResponse> {
        match self {
            ProtsimReturn::Full(sender) | ProtsimReturn::Minimal(sender) => sender,
        }
    }
}

/// This is a builder object containing defaults and methods for constructing a ProtsimEngine Object.
///
/// # Usage
/// ```
/// use protsim_engine::{Builder, ProtsimResponse};
/// use protsim_engine::trial::dna_strand::settings::{Settings, StrandConfig};
///
/// let settings = Settings { total_time: 5.0, ..Settings::default() };
/// let (engine, _responses) = Builder::new(settings, StrandConfig::new(0.5))
///     .trials(2)
///     .seed([1; 32])
///     .build()
///     .unwrap();
/// match engine.run().unwrap() {
///     ProtsimResponse::SimulationResult(average) => assert_eq!(average.len(), 50),
///     _ => unreachable!(),
/// }
/// ```
pub struct Builder {
    // set externally
    num_trials: usize,
    max_runtime: Option<u64>,
    seed: Option<[u8; 32]>,
    record_config: RecordConfig,
    settings: Settings,
    strand_config: StrandConfig,

    // constructed internally
    runtime_return: ProtsimReturn,
    runtime_reciever: Receiver<ProtsimResponse>,
}

impl Builder {
    /// Builds a new ProtsimEngine instance for the given gene with default values
    ///
    /// trials = 10
    /// runtime = unlimited
    /// seed = random
    /// recording = RecordConfig::default()
    /// return verbosity = minimal
    pub fn new(settings: Settings, strand_config: StrandConfig) -> Self {
        let (runtime_sender, runtime_reciever) = sync_channel(128);

        Self {
            num_trials: 10,
            max_runtime: None,
            seed: None,
            record_config: RecordConfig::default(),
            settings,
            strand_config,
            runtime_return: ProtsimReturn::Minimal(runtime_sender),
            runtime_reciever,
        }
    }

    /// Sets the number of trials to be executed to a manual value
    pub fn trials(mut self, count: usize) -> Self {
        self.num_trials = count;
        self
    }

    /// Sets the maximum runtime to a manual value
    pub fn runtime(mut self, time: u64) -> Self {
        self.max_runtime = Some(time);
        self
    }

    /// Fixes the base seed so a run can be reproduced
    pub fn seed(mut self, seed: [u8; 32]) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn record(mut self, record_config: RecordConfig) -> Self {
        self.record_config = record_config;
        self
    }

    /// Toggles ReturnVerbosity behavior between minimal and full
    pub fn verbose(mut self) -> Self {
        self.runtime_return = match self.runtime_return {
            ProtsimReturn::Minimal(sender) => ProtsimReturn::Full(sender),
            ProtsimReturn::Full(sender) => ProtsimReturn::Minimal(sender),
        };

        self
    }

    /// Consumes builder object and outputs a Protsim engine object
    ///
    /// Fails if the settings or strand config are invalid.
    pub fn build(self) -> Result<(ProtsimEngine, Receiver<ProtsimResponse>), ProtsimError> {
        let seed = self.seed.unwrap_or_else(|| rand::thread_rng().gen());
        // builds one strand up front so bad modes fail here rather than in a worker
        DnaStrand::new(self.settings.clone(), self.strand_config.clone(), seed)?;

        let computation_threads = threadpool::Builder::new()
            .thread_name("ProtsimComputeThread".to_string())
            .build();
        let (computation_threads_sender, computation_threads_reciever) = sync_channel(32);

        let runtime = ProtsimEngine {
            num_trials: self.num_trials,
            max_runtime: self.max_runtime,
            seed,
            record_config: self.record_config,
            settings: self.settings,
            strand_config: self.strand_config,
            computation_threads,
            computation_threads_sender,
            computation_threads_reciever,
            runtime_return: self.runtime_return,
        };

        Ok((runtime, self.runtime_reciever))
    }
}

/// Main backend runtime object for Protsim
pub struct ProtsimEngine {
    // set externally
    num_trials: usize,
    max_runtime: Option<u64>,
    seed: [u8; 32],
    record_config: RecordConfig,
    settings: Settings,
    strand_config: StrandConfig,

    // constructed internally
    computation_threads: ThreadPool,
    computation_threads_sender: SyncSender<TrialResult>,
    computation_threads_reciever: Receiver<TrialResult>,
    runtime_return: ProtsimReturn,
}

impl ProtsimEngine {
    /// Simulates every trial and returns the protein amount averaged over the trials received.
    pub fn run(&self) -> Result<ProtsimResponse, ProtsimError> {
        info!(
            "running {} trials of {} steps on {} threads",
            self.num_trials,
            self.settings.total_steps(),
            self.computation_threads.max_count()
        );

        // protein curves of every finished trial
        let mut simulation_results = Vec::new();

        // setup trial return object
        let trial_return = match self.runtime_return {
            ProtsimReturn::Minimal(_) => TrialReturn::Minimal(self.computation_threads_sender.clone()),
            ProtsimReturn::Full(_) => TrialReturn::Full(self.computation_threads_sender.clone()),
        };
        for id in 0..self.num_trials {
            let strand = DnaStrand::new(
                self.settings.clone(),
                self.strand_config.clone(),
                trial_seed(self.seed, id),
            )?;
            let mut current_trial = Trial::from(strand, self.record_config, id, trial_return.clone());
            self.computation_threads.execute(move || {
                if let Err(error) = current_trial.simulate() {
                    warn!("trial {} stopped early: {}", id, error);
                }
            });
        }

        // poll for trial results
        let deadline = self
            .max_runtime
            .map(|seconds| Local::now() + chrono::Duration::seconds(seconds as i64));
        let mut trials_recieved = 0;
        while trials_recieved < self.num_trials {
            match self.computation_threads_reciever.recv_timeout(Duration::from_millis(10)) {
                Ok(TrialResult::Finished(recording, id)) => {
                    trials_recieved += 1;
                    info!("Trial {} finished, recieved {} of {} trials", id, trials_recieved, self.num_trials);
                    simulation_results.push(recording.protein_curve());
                    self.respond(ProtsimResponse::TrialFinished(recording, id))?;
                }
                Ok(TrialResult::IntermediateStep(snapshot, id, step)) => {
                    if let ProtsimReturn::Full(_) = self.runtime_return {
                        self.respond(ProtsimResponse::IntermediateStep(snapshot, id, step))?;
                    }
                }
                Err(RecvTimeoutError::Timeout) => (),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(ProtsimError::Disconnected("trial results channel closed".to_string()));
                }
            }

            if self.computation_threads.panic_count() > 0 {
                return Err(ProtsimError::Unknown(format!(
                    "{} trials panicked",
                    self.computation_threads.panic_count()
                )));
            }

            if deadline.map_or(false, |deadline| Local::now() >= deadline) {
                warn!(
                    "forced termination because max time was reached with {} of {} trials, returned results may not be accurate",
                    trials_recieved, self.num_trials
                );
                break;
            }
        }

        // attempt to return the final average
        let average = average_trials(&simulation_results);
        info!(
            "averaged {} trials, final protein amount {:.2}",
            simulation_results.len(),
            average.last().map_or(0.0, |&(_, protein)| protein)
        );
        let result = ProtsimResponse::SimulationResult(average);
        self.respond(result.clone())?;
        Ok(result)
    }

    fn respond(&self, response: ProtsimResponse) -> Result<(), ProtsimError> {
        self.runtime_return.sender().send(response).map_err(|_| {
            ProtsimError::Disconnected(
                "frontend cannot be found by ProtsimEngine, ensure the receiver is not dropped prematurely"
                    .to_string(),
            )
        })
    }

    pub fn get_seed(&self) -> [u8; 32] {
        self.seed
    }

    pub fn get_settings(&self) -> &Settings {
        &self.settings
    }

    pub fn get_strand_config(&self) -> &StrandConfig {
        &self.strand_config
    }
}

/// Seed of trial `id`, the base seed with the id mixed into its first eight bytes
fn trial_seed(base: [u8; 32], id: TrialID) -> [u8; 32] {
    let mut seed = base;
    for (byte, id_byte) in seed.iter_mut().zip((id as u64).to_le_bytes()) {
        *byte ^= id_byte;
    }
    seed
}

/// Averages protein curves point by point, up to the length of the shortest curve.
fn average_trials(curves: &[Vec<(f64, f64)>]) -> Vec<(f64, f64)> {
    let num_trials = curves.len() as f64;
    let length = curves.iter().map(Vec::len).min().unwrap_or(0);

    (0..length)
        .map(|i| {
            let summed: f64 = curves.iter().map(|curve| curve[i].1).sum();
            (curves[0][i].0, summed / num_trials)
        })
        .collect()
}
