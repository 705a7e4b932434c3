use std::io::Write;

use chrono::{DateTime, Local};

use super::dna_strand::{
    rnap_collection::{rnap::Serial, RnapCounts},
    settings::Settings,
    DnaStrand,
};
use crate::ProtsimError;

pub type ID = usize;
pub type StepCounter = u64;

///The diferent types of data which may be sent back from a trial
#[derive(Debug, PartialEq, Clone)]
pub enum TrialResult {
    IntermediateStep(Snapshot, ID, StepCounter),
    Finished(Recording, ID),
}

/// State of a strand at one sampled step
#[derive(Debug, PartialEq, Clone)]
pub struct Snapshot {
    pub time: f64,
    pub protein: u64,
    pub counts: RnapCounts,
    pub positions: Vec<(Serial, f64)>,
}

/// Selects what a `Recording` keeps at every sample.
///
/// Defaults:
/// positions = off
/// rnap amount = on
/// rnap states (five and three prime ends) = on
/// processing time = on
/// protein amount = on
/// protein production per step = on
/// supercoiling = off
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct RecordConfig {
    pub positions: bool,
    pub rnap_amount: bool,
    pub states: bool,
    pub processing_time: bool,
    pub protein_amount: bool,
    pub protein_production: bool,
    pub supercoiling: bool,
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            positions: false,
            rnap_amount: true,
            states: true,
            processing_time: true,
            protein_amount: true,
            protein_production: true,
            supercoiling: false,
        }
    }
}

/// Time series of one trial, sampled every data collection interval.
#[derive(Debug, PartialEq, Clone)]
pub struct Recording {
    config: RecordConfig,
    interval: u64,
    dt: f64,
    protein_total: u64,

    time: Vec<f64>,
    protein_amount: Vec<u64>,
    rnap_amount: Vec<usize>,
    states: Vec<RnapCounts>,
    positions: Vec<Vec<(Serial, f64)>>,
    supercoiling: Vec<Vec<(Serial, f64)>>,
    protein_production: Vec<u64>,
    processing_time: Vec<f64>,
    last_sample: DateTime<Local>,
}

impl Recording {
    pub fn new(config: RecordConfig, settings: &Settings) -> Self {
        Self {
            config,
            interval: settings.steps(settings.data_collection_interval).max(1),
            dt: settings.dt,
            protein_total: 0,
            time: Vec::new(),
            protein_amount: Vec::new(),
            rnap_amount: Vec::new(),
            states: Vec::new(),
            positions: Vec::new(),
            supercoiling: Vec::new(),
            protein_production: Vec::new(),
            processing_time: Vec::new(),
            last_sample: Local::now(),
        }
    }

    /// Takes in the output of one strand step. Every `interval` steps the strand is sampled
    /// and a snapshot of it is returned.
    pub fn record(&mut self, time_index: StepCounter, proteins: u64, strand: &DnaStrand) -> Option<Snapshot> {
        self.protein_total += proteins;
        if self.config.protein_production {
            self.protein_production.push(proteins);
        }
        if time_index % self.interval != 0 {
            return None;
        }

        let time = time_index as f64 * self.dt;
        let counts = strand.get_counts();
        let positions = strand.get_position_for_recorder();

        self.time.push(time);
        if self.config.protein_amount {
            self.protein_amount.push(self.protein_total);
        }
        if self.config.rnap_amount {
            self.rnap_amount.push(counts.attached);
        }
        if self.config.states {
            self.states.push(counts);
        }
        if self.config.positions {
            self.positions.push(positions.clone());
        }
        if self.config.supercoiling {
            let twists = match strand.get_diagnostics() {
                Some(diagnostics) => diagnostics
                    .serials
                    .iter()
                    .enumerate()
                    .map(|(i, &serial)| (serial, diagnostics.supercoiling.net_twist(i)))
                    .collect(),
                None => Vec::new(),
            };
            self.supercoiling.push(twists);
        }
        if self.config.processing_time {
            let now = Local::now();
            let elapsed = now.signed_duration_since(self.last_sample);
            self.processing_time
                .push(elapsed.num_microseconds().unwrap_or(i64::MAX) as f64 / 1e6);
            self.last_sample = now;
        }

        Some(Snapshot {
            time,
            protein: self.protein_total,
            counts,
            positions,
        })
    }

    /// Sampled times paired with the protein made up to each of them
    pub fn protein_curve(&self) -> Vec<(f64, f64)> {
        self.time
            .iter()
            .zip(&self.protein_amount)
            .map(|(&time, &protein)| (time, protein as f64))
            .collect()
    }

    pub fn get_config(&self) -> &RecordConfig {
        &self.config
    }

    pub fn get_total_protein(&self) -> u64 {
        self.protein_total
    }

    pub fn get_time(&self) -> &[f64] {
        &self.time
    }

    pub fn get_protein_amount(&self) -> &[u64] {
        &self.protein_amount
    }

    pub fn get_rnap_amount(&self) -> &[usize] {
        &self.rnap_amount
    }

    pub fn get_states(&self) -> &[RnapCounts] {
        &self.states
    }

    /// mRNAs with an intact 5' end at each sample
    pub fn get_five_prime(&self) -> Vec<usize> {
        self.states.iter().map(RnapCounts::five_prime).collect()
    }

    /// Complete, undegraded mRNAs at each sample
    pub fn get_three_prime(&self) -> Vec<usize> {
        self.states.iter().map(RnapCounts::three_prime).collect()
    }

    pub fn get_positions(&self) -> &[Vec<(Serial, f64)>] {
        &self.positions
    }

    pub fn get_supercoiling(&self) -> &[Vec<(Serial, f64)>] {
        &self.supercoiling
    }

    pub fn get_protein_production(&self) -> &[u64] {
        &self.protein_production
    }

    /// Wall clock seconds spent between consecutive samples
    pub fn get_processing_time(&self) -> &[f64] {
        &self.processing_time
    }

    pub fn write_protein_csv<W: Write>(&self, writer: W) -> Result<(), ProtsimError> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(["time", "protein"])?;
        for (time, protein) in self.time.iter().zip(&self.protein_amount) {
            csv_writer.write_record([time.to_string(), protein.to_string()])?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// Writes one `time,serial,position` row per attached RNAP per sample.
    pub fn write_positions_csv<W: Write>(&self, writer: W) -> Result<(), ProtsimError> {
        write_long_format(writer, "position", &self.time, &self.positions)
    }

    pub fn write_five_three_csv<W: Write>(&self, writer: W) -> Result<(), ProtsimError> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record([
            "time",
            "five_prime",
            "three_prime",
            "loaded",
            "detached",
            "degrading",
            "degraded",
        ])?;
        for (time, counts) in self.time.iter().zip(&self.states) {
            csv_writer.write_record([
                time.to_string(),
                counts.five_prime().to_string(),
                counts.three_prime().to_string(),
                counts.loaded.to_string(),
                counts.detached.to_string(),
                counts.degrading.to_string(),
                counts.degraded.to_string(),
            ])?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    pub fn write_supercoiling_csv<W: Write>(&self, writer: W) -> Result<(), ProtsimError> {
        write_long_format(writer, "twist", &self.time, &self.supercoiling)
    }
}

fn write_long_format<W: Write>(
    writer: W,
    value_name: &str,
    time: &[f64],
    samples: &[Vec<(Serial, f64)>],
) -> Result<(), ProtsimError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(["time", "serial", value_name])?;
    for (time, sample) in time.iter().zip(samples) {
        for (serial, value) in sample {
            csv_writer.write_record([time.to_string(), serial.to_string(), value.to_string()])?;
        }
    }
    csv_writer.flush()?;
    Ok(())
}

/// Name for a directory holding the output of one run, e.g. `protein_2023_08_03_14_05`
pub fn output_directory_name(prefix: &str) -> String {
    format!("{}_{}", prefix, Local::now().format("%Y_%m_%d_%H_%M"))
}
