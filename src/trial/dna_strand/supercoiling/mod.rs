use super::settings::Settings;

/// Coefficients of the empirical cubic fit of torque against the number of RNAPs in a cluster.
const N_DEPENDENCE: [f64; 3] = [0.778753, 3.3249, 0.379478];

/// Position of a RNAP at the moment its twist baseline was last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReferenceSlot {
    pub value: f64,
    pub set: bool,
}

impl ReferenceSlot {
    pub fn at(value: f64) -> Self {
        Self { value, set: true }
    }

    /// The baseline used for twist, the load site until a reference has been taken
    pub fn baseline(&self) -> f64 {
        if self.set {
            self.value
        } else {
            0.0
        }
    }
}

/// Torque scaling for a cluster of `cluster_size` RNAPs
pub fn n_factor(cluster_size: usize) -> f64 {
    let x = cluster_size as f64 - 1.0;
    1.0 + N_DEPENDENCE[0] * x + N_DEPENDENCE[1] * x.powi(2) + N_DEPENDENCE[2] * x.powi(3)
}

/// Saturating response of RNAP speed to torque, bounded by `[0, 2 v_0]`.
pub fn velocity(torque: f64, settings: &Settings) -> f64 {
    // clipped before the exponential can overflow
    if torque > 1.5 * settings.tau_c {
        0.0
    } else if torque < -1.5 * settings.tau_c {
        2.0 * settings.v_0
    } else {
        2.0 * settings.v_0 / (1.0 + (2.0 * (torque / settings.tau_c).powi(3)).exp())
    }
}

/// Twist, torque and speed for the attached RNAPs of one step, ordered front to back.
///
/// `twist` has one more entry than there are RNAPs: entry `i` is the twist in front
/// of RNAP `i` and entry `i + 1` the twist behind it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Supercoiling {
    pub twist: Vec<f64>,
    pub torque: Vec<f64>,
    pub velocity: Vec<f64>,
    pub displacement: Vec<f64>,
    pub n_factor: f64,
}

impl Supercoiling {
    /// Evaluates the supercoiling of a cluster from a snapshot of its positions.
    pub fn evaluate(positions: &[f64], references: &[ReferenceSlot], promoter_open: bool, settings: &Settings) -> Self {
        debug_assert_eq!(positions.len(), references.len());
        let size = positions.len();

        let mut twist = vec![0.0; size + 1];
        for i in 1..=size {
            let travelled = positions[i - 1] - references[i - 1].baseline();
            twist[i] = if i < size {
                settings.gamma * (travelled - positions[i])
            } else if promoter_open {
                // supercoils diffuse away through the open promoter
                0.0
            } else {
                settings.gamma * travelled
            };
        }

        let n_factor = n_factor(size);
        let torque: Vec<f64> = (0..size)
            .map(|i| -settings.tau_0 * n_factor * (twist[i] - twist[i + 1]))
            .collect();
        let velocity: Vec<f64> = torque.iter().map(|&t| velocity(t, settings)).collect();
        let displacement = velocity.iter().map(|v| v * settings.dt).collect();

        Self {
            twist,
            torque,
            velocity,
            displacement,
            n_factor,
        }
    }

    /// Twist across RNAP `index`
    pub fn net_twist(&self, index: usize) -> f64 {
        self.twist[index] - self.twist[index + 1]
    }

    /// Indices (ascending) of RNAPs whose twist lies outside `[-1, stall_twist]`, at most `budget` of them.
    pub fn stalled(&self, stall_twist: f64, budget: usize) -> Vec<usize> {
        (0..self.torque.len())
            .filter(|&i| {
                let twist = self.net_twist(i);
                twist < -1.0 || twist > stall_twist
            })
            .take(budget)
            .collect()
    }

    /// Drops RNAP `index` from every per RNAP vector, along with the twist behind it.
    pub fn remove(&mut self, index: usize) {
        self.torque.remove(index);
        self.velocity.remove(index);
        self.displacement.remove(index);
        self.twist.remove(index + 1);
    }
}
