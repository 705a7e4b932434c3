use rand::Rng;
use rand_distr::{Distribution, Exp};

/// Draws a waiting time from an exponential distribution with the given rate (1/mean).
///
/// A rate which is not strictly positive describes an event that never happens
/// and yields `f64::INFINITY`.
pub fn exponential<R: Rng + ?Sized>(rng: &mut R, rate: f64) -> f64 {
    if !(rate > 0.0) {
        return f64::INFINITY;
    }
    match Exp::new(rate) {
        Ok(distribution) => distribution.sample(rng),
        Err(_) => f64::INFINITY,
    }
}

/// Draws from two exponential pdfs stitched together at `t_crit`.
///
/// The front branch (mean `m1`, values `<= t_crit`) is picked with probability
/// `1 - exp(-t_crit / m1)`, otherwise the back branch (mean `m2`, values `>= t_crit`).
/// Each branch is rejection sampled from its own exponential.
pub fn stepwise_exponential<R: Rng + ?Sized>(rng: &mut R, m1: f64, m2: f64, t_crit: f64) -> f64 {
    let front_portion = 1.0 - (-t_crit / m1).exp();

    if coin(rng, front_portion) {
        loop {
            let result = exponential(rng, 1.0 / m1);
            if result <= t_crit {
                return result;
            }
        }
    } else {
        loop {
            let result = exponential(rng, 1.0 / m2);
            if result >= t_crit {
                return result;
            }
        }
    }
}

/// Returns true with the given probability. Probabilities outside [0, 1] are clamped.
pub fn coin<R: Rng + ?Sized>(rng: &mut R, probability: f64) -> bool {
    if probability.is_nan() {
        return false;
    }
    rng.gen_bool(probability.clamp(0.0, 1.0))
}
