//! Global maximisation of likelihood functions within parameter limits.

use crate::error::{LikelihoodError, LikelihoodResult};
use crate::hypothesis::Limit;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

const NM_XTOL: f64 = 1e-8;
const NM_FTOL: f64 = 1e-10;
const NM_ITERATIONS_PER_PARAMETER: usize = 400;

/// Best point found by a maximizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Optimum {
    pub x: Vec<f64>,
    pub value: f64,
}

/// Global optimisation strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Maximizer {
    /// Random hops between local Nelder-Mead optima with Metropolis
    /// acceptance.
    BasinHopping {
        #[serde(default = "default_niter")]
        niter: usize,
        /// Minimum hop size. Derived from the parameter limits if unset.
        #[serde(default)]
        step: Option<f64>,
        /// Acceptance temperature. The number of parameters if unset.
        #[serde(default)]
        temperature: Option<f64>,
    },
    /// Differential evolution (best/1/bin). Needs finite limits for every
    /// parameter.
    DifferentialEvolution {
        #[serde(default = "default_max_generations")]
        max_generations: usize,
        #[serde(default = "default_population_factor")]
        population_factor: usize,
        #[serde(default = "default_mutation")]
        mutation: (f64, f64),
        #[serde(default = "default_crossover")]
        crossover: f64,
        #[serde(default = "default_tolerance")]
        tolerance: f64,
    },
}

fn default_niter() -> usize {
    100
}

fn default_max_generations() -> usize {
    1000
}

fn default_population_factor() -> usize {
    15
}

fn default_mutation() -> (f64, f64) {
    (0.5, 1.0)
}

fn default_crossover() -> f64 {
    0.7
}

fn default_tolerance() -> f64 {
    0.01
}

impl Default for Maximizer {
    fn default() -> Self {
        Self::basin_hopping()
    }
}

struct Bounds {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl Bounds {
    fn new(limits: &[Limit]) -> Self {
        Self {
            lower: limits
                .iter()
                .map(|l| l.0.unwrap_or(f64::NEG_INFINITY))
                .collect(),
            upper: limits.iter().map(|l| l.1.unwrap_or(f64::INFINITY)).collect(),
        }
    }

    fn clamp(&self, x: &mut [f64]) {
        for ((v, &lo), &hi) in x.iter_mut().zip(&self.lower).zip(&self.upper) {
            *v = v.max(lo).min(hi);
        }
    }

    fn is_finite(&self) -> bool {
        self.lower.iter().chain(&self.upper).all(|v| v.is_finite())
    }

    /// Mirror a value that left the bounds back inside.
    fn reflect(&self, i: usize, value: f64) -> f64 {
        let (lo, hi) = (self.lower[i], self.upper[i]);
        let range = hi - lo;
        if value > hi {
            hi - (value - hi) % range
        } else if value < lo {
            lo + (lo - value) % range
        } else {
            value
        }
    }
}

/// Draw from the standard normal distribution (Box-Muller).
pub(crate) fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

fn start_value(limit: &Limit) -> f64 {
    match *limit {
        (Some(lo), Some(hi)) => (lo + hi) / 2.0,
        (Some(lo), None) => lo,
        (None, Some(hi)) => hi,
        (None, None) => 0.0,
    }
}

fn step_value(limit: &Limit) -> f64 {
    match *limit {
        (Some(lo), Some(hi)) => (hi - lo) / 2.0,
        _ => 1.0,
    }
}

fn by_value(a: &(Vec<f64>, f64), b: &(Vec<f64>, f64)) -> Ordering {
    a.1.total_cmp(&b.1)
}

/// Bounded Nelder-Mead minimisation. Trial points are clamped into the
/// bounds.
fn nelder_mead<F>(f: &F, x0: &[f64], bounds: &Bounds) -> (Vec<f64>, f64)
where
    F: Fn(&[f64]) -> f64,
{
    let n = x0.len();
    let mut start = x0.to_vec();
    bounds.clamp(&mut start);
    if n == 0 {
        let value = f(&start);
        return (start, value);
    }

    let eval = |mut x: Vec<f64>| {
        bounds.clamp(&mut x);
        let value = f(&x);
        (x, value)
    };

    let mut simplex = Vec::with_capacity(n + 1);
    simplex.push(eval(start.clone()));
    for i in 0..n {
        let h = if start[i] != 0.0 {
            0.05 * start[i].abs()
        } else {
            0.1
        };
        let mut vertex = start.clone();
        vertex[i] += h;
        if vertex[i] > bounds.upper[i] {
            vertex[i] = start[i] - h;
        }
        simplex.push(eval(vertex));
    }

    for _ in 0..NM_ITERATIONS_PER_PARAMETER * n {
        simplex.sort_by(by_value);
        let best = &simplex[0];
        let x_spread = simplex[1..]
            .iter()
            .flat_map(|(x, _)| x.iter().zip(&best.0).map(|(a, b)| (a - b).abs()))
            .fold(0.0, f64::max);
        let f_spread = simplex[1..]
            .iter()
            .map(|(_, v)| (v - best.1).abs())
            .fold(0.0, f64::max);
        if x_spread <= NM_XTOL && f_spread <= NM_FTOL {
            break;
        }

        let mut centroid = vec![0.0; n];
        for (x, _) in &simplex[..n] {
            for (c, v) in centroid.iter_mut().zip(x) {
                *c += v / n as f64;
            }
        }
        let toward = |from: &[f64], coefficient: f64| -> Vec<f64> {
            centroid
                .iter()
                .zip(from)
                .map(|(c, x)| c + coefficient * (x - c))
                .collect()
        };

        let worst = simplex[n].clone();
        let reflected = eval(toward(&worst.0, -1.0));
        if reflected.1 < simplex[0].1 {
            let expanded = eval(toward(&reflected.0, 2.0));
            simplex[n] = if expanded.1 < reflected.1 {
                expanded
            } else {
                reflected
            };
            continue;
        }
        if reflected.1 < simplex[n - 1].1 {
            simplex[n] = reflected;
            continue;
        }

        let contracted = if reflected.1 < worst.1 {
            let outside = eval(toward(&reflected.0, 0.5));
            (outside.1 <= reflected.1).then_some(outside)
        } else {
            let inside = eval(toward(&worst.0, 0.5));
            (inside.1 < worst.1).then_some(inside)
        };
        match contracted {
            Some(point) => simplex[n] = point,
            None => {
                let best = simplex[0].0.clone();
                for vertex in simplex.iter_mut().skip(1) {
                    let shrunk: Vec<f64> = best
                        .iter()
                        .zip(&vertex.0)
                        .map(|(b, x)| b + 0.5 * (x - b))
                        .collect();
                    *vertex = eval(shrunk);
                }
            }
        }
    }

    simplex.sort_by(by_value);
    simplex.swap_remove(0)
}

impl Maximizer {
    pub fn basin_hopping() -> Self {
        Maximizer::BasinHopping {
            niter: default_niter(),
            step: None,
            temperature: None,
        }
    }

    pub fn differential_evolution() -> Self {
        Maximizer::DifferentialEvolution {
            max_generations: default_max_generations(),
            population_factor: default_population_factor(),
            mutation: default_mutation(),
            crossover: default_crossover(),
            tolerance: default_tolerance(),
        }
    }

    /// Find the maximum of `objective` within `limits`.
    pub fn maximize<F, R>(
        &self,
        objective: F,
        limits: &[Limit],
        rng: &mut R,
    ) -> LikelihoodResult<Optimum>
    where
        F: Fn(&[f64]) -> f64,
        R: Rng + ?Sized,
    {
        let bounds = Bounds::new(limits);
        let minimand = |x: &[f64]| {
            let value = -objective(x);
            if value.is_nan() {
                f64::INFINITY
            } else {
                value
            }
        };
        let (x, fun) = match self {
            Maximizer::BasinHopping {
                niter,
                step,
                temperature,
            } => basin_hopping(&minimand, limits, &bounds, *niter, *step, *temperature, rng),
            Maximizer::DifferentialEvolution {
                max_generations,
                population_factor,
                mutation,
                crossover,
                tolerance,
            } => {
                if !bounds.is_finite() {
                    return Err(LikelihoodError::Maximizer {
                        message: "differential evolution needs finite parameter limits"
                            .to_string(),
                    });
                }
                let settings = EvolutionSettings {
                    max_generations: *max_generations,
                    population_factor: *population_factor,
                    mutation: *mutation,
                    crossover: *crossover,
                    tolerance: *tolerance,
                };
                differential_evolution(&minimand, &bounds, &settings, rng)
            }
        };
        Ok(Optimum { x, value: -fun })
    }
}

fn basin_hopping<F, R>(
    f: &F,
    limits: &[Limit],
    bounds: &Bounds,
    niter: usize,
    step: Option<f64>,
    temperature: Option<f64>,
    rng: &mut R,
) -> (Vec<f64>, f64)
where
    F: Fn(&[f64]) -> f64,
    R: Rng + ?Sized,
{
    let n = limits.len();
    let x0: Vec<f64> = limits.iter().map(start_value).collect();
    let steps: Vec<f64> = match step {
        Some(s) => vec![s; n],
        None => limits.iter().map(step_value).collect(),
    };
    let temperature = temperature.unwrap_or(n as f64).max(f64::MIN_POSITIVE);

    let mut current = nelder_mead(f, &x0, bounds);
    if n == 0 {
        return current;
    }
    let mut best = current.clone();
    let mut accepted = 0;
    for _ in 0..niter {
        let trial: Vec<f64> = (0..n)
            .map(|i| {
                let scale = (current.0[i] - x0[i]).abs().max(steps[i]);
                bounds.reflect(i, current.0[i] + standard_normal(rng) * scale)
            })
            .collect();
        let candidate = nelder_mead(f, &trial, bounds);
        if candidate.1 < best.1 {
            best = candidate.clone();
        }
        let accept = candidate.1 < current.1
            || rng.gen::<f64>() < (-(candidate.1 - current.1) / temperature).exp();
        if accept {
            current = candidate;
            accepted += 1;
        }
    }
    debug!(
        "Basin hopping accepted {} of {} hops, minimum {}",
        accepted, niter, best.1
    );
    best
}

struct EvolutionSettings {
    max_generations: usize,
    population_factor: usize,
    mutation: (f64, f64),
    crossover: f64,
    tolerance: f64,
}

fn differential_evolution<F, R>(
    f: &F,
    bounds: &Bounds,
    settings: &EvolutionSettings,
    rng: &mut R,
) -> (Vec<f64>, f64)
where
    F: Fn(&[f64]) -> f64,
    R: Rng + ?Sized,
{
    let n = bounds.lower.len();
    if n == 0 {
        return nelder_mead(f, &[], bounds);
    }
    let size = (settings.population_factor * n).max(5);
    let random_point = |rng: &mut R| -> Vec<f64> {
        bounds
            .lower
            .iter()
            .zip(&bounds.upper)
            .map(|(lo, hi)| lo + rng.gen::<f64>() * (hi - lo))
            .collect()
    };
    let mut population: Vec<Vec<f64>> = (0..size).map(|_| random_point(rng)).collect();
    let mut energies: Vec<f64> = population.iter().map(|x| f(x)).collect();

    let mut generation = 0;
    while generation < settings.max_generations {
        generation += 1;
        let (lo, hi) = settings.mutation;
        let scale = lo + rng.gen::<f64>() * (hi - lo);
        let best = argmin(&energies);
        for i in 0..size {
            let (r1, r2) = loop {
                let r1 = rng.gen_range(0..size);
                let r2 = rng.gen_range(0..size);
                if r1 != r2 && r1 != i && r2 != i {
                    break (r1, r2);
                }
            };
            let forced = rng.gen_range(0..n);
            let mut trial = population[i].clone();
            for j in 0..n {
                if j == forced || rng.gen::<f64>() < settings.crossover {
                    trial[j] = population[best][j]
                        + scale * (population[r1][j] - population[r2][j]);
                }
                if trial[j] < bounds.lower[j] || trial[j] > bounds.upper[j] {
                    trial[j] =
                        bounds.lower[j] + rng.gen::<f64>() * (bounds.upper[j] - bounds.lower[j]);
                }
            }
            let energy = f(&trial);
            if energy <= energies[i] {
                population[i] = trial;
                energies[i] = energy;
            }
        }
        if converged(&energies, settings.tolerance) {
            break;
        }
    }

    let best = argmin(&energies);
    let polished = nelder_mead(f, &population[best], bounds);
    debug!(
        "Differential evolution stopped after {} generations, minimum {}",
        generation, energies[best]
    );
    if polished.1 <= energies[best] {
        polished
    } else {
        (population[best].clone(), energies[best])
    }
}

fn argmin(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .map_or(0, |(i, _)| i)
}

fn converged(energies: &[f64], tolerance: f64) -> bool {
    if energies.iter().any(|e| !e.is_finite()) {
        return false;
    }
    let n = energies.len() as f64;
    let mean = energies.iter().sum::<f64>() / n;
    let variance = energies.iter().map(|e| (e - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt() <= tolerance * mean.abs()
}
