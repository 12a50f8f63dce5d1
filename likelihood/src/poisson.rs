//! Poisson statistics and the special functions they need.

use rand::Rng;
use std::f64::consts::PI;
use std::sync::OnceLock;

const LANCZOS_G: f64 = 7.0;
const LANCZOS: [f64; 9] = [
    0.999_999_999_999_809_9,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_1,
    -176.615_029_162_140_6,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_572e-6,
    1.505_632_735_149_311_6e-7,
];

const FACTORIAL_TABLE_LEN: usize = 1024;
const MAX_ITERATIONS: usize = 1000;
const EPSILON: f64 = 1e-15;
const TINY: f64 = 1e-300;

/// Natural logarithm of the gamma function for positive arguments.
pub fn ln_gamma(x: f64) -> f64 {
    if x.is_nan() {
        return f64::NAN;
    }
    if x <= 0.0 {
        return f64::INFINITY;
    }
    if x < 0.5 {
        // Reflection formula
        return (PI / (PI * x).sin()).ln() - ln_gamma(1.0 - x);
    }
    let x = x - 1.0;
    let mut a = LANCZOS[0];
    for (i, c) in LANCZOS.iter().enumerate().skip(1) {
        a += c / (x + i as f64);
    }
    let t = x + LANCZOS_G + 0.5;
    0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + a.ln()
}

fn factorial_table() -> &'static [f64] {
    static TABLE: OnceLock<Vec<f64>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = Vec::with_capacity(FACTORIAL_TABLE_LEN);
        let mut acc = 0.0;
        table.push(acc);
        for i in 1..FACTORIAL_TABLE_LEN {
            acc += (i as f64).ln();
            table.push(acc);
        }
        table
    })
}

/// `ln(k!)` for a non-negative integer valued `k`.
pub fn ln_factorial(k: f64) -> f64 {
    if k >= 0.0 && k < FACTORIAL_TABLE_LEN as f64 && k.fract() == 0.0 {
        factorial_table()[k as usize]
    } else {
        ln_gamma(k + 1.0)
    }
}

fn is_count(k: f64) -> bool {
    k.is_finite() && k >= 0.0 && k.fract() == 0.0
}

/// Logarithm of the Poisson probability to observe `k` events when `mu`
/// are expected.
///
/// Negative, NaN or infinite expectations and non-integer counts have
/// probability zero.
pub fn log_pmf(k: f64, mu: f64) -> f64 {
    if !is_count(k) || mu.is_nan() || mu < 0.0 || mu.is_infinite() {
        return f64::NEG_INFINITY;
    }
    if mu == 0.0 {
        return if k == 0.0 { 0.0 } else { f64::NEG_INFINITY };
    }
    k * mu.ln() - mu - ln_factorial(k)
}

fn gamma_series(a: f64, x: f64) -> f64 {
    let mut ap = a;
    let mut del = 1.0 / a;
    let mut sum = del;
    for _ in 0..MAX_ITERATIONS {
        ap += 1.0;
        del *= x / ap;
        sum += del;
        if del.abs() < sum.abs() * EPSILON {
            break;
        }
    }
    sum * (-x + a * x.ln() - ln_gamma(a)).exp()
}

fn gamma_continued_fraction(a: f64, x: f64) -> f64 {
    let mut b = x + 1.0 - a;
    let mut c = 1.0 / TINY;
    let mut d = 1.0 / b;
    let mut h = d;
    for i in 1..MAX_ITERATIONS {
        let i = i as f64;
        let an = -i * (i - a);
        b += 2.0;
        d = an * d + b;
        if d.abs() < TINY {
            d = TINY;
        }
        c = b + an / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        let del = d * c;
        h *= del;
        if (del - 1.0).abs() < EPSILON {
            break;
        }
    }
    (-x + a * x.ln() - ln_gamma(a)).exp() * h
}

/// Regularised upper incomplete gamma function `Q(a, x)`.
pub fn gamma_q(a: f64, x: f64) -> f64 {
    if a <= 0.0 || x < 0.0 || a.is_nan() || x.is_nan() {
        return f64::NAN;
    }
    if x == 0.0 {
        return 1.0;
    }
    if x.is_infinite() {
        return 0.0;
    }
    if x < a + 1.0 {
        1.0 - gamma_series(a, x)
    } else {
        gamma_continued_fraction(a, x)
    }
}

/// Survival function of the chi-squared distribution with `dof` degrees of
/// freedom.
pub fn chi2_sf(x: f64, dof: usize) -> f64 {
    if dof == 0 {
        return if x > 0.0 { 0.0 } else { 1.0 };
    }
    if x <= 0.0 {
        return 1.0;
    }
    gamma_q(dof as f64 / 2.0, x / 2.0)
}

/// Draw a Poisson distributed count with expectation `mu`.
///
/// Small expectations use multiplication of uniforms, large ones the
/// transformed rejection method (PTRS).
pub fn sample<R: Rng + ?Sized>(mu: f64, rng: &mut R) -> f64 {
    if !mu.is_finite() || mu <= 0.0 {
        return 0.0;
    }
    if mu < 10.0 {
        let limit = (-mu).exp();
        let mut k = 0.0;
        let mut p: f64 = rng.gen();
        while p > limit {
            k += 1.0;
            p *= rng.gen::<f64>();
        }
        return k;
    }

    let smu = mu.sqrt();
    let b = 0.931 + 2.53 * smu;
    let a = -0.059 + 0.024_83 * b;
    let inv_alpha = 1.1239 + 1.1328 / (b - 3.4);
    let vr = 0.9277 - 3.6224 / (b - 2.0);
    let ln_mu = mu.ln();
    loop {
        let u = rng.gen::<f64>() - 0.5;
        let v: f64 = rng.gen();
        let us = 0.5 - u.abs();
        let k = ((2.0 * a / us + b) * u + mu + 0.43).floor();
        if us >= 0.07 && v <= vr {
            return k;
        }
        if k < 0.0 || (us < 0.013 && v > us) {
            continue;
        }
        let lhs = v.ln() + inv_alpha.ln() - (a / (us * us) + b).ln();
        if lhs <= -mu + k * ln_mu - ln_factorial(k) {
            return k;
        }
    }
}
