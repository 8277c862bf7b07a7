//! Box-constrained Nelder–Mead minimizer used by the ARIMA fit

use std::cmp::Ordering;

/// Simplex search settings
#[derive(Debug, Clone, Copy)]
pub struct SimplexConfig {
    pub max_iter: usize,
    /// Stop once the spread of objective values across the simplex drops below this
    pub tolerance: f64,
    /// Offset of the initial vertices from the starting point
    pub initial_step: f64,
}

impl Default for SimplexConfig {
    fn default() -> Self {
        Self {
            max_iter: 2000,
            tolerance: 1e-9,
            initial_step: 0.1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Minimum {
    pub point: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
    pub converged: bool,
}

const REFLECT: f64 = 1.0;
const EXPAND: f64 = 2.0;
const CONTRACT: f64 = 0.5;
const SHRINK: f64 = 0.5;

fn clamp(point: &mut [f64], bounds: &[(f64, f64)]) {
    for (x, (lo, hi)) in point.iter_mut().zip(bounds) {
        *x = x.clamp(*lo, *hi);
    }
}

/// `centroid + coef * (from - centroid)`, clamped into `bounds`
fn along(centroid: &[f64], from: &[f64], coef: f64, bounds: &[(f64, f64)]) -> Vec<f64> {
    let mut p: Vec<f64> = centroid
        .iter()
        .zip(from)
        .map(|(c, f)| c + coef * (f - c))
        .collect();
    clamp(&mut p, bounds);
    p
}

fn by_value(a: &f64, b: &f64) -> Ordering {
    a.partial_cmp(b).unwrap_or(Ordering::Equal)
}

/// Minimize `objective` starting from `start`, keeping every coordinate in `bounds`.
///
/// Non-finite objective values are treated as `+inf`, so the search walks away
/// from regions where the objective is undefined.
pub fn minimize<F>(
    objective: F,
    start: &[f64],
    bounds: &[(f64, f64)],
    cfg: SimplexConfig,
) -> Minimum
where
    F: Fn(&[f64]) -> f64,
{
    let eval = |p: &[f64]| {
        let v = objective(p);
        if v.is_finite() {
            v
        } else {
            f64::INFINITY
        }
    };

    let n = start.len();
    let mut origin = start.to_vec();
    clamp(&mut origin, bounds);
    if n == 0 {
        let value = eval(&origin);
        return Minimum { point: origin, value, iterations: 0, converged: true };
    }

    let mut simplex: Vec<Vec<f64>> = vec![origin.clone()];
    for i in 0..n {
        let mut vertex = origin.clone();
        let (lo, hi) = bounds[i];
        // Step towards whichever bound leaves more room
        vertex[i] += if hi - vertex[i] >= vertex[i] - lo {
            cfg.initial_step
        } else {
            -cfg.initial_step
        };
        clamp(&mut vertex, bounds);
        simplex.push(vertex);
    }
    let mut values: Vec<f64> = simplex.iter().map(|p| eval(p)).collect();

    let mut iterations = 0;
    let mut converged = false;
    while iterations < cfg.max_iter {
        iterations += 1;

        let mut order: Vec<usize> = (0..=n).collect();
        order.sort_by(|&a, &b| by_value(&values[a], &values[b]));
        simplex = order.iter().map(|&i| simplex[i].clone()).collect();
        values = order.iter().map(|&i| values[i]).collect();

        let spread = values[n] - values[0];
        if spread.is_finite() && spread.abs() < cfg.tolerance {
            converged = true;
            break;
        }

        let centroid: Vec<f64> = (0..n)
            .map(|d| simplex[..n].iter().map(|p| p[d]).sum::<f64>() / n as f64)
            .collect();

        let reflected = along(&centroid, &simplex[n], -REFLECT, bounds);
        let f_reflected = eval(&reflected);

        if f_reflected < values[0] {
            let expanded = along(&centroid, &simplex[n], -REFLECT * EXPAND, bounds);
            let f_expanded = eval(&expanded);
            if f_expanded < f_reflected {
                simplex[n] = expanded;
                values[n] = f_expanded;
            } else {
                simplex[n] = reflected;
                values[n] = f_reflected;
            }
            continue;
        }

        if f_reflected < values[n - 1] {
            simplex[n] = reflected;
            values[n] = f_reflected;
            continue;
        }

        let (contracted, f_contracted) = if f_reflected < values[n] {
            let p = along(&centroid, &reflected, CONTRACT, bounds);
            let f = eval(&p);
            (p, f)
        } else {
            let p = along(&centroid, &simplex[n], CONTRACT, bounds);
            let f = eval(&p);
            (p, f)
        };
        if f_contracted < values[n].min(f_reflected) {
            simplex[n] = contracted;
            values[n] = f_contracted;
            continue;
        }

        let best = simplex[0].clone();
        for i in 1..=n {
            simplex[i] = along(&best, &simplex[i], SHRINK, bounds);
            values[i] = eval(&simplex[i]);
        }
    }

    let best = values
        .iter()
        .enumerate()
        .min_by(|a, b| by_value(a.1, b.1))
        .map(|(i, _)| i)
        .unwrap_or(0);

    Minimum {
        point: simplex[best].clone(),
        value: values[best],
        iterations,
        converged,
    }
}
