//! Seasonal ARIMA(2,1,2)(1,0,1)[24]
//!
//! Fitted by conditional sum of squares: the differenced series is filtered
//! through the multiplied-out AR and MA polynomials and the squared one-step
//! residuals are minimized with a bounded simplex search.

use tracing::debug;

use super::optimize::{minimize, SimplexConfig};
use super::{Backtest, ForecastError, Forecaster, Split};
use crate::dataset::{interpolate_gaps, HourlyFrame};

/// Model orders; `d` is the number of regular differences
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SarimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
    pub seasonal_p: usize,
    pub seasonal_q: usize,
    pub period: usize,
}

impl Default for SarimaOrder {
    fn default() -> Self {
        Self {
            p: 2,
            d: 1,
            q: 2,
            seasonal_p: 1,
            seasonal_q: 1,
            period: 24,
        }
    }
}

/// Coefficient magnitude limit applied to every parameter during the search
const COEF_BOUND: f64 = 0.99;

impl SarimaOrder {
    fn n_params(&self) -> usize {
        self.p + self.q + self.seasonal_p + self.seasonal_q
    }

    fn max_ar_lag(&self) -> usize {
        self.p + self.seasonal_p * self.period
    }
}

/// Sparse lag polynomial, `(lag, coefficient)` pairs
type LagPoly = Vec<(usize, f64)>;

/// Multiply `(1 ∓ Σ a_i B^i)(1 ∓ Σ A_j B^(j·s))` and return the non-unit terms.
///
/// `sign` is `-1` for AR polynomials (which are written with minus signs) and
/// `+1` for MA polynomials. The result is expressed so that
/// `x_t = Σ c_k x_{t-k}` for AR and `e_t + Σ c_k e_{t-k}` for MA.
fn expand(regular: &[f64], seasonal: &[f64], period: usize, sign: f64) -> LagPoly {
    let mut coefs = vec![0.0; regular.len() + seasonal.len() * period + 1];
    // Full polynomial with the leading 1, using sign convention 1 + sign*Σ...
    let mut poly_r = vec![1.0];
    poly_r.extend(regular.iter().map(|c| sign * c));
    let mut poly_s = vec![0.0; seasonal.len() * period + 1];
    poly_s[0] = 1.0;
    for (j, c) in seasonal.iter().enumerate() {
        poly_s[(j + 1) * period] = sign * c;
    }
    for (i, a) in poly_r.iter().enumerate() {
        for (k, b) in poly_s.iter().enumerate() {
            coefs[i + k] += a * b;
        }
    }
    coefs
        .into_iter()
        .enumerate()
        .skip(1)
        .filter(|(_, c)| *c != 0.0)
        .map(|(lag, c)| (lag, sign * c))
        .collect()
}

/// Fitted coefficients
#[derive(Debug, Clone)]
pub struct SarimaFit {
    pub order: SarimaOrder,
    pub ar: Vec<f64>,
    pub ma: Vec<f64>,
    pub seasonal_ar: Vec<f64>,
    pub seasonal_ma: Vec<f64>,
    /// Mean squared one-step residual at the optimum
    pub sigma2: f64,
    ar_poly: LagPoly,
    ma_poly: LagPoly,
    /// Differenced training series and its residuals, kept for forecasting
    history: Vec<f64>,
    residuals: Vec<f64>,
    /// Last `d` undifferenced levels, used to integrate forecasts
    tail_levels: Vec<f64>,
}

fn difference(series: &[f64]) -> Vec<f64> {
    series.windows(2).map(|w| w[1] - w[0]).collect()
}

fn split_params(order: &SarimaOrder, params: &[f64]) -> (Vec<f64>, Vec<f64>, Vec<f64>, Vec<f64>) {
    let (ar, rest) = params.split_at(order.p);
    let (ma, rest) = rest.split_at(order.q);
    let (sar, sma) = rest.split_at(order.seasonal_p);
    (ar.to_vec(), ma.to_vec(), sar.to_vec(), sma.to_vec())
}

/// One-step residuals; pre-sample values and residuals are zero
fn residuals(w: &[f64], ar_poly: &LagPoly, ma_poly: &LagPoly) -> Vec<f64> {
    let mut e = vec![0.0; w.len()];
    for t in 0..w.len() {
        let mut pred = 0.0;
        for &(lag, c) in ar_poly {
            if lag <= t {
                pred += c * w[t - lag];
            }
        }
        for &(lag, c) in ma_poly {
            if lag <= t {
                pred += c * e[t - lag];
            }
        }
        e[t] = w[t] - pred;
    }
    e
}

impl SarimaFit {
    /// Fit on a gap-free series
    pub fn fit(series: &[f64], order: SarimaOrder) -> Result<Self, ForecastError> {
        let mut w = series.to_vec();
        let mut tail_levels = Vec::with_capacity(order.d);
        for _ in 0..order.d {
            let last = *w.last().ok_or_else(|| {
                ForecastError::Model("SARIMA needs at least one training value".into())
            })?;
            tail_levels.push(last);
            w = difference(&w);
        }
        if w.len() < 2 {
            return Err(ForecastError::Model(format!(
                "SARIMA needs more than {} training values",
                order.d + 1
            )));
        }

        // Condition on the first seasonal cycle when the sample allows it
        let burn_in = if w.len() > 2 * order.max_ar_lag() {
            order.max_ar_lag()
        } else {
            0
        };

        let objective = |params: &[f64]| {
            let (ar, ma, sar, sma) = split_params(&order, params);
            let ar_poly = expand(&ar, &sar, order.period, -1.0);
            let ma_poly = expand(&ma, &sma, order.period, 1.0);
            let e = residuals(&w, &ar_poly, &ma_poly);
            let tail = &e[burn_in..];
            tail.iter().map(|v| v * v).sum::<f64>() / tail.len() as f64
        };

        let bounds = vec![(-COEF_BOUND, COEF_BOUND); order.n_params()];
        let start = vec![0.0; order.n_params()];
        let best = minimize(objective, &start, &bounds, SimplexConfig::default());
        if !best.value.is_finite() {
            return Err(ForecastError::Model(
                "SARIMA objective diverged for every parameter set".into(),
            ));
        }
        debug!(
            iterations = best.iterations,
            converged = best.converged,
            css = best.value,
            params = ?best.point,
            "SARIMA fit finished"
        );

        let (ar, ma, seasonal_ar, seasonal_ma) = split_params(&order, &best.point);
        let ar_poly = expand(&ar, &seasonal_ar, order.period, -1.0);
        let ma_poly = expand(&ma, &seasonal_ma, order.period, 1.0);
        let residuals = residuals(&w, &ar_poly, &ma_poly);

        Ok(SarimaFit {
            order,
            ar,
            ma,
            seasonal_ar,
            seasonal_ma,
            sigma2: best.value,
            ar_poly,
            ma_poly,
            history: w,
            residuals,
            tail_levels,
        })
    }

    /// Forecast `steps` values past the end of the training series
    pub fn forecast(&self, steps: usize) -> Vec<f64> {
        let mut w = self.history.clone();
        let mut e = self.residuals.clone();
        for _ in 0..steps {
            let t = w.len();
            let mut next = 0.0;
            for &(lag, c) in &self.ar_poly {
                if lag <= t {
                    next += c * w[t - lag];
                }
            }
            for &(lag, c) in &self.ma_poly {
                if lag <= t {
                    next += c * e[t - lag];
                }
            }
            w.push(next);
            e.push(0.0);
        }

        let mut out = w.split_off(self.history.len());
        // Undo each difference, innermost last
        for level in self.tail_levels.iter().rev() {
            let mut acc = *level;
            for v in out.iter_mut() {
                acc += *v;
                *v = acc;
            }
        }
        out
    }
}

/// SARIMA branch of the pipeline
#[derive(Debug, Clone, Default)]
pub struct SarimaForecaster {
    pub order: SarimaOrder,
}

impl Forecaster for SarimaForecaster {
    fn backtest(
        &self,
        frame: &HourlyFrame,
        split: Split,
        horizon: usize,
    ) -> Result<Backtest, ForecastError> {
        let train = interpolate_gaps(&frame.fact[..split.train_len])
            .ok_or_else(|| ForecastError::Model("training slice holds no observations".into()))?;
        let fit = SarimaFit::fit(&train, self.order)?;
        let predicted = fit.forecast(horizon);
        Ok(Backtest::on_grid(frame, split, predicted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_expand_ar_polynomial() {
        // (1 - 0.5B - 0.2B^2)(1 - 0.4B^24)
        let poly = expand(&[0.5, 0.2], &[0.4], 24, -1.0);
        let get = |lag: usize| poly.iter().find(|(l, _)| *l == lag).map(|(_, c)| *c);
        assert_abs_diff_eq!(get(1).unwrap(), 0.5);
        assert_abs_diff_eq!(get(2).unwrap(), 0.2);
        assert_abs_diff_eq!(get(24).unwrap(), 0.4);
        assert_abs_diff_eq!(get(25).unwrap(), -0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(get(26).unwrap(), -0.08, epsilon = 1e-12);
        assert_eq!(poly.len(), 5);
    }

    #[test]
    fn test_expand_ma_polynomial() {
        // (1 + 0.3B)(1 + 0.5B^24)
        let poly = expand(&[0.3], &[0.5], 24, 1.0);
        assert_eq!(poly, vec![(1, 0.3), (24, 0.5), (25, 0.15)]);
    }

    #[test]
    fn test_forecast_continues_linear_trend() {
        let series: Vec<f64> = (0..120).map(|i| 2.0 * i as f64).collect();
        let fit = SarimaFit::fit(&series, SarimaOrder::default()).unwrap();
        let fc = fit.forecast(5);
        assert_eq!(fc.len(), 5);
        // Differenced series is constant 2, so forecasts stay close to the line
        for (h, v) in fc.iter().enumerate() {
            let expected = 2.0 * (120 + h) as f64;
            assert!((v - expected).abs() < 2.0 * (h + 1) as f64, "step {h}: {v}");
        }
    }

    #[test]
    fn test_fits_daily_cycle() {
        let series: Vec<f64> = (0..24 * 14)
            .map(|i| 10.0 + 5.0 * (2.0 * std::f64::consts::PI * i as f64 / 24.0).sin())
            .collect();
        let fit = SarimaFit::fit(&series, SarimaOrder::default()).unwrap();
        assert!(fit.sigma2 < 1.0, "sigma2 = {}", fit.sigma2);
        let fc = fit.forecast(24);
        let truth: Vec<f64> = (24 * 14..24 * 15)
            .map(|i| 10.0 + 5.0 * (2.0 * std::f64::consts::PI * i as f64 / 24.0).sin())
            .collect();
        let mae = fc.iter().zip(&truth).map(|(a, b)| (a - b).abs()).sum::<f64>() / 24.0;
        assert!(mae < 2.5, "mae = {mae}");
    }

    #[test]
    fn test_too_short_series() {
        assert!(SarimaFit::fit(&[1.0, 2.0], SarimaOrder::default()).is_err());
    }

    #[test]
    fn test_fit_is_deterministic() {
        let series: Vec<f64> = (0..100).map(|i| ((i * 7) % 13) as f64).collect();
        let a = SarimaFit::fit(&series, SarimaOrder::default()).unwrap().forecast(10);
        let b = SarimaFit::fit(&series, SarimaOrder::default()).unwrap().forecast(10);
        assert_eq!(a, b);
    }
}
