//! Descriptive statistics of simulated SET counts and their comparison with
//! the analytic model.

use nalgebra::{Matrix3, Vector3};

use crate::{
    probability::{binomial, CardCount, SetProbabilityModel},
    results::ResultsCollection,
};

const FIT_MAX_ITERATIONS: usize = 200;
const FIT_TOLERANCE: f64 = 1e-10;

/// Arithmetic mean, 0 for an empty sample.
pub fn mean(values: &[u32]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|&v| f64::from(v)).sum::<f64>() / values.len() as f64
}

/// Population standard deviation, 0 for an empty sample.
pub fn std_dev(values: &[u32]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = mean(values);
    let variance = values
        .iter()
        .map(|&v| (f64::from(v) - mean).powi(2))
        .sum::<f64>()
        / values.len() as f64;
    variance.sqrt()
}

/// Fraction of tables per SET count, for counts `0..=max`.
///
/// Entry `k` is the share of tables with exactly `k` SETs, so the entries sum to one.
pub fn normalized_histogram(values: &[u32]) -> Vec<f64> {
    let Some(&max) = values.iter().max() else {
        return Vec::new();
    };

    let mut counts = vec![0usize; max as usize + 1];
    for &value in values {
        counts[value as usize] += 1;
    }

    let total = values.len() as f64;
    counts.into_iter().map(|c| c as f64 / total).collect()
}

/// Parameters of `a * exp(-(x - mu)^2 / (2 sigma^2))`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianFit {
    /// Peak height `a`
    pub amplitude: f64,
    /// Center `mu`
    pub mean: f64,
    /// Width `sigma`
    pub sigma: f64,
}

impl GaussianFit {
    /// Value of the curve at `x`.
    pub fn evaluate(&self, x: f64) -> f64 {
        gaussian(x, self.amplitude, self.mean, self.sigma)
    }
}

/// Unnormalized Gaussian bell curve.
pub fn gaussian(x: f64, amplitude: f64, mean: f64, sigma: f64) -> f64 {
    amplitude * (-(x - mean).powi(2) / (2.0 * sigma.powi(2))).exp()
}

fn squared_error(xs: &[f64], ys: &[f64], params: &Vector3<f64>) -> f64 {
    xs.iter()
        .zip(ys)
        .map(|(&x, &y)| (y - gaussian(x, params[0], params[1], params[2])).powi(2))
        .sum()
}

/// Least-squares fit of a Gaussian to the points `(xs[i], ys[i])`.
///
/// Levenberg-Marquardt iteration starting at `initial`. Returns `None` if the
/// data cannot determine the three parameters (fewer than three points or a
/// zero initial width).
pub fn fit_gaussian(xs: &[f64], ys: &[f64], initial: GaussianFit) -> Option<GaussianFit> {
    if xs.len() < 3 || xs.len() != ys.len() || initial.sigma == 0.0 {
        return None;
    }

    let mut params = Vector3::new(initial.amplitude, initial.mean, initial.sigma);
    let mut cost = squared_error(xs, ys, &params);
    let mut damping = 1e-3;

    for _ in 0..FIT_MAX_ITERATIONS {
        let mut jtj = Matrix3::<f64>::zeros();
        let mut gradient = Vector3::<f64>::zeros();

        for (&x, &y) in xs.iter().zip(ys) {
            let (a, mu, sigma) = (params[0], params[1], params[2]);
            let shift = x - mu;
            let bell = (-shift.powi(2) / (2.0 * sigma.powi(2))).exp();
            let jacobian = Vector3::new(
                bell,
                a * bell * shift / sigma.powi(2),
                a * bell * shift.powi(2) / sigma.powi(3),
            );
            let residual = y - a * bell;

            jtj += jacobian * jacobian.transpose();
            gradient += jacobian * residual;
        }

        let mut improved = false;
        while damping < 1e12 {
            let damped = jtj + Matrix3::from_diagonal(&jtj.diagonal()) * damping;
            let Some(step) = damped.lu().solve(&gradient) else {
                damping *= 10.0;
                continue;
            };

            let candidate = params + step;
            let candidate_cost = squared_error(xs, ys, &candidate);
            if candidate_cost.is_finite() && candidate_cost < cost {
                let converged = step.norm() <= FIT_TOLERANCE * (params.norm() + FIT_TOLERANCE);
                params = candidate;
                cost = candidate_cost;
                damping = (damping / 10.0).max(1e-12);
                improved = !converged;
                break;
            }
            damping *= 10.0;
        }

        if !improved {
            break;
        }
    }

    log::debug!("Gaussian fit {params:?} with squared error {cost}");
    Some(GaussianFit {
        amplitude: params[0],
        mean: params[1],
        sigma: params[2].abs(),
    })
}

/// Gaussian fitted to the normalized histogram of `set_counts`, started from
/// the peak height, mean and standard deviation of the sample.
pub fn fit_histogram(set_counts: &[u32]) -> Option<GaussianFit> {
    let density = normalized_histogram(set_counts);
    let xs: Vec<f64> = (0..density.len()).map(|k| k as f64).collect();
    let initial = GaussianFit {
        amplitude: density.iter().copied().fold(0.0, f64::max),
        mean: mean(set_counts),
        sigma: std_dev(set_counts),
    };

    fit_gaussian(&xs, &density, initial)
}

/// Expected number of tables with `k` SETs for `k in 0..=max` under a binomial
/// with `max` trials and success rate `average / max`.
pub fn binomial_reference(set_counts: &[u32]) -> Vec<f64> {
    let Some(&max) = set_counts.iter().max() else {
        return Vec::new();
    };
    let trials = max as usize;
    let success = if trials > 0 {
        mean(set_counts) / trials as f64
    } else {
        0.0
    };
    let total = set_counts.len() as f64;

    (0..=trials)
        .map(|k| {
            let exponent = i32::try_from(k).unwrap_or(i32::MAX);
            let rest = i32::try_from(trials - k).unwrap_or(i32::MAX);
            binomial(trials, k) * success.powi(exponent) * (1.0 - success).powi(rest) * total
        })
        .collect()
}

/// One point of the simulated-versus-expected comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbabilityPoint {
    /// Number of cards
    pub cards: usize,
    /// Observed fraction of tables with at least one SET
    pub simulated: f64,
    /// Binomial standard error of `simulated`
    pub std_error: f64,
    /// Value of the analytic model
    pub expected: f64,
}

impl ProbabilityPoint {
    /// Difference between simulation and model.
    pub fn residual(&self) -> f64 {
        self.simulated - self.expected
    }
}

/// Compare the observed probability of at least one SET with the model, for
/// every card count in `results`.
pub fn probability_comparison(results: &ResultsCollection) -> Vec<ProbabilityPoint> {
    let mut model = SetProbabilityModel::new();

    results
        .iter()
        .map(|(cards, report)| {
            let simulated = report.prob_at_least_one();
            let tables = report.num_tables();
            let std_error = if tables == 0 {
                0.0
            } else {
                (simulated * (1.0 - simulated) / tables as f64).max(0.0).sqrt()
            };

            ProbabilityPoint {
                cards,
                simulated,
                std_error,
                expected: model.probability(CardCount::new(cards)),
            }
        })
        .collect()
}

/// Average number of SETs per card count.
pub fn average_series(results: &ResultsCollection) -> Vec<(usize, f64)> {
    results
        .iter()
        .map(|(cards, report)| (cards, report.avg_sets))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::report::SimulationReport;

    #[test]
    fn moments() {
        let values = [0, 1, 3];
        assert!((mean(&values) - 4.0 / 3.0).abs() < 1e-12);
        assert!((std_dev(&[2, 4, 4, 4, 5, 5, 7, 9]) - 2.0).abs() < 1e-12);
        assert_eq!(mean(&[]), 0.0);
    }

    #[test]
    fn histogram_density() {
        assert_eq!(normalized_histogram(&[0, 1, 1, 3]), vec![0.25, 0.5, 0.0, 0.25]);
        assert!(normalized_histogram(&[]).is_empty());
    }

    #[test]
    fn recovers_gaussian() {
        let truth = GaussianFit {
            amplitude: 0.3,
            mean: 6.0,
            sigma: 2.0,
        };
        let xs: Vec<f64> = (0..15).map(f64::from).collect();
        let ys: Vec<f64> = xs.iter().map(|&x| truth.evaluate(x)).collect();
        let start = GaussianFit {
            amplitude: 0.25,
            mean: 5.0,
            sigma: 3.0,
        };

        let fit = fit_gaussian(&xs, &ys, start).unwrap();
        assert!((fit.amplitude - 0.3).abs() < 1e-6);
        assert!((fit.mean - 6.0).abs() < 1e-6);
        assert!((fit.sigma - 2.0).abs() < 1e-6);
    }

    #[test]
    fn degenerate_fit() {
        assert_eq!(fit_histogram(&[2, 2, 2]), None);
    }

    #[test]
    fn binomial_counts() {
        // max 2, average 1 -> Bin(2, 0.5) scaled by 4 tables
        assert_eq!(binomial_reference(&[0, 1, 1, 2]), vec![1.0, 2.0, 1.0]);
    }

    #[test]
    fn comparison_against_model() {
        let mut results = ResultsCollection::new();
        results.insert(3, SimulationReport::from_counts(vec![0, 0, 0, 1]));
        results.insert(2, SimulationReport::from_counts(vec![0, 0]));

        let points = probability_comparison(&results);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].cards, 2);
        assert_eq!(points[0].expected, 0.0);
        assert_eq!(points[0].residual(), 0.0);

        let three = points[1];
        assert!((three.simulated - 0.25).abs() < 1e-12);
        assert!((three.std_error - (0.25f64 * 0.75 / 4.0).sqrt()).abs() < 1e-12);
        assert_eq!(three.expected, 1.0 / 79.0);
    }
}
