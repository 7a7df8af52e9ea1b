//! Generic, model-agnostic RANSAC engine.
//!
//! Implement [`Estimator`] for a model and call [`ransac`] with the data and
//! some [`RansacOptions`]. The loop is bounded: it stops on the iteration
//! budget, on the confidence-derived bound, on an inlier-ratio early stop, or
//! on an optional wall-clock budget, and reports which one fired.
//!
//! Trials are evaluated in parallel batches. Minimal samples are drawn
//! sequentially from one seeded RNG and batch results are scanned in trial
//! order, so the result does not depend on `batch_size` or on the thread
//! count (unless the time budget fires).
//!
//! When no consensus is found [`ransac`] returns a [`RansacResult`] with
//! `success == false` and `model == None`; it never panics on bad data.

use std::time::{Duration, Instant};

use log::debug;
use rand::prelude::IndexedRandom;
use rand::{rngs::StdRng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Configuration parameters for the generic RANSAC engine.
#[derive(Debug, Clone)]
pub struct RansacOptions {
    /// Hard upper bound on the number of trials.
    pub max_iters: usize,
    /// Inlier residual threshold (inclusive).
    pub thresh: f64,
    /// Minimum number of inliers required to accept a model.
    pub min_inliers: usize,
    /// Desired confidence level in `[0, 1)` for the adaptive trial bound.
    /// `0` disables the adaptive bound.
    pub confidence: f64,
    /// Stop as soon as a model explains at least this fraction of the data.
    pub early_stop_inlier_ratio: Option<f64>,
    /// Random-number generator seed (for reproducibility).
    pub seed: u64,
    /// If `true`, refit the best model on its inliers before returning.
    pub refit_on_inliers: bool,
    /// Redraws allowed for a degenerate minimal sample within one trial.
    pub max_resample_attempts: usize,
    /// Number of trials evaluated in parallel per batch.
    pub batch_size: usize,
    /// Optional wall-clock budget, checked between batches.
    pub time_budget: Option<Duration>,
}

impl Default for RansacOptions {
    fn default() -> Self {
        Self {
            max_iters: 1000,
            thresh: 2.0,
            min_inliers: 12,
            confidence: 0.99,
            early_stop_inlier_ratio: None,
            seed: 1_234_567,
            refit_on_inliers: true,
            max_resample_attempts: 32,
            batch_size: 64,
            time_budget: None,
        }
    }
}

/// Why the trial loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// `max_iters` trials were run.
    Exhausted,
    /// The confidence-derived trial bound was reached.
    Confidence,
    /// A model reached `early_stop_inlier_ratio`.
    InlierRatio,
    /// The wall-clock budget ran out.
    TimeBudget,
}

/// Output of a RANSAC run.
///
/// Check `success` before using the model. On failure `model` is `None` and
/// `best_inlier_count` reports the largest consensus seen.
#[derive(Debug, Clone)]
pub struct RansacResult<M> {
    /// Whether a consensus set satisfying the options was found.
    pub success: bool,
    /// Best model found (if any).
    pub model: Option<M>,
    /// Indices of inlier data points for `model`.
    pub inliers: Vec<usize>,
    /// Largest inlier count of any candidate, refit or not.
    pub best_inlier_count: usize,
    /// Root-mean-square residual over inliers.
    pub inlier_rms: f64,
    /// Sum of inlier residuals.
    pub total_residual: f64,
    /// Number of trials actually performed.
    pub iters: usize,
    /// Trial (1-based) that produced the best candidate, `0` if none.
    pub best_iter: usize,
    /// Degenerate minimal samples that were redrawn.
    pub degenerate_samples: usize,
    pub stop_reason: StopReason,
}

impl<M> Default for RansacResult<M> {
    fn default() -> Self {
        Self {
            success: false,
            model: None,
            inliers: Vec::new(),
            best_inlier_count: 0,
            inlier_rms: f64::INFINITY,
            total_residual: f64::INFINITY,
            iters: 0,
            best_iter: 0,
            degenerate_samples: 0,
            stop_reason: StopReason::Exhausted,
        }
    }
}

/// Generic estimator for RANSAC-like methods.
///
/// All hooks are associated functions so trials can run on any thread
/// without shared estimator state.
pub trait Estimator {
    type Datum: Sync;
    type Model: Send;

    /// Minimal number of samples needed to estimate a model.
    const MIN_SAMPLES: usize;

    /// Fit a model from a subset of data indices.
    ///
    /// Return `None` if fitting fails; the trial then counts as unsuccessful.
    fn fit(data: &[Self::Datum], sample_indices: &[usize]) -> Option<Self::Model>;

    /// Non-negative residual of one datum, in the units of `opts.thresh`.
    fn residual(model: &Self::Model, datum: &Self::Datum) -> f64;

    /// Degenerate samples are redrawn inside the same trial.
    ///
    /// Default: assume non-degenerate.
    fn is_degenerate(_data: &[Self::Datum], _sample_indices: &[usize]) -> bool {
        false
    }

    /// Cheap consistency check run before [`fit`](Estimator::fit); a rejected
    /// sample consumes its trial.
    ///
    /// Default: accept everything.
    fn accept_sample(_data: &[Self::Datum], _sample_indices: &[usize]) -> bool {
        true
    }

    /// Optional refit on the full inlier set.
    ///
    /// Default: no refit; use the original model.
    fn refit(_data: &[Self::Datum], _inliers: &[usize]) -> Option<Self::Model> {
        None
    }
}

struct Trial<M> {
    model: M,
    inlier_count: usize,
    total_residual: f64,
}

fn rms(vals: &[f64]) -> f64 {
    if vals.is_empty() {
        return f64::INFINITY;
    }
    let ss: f64 = vals.iter().map(|&v| v * v).sum();
    (ss / (vals.len() as f64)).sqrt()
}

/// Adaptive trial bound `log(1 - p) / log(1 - w^m)`.
fn calculate_iterations(
    confidence: f64,
    inlier_ratio: f64,
    min_samples: usize,
    iters_so_far: usize,
    max_iters: usize,
) -> usize {
    if confidence <= 0.0 || inlier_ratio <= 0.0 {
        return max_iters;
    }

    let p = confidence.min(1.0 - 1e-12);
    let w = inlier_ratio.min(1.0);
    let m = min_samples as f64;

    let denom = (1.0 - w.powf(m)).max(1e-12).ln();
    if denom >= 0.0 {
        return max_iters;
    }

    let n_iter = ((1.0 - p).ln() / denom).ceil() as usize;
    n_iter.clamp(iters_so_far, max_iters)
}

/// More inliers wins; equal counts fall back to the lower residual sum.
fn is_better_model<M>(candidate: &Trial<M>, best: Option<&Trial<M>>) -> bool {
    let Some(best) = best else {
        return true;
    };
    candidate.inlier_count > best.inlier_count
        || (candidate.inlier_count == best.inlier_count
            && candidate.total_residual < best.total_residual)
}

fn collect_inliers<E: Estimator>(
    data: &[E::Datum],
    model: &E::Model,
    thresh: f64,
) -> (Vec<usize>, Vec<f64>) {
    let mut inliers = Vec::new();
    let mut residuals = Vec::new();
    for (i, datum) in data.iter().enumerate() {
        let r = E::residual(model, datum);
        if r <= thresh {
            inliers.push(i);
            residuals.push(r);
        }
    }
    (inliers, residuals)
}

/// Draw one minimal sample, redrawing degenerate ones.
///
/// Returns `None` when every attempt was degenerate.
fn draw_sample<E: Estimator>(
    data: &[E::Datum],
    all_indices: &[usize],
    rng: &mut StdRng,
    max_attempts: usize,
    degenerate: &mut usize,
) -> Option<Vec<usize>> {
    for _ in 0..max_attempts.max(1) {
        let sample: Vec<usize> = all_indices
            .choose_multiple(rng, E::MIN_SAMPLES)
            .copied()
            .collect();
        if !E::is_degenerate(data, &sample) {
            return Some(sample);
        }
        *degenerate += 1;
    }
    None
}

fn evaluate<E: Estimator>(data: &[E::Datum], sample: &[usize], thresh: f64) -> Option<Trial<E::Model>> {
    if !E::accept_sample(data, sample) {
        return None;
    }
    let model = E::fit(data, sample)?;
    let mut inlier_count = 0;
    let mut total_residual = 0.0;
    for datum in data {
        let r = E::residual(&model, datum);
        if r <= thresh {
            inlier_count += 1;
            total_residual += r;
        }
    }
    Some(Trial {
        model,
        inlier_count,
        total_residual,
    })
}

/// Run a bounded RANSAC loop for a given [`Estimator`] implementation.
///
/// If there is insufficient data or no candidate reaches
/// `opts.min_inliers` within the budget, the result has `success == false`.
pub fn ransac<E: Estimator>(data: &[E::Datum], opts: &RansacOptions) -> RansacResult<E::Model> {
    let mut result: RansacResult<E::Model> = RansacResult::default();

    if data.len() < E::MIN_SAMPLES || opts.max_iters == 0 {
        return result;
    }

    let started = Instant::now();
    let all_indices: Vec<usize> = (0..data.len()).collect();
    let mut rng = StdRng::seed_from_u64(opts.seed);
    let batch_size = opts.batch_size.max(1);

    let mut best: Option<Trial<E::Model>> = None;
    let mut best_iter = 0;
    let mut dynamic_max_iters = opts.max_iters;
    let mut num_iters = 0;
    let mut degenerate = 0;
    let mut stop_reason = StopReason::Exhausted;

    'trials: while num_iters < dynamic_max_iters {
        if let Some(budget) = opts.time_budget {
            if started.elapsed() >= budget {
                stop_reason = StopReason::TimeBudget;
                break;
            }
        }

        let batch_len = batch_size.min(dynamic_max_iters - num_iters);
        let samples: Vec<Option<Vec<usize>>> = (0..batch_len)
            .map(|_| {
                draw_sample::<E>(
                    data,
                    &all_indices,
                    &mut rng,
                    opts.max_resample_attempts,
                    &mut degenerate,
                )
            })
            .collect();

        let trials: Vec<Option<Trial<E::Model>>> = samples
            .par_iter()
            .map(|sample| {
                sample
                    .as_deref()
                    .and_then(|s| evaluate::<E>(data, s, opts.thresh))
            })
            .collect();

        for trial in trials {
            num_iters += 1;
            if let Some(trial) = trial {
                if is_better_model(&trial, best.as_ref()) {
                    let inlier_ratio = trial.inlier_count as f64 / data.len() as f64;
                    let accepted = trial.inlier_count >= opts.min_inliers;
                    best = Some(trial);
                    best_iter = num_iters;

                    if accepted {
                        if opts
                            .early_stop_inlier_ratio
                            .is_some_and(|r| inlier_ratio >= r)
                        {
                            stop_reason = StopReason::InlierRatio;
                            break 'trials;
                        }
                        dynamic_max_iters = calculate_iterations(
                            opts.confidence,
                            inlier_ratio,
                            E::MIN_SAMPLES,
                            num_iters,
                            opts.max_iters,
                        );
                    }
                }
            }
            if num_iters >= dynamic_max_iters {
                if dynamic_max_iters < opts.max_iters {
                    stop_reason = StopReason::Confidence;
                }
                break 'trials;
            }
        }
    }

    result.iters = num_iters;
    result.best_iter = best_iter;
    result.degenerate_samples = degenerate;
    result.stop_reason = stop_reason;

    let Some(best) = best else {
        debug!("ransac: no valid candidate after {num_iters} trials ({stop_reason:?})");
        return result;
    };
    result.best_inlier_count = best.inlier_count;
    if best.inlier_count < opts.min_inliers {
        debug!(
            "ransac: best candidate has {} inliers, {} required",
            best.inlier_count, opts.min_inliers
        );
        return result;
    }

    let (mut inliers, mut residuals) = collect_inliers::<E>(data, &best.model, opts.thresh);
    let mut model = best.model;

    if opts.refit_on_inliers {
        if let Some(refit) = E::refit(data, &inliers) {
            let (refit_inliers, refit_residuals) = collect_inliers::<E>(data, &refit, opts.thresh);
            if refit_inliers.len() >= opts.min_inliers {
                model = refit;
                inliers = refit_inliers;
                residuals = refit_residuals;
            }
        }
    }

    debug!(
        "ransac: {} inliers of {} after {} trials ({:?})",
        inliers.len(),
        data.len(),
        num_iters,
        stop_reason
    );

    result.success = true;
    result.model = Some(model);
    result.inlier_rms = rms(&residuals);
    result.total_residual = residuals.iter().sum();
    result.inliers = inliers;
    result
}
