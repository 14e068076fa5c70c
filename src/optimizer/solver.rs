//! Levenberg-Marquardt minimization of stacked residuals
//!
//! Each iteration solves `(JᵀJ + λD) δ = -Jᵀr` by Cholesky, where `D` is the
//! floored diagonal of `JᵀJ`. The damping `λ` follows Nielsen's update on
//! accepted steps and doubles its growth factor on rejected ones.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use nalgebra::{Cholesky, DVector};
use rayon::ThreadPool;
use tracing::{debug, info, trace, warn};

use crate::common::{keys, Parameters, RoboticsError, RoboticsResult};
use crate::optimizer::problem::Problem;
use crate::optimizer::report::{SolverReport, SolverWarning, TerminationReason};

/// Floor of the Marquardt scaling diagonal
const MIN_DIAGONAL: f64 = 1e-6;
/// Damping beyond which a non-factorizable system is reported as singular
const MAX_DAMPING: f64 = 1e16;

/// Solver configuration
#[derive(Debug, Clone)]
pub struct SolverConfig {
    pub max_num_iterations: usize,
    pub function_tolerance: f64,
    pub gradient_tolerance: f64,
    pub parameter_tolerance: f64,
    pub max_num_consecutive_invalid_steps: usize,
    pub initial_damping: f64,
    /// Threads used for Jacobian evaluation
    pub num_threads: usize,
    /// Log every iteration at info level instead of debug
    pub minimizer_progress_to_stdout: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_num_iterations: 4000,
            function_tolerance: 1e-12,
            gradient_tolerance: 1e-10,
            parameter_tolerance: 1e-8,
            max_num_consecutive_invalid_steps: 200,
            initial_damping: 1e-4,
            num_threads: 1,
            minimizer_progress_to_stdout: false,
        }
    }
}

impl SolverConfig {
    pub fn from_params(params: &Parameters) -> Self {
        let d = Self::default();
        Self {
            max_num_iterations: params.get_usize(keys::MAX_NUM_ITERATIONS, d.max_num_iterations),
            function_tolerance: params.get(keys::FUNCTION_TOLERANCE, d.function_tolerance),
            gradient_tolerance: params.get(keys::GRADIENT_TOLERANCE, d.gradient_tolerance),
            parameter_tolerance: params.get(keys::PARAMETER_TOLERANCE, d.parameter_tolerance),
            max_num_consecutive_invalid_steps: params.get_usize(
                keys::MAX_NUM_CONSECUTIVE_INVALID_STEPS,
                d.max_num_consecutive_invalid_steps,
            ),
            initial_damping: params.get(keys::INITIAL_DAMPING, d.initial_damping),
            num_threads: params.get_usize(keys::NUM_THREADS, d.num_threads).max(1),
            minimizer_progress_to_stdout: params
                .get_bool(keys::MINIMIZER_PROGRESS_TO_STDOUT, d.minimizer_progress_to_stdout),
        }
    }

    pub fn validate(&self) -> RoboticsResult<()> {
        let positive = [
            ("function_tolerance", self.function_tolerance),
            ("gradient_tolerance", self.gradient_tolerance),
            ("parameter_tolerance", self.parameter_tolerance),
            ("initial_damping", self.initial_damping),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value >= 0.0) {
                return Err(RoboticsError::InvalidParameter(format!(
                    "{} must be finite and non-negative, got {}",
                    name, value
                )));
            }
        }
        if self.initial_damping == 0.0 {
            return Err(RoboticsError::InvalidParameter(
                "initial_damping must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Outcome of a rejected or invalid step
enum Setback {
    Rejected,
    Invalid,
}

pub struct LevenbergMarquardt<'a> {
    config: &'a SolverConfig,
    pool: &'a ThreadPool,
    cancel: &'a AtomicBool,
}

impl<'a> LevenbergMarquardt<'a> {
    pub fn new(config: &'a SolverConfig, pool: &'a ThreadPool, cancel: &'a AtomicBool) -> Self {
        Self {
            config,
            pool,
            cancel,
        }
    }

    fn log_iteration(&self, iteration: usize, cost: f64, lambda: f64, step_norm: f64) {
        if self.config.minimizer_progress_to_stdout {
            info!(iteration, cost, lambda, step_norm, "accepted step");
        } else {
            debug!(iteration, cost, lambda, step_norm, "accepted step");
        }
    }

    /// Minimize the summed squared residuals of `problem` from its template.
    ///
    /// Returns the best accepted iterate. Reaching `max_num_iterations`
    /// attaches a [`SolverWarning::NonConvergence`] instead of failing.
    pub fn minimize(&self, problem: &Problem<'_>) -> RoboticsResult<(DVector<f64>, SolverReport)> {
        let start = Instant::now();
        let config = self.config;
        let n = problem.num_parameters();

        let mut x = problem.initial_parameters();
        let mut r = problem.residuals(&x)?;
        let mut cost = r.norm_squared();
        if !cost.is_finite() {
            return Err(RoboticsError::SingularSystem(
                "initial residuals are not finite".to_string(),
            ));
        }
        let initial_cost = cost;

        let mut lambda = config.initial_damping;
        let mut growth = 2.0;
        let mut iterations = 0;
        let mut successful_steps = 0;
        let mut unsuccessful_steps = 0;
        let mut consecutive_invalid = 0;
        let mut termination = TerminationReason::MaxIterations;

        // cached linearization, refreshed after each accepted step
        let mut normal = None;

        while iterations < config.max_num_iterations {
            if self.cancel.load(Ordering::Relaxed) {
                return Err(RoboticsError::Cancelled);
            }
            if n == 0 {
                termination = TerminationReason::GradientTolerance;
                break;
            }
            iterations += 1;

            let (hessian, gradient) = match normal.take() {
                Some(cached) => cached,
                None => {
                    let jacobian = self.pool.install(|| problem.jacobian(&x, &r))?;
                    (jacobian.tr_mul(&jacobian), jacobian.tr_mul(&r))
                }
            };

            if gradient.amax() <= config.gradient_tolerance {
                termination = TerminationReason::GradientTolerance;
                break;
            }

            let diagonal = hessian.diagonal().map(|d| d.max(MIN_DIAGONAL));
            let mut damped = hessian.clone();
            for i in 0..n {
                damped[(i, i)] += lambda * diagonal[i];
            }

            let outcome = match Cholesky::new(damped) {
                None => Err(Setback::Invalid),
                Some(factor) => {
                    let step = factor.solve(&(-&gradient));
                    if step.norm() <= config.parameter_tolerance * (x.norm() + config.parameter_tolerance) {
                        termination = TerminationReason::ParameterTolerance;
                        break;
                    }

                    let candidate = &x + &step;
                    let candidate_r = problem.residuals(&candidate)?;
                    let candidate_cost = candidate_r.norm_squared();

                    let predicted = -gradient.dot(&step)
                        + lambda * step.component_mul(&step).dot(&diagonal);
                    let actual = cost - candidate_cost;

                    if !candidate_cost.is_finite() {
                        Err(Setback::Invalid)
                    } else if predicted > 0.0 && actual > 0.0 {
                        let rho = actual / predicted;
                        let relative = actual / cost;
                        x = candidate;
                        r = candidate_r;
                        cost = candidate_cost;
                        lambda *= (1.0 - (2.0 * rho - 1.0).powi(3)).max(1.0 / 3.0);
                        growth = 2.0;
                        self.log_iteration(iterations, cost, lambda, step.norm());
                        Ok(relative)
                    } else {
                        Err(Setback::Rejected)
                    }
                }
            };

            match outcome {
                Ok(relative) => {
                    successful_steps += 1;
                    consecutive_invalid = 0;
                    if relative <= config.function_tolerance {
                        termination = TerminationReason::FunctionTolerance;
                        break;
                    }
                }
                Err(setback) => {
                    unsuccessful_steps += 1;
                    if matches!(setback, Setback::Invalid) {
                        consecutive_invalid += 1;
                    }
                    trace!(iteration = iterations, lambda, "step rejected");
                    lambda *= growth;
                    growth *= 2.0;
                    normal = Some((hessian, gradient));

                    if lambda > MAX_DAMPING && matches!(setback, Setback::Invalid) {
                        return Err(RoboticsError::SingularSystem(format!(
                            "normal equations not factorizable at damping {:.3e}",
                            lambda
                        )));
                    }
                    if consecutive_invalid > config.max_num_consecutive_invalid_steps {
                        termination = TerminationReason::NoProgress;
                        break;
                    }
                }
            }
        }

        let mut warnings = Vec::new();
        if !termination.is_converged() {
            warn!(
                iterations,
                final_cost = cost,
                reason = %termination,
                "solver stopped without convergence"
            );
            warnings.push(SolverWarning::NonConvergence {
                iterations,
                final_cost: cost,
            });
        }

        let report = SolverReport {
            iterations,
            successful_steps,
            unsuccessful_steps,
            initial_cost,
            final_cost: cost,
            termination,
            warnings,
            num_residuals: problem.num_residuals(),
            num_parameters: n,
            num_fixed_parameters: 0,
            duration: start.elapsed(),
        };
        Ok((x, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_params() {
        let params = Parameters::new()
            .with(keys::MAX_NUM_ITERATIONS, 1000.0)
            .with(keys::FUNCTION_TOLERANCE, 1e-8)
            .with(keys::NUM_THREADS, 0.0);
        let config = SolverConfig::from_params(&params);
        assert_eq!(config.max_num_iterations, 1000);
        assert_eq!(config.function_tolerance, 1e-8);
        assert_eq!(config.num_threads, 1);
        assert_eq!(config.max_num_consecutive_invalid_steps, 200);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let config = SolverConfig {
            initial_damping: 0.0,
            ..SolverConfig::default()
        };
        assert!(config.validate().is_err());

        let config = SolverConfig {
            function_tolerance: f64::NAN,
            ..SolverConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
