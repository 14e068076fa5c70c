//! Solver diagnostics

use std::fmt;
use std::time::Duration;

/// Why the solve loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// Relative cost decrease fell below `function_tolerance`
    FunctionTolerance,
    /// Largest gradient component fell below `gradient_tolerance`
    GradientTolerance,
    /// Step norm fell below `parameter_tolerance` relative to the iterate
    ParameterTolerance,
    /// `max_num_iterations` reached
    MaxIterations,
    /// More than `max_num_consecutive_invalid_steps` invalid steps in a row
    NoProgress,
}

impl TerminationReason {
    /// Whether a convergence criterion was met
    pub fn is_converged(&self) -> bool {
        matches!(
            self,
            TerminationReason::FunctionTolerance
                | TerminationReason::GradientTolerance
                | TerminationReason::ParameterTolerance
        )
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TerminationReason::FunctionTolerance => "function tolerance reached",
            TerminationReason::GradientTolerance => "gradient tolerance reached",
            TerminationReason::ParameterTolerance => "parameter tolerance reached",
            TerminationReason::MaxIterations => "maximum number of iterations reached",
            TerminationReason::NoProgress => "too many consecutive invalid steps",
        };
        write!(f, "{}", s)
    }
}

/// Non-fatal conditions attached to a successful solve
#[derive(Debug, Clone, PartialEq)]
pub enum SolverWarning {
    /// Stopped without meeting a tolerance, the best iterate is returned
    NonConvergence { iterations: usize, final_cost: f64 },
}

impl fmt::Display for SolverWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverWarning::NonConvergence {
                iterations,
                final_cost,
            } => write!(
                f,
                "no convergence after {} iterations (cost {:.6e})",
                iterations, final_cost
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SolverReport {
    pub iterations: usize,
    pub successful_steps: usize,
    pub unsuccessful_steps: usize,
    /// Sum of squared weighted residuals at the initial guess
    pub initial_cost: f64,
    /// Sum of squared weighted residuals at the returned iterate
    pub final_cost: f64,
    pub termination: TerminationReason,
    pub warnings: Vec<SolverWarning>,
    pub num_residuals: usize,
    pub num_parameters: usize,
    pub num_fixed_parameters: usize,
    pub duration: Duration,
}

impl SolverReport {
    pub fn is_converged(&self) -> bool {
        self.termination.is_converged()
    }
}

impl fmt::Display for SolverReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Levenberg-Marquardt: {} residuals, {} parameters ({} fixed)",
            self.num_residuals, self.num_parameters, self.num_fixed_parameters
        )?;
        writeln!(
            f,
            "  iterations: {} ({} successful, {} unsuccessful)",
            self.iterations, self.successful_steps, self.unsuccessful_steps
        )?;
        writeln!(
            f,
            "  cost: {:.6e} -> {:.6e}",
            self.initial_cost, self.final_cost
        )?;
        for warning in &self.warnings {
            writeln!(f, "  warning: {}", warning)?;
        }
        write!(
            f,
            "  termination: {} in {:.3} ms",
            self.termination,
            self.duration.as_secs_f64() * 1e3
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_display() {
        let report = SolverReport {
            iterations: 3,
            successful_steps: 2,
            unsuccessful_steps: 1,
            initial_cost: 10.0,
            final_cost: 0.5,
            termination: TerminationReason::MaxIterations,
            warnings: vec![SolverWarning::NonConvergence {
                iterations: 3,
                final_cost: 0.5,
            }],
            num_residuals: 4,
            num_parameters: 2,
            num_fixed_parameters: 0,
            duration: Duration::from_millis(2),
        };
        let text = format!("{}", report);
        assert!(text.contains("iterations: 3 (2 successful, 1 unsuccessful)"));
        assert!(text.contains("warning: no convergence after 3 iterations"));
        assert!(text.contains("maximum number of iterations reached"));
        assert!(!report.is_converged());
    }
}
