//! Trajectory optimizer
//!
//! Owns the optimization vector (one control row per horizon step), the
//! registered residual blocks and the solver state. Typical use per
//! planning cycle:
//!
//! 1. [`Optimizer::set_optimization_vector`] with an initial guess
//! 2. optionally [`Optimizer::fix_optimization_vector`]
//! 3. one or more `add_*_functor` calls binding a model and its costs
//! 4. [`Optimizer::solve`], then [`Optimizer::result`] / [`Optimizer::trajectory`]
//!
//! Warm starting is a second `set_optimization_vector` with a previous result.

pub mod problem;
pub mod report;
pub mod solver;

pub use problem::{JacobianMode, Problem, ResidualBlock};
pub use report::{SolverReport, SolverWarning, TerminationReason};
pub use solver::{LevenbergMarquardt, SolverConfig};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use nalgebra::DMatrix;
use rayon::ThreadPoolBuilder;
use tracing::{error, info};

use crate::common::{
    CostFunctor, DynamicModel, Integrator, Parameters, RoboticsError, RoboticsResult,
};
use crate::dynamics::{
    SingleTrackConfig, SingleTrackModel, TripleIntegratorConfig, TripleIntegratorModel,
};

/// Lifecycle of an [`Optimizer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerState {
    Configured,
    Solving,
    Solved,
    Failed,
}

pub struct Optimizer {
    config: SolverConfig,
    optimization_vector: Option<DMatrix<f64>>,
    fixed_rows: Vec<bool>,
    blocks: Vec<ResidualBlock>,
    state: OptimizerState,
    result: Option<DMatrix<f64>>,
    report: Option<SolverReport>,
    cancel: Arc<AtomicBool>,
}

impl Optimizer {
    pub fn new(params: &Parameters) -> Self {
        Self::with_config(SolverConfig::from_params(params))
    }

    pub fn with_config(config: SolverConfig) -> Self {
        Self {
            config,
            optimization_vector: None,
            fixed_rows: Vec::new(),
            blocks: Vec::new(),
            state: OptimizerState::Configured,
            result: None,
            report: None,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn state(&self) -> OptimizerState {
        self.state
    }

    /// Install the initial guess, clearing fixed rows and any previous result
    pub fn set_optimization_vector(&mut self, vector: DMatrix<f64>) -> RoboticsResult<()> {
        if vector.nrows() == 0 {
            return Err(RoboticsError::dimension("optimization vector rows", 1, vector.nrows()));
        }
        if vector.ncols() == 0 {
            return Err(RoboticsError::dimension("optimization vector columns", 1, vector.ncols()));
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(RoboticsError::InvalidParameter(
                "optimization vector must be finite".to_string(),
            ));
        }
        if let Some(block) = self.blocks.first() {
            let shape = block.shape();
            if vector.ncols() != shape.control_dim {
                return Err(RoboticsError::dimension(
                    "control columns",
                    shape.control_dim,
                    vector.ncols(),
                ));
            }
            if vector.nrows() != shape.control_rows {
                return Err(RoboticsError::dimension(
                    "control rows",
                    shape.control_rows,
                    vector.nrows(),
                ));
            }
        }

        self.fixed_rows = vec![false; vector.nrows()];
        self.optimization_vector = Some(vector);
        self.invalidate();
        Ok(())
    }

    pub fn optimization_vector(&self) -> Option<&DMatrix<f64>> {
        self.optimization_vector.as_ref()
    }

    /// Hold rows `start..start + count` constant during the solve.
    ///
    /// Fixed rows still drive the rollout and every cost. Calls accumulate.
    pub fn fix_optimization_vector(&mut self, start: usize, count: usize) -> RoboticsResult<()> {
        let rows = self.require_vector()?.nrows();
        let end = start.checked_add(count).filter(|&end| end <= rows).ok_or(
            RoboticsError::DimensionMismatch {
                what: "fixed row range end",
                expected: rows,
                actual: start.saturating_add(count),
            },
        )?;
        self.fixed_rows[start..end].iter_mut().for_each(|f| *f = true);
        self.invalidate();
        Ok(())
    }

    pub fn num_fixed_rows(&self) -> usize {
        self.fixed_rows.iter().filter(|&&f| f).count()
    }

    /// Single-track model with central-difference Jacobians. The integration
    /// scheme follows [`crate::common::keys::INTEGRATOR`].
    pub fn add_single_track_functor(
        &mut self,
        initial_states: DMatrix<f64>,
        params: &Parameters,
        costs: Vec<Arc<dyn CostFunctor>>,
    ) -> RoboticsResult<()> {
        let model = Arc::new(SingleTrackModel::from_params(params));
        self.add_functor(model, initial_states, costs, JacobianMode::Central)
    }

    /// Single-track model with forward-difference Jacobians and the explicit update
    pub fn add_fast_single_track_functor(
        &mut self,
        initial_states: DMatrix<f64>,
        params: &Parameters,
        costs: Vec<Arc<dyn CostFunctor>>,
    ) -> RoboticsResult<()> {
        let config = SingleTrackConfig::from_params(params).with_integrator(Integrator::Explicit);
        let model = Arc::new(SingleTrackModel::new(config));
        self.add_functor(model, initial_states, costs, JacobianMode::Forward)
    }

    /// Triple-integrator model with central-difference Jacobians. The
    /// integration scheme follows [`crate::common::keys::INTEGRATOR`].
    pub fn add_triple_int_functor(
        &mut self,
        initial_states: DMatrix<f64>,
        params: &Parameters,
        costs: Vec<Arc<dyn CostFunctor>>,
    ) -> RoboticsResult<()> {
        let model = Arc::new(TripleIntegratorModel::from_params(params));
        self.add_functor(model, initial_states, costs, JacobianMode::Central)
    }

    /// Triple-integrator model with forward-difference Jacobians and the explicit update
    pub fn add_fast_triple_int_functor(
        &mut self,
        initial_states: DMatrix<f64>,
        params: &Parameters,
        costs: Vec<Arc<dyn CostFunctor>>,
    ) -> RoboticsResult<()> {
        let config =
            TripleIntegratorConfig::from_params(params).with_integrator(Integrator::Explicit);
        let model = Arc::new(TripleIntegratorModel::new(config));
        self.add_functor(model, initial_states, costs, JacobianMode::Forward)
    }

    /// Bind any dynamics model and its costs into one residual block.
    ///
    /// Requires the optimization vector; widths are validated here.
    pub fn add_functor(
        &mut self,
        model: Arc<dyn DynamicModel>,
        initial_states: DMatrix<f64>,
        costs: Vec<Arc<dyn CostFunctor>>,
        mode: JacobianMode,
    ) -> RoboticsResult<()> {
        let (rows, cols) = self.require_vector()?.shape();
        if cols != model.control_dim() {
            return Err(RoboticsError::dimension("control columns", model.control_dim(), cols));
        }
        let block = ResidualBlock::new(model, initial_states, rows, costs, mode)?;
        self.blocks.push(block);
        self.invalidate();
        Ok(())
    }

    pub fn num_residual_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Flag checked between iterations; setting it aborts the running solve
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Run the solve to convergence or iteration cap.
    ///
    /// On success the result and report become available. On error the
    /// optimizer is left in [`OptimizerState::Failed`] with no result.
    pub fn solve(&mut self) -> RoboticsResult<&SolverReport> {
        self.config.validate()?;
        let template = self.require_vector()?.clone();
        if self.blocks.is_empty() {
            return Err(RoboticsError::InvalidParameter(
                "no functor registered".to_string(),
            ));
        }

        self.state = OptimizerState::Solving;
        self.result = None;
        self.report = None;

        match self.run(&template) {
            Ok((result, report)) => {
                info!(
                    iterations = report.iterations,
                    initial_cost = report.initial_cost,
                    final_cost = report.final_cost,
                    termination = %report.termination,
                    "solve finished"
                );
                self.state = OptimizerState::Solved;
                self.result = Some(result);
                Ok(self.report.insert(report))
            }
            Err(e) => {
                error!(error = %e, "solve failed");
                if matches!(e, RoboticsError::Cancelled) {
                    self.cancel.store(false, Ordering::Relaxed);
                }
                self.state = OptimizerState::Failed;
                Err(e)
            }
        }
    }

    fn run(&self, template: &DMatrix<f64>) -> RoboticsResult<(DMatrix<f64>, SolverReport)> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.config.num_threads)
            .build()
            .map_err(|e| RoboticsError::InvalidParameter(e.to_string()))?;

        let problem = Problem::new(&self.blocks, template, &self.fixed_rows);
        info!(
            blocks = self.blocks.len(),
            residuals = problem.num_residuals(),
            parameters = problem.num_parameters(),
            threads = self.config.num_threads,
            "starting solve"
        );

        let solver = LevenbergMarquardt::new(&self.config, &pool, &self.cancel);
        let (x, mut report) = solver.minimize(&problem)?;
        report.num_fixed_parameters = template.len() - problem.num_parameters();
        Ok((problem.controls(&x), report))
    }

    /// Solved optimization vector
    pub fn result(&self) -> RoboticsResult<&DMatrix<f64>> {
        self.result.as_ref().ok_or(RoboticsError::NotSolved)
    }

    pub fn report(&self) -> RoboticsResult<&SolverReport> {
        self.report.as_ref().ok_or(RoboticsError::NotSolved)
    }

    /// Rollout of the solved optimization vector through the first block
    pub fn trajectory(&self) -> RoboticsResult<DMatrix<f64>> {
        let result = self.result()?;
        let block = self.blocks.first().ok_or(RoboticsError::NotSolved)?;
        block.rollout(result)
    }

    /// Rollouts of the solved optimization vector through every block
    pub fn trajectories(&self) -> RoboticsResult<Vec<DMatrix<f64>>> {
        let result = self.result()?;
        self.blocks.iter().map(|b| b.rollout(result)).collect()
    }

    /// Squared cost per functor of the first block at the solution
    pub fn cost_breakdown(&self) -> RoboticsResult<Vec<(&'static str, f64)>> {
        let result = self.result()?;
        let block = self.blocks.first().ok_or(RoboticsError::NotSolved)?;
        block.cost_breakdown(result)
    }

    /// Drop any previous result after the problem changed
    fn invalidate(&mut self) {
        self.result = None;
        self.report = None;
        self.state = OptimizerState::Configured;
    }

    fn require_vector(&self) -> RoboticsResult<&DMatrix<f64>> {
        self.optimization_vector.as_ref().ok_or_else(|| {
            RoboticsError::InvalidParameter("optimization vector not set".to_string())
        })
    }
}
