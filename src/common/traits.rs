//! Common traits defining the seams between dynamics, costs and the optimizer

use nalgebra::{DMatrix, DVector};

use crate::common::error::RoboticsResult;
use crate::common::types::*;

/// Discrete-time vehicle dynamics.
///
/// Implementations supply the continuous derivative and a closed-form
/// explicit update; [`DynamicModel::step`] dispatches on the configured
/// [`Integrator`].
pub trait DynamicModel: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &'static str;

    fn state_dim(&self) -> usize;

    fn control_dim(&self) -> usize;

    /// Time step [s]
    fn dt(&self) -> f64;

    fn layout(&self) -> StateLayout;

    fn integrator(&self) -> Integrator;

    /// Continuous-time state derivative `f(state, control)`
    fn derivative(&self, state: &DVector<f64>, control: &DVector<f64>) -> DVector<f64>;

    /// Closed-form one-step update at `dt`
    fn explicit_step(&self, state: &DVector<f64>, control: &DVector<f64>) -> DVector<f64>;

    /// Control that maps `prev` onto `next` in one explicit step, used to
    /// anchor derivative costs to the seed window
    fn estimate_control(&self, prev: &DVector<f64>, next: &DVector<f64>) -> DVector<f64>;

    /// Advance `state` by one time step under `control`
    fn step(&self, state: &DVector<f64>, control: &DVector<f64>) -> DVector<f64> {
        match self.integrator() {
            Integrator::Explicit => self.explicit_step(state, control),
            Integrator::RungeKutta4 => {
                crate::dynamics::rk4(|s| self.derivative(s, control), state, self.dt())
            }
        }
    }

    /// Forward-simulate `controls` from the seed window
    fn rollout(
        &self,
        initial_states: &DMatrix<f64>,
        controls: &DMatrix<f64>,
    ) -> RoboticsResult<DMatrix<f64>> {
        crate::dynamics::rollout(self, initial_states, controls)
    }
}

/// A weighted block of least-squares residuals.
///
/// `evaluate` writes raw residuals; the weighted variant scales them by
/// `sqrt(weight)` so that their summed squares equal `weight * raw_cost`.
pub trait CostFunctor: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &'static str;

    fn weight(&self) -> f64;

    /// Check compatibility with the model before any iteration runs
    fn validate(&self, _model: &dyn DynamicModel) -> RoboticsResult<()> {
        Ok(())
    }

    /// Residual count for a block of the given shape
    fn num_residuals(&self, shape: &ProblemShape) -> usize;

    /// Write unweighted residuals into `out`, whose length is `num_residuals`
    fn evaluate(&self, ctx: &CostContext<'_>, out: &mut [f64]) -> RoboticsResult<()>;

    fn evaluate_weighted(&self, ctx: &CostContext<'_>, out: &mut [f64]) -> RoboticsResult<()> {
        self.evaluate(ctx, out)?;
        let scale = self.weight().sqrt();
        out.iter_mut().for_each(|r| *r *= scale);
        Ok(())
    }

    /// Weighted residual vector
    fn residuals(&self, ctx: &CostContext<'_>) -> RoboticsResult<DVector<f64>> {
        let mut out = DVector::zeros(self.num_residuals(&ctx.shape()));
        self.evaluate_weighted(ctx, out.as_mut_slice())?;
        Ok(out)
    }
}
