//! Residual blocks and the composite least-squares problem
//!
//! A [`ResidualBlock`] binds one dynamics model, its seed window and a list
//! of cost functors. A [`Problem`] stacks all blocks over the free entries of
//! the optimization vector and computes numerical Jacobians column by column.

use std::ops::Range;
use std::sync::Arc;

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

use crate::common::{
    CostContext, CostFunctor, DynamicModel, ProblemShape, RoboticsError, RoboticsResult,
};
use crate::dynamics::{check_shapes, estimate_prior_controls};

/// Relative step of forward differences, about `sqrt(f64::EPSILON)`
const FORWARD_STEP: f64 = 1.5e-8;
/// Relative step of central differences, about `cbrt(f64::EPSILON)`
const CENTRAL_STEP: f64 = 6.0e-6;

/// Finite-difference scheme of a residual block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JacobianMode {
    /// Two evaluations per column, second-order accurate
    #[default]
    Central,
    /// One evaluation per column
    Forward,
}

pub struct ResidualBlock {
    model: Arc<dyn DynamicModel>,
    initial_states: DMatrix<f64>,
    prior_controls: DMatrix<f64>,
    costs: Vec<Arc<dyn CostFunctor>>,
    /// Start of each cost's residuals, plus the total
    offsets: Vec<usize>,
    shape: ProblemShape,
    mode: JacobianMode,
}

impl ResidualBlock {
    /// Validate and bind a block for controls of `control_rows` rows
    pub fn new(
        model: Arc<dyn DynamicModel>,
        initial_states: DMatrix<f64>,
        control_rows: usize,
        costs: Vec<Arc<dyn CostFunctor>>,
        mode: JacobianMode,
    ) -> RoboticsResult<Self> {
        let controls = DMatrix::zeros(control_rows, model.control_dim());
        check_shapes(model.as_ref(), &initial_states, &controls)?;
        if initial_states.iter().any(|v| !v.is_finite()) {
            return Err(RoboticsError::InvalidParameter(
                "initial states must be finite".to_string(),
            ));
        }
        for cost in &costs {
            cost.validate(model.as_ref())?;
        }

        let prior_controls = estimate_prior_controls(model.as_ref(), &initial_states);
        let seed_rows = initial_states.nrows();
        let shape = ProblemShape {
            seed_rows,
            trajectory_rows: seed_rows + control_rows - 1,
            control_rows,
            prior_rows: prior_controls.nrows(),
            state_dim: model.state_dim(),
            control_dim: model.control_dim(),
        };

        let mut offsets = Vec::with_capacity(costs.len() + 1);
        let mut total = 0;
        offsets.push(total);
        for cost in &costs {
            total += cost.num_residuals(&shape);
            offsets.push(total);
        }

        Ok(Self {
            model,
            initial_states,
            prior_controls,
            costs,
            offsets,
            shape,
            mode,
        })
    }

    pub fn model(&self) -> &dyn DynamicModel {
        self.model.as_ref()
    }

    pub fn shape(&self) -> ProblemShape {
        self.shape
    }

    pub fn mode(&self) -> JacobianMode {
        self.mode
    }

    pub fn num_residuals(&self) -> usize {
        self.offsets[self.costs.len()]
    }

    pub fn rollout(&self, controls: &DMatrix<f64>) -> RoboticsResult<DMatrix<f64>> {
        self.model.rollout(&self.initial_states, controls)
    }

    /// Weighted residuals of every cost, concatenated in registration order
    pub fn evaluate(&self, controls: &DMatrix<f64>, out: &mut [f64]) -> RoboticsResult<()> {
        let trajectory = self.rollout(controls)?;
        let ctx = CostContext {
            trajectory: &trajectory,
            controls,
            prior_controls: &self.prior_controls,
            seed_rows: self.shape.seed_rows,
            dt: self.model.dt(),
            layout: self.model.layout(),
        };
        for (i, cost) in self.costs.iter().enumerate() {
            cost.evaluate_weighted(&ctx, &mut out[self.offsets[i]..self.offsets[i + 1]])?;
        }
        Ok(())
    }

    /// Squared cost of each functor at `controls`
    pub fn cost_breakdown(&self, controls: &DMatrix<f64>) -> RoboticsResult<Vec<(&'static str, f64)>> {
        let mut residuals = vec![0.0; self.num_residuals()];
        self.evaluate(controls, &mut residuals)?;
        Ok(self
            .costs
            .iter()
            .enumerate()
            .map(|(i, cost)| {
                let block = &residuals[self.offsets[i]..self.offsets[i + 1]];
                (cost.name(), block.iter().map(|r| r * r).sum())
            })
            .collect())
    }
}

/// Stacked residual blocks over the free entries of the optimization vector
pub struct Problem<'a> {
    blocks: &'a [ResidualBlock],
    template: &'a DMatrix<f64>,
    /// `(row, col)` of every free entry, row-major
    free: Vec<(usize, usize)>,
    ranges: Vec<Range<usize>>,
    num_residuals: usize,
}

impl<'a> Problem<'a> {
    /// Rows flagged in `fixed_rows` keep their `template` values
    pub fn new(blocks: &'a [ResidualBlock], template: &'a DMatrix<f64>, fixed_rows: &[bool]) -> Self {
        let free = (0..template.nrows())
            .filter(|&row| !fixed_rows.get(row).copied().unwrap_or(false))
            .flat_map(|row| (0..template.ncols()).map(move |col| (row, col)))
            .collect();

        let mut ranges = Vec::with_capacity(blocks.len());
        let mut start = 0;
        for block in blocks {
            let end = start + block.num_residuals();
            ranges.push(start..end);
            start = end;
        }

        Self {
            blocks,
            template,
            free,
            ranges,
            num_residuals: start,
        }
    }

    pub fn num_parameters(&self) -> usize {
        self.free.len()
    }

    pub fn num_residuals(&self) -> usize {
        self.num_residuals
    }

    pub fn initial_parameters(&self) -> DVector<f64> {
        DVector::from_iterator(
            self.free.len(),
            self.free.iter().map(|&(row, col)| self.template[(row, col)]),
        )
    }

    /// Full optimization vector with free entries taken from `x`
    pub fn controls(&self, x: &DVector<f64>) -> DMatrix<f64> {
        let mut controls = self.template.clone();
        for (&(row, col), value) in self.free.iter().zip(x.iter()) {
            controls[(row, col)] = *value;
        }
        controls
    }

    fn perturbed(&self, x: &DVector<f64>, j: usize, value: f64) -> DMatrix<f64> {
        let mut controls = self.controls(x);
        let (row, col) = self.free[j];
        controls[(row, col)] = value;
        controls
    }

    pub fn residuals(&self, x: &DVector<f64>) -> RoboticsResult<DVector<f64>> {
        let controls = self.controls(x);
        let mut out = DVector::zeros(self.num_residuals);
        for (block, range) in self.blocks.iter().zip(&self.ranges) {
            block.evaluate(&controls, &mut out.as_mut_slice()[range.clone()])?;
        }
        Ok(out)
    }

    fn jacobian_column(&self, x: &DVector<f64>, r0: &DVector<f64>, j: usize) -> RoboticsResult<Vec<f64>> {
        let scale = x[j].abs().max(1.0);
        let mut column = vec![0.0; self.num_residuals];

        for (block, range) in self.blocks.iter().zip(&self.ranges) {
            let out = &mut column[range.clone()];
            match block.mode() {
                JacobianMode::Forward => {
                    let plus = x[j] + FORWARD_STEP * scale;
                    let h = plus - x[j];
                    block.evaluate(&self.perturbed(x, j, plus), out)?;
                    for (c, r) in out.iter_mut().zip(&r0.as_slice()[range.clone()]) {
                        *c = (*c - r) / h;
                    }
                }
                JacobianMode::Central => {
                    let plus = x[j] + CENTRAL_STEP * scale;
                    let minus = x[j] - CENTRAL_STEP * scale;
                    let mut lower = vec![0.0; out.len()];
                    block.evaluate(&self.perturbed(x, j, plus), out)?;
                    block.evaluate(&self.perturbed(x, j, minus), &mut lower)?;
                    for (c, l) in out.iter_mut().zip(&lower) {
                        *c = (*c - l) / (plus - minus);
                    }
                }
            }
        }
        Ok(column)
    }

    /// Numerical Jacobian at `x`, where `r0` are the residuals at `x`.
    ///
    /// Columns are evaluated in parallel on the current rayon pool and
    /// assembled in index order.
    pub fn jacobian(&self, x: &DVector<f64>, r0: &DVector<f64>) -> RoboticsResult<DMatrix<f64>> {
        let columns = (0..self.free.len())
            .into_par_iter()
            .map(|j| self.jacobian_column(x, r0, j))
            .collect::<RoboticsResult<Vec<_>>>()?;
        Ok(DMatrix::from_fn(self.num_residuals, columns.len(), |i, j| columns[j][i]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Parameters;
    use crate::costs::{InputCost, SpeedCost};
    use crate::dynamics::SingleTrackModel;
    use approx::assert_relative_eq;

    fn block(mode: JacobianMode) -> ResidualBlock {
        let params = Parameters::new();
        let seeds = DMatrix::from_row_slice(1, 4, &[0.0, 0.0, 0.0, 5.0]);
        let costs: Vec<Arc<dyn CostFunctor>> = vec![
            Arc::new(SpeedCost::new(&params, 6.0).with_weight(1.0)),
            Arc::new(
                InputCost::from_slices(&params, &[-0.2, -1.0], &[0.2, 1.0])
                    .unwrap()
                    .with_weight(1.0),
            ),
        ];
        ResidualBlock::new(Arc::new(SingleTrackModel::with_defaults()), seeds, 4, costs, mode)
            .unwrap()
    }

    #[test]
    fn test_block_layout() {
        let block = block(JacobianMode::Central);
        assert_eq!(block.shape().trajectory_rows, 4);
        // 4 speed rows plus 4 x 2 control entries
        assert_eq!(block.num_residuals(), 12);

        let breakdown = block.cost_breakdown(&DMatrix::zeros(4, 2)).unwrap();
        assert_eq!(breakdown[0].0, "speed");
        assert_relative_eq!(breakdown[0].1, 4.0);
        assert_eq!(breakdown[1].1, 0.0);
    }

    #[test]
    fn test_fixed_rows_are_not_free() {
        let blocks = vec![block(JacobianMode::Central)];
        let template = DMatrix::from_fn(4, 2, |r, c| (r * 2 + c) as f64 * 0.01);
        let problem = Problem::new(&blocks, &template, &[true, false, true, false]);
        assert_eq!(problem.num_parameters(), 4);

        let x = problem.initial_parameters();
        assert_eq!(x.as_slice(), &[0.02, 0.03, 0.06, 0.07]);
        assert_eq!(problem.controls(&x), template);
    }

    #[test]
    fn test_jacobian_matches_analytic() {
        for mode in [JacobianMode::Central, JacobianMode::Forward] {
            let blocks = vec![block(mode)];
            let template = DMatrix::zeros(4, 2);
            let problem = Problem::new(&blocks, &template, &[]);
            let x = problem.initial_parameters();
            let r0 = problem.residuals(&x).unwrap();
            let jac = problem.jacobian(&x, &r0).unwrap();
            assert_eq!(jac.shape(), (12, 8));

            // speed at row 2 depends on the acceleration of rows 0 and 1 by dt
            assert_relative_eq!(jac[(2, 1)], 0.1, epsilon = 1e-6);
            assert_relative_eq!(jac[(2, 3)], 0.1, epsilon = 1e-6);
            assert_relative_eq!(jac[(2, 5)], 0.0, epsilon = 1e-6);
            // speed is independent of steering
            assert_relative_eq!(jac[(3, 0)], 0.0, epsilon = 1e-6);
        }
    }
}
