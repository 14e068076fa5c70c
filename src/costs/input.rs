//! Soft box constraint on control values

use nalgebra::DVector;

use crate::common::{
    keys, CostContext, CostFunctor, DynamicModel, Parameters, ProblemShape, RoboticsError,
    RoboticsResult,
};

/// One residual per control entry: the excess beyond `[lower, upper]`,
/// zero inside the bounds.
#[derive(Debug, Clone)]
pub struct InputCost {
    weight: f64,
    lower: DVector<f64>,
    upper: DVector<f64>,
}

impl InputCost {
    pub fn new(params: &Parameters, lower: DVector<f64>, upper: DVector<f64>) -> RoboticsResult<Self> {
        if lower.len() != upper.len() {
            return Err(RoboticsError::dimension("upper bound width", lower.len(), upper.len()));
        }
        if let Some((l, u)) = lower.iter().zip(upper.iter()).find(|(l, u)| !(l <= u)) {
            return Err(RoboticsError::InvalidParameter(format!(
                "lower bound {} exceeds upper bound {}",
                l, u
            )));
        }
        Ok(Self {
            weight: params.get(keys::WEIGHT_INPUT, 100.0),
            lower,
            upper,
        })
    }

    pub fn from_slices(params: &Parameters, lower: &[f64], upper: &[f64]) -> RoboticsResult<Self> {
        Self::new(params, DVector::from_column_slice(lower), DVector::from_column_slice(upper))
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    fn excess(&self, value: f64, col: usize) -> f64 {
        if value < self.lower[col] {
            value - self.lower[col]
        } else if value > self.upper[col] {
            value - self.upper[col]
        } else {
            0.0
        }
    }
}

impl CostFunctor for InputCost {
    fn name(&self) -> &'static str {
        "input"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn validate(&self, model: &dyn DynamicModel) -> RoboticsResult<()> {
        if self.lower.len() != model.control_dim() {
            return Err(RoboticsError::dimension(
                "input bound width",
                model.control_dim(),
                self.lower.len(),
            ));
        }
        Ok(())
    }

    fn num_residuals(&self, shape: &ProblemShape) -> usize {
        shape.control_rows * shape.control_dim
    }

    fn evaluate(&self, ctx: &CostContext<'_>, out: &mut [f64]) -> RoboticsResult<()> {
        let width = ctx.controls.ncols();
        for row in 0..ctx.controls.nrows() {
            for col in 0..width {
                out[row * width + col] = self.excess(ctx.controls[(row, col)], col);
            }
        }
        Ok(())
    }
}
