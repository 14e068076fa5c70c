//! Pointwise tracking of a full reference trajectory

use nalgebra::DMatrix;

use crate::common::{
    keys, normalize_angle, CostContext, CostFunctor, DynamicModel, Parameters, ProblemShape,
    RoboticsError, RoboticsResult,
};

/// How trajectory rows are paired with reference rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferenceMatching {
    /// Row `i` against reference row `i`, up to the shorter length
    #[default]
    Index,
    /// Row `i` against the reference row closest in position
    Nearest,
}

#[derive(Debug, Clone)]
pub struct ReferenceCost {
    weight: f64,
    reference: DMatrix<f64>,
    matching: ReferenceMatching,
}

impl ReferenceCost {
    /// `reference` holds one state per row in the model's state layout
    pub fn new(params: &Parameters, reference: DMatrix<f64>) -> RoboticsResult<Self> {
        if reference.nrows() == 0 {
            return Err(RoboticsError::dimension("reference rows", 1, 0));
        }
        Ok(Self {
            weight: params.get(keys::WEIGHT_REFERENCE, 10.0),
            reference,
            matching: ReferenceMatching::default(),
        })
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_matching(mut self, matching: ReferenceMatching) -> Self {
        self.matching = matching;
        self
    }

    fn nearest_row(&self, ctx: &CostContext<'_>, row: usize) -> usize {
        let p = ctx.layout.position(ctx.trajectory, row);
        let mut best = (0, f64::INFINITY);
        for i in 0..self.reference.nrows() {
            let q = ctx.layout.position(&self.reference, i);
            let d = (p - q).norm_squared();
            if d < best.1 {
                best = (i, d);
            }
        }
        best.0
    }
}

impl CostFunctor for ReferenceCost {
    fn name(&self) -> &'static str {
        "reference"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn validate(&self, model: &dyn DynamicModel) -> RoboticsResult<()> {
        if self.reference.ncols() != model.state_dim() {
            return Err(RoboticsError::dimension(
                "reference columns",
                model.state_dim(),
                self.reference.ncols(),
            ));
        }
        Ok(())
    }

    fn num_residuals(&self, shape: &ProblemShape) -> usize {
        let rows = match self.matching {
            ReferenceMatching::Index => shape.trajectory_rows.min(self.reference.nrows()),
            ReferenceMatching::Nearest => shape.trajectory_rows,
        };
        rows * shape.state_dim
    }

    fn evaluate(&self, ctx: &CostContext<'_>, out: &mut [f64]) -> RoboticsResult<()> {
        let width = ctx.trajectory.ncols();
        let rows = out.len() / width;
        for row in 0..rows {
            let target = match self.matching {
                ReferenceMatching::Index => row,
                ReferenceMatching::Nearest => self.nearest_row(ctx, row),
            };
            for col in 0..width {
                let diff = ctx.trajectory[(row, col)] - self.reference[(target, col)];
                out[row * width + col] = if ctx.layout.heading == Some(col) {
                    normalize_angle(diff)
                } else {
                    diff
                };
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::{SingleTrackModel, TripleIntegratorModel};
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_index_matching() {
        let model = SingleTrackModel::with_defaults();
        let reference = DMatrix::from_row_slice(2, 4, &[0.0, 0.0, 0.0, 10.0, 1.0, 0.0, 0.0, 10.0]);
        let trajectory =
            DMatrix::from_row_slice(3, 4, &[0.0, 0.5, 0.0, 9.0, 1.0, 0.0, 2.0 * PI - 0.1, 10.0, 2.0, 0.0, 0.0, 10.0]);
        let controls = DMatrix::zeros(3, 2);
        let prior = DMatrix::zeros(0, 2);
        let ctx = CostContext {
            trajectory: &trajectory,
            controls: &controls,
            prior_controls: &prior,
            seed_rows: 1,
            dt: 0.1,
            layout: model.layout(),
        };

        let cost = ReferenceCost::new(&Parameters::new(), reference).unwrap().with_weight(1.0);
        cost.validate(&model).unwrap();
        let residuals = cost.residuals(&ctx).unwrap();
        assert_eq!(residuals.len(), 2 * 4);
        assert_relative_eq!(residuals[1], 0.5);
        assert_relative_eq!(residuals[3], -1.0);
        // heading difference is wrapped
        assert_relative_eq!(residuals[6], -0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_nearest_matching() {
        let model = SingleTrackModel::with_defaults();
        let reference = DMatrix::from_fn(11, 4, |r, c| match c {
            0 => r as f64,
            3 => 5.0,
            _ => 0.0,
        });
        let trajectory = DMatrix::from_row_slice(1, 4, &[6.2, 1.0, 0.0, 5.0]);
        let controls = DMatrix::zeros(1, 2);
        let prior = DMatrix::zeros(0, 2);
        let ctx = CostContext {
            trajectory: &trajectory,
            controls: &controls,
            prior_controls: &prior,
            seed_rows: 1,
            dt: 0.1,
            layout: model.layout(),
        };
        let cost = ReferenceCost::new(&Parameters::new(), reference)
            .unwrap()
            .with_weight(1.0)
            .with_matching(ReferenceMatching::Nearest);
        let residuals = cost.residuals(&ctx).unwrap();
        assert_relative_eq!(residuals[0], 0.2, epsilon = 1e-12);
        assert_relative_eq!(residuals[1], 1.0);
    }

    #[test]
    fn test_width_mismatch() {
        let cost = ReferenceCost::new(&Parameters::new(), DMatrix::zeros(5, 4)).unwrap();
        let err = cost.validate(&TripleIntegratorModel::with_defaults()).unwrap_err();
        assert!(matches!(
            err,
            RoboticsError::DimensionMismatch {
                expected: 9,
                actual: 4,
                ..
            }
        ));
    }
}
