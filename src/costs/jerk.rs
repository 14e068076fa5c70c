//! Smoothness penalty on control changes or position jerk

use crate::common::{
    keys, CostContext, CostFunctor, Parameters, ProblemShape, RoboticsResult,
};

/// What the jerk penalty differentiates
///
/// Control sources only see the optimized rows unless the cost is anchored
/// with [`JerkCost::with_seed_anchor`], in which case the differences also
/// reach back into the controls implied by the seed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JerkSource {
    /// First difference of control rows over `dt`
    ControlRate,
    /// Second difference of control rows over `dt²`
    #[default]
    ControlSecondDifference,
    /// Third difference of planar position over `dt³`
    Position,
}

impl JerkSource {
    fn order(self) -> usize {
        match self {
            JerkSource::ControlRate => 1,
            JerkSource::ControlSecondDifference => 2,
            JerkSource::Position => 3,
        }
    }
}

/// Binomial finite-difference coefficients, oldest sample first
fn difference_coefficients(order: usize) -> &'static [f64] {
    match order {
        1 => &[-1.0, 1.0],
        2 => &[1.0, -2.0, 1.0],
        _ => &[-1.0, 3.0, -3.0, 1.0],
    }
}

#[derive(Debug, Clone)]
pub struct JerkCost {
    weight: f64,
    source: JerkSource,
    seed_anchor: bool,
}

impl JerkCost {
    pub fn new(params: &Parameters) -> Self {
        Self {
            weight: params.get(keys::WEIGHT_JERK, 100.0),
            source: JerkSource::default(),
            seed_anchor: false,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_source(mut self, source: JerkSource) -> Self {
        self.source = source;
        self
    }

    /// Difference control rows against the controls implied by the seed
    /// window as well. Has no effect on [`JerkSource::Position`].
    pub fn with_seed_anchor(mut self, anchored: bool) -> Self {
        self.seed_anchor = anchored;
        self
    }

    pub fn source(&self) -> JerkSource {
        self.source
    }

    pub fn is_seed_anchored(&self) -> bool {
        self.seed_anchor
    }

    fn anchor_rows(&self, shape: &ProblemShape) -> usize {
        if self.seed_anchor {
            shape.prior_rows.min(self.source.order())
        } else {
            0
        }
    }

    /// Sample `row` of the anchored control sequence
    fn control_sample(ctx: &CostContext<'_>, anchor: usize, row: usize, col: usize) -> f64 {
        if row < anchor {
            let prior = ctx.prior_controls;
            prior[(prior.nrows() - anchor + row, col)]
        } else {
            ctx.controls[(row - anchor, col)]
        }
    }
}

impl CostFunctor for JerkCost {
    fn name(&self) -> &'static str {
        "jerk"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn num_residuals(&self, shape: &ProblemShape) -> usize {
        let order = self.source.order();
        match self.source {
            JerkSource::Position => shape.trajectory_rows.saturating_sub(order) * 2,
            _ => {
                let samples = self.anchor_rows(shape) + shape.control_rows;
                samples.saturating_sub(order) * shape.control_dim
            }
        }
    }

    fn evaluate(&self, ctx: &CostContext<'_>, out: &mut [f64]) -> RoboticsResult<()> {
        let order = self.source.order();
        let coefficients = difference_coefficients(order);
        let scale = ctx.dt.powi(order as i32);

        match self.source {
            JerkSource::Position => {
                let columns = [ctx.layout.x, ctx.layout.y];
                let windows = ctx.trajectory.nrows().saturating_sub(order);
                for k in 0..windows {
                    for (c, &col) in columns.iter().enumerate() {
                        let mut acc = 0.0;
                        for (j, coef) in coefficients.iter().enumerate() {
                            acc += coef * ctx.trajectory[(k + j, col)];
                        }
                        out[k * 2 + c] = acc / scale;
                    }
                }
            }
            _ => {
                let shape = ctx.shape();
                let anchor = self.anchor_rows(&shape);
                let windows = (anchor + shape.control_rows).saturating_sub(order);
                let width = shape.control_dim;
                for k in 0..windows {
                    for col in 0..width {
                        let mut acc = 0.0;
                        for (j, coef) in coefficients.iter().enumerate() {
                            acc += coef * Self::control_sample(ctx, anchor, k + j, col);
                        }
                        out[k * width + col] = acc / scale;
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{DynamicModel, StateLayout};
    use crate::dynamics::{estimate_prior_controls, rollout, SingleTrackModel};
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;

    fn context<'a>(
        trajectory: &'a DMatrix<f64>,
        controls: &'a DMatrix<f64>,
        prior: &'a DMatrix<f64>,
    ) -> CostContext<'a> {
        CostContext {
            trajectory,
            controls,
            prior_controls: prior,
            seed_rows: 1,
            dt: 0.1,
            layout: StateLayout {
                x: 0,
                y: 1,
                heading: Some(2),
                speed: Some(3),
            },
        }
    }

    #[test]
    fn test_constant_controls_give_zero_jerk() {
        let controls = DMatrix::from_fn(20, 2, |_, c| if c == 0 { 0.037 } else { -1.3 });
        let trajectory = DMatrix::zeros(20, 4);
        let prior = DMatrix::zeros(0, 2);
        let ctx = context(&trajectory, &controls, &prior);

        for source in [JerkSource::ControlRate, JerkSource::ControlSecondDifference] {
            let cost = JerkCost::new(&Parameters::new()).with_source(source);
            let residuals = cost.residuals(&ctx).unwrap();
            assert!(!residuals.is_empty());
            assert!(residuals.iter().all(|r| *r == 0.0));
        }
    }

    #[test]
    fn test_constant_controls_after_seed_window() {
        let model = SingleTrackModel::with_defaults();
        let seeds = DMatrix::from_row_slice(
            3,
            4,
            &[0.0, 0.0, 0.0, 10.0, 2.0, 0.0, 0.0, 10.0, 4.0, 0.0, 0.0, 10.0],
        );
        let prior = estimate_prior_controls(&model, &seeds);
        let controls = DMatrix::from_fn(20, 2, |_, c| if c == 0 { 0.05 } else { 0.5 });
        let traj = rollout(&model, &seeds, &controls).unwrap();
        let ctx = CostContext {
            trajectory: &traj,
            controls: &controls,
            prior_controls: &prior,
            seed_rows: 3,
            dt: model.dt(),
            layout: model.layout(),
        };

        let cost = JerkCost::new(&Parameters::new());
        assert_eq!(cost.source(), JerkSource::ControlSecondDifference);
        assert!(!cost.is_seed_anchored());
        let residuals = cost.residuals(&ctx).unwrap();
        assert_eq!(residuals.len(), 18 * 2);
        assert!(residuals.iter().all(|r| *r == 0.0));
    }

    #[test]
    fn test_anchored_to_seed_window() {
        let model = SingleTrackModel::with_defaults();
        let seeds = DMatrix::from_row_slice(
            3,
            4,
            &[0.0, 0.0, 0.0, 10.0, 1.0, 0.0, 0.0, 10.0, 2.0, 0.0, 0.0, 10.0],
        );
        let prior = estimate_prior_controls(&model, &seeds);
        let mut controls = DMatrix::zeros(4, 2);
        controls[(0, 1)] = 2.0;
        let traj = rollout(&model, &seeds, &controls).unwrap();
        let ctx = CostContext {
            trajectory: &traj,
            controls: &controls,
            prior_controls: &prior,
            seed_rows: 3,
            dt: model.dt(),
            layout: model.layout(),
        };

        let cost = JerkCost::new(&Parameters::new())
            .with_weight(1.0)
            .with_source(JerkSource::ControlRate)
            .with_seed_anchor(true);
        let residuals = cost.residuals(&ctx).unwrap();
        assert_eq!(residuals.len(), 4 * 2);
        // jump from the seed acceleration 0 to 2 over one step
        assert_relative_eq!(residuals[1], 20.0, epsilon = 1e-9);
        assert_relative_eq!(residuals[3], -20.0, epsilon = 1e-9);

        let unanchored = cost.clone().with_seed_anchor(false);
        assert_eq!(unanchored.residuals(&ctx).unwrap().len(), 3 * 2);
    }

    #[test]
    fn test_position_jerk() {
        let dt: f64 = 0.1;
        // x = t^3 has constant third derivative 6
        let trajectory = DMatrix::from_fn(6, 4, |r, c| {
            let t = r as f64 * dt;
            if c == 0 {
                t * t * t
            } else {
                0.0
            }
        });
        let controls = DMatrix::zeros(6, 2);
        let prior = DMatrix::zeros(0, 2);
        let ctx = context(&trajectory, &controls, &prior);

        let cost = JerkCost::new(&Parameters::new())
            .with_weight(4.0)
            .with_source(JerkSource::Position);
        let residuals = cost.residuals(&ctx).unwrap();
        assert_eq!(residuals.len(), 3 * 2);
        for k in 0..3 {
            assert_relative_eq!(residuals[2 * k], 2.0 * 6.0, epsilon = 1e-6);
            assert_eq!(residuals[2 * k + 1], 0.0);
        }
    }
}
