//! Lateral deviation from a reference line

use crate::common::{keys, CostContext, CostFunctor, Parameters, ProblemShape, RoboticsResult};
use crate::geometry::ReferenceLine;

/// One residual per trajectory row: signed lateral distance to the line.
#[derive(Debug, Clone)]
pub struct ReferenceLineCost {
    weight: f64,
    line: ReferenceLine,
}

impl ReferenceLineCost {
    pub fn new(params: &Parameters, line: ReferenceLine) -> Self {
        Self {
            weight: params.get(keys::WEIGHT_DISTANCE, 10.0),
            line,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn line(&self) -> &ReferenceLine {
        &self.line
    }
}

impl CostFunctor for ReferenceLineCost {
    fn name(&self) -> &'static str {
        "reference_line"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn num_residuals(&self, shape: &ProblemShape) -> usize {
        shape.trajectory_rows
    }

    fn evaluate(&self, ctx: &CostContext<'_>, out: &mut [f64]) -> RoboticsResult<()> {
        for (row, r) in out.iter_mut().enumerate() {
            *r = self
                .line
                .signed_distance(&ctx.layout.position(ctx.trajectory, row));
        }
        Ok(())
    }
}
