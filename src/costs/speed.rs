//! Deviation from a desired speed

use crate::common::{
    keys, CostContext, CostFunctor, DynamicModel, Parameters, ProblemShape, RoboticsError,
    RoboticsResult,
};

#[derive(Debug, Clone)]
pub struct SpeedCost {
    weight: f64,
    desired_speed: f64,
}

impl SpeedCost {
    pub fn new(params: &Parameters, desired_speed: f64) -> Self {
        Self {
            weight: params.get(keys::WEIGHT_SPEED, 0.1),
            desired_speed,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn set_desired_speed(&mut self, speed: f64) {
        self.desired_speed = speed;
    }
}

impl CostFunctor for SpeedCost {
    fn name(&self) -> &'static str {
        "speed"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    /// Only models with a speed column are supported
    fn validate(&self, model: &dyn DynamicModel) -> RoboticsResult<()> {
        if model.layout().speed.is_none() {
            return Err(RoboticsError::dimension("speed column", 1, 0));
        }
        Ok(())
    }

    fn num_residuals(&self, shape: &ProblemShape) -> usize {
        shape.trajectory_rows
    }

    fn evaluate(&self, ctx: &CostContext<'_>, out: &mut [f64]) -> RoboticsResult<()> {
        let col = ctx
            .layout
            .speed
            .ok_or_else(|| RoboticsError::dimension("speed column", 1, 0))?;
        for (row, r) in out.iter_mut().enumerate() {
            *r = ctx.trajectory[(row, col)] - self.desired_speed;
        }
        Ok(())
    }
}
