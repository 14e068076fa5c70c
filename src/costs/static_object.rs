//! Clearance penalty against time-varying obstacle outlines

use crate::common::{
    keys, CostContext, CostFunctor, Parameters, ProblemShape, RoboticsError, RoboticsResult,
};
use crate::geometry::ObjectOutline;

/// Penalizes trajectory points closer than `epsilon` to an obstacle.
///
/// Row `i` is checked against each outline at `time_offset + i * dt`;
/// the residual is `max(0, epsilon - signed_distance)`.
#[derive(Debug, Clone)]
pub struct StaticObjectCost {
    weight: f64,
    epsilon: f64,
    time_offset: f64,
    outlines: Vec<ObjectOutline>,
}

impl StaticObjectCost {
    pub fn new(params: &Parameters, epsilon: f64) -> Self {
        Self {
            weight: params.get(keys::WEIGHT_OBJECT, 0.1),
            epsilon,
            time_offset: 0.0,
            outlines: Vec::new(),
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Time stamp of the first trajectory row
    pub fn with_time_offset(mut self, time_offset: f64) -> Self {
        self.time_offset = time_offset;
        self
    }

    pub fn add_object_outline(&mut self, outline: ObjectOutline) -> RoboticsResult<()> {
        if outline.is_empty() {
            return Err(RoboticsError::geometry("object outline has no keyframes"));
        }
        self.outlines.push(outline);
        Ok(())
    }

    pub fn outlines(&self) -> &[ObjectOutline] {
        &self.outlines
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }
}

impl CostFunctor for StaticObjectCost {
    fn name(&self) -> &'static str {
        "static_object"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn num_residuals(&self, shape: &ProblemShape) -> usize {
        self.outlines.len() * shape.trajectory_rows
    }

    fn evaluate(&self, ctx: &CostContext<'_>, out: &mut [f64]) -> RoboticsResult<()> {
        let rows = ctx.trajectory.nrows();
        for (o, outline) in self.outlines.iter().enumerate() {
            for row in 0..rows {
                let polygon = outline.query(self.time_offset + row as f64 * ctx.dt)?;
                let distance = polygon.signed_distance(&ctx.layout.position(ctx.trajectory, row));
                out[o * rows + row] = (self.epsilon - distance).max(0.0);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Point2D;
    use crate::geometry::Polygon;
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;

    #[test]
    fn test_clearance_residuals() {
        let mut outline = ObjectOutline::new();
        let block = Polygon::rectangle(Point2D::new(10.0, -1.0), Point2D::new(12.0, 1.0)).unwrap();
        outline.add(block.clone(), 0.0).unwrap();
        // obstacle drifts 10 m up over 1 s
        outline.add(block.translated(0.0, 10.0), 1.0).unwrap();

        let mut cost = StaticObjectCost::new(&Parameters::new(), 1.0).with_weight(1.0);
        cost.add_object_outline(outline).unwrap();

        let trajectory = DMatrix::from_row_slice(
            3,
            4,
            &[0.0, 0.0, 0.0, 0.0, 11.0, 0.0, 0.0, 0.0, 11.0, 6.5, 0.0, 0.0],
        );
        let controls = DMatrix::zeros(3, 2);
        let prior = DMatrix::zeros(0, 2);
        let ctx = CostContext {
            trajectory: &trajectory,
            controls: &controls,
            prior_controls: &prior,
            seed_rows: 1,
            dt: 0.5,
            layout: crate::common::StateLayout {
                x: 0,
                y: 1,
                heading: Some(2),
                speed: Some(3),
            },
        };

        let residuals = cost.residuals(&ctx).unwrap();
        assert_eq!(residuals.len(), 3);
        // far away
        assert_eq!(residuals[0], 0.0);
        // t = 0.5: block spans y in [4, 6], point 4 below it
        assert_eq!(residuals[1], 0.0);
        // t = 1.0: block spans y in [9, 11], point 2.5 below
        assert_eq!(residuals[2], 0.0);

        let inside = DMatrix::from_row_slice(1, 4, &[11.0, 0.5, 0.0, 0.0]);
        let ctx = CostContext {
            trajectory: &inside,
            ..ctx
        };
        let residuals = cost.residuals(&ctx).unwrap();
        assert_relative_eq!(residuals[0], 1.5, epsilon = 1e-12);
    }

    #[test]
    fn test_rejects_empty_outline() {
        let mut cost = StaticObjectCost::new(&Parameters::new(), 1.0);
        assert!(cost.add_object_outline(ObjectOutline::new()).is_err());
        assert!(cost.outlines().is_empty());
    }
}
