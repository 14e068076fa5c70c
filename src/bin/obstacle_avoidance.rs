// Obstacle avoidance
//
// The vehicle follows the x axis and has to swerve around a box that
// blocks its lane, keeping at least one meter of clearance.

use std::sync::Arc;

use nalgebra::DMatrix;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use trajectory_optimizer::costs::{InputCost, JerkCost, JerkSource, ReferenceLineCost, StaticObjectCost};
use trajectory_optimizer::dynamics::SingleTrackModel;
use trajectory_optimizer::geometry::{ObjectOutline, Polygon, ReferenceLine};
use trajectory_optimizer::utils::{colors, PathStyle, Visualizer};
use trajectory_optimizer::{keys, CostFunctor, DynamicModel, Optimizer, Parameters, Point2D};

const HORIZON: usize = 20;
const CLEARANCE: f64 = 1.0;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let params = Parameters::new()
        .with(keys::DT, 0.2)
        .with(keys::FUNCTION_TOLERANCE, 1e-8)
        .with(keys::MAX_NUM_ITERATIONS, 1000.0)
        .with(keys::WEIGHT_JERK, 1.0)
        .with(keys::WEIGHT_DISTANCE, 1.0)
        .with(keys::WEIGHT_INPUT, 100.0)
        .with(keys::WEIGHT_OBJECT, 1000.0);

    let obstacle = Polygon::rectangle(Point2D::new(19.0, -1.5), Point2D::new(23.0, 0.5))?;
    let mut objects = StaticObjectCost::new(&params, CLEARANCE);
    objects.add_object_outline(ObjectOutline::stationary(obstacle.clone()))?;

    let line = ReferenceLine::from_xy(&[(0.0, 0.0), (1000.0, 0.0)])?;
    let costs: Vec<Arc<dyn CostFunctor>> = vec![
        Arc::new(JerkCost::new(&params).with_source(JerkSource::ControlRate)),
        Arc::new(ReferenceLineCost::new(&params, line.clone())),
        Arc::new(InputCost::from_slices(&params, &[-0.5, -3.0], &[0.5, 3.0])?),
        Arc::new(objects),
    ];

    let seeds = DMatrix::from_row_slice(1, 4, &[0.0, 0.0, 0.0, 10.0]);
    let mut optimizer = Optimizer::new(&params);
    optimizer.set_optimization_vector(DMatrix::zeros(HORIZON, 2))?;
    optimizer.add_single_track_functor(seeds, &params, costs)?;

    std::fs::create_dir_all("./img")?;
    let report = optimizer.solve()?;
    info!("\n{}", report);

    let model = SingleTrackModel::from_params(&params);
    let layout = model.layout();
    let trajectory = optimizer.trajectory()?;
    let min_clearance = (0..trajectory.nrows())
        .map(|row| obstacle.signed_distance(&layout.position(&trajectory, row)))
        .fold(f64::INFINITY, f64::min);
    if min_clearance < CLEARANCE {
        warn!(min_clearance, "clearance violated");
    } else {
        info!(min_clearance, "clearance kept");
    }

    let mut vis = Visualizer::new();
    vis.set_title("Obstacle avoidance")
        .plot_reference_line(&line)
        .plot_polygon(&obstacle, &PathStyle::new(colors::OBJECT, "Obstacle"))
        .plot_trajectory(&trajectory, layout, &PathStyle::default());
    vis.save_svg("./img/obstacle_avoidance.svg")?;
    info!("saved ./img/obstacle_avoidance.svg");
    Ok(())
}
