// Triple integrator
//
// A point mass with jerk inputs on each axis moves onto the line y = 2
// while passing a box that drifts across its path.

use std::sync::Arc;

use nalgebra::DMatrix;
use tracing::info;
use tracing_subscriber::EnvFilter;

use trajectory_optimizer::costs::{JerkCost, JerkSource, ReferenceLineCost, StaticObjectCost};
use trajectory_optimizer::dynamics::TripleIntegratorModel;
use trajectory_optimizer::geometry::{ObjectOutline, Polygon, ReferenceLine};
use trajectory_optimizer::utils::{PathStyle, Visualizer};
use trajectory_optimizer::{keys, CostFunctor, DynamicModel, Optimizer, Parameters, Point2D};

const HORIZON: usize = 15;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let params = Parameters::new()
        .with(keys::FUNCTION_TOLERANCE, 1e-8)
        .with(keys::WEIGHT_JERK, 1.0)
        .with(keys::WEIGHT_DISTANCE, 10.0);
    let model = TripleIntegratorModel::from_params(&params);

    let crate_box = Polygon::rectangle(Point2D::new(6.0, 4.0), Point2D::new(7.0, 5.0))?;
    let mut outline = ObjectOutline::new();
    outline.add(crate_box.clone(), 0.0)?;
    outline.add(crate_box.translated(0.0, -3.0), model.dt() * HORIZON as f64)?;
    let mut objects = StaticObjectCost::new(&params, 0.5);
    objects.add_object_outline(outline.clone())?;

    let line = ReferenceLine::from_xy(&[(0.0, 2.0), (1000.0, 2.0)])?;
    let costs: Vec<Arc<dyn CostFunctor>> = vec![
        Arc::new(JerkCost::new(&params).with_source(JerkSource::ControlRate)),
        Arc::new(ReferenceLineCost::new(&params, line.clone())),
        Arc::new(objects),
    ];

    // x velocity of 5 m/s, at rest otherwise
    let mut seeds = DMatrix::zeros(1, 9);
    seeds[(0, 1)] = 5.0;

    let mut optimizer = Optimizer::new(&params);
    optimizer.set_optimization_vector(DMatrix::zeros(HORIZON, 3))?;
    optimizer.add_triple_int_functor(seeds, &params, costs)?;

    std::fs::create_dir_all("./img")?;
    let report = optimizer.solve()?;
    info!("\n{}", report);

    let trajectory = optimizer.trajectory()?;
    let times: Vec<f64> = (0..trajectory.nrows()).map(|row| row as f64 * model.dt()).collect();

    let mut vis = Visualizer::new();
    vis.set_title("Triple integrator")
        .plot_reference_line(&line)
        .plot_trajectory(&trajectory, model.layout(), &PathStyle::default());
    vis.plot_outline(&outline, &times, "Moving object")?;
    vis.save_svg("./img/triple_integrator.svg")?;
    info!("saved ./img/triple_integrator.svg");
    Ok(())
}
