// Lane change
//
// A single-track vehicle at 10 m/s is pulled 4 m to the left by a
// reference line while a jerk cost keeps the maneuver smooth.

use std::sync::Arc;

use nalgebra::DMatrix;
use tracing::info;
use tracing_subscriber::EnvFilter;

use trajectory_optimizer::costs::{JerkCost, JerkSource, ReferenceLineCost};
use trajectory_optimizer::dynamics::SingleTrackModel;
use trajectory_optimizer::geometry::ReferenceLine;
use trajectory_optimizer::utils::{colors, PathStyle, Visualizer};
use trajectory_optimizer::{keys, CostFunctor, DynamicModel, Optimizer, Parameters};

const HORIZON: usize = 20;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let params = Parameters::new()
        .with(keys::DT, 0.2)
        .with(keys::FUNCTION_TOLERANCE, 1e-8)
        .with(keys::MAX_NUM_ITERATIONS, 1000.0)
        .with(keys::WEIGHT_JERK, 1.0)
        .with(keys::WEIGHT_DISTANCE, 10.0);

    let seeds = DMatrix::from_row_slice(
        3,
        4,
        &[0.0, 0.0, 0.0, 10.0, 2.0, 0.0, 0.0, 10.0, 4.0, 0.0, 0.0, 10.0],
    );
    let line = ReferenceLine::from_xy(&[(0.0, 4.0), (1000.0, 4.0)])?;
    let costs: Vec<Arc<dyn CostFunctor>> = vec![
        Arc::new(
            JerkCost::new(&params)
                .with_source(JerkSource::ControlRate)
                .with_seed_anchor(true),
        ),
        Arc::new(ReferenceLineCost::new(&params, line.clone())),
    ];

    let initial = DMatrix::zeros(HORIZON, 2);
    let mut optimizer = Optimizer::new(&params);
    optimizer.set_optimization_vector(initial.clone())?;
    optimizer.add_single_track_functor(seeds.clone(), &params, costs)?;

    std::fs::create_dir_all("./img")?;
    let report = optimizer.solve()?;
    info!("\n{}", report);

    for (name, cost) in optimizer.cost_breakdown()? {
        info!(functor = name, cost, "cost at solution");
    }

    let model = SingleTrackModel::from_params(&params);
    let guess = model.rollout(&seeds, &initial)?;
    let trajectory = optimizer.trajectory()?;

    let mut vis = Visualizer::new();
    vis.set_title("Lane change")
        .set_aspect_ratio(None)
        .plot_reference_line(&line)
        .plot_trajectory(
            &guess,
            model.layout(),
            &PathStyle::new(colors::INITIAL_GUESS, "Initial guess").with_line_width(1.0),
        )
        .plot_trajectory(&trajectory, model.layout(), &PathStyle::default());
    vis.save_svg("./img/lane_change.svg")?;
    info!("saved ./img/lane_change.svg");
    Ok(())
}
