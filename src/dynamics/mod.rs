//! Dynamics models and the shared forward-simulation routines

pub mod single_track;
pub mod triple_integrator;

pub use single_track::{SingleTrackConfig, SingleTrackModel};
pub use triple_integrator::{TripleIntegratorConfig, TripleIntegratorModel};

use nalgebra::{DMatrix, DVector};

use crate::common::{DynamicModel, RoboticsError, RoboticsResult};

/// Classic fourth-order Runge-Kutta step of `f` over `dt`
pub fn rk4<F>(f: F, state: &DVector<f64>, dt: f64) -> DVector<f64>
where
    F: Fn(&DVector<f64>) -> DVector<f64>,
{
    let k1 = f(state);
    let k2 = f(&(state + &k1 * (dt / 2.0)));
    let k3 = f(&(state + &k2 * (dt / 2.0)));
    let k4 = f(&(state + &k3 * dt));
    state + (k1 + k2 * 2.0 + k3 * 2.0 + k4) * (dt / 6.0)
}

/// Check seed window and control matrix widths against `model`
pub fn check_shapes<M: DynamicModel + ?Sized>(
    model: &M,
    initial_states: &DMatrix<f64>,
    controls: &DMatrix<f64>,
) -> RoboticsResult<()> {
    if initial_states.ncols() != model.state_dim() {
        return Err(RoboticsError::dimension(
            "initial state columns",
            model.state_dim(),
            initial_states.ncols(),
        ));
    }
    if initial_states.nrows() == 0 {
        return Err(RoboticsError::dimension("initial state rows", 1, 0));
    }
    if controls.ncols() != model.control_dim() {
        return Err(RoboticsError::dimension(
            "control columns",
            model.control_dim(),
            controls.ncols(),
        ));
    }
    if controls.nrows() == 0 {
        return Err(RoboticsError::dimension("control rows", 1, 0));
    }
    Ok(())
}

/// Forward-simulate `controls` from the seed window.
///
/// The seed rows are copied unchanged; row `S + k` is the last row stepped
/// under control row `k`. The final control row has no successor state, so
/// the trajectory has `S + N - 1` rows.
pub fn rollout<M: DynamicModel + ?Sized>(
    model: &M,
    initial_states: &DMatrix<f64>,
    controls: &DMatrix<f64>,
) -> RoboticsResult<DMatrix<f64>> {
    check_shapes(model, initial_states, controls)?;

    let seeds = initial_states.nrows();
    let steps = controls.nrows() - 1;
    let mut trajectory = DMatrix::zeros(seeds + steps, model.state_dim());
    trajectory.rows_mut(0, seeds).copy_from(initial_states);

    let mut state: DVector<f64> = initial_states.row(seeds - 1).transpose();
    for k in 0..steps {
        let control: DVector<f64> = controls.row(k).transpose();
        state = model.step(&state, &control);
        trajectory.set_row(seeds + k, &state.transpose());
    }
    Ok(trajectory)
}

/// Controls implied by each consecutive pair of seed rows, oldest first
pub fn estimate_prior_controls<M: DynamicModel + ?Sized>(
    model: &M,
    initial_states: &DMatrix<f64>,
) -> DMatrix<f64> {
    let pairs = initial_states.nrows().saturating_sub(1);
    let mut prior = DMatrix::zeros(pairs, model.control_dim());
    for i in 0..pairs {
        let prev: DVector<f64> = initial_states.row(i).transpose();
        let next: DVector<f64> = initial_states.row(i + 1).transpose();
        prior.set_row(i, &model.estimate_control(&prev, &next).transpose());
    }
    prior
}
