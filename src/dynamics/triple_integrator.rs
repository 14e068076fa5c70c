//! Decoupled per-axis triple integrator with jerk control
//!
//! State `[x, vx, ax, y, vy, ay, z, vz, az]`, control `[jx, jy, jz]`.

use nalgebra::DVector;

use crate::common::{keys, DynamicModel, Integrator, Parameters, StateLayout};

pub const AXES: usize = 3;
/// Columns per axis: position, velocity, acceleration
pub const AXIS_WIDTH: usize = 3;

/// Triple integrator configuration
#[derive(Debug, Clone)]
pub struct TripleIntegratorConfig {
    /// Time step [s]
    pub dt: f64,
    pub integrator: Integrator,
}

impl Default for TripleIntegratorConfig {
    fn default() -> Self {
        Self {
            dt: 0.2,
            integrator: Integrator::Explicit,
        }
    }
}

impl TripleIntegratorConfig {
    pub fn from_params(params: &Parameters) -> Self {
        let defaults = Self::default();
        Self {
            dt: params.get(keys::DT, defaults.dt),
            integrator: Integrator::from_params(params, defaults.integrator),
        }
    }

    pub fn with_integrator(mut self, integrator: Integrator) -> Self {
        self.integrator = integrator;
        self
    }
}

#[derive(Debug, Clone)]
pub struct TripleIntegratorModel {
    config: TripleIntegratorConfig,
}

impl TripleIntegratorModel {
    pub fn new(config: TripleIntegratorConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(TripleIntegratorConfig::default())
    }

    pub fn from_params(params: &Parameters) -> Self {
        Self::new(TripleIntegratorConfig::from_params(params))
    }
}

impl DynamicModel for TripleIntegratorModel {
    fn name(&self) -> &'static str {
        "triple_integrator"
    }

    fn state_dim(&self) -> usize {
        AXES * AXIS_WIDTH
    }

    fn control_dim(&self) -> usize {
        AXES
    }

    fn dt(&self) -> f64 {
        self.config.dt
    }

    fn layout(&self) -> StateLayout {
        StateLayout {
            x: 0,
            y: AXIS_WIDTH,
            heading: None,
            speed: None,
        }
    }

    fn integrator(&self) -> Integrator {
        self.config.integrator
    }

    fn derivative(&self, state: &DVector<f64>, control: &DVector<f64>) -> DVector<f64> {
        let mut out = DVector::zeros(AXES * AXIS_WIDTH);
        for axis in 0..AXES {
            let i = axis * AXIS_WIDTH;
            out[i] = state[i + 1];
            out[i + 1] = state[i + 2];
            out[i + 2] = control[axis];
        }
        out
    }

    fn explicit_step(&self, state: &DVector<f64>, control: &DVector<f64>) -> DVector<f64> {
        let dt = self.config.dt;
        let mut out = DVector::zeros(AXES * AXIS_WIDTH);
        for axis in 0..AXES {
            let i = axis * AXIS_WIDTH;
            let (pos, vel, acc) = (state[i], state[i + 1], state[i + 2]);
            out[i] = pos + vel * dt + 0.5 * acc * dt * dt;
            out[i + 1] = vel + acc * dt;
            out[i + 2] = acc + control[axis] * dt;
        }
        out
    }

    fn estimate_control(&self, prev: &DVector<f64>, next: &DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(
            AXES,
            (0..AXES).map(|axis| {
                let i = axis * AXIS_WIDTH + 2;
                (next[i] - prev[i]) / self.config.dt
            }),
        )
    }
}
