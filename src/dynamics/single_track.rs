//! Kinematic single-track (bicycle) model
//!
//! State `[x, y, yaw, v]`, control `[steering, acceleration]`.

use nalgebra::DVector;

use crate::common::{
    keys, normalize_angle, DynamicModel, Integrator, Parameters, StateLayout,
};

pub const X: usize = 0;
pub const Y: usize = 1;
pub const YAW: usize = 2;
pub const V: usize = 3;

pub const STEERING: usize = 0;
pub const ACCELERATION: usize = 1;

/// Single-track model configuration
#[derive(Debug, Clone)]
pub struct SingleTrackConfig {
    /// Wheelbase length [m]
    pub wheel_base: f64,
    /// Time step [s]
    pub dt: f64,
    pub integrator: Integrator,
}

impl Default for SingleTrackConfig {
    fn default() -> Self {
        Self {
            wheel_base: 2.7,
            dt: 0.1,
            integrator: Integrator::Explicit,
        }
    }
}

impl SingleTrackConfig {
    pub fn from_params(params: &Parameters) -> Self {
        let defaults = Self::default();
        Self {
            wheel_base: params.get(keys::WHEEL_BASE, defaults.wheel_base),
            dt: params.get(keys::DT, defaults.dt),
            integrator: Integrator::from_params(params, defaults.integrator),
        }
    }

    pub fn with_integrator(mut self, integrator: Integrator) -> Self {
        self.integrator = integrator;
        self
    }
}

/// Bicycle kinematic motion model
#[derive(Debug, Clone)]
pub struct SingleTrackModel {
    config: SingleTrackConfig,
}

impl SingleTrackModel {
    pub fn new(config: SingleTrackConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(SingleTrackConfig::default())
    }

    pub fn from_params(params: &Parameters) -> Self {
        Self::new(SingleTrackConfig::from_params(params))
    }

    /// Get wheelbase
    pub fn wheel_base(&self) -> f64 {
        self.config.wheel_base
    }
}

impl DynamicModel for SingleTrackModel {
    fn name(&self) -> &'static str {
        "single_track"
    }

    fn state_dim(&self) -> usize {
        4
    }

    fn control_dim(&self) -> usize {
        2
    }

    fn dt(&self) -> f64 {
        self.config.dt
    }

    fn layout(&self) -> StateLayout {
        StateLayout {
            x: X,
            y: Y,
            heading: Some(YAW),
            speed: Some(V),
        }
    }

    fn integrator(&self) -> Integrator {
        self.config.integrator
    }

    fn derivative(&self, state: &DVector<f64>, control: &DVector<f64>) -> DVector<f64> {
        let (yaw, v) = (state[YAW], state[V]);
        DVector::from_vec(vec![
            v * yaw.cos(),
            v * yaw.sin(),
            v / self.config.wheel_base * control[STEERING].tan(),
            control[ACCELERATION],
        ])
    }

    /// Update state using bicycle kinematic model, speed taken before the update
    fn explicit_step(&self, state: &DVector<f64>, control: &DVector<f64>) -> DVector<f64> {
        let dt = self.config.dt;
        let (yaw, v) = (state[YAW], state[V]);
        DVector::from_vec(vec![
            state[X] + v * yaw.cos() * dt,
            state[Y] + v * yaw.sin() * dt,
            yaw + v / self.config.wheel_base * control[STEERING].tan() * dt,
            v + control[ACCELERATION] * dt,
        ])
    }

    fn estimate_control(&self, prev: &DVector<f64>, next: &DVector<f64>) -> DVector<f64> {
        let dt = self.config.dt;
        let v = prev[V];
        let steering = if v.abs() > 1e-9 {
            (self.config.wheel_base * normalize_angle(next[YAW] - prev[YAW]) / (v * dt)).atan()
        } else {
            0.0
        };
        DVector::from_vec(vec![steering, (next[V] - v) / dt])
    }
}
