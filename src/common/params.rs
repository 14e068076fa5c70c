//! Named scalar configuration shared by every component of a planning cycle

use std::collections::HashMap;

/// Keys read by the crate.
pub mod keys {
    pub const DT: &str = "dt";
    pub const WHEEL_BASE: &str = "wheel_base";
    /// 0 selects the explicit update, 1 selects RK4
    pub const INTEGRATOR: &str = "integrator";

    pub const MAX_NUM_ITERATIONS: &str = "max_num_iterations";
    pub const FUNCTION_TOLERANCE: &str = "function_tolerance";
    pub const GRADIENT_TOLERANCE: &str = "gradient_tolerance";
    pub const PARAMETER_TOLERANCE: &str = "parameter_tolerance";
    pub const MAX_NUM_CONSECUTIVE_INVALID_STEPS: &str = "max_num_consecutive_invalid_steps";
    pub const INITIAL_DAMPING: &str = "initial_damping";
    pub const NUM_THREADS: &str = "num_threads";
    pub const MINIMIZER_PROGRESS_TO_STDOUT: &str = "minimizer_progress_to_stdout";

    pub const WEIGHT_JERK: &str = "weight_jerk";
    pub const WEIGHT_DISTANCE: &str = "weight_distance";
    pub const WEIGHT_REFERENCE: &str = "weight_reference";
    pub const WEIGHT_INPUT: &str = "weight_input";
    pub const WEIGHT_OBJECT: &str = "weight_object";
    pub const WEIGHT_SPEED: &str = "weight_speed";
}

/// String-keyed parameter store with per-call defaults.
///
/// Missing keys silently fall back to the default supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    values: HashMap<String, f64>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value stored under `key`, or `default` when absent
    pub fn get(&self, key: &str, default: f64) -> f64 {
        self.values.get(key).copied().unwrap_or(default)
    }

    /// Store `value` under `key` and return it
    pub fn set(&mut self, key: &str, value: f64) -> f64 {
        self.values.insert(key.to_string(), value);
        value
    }

    /// Builder-style [`Parameters::set`]
    pub fn with(mut self, key: &str, value: f64) -> Self {
        self.set(key, value);
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<f64> {
        self.values.remove(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Non-negative integer view of a value. Negative or non-finite values yield `default`.
    pub fn get_usize(&self, key: &str, default: usize) -> usize {
        match self.values.get(key) {
            Some(v) if v.is_finite() && *v >= 0.0 => v.round() as usize,
            _ => default,
        }
    }

    /// Boolean view of a value, any non-zero number is `true`
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.values.get(key).map(|v| *v != 0.0).unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_get_default() {
        let params = Parameters::new();
        assert_eq!(params.get("dt", 0.1), 0.1);
        assert!(params.is_empty());
    }

    #[test]
    fn test_set_get_round_trip() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut params = Parameters::new();
        for i in 0..100 {
            let key = format!("key_{}", i);
            let value: f64 = rng.gen_range(-1e6..1e6);
            assert_eq!(params.set(&key, value), value);
            assert_eq!(params.get(&key, value + 1.0), value);
        }
        assert_eq!(params.len(), 100);
        assert_eq!(params.get("unset", -3.5), -3.5);
    }

    #[test]
    fn test_overwrite() {
        let mut params = Parameters::new().with(keys::WEIGHT_JERK, 1.0);
        params.set(keys::WEIGHT_JERK, 5.0);
        assert_eq!(params.get(keys::WEIGHT_JERK, 100.0), 5.0);
        assert_eq!(params.remove(keys::WEIGHT_JERK), Some(5.0));
        assert!(!params.contains(keys::WEIGHT_JERK));
    }

    #[test]
    fn test_typed_views() {
        let params = Parameters::new()
            .with(keys::NUM_THREADS, 4.0)
            .with(keys::MAX_NUM_ITERATIONS, -1.0)
            .with(keys::MINIMIZER_PROGRESS_TO_STDOUT, 1.0);
        assert_eq!(params.get_usize(keys::NUM_THREADS, 1), 4);
        assert_eq!(params.get_usize(keys::MAX_NUM_ITERATIONS, 4000), 4000);
        assert!(params.get_bool(keys::MINIMIZER_PROGRESS_TO_STDOUT, false));
        assert!(!params.get_bool("missing", false));
    }
}
