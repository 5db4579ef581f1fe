//! Frame-rate-coupled spring integration and angle helpers.

use std::collections::HashMap;

use std::f64::consts::{PI, TAU};

/// Spring tuning parameters.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SpringSettings {
    pub stiffness: f64,
    pub damping: f64,
    pub mass: f64,
}

impl Default for SpringSettings {
    fn default() -> Self {
        Self {
            stiffness: 0.1,
            damping: 0.8,
            mass: 1.0,
        }
    }
}

/// Position and velocity of one spring-driven value.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SpringState {
    pub value: f64,
    pub velocity: f64,
}

impl SpringState {
    /// Spring at rest at `value`.
    pub fn at(value: f64) -> Self {
        Self {
            value,
            velocity: 0.0,
        }
    }
}

/// Advance a spring one frame toward `target`.
///
/// Semi-implicit Euler with per-frame damping; the step is tuned for a
/// once-per-frame update, not a wall-clock timestep.
pub fn spring_step(state: SpringState, target: f64, settings: SpringSettings) -> SpringState {
    let acc = (target - state.value) * settings.stiffness / settings.mass;
    let velocity = (state.velocity + acc) * settings.damping;
    SpringState {
        value: state.value + velocity,
        velocity,
    }
}

/// Interpolate between two angles (radians) along the shortest arc.
pub fn lerp_angle(a: f64, b: f64, t: f64) -> f64 {
    let diff = shortest_arc(a, b);
    a + diff * t
}

/// Turn `current` toward `target` (radians), moving at most `speed` radians
/// per frame along the shortest arc. Snaps to the target once within reach.
pub fn look_at(current: f64, target: f64, speed: f64) -> f64 {
    let diff = shortest_arc(current, target);
    current + diff.signum() * diff.abs().min(speed)
}

fn shortest_arc(a: f64, b: f64) -> f64 {
    (b - a + PI).rem_euclid(TAU) - PI
}

/// Persisted spring registry keyed by script-chosen names.
///
/// Missing keys read as a spring at rest at zero; entries are never pruned
/// while the session lives.
#[derive(Clone, Debug, Default)]
pub struct PhysicsStore {
    springs: HashMap<String, SpringState>,
}

impl PhysicsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of the spring at `key`, 0.0 when absent.
    pub fn get(&self, key: &str) -> f64 {
        self.springs.get(key).map(|s| s.value).unwrap_or(0.0)
    }

    /// Snap the spring at `key` to `value`, zeroing its velocity.
    pub fn set(&mut self, key: &str, value: f64) {
        self.springs.insert(key.to_owned(), SpringState::at(value));
    }

    /// Full state of the spring at `key`, rest-at-zero when absent.
    pub fn entry(&self, key: &str) -> SpringState {
        self.springs.get(key).copied().unwrap_or_default()
    }

    /// Store a full spring state under `key`.
    pub fn set_state(&mut self, key: &str, state: SpringState) {
        self.springs.insert(key.to_owned(), state);
    }

    /// Step the spring at `key` toward `target`, persisting and returning the
    /// new value. A spring first seen this frame starts at rest on `target`.
    pub fn step(&mut self, key: &str, target: f64, settings: SpringSettings) -> f64 {
        let state = self
            .springs
            .get(key)
            .copied()
            .unwrap_or(SpringState::at(target));
        let next = spring_step(state, target, settings);
        self.springs.insert(key.to_owned(), next);
        next.value
    }

    pub fn len(&self) -> usize {
        self.springs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.springs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spring_converges_on_target() {
        let mut state = SpringState::at(0.0);
        for _ in 0..400 {
            state = spring_step(state, 10.0, SpringSettings::default());
        }
        assert!((state.value - 10.0).abs() < 1e-3);
        assert!(state.velocity.abs() < 1e-3);
    }

    #[test]
    fn first_step_matches_formula() {
        let next = spring_step(SpringState::at(0.0), 100.0, SpringSettings::default());
        // acc = 100 * 0.1 / 1 = 10; v = 10 * 0.8 = 8; x = 8
        assert!((next.velocity - 8.0).abs() < 1e-12);
        assert!((next.value - 8.0).abs() < 1e-12);
    }

    #[test]
    fn lerp_angle_takes_shortest_arc() {
        let a = 0.1;
        let b = TAU - 0.1;
        let mid = lerp_angle(a, b, 0.5);
        assert!((mid - 0.0).abs() < 1e-9, "went the long way: {mid}");
    }

    #[test]
    fn look_at_step_is_capped_by_speed() {
        let turned = look_at(0.0, 2.0, 0.5);
        assert!((turned - 0.5).abs() < 1e-12);
    }

    #[test]
    fn look_at_snaps_within_reach() {
        let turned = look_at(0.0, 0.2, 0.5);
        assert!((turned - 0.2).abs() < 1e-12);
        // Negative side too.
        let turned = look_at(0.0, -0.3, 0.5);
        assert!((turned + 0.3).abs() < 1e-12);
    }

    #[test]
    fn look_at_wraps_through_the_shortest_arc() {
        // 0.1 to TAU - 0.1 is a -0.2 turn, well within reach.
        let turned = look_at(0.1, TAU - 0.1, 0.5);
        assert!((turned + 0.1).abs() < 1e-9, "went the long way: {turned}");
    }

    #[test]
    fn store_defaults_and_persists() {
        let mut store = PhysicsStore::new();
        assert_eq!(store.get("x"), 0.0);

        store.set("x", 5.0);
        assert_eq!(store.get("x"), 5.0);
        assert_eq!(store.entry("x"), SpringState::at(5.0));

        // A fresh spring starts at rest on its first target.
        let v = store.step("y", 3.0, SpringSettings::default());
        assert_eq!(v, 3.0);
        let v2 = store.step("y", 7.0, SpringSettings::default());
        assert!(v2 > 3.0 && v2 < 7.0);
    }
}
