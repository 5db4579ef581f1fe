//! Reusable scripted components ("models").
//!
//! A model is a named draw callable registered by a script. Instances of a
//! model address persisted state by an explicit instance id; callers that do
//! not pick an id share the id defaulted from the model name, and share
//! state. The offscreen cache is keyed by model name only, so a cached model
//! paints once and is blitted thereafter until its definition changes or the
//! cache is cleared.

use std::{collections::HashMap, rc::Rc, sync::Arc};

use crate::{
    animation::spring::SpringState,
    context::FrameContext,
    foundation::error::CineResult,
};

/// Side length of the offscreen cache target; cached models draw centered
/// at (500, 500) and are blitted at (-500, -500).
pub const CACHE_SIZE: u32 = 1000;

/// A registered model draw callable.
pub type ModelFn =
    Rc<dyn for<'b> Fn(&serde_json::Value, &mut FrameContext<'b>) -> CineResult<()>>;

/// Per-part placement override applied by [`FrameContext::part`].
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PartTransform {
    pub x: f64,
    pub y: f64,
    pub scale: f64,
    pub rotation: f64,
    pub opacity: f64,
}

impl Default for PartTransform {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            scale: 1.0,
            rotation: 0.0,
            opacity: 1.0,
        }
    }
}

/// Pointer callbacks fired when the pointer falls inside a model's hit circle.
#[derive(Default)]
pub struct Interaction<'a> {
    pub on_hover: Option<Box<dyn FnMut(f64, f64) + 'a>>,
    pub on_click: Option<Box<dyn FnMut(f64, f64) + 'a>>,
}

/// Placement and behavior for one [`FrameContext::draw_model`] call.
pub struct ModelOptions<'a> {
    pub x: f64,
    pub y: f64,
    pub scale: f64,
    pub rotation: f64,
    pub opacity: f64,
    pub flip_x: bool,
    pub flip_y: bool,
    /// Open-ended props handed to the draw callable.
    pub props: serde_json::Value,
    /// Per-part overrides looked up by [`FrameContext::part`].
    pub parts: HashMap<String, PartTransform>,
    /// Paint once into the offscreen cache and blit thereafter.
    pub cache: bool,
    pub interaction: Option<Interaction<'a>>,
    /// Instance id for persisted state; defaults to the model name.
    pub id: Option<String>,
}

impl Default for ModelOptions<'_> {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            scale: 1.0,
            rotation: 0.0,
            opacity: 1.0,
            flip_x: false,
            flip_y: false,
            props: serde_json::Value::Null,
            parts: HashMap::new(),
            cache: false,
            interaction: None,
            id: None,
        }
    }
}

impl ModelOptions<'_> {
    /// Placement-only options.
    pub fn at(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            ..Self::default()
        }
    }
}

/// Per-instance persisted values and springs.
#[derive(Clone, Debug, Default)]
pub struct InstanceState {
    values: HashMap<String, serde_json::Value>,
    springs: HashMap<String, SpringState>,
}

/// Persisted model registry, instance state and offscreen cache.
#[derive(Default)]
pub struct ModelStore {
    defs: HashMap<String, ModelFn>,
    instances: HashMap<String, InstanceState>,
    caches: HashMap<String, Arc<vello_cpu::Pixmap>>,
}

impl ModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a model; a replaced definition drops its cache.
    pub fn define(&mut self, name: impl Into<String>, draw: ModelFn) {
        let name = name.into();
        self.caches.remove(&name);
        self.defs.insert(name, draw);
    }

    /// The draw callable for `name`, cloned so the registry borrow can end
    /// before the callable runs.
    pub fn get(&self, name: &str) -> Option<ModelFn> {
        self.defs.get(name).cloned()
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.defs.contains_key(name)
    }

    /// Drop one model's cached pixmap, or all of them.
    pub fn clear_cache(&mut self, name: Option<&str>) {
        match name {
            Some(n) => {
                self.caches.remove(n);
            }
            None => self.caches.clear(),
        }
    }

    pub fn cached(&self, name: &str) -> Option<Arc<vello_cpu::Pixmap>> {
        self.caches.get(name).cloned()
    }

    pub fn insert_cache(&mut self, name: impl Into<String>, pixmap: Arc<vello_cpu::Pixmap>) {
        self.caches.insert(name.into(), pixmap);
    }

    /// Read a persisted instance value, seeding it with `initial` on first
    /// access.
    pub fn state_init(
        &mut self,
        instance: &str,
        key: &str,
        initial: serde_json::Value,
    ) -> serde_json::Value {
        let state = self.instances.entry(instance.to_owned()).or_default();
        state.values.entry(key.to_owned()).or_insert(initial).clone()
    }

    pub fn state_get(&self, instance: &str, key: &str) -> Option<&serde_json::Value> {
        self.instances.get(instance).and_then(|s| s.values.get(key))
    }

    pub fn state_set(&mut self, instance: &str, key: &str, value: serde_json::Value) {
        let state = self.instances.entry(instance.to_owned()).or_default();
        state.values.insert(key.to_owned(), value);
    }

    /// Spring state for `spring_{id}` under `instance`, if any.
    pub fn spring_get(&self, instance: &str, id: &str) -> Option<SpringState> {
        self.instances
            .get(instance)
            .and_then(|s| s.springs.get(id).copied())
    }

    pub fn spring_set(&mut self, instance: &str, id: &str, state: SpringState) {
        let inst = self.instances.entry(instance.to_owned()).or_default();
        inst.springs.insert(id.to_owned(), state);
    }
}
