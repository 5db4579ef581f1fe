//! Cinescript is a deterministic scripting runtime for cinematic 2D motion
//! graphics.
//!
//! Scripts are host-compiled callables invoked once per frame with a
//! synthesized [`FrameContext`]: a frame clock, a seeded PRNG and noise
//! field, an immediate-mode drawing surface, prepared image/audio assets and
//! mutable access to the persisted session state (camera, springs,
//! particles, GUI values, model instances).
//!
//! # Frame pipeline
//!
//! 1. **Clear**: the surface resets to the configured background
//! 2. **Advance**: persisted particles integrate and draw exactly once,
//!    and the frame's shared PRNG, noise field and camera snapshot are
//!    synthesized from the fixed seed
//! 3. **Schedule**: every enabled script whose window contains the current
//!    time runs with a local clock and optional metadata overrides,
//!    continuing the shared sequence so identical inputs draw identical
//!    pixels
//! 4. **Flush**: pending draws composite over the premultiplied RGBA8 buffer
//!
//! The key design constraints:
//!
//! - **No unsafe**: `unsafe` is forbidden in this crate.
//! - **Deterministic-by-default**: no wall-clock reads; randomness is a pure
//!   function of the seed and call order.
//! - **No IO**: hosts decode media and compile scripts; the runtime only
//!   consumes prepared assets and callables.
//! - **Premultiplied RGBA8** end-to-end.
#![forbid(unsafe_code)]

mod camera;
mod context;
mod foundation;
mod gui;
mod model;
mod scheduler;
mod surface;

/// Easing curves and frame-coupled spring integration.
pub mod animation;
/// Spectral audio analysis (FFT, offline and live analyzers).
pub mod audio;
/// Particles and screen-space post filters.
pub mod fx;
/// Seeded PRNG and coherent noise.
pub mod rand;
/// Session state and the frame drivers.
pub mod runtime;
/// Declarative scheduling primitives over the frame clock.
pub mod timeline;

pub use animation::ease::Ease;
pub use animation::spring::{
    PhysicsStore, SpringSettings, SpringState, lerp_angle, look_at, spring_step,
};
pub use audio::{AudioAnalysis, OfflineAnalyzer, live_analysis};
pub use camera::{CameraState, shake_offset};
pub use context::{FrameContext, FrameSynth, FrameVars, ImageDrawOptions};
pub use foundation::color::{Color, palette};
pub use foundation::core::{Background, PointerState, RuntimeConfig};
pub use foundation::error::{CineError, CineResult, ErrorEvent, ErrorLog, ErrorSource};
pub use foundation::math::{deg_to_rad, lerp, rad_to_deg, remap, step};
pub use fx::{Particle, ParticleKind};
pub use gui::{GuiControl, GuiControlKind, GuiFrame, GuiStore, GuiValue};
pub use model::{Interaction, ModelFn, ModelOptions, ModelStore, PartTransform};
pub use runtime::{
    FrameAssets, FrameInputs, FrameReport, ImageAsset, Runtime, RuntimeState, render_offline,
};
pub use scheduler::{
    RenderFn, ScriptCompiler, ScriptFn, ScriptMeta, ScriptPhase, ScriptUnit, run_scripts,
};
pub use surface::{ShapeOptions, Surface, pixmap_from_premul_bytes};
pub use timeline::{Timeline, active_scene, range_value};
