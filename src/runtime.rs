//! Session state and the frame driver.
//!
//! A [`Runtime`] owns everything that survives between frames: the drawing
//! surface, the persisted subsystem state and the error log. Hosts feed it
//! [`FrameInputs`] plus the current script list and get pixels back. Nothing
//! in here touches wall-clock time; the offline driver advances the clock by
//! exactly one frame step per iteration so exports are deterministic.

use std::{collections::HashMap, sync::Arc};

use crate::{
    animation::spring::PhysicsStore,
    audio::AudioAnalysis,
    camera::CameraState,
    foundation::{
        core::{PointerState, RuntimeConfig},
        error::{CineResult, ErrorLog, ErrorSource},
    },
    fx::Particle,
    gui::{GuiControl, GuiStore},
    model::ModelStore,
    scheduler::{ScriptUnit, run_scripts},
    surface::{Surface, pixmap_from_premul_bytes},
};

/// State that persists across frames for one session.
///
/// Created once and never pruned by the frame loop; springs, GUI values and
/// model instances accumulate until the session ends.
#[derive(Default)]
pub struct RuntimeState {
    pub camera: CameraState,
    pub physics: PhysicsStore,
    pub particles: Vec<Particle>,
    pub gui: GuiStore,
    pub models: ModelStore,
}

/// A decoded image ready to draw.
#[derive(Clone)]
pub struct ImageAsset {
    pub pixmap: Arc<vello_cpu::Pixmap>,
}

impl ImageAsset {
    pub fn new(pixmap: Arc<vello_cpu::Pixmap>) -> Self {
        Self { pixmap }
    }

    /// Build from premultiplied RGBA8 bytes.
    pub fn from_premul_bytes(bytes: &[u8], width: u32, height: u32) -> CineResult<Self> {
        Ok(Self {
            pixmap: Arc::new(pixmap_from_premul_bytes(bytes, width, height)?),
        })
    }
}

/// Prepared per-frame assets, produced by host collaborators. The runtime
/// never decodes media itself.
#[derive(Clone, Default)]
pub struct FrameAssets {
    pub images: HashMap<String, ImageAsset>,
    pub analyses: HashMap<String, AudioAnalysis>,
}

impl FrameAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_image(&mut self, name: impl Into<String>, image: ImageAsset) {
        self.images.insert(name.into(), image);
    }

    pub fn insert_analysis(&mut self, name: impl Into<String>, analysis: AudioAnalysis) {
        self.analyses.insert(name.into(), analysis);
    }
}

/// Everything the driver supplies for one frame.
pub struct FrameInputs<'a> {
    /// Global media time in seconds.
    pub time: f64,
    /// Seconds since the previous frame.
    pub delta_time: f64,
    pub pointer: PointerState,
    pub assets: &'a FrameAssets,
    /// Previous frame's pixels for feedback effects.
    pub prev_frame: Option<&'a vello_cpu::Pixmap>,
}

/// What a rendered frame reported back to the host.
#[derive(Debug, Default)]
pub struct FrameReport {
    /// GUI controls declared by the scripts that ran, in call order.
    pub controls: Vec<GuiControl>,
}

/// The per-session frame driver.
pub struct Runtime {
    config: RuntimeConfig,
    surface: Surface,
    state: RuntimeState,
    errors: ErrorLog,
}

impl Runtime {
    /// Build a runtime with a surface sized to `config`.
    pub fn new(config: RuntimeConfig) -> CineResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            surface: Surface::new(config.width, config.height)?,
            state: RuntimeState::default(),
            errors: ErrorLog::new(),
        })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Apply a config change between frames, resizing the surface when the
    /// dimensions moved. Persisted state is kept.
    pub fn set_config(&mut self, config: RuntimeConfig) -> CineResult<()> {
        config.validate()?;
        if config.width != self.config.width || config.height != self.config.height {
            self.surface.resize(config.width, config.height)?;
        }
        self.config = config;
        Ok(())
    }

    pub fn state(&self) -> &RuntimeState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut RuntimeState {
        &mut self.state
    }

    pub fn errors(&self) -> &ErrorLog {
        &self.errors
    }

    /// Drop retained error events, optionally for one source only.
    pub fn clear_errors(&mut self, source: Option<ErrorSource>) {
        self.errors.clear(source);
    }

    /// Premultiplied RGBA8 pixels of the last rendered frame.
    pub fn pixels(&mut self) -> &[u8] {
        self.surface.pixels()
    }

    /// Owned copy of the last rendered frame.
    pub fn snapshot(&mut self) -> vello_cpu::Pixmap {
        self.surface.snapshot()
    }

    /// Render one frame: clear to the configured background, run every
    /// script in window, flush the surface.
    #[tracing::instrument(skip_all, fields(time = inputs.time))]
    pub fn render_frame(
        &mut self,
        inputs: FrameInputs<'_>,
        scripts: &[ScriptUnit],
    ) -> CineResult<FrameReport> {
        self.surface.begin_frame(self.config.background);

        let controls = run_scripts(
            &self.config,
            scripts,
            inputs.time,
            inputs.delta_time,
            inputs.pointer,
            &mut self.surface,
            &mut self.state,
            inputs.assets,
            inputs.prev_frame,
            &mut self.errors,
        );

        self.surface.flush();
        Ok(FrameReport { controls })
    }
}

/// Drive a deterministic offline render: time advances by exactly `1/fps`
/// per frame, each finished frame is handed to `on_frame` as premultiplied
/// RGBA8 bytes, and the previous frame feeds the next one's snapshot.
pub fn render_offline(
    runtime: &mut Runtime,
    scripts: &[ScriptUnit],
    assets: &FrameAssets,
    mut on_frame: impl FnMut(u64, &[u8]) -> CineResult<()>,
) -> CineResult<()> {
    let fps = runtime.config.fps;
    let step = 1.0 / fps;
    let total_frames = (runtime.config.duration * fps).round() as u64;

    let mut prev: Option<vello_cpu::Pixmap> = None;
    for frame in 0..total_frames {
        let time = frame as f64 * step;
        let inputs = FrameInputs {
            time,
            delta_time: step,
            pointer: PointerState::default(),
            assets,
            prev_frame: prev.as_ref(),
        };
        runtime.render_frame(inputs, scripts)?;
        on_frame(frame, runtime.surface.pixels())?;
        prev = Some(runtime.surface.snapshot());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        foundation::color::Color,
        scheduler::{ScriptMeta, ScriptPhase},
        surface::ShapeOptions,
    };
    use std::rc::Rc;

    fn config() -> RuntimeConfig {
        RuntimeConfig::new(32, 32, 30.0, 1.0).unwrap()
    }

    fn noisy_script() -> ScriptUnit {
        ScriptUnit::new(
            "s1",
            "noisy",
            0.0,
            ScriptMeta::with_duration(10.0),
            Rc::new(|ctx| {
                for _ in 0..8 {
                    let x = ctx.rand() * ctx.width();
                    let y = ctx.rand() * ctx.height();
                    ctx.surface()
                        .rect(x, y, 4.0, 4.0, 0.0, &ShapeOptions::filled(Color::WHITE));
                }
                Ok(ScriptPhase::Done)
            }),
        )
    }

    fn frame_inputs(time: f64, assets: &FrameAssets) -> FrameInputs<'_> {
        FrameInputs {
            time,
            delta_time: 1.0 / 30.0,
            pointer: PointerState::default(),
            assets,
            prev_frame: None,
        }
    }

    #[test]
    fn identical_sessions_render_identical_pixels() {
        let assets = FrameAssets::default();
        let scripts = [noisy_script()];

        let mut a = Runtime::new(config()).unwrap();
        let mut b = Runtime::new(config()).unwrap();
        a.render_frame(frame_inputs(0.5, &assets), &scripts).unwrap();
        b.render_frame(frame_inputs(0.5, &assets), &scripts).unwrap();
        assert_eq!(a.pixels(), b.pixels());
    }

    #[test]
    fn background_clears_each_frame() {
        let assets = FrameAssets::default();
        let mut rt = Runtime::new(config()).unwrap();
        let scripts = [noisy_script()];
        rt.render_frame(frame_inputs(0.0, &assets), &scripts).unwrap();
        // A frame with no scripts in window leaves only the background.
        rt.render_frame(frame_inputs(20.0, &assets), &[]).unwrap();
        let px = rt.pixels();
        for chunk in px.chunks_exact(4) {
            assert_eq!(chunk, Color::BLACK.to_premul());
        }
    }

    #[test]
    fn particles_advance_once_per_frame() {
        let assets = FrameAssets::default();
        let mut rt = Runtime::new(config()).unwrap();
        rt.state_mut().particles.push(crate::fx::Particle {
            x: 0.0,
            y: 0.0,
            vx: 2.0,
            vy: 0.0,
            life: 1.0,
            max_life: 1.0,
            size: 2.0,
            color: Color::WHITE,
        });
        let idle = |id: &str| {
            ScriptUnit::new(
                id,
                id,
                0.0,
                ScriptMeta::with_duration(10.0),
                Rc::new(|_ctx| Ok(ScriptPhase::Done)),
            )
        };

        // Two scripts in window: still one integration step.
        let scripts = [idle("a"), idle("b")];
        let inputs = FrameInputs {
            time: 0.0,
            delta_time: 0.1,
            pointer: PointerState::default(),
            assets: &assets,
            prev_frame: None,
        };
        rt.render_frame(inputs, &scripts).unwrap();
        let p = rt.state().particles[0];
        assert!((p.life - 0.9).abs() < 1e-9, "double-stepped: {}", p.life);
        assert!((p.x - 2.0).abs() < 1e-9);

        // No scripts in window: the system still advances.
        let inputs = FrameInputs {
            time: 0.1,
            delta_time: 0.1,
            pointer: PointerState::default(),
            assets: &assets,
            prev_frame: None,
        };
        rt.render_frame(inputs, &[]).unwrap();
        let p = rt.state().particles[0];
        assert!((p.life - 0.8).abs() < 1e-9);
        assert!((p.x - 4.0).abs() < 1e-9);
    }

    #[test]
    fn set_config_resizes_but_keeps_state() {
        let mut rt = Runtime::new(config()).unwrap();
        rt.state_mut().physics.set("x", 4.0);
        let bigger = RuntimeConfig::new(64, 64, 30.0, 1.0).unwrap();
        rt.set_config(bigger).unwrap();
        assert_eq!(rt.pixels().len(), 64 * 64 * 4);
        assert_eq!(rt.state().physics.get("x"), 4.0);
    }

    #[test]
    fn offline_render_visits_every_frame_once() {
        let assets = FrameAssets::default();
        let mut rt = Runtime::new(config()).unwrap();
        let scripts = [noisy_script()];
        let mut frames = Vec::new();
        render_offline(&mut rt, &scripts, &assets, |frame, pixels| {
            frames.push((frame, pixels.len()));
            Ok(())
        })
        .unwrap();
        assert_eq!(frames.len(), 30);
        assert_eq!(frames.first(), Some(&(0, 32 * 32 * 4)));
        assert_eq!(frames.last(), Some(&(29, 32 * 32 * 4)));
    }

    #[test]
    fn offline_render_feeds_previous_frame() {
        let assets = FrameAssets::default();
        let cfg = RuntimeConfig::new(8, 8, 4.0, 1.0).unwrap();
        let mut rt = Runtime::new(cfg).unwrap();
        let scripts = [ScriptUnit::new(
            "s1",
            "feedback",
            0.0,
            ScriptMeta::with_duration(10.0),
            Rc::new(|ctx| {
                let prev = ctx.get_pixel(0, 0);
                ctx.set_model_state("saw_prev", serde_json::json!(prev.a != 0));
                ctx.surface()
                    .rect(0.0, 0.0, 8.0, 8.0, 0.0, &ShapeOptions::filled(Color::WHITE));
                Ok(ScriptPhase::Done)
            }),
        )];
        render_offline(&mut rt, &scripts, &assets, |_, _| Ok(())).unwrap();
        // By the second frame the snapshot of frame one is visible.
        assert_eq!(
            rt.state().models.state_get("default", "saw_prev"),
            Some(&serde_json::json!(true))
        );
    }
}
