//! Script scheduling.
//!
//! Each enabled script owns a time window `[start, start + duration)` on the
//! global clock. Inside its window a script runs with a local clock and may
//! override presentation metadata for the duration of its invocation. A
//! script failure is contained, reported, and retried on the next frame;
//! later scripts still run.

use std::rc::Rc;

use crate::{
    context::{FrameContext, FrameSynth},
    foundation::{
        core::{Background, PointerState, RuntimeConfig},
        error::{CineResult, ErrorEvent, ErrorLog},
    },
    fx,
    gui::GuiControl,
    runtime::{FrameAssets, RuntimeState},
    surface::{ShapeOptions, Surface},
};

/// Presentation metadata a script may carry.
#[derive(Clone, Copy, Debug, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ScriptMeta {
    /// Length of the script's window in seconds.
    pub duration: f64,
    /// Optional overrides applied to the context for this script only.
    pub fps: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub background: Option<Background>,
}

impl ScriptMeta {
    /// Window of `duration` seconds with no overrides.
    pub fn with_duration(duration: f64) -> Self {
        Self {
            duration,
            ..Self::default()
        }
    }
}

/// Second phase of a two-phase script: a render callable returned from setup
/// and invoked once, immediately, with the same local context.
pub type RenderFn = Box<dyn for<'b> FnOnce(&mut FrameContext<'b>) -> CineResult<()>>;

/// What a script invocation produced.
pub enum ScriptPhase {
    /// The script drew everything itself.
    Done,
    /// The script returned a render phase to run now.
    Render(RenderFn),
}

/// A compiled script callable, invoked once per frame while in its window.
pub type ScriptFn = Rc<dyn for<'b> Fn(&mut FrameContext<'b>) -> CineResult<ScriptPhase>>;

/// One schedulable script.
pub struct ScriptUnit {
    /// Stable id used in error reports.
    pub id: String,
    /// Display name used in error messages.
    pub name: String,
    pub enabled: bool,
    /// Global start of the script's window, seconds.
    pub start_offset: f64,
    pub meta: ScriptMeta,
    pub callable: ScriptFn,
}

impl ScriptUnit {
    /// Enabled unit starting at `start_offset` with the given window.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        start_offset: f64,
        meta: ScriptMeta,
        callable: ScriptFn,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            enabled: true,
            start_offset,
            meta,
            callable,
        }
    }
}

/// Turns script source into callables. The runtime only consumes callables;
/// hosts inject whatever compilation pipeline they have.
pub trait ScriptCompiler {
    fn compile(&self, source: &str) -> CineResult<ScriptFn>;
}

/// The once-per-frame pass: advance and draw the persisted particles, then
/// run every script whose window contains `time`. All invocations in the
/// frame share one PRNG, one noise field and one start-of-frame camera
/// snapshot. Returns the GUI controls declared by the scripts that ran, in
/// declaration order.
#[allow(clippy::too_many_arguments)]
pub fn run_scripts(
    config: &RuntimeConfig,
    scripts: &[ScriptUnit],
    time: f64,
    delta_time: f64,
    pointer: PointerState,
    surface: &mut Surface,
    state: &mut RuntimeState,
    assets: &FrameAssets,
    prev_frame: Option<&vello_cpu::Pixmap>,
    errors: &mut ErrorLog,
) -> Vec<GuiControl> {
    let mut controls = Vec::new();

    // Particles move exactly once per frame, even when no script is in
    // window, and render beneath whatever the scripts draw.
    fx::step_and_draw(&mut state.particles, delta_time, surface);
    let mut synth = FrameSynth::new(state.camera);

    for unit in scripts {
        if !unit.enabled {
            continue;
        }
        let local_time = time - unit.start_offset;
        if local_time < 0.0 || local_time >= unit.meta.duration {
            continue;
        }

        let mut effective = *config;
        if let Some(fps) = unit.meta.fps {
            effective.fps = fps;
        }
        if let Some(width) = unit.meta.width {
            effective.width = width;
        }
        if let Some(height) = unit.meta.height {
            effective.height = height;
        }
        effective.duration = unit.meta.duration;
        if let Some(background) = unit.meta.background {
            effective.background = background;
        }

        surface.save();
        if let Some(Background::Color(color)) = unit.meta.background {
            let (w, h) = (f64::from(surface.width()), f64::from(surface.height()));
            surface.rect(0.0, 0.0, w, h, 0.0, &ShapeOptions::filled(color));
        }

        let mut ctx = FrameContext::new(
            &effective,
            local_time,
            delta_time,
            pointer,
            &mut synth,
            surface,
            state,
            assets,
            prev_frame,
        );

        let callable = Rc::clone(&unit.callable);
        let outcome = callable(&mut ctx).and_then(|phase| match phase {
            ScriptPhase::Done => Ok(()),
            ScriptPhase::Render(render) => render(&mut ctx),
        });

        controls.extend(ctx.into_controls());
        surface.restore();

        if let Err(err) = outcome {
            let event = ErrorEvent::runtime(
                format!("runtime error in \"{}\": {err}", unit.name),
                Some(unit.id.clone()),
            );
            errors.report(event, time);
        }
    }

    controls
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::color::Color;

    fn config() -> RuntimeConfig {
        RuntimeConfig::new(32, 32, 30.0, 10.0).unwrap()
    }

    fn harness() -> (Surface, RuntimeState, FrameAssets, ErrorLog) {
        let mut surface = Surface::new(32, 32).unwrap();
        surface.begin_frame(Background::Transparent);
        (
            surface,
            RuntimeState::default(),
            FrameAssets::default(),
            ErrorLog::new(),
        )
    }

    fn run_at(
        time: f64,
        scripts: &[ScriptUnit],
        surface: &mut Surface,
        state: &mut RuntimeState,
        assets: &FrameAssets,
        errors: &mut ErrorLog,
    ) -> Vec<GuiControl> {
        run_scripts(
            &config(),
            scripts,
            time,
            1.0 / 30.0,
            PointerState::default(),
            surface,
            state,
            assets,
            None,
            errors,
        )
    }

    fn marker_script(value: f64) -> ScriptFn {
        Rc::new(move |ctx| {
            ctx.set_model_state("ran_at", serde_json::json!(value));
            Ok(ScriptPhase::Done)
        })
    }

    #[test]
    fn window_bounds_are_half_open() {
        let (mut surface, mut state, assets, mut errors) = harness();
        let unit = ScriptUnit::new(
            "s1",
            "windowed",
            2.0,
            ScriptMeta::with_duration(3.0),
            Rc::new(|ctx| {
                let n = ctx
                    .model_state("runs", serde_json::json!(0))
                    .as_i64()
                    .unwrap_or(0);
                ctx.set_model_state("runs", serde_json::json!(n + 1));
                Ok(ScriptPhase::Done)
            }),
        );
        let scripts = [unit];

        for t in [1.99, 5.0, 5.1] {
            run_at(t, &scripts, &mut surface, &mut state, &assets, &mut errors);
        }
        assert!(state.models.state_get("default", "runs").is_none());

        for t in [2.0, 3.5, 4.999] {
            run_at(t, &scripts, &mut surface, &mut state, &assets, &mut errors);
        }
        assert_eq!(
            state.models.state_get("default", "runs"),
            Some(&serde_json::json!(3))
        );
    }

    #[test]
    fn local_clock_starts_at_window_start() {
        let (mut surface, mut state, assets, mut errors) = harness();
        let unit = ScriptUnit::new(
            "s1",
            "local-clock",
            2.0,
            ScriptMeta::with_duration(4.0),
            Rc::new(|ctx| {
                ctx.set_model_state("local_time", serde_json::json!(ctx.vars.time));
                ctx.set_model_state("progress", serde_json::json!(ctx.vars.progress));
                Ok(ScriptPhase::Done)
            }),
        );
        run_at(3.0, &[unit], &mut surface, &mut state, &assets, &mut errors);
        assert_eq!(
            state.models.state_get("default", "local_time"),
            Some(&serde_json::json!(1.0))
        );
        assert_eq!(
            state.models.state_get("default", "progress"),
            Some(&serde_json::json!(0.25))
        );
    }

    #[test]
    fn meta_overrides_reach_the_context() {
        let (mut surface, mut state, assets, mut errors) = harness();
        let meta = ScriptMeta {
            duration: 5.0,
            fps: Some(60.0),
            width: Some(640),
            height: Some(360),
            background: None,
        };
        let unit = ScriptUnit::new(
            "s1",
            "overridden",
            0.0,
            meta,
            Rc::new(|ctx| {
                ctx.set_model_state("fps", serde_json::json!(ctx.vars.fps));
                ctx.set_model_state("width", serde_json::json!(ctx.vars.width));
                Ok(ScriptPhase::Done)
            }),
        );
        run_at(1.0, &[unit], &mut surface, &mut state, &assets, &mut errors);
        assert_eq!(
            state.models.state_get("default", "fps"),
            Some(&serde_json::json!(60.0))
        );
        assert_eq!(
            state.models.state_get("default", "width"),
            Some(&serde_json::json!(640.0))
        );
    }

    #[test]
    fn failing_script_is_isolated_and_reported() {
        let (mut surface, mut state, assets, mut errors) = harness();
        let bad = ScriptUnit::new(
            "bad-id",
            "exploder",
            0.0,
            ScriptMeta::with_duration(10.0),
            Rc::new(|_ctx| Err(crate::foundation::error::CineError::runtime("boom"))),
        );
        let good = ScriptUnit::new(
            "good-id",
            "survivor",
            0.0,
            ScriptMeta::with_duration(10.0),
            marker_script(1.0),
        );
        run_at(
            0.5,
            &[bad, good],
            &mut surface,
            &mut state,
            &assets,
            &mut errors,
        );

        assert_eq!(
            state.models.state_get("default", "ran_at"),
            Some(&serde_json::json!(1.0))
        );
        let events = errors.events();
        assert_eq!(events.len(), 1);
        assert!(events[0].message.contains("exploder"));
        assert!(events[0].message.contains("boom"));
        assert_eq!(events[0].asset_id.as_deref(), Some("bad-id"));
    }

    #[test]
    fn failing_script_retries_next_frame() {
        let (mut surface, mut state, assets, mut errors) = harness();
        let scripts = [ScriptUnit::new(
            "bad-id",
            "exploder",
            0.0,
            ScriptMeta::with_duration(10.0),
            Rc::new(|ctx| {
                let n = ctx
                    .model_state("attempts", serde_json::json!(0))
                    .as_i64()
                    .unwrap_or(0);
                ctx.set_model_state("attempts", serde_json::json!(n + 1));
                Err(crate::foundation::error::CineError::runtime("boom"))
            }),
        )];
        run_at(0.0, &scripts, &mut surface, &mut state, &assets, &mut errors);
        run_at(
            1.0 / 30.0,
            &scripts,
            &mut surface,
            &mut state,
            &assets,
            &mut errors,
        );
        assert_eq!(
            state.models.state_get("default", "attempts"),
            Some(&serde_json::json!(2))
        );
        // The identical message within the suppression window is deduped.
        assert_eq!(errors.events().len(), 1);
    }

    #[test]
    fn render_phase_runs_immediately() {
        let (mut surface, mut state, assets, mut errors) = harness();
        let unit = ScriptUnit::new(
            "s1",
            "two-phase",
            0.0,
            ScriptMeta::with_duration(10.0),
            Rc::new(|ctx| {
                ctx.set_model_state("setup", serde_json::json!(true));
                Ok(ScriptPhase::Render(Box::new(|ctx| {
                    ctx.set_model_state("render", serde_json::json!(true));
                    Ok(())
                })))
            }),
        );
        run_at(0.0, &[unit], &mut surface, &mut state, &assets, &mut errors);
        assert_eq!(
            state.models.state_get("default", "setup"),
            Some(&serde_json::json!(true))
        );
        assert_eq!(
            state.models.state_get("default", "render"),
            Some(&serde_json::json!(true))
        );
    }

    #[test]
    fn scripts_share_the_frame_prng() {
        let (mut surface, mut state, assets, mut errors) = harness();
        let draw_rand = |slot: &'static str| -> ScriptFn {
            Rc::new(move |ctx| {
                let r = ctx.rand();
                ctx.set_model_state(slot, serde_json::json!(r));
                Ok(ScriptPhase::Done)
            })
        };
        let scripts = [
            ScriptUnit::new(
                "s1",
                "first",
                0.0,
                ScriptMeta::with_duration(10.0),
                draw_rand("a"),
            ),
            ScriptUnit::new(
                "s2",
                "second",
                0.0,
                ScriptMeta::with_duration(10.0),
                draw_rand("b"),
            ),
        ];
        run_at(0.0, &scripts, &mut surface, &mut state, &assets, &mut errors);
        let a = state.models.state_get("default", "a").cloned();
        let b = state.models.state_get("default", "b").cloned();
        assert!(a.is_some());
        // Identical scripts in one frame continue one sequence instead of
        // replaying it.
        assert_ne!(a, b);
    }

    #[test]
    fn camera_snapshot_holds_for_the_whole_frame() {
        let (mut surface, mut state, assets, mut errors) = harness();
        let scripts = [
            ScriptUnit::new(
                "s1",
                "mover",
                0.0,
                ScriptMeta::with_duration(10.0),
                Rc::new(|ctx| {
                    ctx.camera_follow(100.0, 0.0, 0.5);
                    Ok(ScriptPhase::Done)
                }),
            ),
            ScriptUnit::new(
                "s2",
                "reader",
                0.0,
                ScriptMeta::with_duration(10.0),
                Rc::new(|ctx| {
                    ctx.set_model_state("cam_x", serde_json::json!(ctx.camera().x));
                    Ok(ScriptPhase::Done)
                }),
            ),
        ];
        run_at(0.0, &scripts, &mut surface, &mut state, &assets, &mut errors);
        // The second script still sees the start-of-frame camera.
        assert_eq!(
            state.models.state_get("default", "cam_x"),
            Some(&serde_json::json!(0.0))
        );
        // The follow landed in the persisted camera for the next frame.
        assert!(state.camera.x > 0.0);
    }

    #[test]
    fn meta_background_fills_before_the_script() {
        let (mut surface, mut state, assets, mut errors) = harness();
        let meta = ScriptMeta {
            duration: 5.0,
            background: Some(Background::Color(Color::rgb(0, 0, 255))),
            ..ScriptMeta::default()
        };
        let unit = ScriptUnit::new(
            "s1",
            "bg",
            0.0,
            meta,
            Rc::new(|_ctx| Ok(ScriptPhase::Done)),
        );
        run_at(0.0, &[unit], &mut surface, &mut state, &assets, &mut errors);
        assert_eq!(surface.get_pixel(16, 16), Color::rgb(0, 0, 255));
    }

    #[test]
    fn disabled_scripts_are_skipped() {
        let (mut surface, mut state, assets, mut errors) = harness();
        let mut unit = ScriptUnit::new(
            "s1",
            "off",
            0.0,
            ScriptMeta::with_duration(10.0),
            marker_script(1.0),
        );
        unit.enabled = false;
        run_at(0.5, &[unit], &mut surface, &mut state, &assets, &mut errors);
        assert!(state.models.state_get("default", "ran_at").is_none());
    }
}
