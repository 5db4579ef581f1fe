//! Per-frame context synthesis.
//!
//! A [`FrameContext`] is rebuilt for every script invocation. It bundles the
//! frame clock, the drawing surface, prepared assets, mutable access to the
//! persisted [`RuntimeState`], and a borrow of the frame's shared
//! [`FrameSynth`]: one seeded PRNG, one noise field and one camera snapshot
//! built per frame and threaded through every invocation. Everything a
//! script touches flows through this one value, which is what keeps frames
//! reproducible: same seed, same call order, same pixels.

use std::{rc::Rc, sync::Arc};

use kurbo::Rect;

use crate::{
    animation::{
        ease::Ease,
        spring::{SpringSettings, spring_step},
    },
    audio::AudioAnalysis,
    camera::{CameraState, shake_offset},
    foundation::{
        color::Color,
        core::{Background, PointerState, RuntimeConfig},
        error::CineResult,
    },
    fx::{self, ParticleKind},
    gui::{GuiControl, GuiFrame},
    model::{CACHE_SIZE, ModelOptions, PartTransform},
    rand::{Noise, Rand},
    runtime::{FrameAssets, RuntimeState},
    surface::{Surface, unpremul},
    timeline::{Timeline, active_scene, range_value},
};

/// Context seed. Fixed so identical scripts at identical times draw
/// identical frames.
const CONTEXT_SEED: u32 = 12345;

/// Per-frame resources shared by every script invocation: the PRNG and
/// noise field (built once from the fixed seed, the noise table consuming
/// the first 256 draws) and the camera as it stood when the frame began.
pub struct FrameSynth {
    pub rand: Rand,
    pub noise: Noise,
    pub camera: CameraState,
}

impl FrameSynth {
    /// Build the frame's shared resources around a start-of-frame camera
    /// snapshot.
    pub fn new(camera: CameraState) -> Self {
        let mut rand = Rand::new(CONTEXT_SEED);
        let noise = Noise::new(&mut rand);
        Self {
            rand,
            noise,
            camera,
        }
    }
}

/// Center offset of the model offscreen cache target.
const CACHE_CENTER: f64 = CACHE_SIZE as f64 / 2.0;

/// Clock and geometry variables for the current invocation.
#[derive(Clone, Copy, Debug)]
pub struct FrameVars {
    /// Local time in seconds.
    pub time: f64,
    /// Frame index, `floor(time * fps)`.
    pub frame: u64,
    /// Normalized progress through the duration, clamped to `[0,1]`.
    pub progress: f64,
    /// How many whole durations have elapsed.
    pub loop_count: u64,
    /// Seconds since the previous frame.
    pub delta_time: f64,
    pub width: f64,
    pub height: f64,
    pub fps: f64,
    pub duration: f64,
}

impl FrameVars {
    fn new(config: &RuntimeConfig, time: f64, delta_time: f64) -> Self {
        let (progress, loop_count) = if config.duration > 0.0 {
            (
                (time / config.duration).clamp(0.0, 1.0),
                (time / config.duration).floor().max(0.0) as u64,
            )
        } else {
            (0.0, 0)
        };
        Self {
            time,
            frame: config.frame_at(time),
            progress,
            loop_count,
            delta_time,
            width: f64::from(config.width),
            height: f64::from(config.height),
            fps: config.fps,
            duration: config.duration,
        }
    }
}

/// Options for [`FrameContext::draw_image`].
#[derive(Clone, Copy, Debug)]
pub struct ImageDrawOptions {
    pub opacity: f64,
    pub flip_x: bool,
    pub flip_y: bool,
    /// Source crop in image pixels.
    pub crop: Option<Rect>,
}

impl Default for ImageDrawOptions {
    fn default() -> Self {
        Self {
            opacity: 1.0,
            flip_x: false,
            flip_y: false,
            crop: None,
        }
    }
}

/// The per-invocation script interface.
pub struct FrameContext<'a> {
    /// Frame clock and geometry.
    pub vars: FrameVars,
    /// Pointer state in surface coordinates.
    pub pointer: PointerState,
    synth: &'a mut FrameSynth,
    surface: &'a mut Surface,
    state: &'a mut RuntimeState,
    assets: &'a FrameAssets,
    prev_frame: Option<&'a vello_cpu::Pixmap>,
    timeline: Timeline,
    controls: GuiFrame,
    current_instance: Option<String>,
    current_parts: std::collections::HashMap<String, PartTransform>,
    silent_audio: AudioAnalysis,
}

impl<'a> FrameContext<'a> {
    /// Synthesize the context for one invocation around the frame's shared
    /// [`FrameSynth`].
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &RuntimeConfig,
        time: f64,
        delta_time: f64,
        pointer: PointerState,
        synth: &'a mut FrameSynth,
        surface: &'a mut Surface,
        state: &'a mut RuntimeState,
        assets: &'a FrameAssets,
        prev_frame: Option<&'a vello_cpu::Pixmap>,
    ) -> Self {
        let vars = FrameVars::new(config, time, delta_time);
        Self {
            vars,
            pointer,
            synth,
            surface,
            state,
            assets,
            prev_frame,
            timeline: Timeline::new(time, config.frame_at(time), config.fps),
            controls: GuiFrame::new(),
            current_instance: None,
            current_parts: std::collections::HashMap::new(),
            silent_audio: AudioAnalysis::silent(
                crate::audio::analysis::FFT_SIZE / 2,
                crate::audio::analysis::FFT_SIZE,
            ),
        }
    }

    // --- geometry ---

    pub fn width(&self) -> f64 {
        self.vars.width
    }

    pub fn height(&self) -> f64 {
        self.vars.height
    }

    pub fn center_x(&self) -> f64 {
        self.vars.width / 2.0
    }

    pub fn center_y(&self) -> f64 {
        self.vars.height / 2.0
    }

    pub fn min_dim(&self) -> f64 {
        self.vars.width.min(self.vars.height)
    }

    pub fn max_dim(&self) -> f64 {
        self.vars.width.max(self.vars.height)
    }

    pub fn aspect(&self) -> f64 {
        self.vars.width / self.vars.height
    }

    pub fn is_first_frame(&self) -> bool {
        self.vars.frame == 0
    }

    pub fn is_last_frame(&self) -> bool {
        let total = (self.vars.duration * self.vars.fps).round() as u64;
        total > 0 && self.vars.frame + 1 >= total
    }

    // --- randomness ---

    /// Next draw from the frame's shared PRNG, in `[0,1)`.
    pub fn rand(&mut self) -> f64 {
        self.synth.rand.next()
    }

    /// Coherent noise sample, roughly `[-1,1]`.
    pub fn noise(&self, x: f64, y: f64, z: f64) -> f64 {
        self.synth.noise.sample(x, y, z)
    }

    // --- interpolation helpers ---

    /// Evaluate an easing curve.
    pub fn ease(&self, ease: Ease, t: f64) -> f64 {
        ease.apply(t)
    }

    /// Evaluate an easing curve by script name; unknown names fall back to
    /// linear.
    pub fn ease_named(&self, name: &str, t: f64) -> f64 {
        Ease::by_name(name).unwrap_or(Ease::Linear).apply(t)
    }

    /// Clamped progress of the clock through `[start, end]`.
    pub fn range(&self, start: f64, end: f64) -> f64 {
        range_value(self.vars.time, start, end)
    }

    pub fn lerp(&self, a: f64, b: f64, t: f64) -> f64 {
        crate::foundation::math::lerp(a, b, t)
    }

    pub fn remap(&self, v: f64, in_min: f64, in_max: f64, out_min: f64, out_max: f64) -> f64 {
        crate::foundation::math::remap(v, in_min, in_max, out_min, out_max)
    }

    pub fn step(&self, t: f64, count: f64) -> f64 {
        crate::foundation::math::step(t, count)
    }

    // --- timeline ---

    /// Run `f` while the clock sits inside the next `duration` seconds of
    /// cursor time; the cursor advances either way.
    pub fn play(&mut self, duration: f64, f: impl FnOnce(&mut Self, f64)) {
        if let Some(t) = self.timeline.play_window(duration) {
            f(self, t);
        }
    }

    /// Reset the `play` cursor.
    pub fn rewind(&mut self) {
        self.timeline.rewind();
    }

    /// Run `f` exactly on the frame containing time `t`.
    pub fn at(&mut self, t: f64, f: impl FnOnce(&mut Self)) {
        if self.timeline.hits_frame(t) {
            f(self);
        }
    }

    /// Run `f` with clamped progress while the clock sits in `[start, end]`.
    pub fn range_run(&mut self, start: f64, end: f64, f: impl FnOnce(&mut Self, f64)) {
        if let Some(t) = self.timeline.range_window(start, end) {
            f(self, t);
        }
    }

    /// Run the scene owning the current time, if any. At most one scene
    /// fires per frame; the last scene also owns its upper bound.
    pub fn sequence(&mut self, scenes: &mut [(f64, &mut dyn FnMut(&mut Self, f64))]) {
        let durations: Vec<f64> = scenes.iter().map(|(d, _)| *d).collect();
        if let Some((i, t)) = active_scene(self.vars.time, &durations) {
            (scenes[i].1)(self, t);
        }
    }

    // --- surface access ---

    /// The drawing surface.
    pub fn surface(&mut self) -> &mut Surface {
        self.surface
    }

    /// Save/draw/restore wrapper, mirroring the surface guard.
    pub fn with_save<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.surface.save();
        let out = f(self);
        self.surface.restore();
        out
    }

    /// Straight-alpha pixel of the previous frame; transparent when no
    /// snapshot exists or the point is out of bounds.
    pub fn get_pixel(&self, x: i64, y: i64) -> Color {
        let Some(prev) = self.prev_frame else {
            return Color::TRANSPARENT;
        };
        let (w, h) = (i64::from(prev.width()), i64::from(prev.height()));
        if x < 0 || y < 0 || x >= w || y >= h {
            return Color::TRANSPARENT;
        }
        let idx = ((y * w + x) * 4) as usize;
        let data = prev.data_as_u8_slice();
        unpremul([data[idx], data[idx + 1], data[idx + 2], data[idx + 3]])
    }

    // --- camera ---

    /// The camera as seen by this frame (snapshot taken when the frame
    /// began, shared by every script in it).
    pub fn camera(&self) -> CameraState {
        self.synth.camera
    }

    /// The persisted camera, for direct writes that land next frame.
    pub fn camera_mut(&mut self) -> &mut CameraState {
        &mut self.state.camera
    }

    /// Draw `f` under the camera transform with a guaranteed restore.
    pub fn with_camera<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let affine = self
            .synth
            .camera
            .to_affine(self.center_x(), self.center_y());
        self.surface.save();
        self.surface.transform(affine);
        let out = f(self);
        self.surface.restore();
        out
    }

    /// Ease the persisted camera toward `(tx, ty)`.
    pub fn camera_follow(&mut self, tx: f64, ty: f64, damping: f64) {
        self.state.camera.follow(tx, ty, damping);
    }

    /// Jitter the surface for the rest of the frame.
    pub fn camera_shake(&mut self, intensity: f64) {
        let (sx, sy) = shake_offset(&self.synth.noise, self.vars.time, intensity);
        self.surface.translate(sx, sy);
    }

    pub fn screen_to_world(&self, sx: f64, sy: f64) -> (f64, f64) {
        self.synth
            .camera
            .screen_to_world(sx, sy, self.center_x(), self.center_y())
    }

    pub fn world_to_screen(&self, wx: f64, wy: f64) -> (f64, f64) {
        self.synth
            .camera
            .world_to_screen(wx, wy, self.center_x(), self.center_y())
    }

    // --- physics ---

    /// Value of the persisted named spring, 0.0 when absent.
    pub fn physics_get(&self, key: &str) -> f64 {
        self.state.physics.get(key)
    }

    /// Snap a persisted spring to `value`.
    pub fn physics_set(&mut self, key: &str, value: f64) {
        self.state.physics.set(key, value);
    }

    /// Step a persisted spring toward `target` and return the new value.
    pub fn physics_spring(&mut self, key: &str, target: f64, settings: SpringSettings) -> f64 {
        self.state.physics.step(key, target, settings)
    }

    // --- fx ---

    /// Spawn particles at `(x, y)`.
    pub fn emit_particles(&mut self, x: f64, y: f64, kind: ParticleKind, count: usize) {
        fx::emit(&mut self.state.particles, &mut self.synth.rand, x, y, kind, count);
    }

    pub fn particle_count(&self) -> usize {
        self.state.particles.len()
    }

    /// Edge darkening.
    pub fn fx_vignette(&mut self, intensity: f64, color: Color) {
        fx::vignette(self.surface, intensity, color);
    }

    /// Additive glow.
    pub fn fx_bloom(&mut self, intensity: f64, radius: u32) {
        if let Err(err) = fx::bloom(self.surface, intensity, radius) {
            tracing::warn!(%err, "bloom filter failed");
        }
    }

    /// PRNG-driven film grain.
    pub fn fx_grain(&mut self, intensity: f64) {
        fx::grain(self.surface, &mut self.synth.rand, intensity);
    }

    /// Horizontal channel splitting.
    pub fn fx_chromatic(&mut self, intensity: f64) {
        fx::chromatic(self.surface, intensity);
    }

    /// Scanlines.
    pub fn fx_crt(&mut self, intensity: f64) {
        fx::crt(self.surface, intensity);
    }

    // --- gui ---

    pub fn gui_slider(&mut self, label: &str, min: f64, max: f64, initial: f64) -> f64 {
        self.controls.slider(&self.state.gui, label, min, max, initial)
    }

    pub fn gui_color(&mut self, label: &str, initial: Color) -> Color {
        self.controls.color(&self.state.gui, label, initial)
    }

    pub fn gui_checkbox(&mut self, label: &str, initial: bool) -> bool {
        self.controls.checkbox(&self.state.gui, label, initial)
    }

    pub fn gui_button(&mut self, label: &str) -> bool {
        self.controls.button(&mut self.state.gui, label)
    }

    /// Controls declared during this invocation, in call order.
    pub fn into_controls(self) -> Vec<GuiControl> {
        self.controls.into_controls()
    }

    // --- assets ---

    /// Audio features for asset `name`; silence when no analysis exists.
    pub fn audio(&self, name: &str) -> &AudioAnalysis {
        self.assets
            .analyses
            .get(name)
            .unwrap_or(&self.silent_audio)
    }

    /// Pixel dimensions of a prepared image.
    pub fn image_size(&self, name: &str) -> Option<(u32, u32)> {
        self.assets
            .images
            .get(name)
            .map(|img| (u32::from(img.pixmap.width()), u32::from(img.pixmap.height())))
    }

    /// Draw a prepared image scaled into `(x, y, w, h)`. A missing name is a
    /// logged no-op so a renamed asset degrades instead of killing a script.
    pub fn draw_image(
        &mut self,
        name: &str,
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        opts: &ImageDrawOptions,
    ) {
        let Some(img) = self.assets.images.get(name) else {
            tracing::warn!(name, "draw_image: unknown image asset");
            return;
        };
        let pixmap = match opts.crop {
            None => Arc::clone(&img.pixmap),
            Some(rect) => match crop_pixmap(&img.pixmap, rect) {
                Some(sub) => Arc::new(sub),
                None => return,
            },
        };
        self.surface
            .draw_pixmap(&pixmap, x, y, w, h, opts.opacity, opts.flip_x, opts.flip_y);
    }

    // --- models ---

    /// Register or replace a model draw callable.
    pub fn define_model<F>(&mut self, name: &str, draw: F)
    where
        F: for<'b> Fn(&serde_json::Value, &mut FrameContext<'b>) -> CineResult<()> + 'static,
    {
        self.state.models.define(name, Rc::new(draw));
    }

    /// Drop one model's cached pixmap, or all caches.
    pub fn clear_model_cache(&mut self, name: Option<&str>) {
        self.state.models.clear_cache(name);
    }

    /// Draw a model instance. Unknown names are a logged no-op; a failing
    /// draw callable is contained at the model boundary and the transform
    /// stack restored.
    pub fn draw_model(&mut self, name: &str, mut options: ModelOptions<'_>) {
        let Some(draw) = self.state.models.get(name) else {
            tracing::warn!(name, "draw_model: unknown model");
            return;
        };

        let instance = options.id.take().unwrap_or_else(|| name.to_owned());

        self.surface.save();
        self.surface.translate(options.x, options.y);
        if options.rotation != 0.0 {
            self.surface.rotate(options.rotation);
        }
        if options.scale != 1.0 || options.flip_x || options.flip_y {
            let s = options.scale;
            self.surface.scale(
                if options.flip_x { -s } else { s },
                if options.flip_y { -s } else { s },
            );
        }
        if options.opacity != 1.0 {
            self.surface.mul_alpha(options.opacity);
        }

        if let Some(interaction) = options.interaction.as_mut() {
            let dx = self.pointer.x - options.x;
            let dy = self.pointer.y - options.y;
            if (dx * dx + dy * dy).sqrt() < 100.0 * options.scale {
                if let Some(on_hover) = interaction.on_hover.as_mut() {
                    on_hover(self.pointer.x, self.pointer.y);
                }
                if self.pointer.down
                    && let Some(on_click) = interaction.on_click.as_mut()
                {
                    on_click(self.pointer.x, self.pointer.y);
                }
            }
        }

        let prev_instance = self.current_instance.replace(instance);
        let prev_parts = std::mem::replace(&mut self.current_parts, options.parts);

        if options.cache {
            if self.state.models.cached(name).is_none() {
                self.render_model_cache(name, &draw, &options.props);
            }
            if let Some(pixmap) = self.state.models.cached(name) {
                let size = f64::from(CACHE_SIZE);
                self.surface
                    .draw_pixmap(&pixmap, -CACHE_CENTER, -CACHE_CENTER, size, size, 1.0, false, false);
            }
        } else if let Err(err) = draw(&options.props, self) {
            tracing::warn!(model = name, %err, "model draw failed");
        }

        self.current_parts = prev_parts;
        self.current_instance = prev_instance;
        self.surface.restore();
    }

    /// Paint a model once into the offscreen cache target, centered.
    fn render_model_cache(
        &mut self,
        name: &str,
        draw: &crate::model::ModelFn,
        props: &serde_json::Value,
    ) {
        let mut off = match Surface::new(CACHE_SIZE, CACHE_SIZE) {
            Ok(s) => s,
            Err(err) => {
                tracing::warn!(model = name, %err, "model cache target allocation failed");
                return;
            }
        };
        off.begin_frame(Background::Transparent);

        std::mem::swap(&mut *self.surface, &mut off);
        self.surface.translate(CACHE_CENTER, CACHE_CENTER);
        let result = draw(props, self);
        std::mem::swap(&mut *self.surface, &mut off);

        if let Err(err) = result {
            tracing::warn!(model = name, %err, "model cache draw failed");
        }
        self.state
            .models
            .insert_cache(name, Arc::new(off.snapshot()));
    }

    /// Apply the caller's override for part `name` around `f`; a plain
    /// passthrough when the caller declared none.
    pub fn part(&mut self, name: &str, f: impl FnOnce(&mut Self)) {
        let Some(part) = self.current_parts.get(name).copied() else {
            f(self);
            return;
        };
        self.surface.save();
        self.surface.translate(part.x, part.y);
        if part.rotation != 0.0 {
            self.surface.rotate(part.rotation);
        }
        if part.scale != 1.0 {
            self.surface.scale(part.scale, part.scale);
        }
        if part.opacity != 1.0 {
            self.surface.mul_alpha(part.opacity);
        }
        f(self);
        self.surface.restore();
    }

    fn instance_id(&self) -> String {
        self.current_instance
            .clone()
            .unwrap_or_else(|| "default".to_owned())
    }

    /// Read persisted state for the current model instance, seeding with
    /// `initial` on first access.
    pub fn model_state(&mut self, key: &str, initial: serde_json::Value) -> serde_json::Value {
        let id = self.instance_id();
        self.state.models.state_init(&id, key, initial)
    }

    /// Write persisted state for the current model instance.
    pub fn set_model_state(&mut self, key: &str, value: serde_json::Value) {
        let id = self.instance_id();
        self.state.models.state_set(&id, key, value);
    }

    /// Step a spring persisted under the current model instance. A spring
    /// first seen starts at rest on its target.
    pub fn model_spring(&mut self, id: &str, target: f64, settings: SpringSettings) -> f64 {
        let instance = self.instance_id();
        let current = self
            .state
            .models
            .spring_get(&instance, id)
            .unwrap_or(crate::animation::spring::SpringState::at(target));
        let next = spring_step(current, target, settings);
        self.state.models.spring_set(&instance, id, next);
        next.value
    }
}

/// Copy a rectangular region of a pixmap into a new one. Returns `None` when
/// the clamped region is empty.
fn crop_pixmap(src: &vello_cpu::Pixmap, rect: Rect) -> Option<vello_cpu::Pixmap> {
    let sw = i64::from(src.width());
    let sh = i64::from(src.height());
    let x0 = (rect.x0.floor() as i64).clamp(0, sw);
    let y0 = (rect.y0.floor() as i64).clamp(0, sh);
    let x1 = (rect.x1.ceil() as i64).clamp(0, sw);
    let y1 = (rect.y1.ceil() as i64).clamp(0, sh);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    let (cw, ch) = ((x1 - x0) as usize, (y1 - y0) as usize);
    let data = src.data_as_u8_slice();
    let mut bytes = Vec::with_capacity(cw * ch * 4);
    for y in y0..y1 {
        let row = ((y * sw + x0) * 4) as usize;
        bytes.extend_from_slice(&data[row..row + cw * 4]);
    }
    crate::surface::pixmap_from_premul_bytes(&bytes, cw as u32, ch as u32).ok()
}
