//! Immediate-mode CPU drawing surface.
//!
//! A [`Surface`] owns the canonical pixel buffer (a premultiplied RGBA8
//! [`vello_cpu::Pixmap`]) plus a pending [`vello_cpu::RenderContext`] that
//! batches draw calls. Pending work is composited over the pixmap on
//! [`Surface::flush`], which any pixel-space readback forces first.
//!
//! Transform and alpha state live on an explicit stack mirroring canvas
//! save/restore semantics; `with_save` restores on every exit path.

use std::sync::Arc;

use kurbo::{Affine, BezPath, Circle, Point, Rect, RoundedRect, Shape, Stroke};

use crate::foundation::{
    color::Color,
    core::Background,
    error::{CineError, CineResult},
};

const STROKE_TOLERANCE: f64 = 0.25;

/// Styling for the shape primitives.
#[derive(Clone, Copy, Debug)]
pub struct ShapeOptions {
    pub color: Color,
    pub fill: bool,
    pub stroke: bool,
    pub line_width: f64,
}

impl Default for ShapeOptions {
    fn default() -> Self {
        Self {
            color: Color::WHITE,
            fill: true,
            stroke: false,
            line_width: 1.0,
        }
    }
}

impl ShapeOptions {
    /// Filled shape in `color`.
    pub fn filled(color: Color) -> Self {
        Self {
            color,
            ..Self::default()
        }
    }

    /// Outlined shape in `color` with the given stroke width.
    pub fn stroked(color: Color, line_width: f64) -> Self {
        Self {
            color,
            fill: false,
            stroke: true,
            line_width,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct DrawState {
    transform: Affine,
    alpha: f64,
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            transform: Affine::IDENTITY,
            alpha: 1.0,
        }
    }
}

/// The frame's drawing target.
pub struct Surface {
    width: u16,
    height: u16,
    pixmap: vello_cpu::Pixmap,
    ctx: vello_cpu::RenderContext,
    pending: bool,
    state: DrawState,
    stack: Vec<DrawState>,
}

impl Surface {
    /// Surface of the given size, cleared to transparent.
    pub fn new(width: u32, height: u32) -> CineResult<Self> {
        let w: u16 = width
            .try_into()
            .map_err(|_| CineError::validation("surface width exceeds u16"))?;
        let h: u16 = height
            .try_into()
            .map_err(|_| CineError::validation("surface height exceeds u16"))?;
        if w == 0 || h == 0 {
            return Err(CineError::validation("surface dimensions must be nonzero"));
        }
        Ok(Self {
            width: w,
            height: h,
            pixmap: vello_cpu::Pixmap::new(w, h),
            ctx: vello_cpu::RenderContext::new(w, h),
            pending: false,
            state: DrawState::default(),
            stack: Vec::new(),
        })
    }

    pub fn width(&self) -> u32 {
        u32::from(self.width)
    }

    pub fn height(&self) -> u32 {
        u32::from(self.height)
    }

    /// Drop all content and pending work, reallocating at the new size.
    pub fn resize(&mut self, width: u32, height: u32) -> CineResult<()> {
        *self = Self::new(width, height)?;
        Ok(())
    }

    /// Reset the transform/alpha stacks, discard pending draws and fill the
    /// buffer per `background`. Called at the top of every frame.
    pub fn begin_frame(&mut self, background: Background) {
        self.state = DrawState::default();
        self.stack.clear();
        self.ctx = vello_cpu::RenderContext::new(self.width, self.height);
        self.pending = false;
        let rgba = match background {
            Background::Transparent => [0, 0, 0, 0],
            Background::Color(c) => c.to_premul(),
        };
        for px in self.pixmap.data_as_u8_slice_mut().chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
    }

    // --- transform / alpha stack ---

    pub fn save(&mut self) {
        self.stack.push(self.state);
    }

    pub fn restore(&mut self) {
        if let Some(prev) = self.stack.pop() {
            self.state = prev;
        }
    }

    /// Run `f` between a save/restore pair; the restore happens on every
    /// exit path, including errors.
    pub fn with_save<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.save();
        let out = f(self);
        self.restore();
        out
    }

    pub fn translate(&mut self, x: f64, y: f64) {
        self.state.transform *= Affine::translate((x, y));
    }

    pub fn rotate(&mut self, radians: f64) {
        self.state.transform *= Affine::rotate(radians);
    }

    pub fn scale(&mut self, sx: f64, sy: f64) {
        self.state.transform *= Affine::scale_non_uniform(sx, sy);
    }

    /// Append an arbitrary affine to the current transform.
    pub fn transform(&mut self, affine: Affine) {
        self.state.transform *= affine;
    }

    pub fn current_transform(&self) -> Affine {
        self.state.transform
    }

    /// Multiply the current global alpha.
    pub fn mul_alpha(&mut self, alpha: f64) {
        self.state.alpha *= alpha.clamp(0.0, 1.0);
    }

    pub fn alpha(&self) -> f64 {
        self.state.alpha
    }

    // --- primitives ---

    /// Rectangle at `(x, y)`, optionally rounded by `radius`.
    pub fn rect(&mut self, x: f64, y: f64, w: f64, h: f64, radius: f64, opts: &ShapeOptions) {
        let rect = Rect::new(x, y, x + w, y + h);
        if radius > 0.0 {
            let path = RoundedRect::from_rect(rect, radius).to_path(STROKE_TOLERANCE);
            self.shape(&path, opts);
        } else {
            self.shape(&rect.to_path(STROKE_TOLERANCE), opts);
        }
    }

    /// Circle centered at `(cx, cy)`.
    pub fn circle(&mut self, cx: f64, cy: f64, r: f64, opts: &ShapeOptions) {
        let path = Circle::new((cx, cy), r.max(0.0)).to_path(STROKE_TOLERANCE);
        self.shape(&path, opts);
    }

    /// Straight line segment; always stroked.
    pub fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, opts: &ShapeOptions) {
        let mut path = BezPath::new();
        path.move_to((x1, y1));
        path.line_to((x2, y2));
        self.stroke_path(&path, opts.color, opts.line_width.max(0.01));
    }

    /// Closed polygon through `points`.
    pub fn poly(&mut self, points: &[Point], opts: &ShapeOptions) {
        if points.len() < 2 {
            return;
        }
        let mut path = BezPath::new();
        path.move_to(points[0]);
        for p in &points[1..] {
            path.line_to(*p);
        }
        path.close_path();
        self.shape(&path, opts);
    }

    fn shape(&mut self, path: &BezPath, opts: &ShapeOptions) {
        if opts.fill {
            self.fill_path(path, opts.color);
        }
        if opts.stroke {
            self.stroke_path(path, opts.color, opts.line_width.max(0.01));
        }
    }

    /// Fill an arbitrary path in the current transform.
    pub fn fill_path(&mut self, path: &BezPath, color: Color) {
        self.ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
        self.ctx.set_transform(affine_to_cpu(self.state.transform));
        self.ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
            color.r, color.g, color.b, color.a,
        ));
        let alpha = self.state.alpha;
        if alpha < 1.0 {
            self.ctx.push_opacity_layer(alpha as f32);
        }
        self.ctx.fill_path(&bezpath_to_cpu(path));
        if alpha < 1.0 {
            self.ctx.pop_layer();
        }
        self.pending = true;
    }

    /// Expand a path outline to a fillable region and fill it.
    pub fn stroke_path(&mut self, path: &BezPath, color: Color, line_width: f64) {
        let style = Stroke::new(line_width);
        let expanded = kurbo::stroke(
            path.iter(),
            &style,
            &kurbo::StrokeOpts::default(),
            STROKE_TOLERANCE,
        );
        self.fill_path(&expanded, color);
    }

    /// Draw a prepared pixmap scaled into `(x, y, w, h)` with an extra
    /// opacity and optional horizontal/vertical mirroring.
    pub fn draw_pixmap(
        &mut self,
        image: &Arc<vello_cpu::Pixmap>,
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        opacity: f64,
        flip_x: bool,
        flip_y: bool,
    ) {
        let iw = f64::from(image.width());
        let ih = f64::from(image.height());
        if iw <= 0.0 || ih <= 0.0 || w <= 0.0 || h <= 0.0 {
            return;
        }

        let mut local = Affine::translate((x, y)) * Affine::scale_non_uniform(w / iw, h / ih);
        if flip_x || flip_y {
            local *= Affine::translate((if flip_x { iw } else { 0.0 }, if flip_y { ih } else { 0.0 }))
                * Affine::scale_non_uniform(
                    if flip_x { -1.0 } else { 1.0 },
                    if flip_y { -1.0 } else { 1.0 },
                );
        }

        let paint = vello_cpu::Image {
            image: vello_cpu::ImageSource::Pixmap(Arc::clone(image)),
            sampler: vello_cpu::peniko::ImageSampler::default(),
        };

        self.ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
        self.ctx
            .set_transform(affine_to_cpu(self.state.transform * local));
        self.ctx.set_paint(paint);

        let alpha = (self.state.alpha * opacity.clamp(0.0, 1.0)) as f32;
        if alpha < 1.0 {
            self.ctx.push_opacity_layer(alpha);
        }
        self.ctx
            .fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, iw, ih));
        if alpha < 1.0 {
            self.ctx.pop_layer();
        }
        self.pending = true;
    }

    // --- readback ---

    /// Composite pending draws over the pixel buffer.
    pub fn flush(&mut self) {
        if !self.pending {
            return;
        }
        self.ctx.flush();
        self.ctx.render_to_pixmap(&mut self.pixmap);
        self.ctx = vello_cpu::RenderContext::new(self.width, self.height);
        self.pending = false;
    }

    /// Straight-alpha color at `(x, y)`; transparent outside the buffer.
    pub fn get_pixel(&mut self, x: i64, y: i64) -> Color {
        self.flush();
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return Color::TRANSPARENT;
        }
        let idx = (y as usize * usize::from(self.width) + x as usize) * 4;
        let data = self.pixmap.data_as_u8_slice();
        unpremul([data[idx], data[idx + 1], data[idx + 2], data[idx + 3]])
    }

    /// Write a straight-alpha color at `(x, y)`, flushing pending draws
    /// first. Out-of-bounds writes are ignored.
    pub fn set_pixel(&mut self, x: i64, y: i64, color: Color) {
        self.flush();
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return;
        }
        let idx = (y as usize * usize::from(self.width) + x as usize) * 4;
        self.pixmap.data_as_u8_slice_mut()[idx..idx + 4].copy_from_slice(&color.to_premul());
    }

    /// Mutable premultiplied RGBA8 bytes, flushed first. Pixel-space filters
    /// operate through this.
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        self.flush();
        self.pixmap.data_as_u8_slice_mut()
    }

    /// Premultiplied RGBA8 bytes, flushed first.
    pub fn pixels(&mut self) -> &[u8] {
        self.flush();
        self.pixmap.data_as_u8_slice()
    }

    /// Owned copy of the current pixel content.
    pub fn snapshot(&mut self) -> vello_cpu::Pixmap {
        self.flush();
        self.pixmap.clone()
    }
}

/// Build a pixmap from premultiplied RGBA8 bytes.
pub fn pixmap_from_premul_bytes(
    bytes: &[u8],
    width: u32,
    height: u32,
) -> CineResult<vello_cpu::Pixmap> {
    let w: u16 = width
        .try_into()
        .map_err(|_| CineError::validation("image width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| CineError::validation("image height exceeds u16"))?;
    if bytes.len() != width as usize * height as usize * 4 {
        return Err(CineError::validation("image byte length mismatch"));
    }

    let mut may_have_opacities = false;
    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for px in bytes.chunks_exact(4) {
        let a = px[3];
        may_have_opacities |= a != 255;
        pixels.push(vello_cpu::peniko::color::PremulRgba8 {
            r: px[0],
            g: px[1],
            b: px[2],
            a,
        });
    }
    Ok(vello_cpu::Pixmap::from_parts_with_opacity(
        pixels,
        w,
        h,
        may_have_opacities,
    ))
}

pub(crate) fn unpremul(px: [u8; 4]) -> Color {
    let a = px[3];
    if a == 0 {
        return Color::TRANSPARENT;
    }
    let un = |c: u8| -> u8 {
        let v = (u32::from(c) * 255 + u32::from(a) / 2) / u32::from(a);
        v.min(255) as u8
    };
    Color::rgba(un(px[0]), un(px[1]), un(px[2]), a)
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn bezpath_to_cpu(path: &BezPath) -> vello_cpu::kurbo::BezPath {
    use kurbo::PathEl;

    let to_p = |p: Point| vello_cpu::kurbo::Point::new(p.x, p.y);
    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(to_p(p)),
            PathEl::LineTo(p) => out.line_to(to_p(p)),
            PathEl::QuadTo(p1, p2) => out.quad_to(to_p(p1), to_p(p2)),
            PathEl::CurveTo(p1, p2, p3) => out.curve_to(to_p(p1), to_p(p2), to_p(p3)),
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}
