//! Declarative scheduling primitives over the frame clock.
//!
//! A [`Timeline`] is rebuilt every frame from the current time; the `play`
//! cursor therefore starts at zero each frame, which is what lets scripts
//! describe a fixed program of scenes with consecutive `play` calls.

const MIN_DURATION: f64 = 0.0001;

/// Normalized progress of `time` through `[start, end]`, clamped to `[0,1]`.
///
/// A degenerate range (`end <= start`) reads 1 once `time >= start`, else 0.
pub fn range_value(time: f64, start: f64, end: f64) -> f64 {
    let d = end - start;
    if d <= 0.0 {
        return if time >= start { 1.0 } else { 0.0 };
    }
    ((time - start) / d).clamp(0.0, 1.0)
}

/// Which scene of an ordered list of durations is active at `time`, and the
/// clamped local progress within it.
///
/// Scene `i` owns `[offset, offset+duration)`; the last scene additionally
/// owns its upper bound so a timeline's final instant still renders.
pub fn active_scene(time: f64, durations: &[f64]) -> Option<(usize, f64)> {
    let mut offset = 0.0;
    for (i, &d) in durations.iter().enumerate() {
        let d = d.max(MIN_DURATION);
        let is_last = i == durations.len() - 1;
        let inside = time >= offset && (time < offset + d || (is_last && time <= offset + d));
        if inside {
            let t = ((time - offset) / d).clamp(0.0, 1.0);
            return Some((i, t));
        }
        offset += d;
    }
    None
}

/// Per-frame scheduling helper bound to the frame clock.
#[derive(Clone, Copy, Debug)]
pub struct Timeline {
    time: f64,
    frame: u64,
    fps: f64,
    cursor: f64,
}

impl Timeline {
    pub fn new(time: f64, frame: u64, fps: f64) -> Self {
        Self {
            time,
            frame,
            fps,
            cursor: 0.0,
        }
    }

    /// Progress through the next `duration` seconds of cursor time, if the
    /// clock currently sits inside that window; the cursor advances either
    /// way.
    pub fn play_window(&mut self, duration: f64) -> Option<f64> {
        let start = self.cursor;
        let end = self.cursor + duration;
        self.cursor = end;
        if self.time >= start && self.time <= end {
            let d = (end - start).max(MIN_DURATION);
            Some(((self.time - start) / d).clamp(0.0, 1.0))
        } else {
            None
        }
    }

    /// Run `f` with clamped progress while the clock sits inside the next
    /// `duration` seconds of cursor time.
    pub fn play(&mut self, duration: f64, f: impl FnOnce(f64)) {
        if let Some(t) = self.play_window(duration) {
            f(t);
        }
    }

    /// Reset the `play` cursor to zero.
    pub fn rewind(&mut self) {
        self.cursor = 0.0;
    }

    /// Whether the current frame is the one containing time `t`.
    pub fn hits_frame(&self, t: f64) -> bool {
        self.frame == (t * self.fps).floor().max(0.0) as u64
    }

    /// Run `f` exactly on the frame containing time `t`.
    pub fn at(&self, t: f64, f: impl FnOnce()) {
        if self.hits_frame(t) {
            f();
        }
    }

    /// Clamped progress through `[start, end]` when the clock is inside it.
    pub fn range_window(&self, start: f64, end: f64) -> Option<f64> {
        if self.time >= start && self.time <= end {
            let d = (end - start).max(MIN_DURATION);
            Some(((self.time - start) / d).clamp(0.0, 1.0))
        } else {
            None
        }
    }

    /// Run `f` with clamped progress while the clock sits in `[start, end]`.
    pub fn range(&self, start: f64, end: f64, f: impl FnOnce(f64)) {
        if let Some(t) = self.range_window(start, end) {
            f(t);
        }
    }

    /// The current time, for collaborators that schedule on this clock.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Run the scene active at the current time, if any. Each entry pairs a
    /// duration with its callback; at most one callback fires per frame.
    pub fn sequence(&self, scenes: &mut [(f64, Box<dyn FnMut(f64) + '_>)]) {
        let durations: Vec<f64> = scenes.iter().map(|(d, _)| *d).collect();
        if let Some((i, t)) = active_scene(self.time, &durations) {
            (scenes[i].1)(t);
        }
    }
}
