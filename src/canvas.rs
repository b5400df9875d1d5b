//! The infinite canvas coordinate system and viewport.
//!
//! Views and strokes live at unbounded canvas coordinates; the viewport
//! selects which part of the canvas is visible. The transforms are
//! `screen = (canvas - viewport) * scale` and its inverse.

pub const ZOOM_MIN: f64 = 0.1;
pub const ZOOM_MAX: f64 = 4.0;

/// Duration of the viewport snap animation in milliseconds.
pub const SNAP_DURATION_MS: u32 = 800;

/// Cubic ease-out: starts fast, decelerates towards the end.
pub fn ease_out_cubic(t: f64) -> f64 {
    let inv = 1.0 - t;
    1.0 - inv * inv * inv
}

pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

#[derive(Debug, Clone, Copy)]
struct PanGesture {
    start_cursor: (f64, f64),
    start_viewport: (f64, f64),
}

#[derive(Debug, Clone, Copy)]
struct SnapAnimation {
    start_ms: u32,
    from: (f64, f64),
    to: (f64, f64),
}

#[derive(Debug)]
pub struct Canvas {
    /// Viewport top-left corner in canvas coordinates.
    pub viewport_x: f64,
    pub viewport_y: f64,
    /// Zoom level, always within `[ZOOM_MIN, ZOOM_MAX]`.
    pub scale: f64,

    pan: Option<PanGesture>,
    snap: Option<SnapAnimation>,
}

impl Default for Canvas {
    fn default() -> Self {
        Self {
            viewport_x: 0.0,
            viewport_y: 0.0,
            scale: 1.0,
            pan: None,
            snap: None,
        }
    }
}

impl Canvas {
    pub fn to_screen(&self, canvas_x: f64, canvas_y: f64) -> (f64, f64) {
        (
            (canvas_x - self.viewport_x) * self.scale,
            (canvas_y - self.viewport_y) * self.scale,
        )
    }

    pub fn to_canvas(&self, screen_x: f64, screen_y: f64) -> (f64, f64) {
        (
            screen_x / self.scale + self.viewport_x,
            screen_y / self.scale + self.viewport_y,
        )
    }

    pub fn pan_begin(&mut self, cursor_x: f64, cursor_y: f64) {
        self.pan = Some(PanGesture {
            start_cursor: (cursor_x, cursor_y),
            start_viewport: (self.viewport_x, self.viewport_y),
        });
        tracing::debug!(
            "pan started at cursor ({cursor_x:.1}, {cursor_y:.1}), viewport ({:.1}, {:.1})",
            self.viewport_x,
            self.viewport_y
        );
    }

    pub fn pan_update(&mut self, cursor_x: f64, cursor_y: f64) {
        let Some(pan) = self.pan else {
            return;
        };

        // Dragging moves the canvas, so the viewport moves the opposite way.
        let delta_x = cursor_x - pan.start_cursor.0;
        let delta_y = cursor_y - pan.start_cursor.1;
        self.viewport_x = pan.start_viewport.0 - delta_x / self.scale;
        self.viewport_y = pan.start_viewport.1 - delta_y / self.scale;
    }

    pub fn pan_end(&mut self) {
        if self.pan.take().is_some() {
            tracing::debug!(
                "pan ended at viewport ({:.1}, {:.1})",
                self.viewport_x,
                self.viewport_y
            );
        }
    }

    pub fn is_panning(&self) -> bool {
        self.pan.is_some()
    }

    /// Pan the viewport by a screen-space delta, used for scroll-wheel panning.
    pub fn pan_delta(&mut self, delta_x: f64, delta_y: f64) {
        self.viewport_x += delta_x / self.scale;
        self.viewport_y += delta_y / self.scale;
    }

    /// Zoom by `factor`, keeping the screen-space focus point stationary.
    pub fn zoom(&mut self, factor: f64, focus_x: f64, focus_y: f64) {
        let new_scale = (self.scale * factor).clamp(ZOOM_MIN, ZOOM_MAX);
        if new_scale == self.scale {
            return;
        }

        // Canvas position under the focus point before the zoom; afterwards
        // the viewport is placed so that point maps back to the same pixel.
        let (canvas_focus_x, canvas_focus_y) = self.to_canvas(focus_x, focus_y);

        self.scale = new_scale;
        self.viewport_x = canvas_focus_x - focus_x / self.scale;
        self.viewport_y = canvas_focus_y - focus_y / self.scale;

        tracing::debug!(
            "zoomed to scale {:.2}, viewport ({:.1}, {:.1})",
            self.scale,
            self.viewport_x,
            self.viewport_y
        );
    }

    /// Canvas coordinates of the centre of the current viewport.
    pub fn viewport_centre(&self, output_width: i32, output_height: i32) -> (f64, f64) {
        self.to_canvas(output_width as f64 / 2.0, output_height as f64 / 2.0)
    }

    /// Start an animated pan that places `centre` (canvas coordinates) at the
    /// centre of the screen.
    pub fn snap_to_centre(
        &mut self,
        centre_x: f64,
        centre_y: f64,
        output_width: i32,
        output_height: i32,
        now_ms: u32,
    ) {
        let target_x = centre_x - (output_width as f64 / 2.0) / self.scale;
        let target_y = centre_y - (output_height as f64 / 2.0) / self.scale;
        self.snap = Some(SnapAnimation {
            start_ms: now_ms,
            from: (self.viewport_x, self.viewport_y),
            to: (target_x, target_y),
        });
    }

    pub fn is_snapping(&self) -> bool {
        self.snap.is_some()
    }

    /// Advance the snap animation. Call once per frame.
    pub fn tick(&mut self, now_ms: u32) {
        let Some(snap) = self.snap else {
            return;
        };

        let elapsed = now_ms.saturating_sub(snap.start_ms);
        let t = (elapsed as f64 / SNAP_DURATION_MS as f64).clamp(0.0, 1.0);
        let eased = ease_out_cubic(t);

        self.viewport_x = lerp(snap.from.0, snap.to.0, eased);
        self.viewport_y = lerp(snap.from.1, snap.to.1, eased);

        if t >= 1.0 {
            self.snap = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn screen_canvas_round_trip() {
        let mut canvas = Canvas::default();
        canvas.viewport_x = -123.5;
        canvas.viewport_y = 778.25;
        canvas.scale = 1.7;

        for &(x, y) in &[(0.0, 0.0), (400.0, 300.0), (-1e6, 4.2), (0.125, -9999.0)] {
            let (sx, sy) = canvas.to_screen(x, y);
            let (cx, cy) = canvas.to_canvas(sx, sy);
            assert!((cx - x).abs() < EPSILON);
            assert!((cy - y).abs() < EPSILON);

            let (cx, cy) = canvas.to_canvas(x, y);
            let (sx, sy) = canvas.to_screen(cx, cy);
            assert!((sx - x).abs() < EPSILON);
            assert!((sy - y).abs() < EPSILON);
        }
    }

    #[test]
    fn zoom_keeps_focus_stationary() {
        let mut canvas = Canvas::default();
        canvas.zoom(2.0, 400.0, 300.0);

        assert_eq!(canvas.scale, 2.0);
        assert!((canvas.viewport_x - 200.0).abs() < EPSILON);
        assert!((canvas.viewport_y - 150.0).abs() < EPSILON);

        let (sx, sy) = canvas.to_screen(200.0, 150.0);
        assert!(sx.abs() < EPSILON && sy.abs() < EPSILON);
        let (sx, sy) = canvas.to_screen(400.0, 300.0);
        assert!((sx - 400.0).abs() < EPSILON && (sy - 300.0).abs() < EPSILON);
    }

    #[test]
    fn zoom_clamps_scale() {
        let mut canvas = Canvas::default();
        canvas.zoom(100.0, 0.0, 0.0);
        assert_eq!(canvas.scale, ZOOM_MAX);

        canvas.zoom(1e-6, 0.0, 0.0);
        assert_eq!(canvas.scale, ZOOM_MIN);

        // Zooming out at the lower bound is a no-op.
        let vx = canvas.viewport_x;
        canvas.zoom(0.5, 123.0, 456.0);
        assert_eq!(canvas.scale, ZOOM_MIN);
        assert_eq!(canvas.viewport_x, vx);
    }

    #[test]
    fn zoom_at_clamp_preserves_focus() {
        let mut canvas = Canvas::default();
        canvas.zoom(10.0, 640.0, 360.0);
        assert_eq!(canvas.scale, ZOOM_MAX);

        let (cx, cy) = canvas.to_canvas(640.0, 360.0);
        let (sx, sy) = canvas.to_screen(cx, cy);
        assert!((sx - 640.0).abs() < EPSILON);
        assert!((sy - 360.0).abs() < EPSILON);
    }

    #[test]
    fn pan_gesture_moves_viewport_against_cursor() {
        let mut canvas = Canvas::default();
        canvas.scale = 2.0;
        canvas.pan_begin(100.0, 100.0);
        canvas.pan_update(150.0, 80.0);

        assert!((canvas.viewport_x - -25.0).abs() < EPSILON);
        assert!((canvas.viewport_y - 10.0).abs() < EPSILON);
        canvas.pan_end();
    }

    #[test]
    fn pan_end_is_idempotent() {
        let mut canvas = Canvas::default();
        canvas.pan_begin(0.0, 0.0);
        canvas.pan_end();
        canvas.pan_end();
        assert!(!canvas.is_panning());

        // Updates after the gesture ended do nothing.
        canvas.pan_update(500.0, 500.0);
        assert_eq!(canvas.viewport_x, 0.0);
    }

    #[test]
    fn pan_delta_is_scaled() {
        let mut canvas = Canvas::default();
        canvas.scale = 2.0;
        canvas.pan_delta(0.0, 15.0);
        assert!((canvas.viewport_y - 7.5).abs() < EPSILON);
    }

    #[test]
    fn snap_interpolates_and_completes() {
        let mut canvas = Canvas::default();
        canvas.snap_to_centre(1000.0, 500.0, 1920, 1080, 0);
        assert!(canvas.is_snapping());

        canvas.tick(400);
        // Halfway through the cubic ease-out: 1 - 0.5^3 = 0.875.
        assert!((canvas.viewport_x - 0.875 * (1000.0 - 960.0)).abs() < EPSILON);

        canvas.tick(SNAP_DURATION_MS);
        assert!(!canvas.is_snapping());
        assert!((canvas.viewport_x - 40.0).abs() < EPSILON);
        assert!((canvas.viewport_y - (500.0 - 540.0)).abs() < EPSILON);

        // The viewport centre now sits on the snap target.
        let (cx, cy) = canvas.viewport_centre(1920, 1080);
        assert!((cx - 1000.0).abs() < EPSILON);
        assert!((cy - 500.0).abs() < EPSILON);
    }
}
