//! The freehand annotation layer.
//!
//! Strokes are polylines in canvas coordinates, so they pan and zoom with
//! the world. Completed strokes support undo/redo; undoing pushes onto a
//! redo stack which is cleared whenever a new stroke is committed.

use crate::drawing_ui::DrawingUiPanel;

/// Stroke line width in canvas units.
pub const LINE_WIDTH: f64 = 4.0;

/// Minimum distance between kept points, in canvas units.
pub const MIN_POINT_DISTANCE: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

pub const COLOR_RED: StrokeColor = StrokeColor {
    r: 1.0,
    g: 0.2,
    b: 0.2,
};
pub const COLOR_GREEN: StrokeColor = StrokeColor {
    r: 0.2,
    g: 1.0,
    b: 0.2,
};
pub const COLOR_BLUE: StrokeColor = StrokeColor {
    r: 0.2,
    g: 0.5,
    b: 1.0,
};

#[derive(Debug, Clone)]
pub struct Stroke {
    pub points: Vec<(f64, f64)>,
    pub color: StrokeColor,
}

#[derive(Debug)]
pub struct DrawingLayer {
    /// Whether drawing mode is active (pointer input draws instead of
    /// reaching clients).
    pub drawing_mode: bool,
    pub current_color: StrokeColor,
    pub panel: DrawingUiPanel,

    current: Option<Stroke>,
    strokes: Vec<Stroke>,
    redo_stack: Vec<Stroke>,
    last_point: (f64, f64),
}

impl Default for DrawingLayer {
    fn default() -> Self {
        Self {
            drawing_mode: false,
            current_color: COLOR_RED,
            panel: DrawingUiPanel::default(),
            current: None,
            strokes: Vec::new(),
            redo_stack: Vec::new(),
            last_point: (0.0, 0.0),
        }
    }
}

impl DrawingLayer {
    pub fn toggle_mode(&mut self) {
        self.drawing_mode = !self.drawing_mode;
        if !self.drawing_mode && self.current.is_some() {
            self.stroke_end();
        }
        tracing::info!(
            "drawing mode {}",
            if self.drawing_mode {
                "enabled"
            } else {
                "disabled"
            }
        );
    }

    pub fn is_drawing(&self) -> bool {
        self.current.is_some()
    }

    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    pub fn current_stroke(&self) -> Option<&Stroke> {
        self.current.as_ref()
    }

    pub fn stroke_begin(&mut self, canvas_x: f64, canvas_y: f64) {
        if !self.drawing_mode {
            return;
        }

        self.current = Some(Stroke {
            points: vec![(canvas_x, canvas_y)],
            color: self.current_color,
        });
        self.last_point = (canvas_x, canvas_y);
        tracing::debug!("started new stroke at ({canvas_x:.2}, {canvas_y:.2})");
    }

    pub fn stroke_add_point(&mut self, canvas_x: f64, canvas_y: f64) {
        let Some(stroke) = self.current.as_mut() else {
            return;
        };

        let dx = canvas_x - self.last_point.0;
        let dy = canvas_y - self.last_point.1;
        if (dx * dx + dy * dy).sqrt() < MIN_POINT_DISTANCE {
            return;
        }

        stroke.points.push((canvas_x, canvas_y));
        self.last_point = (canvas_x, canvas_y);
    }

    pub fn stroke_end(&mut self) {
        let Some(stroke) = self.current.take() else {
            return;
        };

        if stroke.points.len() < 2 {
            tracing::debug!("stroke too short, discarding");
            return;
        }

        tracing::debug!("finished stroke with {} points", stroke.points.len());
        self.strokes.push(stroke);
        self.redo_stack.clear();
    }

    pub fn undo(&mut self) {
        // An in-progress stroke is discarded rather than committed.
        if self.current.take().is_some() {
            tracing::info!("undid current stroke");
            return;
        }

        if let Some(stroke) = self.strokes.pop() {
            self.redo_stack.push(stroke);
            tracing::info!("undid last stroke");
        }
    }

    pub fn redo(&mut self) {
        if let Some(stroke) = self.redo_stack.pop() {
            self.strokes.push(stroke);
            tracing::info!("redid stroke");
        }
    }

    pub fn clear_all(&mut self) {
        self.strokes.clear();
        self.redo_stack.clear();
        self.current = None;
        tracing::info!("all drawings cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer() -> DrawingLayer {
        let mut layer = DrawingLayer::default();
        layer.drawing_mode = true;
        layer
    }

    fn draw(layer: &mut DrawingLayer, from: (f64, f64), to: (f64, f64)) {
        layer.stroke_begin(from.0, from.1);
        layer.stroke_add_point(to.0, to.1);
        layer.stroke_end();
    }

    #[test]
    fn committed_strokes_have_at_least_two_points() {
        let mut layer = layer();

        layer.stroke_begin(0.0, 0.0);
        layer.stroke_end();
        assert!(layer.strokes().is_empty());

        // A point closer than the decimation distance is not kept,
        // so the stroke is still too short.
        layer.stroke_begin(0.0, 0.0);
        layer.stroke_add_point(1.0, 1.0);
        layer.stroke_end();
        assert!(layer.strokes().is_empty());

        draw(&mut layer, (0.0, 0.0), (10.0, 0.0));
        assert_eq!(layer.strokes().len(), 1);
        assert!(layer.strokes().iter().all(|s| s.points.len() >= 2));
    }

    #[test]
    fn points_below_minimum_distance_are_dropped() {
        let mut layer = layer();
        layer.stroke_begin(0.0, 0.0);
        layer.stroke_add_point(0.5, 0.5);
        layer.stroke_add_point(3.0, 0.0);
        layer.stroke_add_point(3.5, 0.0);
        layer.stroke_end();

        assert_eq!(layer.strokes()[0].points, vec![(0.0, 0.0), (3.0, 0.0)]);
    }

    #[test]
    fn undo_redo_ordering() {
        let mut layer = layer();
        draw(&mut layer, (0.0, 0.0), (10.0, 0.0)); // A
        draw(&mut layer, (0.0, 10.0), (10.0, 10.0)); // B
        draw(&mut layer, (0.0, 20.0), (10.0, 20.0)); // C

        layer.undo();
        assert_eq!(layer.strokes().len(), 2);
        layer.undo();
        assert_eq!(layer.strokes().len(), 1);
        assert_eq!(layer.strokes()[0].points[0], (0.0, 0.0));

        layer.redo();
        assert_eq!(layer.strokes().len(), 2);
        assert_eq!(layer.strokes()[1].points[0], (0.0, 10.0));

        // Drawing D clears the redo stack; C is gone for good.
        draw(&mut layer, (0.0, 30.0), (10.0, 30.0));
        assert_eq!(layer.strokes().len(), 3);
        layer.redo();
        assert_eq!(layer.strokes().len(), 3);
    }

    #[test]
    fn undo_then_redo_restores_pre_undo_state() {
        let mut layer = layer();
        draw(&mut layer, (0.0, 0.0), (10.0, 0.0));
        draw(&mut layer, (0.0, 10.0), (10.0, 10.0));

        let before: Vec<Vec<(f64, f64)>> =
            layer.strokes().iter().map(|s| s.points.clone()).collect();
        layer.undo();
        layer.redo();
        let after: Vec<Vec<(f64, f64)>> =
            layer.strokes().iter().map(|s| s.points.clone()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn undo_discards_stroke_in_progress() {
        let mut layer = layer();
        draw(&mut layer, (0.0, 0.0), (10.0, 0.0));

        layer.stroke_begin(50.0, 50.0);
        layer.stroke_add_point(60.0, 50.0);
        layer.undo();

        // The committed stroke is untouched and nothing moved to redo.
        assert_eq!(layer.strokes().len(), 1);
        assert!(!layer.is_drawing());
        layer.redo();
        assert_eq!(layer.strokes().len(), 1);
    }

    #[test]
    fn clear_on_empty_state_is_a_noop() {
        let mut layer = layer();
        layer.clear_all();
        assert!(layer.strokes().is_empty());

        draw(&mut layer, (0.0, 0.0), (10.0, 0.0));
        layer.undo();
        layer.clear_all();
        layer.redo();
        assert!(layer.strokes().is_empty());
    }

    #[test]
    fn stroke_keeps_color_at_begin_time() {
        let mut layer = layer();
        layer.current_color = COLOR_GREEN;
        layer.stroke_begin(0.0, 0.0);
        layer.current_color = COLOR_BLUE;
        layer.stroke_add_point(10.0, 0.0);
        layer.stroke_end();

        assert_eq!(layer.strokes()[0].color, COLOR_GREEN);
    }
}
