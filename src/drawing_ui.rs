//! The drawing-mode UI panel.
//!
//! A vertical strip of buttons on the left edge of the screen: three colour
//! swatches, then undo / redo / clear. Everything is drawn from solid
//! rectangles; the icons are rasterised as short runs of small rects.

use smithay::{
    backend::renderer::{
        element::{solid::SolidColorRenderElement, Id, Kind},
        utils::CommitCounter,
    },
    utils::{Physical, Point, Rectangle, Size},
};

use crate::drawing::{DrawingLayer, StrokeColor, COLOR_BLUE, COLOR_GREEN, COLOR_RED};

const PANEL_X: i32 = 20;
const BUTTON_WIDTH: i32 = 50;
const BUTTON_HEIGHT: i32 = 50;
const BUTTON_SPACING: i32 = 10;
const PANEL_PADDING: i32 = 10;
const SEPARATOR_HEIGHT: i32 = 20;

const BG_COLOR: [f32; 4] = [0.15, 0.15, 0.15, 0.9];
const BUTTON_NORMAL: [f32; 4] = [0.25, 0.25, 0.25, 1.0];
const BUTTON_HOVER: [f32; 4] = [0.35, 0.35, 0.35, 1.0];
const BUTTON_SELECTED: [f32; 4] = [0.45, 0.45, 0.45, 1.0];
const ICON_COLOR: [f32; 4] = [0.9, 0.9, 0.9, 1.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiButton {
    ColorRed,
    ColorGreen,
    ColorBlue,
    Undo,
    Redo,
    Clear,
}

const BUTTONS: [UiButton; 6] = [
    UiButton::ColorRed,
    UiButton::ColorGreen,
    UiButton::ColorBlue,
    UiButton::Undo,
    UiButton::Redo,
    UiButton::Clear,
];

#[derive(Debug, Default)]
pub struct DrawingUiPanel {
    x: i32,
    y: i32,
    width: i32,
    height: i32,
    pub hovered: Option<UiButton>,
}

impl DrawingUiPanel {
    /// Recompute the panel placement for the current output height. The
    /// panel hugs the left edge, vertically centred.
    pub fn update_geometry(&mut self, screen_height: i32) {
        self.width = BUTTON_WIDTH + 2 * PANEL_PADDING;
        self.height =
            PANEL_PADDING * 2 + BUTTON_HEIGHT * 6 + BUTTON_SPACING * 5 + SEPARATOR_HEIGHT;
        self.x = PANEL_X;
        self.y = (screen_height - self.height) / 2;
    }

    fn button_y(&self, index: i32) -> i32 {
        let mut y = self.y + PANEL_PADDING;
        if index < 3 {
            y += index * (BUTTON_HEIGHT + BUTTON_SPACING);
        } else {
            y += 3 * (BUTTON_HEIGHT + BUTTON_SPACING);
            y += SEPARATOR_HEIGHT;
            y += (index - 3) * (BUTTON_HEIGHT + BUTTON_SPACING);
        }
        y
    }

    /// The button under a cursor position in logical screen coordinates.
    pub fn button_at(&self, x: f64, y: f64) -> Option<UiButton> {
        if x < self.x as f64
            || x >= (self.x + self.width) as f64
            || y < self.y as f64
            || y >= (self.y + self.height) as f64
        {
            return None;
        }

        let relative_x = x as i32 - (self.x + PANEL_PADDING);
        if relative_x < 0 || relative_x >= BUTTON_WIDTH {
            return None;
        }

        for (i, button) in BUTTONS.iter().enumerate() {
            let button_y = self.button_y(i as i32);
            if y as i32 >= button_y && (y as i32) < button_y + BUTTON_HEIGHT {
                return Some(*button);
            }
        }

        None
    }

    pub fn update_hover(&mut self, x: f64, y: f64) {
        self.hovered = self.button_at(x, y);
    }
}

impl DrawingLayer {
    /// Apply a click on a panel button.
    pub fn apply_ui_click(&mut self, button: UiButton) {
        match button {
            UiButton::ColorRed => self.current_color = COLOR_RED,
            UiButton::ColorGreen => self.current_color = COLOR_GREEN,
            UiButton::ColorBlue => self.current_color = COLOR_BLUE,
            UiButton::Undo => self.undo(),
            UiButton::Redo => self.redo(),
            UiButton::Clear => self.clear_all(),
        }
        tracing::debug!("UI button clicked: {button:?}");
    }
}

fn solid(rect: Rectangle<i32, Physical>, color: [f32; 4]) -> SolidColorRenderElement {
    SolidColorRenderElement::new(
        Id::new(),
        rect,
        CommitCounter::default(),
        color.into(),
        Kind::Unspecified,
    )
}

fn scaled_rect(x: i32, y: i32, w: i32, h: i32, scale: f64) -> Rectangle<i32, Physical> {
    Rectangle::new(
        Point::from((
            (x as f64 * scale).round() as i32,
            (y as f64 * scale).round() as i32,
        )),
        Size::from((
            (w as f64 * scale).round() as i32,
            (h as f64 * scale).round() as i32,
        )),
    )
}

fn color_equal(a: StrokeColor, b: StrokeColor) -> bool {
    (a.r - b.r).abs() < 0.01 && (a.g - b.g).abs() < 0.01 && (a.b - b.b).abs() < 0.01
}

/// Emit the panel as solid-colour elements, topmost first.
pub fn panel_elements(
    drawing: &DrawingLayer,
    output_scale: f64,
    elements: &mut Vec<SolidColorRenderElement>,
) {
    let panel = &drawing.panel;
    let button_x = panel.x + PANEL_PADDING;

    let mut buttons = Vec::new();
    for (i, button) in BUTTONS.iter().enumerate() {
        let y = panel.button_y(i as i32);
        let hovered = panel.hovered == Some(*button);

        match button {
            UiButton::ColorRed | UiButton::ColorGreen | UiButton::ColorBlue => {
                let swatch = match button {
                    UiButton::ColorRed => COLOR_RED,
                    UiButton::ColorGreen => COLOR_GREEN,
                    _ => COLOR_BLUE,
                };
                let selected = color_equal(drawing.current_color, swatch);
                let bg = if selected {
                    BUTTON_SELECTED
                } else if hovered {
                    BUTTON_HOVER
                } else {
                    BUTTON_NORMAL
                };

                // Swatch is centred and inset within the button.
                let swatch_size = BUTTON_WIDTH - 16;
                let inset = (BUTTON_WIDTH - swatch_size) / 2;
                buttons.push(solid(
                    scaled_rect(
                        button_x + inset,
                        y + inset,
                        swatch_size,
                        swatch_size,
                        output_scale,
                    ),
                    [swatch.r, swatch.g, swatch.b, 1.0],
                ));
                buttons.push(solid(
                    scaled_rect(button_x, y, BUTTON_WIDTH, BUTTON_HEIGHT, output_scale),
                    bg,
                ));
            }
            UiButton::Undo | UiButton::Redo | UiButton::Clear => {
                let bg = if hovered { BUTTON_HOVER } else { BUTTON_NORMAL };
                icon_elements(*button, button_x, y, output_scale, &mut buttons);
                buttons.push(solid(
                    scaled_rect(button_x, y, BUTTON_WIDTH, BUTTON_HEIGHT, output_scale),
                    bg,
                ));
            }
        }
    }

    elements.extend(buttons);
    elements.push(solid(
        scaled_rect(panel.x, panel.y, panel.width, panel.height, output_scale),
        BG_COLOR,
    ));
}

fn icon_elements(
    button: UiButton,
    x: i32,
    y: i32,
    scale: f64,
    elements: &mut Vec<SolidColorRenderElement>,
) {
    let centre_x = x + BUTTON_WIDTH / 2;
    let centre_y = y + BUTTON_HEIGHT / 2;

    match button {
        UiButton::Undo => {
            // Left-pointing triangle built from vertical slivers.
            for i in 0..12 {
                elements.push(solid(
                    scaled_rect(centre_x - 6 + i, centre_y - i, 2, i * 2 + 1, scale),
                    ICON_COLOR,
                ));
            }
        }
        UiButton::Redo => {
            // Right-pointing triangle.
            for i in 0..12 {
                elements.push(solid(
                    scaled_rect(centre_x + 6 - i, centre_y - i, 2, i * 2 + 1, scale),
                    ICON_COLOR,
                ));
            }
        }
        UiButton::Clear => {
            // An X from two diagonal runs of dots.
            for i in 0..16 {
                elements.push(solid(
                    scaled_rect(centre_x - 8 + i, centre_y - 8 + i, 3, 3, scale),
                    ICON_COLOR,
                ));
                elements.push(solid(
                    scaled_rect(centre_x + 8 - i, centre_y - 8 + i, 3, 3, scale),
                    ICON_COLOR,
                ));
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn panel() -> DrawingUiPanel {
        let mut panel = DrawingUiPanel::default();
        panel.update_geometry(1080);
        panel
    }

    #[test]
    fn panel_is_vertically_centred() {
        let panel = panel();
        assert_eq!(panel.x, PANEL_X);
        assert_eq!(panel.y, (1080 - panel.height) / 2);
    }

    #[test]
    fn button_hit_boxes() {
        let panel = panel();
        let x = (panel.x + PANEL_PADDING + 1) as f64;

        let first_y = (panel.button_y(0) + 1) as f64;
        assert_eq!(panel.button_at(x, first_y), Some(UiButton::ColorRed));

        let undo_y = (panel.button_y(3) + BUTTON_HEIGHT / 2) as f64;
        assert_eq!(panel.button_at(x, undo_y), Some(UiButton::Undo));

        let clear_y = (panel.button_y(5) + BUTTON_HEIGHT - 1) as f64;
        assert_eq!(panel.button_at(x, clear_y), Some(UiButton::Clear));
    }

    #[test]
    fn separator_and_outside_miss() {
        let panel = panel();
        let x = (panel.x + PANEL_PADDING + 1) as f64;

        // Between the swatches and the action buttons.
        let separator_y = (panel.button_y(2) + BUTTON_HEIGHT + BUTTON_SPACING / 2) as f64;
        assert_eq!(panel.button_at(x, separator_y), None);

        assert_eq!(panel.button_at(0.0, panel.y as f64 + 1.0), None);
        assert_eq!(panel.button_at(x, 0.0), None);
    }

    #[test]
    fn ui_click_dispatch() {
        let mut drawing = DrawingLayer::default();
        drawing.drawing_mode = true;

        drawing.apply_ui_click(UiButton::ColorBlue);
        assert!(color_equal(drawing.current_color, COLOR_BLUE));

        drawing.stroke_begin(0.0, 0.0);
        drawing.stroke_add_point(10.0, 0.0);
        drawing.stroke_end();
        drawing.apply_ui_click(UiButton::Undo);
        assert!(drawing.strokes().is_empty());
        drawing.apply_ui_click(UiButton::Redo);
        assert_eq!(drawing.strokes().len(), 1);
        drawing.apply_ui_click(UiButton::Clear);
        assert!(drawing.strokes().is_empty());
    }
}
