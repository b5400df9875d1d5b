//! Views: toplevel windows placed on the canvas.
//!
//! A view's `(x, y)` is the top-left of its content rectangle in canvas
//! coordinates. The head of the server's view list is the top of the
//! z-stack and carries keyboard focus when any view is focused.

use smithay::{
    desktop::Window,
    reexports::wayland_server::protocol::wl_surface::WlSurface,
    utils::{Logical, Rectangle, SERIAL_COUNTER},
    wayland::shell::xdg::ToplevelSurface,
};
use tracing::debug;

use crate::{
    canvas::{ease_out_cubic, lerp, Canvas},
    Backend, Infinidesk, OutputExt,
};

pub const FOCUS_ANIM_DURATION_MS: u32 = 200;
pub const MAP_ANIM_DURATION_MS: u32 = 200;

/// Windows scale in from this factor while mapping.
pub const MAP_ANIM_SCALE_START: f64 = 0.9;

/// Edge-to-edge gap left between gathered windows, in canvas units.
pub const GATHER_GAP: f64 = 20.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct FocusAnimation {
    /// 0.0 = unfocused border colour, 1.0 = focused.
    pub progress: f64,
    pub start_ms: u32,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MapAnimation {
    /// 0.0 = just mapped, 1.0 = fully visible.
    pub progress: f64,
    pub start_ms: u32,
    pub animating_out: bool,
}

#[derive(Debug, Clone, Copy)]
struct MoveGrab {
    /// Canvas coordinates where the grab started.
    cursor: (f64, f64),
    /// View position when the grab started.
    origin: (f64, f64),
}

#[derive(Debug)]
pub struct View {
    pub id: u64,
    pub window: Window,

    /// Content top-left in canvas coordinates.
    pub x: f64,
    pub y: f64,

    pub mapped: bool,
    pub focused: bool,
    pub focus_anim: FocusAnimation,
    pub map_anim: MapAnimation,

    moving: Option<MoveGrab>,
}

impl View {
    pub fn new(id: u64, window: Window) -> Self {
        Self {
            id,
            window,
            x: 0.0,
            y: 0.0,
            mapped: false,
            focused: false,
            focus_anim: FocusAnimation::default(),
            map_anim: MapAnimation::default(),
            moving: None,
        }
    }

    pub fn toplevel(&self) -> &ToplevelSurface {
        self.window.toplevel().expect("views are always xdg toplevels")
    }

    pub fn wl_surface(&self) -> &WlSurface {
        self.toplevel().wl_surface()
    }

    /// The content rectangle reported by the client (loc is the geometry
    /// offset, non-zero for CSD clients drawing their own shadows).
    pub fn geometry(&self) -> Rectangle<i32, Logical> {
        self.window.geometry()
    }

    pub fn centre(&self) -> (f64, f64) {
        let geo = self.geometry();
        (
            self.x + geo.size.w as f64 / 2.0,
            self.y + geo.size.h as f64 / 2.0,
        )
    }

    pub fn set_position(&mut self, x: f64, y: f64) {
        self.x = x;
        self.y = y;
    }

    pub fn move_begin(&mut self, cursor_x: f64, cursor_y: f64) {
        self.moving = Some(MoveGrab {
            cursor: (cursor_x, cursor_y),
            origin: (self.x, self.y),
        });
        debug!("view move started at ({cursor_x:.1}, {cursor_y:.1})");
    }

    pub fn move_update(&mut self, cursor_x: f64, cursor_y: f64) {
        let Some(grab) = self.moving else {
            return;
        };
        self.x = grab.origin.0 + (cursor_x - grab.cursor.0);
        self.y = grab.origin.1 + (cursor_y - grab.cursor.1);
    }

    pub fn move_end(&mut self) {
        if self.moving.take().is_some() {
            debug!("view move ended at ({:.1}, {:.1})", self.x, self.y);
        }
    }

    pub fn is_moving(&self) -> bool {
        self.moving.is_some()
    }

    pub fn close(&self) {
        self.toplevel().send_close();
    }

    pub fn start_map_animation(&mut self, now_ms: u32) {
        self.map_anim = MapAnimation {
            progress: 0.0,
            start_ms: now_ms,
            animating_out: false,
        };
    }

    /// The scale applied by the map-in animation, about the window centre.
    pub fn anim_scale(&self) -> f64 {
        lerp(MAP_ANIM_SCALE_START, 1.0, self.map_anim.progress)
    }

    pub fn anim_opacity(&self) -> f32 {
        self.map_anim.progress as f32
    }
}

impl<BackendData: Backend + 'static> Infinidesk<BackendData> {
    pub fn view(&self, id: u64) -> Option<&View> {
        self.views.iter().find(|view| view.id == id)
    }

    pub fn view_mut(&mut self, id: u64) -> Option<&mut View> {
        self.views.iter_mut().find(|view| view.id == id)
    }

    pub fn view_for_surface(&self, surface: &WlSurface) -> Option<&View> {
        self.views
            .iter()
            .find(|view| view.wl_surface() == surface)
    }

    /// Give keyboard focus and the focused border to a view. Does not
    /// raise; click-to-focus raises separately, focus-follows-mouse never
    /// does.
    pub fn focus_view(&mut self, id: u64) {
        let keyboard = self.seat.get_keyboard().unwrap();
        let Some(view) = self.view(id) else {
            return;
        };
        let surface = view.wl_surface().clone();

        if keyboard.current_focus().as_ref() == Some(&surface) {
            return;
        }

        let now = self.now_ms();

        // Deactivate the previously focused view and start its unfocus
        // animation.
        if let Some(prev) = self.views.iter_mut().find(|view| view.focused) {
            prev.focused = false;
            prev.focus_anim.start_ms = now;
            prev.focus_anim.active = true;
            prev.window.set_activated(false);
            prev.toplevel().send_pending_configure();
        }

        let view = self.view_mut(id).unwrap();
        view.focused = true;
        view.focus_anim.start_ms = now;
        view.focus_anim.active = true;
        view.window.set_activated(true);
        view.toplevel().send_pending_configure();

        keyboard.set_focus(self, Some(surface), SERIAL_COUNTER.next_serial());
        debug!("focused view {id}");
    }

    /// Move the view to the head of the list (top of the z-stack).
    pub fn raise_view(&mut self, id: u64) {
        if let Some(index) = self.views.iter().position(|view| view.id == id) {
            let view = self.views.remove(index);
            self.views.insert(0, view);
            debug!("raised view {id}");
        }
    }

    pub fn update_view_animations(&mut self, now_ms: u32) {
        for view in &mut self.views {
            if view.focus_anim.active {
                let elapsed = now_ms.saturating_sub(view.focus_anim.start_ms);
                let progress = elapsed as f64 / FOCUS_ANIM_DURATION_MS as f64;

                if progress >= 1.0 {
                    view.focus_anim.progress = if view.focused { 1.0 } else { 0.0 };
                    view.focus_anim.active = false;
                } else {
                    let eased = ease_out_cubic(progress);
                    view.focus_anim.progress = if view.focused { eased } else { 1.0 - eased };
                }
            }

            if view.map_anim.progress < 1.0 && !view.map_anim.animating_out {
                let elapsed = now_ms.saturating_sub(view.map_anim.start_ms);
                let progress = elapsed as f64 / MAP_ANIM_DURATION_MS as f64;
                view.map_anim.progress = if progress >= 1.0 {
                    1.0
                } else {
                    ease_out_cubic(progress)
                };
            }
        }
    }

    pub fn any_view_animating(&self) -> bool {
        self.views.iter().any(|view| {
            view.focus_anim.active
                || (view.mapped && view.map_anim.progress < 1.0 && !view.map_anim.animating_out)
        })
    }

    /// Pull scattered views towards their common centroid, then snap the
    /// viewport onto the new centroid.
    pub fn gather_views(&mut self) {
        if self.views.is_empty() {
            return;
        }
        let Some(output) = self.outputs.first() else {
            return;
        };
        let size = output.output.effective_size();

        let rects: Vec<(f64, f64, f64, f64)> = self
            .views
            .iter()
            .map(|view| {
                let geo = view.geometry();
                (view.x, view.y, geo.size.w as f64, geo.size.h as f64)
            })
            .collect();

        let positions = gather_positions(&rects, GATHER_GAP);
        for (view, (x, y)) in self.views.iter_mut().zip(&positions) {
            view.set_position(*x, *y);
        }

        // The centroid may have shifted due to minimum-distance clamping.
        let mut centroid = (0.0, 0.0);
        for view in &self.views {
            let centre = view.centre();
            centroid.0 += centre.0;
            centroid.1 += centre.1;
        }
        centroid.0 /= self.views.len() as f64;
        centroid.1 /= self.views.len() as f64;

        let now = self.now_ms();
        self.canvas
            .snap_to_centre(centroid.0, centroid.1, size.w, size.h, now);

        debug!(
            "gathered {} views towards centroid ({:.1}, {:.1})",
            self.views.len(),
            centroid.0,
            centroid.1
        );
    }
}

/// Canvas position for a newly mapped window: its centre goes to the
/// centre of the output's usable area, so it never spawns under panels.
pub fn map_position(
    canvas: &Canvas,
    usable: Rectangle<i32, Logical>,
    size: smithay::utils::Size<i32, Logical>,
) -> (f64, f64) {
    let screen_centre_x = usable.loc.x as f64 + usable.size.w as f64 / 2.0;
    let screen_centre_y = usable.loc.y as f64 + usable.size.h as f64 / 2.0;
    let (canvas_centre_x, canvas_centre_y) = canvas.to_canvas(screen_centre_x, screen_centre_y);
    (
        canvas_centre_x - size.w as f64 / 2.0,
        canvas_centre_y - size.h as f64 / 2.0,
    )
}

/// Compute gathered positions for a set of `(x, y, w, h)` rectangles.
///
/// Each rectangle's centre moves towards the common centroid to half its
/// current distance, clamped so that the rectangle's edge along the
/// approach direction stays at least `gap` away from the centroid.
pub fn gather_positions(rects: &[(f64, f64, f64, f64)], gap: f64) -> Vec<(f64, f64)> {
    const EPSILON: f64 = 0.001;

    if rects.is_empty() {
        return Vec::new();
    }

    let mut centroid = (0.0, 0.0);
    for &(x, y, w, h) in rects {
        centroid.0 += x + w / 2.0;
        centroid.1 += y + h / 2.0;
    }
    centroid.0 /= rects.len() as f64;
    centroid.1 /= rects.len() as f64;

    rects
        .iter()
        .map(|&(x, y, w, h)| {
            let centre = (x + w / 2.0, y + h / 2.0);
            let vec = (centre.0 - centroid.0, centre.1 - centroid.1);
            let distance = (vec.0 * vec.0 + vec.1 * vec.1).sqrt();

            if distance < EPSILON {
                // Already at the centroid; leave it in place.
                return (x, y);
            }

            let dir = (vec.0 / distance, vec.1 / distance);

            // Distance from the rectangle centre to its edge along the
            // approach direction.
            let tx = if dir.0.abs() > EPSILON {
                (w / 2.0) / dir.0.abs()
            } else {
                f64::INFINITY
            };
            let ty = if dir.1.abs() > EPSILON {
                (h / 2.0) / dir.1.abs()
            } else {
                f64::INFINITY
            };
            let edge_distance = tx.min(ty);

            let min_distance = edge_distance + gap;
            let new_distance = (distance * 0.5).max(min_distance);

            let new_centre = (
                centroid.0 + dir.0 * new_distance,
                centroid.1 + dir.1 * new_distance,
            );
            (new_centre.0 - w / 2.0, new_centre.1 - h / 2.0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use smithay::utils::{Point, Size};

    const EPSILON: f64 = 1e-9;

    #[test]
    fn map_centres_window_in_usable_area() {
        let canvas = Canvas::default();
        let usable = Rectangle::new(Point::from((0, 0)), Size::from((1920, 1080)));

        let (x, y) = map_position(&canvas, usable, Size::from((800, 600)));
        assert!((x - 560.0).abs() < EPSILON);
        assert!((y - 240.0).abs() < EPSILON);
    }

    #[test]
    fn map_position_respects_panels_and_viewport() {
        // A 30 px top panel shifts the usable centre down, and the canvas
        // transform maps it into world coordinates.
        let mut canvas = Canvas::default();
        canvas.viewport_x = 100.0;
        canvas.viewport_y = -50.0;
        canvas.scale = 2.0;
        let usable = Rectangle::new(Point::from((0, 30)), Size::from((1920, 1050)));

        let (x, y) = map_position(&canvas, usable, Size::from((400, 300)));
        // Usable centre (960, 555) -> canvas (580, 227.5), minus half size.
        assert!((x - (960.0 / 2.0 + 100.0 - 200.0)).abs() < EPSILON);
        assert!((y - (555.0 / 2.0 - 50.0 - 150.0)).abs() < EPSILON);
    }

    #[test]
    fn gather_with_no_rects_is_empty() {
        assert!(gather_positions(&[], GATHER_GAP).is_empty());
    }

    #[test]
    fn gather_single_rect_does_not_move() {
        let positions = gather_positions(&[(100.0, 200.0, 300.0, 150.0)], GATHER_GAP);
        assert_eq!(positions, vec![(100.0, 200.0)]);
    }

    #[test]
    fn gather_two_views_halves_the_distance() {
        // V1 at (0, 0) and V2 at (1000, 0), both 200x200, gap 20.
        // Centres (100, 100) and (1100, 100), centroid (600, 100); each is
        // 500 away, halving to 250 stays above the 120 minimum, so the new
        // centres are (350, 100) and (850, 100).
        let positions = gather_positions(
            &[(0.0, 0.0, 200.0, 200.0), (1000.0, 0.0, 200.0, 200.0)],
            20.0,
        );

        assert!((positions[0].0 - 250.0).abs() < EPSILON);
        assert!((positions[0].1 - 0.0).abs() < EPSILON);
        assert!((positions[1].0 - 750.0).abs() < EPSILON);
        assert!((positions[1].1 - 0.0).abs() < EPSILON);

        // The centroid is unchanged by a symmetric gather.
        let new_centroid_x =
            ((positions[0].0 + 100.0) + (positions[1].0 + 100.0)) / 2.0;
        assert!((new_centroid_x - 600.0).abs() < EPSILON);
    }

    #[test]
    fn gather_clamps_to_edge_distance_plus_gap() {
        // Close together: halving would overlap, so the minimum distance
        // (edge distance + gap) wins.
        let positions = gather_positions(
            &[(0.0, 0.0, 200.0, 200.0), (300.0, 0.0, 200.0, 200.0)],
            20.0,
        );

        // Centroid x = 250; each centre is 150 away; half is 75, but the
        // minimum is 100 + 20 = 120.
        assert!((positions[0].0 - (250.0 - 120.0 - 100.0)).abs() < EPSILON);
        assert!((positions[1].0 - (250.0 + 120.0 - 100.0)).abs() < EPSILON);
    }

    #[test]
    fn gather_preserves_direction() {
        let rects = [
            (0.0, 0.0, 100.0, 100.0),
            (1000.0, 1000.0, 100.0, 100.0),
            (0.0, 1000.0, 100.0, 100.0),
            (1000.0, 0.0, 100.0, 100.0),
        ];
        let positions = gather_positions(&rects, 20.0);

        let centroid = (550.0, 550.0);
        for (&(x, y, w, h), &(nx, ny)) in rects.iter().zip(&positions) {
            let old = ((x + w / 2.0) - centroid.0, (y + h / 2.0) - centroid.1);
            let new = ((nx + w / 2.0) - centroid.0, (ny + h / 2.0) - centroid.1);
            // Same quadrant, strictly closer.
            assert!(old.0.signum() == new.0.signum());
            assert!(old.1.signum() == new.1.signum());
            assert!(new.0.hypot(new.1) < old.0.hypot(old.1));
        }
    }

    #[test]
    fn gather_coincident_rect_stays_put() {
        let rects = [
            (450.0, 450.0, 100.0, 100.0),
            (450.0, 450.0, 100.0, 100.0),
        ];
        let positions = gather_positions(&rects, 20.0);
        assert_eq!(positions[0], (450.0, 450.0));
        assert_eq!(positions[1], (450.0, 450.0));
    }
}
