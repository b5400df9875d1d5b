//! Layer-shell surface arrangement.
//!
//! Each output keeps four ordered lists of layer surfaces, one per shell
//! layer. Arranging walks the layers in z-order, positions every surface
//! from its anchors and margins within the output rectangle, and shrinks
//! the usable area by positive exclusive zones. New windows spawn centred
//! in the resulting usable area.

use smithay::{
    output::Output,
    reexports::wayland_server::protocol::wl_surface::WlSurface,
    utils::{Logical, Point, Rectangle, Size},
    wayland::shell::wlr_layer::{
        Anchor, ExclusiveZone, KeyboardInteractivity, Layer, LayerSurface, Margins,
    },
};
use tracing::debug;

use crate::OutputExt;

pub const LAYER_COUNT: usize = 4;

/// Index into [`OutputEntry::layers`], ordered back to front.
pub fn layer_index(layer: Layer) -> usize {
    match layer {
        Layer::Background => 0,
        Layer::Bottom => 1,
        Layer::Top => 2,
        Layer::Overlay => 3,
    }
}

#[derive(Debug)]
pub struct LayerEntry {
    pub surface: LayerSurface,
    /// Position assigned by the arranger, in logical screen coordinates.
    pub position: Point<i32, Logical>,
    pub mapped: bool,
}

impl LayerEntry {
    pub fn new(surface: LayerSurface) -> Self {
        Self {
            surface,
            position: Point::from((0, 0)),
            mapped: false,
        }
    }

    pub fn wants_keyboard_focus(&self) -> bool {
        let interactivity = self.surface.cached_state().keyboard_interactivity;
        matches!(
            self.surface.layer(),
            Layer::Top | Layer::Overlay
        ) && interactivity != KeyboardInteractivity::None
    }
}

/// Per-output compositor state: layer surfaces and the usable area left
/// over after exclusive zones.
#[derive(Debug)]
pub struct OutputEntry {
    pub output: Output,
    pub usable_area: Rectangle<i32, Logical>,
    pub layers: [Vec<LayerEntry>; LAYER_COUNT],
}

impl OutputEntry {
    pub fn new(output: Output) -> Self {
        let usable_area = Rectangle::from_size(output.effective_size());
        Self {
            output,
            usable_area,
            layers: Default::default(),
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &LayerEntry> {
        self.layers.iter().flatten()
    }

    pub fn entry_for_surface_mut(&mut self, surface: &WlSurface) -> Option<&mut LayerEntry> {
        self.layers
            .iter_mut()
            .flatten()
            .find(|entry| entry.surface.wl_surface() == surface)
    }

    pub fn remove_surface(&mut self, surface: &LayerSurface) -> bool {
        let mut removed = false;
        for list in &mut self.layers {
            let before = list.len();
            list.retain(|entry| entry.surface.wl_surface() != surface.wl_surface());
            removed |= list.len() != before;
        }
        removed
    }

    /// Recompute positions, exclusive zones and the usable area, and send
    /// a configure to every surface whose size changed.
    pub fn arrange(&mut self) {
        let full_area = Rectangle::from_size(self.output.effective_size());
        let mut usable_area = full_area;

        for list in &mut self.layers {
            for entry in list.iter_mut() {
                let (anchor, margin, desired, exclusive) = {
                    let state = entry.surface.cached_state();
                    (state.anchor, state.margin, state.size, state.exclusive_zone)
                };

                let rect =
                    arrange_surface(full_area, &mut usable_area, anchor, margin, desired, exclusive);
                entry.position = rect.loc;

                entry.surface.with_pending_state(|state| {
                    state.size = Some(rect.size);
                });
                entry.surface.send_pending_configure();

                debug!(
                    "arranged layer surface: pos=({}, {}), size={}x{}, exclusive={:?}",
                    rect.loc.x, rect.loc.y, rect.size.w, rect.size.h, exclusive
                );
            }
        }

        self.usable_area = usable_area;
        debug!(
            "output {} usable area: ({}, {}) {}x{}",
            self.output.name(),
            usable_area.loc.x,
            usable_area.loc.y,
            usable_area.size.w,
            usable_area.size.h
        );
    }
}

/// Position one surface within `full_area` from its anchors and margins,
/// shrinking `usable_area` along the anchored edge when the surface claims
/// a positive exclusive zone. Returns the assigned rectangle.
pub fn arrange_surface(
    full_area: Rectangle<i32, Logical>,
    usable_area: &mut Rectangle<i32, Logical>,
    anchor: Anchor,
    margin: Margins,
    desired: Size<i32, Logical>,
    exclusive: ExclusiveZone,
) -> Rectangle<i32, Logical> {
    let left = anchor.contains(Anchor::LEFT);
    let right = anchor.contains(Anchor::RIGHT);
    let top = anchor.contains(Anchor::TOP);
    let bottom = anchor.contains(Anchor::BOTTOM);

    // A zero desired dimension means "stretch between the anchored edges".
    let mut width = desired.w;
    if width == 0 {
        width = (full_area.size.w - margin.left - margin.right).max(0);
    }
    let mut height = desired.h;
    if height == 0 {
        height = (full_area.size.h - margin.top - margin.bottom).max(0);
    }

    let x = if left && right {
        full_area.loc.x + margin.left
    } else if left {
        full_area.loc.x + margin.left
    } else if right {
        full_area.loc.x + full_area.size.w - width - margin.right
    } else {
        full_area.loc.x + (full_area.size.w - width) / 2
    };

    let y = if top && bottom {
        full_area.loc.y + margin.top
    } else if top {
        full_area.loc.y + margin.top
    } else if bottom {
        full_area.loc.y + full_area.size.h - height - margin.bottom
    } else {
        full_area.loc.y + (full_area.size.h - height) / 2
    };

    if let ExclusiveZone::Exclusive(zone) = exclusive {
        if zone > 0 {
            apply_exclusive(usable_area, anchor, margin, zone as i32);
        }
    }

    Rectangle::new(Point::from((x, y)), Size::from((width, height)))
}

/// Shrink the usable area by `zone` (plus the margin) along the edge the
/// surface is anchored to. A surface anchored to a corner, to opposite
/// edges, or to all edges claims no exclusive edge.
fn apply_exclusive(
    usable_area: &mut Rectangle<i32, Logical>,
    anchor: Anchor,
    margin: Margins,
    zone: i32,
) {
    let left = anchor.contains(Anchor::LEFT);
    let right = anchor.contains(Anchor::RIGHT);
    let top = anchor.contains(Anchor::TOP);
    let bottom = anchor.contains(Anchor::BOTTOM);

    match (top, bottom, left, right) {
        (true, false, l, r) if l == r => {
            let amount = (zone + margin.top).min(usable_area.size.h);
            usable_area.loc.y += amount;
            usable_area.size.h -= amount;
        }
        (false, true, l, r) if l == r => {
            let amount = (zone + margin.bottom).min(usable_area.size.h);
            usable_area.size.h -= amount;
        }
        (t, b, true, false) if t == b => {
            let amount = (zone + margin.left).min(usable_area.size.w);
            usable_area.loc.x += amount;
            usable_area.size.w -= amount;
        }
        (t, b, false, true) if t == b => {
            let amount = (zone + margin.right).min(usable_area.size.w);
            usable_area.size.w -= amount;
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full() -> Rectangle<i32, Logical> {
        Rectangle::from_size(Size::from((1920, 1080)))
    }

    fn no_margin() -> Margins {
        Margins {
            top: 0,
            right: 0,
            bottom: 0,
            left: 0,
        }
    }

    #[test]
    fn top_panel_reserves_exclusive_zone() {
        let full = full();
        let mut usable = full;

        let rect = arrange_surface(
            full,
            &mut usable,
            Anchor::TOP | Anchor::LEFT | Anchor::RIGHT,
            no_margin(),
            Size::from((0, 30)),
            ExclusiveZone::Exclusive(30),
        );

        assert_eq!(rect, Rectangle::new(Point::from((0, 0)), Size::from((1920, 30))));
        assert_eq!(usable, Rectangle::new(Point::from((0, 30)), Size::from((1920, 1050))));
    }

    #[test]
    fn opposite_panels_stack_exclusive_zones() {
        let full = full();
        let mut usable = full;

        arrange_surface(
            full,
            &mut usable,
            Anchor::TOP,
            no_margin(),
            Size::from((400, 30)),
            ExclusiveZone::Exclusive(30),
        );
        arrange_surface(
            full,
            &mut usable,
            Anchor::BOTTOM,
            no_margin(),
            Size::from((400, 50)),
            ExclusiveZone::Exclusive(50),
        );

        // usable = full minus both zones on their anchored edges.
        assert_eq!(usable, Rectangle::new(Point::from((0, 30)), Size::from((1920, 1000))));

        // Usable area stays inside the full area.
        assert!(full.contains_rect(usable));
    }

    #[test]
    fn unanchored_surface_is_centred() {
        let full = full();
        let mut usable = full;

        let rect = arrange_surface(
            full,
            &mut usable,
            Anchor::empty(),
            no_margin(),
            Size::from((400, 200)),
            ExclusiveZone::Neutral,
        );

        assert_eq!(rect.loc, Point::from((760, 440)));
        assert_eq!(usable, full);
    }

    #[test]
    fn right_anchored_respects_margin() {
        let full = full();
        let mut usable = full;

        let rect = arrange_surface(
            full,
            &mut usable,
            Anchor::RIGHT,
            Margins {
                top: 0,
                right: 10,
                bottom: 0,
                left: 0,
            },
            Size::from((300, 600)),
            ExclusiveZone::Exclusive(300),
        );

        assert_eq!(rect.loc, Point::from((1920 - 300 - 10, 240)));
        // Zone plus margin comes off the right edge.
        assert_eq!(usable.size.w, 1920 - 310);
        assert_eq!(usable.loc.x, 0);
    }

    #[test]
    fn corner_anchor_claims_no_exclusive_edge() {
        let full = full();
        let mut usable = full;

        arrange_surface(
            full,
            &mut usable,
            Anchor::TOP | Anchor::LEFT,
            no_margin(),
            Size::from((100, 100)),
            ExclusiveZone::Exclusive(100),
        );

        assert_eq!(usable, full);
    }

    #[test]
    fn wallpaper_stretches_to_full_area() {
        let full = full();
        let mut usable = full;

        let rect = arrange_surface(
            full,
            &mut usable,
            Anchor::TOP | Anchor::BOTTOM | Anchor::LEFT | Anchor::RIGHT,
            no_margin(),
            Size::from((0, 0)),
            ExclusiveZone::Neutral,
        );

        assert_eq!(rect, full);
        assert_eq!(usable, full);
    }
}
