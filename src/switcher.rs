//! The spatial alt-tab switcher.
//!
//! The overlay lists every view and highlights the selection; confirming
//! snaps the viewport so the chosen window sits at screen centre. The
//! panel is rasterised with cairo/pango to an ARGB bitmap at physical
//! resolution whenever it is dirty, then blitted once per frame.

use smithay::{
    backend::{
        allocator::Fourcc,
        renderer::{
            element::{
                memory::{MemoryRenderBuffer, MemoryRenderBufferRenderElement},
                Kind,
            },
            gles::GlesRenderer,
        },
    },
    utils::{Physical, Point, Size, Transform},
    wayland::{compositor::with_states, shell::xdg::XdgToplevelSurfaceData},
};
use tracing::{debug, warn};

use crate::view::View;

const PADDING: i32 = 20;
const ITEM_HEIGHT: i32 = 40;
const ITEM_PADDING: i32 = 10;
const FONT: &str = "Sans 14";
const MIN_WIDTH: i32 = 300;

const BG: (f64, f64, f64, f64) = (0.15, 0.15, 0.15, 0.95);
const TEXT: (f64, f64, f64) = (1.0, 1.0, 1.0);
const HIGHLIGHT: (f64, f64, f64, f64) = (0.3, 0.5, 0.8, 0.8);

#[derive(Debug, Default)]
pub struct Switcher {
    pub active: bool,
    pub selected: Option<u64>,
    pub dirty: bool,

    buffer: Option<MemoryRenderBuffer>,
    buffer_size: Size<i32, Physical>,
}

/// Cycle through `ids` from `selected`, wrapping around.
fn cycle(ids: &[u64], selected: u64, forward: bool) -> u64 {
    let Some(index) = ids.iter().position(|&id| id == selected) else {
        return ids.first().copied().unwrap_or(selected);
    };

    let len = ids.len();
    let next = if forward {
        (index + 1) % len
    } else {
        (index + len - 1) % len
    };
    ids[next]
}

impl Switcher {
    /// Activate the switcher. The first view is already focused, so the
    /// initial selection is the second view when there is one. Does not
    /// activate with no views at all.
    pub fn start(&mut self, views: &[View]) {
        let mut ids = views.iter().map(|view| view.id);
        let Some(first) = ids.next() else {
            return;
        };

        self.active = true;
        self.selected = Some(ids.next().unwrap_or(first));
        self.dirty = true;
        debug!("switcher started, selected view {:?}", self.selected);
    }

    pub fn next(&mut self, views: &[View]) {
        self.advance(views, true);
    }

    pub fn prev(&mut self, views: &[View]) {
        self.advance(views, false);
    }

    fn advance(&mut self, views: &[View], forward: bool) {
        if !self.active {
            return;
        }
        let ids: Vec<u64> = views.iter().map(|view| view.id).collect();
        if let Some(selected) = self.selected {
            self.selected = Some(cycle(&ids, selected, forward));
            self.dirty = true;
            debug!("switcher selected view {:?}", self.selected);
        }
    }

    /// Deactivate, returning the confirmed view id for the caller to snap
    /// to and focus.
    pub fn confirm(&mut self) -> Option<u64> {
        if !self.active {
            return None;
        }
        let selected = self.selected.take();
        self.deactivate();
        debug!("switcher confirmed view {selected:?}");
        selected
    }

    pub fn cancel(&mut self) {
        self.selected = None;
        self.deactivate();
        debug!("switcher cancelled");
    }

    fn deactivate(&mut self) {
        self.active = false;
        // The cached overlay bitmap is dropped on deactivation.
        self.buffer = None;
        self.dirty = false;
    }

    /// The overlay element, centred on the output. Re-rasterises the
    /// bitmap when dirty.
    pub fn render_element(
        &mut self,
        renderer: &mut GlesRenderer,
        views: &[View],
        output_size: Size<i32, Physical>,
        output_scale: f64,
    ) -> Option<MemoryRenderBufferRenderElement<GlesRenderer>> {
        if !self.active {
            return None;
        }

        if self.dirty || self.buffer.is_none() {
            match self.rasterise(views, output_scale) {
                Ok(()) => self.dirty = false,
                Err(err) => {
                    warn!("failed to rasterise switcher overlay: {err}");
                    return None;
                }
            }
        }

        let buffer = self.buffer.as_ref()?;
        let location = Point::from((
            ((output_size.w - self.buffer_size.w) / 2) as f64,
            ((output_size.h - self.buffer_size.h) / 2) as f64,
        ));

        match MemoryRenderBufferRenderElement::from_buffer(
            renderer,
            location,
            buffer,
            None,
            None,
            None,
            Kind::Unspecified,
        ) {
            Ok(element) => Some(element),
            Err(err) => {
                warn!("failed to import switcher overlay: {err:?}");
                None
            }
        }
    }

    fn rasterise(&mut self, views: &[View], output_scale: f64) -> anyhow::Result<()> {
        if views.is_empty() {
            return Ok(());
        }

        // Logical layout, rendered at physical resolution for crisp text.
        let width = MIN_WIDTH;
        let height = PADDING * 2 + views.len() as i32 * ITEM_HEIGHT;
        let physical_width = (width as f64 * output_scale) as i32;
        let physical_height = (height as f64 * output_scale) as i32;

        let mut surface = cairo::ImageSurface::create(
            cairo::Format::ARgb32,
            physical_width,
            physical_height,
        )?;

        {
            let cr = cairo::Context::new(&surface)?;
            cr.scale(output_scale, output_scale);

            rounded_rect(&cr, 0.0, 0.0, width as f64, height as f64, 10.0);
            cr.set_source_rgba(BG.0, BG.1, BG.2, BG.3);
            cr.fill()?;

            let layout = pangocairo::functions::create_layout(&cr);
            let font = pango::FontDescription::from_string(FONT);
            layout.set_font_description(Some(&font));
            layout.set_width((width - PADDING * 2) * pango::SCALE);
            layout.set_ellipsize(pango::EllipsizeMode::End);

            let mut item_y = PADDING;
            for view in views {
                if Some(view.id) == self.selected {
                    cr.set_source_rgba(HIGHLIGHT.0, HIGHLIGHT.1, HIGHLIGHT.2, HIGHLIGHT.3);
                    rounded_rect(
                        &cr,
                        ITEM_PADDING as f64,
                        item_y as f64,
                        (width - ITEM_PADDING * 2) as f64,
                        (ITEM_HEIGHT - 4) as f64,
                        5.0,
                    );
                    cr.fill()?;
                }

                cr.set_source_rgb(TEXT.0, TEXT.1, TEXT.2);
                layout.set_text(&view_label(view));
                cr.move_to(PADDING as f64, item_y as f64 + (ITEM_HEIGHT - 20) as f64 / 2.0);
                pangocairo::functions::show_layout(&cr, &layout);

                item_y += ITEM_HEIGHT;
            }
        }

        surface.flush();
        let data = surface.data()?;
        self.buffer = Some(MemoryRenderBuffer::from_slice(
            &data,
            Fourcc::Argb8888,
            (physical_width, physical_height),
            1,
            Transform::Normal,
            None,
        ));
        self.buffer_size = Size::from((physical_width, physical_height));
        Ok(())
    }
}

fn view_label(view: &View) -> String {
    with_states(view.wl_surface(), |states| {
        let attributes = states
            .data_map
            .get::<XdgToplevelSurfaceData>()
            .unwrap()
            .lock()
            .unwrap();
        let app_id = attributes.app_id.clone().unwrap_or_else(|| "unknown".into());
        let title = attributes.title.clone().unwrap_or_else(|| "(untitled)".into());
        format!("{app_id} - {title}")
    })
}

fn rounded_rect(cr: &cairo::Context, x: f64, y: f64, w: f64, h: f64, radius: f64) {
    use std::f64::consts::PI;

    cr.new_sub_path();
    cr.arc(x + w - radius, y + radius, radius, -PI / 2.0, 0.0);
    cr.arc(x + w - radius, y + h - radius, radius, 0.0, PI / 2.0);
    cr.arc(x + radius, y + h - radius, radius, PI / 2.0, PI);
    cr.arc(x + radius, y + radius, radius, PI, 3.0 * PI / 2.0);
    cr.close_path();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_wraps_in_both_directions() {
        let ids = [10, 20, 30];
        assert_eq!(cycle(&ids, 10, true), 20);
        assert_eq!(cycle(&ids, 30, true), 10);
        assert_eq!(cycle(&ids, 10, false), 30);
        assert_eq!(cycle(&ids, 20, false), 10);
    }

    #[test]
    fn cycle_with_unknown_selection_restarts() {
        let ids = [10, 20];
        assert_eq!(cycle(&ids, 99, true), 10);
    }

    #[test]
    fn cycle_single_entry_stays() {
        assert_eq!(cycle(&[7], 7, true), 7);
        assert_eq!(cycle(&[7], 7, false), 7);
    }

    #[test]
    fn inactive_switcher_ignores_confirm_and_advance() {
        let mut switcher = Switcher::default();
        assert_eq!(switcher.confirm(), None);

        switcher.cancel();
        assert!(!switcher.active);
    }

    #[test]
    fn start_with_no_views_does_not_activate() {
        let mut switcher = Switcher::default();
        switcher.start(&[]);
        assert!(!switcher.active);
        assert_eq!(switcher.selected, None);
    }
}
