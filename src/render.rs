//! The per-frame composition pipeline.
//!
//! Views bypass the scene graph entirely: every frame assembles a fresh
//! list of render elements so views can be drawn at an arbitrary canvas
//! zoom with rounded borders and map/focus animations. The element list is
//! ordered topmost-first for the damage tracker:
//!
//!   switcher overlay, drawing UI, strokes, overlay+top layer shells,
//!   popups, views (front to back: border, corner masks, content),
//!   bottom+background layer shells; the clear colour is the backdrop.

use smithay::{
    backend::renderer::{
        element::{
            memory::MemoryRenderBufferRenderElement,
            solid::SolidColorRenderElement,
            surface::{render_elements_from_surface_tree, WaylandSurfaceRenderElement},
            utils::RescaleRenderElement,
            Id, Kind,
        },
        gles::GlesRenderer,
        utils::CommitCounter,
        ImportAll, ImportMem,
    },
    desktop::PopupManager,
    render_elements,
    utils::{Physical, Point, Rectangle, Scale, Size},
};

use crate::{
    canvas::{lerp, Canvas},
    drawing::{DrawingLayer, LINE_WIDTH},
    drawing_ui,
    layers::OutputEntry,
    switcher::Switcher,
    view::View,
};

pub const BORDER_WIDTH: i32 = 3;
pub const CORNER_RADIUS: i32 = 10;

pub const BORDER_FOCUSED: [f32; 4] = [0.4, 0.6, 0.9, 1.0];
pub const BORDER_UNFOCUSED: [f32; 4] = [0.3, 0.3, 0.35, 1.0];

/// Backdrop colour, also used for the corner masks that round off window
/// content.
pub const BACKGROUND_COLOR: [f32; 4] = [0.18, 0.18, 0.18, 1.0];

render_elements!(
    pub InfinideskRenderElement<R> where R: ImportAll + ImportMem;
    Surface=WaylandSurfaceRenderElement<R>,
    ScaledSurface=RescaleRenderElement<WaylandSurfaceRenderElement<R>>,
    Solid=SolidColorRenderElement,
    Overlay=MemoryRenderBufferRenderElement<R>,
);

fn solid(rect: Rectangle<i32, Physical>, color: [f32; 4]) -> SolidColorRenderElement {
    SolidColorRenderElement::new(
        Id::new(),
        rect,
        CommitCounter::default(),
        color.into(),
        Kind::Unspecified,
    )
}

/// Build the full element list for one frame of `output`, topmost first.
pub fn output_elements(
    renderer: &mut GlesRenderer,
    output_entry: &OutputEntry,
    canvas: &Canvas,
    views: &[View],
    drawing: &DrawingLayer,
    switcher: &mut Switcher,
    elements: &mut Vec<InfinideskRenderElement<GlesRenderer>>,
) {
    let output = &output_entry.output;
    let output_scale = output.current_scale().fractional_scale();
    let physical_size = output
        .current_mode()
        .map(|mode| mode.size)
        .unwrap_or_else(|| (0, 0).into());

    // Switcher overlay, centred in screen space.
    if switcher.active {
        if let Some(element) = switcher.render_element(renderer, views, physical_size, output_scale)
        {
            elements.push(InfinideskRenderElement::Overlay(element));
        }
    }

    // Drawing UI panel, screen space.
    if drawing.drawing_mode {
        let mut solids = Vec::new();
        drawing_ui::panel_elements(drawing, output_scale, &mut solids);
        elements.extend(solids.into_iter().map(InfinideskRenderElement::Solid));
    }

    // Annotation strokes, world space.
    stroke_elements(drawing, canvas, output_scale, elements);

    // Overlay and top layer shells above the views.
    for layer in [3, 2] {
        layer_elements(renderer, output_entry, layer, output_scale, elements);
    }

    // Popups above all views, in the same front-to-back order.
    for view in views.iter().filter(|view| view.mapped) {
        popup_elements(renderer, view, canvas, output_scale, elements);
    }

    // Views, front to back.
    for view in views.iter().filter(|view| view.mapped) {
        view_elements(renderer, view, canvas, output_scale, elements);
    }

    // Bottom and background layer shells.
    for layer in [1, 0] {
        layer_elements(renderer, output_entry, layer, output_scale, elements);
    }
}

/// Where a view's content rectangle lands in physical pixels, along with
/// the combined scale applied to its buffers.
struct ViewLayout {
    /// Content top-left in physical pixels, with the geometry offset and
    /// the centre-anchored animation offset applied. Borders, corner
    /// masks, surface content and hit-testing all anchor here.
    content_pos: Point<i32, Physical>,
    content_size: Size<i32, Physical>,
    /// canvas scale * output scale * animation scale.
    combined_scale: f64,
    /// canvas scale * animation scale; buffers are produced at output
    /// scale, so this is the factor left to apply.
    rescale: f64,
}

fn view_layout(view: &View, canvas: &Canvas, output_scale: f64) -> ViewLayout {
    let geo = view.geometry();
    let anim_scale = view.anim_scale();
    let base_scale = canvas.scale * output_scale;
    let combined_scale = base_scale * anim_scale;

    let (screen_x, screen_y) = canvas.to_screen(view.x, view.y);

    let base_w = (geo.size.w as f64 * base_scale).round() as i32;
    let base_h = (geo.size.h as f64 * base_scale).round() as i32;
    let content_w = (geo.size.w as f64 * combined_scale).round() as i32;
    let content_h = (geo.size.h as f64 * combined_scale).round() as i32;

    // The map animation scales about the window centre, not its top-left.
    let centre_offset_x = (base_w - content_w) / 2;
    let centre_offset_y = (base_h - content_h) / 2;

    // The geometry offset shifts the rendered bounds for CSD clients,
    // matching what the hit-tester inverts.
    let content_pos = Point::from((
        (screen_x * output_scale).round() as i32
            - (geo.loc.x as f64 * combined_scale).round() as i32
            + centre_offset_x,
        (screen_y * output_scale).round() as i32
            - (geo.loc.y as f64 * combined_scale).round() as i32
            + centre_offset_y,
    ));

    ViewLayout {
        content_pos,
        content_size: Size::from((content_w, content_h)),
        combined_scale,
        rescale: canvas.scale * anim_scale,
    }
}

fn view_elements(
    renderer: &mut GlesRenderer,
    view: &View,
    canvas: &Canvas,
    output_scale: f64,
    elements: &mut Vec<InfinideskRenderElement<GlesRenderer>>,
) {
    let geo = view.geometry();
    let layout = view_layout(view, canvas, output_scale);

    if layout.content_size.w <= 0 || layout.content_size.h <= 0 {
        return;
    }

    let scaled_border = ((BORDER_WIDTH as f64 * layout.combined_scale).round() as i32).max(1);
    let scaled_radius = ((CORNER_RADIUS as f64 * layout.combined_scale).round() as i32).max(0);

    let opacity = view.anim_opacity();

    // Border colour follows the focus animation.
    let t = view.focus_anim.progress as f32;
    let border_color = [
        lerp(BORDER_UNFOCUSED[0] as f64, BORDER_FOCUSED[0] as f64, t as f64) as f32,
        lerp(BORDER_UNFOCUSED[1] as f64, BORDER_FOCUSED[1] as f64, t as f64) as f32,
        lerp(BORDER_UNFOCUSED[2] as f64, BORDER_FOCUSED[2] as f64, t as f64) as f32,
        lerp(BORDER_UNFOCUSED[3] as f64, BORDER_FOCUSED[3] as f64, t as f64) as f32 * opacity,
    ];

    // The border sits outside the content and is drawn on top so the
    // client texture never occludes its rounded corners.
    let border_rect = Rectangle::new(
        layout.content_pos - Point::from((scaled_border, scaled_border)),
        layout.content_size + Size::from((2 * scaled_border, 2 * scaled_border)),
    );
    for span in border_spans(
        border_rect.size.w,
        border_rect.size.h,
        scaled_border,
        scaled_radius + scaled_border,
    ) {
        let mut span = span;
        span.loc += border_rect.loc;
        elements.push(InfinideskRenderElement::Solid(solid(span, border_color)));
    }

    // Corner masks round off the content with the backdrop colour.
    for span in corner_mask_spans(layout.content_size.w, layout.content_size.h, scaled_radius) {
        let mut span = span;
        span.loc += layout.content_pos;
        elements.push(InfinideskRenderElement::Solid(solid(span, BACKGROUND_COLOR)));
    }

    // The surface tree is produced at output scale; the rescale about
    // content_pos multiplies this pre-rescale backoff by the canvas
    // factor, so the buffer origin ends up one geometry offset (at the
    // combined scale) above-left of the content. The client's shadow
    // margin occupies that strip and the content pixels land exactly on
    // content_pos, under the border and corner masks.
    let surface_origin = layout.content_pos
        - Point::from((
            (geo.loc.x as f64 * output_scale).round() as i32,
            (geo.loc.y as f64 * output_scale).round() as i32,
        ));
    // Texture sampling is left to the renderer: an integer-aligned 1:1
    // blit fetches exact texels, any other scale samples bilinearly.
    let surface_elements: Vec<WaylandSurfaceRenderElement<GlesRenderer>> =
        render_elements_from_surface_tree(
            renderer,
            view.wl_surface(),
            surface_origin,
            Scale::from(output_scale),
            opacity,
            Kind::Unspecified,
        );
    elements.extend(surface_elements.into_iter().map(|element| {
        InfinideskRenderElement::ScaledSurface(RescaleRenderElement::from_element(
            element,
            layout.content_pos,
            layout.rescale,
        ))
    }));
}

fn popup_elements(
    renderer: &mut GlesRenderer,
    view: &View,
    canvas: &Canvas,
    output_scale: f64,
    elements: &mut Vec<InfinideskRenderElement<GlesRenderer>>,
) {
    let layout = view_layout(view, canvas, output_scale);

    for (popup, offset) in PopupManager::popups_for_surface(view.wl_surface()) {
        let surface = popup.wl_surface();
        let popup_geo = popup.geometry();

        // Offset of the popup content relative to the parent content
        // origin, in (zoomed) physical pixels.
        let offset_physical = Point::from((
            ((offset.x - popup_geo.loc.x) as f64 * output_scale * layout.rescale).round() as i32,
            ((offset.y - popup_geo.loc.y) as f64 * output_scale * layout.rescale).round() as i32,
        ));
        let origin = layout.content_pos + offset_physical;

        let surface_elements: Vec<WaylandSurfaceRenderElement<GlesRenderer>> =
            render_elements_from_surface_tree(
                renderer,
                surface,
                origin,
                Scale::from(output_scale),
                view.anim_opacity(),
                Kind::Unspecified,
            );
        elements.extend(surface_elements.into_iter().map(|element| {
            InfinideskRenderElement::ScaledSurface(RescaleRenderElement::from_element(
                element,
                origin,
                layout.rescale,
            ))
        }));
    }
}

fn layer_elements(
    renderer: &mut GlesRenderer,
    output_entry: &OutputEntry,
    layer: usize,
    output_scale: f64,
    elements: &mut Vec<InfinideskRenderElement<GlesRenderer>>,
) {
    // Later surfaces in each list stack above earlier ones; emit in
    // reverse so the list stays topmost-first.
    for entry in output_entry.layers[layer].iter().rev() {
        if !entry.mapped {
            continue;
        }

        let location = Point::from((
            (entry.position.x as f64 * output_scale).round() as i32,
            (entry.position.y as f64 * output_scale).round() as i32,
        ));
        let surface_elements: Vec<WaylandSurfaceRenderElement<GlesRenderer>> =
            render_elements_from_surface_tree(
                renderer,
                entry.surface.wl_surface(),
                location,
                Scale::from(output_scale),
                1.0,
                Kind::Unspecified,
            );
        elements.extend(surface_elements.into_iter().map(InfinideskRenderElement::Surface));
    }
}

/// Rasterise all strokes as runs of small squares along each segment.
/// Strokes live in canvas space, so the canvas transform applies.
fn stroke_elements(
    drawing: &DrawingLayer,
    canvas: &Canvas,
    output_scale: f64,
    elements: &mut Vec<InfinideskRenderElement<GlesRenderer>>,
) {
    let strokes = drawing
        .current_stroke()
        .into_iter()
        .chain(drawing.strokes().iter().rev());

    for stroke in strokes {
        let color = [stroke.color.r, stroke.color.g, stroke.color.b, 1.0];
        let side = LINE_WIDTH * canvas.scale * output_scale;

        for pair in stroke.points.windows(2) {
            let (x1, y1) = canvas.to_screen(pair[0].0, pair[0].1);
            let (x2, y2) = canvas.to_screen(pair[1].0, pair[1].1);
            let (x1, y1) = (x1 * output_scale, y1 * output_scale);
            let (x2, y2) = (x2 * output_scale, y2 * output_scale);

            let dx = x2 - x1;
            let dy = y2 - y1;
            let length = (dx * dx + dy * dy).sqrt();
            if length <= 0.1 {
                continue;
            }

            // One square roughly every two pixels along the segment.
            let segments = (length / 2.0) as i32 + 1;
            for i in 0..=segments {
                let t = i as f64 / segments as f64;
                let x = x1 + dx * t;
                let y = y1 + dy * t;
                elements.push(InfinideskRenderElement::Solid(solid(
                    Rectangle::new(
                        Point::from(((x - side / 2.0) as i32, (y - side / 2.0) as i32)),
                        Size::from((side as i32 + 1, side as i32 + 1)),
                    ),
                    color,
                )));
            }
        }
    }
}

/// Per-row spans of a rounded-rectangle border of the given outer size.
/// Straight edges are emitted as four long rectangles; each corner row is
/// the annulus between the outer arc (radius `corner_radius`) and the
/// inner arc (radius `corner_radius - border_width`), sampled at the row
/// centre.
pub fn border_spans(
    width: i32,
    height: i32,
    border_width: i32,
    corner_radius: i32,
) -> Vec<Rectangle<i32, Physical>> {
    let mut spans = Vec::new();
    if width <= 0 || height <= 0 || border_width <= 0 {
        return spans;
    }

    let corner_radius = corner_radius.clamp(0, width.min(height) / 2);

    let rect = |x: i32, y: i32, w: i32, h: i32| Rectangle::new(Point::from((x, y)), Size::from((w, h)));

    if corner_radius == 0 {
        spans.push(rect(0, 0, width, border_width));
        spans.push(rect(0, height - border_width, width, border_width));
        spans.push(rect(0, border_width, border_width, height - 2 * border_width));
        spans.push(rect(
            width - border_width,
            border_width,
            border_width,
            height - 2 * border_width,
        ));
        return spans;
    }

    // Straight edges between the corners.
    if width > 2 * corner_radius {
        spans.push(rect(corner_radius, 0, width - 2 * corner_radius, border_width));
        spans.push(rect(
            corner_radius,
            height - border_width,
            width - 2 * corner_radius,
            border_width,
        ));
    }
    if height > 2 * corner_radius {
        spans.push(rect(0, corner_radius, border_width, height - 2 * corner_radius));
        spans.push(rect(
            width - border_width,
            corner_radius,
            border_width,
            height - 2 * corner_radius,
        ));
    }

    let outer_r = corner_radius as f64;
    let inner_r = (corner_radius - border_width).max(0) as f64;

    for row in 0..corner_radius {
        let dy = corner_radius as f64 - row as f64 - 0.5;

        let outer_extent = if dy <= outer_r {
            (outer_r * outer_r - dy * dy).sqrt()
        } else {
            0.0
        };
        let inner_extent = if dy <= inner_r {
            (inner_r * inner_r - dy * dy).sqrt()
        } else {
            0.0
        };

        let seg_start = ((corner_radius as f64 - outer_extent).floor() as i32).max(0);
        let seg_end = ((corner_radius as f64 - inner_extent).ceil() as i32)
            .min(corner_radius)
            .max(seg_start);
        let seg_width = seg_end - seg_start;
        if seg_width <= 0 {
            continue;
        }

        let mirrored = width - corner_radius + (corner_radius - seg_end);

        spans.push(rect(seg_start, row, seg_width, 1));
        spans.push(rect(mirrored, row, seg_width, 1));
        spans.push(rect(seg_start, height - 1 - row, seg_width, 1));
        spans.push(rect(mirrored, height - 1 - row, seg_width, 1));
    }

    spans
}

/// Per-row spans that cover the content outside each corner arc, drawn in
/// the backdrop colour to fake rounded content corners.
pub fn corner_mask_spans(width: i32, height: i32, corner_radius: i32) -> Vec<Rectangle<i32, Physical>> {
    let mut spans = Vec::new();
    if width <= 0 || height <= 0 || corner_radius <= 0 {
        return spans;
    }

    let corner_radius = corner_radius.min(width.min(height) / 2);
    let r = corner_radius as f64;

    let rect = |x: i32, y: i32, w: i32, h: i32| Rectangle::new(Point::from((x, y)), Size::from((w, h)));

    for row in 0..corner_radius {
        let dy = corner_radius as f64 - row as f64 - 0.5;
        let dx = if dy <= r { (r * r - dy * dy).sqrt() } else { 0.0 };
        let fill_width = (corner_radius as f64 - dx).floor() as i32;
        if fill_width <= 0 {
            continue;
        }

        spans.push(rect(0, row, fill_width, 1));
        spans.push(rect(width - fill_width, row, fill_width, 1));
        spans.push(rect(0, height - 1 - row, fill_width, 1));
        spans.push(rect(width - fill_width, height - 1 - row, fill_width, 1));
    }

    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn border_spans_without_radius_are_four_edges() {
        let spans = border_spans(100, 80, 3, 0);
        assert_eq!(spans.len(), 4);

        // Top edge covers the full width.
        assert_eq!(spans[0], Rectangle::new(Point::from((0, 0)), Size::from((100, 3))));
        // Vertical edges avoid double-painting the horizontal ones.
        assert_eq!(spans[2], Rectangle::new(Point::from((0, 3)), Size::from((3, 74))));
    }

    #[test]
    fn border_spans_stay_inside_bounds() {
        for (w, h, bw, r) in [(200, 150, 3, 13), (40, 40, 6, 20), (10, 10, 1, 5)] {
            for span in border_spans(w, h, bw, r) {
                assert!(span.loc.x >= 0 && span.loc.y >= 0, "{span:?}");
                assert!(span.loc.x + span.size.w <= w, "{span:?}");
                assert!(span.loc.y + span.size.h <= h, "{span:?}");
                assert!(span.size.w > 0 && span.size.h > 0, "{span:?}");
            }
        }
    }

    #[test]
    fn border_corner_rows_follow_the_arc() {
        let r = 13;
        let spans = border_spans(200, 150, 3, r);

        // Row 0 is the outermost corner row: the span should start near
        // the horizontal extent of the arc at dy = r - 0.5.
        let row0: Vec<_> = spans
            .iter()
            .filter(|s| s.loc.y == 0 && s.size.h == 1 && s.loc.x < r)
            .collect();
        assert_eq!(row0.len(), 1);
        let dy = r as f64 - 0.5;
        let expected_start = (r as f64 - ((r * r) as f64 - dy * dy).sqrt()).floor() as i32;
        assert_eq!(row0[0].loc.x, expected_start);
    }

    #[test]
    fn degenerate_border_is_empty() {
        assert!(border_spans(0, 100, 3, 10).is_empty());
        assert!(border_spans(100, 100, 0, 10).is_empty());
    }

    #[test]
    fn corner_masks_cover_corners_only() {
        let spans = corner_mask_spans(300, 200, 10);
        assert!(!spans.is_empty());

        for span in &spans {
            let in_left = span.loc.x < 10;
            let in_right = span.loc.x + span.size.w > 290;
            let in_top = span.loc.y < 10;
            let in_bottom = span.loc.y + span.size.h > 190;
            assert!((in_left || in_right) && (in_top || in_bottom), "{span:?}");
        }

        // The widest mask run is at the very corner row.
        let max_width = spans.iter().map(|s| s.size.w).max().unwrap();
        let dy = 10.0 - 0.5;
        let expected = (10.0 - (100.0f64 - dy * dy).sqrt()).floor() as i32;
        assert_eq!(
            spans.iter().filter(|s| s.loc.y == 0).map(|s| s.size.w).max(),
            Some(expected.max(1))
        );
        assert!(max_width <= 10);
    }

    #[test]
    fn corner_masks_empty_without_radius() {
        assert!(corner_mask_spans(300, 200, 0).is_empty());
    }
}
