use std::{ffi::OsString, sync::atomic::AtomicBool, sync::Arc, sync::Mutex, time::Instant};

use smithay::{
    desktop::PopupManager,
    input::{
        pointer::{CursorImageStatus, PointerHandle},
        Seat, SeatState,
    },
    reexports::{
        calloop::{generic::Generic, EventLoop, Interest, LoopHandle, LoopSignal, Mode, PostAction, RegistrationToken},
        wayland_server::{
            backend::{ClientData, ClientId, DisconnectReason},
            protocol::wl_surface::WlSurface,
            Display, DisplayHandle,
        },
    },
    utils::{Logical, Point},
    wayland::{
        compositor::{CompositorClientState, CompositorState},
        fractional_scale::FractionalScaleManagerState,
        output::OutputManagerState,
        selection::data_device::DataDeviceState,
        shell::{
            wlr_layer::WlrLayerShellState,
            xdg::{decoration::XdgDecorationState, XdgShellState},
        },
        shm::ShmState,
        socket::ListeningSocketSource,
        viewporter::ViewporterState,
    },
};

use crate::{
    canvas::Canvas, config::Config, drawing::DrawingLayer, layers::OutputEntry,
    switcher::Switcher, view::View, Backend, CalloopData,
};

/// What pointer input is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorMode {
    /// Events go to clients.
    #[default]
    Passthrough,
    /// Dragging a window across the canvas.
    Move,
    /// Dragging the canvas viewport.
    Pan,
    /// Drawing an annotation stroke.
    Draw,
    /// Reserved for interactive resize.
    Resize,
}

pub struct Infinidesk<BackendData: Backend + 'static> {
    pub start_time: Instant,
    pub socket_name: OsString,
    pub display_handle: DisplayHandle,
    pub loop_handle: LoopHandle<'static, CalloopData<BackendData>>,
    pub loop_signal: LoopSignal,
    pub running: Arc<AtomicBool>,

    pub backend_data: BackendData,

    // Smithay state
    pub compositor_state: CompositorState,
    pub xdg_shell_state: XdgShellState,
    pub xdg_decoration_state: XdgDecorationState,
    pub wlr_layer_shell_state: WlrLayerShellState,
    pub shm_state: ShmState,
    pub output_manager_state: OutputManagerState,
    pub seat_state: SeatState<Infinidesk<BackendData>>,
    pub data_device_state: DataDeviceState,
    pub viewporter_state: ViewporterState,
    pub fractional_scale_state: FractionalScaleManagerState,
    pub popups: PopupManager,

    pub seat_name: String,
    pub seat: Seat<Self>,
    pub pointer: PointerHandle<Infinidesk<BackendData>>,
    pub cursor_status: Arc<Mutex<CursorImageStatus>>,

    // The canvas world
    pub canvas: Canvas,
    pub views: Vec<View>,
    pub next_view_id: u64,
    pub outputs: Vec<OutputEntry>,
    pub drawing: DrawingLayer,
    pub switcher: Switcher,
    pub config: Config,

    // Pointer interaction state
    pub cursor_mode: CursorMode,
    pub grabbed_view: Option<u64>,
    pub scroll_panning: bool,
    pub scroll_pan_timer: Option<RegistrationToken>,
}

impl<BackendData: Backend + 'static> Infinidesk<BackendData> {
    pub fn new(
        event_loop: &mut EventLoop<'static, CalloopData<BackendData>>,
        display: Display<Self>,
        backend_data: BackendData,
        config: Config,
    ) -> Self {
        let start_time = Instant::now();
        let dh = display.handle();

        let compositor_state = CompositorState::new::<Self>(&dh);
        let xdg_shell_state = XdgShellState::new::<Self>(&dh);
        let xdg_decoration_state = XdgDecorationState::new::<Self>(&dh);
        let wlr_layer_shell_state = WlrLayerShellState::new::<Self>(&dh);
        let shm_state = ShmState::new::<Self>(&dh, vec![]);
        let output_manager_state = OutputManagerState::new_with_xdg_output::<Self>(&dh);
        let mut seat_state = SeatState::new();
        let data_device_state = DataDeviceState::new::<Self>(&dh);
        let viewporter_state = ViewporterState::new::<Self>(&dh);
        let fractional_scale_state = FractionalScaleManagerState::new::<Self>(&dh);
        let popups = PopupManager::default();

        let seat_name = backend_data.seat_name();
        let mut seat = seat_state.new_wl_seat(&dh, seat_name.clone());

        seat.add_keyboard(Default::default(), 600, 25).unwrap();
        let pointer = seat.add_pointer();

        let socket_name = Self::init_wayland_listener(display, event_loop);
        let loop_signal = event_loop.get_signal();

        let cursor_status = Arc::new(Mutex::new(CursorImageStatus::default_named()));

        Self {
            start_time,
            socket_name,
            display_handle: dh,
            loop_handle: event_loop.handle(),
            loop_signal,
            running: Arc::new(AtomicBool::new(true)),

            backend_data,

            compositor_state,
            xdg_shell_state,
            xdg_decoration_state,
            wlr_layer_shell_state,
            shm_state,
            output_manager_state,
            seat_state,
            data_device_state,
            viewporter_state,
            fractional_scale_state,
            popups,

            seat_name,
            seat,
            pointer,
            cursor_status,

            canvas: Canvas::default(),
            views: Vec::new(),
            next_view_id: 1,
            outputs: Vec::new(),
            drawing: DrawingLayer::default(),
            switcher: Switcher::default(),
            config,

            cursor_mode: CursorMode::default(),
            grabbed_view: None,
            scroll_panning: false,
            scroll_pan_timer: None,
        }
    }

    fn init_wayland_listener(
        display: Display<Infinidesk<BackendData>>,
        event_loop: &mut EventLoop<'static, CalloopData<BackendData>>,
    ) -> OsString {
        let listening_socket = ListeningSocketSource::new_auto().unwrap();
        let socket_name = listening_socket.socket_name().to_os_string();

        let handle = event_loop.handle();

        event_loop
            .handle()
            .insert_source(listening_socket, move |client_stream, _, state| {
                if let Err(err) = state
                    .display_handle
                    .insert_client(client_stream, Arc::new(ClientState::default()))
                {
                    tracing::warn!("failed to insert client: {err}");
                }
            })
            .expect("failed to init the wayland event source");

        handle
            .insert_source(
                Generic::new(display, Interest::READ, Mode::Level),
                |_, display, state| {
                    // Safety: we don't drop the display
                    unsafe {
                        display.get_mut().dispatch_clients(&mut state.state).unwrap();
                    }
                    Ok(PostAction::Continue)
                },
            )
            .unwrap();

        socket_name
    }

    /// Milliseconds since startup on the monotonic clock; drives every
    /// animation.
    pub fn now_ms(&self) -> u32 {
        self.start_time.elapsed().as_millis() as u32
    }

    pub fn primary_output(&self) -> Option<&OutputEntry> {
        self.outputs.first()
    }

    /// Custom hit-testing that matches the zoomed rendering. The scene
    /// graph knows nothing of the canvas scale, so the test runs in screen
    /// space against the scaled bounds and inverts the transform to get
    /// surface-local coordinates.
    pub fn view_at(
        &self,
        lx: f64,
        ly: f64,
    ) -> Option<(u64, WlSurface, Point<f64, Logical>)> {
        let canvas = &self.canvas;

        // Views are ordered front to back.
        for view in self.views.iter().filter(|view| view.mapped) {
            let geo = view.geometry();
            let Some(content_local) = hit_test(canvas, view.x, view.y, geo, lx, ly) else {
                continue;
            };

            if let Some((surface, surface_loc)) = view
                .window
                .surface_under(content_local, smithay::desktop::WindowSurfaceType::ALL)
            {
                let surface_local = content_local - surface_loc.to_f64();
                return Some((view.id, surface, surface_local));
            }

            // Transparent CSD regions still hit the main surface.
            return Some((view.id, view.wl_surface().clone(), content_local));
        }

        None
    }
}

/// Test a screen point against one view's rendered bounds, returning the
/// window-local point when it hits. The bounds must match what the
/// composition pipeline draws: the surface origin shifted by the geometry
/// offset, with the content rectangle scaled by the canvas zoom. The
/// surface tree walker then resolves subsurfaces and popups from the
/// window-local point.
pub(crate) fn hit_test(
    canvas: &Canvas,
    view_x: f64,
    view_y: f64,
    geo: smithay::utils::Rectangle<i32, Logical>,
    lx: f64,
    ly: f64,
) -> Option<Point<f64, Logical>> {
    let (screen_x, screen_y) = canvas.to_screen(view_x, view_y);

    let render_x = screen_x - geo.loc.x as f64 * canvas.scale;
    let render_y = screen_y - geo.loc.y as f64 * canvas.scale;
    let render_w = geo.size.w as f64 * canvas.scale;
    let render_h = geo.size.h as f64 * canvas.scale;

    if lx < render_x || lx >= render_x + render_w || ly < render_y || ly >= render_y + render_h {
        return None;
    }

    Some(Point::from((
        (lx - render_x) / canvas.scale,
        (ly - render_y) / canvas.scale,
    )))
}

#[derive(Default)]
pub struct ClientState {
    pub compositor_state: CompositorClientState,
}

impl ClientData for ClientState {
    fn initialized(&self, _client_id: ClientId) {}
    fn disconnected(&self, _client_id: ClientId, _reason: DisconnectReason) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use smithay::utils::{Rectangle, Size};

    const EPSILON: f64 = 1e-9;

    fn geo(x: i32, y: i32, w: i32, h: i32) -> Rectangle<i32, Logical> {
        Rectangle::new(Point::from((x, y)), Size::from((w, h)))
    }

    #[test]
    fn hit_inside_unzoomed_bounds() {
        let canvas = Canvas::default();
        let geo = geo(0, 0, 300, 200);

        let local = hit_test(&canvas, 100.0, 100.0, geo, 150.0, 120.0).unwrap();
        assert!((local.x - 50.0).abs() < EPSILON);
        assert!((local.y - 20.0).abs() < EPSILON);

        // Bounds are half-open.
        assert!(hit_test(&canvas, 100.0, 100.0, geo, 400.0, 120.0).is_none());
        assert!(hit_test(&canvas, 100.0, 100.0, geo, 399.999, 299.999).is_some());
        assert!(hit_test(&canvas, 100.0, 100.0, geo, 99.0, 120.0).is_none());
    }

    #[test]
    fn hit_test_inverts_the_zoom() {
        let mut canvas = Canvas::default();
        canvas.viewport_x = 50.0;
        canvas.viewport_y = 25.0;
        canvas.scale = 2.0;
        let geo = geo(0, 0, 300, 200);

        // View top-left at screen ((200-50)*2, (100-25)*2) = (300, 150).
        let local = hit_test(&canvas, 200.0, 100.0, geo, 340.0, 170.0).unwrap();
        assert!((local.x - 20.0).abs() < EPSILON);
        assert!((local.y - 10.0).abs() < EPSILON);

        // Just past the scaled extent misses.
        assert!(hit_test(&canvas, 200.0, 100.0, geo, 300.0 + 600.0, 170.0).is_none());
    }

    #[test]
    fn csd_geometry_offset_shifts_bounds() {
        let canvas = Canvas::default();
        // A client-side shadow of 12 px: the rendered bounds shift left
        // and up by the offset.
        let geo = geo(12, 12, 300, 200);

        assert!(hit_test(&canvas, 100.0, 100.0, geo, 90.0, 90.0).is_some());
        let local = hit_test(&canvas, 100.0, 100.0, geo, 88.0, 88.0).unwrap();
        assert!((local.x - 0.0).abs() < EPSILON);
        assert!((local.y - 0.0).abs() < EPSILON);
    }
}
