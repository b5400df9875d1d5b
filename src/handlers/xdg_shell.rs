use smithay::{
    delegate_xdg_decoration, delegate_xdg_shell,
    desktop::{PopupKind, Window},
    reexports::{
        wayland_protocols::xdg::{
            decoration::zv1::server::zxdg_toplevel_decoration_v1::Mode as DecorationMode,
            shell::server::xdg_toplevel,
        },
        wayland_server::protocol::wl_seat,
    },
    utils::Serial,
    wayland::shell::xdg::{
        decoration::XdgDecorationHandler, PopupSurface, PositionerState, ToplevelSurface,
        XdgShellHandler, XdgShellState,
    },
};
use tracing::debug;

use crate::{view::View, Backend, Infinidesk};

impl<BackendData: Backend + 'static> XdgShellHandler for Infinidesk<BackendData> {
    fn xdg_shell_state(&mut self) -> &mut XdgShellState {
        &mut self.xdg_shell_state
    }

    fn new_toplevel(&mut self, surface: ToplevelSurface) {
        let id = self.next_view_id;
        self.next_view_id += 1;

        let window = Window::new_wayland_window(surface);
        // The head of the list is the top of the z-stack.
        self.views.insert(0, View::new(id, window));
        debug!("created view {id} for new toplevel");
    }

    fn toplevel_destroyed(&mut self, surface: ToplevelSurface) {
        let Some(index) = self
            .views
            .iter()
            .position(|view| view.toplevel() == &surface)
        else {
            return;
        };
        let view = self.views.remove(index);

        if self.grabbed_view == Some(view.id) {
            self.reset_cursor_mode();
        }
        if self.switcher.selected == Some(view.id) {
            self.switcher.cancel();
        }
        debug!("destroyed view {}", view.id);
    }

    fn new_popup(&mut self, surface: PopupSurface, _positioner: PositionerState) {
        if let Err(err) = self.popups.track_popup(PopupKind::from(surface)) {
            debug!("failed to track popup: {err}");
        }
    }

    fn reposition_request(
        &mut self,
        surface: PopupSurface,
        positioner: PositionerState,
        token: u32,
    ) {
        surface.with_pending_state(|state| {
            state.geometry = positioner.get_geometry();
            state.positioner = positioner;
        });
        surface.send_repositioned(token);
    }

    fn grab(&mut self, _surface: PopupSurface, _seat: wl_seat::WlSeat, _serial: Serial) {
        // Popup grabs are not taken; dismissal is left to the client.
        debug!("ignoring popup grab request");
    }

    fn move_request(&mut self, surface: ToplevelSurface, _seat: wl_seat::WlSeat, _serial: Serial) {
        // Interactive move happens via the drag modifier instead.
        if let Some(view) = self.view_for_surface(surface.wl_surface()) {
            debug!("view {} requested move (use the drag modifier)", view.id);
        }
    }

    fn resize_request(
        &mut self,
        surface: ToplevelSurface,
        _seat: wl_seat::WlSeat,
        _serial: Serial,
        _edges: xdg_toplevel::ResizeEdge,
    ) {
        if let Some(view) = self.view_for_surface(surface.wl_surface()) {
            debug!("view {} requested resize (not implemented)", view.id);
        }
    }

    fn maximize_request(&mut self, surface: ToplevelSurface) {
        // Maximise has no meaning on an unbounded canvas; just ack.
        surface.send_configure();
    }

    fn fullscreen_request(
        &mut self,
        surface: ToplevelSurface,
        _output: Option<smithay::reexports::wayland_server::protocol::wl_output::WlOutput>,
    ) {
        surface.send_configure();
    }
}
delegate_xdg_shell!(@<BackendData: Backend + 'static> Infinidesk<BackendData>);

impl<BackendData: Backend + 'static> XdgDecorationHandler for Infinidesk<BackendData> {
    fn new_decoration(&mut self, toplevel: ToplevelSurface) {
        // Server-side mode: no decorations are actually drawn, which
        // tells the client to omit its own.
        toplevel.with_pending_state(|state| {
            state.decoration_mode = Some(DecorationMode::ServerSide);
        });
        toplevel.send_pending_configure();
    }

    fn request_mode(&mut self, toplevel: ToplevelSurface, _mode: DecorationMode) {
        toplevel.with_pending_state(|state| {
            state.decoration_mode = Some(DecorationMode::ServerSide);
        });
        toplevel.send_pending_configure();
    }

    fn unset_mode(&mut self, toplevel: ToplevelSurface) {
        toplevel.with_pending_state(|state| {
            state.decoration_mode = Some(DecorationMode::ServerSide);
        });
        toplevel.send_pending_configure();
    }
}
delegate_xdg_decoration!(@<BackendData: Backend + 'static> Infinidesk<BackendData>);
