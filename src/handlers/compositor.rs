use smithay::{
    backend::renderer::utils::{on_commit_buffer_handler, with_renderer_surface_state},
    delegate_compositor, delegate_shm,
    desktop::PopupKind,
    reexports::wayland_server::{
        protocol::{wl_buffer, wl_surface::WlSurface},
        Client,
    },
    utils::SERIAL_COUNTER,
    wayland::{
        buffer::BufferHandler,
        compositor::{
            get_parent, is_sync_subsurface, with_states, CompositorClientState, CompositorHandler,
            CompositorState,
        },
        shell::xdg::{XdgPopupSurfaceData, XdgToplevelSurfaceData},
        shm::{ShmHandler, ShmState},
    },
};
use tracing::debug;

use crate::{state::ClientState, Backend, Infinidesk};

impl<BackendData: Backend + 'static> CompositorHandler for Infinidesk<BackendData> {
    fn compositor_state(&mut self) -> &mut CompositorState {
        &mut self.compositor_state
    }

    fn client_compositor_state<'a>(&self, client: &'a Client) -> &'a CompositorClientState {
        if let Some(state) = client.get_data::<ClientState>() {
            return &state.compositor_state;
        }
        panic!("Unknown client data type")
    }

    fn commit(&mut self, surface: &WlSurface) {
        on_commit_buffer_handler::<Self>(surface);
        self.popups.commit(surface);

        if !is_sync_subsurface(surface) {
            let mut root = surface.clone();
            while let Some(parent) = get_parent(&root) {
                root = parent;
            }

            if let Some(view) = self.view_for_surface(&root) {
                view.window.on_commit();
            }
            self.handle_toplevel_commit(&root);
        }

        self.ensure_initial_configure(surface);
        self.handle_layer_commit(surface);

        // New content needs a frame.
        self.backend_data.request_redraw();
    }
}
delegate_compositor!(@<BackendData: Backend + 'static> Infinidesk<BackendData>);

impl<BackendData: Backend + 'static> BufferHandler for Infinidesk<BackendData> {
    fn buffer_destroyed(&mut self, _buffer: &wl_buffer::WlBuffer) {}
}

impl<BackendData: Backend + 'static> ShmHandler for Infinidesk<BackendData> {
    fn shm_state(&self) -> &ShmState {
        &self.shm_state
    }
}
delegate_shm!(@<BackendData: Backend + 'static> Infinidesk<BackendData>);

impl<BackendData: Backend + 'static> Infinidesk<BackendData> {
    /// Map/unmap tracking and CSD geometry-offset changes for a toplevel.
    fn handle_toplevel_commit(&mut self, surface: &WlSurface) {
        let has_buffer =
            with_renderer_surface_state(surface, |state| state.buffer().is_some())
                .unwrap_or(false);

        let Some(index) = self
            .views
            .iter()
            .position(|view| view.wl_surface() == surface)
        else {
            return;
        };

        if !self.views[index].mapped && has_buffer {
            self.map_view(self.views[index].id);
        } else if self.views[index].mapped && !has_buffer {
            self.unmap_view(self.views[index].id);
        }
        // A changed geometry offset (CSD clients report their shadow inset
        // after the initial commit) needs no bookkeeping: rendering and
        // hit-testing read the geometry fresh every frame.
    }

    /// First buffer commit: the view becomes visible, centred in the
    /// usable area, and animates in.
    fn map_view(&mut self, id: u64) {
        let placement = self.primary_output().map(|entry| entry.usable_area);
        let now = self.now_ms();

        let Some(view) = self.view_mut(id) else {
            return;
        };
        view.mapped = true;
        let size = view.geometry().size;

        if let Some(usable) = placement {
            let (x, y) = crate::view::map_position(&self.canvas, usable, size);
            let view = self.view_mut(id).unwrap();
            view.set_position(x, y);
            debug!(
                "positioned view {id} at ({:.1}, {:.1}) in usable area {usable:?}",
                view.x, view.y
            );
        }

        self.view_mut(id).unwrap().start_map_animation(now);

        self.focus_view(id);
        self.raise_view(id);
    }

    fn unmap_view(&mut self, id: u64) {
        if let Some(view) = self.view_mut(id) {
            view.mapped = false;
            view.move_end();
            // No exit animation in this release: the view disappears
            // immediately on unmap.
            view.map_anim.progress = 0.0;
            view.map_anim.animating_out = false;
        }

        if self.grabbed_view == Some(id) {
            self.reset_cursor_mode();
        }
        debug!("view {id} unmapped");
    }

    fn ensure_initial_configure(&mut self, surface: &WlSurface) {
        if let Some(view) = self.view_for_surface(surface) {
            let initial_configure_sent = with_states(surface, |states| {
                states
                    .data_map
                    .get::<XdgToplevelSurfaceData>()
                    .unwrap()
                    .lock()
                    .unwrap()
                    .initial_configure_sent
            });
            if !initial_configure_sent {
                // A zero-sized configure lets the client pick its own size.
                view.toplevel().send_configure();
            }
            return;
        }

        if let Some(popup) = self.popups.find_popup(surface) {
            let PopupKind::Xdg(ref popup) = popup else {
                return;
            };

            let initial_configure_sent = with_states(surface, |states| {
                states
                    .data_map
                    .get::<XdgPopupSurfaceData>()
                    .unwrap()
                    .lock()
                    .unwrap()
                    .initial_configure_sent
            });
            if !initial_configure_sent {
                // NOTE: an initial configure is always allowed.
                popup.send_configure().expect("initial configure failed");
            }
        }
    }

    /// Arrange and mapped-state tracking for layer surfaces.
    fn handle_layer_commit(&mut self, surface: &WlSurface) {
        let has_buffer =
            with_renderer_surface_state(surface, |state| state.buffer().is_some())
                .unwrap_or(false);

        let mut focus_surface = None;
        let mut arrange = false;

        for output_entry in &mut self.outputs {
            let Some(entry) = output_entry.entry_for_surface_mut(surface) else {
                continue;
            };

            let was_mapped = entry.mapped;
            entry.mapped = has_buffer;
            if !was_mapped && entry.mapped && entry.wants_keyboard_focus() {
                focus_surface = Some(entry.surface.wl_surface().clone());
            }

            // Arranging sends the initial configure and tracks every
            // anchor/size/exclusive-zone change thereafter; usable_area
            // follows along for window placement.
            output_entry.arrange();
            arrange = true;
        }

        if !arrange {
            return;
        }

        if let Some(surface) = focus_surface {
            if let Some(keyboard) = self.seat.get_keyboard() {
                keyboard.set_focus(self, Some(surface), SERIAL_COUNTER.next_serial());
            }
        }
    }
}
