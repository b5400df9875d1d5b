mod compositor;
mod layer_shell;
mod xdg_shell;

use crate::{Backend, Infinidesk};

//
// Wl Seat
//

use smithay::input::pointer::CursorImageStatus;
use smithay::input::{Seat, SeatHandler, SeatState};
use smithay::reexports::wayland_server::protocol::wl_surface::WlSurface;
use smithay::reexports::wayland_server::Resource;
use smithay::wayland::fractional_scale::{with_fractional_scale, FractionalScaleHandler};
use smithay::wayland::selection::data_device::{
    set_data_device_focus, ClientDndGrabHandler, DataDeviceHandler, DataDeviceState,
    ServerDndGrabHandler,
};
use smithay::wayland::selection::SelectionHandler;
use smithay::{
    delegate_data_device, delegate_fractional_scale, delegate_output, delegate_seat,
    delegate_viewporter,
};

impl<BackendData: Backend + 'static> SeatHandler for Infinidesk<BackendData> {
    type KeyboardFocus = WlSurface;
    type PointerFocus = WlSurface;
    type TouchFocus = WlSurface;

    fn seat_state(&mut self) -> &mut SeatState<Infinidesk<BackendData>> {
        &mut self.seat_state
    }

    fn cursor_image(&mut self, _seat: &Seat<Self>, image: CursorImageStatus) {
        *self.cursor_status.lock().unwrap() = image;
    }

    fn focus_changed(&mut self, seat: &Seat<Self>, focused: Option<&WlSurface>) {
        let dh = &self.display_handle;
        let client = focused.and_then(|s| dh.get_client(s.id()).ok());
        set_data_device_focus(dh, seat, client);
    }
}
delegate_seat!(@<BackendData: Backend + 'static> Infinidesk<BackendData>);

//
// Wl Data Device
//

impl<BackendData: Backend + 'static> SelectionHandler for Infinidesk<BackendData> {
    type SelectionUserData = ();
}

impl<BackendData: Backend + 'static> DataDeviceHandler for Infinidesk<BackendData> {
    fn data_device_state(&self) -> &DataDeviceState {
        &self.data_device_state
    }
}

impl<BackendData: Backend + 'static> ClientDndGrabHandler for Infinidesk<BackendData> {}
impl<BackendData: Backend + 'static> ServerDndGrabHandler for Infinidesk<BackendData> {}

delegate_data_device!(@<BackendData: Backend + 'static> Infinidesk<BackendData>);

//
// Wl Output & Xdg Output
//

impl<BackendData: Backend + 'static> smithay::wayland::output::OutputHandler
    for Infinidesk<BackendData>
{
}
delegate_output!(@<BackendData: Backend + 'static> Infinidesk<BackendData>);

delegate_viewporter!(@<BackendData: Backend + 'static> Infinidesk<BackendData>);

impl<BackendData: Backend + 'static> FractionalScaleHandler for Infinidesk<BackendData> {
    fn new_fractional_scale(&mut self, surface: WlSurface) {
        // Tell clients about the configured HiDPI scale up front.
        let scale = self
            .primary_output()
            .map(|entry| entry.output.current_scale().fractional_scale())
            .unwrap_or(self.config.scale as f64);
        smithay::wayland::compositor::with_states(&surface, |states| {
            with_fractional_scale(states, |fractional_scale| {
                fractional_scale.set_preferred_scale(scale);
            });
        });
    }
}
delegate_fractional_scale!(@<BackendData: Backend + 'static> Infinidesk<BackendData>);
