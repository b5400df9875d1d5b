mod canvas;
pub mod config;
mod drawing;
mod drawing_ui;
mod handlers;
mod input;
mod layers;
mod render;
mod state;
mod switcher;
mod view;
pub mod winit;

use smithay::{
    output::Output,
    reexports::wayland_server::DisplayHandle,
    utils::{Logical, Size},
};
pub use state::Infinidesk;

// The button is a button code as defined in the
// Linux kernel's linux/input-event-codes.h header file, e.g. BTN_LEFT.
pub const BTN_LEFT: u32 = 0x110;
pub const BTN_RIGHT: u32 = 0x111;

pub struct CalloopData<BackendData: Backend + 'static> {
    state: Infinidesk<BackendData>,
    display_handle: DisplayHandle,
}

pub trait Backend {
    fn seat_name(&self) -> String;
    /// Schedule another frame for the output.
    fn request_redraw(&mut self);
}

/// Actions a keybind can be bound to. `Exec` spawns an external command,
/// everything else is handled by the compositor itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Exec(String),
    CloseWindow,
    Exit,
    ToggleDrawing,
    ClearDrawings,
    Undo,
    Redo,
    Gather,
    Switcher,
}

pub trait OutputExt {
    fn effective_size(&self) -> Size<i32, Logical>;
}

impl OutputExt for Output {
    fn effective_size(&self) -> Size<i32, Logical> {
        self.current_transform()
            .transform_size(
                self.current_mode()
                    .map(|m| m.size)
                    .unwrap_or_else(|| (0, 0).into()),
            )
            .to_f64()
            .to_logical(self.current_scale().fractional_scale())
            .to_i32_round()
    }
}
