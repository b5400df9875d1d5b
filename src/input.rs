use std::{sync::atomic::Ordering, time::Duration};

use smithay::{
    backend::input::{
        AbsolutePositionEvent, Axis, AxisSource, ButtonState, Event, InputBackend, InputEvent,
        KeyState, KeyboardKeyEvent, PointerAxisEvent, PointerButtonEvent,
    },
    input::{
        keyboard::{FilterResult, Keysym, ModifiersState},
        pointer::{AxisFrame, ButtonEvent, CursorImageStatus, MotionEvent},
    },
    reexports::calloop::timer::{TimeoutAction, Timer},
    utils::SERIAL_COUNTER,
};
use tracing::{debug, error, info};

use crate::{
    config::{Chord, KeyModifiers},
    state::CursorMode,
    winit::WinitData,
    Action, Backend, Infinidesk, OutputExt, BTN_LEFT, BTN_RIGHT,
};

/// Zoom factor applied per scroll notch.
pub const ZOOM_SCROLL_FACTOR: f64 = 1.03;

/// A scroll-pan gesture ends after this much scroll inactivity.
pub const SCROLL_PAN_TIMEOUT: Duration = Duration::from_millis(100);

/// What a key press resolved to before forwarding is decided.
enum KeyAction {
    Action(Action),
    SwitcherNext,
    SwitcherPrev,
    SwitcherCancel,
    SwitcherConfirm,
}

fn modifier_mask(modifiers: &ModifiersState) -> KeyModifiers {
    let mut mask = KeyModifiers::empty();
    if modifiers.logo {
        mask |= KeyModifiers::SUPER;
    }
    if modifiers.alt {
        mask |= KeyModifiers::ALT;
    }
    if modifiers.ctrl {
        mask |= KeyModifiers::CTRL;
    }
    if modifiers.shift {
        mask |= KeyModifiers::SHIFT;
    }
    mask
}

/// The modifier held for window dragging, canvas panning and zooming.
/// Alt rather than Super so the chords survive nested compositors.
fn drag_modifier_held(modifiers: &ModifiersState) -> bool {
    modifiers.alt
}

impl<BackendData: Backend + 'static> Infinidesk<BackendData> {
    pub fn process_action(&mut self, action: Action) {
        match action {
            Action::Exec(command) => {
                let mut cmd = std::process::Command::new("sh");
                cmd.arg("-c")
                    .arg(&command)
                    .stdin(std::process::Stdio::null())
                    .stdout(std::process::Stdio::null())
                    .env("WAYLAND_DISPLAY", &self.socket_name);
                match cmd.spawn() {
                    Ok(_child) => {}
                    Err(err) => error!("failed to run command '{command}': {err}"),
                }
            }
            Action::CloseWindow => {
                let keyboard = self.seat.get_keyboard().unwrap();
                if let Some(surface) = keyboard.current_focus() {
                    if let Some(view) = self.view_for_surface(&surface) {
                        view.close();
                    }
                }
            }
            Action::Exit => {
                info!("exiting");
                self.running.store(false, Ordering::SeqCst);
                self.loop_signal.stop();
            }
            Action::ToggleDrawing => self.drawing.toggle_mode(),
            Action::ClearDrawings => self.drawing.clear_all(),
            Action::Undo => self.drawing.undo(),
            Action::Redo => self.drawing.redo(),
            Action::Gather => self.gather_views(),
            Action::Switcher => self.switcher.start(&self.views),
        }
    }

    /// Leave whatever interaction mode the pointer was in.
    pub fn reset_cursor_mode(&mut self) {
        self.cursor_mode = CursorMode::Passthrough;
        self.grabbed_view = None;
        debug!("cursor mode reset to passthrough");
    }

    /// Snap the viewport onto a view and focus and raise it; used by the
    /// switcher on confirm.
    pub fn snap_to_view(&mut self, id: u64) {
        let Some(output) = self.primary_output() else {
            return;
        };
        let size = output.output.effective_size();

        let Some(view) = self.view(id) else {
            return;
        };
        let centre = view.centre();
        let now = self.now_ms();
        self.canvas
            .snap_to_centre(centre.0, centre.1, size.w, size.h, now);

        self.focus_view(id);
        self.raise_view(id);
    }
}

impl Infinidesk<WinitData> {
    pub fn process_input_event<I: InputBackend>(&mut self, event: InputEvent<I>) {
        match event {
            InputEvent::Keyboard { event, .. } => self.on_keyboard_key::<I>(event),
            InputEvent::PointerMotionAbsolute { event, .. } => {
                let output_size = self
                    .primary_output()
                    .map(|entry| entry.output.effective_size())
                    .unwrap_or_else(|| (0, 0).into());
                let pos = event.position_transformed(output_size);
                self.on_pointer_motion(pos.x, pos.y, event.time_msec());
            }
            InputEvent::PointerButton { event, .. } => self.on_pointer_button::<I>(event),
            InputEvent::PointerAxis { event, .. } => self.on_pointer_axis::<I>(event),
            _ => {}
        }

        // Any of the above may have moved the world.
        self.backend_data.request_redraw();
    }

    fn on_keyboard_key<I: InputBackend>(&mut self, event: I::KeyboardKeyEvent) {
        let serial = SERIAL_COUNTER.next_serial();
        let time = Event::time_msec(&event);
        let key_state = event.state();

        let keyboard = self.seat.get_keyboard().unwrap();
        let action = keyboard.input::<KeyAction, _>(
            self,
            event.key_code(),
            key_state,
            serial,
            time,
            |data, modifiers, handle| {
                let keysym = handle.modified_sym();
                debug!(?keysym, ?key_state, "key event");

                // While the switcher is up it owns Tab / Escape, and
                // releasing the chord modifier confirms.
                if data.switcher.active {
                    if key_state == KeyState::Pressed {
                        match keysym {
                            Keysym::Tab if modifiers.shift => {
                                return FilterResult::Intercept(KeyAction::SwitcherPrev)
                            }
                            Keysym::Tab => {
                                return FilterResult::Intercept(KeyAction::SwitcherNext)
                            }
                            Keysym::ISO_Left_Tab => {
                                return FilterResult::Intercept(KeyAction::SwitcherPrev)
                            }
                            Keysym::Escape => {
                                return FilterResult::Intercept(KeyAction::SwitcherCancel)
                            }
                            _ => {}
                        }
                    } else if matches!(
                        keysym,
                        Keysym::Alt_L
                            | Keysym::Alt_R
                            | Keysym::Super_L
                            | Keysym::Super_R
                            | Keysym::Control_L
                            | Keysym::Control_R
                    ) {
                        return FilterResult::Intercept(KeyAction::SwitcherConfirm);
                    }
                }

                if key_state == KeyState::Pressed {
                    let chord = Chord {
                        modifiers: modifier_mask(modifiers),
                        keysym: keysym.raw(),
                    };
                    if let Some(action) = data.config.keybinds.get(&chord) {
                        return FilterResult::Intercept(KeyAction::Action(action.clone()));
                    }
                }

                FilterResult::Forward
            },
        );

        match action {
            Some(KeyAction::Action(action)) => self.process_action(action),
            Some(KeyAction::SwitcherNext) => self.switcher.next(&self.views),
            Some(KeyAction::SwitcherPrev) => self.switcher.prev(&self.views),
            Some(KeyAction::SwitcherCancel) => self.switcher.cancel(),
            Some(KeyAction::SwitcherConfirm) => {
                if let Some(id) = self.switcher.confirm() {
                    self.snap_to_view(id);
                }
            }
            None => {}
        }
    }

    fn on_pointer_motion(&mut self, x: f64, y: f64, time: u32) {
        match self.cursor_mode {
            CursorMode::Move => {
                let (cx, cy) = self.canvas.to_canvas(x, y);
                if let Some(id) = self.grabbed_view {
                    if let Some(view) = self.view_mut(id) {
                        view.move_update(cx, cy);
                    }
                }
            }
            CursorMode::Pan => {
                self.canvas.pan_update(x, y);
            }
            CursorMode::Draw => {
                let (cx, cy) = self.canvas.to_canvas(x, y);
                self.drawing.stroke_add_point(cx, cy);
            }
            CursorMode::Resize => {}
            CursorMode::Passthrough => {
                if self.drawing.drawing_mode {
                    self.drawing.panel.update_hover(x, y);
                }

                let pointer = self.pointer.clone();
                let serial = SERIAL_COUNTER.next_serial();
                let under = self.view_at(x, y);

                if let Some((id, surface, surface_local)) = under {
                    // The focus location is chosen so the seat derives the
                    // zoom-corrected surface-local coordinates.
                    let focus_loc = smithay::utils::Point::from((x, y)) - surface_local;
                    pointer.motion(
                        self,
                        Some((surface, focus_loc)),
                        &MotionEvent {
                            location: (x, y).into(),
                            serial,
                            time,
                        },
                    );

                    // Focus follows the mouse without raising; suppressed
                    // while a scroll-pan gesture owns the pointer.
                    if !self.scroll_panning {
                        self.focus_view(id);
                    }
                } else {
                    pointer.motion(
                        self,
                        None,
                        &MotionEvent {
                            location: (x, y).into(),
                            serial,
                            time,
                        },
                    );
                    *self.cursor_status.lock().unwrap() = CursorImageStatus::default_named();
                }
                pointer.frame(self);
            }
        }
    }

    fn on_pointer_button<I: InputBackend>(&mut self, event: I::PointerButtonEvent) {
        let pointer = self.pointer.clone();
        let serial = SERIAL_COUNTER.next_serial();
        let button = event.button_code();
        let button_state = event.state();
        let location = pointer.current_location();

        pointer.button(
            self,
            &ButtonEvent {
                button,
                state: button_state,
                serial,
                time: event.time_msec(),
            },
        );
        pointer.frame(self);

        match button_state {
            ButtonState::Pressed => {
                let under = self.view_at(location.x, location.y);

                if self.drawing.drawing_mode {
                    if let Some(ui_button) = self.drawing.panel.button_at(location.x, location.y) {
                        if button == BTN_LEFT {
                            self.drawing.apply_ui_click(ui_button);
                            return;
                        }
                    }

                    if button == BTN_LEFT {
                        debug!("beginning drawing stroke");
                        self.cursor_mode = CursorMode::Draw;
                        let (cx, cy) = self.canvas.to_canvas(location.x, location.y);
                        self.drawing.stroke_begin(cx, cy);
                        return;
                    }
                }

                let keyboard = self.seat.get_keyboard().unwrap();
                let modifiers = keyboard.modifier_state();
                if drag_modifier_held(&modifiers) {
                    if button == BTN_LEFT {
                        if let Some((id, _, _)) = under {
                            debug!("beginning view move");
                            self.cursor_mode = CursorMode::Move;
                            self.grabbed_view = Some(id);
                            let (cx, cy) = self.canvas.to_canvas(location.x, location.y);
                            if let Some(view) = self.view_mut(id) {
                                view.move_begin(cx, cy);
                            }
                            self.focus_view(id);
                            self.raise_view(id);
                            return;
                        }
                    } else if button == BTN_RIGHT {
                        debug!("beginning canvas pan");
                        self.cursor_mode = CursorMode::Pan;
                        self.canvas.pan_begin(location.x, location.y);
                        return;
                    }
                }

                // Plain click: focus and raise.
                if let Some((id, _, _)) = under {
                    self.focus_view(id);
                    self.raise_view(id);
                }
            }
            ButtonState::Released => match self.cursor_mode {
                CursorMode::Move => {
                    if let Some(id) = self.grabbed_view {
                        if let Some(view) = self.view_mut(id) {
                            view.move_end();
                        }
                    }
                    self.reset_cursor_mode();
                }
                CursorMode::Pan => {
                    self.canvas.pan_end();
                    self.reset_cursor_mode();
                }
                CursorMode::Draw => {
                    self.drawing.stroke_end();
                    self.reset_cursor_mode();
                }
                _ => {}
            },
        }
    }

    fn on_pointer_axis<I: InputBackend>(&mut self, event: I::PointerAxisEvent) {
        let pointer = self.pointer.clone();
        let location = pointer.current_location();

        let horizontal_amount = event
            .amount(Axis::Horizontal)
            .unwrap_or_else(|| event.amount_v120(Axis::Horizontal).unwrap_or(0.0) * 3.0 / 120.0);
        let vertical_amount = event
            .amount(Axis::Vertical)
            .unwrap_or_else(|| event.amount_v120(Axis::Vertical).unwrap_or(0.0) * 3.0 / 120.0);

        let keyboard = self.seat.get_keyboard().unwrap();
        let modifiers = keyboard.modifier_state();

        // Drag modifier + vertical scroll zooms about the cursor.
        if drag_modifier_held(&modifiers) {
            if vertical_amount != 0.0 {
                let factor = if vertical_amount < 0.0 {
                    ZOOM_SCROLL_FACTOR
                } else {
                    1.0 / ZOOM_SCROLL_FACTOR
                };
                self.canvas.zoom(factor, location.x, location.y);
            }
            return;
        }

        // An active scroll-pan gesture owns every scroll event until the
        // inactivity timer fires, no matter what is under the cursor.
        if self.scroll_panning {
            self.canvas.pan_delta(horizontal_amount, vertical_amount);
            self.restart_scroll_pan_timer();
            return;
        }

        if self.view_at(location.x, location.y).is_some() {
            // Scroll over a window goes to the client.
            let mut frame = AxisFrame::new(event.time_msec()).source(event.source());
            if horizontal_amount != 0.0 {
                frame = frame.value(Axis::Horizontal, horizontal_amount);
                if let Some(discrete) = event.amount_v120(Axis::Horizontal) {
                    frame = frame.v120(Axis::Horizontal, discrete as i32);
                }
            }
            if vertical_amount != 0.0 {
                frame = frame.value(Axis::Vertical, vertical_amount);
                if let Some(discrete) = event.amount_v120(Axis::Vertical) {
                    frame = frame.v120(Axis::Vertical, discrete as i32);
                }
            }
            if event.source() == AxisSource::Finger {
                if event.amount(Axis::Horizontal) == Some(0.0) {
                    frame = frame.stop(Axis::Horizontal);
                }
                if event.amount(Axis::Vertical) == Some(0.0) {
                    frame = frame.stop(Axis::Vertical);
                }
            }
            pointer.axis(self, frame);
            pointer.frame(self);
        } else {
            // Scroll over empty canvas starts a pan gesture.
            self.scroll_panning = true;
            self.restart_scroll_pan_timer();
            self.canvas.pan_delta(horizontal_amount, vertical_amount);
        }
    }

    /// (Re)arm the scroll-pan inactivity timer, replacing the deadline.
    fn restart_scroll_pan_timer(&mut self) {
        if let Some(token) = self.scroll_pan_timer.take() {
            self.loop_handle.remove(token);
        }

        let timer = Timer::from_duration(SCROLL_PAN_TIMEOUT);
        match self.loop_handle.insert_source(timer, |_deadline, _, data| {
            data.state.scroll_panning = false;
            data.state.scroll_pan_timer = None;
            TimeoutAction::Drop
        }) {
            Ok(token) => self.scroll_pan_timer = Some(token),
            Err(err) => error!("failed to arm scroll-pan timer: {err}"),
        }
    }
}
