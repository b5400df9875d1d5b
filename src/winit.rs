use std::{sync::atomic::Ordering, time::Duration};

use anyhow::Context;
use smithay::{
    backend::{
        renderer::{
            damage::OutputDamageTracker,
            gles::GlesRenderer,
        },
        winit::{self, WinitEvent, WinitGraphicsBackend},
    },
    desktop::utils::send_frames_surface_tree,
    output::{Mode, Output, PhysicalProperties, Scale, Subpixel},
    reexports::{
        calloop::EventLoop,
        wayland_server::Display,
        winit::{dpi::LogicalSize, window::WindowAttributes},
    },
    utils::{Rectangle, Transform},
};
use tracing::{error, info, warn};

use crate::{
    config::{spawn_command, Config},
    layers::OutputEntry,
    render::{self, InfinideskRenderElement, BACKGROUND_COLOR},
    Backend, CalloopData, Infinidesk, OutputExt,
};

pub const OUTPUT_NAME: &str = "winit";

pub struct WinitData {
    pub backend: WinitGraphicsBackend<GlesRenderer>,
    pub damage_tracker: OutputDamageTracker,
}

impl Backend for WinitData {
    fn seat_name(&self) -> String {
        String::from(OUTPUT_NAME)
    }

    fn request_redraw(&mut self) {
        self.backend.window().request_redraw();
    }
}

pub fn run_winit(config: Config, startup_cmd: Option<String>) -> anyhow::Result<()> {
    let mut event_loop: EventLoop<CalloopData<WinitData>> =
        EventLoop::try_new().context("failed to create event loop")?;
    let display: Display<Infinidesk<WinitData>> =
        Display::new().context("failed to create wayland display")?;
    let display_handle = display.handle();

    let (backend, winit) = winit::init_from_attributes::<GlesRenderer>(
        WindowAttributes::default()
            .with_inner_size(LogicalSize::new(1280.0, 800.0))
            .with_title("Infinidesk"),
    )
    .map_err(|err| anyhow::anyhow!("failed to initialize winit backend: {err}"))?;

    let mode = Mode {
        size: backend.window_size(),
        refresh: 60_000,
    };

    let output = Output::new(
        OUTPUT_NAME.to_string(),
        PhysicalProperties {
            size: (0, 0).into(),
            subpixel: Subpixel::Unknown,
            make: "Infinidesk".into(),
            model: "Winit".into(),
        },
    );
    let _global = output.create_global::<Infinidesk<WinitData>>(&display_handle);
    output.change_current_state(
        Some(mode),
        Some(Transform::Flipped180),
        Some(Scale::Fractional(config.scale as f64)),
        Some((0, 0).into()),
    );
    output.set_preferred(mode);

    let damage_tracker = OutputDamageTracker::from_output(&output);

    let data = WinitData {
        backend,
        damage_tracker,
    };
    let state = Infinidesk::new(&mut event_loop, display, data, config);

    let mut data = CalloopData {
        state,
        display_handle,
    };

    data.state.outputs.push(OutputEntry::new(output.clone()));

    // SIGINT/SIGTERM raise a flag that the idle callback below turns
    // into a loop stop, so teardown happens on the event loop.
    let shutdown = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    for signal in [
        signal_hook::consts::signal::SIGINT,
        signal_hook::consts::signal::SIGTERM,
    ] {
        if let Err(err) = signal_hook::flag::register(signal, shutdown.clone()) {
            error!("cannot register signal handler: {err:?}");
        }
    }

    event_loop
        .handle()
        .insert_source(winit, move |event, _, data| {
            let display = &mut data.display_handle;
            let state = &mut data.state;

            match event {
                WinitEvent::Resized { size, .. } => {
                    output.change_current_state(
                        Some(Mode {
                            size,
                            refresh: 60_000,
                        }),
                        None,
                        None,
                        None,
                    );
                    for entry in &mut state.outputs {
                        entry.arrange();
                    }
                    state.backend_data.request_redraw();
                }
                WinitEvent::Input(event) => state.process_input_event(event),
                WinitEvent::Redraw => {
                    redraw(state);
                    let _ = display.flush_clients();

                    // Running animations need the next frame right away;
                    // everything else redraws on commit or input.
                    if state.any_view_animating() || state.canvas.is_snapping() {
                        state.backend_data.request_redraw();
                    }
                }
                WinitEvent::CloseRequested => {
                    state.loop_signal.stop();
                }
                _ => (),
            };
        })
        .map_err(|err| anyhow::anyhow!("failed to insert winit event source: {err}"))?;

    info!(
        "running on WAYLAND_DISPLAY={}",
        data.state.socket_name.to_string_lossy()
    );
    std::env::set_var("WAYLAND_DISPLAY", &data.state.socket_name);

    data.state.config.run_startup_commands();
    if let Some(cmd) = startup_cmd {
        info!("running command-line startup command: {cmd}");
        spawn_command(&cmd);
    }

    event_loop
        .run(None, &mut data, move |data| {
            if shutdown.load(Ordering::SeqCst) || !data.state.running.load(Ordering::SeqCst) {
                data.state.loop_signal.stop();
            }
        })
        .context("event loop error")?;

    Ok(())
}

/// One output frame: advance animations, build the element list, render,
/// submit, then signal frame-done to every mapped surface.
fn redraw(state: &mut Infinidesk<WinitData>) {
    let now = state.now_ms();
    state.canvas.tick(now);
    state.update_view_animations(now);

    let Some(output_entry) = state.outputs.first() else {
        return;
    };
    let output = output_entry.output.clone();
    let logical_size = output.effective_size();

    state.drawing.panel.update_geometry(logical_size.h);

    // Build the element list with split borrows so the renderer can be
    // handed out alongside the rest of the state.
    let mut elements: Vec<InfinideskRenderElement<GlesRenderer>> = Vec::new();
    {
        let Infinidesk {
            backend_data,
            canvas,
            views,
            outputs,
            drawing,
            switcher,
            ..
        } = state;
        let renderer = backend_data.backend.renderer();
        render::output_elements(
            renderer,
            &outputs[0],
            canvas,
            views,
            drawing,
            switcher,
            &mut elements,
        );
    }

    let size = state.backend_data.backend.window_size();
    let damage = Rectangle::from_size(size);

    {
        let WinitData {
            backend,
            damage_tracker,
        } = &mut state.backend_data;

        match backend.bind() {
            Ok((renderer, mut framebuffer)) => {
                if let Err(err) = damage_tracker.render_output(
                    renderer,
                    &mut framebuffer,
                    0,
                    &elements,
                    BACKGROUND_COLOR.into(),
                ) {
                    error!("failed to render frame: {err:?}");
                    return;
                }
            }
            Err(err) => {
                // Skipping the frame; the next redraw request retries.
                error!("failed to bind the backend: {err}");
                return;
            }
        }

        if let Err(err) = backend.submit(Some(&[damage])) {
            warn!("failed to submit buffer: {err}");
        }
    }

    // Frame callbacks: every mapped surface in every view (the whole
    // surface tree, popups included) and every mapped layer surface may
    // now produce its next buffer.
    let frame_time = state.start_time.elapsed();
    send_frame_callbacks(state, &output, frame_time);

    state.popups.cleanup();
}

fn send_frame_callbacks(state: &Infinidesk<WinitData>, output: &Output, time: Duration) {
    let throttle = Some(Duration::ZERO);

    for view in state.views.iter().filter(|view| view.mapped) {
        view.window
            .send_frame(output, time, throttle, |_, _| Some(output.clone()));

        for (popup, _) in smithay::desktop::PopupManager::popups_for_surface(view.wl_surface()) {
            send_frames_surface_tree(popup.wl_surface(), output, time, throttle, |_, _| {
                Some(output.clone())
            });
        }
    }

    for entry in state.outputs.iter().flat_map(|o| o.entries()) {
        if entry.mapped {
            send_frames_surface_tree(entry.surface.wl_surface(), output, time, throttle, |_, _| {
                Some(output.clone())
            });
        }
    }
}
