//! wlr_layer_shell

use smithay::{
    delegate_layer_shell,
    output::Output,
    reexports::wayland_server::protocol::wl_output::WlOutput,
    wayland::shell::wlr_layer::{
        Layer as WlrLayer, LayerSurface, WlrLayerShellHandler, WlrLayerShellState,
    },
};
use tracing::{debug, error};

use crate::{
    layers::{layer_index, LayerEntry},
    Backend, Infinidesk,
};

impl<BackendData: Backend + 'static> WlrLayerShellHandler for Infinidesk<BackendData> {
    fn shell_state(&mut self) -> &mut WlrLayerShellState {
        &mut self.wlr_layer_shell_state
    }

    fn new_layer_surface(
        &mut self,
        surface: LayerSurface,
        wl_output: Option<WlOutput>,
        layer: WlrLayer,
        namespace: String,
    ) {
        debug!("new layer surface: namespace={namespace}, layer={layer:?}");

        // Without an explicit output the surface goes to the primary one.
        let output = wl_output.as_ref().and_then(Output::from_resource);
        let entry = match output {
            Some(output) => self
                .outputs
                .iter_mut()
                .find(|entry| entry.output == output),
            None => self.outputs.first_mut(),
        };

        let Some(entry) = entry else {
            error!("no output available for layer surface");
            return;
        };

        entry.layers[layer_index(layer)].push(LayerEntry::new(surface));

        // Send the initial configure with computed dimensions.
        entry.arrange();
    }

    fn layer_destroyed(&mut self, surface: LayerSurface) {
        for entry in &mut self.outputs {
            if entry.remove_surface(&surface) {
                entry.arrange();
            }
        }
        debug!("layer surface destroyed");
    }
}
delegate_layer_shell!(@<BackendData: Backend + 'static> Infinidesk<BackendData>);
