mod compositor;
mod layer_shell;
mod xdg_shell;

use crate::{
    Nora,
    backend::CursorImage,
    protocols::desktop_manager::{DesktopManagerHandler, DesktopManagerState},
    shell::{OutputHandler, SeatHandler},
    utils::{ClientId, Rectangle},
    view::ViewId,
};

impl SeatHandler for Nora {
    fn cursor_image(&mut self, client: ClientId, image: CursorImage) {
        let focused_client = self
            .pointer_focus
            .and_then(|surface| self.root_surface(surface))
            .and_then(|surface| self.view_for_surface(surface))
            .map(|view| self.views[view].client);
        if focused_client != Some(client) {
            tracing::debug!(client = client.0, "cursor image from unfocused client ignored");
            return;
        }
        self.backend.set_cursor_image(image);
    }

    fn set_selection(&mut self, client: ClientId, source: Option<u64>, serial: u32) {
        tracing::debug!(client = client.0, ?source, serial, "selection set");
        self.backend.set_selection(source, serial);
    }
}

impl OutputHandler for Nora {
    fn output_added(&mut self, name: String, geometry: Rectangle) {
        self.add_output(name, geometry);
    }

    fn output_resized(&mut self, name: &str, geometry: Rectangle) {
        self.resize_output(name, geometry);
    }

    fn output_removed(&mut self, name: &str) {
        self.remove_output(name);
    }
}

impl DesktopManagerHandler for Nora {
    fn desktop_manager_state(&mut self) -> &mut DesktopManagerState {
        &mut self.desktop_manager_state
    }

    fn hide_requested(&mut self, view: ViewId) {
        let Some(handle) = self.views.get(view).map(|v| v.handle) else {
            return;
        };
        // Management clients cannot change the layout; only the state is
        // recorded and mirrored to every client.
        self.desktop_manager_state.set_hidden(handle, true);
        tracing::info!(?view, "view hidden by management client");
    }
}
