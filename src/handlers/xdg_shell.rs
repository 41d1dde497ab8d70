use crate::{
    Nora,
    grabs::{GrabMode, resize_grab::ResizeEdge},
    shell::XdgShellHandler,
    utils::{ClientId, Rectangle, SurfaceId},
    view::{PopupData, ToplevelData, ViewKind},
};

impl XdgShellHandler for Nora {
    fn new_toplevel(&mut self, client: ClientId, surface: SurfaceId) {
        let output = self.output_for_new_view();
        let Some(view) = self.create_view(
            client,
            surface,
            ViewKind::Toplevel(ToplevelData::default()),
            output,
        ) else {
            return;
        };
        tracing::info!(?view, %surface, client = client.0, "new toplevel");
    }

    fn new_popup(
        &mut self,
        client: ClientId,
        surface: SurfaceId,
        parent: SurfaceId,
        geometry: Rectangle,
    ) {
        let Some(parent_view) = self.view_for_surface(parent) else {
            tracing::warn!(%surface, %parent, "popup with unknown parent surface");
            return;
        };
        let output = self.views[parent_view].output;
        let kind = ViewKind::Popup(PopupData {
            parent: parent_view,
            relative: geometry,
        });
        if let Some(view) = self.create_view(client, surface, kind, output) {
            tracing::debug!(?view, %surface, %parent, "new popup");
        }
    }

    fn move_request(&mut self, surface: SurfaceId) {
        let Some(view) = self.view_for_surface(surface) else {
            return;
        };
        self.begin_interactive(view, GrabMode::Move, ResizeEdge::empty());
    }

    fn resize_request(&mut self, surface: SurfaceId, edges: ResizeEdge) {
        let Some(view) = self.view_for_surface(surface) else {
            return;
        };
        self.begin_interactive(view, GrabMode::Resize, edges);
    }

    // The tiling layout owns the geometry; the request is recorded and
    // answered with a configure at the current size.
    fn maximize_request(&mut self, surface: SurfaceId, maximized: bool) {
        let Some(view) = self.view_for_surface(surface) else {
            return;
        };
        let v = &mut self.views[view];
        let Some(toplevel) = v.as_toplevel_mut() else {
            return;
        };
        toplevel.maximized = maximized;
        let size = v.geometry.size;
        self.backend.configure(surface, size);
        tracing::debug!(?view, maximized, "maximize request acknowledged");
    }

    fn fullscreen_request(&mut self, surface: SurfaceId, fullscreen: bool) {
        let Some(view) = self.view_for_surface(surface) else {
            return;
        };
        let v = &mut self.views[view];
        let Some(toplevel) = v.as_toplevel_mut() else {
            return;
        };
        toplevel.fullscreen = fullscreen;
        let size = v.geometry.size;
        self.backend.configure(surface, size);
        tracing::debug!(?view, fullscreen, "fullscreen request acknowledged");
    }

    fn title_changed(&mut self, surface: SurfaceId, title: String) {
        let Some(view) = self.view_for_surface(surface) else {
            return;
        };
        let v = &mut self.views[view];
        let handle = v.handle;
        let Some(toplevel) = v.as_toplevel_mut() else {
            return;
        };
        self.desktop_manager_state.set_title(handle, &title);
        tracing::debug!(?view, title = %title, "title changed");
        toplevel.title = Some(title);
    }

    fn app_id_changed(&mut self, surface: SurfaceId, app_id: String) {
        let Some(view) = self.view_for_surface(surface) else {
            return;
        };
        let v = &mut self.views[view];
        let handle = v.handle;
        let Some(toplevel) = v.as_toplevel_mut() else {
            return;
        };
        self.desktop_manager_state.set_app_id(handle, &app_id);
        tracing::debug!(?view, app_id = %app_id, "app id changed");
        toplevel.app_id = Some(app_id);
    }
}
