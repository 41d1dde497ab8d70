use crate::{Nora, shell::CompositorHandler, utils::SurfaceId};

impl CompositorHandler for Nora {
    fn map(&mut self, surface: SurfaceId) {
        let Some(view) = self.view_for_surface(surface) else {
            tracing::debug!(%surface, "map of a surface without a role");
            return;
        };
        self.map_view(view);
    }

    fn unmap(&mut self, surface: SurfaceId) {
        let Some(view) = self.view_for_surface(surface) else {
            return;
        };
        self.unmap_view(view);
    }

    fn destroyed(&mut self, surface: SurfaceId) {
        let Some(view) = self.view_for_surface(surface) else {
            return;
        };

        // Popups anchored on this view die with it.
        let children: Vec<_> = self
            .views
            .iter()
            .filter(|(_, candidate)| candidate.popup_parent() == Some(view))
            .map(|(id, _)| id)
            .collect();
        for child in children {
            if let Some(child_surface) = self.views.get(child).map(|v| v.surface) {
                self.destroyed(child_surface);
            }
        }

        self.destroy_view(view);
    }
}
