use std::{collections::HashMap, path::PathBuf};

use calloop::LoopSignal;
use slotmap::SlotMap;

use crate::{
    CompositorError,
    backend::Backend,
    config::{self, RuntimeConfig},
    grabs::{GrabMode, PointerGrab, resize_grab::ResizeEdge},
    layout::{Desktop, arrange_layers},
    protocols::desktop_manager::{DesktopManagerState, HandleKind, ManagerTransport},
    tree::{ContainerId, OutputId, Tree, WorkspaceId},
    utils::{ClientId, Point, Rectangle, SurfaceId},
    view::{View, ViewId, ViewKind, ViewState},
};

pub struct Nora {
    pub loop_signal: Option<LoopSignal>,

    pub config: RuntimeConfig,
    pub config_path: Option<PathBuf>,

    pub backend: Box<dyn Backend>,
    pub desktop_manager_state: DesktopManagerState,

    pub tree: Tree,
    pub desktop: Desktop,
    pub views: SlotMap<ViewId, View>,
    surfaces: HashMap<SurfaceId, ViewId>,
    /// Views created while no output existed, in creation order.
    pending_output: Vec<ViewId>,

    pub grab: PointerGrab,
    pub pointer_location: Point<f64>,
    pub(crate) pointer_focus: Option<SurfaceId>,
    pub(crate) keyboard_focus: Option<SurfaceId>,
    pub(crate) activated: Option<ViewId>,
    pub(crate) keyboards: usize,
}

impl Nora {
    pub fn new(
        config: RuntimeConfig,
        backend: Box<dyn Backend>,
        transport: Box<dyn ManagerTransport>,
    ) -> Self {
        let desktop_manager_state = DesktopManagerState::new(transport, config.sync_existing_views);

        Self {
            loop_signal: None,
            config,
            config_path: None,
            backend,
            desktop_manager_state,
            tree: Tree::new(),
            desktop: Desktop::new(),
            views: SlotMap::with_key(),
            surfaces: HashMap::new(),
            pending_output: Vec::new(),
            grab: PointerGrab::default(),
            pointer_location: Point::default(),
            pointer_focus: None,
            keyboard_focus: None,
            activated: None,
            keyboards: 0,
        }
    }

    pub fn view_for_surface(&self, surface: SurfaceId) -> Option<ViewId> {
        self.surfaces.get(&surface).copied()
    }

    pub fn keyboard_focus(&self) -> Option<SurfaceId> {
        self.keyboard_focus
    }

    pub fn pointer_focus(&self) -> Option<SurfaceId> {
        self.pointer_focus
    }

    pub fn pending_output_views(&self) -> &[ViewId] {
        &self.pending_output
    }

    /// Output a new view lands on: the one under the pointer, else the first.
    pub fn output_for_new_view(&self) -> Option<OutputId> {
        self.tree
            .output_at(self.pointer_location)
            .or_else(|| self.tree.first_output())
    }

    /// Registers a view for `surface`. It stays out of the tree until mapped.
    pub fn create_view(
        &mut self,
        client: ClientId,
        surface: SurfaceId,
        kind: ViewKind,
        output: Option<OutputId>,
    ) -> Option<ViewId> {
        if self.surfaces.contains_key(&surface) {
            tracing::warn!(%surface, "surface already has a role, ignoring");
            return None;
        }

        let handle_kind = match &kind {
            ViewKind::Toplevel(_) => HandleKind::Toplevel,
            ViewKind::Popup(_) => HandleKind::Popup,
            ViewKind::Layer(_) => HandleKind::Layer,
        };
        let ownable = !matches!(kind, ViewKind::Layer(_));
        let kind_name = kind.name();

        let view = self.views.insert_with_key(|id| View {
            client,
            surface,
            output,
            container: self.tree.create_container(Some(id), Some(surface), ownable),
            handle: self.desktop_manager_state.create_handle(id, handle_kind),
            geometry: Rectangle::default(),
            state: ViewState::Created,
            pending_map: false,
            kind,
        });
        self.surfaces.insert(surface, view);

        if output.is_none() {
            tracing::info!(%surface, "no output available, view parked until one appears");
            self.pending_output.push(view);
        }

        tracing::debug!(?view, %surface, kind = kind_name, "view created");
        Some(view)
    }

    pub fn map_view(&mut self, view: ViewId) {
        let Some(v) = self.views.get_mut(view) else {
            return;
        };
        if v.is_mapped() {
            tracing::debug!(?view, "view already mapped");
            return;
        }
        let Some(output) = v.output else {
            tracing::debug!(?view, "map deferred until an output exists");
            v.pending_map = true;
            return;
        };

        let container = v.container;
        let surface = v.surface;
        match v.kind.clone() {
            ViewKind::Toplevel(_) => {
                if !self.tree.insert(container, output) {
                    return;
                }
                let Some(workspace) = self.tree.workspace_of(container) else {
                    return;
                };
                self.views[view].state = ViewState::Mapped;

                let role = self.desktop.insert_toplevel(workspace, view);
                tracing::info!(?view, %surface, ?role, "toplevel mapped");

                self.sync_visibility(container);
                self.retile_workspace(workspace);

                if self.config.focus_on_map && self.tree.is_visible(container) {
                    self.focus_view(view);
                }
            }
            ViewKind::Popup(data) => {
                let Some(parent) = self.views.get(data.parent) else {
                    tracing::warn!(?view, "popup parent is gone, not mapping");
                    return;
                };
                let parent_container = parent.container;
                let geometry = Rectangle::from_parts(
                    parent.geometry.loc + data.relative.loc,
                    data.relative.size,
                );
                if !self.tree.insert_child(parent_container, container) {
                    return;
                }

                let v = &mut self.views[view];
                v.state = ViewState::Mapped;
                v.geometry = geometry;
                self.backend.configure(surface, geometry.size);
                self.backend.set_position(surface, geometry.loc);
                self.sync_visibility(container);
                tracing::debug!(?view, %surface, %geometry, "popup mapped");
            }
            ViewKind::Layer(data) => {
                if !self.tree.insert(container, output) {
                    return;
                }
                self.views[view].state = ViewState::Mapped;
                self.desktop.add_layer(view);
                tracing::info!(?view, namespace = %data.namespace, "layer surface mapped");

                self.sync_visibility(container);
                self.arrange_output(output);
            }
        }

        let handle = self.views[view].handle;
        self.desktop_manager_state.set_hidden(handle, false);
    }

    /// No-op for views that are not mapped.
    pub fn unmap_view(&mut self, view: ViewId) {
        let Some(v) = self.views.get_mut(view) else {
            return;
        };
        if v.pending_map {
            v.pending_map = false;
            return;
        }
        if !v.is_mapped() {
            tracing::debug!(?view, "unmap of a view that is not mapped");
            return;
        }
        v.state = ViewState::Unmapped;

        let container = v.container;
        let surface = v.surface;
        let output = v.output;
        let kind_name = v.kind.name();
        let is_toplevel = v.as_toplevel().is_some();
        let is_layer = v.as_layer().is_some();

        self.set_subtree_visible(container, false);
        self.tree.detach(container);

        if self.grab.view() == Some(view) {
            tracing::debug!(?view, "grabbed view unmapped, releasing grab");
            self.grab.release();
        }

        if is_toplevel && let Some(workspace) = self.desktop.remove_toplevel(view) {
            self.retile_workspace(workspace);
        }
        if is_layer {
            self.desktop.remove_layer(view);
            if let Some(output) = output {
                self.arrange_output(output);
            }
        }

        if self.activated == Some(view) {
            self.activated = None;
        }
        if self.keyboard_focus == Some(surface) {
            self.keyboard_focus = None;
            self.backend.keyboard_enter(None);
        }
        if self.pointer_focus == Some(surface) {
            self.pointer_focus = None;
            self.backend.pointer_clear_focus();
        }

        tracing::info!(?view, %surface, kind = kind_name, "view unmapped");
    }

    pub fn destroy_view(&mut self, view: ViewId) {
        self.unmap_view(view);
        let Some(v) = self.views.remove(view) else {
            return;
        };

        self.desktop_manager_state.destroy_handle(v.handle);
        self.tree.destroy_container(v.container);
        self.backend.destroy_surface(v.surface);
        self.surfaces.remove(&v.surface);
        self.pending_output.retain(|pending| *pending != view);

        tracing::info!(?view, surface = %v.surface, kind = v.kind.name(), "view destroyed");
    }

    /// Raises the view and hands it keyboard focus. Popups resolve to the
    /// view they are anchored on.
    pub fn focus_view(&mut self, view: ViewId) {
        let target = self.root_view(view);
        let Some(v) = self.views.get(target) else {
            return;
        };
        let surface = v.surface;
        let container = v.container;

        self.tree.raise(container);
        self.backend.raise_to_top(surface);

        if self.keyboard_focus == Some(surface) {
            return;
        }

        self.deactivate_current();
        if let Some(toplevel) = self.views[target].as_toplevel_mut() {
            toplevel.activated = true;
            self.backend.set_activated(surface, true);
            self.activated = Some(target);
        }

        self.keyboard_focus = Some(surface);
        self.backend.keyboard_enter(Some(surface));
        tracing::debug!(view = ?target, %surface, "keyboard focus changed");
    }

    fn deactivate_current(&mut self) {
        if let Some(previous) = self.activated.take()
            && let Some(prev) = self.views.get_mut(previous)
            && let Some(toplevel) = prev.as_toplevel_mut()
        {
            toplevel.activated = false;
            self.backend.set_activated(prev.surface, false);
        }
    }

    fn root_view(&self, mut view: ViewId) -> ViewId {
        while let Some(parent) = self.views.get(view).and_then(View::popup_parent) {
            view = parent;
        }
        view
    }

    /// Role surface of the view tree `surface` belongs to, following
    /// subsurfaces and popups upwards.
    pub(crate) fn root_surface(&self, surface: SurfaceId) -> Option<SurfaceId> {
        let scene = self.backend.scene();
        let mut current = surface;
        loop {
            if let Some(view) = self.view_for_surface(current) {
                let root = self.root_view(view);
                return self.views.get(root).map(|v| v.surface);
            }
            current = scene.parent_surface(current)?;
        }
    }

    /// Starts a move or resize grab on behalf of the client. Only honored
    /// while the pointer is over the requesting toplevel.
    pub fn begin_interactive(&mut self, view: ViewId, mode: GrabMode, edges: ResizeEdge) {
        let Some(v) = self.views.get(view) else {
            return;
        };
        if v.as_toplevel().is_none() {
            tracing::error!(?view, kind = v.kind.name(), "interactive grab on a non-toplevel view");
            debug_assert!(false, "interactive grab on a non-toplevel view");
            return;
        }

        let focused_root = self.pointer_focus.and_then(|surface| self.root_surface(surface));
        if focused_root != Some(v.surface) {
            tracing::debug!(?view, ?mode, "grab denied, view does not hold pointer focus");
            return;
        }

        let geometry = v.geometry;
        match mode {
            GrabMode::Move => self.grab.start_move(view, self.pointer_location, geometry),
            GrabMode::Resize => {
                self.grab
                    .start_resize(view, self.pointer_location, geometry, edges)
            }
            GrabMode::Passthrough => return,
        }
        tracing::info!(?view, ?mode, ?edges, "interactive grab started");
    }

    /// Applies `geometry` to a view and moves its popups along.
    pub(crate) fn apply_geometry(&mut self, view: ViewId, geometry: Rectangle) {
        let Some(v) = self.views.get_mut(view) else {
            return;
        };
        v.geometry = geometry;
        let surface = v.surface;
        let container = v.container;

        self.backend.configure(surface, geometry.size);
        self.backend.set_position(surface, geometry.loc);
        self.reposition_popups(container, geometry.loc);
    }

    fn reposition_popups(&mut self, container: ContainerId, origin: Point) {
        let Some(node) = self.tree.container(container) else {
            return;
        };
        for child in node.children().to_vec() {
            let Some(popup) = self
                .tree
                .container(child)
                .and_then(|node| node.view())
                .and_then(|id| self.views.get_mut(id))
            else {
                continue;
            };
            let ViewKind::Popup(data) = &popup.kind else {
                continue;
            };
            let location = origin + data.relative.loc;
            popup.geometry.loc = location;
            let surface = popup.surface;
            self.backend.set_position(surface, location);
            self.reposition_popups(child, location);
        }
    }

    fn sync_visibility(&mut self, container: ContainerId) {
        let visible = self.tree.is_visible(container);
        self.set_subtree_visible(container, visible);
    }

    fn set_subtree_visible(&mut self, container: ContainerId, visible: bool) {
        let Some(node) = self.tree.container(container) else {
            return;
        };
        let children = node.children().to_vec();
        if let Some(surface) = node.surface() {
            self.backend.set_visible(surface, visible);
        }
        for child in children {
            self.set_subtree_visible(child, visible);
        }
    }

    /// Recomputes the geometry of every tiled toplevel on `workspace`.
    pub fn retile_workspace(&mut self, workspace: WorkspaceId) {
        let Some(output) = self.tree.workspace(workspace).map(|ws| ws.output()) else {
            return;
        };
        let Some(output_geometry) = self.tree.output(output).map(|node| node.geometry) else {
            return;
        };
        let Some(stack) = self.desktop.stack(workspace) else {
            return;
        };

        let area = self.desktop.margin(output).usable_area(output_geometry);
        let placements = stack.arrange(area, self.config.border_width);
        tracing::debug!(?workspace, %area, views = placements.len(), "retiling workspace");

        // The grabbed view follows the pointer until the grab ends.
        let grabbed = self.grab.view();
        for (view, geometry) in placements {
            if Some(view) != grabbed {
                self.apply_geometry(view, geometry);
            }
        }
    }

    /// Lays out the layer surfaces of `output`, then retiles its current
    /// workspace against the resulting usable area.
    pub fn arrange_output(&mut self, output: OutputId) {
        let Some(geometry) = self.tree.output(output).map(|node| node.geometry) else {
            return;
        };

        let layers: Vec<_> = self
            .desktop
            .layers_newest_first()
            .filter_map(|id| {
                let view = self.views.get(id)?;
                if !view.is_mapped() || view.output != Some(output) {
                    return None;
                }
                view.as_layer().map(|data| (id, data.clone()))
            })
            .collect();

        let arrangement = arrange_layers(geometry, layers.iter().map(|(id, data)| (*id, data)));
        for (view, geometry) in arrangement.geometries {
            self.apply_geometry(view, geometry);
        }
        self.desktop.set_margin(output, arrangement.margin);

        if let Some(workspace) = self.tree.current_workspace(output) {
            self.retile_workspace(workspace);
        }
    }

    pub fn add_output(&mut self, name: String, geometry: Rectangle) -> Option<OutputId> {
        if self.tree.output_by_name(&name).is_some() {
            tracing::warn!(output = %name, "output already known, ignoring");
            return None;
        }
        if geometry.size.is_empty() {
            tracing::warn!(output = %name, %geometry, "output without area, ignoring");
            return None;
        }

        let output = self
            .tree
            .attach_output(name.clone(), geometry, &self.config.workspaces);
        tracing::info!(output = %name, %geometry, "output added");

        let pending = std::mem::take(&mut self.pending_output);
        self.rehome_views(pending, output);
        self.arrange_output(output);
        Some(output)
    }

    pub fn resize_output(&mut self, name: &str, geometry: Rectangle) {
        let Some(output) = self.tree.output_by_name(name) else {
            tracing::warn!(output = %name, "resize of unknown output");
            return;
        };
        if geometry.size.is_empty() {
            tracing::warn!(output = %name, %geometry, "resize to an empty output ignored");
            return;
        }
        self.tree.set_output_geometry(output, geometry);
        tracing::info!(output = %name, %geometry, "output resized");
        self.arrange_output(output);
    }

    /// Tears down an output. Its views leave the tree and tiling, then move
    /// to the first remaining output or wait for a new one.
    pub fn remove_output(&mut self, name: &str) {
        let Some(output) = self.tree.output_by_name(name) else {
            tracing::warn!(output = %name, "removal of unknown output");
            return;
        };

        let affected: Vec<ViewId> = self
            .views
            .iter()
            .filter(|(_, view)| view.output == Some(output))
            .map(|(id, _)| id)
            .collect();
        let mut was_mapped = Vec::with_capacity(affected.len());
        for view in &affected {
            let mapped = self.views[*view].is_mapped();
            if mapped {
                self.unmap_view(*view);
            }
            was_mapped.push(mapped);
        }

        if let Some(node) = self.tree.output(output) {
            for workspace in node.workspaces().to_vec() {
                self.desktop.forget_workspace(workspace);
            }
        }
        if let Some(detached) = self.tree.detach_output(output)
            && !detached.views.is_empty()
        {
            tracing::error!(output = %detached.name, views = detached.views.len(), "views left in removed output");
            debug_assert!(false, "views left in removed output");
        }
        self.desktop.forget_output(output);
        tracing::info!(output = %name, views = affected.len(), "output removed");

        for (view, mapped) in affected.iter().zip(was_mapped) {
            if let Some(v) = self.views.get_mut(*view) {
                v.output = None;
                v.pending_map = mapped;
            }
        }
        match self.tree.first_output() {
            Some(fallback) => {
                self.rehome_views(affected, fallback);
                self.arrange_output(fallback);
            }
            None => self.pending_output.extend(affected),
        }
    }

    /// Assigns `views` to `output`, mapping those their client had mapped.
    /// Popups go last so their parents are placed first.
    fn rehome_views(&mut self, mut views: Vec<ViewId>, output: OutputId) {
        views.sort_by_key(|view| self.views.get(*view).and_then(View::popup_parent).is_some());
        for view in views {
            let Some(v) = self.views.get_mut(view) else {
                continue;
            };
            v.output = Some(output);
            if std::mem::take(&mut v.pending_map) {
                self.map_view(view);
            }
        }
    }

    /// Makes workspace `index` of `output` (or the active output) current.
    pub fn switch_workspace(
        &mut self,
        output: Option<&str>,
        index: usize,
    ) -> Result<(), CompositorError> {
        let output = match output {
            Some(name) => self
                .tree
                .output_by_name(name)
                .ok_or_else(|| CompositorError::Backend(format!("unknown output {name}")))?,
            None => self.output_for_new_view().ok_or(CompositorError::NoOutput)?,
        };
        let Some(node) = self.tree.output(output) else {
            return Err(CompositorError::NoOutput);
        };
        if index >= node.workspaces().len() {
            return Err(CompositorError::Backend(format!(
                "invalid workspace index {index}"
            )));
        }
        if index == node.current_index() {
            return Ok(());
        }

        let previous = self.tree.current_workspace(output);
        let Some(workspace) = self.tree.set_current_workspace(output, index) else {
            return Err(CompositorError::Backend(format!(
                "invalid workspace index {index}"
            )));
        };

        if let Some(previous) = previous
            && let Some(ws) = self.tree.workspace(previous)
        {
            for container in ws.containers().to_vec() {
                self.set_subtree_visible(container, false);
            }
        }
        if let Some(ws) = self.tree.workspace(workspace) {
            for container in ws.containers().to_vec() {
                self.set_subtree_visible(container, true);
            }
        }
        self.retile_workspace(workspace);

        if let Some(view) = self.grab.view()
            && !self
                .views
                .get(view)
                .is_some_and(|v| self.tree.is_visible(v.container))
        {
            tracing::debug!(?view, "grabbed view left the screen, releasing grab");
            self.grab.release();
        }
        if !self.grab.is_active() {
            self.refresh_pointer_focus();
        }

        let still_visible = self
            .activated
            .and_then(|view| self.views.get(view))
            .is_some_and(|view| self.tree.is_visible(view.container));
        if !still_visible {
            match self.desktop.stack(workspace).and_then(|stack| stack.master()) {
                Some(master) => self.focus_view(master),
                None => {
                    self.deactivate_current();
                    self.keyboard_focus = None;
                    self.backend.keyboard_enter(None);
                }
            }
        }

        tracing::info!(?output, index, "switched workspace");
        Ok(())
    }

    pub fn reload_config(&mut self) -> Result<(), CompositorError> {
        let Some(path) = self.config_path.clone() else {
            return Err(CompositorError::Config(
                "no configuration file in use".to_owned(),
            ));
        };

        let config = config::load_from_path(&path)?;
        config::apply_environment(&config);
        self.desktop_manager_state
            .set_sync_existing(config.sync_existing_views);
        self.config = config;

        let outputs: Vec<OutputId> = self.tree.outputs().map(|(id, _)| id).collect();
        for output in outputs {
            self.arrange_output(output);
        }

        tracing::info!(path = %path.display(), "configuration reloaded");
        Ok(())
    }

    pub fn render_clients_report(&self) -> String {
        if self.views.is_empty() {
            return "No clients.\n".to_owned();
        }

        let mut out = String::new();
        for (index, (id, view)) in self.views.iter().enumerate() {
            let output = view
                .output
                .and_then(|output| self.tree.output(output))
                .map_or("<none>", |node| node.name.as_str());
            let workspace = self
                .tree
                .workspace_of(view.container)
                .and_then(|ws| self.tree.workspace(ws))
                .map_or("<none>", |ws| ws.name.as_str());
            let master = self
                .desktop
                .tiled_workspace(id)
                .and_then(|ws| self.desktop.stack(ws))
                .is_some_and(|stack| stack.master() == Some(id));
            let focused = self.keyboard_focus == Some(view.surface);

            out.push_str(&format!("Client {}:\n", index + 1));
            out.push_str(&format!("  surface: {}\n", view.surface));
            out.push_str(&format!("  kind: {}\n", view.kind.name()));
            out.push_str(&format!("  class: {}\n", view.app_id().unwrap_or("<unknown>")));
            out.push_str(&format!("  title: {}\n", view.title().unwrap_or("<untitled>")));
            out.push_str(&format!("  geometry: {}\n", view.geometry));
            out.push_str(&format!("  output: {output}\n"));
            out.push_str(&format!("  workspace: {workspace}\n"));
            out.push_str(&format!("  mapped: {}\n", view.is_mapped()));
            out.push_str(&format!("  master: {master}\n"));
            out.push_str(&format!("  focused: {focused}\n"));
            out.push('\n');
        }

        out
    }

    pub fn stop(&mut self) {
        tracing::info!("shutting down");
        if let Some(signal) = &self.loop_signal {
            signal.stop();
        }
    }
}
