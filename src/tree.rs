//! Ownership hierarchy of everything placed on screen.
//!
//! Root owns outputs, an output owns its workspaces plus the containers that
//! live outside any workspace (panels, overlays), a workspace owns the
//! containers of application windows, and a container may own nested
//! containers for popups. Parents hold ordered child lists; children keep a
//! typed back reference to their single owner.

use slotmap::{SlotMap, new_key_type};

use crate::backend::{SceneGraph, SurfaceHit};
use crate::utils::{Point, Rectangle, SurfaceId};
use crate::view::ViewId;

new_key_type! {
    pub struct OutputId;
    pub struct WorkspaceId;
    pub struct ContainerId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    Output(OutputId),
    Workspace(WorkspaceId),
    Container(ContainerId),
}

#[derive(Debug)]
pub struct OutputNode {
    pub name: String,
    pub geometry: Rectangle,
    workspaces: Vec<WorkspaceId>,
    containers: Vec<ContainerId>,
    current: usize,
}

impl OutputNode {
    pub fn workspaces(&self) -> &[WorkspaceId] {
        &self.workspaces
    }

    pub fn containers(&self) -> &[ContainerId] {
        &self.containers
    }

    pub fn current_index(&self) -> usize {
        self.current
    }
}

#[derive(Debug)]
pub struct WorkspaceNode {
    pub name: String,
    output: OutputId,
    containers: Vec<ContainerId>,
    enabled: bool,
}

impl WorkspaceNode {
    pub fn output(&self) -> OutputId {
        self.output
    }

    pub fn containers(&self) -> &[ContainerId] {
        &self.containers
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[derive(Debug)]
pub struct ContainerNode {
    view: Option<ViewId>,
    surface: Option<SurfaceId>,
    ownable: bool,
    owner: Option<Owner>,
    children: Vec<ContainerId>,
}

impl ContainerNode {
    pub fn view(&self) -> Option<ViewId> {
        self.view
    }

    pub fn surface(&self) -> Option<SurfaceId> {
        self.surface
    }

    pub fn owner(&self) -> Option<Owner> {
        self.owner
    }

    pub fn children(&self) -> &[ContainerId] {
        &self.children
    }
}

/// Everything that was hanging off an output when it went away.
#[derive(Debug, Default)]
pub struct DetachedOutput {
    pub name: String,
    pub views: Vec<ViewId>,
}

#[derive(Debug, Default)]
pub struct Tree {
    outputs: SlotMap<OutputId, OutputNode>,
    output_order: Vec<OutputId>,
    workspaces: SlotMap<WorkspaceId, WorkspaceNode>,
    containers: SlotMap<ContainerId, ContainerNode>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach_output(
        &mut self,
        name: impl Into<String>,
        geometry: Rectangle,
        workspace_names: &[String],
    ) -> OutputId {
        let name = name.into();
        let output = self.outputs.insert(OutputNode {
            name: name.clone(),
            geometry,
            workspaces: Vec::new(),
            containers: Vec::new(),
            current: 0,
        });

        let default_name = [String::from("1")];
        let names = if workspace_names.is_empty() {
            &default_name[..]
        } else {
            workspace_names
        };

        let workspaces = names
            .iter()
            .enumerate()
            .map(|(index, ws_name)| {
                self.workspaces.insert(WorkspaceNode {
                    name: ws_name.clone(),
                    output,
                    containers: Vec::new(),
                    enabled: index == 0,
                })
            })
            .collect();
        self.outputs[output].workspaces = workspaces;
        self.output_order.push(output);

        tracing::debug!(output = %name, %geometry, workspaces = names.len(), "attached output");
        output
    }

    /// Removes the output with all of its workspaces and containers.
    pub fn detach_output(&mut self, output: OutputId) -> Option<DetachedOutput> {
        let node = self.outputs.remove(output)?;
        self.output_order.retain(|id| *id != output);

        let mut detached = DetachedOutput {
            name: node.name,
            views: Vec::new(),
        };

        let mut roots = node.containers;
        for workspace in node.workspaces {
            if let Some(ws) = self.workspaces.remove(workspace) {
                roots.extend(ws.containers);
            }
        }

        let mut stack = roots;
        while let Some(container) = stack.pop() {
            let Some(node) = self.containers.remove(container) else {
                continue;
            };
            detached.views.extend(node.view);
            stack.extend(node.children);
        }

        tracing::debug!(
            output = %detached.name,
            views = detached.views.len(),
            "detached output"
        );
        Some(detached)
    }

    pub fn outputs(&self) -> impl Iterator<Item = (OutputId, &OutputNode)> + '_ {
        self.output_order
            .iter()
            .filter_map(|id| self.outputs.get(*id).map(|node| (*id, node)))
    }

    pub fn first_output(&self) -> Option<OutputId> {
        self.output_order.first().copied()
    }

    pub fn output(&self, output: OutputId) -> Option<&OutputNode> {
        self.outputs.get(output)
    }

    pub fn output_by_name(&self, name: &str) -> Option<OutputId> {
        self.outputs()
            .find(|(_, node)| node.name == name)
            .map(|(id, _)| id)
    }

    pub fn set_output_geometry(&mut self, output: OutputId, geometry: Rectangle) {
        if let Some(node) = self.outputs.get_mut(output) {
            node.geometry = geometry;
        }
    }

    pub fn output_at(&self, point: Point<f64>) -> Option<OutputId> {
        self.outputs()
            .find(|(_, node)| node.geometry.contains(point))
            .map(|(id, _)| id)
    }

    pub fn workspace(&self, workspace: WorkspaceId) -> Option<&WorkspaceNode> {
        self.workspaces.get(workspace)
    }

    pub fn current_workspace(&self, output: OutputId) -> Option<WorkspaceId> {
        let node = self.outputs.get(output)?;
        node.workspaces.get(node.current).copied()
    }

    /// Makes workspace `index` of `output` the presented one. Every other
    /// workspace of that output is disabled.
    pub fn set_current_workspace(&mut self, output: OutputId, index: usize) -> Option<WorkspaceId> {
        let node = self.outputs.get_mut(output)?;
        let target = *node.workspaces.get(index)?;
        node.current = index;

        let workspaces = node.workspaces.clone();
        for workspace in workspaces {
            if workspace == target {
                self.enable_workspace(workspace);
            } else {
                self.disable_workspace(workspace);
            }
        }
        Some(target)
    }

    pub fn enable_workspace(&mut self, workspace: WorkspaceId) {
        if let Some(ws) = self.workspaces.get_mut(workspace) {
            ws.enabled = true;
        }
    }

    pub fn disable_workspace(&mut self, workspace: WorkspaceId) {
        if let Some(ws) = self.workspaces.get_mut(workspace) {
            ws.enabled = false;
        }
    }

    pub fn container(&self, container: ContainerId) -> Option<&ContainerNode> {
        self.containers.get(container)
    }

    pub fn create_container(
        &mut self,
        view: Option<ViewId>,
        surface: Option<SurfaceId>,
        ownable: bool,
    ) -> ContainerId {
        self.containers.insert(ContainerNode {
            view,
            surface,
            ownable,
            owner: None,
            children: Vec::new(),
        })
    }

    /// Places `child` under `output`: ownable containers go to the output's
    /// current workspace, the rest are owned by the output directly.
    pub fn insert(&mut self, child: ContainerId, output: OutputId) -> bool {
        let Some(node) = self.containers.get(child) else {
            return false;
        };
        if node.owner.is_some() {
            self.detach(child);
        }

        let ownable = self.containers[child].ownable;
        let owner = if ownable {
            let Some(workspace) = self.current_workspace(output) else {
                tracing::error!(?output, ?child, "insert into output without a current workspace");
                debug_assert!(false, "insert into output without a current workspace");
                return false;
            };
            self.workspaces[workspace].containers.push(child);
            Owner::Workspace(workspace)
        } else {
            let Some(node) = self.outputs.get_mut(output) else {
                tracing::error!(?output, ?child, "insert into unknown output");
                debug_assert!(false, "insert into unknown output");
                return false;
            };
            node.containers.push(child);
            Owner::Output(output)
        };

        self.containers[child].owner = Some(owner);
        true
    }

    pub fn insert_child(&mut self, parent: ContainerId, child: ContainerId) -> bool {
        if parent == child || !self.containers.contains_key(parent) {
            return false;
        }
        let Some(node) = self.containers.get(child) else {
            return false;
        };
        if node.owner.is_some() {
            self.detach(child);
        }

        self.containers[parent].children.push(child);
        self.containers[child].owner = Some(Owner::Container(parent));
        true
    }

    /// Unlinks `child` from its owner. Nested containers stay attached to it.
    pub fn detach(&mut self, child: ContainerId) {
        let Some(owner) = self.containers.get_mut(child).and_then(|node| node.owner.take()) else {
            return;
        };

        let siblings = match owner {
            Owner::Output(id) => self.outputs.get_mut(id).map(|node| &mut node.containers),
            Owner::Workspace(id) => self.workspaces.get_mut(id).map(|node| &mut node.containers),
            Owner::Container(id) => self.containers.get_mut(id).map(|node| &mut node.children),
        };
        if let Some(siblings) = siblings {
            siblings.retain(|id| *id != child);
        }
    }

    /// Frees `container`. Nested containers are orphaned, not freed, because
    /// their own views still hold them.
    pub fn destroy_container(&mut self, container: ContainerId) {
        self.detach(container);
        let Some(node) = self.containers.remove(container) else {
            return;
        };
        for child in node.children {
            if let Some(child) = self.containers.get_mut(child) {
                child.owner = None;
            }
        }
    }

    /// Moves `container` to the top of its owner's stacking order.
    pub fn raise(&mut self, container: ContainerId) {
        let Some(owner) = self.containers.get(container).and_then(|node| node.owner) else {
            return;
        };
        let siblings = match owner {
            Owner::Output(id) => self.outputs.get_mut(id).map(|node| &mut node.containers),
            Owner::Workspace(id) => self.workspaces.get_mut(id).map(|node| &mut node.containers),
            Owner::Container(id) => self.containers.get_mut(id).map(|node| &mut node.children),
        };
        if let Some(siblings) = siblings
            && let Some(index) = siblings.iter().position(|id| *id == container)
        {
            let id = siblings.remove(index);
            siblings.push(id);
        }
    }

    pub fn is_inserted(&self, container: ContainerId) -> bool {
        self.containers
            .get(container)
            .is_some_and(|node| node.owner.is_some())
    }

    /// Workspace the container ultimately belongs to, following parents.
    pub fn workspace_of(&self, container: ContainerId) -> Option<WorkspaceId> {
        let mut current = container;
        loop {
            match self.containers.get(current)?.owner? {
                Owner::Workspace(workspace) => return Some(workspace),
                Owner::Output(_) => return None,
                Owner::Container(parent) => current = parent,
            }
        }
    }

    pub fn output_of(&self, container: ContainerId) -> Option<OutputId> {
        let mut current = container;
        loop {
            match self.containers.get(current)?.owner? {
                Owner::Workspace(workspace) => {
                    return self.workspaces.get(workspace).map(|ws| ws.output);
                }
                Owner::Output(output) => return Some(output),
                Owner::Container(parent) => current = parent,
            }
        }
    }

    /// Whether the container would currently be presented.
    pub fn is_visible(&self, container: ContainerId) -> bool {
        if !self.is_inserted(container) {
            return false;
        }
        match self.workspace_of(container) {
            Some(workspace) => self
                .workspaces
                .get(workspace)
                .is_some_and(WorkspaceNode::is_enabled),
            None => self.output_of(container).is_some(),
        }
    }

    pub fn find_by_surface(&self, surface: SurfaceId) -> Option<ContainerId> {
        for (_, output) in self.outputs() {
            if let Some(found) = self.find_in(&output.containers, surface) {
                return Some(found);
            }
            for workspace in &output.workspaces {
                let Some(ws) = self.workspaces.get(*workspace) else {
                    continue;
                };
                if let Some(found) = self.find_in(&ws.containers, surface) {
                    return Some(found);
                }
            }
        }
        None
    }

    fn find_in(&self, containers: &[ContainerId], surface: SurfaceId) -> Option<ContainerId> {
        for container in containers {
            let Some(node) = self.containers.get(*container) else {
                continue;
            };
            if node.surface == Some(surface) {
                return Some(*container);
            }
            if let Some(found) = self.find_in(&node.children, surface) {
                return Some(found);
            }
        }
        None
    }

    /// Resolves the topmost scene node at `point` to the container that owns
    /// it, walking up through parent surfaces (subsurfaces and the like).
    pub fn find_at(
        &self,
        scene: &dyn SceneGraph,
        point: Point<f64>,
    ) -> Option<(ContainerId, SurfaceHit)> {
        let hit = scene.surface_at(point)?;
        let mut surface = hit.surface;
        loop {
            if let Some(container) = self.find_by_surface(surface) {
                return Some((container, hit));
            }
            surface = scene.parent_surface(surface)?;
        }
    }
}
