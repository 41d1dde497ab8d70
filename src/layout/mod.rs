pub mod layer;
pub mod master_stack;

use std::collections::HashMap;

pub use layer::{ExclusiveMargin, LayerArrangement, arrange_layers};
pub use master_stack::{MasterStack, Role};

use crate::tree::{OutputId, WorkspaceId};
use crate::view::ViewId;

/// Per-workspace tiling state plus the layer surfaces of every output.
#[derive(Debug, Default)]
pub struct Desktop {
    stacks: HashMap<WorkspaceId, MasterStack>,
    layers: Vec<ViewId>,
    margins: HashMap<OutputId, ExclusiveMargin>,
}

impl Desktop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stack(&self, workspace: WorkspaceId) -> Option<&MasterStack> {
        self.stacks.get(&workspace)
    }

    pub fn insert_toplevel(&mut self, workspace: WorkspaceId, view: ViewId) -> Role {
        self.stacks.entry(workspace).or_default().insert(view)
    }

    /// Removes `view` from whichever workspace tiles it.
    pub fn remove_toplevel(&mut self, view: ViewId) -> Option<WorkspaceId> {
        let workspace = self
            .stacks
            .iter_mut()
            .find_map(|(workspace, stack)| stack.remove(view).then_some(*workspace))?;
        if self.stacks.get(&workspace).is_some_and(MasterStack::is_empty) {
            self.stacks.remove(&workspace);
        }
        Some(workspace)
    }

    pub fn tiled_workspace(&self, view: ViewId) -> Option<WorkspaceId> {
        self.stacks
            .iter()
            .find(|(_, stack)| stack.contains(view))
            .map(|(workspace, _)| *workspace)
    }

    pub fn forget_workspace(&mut self, workspace: WorkspaceId) {
        self.stacks.remove(&workspace);
    }

    pub fn add_layer(&mut self, view: ViewId) {
        if !self.layers.contains(&view) {
            self.layers.push(view);
        }
    }

    pub fn remove_layer(&mut self, view: ViewId) -> bool {
        let before = self.layers.len();
        self.layers.retain(|layer| *layer != view);
        before != self.layers.len()
    }

    /// Layer views in arrangement priority, most recently added first.
    pub fn layers_newest_first(&self) -> impl Iterator<Item = ViewId> + '_ {
        self.layers.iter().rev().copied()
    }

    pub fn margin(&self, output: OutputId) -> ExclusiveMargin {
        self.margins.get(&output).copied().unwrap_or_default()
    }

    pub fn set_margin(&mut self, output: OutputId, margin: ExclusiveMargin) {
        self.margins.insert(output, margin);
    }

    pub fn forget_output(&mut self, output: OutputId) {
        self.margins.remove(&output);
    }
}

#[cfg(test)]
mod tests {
    use slotmap::SlotMap;

    use super::*;

    #[test]
    fn removing_last_toplevel_drops_workspace_stack() {
        let mut workspaces = SlotMap::<WorkspaceId, ()>::with_key();
        let mut views = SlotMap::<ViewId, ()>::with_key();
        let ws = workspaces.insert(());
        let a = views.insert(());
        let b = views.insert(());

        let mut desktop = Desktop::new();
        assert_eq!(desktop.insert_toplevel(ws, a), Role::Master);
        assert_eq!(desktop.insert_toplevel(ws, b), Role::Slave);
        assert_eq!(desktop.tiled_workspace(b), Some(ws));

        assert_eq!(desktop.remove_toplevel(a), Some(ws));
        assert_eq!(desktop.stack(ws).and_then(MasterStack::master), Some(b));
        assert_eq!(desktop.remove_toplevel(a), None);

        assert_eq!(desktop.remove_toplevel(b), Some(ws));
        assert!(desktop.stack(ws).is_none());
    }

    #[test]
    fn layers_are_arranged_newest_first() {
        let mut views = SlotMap::<ViewId, ()>::with_key();
        let first = views.insert(());
        let second = views.insert(());
        let mut desktop = Desktop::new();

        desktop.add_layer(first);
        desktop.add_layer(second);
        desktop.add_layer(first);

        assert_eq!(desktop.layers_newest_first().collect::<Vec<_>>(), vec![second, first]);
        assert!(desktop.remove_layer(second));
        assert!(!desktop.remove_layer(second));
    }
}
