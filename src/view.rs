use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

use crate::protocols::desktop_manager::ViewHandleId;
use crate::tree::{ContainerId, OutputId};
use crate::utils::{ClientId, Rectangle, Size, SurfaceId};

new_key_type! {
    pub struct ViewId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    Created,
    Mapped,
    Unmapped,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct Anchor: u32 {
        const TOP = 1;
        const BOTTOM = 2;
        const LEFT = 4;
        const RIGHT = 8;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    Background,
    Bottom,
    #[default]
    Top,
    Overlay,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToplevelData {
    pub title: Option<String>,
    pub app_id: Option<String>,
    pub activated: bool,
    pub maximized: bool,
    pub fullscreen: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopupData {
    pub parent: ViewId,
    /// Placement relative to the parent, as computed by the positioner.
    pub relative: Rectangle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerData {
    pub namespace: String,
    pub layer: Layer,
    pub anchor: Anchor,
    pub desired_size: Size,
    pub exclusive_zone: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewKind {
    Toplevel(ToplevelData),
    Popup(PopupData),
    Layer(LayerData),
}

impl ViewKind {
    pub fn name(&self) -> &'static str {
        match self {
            ViewKind::Toplevel(_) => "toplevel",
            ViewKind::Popup(_) => "popup",
            ViewKind::Layer(_) => "layer",
        }
    }
}

#[derive(Debug)]
pub struct View {
    pub client: ClientId,
    pub surface: SurfaceId,
    pub output: Option<OutputId>,
    pub container: ContainerId,
    pub handle: ViewHandleId,
    pub geometry: Rectangle,
    pub state: ViewState,
    /// Client mapped the surface while no output existed.
    pub pending_map: bool,
    pub kind: ViewKind,
}

impl View {
    pub fn is_mapped(&self) -> bool {
        self.state == ViewState::Mapped
    }

    pub fn as_toplevel(&self) -> Option<&ToplevelData> {
        match &self.kind {
            ViewKind::Toplevel(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_toplevel_mut(&mut self) -> Option<&mut ToplevelData> {
        match &mut self.kind {
            ViewKind::Toplevel(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_layer(&self) -> Option<&LayerData> {
        match &self.kind {
            ViewKind::Layer(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_layer_mut(&mut self) -> Option<&mut LayerData> {
        match &mut self.kind {
            ViewKind::Layer(data) => Some(data),
            _ => None,
        }
    }

    pub fn popup_parent(&self) -> Option<ViewId> {
        match &self.kind {
            ViewKind::Popup(data) => Some(data.parent),
            _ => None,
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.as_toplevel().and_then(|data| data.title.as_deref())
    }

    pub fn app_id(&self) -> Option<&str> {
        self.as_toplevel().and_then(|data| data.app_id.as_deref())
    }
}
