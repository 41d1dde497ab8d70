pub mod headless;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::grabs::resize_grab::ResizeEdge;
use crate::protocols::desktop_manager::{DesktopManagerState, ResourceId, ViewRequest};
use crate::shell::{
    CompositorHandler, LayerShellHandler, LayerSurfaceState, OutputHandler, SeatHandler,
    XdgShellHandler,
};
use crate::state::Nora;
use crate::utils::{ClientId, Point, Rectangle, Size, SurfaceId};
use crate::view::{Anchor, Layer};

/// Topmost surface under a point, with the point in surface-local space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceHit {
    pub surface: SurfaceId,
    pub local: Point<f64>,
}

/// Hit-testing view of the rendered scene.
pub trait SceneGraph {
    fn surface_at(&self, point: Point<f64>) -> Option<SurfaceHit>;
    /// Parent of a subsurface, `None` for role surfaces.
    fn parent_surface(&self, surface: SurfaceId) -> Option<SurfaceId>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonState {
    Pressed,
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyState {
    Pressed,
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Vertical,
    Horizontal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisSource {
    #[default]
    Wheel,
    Finger,
    Continuous,
    WheelTilt,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisFrame {
    pub time: u32,
    pub axis: Axis,
    #[serde(default)]
    pub source: AxisSource,
    pub delta: f64,
    #[serde(default)]
    pub discrete: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Modifiers {
    pub depressed: u32,
    pub latched: u32,
    pub locked: u32,
    pub group: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Keyboard,
    Pointer,
    Touch,
    Other,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SeatCapabilities: u32 {
        const POINTER = 1;
        const KEYBOARD = 2;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CursorImage {
    Default,
    Hidden,
    Surface {
        surface: SurfaceId,
        hotspot: Point,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    PointerMotion {
        time: u32,
        dx: f64,
        dy: f64,
    },
    /// Position normalized to `0.0..=1.0` over the output layout.
    PointerMotionAbsolute {
        time: u32,
        x: f64,
        y: f64,
    },
    PointerButton {
        time: u32,
        button: u32,
        state: ButtonState,
    },
    PointerAxis(AxisFrame),
    PointerFrame,
    KeyboardKey {
        time: u32,
        keycode: u32,
        state: KeyState,
    },
    KeyboardModifiers(Modifiers),
    NewDevice {
        kind: DeviceKind,
    },
}

/// Commands sent back to the display backend.
pub trait Backend {
    fn scene(&self) -> &dyn SceneGraph;

    fn configure(&mut self, surface: SurfaceId, size: Size);
    fn set_position(&mut self, surface: SurfaceId, location: Point);
    fn set_visible(&mut self, surface: SurfaceId, visible: bool);
    fn set_activated(&mut self, surface: SurfaceId, activated: bool);
    fn raise_to_top(&mut self, surface: SurfaceId);
    /// The view behind `surface` is gone; drop it from the scene.
    fn destroy_surface(&mut self, surface: SurfaceId);

    fn keyboard_enter(&mut self, surface: Option<SurfaceId>);
    fn keyboard_key(&mut self, time: u32, keycode: u32, state: KeyState);
    fn keyboard_modifiers(&mut self, modifiers: Modifiers);

    fn pointer_enter(&mut self, surface: SurfaceId, local: Point<f64>);
    fn pointer_motion(&mut self, time: u32, local: Point<f64>);
    fn pointer_clear_focus(&mut self);
    fn pointer_button(&mut self, time: u32, button: u32, state: ButtonState);
    fn pointer_axis(&mut self, frame: AxisFrame);
    fn pointer_frame(&mut self);

    fn set_capabilities(&mut self, capabilities: SeatCapabilities);
    fn set_cursor_image(&mut self, image: CursorImage);
    fn set_selection(&mut self, source: Option<u64>, serial: u32);
}

/// One event from the display backend, already decoded from the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendEvent {
    OutputAdded {
        name: String,
        geometry: Rectangle,
    },
    OutputResized {
        name: String,
        geometry: Rectangle,
    },
    OutputRemoved {
        name: String,
    },

    NewToplevel {
        client: ClientId,
        surface: SurfaceId,
    },
    NewPopup {
        client: ClientId,
        surface: SurfaceId,
        parent: SurfaceId,
        /// Positioner result, relative to the parent.
        geometry: Rectangle,
    },
    NewLayerSurface {
        client: ClientId,
        surface: SurfaceId,
        #[serde(default)]
        output: Option<String>,
        #[serde(default)]
        layer: Layer,
        #[serde(default)]
        namespace: String,
    },
    LayerCommit {
        surface: SurfaceId,
        #[serde(default)]
        anchor: Anchor,
        #[serde(default)]
        desired_size: Size,
        #[serde(default)]
        exclusive_zone: i32,
    },
    Map {
        surface: SurfaceId,
    },
    Unmap {
        surface: SurfaceId,
    },
    Destroy {
        surface: SurfaceId,
    },
    RequestMove {
        surface: SurfaceId,
    },
    RequestResize {
        surface: SurfaceId,
        edges: ResizeEdge,
    },
    RequestMaximize {
        surface: SurfaceId,
        maximized: bool,
    },
    RequestFullscreen {
        surface: SurfaceId,
        fullscreen: bool,
    },
    SetTitle {
        surface: SurfaceId,
        title: String,
    },
    SetAppId {
        surface: SurfaceId,
        app_id: String,
    },

    Input {
        event: InputEvent,
    },
    CursorImage {
        client: ClientId,
        image: CursorImage,
    },
    SetSelection {
        client: ClientId,
        source: Option<u64>,
        serial: u32,
    },

    ManagerBind {
        client: ClientId,
        manager: ResourceId,
    },
    ManagerDestroyed {
        client: ClientId,
        manager: ResourceId,
    },
    ManagerRequest {
        client: ClientId,
        resource: ResourceId,
        request: ViewRequest,
    },
    ViewResourceDestroyed {
        client: ClientId,
        resource: ResourceId,
    },
    ClientDisconnected {
        client: ClientId,
    },

    SwitchWorkspace {
        #[serde(default)]
        output: Option<String>,
        index: usize,
    },
    ReloadConfig,
    Report,
    Quit,
}

impl Nora {
    /// Runs one backend event to completion.
    pub fn dispatch(&mut self, event: BackendEvent) {
        tracing::trace!(?event, "dispatching backend event");
        match event {
            BackendEvent::OutputAdded { name, geometry } => self.output_added(name, geometry),
            BackendEvent::OutputResized { name, geometry } => self.output_resized(&name, geometry),
            BackendEvent::OutputRemoved { name } => self.output_removed(&name),

            BackendEvent::NewToplevel { client, surface } => self.new_toplevel(client, surface),
            BackendEvent::NewPopup {
                client,
                surface,
                parent,
                geometry,
            } => self.new_popup(client, surface, parent, geometry),
            BackendEvent::NewLayerSurface {
                client,
                surface,
                output,
                layer,
                namespace,
            } => self.new_layer_surface(client, surface, output, layer, namespace),
            BackendEvent::LayerCommit {
                surface,
                anchor,
                desired_size,
                exclusive_zone,
            } => self.layer_commit(
                surface,
                LayerSurfaceState {
                    anchor,
                    desired_size,
                    exclusive_zone,
                },
            ),
            BackendEvent::Map { surface } => self.map(surface),
            BackendEvent::Unmap { surface } => self.unmap(surface),
            BackendEvent::Destroy { surface } => self.destroyed(surface),
            BackendEvent::RequestMove { surface } => self.move_request(surface),
            BackendEvent::RequestResize { surface, edges } => self.resize_request(surface, edges),
            BackendEvent::RequestMaximize { surface, maximized } => {
                self.maximize_request(surface, maximized)
            }
            BackendEvent::RequestFullscreen {
                surface,
                fullscreen,
            } => self.fullscreen_request(surface, fullscreen),
            BackendEvent::SetTitle { surface, title } => self.title_changed(surface, title),
            BackendEvent::SetAppId { surface, app_id } => self.app_id_changed(surface, app_id),

            BackendEvent::Input { event } => self.handle_input_event(event),
            BackendEvent::CursorImage { client, image } => self.cursor_image(client, image),
            BackendEvent::SetSelection {
                client,
                source,
                serial,
            } => self.set_selection(client, source, serial),

            BackendEvent::ManagerBind { client, manager } => {
                self.desktop_manager_state.bind(client, manager)
            }
            BackendEvent::ManagerDestroyed { client, manager } => {
                self.desktop_manager_state.manager_destroyed(client, manager)
            }
            BackendEvent::ManagerRequest {
                client,
                resource,
                request,
            } => DesktopManagerState::request(self, client, resource, request),
            BackendEvent::ViewResourceDestroyed { client, resource } => self
                .desktop_manager_state
                .view_resource_destroyed(client, resource),
            BackendEvent::ClientDisconnected { client } => {
                self.desktop_manager_state.client_disconnected(client)
            }

            BackendEvent::SwitchWorkspace { output, index } => {
                if let Err(err) = self.switch_workspace(output.as_deref(), index) {
                    tracing::warn!("failed to switch workspace: {err}");
                }
            }
            BackendEvent::ReloadConfig => {
                if let Err(err) = self.reload_config() {
                    tracing::warn!("failed to reload config: {err}");
                }
            }
            BackendEvent::Report => {
                let report = self.render_clients_report();
                tracing::info!("clients report:\n{report}");
            }
            BackendEvent::Quit => self.stop(),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn decodes_json_lines() {
        let event: BackendEvent =
            serde_json::from_str(r#"{"type":"output_added","name":"HDMI-A-1","geometry":{"loc":{"x":0,"y":0},"size":{"w":1920,"h":1080}}}"#)
                .unwrap();
        assert_eq!(
            event,
            BackendEvent::OutputAdded {
                name: "HDMI-A-1".to_owned(),
                geometry: Rectangle::new(0, 0, 1920, 1080),
            }
        );

        let event: BackendEvent = serde_json::from_str(
            r#"{"type":"request_resize","surface":4,"edges":"BOTTOM | RIGHT"}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            BackendEvent::RequestResize {
                surface: SurfaceId(4),
                edges: ResizeEdge::BOTTOM_RIGHT,
            }
        );

        let event: BackendEvent = serde_json::from_str(
            r#"{"type":"layer_commit","surface":9,"anchor":"TOP | LEFT | RIGHT","desired_size":{"w":0,"h":30},"exclusive_zone":30}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            BackendEvent::LayerCommit {
                surface: SurfaceId(9),
                anchor: Anchor::TOP | Anchor::LEFT | Anchor::RIGHT,
                desired_size: Size::new(0, 30),
                exclusive_zone: 30,
            }
        );

        let event: BackendEvent = serde_json::from_str(
            r#"{"type":"input","event":{"type":"pointer_button","time":7,"button":272,"state":"pressed"}}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            BackendEvent::Input {
                event: InputEvent::PointerButton {
                    time: 7,
                    button: 272,
                    state: ButtonState::Pressed,
                },
            }
        );
    }

    #[test]
    fn rejects_unknown_event_type() {
        assert!(serde_json::from_str::<BackendEvent>(r#"{"type":"teleport"}"#).is_err());
    }
}
