//! Typed handler traits for surface role events.
//!
//! The backend decodes protocol traffic and calls exactly one method per
//! event; the compositor state implements these in `handlers`.

use serde::{Deserialize, Serialize};

use crate::backend::CursorImage;
use crate::grabs::resize_grab::ResizeEdge;
use crate::utils::{ClientId, Rectangle, Size, SurfaceId};
use crate::view::{Anchor, Layer};

/// Double-buffered layer surface state, as of the latest commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LayerSurfaceState {
    pub anchor: Anchor,
    pub desired_size: Size,
    pub exclusive_zone: i32,
}

/// Lifecycle events shared by every surface role.
pub trait CompositorHandler {
    fn map(&mut self, surface: SurfaceId);
    fn unmap(&mut self, surface: SurfaceId);
    fn destroyed(&mut self, surface: SurfaceId);
}

pub trait XdgShellHandler {
    fn new_toplevel(&mut self, client: ClientId, surface: SurfaceId);
    fn new_popup(
        &mut self,
        client: ClientId,
        surface: SurfaceId,
        parent: SurfaceId,
        geometry: Rectangle,
    );
    fn move_request(&mut self, surface: SurfaceId);
    fn resize_request(&mut self, surface: SurfaceId, edges: ResizeEdge);
    fn maximize_request(&mut self, surface: SurfaceId, maximized: bool);
    fn fullscreen_request(&mut self, surface: SurfaceId, fullscreen: bool);
    fn title_changed(&mut self, surface: SurfaceId, title: String);
    fn app_id_changed(&mut self, surface: SurfaceId, app_id: String);
}

pub trait LayerShellHandler {
    fn new_layer_surface(
        &mut self,
        client: ClientId,
        surface: SurfaceId,
        output: Option<String>,
        layer: Layer,
        namespace: String,
    );
    fn layer_commit(&mut self, surface: SurfaceId, state: LayerSurfaceState);
}

pub trait SeatHandler {
    fn cursor_image(&mut self, client: ClientId, image: CursorImage);
    fn set_selection(&mut self, client: ClientId, source: Option<u64>, serial: u32);
}

pub trait OutputHandler {
    fn output_added(&mut self, name: String, geometry: Rectangle);
    fn output_resized(&mut self, name: &str, geometry: Rectangle);
    fn output_removed(&mut self, name: &str);
}
