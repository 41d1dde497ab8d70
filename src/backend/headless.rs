//! Display-less backend used by the shipped binary.
//!
//! Events arrive as JSON lines on stdin, desktop management traffic leaves as
//! JSON lines on stdout and surface commands are applied to a small in-memory
//! scene so hit-testing behaves like it would on screen.

use std::{
    io::{self, BufRead, Write},
    thread,
};

use calloop::{LoopHandle, channel};
use serde::Serialize;

use crate::{
    CompositorError, Nora,
    backend::{
        AxisFrame, Backend, BackendEvent, ButtonState, CursorImage, KeyState, Modifiers,
        SceneGraph, SeatCapabilities, SurfaceHit,
    },
    protocols::desktop_manager::{ManagerEvent, ManagerTransport, ResourceId},
    utils::{ClientId, Point, Rectangle, Size, SurfaceId},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SceneSurface {
    surface: SurfaceId,
    geometry: Rectangle,
    visible: bool,
}

/// Stacking-ordered surfaces, bottom first.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    stack: Vec<SceneSurface>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, surface: SurfaceId) -> &mut SceneSurface {
        let index = match self.stack.iter().position(|entry| entry.surface == surface) {
            Some(index) => index,
            None => {
                self.stack.push(SceneSurface {
                    surface,
                    geometry: Rectangle::default(),
                    visible: false,
                });
                self.stack.len() - 1
            }
        };
        &mut self.stack[index]
    }
}

impl SceneGraph for HeadlessBackend {
    fn surface_at(&self, point: Point<f64>) -> Option<SurfaceHit> {
        self.stack
            .iter()
            .rev()
            .find(|entry| entry.visible && entry.geometry.contains(point))
            .map(|entry| SurfaceHit {
                surface: entry.surface,
                local: point - entry.geometry.loc.to_f64(),
            })
    }

    fn parent_surface(&self, _surface: SurfaceId) -> Option<SurfaceId> {
        None
    }
}

impl Backend for HeadlessBackend {
    fn scene(&self) -> &dyn SceneGraph {
        self
    }

    fn configure(&mut self, surface: SurfaceId, size: Size) {
        tracing::debug!(%surface, w = size.w, h = size.h, "configure");
        self.entry(surface).geometry.size = size;
    }

    fn set_position(&mut self, surface: SurfaceId, location: Point) {
        tracing::trace!(%surface, x = location.x, y = location.y, "set position");
        self.entry(surface).geometry.loc = location;
    }

    fn set_visible(&mut self, surface: SurfaceId, visible: bool) {
        tracing::trace!(%surface, visible, "set visible");
        self.entry(surface).visible = visible;
    }

    fn set_activated(&mut self, surface: SurfaceId, activated: bool) {
        tracing::debug!(%surface, activated, "set activated");
    }

    fn raise_to_top(&mut self, surface: SurfaceId) {
        if let Some(index) = self.stack.iter().position(|entry| entry.surface == surface) {
            let entry = self.stack.remove(index);
            self.stack.push(entry);
        }
    }

    fn destroy_surface(&mut self, surface: SurfaceId) {
        tracing::trace!(%surface, "surface destroyed");
        self.stack.retain(|entry| entry.surface != surface);
    }

    fn keyboard_enter(&mut self, surface: Option<SurfaceId>) {
        tracing::debug!(?surface, "keyboard enter");
    }

    fn keyboard_key(&mut self, time: u32, keycode: u32, state: KeyState) {
        tracing::trace!(time, keycode, ?state, "key");
    }

    fn keyboard_modifiers(&mut self, modifiers: Modifiers) {
        tracing::trace!(?modifiers, "modifiers");
    }

    fn pointer_enter(&mut self, surface: SurfaceId, local: Point<f64>) {
        tracing::trace!(%surface, x = local.x, y = local.y, "pointer enter");
    }

    fn pointer_motion(&mut self, time: u32, local: Point<f64>) {
        tracing::trace!(time, x = local.x, y = local.y, "pointer motion");
    }

    fn pointer_clear_focus(&mut self) {
        tracing::trace!("pointer focus cleared");
    }

    fn pointer_button(&mut self, time: u32, button: u32, state: ButtonState) {
        tracing::trace!(time, button, ?state, "pointer button");
    }

    fn pointer_axis(&mut self, frame: AxisFrame) {
        tracing::trace!(?frame, "pointer axis");
    }

    fn pointer_frame(&mut self) {}

    fn set_capabilities(&mut self, capabilities: SeatCapabilities) {
        tracing::debug!(?capabilities, "seat capabilities");
    }

    fn set_cursor_image(&mut self, image: CursorImage) {
        tracing::trace!(?image, "cursor image");
    }

    fn set_selection(&mut self, source: Option<u64>, serial: u32) {
        tracing::debug!(?source, serial, "selection");
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Outbound<'a> {
    Event {
        resource: ResourceId,
        message: &'a ManagerEvent,
    },
    NoMemory {
        client: ClientId,
    },
    Release {
        resource: ResourceId,
    },
}

/// Writes desktop management traffic as JSON lines.
pub struct HeadlessTransport<W: Write> {
    writer: W,
    next_id: u64,
}

impl<W: Write> HeadlessTransport<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            next_id: 1,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write(&mut self, message: &Outbound<'_>) {
        let result = serde_json::to_writer(&mut self.writer, message)
            .map_err(io::Error::from)
            .and_then(|()| self.writer.write_all(b"\n"))
            .and_then(|()| self.writer.flush());
        if let Err(err) = result {
            tracing::warn!("failed to write management event: {err}");
        }
    }
}

impl<W: Write> ManagerTransport for HeadlessTransport<W> {
    fn create_view_resource(
        &mut self,
        _client: ClientId,
        _manager: ResourceId,
    ) -> Option<ResourceId> {
        let id = ResourceId(self.next_id);
        self.next_id += 1;
        Some(id)
    }

    fn send(&mut self, resource: ResourceId, event: ManagerEvent) {
        self.write(&Outbound::Event {
            resource,
            message: &event,
        });
    }

    fn post_no_memory(&mut self, client: ClientId) {
        self.write(&Outbound::NoMemory { client });
    }

    fn release(&mut self, resource: ResourceId) {
        self.write(&Outbound::Release { resource });
    }
}

/// Feeds every well formed line of `reader` to `sink` until it refuses one.
/// Blank lines and `#` comments are skipped, malformed lines are logged.
pub fn read_events(reader: impl BufRead, mut sink: impl FnMut(BackendEvent) -> bool) {
    for (index, line) in reader.lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                tracing::warn!("failed to read event stream: {err}");
                return;
            }
        };
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match serde_json::from_str::<BackendEvent>(line) {
            Ok(event) => {
                if !sink(event) {
                    return;
                }
            }
            Err(err) => tracing::warn!(line = index + 1, "ignoring malformed event: {err}"),
        }
    }
}

/// Wires stdin into the event loop. The loop stops once stdin is closed.
pub fn init_headless(handle: &LoopHandle<'static, Nora>) -> Result<(), CompositorError> {
    let (sender, events) = channel::channel::<BackendEvent>();

    handle
        .insert_source(events, |event, _, state| match event {
            channel::Event::Msg(event) => state.dispatch(event),
            channel::Event::Closed => {
                tracing::info!("event stream closed");
                state.stop();
            }
        })
        .map_err(|err| {
            CompositorError::EventLoop(format!("failed to insert event channel: {err}"))
        })?;

    thread::Builder::new()
        .name("nora-stdin".to_owned())
        .spawn(move || read_events(io::stdin().lock(), |event| sender.send(event).is_ok()))?;

    tracing::info!("headless backend reading events from stdin");
    Ok(())
}
