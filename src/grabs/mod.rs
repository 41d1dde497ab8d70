pub mod move_grab;
pub mod resize_grab;

use crate::utils::{Point, Rectangle};
use crate::view::ViewId;

use move_grab::MoveGrab;
use resize_grab::{ResizeEdge, ResizeSurfaceGrab};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrabMode {
    Passthrough,
    Move,
    Resize,
}

/// The single pointer grab of the seat.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PointerGrab {
    #[default]
    Passthrough,
    Move {
        view: ViewId,
        grab: MoveGrab,
    },
    Resize {
        view: ViewId,
        grab: ResizeSurfaceGrab,
    },
}

impl PointerGrab {
    pub fn mode(&self) -> GrabMode {
        match self {
            PointerGrab::Passthrough => GrabMode::Passthrough,
            PointerGrab::Move { .. } => GrabMode::Move,
            PointerGrab::Resize { .. } => GrabMode::Resize,
        }
    }

    pub fn view(&self) -> Option<ViewId> {
        match self {
            PointerGrab::Passthrough => None,
            PointerGrab::Move { view, .. } | PointerGrab::Resize { view, .. } => Some(*view),
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, PointerGrab::Passthrough)
    }

    pub fn start_move(&mut self, view: ViewId, pointer: Point<f64>, geometry: Rectangle) {
        *self = PointerGrab::Move {
            view,
            grab: MoveGrab::new(pointer, geometry.loc),
        };
    }

    pub fn start_resize(
        &mut self,
        view: ViewId,
        pointer: Point<f64>,
        geometry: Rectangle,
        edges: ResizeEdge,
    ) {
        *self = PointerGrab::Resize {
            view,
            grab: ResizeSurfaceGrab::new(pointer, geometry, edges),
        };
    }

    /// Drops back to passthrough, returning the view that was grabbed.
    pub fn release(&mut self) -> Option<ViewId> {
        let view = self.view();
        *self = PointerGrab::Passthrough;
        view
    }

    /// New geometry of the grabbed view for a pointer at `pointer`.
    pub fn motion(&self, pointer: Point<f64>, current: Rectangle) -> Option<(ViewId, Rectangle)> {
        match self {
            PointerGrab::Passthrough => None,
            PointerGrab::Move { view, grab } => Some((*view, grab.motion(pointer, current))),
            PointerGrab::Resize { view, grab } => Some((*view, grab.motion(pointer))),
        }
    }
}
