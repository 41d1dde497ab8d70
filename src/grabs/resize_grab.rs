use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::utils::{Point, Rectangle};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ResizeEdge: u32 {
        const TOP = 1;
        const BOTTOM = 2;
        const LEFT = 4;
        const RIGHT = 8;

        const TOP_LEFT = Self::TOP.bits() | Self::LEFT.bits();
        const BOTTOM_LEFT = Self::BOTTOM.bits() | Self::LEFT.bits();
        const TOP_RIGHT = Self::TOP.bits() | Self::RIGHT.bits();
        const BOTTOM_RIGHT = Self::BOTTOM.bits() | Self::RIGHT.bits();
    }
}

/// Interactive resize from one edge or corner.
///
/// The opposite edges stay pinned to where they were at grab start. The
/// dragged edges follow the pointer but never cross their opposite, so the
/// view is always at least one pixel wide and tall.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeSurfaceGrab {
    edges: ResizeEdge,
    initial: Rectangle,
    offset: Point<f64>,
}

impl ResizeSurfaceGrab {
    pub fn new(pointer: Point<f64>, initial: Rectangle, edges: ResizeEdge) -> Self {
        let border_x = initial.loc.x
            + if edges.contains(ResizeEdge::RIGHT) {
                initial.size.w
            } else {
                0
            };
        let border_y = initial.loc.y
            + if edges.contains(ResizeEdge::BOTTOM) {
                initial.size.h
            } else {
                0
            };

        Self {
            edges,
            initial,
            offset: pointer - Point::new(border_x, border_y).to_f64(),
        }
    }

    pub fn motion(&self, pointer: Point<f64>) -> Rectangle {
        let border = (pointer - self.offset).to_i32_round();

        let mut left = self.initial.loc.x;
        let mut right = self.initial.right();
        let mut top = self.initial.loc.y;
        let mut bottom = self.initial.bottom();

        if self.edges.contains(ResizeEdge::TOP) {
            top = border.y.min(bottom - 1);
        } else if self.edges.contains(ResizeEdge::BOTTOM) {
            bottom = border.y.max(top + 1);
        }

        if self.edges.contains(ResizeEdge::LEFT) {
            left = border.x.min(right - 1);
        } else if self.edges.contains(ResizeEdge::RIGHT) {
            right = border.x.max(left + 1);
        }

        Rectangle::new(left, top, right - left, bottom - top)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const START: Rectangle = Rectangle::new(100, 100, 400, 300);

    #[test]
    fn right_edge_follows_pointer() {
        let grab = ResizeSurfaceGrab::new(Point::new(498.0, 250.0), START, ResizeEdge::RIGHT);

        assert_eq!(grab.motion(Point::new(598.0, 400.0)), Rectangle::new(100, 100, 500, 300));
    }

    #[test]
    fn dragging_right_edge_past_left_keeps_one_pixel() {
        let grab = ResizeSurfaceGrab::new(Point::new(500.0, 250.0), START, ResizeEdge::RIGHT);

        for x in [100.0, 99.0, 0.0, -5000.0] {
            let geometry = grab.motion(Point::new(x, 250.0));
            assert!(geometry.size.w >= 1);
            assert_eq!(geometry.loc.x, 100);
        }
        assert_eq!(grab.motion(Point::new(-20.0, 250.0)), Rectangle::new(100, 100, 1, 300));
    }

    #[test]
    fn top_left_corner_moves_origin() {
        let grab = ResizeSurfaceGrab::new(Point::new(105.0, 103.0), START, ResizeEdge::TOP_LEFT);

        assert_eq!(grab.motion(Point::new(55.0, 83.0)), Rectangle::new(50, 80, 450, 320));
        assert_eq!(grab.motion(Point::new(900.0, 900.0)), Rectangle::new(499, 399, 1, 1));
    }

    #[test]
    fn bottom_edge_clamps_against_top() {
        let grab = ResizeSurfaceGrab::new(Point::new(300.0, 400.0), START, ResizeEdge::BOTTOM);

        assert_eq!(grab.motion(Point::new(300.0, 450.0)), Rectangle::new(100, 100, 400, 350));
        assert_eq!(grab.motion(Point::new(300.0, 10.0)), Rectangle::new(100, 100, 400, 1));
    }
}
