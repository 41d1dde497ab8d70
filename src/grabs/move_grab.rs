use crate::utils::{Point, Rectangle};

/// Interactive move: the view follows the pointer at a fixed offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveGrab {
    offset: Point<f64>,
}

impl MoveGrab {
    pub fn new(pointer: Point<f64>, view_location: Point) -> Self {
        Self {
            offset: pointer - view_location.to_f64(),
        }
    }

    pub fn offset(&self) -> Point<f64> {
        self.offset
    }

    pub fn motion(&self, pointer: Point<f64>, current: Rectangle) -> Rectangle {
        let loc = (pointer - self.offset).to_i32_round();
        Rectangle::from_parts(loc, current.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_grab_offset_while_moving() {
        let grab = MoveGrab::new(Point::new(110.0, 70.0), Point::new(100, 50));
        assert_eq!(grab.offset(), Point::new(10.0, 20.0));

        let geometry = grab.motion(Point::new(510.0, 320.0), Rectangle::new(100, 50, 640, 480));
        assert_eq!(geometry, Rectangle::new(500, 300, 640, 480));

        let geometry = grab.motion(Point::new(0.0, 0.0), geometry);
        assert_eq!(geometry, Rectangle::new(-10, -20, 640, 480));
    }
}
