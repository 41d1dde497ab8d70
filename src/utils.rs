use std::fmt;
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

/// Identifier the backend assigns to a client surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SurfaceId(pub u64);

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface#{}", self.0)
    }
}

/// Identifier of a connected protocol client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point<N = i32> {
    pub x: N,
    pub y: N,
}

impl<N> Point<N> {
    pub const fn new(x: N, y: N) -> Self {
        Self { x, y }
    }
}

impl Point<i32> {
    pub fn to_f64(self) -> Point<f64> {
        Point::new(f64::from(self.x), f64::from(self.y))
    }
}

impl Point<f64> {
    pub fn to_i32_round(self) -> Point<i32> {
        Point::new(self.x.round() as i32, self.y.round() as i32)
    }
}

impl Eq for Point<i32> {}

impl<N: Add<Output = N>> Add for Point<N> {
    type Output = Point<N>;

    fn add(self, rhs: Self) -> Self::Output {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl<N: Sub<Output = N>> Sub for Point<N> {
    type Output = Point<N>;

    fn sub(self, rhs: Self) -> Self::Output {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Size {
    pub w: i32,
    pub h: i32,
}

impl Size {
    pub const fn new(w: i32, h: i32) -> Self {
        Self { w, h }
    }

    pub fn is_empty(&self) -> bool {
        self.w <= 0 || self.h <= 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rectangle {
    pub loc: Point,
    pub size: Size,
}

impl Rectangle {
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self {
            loc: Point::new(x, y),
            size: Size::new(w, h),
        }
    }

    pub const fn from_parts(loc: Point, size: Size) -> Self {
        Self { loc, size }
    }

    pub fn contains(&self, point: Point<f64>) -> bool {
        let x = f64::from(self.loc.x);
        let y = f64::from(self.loc.y);
        point.x >= x
            && point.y >= y
            && point.x < x + f64::from(self.size.w)
            && point.y < y + f64::from(self.size.h)
    }

    pub fn right(&self) -> i32 {
        self.loc.x + self.size.w
    }

    pub fn bottom(&self) -> i32 {
        self.loc.y + self.size.h
    }
}

impl fmt::Display for Rectangle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}+{}+{}",
            self.size.w, self.size.h, self.loc.x, self.loc.y
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_is_half_open() {
        let rect = Rectangle::new(10, 10, 100, 50);
        assert!(rect.contains(Point::new(10.0, 10.0)));
        assert!(rect.contains(Point::new(109.5, 59.9)));
        assert!(!rect.contains(Point::new(110.0, 30.0)));
        assert!(!rect.contains(Point::new(50.0, 60.0)));
        assert!(!rect.contains(Point::new(9.9, 30.0)));
    }

    #[test]
    fn display_matches_geometry_notation() {
        assert_eq!(Rectangle::new(972, 12, 948, 1056).to_string(), "948x1056+972+12");
    }
}
