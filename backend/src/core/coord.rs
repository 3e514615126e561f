//! Integer lattice coordinates
//!
//! Voxel positions and relative offsets share one type. Arithmetic is
//! component-wise; division truncates toward zero like integer division,
//! which the re-centering rule relies on for its center-of-mass estimate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Div, Neg, Sub};

/// A 3-D integer coordinate (or offset) on the voxel lattice
///
/// # Example
/// ```
/// use spqsp_abm_core::Coord3D;
///
/// let a = Coord3D::new(1, 2, 3);
/// let b = Coord3D::new(0, 0, 1);
/// assert_eq!(a - b, Coord3D::new(1, 2, 2));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Coord3D {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Coord3D {
    pub const ORIGIN: Coord3D = Coord3D { x: 0, y: 0, z: 0 };

    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Offset containing only a z component
    pub const fn z_only(z: i32) -> Self {
        Self { x: 0, y: 0, z }
    }

    pub fn is_origin(&self) -> bool {
        *self == Self::ORIGIN
    }

    /// Chebyshev (chessboard) distance, used for neighbourhood tests
    pub fn chebyshev(&self, other: &Coord3D) -> i32 {
        (self.x - other.x)
            .abs()
            .max((self.y - other.y).abs())
            .max((self.z - other.z).abs())
    }
}

impl Add for Coord3D {
    type Output = Coord3D;

    fn add(self, rhs: Coord3D) -> Coord3D {
        Coord3D::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Coord3D {
    type Output = Coord3D;

    fn sub(self, rhs: Coord3D) -> Coord3D {
        Coord3D::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Neg for Coord3D {
    type Output = Coord3D;

    fn neg(self) -> Coord3D {
        Coord3D::new(-self.x, -self.y, -self.z)
    }
}

impl Div<i32> for Coord3D {
    type Output = Coord3D;

    fn div(self, rhs: i32) -> Coord3D {
        Coord3D::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

impl fmt::Display for Coord3D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}
