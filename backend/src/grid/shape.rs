//! Neighbourhood shapes
//!
//! A shape is the ordered list of relative offsets an agent may move,
//! divide, or be recruited into. Each candidate offset has an anchor: the
//! offset actually returned when the candidate voxel is open.

use crate::core::Coord3D;
use crate::grid::agent_grid::GridError;

/// Ordered candidate offsets with one anchor per candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape {
    offsets: Vec<Coord3D>,
    anchors: Vec<Coord3D>,
}

impl Shape {
    /// Shape whose anchors are its candidates
    pub fn new(offsets: Vec<Coord3D>) -> Self {
        Self {
            anchors: offsets.clone(),
            offsets,
        }
    }

    /// Shape that checks `offsets[i]` and lands on `anchors[i]`
    pub fn with_anchors(offsets: Vec<Coord3D>, anchors: Vec<Coord3D>) -> Result<Self, GridError> {
        if offsets.len() != anchors.len() {
            return Err(GridError::ShapeMismatch {
                candidates: offsets.len(),
                anchors: anchors.len(),
            });
        }
        Ok(Self { offsets, anchors })
    }

    /// Six face neighbours, used for movement
    pub fn von_neumann() -> Self {
        Self::new(vec![
            Coord3D::new(-1, 0, 0),
            Coord3D::new(1, 0, 0),
            Coord3D::new(0, -1, 0),
            Coord3D::new(0, 1, 0),
            Coord3D::new(0, 0, -1),
            Coord3D::new(0, 0, 1),
        ])
    }

    /// All 26 neighbours, centre excluded; used for recruitment and
    /// proliferation
    pub fn moore() -> Self {
        let mut offsets = Vec::with_capacity(26);
        for z in -1..=1 {
            for y in -1..=1 {
                for x in -1..=1 {
                    let c = Coord3D::new(x, y, z);
                    if !c.is_origin() {
                        offsets.push(c);
                    }
                }
            }
        }
        Self::new(offsets)
    }

    pub fn offsets(&self) -> &[Coord3D] {
        &self.offsets
    }

    pub fn anchors(&self) -> &[Coord3D] {
        &self.anchors
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Absolute coordinates of the shape around `origin`
    pub fn around(&self, origin: Coord3D) -> impl Iterator<Item = Coord3D> + '_ {
        self.offsets.iter().map(move |&o| origin + o)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moore_excludes_centre() {
        let shape = Shape::moore();
        assert_eq!(shape.len(), 26);
        assert!(shape.offsets().iter().all(|o| !o.is_origin()));
        assert!(shape.offsets().iter().all(|o| o.chebyshev(&Coord3D::ORIGIN) == 1));
    }

    #[test]
    fn test_anchor_count_must_match() {
        let err = Shape::with_anchors(vec![Coord3D::new(1, 0, 0)], vec![]).unwrap_err();
        assert_eq!(
            err,
            GridError::ShapeMismatch {
                candidates: 1,
                anchors: 0
            }
        );
        assert_eq!(Shape::moore().anchors(), Shape::moore().offsets());
    }

    #[test]
    fn test_von_neumann_faces_only() {
        let shape = Shape::von_neumann();
        assert_eq!(shape.len(), 6);
        for o in shape.offsets() {
            assert_eq!(o.x.abs() + o.y.abs() + o.z.abs(), 1);
        }
    }
}
