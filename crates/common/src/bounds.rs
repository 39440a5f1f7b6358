use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Axis-aligned box given by its min and max corners.
///
/// `contains` is inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Box of half-extent `half` centered on `center`.
    pub fn around(center: Vec3, half: Vec3) -> Self {
        Self {
            min: center - half,
            max: center + half,
        }
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    /// Overlapping region. Not valid when the boxes are disjoint.
    pub fn intersect(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox::new(self.min.max(other.min), self.max.min(other.max))
    }

    /// Smallest box enclosing both.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox::new(self.min.min(other.min), self.max.max(other.max))
    }

    /// max >= min on every axis.
    pub fn is_valid(&self) -> bool {
        self.max.cmpge(self.min).all()
    }

    /// Clamp each axis of `point` into `[min, max]`.
    pub fn clamp(&self, point: Vec3) -> Vec3 {
        point.clamp(self.min, self.max)
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({})({})", self.min, self.max)
    }
}
