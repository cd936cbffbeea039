#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: glam::Vec2,
    pub max: glam::Vec2,
}

impl Bounds {
    #[inline]
    pub fn size(&self) -> glam::Vec2 {
        self.max - self.min
    }

    #[inline]
    pub fn contains(&self, point: glam::Vec2) -> bool {
        (point.cmple(self.max) & point.cmpge(self.min)).all()
    }

    #[inline]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}
