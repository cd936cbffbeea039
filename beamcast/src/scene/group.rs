use crate::{math::Bounds, shape::Shape};

/// An aggregate of shapes sharing one anchor; the unit the sensing engine
/// reasons about. Shapes are translated by the anchor when the group takes
/// ownership of them and are immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    anchor: glam::Vec2,
    shapes: Vec<Shape>,
}

impl Group {
    pub fn new(anchor: glam::Vec2, shapes: impl IntoIterator<Item = Shape>) -> Group {
        let shapes = shapes
            .into_iter()
            .map(|mut shape| {
                shape.translate(anchor);
                shape
            })
            .collect();

        Group { anchor, shapes }
    }

    #[inline]
    pub fn anchor(&self) -> glam::Vec2 {
        self.anchor
    }

    /// Member shapes in insertion order.
    #[inline]
    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    #[inline]
    pub fn collides(&self, point: glam::Vec2) -> bool {
        self.shapes.iter().any(|shape| shape.collides(point))
    }

    /// Union of the member bounds, recomputed on demand. `None` for a group
    /// with no shapes: an empty group has no extent, and must never report a
    /// box around the origin.
    pub fn bounds(&self) -> Option<Bounds> {
        self.shapes
            .iter()
            .map(Shape::bounds)
            .reduce(|a, b| a.union(&b))
    }
}
