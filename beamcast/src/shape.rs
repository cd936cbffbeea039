use crate::math::Bounds;

/// A collision primitive. Angles are in degrees and stored as given, never
/// normalized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Circle {
        center: glam::Vec2,
        radius: f32,
    },
    Rectangle {
        center: glam::Vec2,
        half_extents: glam::Vec2,
        angle: f32,
    },
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum ShapeError {
    #[error("Invalid Radius: expected a positive radius, got {0}")]
    InvalidRadius(f32),
    #[error("Invalid Half-Extents: expected positive half-extents, got ({0}, {1})")]
    InvalidHalfExtents(f32, f32),
}

impl Shape {
    pub fn circle(center: glam::Vec2, radius: f32) -> Result<Shape, ShapeError> {
        if !(radius > 0.) {
            return Err(ShapeError::InvalidRadius(radius));
        }

        Ok(Shape::Circle { center, radius })
    }

    pub fn rectangle(
        center: glam::Vec2,
        half_extents: glam::Vec2,
        angle: f32,
    ) -> Result<Shape, ShapeError> {
        if !half_extents.cmpgt(glam::Vec2::ZERO).all() {
            return Err(ShapeError::InvalidHalfExtents(
                half_extents.x,
                half_extents.y,
            ));
        }

        Ok(Shape::Rectangle {
            center,
            half_extents,
            angle,
        })
    }

    /// Closed comparisons throughout, so boundary points count as inside.
    #[inline]
    pub fn collides(&self, point: glam::Vec2) -> bool {
        match *self {
            Shape::Circle { center, radius } => {
                point.distance_squared(center) <= radius * radius
            }
            Shape::Rectangle {
                center,
                half_extents,
                angle,
            } => {
                // Translate into the local frame first, then undo the
                // rotation. The other order is wrong for off-origin shapes.
                let local = glam::Vec2::from_angle(-angle.to_radians()).rotate(point - center);

                local.abs().cmple(half_extents).all()
            }
        }
    }

    pub fn bounds(&self) -> Bounds {
        match *self {
            Shape::Circle { center, radius } => Bounds {
                min: center - radius,
                max: center + radius,
            },
            Shape::Rectangle {
                center,
                half_extents,
                angle,
            } => {
                let [first, rest @ ..] = rectangle_corners(center, half_extents, angle);

                rest.iter().fold(
                    Bounds {
                        min: first,
                        max: first,
                    },
                    |bounds, &corner| Bounds {
                        min: bounds.min.min(corner),
                        max: bounds.max.max(corner),
                    },
                )
            }
        }
    }

    /// Applied exactly once, when a group absorbs the shape.
    pub(crate) fn translate(&mut self, offset: glam::Vec2) {
        match self {
            Shape::Circle { center, .. } => *center += offset,
            Shape::Rectangle { center, .. } => *center += offset,
        }
    }
}

/// World-space corners in winding order: bottom-left, bottom-right,
/// top-right, top-left.
fn rectangle_corners(
    center: glam::Vec2,
    half_extents: glam::Vec2,
    angle: f32,
) -> [glam::Vec2; 4] {
    let rotation = glam::Vec2::from_angle(angle.to_radians());

    [
        glam::vec2(-half_extents.x, -half_extents.y),
        glam::vec2(half_extents.x, -half_extents.y),
        glam::vec2(half_extents.x, half_extents.y),
        glam::vec2(-half_extents.x, half_extents.y),
    ]
    .map(|corner| center + rotation.rotate(corner))
}
