use crate::scene::GroupId;

pub mod camera;

/// One recorded obstacle crossing: which group, and the refined distance
/// along the beam.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeamHit {
    pub group: GroupId,
    pub distance: f32,
}

/// The trace of a single beam. Hits are ordered far-to-near, the order a
/// compositor layers them back-to-front; `end` sits at the farthest hit, or
/// where marching stopped when nothing was struck.
#[derive(Debug, Clone, PartialEq)]
pub struct Beam {
    pub index: usize,
    pub hits: Vec<BeamHit>,
    pub end: glam::Vec2,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderFrame(pub Vec<Beam>);

#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    /// Coarse marching granularity, in world units.
    pub step_size: f32,
    pub max_range: f32,
    /// Refinement stops once the bisection step falls below this.
    pub detail_threshold: f32,
    /// Broad-phase cell size, used when a pass builds its own snapshot.
    pub cell_size: f32,
    /// Restricts sensing to these groups; `None` means every colored group.
    pub subset: Option<Vec<GroupId>>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            step_size: 1.,
            max_range: 100.,
            detail_threshold: 1.,
            cell_size: 100.,
            subset: None,
        }
    }
}
