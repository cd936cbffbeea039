use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::{
    grid::{GridError, SpatialGrid},
    shape::Shape,
};

pub mod group;
pub mod render_loop;

pub use group::Group;

/// Stable identity of a group: assigned at insertion, monotonic, never
/// reused or reassigned.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct GroupId(u64);

impl GroupId {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Rgba {
        Rgba { r, g, b, a }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SceneError {
    #[error("Unknown Group: {0:?} is outside the registry of {1} groups")]
    UnknownGroup(GroupId, usize),
    #[error(transparent)]
    Grid(#[from] GridError),
}

/// The scene context: an arena of groups plus their colors, owned by the
/// caller and passed by reference into the engine. Groups without a color
/// are invisible to sensing.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    groups: Vec<Group>,
    colors: FxHashMap<GroupId, Rgba>,
}

impl Scene {
    pub fn add_group(&mut self, group: Group) -> GroupId {
        let id = GroupId(self.groups.len() as u64);
        self.groups.push(group);

        id
    }

    pub fn add_colored_group(
        &mut self,
        anchor: glam::Vec2,
        color: Rgba,
        shapes: impl IntoIterator<Item = Shape>,
    ) -> GroupId {
        let id = self.add_group(Group::new(anchor, shapes));
        self.colors.insert(id, color);

        id
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn groups(&self) -> impl Iterator<Item = (GroupId, &Group)> {
        self.groups
            .iter()
            .enumerate()
            .map(|(index, group)| (GroupId(index as u64), group))
    }

    pub fn group(&self, id: GroupId) -> Result<&Group, SceneError> {
        self.check(id)?;

        Ok(&self.groups[id.index()])
    }

    pub fn color_group(&mut self, id: GroupId, color: Rgba) -> Result<(), SceneError> {
        self.check(id)?;
        self.colors.insert(id, color);

        Ok(())
    }

    /// Clearing the color of a valid but uncolored group is a no-op.
    pub fn uncolor_group(&mut self, id: GroupId) -> Result<(), SceneError> {
        self.check(id)?;
        self.colors.remove(&id);

        Ok(())
    }

    pub fn color(&self, id: GroupId) -> Result<Option<Rgba>, SceneError> {
        self.check(id)?;

        Ok(self.colors.get(&id).copied())
    }

    /// Ids of groups with no assigned color, ascending.
    pub fn uncolored(&self) -> Vec<GroupId> {
        (0..self.groups.len() as u64)
            .map(GroupId)
            .filter(|id| !self.colors.contains_key(id))
            .collect()
    }

    /// Freezes the scene for one or more render passes: groups and colors go
    /// behind shared ownership and the broad-phase grid is built once, from
    /// the colored groups that have an extent. The snapshot is never mutated
    /// afterwards.
    pub fn snapshot(&self, cell_size: f32) -> Result<SceneSnapshot, SceneError> {
        let mut grid = SpatialGrid::new(cell_size)?;

        for (id, group) in self.groups() {
            if !self.colors.contains_key(&id) {
                continue;
            }

            if let Some(bounds) = group.bounds() {
                grid.insert(id, bounds);
            }
        }

        log::debug!(
            "Snapshotting {} groups ({} colored)",
            self.groups.len(),
            self.colors.len()
        );

        Ok(SceneSnapshot {
            groups: Arc::new(self.groups.clone()),
            colors: Arc::new(self.colors.clone()),
            grid: Arc::new(grid),
        })
    }

    #[inline]
    fn check(&self, id: GroupId) -> Result<(), SceneError> {
        if id.index() < self.groups.len() {
            Ok(())
        } else {
            Err(SceneError::UnknownGroup(id, self.groups.len()))
        }
    }
}

/// A read-only view of the scene shared by concurrent render passes.
#[derive(Debug, Clone)]
pub struct SceneSnapshot {
    pub groups: Arc<Vec<Group>>,
    pub colors: Arc<FxHashMap<GroupId, Rgba>>,
    pub grid: Arc<SpatialGrid>,
}
