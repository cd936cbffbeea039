use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::{
    scene::{Group, GroupId, Scene, SceneError, SceneSnapshot},
    sensors::{Beam, BeamHit, RenderConfig, RenderFrame},
};

/// Alpha budget at which a beam can no longer see through what it has hit.
const OPAQUE: u32 = u8::MAX as u32;

/// Casts a fan of beams across a field of view from a pose. Pose fields are
/// plain data and may be mutated freely between passes; a render pass reads
/// them once and holds no state of its own.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: glam::Vec2,
    /// Heading in degrees.
    pub heading: f32,
    /// Field of view in degrees.
    pub fov: f32,
    /// Pixel count across the field of view, at least 2.
    pub resolution: usize,
}

#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("Invalid Resolution: need at least 2 beams to span a field of view, got {0}")]
    InvalidResolution(usize),
    #[error("Invalid Step Size: marching with step {0} would never terminate")]
    InvalidStepSize(f32),
    #[error("Invalid Max Range: expected a positive range, got {0}")]
    InvalidMaxRange(f32),
    #[error("Invalid Detail Threshold: refining below {0} would never terminate")]
    InvalidDetailThreshold(f32),
    #[error("Unknown Group: render subset names {0:?}, which is not in the scene")]
    UnknownGroup(GroupId),
    #[error(transparent)]
    Scene(#[from] SceneError),
}

impl Camera {
    pub fn new(
        position: glam::Vec2,
        heading: f32,
        fov: f32,
        resolution: usize,
    ) -> Result<Camera, RenderError> {
        if resolution < 2 {
            return Err(RenderError::InvalidResolution(resolution));
        }

        Ok(Camera {
            position,
            heading,
            fov,
            resolution,
        })
    }

    /// Global beam directions in degrees: `resolution` angles evenly spaced
    /// across the field of view, with both endpoints produced exactly.
    pub fn beam_angles(&self) -> Result<Vec<f32>, RenderError> {
        if self.resolution < 2 {
            return Err(RenderError::InvalidResolution(self.resolution));
        }

        Ok((0..self.resolution)
            .map(|i| {
                let t = i as f32 / (self.resolution - 1) as f32;

                self.heading + self.fov * (t - 0.5)
            })
            .collect())
    }

    /// Moves relative to the heading: `forward` along it, `strafe`
    /// perpendicular to it.
    pub fn advance(&mut self, forward: f32, strafe: f32) {
        let direction = glam::Vec2::from_angle(self.heading.to_radians());

        self.position += direction * forward + direction.perp() * strafe;
    }

    pub fn turn(&mut self, degrees: f32) {
        self.heading += degrees;
    }

    /// Single-pass convenience: freezes the scene and renders from it.
    pub fn render(&self, scene: &Scene, config: &RenderConfig) -> Result<RenderFrame, RenderError> {
        let snapshot = scene.snapshot(config.cell_size)?;

        self.render_snapshot(&snapshot, config)
    }

    /// One full render pass over a frozen scene. Beams are traced
    /// independently and in parallel; the scene is only ever read.
    pub fn render_snapshot(
        &self,
        snapshot: &SceneSnapshot,
        config: &RenderConfig,
    ) -> Result<RenderFrame, RenderError> {
        validate(config)?;

        let active = active_alphas(snapshot, config)?;
        let angles = self.beam_angles()?;

        log::info!("Rendering {} beams", angles.len());
        let start = std::time::Instant::now();

        let beams = angles
            .par_iter()
            .enumerate()
            .map(|(index, &angle)| self.trace(index, angle, snapshot, &active, config))
            .collect();

        log::info!("Render pass took {} ms", start.elapsed().as_millis());

        Ok(RenderFrame(beams))
    }

    fn trace(
        &self,
        index: usize,
        angle: f32,
        snapshot: &SceneSnapshot,
        active: &FxHashMap<GroupId, u8>,
        config: &RenderConfig,
    ) -> Beam {
        let direction = glam::Vec2::from_angle(angle.to_radians());

        let mut hits: Vec<BeamHit> = Vec::new();
        let mut opacity = 0u32;
        let mut distance = 0.;
        let mut point = self.position;

        while distance <= config.max_range && opacity < OPAQUE {
            point = self.position + direction * distance;

            for &id in snapshot.grid.query(point) {
                let Some(&alpha) = active.get(&id) else {
                    continue;
                };
                if hits.iter().any(|hit| hit.group == id) {
                    continue;
                }

                if snapshot.groups[id.index()].collides(point) {
                    let refined = self.refine(
                        &snapshot.groups[id.index()],
                        direction,
                        distance,
                        config.step_size,
                        config.detail_threshold,
                    );

                    hits.push(BeamHit {
                        group: id,
                        distance: refined,
                    });
                    // Raw sum, unclamped; it only gates loop continuation.
                    opacity += u32::from(alpha);
                }
            }

            distance += config.step_size;
        }

        // The last hit recorded is the farthest out; it anchors the beam end.
        let end = match hits.last() {
            Some(hit) => self.position + direction * hit.distance,
            None => point,
        };

        // Far-to-near, the order a compositor layers them back-to-front.
        hits.reverse();

        Beam { index, hits, end }
    }

    /// Narrows a coarse hit by bisection: test the midpoint of the step that
    /// produced the hit, keep whichever half still collides, halve the step.
    /// Converges to within `threshold` of the boundary crossing without
    /// shrinking the coarse step globally.
    fn refine(
        &self,
        group: &Group,
        direction: glam::Vec2,
        mut distance: f32,
        mut step: f32,
        threshold: f32,
    ) -> f32 {
        while step >= threshold && distance - step / 2. >= threshold {
            let midpoint = self.position + direction * (distance - step / 2.);

            if group.collides(midpoint) {
                distance -= step / 2.;
            }
            step /= 2.;
        }

        distance
    }
}

fn validate(config: &RenderConfig) -> Result<(), RenderError> {
    if !(config.step_size > 0.) || !config.step_size.is_finite() {
        return Err(RenderError::InvalidStepSize(config.step_size));
    }
    if !(config.max_range > 0.) || !config.max_range.is_finite() {
        return Err(RenderError::InvalidMaxRange(config.max_range));
    }
    if !(config.detail_threshold > 0.) {
        return Err(RenderError::InvalidDetailThreshold(config.detail_threshold));
    }

    Ok(())
}

/// Resolves which groups this pass can sense, mapped to their alpha. With a
/// subset, ids must exist in the scene; a subset id without a color stays
/// invisible, since only a color contributes opacity.
fn active_alphas(
    snapshot: &SceneSnapshot,
    config: &RenderConfig,
) -> Result<FxHashMap<GroupId, u8>, RenderError> {
    match &config.subset {
        None => Ok(snapshot
            .colors
            .iter()
            .map(|(&id, color)| (id, color.a))
            .collect()),
        Some(subset) => {
            let mut active = FxHashMap::default();

            for &id in subset {
                if id.index() >= snapshot.groups.len() {
                    return Err(RenderError::UnknownGroup(id));
                }

                if let Some(color) = snapshot.colors.get(&id) {
                    active.insert(id, color.a);
                }
            }

            Ok(active)
        }
    }
}

#[cfg(test)]
mod test {
    use rand::Rng;

    use crate::{
        scene::{Group, Rgba, Scene},
        sensors::{
            RenderConfig,
            camera::{Camera, RenderError},
        },
        shape::Shape,
    };

    fn circle_scene(x: f32, y: f32, radius: f32, color: Rgba) -> Scene {
        let mut scene = Scene::default();
        scene.add_colored_group(
            glam::vec2(x, y),
            color,
            [Shape::circle(glam::Vec2::ZERO, radius).unwrap()],
        );

        scene
    }

    #[test]
    fn test_beam_angles() {
        let camera = Camera::new(glam::Vec2::ZERO, 0., 90., 5).unwrap();
        let angles = camera.beam_angles().unwrap();

        assert_eq!(angles, vec![-45., -22.5, 0., 22.5, 45.]);

        let camera = Camera::new(glam::Vec2::ZERO, 180., 200., 100).unwrap();
        let angles = camera.beam_angles().unwrap();

        assert_eq!(angles.len(), 100);
        assert_eq!(angles[0], 80.);
        assert_eq!(angles[99], 280.);
    }

    #[test]
    fn test_resolution_must_span() {
        assert!(matches!(
            Camera::new(glam::Vec2::ZERO, 0., 90., 1),
            Err(RenderError::InvalidResolution(1))
        ));
        assert!(matches!(
            Camera::new(glam::Vec2::ZERO, 0., 90., 0),
            Err(RenderError::InvalidResolution(0))
        ));

        // Pose fields are public; rendering re-checks.
        let mut camera = Camera::new(glam::Vec2::ZERO, 0., 90., 5).unwrap();
        camera.resolution = 1;
        assert!(matches!(
            camera.beam_angles(),
            Err(RenderError::InvalidResolution(1))
        ));
    }

    #[test]
    fn test_config_rejects_non_terminating_marches() {
        let scene = circle_scene(5., 0., 1., Rgba::new(255, 0, 0, 255));
        let camera = Camera::new(glam::Vec2::ZERO, 0., 90., 5).unwrap();

        for step_size in [0., -1., f32::NAN] {
            let config = RenderConfig {
                step_size,
                ..Default::default()
            };
            assert!(matches!(
                camera.render(&scene, &config),
                Err(RenderError::InvalidStepSize(_))
            ));
        }

        let config = RenderConfig {
            max_range: 0.,
            ..Default::default()
        };
        assert!(matches!(
            camera.render(&scene, &config),
            Err(RenderError::InvalidMaxRange(_))
        ));

        let config = RenderConfig {
            detail_threshold: 0.,
            ..Default::default()
        };
        assert!(matches!(
            camera.render(&scene, &config),
            Err(RenderError::InvalidDetailThreshold(_))
        ));
    }

    #[test]
    fn test_center_beam_ranges_circle() {
        let scene = circle_scene(5., 0., 1., Rgba::new(255, 0, 0, 255));
        let camera = Camera::new(glam::Vec2::ZERO, 0., 90., 5).unwrap();

        let config = RenderConfig {
            step_size: 0.1,
            max_range: 10.,
            detail_threshold: 0.001,
            ..Default::default()
        };

        let frame = camera.render(&scene, &config).unwrap();
        assert_eq!(frame.0.len(), 5);

        // Only the center beam points at the circle; the others pass at
        // least 1.9 world units from its center.
        for beam in &frame.0 {
            if beam.index == 2 {
                assert_eq!(beam.hits.len(), 1);
                assert!((beam.hits[0].distance - 4.).abs() < 0.05);
                assert!((beam.end - glam::vec2(4., 0.)).length() < 0.05);
            } else {
                assert!(beam.hits.is_empty());
            }
        }
    }

    #[test]
    fn test_empty_scene_runs_to_max_range() {
        let scene = Scene::default();
        let camera = Camera::new(glam::Vec2::ZERO, 0., 90., 5).unwrap();

        let config = RenderConfig {
            step_size: 1.,
            max_range: 10.,
            ..Default::default()
        };

        let frame = camera.render(&scene, &config).unwrap();

        for beam in &frame.0 {
            assert!(beam.hits.is_empty());
        }
        // Center beam marches straight down +x and stops at the range cap.
        assert!((frame.0[2].end - glam::vec2(10., 0.)).length() < 1e-4);
    }

    #[test]
    fn test_opaque_group_stops_the_beam() {
        let mut scene = circle_scene(5., 0., 1., Rgba::new(255, 0, 0, 255));
        let behind = scene.add_colored_group(
            glam::vec2(8., 0.),
            Rgba::new(0, 255, 0, 255),
            [Shape::circle(glam::Vec2::ZERO, 1.).unwrap()],
        );

        let camera = Camera::new(glam::Vec2::ZERO, 0., 0., 2).unwrap();
        let config = RenderConfig {
            step_size: 0.5,
            max_range: 20.,
            detail_threshold: 0.01,
            ..Default::default()
        };

        let frame = camera.render(&scene, &config).unwrap();

        for beam in &frame.0 {
            assert_eq!(beam.hits.len(), 1);
            assert_ne!(beam.hits[0].group, behind);
            assert!((beam.hits[0].distance - 4.).abs() < 0.05);
        }
    }

    #[test]
    fn test_translucent_hits_stack_far_to_near() {
        let mut scene = circle_scene(5., 0., 1., Rgba::new(255, 0, 0, 100));
        let behind = scene.add_colored_group(
            glam::vec2(8., 0.),
            Rgba::new(0, 255, 0, 255),
            [Shape::circle(glam::Vec2::ZERO, 1.).unwrap()],
        );

        let camera = Camera::new(glam::Vec2::ZERO, 0., 0., 2).unwrap();
        let config = RenderConfig {
            step_size: 0.5,
            max_range: 20.,
            detail_threshold: 0.01,
            ..Default::default()
        };

        let frame = camera.render(&scene, &config).unwrap();
        let beam = &frame.0[0];

        // The translucent circle is seen through; both crossings are
        // recorded, farthest first, and the beam ends on the far one.
        assert_eq!(beam.hits.len(), 2);
        assert_eq!(beam.hits[0].group, behind);
        assert!((beam.hits[0].distance - 7.).abs() < 0.05);
        assert!((beam.hits[1].distance - 4.).abs() < 0.05);
        assert!((beam.end - glam::vec2(7., 0.)).length() < 0.05);
    }

    #[test]
    fn test_uncolored_groups_are_invisible() {
        let mut scene = Scene::default();
        scene.add_group(Group::new(
            glam::vec2(5., 0.),
            [Shape::circle(glam::Vec2::ZERO, 1.).unwrap()],
        ));

        let camera = Camera::new(glam::Vec2::ZERO, 0., 0., 2).unwrap();
        let frame = camera.render(&scene, &RenderConfig::default()).unwrap();

        assert!(frame.0.iter().all(|beam| beam.hits.is_empty()));
    }

    #[test]
    fn test_subset_restricts_sensing() {
        let mut scene = circle_scene(5., 0., 1., Rgba::new(255, 0, 0, 100));
        let behind = scene.add_colored_group(
            glam::vec2(8., 0.),
            Rgba::new(0, 255, 0, 255),
            [Shape::circle(glam::Vec2::ZERO, 1.).unwrap()],
        );

        let camera = Camera::new(glam::Vec2::ZERO, 0., 0., 2).unwrap();
        let config = RenderConfig {
            step_size: 0.5,
            max_range: 20.,
            detail_threshold: 0.01,
            subset: Some(vec![behind]),
            ..Default::default()
        };

        let frame = camera.render(&scene, &config).unwrap();
        let beam = &frame.0[0];

        assert_eq!(beam.hits.len(), 1);
        assert_eq!(beam.hits[0].group, behind);
    }

    #[test]
    fn test_subset_rejects_unknown_ids() {
        let scene = circle_scene(5., 0., 1., Rgba::new(255, 0, 0, 255));
        let mut other = Scene::default();
        other.add_colored_group(
            glam::Vec2::ZERO,
            Rgba::new(0, 0, 0, 255),
            [Shape::circle(glam::Vec2::ZERO, 1.).unwrap()],
        );
        let missing = other.add_colored_group(
            glam::Vec2::ZERO,
            Rgba::new(0, 0, 0, 255),
            [Shape::circle(glam::Vec2::ZERO, 1.).unwrap()],
        );

        let camera = Camera::new(glam::Vec2::ZERO, 0., 0., 2).unwrap();
        let config = RenderConfig {
            subset: Some(vec![missing]),
            ..Default::default()
        };

        assert!(matches!(
            camera.render(&scene, &config),
            Err(RenderError::UnknownGroup(_))
        ));
    }

    #[test]
    fn test_refinement_converges_to_analytic_distance() {
        let mut rng = rand::rng();

        for _ in 0..50 {
            let center_distance: f32 = rng.random_range(5.0..50.0);
            let radius: f32 = rng.random_range(1.5..3.0);

            let scene = circle_scene(center_distance, 0., radius, Rgba::new(255, 0, 0, 255));
            let camera = Camera::new(glam::Vec2::ZERO, 0., 0., 2).unwrap();

            let config = RenderConfig {
                step_size: 1.,
                max_range: 100.,
                detail_threshold: 1e-3,
                ..Default::default()
            };

            let frame = camera.render(&scene, &config).unwrap();
            let beam = &frame.0[0];

            // The ray runs through the center, so the boundary crossing has
            // a closed form.
            let analytic = center_distance - radius;

            assert_eq!(beam.hits.len(), 1);
            assert!(
                (beam.hits[0].distance - analytic).abs() <= config.detail_threshold + 1e-4,
                "refined {} vs analytic {analytic}",
                beam.hits[0].distance
            );
        }
    }

    #[test]
    fn test_advance_and_turn() {
        let mut camera = Camera::new(glam::vec2(1., 2.), 90., 90., 5).unwrap();

        camera.advance(3., 0.);
        assert!((camera.position - glam::vec2(1., 5.)).length() < 1e-5);

        camera.turn(-90.);
        assert_eq!(camera.heading, 0.);

        camera.advance(0., 2.);
        assert!((camera.position - glam::vec2(1., 7.)).length() < 1e-5);
    }
}
