pub mod grid;
pub mod math;
pub mod scene;
pub mod sensors;
pub mod shape;

pub use scene::Scene;
pub use sensors::camera::Camera;
pub use shape::Shape;
