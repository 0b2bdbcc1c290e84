pub mod body;
pub mod canvas;
pub mod simulation;
pub mod universe;
pub mod viewer;

pub use body::{Body, GRAVITATION_CONSTANT};
pub use canvas::{Canvas, FrameCanvas, RenderError, SpriteSheet, Viewport};
pub use simulation::{Simulation, SimulationError};
pub use universe::{Universe, UniverseError};
