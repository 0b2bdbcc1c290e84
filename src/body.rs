use cgmath::InnerSpace;
use cgmath::Point2;
use cgmath::Vector2;

use crate::canvas::Canvas;

pub const GRAVITATION_CONSTANT: f64 = 6.67e-11;

/// A point mass moving in the plane.
///
/// State is only changed through [`Body::update`]. Cloning gives an
/// independent snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    position: Point2<f64>,
    velocity: Vector2<f64>,
    mass: f64,
    name: String,
}

impl Body {
    pub fn new(x: f64, y: f64, x_vel: f64, y_vel: f64, mass: f64, name: impl Into<String>) -> Body {
        Body {
            position: Point2::new(x, y),
            velocity: Vector2::new(x_vel, y_vel),
            mass,
            name: name.into(),
        }
    }

    pub fn x(&self) -> f64 {
        self.position.x
    }

    pub fn y(&self) -> f64 {
        self.position.y
    }

    pub fn x_vel(&self) -> f64 {
        self.velocity.x
    }

    pub fn y_vel(&self) -> f64 {
        self.velocity.y
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    /// Display name, used as the sprite key when drawing.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> Point2<f64> {
        self.position
    }

    pub fn velocity(&self) -> Vector2<f64> {
        self.velocity
    }

    pub fn calc_distance(&self, other: &Body) -> f64 {
        (other.position - self.position).magnitude()
    }

    /// Magnitude of the gravitational pull between the two bodies.
    ///
    /// Coincident bodies give a non-finite result; callers keep a body out of
    /// its own force sum and never place two bodies on the same spot.
    pub fn calc_force_exerted_by(&self, other: &Body) -> f64 {
        GRAVITATION_CONSTANT * self.mass * other.mass / self.calc_distance(other).powi(2)
    }

    /// Signed x component of the pull towards `other`.
    pub fn calc_force_exerted_by_x(&self, other: &Body) -> f64 {
        self.calc_force_exerted_by(other) * (other.position.x - self.position.x)
            / self.calc_distance(other)
    }

    /// Signed y component of the pull towards `other`.
    pub fn calc_force_exerted_by_y(&self, other: &Body) -> f64 {
        self.calc_force_exerted_by(other) * (other.position.y - self.position.y)
            / self.calc_distance(other)
    }

    /// Net x force from every body in `bodies` except the one at `own_index`.
    pub fn calc_net_force_exerted_by_x(&self, bodies: &[Body], own_index: usize) -> f64 {
        others(bodies, own_index)
            .map(|other| self.calc_force_exerted_by_x(other))
            .sum()
    }

    /// Net y force from every body in `bodies` except the one at `own_index`.
    pub fn calc_net_force_exerted_by_y(&self, bodies: &[Body], own_index: usize) -> f64 {
        others(bodies, own_index)
            .map(|other| self.calc_force_exerted_by_y(other))
            .sum()
    }

    pub fn calc_net_force_exerted_by(&self, bodies: &[Body], own_index: usize) -> Vector2<f64> {
        Vector2::new(
            self.calc_net_force_exerted_by_x(bodies, own_index),
            self.calc_net_force_exerted_by_y(bodies, own_index),
        )
    }

    /// Semi-implicit Euler step: the new velocity is used to move the body.
    pub fn update(&mut self, delta_time: f64, x_force: f64, y_force: f64) {
        let acceleration = Vector2::new(x_force, y_force) / self.mass;
        let velocity = self.velocity + acceleration * delta_time;
        let position = self.position + velocity * delta_time;
        self.velocity = velocity;
        self.position = position;
    }

    pub fn draw(&self, canvas: &mut impl Canvas) {
        canvas.picture(self.position.x, self.position.y, &self.name);
    }
}

// Self exclusion goes by slot, so two identical bodies still feel each other.
fn others(bodies: &[Body], own_index: usize) -> impl Iterator<Item = &Body> {
    bodies
        .iter()
        .enumerate()
        .filter(move |(index, _)| *index != own_index)
        .map(|(_, body)| body)
}
