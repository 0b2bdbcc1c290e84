use cgmath::Vector2;
use thiserror::Error;

use crate::body::{Body, GRAVITATION_CONSTANT};
use crate::canvas::Canvas;
use crate::universe::Universe;

#[derive(Debug, Error, PartialEq)]
pub enum SimulationError {
    #[error("time step must be finite and positive, got {0}")]
    InvalidTimeStep(f64),
    #[error("total time must be finite, got {0}")]
    InvalidTotalTime(f64),
    #[error("time step {delta_time:e} no longer advances t = {elapsed:e}")]
    TimeStepTooSmall { elapsed: f64, delta_time: f64 },
}

/// Fixed-step driver over an ordered set of bodies.
#[derive(Debug, Clone)]
pub struct Simulation {
    pub bodies: Vec<Body>,
    pub radius: f64,
    pub elapsed: f64,
}

impl Simulation {
    pub fn new(universe: Universe) -> Simulation {
        Simulation {
            bodies: universe.bodies,
            radius: universe.radius,
            elapsed: 0.0,
        }
    }

    /// Advances every body by `delta_time`.
    ///
    /// All net forces come from the state before the step; no body moves
    /// until every force is known.
    pub fn step(&mut self, delta_time: f64) {
        let forces: Vec<Vector2<f64>> = self
            .bodies
            .iter()
            .enumerate()
            .map(|(index, body)| body.calc_net_force_exerted_by(&self.bodies, index))
            .collect();

        for (body, force) in self.bodies.iter_mut().zip(forces) {
            body.update(delta_time, force.x, force.y);
        }
        self.elapsed += delta_time;
    }

    /// Steps until `total_time` is reached, calling `on_step` after each
    /// step. Returns the number of steps taken.
    pub fn run<F>(
        &mut self,
        total_time: f64,
        delta_time: f64,
        mut on_step: F,
    ) -> Result<u64, SimulationError>
    where
        F: FnMut(u64, &Simulation),
    {
        if !(delta_time.is_finite() && delta_time > 0.0) {
            return Err(SimulationError::InvalidTimeStep(delta_time));
        }
        if !total_time.is_finite() {
            return Err(SimulationError::InvalidTotalTime(total_time));
        }

        let mut steps = 0;
        while self.elapsed < total_time {
            if self.elapsed + delta_time == self.elapsed {
                return Err(SimulationError::TimeStepTooSmall {
                    elapsed: self.elapsed,
                    delta_time,
                });
            }
            self.step(delta_time);
            steps += 1;
            on_step(steps, self);
        }
        log::debug!("ran {steps} steps, t = {:e}", self.elapsed);
        Ok(steps)
    }

    pub fn draw(&self, canvas: &mut impl Canvas) {
        for body in &self.bodies {
            body.draw(canvas);
        }
    }

    /// Kinetic plus pairwise gravitational potential energy.
    pub fn total_energy(&self) -> f64 {
        let kinetic: f64 = self
            .bodies
            .iter()
            .map(|b| 0.5 * b.mass() * (b.x_vel().powi(2) + b.y_vel().powi(2)))
            .sum();

        let mut potential = 0.0;
        for (i, a) in self.bodies.iter().enumerate() {
            for b in &self.bodies[i + 1..] {
                potential -= GRAVITATION_CONSTANT * a.mass() * b.mass() / a.calc_distance(b);
            }
        }
        kinetic + potential
    }

    /// Body count and radius, the two lines that open the loader's layout.
    pub fn header(&self) -> [String; 2] {
        [self.bodies.len().to_string(), sci(self.radius, 2)]
    }

    /// Final state, one line per body, in the loader's column layout.
    pub fn summary(&self) -> impl Iterator<Item = String> + '_ {
        self.bodies.iter().map(|b| {
            format!(
                "{:>11} {:>11} {:>11} {:>11} {:>11} {:>12}",
                sci(b.x(), 4),
                sci(b.y(), 4),
                sci(b.x_vel(), 4),
                sci(b.y_vel(), 4),
                sci(b.mass(), 4),
                b.name()
            )
        })
    }
}

// printf-style %.Ne: two-digit signed exponent.
fn sci(value: f64, precision: usize) -> String {
    let formatted = format!("{value:.precision$e}");
    match formatted.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => formatted,
    }
}
