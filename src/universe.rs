//! Initial conditions in the plain-text NBody layout:
//!
//! ```text
//! 5
//! 2.50e+11
//!  1.4960e+11  0.0000e+00  0.0000e+00  2.9800e+04  5.9740e+24    earth.gif
//!  ...
//! ```
//!
//! The first token is the body count, the second the radius of the viewed
//! universe, then one record per body. Anything after the last record is
//! ignored.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

use crate::body::Body;

#[derive(Debug, Error)]
pub enum UniverseError {
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unexpected end of input, expected {expected}")]
    MissingToken { expected: &'static str },
    #[error("invalid {expected} {token:?}")]
    InvalidNumber {
        expected: &'static str,
        token: String,
    },
    #[error("body {index} ({name}): {reason}")]
    InvalidBody {
        index: usize,
        name: String,
        reason: &'static str,
    },
    #[error("radius must be finite and positive, got {0}")]
    InvalidRadius(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Universe {
    pub radius: f64,
    pub bodies: Vec<Body>,
}

impl Universe {
    pub fn from_path(path: &Path) -> Result<Universe, UniverseError> {
        let text = std::fs::read_to_string(path).map_err(|source| UniverseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let universe = Universe::parse(&text)?;
        log::info!(
            "loaded {} bodies from {} (radius {:e})",
            universe.bodies.len(),
            path.display(),
            universe.radius
        );
        Ok(universe)
    }

    pub fn parse(text: &str) -> Result<Universe, UniverseError> {
        let mut tokens = Tokens(text.split_whitespace());

        let count: usize = tokens.next("body count")?;
        let radius: f64 = tokens.next("radius")?;
        if !(radius.is_finite() && radius > 0.0) {
            return Err(UniverseError::InvalidRadius(radius));
        }

        // The count is untrusted; a short file ends in MissingToken.
        let mut bodies = Vec::with_capacity(count.min(text.len()));
        for index in 0..count {
            let x = tokens.next("x position")?;
            let y = tokens.next("y position")?;
            let x_vel = tokens.next("x velocity")?;
            let y_vel = tokens.next("y velocity")?;
            let mass = tokens.next("mass")?;
            let name = tokens.word("name")?;

            let body = Body::new(x, y, x_vel, y_vel, mass, name);
            check(index, &body)?;
            bodies.push(body);
        }

        Ok(Universe { radius, bodies })
    }
}

fn check(index: usize, body: &Body) -> Result<(), UniverseError> {
    let reason = if !(body.mass() > 0.0 && body.mass().is_finite()) {
        Some("mass must be finite and positive")
    } else if !(body.x().is_finite() && body.y().is_finite()) {
        Some("position must be finite")
    } else if !(body.x_vel().is_finite() && body.y_vel().is_finite()) {
        Some("velocity must be finite")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(UniverseError::InvalidBody {
            index,
            name: body.name().to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

struct Tokens<'a>(std::str::SplitWhitespace<'a>);

impl<'a> Tokens<'a> {
    fn word(&mut self, expected: &'static str) -> Result<&'a str, UniverseError> {
        self.0.next().ok_or(UniverseError::MissingToken { expected })
    }

    fn next<T: FromStr>(&mut self, expected: &'static str) -> Result<T, UniverseError> {
        let token = self.word(expected)?;
        token.parse().map_err(|_| UniverseError::InvalidNumber {
            expected,
            token: token.to_string(),
        })
    }
}
