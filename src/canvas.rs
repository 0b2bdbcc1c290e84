use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use image::{imageops, Rgba, RgbaImage};
use thiserror::Error;

/// Something a body can be drawn on.
pub trait Canvas {
    /// Places the image called `name` centred on world coordinates (x, y).
    fn picture(&mut self, x: f64, y: f64, name: &str);
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to load sprite {path}")]
    Sprite {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to write frame {path}")]
    Frame {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Maps the world square `[-radius, radius]²` onto a pixel grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub radius: f64,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(radius: f64, width: u32, height: u32) -> Viewport {
        Viewport {
            radius,
            width,
            height,
        }
    }

    /// Pixel coordinates, origin top left.
    pub fn to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let span = 2.0 * self.radius;
        let px = (x + self.radius) / span * self.width as f64;
        let py = (self.radius - y) / span * self.height as f64;
        (px, py)
    }

    /// Normalised device coordinates, both axes in `[-1, 1]` inside the view.
    pub fn to_clip(&self, x: f64, y: f64) -> [f32; 2] {
        [(x / self.radius) as f32, (y / self.radius) as f32]
    }
}

pub struct Sprite {
    pub image: RgbaImage,
}

impl Sprite {
    /// Mean colour of the opaque pixels, white for a fully transparent image.
    pub fn mean_color(&self) -> [f32; 3] {
        let mut sum = [0.0f64; 3];
        let mut weight = 0.0f64;
        for pixel in self.image.pixels() {
            let alpha = pixel[3] as f64 / 255.0;
            for (channel, total) in sum.iter_mut().enumerate() {
                *total += alpha * pixel[channel] as f64 / 255.0;
            }
            weight += alpha;
        }
        if weight == 0.0 {
            return [1.0, 1.0, 1.0];
        }
        sum.map(|total| (total / weight) as f32)
    }
}

/// Sprites keyed by body name.
#[derive(Default)]
pub struct SpriteSheet {
    sprites: HashMap<String, Sprite>,
}

impl SpriteSheet {
    pub fn new() -> SpriteSheet {
        SpriteSheet::default()
    }

    /// Loads `dir/<name>` for every distinct name.
    pub fn load<'a>(
        dir: &Path,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Result<SpriteSheet, RenderError> {
        let mut sheet = SpriteSheet::new();
        for name in names {
            if sheet.sprites.contains_key(name) {
                continue;
            }
            let path = dir.join(name);
            let image = image::open(&path)
                .map_err(|source| RenderError::Sprite {
                    path: path.clone(),
                    source,
                })?
                .to_rgba8();
            log::debug!("loaded sprite {} ({}x{})", path.display(), image.width(), image.height());
            sheet.insert(name, image);
        }
        Ok(sheet)
    }

    pub fn insert(&mut self, name: impl Into<String>, image: RgbaImage) {
        self.sprites.insert(name.into(), Sprite { image });
    }

    pub fn get(&self, name: &str) -> Option<&Sprite> {
        self.sprites.get(name)
    }

    pub fn len(&self) -> usize {
        self.sprites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sprites.is_empty()
    }
}

const PLACEHOLDER_SIZE: u32 = 3;

/// Software canvas that composes one frame into an RGBA image.
pub struct FrameCanvas {
    viewport: Viewport,
    sprites: SpriteSheet,
    frame: RgbaImage,
    placeholder: RgbaImage,
    warned: HashSet<String>,
}

impl FrameCanvas {
    pub fn new(viewport: Viewport, sprites: SpriteSheet) -> FrameCanvas {
        FrameCanvas {
            viewport,
            sprites,
            frame: RgbaImage::from_pixel(viewport.width, viewport.height, Rgba([0, 0, 0, 255])),
            placeholder: RgbaImage::from_pixel(
                PLACEHOLDER_SIZE,
                PLACEHOLDER_SIZE,
                Rgba([255, 255, 255, 255]),
            ),
            warned: HashSet::new(),
        }
    }

    pub fn clear(&mut self, background: Rgba<u8>) {
        for pixel in self.frame.pixels_mut() {
            *pixel = background;
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.frame
    }

    pub fn save(&self, path: &Path) -> Result<(), RenderError> {
        self.frame.save(path).map_err(|source| RenderError::Frame {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl Canvas for FrameCanvas {
    fn picture(&mut self, x: f64, y: f64, name: &str) {
        let (px, py) = self.viewport.to_pixel(x, y);
        if !px.is_finite() || !py.is_finite() {
            log::warn!("{name} is at a non-finite position, not drawn");
            return;
        }

        let sprite = match self.sprites.get(name) {
            Some(sprite) => &sprite.image,
            None => {
                if self.warned.insert(name.to_string()) {
                    log::warn!("no sprite named {name}, drawing a placeholder");
                }
                &self.placeholder
            }
        };

        let left = px.floor() - (sprite.width() / 2) as f64;
        let top = py.floor() - (sprite.height() / 2) as f64;
        let visible = left < self.frame.width() as f64
            && top < self.frame.height() as f64
            && left + sprite.width() as f64 > 0.0
            && top + sprite.height() as f64 > 0.0;
        if visible {
            imageops::overlay(&mut self.frame, sprite, left as i64, top as i64);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    #[test]
    fn viewport_maps_corners() {
        let view = Viewport::new(10.0, 100, 50);
        assert_eq!(view.to_pixel(-10.0, 10.0), (0.0, 0.0));
        assert_eq!(view.to_pixel(10.0, -10.0), (100.0, 50.0));
        assert_eq!(view.to_pixel(0.0, 0.0), (50.0, 25.0));
        assert_eq!(view.to_clip(5.0, -10.0), [0.5, -1.0]);
    }

    #[test]
    fn mean_color_ignores_transparent_pixels() {
        let mut image = RgbaImage::from_pixel(2, 1, Rgba([0, 0, 255, 0]));
        image.put_pixel(0, 0, RED);
        let sprite = Sprite { image };
        assert_eq!(sprite.mean_color(), [1.0, 0.0, 0.0]);
    }

    #[test]
    fn picture_blits_sprite_centred() {
        let mut sprites = SpriteSheet::new();
        sprites.insert("mars.gif", RgbaImage::from_pixel(3, 3, RED));
        let mut canvas = FrameCanvas::new(Viewport::new(1.0, 21, 21), sprites);
        canvas.clear(BLACK);

        canvas.picture(0.0, 0.0, "mars.gif");

        let frame = canvas.image();
        assert_eq!(*frame.get_pixel(10, 10), RED);
        assert_eq!(*frame.get_pixel(9, 9), RED);
        assert_eq!(*frame.get_pixel(11, 11), RED);
        assert_eq!(*frame.get_pixel(12, 10), BLACK);
        assert_eq!(*frame.get_pixel(0, 0), BLACK);
    }

    #[test]
    fn picture_outside_view_is_clipped() {
        let mut sprites = SpriteSheet::new();
        sprites.insert("far.gif", RgbaImage::from_pixel(3, 3, RED));
        let mut canvas = FrameCanvas::new(Viewport::new(1.0, 8, 8), sprites);
        canvas.clear(BLACK);

        canvas.picture(50.0, 50.0, "far.gif");
        canvas.picture(f64::NAN, 0.0, "far.gif");

        assert!(canvas.image().pixels().all(|p| *p == BLACK));
    }

    #[test]
    fn unknown_sprite_gets_placeholder() {
        let mut canvas = FrameCanvas::new(Viewport::new(1.0, 9, 9), SpriteSheet::new());
        canvas.clear(BLACK);
        canvas.picture(0.0, 0.0, "ghost.gif");
        assert_eq!(*canvas.image().get_pixel(4, 4), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn missing_sprite_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SpriteSheet::load(dir.path(), ["nope.gif"]).err().unwrap();
        assert!(matches!(err, RenderError::Sprite { .. }));
    }

    #[test]
    fn sprites_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        RgbaImage::from_pixel(4, 2, RED)
            .save(dir.path().join("venus.png"))
            .unwrap();

        let sheet = SpriteSheet::load(dir.path(), ["venus.png", "venus.png"]).unwrap();
        assert_eq!(sheet.len(), 1);
        assert_eq!(sheet.get("venus.png").unwrap().image.dimensions(), (4, 2));
    }
}
