use serde::{Deserialize, Serialize};

use crate::{config::ViewportConfig, Result, SceneError};

/// Size report from the host window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResizeEvent {
    pub width: u32,
    pub height: u32,
    #[serde(default = "unit_ratio")]
    pub device_pixel_ratio: f32,
}

fn unit_ratio() -> f32 {
    1.0
}

/// Current output size and the pixel ratio the renderer uses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    width: u32,
    height: u32,
    pixel_ratio: f32,
    max_pixel_ratio: f32,
}

impl Viewport {
    pub fn from_config(config: &ViewportConfig) -> Result<Self> {
        let mut viewport = Self {
            width: 1,
            height: 1,
            pixel_ratio: 1.0,
            max_pixel_ratio: config.max_pixel_ratio.max(1.0),
        };
        viewport.apply(ResizeEvent {
            width: config.width,
            height: config.height,
            device_pixel_ratio: config.device_pixel_ratio,
        })?;
        Ok(viewport)
    }

    /// Takes the reported size. A zero-sized report is rejected and the
    /// previous state is kept.
    pub fn apply(&mut self, event: ResizeEvent) -> Result<()> {
        if event.width == 0 || event.height == 0 {
            return Err(SceneError::EmptyViewport {
                width: event.width,
                height: event.height,
            });
        }

        let device = if event.device_pixel_ratio.is_finite() && event.device_pixel_ratio > 0.0 {
            event.device_pixel_ratio
        } else {
            1.0
        };
        self.width = event.width;
        self.height = event.height;
        self.pixel_ratio = device.min(self.max_pixel_ratio);
        Ok(())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport() -> Viewport {
        Viewport::from_config(&ViewportConfig::default()).unwrap()
    }

    #[test]
    fn pixel_ratio_is_capped() {
        let mut viewport = viewport();
        for (reported, expected) in [(1.0, 1.0), (1.5, 1.5), (2.0, 2.0), (3.0, 2.0), (f32::NAN, 1.0)] {
            viewport
                .apply(ResizeEvent {
                    width: 100,
                    height: 50,
                    device_pixel_ratio: reported,
                })
                .unwrap();
            assert_eq!(viewport.pixel_ratio(), expected);
            assert_eq!(viewport.aspect(), 2.0);
        }
    }

    #[test]
    fn empty_surface_keeps_previous_size() {
        let mut viewport = viewport();
        let err = viewport
            .apply(ResizeEvent {
                width: 640,
                height: 0,
                device_pixel_ratio: 1.0,
            })
            .unwrap_err();

        assert!(matches!(err, SceneError::EmptyViewport { .. }));
        assert_eq!((viewport.width(), viewport.height()), (1280, 720));
    }

    #[test]
    fn repeated_events_are_idempotent() {
        let event = ResizeEvent {
            width: 1920,
            height: 1080,
            device_pixel_ratio: 2.5,
        };
        let mut once = viewport();
        once.apply(event).unwrap();
        let mut twice = once;
        twice.apply(event).unwrap();

        assert_eq!(once, twice);
    }
}
