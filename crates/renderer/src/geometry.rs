//! Aspect-preserving canvas geometry.
//!
//! The canvas is the largest rectangle with the image's aspect ratio that
//! fits inside the container (letterbox or pillarbox, never crop). Logical
//! sizes are what the window manager sees; the physical size is the pixel
//! buffer and scales with the display's pixel density.

use crate::types::SurfaceSize;

/// Canvas rectangle inside the drawable surface, in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayGeometry {
    pub logical_width: f32,
    pub logical_height: f32,
    /// Pixel buffer of the canvas itself.
    pub physical: SurfaceSize,
    /// Top-left offset of the canvas inside the container, in logical units.
    pub offset: (f32, f32),
    /// Pixel buffer of the whole container; the drawable surface uses this.
    pub container: SurfaceSize,
    /// Rectangle the canvas occupies on the container-sized surface.
    pub viewport: Viewport,
}

/// Largest `(width, height)` inside `container` with the given aspect ratio.
pub fn fit_to_container(container: (f32, f32), image_aspect: f32) -> (f32, f32) {
    let (container_width, container_height) = container;
    if container_width <= 0.0 || container_height <= 0.0 || !image_aspect.is_finite() {
        return (0.0, 0.0);
    }
    if image_aspect <= 0.0 {
        return (container_width, container_height);
    }

    let container_aspect = container_width / container_height;
    if container_aspect > image_aspect {
        (container_height * image_aspect, container_height)
    } else {
        (container_width, container_width / image_aspect)
    }
}

impl DisplayGeometry {
    pub fn compute(
        container: (f32, f32),
        image_size: (u32, u32),
        scale_factor: f64,
    ) -> DisplayGeometry {
        let aspect = if image_size.1 == 0 {
            0.0
        } else {
            image_size.0 as f32 / image_size.1 as f32
        };
        let (logical_width, logical_height) = fit_to_container(container, aspect);
        let scale = if scale_factor.is_finite() && scale_factor > 0.0 {
            scale_factor
        } else {
            1.0
        };
        let to_pixels = |logical: f32| (f64::from(logical) * scale).round().max(1.0) as u32;
        let physical = SurfaceSize::new(to_pixels(logical_width), to_pixels(logical_height));
        let offset = (
            ((container.0 - logical_width) / 2.0).max(0.0),
            ((container.1 - logical_height) / 2.0).max(0.0),
        );
        DisplayGeometry {
            logical_width,
            logical_height,
            physical,
            offset,
            container: SurfaceSize::new(to_pixels(container.0), to_pixels(container.1)),
            viewport: Viewport {
                x: (f64::from(offset.0) * scale).round() as f32,
                y: (f64::from(offset.1) * scale).round() as f32,
                width: physical.width as f32,
                height: physical.height as f32,
            },
        }
    }
}
