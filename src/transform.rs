// Uniform scale followed by a translation, used to pan and zoom the view
//
// Transforms chain left to right: a.then(&b) applies a first and b second.

use cgmath::{point2, vec2, Point2, Vector2};
use json::JsonValue;
use num::complex::Complex;

use crate::COMPLEX_WINDOW;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub scale : f64,
    pub translate : Vector2<f64>
}

impl Default for Transform {
    fn default() -> Transform {
        Transform::identity()
    }
}

impl Transform {
    pub fn new(scale : f64, x : f64, y : f64) -> Transform {
        Transform { scale, translate : vec2(x, y) }
    }

    pub fn identity() -> Transform {
        Transform::new(1.0, 0.0, 0.0)
    }

    pub fn scaling(scale : f64) -> Transform {
        Transform::new(scale, 0.0, 0.0)
    }

    pub fn translation(x : f64, y : f64) -> Transform {
        Transform::new(1.0, x, y)
    }

    // View transform from a job description, the centre is the pan offset
    // in the complex plane and scale is how many times wider than the
    // default window the view is
    pub fn from_json(input : &JsonValue) -> Transform {
        let scale = input["scale"].as_f64().unwrap_or(1.0);
        let centre_x = input["centre_x"].as_f64().unwrap_or(0.0);
        let centre_y = input["centre_y"].as_f64().unwrap_or(0.0);
        Transform::new(scale, centre_x, centre_y)
    }

    pub fn then(&self, next : &Transform) -> Transform {
        Transform {
            scale : self.scale * next.scale,
            translate : self.translate * next.scale + next.translate
        }
    }

    pub fn chain(transforms : &[Transform]) -> Transform {
        transforms.iter().fold(Transform::identity(), |acc, t| acc.then(t))
    }

    pub fn invert(&self) -> Transform {
        Transform {
            scale : 1.0 / self.scale,
            translate : -self.translate / self.scale
        }
    }

    #[inline]
    pub fn apply(&self, p : Point2<f64>) -> Point2<f64> {
        point2(
            p.x * self.scale + self.translate.x,
            p.y * self.scale + self.translate.y
        )
    }

    #[inline]
    pub fn apply_complex(&self, x : f64, y : f64) -> Complex<f64> {
        Complex::new(x * self.scale + self.translate.x, y * self.scale + self.translate.y)
    }
}

// Complex units covered by one pixel when the view is untransformed
pub fn units_per_pixel(width : u32) -> f64 {
    2.0 * COMPLEX_WINDOW / width as f64
}

// Canvas pixel -> complex plane: move the origin to the canvas centre, then
// scale by the zoom and pan by the view
pub fn canvas_to_complex(view : &Transform, width : u32, height : u32) -> Transform {
    let to_centre = Transform::translation(-(width as f64) / 2.0, -(height as f64) / 2.0);
    let to_units = Transform {
        scale : view.scale * units_per_pixel(width),
        translate : view.translate
    };
    to_centre.then(&to_units)
}

pub fn complex_to_canvas(view : &Transform, width : u32, height : u32) -> Transform {
    canvas_to_complex(view, width, height).invert()
}
