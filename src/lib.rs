// Newton fractal rendering core
//
// A polynomial's roots are found once, every canvas pixel is then iterated
// with a root finding method and coloured by the root it lands on and how
// quickly. Rendering is progressive: coarse blocks first, refined pass by
// pass, with a cheap recolor path that reuses the cached convergence data.

use std::time::Duration;

pub mod animation;
pub mod colors;
pub mod config;
pub mod error;
pub mod iteration;
pub mod pixel_data;
pub mod polynomial;
pub mod render;
pub mod roots;
pub mod state_machine;
pub mod transform;

pub use error::FractalError;
pub use iteration::{Convergence, IterationMethod, NonConvergenceReason};
pub use polynomial::Polynomial;
pub use render::{LightnessMode, NonConvergence, RenderSettings};
pub use colors::ColorScheme;
pub use roots::RootSet;
pub use state_machine::{RenderState, RenderStateData};
pub use transform::Transform;

// Root indices are packed in 4 bits with the top value kept as the
// non-convergent marker
pub const MAX_DEGREE : usize = 15;

pub const CANVAS_SIZE : u32 = 1024;
pub const LEGACY_CANVAS_SIZE : u32 = 800;

// Half width of the complex plane shown by an untransformed view
pub const COMPLEX_WINDOW : f64 = 1.5;

pub const MAX_ITERATIONS : u32 = 64;
// Distance at which an iterate has reached a simple root
pub const CONVERGENCE_EPSILON : f64 = 1e-6;

// Solver roots closer than this are one root, about a third of a pixel at
// the default view
pub const ROOT_MERGE_DISTANCE : f64 = 1e-3;

// First progressive pass samples 32x32 blocks
pub const MAX_SCALE_FACTOR : u32 = 5;

// One 60Hz frame
pub const FRAME_BUDGET : Duration = Duration::from_micros(16_667);
