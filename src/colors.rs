// Assign a colour to every root of the polynomial
//
// Chroma grows with the root's distance from the origin, hues are spread
// around the colour wheel by one of three schemes. All schemes place the N
// roots on N evenly spaced hue slots and differ only in which root gets
// which slot.

use image::Rgba;
use num::complex::Complex;

use crate::render::RenderSettings;
use crate::roots::{root_angle, OklchColor, RootSet};
use crate::COMPLEX_WINDOW;

// Roots closer together in angle than this are ordered by radius instead
const ANGLE_TIE_DEGREES : f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorScheme {
    // Roots next to each other in hue are far apart in the plane
    Contrasting,
    // Hue follows the root's angle
    Linear,
    Monochromatic
}

impl ColorScheme {
    pub const ALL : [ColorScheme; 3] = [
        ColorScheme::Contrasting,
        ColorScheme::Linear,
        ColorScheme::Monochromatic
    ];

    pub fn from_name(name : &str) -> Option<ColorScheme> {
        ColorScheme::ALL.into_iter().find(|scheme| scheme.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ColorScheme::Contrasting => "contrasting",
            ColorScheme::Linear => "linear",
            ColorScheme::Monochromatic => "monochromatic"
        }
    }
}

fn lerp_clamped(t : f64, from : f64, to : f64) -> f64 {
    from + (to - from) * t.clamp(0.0, 1.0)
}

pub fn base_chroma(root : &Complex<f64>, chromaticity : f64) -> f64 {
    lerp_clamped(root.norm() / COMPLEX_WINDOW, 0.01, 0.4 * chromaticity)
}

// Root indices sorted by angle, a run of roots each within the tie angle of
// the previous one is ordered by radius. Runs wrap around 0 degrees.
pub fn sorted_order(roots : &[Complex<f64>]) -> Vec<usize> {
    let angles : Vec<f64> = roots.iter().map(root_angle).collect();
    let mut order : Vec<usize> = (0..roots.len()).collect();
    order.sort_by(
        |&a, &b| angles[a].total_cmp(&angles[b]).then(roots[a].norm().total_cmp(&roots[b].norm()))
    );
    let gap = |a : usize, b : usize| (angles[b] - angles[a]).rem_euclid(360.0);
    // A run straddling 0 degrees is moved to the end in one piece
    if order.len() > 1 && gap(order[order.len() - 1], order[0]) < ANGLE_TIE_DEGREES {
        if let Some(split) = (1..order.len()).find(|&k| gap(order[k - 1], order[k]) >= ANGLE_TIE_DEGREES) {
            order.rotate_left(split);
        }
    }
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && gap(order[end - 1], order[end]) < ANGLE_TIE_DEGREES {
            end += 1;
        }
        order[start..end].sort_by(
            |&a, &b| roots[a].norm().total_cmp(&roots[b].norm()).then(angles[a].total_cmp(&angles[b]))
        );
        start = end;
    }
    order
}

// Hue slot for each position in sorted order. Slots next to each other are
// given to roots that are as far apart in the sorted order as possible.
pub fn contrasting_slots(n : usize) -> Vec<usize> {
    if n % 2 == 1 {
        let step = (n - 1) / 2;
        return (0..n).map(|i| (i * step) % n).collect();
    }
    let step = n / 2 + 1;
    let first : Vec<usize> = (0..n / 2).map(|i| (i * step) % n).collect();
    let complement = (n * n + 2 * n - 4) / 4;
    let second : Vec<usize> = first.iter().map(|v| (complement - v) % n).collect();
    first.into_iter().chain(second).collect()
}

fn wrap_hue(hue : f64) -> f64 {
    let wrapped = hue.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

// Colours for the roots, indexed like the roots
pub fn root_colors(roots : &[Complex<f64>], settings : &RenderSettings) -> Vec<OklchColor> {
    let n = roots.len();
    let mut colors : Vec<OklchColor> = roots.iter().map(
        |root| OklchColor { h : 0.0, c : base_chroma(root, settings.chromaticity) }
    ).collect();
    if n == 0 {
        return colors;
    }
    let order = sorted_order(roots);
    let base = if settings.static_hues { 0.0 } else { root_angle(&roots[order[0]]) };
    let spacing = 360.0 / n as f64;
    let slots : Vec<usize> = match settings.color_scheme {
        ColorScheme::Contrasting => contrasting_slots(n),
        ColorScheme::Linear => (0..n).collect(),
        ColorScheme::Monochromatic => vec![0; n]
    };
    for (position, &index) in order.iter().enumerate() {
        let hue = base + slots[position] as f64 * spacing;
        colors[index].h = wrap_hue(hue + settings.hue_offset);
    }
    colors
}

pub fn set_root_colors(roots : &mut RootSet, settings : &RenderSettings) {
    let colors = root_colors(roots.roots(), settings);
    roots.set_colors(colors);
}

fn srgb_gamma(linear : f64) -> f64 {
    if linear <= 0.0031308 {
        12.92 * linear
    } else {
        1.055 * linear.powf(1.0 / 2.4) - 0.055
    }
}

fn to_channel(value : f64) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

// OKLab with the given lightness, chroma and hue, out of gamut channels are clipped
pub fn oklch_to_rgba(lightness : f64, color : &OklchColor, alpha : u8) -> Rgba<u8> {
    let (sin, cos) = color.h.to_radians().sin_cos();
    let (a, b) = (color.c * cos, color.c * sin);
    let l = (lightness + 0.3963377774 * a + 0.2158037573 * b).powi(3);
    let m = (lightness - 0.1055613458 * a - 0.0638541728 * b).powi(3);
    let s = (lightness - 0.0894841775 * a - 1.2914855480 * b).powi(3);
    let r = 4.0767416621 * l - 3.3077115913 * m + 0.2309699292 * s;
    let g = -1.2684380046 * l + 2.6097574011 * m - 0.3413193965 * s;
    let b = -0.0041960863 * l - 0.7034186147 * m + 1.7076147010 * s;
    Rgba([
        to_channel(srgb_gamma(r)),
        to_channel(srgb_gamma(g)),
        to_channel(srgb_gamma(b)),
        alpha
    ])
}
