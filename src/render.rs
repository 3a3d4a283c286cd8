// Turn rows of the canvas into pixels
//
// calculate_row runs the iteration kernel once per block of a row, render_row
// spreads those records over the block in both the pixel data buffer and the
// surface, recolor_row repaints a row from the cached records alone.

use cgmath::point2;
use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_hollow_circle_mut;
use json::JsonValue;
use rayon::prelude::*;

use crate::colors::{oklch_to_rgba, ColorScheme};
use crate::error::FractalError;
use crate::iteration::{iterate, IterationMethod};
use crate::pixel_data::{PixelData, PixelDataBuffer};
use crate::polynomial::Polynomial;
use crate::roots::RootSet;
use crate::transform::{canvas_to_complex, complex_to_canvas, Transform};

const SHADE_LEVELS : usize = 256;
// Falloff rate of the shading curve at dropoff 0 and dropoff 1
const STEEPEST_FALLOFF : f64 = 20.0;
const FLATTEST_FALLOFF : f64 = 0.5;
const MARKER_RADIUS : i32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightnessMode {
    Normal,
    Inverted,
    // Brightest half way through the falloff
    Parabolic,
    InvertedParabolic
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NonConvergence {
    Black,
    White,
    Transparent
}

impl LightnessMode {
    pub const ALL : [LightnessMode; 4] = [
        LightnessMode::Normal,
        LightnessMode::Inverted,
        LightnessMode::Parabolic,
        LightnessMode::InvertedParabolic
    ];

    pub fn from_name(name : &str) -> Option<LightnessMode> {
        LightnessMode::ALL.into_iter().find(|mode| mode.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            LightnessMode::Normal => "normal",
            LightnessMode::Inverted => "inverted",
            LightnessMode::Parabolic => "parabolic",
            LightnessMode::InvertedParabolic => "inverted-parabolic"
        }
    }

    fn reshape(&self, value : f64) -> f64 {
        match self {
            LightnessMode::Normal => value,
            LightnessMode::Inverted => 1.0 - value,
            LightnessMode::Parabolic => 4.0 * value * (1.0 - value),
            LightnessMode::InvertedParabolic => 1.0 - 4.0 * value * (1.0 - value)
        }
    }
}

impl NonConvergence {
    pub const ALL : [NonConvergence; 3] = [
        NonConvergence::Black,
        NonConvergence::White,
        NonConvergence::Transparent
    ];

    pub fn from_name(name : &str) -> Option<NonConvergence> {
        NonConvergence::ALL.into_iter().find(|policy| policy.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            NonConvergence::Black => "black",
            NonConvergence::White => "white",
            NonConvergence::Transparent => "transparent"
        }
    }

    pub fn color(&self) -> Rgba<u8> {
        match self {
            NonConvergence::Black => Rgba([0, 0, 0, 255]),
            NonConvergence::White => Rgba([255, 255, 255, 255]),
            NonConvergence::Transparent => Rgba([0, 0, 0, 0])
        }
    }
}

// Everything that changes colours but not which root a pixel goes to
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    pub color_scheme : ColorScheme,
    // Degrees added to every root's hue
    pub hue_offset : f64,
    pub chromaticity : f64,
    // 0 shades steeply with iteration count, 1 is nearly flat
    pub dropoff : f64,
    pub lightness_mode : LightnessMode,
    pub non_convergence : NonConvergence,
    pub render_roots : bool,
    // Start the hue wheel at 0 rather than at the first root's angle
    pub static_hues : bool
}

impl Default for RenderSettings {
    fn default() -> RenderSettings {
        RenderSettings {
            color_scheme : ColorScheme::Contrasting,
            hue_offset : 0.0,
            chromaticity : 0.25,
            dropoff : 0.5,
            lightness_mode : LightnessMode::Normal,
            non_convergence : NonConvergence::Black,
            render_roots : false,
            static_hues : false
        }
    }
}

fn named<T>(input : &JsonValue, key : &str, parse : fn(&str) -> Option<T>, default : T) -> Result<T, FractalError> {
    match input[key].as_str() {
        None => Ok(default),
        Some(name) => parse(name).ok_or(
            FractalError::InvalidConfig(format!("Unknown {} '{}'", key, name))
        )
    }
}

impl RenderSettings {
    pub fn from_json(input : &JsonValue) -> Result<RenderSettings, FractalError> {
        let defaults = RenderSettings::default();
        Ok(RenderSettings {
            color_scheme : named(input, "colour_scheme", ColorScheme::from_name, defaults.color_scheme)?,
            hue_offset : input["hue_offset"].as_f64().unwrap_or(defaults.hue_offset),
            chromaticity : input["chromaticity"].as_f64().unwrap_or(defaults.chromaticity),
            dropoff : input["dropoff"].as_f64().unwrap_or(defaults.dropoff),
            lightness_mode : named(input, "lightness", LightnessMode::from_name, defaults.lightness_mode)?,
            non_convergence : named(
                input, "non_convergence", NonConvergence::from_name, defaults.non_convergence
            )?,
            render_roots : input["render_roots"].as_bool().unwrap_or(defaults.render_roots),
            static_hues : input["static_hues"].as_bool().unwrap_or(defaults.static_hues)
        })
    }

    // Lightness of a pixel that converged after the given fraction of the
    // iteration cap
    pub fn lightness(&self, fraction : f64) -> f64 {
        let rate = STEEPEST_FALLOFF + (FLATTEST_FALLOFF - STEEPEST_FALLOFF) * self.dropoff.clamp(0.0, 1.0);
        let value = (-rate * fraction.clamp(0.0, 1.0)).exp();
        self.lightness_mode.reshape(value)
    }
}

// Colour lookup for pixel records: a row of shades for each root plus the
// non-convergence colour. Rebuilt whenever root colours or settings change.
#[derive(Debug, Clone)]
pub struct Palette {
    shades : Vec<Rgba<u8>>,
    non_convergent : Rgba<u8>
}

impl Palette {
    pub fn new(roots : &RootSet, settings : &RenderSettings) -> Palette {
        let shades = roots.colors().iter().flat_map(
            |color| (0..SHADE_LEVELS).map(move |level| {
                let fraction = level as f64 / (SHADE_LEVELS - 1) as f64;
                oklch_to_rgba(settings.lightness(fraction), color, 255)
            })
        ).collect();
        Palette { shades, non_convergent : settings.non_convergence.color() }
    }

    #[inline]
    pub fn color(&self, pixel : PixelData) -> Rgba<u8> {
        match pixel.root() {
            Some(root) => self.shades[root * SHADE_LEVELS + pixel.level() as usize],
            None => self.non_convergent
        }
    }

    pub fn memory_usage(&self) -> usize {
        self.shades.capacity() * std::mem::size_of::<Rgba<u8>>()
    }
}

// Side length of a block at the given scale factor
#[inline]
pub fn block_size(scale_factor : u32) -> u32 {
    1 << scale_factor
}

// One record per block of the row, each block is sampled at its top left pixel
pub fn calculate_row(
    poly : &Polynomial,
    roots : &RootSet,
    to_complex : &Transform,
    method : IterationMethod,
    scale_factor : u32,
    row : u32,
    pdb_row : &mut [PixelData]
) {
    let block = block_size(scale_factor);
    for (i, pixel) in pdb_row.iter_mut().enumerate() {
        let x = i as u32 * block;
        let start = to_complex.apply_complex(x as f64, row as f64);
        *pixel = PixelData::from_convergence(&iterate(poly, roots, method, start));
    }
}

// Records needed for one row at the given scale factor
pub fn blocks_in_row(width : u32, scale_factor : u32) -> usize {
    let block = block_size(scale_factor);
    ((width + block - 1) / block) as usize
}

// Fill the blocks starting at row with the calculated records
pub fn render_row(
    pdb : &mut PixelDataBuffer,
    pdb_row : &[PixelData],
    scale_factor : u32,
    row : u32,
    palette : &Palette,
    surface : &mut RgbaImage
) {
    let block = block_size(scale_factor);
    let width = pdb.width();
    let last_row = (row + block).min(pdb.height());
    for (i, pixel) in pdb_row.iter().enumerate() {
        let color = palette.color(*pixel);
        let x_start = i as u32 * block;
        let x_end = (x_start + block).min(width);
        for y in row..last_row {
            pdb.row_mut(y)[x_start as usize..x_end as usize].fill(*pixel);
            for x in x_start..x_end {
                surface.put_pixel(x, y, color);
            }
        }
    }
}

pub fn recolor_row(pdb : &PixelDataBuffer, row : u32, palette : &Palette, surface : &mut RgbaImage) {
    for (x, pixel) in pdb.row(row).iter().enumerate() {
        surface.put_pixel(x as u32, row, palette.color(*pixel));
    }
}

// A ring at each root, dark edges around a light centre so it shows on any colour
pub fn draw_root_markers(surface : &mut RgbaImage, roots : &RootSet, view : &Transform) {
    let to_canvas = complex_to_canvas(view, surface.width(), surface.height());
    let black = Rgba([0, 0, 0, 255]);
    let white = Rgba([255, 255, 255, 255]);
    for root in roots.roots() {
        let p = to_canvas.apply(point2(root.re, root.im));
        if !p.x.is_finite() || !p.y.is_finite() || p.x.abs() > 1e6 || p.y.abs() > 1e6 {
            continue;
        }
        let centre = (p.x.round() as i32, p.y.round() as i32);
        draw_hollow_circle_mut(surface, centre, MARKER_RADIUS - 1, black);
        draw_hollow_circle_mut(surface, centre, MARKER_RADIUS + 1, black);
        draw_hollow_circle_mut(surface, centre, MARKER_RADIUS, white);
    }
}

// Whole canvas at full resolution, rows split across threads. Gives the same
// records and pixels as a progressive render run to completion.
pub fn render_parallel(
    poly : &Polynomial,
    roots : &RootSet,
    view : &Transform,
    method : IterationMethod,
    palette : &Palette,
    pdb : &mut PixelDataBuffer,
    surface : &mut RgbaImage
) {
    let (width, height) = (pdb.width(), pdb.height());
    let to_complex = canvas_to_complex(view, width, height);
    pdb.data_mut().par_chunks_mut(width as usize)
        .zip(surface.par_chunks_mut(4 * width as usize))
        .enumerate()
        .for_each(|(row, (pdb_row, pixels))| {
            calculate_row(poly, roots, &to_complex, method, 0, row as u32, pdb_row);
            for (pixel, rgba) in pdb_row.iter().zip(pixels.chunks_exact_mut(4)) {
                rgba.copy_from_slice(&palette.color(*pixel).0);
            }
        });
}

pub fn recolor_parallel(pdb : &PixelDataBuffer, palette : &Palette, surface : &mut RgbaImage) {
    let width = pdb.width() as usize;
    surface.par_chunks_mut(4 * width)
        .enumerate()
        .for_each(|(row, pixels)| {
            for (pixel, rgba) in pdb.row(row as u32).iter().zip(pixels.chunks_exact_mut(4)) {
                rgba.copy_from_slice(&palette.color(*pixel).0);
            }
        });
}

#[cfg(test)]
mod tests {
    use cgmath::assert_abs_diff_eq;

    use super::*;
    use crate::colors::set_root_colors;

    fn cubic() -> (Polynomial, RootSet, Palette) {
        let poly = Polynomial::new(vec![-1.0, 0.0, 0.0, 1.0]).unwrap();
        let mut roots = RootSet::new(&poly).unwrap();
        let settings = RenderSettings::default();
        set_root_colors(&mut roots, &settings);
        let palette = Palette::new(&roots, &settings);
        (poly, roots, palette)
    }

    #[test]
    fn test_settings_from_json() {
        let input = json::parse(r#"{
            "colour_scheme" : "linear",
            "hue_offset" : 90,
            "lightness" : "inverted-parabolic",
            "non_convergence" : "transparent",
            "render_roots" : true
        }"#).unwrap();
        let settings = RenderSettings::from_json(&input).unwrap();
        assert_eq!(settings.color_scheme, ColorScheme::Linear);
        assert_eq!(settings.hue_offset, 90.0);
        assert_eq!(settings.chromaticity, 0.25);
        assert_eq!(settings.lightness_mode, LightnessMode::InvertedParabolic);
        assert_eq!(settings.non_convergence, NonConvergence::Transparent);
        assert!(settings.render_roots);
        assert!(!settings.static_hues);
        let bad = json::parse(r#"{ "lightness" : "sideways" }"#).unwrap();
        assert!(matches!(RenderSettings::from_json(&bad), Err(FractalError::InvalidConfig(_))));
    }

    #[test]
    fn test_dropoff_flattens_shading() {
        let steep = RenderSettings { dropoff : 0.0, ..RenderSettings::default() };
        let flat = RenderSettings { dropoff : 1.0, ..RenderSettings::default() };
        assert_abs_diff_eq!(steep.lightness(0.0), 1.0, epsilon = 1e-12);
        assert!(flat.lightness(0.3) > steep.lightness(0.3));
        assert!(steep.lightness(0.1) > steep.lightness(0.2));
    }

    #[test]
    fn test_lightness_modes() {
        let settings = |lightness_mode| RenderSettings { lightness_mode, ..RenderSettings::default() };
        let t = 0.05;
        let normal = settings(LightnessMode::Normal).lightness(t);
        assert_abs_diff_eq!(settings(LightnessMode::Inverted).lightness(t), 1.0 - normal, epsilon = 1e-12);
        let parabolic = settings(LightnessMode::Parabolic).lightness(t);
        assert_abs_diff_eq!(parabolic, 4.0 * normal * (1.0 - normal), epsilon = 1e-12);
        assert_abs_diff_eq!(
            settings(LightnessMode::InvertedParabolic).lightness(t), 1.0 - parabolic, epsilon = 1e-12
        );
        for mode in LightnessMode::ALL {
            assert_eq!(LightnessMode::from_name(mode.name()), Some(mode));
        }
    }

    #[test]
    fn test_palette_lookup() {
        let (_, roots, palette) = cubic();
        assert_eq!(palette.color(PixelData::NON_CONVERGENT), Rgba([0, 0, 0, 255]));
        let fast = palette.color(PixelData::converged(0, 0.0));
        let slow = palette.color(PixelData::converged(0, 40.0));
        let brightness = |c : Rgba<u8>| c.0[0] as u32 + c.0[1] as u32 + c.0[2] as u32;
        assert!(brightness(fast) > brightness(slow));
        assert_ne!(palette.color(PixelData::converged(0, 6.4)), palette.color(PixelData::converged(1, 6.4)));
        assert!(palette.memory_usage() >= roots.len() * SHADE_LEVELS * 4);
    }

    #[test]
    fn test_calculate_row_samples_block_corners() {
        let (poly, roots, _) = cubic();
        let to_complex = canvas_to_complex(&Transform::identity(), 64, 64);
        let mut coarse = vec![PixelData::default(); blocks_in_row(64, 3)];
        assert_eq!(coarse.len(), 8);
        calculate_row(&poly, &roots, &to_complex, IterationMethod::Newton, 3, 40, &mut coarse);
        let mut fine = vec![PixelData::default(); blocks_in_row(64, 0)];
        calculate_row(&poly, &roots, &to_complex, IterationMethod::Newton, 0, 40, &mut fine);
        for (i, pixel) in coarse.iter().enumerate() {
            assert_eq!(*pixel, fine[i * 8]);
        }
        assert!(fine.iter().any(|pixel| pixel.root().is_some()));
    }

    #[test]
    fn test_render_row_fills_blocks() {
        let (poly, roots, palette) = cubic();
        let mut pdb = PixelDataBuffer::new(20, 20);
        let mut surface = RgbaImage::new(20, 20);
        let to_complex = canvas_to_complex(&Transform::identity(), 20, 20);
        let mut row = vec![PixelData::default(); blocks_in_row(20, 3)];
        assert_eq!(row.len(), 3);
        calculate_row(&poly, &roots, &to_complex, IterationMethod::Newton, 3, 16, &mut row);
        render_row(&mut pdb, &row, 3, 16, &palette, &mut surface);
        // The last block is clipped to the 4x4 corner of the canvas
        for y in 16..20 {
            for x in 0..20 {
                let block = row[(x / 8) as usize];
                assert_eq!(pdb.get(x, y), block);
                assert_eq!(*surface.get_pixel(x, y), palette.color(block));
            }
        }
        assert_eq!(*surface.get_pixel(0, 15), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn test_recolor_row_only_reads_cache() {
        let (poly, mut roots, palette) = cubic();
        let mut pdb = PixelDataBuffer::new(16, 16);
        let mut surface = RgbaImage::new(16, 16);
        render_parallel(&poly, &roots, &Transform::identity(), IterationMethod::Newton, &palette, &mut pdb, &mut surface);
        let settings = RenderSettings { hue_offset : 120.0, ..RenderSettings::default() };
        set_root_colors(&mut roots, &settings);
        let recolored = Palette::new(&roots, &settings);
        recolor_row(&pdb, 5, &recolored, &mut surface);
        for x in 0..16 {
            assert_eq!(*surface.get_pixel(x, 5), recolored.color(pdb.get(x, 5)));
        }
        let mut again = surface.clone();
        recolor_parallel(&pdb, &recolored, &mut again);
        assert_eq!(again.get_pixel(3, 5), surface.get_pixel(3, 5));
    }

    #[test]
    fn test_root_markers_drawn_at_roots() {
        let (_, roots, _) = cubic();
        let mut surface = RgbaImage::new(200, 200);
        draw_root_markers(&mut surface, &roots, &Transform::identity());
        // Root 1 sits at canvas x = 100 + 1 / 1.5 * 100
        let x = (100.0f64 + 100.0 / 1.5).round() as u32;
        assert_eq!(*surface.get_pixel(x + MARKER_RADIUS as u32, 100), Rgba([255, 255, 255, 255]));
        assert_eq!(*surface.get_pixel(x + MARKER_RADIUS as u32 + 1, 100), Rgba([0, 0, 0, 255]));
        assert_eq!(*surface.get_pixel(x, 100), Rgba([0, 0, 0, 0]));
    }
}
