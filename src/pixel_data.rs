// Cached per pixel convergence results
//
// A record is 16 bits: the top 4 hold the root index, 15 marking a pixel
// that did not converge, the low 12 hold the smooth iteration count as a
// fraction of the iteration cap. Recoloring reads only these.

use crate::iteration::Convergence;
use crate::{MAX_DEGREE, MAX_ITERATIONS};

const FRACTION_BITS : u32 = 12;
const FRACTION_MAX : u16 = (1 << FRACTION_BITS) - 1;
const NON_CONVERGENT_INDEX : u16 = MAX_DEGREE as u16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelData(u16);

impl Default for PixelData {
    fn default() -> PixelData {
        PixelData::NON_CONVERGENT
    }
}

impl PixelData {
    pub const NON_CONVERGENT : PixelData = PixelData(u16::MAX);

    pub fn converged(root : usize, smooth : f64) -> PixelData {
        debug_assert!(root < MAX_DEGREE, "Root index {} does not fit a pixel record", root);
        let fraction = (smooth / MAX_ITERATIONS as f64).clamp(0.0, 1.0);
        let quantised = (fraction * FRACTION_MAX as f64).round() as u16;
        PixelData(((root as u16) << FRACTION_BITS) | quantised)
    }

    pub fn from_convergence(convergence : &Convergence) -> PixelData {
        match convergence {
            Convergence::Converged { root, smooth, .. } => PixelData::converged(*root, *smooth),
            Convergence::NonConvergent { .. } => PixelData::NON_CONVERGENT
        }
    }

    pub fn root(&self) -> Option<usize> {
        let index = self.0 >> FRACTION_BITS;
        if index == NON_CONVERGENT_INDEX {
            None
        } else {
            Some(index as usize)
        }
    }

    // How far through the iteration cap the pixel converged, 0 to 1
    pub fn fraction(&self) -> f64 {
        (self.0 & FRACTION_MAX) as f64 / FRACTION_MAX as f64
    }

    // Fraction truncated to 8 bits
    #[inline]
    pub fn level(&self) -> u8 {
        ((self.0 & FRACTION_MAX) >> (FRACTION_BITS - 8)) as u8
    }
}

// Row major grid of records covering the whole canvas
#[derive(Debug, Clone)]
pub struct PixelDataBuffer {
    width : u32,
    height : u32,
    data : Vec<PixelData>
}

impl PixelDataBuffer {
    pub fn new(width : u32, height : u32) -> PixelDataBuffer {
        PixelDataBuffer {
            width,
            height,
            data : vec![PixelData::default(); (width * height) as usize]
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn clear(&mut self) {
        self.data.fill(PixelData::default());
    }

    #[inline]
    pub fn get(&self, x : u32, y : u32) -> PixelData {
        self.data[(y * self.width + x) as usize]
    }

    pub fn row(&self, y : u32) -> &[PixelData] {
        let start = (y * self.width) as usize;
        &self.data[start..start + self.width as usize]
    }

    pub fn row_mut(&mut self, y : u32) -> &mut [PixelData] {
        let start = (y * self.width) as usize;
        let width = self.width as usize;
        &mut self.data[start..start + width]
    }

    pub fn data_mut(&mut self) -> &mut [PixelData] {
        &mut self.data
    }

    pub fn memory_usage(&self) -> usize {
        self.data.capacity() * std::mem::size_of::<PixelData>()
    }
}
