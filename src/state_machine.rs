// Progressive rendering of one fractal session
//
// A render pass computes the canvas in 32x32 blocks, then 16x16 and so on
// down to single pixels. A recolor pass repaints every row from the cached
// pixel data. Both are advanced a row at a time by step, which stops once its
// time budget is used so a host can call it once per frame.

use std::time::{Duration, Instant};

use image::RgbaImage;
use log::{debug, info, warn};

use crate::colors::set_root_colors;
use crate::error::FractalError;
use crate::iteration::IterationMethod;
use crate::pixel_data::{PixelData, PixelDataBuffer};
use crate::polynomial::Polynomial;
use crate::render::{
    block_size, blocks_in_row, calculate_row, draw_root_markers, recolor_parallel,
    recolor_row, render_parallel, render_row, Palette, RenderSettings
};
use crate::roots::RootSet;
use crate::transform::{canvas_to_complex, Transform};
use crate::{FRAME_BUDGET, MAX_SCALE_FACTOR};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    RenderPass,
    RecolorPass,
    Done
}

// Next row to process and the block size of the current pass as a power of 2
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub row : u32,
    pub scale_factor : u32
}

impl Cursor {
    fn coarsest() -> Cursor {
        Cursor { row : 0, scale_factor : MAX_SCALE_FACTOR }
    }

    fn finest() -> Cursor {
        Cursor { row : 0, scale_factor : 0 }
    }
}

// Everything derived from one polynomial, dropped as a whole on a new calculate
pub struct FractalData {
    polynomial : Polynomial,
    roots : RootSet,
    pdb : PixelDataBuffer,
    palette : Palette,
    // Scratch records for the row being calculated
    row_buffer : Vec<PixelData>
}

impl FractalData {
    pub fn polynomial(&self) -> &Polynomial {
        &self.polynomial
    }

    pub fn roots(&self) -> &RootSet {
        &self.roots
    }

    pub fn pixel_data(&self) -> &PixelDataBuffer {
        &self.pdb
    }

    fn memory_usage(&self) -> usize {
        self.polynomial.coefficients().len() * std::mem::size_of::<f64>()
            + self.roots.memory_usage()
            + self.pdb.memory_usage()
            + self.palette.memory_usage()
            + self.row_buffer.capacity() * std::mem::size_of::<PixelData>()
    }
}

pub struct RenderStateData {
    width : u32,
    height : u32,
    state : RenderState,
    cursor : Cursor,
    transform : Transform,
    method : IterationMethod,
    settings : RenderSettings,
    fractal : Option<FractalData>,
    started : Instant,
    // Elapsed time of the last finished pass, until it is taken
    done : Option<Duration>
}

impl RenderStateData {
    pub fn new(width : u32, height : u32) -> RenderStateData {
        RenderStateData {
            width,
            height,
            state : RenderState::Done,
            cursor : Cursor::finest(),
            transform : Transform::identity(),
            method : IterationMethod::Newton,
            settings : RenderSettings::default(),
            fractal : None,
            started : Instant::now(),
            done : None
        }
    }

    pub fn state(&self) -> RenderState {
        self.state
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn method(&self) -> IterationMethod {
        self.method
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn fractal(&self) -> Option<&FractalData> {
        self.fractal.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.state != RenderState::Done
    }

    // Bytes held by the numeric engine
    pub fn memory_usage(&self) -> usize {
        self.fractal.as_ref().map_or(0, FractalData::memory_usage)
    }

    // Elapsed time of the pass that last reached Done, once per pass
    pub fn take_done(&mut self) -> Option<Duration> {
        self.done.take()
    }

    fn start_pass(&mut self, state : RenderState, cursor : Cursor) {
        self.state = state;
        self.cursor = cursor;
        self.started = Instant::now();
        self.done = None;
    }

    // New polynomial: everything is rebuilt from the coefficients, lowest
    // power first. A bad polynomial leaves the session untouched.
    pub fn calculate(
        &mut self,
        coefficients : &[f64],
        transform : Transform,
        method : IterationMethod,
        settings : RenderSettings
    ) -> Result<(), FractalError> {
        let polynomial = Polynomial::new(coefficients.to_vec()).map_err(|err| {
            warn!("Rejected calculate: {}", err);
            err
        })?;
        self.fractal = None;
        let mut roots = match RootSet::new(&polynomial) {
            Ok(roots) => roots,
            Err(err) => {
                warn!("Abandoned calculate of {}: {}", polynomial, err);
                self.state = RenderState::Done;
                return Err(err);
            }
        };
        set_root_colors(&mut roots, &settings);
        let palette = Palette::new(&roots, &settings);
        info!("Calculating {} with {} roots using {}", polynomial, roots.len(), method.name());
        self.fractal = Some(FractalData {
            polynomial,
            roots,
            pdb : PixelDataBuffer::new(self.width, self.height),
            palette,
            row_buffer : Vec::with_capacity(self.width as usize)
        });
        self.transform = transform;
        self.method = method;
        self.settings = settings;
        self.start_pass(RenderState::RenderPass, Cursor::coarsest());
        Ok(())
    }

    // Same polynomial and roots, new view or method
    pub fn recalculate(
        &mut self,
        transform : Transform,
        method : IterationMethod,
        settings : RenderSettings
    ) -> Result<(), FractalError> {
        let fractal = match self.fractal.as_mut() {
            Some(fractal) => fractal,
            None => {
                warn!("Rejected recalculate: {}", FractalError::NoFractalData);
                return Err(FractalError::NoFractalData);
            }
        };
        set_root_colors(&mut fractal.roots, &settings);
        fractal.palette = Palette::new(&fractal.roots, &settings);
        fractal.pdb.clear();
        info!("Recalculating {} using {}", fractal.polynomial, method.name());
        self.transform = transform;
        self.method = method;
        self.settings = settings;
        self.start_pass(RenderState::RenderPass, Cursor::coarsest());
        Ok(())
    }

    // New colours over the cached pixel data. While a render pass is still
    // filling that data the whole view is recalculated instead.
    pub fn recolor(&mut self, settings : RenderSettings) -> Result<(), FractalError> {
        if self.state == RenderState::RenderPass {
            debug!("Recolor during a render pass, recalculating");
            return self.recalculate(self.transform, self.method, settings);
        }
        let fractal = match self.fractal.as_mut() {
            Some(fractal) => fractal,
            None => {
                warn!("Rejected recolor: {}", FractalError::NoFractalData);
                return Err(FractalError::NoFractalData);
            }
        };
        set_root_colors(&mut fractal.roots, &settings);
        fractal.palette = Palette::new(&fractal.roots, &settings);
        info!("Recoloring {}", fractal.polynomial);
        self.settings = settings;
        self.start_pass(RenderState::RecolorPass, Cursor::finest());
        Ok(())
    }

    // Work for one frame, true while there is more to do
    pub fn step(&mut self, surface : &mut RgbaImage) -> bool {
        self.step_with_budget(surface, FRAME_BUDGET)
    }

    // At least one row of work, then rows until the budget is spent
    pub fn step_with_budget(&mut self, surface : &mut RgbaImage, budget : Duration) -> bool {
        if !self.is_running() {
            return false;
        }
        self.check_surface(surface);
        let start = Instant::now();
        loop {
            self.step_row(surface);
            if !self.is_running() || start.elapsed() >= budget {
                break;
            }
        }
        self.is_running()
    }

    // Exactly the given number of rows of work, or fewer if the pass ends
    pub fn step_rows(&mut self, surface : &mut RgbaImage, rows : usize) -> bool {
        if !self.is_running() {
            return false;
        }
        self.check_surface(surface);
        for _ in 0..rows {
            if !self.is_running() {
                break;
            }
            self.step_row(surface);
        }
        self.is_running()
    }

    // Finish the current pass in one go at full resolution across threads
    pub fn finish(&mut self, surface : &mut RgbaImage) {
        if !self.is_running() {
            return;
        }
        self.check_surface(surface);
        let fractal = fractal_for_pass(&mut self.fractal);
        match self.state {
            RenderState::RenderPass => render_parallel(
                &fractal.polynomial,
                &fractal.roots,
                &self.transform,
                self.method,
                &fractal.palette,
                &mut fractal.pdb,
                surface
            ),
            RenderState::RecolorPass => recolor_parallel(&fractal.pdb, &fractal.palette, surface),
            RenderState::Done => {}
        }
        self.complete_pass(surface);
    }

    fn check_surface(&self, surface : &RgbaImage) {
        assert_eq!(
            surface.dimensions(), (self.width, self.height),
            "Surface should match the session's canvas size"
        );
    }

    fn step_row(&mut self, surface : &mut RgbaImage) {
        let fractal = fractal_for_pass(&mut self.fractal);
        match self.state {
            RenderState::RenderPass => {
                let Cursor { row, scale_factor } = self.cursor;
                let to_complex = canvas_to_complex(&self.transform, self.width, self.height);
                fractal.row_buffer.resize(blocks_in_row(self.width, scale_factor), PixelData::default());
                calculate_row(
                    &fractal.polynomial,
                    &fractal.roots,
                    &to_complex,
                    self.method,
                    scale_factor,
                    row,
                    &mut fractal.row_buffer
                );
                render_row(&mut fractal.pdb, &fractal.row_buffer, scale_factor, row, &fractal.palette, surface);
                self.cursor.row += block_size(scale_factor);
                if self.cursor.row >= self.height {
                    if scale_factor == 0 {
                        self.complete_pass(surface);
                    } else {
                        debug!("Finished {}x{} blocks", block_size(scale_factor), block_size(scale_factor));
                        self.cursor = Cursor { row : 0, scale_factor : scale_factor - 1 };
                    }
                }
            },
            RenderState::RecolorPass => {
                recolor_row(&fractal.pdb, self.cursor.row, &fractal.palette, surface);
                self.cursor.row += 1;
                if self.cursor.row >= self.height {
                    self.complete_pass(surface);
                }
            },
            RenderState::Done => {}
        }
    }

    fn complete_pass(&mut self, surface : &mut RgbaImage) {
        if self.settings.render_roots {
            if let Some(fractal) = self.fractal.as_ref() {
                draw_root_markers(surface, &fractal.roots, &self.transform);
            }
        }
        let elapsed = self.started.elapsed();
        info!("{:?} finished in {:.1}ms", self.state, elapsed.as_secs_f64() * 1000.0);
        self.state = RenderState::Done;
        self.cursor = Cursor::finest();
        self.done = Some(elapsed);
    }
}

fn fractal_for_pass(fractal : &mut Option<FractalData>) -> &mut FractalData {
    match fractal {
        Some(fractal) => fractal,
        None => panic!("A render or recolor pass is running without fractal data")
    }
}
