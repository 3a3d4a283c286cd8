// Animate a render job by varying its parameters over time
//
// {
//     "algorithm" : "animation",
//     "frames_count" : 120,
//     "base" : { "polynomial" : [1, 0, 0, -1], ... },
//     "curves" : [
//         { "param" : "scale", "coeff" : [-0.9, 1] },
//         { "param" : "polynomial/3", "coeff" : [2, -1] }
//     ]
// }
//
// Each curve sets the parameter at a '/' separated path in the base job to a
// polynomial in time, time running from 0 to 1 over the animation. All frames
// share one render session, so frames that only differ in colour are
// recolored from cached pixel data rather than recalculated.

use image::RgbaImage;
use json::JsonValue;
use log::info;

use crate::config::RenderJob;
use crate::error::FractalError;
use crate::state_machine::RenderStateData;

#[derive(Debug, Clone, PartialEq)]
struct ParameterCurve {
    path : Vec<String>,
    // Lowest power first
    coefficients : Vec<f64>,
    integral : bool
}

impl ParameterCurve {
    fn from_json(input : &JsonValue) -> Result<ParameterCurve, FractalError> {
        let path = input["param"].as_str().ok_or(
            FractalError::InvalidConfig("Curve is missing its param".to_string())
        )?;
        if !input["coeff"].is_array() {
            return Err(FractalError::InvalidConfig(format!("Curve for {} has no coefficients", path)));
        }
        let coefficients = input["coeff"].members().map(
            |value| value.as_f64().ok_or(
                FractalError::InvalidConfig(format!("Curve coefficient {} is not a number", value))
            )
        ).collect::<Result<Vec<f64>, FractalError>>()?;
        Ok(ParameterCurve {
            path : path.split('/').map(|name| name.to_string()).collect(),
            coefficients : coefficients.into_iter().rev().collect(),
            integral : input["integral"].as_bool().unwrap_or(false)
        })
    }

    fn value_at(&self, time : f64) -> JsonValue {
        let value = self.coefficients.iter().rev().fold(0.0, |acc, coeff| acc * time + coeff);
        if self.integral {
            JsonValue::from(value.round() as i64)
        } else {
            JsonValue::from(value)
        }
    }

    fn apply(&self, frame : &mut JsonValue, time : f64) {
        let mut target = frame;
        for name in self.path.iter() {
            let parent = target;
            target = if parent.is_array() {
                &mut parent[name.parse::<usize>().unwrap_or(0)]
            } else {
                &mut parent[name.as_str()]
            };
        }
        *target = self.value_at(time);
    }
}

#[derive(Debug, Clone)]
pub struct Animation {
    base : JsonValue,
    frames_count : usize,
    curves : Vec<ParameterCurve>
}

// What has to be redone between two consecutive frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameChange {
    Nothing,
    Colors,
    View,
    Everything
}

fn frame_change(previous : &RenderJob, next : &RenderJob) -> FrameChange {
    if previous.polynomial != next.polynomial || previous.resolution != next.resolution {
        FrameChange::Everything
    } else if previous.transform != next.transform || previous.method != next.method {
        FrameChange::View
    } else if previous.settings != next.settings {
        FrameChange::Colors
    } else {
        FrameChange::Nothing
    }
}

impl Animation {
    pub fn from_json(input : &JsonValue) -> Result<Animation, FractalError> {
        if !input["base"].is_object() {
            return Err(FractalError::InvalidConfig("Missing base job".to_string()));
        }
        let curves = if input["curves"].is_null() {
            Vec::new()
        } else if input["curves"].is_array() {
            input["curves"].members().map(ParameterCurve::from_json).collect::<Result<Vec<_>, _>>()?
        } else {
            return Err(FractalError::InvalidConfig("Curves should be a list".to_string()));
        };
        Ok(Animation {
            base : input["base"].clone(),
            frames_count : input["frames_count"].as_usize().unwrap_or(60),
            curves
        })
    }

    pub fn frames_count(&self) -> usize {
        self.frames_count
    }

    // The job for a frame as json, the base with every curve applied
    pub fn frame(&self, index : usize) -> JsonValue {
        let time = index as f64 / self.frames_count as f64;
        let mut frame = self.base.clone();
        for curve in self.curves.iter() {
            curve.apply(&mut frame, time);
        }
        frame
    }

    pub fn jobs(&self) -> Result<Vec<RenderJob>, FractalError> {
        (0..self.frames_count).map(|i| RenderJob::from_json(&self.frame(i))).collect()
    }

    // Render every frame in order, handing each to save as it completes
    pub fn render<F>(&self, mut save : F) -> std::io::Result<()>
    where F : FnMut(usize, &RgbaImage) -> std::io::Result<()> {
        let jobs = self.jobs()?;
        let mut session : Option<(RenderStateData, RgbaImage)> = None;
        let mut previous : Option<&RenderJob> = None;
        for (i, job) in jobs.iter().enumerate() {
            let change = previous.map_or(FrameChange::Everything, |previous| frame_change(previous, job));
            info!("Frame {} of {} ({:?})", i + 1, jobs.len(), change);
            if session.as_ref().map_or(false, |(state, _)| state.size() != (job.resolution, job.resolution)) {
                session = None;
            }
            let (state, surface) = session.get_or_insert_with(|| (
                RenderStateData::new(job.resolution, job.resolution),
                RgbaImage::new(job.resolution, job.resolution)
            ));
            match change {
                FrameChange::Everything => state.calculate(
                    job.polynomial.coefficients(), job.transform, job.method, job.settings.clone()
                )?,
                FrameChange::View => state.recalculate(job.transform, job.method, job.settings.clone())?,
                FrameChange::Colors => state.recolor(job.settings.clone())?,
                FrameChange::Nothing => {}
            }
            run_to_completion(state, surface, job.progressive);
            save(i, &*surface)?;
            previous = Some(job);
        }
        Ok(())
    }
}

// Drive the session until its current pass is done
pub fn run_to_completion(state : &mut RenderStateData, surface : &mut RgbaImage, progressive : bool) {
    if progressive {
        let mut frames = 0;
        while state.step(surface) {
            frames += 1;
        }
        info!("Progressive render took {} frames", frames + 1);
    } else {
        state.finish(surface);
    }
    if let Some(elapsed) = state.take_done() {
        info!("Rendered in {:.1}ms", elapsed.as_secs_f64() * 1000.0);
    }
}
