// A single render described by a json job file, for example
//
// {
//     "algorithm" : "newton-fractal",
//     "polynomial" : [1, 0, 0, -1],
//     "method" : "halley",
//     "resolution" : 1024,
//     "scale" : 0.5, "centre_x" : 0.2, "centre_y" : 0.0,
//     "colour_scheme" : "contrasting", "dropoff" : 0.3
// }

use json::JsonValue;

use crate::error::FractalError;
use crate::iteration::IterationMethod;
use crate::polynomial::Polynomial;
use crate::render::RenderSettings;
use crate::transform::Transform;
use crate::CANVAS_SIZE;

#[derive(Debug, Clone, PartialEq)]
pub struct RenderJob {
    pub polynomial : Polynomial,
    pub method : IterationMethod,
    pub resolution : u32,
    pub transform : Transform,
    pub settings : RenderSettings,
    // Drive the frame budgeted passes rather than one parallel render
    pub progressive : bool
}

impl RenderJob {
    pub fn from_json(input : &JsonValue) -> Result<RenderJob, FractalError> {
        let polynomial = Polynomial::from_json(&input["polynomial"])?;
        let method = match input["method"].as_str() {
            None => IterationMethod::Newton,
            Some(name) => IterationMethod::from_name(name).ok_or(
                FractalError::InvalidConfig(format!("Unknown method '{}'", name))
            )?
        };
        let resolution = input["resolution"].as_u32().unwrap_or(CANVAS_SIZE);
        if resolution == 0 {
            return Err(FractalError::InvalidConfig("Resolution must be positive".to_string()));
        }
        let transform = Transform::from_json(input);
        if !(transform.scale.is_finite() && transform.scale > 0.0) {
            return Err(FractalError::InvalidConfig("Scale must be positive".to_string()));
        }
        Ok(RenderJob {
            polynomial,
            method,
            resolution,
            transform,
            settings : RenderSettings::from_json(input)?,
            progressive : input["progressive"].as_bool().unwrap_or(false)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colors::ColorScheme;

    #[test]
    fn test_defaults() {
        let input = json::parse(r#"{ "algorithm" : "newton-fractal", "polynomial" : [1, 0, -1] }"#).unwrap();
        let job = RenderJob::from_json(&input).unwrap();
        assert_eq!(job.polynomial.degree(), 2);
        assert_eq!(job.method, IterationMethod::Newton);
        assert_eq!(job.resolution, CANVAS_SIZE);
        assert_eq!(job.transform, Transform::identity());
        assert_eq!(job.settings, RenderSettings::default());
        assert!(!job.progressive);
    }

    #[test]
    fn test_full_job() {
        let input = json::parse(r#"{
            "polynomial" : [1, 0, 0, -1],
            "method" : "householder3",
            "resolution" : 800,
            "scale" : 0.5, "centre_x" : 0.2, "centre_y" : -0.1,
            "colour_scheme" : "monochromatic",
            "progressive" : true
        }"#).unwrap();
        let job = RenderJob::from_json(&input).unwrap();
        assert_eq!(job.method, IterationMethod::Householder3);
        assert_eq!(job.resolution, 800);
        assert_eq!(job.transform, Transform::new(0.5, 0.2, -0.1));
        assert_eq!(job.settings.color_scheme, ColorScheme::Monochromatic);
        assert!(job.progressive);
    }

    #[test]
    fn test_rejects_bad_jobs() {
        for text in [
            r#"{ "polynomial" : [0, 0] }"#,
            r#"{ "polynomial" : [1, -1], "method" : "bisection" }"#,
            r#"{ "polynomial" : [1, -1], "scale" : 0 }"#,
            r#"{ "polynomial" : [1, -1], "resolution" : 0 }"#,
            r#"{ "method" : "newton" }"#
        ] {
            assert!(RenderJob::from_json(&json::parse(text).unwrap()).is_err(), "{}", text);
        }
    }
}
