// Load a json file that describes the fractal to render and write it out
// as a png, or a directory of numbered pngs for an animation

use std::io::{Error, Read, ErrorKind};
use std::fs::{File, create_dir_all};
use std::env;
use std::path::Path;

use image::RgbaImage;
use json::JsonValue;
use log::info;

use newton_fractal::animation::{run_to_completion, Animation};
use newton_fractal::config::RenderJob;
use newton_fractal::RenderStateData;

fn make_directory_for_image(path_str : &str) -> std::io::Result<()> {
    let path = Path::new(path_str);
    if let Some(dir) = path.parent() {
        create_dir_all(dir)
    } else {
        Ok(())
    }
}

fn save_image(image : &RgbaImage, path : &str) -> std::io::Result<()> {
    make_directory_for_image(path)?;
    image.save(path).map_err(
        |err| Error::new(ErrorKind::InvalidData, format!("Couldn't write image {}: {}", path, err))
    )
}

fn make_image(input : &JsonValue) -> std::io::Result<RgbaImage> {
    let job = RenderJob::from_json(input)?;
    let mut session = RenderStateData::new(job.resolution, job.resolution);
    let mut surface = RgbaImage::new(job.resolution, job.resolution);
    session.calculate(job.polynomial.coefficients(), job.transform, job.method, job.settings)?;
    run_to_completion(&mut session, &mut surface, job.progressive);
    info!("Numeric engine held {} bytes", session.memory_usage());
    Ok(surface)
}

fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    // Get file to use else default
    let in_filename = env::args().nth(1).unwrap_or("input.json".to_string());
    let out_filename = env::args().nth(2).unwrap_or("output.png".to_string());
    info!("Loading input file: {}", in_filename);
    let mut file = File::open(in_filename)?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    let input = json::parse(&contents).map_err(
        |_| Error::new(ErrorKind::InvalidData, "Couldn't parse input")
    )?;
    let out_filename_base = out_filename.strip_suffix(".png").unwrap_or(&out_filename);
    match input["algorithm"].as_str().unwrap_or("none") {
        "newton-fractal" => {
            let image = make_image(&input)?;
            info!("Writing output to {}", out_filename);
            save_image(&image, &out_filename)
        },
        "animation" => {
            let animation = Animation::from_json(&input)?;
            info!("Rendering {} frames into {}/", animation.frames_count(), out_filename_base);
            animation.render(|i, image| save_image(image, &format!("{}/{}.png", out_filename_base, i)))
        },
        _ => Err(Error::new(ErrorKind::InvalidData, "Unknown algorithm"))
    }
}
