// End to end renders through the public session api

use image::{Rgba, RgbaImage};
use num::complex::Complex;

use newton_fractal::pixel_data::PixelData;
use newton_fractal::{
    IterationMethod, NonConvergence, RenderSettings, RenderState, RenderStateData, Transform
};

const SIZE : u32 = 128;

fn cube_roots_of_unity(method : IterationMethod, settings : RenderSettings) -> (RenderStateData, RgbaImage) {
    let mut session = RenderStateData::new(SIZE, SIZE);
    session.calculate(&[-1.0, 0.0, 0.0, 1.0], Transform::identity(), method, settings).unwrap();
    (session, RgbaImage::new(SIZE, SIZE))
}

#[test]
fn cube_roots_render_into_three_basins() {
    let (mut session, mut surface) = cube_roots_of_unity(IterationMethod::Newton, RenderSettings::default());
    while session.step(&mut surface) {}
    assert_eq!(session.state(), RenderState::Done);
    assert!(session.take_done().is_some());

    let fractal = session.fractal().unwrap();
    let roots = fractal.roots().roots();
    assert_eq!(roots.len(), 3);
    for root in roots {
        let cubed = root * root * root;
        assert!((cubed - Complex::new(1.0, 0.0)).norm() < 1e-9);
    }

    let mut counts = [0usize; 4];
    for y in 0..SIZE {
        for pixel in fractal.pixel_data().row(y) {
            match pixel.root() {
                Some(root) => counts[root] += 1,
                None => counts[3] += 1
            }
        }
    }
    let total = (SIZE * SIZE) as usize;
    assert_eq!(counts.iter().sum::<usize>(), total);
    // Every basin is a sizeable share of the view, non-convergence is rare
    for count in &counts[..3] {
        assert!(*count > total / 6, "{:?}", counts);
    }
    assert!(counts[3] < total / 100, "{:?}", counts);

    // Near a root the pixel goes to that root
    let to_canvas = newton_fractal::transform::complex_to_canvas(&Transform::identity(), SIZE, SIZE);
    for (i, root) in roots.iter().enumerate() {
        let p = to_canvas.apply(cgmath::point2(root.re * 0.9, root.im * 0.9));
        assert_eq!(fractal.pixel_data().get(p.x as u32, p.y as u32).root(), Some(i));
    }
}

#[test]
fn progressive_and_parallel_renders_agree() {
    for method in IterationMethod::ALL {
        let settings = RenderSettings { render_roots : true, ..RenderSettings::default() };
        let (mut progressive, mut stepped) = cube_roots_of_unity(method, settings.clone());
        while progressive.step_rows(&mut stepped, 5) {}
        let (mut parallel, mut finished) = cube_roots_of_unity(method, settings);
        parallel.finish(&mut finished);
        assert!(stepped == finished, "{:?} renders differ", method);
    }
}

#[test]
fn recolor_changes_colours_not_basins() {
    let (mut session, mut surface) = cube_roots_of_unity(IterationMethod::Halley, RenderSettings::default());
    session.finish(&mut surface);
    let before = surface.clone();
    let pdb : Vec<Vec<PixelData>> = (0..SIZE).map(
        |y| session.fractal().unwrap().pixel_data().row(y).to_vec()
    ).collect();

    let settings = RenderSettings {
        hue_offset : 180.0,
        non_convergence : NonConvergence::White,
        ..RenderSettings::default()
    };
    session.recolor(settings).unwrap();
    assert_eq!(session.state(), RenderState::RecolorPass);
    while session.step(&mut surface) {}
    assert!(surface != before);
    for y in 0..SIZE {
        assert_eq!(session.fractal().unwrap().pixel_data().row(y), &pdb[y as usize][..]);
        for x in 0..SIZE {
            if pdb[y as usize][x as usize].root().is_none() {
                assert_eq!(*surface.get_pixel(x, y), Rgba([255, 255, 255, 255]));
            }
        }
    }
}

#[test]
fn zoom_recalculates_with_same_roots() {
    let (mut session, mut surface) = cube_roots_of_unity(IterationMethod::Newton, RenderSettings::default());
    session.finish(&mut surface);
    let roots = session.fractal().unwrap().roots().roots().to_vec();
    // Zoomed far into the basin of the root at 1 everything converges there
    let zoomed = Transform::new(0.01, 1.0, 0.0);
    session.recalculate(zoomed, IterationMethod::Newton, RenderSettings::default()).unwrap();
    session.finish(&mut surface);
    let fractal = session.fractal().unwrap();
    assert_eq!(fractal.roots().roots(), &roots[..]);
    let at_one = roots.iter().position(|root| (root - Complex::new(1.0, 0.0)).norm() < 1e-9).unwrap();
    assert!((0..SIZE).all(|y| fractal.pixel_data().row(y).iter().all(|p| p.root() == Some(at_one))));
}

#[test]
fn failed_calculate_keeps_previous_image() {
    let (mut session, mut surface) = cube_roots_of_unity(IterationMethod::Newton, RenderSettings::default());
    session.finish(&mut surface);
    session.take_done();
    let before = surface.clone();
    assert!(session.calculate(&[0.0, 0.0], Transform::identity(), IterationMethod::Newton, RenderSettings::default())
        .is_err());
    assert!(!session.step(&mut surface));
    assert!(surface == before);
    assert_eq!(session.take_done(), None);
}

#[test]
fn repeated_roots_render_into_their_basins() {
    // z^4 and (z - 1)^3: f' vanishes at the root itself
    for coefficients in [vec![0.0, 0.0, 0.0, 0.0, 1.0], vec![-1.0, 3.0, -3.0, 1.0]] {
        for method in IterationMethod::ALL {
            // Far from a high order root Steffensen's step shrinks to nothing
            if method == IterationMethod::Steffensen {
                continue;
            }
            let mut session = RenderStateData::new(64, 64);
            let mut surface = RgbaImage::new(64, 64);
            session.calculate(&coefficients, Transform::identity(), method, RenderSettings::default()).unwrap();
            session.finish(&mut surface);
            let fractal = session.fractal().unwrap();
            assert_eq!(fractal.roots().len(), 1);
            let stuck = (0..64).map(
                |y| fractal.pixel_data().row(y).iter().filter(|p| p.root().is_none()).count()
            ).sum::<usize>();
            assert!(stuck < 64 * 64 / 100, "{:?} left {} pixels non-convergent for {:?}", method, stuck, coefficients);
        }
    }
}
