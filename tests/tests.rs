use nbody_sim::{Body, Canvas, FrameCanvas, Simulation, SpriteSheet, Universe, Viewport};

/// Records every placement instead of drawing it.
#[derive(Default)]
struct RecordingCanvas {
    placed: Vec<(f64, f64, String)>,
}

impl Canvas for RecordingCanvas {
    fn picture(&mut self, x: f64, y: f64, name: &str) {
        self.placed.push((x, y, name.to_string()));
    }
}

fn assert_close(actual: f64, expected: f64) {
    let tolerance = 1e-12 * expected.abs().max(1.0);
    assert!(
        (actual - expected).abs() <= tolerance,
        "expected {expected}, got {actual}"
    );
}

fn scattered() -> Vec<Body> {
    vec![
        Body::new(1.2e10, -3.4e9, 0.0, 0.0, 7.0e25, "a.gif"),
        Body::new(-5.0e9, 8.8e9, 0.0, 0.0, 2.0e24, "b.gif"),
        Body::new(3.0e8, 2.0e8, 0.0, 0.0, 1.0e30, "c.gif"),
        Body::new(-9.1e10, -4.0e10, 0.0, 0.0, 6.0e23, "d.gif"),
    ]
}

// ==================================================================================
// Pairwise properties
// ==================================================================================

#[test]
fn distance_and_force_are_symmetric() {
    let bodies = scattered();
    for a in &bodies {
        for b in &bodies {
            if a == b {
                continue;
            }
            assert_close(a.calc_distance(b), b.calc_distance(a));
            assert_close(a.calc_force_exerted_by(b), b.calc_force_exerted_by(a));
        }
    }
}

#[test]
fn components_recombine_to_magnitude() {
    let bodies = scattered();
    for a in &bodies {
        for b in &bodies {
            if a == b {
                continue;
            }
            let fx = a.calc_force_exerted_by_x(b);
            let fy = a.calc_force_exerted_by_y(b);
            let magnitude = a.calc_force_exerted_by(b);
            assert!(((fx * fx + fy * fy).sqrt() - magnitude).abs() <= 1e-9 * magnitude);
        }
    }
}

#[test]
fn net_force_over_self_alone_is_zero() {
    let bodies = vec![Body::new(4.0, -2.0, 1.0, 1.0, 3.0, "lonely.gif")];
    assert_eq!(bodies[0].calc_net_force_exerted_by_x(&bodies, 0), 0.0);
    assert_eq!(bodies[0].calc_net_force_exerted_by_y(&bodies, 0), 0.0);
}

#[test]
fn identical_bodies_in_other_slots_are_not_skipped() {
    let twin = Body::new(0.0, 0.0, 0.0, 0.0, 1.0e20, "twin.gif");
    let bodies = vec![twin.clone(), Body::new(1.0e6, 0.0, 0.0, 0.0, 1.0e20, "far.gif"), twin];
    // Slot 2 coincides with slot 0, so the sum is no longer finite.
    assert!(!bodies[0].calc_net_force_exerted_by_x(&bodies, 0).is_finite());
}

// ==================================================================================
// Integration
// ==================================================================================

#[test]
fn zero_force_moves_by_velocity() {
    let mut body = Body::new(0.0, 0.0, 1.0, 1.0, 1.0, "drifter.gif");
    body.update(10.0, 0.0, 0.0);
    assert_eq!((body.x(), body.y()), (10.0, 10.0));
    assert_eq!((body.x_vel(), body.y_vel()), (1.0, 1.0));
}

#[test]
fn zero_time_step_changes_nothing() {
    let mut body = Body::new(3.0, 4.0, -1.0, 2.0, 5.0, "still.gif");
    body.update(0.0, 1.0e9, -1.0e9);
    assert_eq!(body, Body::new(3.0, 4.0, -1.0, 2.0, 5.0, "still.gif"));
}

#[test]
fn two_body_step() {
    let bodies = vec![
        Body::new(0.0, 0.0, 0.0, 0.0, 5.0e24, "one.gif"),
        Body::new(1.0e7, 0.0, 0.0, 0.0, 3.0e24, "two.gif"),
    ];

    let expected = 6.67e-11 * 5e24 * 3e24 / (1e7 * 1e7);
    let fx = bodies[0].calc_net_force_exerted_by_x(&bodies, 0);
    assert!(fx > 0.0);
    assert_close(fx, expected);
    assert_eq!(bodies[0].calc_net_force_exerted_by_y(&bodies, 0), 0.0);
    assert_eq!(bodies[1].calc_net_force_exerted_by_y(&bodies, 1), 0.0);

    let mut one = bodies[0].clone();
    one.update(1.0, fx, 0.0);
    assert_close(one.x_vel(), fx / 5.0e24);
    assert_close(one.x(), one.x_vel());
    assert_eq!(one.y(), 0.0);
}

#[test]
fn circular_orbit_stays_on_radius() {
    let radius = 1.496e11;
    let sun_mass = 1.989e30;
    let speed = (nbody_sim::GRAVITATION_CONSTANT * sun_mass / radius).sqrt();
    let mut sim = Simulation::new(Universe {
        radius: 2.0 * radius,
        bodies: vec![
            Body::new(0.0, 0.0, 0.0, 0.0, sun_mass, "sun.gif"),
            Body::new(radius, 0.0, 0.0, speed, 1.0, "probe.gif"),
        ],
    });

    let start_energy = sim.total_energy();
    // Roughly a quarter of a year in one-hour steps.
    sim.run(7.9e6, 3600.0, |_, _| {}).unwrap();

    let distance = sim.bodies[0].calc_distance(&sim.bodies[1]);
    assert!((distance - radius).abs() / radius < 1e-3, "drifted to {distance}");
    assert!(sim.bodies[1].y() > 0.9 * radius);
    let drift = (sim.total_energy() - start_energy) / start_energy.abs();
    assert!(drift.abs() < 1e-3, "energy drift {drift}");
}

// ==================================================================================
// Drawing
// ==================================================================================

#[test]
fn draw_places_each_body_by_name() {
    let sim = Simulation::new(Universe {
        radius: 1.0e11,
        bodies: scattered(),
    });
    let mut canvas = RecordingCanvas::default();
    sim.draw(&mut canvas);

    assert_eq!(canvas.placed.len(), 4);
    assert_eq!(canvas.placed[1], (-5.0e9, 8.8e9, "b.gif".to_string()));
}

#[test]
fn frames_are_written_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let universe =
        Universe::parse("2 1.0e8\n 0 0 0 0 1.0e24 p.gif\n 5.0e7 0 0 1.0e3 1.0e20 q.gif")
            .unwrap();
    let sim = Simulation::new(universe);

    let mut canvas = FrameCanvas::new(Viewport::new(sim.radius, 32, 32), SpriteSheet::new());
    sim.draw(&mut canvas);
    let path = dir.path().join("frame.png");
    canvas.save(&path).unwrap();

    let written = image::open(&path).unwrap().to_rgba8();
    assert_eq!(written.dimensions(), (32, 32));
    assert_eq!(written.get_pixel(16, 16).0, [255, 255, 255, 255]);
}
