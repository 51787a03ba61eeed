//! Scene assembly tests against the scripted engine.

mod common;

use common::MockEngine;
use kinetrace_engine::assemble::{assemble, AssembleError};
use kinetrace_engine::force::{GravityLoader, NoExternalForces};
use kinetrace_store::catalog::ShapeCatalog;
use kinetrace_store::prelude::*;
use kinetrace_store::registry::ObjectRegistry;

// -- helpers ----------------------------------------------------------------

fn sphere() -> ShapeDef {
    ShapeDef::Primitive(Primitive::Sphere { radius: 1.0 })
}

fn slab() -> ShapeDef {
    ShapeDef::Primitive(Primitive::Cuboid {
        half_extents: [5.0, 5.0, 0.5],
    })
}

fn catalog_with(shapes: &[(&str, ShapeDef)]) -> ShapeCatalog {
    let mut catalog = ShapeCatalog::new();
    for (name, def) in shapes {
        catalog.register(name, def.clone()).unwrap();
    }
    catalog
}

// -- one shape, one dynamic body --------------------------------------------

#[test]
fn single_dynamic_body_matches_its_description() {
    let catalog = catalog_with(&[("sphere1", sphere())]);
    let mut registry = ObjectRegistry::new();
    let id = registry
        .register(ObjectSpec {
            name: "ball".to_owned(),
            mass: 1.0,
            position: [0.0, 0.0, 5.0],
            orientation: [1.0, 0.0, 0.0, 0.0],
            velocity: [0.0; 6],
            contactors: vec![Contactor::new("sphere1", 0)],
        })
        .unwrap();
    assert_eq!(id, 1);

    let mut engine = MockEngine::new();
    let scene = assemble(&catalog, &registry, &mut engine, &mut NoExternalForces).unwrap();

    assert_eq!(engine.bodies.len(), 1);
    assert!(engine.proxies.is_empty());
    let body = &engine.bodies[0];
    assert_eq!(body.shape_kind, "sphere");
    assert_eq!(body.pose.position, [0.0, 0.0, 5.0]);
    assert_eq!(body.pose.orientation, [1.0, 0.0, 0.0, 0.0]);
    assert_eq!(body.velocity, [0.0; 6]);
    assert_eq!(body.mass, 1.0);

    assert_eq!(scene.id_of("ball"), Some(1));
    assert_eq!(scene.handle_of("ball"), Some(0));
}

// -- static objects ---------------------------------------------------------

#[test]
fn static_object_gets_one_proxy_per_contactor() {
    let catalog = catalog_with(&[("slab", slab())]);
    let mut registry = ObjectRegistry::new();
    registry
        .register(ObjectSpec {
            name: "ground".to_owned(),
            mass: 0.0,
            position: [0.0, 0.0, -0.5],
            orientation: [1.0, 0.0, 0.0, 0.0],
            velocity: [0.0; 6],
            contactors: vec![
                Contactor::with_offset("slab", 1, [0.0, 0.0, 0.0], [1.0, 0.0, 0.0, 0.0]),
                Contactor::with_offset("slab", 2, [10.0, 0.0, 0.0], [1.0, 0.0, 0.0, 0.0]),
            ],
        })
        .unwrap();

    let mut engine = MockEngine::new();
    let scene = assemble(&catalog, &registry, &mut engine, &mut NoExternalForces).unwrap();

    assert_eq!(engine.proxies.len(), 2);
    assert!(engine.bodies.is_empty());
    assert_eq!(engine.proxies[0].group, 1);
    assert_eq!(engine.proxies[1].group, 2);
    assert_eq!(engine.proxies[0].pose.position, [0.0, 0.0, -0.5]);
    assert_eq!(engine.proxies[1].pose.position, [10.0, 0.0, -0.5]);

    // Statics have no runtime handle.
    assert_eq!(scene.id_of("ground"), Some(-1));
    assert_eq!(scene.handle_of("ground"), None);
}

#[test]
fn static_proxy_pose_is_quaternion_composition() {
    // Object rotated 90 degrees about z; a contactor offset along +x must
    // land along +y in world space.
    let half = std::f64::consts::FRAC_PI_4;
    let catalog = catalog_with(&[("slab", slab())]);
    let mut registry = ObjectRegistry::new();
    registry
        .register(ObjectSpec {
            name: "ground".to_owned(),
            mass: 0.0,
            position: [0.0, 0.0, 0.0],
            orientation: [half.cos(), 0.0, 0.0, half.sin()],
            velocity: [0.0; 6],
            contactors: vec![Contactor::with_offset(
                "slab",
                0,
                [2.0, 0.0, 0.0],
                [1.0, 0.0, 0.0, 0.0],
            )],
        })
        .unwrap();

    let mut engine = MockEngine::new();
    assemble(&catalog, &registry, &mut engine, &mut NoExternalForces).unwrap();

    let world = engine.proxies[0].pose;
    assert!(world.position[0].abs() < 1e-12);
    assert!((world.position[1] - 2.0).abs() < 1e-12);
    assert!(world.position[2].abs() < 1e-12);
}

// -- compound dynamic bodies ------------------------------------------------

#[test]
fn extra_contactors_become_compound_children_with_their_own_shapes() {
    let catalog = catalog_with(&[("sphere1", sphere()), ("slab", slab())]);
    let mut registry = ObjectRegistry::new();
    registry
        .register(ObjectSpec {
            name: "hammer".to_owned(),
            mass: 3.0,
            position: [0.0, 0.0, 1.0],
            orientation: [1.0, 0.0, 0.0, 0.0],
            velocity: [0.0; 6],
            contactors: vec![
                Contactor::new("sphere1", 0),
                Contactor::with_offset("slab", 4, [0.0, 0.0, 0.7], [1.0, 0.0, 0.0, 0.0]),
            ],
        })
        .unwrap();

    let mut engine = MockEngine::new();
    assemble(&catalog, &registry, &mut engine, &mut NoExternalForces).unwrap();

    let body = &engine.bodies[0];
    assert_eq!(body.shape_kind, "sphere");
    assert_eq!(body.compounds.len(), 1);
    let (kind, offset, group) = &body.compounds[0];
    // The child resolves its own shape, not the primary's.
    assert_eq!(*kind, "cuboid");
    assert_eq!(offset.position, [0.0, 0.0, 0.7]);
    assert_eq!(*group, 4);
}

// -- force policy -----------------------------------------------------------

#[test]
fn gravity_loader_attaches_each_body_weight() {
    let catalog = catalog_with(&[("sphere1", sphere())]);
    let mut registry = ObjectRegistry::new();
    for (name, mass) in [("light", 1.0), ("heavy", 10.0)] {
        registry
            .register(ObjectSpec {
                name: name.to_owned(),
                mass,
                position: [0.0; 3],
                orientation: [1.0, 0.0, 0.0, 0.0],
                velocity: [0.0; 6],
                contactors: vec![Contactor::new("sphere1", 0)],
            })
            .unwrap();
    }

    let mut engine = MockEngine::new();
    let mut gravity = GravityLoader { g: 9.81 };
    assemble(&catalog, &registry, &mut engine, &mut gravity).unwrap();

    assert_eq!(engine.bodies[0].external_force, Some([0.0, 0.0, -9.81]));
    assert_eq!(engine.bodies[1].external_force, Some([0.0, 0.0, -98.1]));
}

// -- failure modes ----------------------------------------------------------

#[test]
fn unresolved_shape_fails_before_any_engine_call() {
    let catalog = catalog_with(&[("sphere1", sphere())]);
    let mut registry = ObjectRegistry::new();
    // First object is resolvable, second is not; nothing at all may be
    // instantiated.
    registry
        .register(ObjectSpec {
            name: "ball".to_owned(),
            mass: 1.0,
            position: [0.0; 3],
            orientation: [1.0, 0.0, 0.0, 0.0],
            velocity: [0.0; 6],
            contactors: vec![Contactor::new("sphere1", 0)],
        })
        .unwrap();
    registry
        .register(ObjectSpec {
            name: "ghost".to_owned(),
            mass: 1.0,
            position: [0.0; 3],
            orientation: [1.0, 0.0, 0.0, 0.0],
            velocity: [0.0; 6],
            contactors: vec![Contactor::new("missing", 0)],
        })
        .unwrap();

    let mut engine = MockEngine::new();
    let err = assemble(&catalog, &registry, &mut engine, &mut NoExternalForces).unwrap_err();
    match err {
        AssembleError::UnresolvedShape { object, shape } => {
            assert_eq!(object, "ghost");
            assert_eq!(shape, "missing");
        }
        other => panic!("expected UnresolvedShape, got {other:?}"),
    }
    assert_eq!(engine.instantiation_count(), 0);
}

#[test]
fn assembly_preserves_registration_order_in_the_index() {
    let catalog = catalog_with(&[("sphere1", sphere()), ("slab", slab())]);
    let mut registry = ObjectRegistry::new();
    for (name, mass, shape) in [
        ("floor", 0.0, "slab"),
        ("ball", 1.0, "sphere1"),
        ("wall", 0.0, "slab"),
        ("cube", 2.0, "sphere1"),
    ] {
        registry
            .register(ObjectSpec {
                name: name.to_owned(),
                mass,
                position: [0.0; 3],
                orientation: [1.0, 0.0, 0.0, 0.0],
                velocity: [0.0; 6],
                contactors: vec![Contactor::new(shape, 0)],
            })
            .unwrap();
    }

    let mut engine = MockEngine::new();
    let scene = assemble(&catalog, &registry, &mut engine, &mut NoExternalForces).unwrap();

    let ids: Vec<(String, i64)> = scene.iter().map(|b| (b.name.clone(), b.id)).collect();
    assert_eq!(
        ids,
        vec![
            ("floor".to_owned(), -1),
            ("ball".to_owned(), 1),
            ("wall".to_owned(), -2),
            ("cube".to_owned(), 2),
        ]
    );
    assert_eq!(scene.by_id(-2).unwrap().name, "wall");
}
