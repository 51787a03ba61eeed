//! Session lifecycle tests: fresh runs, resume-on-open, insert-and-activate,
//! and id stability across the whole open/record/close/reopen cycle.

mod common;

use common::MockEngine;
use kinetrace_engine::engine::SolverOptions;
use kinetrace_engine::force::{GravityLoader, NoExternalForces};
use kinetrace_engine::session::{Session, SessionError};
use kinetrace_engine::solver::SolverKind;
use kinetrace_store::prelude::*;

// -- helpers ----------------------------------------------------------------

fn sphere() -> ShapeDef {
    ShapeDef::Primitive(Primitive::Sphere { radius: 1.0 })
}

fn slab() -> ShapeDef {
    ShapeDef::Primitive(Primitive::Cuboid {
        half_extents: [5.0, 5.0, 0.5],
    })
}

fn object(name: &str, mass: f64, shape: &str) -> ObjectSpec {
    ObjectSpec {
        name: name.to_owned(),
        mass,
        position: [0.0, 0.0, 5.0],
        orientation: [1.0, 0.0, 0.0, 0.0],
        velocity: [0.0; 6],
        contactors: vec![Contactor::new(shape, 0)],
    }
}

fn solver_answer() -> SolverOptions {
    SolverOptions {
        kind: SolverKind::FrictionalContact3dNsgs,
        iparam: vec![0, 0, 0, 0, 0, 0, 0, 10],
        dparam: vec![0.0, 1e-8],
    }
}

// -- fresh and resume paths ---------------------------------------------------

#[test]
fn fresh_container_skips_assembly() {
    let dir = tempfile::tempdir().unwrap();
    let session = Session::open(
        dir.path().join("run.ktrc"),
        MockEngine::new(),
        NoExternalForces,
    )
    .unwrap();

    assert!(!session.is_resumed());
    assert!(session.scene().is_empty());
    assert_eq!(session.engine().instantiation_count(), 0);
    session.close().unwrap();
}

#[test]
fn reopening_a_populated_container_reconstructs_the_scene() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.ktrc");

    {
        let mut session =
            Session::open(&path, MockEngine::new(), GravityLoader::default()).unwrap();
        session.register_shape("sphere1", sphere()).unwrap();
        session.register_shape("slab", slab()).unwrap();
        session.register_object(object("floor", 0.0, "slab")).unwrap();
        session.register_object(object("ball", 1.0, "sphere1")).unwrap();
        session.close().unwrap();
    }

    let session = Session::open(&path, MockEngine::new(), GravityLoader::default()).unwrap();
    assert!(session.is_resumed());

    // The fresh engine now holds exactly what the container describes.
    let engine = session.engine();
    assert_eq!(engine.proxies.len(), 1);
    assert_eq!(engine.bodies.len(), 1);
    assert_eq!(engine.bodies[0].pose.position, [0.0, 0.0, 5.0]);
    assert_eq!(engine.bodies[0].external_force, Some([0.0, 0.0, -9.81]));

    // Ids are byte-stable across the round-trip.
    assert_eq!(session.scene().id_of("floor"), Some(-1));
    assert_eq!(session.scene().id_of("ball"), Some(1));
    assert_eq!(session.container().catalog().id_of("sphere1"), Some(0));
    assert_eq!(session.container().catalog().id_of("slab"), Some(1));
    session.close().unwrap();
}

#[test]
fn zero_step_roundtrip_keeps_registries_identical() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.ktrc");

    let before: Vec<(String, i64)>;
    {
        let mut session =
            Session::open(&path, MockEngine::new(), NoExternalForces).unwrap();
        session.register_shape("sphere1", sphere()).unwrap();
        session.register_object(object("ball", 1.0, "sphere1")).unwrap();
        session.register_object(object("floor", 0.0, "sphere1")).unwrap();
        before = session
            .container()
            .registry()
            .iter()
            .map(|o| (o.name.clone(), o.id))
            .collect();
        session.close().unwrap();
    }

    // Assemble, run zero steps, re-read.
    let session = Session::open(&path, MockEngine::new(), NoExternalForces).unwrap();
    let after: Vec<(String, i64)> = session
        .container()
        .registry()
        .iter()
        .map(|o| (o.name.clone(), o.id))
        .collect();
    assert_eq!(
        serde_json::to_string(&before).unwrap(),
        serde_json::to_string(&after).unwrap()
    );
    session.close().unwrap();
}

#[test]
fn resume_with_a_dangling_shape_reference_aborts_the_open() {
    use kinetrace_store::record::{encode_frame, header, Record};
    use kinetrace_store::registry::ObjectRecord;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.ktrc");

    // The live API refuses dangling references, so forge a container from
    // another producer: a well-formed object record whose contactor points
    // at a shape the catalog never got.
    let ghost = ObjectRecord {
        name: "ghost".to_owned(),
        mass: 1.0,
        position: [0.0, 0.0, 5.0],
        orientation: [1.0, 0.0, 0.0, 0.0],
        velocity: [0.0; 6],
        contactors: vec![Contactor::new("missing", 0)],
        id: 1,
    };
    let mut bytes = header().to_vec();
    bytes.extend_from_slice(&encode_frame(&Record::Object(ghost)).unwrap());
    std::fs::write(&path, &bytes).unwrap();

    let mut engine = MockEngine::new();
    let err = match Session::open(&path, &mut engine, NoExternalForces) {
        Err(e) => e,
        Ok(_) => panic!("open must fail on a dangling shape reference"),
    };
    assert!(matches!(err, SessionError::Assemble(_)));
    // All-or-nothing: nothing was instantiated.
    assert_eq!(engine.instantiation_count(), 0);
}

// -- insert-and-activate ------------------------------------------------------

#[test]
fn registration_during_a_live_run_persists_and_activates() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.ktrc");

    let mut session = Session::open(&path, MockEngine::new(), GravityLoader::default()).unwrap();
    session.register_shape("sphere1", sphere()).unwrap();

    let id = session.register_object(object("ball", 1.0, "sphere1")).unwrap();
    assert_eq!(id, 1);

    // Activated immediately...
    assert_eq!(session.engine().bodies.len(), 1);
    assert_eq!(session.scene().handle_of("ball"), Some(0));
    // ...and persisted durably.
    session.close().unwrap();
    let c = Container::open(&path, Mode::ReadOnly).unwrap();
    assert_eq!(c.registry().get("ball").unwrap().id, 1);
}

#[test]
fn registering_an_object_with_an_unknown_shape_fails_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::open(
        dir.path().join("run.ktrc"),
        MockEngine::new(),
        NoExternalForces,
    )
    .unwrap();

    let err = session
        .register_object(object("ball", 1.0, "missing"))
        .unwrap_err();
    assert!(matches!(err, SessionError::Store(StoreError::UnknownShape { .. })));
    assert!(session.scene().is_empty());
    assert_eq!(session.engine().instantiation_count(), 0);
    session.close().unwrap();
}

// -- recording through a session ----------------------------------------------

#[test]
fn recording_continues_consistently_after_resume() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.ktrc");

    // First run: two steps.
    {
        let mut engine = MockEngine::new();
        engine.solver = Some(solver_answer());
        let mut session = Session::open(&path, engine, GravityLoader::default()).unwrap();
        session.register_shape("sphere1", sphere()).unwrap();
        session.register_shape("slab", slab()).unwrap();
        session.register_object(object("floor", 0.0, "slab")).unwrap();
        session.register_object(object("ball", 1.0, "sphere1")).unwrap();

        for step in 0..2 {
            session.engine_mut().time = step as f64 * 0.005;
            session.record_step().unwrap();
        }
        session.close().unwrap();
    }

    // Second run resumes at a later time and appends.
    {
        let mut engine = MockEngine::new();
        engine.solver = Some(solver_answer());
        let mut session = Session::open(&path, engine, GravityLoader::default()).unwrap();
        assert!(session.is_resumed());

        for step in 2..5 {
            session.engine_mut().time = step as f64 * 0.005;
            session.record_step().unwrap();
        }
        session.close().unwrap();
    }

    let c = Container::open(&path, Mode::ReadOnly).unwrap();
    let series = c.series();
    assert_eq!(series.relation(RelationKind::StaticPose).row_count(), 5);
    assert_eq!(series.relation(RelationKind::DynamicPose).row_count(), 5);
    assert_eq!(series.relation(RelationKind::Solver).row_count(), 5);

    // Times are non-decreasing across the resume boundary.
    let times: Vec<f64> = series.solver_rows().map(|r| r.time).collect();
    assert!(times.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn per_step_query_failures_do_not_end_the_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.ktrc");

    let mut engine = MockEngine::new();
    engine.solver = Some(solver_answer());
    let mut session = Session::open(&path, engine, NoExternalForces).unwrap();
    session.register_shape("sphere1", sphere()).unwrap();
    session.register_object(object("floor", 0.0, "sphere1")).unwrap();
    session.register_object(object("ball", 1.0, "sphere1")).unwrap();

    // A step where the engine cannot answer: log-and-continue territory.
    session.engine_mut().fail_pose_query = true;
    assert!(session.record_step().is_err());

    // The next step works and the relations stay consistent.
    session.engine_mut().fail_pose_query = false;
    session.engine_mut().time = 0.005;
    session.record_step().unwrap();

    let c = session.container();
    // First record_step wrote its static batch before failing on dynamics;
    // appends are batch-atomic, not step-atomic.
    assert_eq!(
        c.series().relation(RelationKind::StaticPose).row_count(),
        2
    );
    assert_eq!(
        c.series().relation(RelationKind::DynamicPose).row_count(),
        1
    );
    assert_eq!(c.series().relation(RelationKind::Solver).row_count(), 1);
    session.close().unwrap();
}
