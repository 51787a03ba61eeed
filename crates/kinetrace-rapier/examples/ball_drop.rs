//! Drop a ball onto a slab, recording every step into a container.
//!
//! Run once to create `ball_drop.ktrc` and simulate the first second; run
//! again to resume from the container and simulate one more second. Inspect
//! row counts with any read-only open afterwards.
//!
//!     cargo run --example ball_drop [container-path]

use anyhow::Result;

use kinetrace_engine::prelude::*;
use kinetrace_rapier::RapierEngine;

const STEP: f64 = 1.0 / 200.0;
const STEPS_PER_RUN: usize = 200;
/// Record every nth step.
const OUTPUT_FREQUENCY: usize = 4;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ball_drop.ktrc".to_owned());

    let mut session = Session::open(&path, RapierEngine::new(), GravityLoader::default())?;

    if session.is_resumed() {
        // Continue the time series where the last run left off.
        let t0 = session.container().last_recorded_time().unwrap_or(0.0);
        session.engine_mut().set_clock(t0);
        tracing::info!(
            objects = session.scene().len(),
            resume_time = t0,
            "resuming a previously recorded run"
        );
    } else {
        tracing::info!("fresh container, building the scene");
        session.register_shape(
            "slab",
            ShapeDef::Primitive(Primitive::Cuboid {
                half_extents: [10.0, 10.0, 0.5],
            }),
        )?;
        session.register_shape(
            "ball",
            ShapeDef::Primitive(Primitive::Sphere { radius: 0.5 }),
        )?;
        session.register_object(ObjectSpec {
            name: "ground".to_owned(),
            mass: 0.0,
            position: [0.0, 0.0, -0.5],
            orientation: [1.0, 0.0, 0.0, 0.0],
            velocity: [0.0; 6],
            contactors: vec![Contactor::new("slab", 0)],
        })?;
        session.register_object(ObjectSpec {
            name: "ball".to_owned(),
            mass: 1.0,
            position: [0.0, 0.0, 3.0],
            orientation: [1.0, 0.0, 0.0, 0.0],
            velocity: [0.0; 6],
            contactors: vec![Contactor::new("ball", 0)],
        })?;
    }

    for step in 0..STEPS_PER_RUN {
        session.engine_mut().advance(STEP);
        if step % OUTPUT_FREQUENCY != 0 {
            continue;
        }
        // Per-step query failures are log-and-continue, never run-fatal.
        if let Err(e) = session.record_step() {
            tracing::warn!(error = %e, "skipping step output");
        }
    }

    let series = session.container().series();
    tracing::info!(
        static_rows = series.relation(RelationKind::StaticPose).row_count(),
        dynamic_rows = series.relation(RelationKind::DynamicPose).row_count(),
        contact_rows = series.relation(RelationKind::Contacts).row_count(),
        solver_rows = series.relation(RelationKind::Solver).row_count(),
        "run complete"
    );

    let final_pose = session
        .engine_mut()
        .dynamic_poses()?
        .first()
        .copied()
        .map(|p| p.position);
    tracing::info!(?final_pose, "ball resting pose");

    session.close()?;
    Ok(())
}
