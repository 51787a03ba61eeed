//! Kinetrace Engine -- scene reconstruction and per-step recording against a
//! live simulation engine.
//!
//! This crate connects a `kinetrace-store` container to an external physics
//! engine reached through the [`SimulationEngine`](engine::SimulationEngine)
//! trait. It owns three jobs:
//!
//! 1. **Scene assembly** ([`assemble`]): instantiate every persisted object
//!    as live bodies/collision proxies so the engine matches the container,
//!    all-or-nothing per open.
//! 2. **Step recording** ([`recorder`]): once per completed step, query the
//!    engine and append one row set to the container's relations.
//! 3. **Session lifecycle** ([`session`]): couple container and engine for a
//!    run -- resume-on-open, insert-and-activate registration, guaranteed
//!    release on every exit path.
//!
//! # Quick Start
//!
//! ```no_run
//! use kinetrace_engine::prelude::*;
//! # use kinetrace_engine::engine::{ContactSample, EngineError, Pose, QueryError, SolverOptions};
//! # struct MyEngine;
//! # impl SimulationEngine for MyEngine {
//! #     type Handle = u32;
//! #     fn current_time(&self) -> f64 { 0.0 }
//! #     fn dynamic_poses(&mut self) -> Result<Vec<Pose>, QueryError> { Ok(vec![]) }
//! #     fn active_contacts(&mut self) -> Result<Vec<ContactSample>, QueryError> { Ok(vec![]) }
//! #     fn solver_options(&mut self) -> Result<SolverOptions, QueryError> { Err(QueryError::NoCurrentStep) }
//! #     fn instantiate_static_proxy(&mut self, _: &ShapeDef, _: &Pose, _: i32) -> Result<(), EngineError> { Ok(()) }
//! #     fn instantiate_dynamic_body(&mut self, _: &ShapeDef, _: &Pose, _: &[f64; 6], _: f64) -> Result<u32, EngineError> { Ok(0) }
//! #     fn add_compound_shape(&mut self, _: u32, _: &ShapeDef, _: &Pose, _: i32) -> Result<(), EngineError> { Ok(()) }
//! #     fn set_external_force(&mut self, _: u32, _: [f64; 3]) -> Result<(), EngineError> { Ok(()) }
//! # }
//! # fn step(_: &mut MyEngine) {}
//!
//! let mut session = Session::open("run.ktrc", MyEngine, GravityLoader::default())?;
//! if session.is_resumed() {
//!     // the engine now holds every body the container describes
//! }
//!
//! for _ in 0..200 {
//!     step(session.engine_mut()); // advance the external engine
//!     if let Err(e) = session.record_step() {
//!         tracing::warn!(error = %e, "skipping step output");
//!     }
//! }
//! session.close()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(unsafe_code)]

pub mod assemble;
pub mod engine;
pub mod force;
pub mod recorder;
pub mod session;
pub mod solver;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

/// Re-export the store crate for convenience.
pub use kinetrace_store;

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use kinetrace_store::prelude::*;

    pub use crate::assemble::{assemble, AssembleError, ObjectBinding, SceneIndex};
    pub use crate::engine::{ContactSample, Pose, SimulationEngine, SolverOptions};
    pub use crate::force::{ForcePolicy, GravityLoader, NoExternalForces, STANDARD_GRAVITY};
    pub use crate::recorder::{RecordError, StepRecorder};
    pub use crate::session::{Session, SessionError};
    pub use crate::solver::{SolverFieldMap, SolverKind, SolverTraceSample};
}
