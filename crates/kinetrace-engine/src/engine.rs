//! The narrow interface to the external simulation engine.
//!
//! Kinetrace never steps physics itself. Everything it needs from the engine
//! fits in [`SimulationEngine`]: a handful of queries for the step recorder
//! (current time, dynamic poses, active contacts, raw solver options) and
//! three instantiation calls for the scene assembler (static proxy, dynamic
//! body, compound child). One extra seam, [`set_external_force`], exists so
//! caller-supplied force policies (gravity, typically) have something to
//! attach through.
//!
//! Query failures are deliberately separate from instantiation failures:
//! a [`QueryError`] aborts one record call and nothing else, while an
//! [`EngineError`] during assembly aborts the whole container open.

use nalgebra::{Isometry3, Quaternion, Translation3, UnitQuaternion};
use serde::{Deserialize, Serialize};

use kinetrace_store::shape::ShapeDef;

use crate::solver::SolverKind;

// ---------------------------------------------------------------------------
// Pose
// ---------------------------------------------------------------------------

/// A world- or parent-frame pose: position plus unit quaternion (w, x, y, z).
///
/// The array layout matches the persisted column order exactly; the nalgebra
/// conversions exist for composition only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Position.
    pub position: [f64; 3],
    /// Orientation, unit quaternion (w, x, y, z).
    pub orientation: [f64; 4],
}

impl Pose {
    /// The identity pose.
    pub fn identity() -> Self {
        Self {
            position: [0.0; 3],
            orientation: [1.0, 0.0, 0.0, 0.0],
        }
    }

    /// Build from position and orientation arrays.
    pub fn new(position: [f64; 3], orientation: [f64; 4]) -> Self {
        Self {
            position,
            orientation,
        }
    }

    /// Compose with a child offset: `self` places a frame in the world,
    /// `local` is expressed in that frame. Quaternion composition, not
    /// vector addition.
    pub fn compose(&self, local: &Pose) -> Pose {
        Pose::from_isometry(self.isometry() * local.isometry())
    }

    /// Convert to a nalgebra isometry.
    pub fn isometry(&self) -> Isometry3<f64> {
        let [x, y, z] = self.position;
        let [qw, qx, qy, qz] = self.orientation;
        Isometry3::from_parts(
            Translation3::new(x, y, z),
            UnitQuaternion::from_quaternion(Quaternion::new(qw, qx, qy, qz)),
        )
    }

    /// Convert back from a nalgebra isometry.
    pub fn from_isometry(iso: Isometry3<f64>) -> Self {
        let t = iso.translation;
        let q = iso.rotation.into_inner();
        Self {
            position: [t.x, t.y, t.z],
            orientation: [q.w, q.i, q.j, q.k],
        }
    }
}

// ---------------------------------------------------------------------------
// Query payloads
// ---------------------------------------------------------------------------

/// One active contact, as reported by the engine. Only contact-capable
/// constraints appear here; the engine filters out everything else.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContactSample {
    /// Friction coefficient at the contact.
    pub friction: f64,
    /// Contact point on body A, world frame.
    pub point_a: [f64; 3],
    /// Contact point on body B, world frame.
    pub point_b: [f64; 3],
    /// Contact normal, world frame.
    pub normal: [f64; 3],
    /// Reaction force recovered from the constraint multiplier.
    pub force: [f64; 3],
}

/// Raw solver options for the last computed step: the solver kind plus its
/// integer and floating-point parameter arrays. Which indices mean what is
/// the recorder's business (see [`crate::solver`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverOptions {
    /// Which solver produced the step.
    pub kind: SolverKind,
    /// Integer parameter array.
    pub iparam: Vec<i64>,
    /// Floating-point parameter array.
    pub dparam: Vec<f64>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A recorder-facing query failed. Fatal to the one record call only; a
/// recording loop is expected to log and move on.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// The engine has not computed a step yet, so there is nothing to report.
    #[error("engine has no computed step to report")]
    NoCurrentStep,
    /// The engine backend failed to answer.
    #[error("engine query failed: {0}")]
    Backend(String),
}

/// An instantiation call failed. Fatal to scene assembly.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The engine cannot build collision geometry for this definition kind.
    #[error("shape kind '{kind}' is not supported by this engine")]
    UnsupportedShape { kind: &'static str },
    /// A handle did not resolve to a live body.
    #[error("unknown body handle")]
    UnknownHandle,
    /// The engine backend failed.
    #[error("engine backend error: {0}")]
    Backend(String),
}

// ---------------------------------------------------------------------------
// SimulationEngine
// ---------------------------------------------------------------------------

/// The external simulation engine, seen through the only seam Kinetrace
/// needs. Implemented by `kinetrace-rapier` for rapier3d and by scripted
/// test doubles in the test suites.
pub trait SimulationEngine {
    /// Opaque handle to a live dynamic body.
    type Handle: Copy + PartialEq + std::fmt::Debug;

    /// Simulation time of the current step.
    fn current_time(&self) -> f64;

    /// Current poses of every dynamic body, in dynamic-id order (the order
    /// bodies were instantiated in).
    fn dynamic_poses(&mut self) -> Result<Vec<Pose>, QueryError>;

    /// Currently active, contact-capable constraints. An empty vector is a
    /// normal answer, not an error.
    fn active_contacts(&mut self) -> Result<Vec<ContactSample>, QueryError>;

    /// Raw solver options of the last computed step.
    fn solver_options(&mut self) -> Result<SolverOptions, QueryError>;

    /// Add a static collision proxy at a world pose, under a collision group.
    fn instantiate_static_proxy(
        &mut self,
        shape: &ShapeDef,
        pose: &Pose,
        group: i32,
    ) -> Result<(), EngineError>;

    /// Add a dynamic body with its primary shape, initial pose, initial
    /// velocity (linear then angular) and mass.
    fn instantiate_dynamic_body(
        &mut self,
        shape: &ShapeDef,
        pose: &Pose,
        velocity: &[f64; 6],
        mass: f64,
    ) -> Result<Self::Handle, EngineError>;

    /// Attach an additional collision shape to a dynamic body at a relative
    /// offset pose, under a collision group.
    fn add_compound_shape(
        &mut self,
        handle: Self::Handle,
        shape: &ShapeDef,
        offset: &Pose,
        group: i32,
    ) -> Result<(), EngineError>;

    /// Set the constant external force applied to a dynamic body. Force
    /// policies go through this.
    fn set_external_force(
        &mut self,
        handle: Self::Handle,
        force: [f64; 3],
    ) -> Result<(), EngineError>;
}

/// Mutable references delegate, so a session or assembler can borrow an
/// engine the caller keeps owning.
impl<E: SimulationEngine + ?Sized> SimulationEngine for &mut E {
    type Handle = E::Handle;

    fn current_time(&self) -> f64 {
        (**self).current_time()
    }

    fn dynamic_poses(&mut self) -> Result<Vec<Pose>, QueryError> {
        (**self).dynamic_poses()
    }

    fn active_contacts(&mut self) -> Result<Vec<ContactSample>, QueryError> {
        (**self).active_contacts()
    }

    fn solver_options(&mut self) -> Result<SolverOptions, QueryError> {
        (**self).solver_options()
    }

    fn instantiate_static_proxy(
        &mut self,
        shape: &ShapeDef,
        pose: &Pose,
        group: i32,
    ) -> Result<(), EngineError> {
        (**self).instantiate_static_proxy(shape, pose, group)
    }

    fn instantiate_dynamic_body(
        &mut self,
        shape: &ShapeDef,
        pose: &Pose,
        velocity: &[f64; 6],
        mass: f64,
    ) -> Result<Self::Handle, EngineError> {
        (**self).instantiate_dynamic_body(shape, pose, velocity, mass)
    }

    fn add_compound_shape(
        &mut self,
        handle: Self::Handle,
        shape: &ShapeDef,
        offset: &Pose,
        group: i32,
    ) -> Result<(), EngineError> {
        (**self).add_compound_shape(handle, shape, offset, group)
    }

    fn set_external_force(
        &mut self,
        handle: Self::Handle,
        force: [f64; 3],
    ) -> Result<(), EngineError> {
        (**self).set_external_force(handle, force)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
