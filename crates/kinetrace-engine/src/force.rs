//! External force policies attached to dynamic bodies at assembly time.

use crate::engine::{EngineError, SimulationEngine};

/// Standard gravity, m/s^2.
pub const STANDARD_GRAVITY: f64 = 9.81;

// ---------------------------------------------------------------------------
// ForcePolicy
// ---------------------------------------------------------------------------

/// Decides the constant external force for each dynamic body the assembler
/// creates. The assembler calls [`attach`](Self::attach) once per body,
/// right after instantiation.
pub trait ForcePolicy<E: SimulationEngine + ?Sized> {
    /// Attach this policy's force to a freshly created body.
    fn attach(&mut self, engine: &mut E, handle: E::Handle, mass: f64) -> Result<(), EngineError>;
}

// ---------------------------------------------------------------------------
// GravityLoader
// ---------------------------------------------------------------------------

/// Applies each body's weight along -z: force `[0, 0, -mass * g]`.
#[derive(Debug, Clone, Copy)]
pub struct GravityLoader {
    /// Gravitational acceleration, m/s^2.
    pub g: f64,
}

impl Default for GravityLoader {
    fn default() -> Self {
        Self {
            g: STANDARD_GRAVITY,
        }
    }
}

impl<E: SimulationEngine + ?Sized> ForcePolicy<E> for GravityLoader {
    fn attach(&mut self, engine: &mut E, handle: E::Handle, mass: f64) -> Result<(), EngineError> {
        engine.set_external_force(handle, [0.0, 0.0, -mass * self.g])
    }
}

// ---------------------------------------------------------------------------
// NoExternalForces
// ---------------------------------------------------------------------------

/// Leaves bodies force-free. For scenes where the engine's own gravity (or
/// none at all) is wanted.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExternalForces;

impl<E: SimulationEngine + ?Sized> ForcePolicy<E> for NoExternalForces {
    fn attach(
        &mut self,
        _engine: &mut E,
        _handle: E::Handle,
        _mass: f64,
    ) -> Result<(), EngineError> {
        Ok(())
    }
}
