//! A recording session: one container coupled to one live engine.
//!
//! [`Session::open`] is the front door of the whole layer. It opens the
//! container read-write and, when the container already holds registered
//! objects, runs scene assembly so the engine matches the persisted
//! description before the first step -- the resume path. A new or empty
//! container skips assembly entirely -- the fresh-run path.
//!
//! While the session is live, registration is insert-and-activate: an object
//! registered through the session is persisted *and* instantiated in the
//! engine in one operation, and the scene index picks it up immediately.
//!
//! The session owns the container, so dropping it on any exit path releases
//! the file through the container's own guard.

use std::path::Path;

use kinetrace_store::container::{Container, Mode};
use kinetrace_store::registry::ObjectSpec;
use kinetrace_store::shape::ShapeDef;
use kinetrace_store::StoreError;

use crate::assemble::{self, AssembleError, ObjectBinding, SceneIndex};
use crate::engine::SimulationEngine;
use crate::force::ForcePolicy;
use crate::recorder::{RecordError, StepRecorder};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Opening or mutating a session failed.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The container could not be opened or written.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Scene assembly failed; the open was aborted.
    #[error(transparent)]
    Assemble(#[from] AssembleError),
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One container coupled to one live engine and a force policy.
pub struct Session<E: SimulationEngine, F: ForcePolicy<E>> {
    container: Container,
    engine: E,
    forces: F,
    scene: SceneIndex<E::Handle>,
    resumed: bool,
}

impl<E: SimulationEngine, F: ForcePolicy<E>> Session<E, F> {
    /// Open a container read-write and reconstruct the scene if it already
    /// describes one.
    ///
    /// Assembly is all-or-nothing: on [`SessionError::Assemble`] the
    /// container is dropped (and thereby released) with nothing written.
    pub fn open(path: impl AsRef<Path>, engine: E, forces: F) -> Result<Self, SessionError> {
        let container = Container::open(path, Mode::ReadWrite)?;
        let mut engine = engine;
        let mut forces = forces;

        let resumed = !container.registry().is_empty();
        let scene = if resumed {
            assemble::assemble(
                container.catalog(),
                container.registry(),
                &mut engine,
                &mut forces,
            )?
        } else {
            SceneIndex::empty()
        };

        Ok(Self {
            container,
            engine,
            forces,
            scene,
            resumed,
        })
    }

    /// Whether opening found prior objects and rebuilt the scene.
    pub fn is_resumed(&self) -> bool {
        self.resumed
    }

    // -- registration -------------------------------------------------------

    /// Register a shape definition. Idempotent on identical definitions.
    pub fn register_shape(&mut self, name: &str, def: ShapeDef) -> Result<u32, SessionError> {
        Ok(self.container.register_shape(name, def)?)
    }

    /// Register a mesh/CAD file's contents as a shape blob.
    pub fn register_shape_from_file(
        &mut self,
        name: &str,
        path: impl AsRef<Path>,
    ) -> Result<u32, SessionError> {
        let def = ShapeDef::blob_from_file(path).map_err(StoreError::Io)?;
        self.register_shape(name, def)
    }

    /// Register an object and activate it in the engine in one operation.
    ///
    /// The description is persisted first; instantiation failures abort the
    /// call after persistence, mirroring assembly's fail-fast contract on
    /// the next open.
    pub fn register_object(&mut self, spec: ObjectSpec) -> Result<i64, SessionError> {
        let name = spec.name.clone();
        let id = self.container.register_object(spec)?;
        let record = self
            .container
            .registry()
            .get(&name)
            .cloned()
            .ok_or_else(|| StoreError::Corrupt {
                details: format!("object '{name}' vanished after registration"),
            })?;
        let handle = assemble::instantiate(
            self.container.catalog(),
            &record,
            &mut self.engine,
            &mut self.forces,
        )?;
        self.scene.push(ObjectBinding {
            name: record.name,
            id,
            handle,
        });
        tracing::debug!(object = %name, id, "object registered and activated");
        Ok(id)
    }

    // -- recording ----------------------------------------------------------

    /// Record a complete step at the engine's current time.
    ///
    /// Returns [`RecordError`] rather than [`SessionError`] so callers can
    /// catch per-step query failures, log them, and continue the run.
    pub fn record_step(&mut self) -> Result<(), RecordError> {
        StepRecorder::new(&mut self.container, &mut self.engine).record_step()
    }

    /// Borrow a recorder for finer-grained record calls.
    pub fn recorder(&mut self) -> StepRecorder<'_, E> {
        StepRecorder::new(&mut self.container, &mut self.engine)
    }

    // -- accessors ----------------------------------------------------------

    /// The underlying container.
    pub fn container(&self) -> &Container {
        &self.container
    }

    /// The live engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Mutable access to the live engine (for stepping it).
    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// The name <-> id <-> handle index of the assembled scene.
    pub fn scene(&self) -> &SceneIndex<E::Handle> {
        &self.scene
    }

    // -- lifecycle ----------------------------------------------------------

    /// Flush and close the container, ending the session. The engine is
    /// returned to the caller, who may keep stepping it or drop it.
    pub fn close(self) -> Result<E, StoreError> {
        self.container.close()?;
        Ok(self.engine)
    }
}
