//! Scene assembly: reconstructing live engine objects from a container.
//!
//! Given a shape catalog, an object registry, and an engine handle, the
//! assembler instantiates every persisted object so the engine's state
//! matches the description exactly in pose and velocity. Assembly is
//! all-or-nothing per container open: every contactor's shape reference is
//! resolved *before* the first engine call, so a dangling reference fails
//! fast with no partially built scene behind it.
//!
//! For a static object (mass 0) the assembler adds one static collision
//! proxy per contactor at `object_pose ∘ contactor_offset` -- quaternion
//! composition, not vector addition -- under the contactor's collision
//! group. For a dynamic object it creates one body whose primary shape is
//! the first contactor, attaches the remaining contactors as compound
//! children at their relative offsets, applies the initial velocity, and
//! hands the body to the caller's force policy.

use std::collections::HashMap;

use kinetrace_store::catalog::ShapeCatalog;
use kinetrace_store::registry::{ObjectRecord, ObjectRegistry};

use crate::engine::{EngineError, Pose, SimulationEngine};
use crate::force::ForcePolicy;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Scene assembly failed; the container open is aborted.
#[derive(Debug, thiserror::Error)]
pub enum AssembleError {
    /// A contactor references a shape name the catalog does not have.
    #[error("object '{object}' references unknown shape '{shape}'")]
    UnresolvedShape { object: String, shape: String },
    /// The engine refused an instantiation call.
    #[error("engine rejected '{object}': {source}")]
    Engine {
        object: String,
        #[source]
        source: EngineError,
    },
}

// ---------------------------------------------------------------------------
// SceneIndex
// ---------------------------------------------------------------------------

/// One assembled object: name, signed id, and the runtime handle for
/// dynamic objects (`None` for statics, which have no body of their own).
#[derive(Debug, Clone)]
pub struct ObjectBinding<H> {
    /// Object name.
    pub name: String,
    /// Signed id: negative static, positive dynamic.
    pub id: i64,
    /// Runtime handle, present for dynamic objects.
    pub handle: Option<H>,
}

/// The name <-> id <-> handle mapping produced by assembly and kept current
/// as objects are inserted during a live run.
#[derive(Debug)]
pub struct SceneIndex<H> {
    bindings: Vec<ObjectBinding<H>>,
    by_name: HashMap<String, usize>,
}

impl<H: Copy> SceneIndex<H> {
    /// An index with no objects (the fresh-run path).
    pub fn empty() -> Self {
        Self {
            bindings: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    pub(crate) fn push(&mut self, binding: ObjectBinding<H>) {
        self.by_name.insert(binding.name.clone(), self.bindings.len());
        self.bindings.push(binding);
    }

    /// Binding for an object name.
    pub fn get(&self, name: &str) -> Option<&ObjectBinding<H>> {
        self.by_name.get(name).map(|&i| &self.bindings[i])
    }

    /// Signed id for an object name.
    pub fn id_of(&self, name: &str) -> Option<i64> {
        self.get(name).map(|b| b.id)
    }

    /// Runtime handle for a dynamic object name.
    pub fn handle_of(&self, name: &str) -> Option<H> {
        self.get(name).and_then(|b| b.handle)
    }

    /// Binding for a signed id.
    pub fn by_id(&self, id: i64) -> Option<&ObjectBinding<H>> {
        self.bindings.iter().find(|b| b.id == id)
    }

    /// All bindings in assembly order.
    pub fn iter(&self) -> impl Iterator<Item = &ObjectBinding<H>> {
        self.bindings.iter()
    }

    /// Number of assembled objects.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns `true` if nothing has been assembled.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

/// Assemble every registered object into the engine.
pub fn assemble<E: SimulationEngine>(
    catalog: &ShapeCatalog,
    registry: &ObjectRegistry,
    engine: &mut E,
    forces: &mut impl ForcePolicy<E>,
) -> Result<SceneIndex<E::Handle>, AssembleError> {
    // Resolve everything up front; no engine call happens until the whole
    // scene is known to be resolvable.
    for object in registry.iter() {
        for contactor in &object.contactors {
            if !catalog.contains(&contactor.shape) {
                return Err(AssembleError::UnresolvedShape {
                    object: object.name.clone(),
                    shape: contactor.shape.clone(),
                });
            }
        }
    }

    let mut index = SceneIndex::empty();
    for object in registry.iter() {
        let handle = instantiate(catalog, object, engine, forces)?;
        index.push(ObjectBinding {
            name: object.name.clone(),
            id: object.id,
            handle,
        });
    }

    tracing::info!(
        objects = index.len(),
        statics = registry.static_count(),
        dynamics = registry.dynamic_count(),
        "scene assembled"
    );
    Ok(index)
}

/// Instantiate one object. Shared by full assembly and by live insertion
/// through a session; callers have already checked shape resolvability.
pub(crate) fn instantiate<E: SimulationEngine>(
    catalog: &ShapeCatalog,
    object: &ObjectRecord,
    engine: &mut E,
    forces: &mut impl ForcePolicy<E>,
) -> Result<Option<E::Handle>, AssembleError> {
    let engine_err = |source: EngineError| AssembleError::Engine {
        object: object.name.clone(),
        source,
    };
    let resolve = |name: &str| {
        catalog
            .resolve(name)
            .map_err(|_| AssembleError::UnresolvedShape {
                object: object.name.clone(),
                shape: name.to_owned(),
            })
    };
    let object_pose = Pose::new(object.position, object.orientation);

    if object.is_static() {
        for contactor in &object.contactors {
            let shape = resolve(&contactor.shape)?;
            let world = object_pose.compose(&Pose::new(contactor.position, contactor.orientation));
            engine
                .instantiate_static_proxy(shape, &world, contactor.group)
                .map_err(engine_err)?;
        }
        return Ok(None);
    }

    let primary = &object.contactors[0];
    let shape = resolve(&primary.shape)?;
    let handle = engine
        .instantiate_dynamic_body(shape, &object_pose, &object.velocity, object.mass)
        .map_err(engine_err)?;

    for contactor in &object.contactors[1..] {
        let shape = resolve(&contactor.shape)?;
        let offset = Pose::new(contactor.position, contactor.orientation);
        engine
            .add_compound_shape(handle, shape, &offset, contactor.group)
            .map_err(engine_err)?;
    }

    forces
        .attach(engine, handle, object.mass)
        .map_err(engine_err)?;
    Ok(Some(handle))
}
