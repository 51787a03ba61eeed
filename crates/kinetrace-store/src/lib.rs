//! Kinetrace Store -- durable, appendable container for simulation state.
//!
//! This crate owns the persistence side of Kinetrace: a single-file container
//! that records the declarative description of a mechanical scene (shapes and
//! objects) together with four append-only time-series relations (static
//! poses, dynamic poses, contact events, solver traces). A container can be
//! closed at any step boundary and reopened later to resume recording; every
//! identifier assigned at first registration is reproduced exactly on reopen.
//!
//! The crate knows nothing about any physics engine. Reconstructing live
//! bodies from a container is the job of `kinetrace-engine`.
//!
//! # Quick Start
//!
//! ```no_run
//! use kinetrace_store::prelude::*;
//!
//! let mut container = Container::open("run.ktrc", Mode::ReadWrite)?;
//!
//! let sphere = container.register_shape(
//!     "sphere1",
//!     ShapeDef::Primitive(Primitive::Sphere { radius: 1.0 }),
//! )?;
//! assert_eq!(sphere, 0);
//!
//! let ball = container.register_object(ObjectSpec {
//!     name: "ball".to_owned(),
//!     mass: 1.0,
//!     position: [0.0, 0.0, 5.0],
//!     orientation: [1.0, 0.0, 0.0, 0.0],
//!     velocity: [0.0; 6],
//!     contactors: vec![Contactor::new("sphere1", 0)],
//! })?;
//! assert_eq!(ball, 1); // first dynamic object
//!
//! container.close()?;
//! # Ok::<(), kinetrace_store::StoreError>(())
//! ```

#![deny(unsafe_code)]

pub mod catalog;
pub mod container;
pub mod record;
pub mod registry;
pub mod series;
pub mod shape;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by catalog, registry, and container operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A name was registered twice with a conflicting definition. The
    /// catalog/registry is left unchanged.
    #[error("name '{name}' is already registered with a different definition")]
    DuplicateName { name: String },

    /// A shape name was referenced that is not in the catalog.
    #[error("unknown shape '{name}'")]
    UnknownShape { name: String },

    /// A registration carried values the fixed-field record model rejects
    /// (non-finite floats, non-unit orientation, missing contactors, ...).
    #[error("invalid description for '{name}': {reason}")]
    InvalidRecord { name: String, reason: String },

    /// An append would move a relation's time column backwards.
    #[error("relation '{relation}' time went backwards: {attempted} < {last}")]
    NonMonotonicTime {
        relation: &'static str,
        last: f64,
        attempted: f64,
    },

    /// A batch does not form whole rows for the target relation.
    #[error("relation '{relation}' batch of {values} values is not a multiple of {columns} columns")]
    RaggedBatch {
        relation: &'static str,
        values: usize,
        columns: usize,
    },

    /// A write was attempted on a read-only container handle.
    #[error("container '{path}' is open read-only")]
    ReadOnly { path: String },

    /// The underlying storage failed. Fatal; no retry is attempted.
    #[error("container I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The container file is damaged somewhere other than its tail.
    /// Trailing partial frames are recovered silently; anything else is not.
    #[error("container is corrupt: {details}")]
    Corrupt { details: String },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::catalog::ShapeCatalog;
    pub use crate::container::{Container, Mode};
    pub use crate::registry::{Contactor, ObjectRecord, ObjectRegistry, ObjectSpec};
    pub use crate::series::{ContactRow, PoseRow, RelationKind, SolverRow, TimeSeries};
    pub use crate::shape::{Primitive, ShapeDef};
    pub use crate::StoreError;
}
