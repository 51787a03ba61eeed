//! Shape definitions and their identity fingerprints.
//!
//! A [`ShapeDef`] is the immutable payload stored in the shape catalog: either
//! a parametric primitive, an inlined mesh/CAD blob, or a reference to an
//! external file. Two definitions are "the same shape" when their canonical
//! bincode encodings hash to the same BLAKE3 digest -- this is what makes
//! re-registration idempotent and conflicting redefinition detectable.

use std::path::Path;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Primitive
// ---------------------------------------------------------------------------

/// Parametric collision primitives.
///
/// Axis conventions follow the collision backends: capsules and cylinders are
/// aligned with the local y axis, a plane is the half-space boundary through
/// the local origin with outward normal along local z. Placement and
/// orientation come from the owning contactor's offset pose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Primitive {
    /// Ball with the given radius (meters).
    Sphere { radius: f64 },
    /// Oriented box with half-extents along x, y, z.
    Cuboid { half_extents: [f64; 3] },
    /// y-aligned capsule.
    Capsule { half_height: f64, radius: f64 },
    /// y-aligned cylinder.
    Cylinder { half_height: f64, radius: f64 },
    /// Half-space through the local origin, outward normal along local z.
    Plane,
}

// ---------------------------------------------------------------------------
// ShapeDef
// ---------------------------------------------------------------------------

/// An immutable shape definition registered in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ShapeDef {
    /// A parametric primitive.
    Primitive(Primitive),
    /// An inlined mesh or CAD file, kept as opaque bytes. The `format` tag is
    /// the source file extension (`"vtp"`, `"stp"`, ...); interpretation is
    /// up to the collision backend.
    MeshBlob { format: String, bytes: Vec<u8> },
    /// A reference to a mesh/CAD file resolved by the consumer at load time.
    ExternalFile { path: String },
}

impl ShapeDef {
    /// BLAKE3 digest of the canonical bincode encoding.
    ///
    /// The digest is persisted alongside the definition and re-verified when
    /// a container is reopened, so a damaged catalog entry is caught before
    /// scene assembly trusts it.
    pub fn digest(&self) -> [u8; 32] {
        let bytes = bincode::serde::encode_to_vec(self, bincode::config::standard())
            .expect("shape definitions are always bincode-encodable");
        *blake3::hash(&bytes).as_bytes()
    }

    /// Read a mesh/CAD file into a [`ShapeDef::MeshBlob`], tagging it with
    /// the file extension as format.
    pub fn blob_from_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_owned();
        Ok(ShapeDef::MeshBlob { format, bytes })
    }

    /// Short tag naming the definition kind, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ShapeDef::Primitive(Primitive::Sphere { .. }) => "sphere",
            ShapeDef::Primitive(Primitive::Cuboid { .. }) => "cuboid",
            ShapeDef::Primitive(Primitive::Capsule { .. }) => "capsule",
            ShapeDef::Primitive(Primitive::Cylinder { .. }) => "cylinder",
            ShapeDef::Primitive(Primitive::Plane) => "plane",
            ShapeDef::MeshBlob { .. } => "mesh-blob",
            ShapeDef::ExternalFile { .. } => "external-file",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
