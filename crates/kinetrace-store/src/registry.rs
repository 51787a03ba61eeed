//! Object registry: the declarative description of every simulation object.
//!
//! An object is either static (mass 0, externally fixed pose) or dynamic
//! (positive mass, pose evolves under the engine). The two classes draw ids
//! from independent counters owned by the registry instance: statics get
//! -1, -2, ... in registration order, dynamics get +1, +2, ... . An id is
//! fixed at first registration and reproduced exactly when the container is
//! reopened.
//!
//! Descriptions are fixed-field records validated at registration time, so a
//! malformed object is rejected up front instead of surfacing as a missing
//! attribute deep inside scene assembly.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::StoreError;

// ---------------------------------------------------------------------------
// Contactor
// ---------------------------------------------------------------------------

/// A collision-geometry attachment bound to an object at a fixed relative
/// offset. Owned by its object; not independently addressable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contactor {
    /// Name of the referenced catalog shape.
    pub shape: String,
    /// Collision group the attachment belongs to.
    pub group: i32,
    /// Offset position relative to the object frame.
    pub position: [f64; 3],
    /// Offset orientation relative to the object frame, unit quaternion
    /// (w, x, y, z).
    pub orientation: [f64; 4],
}

impl Contactor {
    /// Contactor with no offset (identity pose).
    pub fn new(shape: &str, group: i32) -> Self {
        Self {
            shape: shape.to_owned(),
            group,
            position: [0.0; 3],
            orientation: [1.0, 0.0, 0.0, 0.0],
        }
    }

    /// Contactor at an explicit offset pose.
    pub fn with_offset(shape: &str, group: i32, position: [f64; 3], orientation: [f64; 4]) -> Self {
        Self {
            shape: shape.to_owned(),
            group,
            position,
            orientation,
        }
    }
}

// ---------------------------------------------------------------------------
// ObjectSpec / ObjectRecord
// ---------------------------------------------------------------------------

/// Caller-supplied description of an object, before an id is assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSpec {
    /// Unique object name.
    pub name: String,
    /// Mass in kilograms; `0.0` encodes a static object.
    pub mass: f64,
    /// Initial position.
    pub position: [f64; 3],
    /// Initial orientation, unit quaternion (w, x, y, z).
    pub orientation: [f64; 4],
    /// Initial velocity: linear (x, y, z) then angular (x, y, z).
    pub velocity: [f64; 6],
    /// Ordered contactor attachments.
    pub contactors: Vec<Contactor>,
}

/// A registered object: the spec plus its assigned signed id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    /// Unique object name.
    pub name: String,
    /// Mass in kilograms; `0.0` encodes a static object.
    pub mass: f64,
    /// Initial position.
    pub position: [f64; 3],
    /// Initial orientation, unit quaternion (w, x, y, z).
    pub orientation: [f64; 4],
    /// Initial velocity: linear then angular.
    pub velocity: [f64; 6],
    /// Ordered contactor attachments.
    pub contactors: Vec<Contactor>,
    /// Signed id: negative for static objects, positive for dynamic ones.
    pub id: i64,
}

impl ObjectRecord {
    /// Whether this object is static (mass 0).
    pub fn is_static(&self) -> bool {
        self.mass == 0.0
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Tolerance on the orientation quaternion norm. Initial descriptions come
/// from user input or reopened files, so a little slack is allowed; anything
/// beyond it is a modeling error, not rounding.
const UNIT_QUAT_TOLERANCE: f64 = 1e-6;

fn validate_record(record: &ObjectRecord) -> Result<(), StoreError> {
    let invalid = |reason: String| StoreError::InvalidRecord {
        name: record.name.clone(),
        reason,
    };

    if record.name.is_empty() {
        return Err(invalid("object name is empty".to_owned()));
    }
    if !record.mass.is_finite() || record.mass < 0.0 {
        return Err(invalid(format!(
            "mass {} is not finite and non-negative",
            record.mass
        )));
    }
    let floats = record
        .position
        .iter()
        .chain(record.orientation.iter())
        .chain(record.velocity.iter());
    for v in floats {
        if !v.is_finite() {
            return Err(invalid(
                "pose or velocity contains a non-finite value".to_owned(),
            ));
        }
    }
    let norm2: f64 = record.orientation.iter().map(|q| q * q).sum();
    if (norm2.sqrt() - 1.0).abs() > UNIT_QUAT_TOLERANCE {
        return Err(invalid(format!(
            "orientation quaternion has norm {}, expected 1",
            norm2.sqrt()
        )));
    }
    if record.mass > 0.0 && record.contactors.is_empty() {
        return Err(invalid(
            "a dynamic object needs at least one contactor for its primary shape".to_owned(),
        ));
    }
    for c in &record.contactors {
        let cnorm2: f64 = c.orientation.iter().map(|q| q * q).sum();
        if (cnorm2.sqrt() - 1.0).abs() > UNIT_QUAT_TOLERANCE {
            return Err(invalid(format!(
                "contactor '{}' offset orientation is not a unit quaternion",
                c.shape
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// ObjectRegistry
// ---------------------------------------------------------------------------

/// In-memory object registry with instance-owned id counters.
#[derive(Debug, Default)]
pub struct ObjectRegistry {
    /// Records in registration order.
    objects: Vec<ObjectRecord>,
    /// Name -> index into `objects`.
    by_name: HashMap<String, usize>,
    /// Static objects registered so far; the next static id is
    /// `-(static_count + 1)`.
    static_count: usize,
    /// Dynamic objects registered so far; the next dynamic id is
    /// `dynamic_count + 1`.
    dynamic_count: usize,
}

impl ObjectRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an object and return its assigned signed id.
    ///
    /// Fails with [`StoreError::DuplicateName`] if the name is taken (there
    /// is no idempotent re-registration for objects) and with
    /// [`StoreError::InvalidRecord`] if the description fails validation.
    /// On failure the registry is unchanged.
    pub fn register(&mut self, spec: ObjectSpec) -> Result<i64, StoreError> {
        if self.by_name.contains_key(&spec.name) {
            return Err(StoreError::DuplicateName { name: spec.name });
        }

        let id = if spec.mass == 0.0 {
            -((self.static_count + 1) as i64)
        } else {
            (self.dynamic_count + 1) as i64
        };
        let record = ObjectRecord {
            name: spec.name,
            mass: spec.mass,
            position: spec.position,
            orientation: spec.orientation,
            velocity: spec.velocity,
            contactors: spec.contactors,
            id,
        };
        validate_record(&record)?;

        if record.is_static() {
            self.static_count += 1;
        } else {
            self.dynamic_count += 1;
        }
        self.by_name.insert(record.name.clone(), self.objects.len());
        self.objects.push(record);
        Ok(id)
    }

    /// Restore a record read back from disk, verifying that it carries
    /// exactly the id the counters would assign. A mismatch means the
    /// container was edited or written by an incompatible producer.
    pub(crate) fn restore(&mut self, record: ObjectRecord) -> Result<(), StoreError> {
        // A persisted record passes the same validation as a fresh one;
        // anything that fails it here was not written by this producer.
        validate_record(&record).map_err(|e| StoreError::Corrupt {
            details: e.to_string(),
        })?;
        if self.by_name.contains_key(&record.name) {
            return Err(StoreError::Corrupt {
                details: format!("object '{}' appears twice in the container", record.name),
            });
        }
        let expected = if record.is_static() {
            -((self.static_count + 1) as i64)
        } else {
            (self.dynamic_count + 1) as i64
        };
        if record.id != expected {
            return Err(StoreError::Corrupt {
                details: format!(
                    "object '{}' has id {} but registration order implies {expected}",
                    record.name, record.id
                ),
            });
        }
        if record.is_static() {
            self.static_count += 1;
        } else {
            self.dynamic_count += 1;
        }
        self.by_name.insert(record.name.clone(), self.objects.len());
        self.objects.push(record);
        Ok(())
    }

    /// Look up an object by name.
    pub fn get(&self, name: &str) -> Option<&ObjectRecord> {
        self.by_name.get(name).map(|&i| &self.objects[i])
    }

    /// Iterate all objects in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ObjectRecord> {
        self.objects.iter()
    }

    /// Static objects in id order (id -1 first).
    pub fn statics(&self) -> impl Iterator<Item = &ObjectRecord> {
        self.objects.iter().filter(|o| o.is_static())
    }

    /// Dynamic objects in id order (id 1 first).
    pub fn dynamics(&self) -> impl Iterator<Item = &ObjectRecord> {
        self.objects.iter().filter(|o| !o.is_static())
    }

    /// Number of static objects.
    pub fn static_count(&self) -> usize {
        self.static_count
    }

    /// Number of dynamic objects.
    pub fn dynamic_count(&self) -> usize {
        self.dynamic_count
    }

    /// Total number of registered objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns `true` if no object has been registered.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
