//! Name-keyed catalog of immutable shape definitions.
//!
//! Every shape registered in a container gets a dense integer id equal to the
//! catalog size at insertion time: the first shape is id 0, the next id 1,
//! and so on. Because entries are persisted in insertion order and never
//! deleted, replaying a container reproduces the exact name -> id mapping of
//! the original run -- the property scene reconstruction depends on.
//!
//! Registration is idempotent: registering a name again with a definition
//! whose digest matches the stored one returns the existing id and writes
//! nothing. A conflicting redefinition fails with
//! [`StoreError::DuplicateName`] and leaves the catalog untouched.

use std::collections::HashMap;

use crate::shape::ShapeDef;
use crate::StoreError;

// ---------------------------------------------------------------------------
// CatalogEntry
// ---------------------------------------------------------------------------

/// One catalog entry. The id is the entry's index in insertion order.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    /// Unique shape name.
    pub name: String,
    /// The immutable definition.
    pub def: ShapeDef,
    /// BLAKE3 digest of the definition, used for the idempotence check and
    /// re-verified on container reopen.
    pub digest: [u8; 32],
}

// ---------------------------------------------------------------------------
// ShapeCatalog
// ---------------------------------------------------------------------------

/// In-memory shape catalog. The id counter is owned by the instance, so
/// several containers can coexist in one process without interfering.
#[derive(Debug, Default)]
pub struct ShapeCatalog {
    /// Entries in insertion order; an entry's index is its id.
    entries: Vec<CatalogEntry>,
    /// Name -> index into `entries`.
    by_name: HashMap<String, usize>,
}

impl ShapeCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a shape definition under `name` and return its id.
    ///
    /// Idempotent on identical definitions; fails with
    /// [`StoreError::DuplicateName`] when `name` already maps to a different
    /// definition. On failure the catalog is unchanged.
    pub fn register(&mut self, name: &str, def: ShapeDef) -> Result<u32, StoreError> {
        let digest = def.digest();
        if let Some(&index) = self.by_name.get(name) {
            if self.entries[index].digest == digest {
                return Ok(index as u32);
            }
            return Err(StoreError::DuplicateName {
                name: name.to_owned(),
            });
        }

        let id = self.entries.len() as u32;
        self.by_name.insert(name.to_owned(), self.entries.len());
        self.entries.push(CatalogEntry {
            name: name.to_owned(),
            def,
            digest,
        });
        Ok(id)
    }

    /// Restore an entry read back from disk.
    ///
    /// Validates that the persisted id matches the insertion-order slot and
    /// that the persisted digest still matches the definition; any mismatch
    /// means the container body was tampered with or damaged.
    pub(crate) fn restore(
        &mut self,
        name: String,
        id: u32,
        digest: [u8; 32],
        def: ShapeDef,
    ) -> Result<(), StoreError> {
        if id as usize != self.entries.len() {
            return Err(StoreError::Corrupt {
                details: format!(
                    "shape '{name}' has id {id} but occupies catalog slot {}",
                    self.entries.len()
                ),
            });
        }
        if self.by_name.contains_key(&name) {
            return Err(StoreError::Corrupt {
                details: format!("shape '{name}' appears twice in the container"),
            });
        }
        if def.digest() != digest {
            return Err(StoreError::Corrupt {
                details: format!("shape '{name}' definition does not match its stored digest"),
            });
        }
        self.by_name.insert(name.clone(), self.entries.len());
        self.entries.push(CatalogEntry { name, def, digest });
        Ok(())
    }

    /// Look up a definition by name.
    pub fn resolve(&self, name: &str) -> Result<&ShapeDef, StoreError> {
        self.by_name
            .get(name)
            .map(|&i| &self.entries[i].def)
            .ok_or_else(|| StoreError::UnknownShape {
                name: name.to_owned(),
            })
    }

    /// Id assigned to `name`, if registered.
    pub fn id_of(&self, name: &str) -> Option<u32> {
        self.by_name.get(name).map(|&i| i as u32)
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Iterate entries in id order (insertion order).
    pub fn iter(&self) -> impl Iterator<Item = (u32, &CatalogEntry)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i as u32, e))
    }

    /// Number of registered shapes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no shape has been registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
