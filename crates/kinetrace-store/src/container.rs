//! Container lifecycle: open, append, flush, close.
//!
//! A [`Container`] is the exclusive handle on one container file. Opening
//! replays the record log into an in-memory catalog, registry, and time
//! series; registrations and row appends write one frame each and then update
//! the in-memory state, so memory never gets ahead of what a write accepted.
//!
//! The lifecycle is `Closed -> Open(ReadOnly | ReadWrite) -> Closed`, with
//! nothing observable in between. [`Container::close`] flushes and syncs;
//! dropping an open read-write container performs a best-effort flush so the
//! file is released in a usable state on every exit path, including unwinds
//! out of scene assembly or a recording loop.
//!
//! Exclusivity is the caller's contract (see the crate docs): a second
//! writer on the same file is undefined behavior and is not detected here.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::catalog::ShapeCatalog;
use crate::record::{self, Record};
use crate::registry::{ObjectRegistry, ObjectSpec};
use crate::series::{
    flatten_contacts, flatten_poses, ContactRow, PoseRow, RelationKind, SolverRow, TimeSeries,
};
use crate::shape::ShapeDef;
use crate::StoreError;

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

/// Access mode of an open container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Inspect an existing container. Never writes, never truncates a torn
    /// tail, and is the mode export tooling should use.
    ReadOnly,
    /// Create the file if missing, recover a torn tail, and append. The
    /// resume path: reopening a container with prior registrations continues
    /// the same id sequences.
    ReadWrite,
}

// ---------------------------------------------------------------------------
// Container
// ---------------------------------------------------------------------------

/// Exclusive handle on one container file.
pub struct Container {
    path: PathBuf,
    mode: Mode,
    /// Write handle, positioned at the end of the valid log. `None` once
    /// closed and always `None` in read-only mode.
    file: Option<File>,
    /// Whether the header has been written yet (deferred to first record on
    /// a freshly created file).
    header_written: bool,
    catalog: ShapeCatalog,
    registry: ObjectRegistry,
    series: TimeSeries,
}

impl Container {
    /// Open a container file.
    ///
    /// Read-write mode creates the file when missing. A torn tail left by a
    /// crash mid-append is logged, dropped, and (in read-write mode)
    /// truncated away before appending resumes. Damage anywhere else fails
    /// with [`StoreError::Corrupt`].
    pub fn open(path: impl AsRef<Path>, mode: Mode) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        let mut file = match mode {
            Mode::ReadOnly => OpenOptions::new().read(true).open(&path)?,
            Mode::ReadWrite => OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .open(&path)?,
        };

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        let log = record::read_log(&bytes)?;

        let mut catalog = ShapeCatalog::new();
        let mut registry = ObjectRegistry::new();
        let mut series = TimeSeries::new();
        for rec in log.records {
            match rec {
                Record::Shape {
                    name,
                    id,
                    digest,
                    def,
                } => catalog.restore(name, id, digest, def)?,
                Record::Object(object) => registry.restore(object)?,
                Record::Rows { relation, data } => {
                    let rel = series.relation_mut(relation);
                    // A committed batch that fails relation invariants was
                    // written by a broken producer, not torn by a crash.
                    rel.validate_batch(&data).map_err(|e| StoreError::Corrupt {
                        details: format!("replaying '{}' rows: {e}", relation.name()),
                    })?;
                    rel.apply_batch(&data);
                }
            }
        }

        let file = match mode {
            Mode::ReadOnly => None,
            Mode::ReadWrite => {
                if log.valid_len < bytes.len() as u64 {
                    tracing::warn!(
                        path = %path.display(),
                        torn_bytes = bytes.len() as u64 - log.valid_len,
                        "truncating torn tail before resuming appends"
                    );
                    file.set_len(log.valid_len)?;
                }
                file.seek(SeekFrom::Start(log.valid_len))?;
                Some(file)
            }
        };

        tracing::info!(
            path = %path.display(),
            ?mode,
            shapes = catalog.len(),
            objects = registry.len(),
            "container opened"
        );

        Ok(Self {
            path,
            mode,
            file,
            header_written: !bytes.is_empty(),
            catalog,
            registry,
            series,
        })
    }

    // -- registration -------------------------------------------------------

    /// Register a shape definition and persist it. Returns the assigned id.
    ///
    /// Idempotent when `name` already maps to an identical definition (no
    /// record is written); fails with [`StoreError::DuplicateName`] on a
    /// conflicting redefinition.
    pub fn register_shape(&mut self, name: &str, def: ShapeDef) -> Result<u32, StoreError> {
        self.require_writable()?;
        let before = self.catalog.len();
        // Validate against the in-memory catalog first so a rejected or
        // idempotent registration writes nothing.
        let id = self.catalog.register(name, def)?;
        if self.catalog.len() > before {
            let entry = self
                .catalog
                .iter()
                .last()
                .map(|(_, e)| e.clone())
                .expect("catalog grew by one entry");
            self.write_record(&Record::Shape {
                name: entry.name,
                id,
                digest: entry.digest,
                def: entry.def,
            })?;
        }
        Ok(id)
    }

    /// Register an object description and persist it. Returns the signed id.
    pub fn register_object(&mut self, spec: ObjectSpec) -> Result<i64, StoreError> {
        self.require_writable()?;
        for contactor in &spec.contactors {
            if !self.catalog.contains(&contactor.shape) {
                return Err(StoreError::UnknownShape {
                    name: contactor.shape.clone(),
                });
            }
        }
        let name = spec.name.clone();
        let id = self.registry.register(spec)?;
        let record = self
            .registry
            .get(&name)
            .cloned()
            .expect("object was just registered");
        self.write_record(&Record::Object(record))?;
        Ok(id)
    }

    // -- time-series appends ------------------------------------------------

    /// Append a batch of rows to the `static` relation.
    pub fn append_static_poses(&mut self, rows: &[PoseRow]) -> Result<(), StoreError> {
        self.append_rows(RelationKind::StaticPose, flatten_poses(rows))
    }

    /// Append a batch of rows to the `dynamic` relation.
    pub fn append_dynamic_poses(&mut self, rows: &[PoseRow]) -> Result<(), StoreError> {
        self.append_rows(RelationKind::DynamicPose, flatten_poses(rows))
    }

    /// Append a batch of rows to the `contacts` relation. An empty batch is
    /// a no-op write, not an error: a step with no active contacts
    /// legitimately appends zero rows.
    pub fn append_contacts(&mut self, rows: &[ContactRow]) -> Result<(), StoreError> {
        self.append_rows(RelationKind::Contacts, flatten_contacts(rows))
    }

    /// Append one row to the `solver` relation.
    pub fn append_solver_trace(&mut self, row: &SolverRow) -> Result<(), StoreError> {
        self.append_rows(RelationKind::Solver, row.to_columns().to_vec())
    }

    fn append_rows(&mut self, kind: RelationKind, flat: Vec<f64>) -> Result<(), StoreError> {
        self.require_writable()?;
        if flat.is_empty() {
            return Ok(());
        }
        self.series.relation(kind).validate_batch(&flat)?;
        self.write_record(&Record::Rows {
            relation: kind,
            data: flat.clone(),
        })?;
        self.series.relation_mut(kind).apply_batch(&flat);
        Ok(())
    }

    // -- accessors ----------------------------------------------------------

    /// The shape catalog.
    pub fn catalog(&self) -> &ShapeCatalog {
        &self.catalog
    }

    /// The object registry.
    pub fn registry(&self) -> &ObjectRegistry {
        &self.registry
    }

    /// The four relations.
    pub fn series(&self) -> &TimeSeries {
        &self.series
    }

    /// Latest timestamp across all four relations, if anything was recorded.
    /// A resuming caller offsets its engine clock from this so appended rows
    /// keep the time columns non-decreasing.
    pub fn last_recorded_time(&self) -> Option<f64> {
        [
            RelationKind::StaticPose,
            RelationKind::DynamicPose,
            RelationKind::Contacts,
            RelationKind::Solver,
        ]
        .into_iter()
        .filter_map(|kind| self.series.relation(kind).last_time())
        .fold(None, |acc: Option<f64>, t| {
            Some(acc.map_or(t, |a| a.max(t)))
        })
    }

    /// Access mode of this handle.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    // -- lifecycle ----------------------------------------------------------

    /// Flush buffered frames to the operating system.
    pub fn flush(&mut self) -> Result<(), StoreError> {
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }

    /// Flush, sync, and release the file. The container is consumed; this is
    /// the only clean exit from the open state.
    pub fn close(mut self) -> Result<(), StoreError> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
            file.sync_all()?;
            tracing::info!(path = %self.path.display(), "container closed");
        }
        Ok(())
    }

    // -- internals ----------------------------------------------------------

    fn require_writable(&self) -> Result<(), StoreError> {
        if self.mode == Mode::ReadOnly {
            return Err(StoreError::ReadOnly {
                path: self.path.display().to_string(),
            });
        }
        Ok(())
    }

    /// Write one frame. The header goes out lazily with the first record so
    /// a never-written file stays empty. The frame is a single `write_all`,
    /// and in-memory state is only updated after it succeeds.
    fn write_record(&mut self, record: &Record) -> Result<(), StoreError> {
        let frame = record::encode_frame(record)?;
        let file = self.file.as_mut().ok_or_else(|| StoreError::ReadOnly {
            path: self.path.display().to_string(),
        })?;
        if !self.header_written {
            file.write_all(&record::header())?;
            self.header_written = true;
        }
        file.write_all(&frame)?;
        Ok(())
    }
}

impl Drop for Container {
    /// Best-effort flush on every exit path. Errors are logged, not raised:
    /// the drop may already be running during an unwind.
    fn drop(&mut self) {
        if let Some(file) = self.file.as_mut() {
            if let Err(e) = file.flush() {
                tracing::warn!(path = %self.path.display(), error = %e, "flush on drop failed");
            }
        }
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("shapes", &self.catalog.len())
            .field("objects", &self.registry.len())
            .finish()
    }
}
