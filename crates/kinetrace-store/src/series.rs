//! The four append-only time-series relations.
//!
//! Each relation is a growable row store with a fixed column layout:
//!
//! | relation  | columns | layout                                              |
//! |-----------|---------|-----------------------------------------------------|
//! | `static`  | 9       | time, id, px, py, pz, qw, qx, qy, qz                |
//! | `dynamic` | 9       | time, id, px, py, pz, qw, qx, qy, qz                |
//! | `contacts`| 15      | time, mu, paxyz, pbxyz, nxyz, fxyz, reserved        |
//! | `solver`  | 4       | time, iterations, precision, local_precision        |
//!
//! Rows are only ever appended at the tail, in non-decreasing time order, and
//! a batch append is all-or-nothing. The column order is a compatibility
//! contract between writer and reader versions and must not change.
//!
//! The contacts relation carries a trailing reserved column (always written
//! as 0.0): the layout is fixed at 15 columns while only the first 14 carry
//! data, and readers slice columns 0-13.

use serde::{Deserialize, Serialize};

use crate::StoreError;

// ---------------------------------------------------------------------------
// RelationKind
// ---------------------------------------------------------------------------

/// Identifies one of the four relations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    /// Static-object poses.
    StaticPose,
    /// Dynamic-object poses.
    DynamicPose,
    /// Contact events.
    Contacts,
    /// Solver-iteration traces.
    Solver,
}

impl RelationKind {
    /// Stable relation name, as used in the container layout.
    pub fn name(self) -> &'static str {
        match self {
            RelationKind::StaticPose => "static",
            RelationKind::DynamicPose => "dynamic",
            RelationKind::Contacts => "contacts",
            RelationKind::Solver => "solver",
        }
    }

    /// Fixed column count.
    pub fn columns(self) -> usize {
        match self {
            RelationKind::StaticPose | RelationKind::DynamicPose => 9,
            RelationKind::Contacts => 15,
            RelationKind::Solver => 4,
        }
    }
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// One pose row: shared layout of the `static` and `dynamic` relations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseRow {
    /// Simulation timestamp.
    pub time: f64,
    /// Signed object id.
    pub id: i64,
    /// Position.
    pub position: [f64; 3],
    /// Orientation, unit quaternion (w, x, y, z).
    pub orientation: [f64; 4],
}

impl PoseRow {
    /// Encode into the fixed column layout.
    pub fn to_columns(&self) -> [f64; 9] {
        let [px, py, pz] = self.position;
        let [qw, qx, qy, qz] = self.orientation;
        [self.time, self.id as f64, px, py, pz, qw, qx, qy, qz]
    }

    /// Decode from the fixed column layout.
    pub fn from_columns(c: &[f64]) -> Self {
        Self {
            time: c[0],
            id: c[1] as i64,
            position: [c[2], c[3], c[4]],
            orientation: [c[5], c[6], c[7], c[8]],
        }
    }
}

/// One contact-event row. Zero or more per timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContactRow {
    /// Simulation timestamp.
    pub time: f64,
    /// Friction coefficient of the non-smooth law at this contact.
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

impl ContactRow {
    /// Encode into the fixed column layout; the 15th column is reserved and
    /// written as 0.0.
    pub fn to_columns(&self) -> [f64; 15] {
        let [pax, pay, paz] = self.point_a;
        let [pbx, pby, pbz] = self.point_b;
        let [nx, ny, nz] = self.normal;
        let [fx, fy, fz] = self.force;
        [
            self.time,
            self.friction,
            pax,
            pay,
            paz,
            pbx,
            pby,
            pbz,
            nx,
            ny,
            nz,
            fx,
            fy,
            fz,
            0.0,
        ]
    }

    /// Decode from the fixed column layout (the reserved column is ignored).
    pub fn from_columns(c: &[f64]) -> Self {
        Self {
            time: c[0],
            friction: c[1],
            point_a: [c[2], c[3], c[4]],
            point_b: [c[5], c[6], c[7]],
            normal: [c[8], c[9], c[10]],
            force: [c[11], c[12], c[13]],
        }
    }
}

/// One solver-trace row. Exactly one per recorded step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverRow {
    /// Simulation timestamp.
    pub time: f64,
    /// Iterations the solver spent on the step.
    pub iterations: u64,
    /// Global precision reached.
    pub precision: f64,
    /// Local precision reached (0 where the solver has no such notion).
    pub local_precision: f64,
}

impl SolverRow {
    /// Encode into the fixed column layout.
    pub fn to_columns(&self) -> [f64; 4] {
        [
            self.time,
            self.iterations as f64,
            self.precision,
            self.local_precision,
        ]
    }

    /// Decode from the fixed column layout.
    pub fn from_columns(c: &[f64]) -> Self {
        Self {
            time: c[0],
            iterations: c[1] as u64,
            precision: c[2],
            local_precision: c[3],
        }
    }
}

// ---------------------------------------------------------------------------
// Relation
// ---------------------------------------------------------------------------

/// One growable, fixed-schema, append-only row store.
///
/// Rows are held as a flat row-major `f64` buffer; the width comes from the
/// relation kind. Mutation is limited to whole-batch appends at the tail.
#[derive(Debug)]
pub struct Relation {
    kind: RelationKind,
    data: Vec<f64>,
}

impl Relation {
    fn new(kind: RelationKind) -> Self {
        Self {
            kind,
            data: Vec::new(),
        }
    }

    /// The relation's kind.
    pub fn kind(&self) -> RelationKind {
        self.kind
    }

    /// Number of complete rows.
    pub fn row_count(&self) -> usize {
        self.data.len() / self.kind.columns()
    }

    /// Timestamp of the last row, if any.
    pub fn last_time(&self) -> Option<f64> {
        if self.data.is_empty() {
            None
        } else {
            Some(self.data[self.data.len() - self.kind.columns()])
        }
    }

    /// Check a flat batch without mutating: whole rows only, and every row
    /// time non-decreasing (within the batch and against the current tail).
    pub fn validate_batch(&self, flat: &[f64]) -> Result<(), StoreError> {
        let columns = self.kind.columns();
        if flat.len() % columns != 0 {
            return Err(StoreError::RaggedBatch {
                relation: self.kind.name(),
                values: flat.len(),
                columns,
            });
        }
        let mut last = self.last_time();
        for row in flat.chunks_exact(columns) {
            let time = row[0];
            if let Some(prev) = last {
                if time < prev {
                    return Err(StoreError::NonMonotonicTime {
                        relation: self.kind.name(),
                        last: prev,
                        attempted: time,
                    });
                }
            }
            last = Some(time);
        }
        Ok(())
    }

    /// Append a batch previously accepted by [`validate_batch`](Self::validate_batch).
    pub(crate) fn apply_batch(&mut self, flat: &[f64]) {
        debug_assert!(self.validate_batch(flat).is_ok());
        self.data.extend_from_slice(flat);
    }

    /// Iterate raw rows in append order.
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.data.chunks_exact(self.kind.columns())
    }

    /// Rows whose timestamp matches `time` exactly. The export tooling reads
    /// one frame at a time this way.
    pub fn rows_at_time(&self, time: f64) -> impl Iterator<Item = &[f64]> {
        self.rows().filter(move |row| row[0] == time)
    }
}

// ---------------------------------------------------------------------------
// TimeSeries
// ---------------------------------------------------------------------------

/// The four relations of one container.
#[derive(Debug)]
pub struct TimeSeries {
    static_poses: Relation,
    dynamic_poses: Relation,
    contacts: Relation,
    solver: Relation,
}

impl Default for TimeSeries {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSeries {
    /// Create four empty relations.
    pub fn new() -> Self {
        Self {
            static_poses: Relation::new(RelationKind::StaticPose),
            dynamic_poses: Relation::new(RelationKind::DynamicPose),
            contacts: Relation::new(RelationKind::Contacts),
            solver: Relation::new(RelationKind::Solver),
        }
    }

    /// The relation for `kind`.
    pub fn relation(&self, kind: RelationKind) -> &Relation {
        match kind {
            RelationKind::StaticPose => &self.static_poses,
            RelationKind::DynamicPose => &self.dynamic_poses,
            RelationKind::Contacts => &self.contacts,
            RelationKind::Solver => &self.solver,
        }
    }

    pub(crate) fn relation_mut(&mut self, kind: RelationKind) -> &mut Relation {
        match kind {
            RelationKind::StaticPose => &mut self.static_poses,
            RelationKind::DynamicPose => &mut self.dynamic_poses,
            RelationKind::Contacts => &mut self.contacts,
            RelationKind::Solver => &mut self.solver,
        }
    }

    /// Decoded rows of the `static` relation.
    pub fn static_rows(&self) -> impl Iterator<Item = PoseRow> + '_ {
        self.static_poses.rows().map(PoseRow::from_columns)
    }

    /// Decoded rows of the `dynamic` relation.
    pub fn dynamic_rows(&self) -> impl Iterator<Item = PoseRow> + '_ {
        self.dynamic_poses.rows().map(PoseRow::from_columns)
    }

    /// Decoded rows of the `contacts` relation.
    pub fn contact_rows(&self) -> impl Iterator<Item = ContactRow> + '_ {
        self.contacts.rows().map(ContactRow::from_columns)
    }

    /// Decoded rows of the `solver` relation.
    pub fn solver_rows(&self) -> impl Iterator<Item = SolverRow> + '_ {
        self.solver.rows().map(SolverRow::from_columns)
    }
}

// ---------------------------------------------------------------------------
// Flat encoding helpers
// ---------------------------------------------------------------------------

/// Flatten pose rows into the column layout.
pub(crate) fn flatten_poses(rows: &[PoseRow]) -> Vec<f64> {
    rows.iter().flat_map(|r| r.to_columns()).collect()
}

/// Flatten contact rows into the column layout.
pub(crate) fn flatten_contacts(rows: &[ContactRow]) -> Vec<f64> {
    rows.iter().flat_map(|r| r.to_columns()).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
