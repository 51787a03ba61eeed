//! Per-step state capture into the container.
//!
//! A [`StepRecorder`] borrows the container and the engine for the duration
//! of one or more record calls. Each call queries the engine, builds one
//! batch of rows, and appends it in a single container write, so a failing
//! call leaves the relations exactly as they were. Errors from engine
//! queries surface as [`RecordError::Query`] and abort only the current
//! call; a long-running loop is expected to log them and keep stepping.

use kinetrace_store::container::Container;
use kinetrace_store::series::{ContactRow, PoseRow, SolverRow};
use kinetrace_store::StoreError;

use crate::engine::{QueryError, SimulationEngine};
use crate::solver::SolverFieldMap;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A record call failed. Only that call is affected; the container stays
/// open and the next step can record normally.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// The engine could not answer the query behind this record call.
    #[error(transparent)]
    Query(#[from] QueryError),
    /// The engine answered, but with a pose list that does not line up with
    /// the registry's dynamic objects.
    #[error("engine reported {got} dynamic poses but the registry has {expected} dynamic objects")]
    DynamicCountMismatch { expected: usize, got: usize },
    /// The container rejected the append.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// StepRecorder
// ---------------------------------------------------------------------------

/// Records one step's worth of simulation state.
pub struct StepRecorder<'a, E: SimulationEngine> {
    container: &'a mut Container,
    engine: &'a mut E,
}

impl<'a, E: SimulationEngine> StepRecorder<'a, E> {
    /// Borrow a container and an engine for recording.
    pub fn new(container: &'a mut Container, engine: &'a mut E) -> Self {
        Self { container, engine }
    }

    /// Write one row per static object to the `static` relation, at the
    /// object's registered pose. Grows the relation by exactly the static
    /// object count.
    pub fn record_static_poses(&mut self, time: f64) -> Result<usize, RecordError> {
        let rows: Vec<PoseRow> = self
            .container
            .registry()
            .statics()
            .map(|o| PoseRow {
                time,
                id: o.id,
                position: o.position,
                orientation: o.orientation,
            })
            .collect();
        self.container.append_static_poses(&rows)?;
        Ok(rows.len())
    }

    /// Query the engine for every dynamic body's current pose and write one
    /// row per dynamic object. The engine reports poses in dynamic-id order;
    /// a count mismatch against the registry aborts the call before any row
    /// is written.
    pub fn record_dynamic_poses(&mut self, time: f64) -> Result<usize, RecordError> {
        let poses = self.engine.dynamic_poses()?;
        let ids: Vec<i64> = self.container.registry().dynamics().map(|o| o.id).collect();
        if poses.len() != ids.len() {
            return Err(RecordError::DynamicCountMismatch {
                expected: ids.len(),
                got: poses.len(),
            });
        }
        let rows: Vec<PoseRow> = ids
            .into_iter()
            .zip(poses)
            .map(|(id, pose)| PoseRow {
                time,
                id,
                position: pose.position,
                orientation: pose.orientation,
            })
            .collect();
        self.container.append_dynamic_poses(&rows)?;
        Ok(rows.len())
    }

    /// Write one row per currently active contact. No active contacts means
    /// a no-op write of zero rows, which is a normal outcome.
    pub fn record_contacts(&mut self, time: f64) -> Result<usize, RecordError> {
        let contacts = self.engine.active_contacts()?;
        let rows: Vec<ContactRow> = contacts
            .iter()
            .map(|c| ContactRow {
                time,
                friction: c.friction,
                point_a: c.point_a,
                point_b: c.point_b,
                normal: c.normal,
                force: c.force,
            })
            .collect();
        self.container.append_contacts(&rows)?;
        Ok(rows.len())
    }

    /// Write exactly one solver-trace row, mapping the engine's raw solver
    /// options through the kind-keyed field lookup. Rows read through the
    /// unknown-kind fallback are recorded all the same, but the mapping is
    /// best-effort (see [`crate::solver`]).
    pub fn record_solver_trace(&mut self, time: f64) -> Result<(), RecordError> {
        let options = self.engine.solver_options()?;
        let sample = SolverFieldMap::for_kind(options.kind).read(&options)?;
        if sample.best_effort {
            tracing::debug!(
                kind = ?options.kind,
                "solver trace read through the best-effort fallback mapping"
            );
        }
        self.container.append_solver_trace(&SolverRow {
            time,
            iterations: sample.iterations,
            precision: sample.precision,
            local_precision: sample.local_precision,
        })?;
        Ok(())
    }

    /// Record a complete step: static poses, dynamic poses, contacts, and
    /// the solver trace, all stamped with the engine's current time.
    pub fn record_step(&mut self) -> Result<(), RecordError> {
        let time = self.engine.current_time();
        self.record_static_poses(time)?;
        self.record_dynamic_poses(time)?;
        self.record_contacts(time)?;
        self.record_solver_trace(time)?;
        tracing::debug!(time, "step recorded");
        Ok(())
    }
}
