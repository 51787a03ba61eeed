//! A scripted in-memory engine for exercising assembly and recording.
#![allow(dead_code)]

use kinetrace_engine::engine::{
    ContactSample, EngineError, Pose, QueryError, SimulationEngine, SolverOptions,
};
use kinetrace_store::shape::ShapeDef;

/// One instantiated static collision proxy.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticProxy {
    pub shape_kind: &'static str,
    pub pose: Pose,
    pub group: i32,
}

/// One instantiated dynamic body.
#[derive(Debug, Clone)]
pub struct MockBody {
    pub shape_kind: &'static str,
    pub pose: Pose,
    pub velocity: [f64; 6],
    pub mass: f64,
    pub compounds: Vec<(&'static str, Pose, i32)>,
    pub external_force: Option<[f64; 3]>,
}

/// Scripted engine: instantiation calls are recorded verbatim, queries
/// answer from fields the test sets up.
#[derive(Debug, Default)]
pub struct MockEngine {
    pub time: f64,
    pub proxies: Vec<StaticProxy>,
    pub bodies: Vec<MockBody>,
    pub contacts: Vec<ContactSample>,
    pub solver: Option<SolverOptions>,
    /// Make pose queries fail, as an engine with no computed step would.
    pub fail_pose_query: bool,
    /// Report this many bogus extra poses to simulate a desynced engine.
    pub extra_poses: usize,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total instantiation calls seen so far.
    pub fn instantiation_count(&self) -> usize {
        self.proxies.len() + self.bodies.len()
    }
}

impl SimulationEngine for MockEngine {
    type Handle = usize;

    fn current_time(&self) -> f64 {
        self.time
    }

    fn dynamic_poses(&mut self) -> Result<Vec<Pose>, QueryError> {
        if self.fail_pose_query {
            return Err(QueryError::NoCurrentStep);
        }
        let mut poses: Vec<Pose> = self.bodies.iter().map(|b| b.pose).collect();
        poses.extend(std::iter::repeat(Pose::identity()).take(self.extra_poses));
        Ok(poses)
    }

    fn active_contacts(&mut self) -> Result<Vec<ContactSample>, QueryError> {
        Ok(self.contacts.clone())
    }

    fn solver_options(&mut self) -> Result<SolverOptions, QueryError> {
        self.solver.clone().ok_or(QueryError::NoCurrentStep)
    }

    fn instantiate_static_proxy(
        &mut self,
        shape: &ShapeDef,
        pose: &Pose,
        group: i32,
    ) -> Result<(), EngineError> {
        self.proxies.push(StaticProxy {
            shape_kind: shape.kind_name(),
            pose: *pose,
            group,
        });
        Ok(())
    }

    fn instantiate_dynamic_body(
        &mut self,
        shape: &ShapeDef,
        pose: &Pose,
        velocity: &[f64; 6],
        mass: f64,
    ) -> Result<usize, EngineError> {
        self.bodies.push(MockBody {
            shape_kind: shape.kind_name(),
            pose: *pose,
            velocity: *velocity,
            mass,
            compounds: Vec::new(),
            external_force: None,
        });
        Ok(self.bodies.len() - 1)
    }

    fn add_compound_shape(
        &mut self,
        handle: usize,
        shape: &ShapeDef,
        offset: &Pose,
        group: i32,
    ) -> Result<(), EngineError> {
        let body = self
            .bodies
            .get_mut(handle)
            .ok_or(EngineError::UnknownHandle)?;
        body.compounds.push((shape.kind_name(), *offset, group));
        Ok(())
    }

    fn set_external_force(&mut self, handle: usize, force: [f64; 3]) -> Result<(), EngineError> {
        let body = self
            .bodies
            .get_mut(handle)
            .ok_or(EngineError::UnknownHandle)?;
        body.external_force = Some(force);
        Ok(())
    }
}
