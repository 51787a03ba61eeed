//! rapier3d-backed implementation of the Kinetrace engine interface.
//!
//! [`RapierEngine`] wraps a full rapier3d simulation (pipeline, body and
//! collider sets, broad/narrow phase) behind
//! [`SimulationEngine`](kinetrace_engine::engine::SimulationEngine), so a
//! container can be assembled into, stepped, and recorded against a real
//! physics engine.
//!
//! World gravity is zero by construction: external forces are per-body and
//! come from the caller's force policy through
//! [`set_external_force`](kinetrace_engine::engine::SimulationEngine::set_external_force),
//! which keeps recorded runs independent of any engine-global setting.
//!
//! rapier exposes neither a nonsmooth solver id nor residual precisions, so
//! [`solver_options`](kinetrace_engine::engine::SimulationEngine::solver_options)
//! reports an unknown solver kind with the iteration counts it does have;
//! traces recorded from this engine go through the recorder's best-effort
//! fallback mapping by design.

#![deny(unsafe_code)]

use rapier3d::na::{Quaternion, Translation3, UnitQuaternion};
use rapier3d::prelude::*;

use kinetrace_engine::engine::{
    ContactSample, EngineError, Pose, QueryError, SimulationEngine, SolverOptions,
};
use kinetrace_engine::solver::SolverKind;
use kinetrace_store::shape::{Primitive, ShapeDef};

// ---------------------------------------------------------------------------
// RapierEngine
// ---------------------------------------------------------------------------

/// A rapier3d world driven through the Kinetrace engine interface.
pub struct RapierEngine {
    pipeline: PhysicsPipeline,
    params: IntegrationParameters,
    islands: IslandManager,
    broad_phase: BroadPhaseBvh,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd: CCDSolver,
    /// Dynamic bodies in creation order; this *is* dynamic-id order, because
    /// the assembler instantiates in registry order.
    dynamic_handles: Vec<RigidBodyHandle>,
    /// Accumulated simulation time.
    time: f64,
    /// Duration of the last computed step; 0 before the first step.
    last_dt: f64,
}

impl Default for RapierEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RapierEngine {
    /// Create an empty world.
    pub fn new() -> Self {
        Self {
            pipeline: PhysicsPipeline::new(),
            params: IntegrationParameters::default(),
            islands: IslandManager::new(),
            broad_phase: BroadPhaseBvh::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd: CCDSolver::new(),
            dynamic_handles: Vec::new(),
            time: 0.0,
            last_dt: 0.0,
        }
    }

    /// Advance the simulation by `dt` seconds.
    pub fn advance(&mut self, dt: f64) {
        self.params.dt = dt as Real;
        self.pipeline.step(
            &vector![0.0, 0.0, 0.0], // per-body forces only
            &self.params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd,
            &(),
            &(),
        );
        self.time += dt;
        self.last_dt = dt;
    }

    /// Number of rigid bodies (static proxies included).
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Set the simulation clock. A resuming caller seeds this from
    /// `Container::last_recorded_time` so recorded timestamps continue the
    /// existing series instead of restarting at zero.
    pub fn set_clock(&mut self, time: f64) {
        self.time = time;
    }

    fn isometry(pose: &Pose) -> Isometry<Real> {
        let [x, y, z] = pose.position;
        let [qw, qx, qy, qz] = pose.orientation;
        Isometry::from_parts(
            Translation3::new(x as Real, y as Real, z as Real),
            UnitQuaternion::from_quaternion(Quaternion::new(
                qw as Real, qx as Real, qy as Real, qz as Real,
            )),
        )
    }

    fn shared_shape(shape: &ShapeDef) -> Result<SharedShape, EngineError> {
        match shape {
            ShapeDef::Primitive(Primitive::Sphere { radius }) => {
                Ok(SharedShape::ball(*radius as Real))
            }
            ShapeDef::Primitive(Primitive::Cuboid { half_extents }) => Ok(SharedShape::cuboid(
                half_extents[0] as Real,
                half_extents[1] as Real,
                half_extents[2] as Real,
            )),
            ShapeDef::Primitive(Primitive::Capsule {
                half_height,
                radius,
            }) => Ok(SharedShape::capsule_y(
                *half_height as Real,
                *radius as Real,
            )),
            ShapeDef::Primitive(Primitive::Cylinder {
                half_height,
                radius,
            }) => Ok(SharedShape::cylinder(
                *half_height as Real,
                *radius as Real,
            )),
            ShapeDef::Primitive(Primitive::Plane) => Ok(SharedShape::halfspace(
                UnitVector::new_normalize(vector![0.0, 0.0, 1.0]),
            )),
            // Opaque mesh payloads would need the import pipeline; this
            // engine only builds parametric primitives.
            ShapeDef::MeshBlob { .. } | ShapeDef::ExternalFile { .. } => {
                Err(EngineError::UnsupportedShape {
                    kind: shape.kind_name(),
                })
            }
        }
    }

    /// Collision groups for a contactor group id: one membership bit for
    /// small non-negative ids, interacting with everything.
    fn interaction_groups(group: i32) -> InteractionGroups {
        if (0..32).contains(&group) {
            InteractionGroups::new(
                Group::from_bits_truncate(1u32 << group),
                Group::ALL,
                InteractionTestMode::And,
            )
        } else {
            InteractionGroups::all()
        }
    }
}

// ---------------------------------------------------------------------------
// SimulationEngine impl
// ---------------------------------------------------------------------------

impl SimulationEngine for RapierEngine {
    type Handle = RigidBodyHandle;

    fn current_time(&self) -> f64 {
        self.time
    }

    fn dynamic_poses(&mut self) -> Result<Vec<Pose>, QueryError> {
        self.dynamic_handles
            .iter()
            .map(|&handle| {
                let body = self
                    .bodies
                    .get(handle)
                    .ok_or_else(|| QueryError::Backend("dynamic body vanished".to_owned()))?;
                let translation = body.translation();
                let rotation = body.rotation();
                Ok(Pose {
                    position: [
                        translation.x as f64,
                        translation.y as f64,
                        translation.z as f64,
                    ],
                    orientation: [
                        rotation.w as f64,
                        rotation.i as f64,
                        rotation.j as f64,
                        rotation.k as f64,
                    ],
                })
            })
            .collect()
    }

    fn active_contacts(&mut self) -> Result<Vec<ContactSample>, QueryError> {
        if self.last_dt == 0.0 {
            // Nothing has been solved yet; there are no constraint
            // multipliers to report.
            return Ok(Vec::new());
        }
        let mut samples = Vec::new();
        for pair in self.narrow_phase.contact_pairs() {
            if !pair.has_any_active_contact {
                continue;
            }
            let (c1, c2) = match (
                self.colliders.get(pair.collider1),
                self.colliders.get(pair.collider2),
            ) {
                (Some(c1), Some(c2)) => (c1, c2),
                _ => continue,
            };
            let friction = 0.5 * (c1.friction() + c2.friction()) as f64;
            for manifold in &pair.manifolds {
                let normal = manifold.data.normal;
                for point in &manifold.points {
                    // Untouched speculative points carry no reaction.
                    if point.dist > 0.0 && point.data.impulse == 0.0 {
                        continue;
                    }
                    let pa = c1.rotation().transform_point(&point.local_p1) + c1.translation();
                    let pb = c2.rotation().transform_point(&point.local_p2) + c2.translation();
                    let force = normal * (point.data.impulse / self.last_dt as Real);
                    samples.push(ContactSample {
                        friction,
                        point_a: [pa.x as f64, pa.y as f64, pa.z as f64],
                        point_b: [pb.x as f64, pb.y as f64, pb.z as f64],
                        normal: [normal.x as f64, normal.y as f64, normal.z as f64],
                        force: [force.x as f64, force.y as f64, force.z as f64],
                    });
                }
            }
        }
        Ok(samples)
    }

    fn solver_options(&mut self) -> Result<SolverOptions, QueryError> {
        if self.last_dt == 0.0 {
            return Err(QueryError::NoCurrentStep);
        }
        // rapier has no nonsmooth solver id and no residuals; expose the
        // iteration counts it does have at the fallback mapping's offsets.
        Ok(SolverOptions {
            kind: SolverKind::Other(0),
            iparam: vec![
                0,
                self.params.num_solver_iterations as i64,
                self.params.num_internal_pgs_iterations as i64,
            ],
            dparam: vec![
                0.0,
                self.params.normalized_allowed_linear_error as f64,
                0.0,
            ],
        })
    }

    fn instantiate_static_proxy(
        &mut self,
        shape: &ShapeDef,
        pose: &Pose,
        group: i32,
    ) -> Result<(), EngineError> {
        let shared = Self::shared_shape(shape)?;
        let body = RigidBodyBuilder::fixed().pose(Self::isometry(pose)).build();
        let handle = self.bodies.insert(body);
        let collider = ColliderBuilder::new(shared)
            .collision_groups(Self::interaction_groups(group))
            .build();
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);
        tracing::debug!(kind = shape.kind_name(), group, "static proxy added");
        Ok(())
    }

    fn instantiate_dynamic_body(
        &mut self,
        shape: &ShapeDef,
        pose: &Pose,
        velocity: &[f64; 6],
        mass: f64,
    ) -> Result<Self::Handle, EngineError> {
        let shared = Self::shared_shape(shape)?;
        let body = RigidBodyBuilder::dynamic()
            .pose(Self::isometry(pose))
            .linvel(vector![
                velocity[0] as Real,
                velocity[1] as Real,
                velocity[2] as Real
            ])
            .angvel(vector![
                velocity[3] as Real,
                velocity[4] as Real,
                velocity[5] as Real
            ])
            .additional_mass(mass as Real)
            .build();
        let handle = self.bodies.insert(body);
        // Zero density: the body's mass is exactly the registered mass, not
        // mass plus whatever the collider volume would contribute.
        let collider = ColliderBuilder::new(shared).density(0.0).build();
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);
        self.dynamic_handles.push(handle);
        tracing::debug!(kind = shape.kind_name(), mass, "dynamic body added");
        Ok(handle)
    }

    fn add_compound_shape(
        &mut self,
        handle: Self::Handle,
        shape: &ShapeDef,
        offset: &Pose,
        group: i32,
    ) -> Result<(), EngineError> {
        if self.bodies.get(handle).is_none() {
            return Err(EngineError::UnknownHandle);
        }
        let shared = Self::shared_shape(shape)?;
        let collider = ColliderBuilder::new(shared)
            .position(Self::isometry(offset))
            .density(0.0)
            .collision_groups(Self::interaction_groups(group))
            .build();
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);
        Ok(())
    }

    fn set_external_force(
        &mut self,
        handle: Self::Handle,
        force: [f64; 3],
    ) -> Result<(), EngineError> {
        let body = self.bodies.get_mut(handle).ok_or(EngineError::UnknownHandle)?;
        body.reset_forces(true);
        body.add_force(
            vector![force[0] as Real, force[1] as Real, force[2] as Real],
            true,
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
