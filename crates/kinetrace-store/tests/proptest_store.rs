//! Property-based tests for id stability and relation growth.
//!
//! These tests use `proptest` to generate random registration sequences and
//! step schedules, checking the invariants the rest of the system leans on:
//! ids assigned at first registration survive close/reopen, and each relation
//! grows by exactly the contracted number of rows per recorded step.

use proptest::prelude::*;

use kinetrace_store::prelude::*;

// -- generators -------------------------------------------------------------

/// A mass of exactly zero (static) or a positive dynamic mass.
fn mass_strategy() -> impl Strategy<Value = f64> {
    prop_oneof![Just(0.0), 0.1f64..100.0]
}

fn radius_strategy() -> impl Strategy<Value = f64> {
    0.01f64..10.0
}

// -- properties -------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Registering any mix of static and dynamic objects, closing, and
    /// reopening reproduces every assigned id.
    #[test]
    fn ids_survive_close_and_reopen(
        masses in prop::collection::vec(mass_strategy(), 1..20),
        radii in prop::collection::vec(radius_strategy(), 1..5),
    ) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prop.ktrc");

        let mut expected = Vec::new();
        {
            let mut c = Container::open(&path, Mode::ReadWrite).unwrap();
            for (i, radius) in radii.iter().enumerate() {
                let id = c
                    .register_shape(
                        &format!("shape{i}"),
                        ShapeDef::Primitive(Primitive::Sphere { radius: *radius }),
                    )
                    .unwrap();
                prop_assert_eq!(id as usize, i);
            }
            for (i, mass) in masses.iter().enumerate() {
                let shape = format!("shape{}", i % radii.len());
                let id = c
                    .register_object(ObjectSpec {
                        name: format!("obj{i}"),
                        mass: *mass,
                        position: [0.0; 3],
                        orientation: [1.0, 0.0, 0.0, 0.0],
                        velocity: [0.0; 6],
                        contactors: vec![Contactor::new(&shape, 0)],
                    })
                    .unwrap();
                expected.push((format!("obj{i}"), id));
            }
            c.close().unwrap();
        }

        let c = Container::open(&path, Mode::ReadOnly).unwrap();
        for (name, id) in &expected {
            prop_assert_eq!(c.registry().get(name).unwrap().id, *id);
        }

        // Ids are dense per class, in registration order.
        let static_ids: Vec<i64> = c.registry().statics().map(|o| o.id).collect();
        let dynamic_ids: Vec<i64> = c.registry().dynamics().map(|o| o.id).collect();
        prop_assert_eq!(static_ids, (1..).map(|i| -i).take(c.registry().static_count()).collect::<Vec<_>>());
        prop_assert_eq!(dynamic_ids, (1..=c.registry().dynamic_count() as i64).collect::<Vec<_>>());
    }

    /// Over any step schedule, the static relation grows by the static
    /// object count per step, the dynamic relation by the dynamic count,
    /// the solver relation by one, and the contact relation by the number
    /// of contacts active at that step.
    #[test]
    fn relation_growth_matches_the_contract(
        n_static in 0usize..4,
        n_dynamic in 1usize..4,
        contact_counts in prop::collection::vec(0usize..5, 1..12),
    ) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prop.ktrc");
        let mut c = Container::open(&path, Mode::ReadWrite).unwrap();

        let mut expected_contacts = 0;
        for (step, n_contacts) in contact_counts.iter().enumerate() {
            let time = step as f64 * 0.005;
            let static_rows: Vec<PoseRow> = (0..n_static)
                .map(|i| PoseRow {
                    time,
                    id: -(i as i64 + 1),
                    position: [0.0; 3],
                    orientation: [1.0, 0.0, 0.0, 0.0],
                })
                .collect();
            let dynamic_rows: Vec<PoseRow> = (0..n_dynamic)
                .map(|i| PoseRow {
                    time,
                    id: i as i64 + 1,
                    position: [0.0, 0.0, time],
                    orientation: [1.0, 0.0, 0.0, 0.0],
                })
                .collect();
            let contact_rows: Vec<ContactRow> = (0..*n_contacts)
                .map(|_| ContactRow {
                    time,
                    friction: 0.3,
                    point_a: [0.0; 3],
                    point_b: [0.0; 3],
                    normal: [0.0, 0.0, 1.0],
                    force: [0.0; 3],
                })
                .collect();

            c.append_static_poses(&static_rows).unwrap();
            c.append_dynamic_poses(&dynamic_rows).unwrap();
            c.append_contacts(&contact_rows).unwrap();
            c.append_solver_trace(&SolverRow {
                time,
                iterations: 1,
                precision: 0.0,
                local_precision: 0.0,
            })
            .unwrap();
            expected_contacts += n_contacts;
        }

        let steps = contact_counts.len();
        let series = c.series();
        prop_assert_eq!(
            series.relation(RelationKind::StaticPose).row_count(),
            n_static * steps
        );
        prop_assert_eq!(
            series.relation(RelationKind::DynamicPose).row_count(),
            n_dynamic * steps
        );
        prop_assert_eq!(
            series.relation(RelationKind::Contacts).row_count(),
            expected_contacts
        );
        prop_assert_eq!(series.relation(RelationKind::Solver).row_count(), steps);
        c.close().unwrap();
    }
}
