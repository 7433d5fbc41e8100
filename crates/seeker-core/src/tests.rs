#[cfg(test)]
mod tests {
    use glam::{DQuat, DVec3};

    use crate::ammo::*;
    use crate::config::{ConfigError, EngineConfig};
    use crate::constants::*;
    use crate::enums::*;
    use crate::error::FlightError;
    use crate::events::FlightEvent;
    use crate::state::{ClusterRecord, ProjectileRecord};
    use crate::types::*;

    // ---- Stage ----

    #[test]
    fn test_stage_order_follows_flight() {
        let order = [
            Stage::Rail,
            Stage::SemiActive,
            Stage::Boost,
            Stage::MidCourse,
            Stage::Guided,
            Stage::Ballistic,
            Stage::Terminated,
            Stage::Exploded,
        ];
        for pair in order.windows(2) {
            assert!(pair[0] < pair[1], "{:?} should precede {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_stage_u8_round_trip() {
        for v in 0..=7u8 {
            assert_eq!(Stage::from_u8(v) as u8, v);
        }
        assert_eq!(Stage::from_u8(200), Stage::Exploded, "out of range saturates");
    }

    #[test]
    fn test_stage_predicates() {
        assert!(Stage::Terminated.is_terminal());
        assert!(Stage::Exploded.is_terminal());
        assert!(!Stage::Ballistic.is_terminal());

        assert!(Stage::Boost.steers());
        assert!(Stage::MidCourse.steers());
        assert!(Stage::SemiActive.steers());
        assert!(Stage::Guided.steers());
        assert!(!Stage::Rail.steers(), "rail is unguided");
        assert!(!Stage::Ballistic.steers());

        assert!(Stage::Guided.has_guidance_timer());
        assert!(!Stage::MidCourse.has_guidance_timer());
    }

    #[test]
    fn test_stage_serde() {
        let json = serde_json::to_string(&Stage::MidCourse).unwrap();
        let back: Stage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Stage::MidCourse);
    }

    // ---- Target types ----

    #[test]
    fn test_target_types_allow_matching_category() {
        let types = TargetTypes::LARGE_GRID | TargetTypes::MISSILE;
        assert!(types.allows(EntityCategory::LargeGrid));
        assert!(types.allows(EntityCategory::Missile));
        assert!(!types.allows(EntityCategory::Character));
        assert!(!types.allows(EntityCategory::Unknown), "unknown is never allowed");
    }

    #[test]
    fn test_target_types_groups() {
        assert!(TargetTypes::ALL_GRID.allows(EntityCategory::Station));
        assert!(TargetTypes::PROJECTILE.allows(EntityCategory::Meteor));
        assert!(TargetTypes::PROJECTILE.allows(EntityCategory::FloatingObject));
        assert!(!TargetTypes::PROJECTILE.allows(EntityCategory::SmallGrid));
        assert!(!TargetTypes::NONE.allows(EntityCategory::SmallGrid));
        for category in [
            EntityCategory::Missile,
            EntityCategory::Meteor,
            EntityCategory::Character,
            EntityCategory::FloatingObject,
            EntityCategory::LargeGrid,
            EntityCategory::SmallGrid,
            EntityCategory::Station,
        ] {
            assert!(TargetTypes::ALL.allows(category), "ALL should allow {category:?}");
        }
    }

    // ---- Transform ----

    #[test]
    fn test_transform_looking_forward() {
        let t = Transform::looking(DVec3::new(1.0, 2.0, 3.0), DVec3::X);
        assert!((t.forward() - DVec3::X).length() < 1e-9, "forward = {:?}", t.forward());
        assert_eq!(t.position, DVec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_transform_default_forward_is_neg_z() {
        let t = Transform::default();
        assert!((t.forward() - DVec3::NEG_Z).length() < 1e-12);
        assert!((t.up() - DVec3::Y).length() < 1e-12);
    }

    #[test]
    fn test_transform_point_inverse() {
        let t = Transform::new(
            DVec3::new(10.0, -4.0, 2.0),
            DQuat::from_rotation_y(0.7) * DQuat::from_rotation_x(0.3),
        );
        let local = DVec3::new(1.5, -2.0, 0.25);
        let world = t.transform_point(local);
        let back = t.inverse_transform_point(world);
        assert!((back - local).length() < 1e-9, "got {back:?}");
    }

    #[test]
    fn test_transform_rotated_keeps_position() {
        let t = Transform::looking(DVec3::new(5.0, 0.0, 0.0), DVec3::NEG_Z);
        let r = t.rotated(DQuat::from_rotation_y(std::f64::consts::FRAC_PI_2));
        assert_eq!(r.position, t.position);
        assert!((r.forward() - DVec3::NEG_X).length() < 1e-9, "forward = {:?}", r.forward());
    }

    // ---- Aabb ----

    #[test]
    fn test_aabb_basic_geometry() {
        let b = Aabb::new(DVec3::new(1.0, 1.0, 1.0), DVec3::new(-1.0, -2.0, -3.0));
        assert_eq!(b.min, DVec3::new(-1.0, -2.0, -3.0), "new should order corners");
        assert_eq!(b.size(), DVec3::new(2.0, 3.0, 4.0));
        assert!((b.shortest_dimension() - 2.0).abs() < 1e-12);
        assert!((b.longest_dimension() - 4.0).abs() < 1e-12);
        assert!((b.diagonal() - 29.0_f64.sqrt()).abs() < 1e-12);
        assert!(b.contains(DVec3::ZERO));
        assert!(!b.contains(DVec3::new(0.0, 0.0, 3.5)));
        assert!(b.inflate(1.0).contains(DVec3::new(0.0, 0.0, 3.5)));
    }

    #[test]
    fn test_aabb_distance_to_point() {
        let b = Aabb::from_half_extents(DVec3::ONE);
        assert_eq!(b.distance_squared_to_point(DVec3::ZERO), 0.0);
        assert!((b.distance_squared_to_point(DVec3::new(3.0, 0.0, 0.0)) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_aabb_ray_entry() {
        let b = Aabb::from_half_extents(DVec3::ONE);
        let hit = b.ray_entry(DVec3::new(-5.0, 0.0, 0.0), DVec3::X, 10.0);
        assert!(hit.is_some_and(|t| (t - 4.0).abs() < 1e-9), "hit = {hit:?}");

        assert!(
            b.ray_entry(DVec3::new(-5.0, 0.0, 0.0), DVec3::X, 3.0).is_none(),
            "ray too short"
        );
        assert!(
            b.ray_entry(DVec3::new(-5.0, 3.0, 0.0), DVec3::X, 10.0).is_none(),
            "ray passes above"
        );
        assert!(
            b.ray_entry(DVec3::new(5.0, 0.0, 0.0), DVec3::X, 10.0).is_none(),
            "ray points away"
        );
        let inside = b.ray_entry(DVec3::ZERO, DVec3::Y, 10.0);
        assert_eq!(inside, Some(0.0), "origin inside enters immediately");
    }

    // ---- SimTime ----

    #[test]
    fn test_sim_time_advance() {
        let mut t = SimTime::default();
        for _ in 0..TICK_RATE {
            t.advance();
        }
        assert_eq!(t.tick, TICK_RATE as u64);
        assert!((t.elapsed_secs - 1.0).abs() < 1e-9, "60 ticks should be one second");
    }

    // ---- Ammo ----

    fn missile(desired: f64, initial: f64, accel: f64) -> MissileDefinition {
        MissileDefinition {
            desired_speed: desired,
            initial_speed: initial,
            missile_acceleration: accel,
            ..Default::default()
        }
    }

    #[test]
    fn test_ammo_derived_speeds() {
        let ammo = Ammo::new("m", missile(200.0, 100.0, 50.0), None);
        assert!((ammo.time_to_max_speed - 2.0).abs() < 1e-12);
        assert!((ammo.distance_to_max_speed - 300.0).abs() < 1e-12);
        assert!(!ammo.is_cluster);
        assert!(!ammo.is_guided(), "no description means unguided");
    }

    #[test]
    fn test_ammo_average_speed() {
        let ammo = Ammo::new("m", missile(200.0, 100.0, 50.0), None);
        // While accelerating: v_f = sqrt(100^2 + 2*50*75) = sqrt(17500)
        let expected = (100.0 + 17500.0_f64.sqrt()) / 2.0;
        assert!((ammo.average_speed(75.0) - expected).abs() < 1e-9);

        // 300 m in 2 s, then 200 m at 200 m/s: 500 m in 3 s
        assert!((ammo.average_speed(500.0) - 500.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_ammo_no_acceleration_cruises() {
        let ammo = Ammo::new("m", missile(150.0, 150.0, 0.0), None);
        assert_eq!(ammo.distance_to_max_speed, 0.0);
        assert!((ammo.average_speed(1000.0) - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_ammo_guided_threshold() {
        let short = AmmoDescription {
            guidance_seconds: 0.5,
            ..Default::default()
        };
        let long = AmmoDescription {
            guidance_seconds: MIN_GUIDANCE_SECS,
            ..Default::default()
        };
        assert!(!Ammo::new("a", MissileDefinition::default(), Some(short)).is_guided());
        assert!(Ammo::new("b", MissileDefinition::default(), Some(long)).is_guided());
    }

    #[test]
    fn test_ammo_cluster_flag() {
        let desc = AmmoDescription {
            guidance_seconds: 5.0,
            cluster_cooldown: 3.0,
            ..Default::default()
        };
        assert!(Ammo::new("c", MissileDefinition::default(), Some(desc)).is_cluster);
    }

    #[test]
    fn test_description_defaults() {
        let desc: AmmoDescription = serde_json::from_str("{}").unwrap();
        assert!((desc.rotation_per_tick - DEFAULT_ROTATION_PER_TICK).abs() < 1e-15);
        assert!((desc.cos_acquisition_angle() + 1.0).abs() < 1e-12, "default cone is everything");
        assert!(!desc.has_emp());
    }

    #[test]
    fn test_catalog_from_json() {
        let json = r#"{
            "Seeker": {
                "missile": { "desired_speed": 300, "max_trajectory": 2000, "magazine_capacity": 1 },
                "description": { "guidance_seconds": 8, "boost_distance": 100, "has_antenna": true }
            },
            "Swarm": {
                "missile": { "magazine_capacity": 4 },
                "description": { "guidance_seconds": 5, "cluster_cooldown": 2 }
            },
            "Rocket": { "missile": { "desired_speed": 100 } }
        }"#;
        let catalog = AmmoCatalog::from_json(json).unwrap();
        assert_eq!(catalog.len(), 3);

        let seeker = catalog.get("Seeker").expect("Seeker present");
        assert!(seeker.is_guided());
        assert_eq!(seeker.definition.desired_speed, 300.0);
        let desc = seeker.description.as_ref().unwrap();
        assert_eq!(desc.boost_distance, 100.0);
        assert!(desc.has_antenna);

        let swarm = catalog.get("Swarm").unwrap();
        assert!(swarm.is_cluster);
        assert_eq!(swarm.definition.magazine_capacity, 4);

        assert!(!catalog.get("Rocket").unwrap().is_guided());
        assert!(catalog.get("Nope").is_none(), "unknown magazine is not an error");
    }

    #[test]
    fn test_catalog_require_unknown() {
        let catalog = AmmoCatalog::new();
        let err = catalog.require("Ghost").unwrap_err();
        assert!(matches!(err, FlightError::UnknownAmmo(ref n) if n == "Ghost"));
    }

    #[test]
    fn test_catalog_bad_json() {
        let err = AmmoCatalog::from_json("[1, 2").unwrap_err();
        assert!(matches!(err, FlightError::Catalog(_)), "got {err}");
    }

    // ---- Config ----

    #[test]
    fn test_config_default() {
        let config = EngineConfig::default();
        assert_eq!(config.worker_threads, DEFAULT_WORKER_THREADS);
        assert!(config.is_server);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_config_from_env() {
        std::env::set_var("SEEKER_WORKERS", "2");
        std::env::set_var("SEEKER_ROLE", "client");
        let config = EngineConfig::from_env().unwrap();
        assert_eq!(config.worker_threads, 2);
        assert!(!config.is_server);

        std::env::set_var("SEEKER_ROLE", "observer");
        let err = EngineConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("SEEKER_ROLE", _)));

        std::env::set_var("SEEKER_ROLE", "server");
        std::env::set_var("SEEKER_WORKERS", "0");
        let err = EngineConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("SEEKER_WORKERS", _)));

        std::env::remove_var("SEEKER_WORKERS");
        std::env::remove_var("SEEKER_ROLE");
    }

    // ---- Events & records ----

    #[test]
    fn test_flight_event_tagged_serde() {
        let event = FlightEvent::Detonated {
            projectile: EntityId(7),
            cause: DetonationCause::Proximity,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"Detonated\""), "json = {json}");
        let back: FlightEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
        assert_eq!(back.projectile(), Some(EntityId(7)));

        let cooldown = FlightEvent::CooldownEnded {
            launcher: EntityId(1),
        };
        assert_eq!(cooldown.projectile(), None);
    }

    #[test]
    fn test_projectile_record_serde() {
        let record = ProjectileRecord {
            projectile: EntityId(10),
            ammo: "Swarm".into(),
            launcher: EntityId(2),
            owner: OwnerId(1),
            stage: Stage::Guided,
            guidance_remaining_secs: Some(3.5),
            cluster: Some(ClusterRecord {
                master: EntityId(10),
                slaves: vec![EntityId(11), EntityId(12)],
                spread_multiplier: 1.0,
            }),
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: ProjectileRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
