use idlecombat::combat::encounter::{EnemySkill, EnemyTemplate};
use idlecombat::combat::profession::{CharacterProfile, Profession};
use idlecombat::combat::provider::{EncounterProvider, EncounterSpec, WaveSpec};
use idlecombat::combat::{BattleConfig, BattleDriver, EndReason};
use idlecombat::data::{EncounterCatalog, EncounterRequest};
use idlecombat::{ConfigError, EngineError};
use rstest::rstest;

fn enemy(id: &str, hp: i64) -> EnemyTemplate {
    EnemyTemplate::new(id, id, hp)
}

fn driver(profession: Profession, spec: EncounterSpec, target: f64) -> BattleDriver {
    BattleDriver::new(BattleConfig::new(
        42,
        target,
        CharacterProfile::new("hero", profession),
        spec,
    ))
    .expect("driver")
}

#[test]
fn two_wave_dungeon_without_loop_finishes_early() {
    let spec = EncounterSpec::Dungeon {
        dungeon_id: "crypt".to_string(),
        waves: vec![
            WaveSpec {
                name: "gate".to_string(),
                enemies: vec![enemy("rat", 120), enemy("rat", 120)],
            },
            WaveSpec {
                name: "crypt".to_string(),
                enemies: vec![enemy("ghoul", 300)],
            },
        ],
        looping: false,
        wave_delay: 1.0,
    };
    let mut battle = driver(Profession::Warrior, spec, 600.0);
    battle.fast_forward_to(600.0);

    assert!(battle.is_completed());
    assert_eq!(battle.outcome().end_reason, Some(EndReason::Killed));
    assert!(battle.provider().is_terminal());
    assert_eq!(battle.provider().run_count(), 1);
    assert_eq!(battle.outcome().kills, 2);
    assert!(battle.now() < 600.0);
    assert_eq!(battle.outcome().kill_time, Some(battle.now()));
    let waves: i64 = battle
        .segments()
        .iter()
        .filter_map(|s| s.tag_counters.get("wave_advance"))
        .sum();
    assert_eq!(waves, 1);
}

#[test]
fn builtin_warren_clears_before_target() {
    let spec = EncounterCatalog::builtin()
        .resolve(&EncounterRequest::Dungeon {
            dungeon_id: "goblin_warren".to_string(),
            looping: false,
        })
        .expect("warren");
    let mut battle = driver(Profession::Arcanist, spec, 900.0);
    battle.fast_forward_to(900.0);
    assert_eq!(battle.outcome().end_reason, Some(EndReason::Killed));
    assert_eq!(battle.provider().run_count(), 1);
    assert!(battle.now() < 900.0);
}

#[test]
fn looping_dungeon_keeps_running_until_target() {
    let spec = EncounterSpec::Dungeon {
        dungeon_id: "pit".to_string(),
        waves: vec![
            WaveSpec {
                name: String::new(),
                enemies: vec![enemy("rat", 80)],
            },
            WaveSpec {
                name: String::new(),
                enemies: vec![enemy("rat", 80)],
            },
        ],
        looping: true,
        wave_delay: 0.5,
    };
    let mut battle = driver(Profession::Ranger, spec, 120.0);
    battle.fast_forward_to(120.0);
    assert_eq!(battle.outcome().end_reason, Some(EndReason::TargetReached));
    assert!(battle.provider().run_count() >= 2);
    assert!(!battle.provider().is_terminal());
}

#[test]
fn respawn_delay_holds_attacks_until_enemy_returns() {
    let spec = EncounterSpec::Continuous {
        enemies: vec![enemy("dummy", 300)],
        respawn_delay: 3.0,
    };
    let mut battle = driver(Profession::Warrior, spec, 300.0);

    let mut t = 0.0;
    while battle.outcome().kills == 0 {
        t += 0.25;
        battle.fast_forward_to(t);
        assert!(t < 300.0, "no kill before the target");
    }
    let kill_time = battle.outcome().kill_time.expect("kill time");
    let damage_at_kill = battle.total_damage();
    assert_eq!(battle.provider().current().generation, 1);

    battle.fast_forward_to(kill_time + 2.999);
    assert_eq!(battle.total_damage(), damage_at_kill);
    assert!(battle.provider().current().members().iter().all(|e| e.is_alive()));

    battle.fast_forward_to(kill_time + 10.0);
    assert!(battle.total_damage() > damage_at_kill);
    let engaged = battle
        .segments()
        .iter()
        .find(|s| s.tag_counters.contains_key("engage"))
        .expect("respawn engaged");
    assert!(engaged.end_time >= kill_time + 3.0);
}

#[test]
fn zero_respawn_delay_reengages_at_kill_time() {
    let spec = EncounterSpec::Continuous {
        enemies: vec![enemy("dummy", 200)],
        respawn_delay: 0.0,
    };
    let mut battle = driver(Profession::Ranger, spec, 60.0);
    battle.fast_forward_to(60.0);
    assert!(battle.outcome().kills >= 3);
    let respawns: i64 = battle
        .segments()
        .iter()
        .filter_map(|s| s.tag_counters.get("respawn_pending"))
        .sum();
    assert_eq!(respawns, i64::from(battle.outcome().kills));
}

#[test]
fn enemy_casts_drain_player_health() {
    let mut slammer = enemy("slammer", 50_000);
    slammer.skill = Some(EnemySkill {
        name: "Slam".to_string(),
        check_interval: 2.0,
        cast_chance: 1.0,
        cast_time: 0.5,
        damage: 40,
    });
    let spec = EncounterSpec::Single {
        enemies: vec![slammer],
    };
    let mut battle = driver(Profession::Arcanist, spec, 21.0);
    battle.fast_forward_to(21.0);

    let casts: i64 = battle
        .segments()
        .iter()
        .filter_map(|s| s.tag_counters.get("enemy_cast"))
        .sum();
    let health: i64 = battle
        .segments()
        .iter()
        .filter_map(|s| s.resource_flow.get("player_health"))
        .sum();
    // Checks at 2, 4, .., 20 each finish a cast half a second later.
    assert_eq!(casts, 10);
    assert_eq!(health, -400);
}

#[test]
fn dead_caster_interrupts_its_cast() {
    let mut caster = enemy("caster", 140);
    caster.skill = Some(EnemySkill {
        name: "Bolt".to_string(),
        check_interval: 0.5,
        cast_chance: 1.0,
        cast_time: 10.0,
        damage: 999,
    });
    let spec = EncounterSpec::Single {
        enemies: vec![caster, enemy("tank", 100_000)],
    };
    let mut battle = driver(Profession::Warrior, spec, 30.0);
    battle.fast_forward_to(30.0);

    let caster = battle.provider().current().get(0).expect("caster slot");
    let died_at = caster.kill_time.expect("caster killed");
    assert!(died_at < 10.5);
    let sum_tag = |tag: &str| -> i64 {
        battle
            .segments()
            .iter()
            .filter_map(|s| s.tag_counters.get(tag))
            .sum()
    };
    assert!(sum_tag("enemy_cast_interrupted") >= 1);
    assert_eq!(sum_tag("enemy_cast"), 0);
    assert_eq!(sum_tag("enemy_cast_interrupted"), sum_tag("enemy_cast_started"));
    let health: i64 = battle
        .segments()
        .iter()
        .filter_map(|s| s.resource_flow.get("player_health"))
        .sum();
    assert_eq!(health, 0);
}

#[test]
fn invalid_encounters_are_rejected() {
    let empty = EncounterSpec::Single { enemies: vec![] };
    let err = BattleDriver::new(BattleConfig::new(
        1,
        10.0,
        CharacterProfile::new("hero", Profession::Warrior),
        empty,
    ))
    .expect_err("empty group");
    assert!(matches!(err, EngineError::InvalidRequest(_)));

    let negative = EncounterSpec::Continuous {
        enemies: vec![enemy("rat", 10)],
        respawn_delay: -1.0,
    };
    assert!(negative.validate().is_err());
}

#[test]
fn catalog_rejects_unknown_dungeon() {
    let err = EncounterCatalog::builtin()
        .resolve(&EncounterRequest::Dungeon {
            dungeon_id: "atlantis".to_string(),
            looping: false,
        })
        .expect_err("unknown dungeon");
    assert!(matches!(err, EngineError::UnknownDungeon(_)));
}

fn slammer_with(check_interval: f64, cast_chance: f64, cast_time: f64) -> EnemyTemplate {
    let mut slammer = enemy("slammer", 500);
    slammer.skill = Some(EnemySkill {
        name: "Slam".to_string(),
        check_interval,
        cast_chance,
        cast_time,
        damage: 10,
    });
    slammer
}

#[rstest]
#[case::backwards_cast(2.0, 1.0, -5.0)]
#[case::zero_check_interval(0.0, 1.0, 0.5)]
#[case::negative_check_interval(-1.0, 1.0, 0.5)]
#[case::endless_cast(2.0, 1.0, f64::INFINITY)]
#[case::chance_above_one(2.0, 1.5, 0.5)]
#[case::chance_not_a_number(2.0, f64::NAN, 0.5)]
fn enemy_skill_timing_is_validated(
    #[case] check_interval: f64,
    #[case] cast_chance: f64,
    #[case] cast_time: f64,
) {
    let spec = EncounterSpec::Single {
        enemies: vec![slammer_with(check_interval, cast_chance, cast_time)],
    };
    assert!(matches!(spec.validate(), Err(EngineError::InvalidRequest(_))));
    let err = BattleDriver::new(BattleConfig::new(
        1,
        30.0,
        CharacterProfile::new("hero", Profession::Warrior),
        spec,
    ))
    .expect_err("skill timing must be rejected");
    assert!(matches!(err, EngineError::InvalidRequest(_)));
}

#[test]
fn instant_casts_are_accepted() {
    let spec = EncounterSpec::Continuous {
        enemies: vec![slammer_with(1.0, 0.0, 0.0)],
        respawn_delay: 0.0,
    };
    assert!(spec.validate().is_ok());
}

#[test]
fn catalog_file_with_bad_enemy_skill_is_rejected() {
    let stamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock should be after unix epoch")
        .as_nanos();
    let path = std::env::temp_dir().join(format!("idlecombat-catalog-{stamp}.json"));
    let body = serde_json::json!({
        "enemies": [slammer_with(0.0, 1.0, 0.5)],
    });
    std::fs::write(&path, body.to_string()).expect("write catalog");
    let result = EncounterCatalog::load(&path);
    std::fs::remove_file(&path).expect("cleanup");
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}
