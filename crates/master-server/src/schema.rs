//! Валидация присылаемых серверами документов конфигурации и состояния.
//!
//! Конфигурация обязана содержать ровно четыре верхнеуровневые секции:
//! `resources`, `server`, `options`, `maps`. Значение `null` проходит
//! проверку типа как отсутствующее; проверки по перечислению значений
//! (`death_time_expired_action`) при этом остаются строгими.

use crate::error::AppError;
use serde_json::Value;

/// Тип значения опции.
#[derive(Copy, Clone, Debug)]
enum Kind {
    Bool,
    Int,
    Float,
    Str,
}

impl Kind {
    fn matches(self, v: &Value) -> bool {
        if v.is_null() {
            return true;
        }
        match self {
            Kind::Bool => v.is_boolean(),
            Kind::Int => v.is_i64() || v.is_u64(),
            Kind::Float => v.is_f64(),
            Kind::Str => v.is_string(),
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Kind::Bool => "булево значение",
            Kind::Int => "целое число",
            Kind::Float => "число с плавающей точкой",
            Kind::Str => "строка",
        }
    }
}

/// Поля секции `server`: все обязательны и строго типизированы.
const SERVER_FIELDS: &[(&str, Kind)] = &[
    ("address", Kind::Str),
    ("game", Kind::Str),
    ("game_type", Kind::Str),
    ("hostname", Kind::Str),
    ("max_clients", Kind::Int),
    ("port", Kind::Int),
    ("requires_player_password", Kind::Bool),
    ("requires_spectator_password", Kind::Bool),
    ("join_time_limit", Kind::Int),
    ("wad_repository", Kind::Str),
];

/// Известные игровые опции: каждая независимо необязательна, но при
/// наличии проверяется по типу.
const OPTION_FIELDS: &[(&str, Kind)] = &[
    ("actors_get_stuck_over_dropoffs", Kind::Bool),
    ("actors_have_infinite_height", Kind::Bool),
    ("actors_never_fall_off_ledges", Kind::Bool),
    ("allow_chasecam", Kind::Bool),
    ("allow_crosshair", Kind::Bool),
    ("allow_damage_screen_change", Kind::Bool),
    ("allow_exit", Kind::Bool),
    ("allow_freelook", Kind::Bool),
    ("allow_jump", Kind::Bool),
    ("allow_movebob_change", Kind::Bool),
    ("allow_no_weapon_switch_on_pickup", Kind::Bool),
    ("allow_preferred_weapon_order", Kind::Bool),
    ("allow_target_names", Kind::Bool),
    ("allow_two_way_wallrun", Kind::Bool),
    ("allow_weapon_speed_change", Kind::Bool),
    ("arch_viles_can_create_ghosts", Kind::Bool),
    ("bfg_type", Kind::Str),
    ("build_blockmap", Kind::Bool),
    ("bullets_never_hit_floors_and_ceilings", Kind::Bool),
    ("death_time_expired_action", Kind::Str),
    ("death_time_limit", Kind::Int),
    ("disable_falling_damage", Kind::Bool),
    ("disable_tagged_door_light_fading", Kind::Bool),
    ("disable_terrain_types", Kind::Bool),
    ("dogs", Kind::Int),
    ("dogs_can_jump_down", Kind::Bool),
    ("doom_actor_heights_are_inaccurate", Kind::Bool),
    ("enable_boom_push_effects", Kind::Bool),
    ("enable_nukage", Kind::Bool),
    ("enable_variable_friction", Kind::Bool),
    ("exit_to_same_level", Kind::Bool),
    ("fast_monsters", Kind::Bool),
    ("follow_fragger_on_death", Kind::Bool),
    ("frag_limit", Kind::Int),
    ("friend_distance", Kind::Int),
    ("friendly_damage_percentage", Kind::Int),
    ("imperfect_god_mode", Kind::Bool),
    ("infinite_ammo", Kind::Bool),
    ("instagib", Kind::Bool),
    ("keep_items_on_exit", Kind::Bool),
    ("keep_keys_on_exit", Kind::Bool),
    ("kill_on_exit", Kind::Bool),
    ("leave_keys", Kind::Bool),
    ("leave_weapons", Kind::Bool),
    ("limit_lost_souls", Kind::Bool),
    ("line_effects_work_on_sector_tag_zero", Kind::Bool),
    ("lost_souls_get_stuck_in_walls", Kind::Bool),
    ("lost_souls_never_bounce_on_floors", Kind::Bool),
    ("max_players", Kind::Int),
    ("max_players_per_team", Kind::Int),
    ("monster_infighting", Kind::Bool),
    ("monsters_affected_by_friction", Kind::Bool),
    ("monsters_avoid_hazards", Kind::Bool),
    ("monsters_back_out", Kind::Bool),
    ("monsters_can_respawn_outside_map", Kind::Bool),
    ("monsters_can_telefrag_on_map30", Kind::Bool),
    ("monsters_climb_tall_stairs", Kind::Bool),
    ("monsters_get_stuck_on_door_tracks", Kind::Bool),
    ("monsters_give_up_pursuit", Kind::Bool),
    ("monsters_randomly_walk_off_lifts", Kind::Bool),
    ("monsters_remember_target", Kind::Bool),
    ("normal_sky_when_invulnerable", Kind::Bool),
    ("one_time_line_effects_can_break", Kind::Bool),
    ("players_drop_everything", Kind::Bool),
    ("players_drop_items", Kind::Bool),
    ("players_drop_weapons", Kind::Bool),
    ("powerful_monsters", Kind::Bool),
    ("radial_attack_damage", Kind::Float),
    ("radial_attack_lift", Kind::Float),
    ("radial_attack_self_damage", Kind::Float),
    ("radial_attack_self_lift", Kind::Float),
    ("radius_attacks_only_thrust_in_2d", Kind::Bool),
    ("rescue_dying_friends", Kind::Bool),
    ("respawn_armor", Kind::Bool),
    ("respawn_barrels", Kind::Bool),
    ("respawn_health", Kind::Bool),
    ("respawn_items", Kind::Bool),
    ("respawn_monsters", Kind::Bool),
    ("respawn_protection_time", Kind::Int),
    ("respawn_super_items", Kind::Bool),
    ("respawns_are_sometimes_silent_in_dm", Kind::Bool),
    ("score_limit", Kind::Int),
    ("short_vertical_mouselook_range", Kind::Bool),
    ("silent_weapon_pickup", Kind::Bool),
    ("skill", Kind::Int),
    ("spawn_armor", Kind::Bool),
    ("spawn_farthest", Kind::Bool),
    ("spawn_in_same_spot", Kind::Bool),
    ("spawn_monsters", Kind::Bool),
    ("spawn_super_items", Kind::Bool),
    ("strong_monsters", Kind::Bool),
    ("teleport_missiles", Kind::Bool),
    ("time_limit", Kind::Int),
    ("time_limit_powerups", Kind::Bool),
    ("turbo_doors_make_two_closing_sounds", Kind::Bool),
    ("use_doom_floor_motion_behavior", Kind::Bool),
    ("use_doom_linedef_trigger_model", Kind::Bool),
    ("use_doom_stairbuilding_method", Kind::Bool),
    ("use_oldschool_sound_cutoff", Kind::Bool),
    ("zombie_players_can_exit", Kind::Bool),
];

const RESOURCE_TYPES: &[&str] = &["iwad", "wad", "dehacked"];
const DEATH_TIME_ACTIONS: &[&str] = &["respawn", "spectate"];

fn invalid(message: String) -> AppError {
    AppError::ConfigurationInvalid(message)
}

/// Проверить документ конфигурации сервера.
pub fn validate_configuration(config: &Value) -> Result<(), AppError> {
    let Some(obj) = config.as_object() else {
        return Err(invalid("конфигурация не является объектом".into()));
    };
    for section in ["resources", "server", "options", "maps"] {
        if !obj.contains_key(section) {
            return Err(invalid(format!("секция \"{section}\" отсутствует")));
        }
    }
    validate_resources(&obj["resources"])?;
    validate_server(&obj["server"])?;
    validate_options(&obj["options"], "options")?;
    validate_maps(&obj["maps"])
}

/// Проверить документ состояния сервера.
///
/// Схема состояния никогда не была определена в протоколе: любое
/// состояние считается валидным. Известный пробел, не ужесточать.
pub fn validate_state(_state: &Value) -> Result<(), AppError> {
    Ok(())
}

fn validate_resources(resources: &Value) -> Result<(), AppError> {
    if resources.is_null() {
        return Ok(());
    }
    let Some(list) = resources.as_array() else {
        return Err(invalid("секция \"resources\" не является массивом".into()));
    };
    for resource in list {
        match resource {
            Value::String(_) | Value::Null => {}
            Value::Object(map) => {
                if !map.contains_key("name") {
                    return Err(invalid("безымянный ресурс в секции \"resources\"".into()));
                }
                if let Some(kind) = map.get("type") {
                    let ok = kind
                        .as_str()
                        .is_some_and(|k| RESOURCE_TYPES.contains(&k));
                    if !ok {
                        return Err(invalid(
                            "тип ресурса не входит в (\"iwad\", \"wad\", \"dehacked\")".into(),
                        ));
                    }
                }
                if let Some(alternates) = map.get("alternates") {
                    let Some(items) = alternates.as_array() else {
                        return Err(invalid("alternates ресурса не является массивом".into()));
                    };
                    if items.iter().any(|a| !Kind::Str.matches(a)) {
                        return Err(invalid("alternate ресурса не является строкой".into()));
                    }
                }
            }
            _ => {
                return Err(invalid(
                    "недопустимый тип данных в секции \"resources\"".into(),
                ))
            }
        }
    }
    Ok(())
}

fn validate_server(server: &Value) -> Result<(), AppError> {
    let Some(map) = server.as_object() else {
        return Err(invalid("секция \"server\" не является объектом".into()));
    };
    for &(name, kind) in SERVER_FIELDS {
        let Some(value) = map.get(name) else {
            return Err(invalid(format!("поле сервера \"{name}\" отсутствует")));
        };
        if !kind.matches(value) {
            return Err(invalid(format!(
                "поле сервера \"{name}\" — не {}",
                kind.describe()
            )));
        }
    }
    Ok(())
}

fn validate_options(options: &Value, section: &str) -> Result<(), AppError> {
    if options.is_null() {
        return Ok(());
    }
    let Some(map) = options.as_object() else {
        return Err(invalid(format!(
            "секция \"{section}\" не является объектом"
        )));
    };
    for &(name, kind) in OPTION_FIELDS {
        if let Some(value) = map.get(name) {
            if !kind.matches(value) {
                return Err(invalid(format!(
                    "опция \"{name}\" — не {}",
                    kind.describe()
                )));
            }
        }
    }
    // Перечисление строгое: null здесь не эквивалентен отсутствию поля
    if let Some(action) = map.get("death_time_expired_action") {
        let ok = action
            .as_str()
            .is_some_and(|a| DEATH_TIME_ACTIONS.contains(&a));
        if !ok {
            return Err(invalid(
                "опция \"death_time_expired_action\" не входит в (\"respawn\", \"spectate\")"
                    .into(),
            ));
        }
    }
    Ok(())
}

fn validate_maps(maps: &Value) -> Result<(), AppError> {
    if maps.is_null() {
        return Ok(());
    }
    let Some(list) = maps.as_array() else {
        return Err(invalid("секция \"maps\" не является массивом".into()));
    };
    for map_entry in list {
        match map_entry {
            Value::String(_) | Value::Null => {}
            Value::Object(map) => {
                if !map.contains_key("name") {
                    return Err(invalid("безымянная карта в секции \"maps\"".into()));
                }
                if let Some(wads) = map.get("wads") {
                    let Some(items) = wads.as_array() else {
                        return Err(invalid("wads карты не является массивом".into()));
                    };
                    if items.iter().any(|w| !Kind::Str.matches(w)) {
                        return Err(invalid("wad карты не является строкой".into()));
                    }
                }
                if let Some(overrides) = map.get("overrides") {
                    validate_options(overrides, "overrides")?;
                }
            }
            _ => return Err(invalid("недопустимый тип данных в секции \"maps\"".into())),
        }
    }
    Ok(())
}
