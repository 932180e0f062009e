use std::collections::BTreeMap;

use anyhow::Result;

use crate::cdn::GameData;
use crate::content::{Ability, Ai, Content, display_value, is_player_minigolem_name, is_truthy};

pub const AI_PROFILE_PREFIX: &str = "AIP:";

/// Player-side abilities that enemies also use (SkeletonDistanceArcher and
/// SecurityGolem). PetUndeadArrow2 has no description so it stays out.
pub const ENEMY_INCLUDE: [&str; 5] = [
    "PetUndeadArrow1",
    "PetUndeadOmegaArrow",
    "MinigolemBombToss4",
    "MinigolemPunch4",
    "MinigolemRageAcidToss4",
];

#[derive(Debug, Clone, PartialEq)]
pub struct AbilitySummary {
    pub description: String,
    pub icon_id: String,
    pub keywords: Vec<String>,
}

impl AbilitySummary {
    fn from_ability(ability: &Ability) -> Self {
        let data = ability.data();
        Self {
            description: data.get("Description").map(display_value).unwrap_or_default(),
            icon_id: data.get("IconID").map(display_value).unwrap_or_default(),
            keywords: ability.keywords().into_iter().map(str::to_string).collect(),
        }
    }

    pub fn is_rage(&self) -> bool {
        self.keywords.iter().any(|keyword| keyword == "RageAttack")
    }
}

/// No player pets or minigolems.
pub fn is_enemy(name: &str) -> bool {
    !(name.contains("Pet") || is_player_minigolem_name(name))
}

pub fn is_valid_enemy_ability(ability: &Ability) -> bool {
    is_enemy(ability.name())
        && !ability.data().contains_key("AttributesThatDeltaPowerCost")
        // only abilities with tooltips
        && ability.data().get("Description").is_some_and(is_truthy)
}

/// Abilities accepted by `validator` or named in `include`, keyed by internal name.
pub fn get_abilities<F>(
    data: &GameData,
    validator: F,
    include: &[&str],
) -> Result<BTreeMap<String, AbilitySummary>>
where
    F: Fn(&Ability) -> bool,
{
    Ok(data
        .all::<Ability>()?
        .iter()
        .filter_map(|ability| {
            let iname = ability.internal_name()?;
            (include.contains(&iname) || validator(ability))
                .then(|| (iname.to_string(), AbilitySummary::from_ability(ability)))
        })
        .collect())
}

pub fn get_ais<F>(data: &GameData, validator: F) -> Result<Vec<Ai>>
where
    F: Fn(&Ai) -> bool,
{
    Ok(data
        .all::<Ai>()?
        .into_iter()
        .filter(|ai| validator(ai))
        .collect())
}

pub fn enemy_abilities(data: &GameData) -> Result<BTreeMap<String, AbilitySummary>> {
    get_abilities(data, is_valid_enemy_ability, &ENEMY_INCLUDE)
}

/// Render one profile. Every non-rage ability comes before every rage ability.
pub fn render_profile(
    ai_abilities: &[String],
    abilities: &BTreeMap<String, AbilitySummary>,
) -> Option<String> {
    let known = ai_abilities
        .iter()
        .filter_map(|name| abilities.get(name).map(|summary| (name, summary)))
        .collect::<Vec<_>>();
    if known.is_empty() {
        return None;
    }

    let (rages, nonrages): (Vec<_>, Vec<_>) =
        known.into_iter().partition(|(_, summary)| summary.is_rage());
    let mut profile = String::new();
    for (name, _) in nonrages {
        profile.push_str(&format!(": {{{{Combat Ability|{name}}}}}\n"));
    }
    for (name, _) in rages {
        profile.push_str(&format!(": {{{{Combat Ability Rage|{name}}}}}\n"));
    }
    profile.push_str("<noinclude>[[Category:AI Profile]]</noinclude>");
    Some(profile)
}

/// Profiles keyed by AI name; AIs without a single valid ability are skipped.
pub fn generate_ai_profiles(data: &GameData) -> Result<BTreeMap<String, String>> {
    let abilities = enemy_abilities(data)?;
    let ais = get_ais(data, |ai| is_enemy(ai.name()))?;

    let mut profiles = BTreeMap::new();
    for ai in ais {
        if let Some(profile) = render_profile(&ai.abilities(false), &abilities) {
            profiles.insert(ai.name().to_string(), profile);
        }
    }
    tracing::debug!(count = profiles.len(), "generated AI profiles");
    Ok(profiles)
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::{generate_ai_profiles, get_abilities, get_ais, is_enemy, is_valid_enemy_ability};
    use crate::cdn::GameData;
    use crate::content::{Ability, Content, Record};

    fn ability(custom: Value) -> Ability {
        let mut data = json!({"Name": "_", "InternalName": "_", "Description": "_"});
        if let (Some(base), Value::Object(extra)) = (data.as_object_mut(), custom) {
            base.extend(extra);
        }
        match data {
            Value::Object(map) => Ability::from_record(Record::new("_", map)),
            _ => unreachable!(),
        }
    }

    fn fixture() -> GameData {
        GameData::preloaded(
            "1",
            [
                (
                    "abilities",
                    json!({
                        "ability_1": {"Name": "Kraken Beak", "InternalName": "KrakenBeak",
                                      "Description": "Bite", "IconID": 101},
                        "ability_2": {"Name": "Kraken Rage", "InternalName": "KrakenRage",
                                      "Description": "Smash", "IconID": 102, "Keywords": ["RageAttack"]},
                        "ability_3": {"Name": "Kraken Slam", "InternalName": "KrakenSlam",
                                      "Description": "Slam", "IconID": 103},
                        "ability_4": {"Name": "Kraken Slam 2", "InternalName": "KrakenSlam2",
                                      "Description": "Slam harder", "IconID": 103},
                        "ability_5": {"Name": "Fire Bolt", "InternalName": "FireBolt",
                                      "Description": "Burn", "IconID": 104,
                                      "AttributesThatDeltaPowerCost": ["X"]},
                        "ability_6": {"Name": "Arrow", "InternalName": "PetUndeadArrow1",
                                      "Description": "Shoot", "IconID": 105},
                        "ability_7": {"Name": "Silent", "InternalName": "Silent",
                                      "Description": "", "IconID": 106},
                    }),
                ),
                (
                    "ai",
                    json!({
                        "Kraken": {"Abilities": {
                            "KrakenRage": {},
                            "KrakenBeak": {},
                            "KrakenSlam": {},
                            "KrakenSlam2": {"minLevel": 40},
                        }},
                        "SkeletonDistanceArcher": {"Abilities": {"PetUndeadArrow1": {}}},
                        "Mute": {"Abilities": {"Silent": {}}},
                        "BigCat_Pet": {"Abilities": {"KrakenBeak": {}}},
                        "Minigolem_Beginner": {"Abilities": {"KrakenBeak": {}}},
                    }),
                ),
            ],
        )
    }

    #[test]
    fn enemy_names_exclude_pets_and_player_minigolems() {
        assert!(!is_enemy("Minigolem_Beginner"));
        assert!(is_enemy("EnemyMinigolem_Puncher"));
        assert!(!is_enemy("BigCat_Pet"));
        assert!(is_enemy("BigCat"));
    }

    #[test]
    fn valid_enemy_abilities_need_tooltips_and_no_power_cost() {
        assert!(is_valid_enemy_ability(&ability(json!({}))));
        assert!(!is_valid_enemy_ability(&ability(json!({"AttributesThatDeltaPowerCost": []}))));
        assert!(!is_valid_enemy_ability(&ability(json!({"Description": ""}))));
        assert!(!is_valid_enemy_ability(&ability(json!({"Name": "Pet Bite"}))));
    }

    #[test]
    fn get_abilities_honors_include_list() {
        let data = fixture();
        let without = get_abilities(&data, is_valid_enemy_ability, &[]).expect("abilities");
        assert!(without.contains_key("KrakenBeak"));
        assert!(without.contains_key("PetUndeadArrow1"));
        assert!(!without.contains_key("FireBolt"));
        assert!(!without.contains_key("Silent"));

        let with = get_abilities(&data, is_valid_enemy_ability, &["FireBolt"]).expect("abilities");
        assert_eq!(with["FireBolt"].icon_id, "104");
        assert_eq!(with["KrakenRage"].keywords, vec!["RageAttack".to_string()]);
    }

    #[test]
    fn get_ais_filters_by_validator() {
        let data = fixture();
        let ais = get_ais(&data, |ai| is_enemy(ai.name())).expect("ais");
        assert!(!ais.is_empty());
        assert!(ais.iter().all(|ai| is_enemy(ai.name())));
    }

    #[test]
    fn kraken_profile_orders_rage_last_and_skips_scaled() {
        let profiles = generate_ai_profiles(&fixture()).expect("profiles");
        assert_eq!(
            profiles["Kraken"],
            ": {{Combat Ability|KrakenBeak}}\n\
             : {{Combat Ability|KrakenSlam}}\n\
             : {{Combat Ability Rage|KrakenRage}}\n\
             <noinclude>[[Category:AI Profile]]</noinclude>"
        );
        assert_eq!(
            profiles["SkeletonDistanceArcher"],
            ": {{Combat Ability|PetUndeadArrow1}}\n<noinclude>[[Category:AI Profile]]</noinclude>"
        );
        assert!(!profiles.contains_key("Mute"));
        assert!(!profiles.contains_key("BigCat_Pet"));
        assert!(!profiles.contains_key("Minigolem_Beginner"));
    }
}
