use std::collections::BTreeMap;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde_json::{Map, Value};

use crate::cdn::GameData;
use crate::content::{Ability, Content, Skill, display_value, is_truthy, separate_words};

// No base ability has a digit in its name, and letters alone are not enough
// because of apostrophes and colons. "Call Stabled Pet #1" needs the '#'.
static BASE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?: ?[^\d\s#]+)+").expect("valid base name regex"));

/// Base names shared by abilities of different skills ("Front Kick" is in Unarmed and Cow).
pub const DUPLICATES: [&str; 1] = ["Front Kick"];

/// Base names that collide with an unrelated page of the same name.
pub const DISAMBIGUATED: [&str; 3] = ["First Aid", "Rabbit's Foot", "Lycanspore Bomb"];

const STARTING_ABILITIES: [&str; 2] = ["Punch", "SwordSlash"];
const MOB_NAMESAKES: [&str; 3] = ["Cold Sphere", "Acid Sigil", "Electricity Sigil"];

pub fn disambiguate(name: &str) -> String {
    if DISAMBIGUATED.contains(&name) {
        format!("{name} (ability)")
    } else {
        name.to_string()
    }
}

pub fn is_learnable(ability: &Ability) -> bool {
    !ability.has_keyword("Lint_NotLearnable")
}

fn is_chain_member(ability: &Ability) -> bool {
    let iname = ability.internal_name().unwrap_or_default();
    let has_power_cost = ["AttributesThatDeltaPowerCost", "AttributesThatModPowerCost"]
        .iter()
        .any(|key| ability.data().get(*key).is_some_and(is_truthy));

    // FaeBombSporeTrigger is not learnable; CharmRat's page is hand-written.
    (has_power_cost && is_learnable(ability) && iname != "FaeBombSporeTrigger" && iname != "CharmRat")
        || STARTING_ABILITIES.contains(&iname)
}

pub fn base_name(name: &str) -> String {
    BASE_NAME
        .find(name)
        .map(|found| found.as_str().to_string())
        .unwrap_or_else(|| name.to_string())
}

/// Group learnable player abilities by base name ("Fire Bolt", "Fire Bolt 2", ...).
///
/// Chains are sorted by display name, which orders upgrades as long as they are
/// named "Base Name 2" etc. and keeps variants such as Claw Barrage together.
pub fn ability_chains(data: &GameData) -> Result<BTreeMap<String, Vec<Ability>>> {
    let mut chains: BTreeMap<String, Vec<Ability>> = BTreeMap::new();
    for ability in data.all::<Ability>()? {
        if !is_chain_member(&ability) {
            continue;
        }
        let mut basename = disambiguate(&base_name(ability.name()));
        if DUPLICATES.contains(&basename.as_str()) {
            let skill = ability
                .record()
                .str_field("Skill")
                .unwrap_or("Unknown");
            basename = format!("{basename} ({})", separate_words(skill));
        }
        chains.entry(basename).or_default().push(ability);
    }

    for chain in chains.values_mut() {
        chain.sort_by(|left, right| left.name().cmp(right.name()));
    }
    Ok(chains)
}

fn pluralize(n: &Value, unit: &str) -> String {
    let plural = if n.as_f64() == Some(1.0) { "" } else { "s" };
    format!("{} {unit}{plural}", display_value(n))
}

/// Join the non-empty parts with `sep`.
fn maybe_join<S: AsRef<str>>(parts: &[S], sep: &str) -> String {
    parts
        .iter()
        .map(AsRef::as_ref)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(sep)
}

fn field(map: &Map<String, Value>, key: &str) -> String {
    map.get(key).map(display_value).unwrap_or_default()
}

fn keywords_line(ability: &Ability) -> String {
    let keywords = ability.keywords();
    if keywords.is_empty() {
        return String::new();
    }
    let rendered = keywords
        .iter()
        .map(|keyword| format!("{{{{KWAB|{keyword}}}}}"))
        .collect::<String>();
    format!("| keywords = {rendered}")
}

fn ragemulti_line(pve: &Map<String, Value>) -> String {
    match pve.get("RageMultiplier") {
        Some(multi) => format!("| ragemulti = {}", display_value(multi)),
        None => String::new(),
    }
}

fn special_values(pve: &Map<String, Value>) -> String {
    let Some(values) = pve.get("SpecialValues").and_then(Value::as_array) else {
        return String::new();
    };
    values
        .iter()
        .filter_map(Value::as_object)
        .map(|value| {
            let joined = maybe_join(
                &[
                    field(value, "Label"),
                    field(value, "Value"),
                    field(value, "Suffix"),
                ],
                " ",
            );
            format!("{joined}.")
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn special_info(ability: &Ability) -> String {
    match ability.record().str_field("SpecialInfo") {
        Some(info) if !info.is_empty() && !info.ends_with('.') => format!("{info}."),
        Some(info) => info.to_string(),
        None => String::new(),
    }
}

/// At most one damaging DoT and one special (prefaced) DoT are rendered.
fn dots(pve: &Map<String, Value>) -> (String, String) {
    let mut damage = String::new();
    let mut special = String::new();

    let Some(entries) = pve.get("DoTs").and_then(Value::as_array) else {
        return (damage, special);
    };
    for dot in entries.iter().filter_map(Value::as_object) {
        let buff_activated = dot
            .get("SpecialRules")
            .and_then(Value::as_array)
            .is_some_and(|rules| rules.iter().any(|rule| rule.as_str() == Some("BuffActivated")));
        let per_tick = dot.get("DamagePerTick").cloned().unwrap_or(Value::from(0));

        if buff_activated {
            continue;
        } else if dot.contains_key("Preface") {
            special = [
                field(dot, "Preface"),
                display_value(&per_tick),
                field(dot, "DamageType"),
            ]
            .join(" ");
        } else if per_tick.as_f64().is_some_and(|n| n > 0.0) {
            damage = [
                display_value(&per_tick),
                field(dot, "DamageType"),
                pluralize(dot.get("NumTicks").unwrap_or(&Value::Null), "time"),
                "over".to_string(),
                pluralize(dot.get("Duration").unwrap_or(&Value::Null), "second"),
            ]
            .join(" ");
        }
    }
    (damage, special)
}

/// Returns `(damage line value, special text from DoT prefaces)`.
fn damage(ability: &Ability, pve: &Map<String, Value>) -> (String, String) {
    let (dot_damage, special) = dots(pve);

    // Only one of these is ever present.
    let amount = ["Damage", "HealthSpecificDamage", "ArmorSpecificDamage"]
        .iter()
        .find_map(|key| pve.get(*key))
        .filter(|amount| is_truthy(amount));

    let mut rendered = match amount {
        Some(amount) => {
            let if_present = |template: &str, key: &str| match pve.get(key) {
                Some(value) if is_truthy(value) => template.replace("{}", &display_value(value)),
                _ => String::new(),
            };
            maybe_join(
                &[
                    display_value(amount),
                    ability
                        .record()
                        .str_field("DamageType")
                        .unwrap_or_default()
                        .to_string(),
                    if_present("to health", "HealthSpecificDamage"),
                    if_present("to armor", "ArmorSpecificDamage"),
                    if_present("+ {} if target is Vulnerable", "ExtraDamageIfTargetVulnerable"),
                ],
                " ",
            )
        }
        None => String::new(),
    };

    if !dot_damage.is_empty() {
        rendered = if amount.is_some() {
            format!("{rendered} initially and {dot_damage}")
        } else {
            dot_damage
        };
    }
    (rendered, special)
}

pub fn generate_infobox(data: &GameData, ability: &Ability) -> Result<String> {
    let empty = Map::new();
    let pve = ability.pve().unwrap_or(&empty);
    let info = ability.data();

    let mut lines = vec![
        "{{Ability infobox".to_string(),
        format!("| name = {}", ability.name()),
        format!("| description = {}", field(info, "Description")),
        format!("| level = {}", field(info, "Level")),
        format!("| power cost = {}", field(pve, "PowerCost")),
        format!("| reuse time = {}", field(info, "ResetTime")),
        format!("| range = {} meters", field(pve, "Range")),
    ];

    let skill = match ability.record().str_field("Skill") {
        Some(id) => data
            .by_id::<Skill>(id)
            .with_context(|| format!("failed to look up skill for {}", ability.name()))?
            .map(|skill| skill.name().to_string()),
        None => None,
    };
    lines.push(format!("| skill = {}", skill.as_deref().unwrap_or("Unknown")));
    lines.push(keywords_line(ability));
    lines.push(ragemulti_line(pve));

    let (damage, dot_special) = damage(ability, pve);
    if !damage.is_empty() {
        lines.push(format!("| damage = {damage}"));
    }

    let special = maybe_join(
        &[special_values(pve), special_info(ability), dot_special],
        " ",
    );
    if !special.is_empty() {
        lines.push(format!("| special = {special}"));
    }

    lines.push("}}".to_string());
    Ok(maybe_join(&lines, "\n"))
}

pub fn generate_infoboxes(data: &GameData, chain: &[Ability]) -> Result<String> {
    if let [single] = chain {
        return generate_infobox(data, single);
    }
    let rows = chain
        .iter()
        .map(|ability| Ok(format!("|-\n|\n{}", generate_infobox(data, ability)?)))
        .collect::<Result<Vec<_>>>()?;
    Ok(format!("{{| width=100%\n{}\n|}}", rows.join("\n")))
}

pub fn generate_page(data: &GameData, chain: &[Ability]) -> Result<String> {
    Ok(format!(
        "__NOTOC__\n{}\n<noinclude>[[Category:Abilities]]</noinclude>",
        generate_infoboxes(data, chain)?
    ))
}

fn disambiguation_notices() -> BTreeMap<String, String> {
    let mut notices = BTreeMap::from([(
        "First Aid (ability)".to_string(),
        "You may be looking for the Skill '''[[First Aid]]'''.".to_string(),
    )]);
    for name in MOB_NAMESAKES {
        notices.insert(
            name.to_string(),
            format!("You may be looking for the creature '''[[{name} (mob)|{name}]]'''."),
        );
    }
    notices
}

/// Every ability page plus redirects for upgrades, keyed by page title.
pub fn generate_pages(data: &GameData) -> Result<BTreeMap<String, String>> {
    let mut pages = BTreeMap::new();

    for (basename, chain) in ability_chains(data)? {
        pages.insert(basename.clone(), generate_page(data, &chain)?);

        // Duplicates redirect to the disambiguation page under the unsuffixed name.
        let first_name = chain.first().map(|ability| ability.name()).unwrap_or_default();
        let target = if DUPLICATES.contains(&first_name) {
            first_name.to_string()
        } else {
            basename.clone()
        };
        // Also covers chains whose base ability doesn't exist
        // (Flare Fireball, Raise Skeletal Ratkin Mage).
        for ability in &chain {
            if disambiguate(ability.name()) != target {
                pages.insert(
                    ability.name().to_string(),
                    format!("#redirect [[{target}]]"),
                );
            }
        }
    }

    for (title, notice) in disambiguation_notices() {
        match pages.get_mut(&title) {
            Some(page) => {
                *page = format!("{{{{ambox\n| type = {notice}\n| border = yellow\n}}}}\n{page}");
            }
            None => tracing::warn!("no generated page for disambiguation notice {title}"),
        }
    }

    // "Call Stabled Pet #1" and friends.
    Ok(pages
        .into_iter()
        .map(|(title, page)| (title.replace('#', ""), page))
        .collect())
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::{
        DISAMBIGUATED, ability_chains, base_name, disambiguate, generate_infobox, generate_page,
        generate_pages, is_learnable,
    };
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

    fn player(name: &str, iname: &str, skill: &str) -> Value {
        json!({
            "Name": name,
            "InternalName": iname,
            "Skill": skill,
            "Description": format!("{name} description"),
            "Level": 1,
            "ResetTime": 5,
            "DamageType": "Crushing",
            "AttributesThatDeltaPowerCost": ["X"],
            "PvE": {"PowerCost": 3, "Range": 5, "Damage": 10},
        })
    }

    fn fixture() -> GameData {
        GameData::preloaded(
            "1",
            [
                (
                    "skills",
                    json!({
                        "Unarmed": {"Name": "Unarmed"},
                        "Cow": {"Name": "Cow"},
                        "FireMagic": {"Name": "Fire Magic"},
                        "FirstAid": {"Name": "First Aid"},
                        "IceMagic": {"Name": "Ice Magic"},
                    }),
                ),
                (
                    "abilities",
                    json!({
                        "ability_1": player("Fire Bolt 2", "FireBolt2", "FireMagic"),
                        "ability_2": player("Fire Bolt", "FireBolt", "FireMagic"),
                        "ability_3": player("Front Kick", "FrontKick", "Unarmed"),
                        "ability_4": player("Front Kick 2", "FrontKick2", "Unarmed"),
                        "ability_5": player("Front Kick", "CowFrontKick", "Cow"),
                        "ability_6": player("First Aid", "FirstAid1", "FirstAid"),
                        "ability_7": player("First Aid 2", "FirstAid2", "FirstAid"),
                        "ability_8": {"Name": "Punch", "InternalName": "Punch", "Skill": "Unarmed",
                                      "Description": "Hit.", "Level": 0, "ResetTime": 1,
                                      "DamageType": "Crushing", "PvE": {"PowerCost": 0, "Range": 5, "Damage": 5}},
                        "ability_9": player("Charm Rat", "CharmRat", "Unarmed"),
                        "ability_10": player("Self Bomb", "FaeBombSporeTrigger", "Unarmed"),
                        "ability_11": {"Name": "Kraken Beak", "InternalName": "KrakenBeak", "Description": "Bite"},
                        "ability_12": player("Call Stabled Pet #1", "CallStabledPet1", "AnimalHandling"),
                        "ability_13": player("Cold Sphere", "ColdSphere", "IceMagic"),
                        "ability_14": {
                            "Name": "Hidden", "InternalName": "Hidden", "Skill": "Unarmed",
                            "AttributesThatModPowerCost": ["X"], "Keywords": ["Lint_NotLearnable"],
                        },
                    }),
                ),
            ],
        )
    }

    #[test]
    fn is_learnable_checks_lint_keyword() {
        assert!(!is_learnable(&ability(json!({"Keywords": ["Lint_NotLearnable"]}))));
        assert!(!is_learnable(&ability(json!({"Keywords": ["_", "Lint_NotLearnable", "test"]}))));
        assert!(is_learnable(&ability(json!({"Keywords": ["_", "test"]}))));
        assert!(is_learnable(&ability(json!({}))));
    }

    #[test]
    fn base_name_stops_at_digits_and_hash() {
        assert_eq!(base_name("Fire Bolt 2"), "Fire Bolt");
        assert_eq!(base_name("Rabbit's Foot 3"), "Rabbit's Foot");
        assert_eq!(base_name("Call Stabled Pet #1"), "Call Stabled Pet");
        assert_eq!(base_name("Claw Barrage: Leap 4"), "Claw Barrage: Leap");
    }

    #[test]
    fn chains_group_sort_and_special_case() {
        let data = fixture();
        let chains = ability_chains(&data).expect("chains");

        let fire = chains.get("Fire Bolt").expect("fire bolt chain");
        assert_eq!(
            fire.iter().map(|a| a.name()).collect::<Vec<_>>(),
            vec!["Fire Bolt", "Fire Bolt 2"]
        );
        for chain in chains.values() {
            assert!(chain.windows(2).all(|pair| pair[0].name() <= pair[1].name()));
        }

        for name in ["Self Bomb", "Charm Rat", "Kraken Beak", "Hidden"] {
            assert!(!chains.contains_key(name), "{name}");
        }
        assert!(chains.contains_key("Punch"));

        for name in DISAMBIGUATED {
            assert!(!chains.contains_key(name));
        }
        assert!(chains.contains_key(&disambiguate("First Aid")));

        assert!(!chains.contains_key("Front Kick"));
        let unarmed = chains.get("Front Kick (Unarmed)").expect("unarmed chain");
        assert_eq!(unarmed.len(), 2);
        let cow = chains.get("Front Kick (Cow)").expect("cow chain");
        assert!(cow.iter().all(|a| a.record().str_field("Skill") == Some("Cow")));
    }

    #[test]
    fn infobox_renders_known_ability() {
        let data = GameData::preloaded(
            "1",
            [("skills", json!({"FireMagic": {"Name": "Fire Magic"}}))],
        );
        let warmthball = ability(json!({
            "Name": "Warmthball",
            "Description": "Throw a vaguely painful ball of warmth.",
            "Skill": "FireMagic",
            "Level": 0,
            "ResetTime": 2,
            "DamageType": "Fire",
            "Keywords": ["Attack", "FireMagic"],
            "SpecialInfo": "Ignites the target",
            "PvE": {
                "PowerCost": 0,
                "Range": 30,
                "Damage": 8,
                "RageMultiplier": 2,
                "ExtraDamageIfTargetVulnerable": 4,
                "SpecialValues": [{"Label": "Burns for", "Value": 3, "Suffix": "seconds"}],
                "DoTs": [
                    {"DamagePerTick": 2, "DamageType": "Fire", "NumTicks": 5, "Duration": 10},
                    {"DamagePerTick": 6, "DamageType": "Poison", "Preface": "Deals an extra"},
                    {"DamagePerTick": 99, "DamageType": "Fire", "NumTicks": 1, "Duration": 1,
                     "SpecialRules": ["BuffActivated"]},
                ],
            },
        }));

        let infobox = generate_infobox(&data, &warmthball).expect("infobox");
        assert_eq!(
            infobox,
            "{{Ability infobox\n\
             | name = Warmthball\n\
             | description = Throw a vaguely painful ball of warmth.\n\
             | level = 0\n\
             | power cost = 0\n\
             | reuse time = 2\n\
             | range = 30 meters\n\
             | skill = Fire Magic\n\
             | keywords = {{KWAB|Attack}}{{KWAB|FireMagic}}\n\
             | ragemulti = 2\n\
             | damage = 8 Fire + 4 if target is Vulnerable initially and 2 Fire 5 times over 10 seconds\n\
             | special = Burns for 3 seconds. Ignites the target. Deals an extra 6 Poison\n\
             }}"
        );
    }

    #[test]
    fn infobox_handles_armor_damage_dot_only_and_unknown_skill() {
        let data = GameData::preloaded("1", [("skills", json!({}))]);
        let armor = ability(json!({
            "Name": "Shatter", "Level": 10, "ResetTime": 8, "DamageType": "Crushing",
            "Skill": "Missing",
            "PvE": {"PowerCost": 9, "Range": 5, "ArmorSpecificDamage": 40},
        }));
        let infobox = generate_infobox(&data, &armor).expect("infobox");
        assert!(infobox.contains("| skill = Unknown\n"));
        assert!(infobox.contains("| damage = 40 Crushing to armor\n"));
        assert!(!infobox.contains("ragemulti"));
        assert!(!infobox.contains("special"));

        let dot_only = ability(json!({
            "Name": "Poison Cloud", "Level": 1, "ResetTime": 3,
            "PvE": {"PowerCost": 1, "Range": 10, "Damage": 0,
                    "DoTs": [{"DamagePerTick": 3, "DamageType": "Poison", "NumTicks": 1, "Duration": 1}]},
        }));
        let infobox = generate_infobox(&data, &dot_only).expect("infobox");
        assert!(infobox.contains("| damage = 3 Poison 1 time over 1 second\n"));
    }

    #[test]
    fn multi_ability_page_uses_table() {
        let data = fixture();
        let chains = ability_chains(&data).expect("chains");
        let page = generate_page(&data, chains.get("Fire Bolt").expect("chain")).expect("page");

        assert!(page.starts_with("__NOTOC__\n{| width=100%\n|-\n|\n{{Ability infobox\n| name = Fire Bolt\n"));
        assert!(page.contains("}}\n|-\n|\n{{Ability infobox\n| name = Fire Bolt 2\n"));
        assert!(page.ends_with("}}\n|}\n<noinclude>[[Category:Abilities]]</noinclude>"));

        let punch = generate_page(&data, chains.get("Punch").expect("chain")).expect("page");
        assert!(punch.starts_with("__NOTOC__\n{{Ability infobox\n| name = Punch\n"));
    }

    #[test]
    fn pages_include_redirects_and_disambiguation() {
        let data = fixture();
        let pages = generate_pages(&data).expect("pages");

        assert_eq!(pages["Fire Bolt 2"], "#redirect [[Fire Bolt]]");
        assert!(pages["Fire Bolt"].starts_with("__NOTOC__"));
        assert_eq!(pages["First Aid 2"], "#redirect [[First Aid (ability)]]");
        assert!(!pages.contains_key("First Aid"));
        assert!(pages["First Aid (ability)"].starts_with(
            "{{ambox\n| type = You may be looking for the Skill '''[[First Aid]]'''.\n| border = yellow\n}}\n__NOTOC__"
        ));
        assert!(pages["Cold Sphere"].contains("'''[[Cold Sphere (mob)|Cold Sphere]]'''"));
        assert_eq!(pages["Front Kick 2"], "#redirect [[Front Kick]]");
        assert!(!pages.contains_key("Front Kick"));
        assert!(pages.contains_key("Front Kick (Cow)"));
        assert!(pages.contains_key("Call Stabled Pet 1"));
        assert!(pages.keys().all(|title| !title.contains('#')));
    }

    #[test]
    fn generation_is_idempotent() {
        let data = fixture();
        assert_eq!(
            generate_pages(&data).expect("first"),
            generate_pages(&data).expect("second")
        );
    }
}
