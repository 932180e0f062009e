use std::collections::BTreeMap;

use anyhow::Result;
use serde_json::Value;

use crate::ai_profiles::{get_abilities, get_ais};
use crate::cdn::GameData;
use crate::content::{Ability, Ai, Content, PetCommand, display_value, is_truthy};

fn damage(ability: &Ability) -> Option<&Value> {
    ability.pve().and_then(|pve| pve.get("Damage"))
}

fn basic_ability(ability: &Ability) -> String {
    let damage = damage(ability).and_then(Value::as_f64).unwrap_or(0.0) as i64;
    format!(
        "{{{{Combat Ability|{}}}}}({damage} damage)",
        ability.internal_name().unwrap_or_default()
    )
}

fn split_ability(ability: &Ability) -> String {
    let iname = ability.internal_name().unwrap_or_default();
    let mut cell =
        format!("{{{{Combat Ability icon|{iname}}}}} || {{{{Combat Ability name|{iname}}}}}");
    if let Some(damage) = damage(ability).filter(|damage| is_truthy(damage)) {
        cell.push_str(&format!(" || ({} damage)", display_value(damage)));
    }
    cell
}

/// Collapsible table of one command's abilities by AI level range.
fn level_table(ai: &Ai, abilities: &[&Ability]) -> String {
    let mut rows = abilities
        .iter()
        .map(|ability| {
            let params = ability
                .internal_name()
                .and_then(|iname| ai.ability_params(iname));
            let min = params
                .and_then(|params| params.get("minLevel"))
                .map(display_value)
                .unwrap_or_else(|| "1".to_string());
            let max = match params.and_then(|params| params.get("maxLevel")) {
                Some(max) if is_truthy(max) => format!("-{}", display_value(max)),
                _ => "+".to_string(),
            };
            format!("| Level {min}{max}: || {}", split_ability(ability))
        })
        .collect::<Vec<_>>();

    let Some(first) = rows.first_mut() else {
        return String::new();
    };
    // toggle link column
    first.push_str(r#" || style="width:100%; text-align:right;" |"#);

    format!(
        "{{| class=\"mw-collapsible mw-collapsed\"\n{}\n|}}",
        rows.join("\n|-\n")
    )
}

pub fn render_profile(ai: &Ai, commands: &BTreeMap<PetCommand, Vec<&Ability>>) -> String {
    let for_command = |command: PetCommand| {
        commands
            .get(&command)
            .map(Vec::as_slice)
            .unwrap_or_default()
    };
    let basics = for_command(PetCommand::Basic)
        .iter()
        .map(|ability| basic_ability(ability))
        .collect::<Vec<_>>()
        .join(", ");

    [
        r#"{| class="wikitable extimage32px" style="white-space:nowrap;""#.to_string(),
        format!("| Basic Attack: || {basics}"),
        "|-".to_string(),
        "| Sic 'Em Attack: || ".to_string(),
        level_table(ai, for_command(PetCommand::Sic)),
        "|-".to_string(),
        "| Special Trick: || ".to_string(),
        level_table(ai, for_command(PetCommand::Trick)),
        "|}".to_string(),
    ]
    .join("\n")
}

/// Pet profiles keyed by AI name.
pub fn generate_pet_profiles(data: &GameData) -> Result<BTreeMap<String, String>> {
    let valid = get_abilities(data, Ability::is_pet, &[])?;
    let by_iname = data
        .all::<Ability>()?
        .into_iter()
        .filter_map(|ability| {
            let iname = ability.internal_name()?.to_string();
            valid.contains_key(&iname).then_some((iname, ability))
        })
        .collect::<BTreeMap<_, _>>();

    let mut profiles = BTreeMap::new();
    for ai in get_ais(data, Ai::is_pet)? {
        let alist = ai
            .abilities(true)
            .iter()
            .filter_map(|iname| by_iname.get(iname))
            .collect::<Vec<_>>();
        if alist.is_empty() {
            continue;
        }

        let mut commands: BTreeMap<PetCommand, Vec<&Ability>> = PetCommand::ALL
            .into_iter()
            .map(|command| (command, Vec::new()))
            .collect();
        for ability in alist {
            match ability.pet_command() {
                Some(command) => commands.entry(command).or_default().push(ability),
                None => tracing::warn!(
                    "Skipped ability {} for AI {} because it is not a pet command",
                    ability.name(),
                    ai.name()
                ),
            }
        }
        profiles.insert(ai.name().to_string(), render_profile(&ai, &commands));
    }
    Ok(profiles)
}
