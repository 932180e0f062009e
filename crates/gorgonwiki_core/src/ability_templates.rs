use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::ai_profiles::{AbilitySummary, enemy_abilities};
use crate::cdn::GameData;

pub const DESCRIPTIONS_FILE: &str = "abilities.txt";
pub const ICONS_FILE: &str = "icons.txt";

#[derive(Debug, Clone, Serialize)]
pub struct TemplateReport {
    pub abilities: usize,
    pub files: Vec<PathBuf>,
}

/// One `| <InternalName>=<value>` switch case per ability.
pub fn render_template<F>(abilities: &BTreeMap<String, AbilitySummary>, value: F) -> String
where
    F: Fn(&AbilitySummary) -> &str,
{
    abilities
        .iter()
        .map(|(iname, summary)| format!("| {iname}={}\n", value(summary)))
        .collect()
}

/// Write the description and icon switch templates for enemy abilities into `dir`.
pub fn write_templates(data: &GameData, dir: &Path) -> Result<TemplateReport> {
    let abilities = enemy_abilities(data)?;
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let outputs = [
        (
            DESCRIPTIONS_FILE,
            render_template(&abilities, |summary| summary.description.as_str()),
        ),
        (
            ICONS_FILE,
            render_template(&abilities, |summary| summary.icon_id.as_str()),
        ),
    ];

    let mut files = Vec::new();
    for (name, content) in outputs {
        let path = dir.join(name);
        fs::write(&path, content).with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), "wrote template");
        files.push(path);
    }

    Ok(TemplateReport {
        abilities: abilities.len(),
        files,
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::json;
    use tempfile::tempdir;

    use super::{DESCRIPTIONS_FILE, ICONS_FILE, write_templates};
    use crate::cdn::GameData;

    #[test]
    fn writes_description_and_icon_templates() {
        let data = GameData::preloaded(
            "1",
            [(
                "abilities",
                json!({
                    "ability_1": {"Name": "Kraken Slam", "InternalName": "KrakenSlam",
                                  "Description": "Slam", "IconID": 103},
                    "ability_2": {"Name": "Kraken Beak", "InternalName": "KrakenBeak",
                                  "Description": "Bite", "IconID": 101},
                    "ability_3": {"Name": "Fire Bolt", "InternalName": "FireBolt",
                                  "Description": "Burn", "IconID": 104,
                                  "AttributesThatDeltaPowerCost": []},
                    "ability_4": {"Name": "Bomb", "InternalName": "MinigolemBombToss4",
                                  "Description": "Boom", "IconID": 7},
                }),
            )],
        );
        let temp = tempdir().expect("tempdir");
        let out = temp.path().join("templates");

        let report = write_templates(&data, &out).expect("write");
        assert_eq!(report.abilities, 3);
        let json = serde_json::to_value(&report).expect("json");
        assert_eq!(json["abilities"], 3);
        assert_eq!(json["files"].as_array().map(Vec::len), Some(2));
        assert_eq!(
            fs::read_to_string(out.join(DESCRIPTIONS_FILE)).expect("descriptions"),
            "| KrakenBeak=Bite\n| KrakenSlam=Slam\n| MinigolemBombToss4=Boom\n"
        );
        assert_eq!(
            fs::read_to_string(out.join(ICONS_FILE)).expect("icons"),
            "| KrakenBeak=101\n| KrakenSlam=103\n| MinigolemBombToss4=7\n"
        );
    }
}
