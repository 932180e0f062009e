use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use serde_json::{Map, Value};

use crate::cdn::GameData;

static WORD_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(.)([A-Z])").expect("valid word boundary regex"));

const NON_PET_ABILITIES: [&str; 3] = ["PetUndeadArrow1", "PetUndeadArrow2", "PetUndeadOmegaArrow"];
const ENEMY_MINIGOLEM_ABILITIES: [&str; 3] = [
    "MinigolemBombToss4",
    "MinigolemPunch4",
    "MinigolemRageAcidToss4",
];

/// Raw upstream entry: the key it was stored under plus its fields verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    pub data: Map<String, Value>,
}

impl Record {
    pub fn new(id: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }
}

pub trait Content: Sized {
    const DATAFILE: &'static str;

    fn from_record(record: Record) -> Self;
    fn record(&self) -> &Record;

    fn id(&self) -> &str {
        &self.record().id
    }

    fn data(&self) -> &Map<String, Value> {
        &self.record().data
    }

    fn name(&self) -> &str {
        self.record().str_field("Name").unwrap_or_default()
    }

    fn internal_name(&self) -> Option<&str> {
        self.record().str_field("InternalName")
    }

    fn link(&self) -> String {
        format!("[[{}]]", self.name())
    }
}

#[derive(Debug, Clone)]
pub struct Item(Record);

impl Content for Item {
    const DATAFILE: &'static str = "items";

    fn from_record(record: Record) -> Self {
        Self(record)
    }

    fn record(&self) -> &Record {
        &self.0
    }

    fn link(&self) -> String {
        format!("{{{{Item|{}}}}}", self.name())
    }
}

#[derive(Debug, Clone)]
pub struct Recipe(Record);

impl Content for Recipe {
    const DATAFILE: &'static str = "recipes";

    fn from_record(record: Record) -> Self {
        Self(record)
    }

    fn record(&self) -> &Record {
        &self.0
    }
}

#[derive(Debug, Clone)]
pub struct Skill(Record);

impl Content for Skill {
    const DATAFILE: &'static str = "skills";

    fn from_record(record: Record) -> Self {
        Self(record)
    }

    fn record(&self) -> &Record {
        &self.0
    }

    fn name(&self) -> &str {
        self.0.str_field("Name").unwrap_or(&self.0.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PetCommand {
    Basic,
    Sic,
    Trick,
}

impl PetCommand {
    pub const ALL: [PetCommand; 3] = [Self::Basic, Self::Sic, Self::Trick];

    fn keyword(self) -> &'static str {
        match self {
            Self::Basic => "PetBasicAttack",
            Self::Sic => "PetA",
            Self::Trick => "PetB",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Ability(Record);

impl Content for Ability {
    const DATAFILE: &'static str = "abilities";

    fn from_record(record: Record) -> Self {
        Self(record)
    }

    fn record(&self) -> &Record {
        &self.0
    }

    fn link(&self) -> String {
        match self.0.str_field("Skill") {
            Some(skill) if skill != "Unknown" => format!("[[{skill}|{}]]", self.name()),
            _ => format!("[[{}]]", self.name()),
        }
    }
}

impl Ability {
    pub fn keywords(&self) -> Vec<&str> {
        self.data()
            .get("Keywords")
            .and_then(Value::as_array)
            .map(|keywords| keywords.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    pub fn has_keyword(&self, keyword: &str) -> bool {
        self.keywords().contains(&keyword)
    }

    pub fn pve(&self) -> Option<&Map<String, Value>> {
        self.data().get("PvE").and_then(Value::as_object)
    }

    pub fn is_player(&self) -> bool {
        self.data().contains_key("AttributesThatDeltaPowerCost")
            || self.data().contains_key("AttributesThatModPowerCost")
    }

    pub fn is_pet(&self) -> bool {
        let iname = self.internal_name().unwrap_or_default();
        iname.contains("Pet") && !self.is_player() && !NON_PET_ABILITIES.contains(&iname)
    }

    pub fn is_player_minigolem(&self) -> bool {
        let iname = self.internal_name().unwrap_or_default();
        is_player_minigolem_name(iname) && !ENEMY_MINIGOLEM_ABILITIES.contains(&iname)
    }

    pub fn pet_command(&self) -> Option<PetCommand> {
        let keywords = self.keywords();
        PetCommand::ALL
            .into_iter()
            .find(|command| keywords.contains(&command.keyword()))
    }
}

#[derive(Debug, Clone)]
pub struct Npc(Record);

impl Content for Npc {
    const DATAFILE: &'static str = "npcs";

    fn from_record(record: Record) -> Self {
        Self(record)
    }

    fn record(&self) -> &Record {
        &self.0
    }
}

impl Npc {
    pub fn area_name(&self) -> Option<&str> {
        self.0.str_field("AreaName")
    }

    /// `<AreaName>/<name>`, the form quests use to point at an NPC.
    pub fn reference(&self) -> String {
        format!("{}/{}", self.area_name().unwrap_or_default(), self.name())
    }
}

#[derive(Debug, Clone)]
pub struct Area {
    record: Record,
    name_override: Option<String>,
    prefix_override: Option<&'static str>,
}

impl Content for Area {
    const DATAFILE: &'static str = "areas";

    fn from_record(record: Record) -> Self {
        Self {
            record,
            name_override: None,
            prefix_override: None,
        }
    }

    fn record(&self) -> &Record {
        &self.record
    }

    // The wiki does not always use the data files' names for areas.
    fn name(&self) -> &str {
        if let Some(name) = &self.name_override {
            return name;
        }
        let friendly = self.record.str_field("FriendlyName").unwrap_or_default();
        match self.id() {
            "AreaRahuCaves" => "Rahu Sewer",
            "AreaCasino" | "AreaKurCaves" => friendly,
            _ => self.record.str_field("ShortFriendlyName").unwrap_or(friendly),
        }
    }
}

impl Area {
    pub fn prefix(&self) -> &'static str {
        if let Some(prefix) = self.prefix_override {
            return prefix;
        }
        match self.id() {
            "AreaCasino" | "AreaDesert1" | "AreaKurMountains" | "AreaKurCaves" => "the ",
            _ => "",
        }
    }

    pub fn with_display(mut self, name: impl Into<String>, prefix: &'static str) -> Self {
        self.name_override = Some(name.into());
        self.prefix_override = Some(prefix);
        self
    }
}

#[derive(Debug, Clone)]
pub struct Quest(Record);

impl Content for Quest {
    const DATAFILE: &'static str = "quests";

    // Quests with a single requirement sometimes store an object instead of a
    // one-item list.
    fn from_record(mut record: Record) -> Self {
        if let Some(requirements) = record.data.get_mut("Requirements")
            && !requirements.is_array()
        {
            let single = requirements.take();
            *requirements = Value::Array(vec![single]);
        }
        Self(record)
    }

    fn record(&self) -> &Record {
        &self.0
    }
}

impl Quest {
    pub fn favor_npc(&self) -> Option<&str> {
        self.0.str_field("FavorNpc").filter(|value| !value.is_empty())
    }

    pub fn has_keyword(&self, keyword: &str) -> bool {
        self.data()
            .get("Keywords")
            .and_then(Value::as_array)
            .is_some_and(|keywords| keywords.iter().any(|k| k.as_str() == Some(keyword)))
    }

    /// Resolve `FavorNpc` (`<area>/<npc id>`). Scripted event NPCs are absent
    /// from npcs.json, so a stand-in is built from the id and a notice recorded.
    pub fn npc(&self, data: &GameData, notices: &mut Vec<String>) -> Result<Option<Npc>> {
        let Some(favor_npc) = self.favor_npc() else {
            return Ok(None);
        };
        let (area, npc_id) = favor_npc.split_once('/').unwrap_or(("", favor_npc));
        if let Some(npc) = data.by_id::<Npc>(npc_id)? {
            return Ok(Some(npc));
        }

        notices.push("FavorNpc not found in npcs.json. Generating replacement.".to_string());
        Ok(Some(Npc::from_record(Record::new(
            npc_id,
            Map::from_iter([
                ("Name".to_string(), Value::from(event_npc_name(npc_id))),
                ("AreaName".to_string(), Value::from(area)),
            ]),
        ))))
    }
}

#[derive(Debug, Clone)]
pub struct Ai(Record);

impl Content for Ai {
    const DATAFILE: &'static str = "ai";

    fn from_record(record: Record) -> Self {
        Self(record)
    }

    fn record(&self) -> &Record {
        &self.0
    }

    fn name(&self) -> &str {
        &self.0.id
    }
}

impl Ai {
    pub fn is_pet(&self) -> bool {
        self.id().contains("Pet")
    }

    pub fn is_player_minigolem(&self) -> bool {
        is_player_minigolem_name(self.id())
    }

    pub fn ability_params(&self, ability: &str) -> Option<&Map<String, Value>> {
        self.data()
            .get("Abilities")
            .and_then(Value::as_object)
            .and_then(|abilities| abilities.get(ability))
            .and_then(Value::as_object)
    }

    /// Ability internal names in data order. Scaled duplicates (the same ability
    /// re-tuned for a higher level) are left out unless `include_scaled` is set.
    pub fn abilities(&self, include_scaled: bool) -> Vec<String> {
        let Some(abilities) = self.data().get("Abilities").and_then(Value::as_object) else {
            return Vec::new();
        };
        abilities
            .iter()
            .filter(|(name, params)| include_scaled || !is_scaled(name, params))
            .map(|(name, _)| name.clone())
            .collect()
    }
}

pub fn is_player_minigolem_name(name: &str) -> bool {
    name.contains("Minigolem") && !name.contains("Enemy")
}

/// Scaled copies have a `minLevel` above 1 and a trailing variant letter or digit.
pub fn is_scaled(name: &str, params: &Value) -> bool {
    let min_level = params
        .get("minLevel")
        .and_then(Value::as_f64)
        .unwrap_or(0.0);
    min_level > 1.0
        && name
            .chars()
            .last()
            .is_some_and(|c| matches!(c, 'B'..='Z' | '2'..='9'))
}

/// Insert a space before each capital letter that follows another character.
pub fn separate_words(name: &str) -> String {
    WORD_BOUNDARY.replace_all(name, "$1 $2").into_owned()
}

fn event_npc_name(npc_id: &str) -> String {
    let stripped = ["LiveNpc_", "NPC_Halloween_", "NPC_"]
        .iter()
        .find_map(|prefix| npc_id.strip_prefix(prefix))
        .unwrap_or(npc_id);
    stripped
        .split('_')
        .filter(|part| !part.is_empty())
        .map(separate_words)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render a JSON scalar the way it reads on a wiki page.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Empty strings, zero, empty collections, null and `false` are all "unset".
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

impl GameData {
    pub fn all<T: Content>(&self) -> Result<Vec<T>> {
        let file = self.file(T::DATAFILE)?;
        Ok(file
            .iter()
            .filter_map(|(id, value)| {
                value
                    .as_object()
                    .map(|data| T::from_record(Record::new(id.clone(), data.clone())))
            })
            .collect())
    }

    pub fn by_id<T: Content>(&self, id: &str) -> Result<Option<T>> {
        let file = self.file(T::DATAFILE)?;
        Ok(file
            .get(id)
            .and_then(Value::as_object)
            .map(|data| T::from_record(Record::new(id, data.clone()))))
    }

    pub fn by_match<T: Content>(&self, key: &str, value: &str) -> Result<Option<T>> {
        let file = self.file(T::DATAFILE)?;
        Ok(file.iter().find_map(|(id, entry)| {
            let data = entry.as_object()?;
            (data.get(key).and_then(Value::as_str) == Some(value))
                .then(|| T::from_record(Record::new(id.clone(), data.clone())))
        }))
    }

    pub fn by_internal_name<T: Content>(&self, internal_name: &str) -> Result<Option<T>> {
        self.by_match("InternalName", internal_name)
    }

    pub fn name_from_internal_name<T: Content>(&self, internal_name: &str) -> Result<Option<String>> {
        Ok(self
            .by_internal_name::<T>(internal_name)?
            .map(|content| content.name().to_string()))
    }
}
