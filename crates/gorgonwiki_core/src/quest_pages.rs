use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Result, bail};
use serde_json::{Map, Value};

use crate::cdn::GameData;
use crate::content::{
    Ability, Area, Content, Item, Quest, Recipe, Record, Skill, display_value, separate_words,
};
use crate::mediawiki::WikiReadApi;
use crate::publish::{PageSet, fetch_live_texts};

/// Test quests that ship in the data files.
pub const QUEST_BLACKLIST: [&str; 2] = ["quest_1", "quest_2"];

const IGNORED_KEYS: [&str; 18] = [
    // bookkeeping
    "InternalName",
    "IsCancellable",
    "Name",
    "Version",
    // resolved through the NPC
    "FavorNpc",
    "DisplayedLocation",
    "TSysLevel",
    // one quest per group at a time, e.g. casino dailies
    "GroupingName",
    // guild quests
    "IsGuildQuest",
    "NumExpectedParticipants",
    "IsAutoWrapUp",
    "IsAutoPreface",
    "ReuseTime_Minutes",
    "Keywords",
    // auto-cancel after events
    "RequirementsToSustain",
    "PreGiveItems",
    "PreGiveRecipes",
    "PreGiveEffects",
];

fn event_name(keyword: &str) -> Option<&'static str> {
    match keyword {
        "LiveEvent_Crafting" => Some("a Crafting Caravan event"),
        "Event_Christmas" => Some("Christmas"),
        "LiveEvent_CivilService" => Some("a Civil Service event"),
        "LiveEvent_BunFu" => Some("a Bun-Fu event"),
        _ => None,
    }
}

fn restriction(requirement: &str) -> Option<&'static str> {
    match requirement {
        "IsWarden" => Some("for Wardens"),
        "AreaEventOn" => Some("during an event in the area"),
        "HangOutCompleted" => Some("after completing a hangout"),
        "InteractionFlagSet" => Some("after an interaction"),
        "IsLongtimeAnimal" => Some("to long time animals"),
        _ => None,
    }
}

fn currency_name(currency: &str) -> Option<&'static str> {
    match currency {
        "WardenPoints" => Some("Warden Points"),
        "Gold" => Some("councils"),
        _ => None,
    }
}

/// Rendered quest page plus everything that needs a human to look at it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuestPage {
    pub title: String,
    pub text: String,
    pub errors: Vec<String>,
    pub notices: Vec<String>,
}

fn text_field<'a>(map: &'a Map<String, Value>, key: &str) -> &'a str {
    map.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn as_int(value: Option<&Value>) -> i64 {
    value.and_then(Value::as_f64).unwrap_or(0.0) as i64
}

fn reuse_time(count: &Value, unit: &str) -> String {
    let plural = if count.as_f64() == Some(1.0) { "" } else { "s" };
    format!(
        "This quest can be repeated after {} {unit}{plural}.",
        display_value(count)
    )
}

fn bullet_list(items: &[String]) -> String {
    items.iter().map(|item| format!("* {item}\n")).collect()
}

const ONLY_AVAILABLE: &str = "This quest is only available ";

/// Merge requirement sentences into one sentence that reads as alternatives.
fn join_alternatives(lines: &[String]) -> Option<String> {
    match lines {
        [] => None,
        [line] => Some(line.clone()),
        _ => {
            let clauses = lines
                .iter()
                .map(|line| line.trim_end_matches('.'))
                .collect::<Vec<_>>();
            if clauses.iter().all(|clause| clause.starts_with(ONLY_AVAILABLE)) {
                let restrictions = clauses
                    .iter()
                    .map(|clause| &clause[ONLY_AVAILABLE.len()..])
                    .collect::<Vec<_>>();
                return Some(format!("{ONLY_AVAILABLE}{}.", restrictions.join(" or ")));
            }
            let joined = clauses
                .iter()
                .enumerate()
                .map(|(position, clause)| {
                    let mut chars = clause.chars();
                    match chars.next() {
                        Some(first) if position > 0 => {
                            format!("{}{}", first.to_lowercase(), chars.as_str())
                        }
                        _ => clause.to_string(),
                    }
                })
                .collect::<Vec<_>>()
                .join(" or ");
            Some(format!("{joined}."))
        }
    }
}

struct QuestRenderer<'a> {
    data: &'a GameData,
    errors: Vec<String>,
    notices: Vec<String>,
}

impl QuestRenderer<'_> {
    fn link_by_internal_name<T: Content>(
        &mut self,
        kind: &str,
        internal_name: &str,
    ) -> Result<String> {
        match self.data.by_internal_name::<T>(internal_name)? {
            Some(content) => Ok(content.link()),
            None => {
                self.errors.push(format!("Unknown {kind}: {internal_name}"));
                Ok(internal_name.to_string())
            }
        }
    }

    fn skill_link(&mut self, id: &str) -> Result<String> {
        match self.data.by_id::<Skill>(id)? {
            Some(skill) => Ok(skill.link()),
            None => {
                self.errors.push(format!("Unknown skill: {id}"));
                Ok(format!("[[{}]]", separate_words(id)))
            }
        }
    }

    fn requirements_text(&mut self, requirements: &Value) -> Result<String> {
        let mut list = match requirements {
            Value::Array(list) => list.as_slice(),
            single => std::slice::from_ref(single),
        };
        // A few Christmas quests nest the list once more.
        if let Some(Value::Array(inner)) = list.first() {
            list = inner.as_slice();
        }
        Ok(self.requirement_lines(list)?.join(" "))
    }

    fn requirement_lines(&mut self, requirements: &[Value]) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        for requirement in requirements.iter().filter_map(Value::as_object) {
            let kind = text_field(requirement, "T");
            match kind {
                "Or" => {
                    let nested = requirement
                        .get("List")
                        .and_then(Value::as_array)
                        .map(Vec::as_slice)
                        .unwrap_or_default();
                    let alternatives = self.requirement_lines(nested)?;
                    if let Some(line) = join_alternatives(&alternatives) {
                        lines.push(line);
                    }
                }
                "MinFavorLevel" => lines.push(format!(
                    "The quest is available at {{{{Favor|{}}}}} favor.",
                    separate_words(text_field(requirement, "Level"))
                )),
                "MinSkillLevel" => {
                    let skill = self.skill_link(text_field(requirement, "Skill"))?;
                    let level = requirement.get("Level").map(display_value).unwrap_or_default();
                    lines.push(format!("This quest is available at {skill} level {level}."));
                }
                "QuestCompleted" | "GuildQuestCompleted" => {
                    let quest =
                        self.link_by_internal_name::<Quest>("quest", text_field(requirement, "Quest"))?;
                    lines.push(format!(
                        "You must have previously completed {quest} in order to undertake this quest."
                    ));
                }
                "HasEffectKeyword" if requirement.contains_key("Keyword") => {
                    let keyword = text_field(requirement, "Keyword");
                    match event_name(keyword) {
                        Some(event) => {
                            lines.push(format!("This quest is only available during {event}."));
                        }
                        None => self.errors.push(format!("Unknown event: {keyword}")),
                    }
                }
                other => match restriction(other) {
                    Some(restriction) => {
                        lines.push(format!("This quest is only available {restriction}."));
                    }
                    None => self.errors.push(format!("Unknown requirement: {other}")),
                },
            }
        }
        Ok(lines)
    }

    fn objective(&mut self, objective: &Map<String, Value>) -> Result<String> {
        let mut description = text_field(objective, "Description").to_string();
        if text_field(objective, "Type") == "Collect"
            && let Some(item_name) = objective.get("ItemName").and_then(Value::as_str)
        {
            match self.data.by_internal_name::<Item>(item_name)? {
                Some(item) if !item.name().is_empty() => {
                    description = description.replace(item.name(), &item.link());
                }
                Some(_) => {}
                None => self.errors.push(format!("Unknown item: {item_name}")),
            }
        }
        if let Some(number) = objective.get("Number") {
            let rendered = display_value(number);
            if number.as_f64().is_some_and(|n| n > 1.0) && !description.contains(&rendered) {
                description.push_str(&format!(" x{rendered}"));
            }
        }
        Ok(description)
    }

    fn reward_list(&mut self, rewards: &[Value], out: &mut Vec<String>) -> Result<()> {
        for reward in rewards.iter().filter_map(Value::as_object) {
            match text_field(reward, "T") {
                // inconsistent casing upstream
                "SkillXP" | "SkillXp" => {
                    let skill = self.skill_link(text_field(reward, "Skill"))?;
                    out.push(format!("{} XP in {skill}", as_int(reward.get("Xp"))));
                }
                "CombatXp" => out.push(format!(
                    "{} XP in active combat skills",
                    reward.get("Xp").map(display_value).unwrap_or_default()
                )),
                "Recipe" => {
                    let recipe =
                        self.link_by_internal_name::<Recipe>("recipe", text_field(reward, "Recipe"))?;
                    out.push(format!("Recipe: {recipe}"));
                }
                "GuildXp" => out.push(format!(
                    "{} Guild XP",
                    reward.get("Xp").map(display_value).unwrap_or_default()
                )),
                "GuildCredits" => out.push(format!(
                    "{} Guild Credits",
                    reward.get("Credits").map(display_value).unwrap_or_default()
                )),
                other => self.errors.push(format!("Unexpected reward type: {other}")),
            }
        }
        Ok(())
    }

    fn render(&mut self, quest: &Quest) -> Result<String> {
        let mut source: BTreeMap<&str, String> = BTreeMap::new();
        let mut objectives = Vec::new();
        let mut rewards = Vec::new();

        for (key, value) in quest.data() {
            let key = key.as_str();
            let text = value.as_str().unwrap_or_default();
            let list = value.as_array().map(Vec::as_slice).unwrap_or_default();
            match key {
                _ if IGNORED_KEYS.contains(&key) => {}
                "Description" => {
                    source.insert("Description", format!("==Summary==\n{}", text.trim()));
                }
                // Fiery Secrets has an empty MidwayText.
                "MidwayText" if text.is_empty() => {}
                "MidwayText" => {
                    source.insert("MidwayText", format!("===Midway===\n{}", text.trim()));
                }
                "MidwayGiveItems" => {
                    let mut received = Vec::new();
                    for item in list.iter().filter_map(Value::as_object) {
                        let link =
                            self.link_by_internal_name::<Item>("item", text_field(item, "Item"))?;
                        received.push(format!("You receive {link}."));
                    }
                    source.insert("MidwayGiveItems", format!("[{}]", received.join(" ")));
                }
                "ReuseTime_Days" => {
                    source.insert("ReuseTime", reuse_time(value, "day"));
                }
                "ReuseTime_Hours" => {
                    source.insert("ReuseTime", reuse_time(value, "hour"));
                }
                "Requirements" => {
                    source.insert("Requirements", self.requirements_text(value)?);
                }
                // Only the Fiery Secrets quests have this.
                "PrerequisiteFavorLevel" => {
                    source.insert(
                        "PrerequisiteFavorLevel",
                        format!(
                            "This quest is available at {{{{Favor|{}}}}} favor.",
                            separate_words(text)
                        ),
                    );
                }
                "PrefaceText" => {
                    source.insert("PrefaceText", format!("===Preface===\n{}", text.trim()));
                }
                "Objectives" => {
                    for objective in list.iter().filter_map(Value::as_object) {
                        objectives.push(self.objective(objective)?);
                    }
                }
                "SuccessText" => {
                    source.insert("SuccessText", format!("{{{{Quote|{}}}}}", display_value(value)));
                }
                "Reward_Favor" | "Rewards_Favor" => {
                    rewards.push(format!("{} [[Favor]]", display_value(value)));
                }
                "Reward_Gold" => rewards.push(format!("{} councils", display_value(value))),
                "Rewards_Currency" => {
                    for (currency, amount) in value.as_object().into_iter().flatten() {
                        match currency_name(currency) {
                            Some(name) => rewards.push(format!("{} {name}", display_value(amount))),
                            None => self
                                .errors
                                .push(format!("Unknown reward currency: {currency}")),
                        }
                    }
                }
                "Rewards_Items" => {
                    for item in list.iter().filter_map(Value::as_object) {
                        let mut reward =
                            self.link_by_internal_name::<Item>("item", text_field(item, "Item"))?;
                        if let Some(stack) = item.get("StackSize")
                            && stack.as_f64().is_some_and(|n| n > 1.0)
                        {
                            reward.push_str(&format!(" x{}", display_value(stack)));
                        }
                        rewards.push(reward);
                    }
                }
                "Rewards_XP" => {
                    for (skill, xp) in value.as_object().into_iter().flatten() {
                        let skill = self.skill_link(skill)?;
                        rewards.push(format!("{} XP in {skill}", as_int(Some(xp))));
                    }
                }
                "Rewards_Ability" => {
                    let ability = self.link_by_internal_name::<Ability>("ability", text)?;
                    rewards.push(format!("Ability: {ability}"));
                }
                "Rewards" => self.reward_list(list, &mut rewards)?,
                "Rewards_Effects" => self.notices.push(format!(
                    "Special reward effects must be handled manually: {value}"
                )),
                // special loot table
                "Rewards_NamedLootProfile" => rewards.push("random items".to_string()),
                other => self.errors.push(format!("Unhandled key: {other}")),
            }
        }

        let requirements = [
            source.get("PrerequisiteFavorLevel").map(String::as_str).unwrap_or_default(),
            source.get("Requirements").map(String::as_str).unwrap_or_default(),
        ]
        .join(" ")
        .trim()
        .to_string();
        source.insert("Requirements", requirements);

        let Some(npc) = quest.npc(self.data, &mut self.notices)? else {
            bail!("quest {} has no FavorNpc", quest.name());
        };
        let area_id = npc.area_name().unwrap_or_default();
        let mut area = match self.data.by_id::<Area>(area_id)? {
            Some(area) => area,
            None => {
                self.errors.push(format!("Unknown area: {area_id}"));
                Area::from_record(Record::new(area_id, Map::new())).with_display(area_id, "")
            }
        };
        if quest.record().str_field("DisplayedLocation") == Some("Sacred Grotto") {
            area = area.with_display("Sacred Grotto", "the ");
        }

        if !source.contains_key("Description") {
            self.errors.push("Missing key: Description".to_string());
        }
        let section = |key: &str, suffix: &str| {
            source
                .get(key)
                .map(|text| format!("{text}{suffix}"))
                .unwrap_or_default()
        };

        Ok([
            "__NOTOC__\n".to_string(),
            section("Description", ""),
            "\n\n".to_string(),
            section("ReuseTime", "\n\n"),
            "===Prerequisites===\n".to_string(),
            format!(
                "To start this quest, talk to '''{}''' in {}'''{}'''. ",
                npc.link(),
                area.prefix(),
                area.link()
            ),
            section("Requirements", "\n\n"),
            section("PrefaceText", "\n\n"),
            section("MidwayText", "\n\n"),
            section("MidwayGiveItems", "\n\n"),
            "===Requirements===\n".to_string(),
            bullet_list(&objectives),
            "\n===Rewards===\n".to_string(),
            "{{Spoiler|Rewards|\n".to_string(),
            section("SuccessText", "\n"),
            bullet_list(&rewards),
            "}}\n\n".to_string(),
            "[[Category:Quests]]".to_string(),
            format!("[[Category:Quests/{} Quests]]", area.name()),
            format!("[[Category:Quests/{}]]", npc.name()),
            "\n".to_string(),
        ]
        .concat())
    }
}

/// Render one quest page. Lookup failures inside the quest are collected in
/// `errors`; only data access failures are returned as `Err`.
pub fn render_quest(data: &GameData, quest: &Quest) -> Result<QuestPage> {
    let mut renderer = QuestRenderer {
        data,
        errors: Vec::new(),
        notices: Vec::new(),
    };
    let text = renderer.render(quest)?;
    Ok(QuestPage {
        title: quest.name().trim().to_string(),
        text,
        errors: renderer.errors,
        notices: renderer.notices,
    })
}

#[derive(Debug, Clone, Default)]
pub struct QuestSelection {
    /// Only this quest, by display name.
    pub quest: Option<String>,
    /// Skip the first n quests of the data file.
    pub offset: usize,
}

/// Quests worth a page, in data order.
pub fn select_quests(data: &GameData, selection: &QuestSelection) -> Result<Vec<Quest>> {
    let candidates = match &selection.quest {
        Some(name) => match data.by_match::<Quest>("Name", name)? {
            Some(quest) => vec![quest],
            None => bail!("Unknown quest: {name}"),
        },
        None => data.all::<Quest>()?,
    };

    let mut selected = Vec::new();
    for quest in candidates.into_iter().skip(selection.offset) {
        if QUEST_BLACKLIST.contains(&quest.id()) || quest.has_keyword("WorkOrder") {
            continue;
        }
        match quest.record().str_field("FavorNpc") {
            None => tracing::info!("Skipping quest without FavorNpc: {}", quest.name()),
            Some("") => tracing::info!("Skipping quest with empty FavorNpc: {}", quest.name()),
            Some(_) => selected.push(quest),
        }
    }
    Ok(selected)
}

/// Render pages for the selected quests that have no wiki page yet.
///
/// Stops at the first quest with errors after logging them, since a broken
/// page is worse than a missing one.
pub fn generate_missing_pages<A: WikiReadApi + ?Sized>(
    data: &GameData,
    selection: &QuestSelection,
    api: &mut A,
) -> Result<PageSet> {
    let quests = select_quests(data, selection)?;
    let titles = quests
        .iter()
        .map(|quest| quest.name().trim().to_string())
        .collect::<Vec<_>>();
    let live = fetch_live_texts(api, &titles)?;

    let mut pages = PageSet::new();
    let mut taken = BTreeSet::new();
    for (position, quest) in quests.iter().enumerate() {
        let title = &titles[position];
        if live.contains_key(title) {
            tracing::debug!("Page exists for quest {title}");
            continue;
        }
        // Quests sharing a name share a page; the first one in data order wins.
        if !taken.insert(title.clone()) {
            tracing::debug!("Page already generated for quest {title}");
            continue;
        }
        tracing::info!("Missing page for quest {title}");

        let page = render_quest(data, quest)?;
        for notice in &page.notices {
            tracing::warn!(quest = %title, "NOTICE: {notice}");
        }
        if !page.errors.is_empty() {
            for error in &page.errors {
                tracing::error!(quest = %title, "{error}");
            }
            bail!("Something is not right, see console output");
        }
        pages.push((page.title, page.text));
    }
    Ok(pages)
}
