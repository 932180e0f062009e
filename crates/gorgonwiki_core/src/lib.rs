pub mod ability_pages;
pub mod ability_templates;
pub mod ai_profiles;
pub mod cdn;
pub mod config;
pub mod content;
pub mod mediawiki;
pub mod pet_profiles;
pub mod publish;
pub mod quest_pages;
pub mod runtime;
