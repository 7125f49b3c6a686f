use hashbrown::HashSet;

use crate::scoreboard::error::ScoreboardError;
use crate::scoreboard::types::{
    CollisionRule, NameVisibility, TeamColor, TeamProperties, TextComponent,
};

/// Named team with its properties and member entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    name: String,
    pub properties: TeamProperties,
    entries: HashSet<String>,
}

impl Team {
    pub fn new<I, S>(name: impl Into<String>, properties: TeamProperties, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            properties,
            entries: entries.into_iter().map(Into::into).collect(),
        }
    }

    pub fn builder(name: impl Into<String>) -> TeamBuilder {
        TeamBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entries(&self) -> impl Iterator<Item = &String> {
        self.entries.iter()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn has_entry(&self, entry: &str) -> bool {
        self.entries.contains(entry)
    }

    pub fn add_entries<'a>(&mut self, entries: impl IntoIterator<Item = &'a String>) {
        self.entries.extend(entries.into_iter().cloned());
    }

    /// Remove the entries, returning how many were actually members
    pub fn remove_entries<'a>(&mut self, entries: impl IntoIterator<Item = &'a String>) -> usize {
        entries
            .into_iter()
            .filter(|entry| self.entries.remove(entry.as_str()))
            .count()
    }

    pub(crate) fn dump(&self) -> Vec<String> {
        let props = &self.properties;
        let mut entries: Vec<&String> = self.entries.iter().collect();
        entries.sort();
        vec![
            format!("  {}:", self.name),
            format!("    display_name: {}", props.display_name),
            format!("    prefix: {:?}", props.prefix.as_str()),
            format!("    suffix: {:?}", props.suffix.as_str()),
            format!(
                "    visibility={}, collision={}, color={:?}, flags={:#04x}",
                props.name_visibility.as_str(),
                props.collision_rule.as_str(),
                props.color,
                props.flags(),
            ),
            format!("    entries: {:?}", entries),
        ]
    }
}

/// Builder validating required team fields
#[derive(Debug, Clone)]
pub struct TeamBuilder {
    name: String,
    properties: TeamProperties,
    entries: Vec<String>,
}

impl TeamBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: TeamProperties::default(),
            entries: Vec::new(),
        }
    }

    pub fn properties(mut self, properties: TeamProperties) -> Self {
        self.properties = properties;
        self
    }

    pub fn display_name(mut self, display_name: impl Into<TextComponent>) -> Self {
        self.properties.display_name = display_name.into();
        self
    }

    pub fn prefix(mut self, prefix: impl Into<TextComponent>) -> Self {
        self.properties.prefix = prefix.into();
        self
    }

    pub fn suffix(mut self, suffix: impl Into<TextComponent>) -> Self {
        self.properties.suffix = suffix.into();
        self
    }

    pub fn name_visibility(mut self, visibility: NameVisibility) -> Self {
        self.properties.name_visibility = visibility;
        self
    }

    pub fn collision_rule(mut self, rule: CollisionRule) -> Self {
        self.properties.collision_rule = rule;
        self
    }

    pub fn color(mut self, color: TeamColor) -> Self {
        self.properties.color = color;
        self
    }

    pub fn allow_friendly_fire(mut self, allow: bool) -> Self {
        self.properties.allow_friendly_fire = allow;
        self
    }

    pub fn can_see_friendly_invisibles(mut self, can_see: bool) -> Self {
        self.properties.can_see_friendly_invisibles = can_see;
        self
    }

    pub fn entry(mut self, entry: impl Into<String>) -> Self {
        self.entries.push(entry.into());
        self
    }

    pub fn entries<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entries.extend(entries.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> Result<Team, ScoreboardError> {
        if self.name.is_empty() {
            return Err(ScoreboardError::InvalidName(self.name));
        }
        if let Some(empty) = self.entries.iter().find(|entry| entry.is_empty()) {
            return Err(ScoreboardError::InvalidName(empty.clone()));
        }
        Ok(Team::new(self.name, self.properties, self.entries))
    }
}
