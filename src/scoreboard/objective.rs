use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::scoreboard::error::ScoreboardError;
use crate::scoreboard::score::Score;
use crate::scoreboard::types::{DisplaySlot, HealthDisplay, NumberFormat, TextComponent};

/// Named objective with its scores
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Objective {
    name: String,
    pub title: TextComponent,
    pub health_display: HealthDisplay,
    pub number_format: Option<NumberFormat>,
    display_slot: Option<DisplaySlot>,
    scores: HashMap<String, Score>,
}

impl Objective {
    pub fn new(
        name: impl Into<String>,
        title: TextComponent,
        health_display: HealthDisplay,
        number_format: Option<NumberFormat>,
    ) -> Self {
        Self {
            name: name.into(),
            title,
            health_display,
            number_format,
            display_slot: None,
            scores: HashMap::new(),
        }
    }

    pub fn builder(name: impl Into<String>) -> ObjectiveBuilder {
        ObjectiveBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn display_slot(&self) -> Option<DisplaySlot> {
        self.display_slot
    }

    pub(crate) fn set_display_slot(&mut self, slot: Option<DisplaySlot>) {
        self.display_slot = slot;
    }

    pub fn score(&self, holder: &str) -> Option<&Score> {
        self.scores.get(holder)
    }

    pub fn scores(&self) -> impl Iterator<Item = &Score> {
        self.scores.values()
    }

    pub fn score_count(&self) -> usize {
        self.scores.len()
    }

    /// Create or update the holder's score, returning the stored value
    pub fn set_score(
        &mut self,
        holder: &str,
        value: i32,
        display_name: Option<&TextComponent>,
        number_format: Option<&NumberFormat>,
    ) -> &Score {
        self.scores
            .entry(holder.to_string())
            .and_modify(|score| score.update(value, display_name, number_format))
            .or_insert_with(|| Score {
                holder: holder.to_string(),
                value,
                display_name: display_name.cloned(),
                number_format: number_format.cloned(),
            })
    }

    pub fn remove_score(&mut self, holder: &str) -> Option<Score> {
        self.scores.remove(holder)
    }

    /// Apply an update; fields left `None` are untouched
    pub fn apply(&mut self, update: &ObjectiveUpdate) {
        if let Some(title) = &update.title {
            self.title = title.clone();
        }
        if let Some(health_display) = update.health_display {
            self.health_display = health_display;
        }
        if let Some(number_format) = &update.number_format {
            self.number_format = number_format.clone();
        }
    }

    pub(crate) fn dump(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "  {}: title={}, health_display={:?}, number_format={:?}, slot={}",
            self.name,
            self.title,
            self.health_display,
            self.number_format,
            self.display_slot
                .map(|slot| slot.to_string())
                .unwrap_or_else(|| "none".to_string()),
        )];
        let mut scores: Vec<&Score> = self.scores.values().collect();
        scores.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.holder.cmp(&b.holder)));
        lines.extend(scores.into_iter().map(Score::dump_line));
        lines
    }
}

/// Partial change to an objective's presentation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectiveUpdate {
    pub title: Option<TextComponent>,
    pub health_display: Option<HealthDisplay>,
    /// `Some(None)` clears the format
    pub number_format: Option<Option<NumberFormat>>,
}

/// Builder validating required objective fields
#[derive(Debug, Clone)]
pub struct ObjectiveBuilder {
    name: String,
    title: Option<TextComponent>,
    health_display: HealthDisplay,
    number_format: Option<NumberFormat>,
    display_slot: Option<DisplaySlot>,
}

impl ObjectiveBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: None,
            health_display: HealthDisplay::Integer,
            number_format: None,
            display_slot: None,
        }
    }

    pub fn title(mut self, title: impl Into<TextComponent>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn health_display(mut self, health_display: HealthDisplay) -> Self {
        self.health_display = health_display;
        self
    }

    pub fn number_format(mut self, number_format: NumberFormat) -> Self {
        self.number_format = Some(number_format);
        self
    }

    pub fn display_slot(mut self, slot: DisplaySlot) -> Self {
        self.display_slot = Some(slot);
        self
    }

    /// Requested slot, applied by the owning scoreboard on registration
    pub fn requested_slot(&self) -> Option<DisplaySlot> {
        self.display_slot
    }

    pub fn build(self) -> Result<Objective, ScoreboardError> {
        if self.name.is_empty() {
            return Err(ScoreboardError::InvalidName(self.name));
        }
        let title = self.title.ok_or(ScoreboardError::MissingField("title"))?;
        Ok(Objective::new(
            self.name,
            title,
            self.health_display,
            self.number_format,
        ))
    }
}
