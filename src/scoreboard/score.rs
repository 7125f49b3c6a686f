use serde::{Deserialize, Serialize};

use crate::scoreboard::types::{NumberFormat, TextComponent};

/// Value held by an entry under one objective
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub holder: String,
    pub value: i32,
    /// Per-entry display name override
    pub display_name: Option<TextComponent>,
    /// Per-entry number format override
    pub number_format: Option<NumberFormat>,
}

impl Score {
    pub fn new(holder: impl Into<String>, value: i32) -> Self {
        Self {
            holder: holder.into(),
            value,
            display_name: None,
            number_format: None,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<TextComponent>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn with_number_format(mut self, number_format: NumberFormat) -> Self {
        self.number_format = Some(number_format);
        self
    }

    /// Apply an incoming set. Overrides are only replaced when present.
    pub fn update(
        &mut self,
        value: i32,
        display_name: Option<&TextComponent>,
        number_format: Option<&NumberFormat>,
    ) {
        self.value = value;
        if let Some(name) = display_name {
            self.display_name = Some(name.clone());
        }
        if let Some(format) = number_format {
            self.number_format = Some(format.clone());
        }
    }

    pub(crate) fn dump_line(&self) -> String {
        let mut line = format!("    {}: {}", self.holder, self.value);
        if let Some(name) = &self.display_name {
            line.push_str(&format!(" (display name: {})", name));
        }
        if let Some(format) = &self.number_format {
            line.push_str(&format!(" (number format: {:?})", format));
        }
        line
    }
}
