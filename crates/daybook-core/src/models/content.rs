//! Entry content shapes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Closed set of journal entry kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// Free-form journal page
    Journal,
    /// Mood check-in
    Mood,
    /// Gratitude list
    Gratitude,
    /// Personal goal
    Goal,
}

impl EntityType {
    /// All entity types, in display order
    pub const ALL: [Self; 4] = [Self::Journal, Self::Mood, Self::Gratitude, Self::Goal];

    /// Stable storage representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Journal => "journal",
            Self::Mood => "mood",
            Self::Gratitude => "gratitude",
            Self::Goal => "goal",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::InvalidInput(format!("unknown entity type '{s}'")))
    }
}

/// Type-specific body of an entry.
///
/// The variant determines the entry's [`EntityType`], so type and shape can
/// never disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryContent {
    Journal {
        notes: String,
    },
    Mood {
        rating: u8,
        #[serde(default)]
        notes: String,
    },
    Gratitude {
        items: Vec<String>,
    },
    Goal {
        description: String,
        #[serde(default)]
        completed: bool,
    },
}

impl EntryContent {
    /// Convenience constructor for a plain journal page
    pub fn journal(notes: impl Into<String>) -> Self {
        Self::Journal {
            notes: notes.into(),
        }
    }

    #[must_use]
    pub const fn entity_type(&self) -> EntityType {
        match self {
            Self::Journal { .. } => EntityType::Journal,
            Self::Mood { .. } => EntityType::Mood,
            Self::Gratitude { .. } => EntityType::Gratitude,
            Self::Goal { .. } => EntityType::Goal,
        }
    }

    /// Reject shapes the store must never persist
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Mood { rating, .. } if !(1..=5).contains(rating) => Err(Error::InvalidInput(
                format!("mood rating must be between 1 and 5, got {rating}"),
            )),
            Self::Goal { description, .. } if description.trim().is_empty() => Err(
                Error::InvalidInput("goal description cannot be empty".into()),
            ),
            _ => Ok(()),
        }
    }

    /// Plain-text rendering used for previews and text search
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            Self::Journal { notes } => notes.clone(),
            Self::Mood { rating, notes } => {
                if notes.is_empty() {
                    format!("mood {rating}/5")
                } else {
                    format!("mood {rating}/5: {notes}")
                }
            }
            Self::Gratitude { items } => items.join("; "),
            Self::Goal {
                description,
                completed,
            } => {
                let mark = if *completed { "x" } else { " " };
                format!("[{mark}] {description}")
            }
        }
    }
}
