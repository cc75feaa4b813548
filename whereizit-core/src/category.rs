//! Area categories.
//!
//! A category is a closed classification of an area. Each variant carries
//! its full presentation data (marker icon, badge emoji, colors) so the
//! marker layer, badges, and listings all draw from one table.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed classification of an area.
///
/// Anything that is not one of the four known labels (including the empty
/// string) parses as `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Category {
    Restroom,
    TrashCan,
    Water,
    SmokingArea,
    #[default]
    Unknown,
}

impl Category {
    /// The four selectable categories, in form display order.
    pub const ALL: [Category; 4] = [
        Category::Restroom,
        Category::TrashCan,
        Category::Water,
        Category::SmokingArea,
    ];

    /// Parses a stored category label. Unrecognized or empty labels map
    /// to `Unknown`.
    pub fn parse(label: &str) -> Self {
        match label {
            "화장실" => Category::Restroom,
            "쓰레기통" => Category::TrashCan,
            "물" => Category::Water,
            "흡연구역" => Category::SmokingArea,
            _ => Category::Unknown,
        }
    }

    /// The label as persisted in the remote store. `Unknown` round-trips
    /// as the empty string.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Restroom => "화장실",
            Category::TrashCan => "쓰레기통",
            Category::Water => "물",
            Category::SmokingArea => "흡연구역",
            Category::Unknown => "",
        }
    }

    /// Human-facing label, with a fallback for uncategorized areas.
    pub fn display_label(&self) -> &'static str {
        match self {
            Category::Unknown => "카테고리 없음",
            _ => self.label(),
        }
    }

    /// Marker icon asset for the map surface.
    pub fn marker_icon(&self) -> &'static str {
        match self {
            Category::Restroom => "toiletMarker",
            Category::TrashCan => "trashMarker",
            Category::Water => "waterMarker",
            Category::SmokingArea => "smokingMarker",
            Category::Unknown => "marker_Pin_Wind",
        }
    }

    /// Emoji shown in the category badge.
    pub fn badge_emoji(&self) -> &'static str {
        match self {
            Category::Restroom => "🚻",
            Category::TrashCan => "🗑️",
            Category::Water => "💧",
            Category::SmokingArea => "🚬",
            Category::Unknown => "❓",
        }
    }

    /// Badge background color (hex, alpha applied by the presentation
    /// layer).
    pub fn badge_color(&self) -> &'static str {
        match self {
            Category::Restroom => "#AF52DE",
            Category::TrashCan => "#8E8E93",
            Category::Water => "#32ADE6",
            Category::SmokingArea => "#FF9500",
            Category::Unknown => "#34C759",
        }
    }

    /// Badge text color (hex).
    pub fn text_color(&self) -> &'static str {
        match self {
            Category::Restroom => "#7B2FA8",
            Category::TrashCan => "#5C5C61",
            Category::Water => "#1E7CA8",
            Category::SmokingArea => "#C26E00",
            Category::Unknown => "#34C759",
        }
    }

    /// Whether this is one of the four selectable categories.
    pub fn is_known(&self) -> bool {
        !matches!(self, Category::Unknown)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_label())
    }
}

impl Serialize for Category {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Category::parse(&s))
    }
}
