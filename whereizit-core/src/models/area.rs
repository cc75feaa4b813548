//! The area record: a map-pinned point of interest.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;

use crate::category::Category;
use crate::tags::TagAxis;

/// Wire field names, exactly as persisted in the remote store.
pub mod fields {
    pub const DOCUMENT_ID: &str = "documentID";
    pub const IMAGE_URL: &str = "imageURL";
    pub const NAME: &str = "name";
    pub const DESCRIPTION: &str = "description";
    pub const AREA_LAT: &str = "areaLat";
    pub const AREA_LNG: &str = "areaLng";
    pub const CATEGORY: &str = "category";
    pub const ENVIRONMENT_TAGS: &str = "environmentTags";
    pub const TYPE_TAGS: &str = "typeTags";
    pub const FACILITY_TAGS: &str = "facilityTags";
    pub const UPLOAD_USER: &str = "uploadUser";
    pub const UPLOAD_DATE: &str = "uploadDate";
}

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A user-submitted point of interest.
#[derive(Debug, Clone, PartialEq)]
pub struct Area {
    /// Stable identity once assigned by the store.
    pub document_id: Option<String>,
    pub image_url: Option<String>,
    pub name: String,
    pub description: String,
    pub area_lat: f64,
    pub area_lng: f64,
    pub category: Category,
    pub environment_tags: BTreeSet<String>,
    pub type_tags: BTreeSet<String>,
    pub facility_tags: BTreeSet<String>,
    /// Identity of the creator (email).
    pub upload_user: String,
    pub upload_date: DateTime<Utc>,
}

impl Area {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        area_lat: f64,
        area_lng: f64,
    ) -> Self {
        Self {
            document_id: None,
            image_url: None,
            name: name.into(),
            description: description.into(),
            area_lat,
            area_lng,
            category: Category::Unknown,
            environment_tags: BTreeSet::new(),
            type_tags: BTreeSet::new(),
            facility_tags: BTreeSet::new(),
            upload_user: String::new(),
            upload_date: Utc::now(),
        }
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    pub fn with_document_id(mut self, document_id: impl Into<String>) -> Self {
        self.document_id = Some(document_id.into());
        self
    }

    pub fn with_upload_user(mut self, upload_user: impl Into<String>) -> Self {
        self.upload_user = upload_user.into();
        self
    }

    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    /// Parses a raw field bag from the remote store.
    ///
    /// Parsing is best-effort and partial: if any of the four required
    /// fields (`name`, `description`, `areaLat`, `areaLng`) is absent or
    /// of the wrong type, the record is unusable and `None` is returned.
    /// Every other field falls back to a default.
    pub fn from_fields(document_id: &str, bag: &Map<String, Value>) -> Option<Self> {
        let name = bag.get(fields::NAME)?.as_str()?.to_string();
        let description = bag.get(fields::DESCRIPTION)?.as_str()?.to_string();
        let area_lat = bag.get(fields::AREA_LAT)?.as_f64()?;
        let area_lng = bag.get(fields::AREA_LNG)?.as_f64()?;

        let image_url = bag
            .get(fields::IMAGE_URL)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let category = bag
            .get(fields::CATEGORY)
            .and_then(Value::as_str)
            .map(Category::parse)
            .unwrap_or(Category::Unknown);
        let upload_user = bag
            .get(fields::UPLOAD_USER)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let upload_date = bag
            .get(fields::UPLOAD_DATE)
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        Some(Self {
            document_id: Some(document_id.to_string()),
            image_url,
            name,
            description,
            area_lat,
            area_lng,
            category,
            environment_tags: string_set(bag.get(fields::ENVIRONMENT_TAGS)),
            type_tags: string_set(bag.get(fields::TYPE_TAGS)),
            facility_tags: string_set(bag.get(fields::FACILITY_TAGS)),
            upload_user,
            upload_date,
        })
    }

    /// Serializes into the wire field bag for an upsert.
    pub fn to_fields(&self) -> Map<String, Value> {
        let mut bag = Map::new();
        bag.insert(
            fields::DOCUMENT_ID.into(),
            self.document_id
                .as_deref()
                .map_or(Value::Null, |id| Value::String(id.to_string())),
        );
        bag.insert(
            fields::IMAGE_URL.into(),
            self.image_url
                .as_deref()
                .map_or(Value::Null, |url| Value::String(url.to_string())),
        );
        bag.insert(fields::NAME.into(), Value::String(self.name.clone()));
        bag.insert(
            fields::DESCRIPTION.into(),
            Value::String(self.description.clone()),
        );
        bag.insert(fields::AREA_LAT.into(), json_number(self.area_lat));
        bag.insert(fields::AREA_LNG.into(), json_number(self.area_lng));
        bag.insert(
            fields::CATEGORY.into(),
            Value::String(self.category.label().to_string()),
        );
        bag.insert(
            fields::ENVIRONMENT_TAGS.into(),
            string_array(&self.environment_tags),
        );
        bag.insert(fields::TYPE_TAGS.into(), string_array(&self.type_tags));
        bag.insert(
            fields::FACILITY_TAGS.into(),
            string_array(&self.facility_tags),
        );
        bag.insert(
            fields::UPLOAD_USER.into(),
            Value::String(self.upload_user.clone()),
        );
        bag.insert(
            fields::UPLOAD_DATE.into(),
            Value::String(self.upload_date.to_rfc3339()),
        );
        bag
    }

    /// The tag set for a given axis.
    pub fn tags(&self, axis: TagAxis) -> &BTreeSet<String> {
        match axis {
            TagAxis::Environment => &self.environment_tags,
            TagAxis::Type => &self.type_tags,
            TagAxis::Facility => &self.facility_tags,
        }
    }

    /// Great-circle distance in meters from this area to a point.
    pub fn distance_m(&self, lat: f64, lng: f64) -> f64 {
        let phi1 = self.area_lat.to_radians();
        let phi2 = lat.to_radians();
        let dphi = (lat - self.area_lat).to_radians();
        let dlambda = (lng - self.area_lng).to_radians();

        let a = (dphi / 2.0).sin().powi(2)
            + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} {} [{}]",
            self.category.badge_emoji(),
            self.name,
            self.category.display_label()
        )?;
        writeln!(f, "  ({:.6}, {:.6})", self.area_lat, self.area_lng)?;
        writeln!(f, "  {}", self.description)?;

        for axis in TagAxis::ALL {
            let tags = self.tags(axis);
            if !tags.is_empty() {
                let joined: Vec<&str> = tags.iter().map(String::as_str).collect();
                writeln!(f, "  {} {}: {}", axis.emoji(), axis.title(), joined.join(", "))?;
            }
        }

        if !self.upload_user.is_empty() {
            writeln!(f, "  by {}", self.upload_user)?;
        }

        Ok(())
    }
}

fn string_set(value: Option<&Value>) -> BTreeSet<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn string_array(set: &BTreeSet<String>) -> Value {
    Value::Array(set.iter().cloned().map(Value::String).collect())
}

fn json_number(value: f64) -> Value {
    serde_json::Number::from_f64(value).map_or(Value::Null, Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_bag() -> Map<String, Value> {
        json!({
            "documentID": "37.123456789_127.123456789",
            "imageURL": "https://example.com/a.jpg",
            "name": "강남역 11번 출구",
            "description": "우측 골목 안쪽",
            "areaLat": 37.123456789,
            "areaLng": 127.123456789,
            "category": "흡연구역",
            "environmentTags": ["실외", "개방형"],
            "typeTags": ["흡연 구역"],
            "facilityTags": [],
            "uploadUser": "user@example.com",
            "uploadDate": "2025-11-26T09:30:00+00:00",
        })
        .as_object()
        .unwrap()
        .clone()
    }

    #[test]
    fn test_from_fields_full() {
        let area = Area::from_fields("37.123456789_127.123456789", &full_bag()).unwrap();
        assert_eq!(area.document_id.as_deref(), Some("37.123456789_127.123456789"));
        assert_eq!(area.name, "강남역 11번 출구");
        assert_eq!(area.category, Category::SmokingArea);
        assert_eq!(area.environment_tags.len(), 2);
        assert!(area.type_tags.contains("흡연 구역"));
        assert_eq!(area.upload_user, "user@example.com");
    }

    #[test]
    fn test_from_fields_missing_required_is_none() {
        for required in ["name", "description", "areaLat", "areaLng"] {
            let mut bag = full_bag();
            bag.remove(required);
            assert!(
                Area::from_fields("id", &bag).is_none(),
                "missing {} should not parse",
                required
            );
        }
    }

    #[test]
    fn test_from_fields_wrong_type_is_none() {
        let mut bag = full_bag();
        bag.insert("areaLat".into(), Value::String("37.1".into()));
        assert!(Area::from_fields("id", &bag).is_none());

        let mut bag = full_bag();
        bag.insert("name".into(), json!(42));
        assert!(Area::from_fields("id", &bag).is_none());
    }

    #[test]
    fn test_from_fields_optional_defaults() {
        let bag = json!({
            "name": "A",
            "description": "B",
            "areaLat": 1.0,
            "areaLng": 2.0,
        })
        .as_object()
        .unwrap()
        .clone();

        let area = Area::from_fields("id", &bag).unwrap();
        assert_eq!(area.image_url, None);
        assert_eq!(area.category, Category::Unknown);
        assert!(area.environment_tags.is_empty());
        assert!(area.type_tags.is_empty());
        assert!(area.facility_tags.is_empty());
        assert_eq!(area.upload_user, "");
    }

    #[test]
    fn test_empty_image_url_is_absent() {
        let mut bag = full_bag();
        bag.insert("imageURL".into(), Value::String(String::new()));
        let area = Area::from_fields("id", &bag).unwrap();
        assert_eq!(area.image_url, None);
    }

    #[test]
    fn test_fields_roundtrip() {
        let area = Area::from_fields("37.123456789_127.123456789", &full_bag()).unwrap();
        let bag = area.to_fields();
        let reparsed = Area::from_fields("37.123456789_127.123456789", &bag).unwrap();
        assert_eq!(area, reparsed);
    }

    #[test]
    fn test_distance() {
        // Seoul City Hall to Gwanghwamun is roughly 1.1km.
        let area = Area::new("A", "B", 37.5663, 126.9779);
        let d = area.distance_m(37.5759, 126.9769);
        assert!((900.0..1400.0).contains(&d), "distance was {d}");

        assert!(area.distance_m(37.5663, 126.9779) < 1.0);
    }

    #[test]
    fn test_display() {
        let area = Area::new("강남역", "설명", 37.0, 127.0)
            .with_category(Category::Water)
            .with_upload_user("me@example.com");
        let out = format!("{}", area);
        assert!(out.contains("강남역"));
        assert!(out.contains("물"));
        assert!(out.contains("me@example.com"));
    }
}
