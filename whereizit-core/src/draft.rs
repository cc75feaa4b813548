//! The area save flow.
//!
//! An [`AreaDraft`] mirrors the registration form's state machine:
//! name/description text, a single selectable category (selecting the
//! current one deselects it, and any change clears the tag sets), tag
//! toggles per axis, and an optional just-uploaded photo URL. `submit`
//! validates the draft and produces the [`Area`] to upsert; it never
//! performs the write itself.

use chrono::Utc;
use std::collections::BTreeSet;
use thiserror::Error;

use crate::category::Category;
use crate::document_id::derive_document_id;
use crate::models::Area;
use crate::session::Session;
use crate::tags::{vocabulary, TagAxis};

/// Hint text of the description field. A description equal to this is
/// treated as unset: it means the user never replaced the placeholder.
pub const DESCRIPTION_PLACEHOLDER: &str = "우측으로 5m";

/// Creator recorded when submitting without a signed-in principal.
const UNKNOWN_USER: &str = "Unknown";

/// Whether the draft creates a new area or edits an existing one.
#[derive(Debug, Clone)]
pub enum DraftMode {
    New { lat: f64, lng: f64 },
    Edit { area: Area },
}

/// Validation failure for a draft submission.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DraftError {
    #[error("required fields missing: {}", missing.join(", "))]
    Incomplete { missing: Vec<&'static str> },
}

/// A user-entered area draft.
#[derive(Debug, Clone)]
pub struct AreaDraft {
    mode: DraftMode,
    name: String,
    description: String,
    category: Option<Category>,
    environment_tags: BTreeSet<String>,
    type_tags: BTreeSet<String>,
    facility_tags: BTreeSet<String>,
    uploaded_image_url: Option<String>,
}

impl AreaDraft {
    /// Starts a draft for a new area pinned at the given coordinates.
    pub fn new(lat: f64, lng: f64) -> Self {
        Self {
            mode: DraftMode::New { lat, lng },
            name: String::new(),
            description: String::new(),
            category: None,
            environment_tags: BTreeSet::new(),
            type_tags: BTreeSet::new(),
            facility_tags: BTreeSet::new(),
            uploaded_image_url: None,
        }
    }

    /// Starts a draft prefilled from an existing area.
    pub fn edit(area: Area) -> Self {
        let category = area.category.is_known().then_some(area.category);
        Self {
            name: area.name.clone(),
            description: area.description.clone(),
            category,
            environment_tags: area.environment_tags.clone(),
            type_tags: area.type_tags.clone(),
            facility_tags: area.facility_tags.clone(),
            uploaded_image_url: None,
            mode: DraftMode::Edit { area },
        }
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    /// Selects a category. Re-selecting the current category deselects
    /// it. Any change clears all three tag sets; stale tags never carry
    /// over between categories.
    pub fn select_category(&mut self, category: Category) {
        if !category.is_known() || self.category == Some(category) {
            self.category = None;
        } else {
            self.category = Some(category);
        }
        self.environment_tags.clear();
        self.type_tags.clear();
        self.facility_tags.clear();
    }

    pub fn category(&self) -> Option<Category> {
        self.category
    }

    /// The tags selectable on `axis` for the current category.
    pub fn allowed_tags(&self, axis: TagAxis) -> &'static [&'static str] {
        match self.category {
            Some(category) => vocabulary(category, axis),
            None => &[],
        }
    }

    /// Toggles a tag on the given axis. Returns `true` if the tag is now
    /// selected.
    pub fn toggle_tag(&mut self, axis: TagAxis, tag: impl Into<String>) -> bool {
        let tag = tag.into();
        let set = self.tags_mut(axis);
        if set.remove(&tag) {
            false
        } else {
            set.insert(tag);
            true
        }
    }

    pub fn tags(&self, axis: TagAxis) -> &BTreeSet<String> {
        match axis {
            TagAxis::Environment => &self.environment_tags,
            TagAxis::Type => &self.type_tags,
            TagAxis::Facility => &self.facility_tags,
        }
    }

    fn tags_mut(&mut self, axis: TagAxis) -> &mut BTreeSet<String> {
        match axis {
            TagAxis::Environment => &mut self.environment_tags,
            TagAxis::Type => &mut self.type_tags,
            TagAxis::Facility => &mut self.facility_tags,
        }
    }

    /// Records the URL of a photo uploaded during this draft.
    pub fn attach_uploaded_image(&mut self, url: impl Into<String>) {
        self.uploaded_image_url = Some(url.into());
    }

    /// Image URL carried over from the area being edited, if any.
    pub fn stored_image_url(&self) -> Option<&str> {
        match &self.mode {
            DraftMode::Edit { area } => area.image_url.as_deref(),
            DraftMode::New { .. } => None,
        }
    }

    /// Resolution order: just-uploaded URL, then the previously stored
    /// URL on edits, then none.
    pub fn resolved_image_url(&self) -> Option<&str> {
        self.uploaded_image_url
            .as_deref()
            .or_else(|| self.stored_image_url())
    }

    /// The blob made obsolete by this draft: the previously stored image
    /// when a new one was uploaded over it. The caller deletes it after a
    /// successful submit.
    pub fn replaced_image_url(&self) -> Option<&str> {
        let uploaded = self.uploaded_image_url.as_deref()?;
        self.stored_image_url().filter(|old| *old != uploaded)
    }

    /// Whether all required inputs are present (the save-button gate).
    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.name.is_empty() {
            missing.push("name");
        }
        if self.description.is_empty() || self.description == DESCRIPTION_PLACEHOLDER {
            missing.push("description");
        }
        if self.category.is_none() {
            missing.push("category");
        }
        missing
    }

    /// Validates the draft and produces the area to upsert.
    ///
    /// New areas derive their document ID from the pinned coordinates and
    /// record the session's email as creator; edits preserve both. No
    /// vocabulary check is applied to the tag sets here.
    pub fn submit(&self, session: &Session) -> Result<Area, DraftError> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(DraftError::Incomplete { missing });
        }
        let category = self.category.expect("checked by missing_fields");

        let (lat, lng, document_id, upload_user) = match &self.mode {
            DraftMode::New { lat, lng } => {
                let id = derive_document_id(*lat, *lng);
                let user = session.email().unwrap_or(UNKNOWN_USER).to_string();
                (*lat, *lng, Some(id), user)
            }
            DraftMode::Edit { area } => (
                area.area_lat,
                area.area_lng,
                area.document_id.clone(),
                area.upload_user.clone(),
            ),
        };

        Ok(Area {
            document_id,
            image_url: self.resolved_image_url().map(str::to_string),
            name: self.name.clone(),
            description: self.description.clone(),
            area_lat: lat,
            area_lng: lng,
            category,
            environment_tags: self.environment_tags.clone(),
            type_tags: self.type_tags.clone(),
            facility_tags: self.facility_tags.clone(),
            upload_user,
            upload_date: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Principal;

    fn session() -> Session {
        Session::authenticated(Principal {
            uid: "uid-1".into(),
            email: "me@example.com".into(),
            display_name: None,
            photo_url: None,
        })
    }

    fn complete_draft() -> AreaDraft {
        let mut draft = AreaDraft::new(37.123456789, 127.123456789);
        draft.set_name("강남역 11번 출구");
        draft.set_description("골목 안쪽");
        draft.select_category(Category::SmokingArea);
        draft
    }

    #[test]
    fn test_empty_name_fails() {
        let mut draft = complete_draft();
        draft.set_name("");
        let err = draft.submit(&session()).unwrap_err();
        assert_eq!(
            err,
            DraftError::Incomplete {
                missing: vec!["name"]
            }
        );
    }

    #[test]
    fn test_placeholder_description_fails() {
        let mut draft = complete_draft();
        draft.set_description(DESCRIPTION_PLACEHOLDER);
        let err = draft.submit(&session()).unwrap_err();
        assert_eq!(
            err,
            DraftError::Incomplete {
                missing: vec!["description"]
            }
        );
    }

    #[test]
    fn test_missing_category_fails() {
        let mut draft = complete_draft();
        draft.select_category(Category::SmokingArea); // deselect
        assert!(!draft.is_complete());
        let err = draft.submit(&session()).unwrap_err();
        assert_eq!(
            err,
            DraftError::Incomplete {
                missing: vec!["category"]
            }
        );
    }

    #[test]
    fn test_submit_derives_document_id() {
        let area = complete_draft().submit(&session()).unwrap();
        assert_eq!(
            area.document_id.as_deref(),
            Some("37.123456789_127.123456789")
        );
        assert_eq!(area.upload_user, "me@example.com");
        assert_eq!(area.category, Category::SmokingArea);
    }

    #[test]
    fn test_submit_anonymous_records_unknown_user() {
        let area = complete_draft().submit(&Session::anonymous()).unwrap();
        assert_eq!(area.upload_user, "Unknown");
    }

    #[test]
    fn test_category_change_clears_tags() {
        let mut draft = complete_draft();
        draft.toggle_tag(TagAxis::Environment, "실외");
        draft.toggle_tag(TagAxis::Type, "카페");
        assert_eq!(draft.tags(TagAxis::Environment).len(), 1);

        draft.select_category(Category::Restroom);
        for axis in TagAxis::ALL {
            assert!(draft.tags(axis).is_empty(), "{:?} not cleared", axis);
        }
    }

    #[test]
    fn test_toggle_tag() {
        let mut draft = complete_draft();
        assert!(draft.toggle_tag(TagAxis::Facility, "의자"));
        assert!(!draft.toggle_tag(TagAxis::Facility, "의자"));
        assert!(draft.tags(TagAxis::Facility).is_empty());
    }

    #[test]
    fn test_edit_preserves_identity() {
        let area = Area::new("이름", "설명", 37.0, 127.0)
            .with_document_id("37.000000000_127.000000000")
            .with_category(Category::Water)
            .with_upload_user("creator@example.com");
        let draft = AreaDraft::edit(area);

        let submitted = draft.submit(&session()).unwrap();
        assert_eq!(
            submitted.document_id.as_deref(),
            Some("37.000000000_127.000000000")
        );
        // Editing never reassigns the creator.
        assert_eq!(submitted.upload_user, "creator@example.com");
    }

    #[test]
    fn test_image_url_precedence() {
        let area = Area::new("이름", "설명", 37.0, 127.0)
            .with_category(Category::Water)
            .with_image_url("https://example.com/old.jpg");
        let mut draft = AreaDraft::edit(area);

        assert_eq!(
            draft.resolved_image_url(),
            Some("https://example.com/old.jpg")
        );
        assert_eq!(draft.replaced_image_url(), None);

        draft.attach_uploaded_image("https://example.com/new.jpg");
        assert_eq!(
            draft.resolved_image_url(),
            Some("https://example.com/new.jpg")
        );
        assert_eq!(
            draft.replaced_image_url(),
            Some("https://example.com/old.jpg")
        );
    }

    #[test]
    fn test_new_draft_has_no_image() {
        let draft = complete_draft();
        assert_eq!(draft.resolved_image_url(), None);
        assert_eq!(draft.replaced_image_url(), None);
    }

    #[test]
    fn test_allowed_tags_follow_category() {
        let mut draft = complete_draft();
        assert!(draft.allowed_tags(TagAxis::Facility).contains(&"라이터"));
        draft.select_category(Category::SmokingArea); // deselect
        assert!(draft.allowed_tags(TagAxis::Facility).is_empty());
    }
}
