//! Live area synchronization and map-marker reconciliation.
//!
//! [`AreaSync`] keeps a one-to-one mapping from remote document identity
//! to an on-screen marker, consistent with the change stream delivered by
//! the store subscription. The mapping is built from scratch by the
//! snapshot batch at subscription start and mutated incrementally after
//! that.
//!
//! All mutation happens through `&mut self` on a single consumer task;
//! moving reconciliation onto another thread requires adding
//! synchronization that this type deliberately does not carry.

use std::collections::HashMap;
use tokio::sync::mpsc;

use crate::models::Area;
use crate::store::{ChangeBatch, ChangeKind, DocumentChange};

/// Opaque handle to a marker placed on a map surface.
pub type MarkerHandle = u64;

/// The map the controller places markers on.
///
/// `add_marker` picks the icon from the area's category and registers the
/// tap callback; `remove_marker` must fully detach the visual.
pub trait MapSurface {
    fn add_marker(&mut self, area: &Area) -> MarkerHandle;
    fn remove_marker(&mut self, handle: MarkerHandle);
    fn move_camera(&mut self, lat: f64, lng: f64, eased: bool);
}

/// UI updates emitted by the controller, consumed on the owner's task.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    /// Show the detail panel for an area (tapped marker or list row).
    DetailPresented(Area),
    /// Hide the detail panel and restore the nearby-list panel to its
    /// resting position.
    PanelsReset,
}

/// Reconciles the remote area collection against on-screen markers.
pub struct AreaSync<M: MapSurface> {
    surface: M,
    markers: HashMap<String, MarkerHandle>,
    events: mpsc::UnboundedSender<UiEvent>,
}

impl<M: MapSurface> AreaSync<M> {
    /// Creates a controller over `surface`. The returned receiver yields
    /// the controller's UI events; dropping it silently disables them.
    pub fn new(surface: M) -> (Self, mpsc::UnboundedReceiver<UiEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        (
            Self {
                surface,
                markers: HashMap::new(),
                events,
            },
            receiver,
        )
    }

    /// Applies one delivered change batch, record by record, in order.
    ///
    /// Records that fail to parse are skipped without surfacing an error;
    /// the skip is logged so the loss is at least observable.
    pub fn apply_batch(&mut self, batch: &ChangeBatch) {
        for change in batch {
            self.apply_change(change);
        }
    }

    fn apply_change(&mut self, change: &DocumentChange) {
        let Some(area) = Area::from_fields(&change.document_id, &change.fields) else {
            tracing::warn!(
                document_id = %change.document_id,
                kind = ?change.kind,
                "skipping malformed area document"
            );
            return;
        };

        match change.kind {
            ChangeKind::Added => {
                // A repeated `added` for a live ID replaces the marker;
                // the old one must leave the surface first or it leaks.
                if let Some(old) = self.markers.remove(&change.document_id) {
                    self.surface.remove_marker(old);
                }
                let handle = self.surface.add_marker(&area);
                self.markers.insert(change.document_id.clone(), handle);
            }
            ChangeKind::Modified => {
                // Unknown IDs are a no-op; the store is authoritative.
                if let Some(old) = self.markers.remove(&change.document_id) {
                    self.surface.remove_marker(old);
                    let handle = self.surface.add_marker(&area);
                    self.markers.insert(change.document_id.clone(), handle);
                    self.reset_panels();
                }
            }
            ChangeKind::Removed => {
                if let Some(old) = self.markers.remove(&change.document_id) {
                    self.surface.remove_marker(old);
                    self.reset_panels();
                }
            }
        }
    }

    /// A marker's tap callback fired: present the detail panel and ease
    /// the camera onto the area.
    pub fn marker_tapped(&mut self, area: &Area) {
        self.surface
            .move_camera(area.area_lat, area.area_lng, true);
        let _ = self.events.send(UiEvent::DetailPresented(area.clone()));
    }

    /// The user tapped empty map background: back to the resting state.
    pub fn map_background_tapped(&mut self) {
        self.reset_panels();
    }

    /// Detaches every marker and clears the mapping.
    pub fn clear(&mut self) {
        for (_, handle) in self.markers.drain() {
            self.surface.remove_marker(handle);
        }
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    pub fn contains(&self, document_id: &str) -> bool {
        self.markers.contains_key(document_id)
    }

    pub fn surface(&self) -> &M {
        &self.surface
    }

    fn reset_panels(&mut self) {
        let _ = self.events.send(UiEvent::PanelsReset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map, Value};
    use std::collections::HashSet;

    /// Surface that tracks which handles are currently attached.
    #[derive(Default)]
    struct MockMap {
        next_handle: MarkerHandle,
        live: HashSet<MarkerHandle>,
        added: usize,
        removed: usize,
        camera: Option<(f64, f64, bool)>,
    }

    impl MapSurface for MockMap {
        fn add_marker(&mut self, _area: &Area) -> MarkerHandle {
            self.next_handle += 1;
            self.live.insert(self.next_handle);
            self.added += 1;
            self.next_handle
        }

        fn remove_marker(&mut self, handle: MarkerHandle) {
            assert!(self.live.remove(&handle), "detaching unknown marker");
            self.removed += 1;
        }

        fn move_camera(&mut self, lat: f64, lng: f64, eased: bool) {
            self.camera = Some((lat, lng, eased));
        }
    }

    fn area_fields(name: &str) -> Map<String, Value> {
        json!({
            "name": name,
            "description": "설명",
            "areaLat": 37.5,
            "areaLng": 127.0,
            "category": "흡연구역",
        })
        .as_object()
        .unwrap()
        .clone()
    }

    fn controller() -> (AreaSync<MockMap>, mpsc::UnboundedReceiver<UiEvent>) {
        AreaSync::new(MockMap::default())
    }

    #[test]
    fn test_batch_yields_net_added_set() {
        let (mut sync, _events) = controller();
        let batch = vec![
            DocumentChange::added("a", area_fields("A")),
            DocumentChange::added("b", area_fields("B")),
            DocumentChange::added("c", area_fields("C")),
            DocumentChange::removed("b", area_fields("B")),
        ];
        sync.apply_batch(&batch);

        assert_eq!(sync.marker_count(), 2);
        assert!(sync.contains("a"));
        assert!(!sync.contains("b"));
        assert!(sync.contains("c"));
        assert_eq!(sync.surface().live.len(), 2);
    }

    #[test]
    fn test_added_then_removed_across_batches() {
        let (mut sync, _events) = controller();
        sync.apply_batch(&vec![DocumentChange::added("a", area_fields("A"))]);
        sync.apply_batch(&vec![DocumentChange::removed("a", area_fields("A"))]);

        assert_eq!(sync.marker_count(), 0);
        assert!(sync.surface().live.is_empty());
    }

    #[test]
    fn test_modified_unknown_id_is_noop() {
        let (mut sync, mut events) = controller();
        sync.apply_batch(&vec![DocumentChange::modified("ghost", area_fields("G"))]);

        assert_eq!(sync.marker_count(), 0);
        assert_eq!(sync.surface().added, 0);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_removed_unknown_id_is_noop() {
        let (mut sync, _events) = controller();
        sync.apply_batch(&vec![DocumentChange::removed("ghost", area_fields("G"))]);
        assert_eq!(sync.surface().removed, 0);
    }

    #[test]
    fn test_malformed_record_is_skipped() {
        let (mut sync, _events) = controller();
        let mut bad = area_fields("A");
        bad.remove("areaLat");
        sync.apply_batch(&vec![
            DocumentChange::added("bad", bad),
            DocumentChange::added("good", area_fields("B")),
        ]);

        assert_eq!(sync.marker_count(), 1);
        assert!(sync.contains("good"));
        assert!(!sync.contains("bad"));
    }

    #[test]
    fn test_duplicate_added_leaves_single_marker() {
        let (mut sync, _events) = controller();
        let change = DocumentChange::added("a", area_fields("A"));
        sync.apply_batch(&vec![change.clone()]);
        sync.apply_batch(&vec![change]);

        assert_eq!(sync.marker_count(), 1);
        // The first marker was detached before the replacement landed.
        assert_eq!(sync.surface().live.len(), 1);
        assert_eq!(sync.surface().added, 2);
        assert_eq!(sync.surface().removed, 1);
    }

    #[test]
    fn test_replay_is_idempotent() {
        let batch = vec![
            DocumentChange::added("a", area_fields("A")),
            DocumentChange::added("b", area_fields("B")),
            DocumentChange::modified("a", area_fields("A2")),
            DocumentChange::removed("b", area_fields("B")),
        ];

        let (mut sync, _events) = controller();
        sync.apply_batch(&batch);
        let first: HashSet<String> = ["a".to_string()].into();
        assert!(first.iter().all(|id| sync.contains(id)));
        assert_eq!(sync.marker_count(), 1);

        sync.apply_batch(&batch);
        assert_eq!(sync.marker_count(), 1);
        assert!(sync.contains("a"));
        assert_eq!(sync.surface().live.len(), 1);
    }

    #[test]
    fn test_modified_resets_panels() {
        let (mut sync, mut events) = controller();
        sync.apply_batch(&vec![DocumentChange::added("a", area_fields("A"))]);
        sync.apply_batch(&vec![DocumentChange::modified("a", area_fields("A2"))]);

        assert_eq!(events.try_recv().unwrap(), UiEvent::PanelsReset);
    }

    #[test]
    fn test_marker_tapped_presents_detail_and_moves_camera() {
        let (mut sync, mut events) = controller();
        let area = Area::from_fields("a", &area_fields("A")).unwrap();
        sync.marker_tapped(&area);

        assert_eq!(sync.surface().camera, Some((37.5, 127.0, true)));
        match events.try_recv().unwrap() {
            UiEvent::DetailPresented(presented) => assert_eq!(presented.name, "A"),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_background_tap_resets_panels() {
        let (mut sync, mut events) = controller();
        sync.map_background_tapped();
        assert_eq!(events.try_recv().unwrap(), UiEvent::PanelsReset);
    }

    #[test]
    fn test_events_receiver_dropped_does_not_panic() {
        let (mut sync, events) = controller();
        drop(events);
        sync.apply_batch(&vec![DocumentChange::added("a", area_fields("A"))]);
        sync.apply_batch(&vec![DocumentChange::removed("a", area_fields("A"))]);
        sync.map_background_tapped();
    }

    #[test]
    fn test_clear_detaches_everything() {
        let (mut sync, _events) = controller();
        sync.apply_batch(&vec![
            DocumentChange::added("a", area_fields("A")),
            DocumentChange::added("b", area_fields("B")),
        ]);
        sync.clear();

        assert_eq!(sync.marker_count(), 0);
        assert!(sync.surface().live.is_empty());
    }
}
