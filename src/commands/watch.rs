//! Live map view on the console.
//!
//! Subscribes to the area collection and drives the reconciliation
//! controller against a console map surface: marker placements,
//! removals, camera moves, and panel transitions are printed as the
//! change stream delivers them.

use clap::Args;
use std::collections::HashMap;

use whereizit_core::{Area, AreaSync, MapSurface, MarkerHandle, UiEvent, AREAS_COLLECTION};

use crate::client::StoreClient;

#[derive(Args)]
pub struct WatchCommand {}

/// Map surface that renders to stdout.
#[derive(Default)]
struct ConsoleMap {
    next_handle: MarkerHandle,
    labels: HashMap<MarkerHandle, String>,
}

impl MapSurface for ConsoleMap {
    fn add_marker(&mut self, area: &Area) -> MarkerHandle {
        self.next_handle += 1;
        let label = format!(
            "{} {} ({:.6}, {:.6})",
            area.category.badge_emoji(),
            area.name,
            area.area_lat,
            area.area_lng
        );
        println!("+ marker [{}] {}", area.category.marker_icon(), label);
        self.labels.insert(self.next_handle, label);
        self.next_handle
    }

    fn remove_marker(&mut self, handle: MarkerHandle) {
        if let Some(label) = self.labels.remove(&handle) {
            println!("- marker {}", label);
        }
    }

    fn move_camera(&mut self, lat: f64, lng: f64, eased: bool) {
        let style = if eased { "eased" } else { "jump" };
        println!("~ camera -> ({lat:.6}, {lng:.6}) [{style}]");
    }
}

impl WatchCommand {
    pub async fn run(&self, client: &StoreClient) -> Result<(), Box<dyn std::error::Error>> {
        let mut batches = client.subscribe(AREAS_COLLECTION).await?;
        let (mut sync, mut events) = AreaSync::new(ConsoleMap::default());

        println!("Watching {} (Ctrl+C to stop)...", AREAS_COLLECTION);

        loop {
            tokio::select! {
                batch = batches.recv() => {
                    let Some(batch) = batch else {
                        println!("Subscription closed by server");
                        break;
                    };
                    sync.apply_batch(&batch);
                    // Drain the UI events produced by this batch.
                    while let Ok(event) = events.try_recv() {
                        match event {
                            UiEvent::DetailPresented(area) => {
                                println!("* detail panel: {}", area.name);
                            }
                            UiEvent::PanelsReset => {
                                println!("* panels reset to nearby list");
                            }
                        }
                    }
                    println!("= {} marker(s) on the map", sync.marker_count());
                }
                _ = tokio::signal::ctrl_c() => {
                    println!("Stopping");
                    break;
                }
            }
        }

        Ok(())
    }
}
