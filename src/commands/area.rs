use clap::{Args, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;

use whereizit_core::{Area, AreaDraft, Category, Session, TagAxis, AREAS_COLLECTION};

use crate::client::StoreClient;
use crate::config::Config;

#[derive(Args)]
pub struct AreaCommand {
    #[command(subcommand)]
    pub command: AreaSubcommand,
}

#[derive(Subcommand)]
pub enum AreaSubcommand {
    /// Register a new area
    Add {
        /// Latitude of the pin (WGS84 degrees)
        #[arg(long)]
        lat: f64,

        /// Longitude of the pin (WGS84 degrees)
        #[arg(long)]
        lng: f64,

        /// Area name
        #[arg(long)]
        name: String,

        /// Area description
        #[arg(long)]
        description: String,

        /// Category label (화장실, 쓰레기통, 물, 흡연구역)
        #[arg(long)]
        category: String,

        /// Environment tag (can be repeated)
        #[arg(long = "environment-tag", value_name = "TAG")]
        environment_tags: Vec<String>,

        /// Type tag (can be repeated)
        #[arg(long = "type-tag", value_name = "TAG")]
        type_tags: Vec<String>,

        /// Facility tag (can be repeated)
        #[arg(long = "facility-tag", value_name = "TAG")]
        facility_tags: Vec<String>,

        /// Path to a photo to upload
        #[arg(long)]
        photo: Option<PathBuf>,
    },

    /// Edit an area you created
    Edit {
        /// Document ID of the area
        id: String,

        /// New name
        #[arg(long)]
        name: Option<String>,

        /// New description
        #[arg(long)]
        description: Option<String>,

        /// New category label (clears all tags)
        #[arg(long)]
        category: Option<String>,

        /// Toggle an environment tag (can be repeated)
        #[arg(long = "environment-tag", value_name = "TAG")]
        environment_tags: Vec<String>,

        /// Toggle a type tag (can be repeated)
        #[arg(long = "type-tag", value_name = "TAG")]
        type_tags: Vec<String>,

        /// Toggle a facility tag (can be repeated)
        #[arg(long = "facility-tag", value_name = "TAG")]
        facility_tags: Vec<String>,

        /// Path to a replacement photo
        #[arg(long)]
        photo: Option<PathBuf>,
    },

    /// List all areas, nearest first when a home location is configured
    List,

    /// List areas created by the current account
    Mine,

    /// Delete an area you created
    Delete {
        /// Document ID of the area
        id: String,

        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
}

impl AreaCommand {
    pub async fn run(
        &self,
        client: &StoreClient,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            AreaSubcommand::Add {
                lat,
                lng,
                name,
                description,
                category,
                environment_tags,
                type_tags,
                facility_tags,
                photo,
            } => {
                let session = require_session(client, config).await?;

                let mut draft = AreaDraft::new(*lat, *lng);
                draft.set_name(name);
                draft.set_description(description);
                draft.select_category(parse_category(category)?);
                apply_tags(&mut draft, environment_tags, type_tags, facility_tags)?;

                if let Some(path) = photo {
                    let bytes = std::fs::read(path)?;
                    let url = client.upload_blob(&bytes).await?;
                    draft.attach_uploaded_image(url);
                }

                let area = draft.submit(&session)?;
                let id = area.document_id.clone().expect("new areas derive an ID");
                client
                    .upsert_document(AREAS_COLLECTION, &id, &area.to_fields())
                    .await?;

                println!("Registered area {}", id);
                Ok(())
            }

            AreaSubcommand::Edit {
                id,
                name,
                description,
                category,
                environment_tags,
                type_tags,
                facility_tags,
                photo,
            } => {
                let session = require_session(client, config).await?;
                let area = fetch_area(client, id).await?;

                if !session.owns(&area) {
                    return Err("only the creator can edit an area".into());
                }

                let mut draft = AreaDraft::edit(area);
                if let Some(name) = name {
                    draft.set_name(name);
                }
                if let Some(description) = description {
                    draft.set_description(description);
                }
                if let Some(category) = category {
                    let parsed = parse_category(category)?;
                    // Selecting the current category again would deselect
                    // it; --category means "set", not "toggle".
                    if draft.category() != Some(parsed) {
                        draft.select_category(parsed);
                    }
                }
                apply_tags(&mut draft, environment_tags, type_tags, facility_tags)?;

                if let Some(path) = photo {
                    let bytes = std::fs::read(path)?;
                    let url = client.upload_blob(&bytes).await?;
                    draft.attach_uploaded_image(url);
                }

                let replaced = draft.replaced_image_url().map(str::to_string);
                let area = draft.submit(&session)?;
                client
                    .upsert_document(AREAS_COLLECTION, id, &area.to_fields())
                    .await?;

                // The old photo is unreachable once the edit landed.
                if let Some(old_url) = replaced {
                    if let Err(e) = client.delete_blob(&old_url).await {
                        tracing::warn!("failed to delete replaced photo {}: {}", old_url, e);
                    }
                }

                println!("Updated area {}", id);
                Ok(())
            }

            AreaSubcommand::List => {
                let documents = client.list_documents(AREAS_COLLECTION).await?;
                let areas = parse_areas(documents);
                print_areas(areas, config);
                Ok(())
            }

            AreaSubcommand::Mine => {
                let principal = client.me().await?;
                let documents = client
                    .query_by_upload_user(AREAS_COLLECTION, &principal.email)
                    .await?;
                let areas = parse_areas(documents);
                if areas.is_empty() {
                    println!("No areas registered by {}", principal.email);
                } else {
                    print_areas(areas, config);
                }
                Ok(())
            }

            AreaSubcommand::Delete { id, force } => {
                let session = require_session(client, config).await?;
                let area = fetch_area(client, id).await?;

                if !session.owns(&area) {
                    return Err("only the creator can delete an area".into());
                }

                if !force {
                    print!("Delete area '{}'? [y/N] ", area.name);
                    io::stdout().flush()?;
                    let mut answer = String::new();
                    io::stdin().read_line(&mut answer)?;
                    if !answer.trim().eq_ignore_ascii_case("y") {
                        println!("Aborted");
                        return Ok(());
                    }
                }

                client.delete_document(AREAS_COLLECTION, id).await?;
                println!("Deleted area {}", id);
                Ok(())
            }
        }
    }
}

/// Resolves the authenticated session, or fails with a sign-in hint.
pub async fn require_session(
    client: &StoreClient,
    config: &Config,
) -> Result<Session, Box<dyn std::error::Error>> {
    if config.api_key.is_empty() {
        return Err("not signed in; run `whereizit auth register` first".into());
    }
    let principal = client.me().await?;
    Ok(Session::authenticated(principal))
}

/// Fetches and parses a stored area document.
pub async fn fetch_area(
    client: &StoreClient,
    id: &str,
) -> Result<Area, Box<dyn std::error::Error>> {
    let envelope = client
        .get_document(AREAS_COLLECTION, id)
        .await?
        .ok_or_else(|| format!("no area with ID {id}"))?;
    Area::from_fields(&envelope.id, &envelope.fields)
        .ok_or_else(|| format!("stored area {id} is malformed").into())
}

fn parse_category(label: &str) -> Result<Category, Box<dyn std::error::Error>> {
    let category = Category::parse(label);
    if category.is_known() {
        Ok(category)
    } else {
        let labels: Vec<&str> = Category::ALL.iter().map(|c| c.label()).collect();
        Err(format!("unknown category '{}'; expected one of: {}", label, labels.join(", ")).into())
    }
}

fn apply_tags(
    draft: &mut AreaDraft,
    environment_tags: &[String],
    type_tags: &[String],
    facility_tags: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let groups = [
        (TagAxis::Environment, environment_tags),
        (TagAxis::Type, type_tags),
        (TagAxis::Facility, facility_tags),
    ];
    for (axis, tags) in groups {
        for tag in tags {
            let allowed = draft.allowed_tags(axis);
            if !allowed.contains(&tag.as_str()) {
                return Err(format!(
                    "'{}' is not a {} tag for this category; expected one of: {}",
                    tag,
                    axis.title(),
                    allowed.join(", ")
                )
                .into());
            }
            draft.toggle_tag(axis, tag);
        }
    }
    Ok(())
}

fn parse_areas(documents: Vec<crate::client::DocumentEnvelope>) -> Vec<Area> {
    documents
        .into_iter()
        .filter_map(|envelope| {
            let area = Area::from_fields(&envelope.id, &envelope.fields);
            if area.is_none() {
                tracing::warn!(document_id = %envelope.id, "skipping malformed area document");
            }
            area
        })
        .collect()
}

fn print_areas(mut areas: Vec<Area>, config: &Config) {
    let home = match (config.home_lat, config.home_lng) {
        (Some(lat), Some(lng)) => Some((lat, lng)),
        _ => None,
    };

    if let Some((lat, lng)) = home {
        areas.sort_by(|a, b| {
            a.distance_m(lat, lng)
                .partial_cmp(&b.distance_m(lat, lng))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    for area in &areas {
        print!("{}", area);
        if let Some((lat, lng)) = home {
            println!("  {} away", format_distance(area.distance_m(lat, lng)));
        }
        println!();
    }
    println!("{} area(s)", areas.len());
}

fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{:.0}m", meters)
    } else {
        format!("{:.1}km", meters / 1000.0)
    }
}
