use clap::Args;

use whereizit_core::{Report, REPORTS_COLLECTION, REPORT_REASONS};

use crate::client::StoreClient;
use crate::config::Config;

use super::area::{fetch_area, require_session};

#[derive(Args)]
pub struct ReportCommand {
    /// Document ID of the area being reported
    #[arg(required_unless_present = "reasons")]
    pub area_id: Option<String>,

    /// Canned reason number (see --reasons)
    #[arg(long, conflicts_with = "custom")]
    pub reason: Option<usize>,

    /// Free-form reason
    #[arg(long)]
    pub custom: Option<String>,

    /// List the canned report reasons
    #[arg(long)]
    pub reasons: bool,
}

impl ReportCommand {
    pub async fn run(
        &self,
        client: &StoreClient,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if self.reasons {
            for (i, reason) in REPORT_REASONS.iter().enumerate() {
                println!("{}. {}", i + 1, reason);
            }
            return Ok(());
        }

        let area_id = self.area_id.as_deref().expect("required by clap");
        let session = require_session(client, config).await?;
        let area = fetch_area(client, area_id).await?;

        let reason = match (self.reason, &self.custom) {
            (Some(n), _) => REPORT_REASONS
                .get(n.checked_sub(1).unwrap_or(usize::MAX))
                .ok_or_else(|| {
                    format!("reason must be between 1 and {}", REPORT_REASONS.len())
                })?
                .to_string(),
            (None, Some(custom)) => custom.clone(),
            (None, None) => String::new(),
        };

        let reported_by = session.email().unwrap_or("unknown");
        let report = Report::new(&area, reported_by, reason);

        match client
            .create_document(REPORTS_COLLECTION, &report.to_fields())
            .await
        {
            Ok(_) => {
                println!("Report submitted; it will be reviewed.");
                Ok(())
            }
            Err(e) => {
                tracing::error!("report submission failed: {}", e);
                Err("failed to submit the report".into())
            }
        }
    }
}
