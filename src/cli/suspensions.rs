use std::sync::Arc;
use chrono::Utc;
use console::style;

use crate::cli::commands::{SuspensionsAction, SuspensionsArgs};
use crate::db::Database;
use crate::errors::ConclaveError;
use crate::suspension::{SuspensionFilter, SuspensionRegistry};

pub async fn handle_suspensions(args: SuspensionsArgs) -> Result<(), ConclaveError> {
    let db = Database::new(&args.db)?;
    let registry = SuspensionRegistry::new(Arc::new(db));

    match args.action {
        SuspensionsAction::List { pipeline, expired, limit } => {
            let filter = SuspensionFilter {
                pipeline_id: pipeline,
                expired: if expired { Some(true) } else { None },
            };
            let records = registry.query(&filter, limit)?;
            if records.is_empty() {
                println!("No suspended pipelines");
                return Ok(());
            }
            for record in records {
                let expiry = record
                    .expires_at
                    .map(|e| {
                        if e <= Utc::now() {
                            style(format!("expired {}", e.format("%Y-%m-%d %H:%M"))).red().to_string()
                        } else {
                            format!("expires {}", e.format("%Y-%m-%d %H:%M"))
                        }
                    })
                    .unwrap_or_else(|| "no expiry".into());
                println!(
                    "  {} pipeline={} step={} ({}) [{}] {}",
                    style(&record.id).cyan(),
                    record.pipeline_id,
                    record.step,
                    record.reason,
                    record.suspended_at.format("%Y-%m-%d %H:%M"),
                    expiry
                );
            }
        }
        SuspensionsAction::Count => {
            let total = registry.count()?;
            let expired = registry.count_expired(Utc::now())?;
            println!("{} suspended ({} expired)", total, expired);
        }
        SuspensionsAction::Prune => {
            let deleted = registry.delete_expired(Utc::now())?;
            println!("Deleted {} expired suspension(s)", deleted);
        }
        SuspensionsAction::Delete { id } => {
            if registry.delete(&id)? {
                println!("Deleted suspension {}", id);
            } else {
                return Err(ConclaveError::NotFound(format!("suspension {}", id)));
            }
        }
        SuspensionsAction::Resume { id, input } => {
            let input = input
                .map(|raw| serde_json::from_str(&raw))
                .transpose()?;
            let resumed = registry.resume(&id, input)?;
            println!(
                "{} pipeline={} step={}",
                style("Resumed:").green().bold(),
                resumed.pipeline_id,
                resumed.step
            );
            println!("{}", serde_json::to_string_pretty(&resumed.state)?);
            if let Some(input) = resumed.resume_input {
                println!("resume input: {}", serde_json::to_string(&input)?);
            }
        }
    }
    Ok(())
}
