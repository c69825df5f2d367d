use std::path::Path;
use console::style;
use tracing::warn;

use crate::checkpoint::{CheckpointBackend, GitCheckpointBackend};
use crate::cli::commands::{CheckpointsAction, CheckpointsArgs};
use crate::errors::ConclaveError;

pub async fn handle_checkpoints(args: CheckpointsArgs) -> Result<(), ConclaveError> {
    let backend = GitCheckpointBackend::new(&args.working_dir);

    match args.action {
        CheckpointsAction::List { session } => {
            let checkpoints = backend.list(&session).await?;
            if checkpoints.is_empty() {
                println!("No checkpoints for session {}", session);
                return Ok(());
            }
            for cp in checkpoints {
                println!(
                    "  {} #{} {} ({})",
                    style(&cp.id[..12.min(cp.id.len())]).cyan(),
                    cp.ordinal,
                    cp.label,
                    cp.created_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        CheckpointsAction::Tag { id, name } => {
            backend.tag(&id, &name).await?;
            println!("Tagged {} as {}", id, style(&name).green());
        }
        CheckpointsAction::Restore { id } => {
            if let Some(warning) = GitCheckpointBackend::check_clean(Path::new(&args.working_dir)) {
                warn!("{}", warning);
            }
            let restored = backend.restore(&id).await?;
            println!(
                "{} {} (#{} {})",
                style("Restored to checkpoint").green().bold(),
                restored.id,
                restored.ordinal,
                restored.label
            );
        }
    }
    Ok(())
}
