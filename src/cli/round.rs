use std::path::Path;
use std::time::Duration;
use console::style;

use crate::cli::commands::RoundArgs;
use crate::config::parse_config;
use crate::errors::ConclaveError;
use crate::models::vote::Decision;
use crate::orchestrator::RoundOptions;
use super::run::{attach_webhook, build_controller, build_pool, gate_from};

pub async fn handle_round(args: RoundArgs) -> Result<(), ConclaveError> {
    let config = parse_config(Path::new(&args.config)).await?;
    let pool = build_pool(&config, args.dry_run).await?;
    let controller = build_controller(&config, pool);
    attach_webhook(&config, &controller.events());

    let options = RoundOptions {
        timeout: Duration::from_millis(args.timeout_ms),
        required_role: None,
    };
    let result = controller.run_round(&args.prompt, options).await;
    let gate = gate_from(&config);
    let actionable = gate.is_actionable(&result);

    if args.json {
        let report = serde_json::json!({
            "result": result,
            "actionable": actionable,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let decision = match result.decision {
        Decision::Proceed => style(result.decision.as_str()).green(),
        Decision::Reject => style(result.decision.as_str()).red(),
        _ => style(result.decision.as_str()).yellow(),
    };
    println!(
        "{} {} (agreement {:.0}%, confidence {:.0}%)",
        style("Decision:").bold(),
        decision.bold(),
        result.agreement * 100.0,
        result.confidence * 100.0
    );
    for vote in &result.votes {
        let marker = if vote.is_errored() {
            style("!").red()
        } else if vote.decision == result.decision {
            style("●").green()
        } else {
            style("○").yellow()
        };
        println!(
            "  {} {} voted {} ({:.2}) in {}ms{}",
            marker,
            vote.worker_id,
            vote.decision,
            vote.confidence,
            vote.latency_ms,
            vote.error
                .as_deref()
                .map(|e| format!(" ({})", e))
                .unwrap_or_default()
        );
    }
    println!(
        "{}",
        if actionable {
            style("Result clears the actionability gate").green()
        } else {
            style("Result below the actionability gate").yellow()
        }
    );
    Ok(())
}
