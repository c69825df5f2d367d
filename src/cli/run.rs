use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::cli::commands::RunArgs;
use crate::config::{parse_config, ConclaveConfig};
use crate::consensus::{ConsensusAggregator, ConsensusGate};
use crate::errors::ConclaveError;
use crate::executor::ScriptedExecutor;
use crate::models::task::Task;
use crate::models::vote::Decision;
use crate::models::worker::WorkerRegistration;
use crate::notify::WebhookNotifier;
use crate::orchestrator::{EventBus, Mode, OrchestrationController, OrchestratorEvent};
use crate::pool::{AgentPool, SelectionWeighting};

pub async fn handle_run(args: RunArgs) -> Result<(), ConclaveError> {
    let config = parse_config(Path::new(&args.config)).await?;

    let mode = match &args.mode {
        Some(raw) => raw.parse::<Mode>().map_err(ConclaveError::Config)?,
        None => config
            .orchestration
            .as_ref()
            .and_then(|o| o.mode)
            .unwrap_or(Mode::Sequential),
    };

    let pool = build_pool(&config, args.dry_run).await?;
    let controller = build_controller(&config, pool.clone());
    attach_webhook(&config, &controller.events());

    let tasks = tasks_from(&config);
    if tasks.is_empty() {
        return Err(ConclaveError::Config("no tasks defined in configuration".into()));
    }

    let bar = progress_bar(tasks.len() as u64, &controller.events());

    let outcome = controller.execute(tasks, mode).await?;
    bar.finish_and_clear();

    if args.json {
        let report = serde_json::json!({
            "mode": mode,
            "results": outcome.results,
            "errors": outcome.errors,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "{} {} completed, {} failed ({} mode)",
        style("Batch finished:").bold(),
        style(outcome.results.len()).green(),
        style(outcome.errors.len()).red(),
        mode
    );
    for result in &outcome.results {
        println!(
            "  {} {} via {} in {}ms",
            style("ok").green(),
            result.task_id,
            result.worker_id,
            result.duration_ms
        );
    }
    for error in &outcome.errors {
        println!(
            "  {} {} {}",
            style("err").red(),
            error.task_id,
            style(&error.error).dim()
        );
    }
    Ok(())
}

/// Build the worker pool from configuration.
///
/// Executor transports are embedder-provided; this binary only carries
/// the canned dry-run executor, so a live run must come through the
/// library API.
pub(crate) async fn build_pool(
    config: &ConclaveConfig,
    dry_run: bool,
) -> Result<Arc<AgentPool>, ConclaveError> {
    if !dry_run {
        return Err(ConclaveError::Config(
            "no executor transport is built into this binary; pass --dry-run or embed conclave as a library".into(),
        ));
    }

    let specs = config
        .pool
        .as_ref()
        .map(|p| p.workers.as_slice())
        .unwrap_or_default();
    if specs.is_empty() {
        return Err(ConclaveError::Config("no workers defined in configuration".into()));
    }

    let pool = Arc::new(AgentPool::new());
    for (index, spec) in specs.iter().enumerate() {
        let mut registration = WorkerRegistration::new(
            &spec.id,
            spec.name.clone().unwrap_or_else(|| spec.id.clone()),
            spec.role,
        );
        if let Some(tags) = &spec.tags {
            registration = registration.with_tags(tags.clone());
        }
        if let Some(priority) = spec.priority {
            registration = registration.with_priority(priority);
        }
        if let Some(max_concurrency) = spec.max_concurrency {
            registration = registration.with_max_concurrency(max_concurrency);
        }

        // Scripted ballots with a dissenting tail, so dry-run rounds
        // exercise disagreement instead of a unanimous rubber stamp.
        let decision = if index % 3 == 2 { Decision::Hold } else { Decision::Proceed };
        let confidence = 0.9 - 0.1 * (index % 3) as f64;
        let executor = Arc::new(ScriptedExecutor::ballot(&spec.id, decision, confidence));
        pool.register(registration, executor).await?;
    }
    Ok(pool)
}

pub(crate) fn build_controller(
    config: &ConclaveConfig,
    pool: Arc<AgentPool>,
) -> OrchestrationController {
    let mut aggregator = ConsensusAggregator::new();
    if let Some(pool_config) = &config.pool {
        for spec in &pool_config.workers {
            if let Some(weight) = spec.weight {
                aggregator.set_weight(&spec.id, weight);
            }
        }
    }

    let orchestration = config.orchestration.clone().unwrap_or_default();
    let weighting = SelectionWeighting {
        cost_averse: orchestration.cost_averse.unwrap_or(false),
        favor_reliability: orchestration.favor_reliability.unwrap_or(false),
        latency_averse: orchestration.latency_averse.unwrap_or(false),
    };

    let mut controller = OrchestrationController::new(pool)
        .with_aggregator(aggregator)
        .with_weighting(weighting);
    if let Some(max_workers) = orchestration.max_workers {
        controller = controller.with_max_workers(max_workers);
    }
    controller
}

pub(crate) fn gate_from(config: &ConclaveConfig) -> ConsensusGate {
    let defaults = ConsensusGate::default();
    let consensus = config.consensus.clone().unwrap_or_default();
    ConsensusGate {
        min_agreement: consensus.min_agreement.unwrap_or(defaults.min_agreement),
        min_confidence: consensus.min_confidence.unwrap_or(defaults.min_confidence),
    }
}

pub(crate) fn attach_webhook(config: &ConclaveConfig, events: &EventBus) {
    if let Some(url) = config
        .notifications
        .as_ref()
        .and_then(|n| n.webhook_url.clone())
    {
        Arc::new(WebhookNotifier::new(url)).attach(events);
    }
}

fn tasks_from(config: &ConclaveConfig) -> Vec<Task> {
    let default_timeout = config
        .orchestration
        .as_ref()
        .and_then(|o| o.task_timeout_ms)
        .unwrap_or(60_000);

    config
        .tasks
        .iter()
        .map(|spec| {
            let mut task = Task::new(
                spec.kind,
                match spec.kind {
                    crate::models::task::TaskKind::Decision => {
                        crate::models::task::TaskPayload::Decide { prompt: spec.prompt.clone() }
                    }
                    crate::models::task::TaskKind::Job => {
                        crate::models::task::TaskPayload::Run { instruction: spec.prompt.clone() }
                    }
                },
            );
            if let Some(role) = spec.role {
                task = task.with_role(role);
            }
            if let Some(tags) = &spec.tags {
                task = task.with_tags(tags.clone());
            }
            if let Some(priority) = spec.priority {
                task = task.with_priority(priority);
            }
            task.with_timeout(Duration::from_millis(spec.timeout_ms.unwrap_or(default_timeout)))
        })
        .collect()
}

fn progress_bar(total: u64, events: &EventBus) -> ProgressBar {
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("  {bar:30.cyan/dark_gray} {pos}/{len} tasks | {msg}")
            .unwrap()
            .progress_chars("█▓░"),
    );

    let (_, mut rx) = events.subscribe();
    let bar_handle = bar.clone();
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                OrchestratorEvent::TaskCompleted { worker_id, .. } => {
                    bar_handle.set_message(format!("last: {}", worker_id));
                    bar_handle.inc(1);
                }
                OrchestratorEvent::TaskFailed { .. } => bar_handle.inc(1),
                _ => {}
            }
        }
    });
    bar
}
