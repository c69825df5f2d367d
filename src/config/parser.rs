use std::path::Path;
use crate::errors::ConclaveError;
use super::types::ConclaveConfig;

pub async fn parse_config(path: &Path) -> Result<ConclaveConfig, ConclaveError> {
    if !path.exists() {
        return Err(ConclaveError::Config(format!("Config file not found: {}", path.display())));
    }

    let metadata = tokio::fs::metadata(path).await?;
    if metadata.len() > 1_048_576 {
        return Err(ConclaveError::Config("Config file exceeds 1MB limit".into()));
    }

    let content = tokio::fs::read_to_string(path).await?;
    let config: ConclaveConfig = serde_yaml::from_str(&content)?;

    validate(&config)?;
    Ok(config)
}

/// Detect semantically unusable values in the parsed configuration.
fn validate(config: &ConclaveConfig) -> Result<(), ConclaveError> {
    if let Some(pool) = &config.pool {
        let mut seen = std::collections::HashSet::new();
        for worker in &pool.workers {
            if !seen.insert(worker.id.as_str()) {
                return Err(ConclaveError::Config(format!(
                    "Duplicate worker id '{}' in pool",
                    worker.id
                )));
            }
            if let Some(weight) = worker.weight {
                if weight < 0.0 {
                    return Err(ConclaveError::Config(format!(
                        "Worker '{}' has a negative weight",
                        worker.id
                    )));
                }
            }
            if let Some(priority) = worker.priority {
                if priority > 10 {
                    return Err(ConclaveError::Config(format!(
                        "Worker '{}' priority must be 0-10",
                        worker.id
                    )));
                }
            }
        }
    }

    if let Some(orchestration) = &config.orchestration {
        if orchestration.max_workers == Some(0) {
            return Err(ConclaveError::Config("max_workers must be >= 1".into()));
        }
    }

    if let Some(consensus) = &config.consensus {
        for (name, value) in [
            ("min_agreement", consensus.min_agreement),
            ("min_confidence", consensus.min_confidence),
        ] {
            if let Some(v) = value {
                if !(0.0..=1.0).contains(&v) {
                    return Err(ConclaveError::Config(format!("{} must be within [0, 1]", name)));
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    async fn parse_str(yaml: &str) -> Result<ConclaveConfig, ConclaveError> {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        parse_config(file.path()).await
    }

    #[tokio::test]
    async fn test_full_config_parses() {
        let config = parse_str(
            r#"
pool:
  workers:
    - id: optimist
      role: analyst
      tags: [markets]
      priority: 7
      weight: 2.0
    - id: skeptic
      role: reviewer
orchestration:
  mode: swarm
  max_workers: 2
  task_timeout_ms: 15000
  cost_averse: true
consensus:
  min_agreement: 0.6
  min_confidence: 0.4
storage:
  db_path: ./conclave.db
  working_dir: ./workdir
notifications:
  webhook_url: https://hooks.example.com/conclave
tasks:
  - kind: decision
    prompt: "Ship the release?"
    role: analyst
    timeout_ms: 5000
"#,
        )
        .await
        .unwrap();

        let pool = config.pool.unwrap();
        assert_eq!(pool.workers.len(), 2);
        assert_eq!(pool.workers[0].weight, Some(2.0));
        assert_eq!(config.orchestration.unwrap().max_workers, Some(2));
        assert_eq!(config.tasks.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_mode_fails() {
        let err = parse_str("orchestration:\n  mode: freeform\n").await.unwrap_err();
        assert!(matches!(err, ConclaveError::Yaml(_)));
    }

    #[tokio::test]
    async fn test_duplicate_worker_id_rejected() {
        let err = parse_str(
            "pool:\n  workers:\n    - id: a\n      role: analyst\n    - id: a\n      role: reviewer\n",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ConclaveError::Config(_)));
    }

    #[tokio::test]
    async fn test_out_of_range_gate_rejected() {
        let err = parse_str("consensus:\n  min_agreement: 1.5\n").await.unwrap_err();
        assert!(matches!(err, ConclaveError::Config(_)));
    }

    #[tokio::test]
    async fn test_zero_max_workers_rejected() {
        let err = parse_str("orchestration:\n  max_workers: 0\n").await.unwrap_err();
        assert!(matches!(err, ConclaveError::Config(_)));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let err = parse_config(Path::new("/nonexistent/conclave.yaml")).await.unwrap_err();
        assert!(matches!(err, ConclaveError::Config(_)));
    }
}
