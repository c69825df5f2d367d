use serde::{Deserialize, Serialize};

/// Scheduling strategy for a batch of tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// One at a time, in list order; a failing task does not stop the rest.
    Sequential,
    /// All dispatched concurrently, no ordering guarantee.
    Parallel,
    /// Sequential, each payload augmented with the previous result;
    /// the first failure aborts the remainder.
    Pipeline,
    /// A bounded worker count pulls from the queue; slots refill as
    /// they free up.
    Swarm,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Parallel => "parallel",
            Self::Pipeline => "pipeline",
            Self::Swarm => "swarm",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "parallel" => Ok(Self::Parallel),
            "pipeline" => Ok(Self::Pipeline),
            "swarm" => Ok(Self::Swarm),
            other => Err(format!("unknown mode: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trip() {
        for mode in [Mode::Sequential, Mode::Parallel, Mode::Pipeline, Mode::Swarm] {
            assert_eq!(mode.as_str().parse::<Mode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_unknown_mode_rejected() {
        assert!("round-robin".parse::<Mode>().is_err());
    }
}
