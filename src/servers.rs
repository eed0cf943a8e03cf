//! Measurement target candidates.
//!
//! Targets are a fixed, ordered list; resolving them requires no network
//! call. The engine selects the first (closest-by-convention) entry once
//! per run.

use serde::{Deserialize, Serialize};

/// A host serving the `__down`/`__up` echo endpoints.
///
/// Read-only for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerTarget {
    /// Host name the probes are issued against.
    pub host: String,
    /// Human-readable name for display and logging.
    pub name: String,
}

impl ServerTarget {
    /// Create a new ServerTarget.
    pub fn new(host: impl Into<String>, name: impl Into<String>) -> Self {
        Self { host: host.into(), name: name.into() }
    }
}

/// The fixed candidate list, closest-by-convention first.
pub fn candidates() -> Vec<ServerTarget> {
    vec![
        ServerTarget::new("speed.cloudflare.com", "Cloudflare"),
        ServerTarget::new("bouygues.testdebit.info", "Bouygues"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_not_empty() {
        assert!(!candidates().is_empty());
    }

    #[test]
    fn test_first_candidate_is_preferred() {
        let targets = candidates();
        assert_eq!(targets[0].host, "speed.cloudflare.com");
        assert_eq!(targets[0].name, "Cloudflare");
    }
}
