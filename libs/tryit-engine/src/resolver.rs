//! Interpreter discovery.
//!
//! Hosts differ on whether the Python binary is installed as `python3` or
//! `python`. The resolver probes candidate names with a `--version` call
//! (no shell involved) and memoizes the first one that answers. The cache
//! is an explicit optimization over re-probing on every request; callers
//! that see a cached command fail unexpectedly invalidate and re-probe.

use std::process::Stdio;
use std::sync::Mutex;

use tokio::process::Command;
use tracing::{debug, warn};

/// Probes for a usable interpreter among an ordered candidate list.
#[derive(Debug)]
pub struct InterpreterResolver {
    candidates: Vec<String>,
    cached: Mutex<Option<String>>,
}

impl InterpreterResolver {
    pub fn new(candidates: Vec<String>) -> Self {
        Self {
            candidates,
            cached: Mutex::new(None),
        }
    }

    /// Resolve the interpreter command name.
    ///
    /// Returns `None` when no candidate responds - that is data for the
    /// caller to translate into an infrastructure error, not a panic.
    pub async fn resolve(&self) -> Option<String> {
        if let Some(cached) = self.cached.lock().ok().and_then(|c| c.clone()) {
            return Some(cached);
        }

        for candidate in &self.candidates {
            if probe(candidate).await {
                debug!(interpreter = %candidate, "Resolved interpreter");
                if let Ok(mut cached) = self.cached.lock() {
                    *cached = Some(candidate.clone());
                }
                return Some(candidate.clone());
            }
        }

        warn!(candidates = ?self.candidates, "No interpreter candidate responded");
        None
    }

    /// Drop the memoized command so the next `resolve` re-probes the host.
    pub fn invalidate(&self) {
        if let Ok(mut cached) = self.cached.lock() {
            *cached = None;
        }
    }
}

/// A candidate is usable if `<name> --version` runs and exits zero.
async fn probe(candidate: &str) -> bool {
    Command::new(candidate)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_returns_none_when_nothing_responds() {
        let resolver = InterpreterResolver::new(vec![
            "tryit-no-such-interpreter-a".to_string(),
            "tryit-no-such-interpreter-b".to_string(),
        ]);
        assert_eq!(resolver.resolve().await, None);
    }

    #[tokio::test]
    async fn test_invalidate_clears_cache() {
        let resolver = InterpreterResolver::new(vec!["tryit-no-such-interpreter".to_string()]);
        assert_eq!(resolver.resolve().await, None);
        resolver.invalidate();
        assert_eq!(resolver.resolve().await, None);
    }

    #[tokio::test]
    #[ignore] // Requires python3 on the host
    async fn test_resolve_finds_python3() {
        let resolver =
            InterpreterResolver::new(vec!["python3".to_string(), "python".to_string()]);
        let first = resolver.resolve().await.expect("python3 should resolve");
        // Second call hits the cache and agrees.
        assert_eq!(resolver.resolve().await.as_deref(), Some(first.as_str()));
    }
}
