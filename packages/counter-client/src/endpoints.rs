//! Prioritized RPC endpoint registry with failure tracking.
//!
//! The registry never reports "no endpoint available": once every
//! endpoint has been marked failed, the failure marks are cleared and
//! selection restarts from the most preferred endpoint.

use log::{info, warn};
use std::collections::HashSet;

/// A single RPC endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// HTTP URL of the JSON-RPC endpoint.
    pub url: String,
    /// Human readable name for logs and status lines.
    pub name: String,
    /// Lower is preferred.
    pub priority: u32,
}

impl Endpoint {
    pub fn new(url: impl Into<String>, name: impl Into<String>, priority: u32) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
            priority,
        }
    }
}

/// Snapshot of the registry for status reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointStatus {
    pub total: usize,
    pub failed: usize,
    /// Name of the endpoint currently selected.
    pub current: String,
}

#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("endpoint registry needs at least one endpoint")]
    Empty,
}

/// Ordered set of endpoints plus the URLs that recently failed.
#[derive(Debug, Clone)]
pub struct EndpointRegistry {
    /// Sorted by priority, unique by URL.
    endpoints: Vec<Endpoint>,
    failed: HashSet<String>,
    /// Index into the currently available (non-failed) endpoints.
    cursor: usize,
}

impl EndpointRegistry {
    /// Creates a registry from an unordered list of endpoints.
    ///
    /// Endpoints are sorted by priority; when a URL appears more than once
    /// only its most preferred entry is kept.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::Empty`] if `endpoints` is empty.
    pub fn new(mut endpoints: Vec<Endpoint>) -> Result<Self, EndpointError> {
        if endpoints.is_empty() {
            return Err(EndpointError::Empty);
        }

        endpoints.sort_by_key(|e| e.priority);
        let mut seen = HashSet::new();
        endpoints.retain(|e| seen.insert(e.url.clone()));

        Ok(Self {
            endpoints,
            failed: HashSet::new(),
            cursor: 0,
        })
    }

    /// Returns every endpoint in priority order.
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Returns the currently selected endpoint.
    ///
    /// If every endpoint is marked failed, the registry resets itself and
    /// returns the most preferred endpoint.
    pub fn current(&mut self) -> &Endpoint {
        let available = self.available_indices();

        if available.is_empty() {
            info!(
                "All {} RPC endpoints failed, resetting failure marks",
                self.endpoints.len()
            );
            self.reset();
            return &self.endpoints[0];
        }

        if self.cursor >= available.len() {
            self.cursor = 0;
        }

        &self.endpoints[available[self.cursor]]
    }

    /// Marks an endpoint as unusable until the next reset.
    pub fn mark_failed(&mut self, url: &str) {
        if !self.endpoints.iter().any(|e| e.url == url) {
            return;
        }
        if self.failed.insert(url.to_string()) {
            warn!("RPC endpoint marked as failed: {}", url);
        }
    }

    /// Moves the selection to the next available endpoint, wrapping around.
    pub fn advance(&mut self) -> &Endpoint {
        self.cursor = self.cursor.saturating_add(1);
        self.current()
    }

    /// Clears all failure marks.
    pub fn reset(&mut self) {
        self.failed.clear();
        self.cursor = 0;
    }

    pub fn is_failed(&self, url: &str) -> bool {
        self.failed.contains(url)
    }

    pub fn status(&mut self) -> EndpointStatus {
        let current = self.current().name.clone();
        EndpointStatus {
            total: self.endpoints.len(),
            failed: self.failed.len(),
            current,
        }
    }

    fn available_indices(&self) -> Vec<usize> {
        self.endpoints
            .iter()
            .enumerate()
            .filter(|(_, e)| !self.failed.contains(&e.url))
            .map(|(i, _)| i)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> EndpointRegistry {
        EndpointRegistry::new(vec![
            Endpoint::new("https://c.example", "c", 2),
            Endpoint::new("https://a.example", "a", 0),
            Endpoint::new("https://d.example", "d", 3),
            Endpoint::new("https://b.example", "b", 1),
        ])
        .unwrap()
    }

    #[test]
    fn test_selection_follows_priority_and_failures() {
        let mut reg = registry();
        assert_eq!(reg.current().priority, 0);
        assert_eq!(reg.current().priority, 0);

        for expected_next in 1..=3 {
            let url = reg.current().url.clone();
            reg.mark_failed(&url);
            assert_eq!(reg.current().priority, expected_next);
        }

        let url = reg.current().url.clone();
        reg.mark_failed(&url);
        assert_eq!(reg.current().priority, 0);
        assert_eq!(reg.status().failed, 0);
    }

    #[test]
    fn test_advance_wraps_and_skips_failed() {
        let mut reg = registry();
        reg.mark_failed("https://b.example");

        assert_eq!(reg.current().name, "a");
        assert_eq!(reg.advance().name, "c");
        assert_eq!(reg.advance().name, "d");
        assert_eq!(reg.advance().name, "a");
    }

    #[test]
    fn test_duplicate_urls_keep_preferred_entry() {
        let reg = EndpointRegistry::new(vec![
            Endpoint::new("https://api.devnet.solana.com", "Default Devnet", 3),
            Endpoint::new("https://api.devnet.solana.com", "Solana Labs Devnet", 2),
            Endpoint::new("https://custom.example", "Custom RPC", 0),
        ])
        .unwrap();

        let names: Vec<_> = reg.endpoints().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Custom RPC", "Solana Labs Devnet"]);
    }

    #[test]
    fn test_reset_and_status() {
        let mut reg = registry();
        reg.mark_failed("https://a.example");
        reg.mark_failed("https://unknown.example");

        let status = reg.status();
        assert_eq!(status.total, 4);
        assert_eq!(status.failed, 1);
        assert_eq!(status.current, "b");

        reg.reset();
        assert!(!reg.is_failed("https://a.example"));
        assert_eq!(reg.current().name, "a");
    }

    #[test]
    fn test_empty_registry_rejected() {
        assert!(EndpointRegistry::new(vec![]).is_err());
    }
}
