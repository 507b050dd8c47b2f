//! Run-scoped set of URLs already retrieved.
//!
//! Every entry remembers the dispatch index of the sub-query that claimed
//! it. The lowest index wins a contested URL, so ownership does not depend
//! on which sub-query reaches the URL first.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Outcome of [`VisitedUrls::claim`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// The caller owns the URL now.
    Claimed,
    /// Another claim holds the URL. Carries the holder's index.
    Held(usize),
}

/// URLs seen during one run. Grows monotonically except when a timed-out
/// sub-query gives its claims back.
#[derive(Debug, Default)]
pub struct VisitedUrls {
    seen: Mutex<HashMap<String, usize>>,
}

/// Canonical form used as the dedup key: no fragment, no trailing slash,
/// lowercase scheme and host (the `url` crate normalizes those).
#[must_use]
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    match url::Url::parse(trimmed) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.to_string().trim_end_matches('/').to_string()
        }
        Err(_) => trimmed.trim_end_matches('/').to_string(),
    }
}

impl VisitedUrls {
    /// An empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `url` for sub-query `owner`. Check and insert happen under one
    /// lock, so concurrent callers never both see [`Claim::Claimed`] for the
    /// same index.
    ///
    /// A free URL is claimed. A URL held by a higher index moves to `owner`.
    /// A URL held by `owner` itself or by a lower index stays put and the
    /// holder is returned.
    pub fn claim(&self, url: &str, owner: usize) -> Claim {
        let key = normalize_url(url);
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        match seen.get(&key) {
            Some(&holder) if holder <= owner => Claim::Held(holder),
            _ => {
                seen.insert(key, owner);
                Claim::Claimed
            }
        }
    }

    /// Whether `owner` holds `url`, claiming it first when it is free or
    /// held by a higher index.
    pub fn confirm(&self, url: &str, owner: usize) -> bool {
        match self.claim(url, owner) {
            Claim::Claimed => true,
            Claim::Held(holder) => holder == owner,
        }
    }

    /// The index holding `url`.
    #[must_use]
    pub fn owner(&self, url: &str) -> Option<usize> {
        let key = normalize_url(url);
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .copied()
    }

    /// Drops every URL `owner` holds and returns how many were dropped.
    pub fn release(&self, owner: usize) -> usize {
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        let before = seen.len();
        seen.retain(|_, holder| *holder != owner);
        before - seen.len()
    }

    /// Whether `url` was already seen.
    #[must_use]
    pub fn contains(&self, url: &str) -> bool {
        let key = normalize_url(url);
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&key)
    }

    /// Number of distinct URLs seen.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing was seen yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("HTTPS://Example.COM/a/#top"), "https://example.com/a");
        assert_eq!(normalize_url("https://example.com/"), "https://example.com");
        assert_eq!(normalize_url(" local-note/ "), "local-note");
    }

    #[test]
    fn test_claim_normalizes() {
        let visited = VisitedUrls::new();
        assert_eq!(visited.claim("https://example.com/a", 0), Claim::Claimed);
        assert_eq!(visited.claim("https://example.com/a#section", 0), Claim::Held(0));
        assert!(visited.contains("https://EXAMPLE.com/a/"));
        assert_eq!(visited.len(), 1);
    }

    #[test]
    fn test_lower_index_wins_claim() {
        let visited = VisitedUrls::new();
        assert_eq!(visited.claim("https://example.com/a", 2), Claim::Claimed);
        assert_eq!(visited.claim("https://example.com/a", 2), Claim::Held(2));
        assert_eq!(visited.claim("https://example.com/a", 3), Claim::Held(2));
        assert_eq!(visited.claim("https://example.com/a/", 0), Claim::Claimed);
        assert_eq!(visited.owner("https://example.com/a"), Some(0));
        assert!(!visited.confirm("https://example.com/a", 1));
        assert!(visited.confirm("https://example.com/a", 0));
    }

    #[test]
    fn test_release_frees_only_that_owner() {
        let visited = VisitedUrls::new();
        visited.claim("https://example.com/a", 0);
        visited.claim("https://example.com/b", 0);
        visited.claim("https://example.com/c", 1);
        assert_eq!(visited.release(0), 2);
        assert!(!visited.contains("https://example.com/a"));
        assert_eq!(visited.owner("https://example.com/a"), None);
        assert_eq!(visited.owner("https://example.com/c"), Some(1));
        assert!(visited.confirm("https://example.com/a", 1));
    }

    #[tokio::test]
    async fn test_concurrent_inserts_admit_one_winner() {
        let visited = Arc::new(VisitedUrls::new());
        let mut handles = Vec::new();
        for _ in 0..32 {
            let v = Arc::clone(&visited);
            handles.push(tokio::spawn(async move { v.claim("https://example.com/a", 0) == Claim::Claimed }));
        }
        let mut winners = 0;
        for h in handles {
            if h.await.unwrap_or(false) {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    proptest! {
        #[test]
        fn prop_second_pass_adds_nothing(paths in prop::collection::vec("[a-z]{1,6}", 0..30)) {
            let visited = VisitedUrls::new();
            let urls: Vec<String> = paths.iter().map(|p| format!("https://example.com/{p}")).collect();
            let first = urls.iter().filter(|u| visited.claim(u, 0) == Claim::Claimed).count();
            let mut reordered = urls.clone();
            reordered.reverse();
            let second = reordered.iter().filter(|u| visited.claim(u, 0) == Claim::Claimed).count();
            prop_assert_eq!(second, 0);
            prop_assert_eq!(first, visited.len());
        }
    }
}
