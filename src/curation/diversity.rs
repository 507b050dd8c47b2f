//! Coarse outlet categories and the per-category cap.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Outlet category, matched on URL and title substrings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum SourceCategory {
    Academic,
    Government,
    News,
    Blog,
    Organization,
    General,
}

const ACADEMIC: &[&str] = &[
    ".edu", ".ac.", "arxiv", "scholar", "journal", "pubmed", "ncbi", "springer", "nature.com",
    "sciencedirect", "ieee", "acm.org", "researchgate", "jstor", "wiley",
];
const GOVERNMENT: &[&str] = &[".gov", ".mil", "europa.eu", "who.int", "un.org", "oecd.org"];
const NEWS: &[&str] = &[
    "news", "reuters", "bbc.", "cnn.", "nytimes", "theguardian", "bloomberg", "wsj.com", "apnews",
    "techcrunch", "theverge", "wired.com", "forbes",
];
const BLOG: &[&str] = &["blog", "medium.com", "substack", "wordpress", "dev.to", "hashnode", "tumblr"];

impl SourceCategory {
    /// Lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Academic => "academic",
            Self::Government => "government",
            Self::News => "news",
            Self::Blog => "blog",
            Self::Organization => "organization",
            Self::General => "general",
        }
    }

    /// Classifies a source. The first matching category wins, in the
    /// order academic, government, news, blog, organization.
    #[must_use]
    pub fn classify(url: &str, title: &str) -> Self {
        let haystack = format!("{} {}", url.to_lowercase(), title.to_lowercase());
        let any = |needles: &[&str]| needles.iter().any(|n| haystack.contains(n));
        if any(ACADEMIC) {
            Self::Academic
        } else if any(GOVERNMENT) {
            Self::Government
        } else if any(NEWS) {
            Self::News
        } else if any(BLOG) {
            Self::Blog
        } else if url.to_lowercase().contains(".org") {
            Self::Organization
        } else {
            Self::General
        }
    }
}

/// Bonus for each candidate: `max_bonus` scaled by how rare its category is.
/// A lone category gets nothing.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn bonuses(categories: &[SourceCategory], max_bonus: f64) -> Vec<f64> {
    let mut counts: BTreeMap<SourceCategory, usize> = BTreeMap::new();
    for c in categories {
        *counts.entry(*c).or_default() += 1;
    }
    let total = categories.len() as f64;
    categories
        .iter()
        .map(|c| {
            let share = counts.get(c).copied().unwrap_or(0) as f64 / total;
            (max_bonus * (1.0 - share)).max(0.0)
        })
        .collect()
}

/// Caps each category at `ceil(total / categories)` entries.
///
/// `candidates` holds `(id, category, score)`. Returns the kept ids, best
/// first, and the dropped ids with their category. Within a category the
/// higher score wins and ties keep input order.
#[must_use]
pub fn cap_per_category(
    candidates: &[(usize, SourceCategory, f64)],
) -> (Vec<usize>, Vec<(usize, SourceCategory)>) {
    if candidates.is_empty() {
        return (Vec::new(), Vec::new());
    }
    let mut groups: BTreeMap<SourceCategory, Vec<(usize, f64, usize)>> = BTreeMap::new();
    for (order, (id, category, score)) in candidates.iter().enumerate() {
        groups.entry(*category).or_default().push((*id, *score, order));
    }
    let cap = candidates.len().div_ceil(groups.len());

    let mut kept: Vec<(usize, f64, usize)> = Vec::new();
    let mut dropped = Vec::new();
    for (category, mut members) in groups {
        members.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.2.cmp(&b.2)));
        for (rank, member) in members.into_iter().enumerate() {
            if rank < cap {
                kept.push(member);
            } else {
                dropped.push((member.0, category));
            }
        }
    }
    kept.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.2.cmp(&b.2)));
    (kept.into_iter().map(|m| m.0).collect(), dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("https://cs.stanford.edu/paper", SourceCategory::Academic)]
    #[test_case("https://arxiv.org/abs/1", SourceCategory::Academic)]
    #[test_case("https://www.nih.gov/news", SourceCategory::Government)]
    #[test_case("https://www.reuters.com/tech", SourceCategory::News)]
    #[test_case("https://someone.medium.com/post", SourceCategory::Blog)]
    #[test_case("https://www.mozilla.org/about", SourceCategory::Organization)]
    #[test_case("https://example.com/page", SourceCategory::General)]
    fn test_classify(url: &str, expected: SourceCategory) {
        assert_eq!(SourceCategory::classify(url, ""), expected);
    }

    #[test]
    fn test_cap_limits_dominant_category() {
        let mut candidates: Vec<(usize, SourceCategory, f64)> = (0..6u8)
            .map(|i| (usize::from(i), SourceCategory::News, f64::from(i).mul_add(-0.01, 0.9)))
            .collect();
        candidates.push((6, SourceCategory::Academic, 0.5));
        candidates.push((7, SourceCategory::Blog, 0.4));
        // 8 candidates over 3 categories: cap is 3.
        let (kept, dropped) = cap_per_category(&candidates);
        assert_eq!(kept, vec![0, 1, 2, 6, 7]);
        assert_eq!(dropped.len(), 3);
        assert!(dropped.iter().all(|(_, c)| *c == SourceCategory::News));
    }

    #[test]
    fn test_single_category_keeps_everything() {
        let candidates = vec![(0, SourceCategory::General, 0.1), (1, SourceCategory::General, 0.9)];
        let (kept, dropped) = cap_per_category(&candidates);
        assert_eq!(kept, vec![1, 0]);
        assert!(dropped.is_empty());
    }

    #[test]
    fn test_bonuses_favor_rare_categories() {
        let cats = [SourceCategory::News, SourceCategory::News, SourceCategory::News, SourceCategory::Academic];
        let b = bonuses(&cats, 0.1);
        assert!(b[3] > b[0]);
        assert!(b.iter().all(|x| *x <= 0.1));
        assert!(bonuses(&[SourceCategory::General], 0.1)[0].abs() < 1e-12);
    }
}
