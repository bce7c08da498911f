//! Window filtering, branch merging, and stable URL deduplication.
//!
//! Everything here is pure: the same input batches always produce the same
//! selection in the same order.

use crate::config::MergeStrategy;
use crate::query::DateWindow;
use crate::types::CandidateArticle;
use std::collections::HashSet;
use tracing::info;
use url::Url;

/// Query parameters that only track where a reader came from.
const TRACKING_PARAMS: [&str; 12] = [
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "msclkid",
    "ref",
    "source",
    "mc_cid",
    "mc_eid",
];

/// Selects the articles a run will process.
///
/// # Arguments
///
/// * `batches` - Candidates per search query, each in the feed's own order.
/// * `window` - Inclusive publish-time bounds.
/// * `requested_count` - Upper bound on the result length.
/// * `merge` - How the per-query batches are combined.
///
/// # Returns
///
/// At most `requested_count` candidates, all inside `window`, with distinct URLs.
pub fn select_candidates(
    batches: Vec<Vec<CandidateArticle>>,
    window: &DateWindow,
    requested_count: usize,
    merge: MergeStrategy,
) -> Vec<CandidateArticle> {
    let merged = merge_batches(batches, merge);
    let total = merged.len();

    let in_window: Vec<_> = merged
        .into_iter()
        .filter(|c| window.contains(&c.published_at))
        .collect();
    let after_window = in_window.len();

    let mut unique = dedup_by_url(in_window);
    let after_dedup = unique.len();
    unique.truncate(requested_count);

    info!(
        total,
        after_window,
        after_dedup,
        selected = unique.len(),
        "Filtered candidates"
    );
    unique
}

/// Combines per-query batches into one ordered list.
pub fn merge_batches(
    batches: Vec<Vec<CandidateArticle>>,
    merge: MergeStrategy,
) -> Vec<CandidateArticle> {
    match merge {
        MergeStrategy::Grouped => batches.into_iter().flatten().collect(),
        MergeStrategy::Interleaved => {
            let longest = batches.iter().map(Vec::len).max().unwrap_or(0);
            let mut iters: Vec<_> = batches.into_iter().map(Vec::into_iter).collect();
            let mut out = Vec::new();
            for _ in 0..longest {
                for it in iters.iter_mut() {
                    out.extend(it.next());
                }
            }
            out
        }
        MergeStrategy::NewestFirst => {
            let mut all: Vec<_> = batches.into_iter().flatten().collect();
            // sort_by is stable, so equal timestamps keep fetch order
            all.sort_by(|a, b| b.published_at.cmp(&a.published_at));
            all
        }
    }
}

/// Keeps the first occurrence of each normalized URL.
pub fn dedup_by_url(candidates: Vec<CandidateArticle>) -> Vec<CandidateArticle> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| seen.insert(normalize_url(&c.url)))
        .collect()
}

/// Canonical form used as the dedup key: lower-case host, no fragment, no
/// trailing slash, and no tracking parameters. Unparseable URLs are only
/// lower-cased.
pub fn normalize_url(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw.trim()) else {
        return raw.trim().to_lowercase();
    };

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !TRACKING_PARAMS.contains(&k.to_ascii_lowercase().as_str()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
    url.set_fragment(None);

    let path = url.path().trim_end_matches('/').to_string();
    url.set_path(&path);

    url.to_string().trim_end_matches('/').to_string()
}
