//! Keyword search over the guide index.
//!
//! Scoring is intentionally simple and deterministic:
//!
//! | Signal | Points |
//! |--------|--------|
//! | Trimmed query is a substring of `basename + " " + source` | +8 |
//! | Basename equals the trimmed query | +8 |
//! | Each query token found in `basename + " " + source` | +1 |
//!
//! Matching is case-insensitive. Rows scoring zero are dropped; the rest are
//! ordered by descending score, then ascending `source`.

use anyhow::Result;

use crate::config::Config;
use crate::guide_index::GuideIndex;
use crate::models::{GuideIndexRow, ScoredGuideRow};

/// Splits a query into lowercase tokens on any run of characters outside
/// `[a-z0-9_./-]`, dropping tokens shorter than two characters.
pub fn query_tokens(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split(|c: char| !matches!(c, 'a'..='z' | '0'..='9' | '_' | '.' | '/' | '-'))
        .filter(|token| token.len() > 1)
        .map(str::to_string)
        .collect()
}

/// Scores one row against a query and its precomputed tokens.
pub fn score_row(row: &GuideIndexRow, query: &str, tokens: &[String]) -> u32 {
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        return 0;
    }

    let base = format!("{} {}", row.basename, row.source).to_lowercase();
    let mut score = 0;

    if base.contains(&q) {
        score += 8;
    }
    if row.basename.to_lowercase() == q {
        score += 8;
    }
    for token in tokens {
        if base.contains(token.as_str()) {
            score += 1;
        }
    }
    score
}

/// Ranks `rows` against `query` and keeps the top `limit`.
pub fn rank_rows(rows: &[GuideIndexRow], query: &str, limit: usize) -> Vec<ScoredGuideRow> {
    let tokens = query_tokens(query);

    let mut scored: Vec<ScoredGuideRow> = rows
        .iter()
        .filter_map(|row| {
            let score = score_row(row, query, &tokens);
            (score > 0).then(|| ScoredGuideRow {
                row: row.clone(),
                score,
            })
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.row.source.cmp(&b.row.source))
    });
    scored.truncate(limit);
    scored
}

/// Searches the cached guide index.
pub async fn search_guides(index: &GuideIndex, query: &str, limit: usize) -> Vec<ScoredGuideRow> {
    let rows = index.rows().await;
    rank_rows(&rows, query, limit)
}

/// CLI entry point for `memgate search`.
pub async fn run_search(config: &Config, query: &str, limit: usize) -> Result<()> {
    let index = GuideIndex::new(&config.guides.index, config.guides.cache_ttl());
    let results = search_guides(&index, query, limit).await;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in results.iter().enumerate() {
        println!(
            "{}. [{:>2}] {}  ({})",
            i + 1,
            hit.score,
            hit.row.source,
            hit.row.guide_md
        );
    }

    Ok(())
}
