//! Budget-capped brief: a short list of guide summaries plus the observation
//! IDs worth fetching next.
//!
//! The brief is meant to be cheap to read. Summaries are added in score
//! order until the running size estimate (serialized JSON length) would
//! exceed `max_chars`; the first summary is always kept so a matching query
//! never yields an empty brief. Observation IDs come from the included
//! sidecars first and from the worker's search second.

use serde::Serialize;

use crate::gateway::Gateway;
use crate::guide_search::search_guides;
use crate::guide_summary::{summarize, SummaryLimits};
use crate::models::GuideSummary;
use crate::observations::{dedupe_ids, search_memory, MemorySearch};
use crate::params::BriefOptions;

/// Over-fetch factor for candidates, since the budget may stop early.
const CANDIDATE_FACTOR: u32 = 4;
/// Observation IDs kept per summary.
const SUMMARY_OBSERVATION_CAP: usize = 12;
const LOCAL_ID_CAP: usize = 50;
const RECOMMENDED_ID_CAP: usize = 20;
const NEXT_FETCH_IDS: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BriefResult {
    pub query: String,
    pub budget: Budget,
    pub strategy: Vec<&'static str>,
    pub files: Vec<GuideSummary>,
    pub memory: MemorySection,
    pub next: NextCalls,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Budget {
    pub max_chars: u32,
    pub used_chars_estimate: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemorySection {
    pub local_observation_ids: Vec<u64>,
    pub search_observation_ids: Vec<u64>,
    pub recommended_fetch_ids: Vec<u64>,
    pub search_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_error: Option<String>,
}

/// Follow-up call hints so clients need not hardcode endpoint shapes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NextCalls {
    pub fetch_observations: NextCall,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NextCall {
    pub endpoint: &'static str,
    pub method: &'static str,
    pub body: FetchBody,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchBody {
    pub ids: Vec<u64>,
}

/// Size estimate used for budgeting: UTF-16 length of the compact JSON form.
pub fn estimate_chars(summary: &GuideSummary) -> usize {
    serde_json::to_string(summary)
        .map(|json| json.encode_utf16().count())
        .unwrap_or(0)
}

/// Builds a brief. Local summarization and the upstream search run
/// concurrently; the ID merge is always local-then-memory.
pub async fn build_brief(gateway: &Gateway, opts: &BriefOptions) -> BriefResult {
    let local = collect_summaries(gateway, opts);
    let memory = async {
        if opts.include_memory {
            search_memory(&gateway.upstream, &opts.query, opts.memory_limit).await
        } else {
            MemorySearch::default()
        }
    };
    let ((files, used_chars), memory) = tokio::join!(local, memory);

    let local_ids = dedupe_ids(
        files.iter().flat_map(|f| f.observation_ids.iter().copied()),
        LOCAL_ID_CAP,
    );
    let recommended = dedupe_ids(
        local_ids.iter().chain(memory.ids.iter()).copied(),
        RECOMMENDED_ID_CAP,
    );
    let next_ids = recommended.iter().take(NEXT_FETCH_IDS).copied().collect();

    BriefResult {
        query: opts.query.clone(),
        budget: Budget {
            max_chars: opts.max_chars,
            used_chars_estimate: used_chars,
        },
        strategy: vec!["local-sidecars", "memory-index", "fetch-by-id-only"],
        files,
        memory: MemorySection {
            local_observation_ids: local_ids,
            search_observation_ids: memory.ids,
            recommended_fetch_ids: recommended,
            search_status: memory.status,
            search_error: memory.error,
        },
        next: NextCalls {
            fetch_observations: NextCall {
                endpoint: "/v1/memory/observations",
                method: "POST",
                body: FetchBody { ids: next_ids },
            },
        },
    }
}

async fn collect_summaries(gateway: &Gateway, opts: &BriefOptions) -> (Vec<GuideSummary>, usize) {
    let file_limit = opts.file_limit as usize;
    let max_chars = opts.max_chars as usize;
    let limits = SummaryLimits {
        anchors: opts.anchor_limit as usize,
        risks: opts.risk_limit as usize,
        observations: SUMMARY_OBSERVATION_CAP,
    };

    let candidates = search_guides(
        &gateway.guides,
        &opts.query,
        (opts.file_limit * CANDIDATE_FACTOR) as usize,
    )
    .await;

    let mut files = Vec::new();
    let mut used_chars = 0;
    for hit in &candidates {
        if files.len() >= file_limit {
            break;
        }
        let summary = summarize(gateway.guide_root(), hit, limits).await;
        let approx = estimate_chars(&summary);
        if used_chars + approx > max_chars && !files.is_empty() {
            break;
        }
        used_chars += approx;
        files.push(summary);
    }
    (files, used_chars)
}
