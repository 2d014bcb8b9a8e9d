//! # Memory Gateway
//!
//! An HTTP façade over an upstream "memory worker" API. Besides plain
//! passthrough, it indexes locally generated guide sidecars and combines
//! them with the worker's semantic search into two derived views: a
//! budget-capped brief and a bounded relationship graph.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌──────────────┐
//!   request ────▶ │    server    │──── passthrough ────┐
//!                 └──────┬───────┘                     │
//!                ┌───────┴────────┐                    ▼
//!                ▼                ▼             ┌────────────┐
//!          ┌──────────┐     ┌──────────┐        │  upstream  │──▶ memory worker
//!          │  brief   │     │  graph   │───────▶│   client   │
//!          └────┬─────┘     └────┬─────┘        └────────────┘
//!               └───────┬────────┘
//!                       ▼
//!          ┌─────────────────────────┐
//!          │ guide search / summary  │──▶ index TSV + JSON sidecars
//!          └─────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML + environment configuration |
//! | [`error`] | Request-level error type |
//! | [`gateway`] | Shared state handed to handlers |
//! | [`models`] | Core data types |
//! | [`guide_index`] | Guide index loader with TTL cache |
//! | [`guide_search`] | Query scoring over index rows |
//! | [`guide_summary`] | Capped sidecar summaries |
//! | [`upstream`] | Worker passthrough client |
//! | [`observations`] | Observation ID scraping and de-duplication |
//! | [`params`] | Per-request option parsing |
//! | [`brief`] | Budget-capped brief builder |
//! | [`graph`] | Relationship graph builder |
//! | [`server`] | HTTP router |

pub mod brief;
pub mod config;
pub mod error;
pub mod gateway;
pub mod graph;
pub mod guide_index;
pub mod guide_search;
pub mod guide_summary;
pub mod models;
pub mod observations;
pub mod params;
pub mod server;
pub mod upstream;
