//! Per-request option parsing for the brief and graph builders.
//!
//! Options arrive either as URL query parameters (all strings) or as a JSON
//! object body. Both are normalised into a [`Params`] map, then read into a
//! typed options struct once, with each numeric field floored and clamped to
//! its documented range.

use serde_json::{Map, Value};

use crate::error::{GatewayError, GatewayResult};

/// Raw request parameters keyed by name.
pub type Params = Map<String, Value>;

/// Builds params from query pairs. The last value for a repeated key wins.
pub fn params_from_pairs(pairs: &[(String, String)]) -> Params {
    let mut params = Params::new();
    for (key, value) in pairs {
        params.insert(key.clone(), Value::String(value.clone()));
    }
    params
}

/// A numeric option's default and inclusive bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub default: u32,
    pub min: u32,
    pub max: u32,
}

impl Bounds {
    pub const fn new(default: u32, min: u32, max: u32) -> Self {
        Self { default, min, max }
    }
}

fn number_of(value: Option<&Value>) -> Option<f64> {
    let parsed = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if !s.trim().is_empty() => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|f| f.is_finite())
}

/// Reads a number, falling back to the default when missing or non-numeric,
/// then floors and clamps it into `bounds`.
pub fn clamp_number(value: Option<&Value>, bounds: Bounds) -> u32 {
    match number_of(value) {
        Some(n) => n.floor().clamp(bounds.min as f64, bounds.max as f64) as u32,
        None => bounds.default,
    }
}

/// Reads a boolean from a JSON bool or one of `1/true/yes/on`, `0/false/no/off`.
pub fn to_bool(value: Option<&Value>, fallback: bool) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => match n.as_f64() {
            Some(f) if f == 1.0 => true,
            Some(f) if f == 0.0 => false,
            _ => fallback,
        },
        Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => fallback,
        },
        _ => fallback,
    }
}

/// First present, non-empty value among `keys`.
fn first_of<'a>(params: &'a Params, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| params.get(*key))
        .find(|value| !is_blank(value))
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        _ => false,
    }
}

/// Reads the required query from `q` or `query`, trimmed.
pub fn required_query(params: &Params) -> GatewayResult<String> {
    let query = match first_of(params, &["q", "query"]) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    if query.is_empty() {
        return Err(GatewayError::MissingQuery);
    }
    Ok(query)
}

pub const BRIEF_MAX_CHARS: Bounds = Bounds::new(2400, 400, 12000);
pub const BRIEF_FILE_LIMIT: Bounds = Bounds::new(8, 1, 40);
pub const BRIEF_MEMORY_LIMIT: Bounds = Bounds::new(15, 1, 60);
pub const GRAPH_FILE_LIMIT: Bounds = Bounds::new(8, 1, 30);
pub const GRAPH_MEMORY_LIMIT: Bounds = Bounds::new(20, 1, 80);
pub const GRAPH_MAX_NODES: Bounds = Bounds::new(240, 20, 1200);
pub const GRAPH_MAX_EDGES: Bounds = Bounds::new(400, 20, 2400);
pub const ANCHOR_LIMIT: Bounds = Bounds::new(3, 1, 12);
pub const RISK_LIMIT: Bounds = Bounds::new(3, 1, 12);

/// Effective options for one brief request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BriefOptions {
    pub query: String,
    pub max_chars: u32,
    pub file_limit: u32,
    pub anchor_limit: u32,
    pub risk_limit: u32,
    pub memory_limit: u32,
    pub include_memory: bool,
}

impl BriefOptions {
    pub fn from_params(params: &Params) -> GatewayResult<Self> {
        Ok(Self {
            query: required_query(params)?,
            max_chars: clamp_number(first_of(params, &["budget", "max_chars"]), BRIEF_MAX_CHARS),
            file_limit: clamp_number(params.get("file_limit"), BRIEF_FILE_LIMIT),
            anchor_limit: clamp_number(params.get("anchor_limit"), ANCHOR_LIMIT),
            risk_limit: clamp_number(params.get("risk_limit"), RISK_LIMIT),
            memory_limit: clamp_number(params.get("memory_limit"), BRIEF_MEMORY_LIMIT),
            include_memory: to_bool(params.get("include_memory"), true),
        })
    }
}

/// Effective options for one graph request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphOptions {
    pub query: String,
    pub file_limit: u32,
    pub anchor_limit: u32,
    pub risk_limit: u32,
    pub memory_limit: u32,
    pub max_nodes: u32,
    pub max_edges: u32,
    pub include_memory: bool,
}

impl GraphOptions {
    pub fn from_params(params: &Params) -> GatewayResult<Self> {
        Ok(Self {
            query: required_query(params)?,
            file_limit: clamp_number(params.get("file_limit"), GRAPH_FILE_LIMIT),
            anchor_limit: clamp_number(params.get("anchor_limit"), ANCHOR_LIMIT),
            risk_limit: clamp_number(params.get("risk_limit"), RISK_LIMIT),
            memory_limit: clamp_number(params.get("memory_limit"), GRAPH_MEMORY_LIMIT),
            max_nodes: clamp_number(params.get("max_nodes"), GRAPH_MAX_NODES),
            max_edges: clamp_number(params.get("max_edges"), GRAPH_MAX_EDGES),
            include_memory: to_bool(params.get("include_memory"), true),
        })
    }
}
