use std::env;
use std::net::SocketAddr;

use anyhow::{Context, Result, bail};

use vigil_engine::{EngineConfig, SlaConfig};
use vigil_model::EndpointField;
use vigil_observe::{LoggerConfig, LoggerFormat, LoggerLevel};

/// Daemon configuration, read from `VIGIL_*` environment variables.
///
/// Everything has a default; an empty environment yields a daemon on
/// `0.0.0.0:8080` with text logs at `info` and deduplication on.
///
/// Variables:
/// - `VIGIL_BIND` - listen address (`host:port`)
/// - `VIGIL_LOG_LEVEL` - env-filter expression (`info`, `vigil_engine=debug,info`)
/// - `VIGIL_LOG_FORMAT` - `text` | `json` | `journald`
/// - `VIGIL_DEDUPE` - run deduplication after imports
/// - `VIGIL_FP_HISTORY` - apply false positive history on import
/// - `VIGIL_RETRO_FP_HISTORY` - spread fresh false positive verdicts
/// - `VIGIL_ENDPOINT_FIELDS` - comma list of endpoint parts to compare
/// - `VIGIL_SLA_CRITICAL` / `_HIGH` / `_MEDIUM` / `_LOW` - SLA windows in days
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub bind: SocketAddr,
    pub logger: LoggerConfig,
    pub engine: EngineConfig,
}

impl DaemonConfig {
    pub fn from_env() -> Result<Self> {
        let bind = match var("VIGIL_BIND") {
            Some(raw) => raw
                .parse::<SocketAddr>()
                .with_context(|| format!("VIGIL_BIND: invalid socket address {raw:?}"))?,
            None => SocketAddr::from(([0, 0, 0, 0], 8080)),
        };

        let mut logger = LoggerConfig::default();
        if let Some(raw) = var("VIGIL_LOG_LEVEL") {
            logger.level = LoggerLevel::new(raw)?;
        }
        if let Some(raw) = var("VIGIL_LOG_FORMAT") {
            logger.format = raw.parse::<LoggerFormat>()?;
        }

        let mut engine = EngineConfig::default();
        if let Some(raw) = var("VIGIL_DEDUPE") {
            engine.dedupe_enabled = parse_bool("VIGIL_DEDUPE", &raw)?;
        }
        if let Some(raw) = var("VIGIL_FP_HISTORY") {
            engine.false_positive_history = parse_bool("VIGIL_FP_HISTORY", &raw)?;
        }
        if let Some(raw) = var("VIGIL_RETRO_FP_HISTORY") {
            engine.retroactive_false_positive_history =
                parse_bool("VIGIL_RETRO_FP_HISTORY", &raw)?;
        }
        if let Some(raw) = var("VIGIL_ENDPOINT_FIELDS") {
            engine.endpoint_fields = parse_endpoint_fields(&raw)?;
        }
        engine.sla = SlaConfig {
            critical: parse_days("VIGIL_SLA_CRITICAL")?.unwrap_or(engine.sla.critical),
            high: parse_days("VIGIL_SLA_HIGH")?.unwrap_or(engine.sla.high),
            medium: parse_days("VIGIL_SLA_MEDIUM")?.unwrap_or(engine.sla.medium),
            low: parse_days("VIGIL_SLA_LOW")?.unwrap_or(engine.sla.low),
        };

        Ok(Self {
            bind,
            logger,
            engine,
        })
    }
}

/// Reads a variable, treating unset and blank the same.
fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("{name}: expected a boolean, got {other:?}"),
    }
}

fn parse_days(name: &str) -> Result<Option<u16>> {
    match var(name) {
        Some(raw) => {
            let days = raw
                .trim()
                .parse::<u16>()
                .with_context(|| format!("{name}: expected a number of days"))?;
            Ok(Some(days))
        }
        None => Ok(None),
    }
}

fn parse_endpoint_fields(raw: &str) -> Result<Vec<EndpointField>> {
    let mut fields = Vec::new();
    for piece in raw.split(',') {
        let piece = piece.trim();
        if piece.is_empty() {
            continue;
        }
        let field = piece
            .parse::<EndpointField>()
            .with_context(|| format!("VIGIL_ENDPOINT_FIELDS: unknown field {piece:?}"))?;
        if !fields.contains(&field) {
            fields.push(field);
        }
    }
    if fields.is_empty() {
        bail!("VIGIL_ENDPOINT_FIELDS: at least one field is required");
    }
    Ok(fields)
}
