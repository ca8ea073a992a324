//! Runtime settings for the gift experience
//!
//! Loaded from the database `settings` table. Missing or NULL settings are
//! initialized with built-in defaults; values that fail to parse are logged
//! and replaced by the default for this run.

use regalo_common::db::settings::{ensure_setting, get_setting};
use serde::Serialize;
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::error::{Error, Result};
use crate::reveal::gate::Gate;

/// Phrase shown when the drawn id is missing from the catalog (lenient policy)
pub const DEFAULT_FALLBACK_PHRASE: &str = "¡Que el 2026 te sorprenda con grandes proyectos!";

/// Number of phrases in the catalog (N)
pub const DEFAULT_CATALOG_SIZE: i64 = 50;

/// How the variant index is chosen for a new assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantPolicy {
    /// Uniform draw over [0, M-1], independent of the phrase
    IndependentDraw,
    /// `phrase_id mod M`
    DerivedFromPhraseId,
}

impl FromStr for VariantPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "independent_draw" => Ok(VariantPolicy::IndependentDraw),
            "derived_from_phrase_id" => Ok(VariantPolicy::DerivedFromPhraseId),
            other => Err(Error::Config(format!("unknown variant_policy '{}'", other))),
        }
    }
}

/// What happens when the drawn phrase id has no catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogMissPolicy {
    /// Show the generic fallback phrase and proceed
    Fallback,
    /// Fail the resolution; the session goes to `Error`
    Fail,
}

impl FromStr for CatalogMissPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "fallback" => Ok(CatalogMissPolicy::Fallback),
            "fail" => Ok(CatalogMissPolicy::Fail),
            other => Err(Error::Config(format!("unknown on_catalog_miss '{}'", other))),
        }
    }
}

/// Runtime settings
#[derive(Debug, Clone)]
pub struct GiftSettings {
    pub catalog_size: i64,
    pub variant_policy: VariantPolicy,
    pub on_catalog_miss: CatalogMissPolicy,
    pub fallback_phrase: String,
    pub gate: Gate,
    /// `Opening → Playing` animation beat
    pub opening_delay: Duration,
    /// Countdown recomputation period while `Waiting`
    pub countdown_tick: Duration,
    /// How long a session outlives its last event stream
    pub stream_grace: Duration,
    /// Age after which a session with no event stream is swept
    pub session_ttl: Duration,
}

impl Default for GiftSettings {
    fn default() -> Self {
        Self {
            catalog_size: DEFAULT_CATALOG_SIZE,
            variant_policy: VariantPolicy::DerivedFromPhraseId,
            on_catalog_miss: CatalogMissPolicy::Fallback,
            fallback_phrase: DEFAULT_FALLBACK_PHRASE.to_string(),
            gate: Gate::None,
            opening_delay: Duration::from_millis(800),
            countdown_tick: Duration::from_millis(1000),
            stream_grace: Duration::from_millis(10_000),
            session_ttl: Duration::from_millis(1_800_000),
        }
    }
}

impl GiftSettings {
    /// Load runtime settings from database, writing defaults where missing
    pub async fn load(pool: &SqlitePool) -> Result<Self> {
        let defaults = Self::default();

        ensure_setting(pool, "catalog_size", &defaults.catalog_size.to_string()).await?;
        ensure_setting(pool, "variant_policy", "derived_from_phrase_id").await?;
        ensure_setting(pool, "on_catalog_miss", "fallback").await?;
        ensure_setting(pool, "fallback_phrase", &defaults.fallback_phrase).await?;
        ensure_setting(pool, "reveal_at", "").await?;
        ensure_setting(pool, "opening_delay_ms", "800").await?;
        ensure_setting(pool, "countdown_tick_ms", "1000").await?;
        ensure_setting(pool, "stream_grace_ms", "10000").await?;
        ensure_setting(pool, "session_ttl_ms", "1800000").await?;

        let catalog_size = parse_or_default(pool, "catalog_size", defaults.catalog_size, |s| {
            match s.trim().parse::<i64>() {
                Ok(n) if n >= 1 => Ok(n),
                _ => Err(Error::Config(format!("catalog_size '{}' must be >= 1", s))),
            }
        })
        .await?;

        let variant_policy =
            parse_or_default(pool, "variant_policy", defaults.variant_policy, str::parse).await?;

        let on_catalog_miss =
            parse_or_default(pool, "on_catalog_miss", defaults.on_catalog_miss, str::parse)
                .await?;

        let fallback_phrase = match get_setting(pool, "fallback_phrase").await? {
            Some(text) if !text.trim().is_empty() => text,
            _ => defaults.fallback_phrase.clone(),
        };

        let gate = parse_or_default(pool, "reveal_at", defaults.gate, Gate::parse_setting).await?;

        let opening_delay =
            parse_or_default(pool, "opening_delay_ms", defaults.opening_delay, parse_millis)
                .await?;

        let countdown_tick = parse_or_default(
            pool,
            "countdown_tick_ms",
            defaults.countdown_tick,
            |s| match parse_millis(s)? {
                d if d.is_zero() => Err(Error::Config("countdown_tick_ms must be > 0".into())),
                d => Ok(d),
            },
        )
        .await?;

        let stream_grace =
            parse_or_default(pool, "stream_grace_ms", defaults.stream_grace, parse_millis).await?;

        let session_ttl = parse_or_default(
            pool,
            "session_ttl_ms",
            defaults.session_ttl,
            |s| match parse_millis(s)? {
                d if d.is_zero() => Err(Error::Config("session_ttl_ms must be > 0".into())),
                d => Ok(d),
            },
        )
        .await?;

        Ok(Self {
            catalog_size,
            variant_policy,
            on_catalog_miss,
            fallback_phrase,
            gate,
            opening_delay,
            countdown_tick,
            stream_grace,
            session_ttl,
        })
    }
}

fn parse_millis(s: &str) -> Result<Duration> {
    s.trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|e| Error::Config(format!("'{}': {}", s, e)))
}

async fn parse_or_default<T: std::fmt::Debug>(
    pool: &SqlitePool,
    key: &str,
    default: T,
    parse: impl Fn(&str) -> Result<T>,
) -> Result<T> {
    let Some(raw) = get_setting(pool, key).await? else {
        return Ok(default);
    };

    match parse(&raw) {
        Ok(value) => Ok(value),
        Err(e) => {
            warn!("Invalid setting {}: {}; using default {:?}", key, e, default);
            Ok(default)
        }
    }
}
