//! Fixed-interval fetch loop.
//!
//! Each tick picks the least recently fetched source, stamps it as fetched,
//! then fetches, parses and reconciles it. Ticks run one after another on the
//! calling task; a slow tick delays the next one instead of overlapping it.
//! Only a failure to *select* a source ends the loop.

use std::convert::Infallible;
use std::time::Duration;
use thiserror::Error;
use tokio::time::MissedTickBehavior;

use crate::feed::{ingest, Fetcher, IngestError};
use crate::storage::{Database, DatabaseError};

#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Zero, empty or unparsable interval. Raised before the loop starts.
    #[error("Invalid interval: {0}")]
    InvalidInterval(String),

    /// The store could not answer "which source is next".
    #[error("Failed to select next source: {0}")]
    Selection(#[source] DatabaseError),
}

/// What a single tick did.
#[derive(Debug)]
pub enum TickOutcome {
    /// No sources are registered.
    Idle,
    /// The source could not be stamped as fetched; nothing was fetched.
    Abandoned { source_id: i64, error: DatabaseError },
    Ingested { source_id: i64, inserted: usize },
    Failed { source_id: i64, error: IngestError },
}

/// Parses a duration such as `500ms`, `30s`, `1m`, `1.5h` or `1h30m`.
///
/// Units: `ns`, `us`/`µs`, `ms`, `s`, `m`, `h`. Every number needs a unit.
pub fn parse_interval(input: &str) -> Result<Duration, SchedulerError> {
    let invalid = |reason: &str| SchedulerError::InvalidInterval(format!("{:?}: {}", input, reason));

    let mut rest = input.trim();
    if rest.is_empty() {
        return Err(invalid("empty duration"));
    }

    let mut total_nanos = 0f64;
    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(number_end);
        if number.is_empty() {
            return Err(invalid("expected a number"));
        }
        let value: f64 = number.parse().map_err(|_| invalid("malformed number"))?;

        let unit_end = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, next) = tail.split_at(unit_end);
        let nanos_per_unit = match unit {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3_600e9,
            "" => return Err(invalid("missing unit")),
            _ => return Err(invalid("unknown unit")),
        };

        total_nanos += value * nanos_per_unit;
        rest = next;
    }

    if total_nanos > u64::MAX as f64 {
        return Err(invalid("duration too large"));
    }
    let interval = Duration::from_nanos(total_nanos.round() as u64);
    if interval.is_zero() {
        return Err(invalid("interval must be positive"));
    }
    Ok(interval)
}

/// Drives ingestion, one source per tick.
pub struct Scheduler {
    db: Database,
    fetcher: Fetcher,
}

impl Scheduler {
    pub fn new(db: Database, fetcher: Fetcher) -> Self {
        Self { db, fetcher }
    }

    /// Ticks immediately, then once per `interval`, until source selection fails.
    pub async fn run(&self, interval: Duration) -> Result<Infallible, SchedulerError> {
        if interval.is_zero() {
            return Err(SchedulerError::InvalidInterval(
                "interval must be positive".to_string(),
            ));
        }

        tracing::info!(interval = ?interval, "Collecting feeds");
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            timer.tick().await;
            self.tick().await?;
        }
    }

    /// Runs one select → mark → fetch → parse → reconcile pass.
    ///
    /// Only a selection failure is returned as an error; everything after
    /// selection is reported through [`TickOutcome`] and logged.
    pub async fn tick(&self) -> Result<TickOutcome, SchedulerError> {
        let Some(source) = self
            .db
            .select_next_source()
            .await
            .map_err(SchedulerError::Selection)?
        else {
            tracing::info!("No sources registered, nothing to fetch");
            return Ok(TickOutcome::Idle);
        };

        // Stamp before the network call so a hanging or failing source is not
        // picked again on the very next tick.
        if let Err(error) = self.db.mark_fetched(source.id).await {
            tracing::warn!(source_id = source.id, error = %error, "Failed to mark source fetched");
            return Ok(TickOutcome::Abandoned {
                source_id: source.id,
                error,
            });
        }

        match ingest(&self.db, &self.fetcher, &source).await {
            Ok(inserted) => {
                tracing::info!(
                    source_id = source.id,
                    name = %source.name,
                    inserted = inserted,
                    "Feed ingested"
                );
                Ok(TickOutcome::Ingested {
                    source_id: source.id,
                    inserted,
                })
            }
            Err(error) => {
                tracing::warn!(
                    source_id = source.id,
                    url = %source.url,
                    error = %error,
                    "Feed ingestion failed"
                );
                Ok(TickOutcome::Failed {
                    source_id: source.id,
                    error,
                })
            }
        }
    }
}
