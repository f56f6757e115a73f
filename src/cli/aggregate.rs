use anyhow::{Context, Result};
use async_trait::async_trait;

use super::{single_arg, Handler, State};
use crate::feed::Fetcher;
use crate::scheduler::{parse_interval, Scheduler};

/// `agg <interval>`: fetch feeds forever, one per interval.
///
/// Returns only if the store stops answering source selection.
pub struct Aggregate;

#[async_trait]
impl Handler for Aggregate {
    async fn run(&self, state: &mut State, args: &[String]) -> Result<()> {
        let raw = single_arg(args, "agg <interval>  (e.g. 30s, 1m, 1h)")?;
        let interval = parse_interval(raw)?;

        let fetcher =
            Fetcher::new(state.config.fetcher_config()).context("Failed to build HTTP client")?;
        let scheduler = Scheduler::new(state.db.clone(), fetcher);

        println!("Collecting feeds every {:?}", interval);
        match scheduler.run(interval).await {
            Ok(never) => match never {},
            Err(e) => Err(e).context("Feed collection stopped"),
        }
    }
}
