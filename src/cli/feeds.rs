use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;

use super::{single_arg, Handler, State, UserHandler};
use crate::storage::{DatabaseError, Source, User};
use crate::util::validate_url;

async fn source_by_url(state: &State, url: &str) -> Result<Source> {
    state
        .db
        .get_source_by_url(url)
        .await
        .context("Failed to look up feed")?
        .ok_or_else(|| anyhow!("No feed registered for {}", url))
}

/// `addfeed <name> <url>`: register a source and follow it.
pub struct AddFeed;

#[async_trait]
impl UserHandler for AddFeed {
    async fn run(&self, state: &mut State, args: &[String], user: &User) -> Result<()> {
        let [name, raw_url] = args else {
            bail!("usage: addfeed <name> <url>");
        };
        let url = validate_url(raw_url).with_context(|| format!("Refusing feed URL {}", raw_url))?;

        let source = match state
            .db
            .create_source_with_follow(name, url.as_str(), user.id)
            .await
        {
            Ok(source) => source,
            Err(DatabaseError::UniqueViolation(_)) => {
                bail!("A feed for {} is already registered", url)
            }
            Err(e) => return Err(e).context("Failed to add feed"),
        };

        tracing::info!(source_id = source.id, url = %source.url, "Added feed");
        println!("Added feed {} ({}) for {}", source.name, source.url, user.name);
        Ok(())
    }
}

/// `feeds`: every registered source with its owner.
pub struct ListFeeds;

#[async_trait]
impl Handler for ListFeeds {
    async fn run(&self, state: &mut State, _args: &[String]) -> Result<()> {
        let sources = state.db.list_sources().await.context("Failed to list feeds")?;
        if sources.is_empty() {
            println!("No feeds registered");
        }
        for source in sources {
            println!("* {} <{}> added by {}", source.name, source.url, source.owner);
        }
        Ok(())
    }
}

/// `follow <url>`
pub struct Follow;

#[async_trait]
impl UserHandler for Follow {
    async fn run(&self, state: &mut State, args: &[String], user: &User) -> Result<()> {
        let url = single_arg(args, "follow <url>")?;
        let source = source_by_url(state, url).await?;

        match state.db.follow_source(user.id, source.id).await {
            Ok(_) => {}
            Err(DatabaseError::UniqueViolation(_)) => {
                bail!("{} already follows {}", user.name, source.name)
            }
            Err(e) => return Err(e).context("Failed to follow feed"),
        }

        println!("{} now follows {}", user.name, source.name);
        Ok(())
    }
}

/// `following`
pub struct Following;

#[async_trait]
impl UserHandler for Following {
    async fn run(&self, state: &mut State, _args: &[String], user: &User) -> Result<()> {
        let sources = state
            .db
            .followed_sources(user.id)
            .await
            .context("Failed to list followed feeds")?;
        for source in sources {
            println!("* {} <{}>", source.name, source.url);
        }
        Ok(())
    }
}

/// `unfollow <url>`
pub struct Unfollow;

#[async_trait]
impl UserHandler for Unfollow {
    async fn run(&self, state: &mut State, args: &[String], user: &User) -> Result<()> {
        let url = single_arg(args, "unfollow <url>")?;
        let source = source_by_url(state, url).await?;

        let removed = state
            .db
            .unfollow_source(user.id, source.id)
            .await
            .context("Failed to unfollow feed")?;
        if !removed {
            bail!("{} does not follow {}", user.name, source.name);
        }

        println!("{} unfollowed {}", user.name, source.name);
        Ok(())
    }
}
