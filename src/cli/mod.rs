//! Command registry and the handlers behind `gator <command> [args...]`.
//!
//! Every command is a [`Handler`] registered under its name in [`Commands`].
//! Commands that act on behalf of the current user implement [`UserHandler`]
//! instead and are wrapped with [`logged_in`], which resolves the user from
//! the config before the handler runs.

mod aggregate;
mod feeds;
mod users;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::config::Config;
use crate::storage::{Database, User};

pub use aggregate::Aggregate;
pub use feeds::{AddFeed, Follow, Following, ListFeeds, Unfollow};
pub use users::{ListUsers, Login, Register, Reset};

/// A parsed invocation: the command name and everything after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub args: Vec<String>,
}

/// Everything a handler may touch.
pub struct State {
    pub config: Config,
    /// Where `config` is saved when a handler changes it.
    pub config_path: PathBuf,
    pub db: Database,
}

impl State {
    /// Persist `config` to `config_path`.
    pub fn save_config(&self) -> Result<()> {
        self.config.save(&self.config_path).with_context(|| {
            format!("Failed to save config to {}", self.config_path.display())
        })
    }
}

#[async_trait]
pub trait Handler: Send + Sync {
    async fn run(&self, state: &mut State, args: &[String]) -> Result<()>;
}

/// A handler that needs the current user.
#[async_trait]
pub trait UserHandler: Send + Sync {
    async fn run(&self, state: &mut State, args: &[String], user: &User) -> Result<()>;
}

/// Adapts a [`UserHandler`] into a [`Handler`]. See [`logged_in`].
pub struct RequireUser<H>(H);

/// Wraps `handler` so it only runs when the configured current user exists.
pub fn logged_in<H: UserHandler>(handler: H) -> RequireUser<H> {
    RequireUser(handler)
}

#[async_trait]
impl<H: UserHandler> Handler for RequireUser<H> {
    async fn run(&self, state: &mut State, args: &[String]) -> Result<()> {
        let name = state
            .config
            .current_user
            .clone()
            .ok_or_else(|| anyhow!("Not logged in: run `gator login <name>` first"))?;

        let user = state
            .db
            .get_user_by_name(&name)
            .await
            .context("Failed to look up current user")?
            .ok_or_else(|| anyhow!("Current user {:?} does not exist", name))?;

        self.0.run(state, args, &user).await
    }
}

/// Name → handler lookup table.
#[derive(Default)]
pub struct Commands {
    handlers: HashMap<String, Box<dyn Handler>>,
}

impl Commands {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`, replacing any previous one.
    pub fn register(&mut self, name: &str, handler: impl Handler + 'static) {
        self.handlers.insert(name.to_string(), Box::new(handler));
    }

    pub async fn run(&self, state: &mut State, command: &Command) -> Result<()> {
        let Some(handler) = self.handlers.get(&command.name) else {
            bail!("Unknown command: {}", command.name);
        };
        tracing::debug!(command = %command.name, args = ?command.args, "Running command");
        handler.run(state, &command.args).await
    }

    /// Registered command names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// The full gator command set.
pub fn default_commands() -> Commands {
    let mut commands = Commands::new();
    commands.register("register", Register);
    commands.register("login", Login);
    commands.register("users", ListUsers);
    commands.register("reset", Reset);
    commands.register("agg", Aggregate);
    commands.register("feeds", ListFeeds);
    commands.register("addfeed", logged_in(AddFeed));
    commands.register("follow", logged_in(Follow));
    commands.register("following", logged_in(Following));
    commands.register("unfollow", logged_in(Unfollow));
    commands
}

/// Returns the single argument a command takes, or a usage error.
fn single_arg<'a>(args: &'a [String], usage: &str) -> Result<&'a str> {
    match args {
        [arg] => Ok(arg.as_str()),
        _ => bail!("usage: {}", usage),
    }
}
