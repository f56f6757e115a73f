use anyhow::{bail, Context, Result};
use async_trait::async_trait;

use super::{single_arg, Handler, State};
use crate::storage::DatabaseError;

/// `register <name>`: create a user and switch to it.
pub struct Register;

#[async_trait]
impl Handler for Register {
    async fn run(&self, state: &mut State, args: &[String]) -> Result<()> {
        let name = single_arg(args, "register <name>")?;

        let user = match state.db.create_user(name).await {
            Ok(user) => user,
            Err(DatabaseError::UniqueViolation(_)) => bail!("User {:?} already exists", name),
            Err(e) => return Err(e).context("Failed to create user"),
        };

        state.config.set_current_user(&user.name);
        state.save_config()?;

        tracing::info!(user_id = user.id, name = %user.name, "Registered user");
        println!("User {} created", user.name);
        Ok(())
    }
}

/// `login <name>`: switch to an existing user.
pub struct Login;

#[async_trait]
impl Handler for Login {
    async fn run(&self, state: &mut State, args: &[String]) -> Result<()> {
        let name = single_arg(args, "login <name>")?;

        let Some(user) = state
            .db
            .get_user_by_name(name)
            .await
            .context("Failed to look up user")?
        else {
            bail!("User {:?} does not exist", name);
        };

        state.config.set_current_user(&user.name);
        state.save_config()?;

        println!("Logged in as {}", user.name);
        Ok(())
    }
}

/// `users`: list every user, marking the current one.
pub struct ListUsers;

#[async_trait]
impl Handler for ListUsers {
    async fn run(&self, state: &mut State, _args: &[String]) -> Result<()> {
        let users = state.db.list_users().await.context("Failed to list users")?;
        let current = state.config.current_user.as_deref();

        for user in users {
            if Some(user.name.as_str()) == current {
                println!("* {} (current)", user.name);
            } else {
                println!("* {}", user.name);
            }
        }
        Ok(())
    }
}

/// `reset`: delete every user, and with them all sources, follows and posts.
pub struct Reset;

#[async_trait]
impl Handler for Reset {
    async fn run(&self, state: &mut State, _args: &[String]) -> Result<()> {
        let removed = state
            .db
            .delete_all_users()
            .await
            .context("Failed to reset database")?;

        tracing::info!(users = removed, "Database reset");
        println!("Database reset: {} users removed", removed);
        Ok(())
    }
}
