//! User account commands.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::db;

pub async fn run_user_add(config: &Config, email: &str, password: &str) -> Result<()> {
    let queries = db::open_queries(config).await?;
    if !queries.get_user(email).await?.is_empty() {
        bail!("user already exists: {}", email);
    }
    let user = queries.create_user(email, password).await?;
    println!("Created user {} ({})", user.email, user.id);
    Ok(())
}

pub async fn run_user_guest(config: &Config) -> Result<()> {
    let queries = db::open_queries(config).await?;
    let user = queries.create_guest_user().await?;
    println!("Created guest user {} ({})", user.email, user.id);
    Ok(())
}

pub async fn run_user_show(config: &Config, email: &str) -> Result<()> {
    let queries = db::open_queries(config).await?;
    let users = queries.get_user(email).await?;
    if users.is_empty() {
        bail!("user not found: {}", email);
    }
    for user in &users {
        println!("{}  {}  {}", user.id, user.email, user.created_at.to_rfc3339());
    }
    Ok(())
}
