//! CLI command handlers. Everything here is single-row bookkeeping against
//! the store; the interesting control flow lives in the scheduler.

use anyhow::{bail, Context, Result};
use tokio::sync::watch;

use crate::config::Config;
use crate::db::{Database, User};
use crate::rss::build_http_client;
use crate::scheduler;

async fn current_user(db: &Database, config: &Config) -> Result<User> {
    let name = config
        .current_user_name
        .as_deref()
        .context("not logged in - run `heron login <name>` first")?;
    db.get_user(name)
        .await?
        .with_context(|| format!("user {} not found - please register first", name))
}

pub async fn register(db: &Database, config: &mut Config, name: &str) -> Result<()> {
    let Some(user) = db.create_user(name).await? else {
        bail!("user {} already exists", name);
    };
    config.set_user(&user.name)?;
    println!("User created and logged in: {}", user.name);
    Ok(())
}

pub async fn login(db: &Database, config: &mut Config, name: &str) -> Result<()> {
    if db.get_user(name).await?.is_none() {
        bail!("user {} not found", name);
    }
    config.set_user(name)?;
    println!("User has been set to {}", name);
    Ok(())
}

pub async fn reset(db: &Database) -> Result<()> {
    db.reset_users().await.context("failed to reset users")?;
    println!("All users deleted");
    Ok(())
}

pub async fn users(db: &Database, config: &Config) -> Result<()> {
    let current = config.current_user_name.as_deref();
    for user in db.get_users().await? {
        if Some(user.name.as_str()) == current {
            println!("* {} (current)", user.name);
        } else {
            println!("* {}", user.name);
        }
    }
    Ok(())
}

fn ensure_http_url(raw: &str) -> Result<()> {
    let parsed = url::Url::parse(raw).with_context(|| format!("invalid URL {:?}", raw))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        bail!("feed URL must be http or https, got {:?}", raw);
    }
    Ok(())
}

pub async fn add_feed(db: &Database, config: &Config, name: &str, url: &str) -> Result<()> {
    ensure_http_url(url)?;
    let user = current_user(db, config).await?;
    let feed = db
        .create_feed(name, url, user.id)
        .await
        .context("failed to create feed")?;
    db.create_follow(user.id, feed.id)
        .await
        .context("failed to follow feed")?;

    println!("Feed created:");
    println!("  Name: {}", feed.name);
    println!("  URL:  {}", feed.url);
    println!("Following feed: {}", feed.name);
    Ok(())
}

pub async fn feeds(db: &Database) -> Result<()> {
    for (feed_name, url, owner) in db.get_feeds_with_owners().await? {
        println!("Feed: {} Created by: {} URL: {}", feed_name, owner, url);
    }
    Ok(())
}

pub async fn follow(db: &Database, config: &Config, url: &str) -> Result<()> {
    let user = current_user(db, config).await?;
    let feed = db
        .get_feed_by_url(url)
        .await?
        .with_context(|| format!("feed {} not found - add it first", url))?;
    db.create_follow(user.id, feed.id)
        .await
        .context("failed to follow feed")?;
    println!("{} is now following {}", user.name, feed.name);
    Ok(())
}

pub async fn unfollow(db: &Database, config: &Config, url: &str) -> Result<()> {
    let user = current_user(db, config).await?;
    let feed = db
        .get_feed_by_url(url)
        .await?
        .with_context(|| format!("feed {} not found", url))?;
    if !db.delete_follow(user.id, feed.id).await? {
        bail!("{} is not following {}", user.name, feed.name);
    }
    println!("{} unfollowed {}", user.name, feed.name);
    Ok(())
}

pub async fn following(db: &Database, config: &Config) -> Result<()> {
    let user = current_user(db, config).await?;
    println!("{} is following:", user.name);
    for followed in db.follows_for_user(user.id).await? {
        println!("* {}", followed.feed_name);
    }
    Ok(())
}

pub async fn browse(db: &Database, config: &Config, limit: Option<i64>) -> Result<()> {
    let limit = limit.unwrap_or(2);
    if limit <= 0 {
        // A negative LIMIT means "no limit" to sqlite.
        bail!("limit must be a positive number, got {}", limit);
    }
    let user = current_user(db, config).await?;
    let posts = db.posts_for_user(user.id, limit).await?;
    for post in posts {
        println!("{}", post.title.as_deref().unwrap_or("(untitled)"));
        println!("Link: {}", post.url);
        println!("-----");
    }
    Ok(())
}

/// Validate the interval up front, then run the scheduler until ctrl-c.
pub async fn aggregate(
    db: &Database,
    interval: &str,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let fetch_interval = scheduler::parse_interval(interval)
        .with_context(|| format!("invalid fetch interval {:?}", interval))?;
    let client = build_http_client()?;
    scheduler::run(db, &client, fetch_interval, shutdown).await
}
