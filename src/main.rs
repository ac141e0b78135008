use std::sync::Arc;
use std::time::Duration;

mod ai;
mod app;
mod cli;
mod config;
mod db;
mod error;
mod feed;
mod models;
mod services;
#[cfg(test)]
mod testing;

use ai::{OllamaClient, RelevanceScorer};
use app::{App, RefreshSummary};
use clap::Parser;
use cli::{Cli, Command};
use config::Config;
use db::Repository;
use error::Result;
use feed::{FeedFetcher, Ingestor};
use models::{Item, NewFeed};
use services::RaindropClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (only show warnings and errors by default)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let command = Cli::parse().into_command();

    let config = Config::load()?;

    let repository = Arc::new(Repository::new(&config.db_path).await?);
    let fetcher = Arc::new(FeedFetcher::new()?);
    let embedder = Arc::new(OllamaClient::new(&config.ollama_host, &config.ollama_model)?);
    tracing::debug!("Embedding with {} at {}", embedder.model(), config.ollama_host);
    let raindrop = config
        .raindrop_token
        .clone()
        .map(|token| {
            RaindropClient::new(
                token,
                config.raindrop_collection.clone(),
                config.default_tags.clone(),
            )
        })
        .transpose()?;

    let app = App::new(
        repository.clone(),
        Ingestor::new(repository.clone(), fetcher.clone()),
        RelevanceScorer::new(repository.clone(), embedder),
        raindrop,
        config.max_age(),
    );
    app.sync_config(&config).await?;

    run(command, &app, &fetcher, &config).await
}

async fn run(command: Command, app: &App, fetcher: &FeedFetcher, config: &Config) -> Result<()> {
    match command {
        Command::List => print_items(&app.working_set().await?),

        Command::Refresh => {
            let summary = app.refresh().await?;
            print_refresh(&summary);
        }

        Command::Watch => {
            let period = Duration::from_secs(u64::from(config.refresh_interval_minutes.max(1)) * 60);
            let mut ticker = tokio::time::interval(period);
            let shutdown = tokio::signal::ctrl_c();
            tokio::pin!(shutdown);
            loop {
                tokio::select! {
                    _ = &mut shutdown => break,
                    _ = ticker.tick() => {}
                }
                tokio::select! {
                    _ = &mut shutdown => break,
                    result = app.refresh() => match result {
                        Ok(summary) => print_refresh(&summary),
                        Err(e) => tracing::error!("Refresh failed: {}", e),
                    },
                }
            }
        }

        Command::Show { id } => {
            let item = app.item(id).await?;
            println!("{}\n{}", item.title, item.url);
            println!(
                "Published: {} | Fetched: {} | Feed: {} | Score: {:.2}\n",
                item.published_at.format("%b %-d, %Y"),
                item.fetched_at.format("%b %-d, %Y"),
                item.feed_id,
                item.relevance_score
            );
            let text = html2text::from_read(item.body.as_bytes(), 80)
                .unwrap_or_else(|_| item.body.clone());
            println!("{}", text);
        }

        Command::Read { id } => {
            app.consume(id).await?;
            println!("Item {} marked as read", id);
        }

        Command::Open { id } => {
            let item = app.item(id).await?;
            open::that(&item.url)?;
        }

        Command::Save { id } => {
            let raindrop_id = app.save_to_raindrop(id).await?;
            println!("Saved to Raindrop.io ({})", raindrop_id);
        }

        Command::Cleanup => {
            let (summary, items) = app.housekeeping().await?;
            println!(
                "Removed {} expired and {} read items",
                summary.expired, summary.purged_read
            );
            println!("{} items stored", app.repository().count_items().await?);
            print_items(&items);
        }

        Command::Feeds => {
            for feed in app.repository().list_feeds(false).await? {
                let state = if feed.enabled { "" } else { " (disabled)" };
                println!(
                    "{:>4}  {}{}\n      {} (added {})",
                    feed.id,
                    feed.display_name,
                    state,
                    feed.url,
                    feed.created_at.format("%Y-%m-%d")
                );
            }
        }

        Command::AddFeed { url, name } => {
            let new_feed = if name.is_empty() {
                fetcher.discover_feed(&url).await?
            } else {
                NewFeed {
                    url,
                    display_name: name.join(" "),
                }
            };
            let feed = app.add_feed(new_feed).await?;
            println!("Added {} ({})", feed.display_name, feed.url);
        }

        Command::EnableFeed { id } => set_feed_enabled(app, id, true).await?,

        Command::DisableFeed { id } => set_feed_enabled(app, id, false).await?,

        Command::RemoveFeed { id } => {
            if !app.repository().delete_feed(id).await? {
                println!("No feed with id {}", id);
            }
        }

        Command::Interests => {
            for interest in app.repository().list_interests().await? {
                let cached = if interest.embedding.is_some() { "*" } else { " " };
                println!("{:>4} {} {:>5.2}  {}", interest.id, cached, interest.weight, interest.description);
            }
        }

        Command::AddInterest {
            weight,
            description,
        } => {
            let description = description.join(" ");
            if !app.add_interest(&description, weight).await? {
                println!("Interest already exists: {}", description);
            }
        }

        Command::Import { path } => {
            let (added, summary) = app.import_opml(&path).await?;
            println!("Imported {} feeds from {:?}", added, path);
            print_refresh(&summary);
        }
    }

    Ok(())
}

async fn set_feed_enabled(app: &App, id: i64, enabled: bool) -> Result<()> {
    if !app.repository().set_feed_enabled(id, enabled).await? {
        println!("No feed with id {}", id);
    }
    Ok(())
}

fn print_items(items: &[Item]) {
    if items.is_empty() {
        println!("No unread items");
        return;
    }
    for item in items {
        println!(
            "{:>5}  {:.2}  {}  {}",
            item.id,
            item.relevance_score,
            item.published_at.format("%b %d"),
            item.title
        );
    }
}

fn print_refresh(summary: &RefreshSummary) {
    println!(
        "Fetched {} new items ({} feeds, {} failed); scored {} ({} failed); expired {}",
        summary.ingest.new_items,
        summary.ingest.feeds_fetched,
        summary.ingest.feeds_failed,
        summary.scoring.scored,
        summary.scoring.failed,
        summary.expired
    );
    if summary.scoring.interests_skipped > 0 {
        println!(
            "{} interest embeddings could not be generated; scores may be partial",
            summary.scoring.interests_skipped
        );
    }
}
