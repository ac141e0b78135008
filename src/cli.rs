use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None, args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Same as `refresh`
    #[arg(long, hide = true)]
    pub refresh: bool,

    /// Same as `import <FILE>`
    #[arg(long, value_name = "FILE", hide = true)]
    pub import: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Show unread items, most relevant first (default)
    List,

    /// Fetch feeds, score new items, expire old ones
    Refresh,

    /// Refresh every refresh_interval_minutes until interrupted
    Watch,

    /// Print an item
    Show { id: i64 },

    /// Mark an item read and delete it
    Read { id: i64 },

    /// Open an item in the browser
    Open { id: i64 },

    /// Save an item to Raindrop.io
    Save { id: i64 },

    /// Drop expired and read items
    Cleanup,

    /// List feeds
    Feeds,

    /// Subscribe to a feed
    AddFeed {
        url: String,

        /// Display name, discovered from the page when omitted
        name: Vec<String>,
    },

    /// Enable a feed
    EnableFeed { id: i64 },

    /// Disable a feed
    DisableFeed { id: i64 },

    /// Delete a feed and its items
    RemoveFeed { id: i64 },

    /// List interests
    Interests,

    /// Add an interest to score items against
    AddInterest {
        weight: f64,

        #[arg(required = true)]
        description: Vec<String>,
    },

    /// Import feeds from an OPML file
    Import { path: PathBuf },
}

impl Cli {
    /// Resolves the legacy flags and the default command.
    pub fn into_command(self) -> Command {
        if let Some(path) = self.import {
            return Command::Import { path };
        }
        if self.refresh {
            return Command::Refresh;
        }
        self.command.unwrap_or(Command::List)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Command, clap::Error> {
        Cli::try_parse_from(std::iter::once("relevance-reader").chain(args.iter().copied()))
            .map(Cli::into_command)
    }

    #[test]
    fn no_arguments_lists() {
        assert_eq!(parse(&[]).unwrap(), Command::List);
    }

    #[test]
    fn parses_item_commands() {
        assert_eq!(parse(&["read", "42"]).unwrap(), Command::Read { id: 42 });
        assert_eq!(parse(&["save", "7"]).unwrap(), Command::Save { id: 7 });
        assert!(parse(&["read"]).is_err());
        assert!(parse(&["open", "abc"]).is_err());
    }

    #[test]
    fn parses_feed_commands() {
        assert_eq!(
            parse(&["add-feed", "https://e/rss", "My", "Blog"]).unwrap(),
            Command::AddFeed {
                url: "https://e/rss".to_string(),
                name: vec!["My".to_string(), "Blog".to_string()],
            }
        );
        assert_eq!(
            parse(&["add-feed", "https://e/rss"]).unwrap(),
            Command::AddFeed {
                url: "https://e/rss".to_string(),
                name: Vec::new(),
            }
        );
        assert_eq!(parse(&["disable-feed", "3"]).unwrap(), Command::DisableFeed { id: 3 });
    }

    #[test]
    fn parses_interest_with_multiword_description() {
        assert_eq!(
            parse(&["add-interest", "2.5", "distributed", "systems"]).unwrap(),
            Command::AddInterest {
                weight: 2.5,
                description: vec!["distributed".to_string(), "systems".to_string()],
            }
        );
        assert!(parse(&["add-interest", "heavy", "x"]).is_err());
        assert!(parse(&["add-interest", "1"]).is_err());
    }

    #[test]
    fn keeps_legacy_flags() {
        assert_eq!(parse(&["--refresh"]).unwrap(), Command::Refresh);
        assert_eq!(
            parse(&["--import", "subs.opml"]).unwrap(),
            Command::Import {
                path: PathBuf::from("subs.opml")
            }
        );
        assert!(parse(&["frobnicate"]).is_err());
    }
}
