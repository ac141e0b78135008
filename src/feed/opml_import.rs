use std::fs::File;
use std::path::Path;

use opml::{Outline, OPML};

use crate::error::Result;
use crate::models::NewFeed;

/// Reads every outline carrying an `xmlUrl`, including nested folders.
pub fn parse_opml_file(path: &Path) -> Result<Vec<NewFeed>> {
    let mut file = File::open(path)?;
    let document = OPML::from_reader(&mut file)?;

    let mut feeds = Vec::new();
    collect_feeds(&document.body.outlines, &mut feeds);
    Ok(feeds)
}

fn collect_feeds(outlines: &[Outline], feeds: &mut Vec<NewFeed>) {
    for outline in outlines {
        if let Some(url) = outline.xml_url.as_ref().filter(|u| !u.trim().is_empty()) {
            let display_name = outline
                .title
                .clone()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| outline.text.clone());
            feeds.push(NewFeed {
                url: url.trim().to_string(),
                display_name,
            });
        }
        collect_feeds(&outline.outlines, feeds);
    }
}
