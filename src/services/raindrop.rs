use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::Item;

const RAINDROP_API_URL: &str = "https://api.raindrop.io/rest/v1";

#[derive(Debug, Serialize)]
struct CreateRaindropRequest {
    link: String,
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    excerpt: Option<String>,
    tags: Vec<String>,
    #[serde(rename = "pleaseParse")]
    please_parse: PleaseParse,
    #[serde(skip_serializing_if = "Option::is_none")]
    collection: Option<CollectionRef>,
}

#[derive(Debug, Serialize)]
struct CollectionRef {
    #[serde(rename = "$id")]
    id: i64,
}

#[derive(Debug, Serialize)]
struct PleaseParse {}

#[derive(Debug, Deserialize)]
struct RaindropResponse {
    result: bool,
    item: Option<RaindropItem>,
}

#[derive(Debug, Deserialize)]
struct RaindropItem {
    #[serde(rename = "_id")]
    id: i64,
}

#[derive(Debug, Deserialize)]
struct CollectionsResponse {
    items: Vec<Collection>,
}

#[derive(Debug, Deserialize)]
struct Collection {
    #[serde(rename = "_id")]
    id: i64,
    title: String,
}

/// Saves items as Raindrop.io bookmarks.
pub struct RaindropClient {
    client: Client,
    access_token: String,
    collection_name: Option<String>,
    tags: Vec<String>,
    // Outer None: not looked up yet. Inner None: save to Unsorted.
    collection_id: Mutex<Option<Option<i64>>>,
}

impl RaindropClient {
    pub fn new(
        access_token: String,
        collection_name: Option<String>,
        tags: Vec<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            access_token,
            collection_name,
            tags,
            collection_id: Mutex::new(None),
        })
    }

    /// Resolves the configured collection title to its id once per client.
    async fn target_collection(&self) -> Result<Option<i64>> {
        let Some(name) = self.collection_name.as_deref() else {
            return Ok(None);
        };

        let mut cached = self.collection_id.lock().await;
        if let Some(id) = *cached {
            return Ok(id);
        }

        let response = self
            .client
            .get(format!("{}/collections", RAINDROP_API_URL))
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::warn!("Failed to fetch collections, will save to unsorted");
            return Ok(None);
        }

        let collections: CollectionsResponse = response.json().await?;
        let id = find_collection(&collections.items, name);
        if id.is_none() {
            tracing::warn!("Collection '{}' not found, will save to unsorted", name);
        }

        *cached = Some(id);
        Ok(id)
    }

    /// Save a bookmark and return its Raindrop id.
    pub async fn save_bookmark(&self, url: &str, title: &str, excerpt: Option<&str>) -> Result<i64> {
        let collection = self.target_collection().await?.map(|id| CollectionRef { id });

        let request = CreateRaindropRequest {
            link: url.to_string(),
            title: title.to_string(),
            excerpt: excerpt.filter(|e| !e.is_empty()).map(|e| e.to_string()),
            tags: self.tags.clone(),
            please_parse: PleaseParse {},
            collection,
        };

        let response = self
            .client
            .post(format!("{}/raindrop", RAINDROP_API_URL))
            .bearer_auth(&self.access_token)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(AppError::RaindropApi(format!("API error: {}", error_text)));
        }

        let raindrop_response: RaindropResponse = response.json().await?;
        if !raindrop_response.result {
            return Err(AppError::RaindropApi("API returned failure".to_string()));
        }

        raindrop_response
            .item
            .map(|item| item.id)
            .ok_or_else(|| AppError::RaindropApi("No item returned from API".to_string()))
    }

    /// Bookmarks an item, using its summary as the excerpt.
    pub async fn save_item(&self, item: &Item) -> Result<i64> {
        self.save_bookmark(&item.url, &item.title, Some(&item.summary))
            .await
    }
}

fn find_collection(collections: &[Collection], name: &str) -> Option<i64> {
    collections.iter().find(|c| c.title == name).map(|c| c.id)
}
