//! Supabase Storage buckets and objects.

use std::fmt;

use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;

use super::{check_response, RemoteTarget};
use crate::error::{Error, Result};

#[derive(Clone)]
pub struct StorageClient {
    target: RemoteTarget,
    client: Client,
    storage_url: String,
}

#[derive(Debug, Deserialize)]
struct BucketEntry {
    name: String,
}

impl StorageClient {
    pub fn new(target: RemoteTarget, client: Client) -> Self {
        let storage_url = format!("{}/storage/v1", target.base_url);
        Self {
            target,
            client,
            storage_url,
        }
    }

    fn request(&self, method: Method, route: &str) -> RequestBuilder {
        self.target
            .authorize(self.client.request(method, format!("{}{route}", self.storage_url)))
    }

    /// Upload a new object. Existing objects are never overwritten.
    pub async fn upload(
        &self,
        bucket: &str,
        object_path: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String> {
        validate_object_path(object_path)?;
        let route = format!("/object/{bucket}/{}", encode_path(object_path));
        let response = self
            .request(Method::POST, &route)
            .header("x-upsert", "false")
            .header("cache-control", "3600")
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;
        check_response(response).await?;
        tracing::debug!("Uploaded {}/{}", bucket, object_path);
        Ok(object_path.to_string())
    }

    #[must_use]
    pub fn public_url(&self, bucket: &str, object_path: &str) -> String {
        format!(
            "{}/object/public/{bucket}/{}",
            self.storage_url,
            encode_path(object_path)
        )
    }

    pub async fn remove(&self, bucket: &str, object_paths: &[String]) -> Result<()> {
        if object_paths.is_empty() {
            return Ok(());
        }
        let response = self
            .request(Method::DELETE, &format!("/object/{bucket}"))
            .json(&serde_json::json!({ "prefixes": object_paths }))
            .send()
            .await?;
        check_response(response).await?;
        Ok(())
    }

    pub async fn list_buckets(&self) -> Result<Vec<String>> {
        let response = self.request(Method::GET, "/bucket").send().await?;
        let buckets = check_response(response)
            .await?
            .json::<Vec<BucketEntry>>()
            .await?;
        Ok(buckets.into_iter().map(|bucket| bucket.name).collect())
    }
}

impl fmt::Debug for StorageClient {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("StorageClient")
            .field("storage_url", &self.storage_url)
            .finish_non_exhaustive()
    }
}

fn validate_object_path(object_path: &str) -> Result<()> {
    if object_path.trim().is_empty() {
        return Err(Error::InvalidInput("Object path must not be empty".to_string()));
    }
    if object_path.starts_with('/') || object_path.split('/').any(|part| part == "..") {
        return Err(Error::InvalidInput(format!(
            "Object path is not relative: {object_path}"
        )));
    }
    Ok(())
}

/// Percent-encode each segment, keeping the separators.
fn encode_path(object_path: &str) -> String {
    object_path
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
