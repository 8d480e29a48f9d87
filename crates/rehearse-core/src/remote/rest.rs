//! PostgREST table access.

use std::fmt;

use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{check_response, RemoteTarget};
use crate::error::{Error, Result};

#[derive(Clone)]
pub struct TableClient {
    target: RemoteTarget,
    client: Client,
    rest_url: String,
}

impl TableClient {
    pub fn new(target: RemoteTarget, client: Client) -> Self {
        let rest_url = format!("{}/rest/v1", target.base_url);
        Self {
            target,
            client,
            rest_url,
        }
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.target
            .authorize(self.client.request(method, format!("{}/{table}", self.rest_url)))
    }

    /// Insert one row and return the stored representation.
    pub async fn insert<T, R>(&self, table: &str, row: &T) -> Result<R>
    where
        T: Serialize + Sync,
        R: DeserializeOwned,
    {
        let response = self
            .request(Method::POST, table)
            .header("Prefer", "return=representation")
            .json(row)
            .send()
            .await?;
        let rows = check_response(response).await?.json::<Vec<R>>().await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| Error::Remote(format!("Insert into {table} returned no rows")))
    }

    /// Select every column with the given PostgREST query parameters.
    pub async fn select<R>(&self, table: &str, query: &[(&str, String)]) -> Result<Vec<R>>
    where
        R: DeserializeOwned,
    {
        let response = self
            .request(Method::GET, table)
            .query(&[("select", "*")])
            .query(query)
            .send()
            .await?;
        Ok(check_response(response).await?.json::<Vec<R>>().await?)
    }

    /// Delete the rows matching the filters.
    pub async fn delete(&self, table: &str, filters: &[(&str, String)]) -> Result<()> {
        if filters.is_empty() {
            return Err(Error::InvalidInput(
                "Refusing to delete without a filter".to_string(),
            ));
        }
        let response = self
            .request(Method::DELETE, table)
            .query(filters)
            .send()
            .await?;
        check_response(response).await?;
        Ok(())
    }
}

impl fmt::Debug for TableClient {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("TableClient")
            .field("rest_url", &self.rest_url)
            .finish_non_exhaustive()
    }
}

/// `column=eq.value`
pub fn eq(column: &'static str, value: impl fmt::Display) -> (&'static str, String) {
    (column, format!("eq.{value}"))
}

/// `order=column.desc`
pub fn order_desc(column: &str) -> (&'static str, String) {
    ("order", format!("{column}.desc"))
}
