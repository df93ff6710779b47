use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use crate::models::{Classroom, NewOccupancy, NewRoomRequest, RoomRequest, TimetableRecord};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Invalid backend URL: {0}")]
    Url(#[from] url::ParseError),
    /// The store answered with a non-success status; `message` is what it said.
    #[error("{message}")]
    Rejected { status: u16, message: String },
}

/// Client for the hosted tables (PostgREST dialect).
#[derive(Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: Arc<Url>,
    api_key: Arc<str>,
}

impl BackendClient {
    pub fn new(base_url: Url, api_key: impl Into<Arc<str>>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: Arc::new(base_url),
            api_key: api_key.into(),
        }
    }

    fn table_url(&self, table: &str, params: &[(&str, String)]) -> Result<Url, BackendError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let url = Url::parse_with_params(&format!("{base}/rest/v1/{table}"), params)?;
        Ok(url)
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        self.client
            .request(method, url.as_str())
            .header("apikey", self.api_key.as_ref())
            .bearer_auth(self.api_key.as_ref())
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, BackendError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(BackendError::Rejected {
            status: status.as_u16(),
            message: rejection_message(&body, status.canonical_reason()),
        })
    }

    async fn fetch<T: DeserializeOwned>(&self, url: Url) -> Result<T, BackendError> {
        let response = self.send(self.request(reqwest::Method::GET, url)).await?;
        Ok(response.json::<T>().await?)
    }

    async fn insert<T: Serialize + ?Sized>(&self, table: &str, rows: &T) -> Result<(), BackendError> {
        let url = self.table_url(table, &[])?;
        let builder = self
            .request(reqwest::Method::POST, url)
            .header("Prefer", "return=minimal")
            .json(rows);
        self.send(builder).await?;
        Ok(())
    }

    /// Room directory ordered by room number.
    pub async fn fetch_classrooms(&self) -> Result<Vec<Classroom>, BackendError> {
        let url = self.table_url(
            "classrooms",
            &[
                ("select", "id,room_number,building".to_string()),
                ("order", "room_number.asc".to_string()),
            ],
        )?;
        self.fetch(url).await
    }

    /// Writes the whole batch in a single request.
    pub async fn insert_timetable(&self, rows: &[TimetableRecord]) -> Result<(), BackendError> {
        self.insert("timetable", rows).await
    }

    /// Closes every occupancy of `classroom_id` that has not ended by `now`.
    pub async fn end_active_occupancy(
        &self,
        classroom_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), BackendError> {
        let now = now.to_rfc3339_opts(SecondsFormat::Millis, true);
        let url = self.table_url(
            "classroom_occupancy",
            &[
                ("classroom_id", format!("eq.{classroom_id}")),
                ("end_time", format!("gte.{now}")),
            ],
        )?;
        let builder = self
            .request(reqwest::Method::PATCH, url)
            .json(&serde_json::json!({ "end_time": now }));
        self.send(builder).await?;
        Ok(())
    }

    pub async fn insert_occupancy(&self, row: &NewOccupancy) -> Result<(), BackendError> {
        self.insert("classroom_occupancy", row).await
    }

    pub async fn insert_room_request(&self, row: &NewRoomRequest) -> Result<(), BackendError> {
        self.insert("room_requests", row).await
    }

    /// Newest room requests first.
    pub async fn recent_room_requests(&self, limit: usize) -> Result<Vec<RoomRequest>, BackendError> {
        let url = self.table_url(
            "room_requests",
            &[
                ("select", "*".to_string()),
                ("order", "created_at.desc".to_string()),
                ("limit", limit.to_string()),
            ],
        )?;
        self.fetch(url).await
    }
}

fn rejection_message(body: &str, reason: Option<&str>) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .unwrap_or_else(|| reason.unwrap_or("Request failed").to_string())
}
