//! OGC API client: processes, jobs, and feature collections.
//!
//! Every operation runs under its own [`RetrySession`](crate::retry::RetrySession) and returns
//! parsed JSON or an [`ApiError`]; transport failures never escape raw.

use crate::config::ServiceEndpoint;
use crate::error::{ApiError, ConfigError};
use crate::http::{HttpService, JsonObject, RawResponse, RequestSpec};
use crate::retry::RetryPolicy;
use reqwest::header::LOCATION;
use serde_json::{Value, json};
use tracing::debug;

/// Job statuses that mean results are ready to fetch.
const FINISHED_JOB_STATUSES: &[&str] = &["successful", "succeeded", "done", "complete", "completed"];

#[derive(Debug, Clone)]
pub struct OgcApiClient {
    http: HttpService,
    retry: RetryPolicy,
}

impl OgcApiClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP primitive cannot be built for `endpoint`.
    pub fn new(endpoint: &ServiceEndpoint) -> Result<Self, ConfigError> {
        Ok(Self {
            http: HttpService::new(endpoint)?,
            retry: endpoint.retry,
        })
    }

    /// Copy of this client using `retry` for every subsequent operation.
    #[must_use]
    pub fn with_retry_policy(&self, retry: RetryPolicy) -> Self {
        Self {
            http: self.http.clone(),
            retry,
        }
    }

    /// `GET /processes`.
    ///
    /// # Errors
    ///
    /// Returns an error for upstream statuses >= 400 or transport failures (after retries).
    pub async fn list_processes(&self) -> Result<Value, ApiError> {
        self.get_value(RequestSpec::get(["processes"])).await
    }

    /// `GET /processes/{processId}`; non-object bodies become `{}`.
    ///
    /// # Errors
    ///
    /// Returns an error for upstream statuses >= 400 or transport failures (after retries).
    pub async fn get_process(&self, process_id: &str) -> Result<JsonObject, ApiError> {
        self.retry
            .session()
            .run(|| async {
                let resp = self
                    .fetch(RequestSpec::get(["processes", process_id]))
                    .await?;
                Ok(resp.json_object())
            })
            .await
    }

    /// `POST /processes/{processId}/execution` with `inputs` (or `{}`) as the JSON body.
    ///
    /// When the response body names no job, the id is taken from the `Location` header.
    ///
    /// # Errors
    ///
    /// Returns an error for upstream statuses >= 400 or transport failures (after retries).
    pub async fn execute_process(
        &self,
        process_id: &str,
        inputs: Option<Value>,
    ) -> Result<JsonObject, ApiError> {
        let payload = inputs.unwrap_or_else(|| json!({}));
        self.retry
            .session()
            .run(|| async {
                let spec = RequestSpec::post(["processes", process_id, "execution"])
                    .json(payload.clone());
                let resp = self.fetch(spec).await?;
                Ok(execution_body(&resp))
            })
            .await
    }

    /// `GET /jobs/{jobId}`, plus `GET /jobs/{jobId}/results` once the job has finished.
    ///
    /// # Errors
    ///
    /// Returns an error if either request fails with status >= 400 or a transport failure.
    pub async fn job_status(&self, job_id: &str) -> Result<JobStatus, ApiError> {
        self.retry
            .session()
            .run(|| async {
                let resp = self.fetch(RequestSpec::get(["jobs", job_id])).await?;
                let mut job = JobStatus::from_body(resp.json_object());
                if job.is_finished() {
                    debug!(job_id, status = %job.status, "job finished; fetching results");
                    let results = self
                        .fetch(RequestSpec::get(["jobs", job_id, "results"]))
                        .await?;
                    job.results = Some(results.json_or_empty());
                }
                Ok(job)
            })
            .await
    }

    /// Status body for a running job, or `{status: <status body>, results: <results>}` once done.
    ///
    /// # Errors
    ///
    /// See [`OgcApiClient::job_status`].
    pub async fn get_job_status_or_results(&self, job_id: &str) -> Result<Value, ApiError> {
        self.job_status(job_id).await.map(JobStatus::into_value)
    }

    /// `GET /collections`.
    ///
    /// # Errors
    ///
    /// Returns an error for upstream statuses >= 400 or transport failures (after retries).
    pub async fn list_collections(&self) -> Result<Value, ApiError> {
        self.get_value(RequestSpec::get(["collections"])).await
    }

    /// `GET /collections/{collectionId}/items` with optional `bbox`, `limit` and `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error for upstream statuses >= 400 or transport failures (after retries).
    pub async fn get_collection_items(
        &self,
        collection_id: &str,
        query: &ItemsQuery,
    ) -> Result<Value, ApiError> {
        self.get_value(query.apply(RequestSpec::get(["collections", collection_id, "items"])))
            .await
    }

    /// `GET /collections?type=records` (OGC API - Records).
    ///
    /// # Errors
    ///
    /// Returns an error for upstream statuses >= 400 or transport failures (after retries).
    pub async fn list_record_collections(&self) -> Result<Value, ApiError> {
        self.get_value(RequestSpec::get(["collections"]).query("type", "records"))
            .await
    }

    /// `GET /search` with optional free-text `q` and `limit`.
    ///
    /// # Errors
    ///
    /// Returns an error for upstream statuses >= 400 or transport failures (after retries).
    pub async fn search_records(&self, search: &RecordSearch) -> Result<Value, ApiError> {
        self.get_value(search.apply(RequestSpec::get(["search"])))
            .await
    }

    /// Collections that may support EDR query patterns; the same listing as
    /// [`OgcApiClient::list_collections`].
    ///
    /// # Errors
    ///
    /// Returns an error for upstream statuses >= 400 or transport failures (after retries).
    pub async fn list_edr_collections(&self) -> Result<Value, ApiError> {
        self.list_collections().await
    }

    /// `GET /collections/{collectionId}/position` (OGC API - EDR).
    ///
    /// # Errors
    ///
    /// Returns an error for upstream statuses >= 400 or transport failures (after retries).
    pub async fn edr_position(
        &self,
        collection_id: &str,
        position: &PositionQuery,
    ) -> Result<Value, ApiError> {
        self.get_value(position.apply(RequestSpec::get([
            "collections",
            collection_id,
            "position",
        ])))
        .await
    }

    /// Retried GET returning the parsed body, or `{}` when it is empty or malformed.
    async fn get_value(&self, spec: RequestSpec) -> Result<Value, ApiError> {
        self.retry
            .session()
            .run(|| async {
                let resp = self.fetch(spec.clone()).await?;
                Ok(resp.json_or_empty())
            })
            .await
    }

    /// One attempt: send, convert transport failures, reject error statuses.
    async fn fetch(&self, spec: RequestSpec) -> Result<RawResponse, ApiError> {
        let resp = self.http.send(spec).await?;
        resp.error_for_status()
    }
}

fn execution_body(resp: &RawResponse) -> JsonObject {
    let mut out = resp.json_object();
    if out.contains_key("jobId") || out.contains_key("job_id") {
        return out;
    }
    if let Some(job_id) = resp
        .header_str(LOCATION.as_str())
        .and_then(job_id_from_location)
    {
        out.insert("jobId".to_string(), Value::String(job_id));
    }
    out
}

/// Final path segment of a job `Location` header (trailing slash ignored).
#[must_use]
pub fn job_id_from_location(location: &str) -> Option<String> {
    let trimmed = location.trim_end_matches('/');
    let id = trimmed.rsplit('/').next().unwrap_or(trimmed);
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

/// Interpreted `GET /jobs/{jobId}` response.
#[derive(Debug, Clone, PartialEq)]
pub struct JobStatus {
    /// Lower-cased `status` (or `jobStatus`) value; empty when absent.
    pub status: String,
    pub body: JsonObject,
    pub results: Option<Value>,
}

impl JobStatus {
    #[must_use]
    pub fn from_body(body: JsonObject) -> Self {
        let status = ["status", "jobStatus"]
            .iter()
            .filter_map(|key| body.get(*key).and_then(Value::as_str))
            .find(|s| !s.is_empty())
            .unwrap_or_default()
            .to_lowercase();
        Self {
            status,
            body,
            results: None,
        }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        FINISHED_JOB_STATUSES.contains(&self.status.as_str())
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        match self.results {
            Some(results) => json!({ "status": Value::Object(self.body), "results": results }),
            None => Value::Object(self.body),
        }
    }
}

/// Optional filters for collection item queries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemsQuery {
    pub bbox: Option<Vec<f64>>,
    pub limit: Option<u64>,
    pub filter: Option<String>,
}

impl ItemsQuery {
    fn apply(&self, mut spec: RequestSpec) -> RequestSpec {
        if let Some(bbox) = &self.bbox {
            spec = spec.query("bbox", join_numbers(bbox));
        }
        if let Some(limit) = self.limit {
            spec = spec.query("limit", limit.to_string());
        }
        if let Some(filter) = &self.filter {
            spec = spec.query("filter", filter.clone());
        }
        spec
    }
}

/// OGC API - Records search parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSearch {
    /// Free-text query; blank is not sent.
    pub q: Option<String>,
    pub limit: Option<u64>,
}

impl RecordSearch {
    fn apply(&self, mut spec: RequestSpec) -> RequestSpec {
        if let Some(q) = self.q.as_deref().filter(|q| !q.is_empty()) {
            spec = spec.query("q", q);
        }
        if let Some(limit) = self.limit {
            spec = spec.query("limit", limit.to_string());
        }
        spec
    }
}

/// EDR position query: `coords` are sent comma-joined, e.g. `[lon, lat]` becomes `lon,lat`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionQuery {
    pub coords: Vec<f64>,
    /// ISO 8601 instant or interval; blank is not sent.
    pub datetime: Option<String>,
}

impl PositionQuery {
    fn apply(&self, spec: RequestSpec) -> RequestSpec {
        let mut spec = spec.query("coords", join_numbers(&self.coords));
        if let Some(datetime) = self.datetime.as_deref().filter(|d| !d.is_empty()) {
            spec = spec.query("datetime", datetime);
        }
        spec
    }
}

fn join_numbers(values: &[f64]) -> String {
    values
        .iter()
        .map(f64::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
