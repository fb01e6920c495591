//! MCP tool surface: each tool runs the bearer gate, then one OGC client operation.

use crate::auth::BearerGate;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use ogc_mcp_client::http::JsonObject;
use ogc_mcp_client::{ApiError, ItemsQuery, OgcApiClient, PositionQuery, RecordSearch};
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, ErrorData, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::service::RequestContext;
use rmcp::{RoleServer, ServerHandler, tool, tool_handler, tool_router};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Process-wide, read-only dependencies shared by every MCP session.
#[derive(Debug)]
pub struct ToolServices {
    client: OgcApiClient,
    gate: BearerGate,
}

impl ToolServices {
    #[must_use]
    pub fn new(client: OgcApiClient, gate: BearerGate) -> Self {
        Self { client, gate }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ProcessIdParam {
    /// Process identifier, e.g. from `ogc_list_processes`.
    pub process_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExecuteProcessParam {
    pub process_id: String,
    /// Execution request body (`inputs`, `outputs`, ...). Defaults to `{}`.
    #[serde(default)]
    pub inputs: Option<JsonObject>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct JobIdParam {
    /// Job identifier returned by `ogc_execute_process`.
    pub job_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CollectionItemsParam {
    pub collection_id: String,
    /// Bounding box as `[minx, miny, maxx, maxy]`.
    #[serde(default)]
    pub bbox: Option<Vec<f64>>,
    #[serde(default)]
    pub limit: Option<u64>,
    /// Server-specific filter expression (e.g. CQL2 text).
    #[serde(default)]
    pub filter: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RecordSearchParam {
    /// Free-text query.
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct EdrPositionParam {
    pub collection_id: String,
    /// Position coordinates, e.g. `[lon, lat]`.
    pub coords: Vec<f64>,
    /// ISO 8601 instant or interval.
    #[serde(default)]
    pub datetime: Option<String>,
}

#[derive(Clone)]
pub struct OgcTools {
    tool_router: ToolRouter<Self>,
    services: Arc<ToolServices>,
}

#[tool_router]
impl OgcTools {
    #[must_use]
    pub fn new(services: Arc<ToolServices>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            services,
        }
    }

    #[tool(
        annotations(read_only_hint = true, open_world_hint = true),
        description = "List available OGC processes. Uses GET /processes. Returns the process list from the OGC API - Processes server."
    )]
    async fn ogc_list_processes(
        &self,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let client = &self.services.client;
        self.run("ogc_list_processes", &context, || client.list_processes())
            .await
    }

    #[tool(
        annotations(read_only_hint = true, open_world_hint = true),
        description = "Get detailed information about an OGC process by ID (inputs, outputs, execution link). Uses GET /processes/{processId}. Pass the process ID (e.g. from ogc_list_processes)."
    )]
    async fn ogc_get_process_info(
        &self,
        Parameters(param): Parameters<ProcessIdParam>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let client = &self.services.client;
        self.run("ogc_get_process_info", &context, || async {
            client.get_process(&param.process_id).await.map(Value::Object)
        })
        .await
    }

    #[tool(
        annotations(open_world_hint = true),
        description = "Execute an OGC process asynchronously. Uses POST /processes/{processId}/execution. Pass process_id and optional inputs object. Returns job details (e.g. jobId) to check status or fetch results later."
    )]
    async fn ogc_execute_process(
        &self,
        Parameters(param): Parameters<ExecuteProcessParam>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let client = &self.services.client;
        let inputs = param.inputs.map(Value::Object);
        self.run("ogc_execute_process", &context, || async {
            client
                .execute_process(&param.process_id, inputs)
                .await
                .map(Value::Object)
        })
        .await
    }

    #[tool(
        annotations(read_only_hint = true, open_world_hint = true),
        description = "Get current OGC job status. Uses GET /jobs/{jobId}. If the job is done (successful/succeeded/done/complete/completed), also fetches results via GET /jobs/{jobId}/results and returns {status, results}. Otherwise returns the current job status only."
    )]
    async fn ogc_get_job_status_or_results(
        &self,
        Parameters(param): Parameters<JobIdParam>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let client = &self.services.client;
        self.run("ogc_get_job_status_or_results", &context, || {
            client.get_job_status_or_results(&param.job_id)
        })
        .await
    }

    #[tool(
        annotations(read_only_hint = true, open_world_hint = true),
        description = "List OGC API feature collections. Uses GET /collections."
    )]
    async fn ogc_list_collections(
        &self,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let client = &self.services.client;
        self.run("ogc_list_collections", &context, || client.list_collections())
            .await
    }

    #[tool(
        annotations(read_only_hint = true, open_world_hint = true),
        description = "Query features from an OGC API collection. Uses GET /collections/{collectionId}/items with optional bbox, limit and filter."
    )]
    async fn ogc_get_collection_items(
        &self,
        Parameters(param): Parameters<CollectionItemsParam>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let client = &self.services.client;
        let query = ItemsQuery {
            bbox: param.bbox,
            limit: param.limit,
            filter: param.filter,
        };
        self.run("ogc_get_collection_items", &context, || async {
            client
                .get_collection_items(&param.collection_id, &query)
                .await
        })
        .await
    }

    #[tool(
        annotations(read_only_hint = true, open_world_hint = true),
        description = "List OGC API - Records collections. Uses GET /collections?type=records."
    )]
    async fn ogc_list_record_collections(
        &self,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let client = &self.services.client;
        self.run("ogc_list_record_collections", &context, || {
            client.list_record_collections()
        })
        .await
    }

    #[tool(
        annotations(read_only_hint = true, open_world_hint = true),
        description = "Search OGC API - Records. Uses GET /search with optional free-text q and limit."
    )]
    async fn ogc_search_records(
        &self,
        Parameters(param): Parameters<RecordSearchParam>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let client = &self.services.client;
        let search = RecordSearch {
            q: param.q,
            limit: param.limit,
        };
        self.run("ogc_search_records", &context, || async {
            client.search_records(&search).await
        })
        .await
    }

    #[tool(
        annotations(read_only_hint = true, open_world_hint = true),
        description = "List collections that may support OGC API - EDR queries. Uses GET /collections."
    )]
    async fn ogc_list_edr_collections(
        &self,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let client = &self.services.client;
        self.run("ogc_list_edr_collections", &context, || {
            client.list_edr_collections()
        })
        .await
    }

    #[tool(
        annotations(read_only_hint = true, open_world_hint = true),
        description = "Retrieve environmental data at a position (OGC API - EDR). Uses GET /collections/{collectionId}/position with coords (e.g. [lon, lat]) and optional datetime."
    )]
    async fn ogc_edr_position(
        &self,
        Parameters(param): Parameters<EdrPositionParam>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let client = &self.services.client;
        let position = PositionQuery {
            coords: param.coords,
            datetime: param.datetime,
        };
        self.run("ogc_edr_position", &context, || async {
            client.edr_position(&param.collection_id, &position).await
        })
        .await
    }
}

impl OgcTools {
    /// Gate, then run `op` once; errors become MCP `ErrorData`.
    async fn run<F, Fut>(
        &self,
        tool: &'static str,
        context: &RequestContext<RoleServer>,
        op: F,
    ) -> Result<CallToolResult, ErrorData>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<Value, ApiError>>,
    {
        let headers = inbound_headers(context);
        info!(tool, "tool call");
        match self.services.gate.guard(&headers, op).await {
            Ok(body) => Ok(CallToolResult::structured(structured_body(body))),
            Err(e) => {
                if e.quiet() {
                    debug!(tool, status = e.status_code(), error = %e.message(), "tool call failed");
                } else {
                    warn!(tool, status = e.status_code(), error = %e.message(), "tool call failed");
                }
                Err(api_error_to_mcp(&e))
            }
        }
    }
}

#[tool_handler]
impl ServerHandler for OgcTools {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            protocol_version: ProtocolVersion::LATEST,
            server_info: Implementation {
                name: "ogc-mcp-backend".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(
                "OGC API - Processes tools. Discover with ogc_list_processes and \
                 ogc_get_process_info, start work with ogc_execute_process, then poll \
                 ogc_get_job_status_or_results with the returned jobId. Every call requires \
                 an Authorization: Bearer <token> header."
                    .to_string(),
            ),
            ..Default::default()
        }
    }
}

/// `structuredContent` must be an object; anything else is wrapped as `{"body": ...}`.
fn structured_body(body: Value) -> Value {
    if body.is_object() {
        body
    } else {
        json!({ "body": body })
    }
}

/// Headers of the HTTP request carrying this MCP message; empty when not served over HTTP.
fn inbound_headers(context: &RequestContext<RoleServer>) -> HeaderMap {
    context
        .extensions
        .get::<Parts>()
        .map(|parts| parts.headers.clone())
        .unwrap_or_default()
}

/// Map an [`ApiError`] to MCP error data, keeping the status and correlation fields.
#[must_use]
pub fn api_error_to_mcp(e: &ApiError) -> ErrorData {
    let data = json!({
        "statusCode": e.status_code(),
        "meta": e.meta(),
        "errorId": e.error_id(),
        "errorCode": e.error_code(),
        "code": e.code(),
    });
    let message = e.message().to_string();
    if e.is_server_error() {
        ErrorData::internal_error(message, Some(data))
    } else {
        ErrorData::invalid_request(message, Some(data))
    }
}
