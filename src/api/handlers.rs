//! API request handlers
//!
//! Handlers for the info endpoints and the `/excel/*` mapping endpoints.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{error, info};
use uuid::Uuid;

use super::server::AppState;
use crate::core::KeyedLookup;
use crate::error::MapperError;
use crate::excel::{ExcelExporter, EXPORT_FILE_NAME, XLSX_CONTENT_TYPE};
use crate::mapping::{ColumnMapping, MappingRegistry};
use crate::store::{RecordStore, RecordSummary, SessionRecord};
use crate::types::{RecordTable, Row};

/// Standard API response wrapper for info endpoints
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            request_id: Uuid::new_v4().to_string(),
            data: Some(data),
        }
    }
}

/// Error body returned by every failing endpoint
#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorBody {
    pub success: bool,
    pub request_id: String,
    pub message: String,
}

/// An error with the HTTP status it maps to
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<MapperError> for ApiError {
    fn from(e: MapperError) -> Self {
        let status = match e {
            MapperError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, message = %self.message, "request failed");
        }
        let body = ErrorBody {
            success: false,
            request_id: Uuid::new_v4().to_string(),
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

//==============================================================================
// Info endpoints
//==============================================================================

/// Root endpoint response
#[derive(Serialize)]
pub struct RootResponse {
    pub name: String,
    pub version: String,
    pub description: String,
    pub endpoints: Vec<EndpointInfo>,
}

#[derive(Serialize)]
pub struct EndpointInfo {
    pub path: String,
    pub method: String,
    pub description: String,
}

fn endpoint(method: &str, path: &str, description: &str) -> EndpointInfo {
    EndpointInfo {
        path: path.to_string(),
        method: method.to_string(),
        description: description.to_string(),
    }
}

/// GET / - Root info
pub async fn root(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let response = RootResponse {
        name: "Excel Mapper API Server".to_string(),
        version: state.version.clone(),
        description: "Spreadsheet column mapping and merge for document requests".to_string(),
        endpoints: vec![
            endpoint("GET", "/health", "Health check endpoint"),
            endpoint("GET", "/version", "Get server version"),
            endpoint("POST", "/excel/upload-template", "Upload a template workbook"),
            endpoint("POST", "/excel/upload-source", "Upload a source workbook"),
            endpoint("GET", "/excel/templates", "List uploaded templates"),
            endpoint("GET", "/excel/sources", "List uploaded source files"),
            endpoint("POST", "/excel/process-mapping", "Preview a mapping (first 5 rows)"),
            endpoint(
                "GET",
                "/excel/download/:templateId",
                "Download the mapped template as .xlsx",
            ),
        ],
    };
    Json(ApiResponse::ok(response))
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// GET /health - Health check
pub async fn health() -> impl IntoResponse {
    Json(ApiResponse::ok(HealthResponse {
        status: "healthy".to_string(),
    }))
}

/// Version response
#[derive(Serialize)]
pub struct VersionResponse {
    pub version: String,
    pub features: Vec<String>,
}

/// GET /version - Server version
pub async fn version(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ApiResponse::ok(VersionResponse {
        version: state.version.clone(),
        features: vec![
            "upload".to_string(),
            "process-mapping".to_string(),
            "download".to_string(),
        ],
    }))
}

//==============================================================================
// Upload
//==============================================================================

/// Upload response: the stored record, rows keyed by header
#[derive(Serialize, Deserialize, Debug)]
pub struct UploadResponse {
    pub id: Uuid,
    pub name: String,
    pub headers: Vec<String>,
    pub data: Vec<Map<String, Value>>,
}

impl From<&SessionRecord> for UploadResponse {
    fn from(record: &SessionRecord) -> Self {
        Self {
            id: record.id,
            name: record.name().to_string(),
            headers: record.headers().to_vec(),
            data: rows_as_objects(record.headers(), &record.table.rows),
        }
    }
}

/// Rows as JSON objects keyed by header; a repeated header keeps its last cell
pub fn rows_as_objects(headers: &[String], rows: &[Row]) -> Vec<Map<String, Value>> {
    rows.iter()
        .map(|row| {
            headers
                .iter()
                .zip(row)
                .map(|(h, cell)| {
                    let value = serde_json::to_value(cell).unwrap_or(Value::Null);
                    (h.clone(), value)
                })
                .collect()
        })
        .collect()
}

/// Pull the `file` field out of a multipart body
async fn read_upload(mut multipart: Multipart) -> ApiResult<(String, Vec<u8>)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or("upload.xlsx").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {}", e)))?;
        return Ok((name, bytes.to_vec()));
    }
    Err(ApiError::bad_request("No file uploaded"))
}

async fn store_upload(
    multipart: Multipart,
    store: &std::sync::RwLock<Box<dyn RecordStore>>,
    kind: &str,
) -> ApiResult<Json<UploadResponse>> {
    let (name, bytes) = read_upload(multipart).await?;
    let record = SessionRecord::from_upload(name, bytes)
        .map_err(|e| ApiError::internal(format!("Error processing {}: {}", kind, e)))?;
    let response = UploadResponse::from(&record);
    info!(
        kind,
        id = %record.id,
        name = record.name(),
        rows = record.table.row_count(),
        "upload stored"
    );
    store
        .write()
        .map_err(|_| ApiError::internal("record store lock poisoned"))?
        .put(record);
    Ok(Json(response))
}

/// POST /excel/upload-template
pub async fn upload_template(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    store_upload(multipart, &state.templates, "template").await
}

/// POST /excel/upload-source
pub async fn upload_source(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    store_upload(multipart, &state.sources, "source file").await
}

/// GET /excel/templates
pub async fn list_templates(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<RecordSummary>>> {
    let store = state
        .templates
        .read()
        .map_err(|_| ApiError::internal("record store lock poisoned"))?;
    Ok(Json(store.records().into_iter().map(RecordSummary::from).collect()))
}

/// GET /excel/sources
pub async fn list_sources(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<RecordSummary>>> {
    let store = state
        .sources
        .read()
        .map_err(|_| ApiError::internal("record store lock poisoned"))?;
    Ok(Json(store.records().into_iter().map(RecordSummary::from).collect()))
}

//==============================================================================
// Mapping
//==============================================================================

/// Process-mapping request
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ProcessMappingRequest {
    pub template_id: String,
    #[serde(default)]
    pub mappings: Vec<ColumnMapping>,
}

/// Download request body
#[derive(Deserialize, Debug, Default)]
pub struct DownloadRequest {
    #[serde(default)]
    pub mappings: Vec<ColumnMapping>,
}

/// Process-mapping response
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    pub preview_data: Vec<Map<String, Value>>,
}

/// Resolve the template and every source file the mappings name
fn load_lookup_inputs(
    state: &AppState,
    template_id: &str,
    registry: &MappingRegistry,
) -> ApiResult<(RecordTable, Vec<RecordTable>)> {
    let id = Uuid::parse_str(template_id)
        .map_err(|_| MapperError::NotFound("Template not found".to_string()))?;
    let template = state
        .templates
        .read()
        .map_err(|_| ApiError::internal("record store lock poisoned"))?
        .get(&id)
        .map(|r| r.table.clone())
        .ok_or_else(|| MapperError::NotFound("Template not found".to_string()))?;

    let store = state
        .sources
        .read()
        .map_err(|_| ApiError::internal("record store lock poisoned"))?;
    let mut sources: Vec<RecordTable> = Vec::new();
    for file in registry.iter().filter_map(|m| m.source_file.as_deref()) {
        if sources.iter().any(|s| s.name == file) {
            continue;
        }
        if let Some(record) = store.find_by_name(file) {
            sources.push(record.table.clone());
        }
    }
    Ok((template, sources))
}

fn parse_download_request(body: &[u8]) -> ApiResult<DownloadRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(DownloadRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("Invalid request body: {}", e)))
}

/// POST /excel/process-mapping - first rows of the keyed lookup
pub async fn process_mapping(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ProcessMappingRequest>, JsonRejection>,
) -> ApiResult<Json<PreviewResponse>> {
    let Json(req) = body.map_err(|rejection| {
        ApiError::bad_request(format!("Invalid request body: {}", rejection.body_text()))
    })?;
    let registry = MappingRegistry::from_mappings(req.mappings);
    let (template, sources) = load_lookup_inputs(&state, &req.template_id, &registry)?;

    let preview = KeyedLookup::new(&registry, &sources).preview(&template);
    Ok(Json(PreviewResponse {
        preview_data: rows_as_objects(&preview.headers, &preview.body),
    }))
}

/// GET /excel/download/:templateId - full keyed lookup as .xlsx
///
/// A missing or empty body means no mappings; a body that is not a valid
/// `DownloadRequest` is a bad request.
pub async fn download_mapped_data(
    State(state): State<Arc<AppState>>,
    Path(template_id): Path<String>,
    body: Bytes,
) -> ApiResult<Response> {
    let req = parse_download_request(&body)?;
    let registry = MappingRegistry::from_mappings(req.mappings);
    let (template, sources) = load_lookup_inputs(&state, &template_id, &registry)?;

    let merged = KeyedLookup::new(&registry, &sources).merge(&template);
    let bytes = ExcelExporter::new(&merged).to_bytes()?;
    info!(template = %template.name, rows = merged.row_count(), "mapped data downloaded");

    let headers = [
        (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename={}", EXPORT_FILE_NAME),
        ),
    ];
    Ok((headers, bytes).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CellValue;

    #[test]
    fn test_api_response_ok() {
        let response: ApiResponse<String> = ApiResponse::ok("test data".to_string());
        assert!(response.success);
        assert_eq!(response.data, Some("test data".to_string()));
        assert_eq!(response.request_id.len(), 36);
    }

    #[test]
    fn test_api_error_status_mapping() {
        let not_found: ApiError = MapperError::NotFound("x".to_string()).into();
        assert_eq!(not_found.status, StatusCode::NOT_FOUND);

        let parse: ApiError = MapperError::Parse("x".to_string()).into();
        assert_eq!(parse.status, StatusCode::INTERNAL_SERVER_ERROR);

        assert_eq!(ApiError::bad_request("x").status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_rows_as_objects() {
        let headers = vec!["Name".to_string(), "Amount".to_string()];
        let rows = vec![vec![CellValue::from("Alice"), CellValue::Number(100.0)]];
        let objects = rows_as_objects(&headers, &rows);
        assert_eq!(objects[0]["Name"], Value::String("Alice".to_string()));
        assert_eq!(objects[0]["Amount"].as_f64(), Some(100.0));
    }

    #[test]
    fn test_process_mapping_request_deserialize() {
        let json = r#"{
            "templateId": "abc",
            "mappings": [{"templateColumn": "Name", "sourceColumn": "Client", "sourceFile": "a.xlsx"}]
        }"#;
        let req: ProcessMappingRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.template_id, "abc");
        assert_eq!(req.mappings.len(), 1);
        assert_eq!(req.mappings[0].source_column.as_deref(), Some("Client"));
    }

    #[test]
    fn test_download_request_defaults_to_no_mappings() {
        let req: DownloadRequest = serde_json::from_str("{}").unwrap();
        assert!(req.mappings.is_empty());
    }

    #[test]
    fn test_download_body_parsing() {
        assert!(parse_download_request(b"").unwrap().mappings.is_empty());
        assert!(parse_download_request(b" \n").unwrap().mappings.is_empty());

        let err = parse_download_request(br#"{"mappings":"not-a-list"}"#).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.starts_with("Invalid request body"));
    }

    #[test]
    fn test_rows_as_objects_keep_header_order() {
        let headers = vec!["Zeta".to_string(), "Alpha".to_string()];
        let rows = vec![vec![CellValue::from("z"), CellValue::from("a")]];
        let objects = rows_as_objects(&headers, &rows);
        let keys: Vec<&str> = objects[0].keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["Zeta", "Alpha"]);
    }

    #[test]
    fn test_preview_response_serializes_camel_case() {
        let response = PreviewResponse {
            preview_data: Vec::new(),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(json, r#"{"previewData":[]}"#);
    }
}
