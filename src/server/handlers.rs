//! HTTP handlers for record operations
//!
//! Handlers only translate between HTTP and [`RecordService`]; every
//! workflow decision lives in the service.

use axum::{
    Json,
    extract::{OriginalUri, Path, Query, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::core::auth::{AuthContext, AuthProvider};
use crate::core::document::DocumentResponse;
use crate::core::error::{ArgumentError, RecordsError, RecordsResult};
use crate::core::pagination::LinkBase;
use crate::core::service::{RecordService, SaveRequest};
use crate::server::params::{parse_fields, parse_list_query};

/// Media type of every document this API returns
pub const JSON_API_CONTENT_TYPE: &str = "application/vnd.api+json";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: RecordService,
    pub auth: Arc<dyn AuthProvider>,
}

impl AppState {
    async fn context(&self, headers: &HeaderMap) -> RecordsResult<AuthContext> {
        self.auth.extract_context(headers).await.map_err(|e| {
            ArgumentError::InvalidParameter {
                parameter: "headers".to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }
}

/// Resource object of a create/update body
#[derive(Debug, Deserialize)]
pub struct ResourceBody {
    #[serde(rename = "type")]
    pub module: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

/// Top-level create/update body
#[derive(Debug, Deserialize)]
pub struct SaveBody {
    pub data: ResourceBody,
}

/// Serialize a document with the JSON:API media type
fn document(status: StatusCode, doc: DocumentResponse) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, JSON_API_CONTENT_TYPE)],
        Json(doc),
    )
        .into_response()
}

fn body_or_error(body: Result<Json<SaveBody>, JsonRejection>) -> RecordsResult<SaveBody> {
    body.map(|Json(b)| b).map_err(|rejection| {
        ArgumentError::InvalidParameter {
            parameter: "body".to_string(),
            message: rejection.body_text(),
        }
        .into()
    })
}

/// GET /V8/module/{module}/{id}
pub async fn get_record(
    State(state): State<AppState>,
    Path((module, id)): Path<(String, String)>,
    Query(params): Query<Vec<(String, String)>>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Result<Response, RecordsError> {
    let context = state.context(&headers).await?;
    let fields = parse_fields(&module, &params);

    let doc = state
        .service
        .get_record(&context, &module, &id, &fields, uri.path())
        .await?;
    Ok(document(StatusCode::OK, doc))
}

/// GET /V8/module/{module}
pub async fn list_records(
    State(state): State<AppState>,
    Path(module): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Result<Response, RecordsError> {
    let context = state.context(&headers).await?;
    let config = state.service.config();

    let query = parse_list_query(&module, &params, config)?;
    let links = LinkBase::new(&config.base_url, uri.path(), params);

    let doc = state.service.list_records(&context, &query, &links).await?;
    Ok(document(StatusCode::OK, doc))
}

/// POST /V8/module
pub async fn create_record(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Result<Json<SaveBody>, JsonRejection>,
) -> Result<Response, RecordsError> {
    let context = state.context(&headers).await?;
    let data = body_or_error(body)?.data;

    let mut request = SaveRequest::new(&data.module, data.attributes).with_path(uri.path());
    request.id = data.id.filter(|id| !id.is_empty());

    let doc = state.service.create_record(&context, request).await?;
    Ok(document(StatusCode::CREATED, doc))
}

/// PATCH /V8/module
pub async fn update_record(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Result<Json<SaveBody>, JsonRejection>,
) -> Result<Response, RecordsError> {
    let context = state.context(&headers).await?;
    let data = body_or_error(body)?.data;

    let mut request = SaveRequest::new(&data.module, data.attributes).with_path(uri.path());
    request.id = data.id;

    let doc = state.service.update_record(&context, request).await?;
    Ok(document(StatusCode::OK, doc))
}

/// DELETE /V8/module/{module}/{id}
pub async fn delete_record(
    State(state): State<AppState>,
    Path((module, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, RecordsError> {
    let context = state.context(&headers).await?;

    let doc = state.service.delete_record(&context, &module, &id).await?;
    Ok(document(StatusCode::OK, doc))
}
