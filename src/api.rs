//! REST API for the packing service.
//!
//! Provides HTTP endpoints for communication with the frontend.
//! Uses Axum as the web framework and supports CORS.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Router,
    http::{StatusCode, Uri, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use rust_embed::RustEmbed;
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use std::sync::OnceLock;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use utoipa::{OpenApi, ToSchema};

use crate::config::{ApiConfig, PackerSettings};
use crate::itemlist::ItemSortKey;
use crate::model::{BoxType, Item, ValidationError};
use crate::optimizer::{PackingResult, pack_items_with_config, pack_items_with_progress};
use crate::types::Dimensions;

#[derive(Clone)]
struct ApiState {
    packer_settings: PackerSettings,
}

static OPENAPI_DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();

// SRI hashes verified against https://unpkg.com/swagger-ui-dist@5.17.14/ on 2025-10-29.
const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <title>stowage API Docs</title>
        <link
            rel="stylesheet"
            href="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui.css"
            integrity="sha384-wxLW6kwyHktdDGr6Pv1zgm/VGJh99lfUbzSn6HNHBENZlCN7W602k9VkGdxuFvPn"
            crossorigin="anonymous"
        />
    </head>
    <body>
        <div id="swagger-ui"></div>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-bundle.js"
            integrity="sha384-wmyclcVGX/WhUkdkATwhaK1X1JtiNrr2EoYJ+diV3vj4v6OC5yCeSu+yW13SYJep"
            crossorigin="anonymous"
        ></script>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-standalone-preset.js"
            integrity="sha384-2YH8WDRaj7V2OqU/trsmzSagmk/E2SutiCsGkdgoQwC9pNUJV1u/141DHB6jgs8t"
            crossorigin="anonymous"
        ></script>
        <script>
            window.onload = function () {
                const ui = SwaggerUIBundle({
                    url: "/docs/openapi.json",
                    dom_id: "#swagger-ui",
                    presets: [SwaggerUIBundle.presets.apis, SwaggerUIStandalonePreset],
                    layout: "StandaloneLayout",
                });
                window.ui = ui;
            };
        </script>
    </body>
    </html>"##;

fn openapi_doc() -> &'static utoipa::openapi::OpenApi {
    OPENAPI_DOC.get_or_init(ApiDoc::openapi)
}

/// Embedded Web Assets (HTML, CSS, JS)
#[derive(RustEmbed)]
#[folder = "web/"]
struct WebAssets;

/// A candidate box type in the request.
#[derive(Deserialize, Clone, ToSchema)]
pub struct BoxRequest {
    pub reference: Option<String>,
    #[schema(value_type = [u32; 3], example = json!([400, 300, 200]))]
    pub dims: (u32, u32, u32),
    #[serde(default)]
    pub empty_weight: u32,
    pub max_weight: u32,
    #[serde(default)]
    #[schema(nullable = true)]
    pub quantity: Option<u32>,
}

impl BoxRequest {
    fn into_box_type(self, id: usize) -> Result<BoxType, ValidationError> {
        let reference = self
            .reference
            .unwrap_or_else(|| format!("box-{}", id + 1));
        let box_type = BoxType::new(
            reference,
            Dimensions::from(self.dims),
            self.empty_weight,
            self.max_weight,
        )?;
        Ok(match self.quantity {
            Some(quantity) => box_type.with_amount(quantity),
            None => box_type,
        })
    }
}

/// An item to pack in the request.
#[derive(Deserialize, Clone, ToSchema)]
pub struct ItemRequest {
    pub description: String,
    #[schema(value_type = [u32; 3], example = json!([120, 80, 50]))]
    pub dims: (u32, u32, u32),
    pub weight: u32,
    #[serde(default)]
    pub keep_flat: bool,
}

impl ItemRequest {
    fn into_item(self) -> Result<Item, ValidationError> {
        Item::new(
            self.description,
            Dimensions::from(self.dims),
            self.weight,
            self.keep_flat,
        )
    }
}

#[derive(Deserialize, ToSchema)]
#[schema(
    example = json!({
        "boxes": [
            {
                "reference": "parcel-m",
                "dims": [400, 300, 200],
                "empty_weight": 250,
                "max_weight": 10000
            }
        ],
        "items": [
            { "description": "router", "dims": [220, 160, 40], "weight": 800, "keep_flat": true }
        ],
        "sort_key": "max-dimension"
    })
)]
pub struct PackRequest {
    pub boxes: Vec<BoxRequest>,
    pub items: Vec<ItemRequest>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub sort_key: Option<String>,
}

#[derive(Debug)]
struct ValidatedPackRequest {
    box_types: Vec<BoxType>,
    items: Vec<Item>,
    sort_key: Option<ItemSortKey>,
}

impl ValidatedPackRequest {
    fn box_count(&self) -> usize {
        self.box_types.len()
    }

    fn item_count(&self) -> usize {
        self.items.len()
    }

    fn into_parts(self) -> (Vec<Item>, Vec<BoxType>, Option<ItemSortKey>) {
        (self.items, self.box_types, self.sort_key)
    }
}

#[derive(Debug)]
enum PackRequestValidationError {
    MissingBoxes,
    InvalidBox(ValidationError),
    InvalidItem(ValidationError),
    InvalidSortKey(String),
}

impl PackRequest {
    fn into_validated(self) -> Result<ValidatedPackRequest, PackRequestValidationError> {
        if self.boxes.is_empty() {
            return Err(PackRequestValidationError::MissingBoxes);
        }

        let box_types = self
            .boxes
            .into_iter()
            .enumerate()
            .map(|(idx, spec)| spec.into_box_type(idx))
            .collect::<Result<Vec<_>, ValidationError>>()
            .map_err(PackRequestValidationError::InvalidBox)?;

        let items = self
            .items
            .into_iter()
            .map(ItemRequest::into_item)
            .collect::<Result<Vec<_>, ValidationError>>()
            .map_err(PackRequestValidationError::InvalidItem)?;

        let sort_key = match self.sort_key {
            Some(raw) => Some(
                raw.parse::<ItemSortKey>()
                    .map_err(PackRequestValidationError::InvalidSortKey)?,
            ),
            None => None,
        };

        Ok(ValidatedPackRequest {
            box_types,
            items,
            sort_key,
        })
    }
}

/// Response structure with all packed boxes.
#[derive(Serialize, ToSchema)]
pub struct PackResponse {
    pub boxes: Vec<PackedBoxResponse>,
    pub unpacked: Vec<UnpackedItemResponse>,
    pub is_complete: bool,
}

/// Single packed box with its placements.
#[derive(Serialize, ToSchema)]
pub struct PackedBoxResponse {
    pub id: usize,
    pub reference: String,
    #[schema(value_type = [u32; 3], example = json!([400, 300, 200]))]
    pub dims: (u32, u32, u32),
    pub max_weight: u32,
    pub gross_weight: u64,
    pub volume_utilisation: f64,
    pub items: Vec<PackedItemResponse>,
}

/// Single placed item in the response.
///
/// `pos` is the item's lower-front-left corner in the box's original
/// frame; `dims` are the extents in the chosen orientation.
#[derive(Serialize, ToSchema)]
pub struct PackedItemResponse {
    pub description: String,
    #[schema(value_type = [u32; 3], example = json!([0, 0, 0]))]
    pub pos: (u32, u32, u32),
    #[schema(value_type = [u32; 3], example = json!([220, 160, 40]))]
    pub dims: (u32, u32, u32),
    pub weight: u32,
}

#[derive(Serialize, ToSchema)]
pub struct UnpackedItemResponse {
    pub description: String,
    #[schema(value_type = [u32; 3], example = json!([900, 100, 100]))]
    pub dims: (u32, u32, u32),
    pub weight: u32,
    pub reason_code: String,
    pub reason: String,
}

#[derive(Serialize, ToSchema)]
struct ErrorResponse {
    error: String,
    details: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: details.into(),
        }
    }
}

fn error_response(
    status: StatusCode,
    error: impl Into<String>,
    details: impl Into<String>,
) -> Response {
    (status, Json(ErrorResponse::new(error, details))).into_response()
}

fn json_deserialize_error(err: JsonRejection) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid JSON data",
        err.to_string(),
    )
}

fn validation_error(details: impl Into<String>) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid input data",
        details,
    )
}

fn box_config_error(details: impl Into<String>) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid box configuration",
        details,
    )
}

fn parse_pack_request(
    payload: Result<Json<PackRequest>, JsonRejection>,
) -> Result<ValidatedPackRequest, Response> {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(err) => return Err(json_deserialize_error(err)),
    };

    match payload.into_validated() {
        Ok(validated) => Ok(validated),
        Err(PackRequestValidationError::MissingBoxes) => Err(validation_error(
            "At least one box type must be specified",
        )),
        Err(PackRequestValidationError::InvalidBox(err)) => {
            Err(box_config_error(err.to_string()))
        }
        Err(PackRequestValidationError::InvalidItem(err)) => {
            Err(validation_error(err.to_string()))
        }
        Err(PackRequestValidationError::InvalidSortKey(err)) => Err(validation_error(err)),
    }
}

impl PackResponse {
    /// Creates a PackResponse from a PackingResult.
    pub fn from_packing_result(result: PackingResult) -> Self {
        let PackingResult { boxes, unpacked } = result;
        let is_complete = unpacked.is_empty();

        Self {
            boxes: boxes
                .into_iter()
                .enumerate()
                .map(|(i, packed)| {
                    let gross_weight = packed.gross_weight();
                    let volume_utilisation = packed.volume_utilisation();
                    let items = packed
                        .items()
                        .iter()
                        .map(|p| PackedItemResponse {
                            description: p.item.description.clone(),
                            pos: (p.x, p.y, p.z),
                            dims: (p.width, p.length, p.depth),
                            weight: p.item.weight,
                        })
                        .collect();
                    let box_type = packed.box_type();

                    PackedBoxResponse {
                        id: i + 1,
                        reference: box_type.reference.clone(),
                        dims: box_type.inner.as_tuple(),
                        max_weight: box_type.max_weight,
                        gross_weight,
                        volume_utilisation,
                        items,
                    }
                })
                .collect(),
            unpacked: unpacked
                .into_iter()
                .map(|entry| UnpackedItemResponse {
                    description: entry.item.description.clone(),
                    dims: entry.item.dims.as_tuple(),
                    weight: entry.item.weight,
                    reason_code: entry.reason.code().to_string(),
                    reason: entry.reason.to_string(),
                })
                .collect(),
            is_complete,
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(handle_pack, handle_pack_stream),
    components(
        schemas(
            PackRequest,
            BoxRequest,
            ItemRequest,
            PackResponse,
            PackedBoxResponse,
            PackedItemResponse,
            UnpackedItemResponse,
            ErrorResponse
        )
    ),
    tags((name = "packing", description = "Endpoints for bin packing"))
)]
struct ApiDoc;

/// Starts the API server.
///
/// Configures CORS for cross-origin requests from the frontend.
/// Blocks until the server is terminated.
pub async fn start_api_server(config: ApiConfig, packer_settings: PackerSettings) {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let state = ApiState { packer_settings };

    let app = Router::new()
        // API endpoints
        .route("/pack", post(handle_pack))
        .route("/pack_stream", post(handle_pack_stream))
        // API documentation
        .route("/docs/openapi.json", get(serve_openapi_json))
        .route("/docs", get(serve_openapi_ui))
        // Web-UI (embedded)
        .route("/", get(serve_index))
        .route("/{*path}", get(serve_static))
        .layer(cors)
        .with_state(state);

    let addr = config.socket_addr();
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            panic!("❌ Could not bind API server to {}: {}", addr, err);
        }
    };

    let display_host = config.display_host().to_string();
    println!(
        "🚀 Server running on http://{}:{}",
        display_host,
        config.port()
    );
    if config.binds_to_all_interfaces() && config.uses_default_host() {
        println!("💡 Local access: http://localhost:{}", config.port());
    }
    println!("📦 API Endpoints:");
    println!("   - POST /pack");
    println!("   - POST /pack_stream");
    println!("📑 Documentation:");
    println!("   - GET /docs");
    println!("   - GET /docs/openapi.json");
    println!("🌐 Web-UI: http://{}:{}", display_host, config.port());

    if let Err(err) = axum::serve(listener, app).await {
        eprintln!("❌ API server terminated with an error: {err}");
    }
}

/// Handler for POST /pack endpoint.
///
/// Distributes the submitted items over the submitted box types and
/// returns every placement with coordinates and orientation.
#[utoipa::path(
    post,
    path = "/pack",
    request_body = PackRequest,
    responses(
        (status = 200, description = "Successfully packed items", body = PackResponse),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid request or box configuration",
            body = ErrorResponse
        )
    ),
    tag = "packing"
)]
async fn handle_pack(
    State(state): State<ApiState>,
    payload: Result<Json<PackRequest>, JsonRejection>,
) -> impl IntoResponse {
    let request = match parse_pack_request(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let item_count = request.item_count();
    let box_count = request.box_count();
    let (items, box_types, sort_key_override) = request.into_parts();

    println!(
        "📥 New pack request: {} items, {} box types",
        item_count, box_count
    );
    let mut packer_config = state.packer_settings.packer_config();
    if let Some(sort_key) = sort_key_override {
        packer_config.sort_key = sort_key;
    }
    let packing_result = pack_items_with_config(items, box_types, packer_config);
    println!(
        "📦 Result: {} boxes, {} unpacked items",
        packing_result.box_count(),
        packing_result.unpacked_count()
    );

    let response = PackResponse::from_packing_result(packing_result);
    (StatusCode::OK, Json(response)).into_response()
}

/// Handler for POST /pack_stream endpoint (SSE).
///
/// Streams pack events in real-time as Server-Sent Events
/// (text/event-stream). The frontend can visualize placements live
/// without waiting for the complete result.
#[utoipa::path(
    post,
    path = "/pack_stream",
    request_body = PackRequest,
    responses(
        (
            status = 200,
            description = "Streams pack events in real-time",
            content_type = "text/event-stream",
            body = String
        ),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid request or box configuration",
            body = ErrorResponse
        )
    ),
    tag = "packing"
)]
async fn handle_pack_stream(
    State(state): State<ApiState>,
    payload: Result<Json<PackRequest>, JsonRejection>,
) -> impl IntoResponse {
    let request = match parse_pack_request(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let (items, box_types, sort_key_override) = request.into_parts();

    let (tx, rx) = mpsc::channel::<String>(32);

    let mut packer_config = state.packer_settings.packer_config();
    if let Some(sort_key) = sort_key_override {
        packer_config.sort_key = sort_key;
    }

    tokio::task::spawn_blocking(move || {
        let _ = pack_items_with_progress(items, box_types, packer_config, |evt| {
            if let Ok(json) = serde_json::to_string(evt) {
                if tx.blocking_send(json).is_err() {
                    // Receiver has closed the stream; remaining events are discarded.
                    return;
                }
            }
        });
    });

    let stream = ReceiverStream::new(rx)
        .map(|msg| Ok::<_, std::convert::Infallible>(Event::default().data(msg)));
    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(std::time::Duration::from_secs(10))
                .text("keep-alive"),
        )
        .into_response()
}

/// Serves the index.html main page
async fn serve_index() -> Response {
    match WebAssets::get("index.html") {
        Some(content) => Html(content.data).into_response(),
        None => (StatusCode::NOT_FOUND, "404 Not Found").into_response(),
    }
}

/// Serves static assets (JS, CSS, etc.)
async fn serve_static(uri: Uri) -> Response {
    let path = uri.path().trim_start_matches('/');

    match WebAssets::get(path) {
        Some(content) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            ([(header::CONTENT_TYPE, mime.as_ref())], content.data).into_response()
        }
        None => (StatusCode::NOT_FOUND, "404 Not Found").into_response(),
    }
}

async fn serve_openapi_json(State(_state): State<ApiState>) -> impl IntoResponse {
    Json(openapi_doc())
}

async fn serve_openapi_ui(State(_state): State<ApiState>) -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}
