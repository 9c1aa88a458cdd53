use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use plannerium_core::chat;
use plannerium_core::export::{self, ExportError, PdfRenderer};
use plannerium_core::stats::TimeTracking;
use plannerium_core::{Generator, Plan, PipelineOptions, PlanRequest, run_pipeline};
use plannerium_store::{ProjectStore, SavedProject, StoreError};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Shared by every handler. The generator and PDF capability are built once
/// at startup.
#[derive(Clone)]
pub struct AppState {
    store: ProjectStore,
    generator: Arc<dyn Generator>,
    pdf: Option<PdfRenderer>,
    stage_timeout: Option<Duration>,
    /// Cancelled on server shutdown; each pipeline run gets a child token.
    shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        store: ProjectStore,
        generator: Arc<dyn Generator>,
        pdf: Option<PdfRenderer>,
        stage_timeout: Option<Duration>,
    ) -> Self {
        Self {
            store,
            generator,
            pdf,
            stage_timeout,
            shutdown: CancellationToken::new(),
        }
    }

    fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            stage_timeout: self.stage_timeout,
            cancel: self.shutdown.child_token(),
        }
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.into(),
        }
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: msg.into(),
        }
    }

    /// A 500 with a fixed public message. The cause is logged, not returned.
    pub fn internal(public: &str, cause: impl std::fmt::Display) -> Self {
        tracing::error!(error = %cause, "{public}");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: public.to_string(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(format!("Invalid JSON body: {}", rejection.body_text()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/plan", post(generate_plan))
        .route("/api/save_project", post(save_project))
        .route("/api/load_project/{name}", get(load_project))
        .route("/api/list_projects", get(list_projects))
        .route("/api/export_csv", post(export_csv))
        .route("/api/export_ics", post(export_ics))
        .route("/api/export_pdf", post(export_pdf))
        .route("/api/chat", post(chat_handler))
        .fallback(not_found)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(state: AppState, bind: &str, port: u16) -> Result<()> {
    let shutdown = state.shutdown.clone();
    let app = build_router(state);
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    tracing::info!("plannerium serve listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;
    tracing::info!("plannerium serve shut down");
    Ok(())
}

/// Resolve on Ctrl-C and abandon any pipeline still running.
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    shutdown.cancel();
}

// ---------------------------------------------------------------------------
// Request parsing
// ---------------------------------------------------------------------------

const PLAN_FIELDS: [&str; 4] = ["goal", "start_date", "deadline", "hours_per_week"];

fn plan_request(body: &Value) -> Result<PlanRequest, AppError> {
    for field in PLAN_FIELDS {
        if body.get(field).is_none_or(Value::is_null) {
            return Err(AppError::bad_request(format!(
                "Missing required field: {field}"
            )));
        }
    }

    let goal = body["goal"]
        .as_str()
        .ok_or_else(|| AppError::bad_request("goal must be a string"))?;
    let start = date_field(body, "start_date")?;
    let deadline = date_field(body, "deadline")?;
    // Form posts send numbers as strings.
    let hours = match &body["hours_per_week"] {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| AppError::bad_request("hours_per_week must be a number"))?;

    PlanRequest::new(goal, start, deadline, hours).map_err(|e| AppError::bad_request(e.to_string()))
}

fn date_field(body: &Value, field: &str) -> Result<NaiveDate, AppError> {
    body[field]
        .as_str()
        .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
        .ok_or_else(|| AppError::bad_request(format!("{field} must be a YYYY-MM-DD date")))
}

/// The plan to export and the name used for the download.
fn export_input(body: &Value) -> Result<(Plan, String), AppError> {
    let data = body
        .get("project_data")
        .filter(|v| !v.is_null())
        .ok_or_else(|| AppError::bad_request("Missing project_data"))?;
    let plan: Plan = serde_json::from_value(data.clone())
        .map_err(|e| AppError::bad_request(format!("Invalid project_data: {e}")))?;
    let name = body
        .get("project_name")
        .or_else(|| data.get("project_name"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("project")
        .to_string();
    Ok((plan, name))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn index(State(state): State<AppState>) -> Result<Response, AppError> {
    let names = state
        .store
        .list()
        .await
        .map_err(|e| AppError::internal("Failed to list projects", e))?;

    let rows = if names.is_empty() {
        "<li>No saved projects.</li>".to_string()
    } else {
        names
            .iter()
            .map(|name| {
                format!(
                    "<li><a href=\"/api/load_project/{href}\">{text}</a></li>",
                    href = html_escape::encode_double_quoted_attribute(name),
                    text = html_escape::encode_text(name),
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let html = format!(
        "<!DOCTYPE html>\
<html><head><meta charset=\"utf-8\"><title>plannerium</title></head><body>\
<h1>plannerium</h1>\
<p>POST a goal to <code>/api/plan</code> to generate a plan.</p>\
<h2>Saved projects</h2><ul>{rows}</ul>\
</body></html>"
    );

    Ok(Html(html).into_response())
}

async fn generate_plan(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(body) = body?;
    let request = plan_request(&body)?;

    let plan = run_pipeline(&request, state.generator.as_ref(), &state.pipeline_options())
        .await
        .map_err(|e| AppError::internal("Failed to generate plan", e))?;

    tracing::info!(
        run_id = %plan.run_id,
        total_secs = plan.performance_metrics.total_time_secs,
        tasks = plan.tasks.len(),
        "plan generated"
    );
    Ok(Json(plan).into_response())
}

async fn save_project(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(body) = body?;

    let (Some(name), Some(data)) = (
        body.get("project_name").and_then(Value::as_str),
        body.get("project_data").filter(|v| !v.is_null()),
    ) else {
        return Err(AppError::bad_request(
            "Missing project_name or project_data",
        ));
    };
    let plan: Plan = serde_json::from_value(data.clone())
        .map_err(|e| AppError::bad_request(format!("Invalid project_data: {e}")))?;
    let time_tracking: Option<TimeTracking> = match body.get("time_tracking") {
        None | Some(Value::Null) => None,
        Some(v) => Some(
            serde_json::from_value(v.clone())
                .map_err(|e| AppError::bad_request(format!("Invalid time_tracking: {e}")))?,
        ),
    };

    let mut project = SavedProject::new(name, plan);
    project.time_tracking = time_tracking;

    match state.store.save(name, &project).await {
        Ok(_) => Ok(Json(json!({ "message": "Project saved successfully" })).into_response()),
        Err(e @ StoreError::InvalidName { .. }) => Err(AppError::bad_request(e.to_string())),
        Err(e) => Err(AppError::internal("Failed to save project", e)),
    }
}

async fn load_project(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, AppError> {
    match state.store.load(&name).await {
        Ok(Some(project)) => Ok(Json(project).into_response()),
        Ok(None) => Err(AppError::not_found("Project not found")),
        Err(e @ StoreError::InvalidName { .. }) => Err(AppError::bad_request(e.to_string())),
        Err(e) => Err(AppError::internal("Failed to load project", e)),
    }
}

async fn list_projects(State(state): State<AppState>) -> Result<Response, AppError> {
    let projects = state
        .store
        .list()
        .await
        .map_err(|e| AppError::internal("Failed to list projects", e))?;
    Ok(Json(json!({ "projects": projects })).into_response())
}

async fn export_csv(body: Result<Json<Value>, JsonRejection>) -> Result<Response, AppError> {
    let Json(body) = body?;
    let (plan, name) = export_input(&body)?;
    Ok(Json(json!({
        "csv_content": export::schedule_csv(&plan),
        "filename": format!("{name}_schedule.csv"),
    }))
    .into_response())
}

async fn export_ics(body: Result<Json<Value>, JsonRejection>) -> Result<Response, AppError> {
    let Json(body) = body?;
    let (plan, name) = export_input(&body)?;
    Ok(Json(json!({
        "ics_content": export::calendar_ics(&plan),
        "filename": format!("{name}_calendar.ics"),
    }))
    .into_response())
}

/// Respond with the PDF itself rather than a JSON envelope.
async fn export_pdf(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(body) = body?;
    let (plan, name) = export_input(&body)?;
    let Some(ref renderer) = state.pdf else {
        return Err(AppError::unavailable(
            "PDF generation not available. Please install wkhtmltopdf.",
        ));
    };

    let bytes = match renderer.render(&export::html_report(&plan, &name)).await {
        Ok(bytes) => bytes,
        Err(ExportError::PdfUnavailable) => {
            return Err(AppError::unavailable(
                "PDF generation not available. Please install wkhtmltopdf.",
            ));
        }
        Err(e) => return Err(AppError::internal("Failed to export PDF", e)),
    };

    let disposition = format!("attachment; filename=\"{}_plan.pdf\"", filename_stem(&name));
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

/// Make a project name safe inside a quoted `Content-Disposition` filename.
fn filename_stem(name: &str) -> String {
    name.chars()
        .map(|c| if c == '"' || c == '\\' || c.is_control() { '_' } else { c })
        .collect()
}

async fn chat_handler(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(body) = body?;
    let message = body
        .get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("Missing message"))?;
    // Clients may send the whole plan as context.
    let context = match body.get("context") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };

    let reply = chat::ask(state.generator.as_ref(), message, &context)
        .await
        .map_err(|e| AppError::internal("Failed to generate response", e))?;

    Ok(Json(json!({
        "response": reply,
        "timestamp": Utc::now().to_rfc3339(),
    }))
    .into_response())
}

async fn not_found() -> AppError {
    AppError::not_found("Endpoint not found")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use plannerium_core::generator::GenerationUnavailable;
    use plannerium_store::{ProjectStore, SavedProject, StoreConfig};
    use plannerium_test_utils::{ScriptedGenerator, sample_plan, temp_store_dir};

    use super::{AppState, filename_stem};

    // -----------------------------------------------------------------------
    // HTTP helpers
    // -----------------------------------------------------------------------

    fn state_with(generator: ScriptedGenerator, dir: &std::path::Path) -> AppState {
        AppState::new(
            ProjectStore::new(StoreConfig::new(dir)),
            Arc::new(generator),
            None,
            Some(std::time::Duration::from_secs(5)),
        )
    }

    async fn get(state: AppState, uri: &str) -> axum::response::Response {
        let app = super::build_router(state);
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn post(state: AppState, uri: &str, body: Value) -> axum::response::Response {
        let app = super::build_router(state);
        app.oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1_048_576)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn plan_body() -> Value {
        json!({
            "goal": "Launch a personal blog",
            "start_date": "2025-03-03",
            "deadline": "2025-03-28",
            "hours_per_week": 10
        })
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_index_lists_projects_as_html() {
        let dir = temp_store_dir();
        let state = state_with(ScriptedGenerator::ok(Vec::<String>::new()), dir.path());
        state
            .store
            .save("<blog> & co", &SavedProject::new("<blog> & co", sample_plan().await))
            .await
            .unwrap();

        let resp = get(state, "/").await;
        assert_eq!(resp.status(), StatusCode::OK);
        let content_type = resp.headers()["content-type"].to_str().unwrap().to_string();
        assert!(content_type.contains("text/html"), "got: {content_type}");

        let bytes = axum::body::to_bytes(resp.into_body(), 1_048_576).await.unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("&lt;blog&gt; &amp; co"), "names are escaped: {html}");
        assert!(!html.contains("<blog>"));
    }

    #[tokio::test]
    async fn test_plan_success_returns_plan() {
        let dir = temp_store_dir();
        let state = state_with(ScriptedGenerator::happy_path(), dir.path());

        let resp = post(state, "/api/plan", plan_body()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["goal"], "Launch a personal blog");
        assert_eq!(json["tasks"].as_array().unwrap().len(), 3);
        assert_eq!(json["schedule"].as_array().unwrap().len(), 3);
        assert!(json["performance_metrics"]["stage_times"].is_array());
    }

    #[tokio::test]
    async fn test_plan_accepts_string_hours() {
        let dir = temp_store_dir();
        let state = state_with(ScriptedGenerator::happy_path(), dir.path());
        let mut body = plan_body();
        body["hours_per_week"] = json!("10");

        let resp = post(state, "/api/plan", body).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_plan_missing_field_is_400() {
        let dir = temp_store_dir();
        let generator = ScriptedGenerator::happy_path();
        let state = state_with(generator, dir.path());
        let mut body = plan_body();
        body.as_object_mut().unwrap().remove("deadline");

        let resp = post(state, "/api/plan", body).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json = body_json(resp).await;
        assert_eq!(json["error"], "Missing required field: deadline");
    }

    #[tokio::test]
    async fn test_plan_invalid_inputs_are_400() {
        let dir = temp_store_dir();
        for (field, value) in [
            ("start_date", json!("03/03/2025")),
            ("hours_per_week", json!(0)),
            ("goal", json!("   ")),
            ("deadline", json!("2025-01-01")),
        ] {
            let state = state_with(ScriptedGenerator::happy_path(), dir.path());
            let mut body = plan_body();
            body[field] = value;
            let resp = post(state, "/api/plan", body).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "field {field}");
        }
    }

    #[tokio::test]
    async fn test_plan_non_json_body_is_400() {
        let dir = temp_store_dir();
        let app = super::build_router(state_with(ScriptedGenerator::happy_path(), dir.path()));
        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/plan")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json = body_json(resp).await;
        assert!(json["error"].as_str().unwrap().starts_with("Invalid JSON body"));
    }

    #[tokio::test]
    async fn test_plan_pipeline_failure_is_500_without_details() {
        let dir = temp_store_dir();
        let generator = ScriptedGenerator::new([Err(GenerationUnavailable::new(
            "secret upstream detail",
        ))]);
        let state = state_with(generator, dir.path());

        let resp = post(state, "/api/plan", plan_body()).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(resp).await;
        assert_eq!(json, json!({ "error": "Failed to generate plan" }));
    }

    #[tokio::test]
    async fn test_save_then_load_and_list() {
        let dir = temp_store_dir();
        let plan = serde_json::to_value(sample_plan().await).unwrap();
        let state = state_with(ScriptedGenerator::ok(Vec::<String>::new()), dir.path());

        let resp = post(
            state.clone(),
            "/api/save_project",
            json!({
                "project_name": "blog",
                "project_data": plan,
                "time_tracking": { "actual_hours": { "task_1": 2.0 } }
            }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            body_json(resp).await,
            json!({ "message": "Project saved successfully" })
        );

        let resp = get(state.clone(), "/api/load_project/blog").await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["project_name"], "blog");
        assert_eq!(json["plan"]["goal"], "Launch a personal blog");
        assert_eq!(json["time_tracking"]["actual_hours"]["task_1"], 2.0);

        let resp = get(state, "/api/list_projects").await;
        assert_eq!(body_json(resp).await, json!({ "projects": ["blog"] }));
    }

    #[tokio::test]
    async fn test_save_rejects_missing_fields_and_bad_names() {
        let dir = temp_store_dir();
        let plan = serde_json::to_value(sample_plan().await).unwrap();
        let state = state_with(ScriptedGenerator::ok(Vec::<String>::new()), dir.path());

        let resp = post(state.clone(), "/api/save_project", json!({ "project_name": "x" })).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(resp).await["error"],
            "Missing project_name or project_data"
        );

        let resp = post(
            state.clone(),
            "/api/save_project",
            json!({ "project_name": "../escape", "project_data": plan }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = post(
            state,
            "/api/save_project",
            json!({ "project_name": "x", "project_data": { "goal": 1 } }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_load_missing_project_is_404() {
        let dir = temp_store_dir();
        let state = state_with(ScriptedGenerator::ok(Vec::<String>::new()), dir.path());

        let resp = get(state, "/api/load_project/nothing").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(resp).await, json!({ "error": "Project not found" }));
    }

    #[tokio::test]
    async fn test_list_projects_empty() {
        let dir = temp_store_dir();
        let state = state_with(ScriptedGenerator::ok(Vec::<String>::new()), dir.path());

        let resp = get(state, "/api/list_projects").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await, json!({ "projects": [] }));
    }

    #[tokio::test]
    async fn test_export_csv_and_ics() {
        let dir = temp_store_dir();
        let plan = serde_json::to_value(sample_plan().await).unwrap();
        let state = state_with(ScriptedGenerator::ok(Vec::<String>::new()), dir.path());

        let resp = post(
            state.clone(),
            "/api/export_csv",
            json!({ "project_name": "blog", "project_data": plan.clone() }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["filename"], "blog_schedule.csv");
        assert!(json["csv_content"]
            .as_str()
            .unwrap()
            .starts_with("Week Start,Week Number"));

        let resp = post(state, "/api/export_ics", json!({ "project_data": plan })).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["filename"], "project_calendar.ics");
        assert!(json["ics_content"].as_str().unwrap().contains("BEGIN:VEVENT"));
    }

    #[tokio::test]
    async fn test_export_without_project_data_is_400() {
        let dir = temp_store_dir();
        let state = state_with(ScriptedGenerator::ok(Vec::<String>::new()), dir.path());

        let resp = post(state, "/api/export_csv", json!({ "project_name": "blog" })).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"], "Missing project_data");
    }

    #[tokio::test]
    async fn test_export_pdf_without_renderer_is_503() {
        let dir = temp_store_dir();
        let plan = serde_json::to_value(sample_plan().await).unwrap();
        let state = state_with(ScriptedGenerator::ok(Vec::<String>::new()), dir.path());

        let resp = post(state, "/api/export_pdf", json!({ "project_data": plan })).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[cfg(unix)]
    fn fake_renderer(dir: &std::path::Path) -> plannerium_core::export::PdfRenderer {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("fake-wkhtmltopdf");
        std::fs::write(&script, "#!/bin/sh\ncat > /dev/null\nprintf '%%PDF-fake'\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        plannerium_core::export::PdfRenderer::with_binary(&script).unwrap()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_export_pdf_streams_renderer_output() {
        let dir = temp_store_dir();
        let plan = serde_json::to_value(sample_plan().await).unwrap();
        let mut state = state_with(ScriptedGenerator::ok(Vec::<String>::new()), dir.path());
        state.pdf = Some(fake_renderer(dir.path()));

        let resp = post(
            state,
            "/api/export_pdf",
            json!({ "project_name": "blog", "project_data": plan }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["content-type"], "application/pdf");
        assert_eq!(
            resp.headers()["content-disposition"],
            "attachment; filename=\"blog_plan.pdf\""
        );
        let bytes = axum::body::to_bytes(resp.into_body(), 1_048_576).await.unwrap();
        assert_eq!(&bytes[..], b"%PDF-fake");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_export_pdf_with_control_chars_in_name() {
        let dir = temp_store_dir();
        let plan = serde_json::to_value(sample_plan().await).unwrap();
        let mut state = state_with(ScriptedGenerator::ok(Vec::<String>::new()), dir.path());
        state.pdf = Some(fake_renderer(dir.path()));

        let resp = post(
            state,
            "/api/export_pdf",
            json!({ "project_name": "my\nblog\"\u{7f}", "project_data": plan }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()["content-disposition"],
            "attachment; filename=\"my_blog___plan.pdf\""
        );
    }

    #[test]
    fn test_filename_stem_replaces_unsafe_chars() {
        assert_eq!(filename_stem("plain name"), "plain name");
        assert_eq!(filename_stem("a\"b\\c\r\td"), "a_b_c__d");
    }

    #[tokio::test]
    async fn test_chat_replies_with_timestamp() {
        let dir = temp_store_dir();
        let generator = ScriptedGenerator::ok(["  Break the goal into weekly steps.  "]);
        let state = state_with(generator, dir.path());

        let resp = post(
            state,
            "/api/chat",
            json!({ "message": "How should I start?", "context": "Goal: blog" }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["response"], "Break the goal into weekly steps.");
        assert!(json["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_chat_errors() {
        let dir = temp_store_dir();
        let state = state_with(ScriptedGenerator::ok(Vec::<String>::new()), dir.path());

        let resp = post(state.clone(), "/api/chat", json!({ "context": "x" })).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"], "Missing message");

        // Empty script: the generator is unavailable.
        let resp = post(state, "/api/chat", json!({ "message": "hi" })).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(resp).await,
            json!({ "error": "Failed to generate response" })
        );
    }

    #[tokio::test]
    async fn test_unknown_route_is_json_404() {
        let dir = temp_store_dir();
        let state = state_with(ScriptedGenerator::ok(Vec::<String>::new()), dir.path());

        let resp = get(state, "/api/nope").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(resp).await, json!({ "error": "Endpoint not found" }));
    }

    #[tokio::test]
    async fn test_shutdown_cancels_running_pipeline() {
        let dir = temp_store_dir();
        let generator =
            ScriptedGenerator::happy_path().with_delay(std::time::Duration::from_secs(5));
        let state = state_with(generator, dir.path());
        let shutdown = state.shutdown.clone();

        let request = tokio::spawn(post(state, "/api/plan", plan_body()));
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        shutdown.cancel();

        let resp = tokio::time::timeout(std::time::Duration::from_secs(2), request)
            .await
            .expect("request finishes promptly after shutdown")
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
