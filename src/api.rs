//! # Connect-API
//!
//! JSON over HTTP for every Community Connect operation, powered by Axum.
//!
//! ## Endpoints
//!
//! - `GET/POST /v1/volunteers` - List / register volunteers (optionally with skills and events)
//! - `GET /v1/volunteers/search?skill=` - Volunteers by skill, most proficient first
//! - `GET/DELETE /v1/volunteers/:id` - Fetch / remove a volunteer
//! - `PUT /v1/volunteers/:id/contact` - Change phone (and address)
//! - `POST /v1/volunteers/:id/skills` - Add a skill claim
//! - `GET/POST /v1/organisations`, `GET/DELETE /v1/organisations/:id`
//! - `GET /v1/organisations/:id/volunteers` - Registrations across the organisation's events
//! - `GET/POST /v1/skills`
//! - `GET/POST /v1/events`, `GET/DELETE /v1/events/:id`
//! - `POST /v1/events/:id/skills` - Declare a required skill
//! - `POST /v1/events/:id/registrations` - Register a volunteer, capacity permitting
//! - `PUT /v1/registrations/:volunteer_id/:event_id` - Set attendance
//! - `GET /v1/reports/{event-statistics,skills,organisations,directory}`

use crate::db::ConnectStore;
use crate::error::ConnectError;
use crate::model::{
    AttendanceStatus, NewEvent, NewOrganisation, NewSkill, NewVolunteer, Priority, Proficiency,
    SkillClaim,
};
use crate::queries::QueryService;
use crate::schema::row_counts;
use crate::writes::RegistrationService;
use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Path, Query, Request, State},
    http::{request::Parts, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ConnectStore>,
    pub writes: RegistrationService,
    pub queries: QueryService,
}

impl AppState {
    pub fn new(store: Arc<ConnectStore>) -> Self {
        Self {
            writes: RegistrationService::new(Arc::clone(&store)),
            queries: QueryService::new(Arc::clone(&store)),
            store,
        }
    }
}

/// Standard API response
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn success_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
        }
    }
}

/// JSON body extractor whose rejection is a `ConnectError::InvalidArgument`
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ConnectError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// Path extractor whose rejection is a `ConnectError::InvalidArgument`
pub struct ApiPath<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ConnectError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

/// Query-string extractor whose rejection is a `ConnectError::InvalidArgument`
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ConnectError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

/// Id of a newly created row
#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub id: i64,
}

/// Body of `POST /v1/volunteers`
#[derive(Debug, Deserialize)]
pub struct RegisterVolunteerRequest {
    #[serde(flatten)]
    pub volunteer: NewVolunteer,
    #[serde(default)]
    pub skills: Vec<SkillClaim>,
    #[serde(default)]
    pub event_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ContactRequest {
    pub phone: String,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EventSkillRequest {
    pub skill_id: i64,
    pub priority: Priority,
    pub min_proficiency: Proficiency,
}

#[derive(Debug, Deserialize)]
pub struct RegistrationRequest {
    pub volunteer_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct AttendanceRequest {
    pub attendance_status: AttendanceStatus,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub skill: String,
}

/// Creates the Axum router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Volunteers
        .route("/v1/volunteers", get(list_volunteers_handler).post(register_volunteer_handler))
        .route("/v1/volunteers/search", get(search_handler))
        .route(
            "/v1/volunteers/:id",
            get(get_volunteer_handler).delete(delete_volunteer_handler),
        )
        .route("/v1/volunteers/:id/contact", put(update_contact_handler))
        .route("/v1/volunteers/:id/skills", post(add_volunteer_skill_handler))
        // Organisations
        .route(
            "/v1/organisations",
            get(list_organisations_handler).post(create_organisation_handler),
        )
        .route(
            "/v1/organisations/:id",
            get(get_organisation_handler).delete(delete_organisation_handler),
        )
        .route("/v1/organisations/:id/volunteers", get(organisation_volunteers_handler))
        // Skills
        .route("/v1/skills", get(list_skills_handler).post(create_skill_handler))
        // Events
        .route("/v1/events", get(list_events_handler).post(create_event_handler))
        .route(
            "/v1/events/:id",
            get(get_event_handler).delete(delete_event_handler),
        )
        .route("/v1/events/:id/skills", post(add_event_skill_handler))
        .route("/v1/events/:id/registrations", post(register_for_event_handler))
        .route(
            "/v1/registrations/:volunteer_id/:event_id",
            put(set_attendance_handler),
        )
        // Reports
        .route("/v1/reports/event-statistics", get(event_statistics_handler))
        .route("/v1/reports/skills", get(skill_distribution_handler))
        .route("/v1/reports/organisations", get(organisation_summary_handler))
        .route("/v1/reports/directory", get(directory_handler))
        // Health check
        .route("/health", get(health_handler))
        .route("/", get(root_handler))
        // Middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Root handler - API info
async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "name": "Community Connect",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Volunteer, organisation and event registry",
        "endpoints": {
            "volunteers": "GET|POST /v1/volunteers",
            "search": "GET /v1/volunteers/search?skill=",
            "organisations": "GET|POST /v1/organisations",
            "organisation_volunteers": "GET /v1/organisations/:id/volunteers",
            "skills": "GET|POST /v1/skills",
            "events": "GET|POST /v1/events",
            "registrations": "POST /v1/events/:id/registrations",
            "attendance": "PUT /v1/registrations/:volunteer_id/:event_id",
            "reports": "GET /v1/reports/{event-statistics,skills,organisations,directory}",
            "health": "GET /health"
        }
    }))
}

/// Health check endpoint, with row counts once the schema exists
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    if let Err(e) = state.store.ping().await {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "database": "disconnected",
                "error": e.to_string()
            })),
        );
    }

    let rows: Option<Map<String, Value>> = state
        .store
        .read(row_counts)
        .await
        .ok()
        .map(|counts| counts.into_iter().map(|(table, n)| (table, json!(n))).collect());
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "database": "connected",
            "rows": rows
        })),
    )
}

// ============================================================================
// Volunteers
// ============================================================================

async fn list_volunteers_handler(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ConnectError> {
    Ok(Json(ApiResponse::success(state.queries.list_volunteers().await?)))
}

/// POST /v1/volunteers - Register a volunteer with optional skills and events
async fn register_volunteer_handler(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterVolunteerRequest>,
) -> Result<impl IntoResponse, ConnectError> {
    info!(
        "Registering volunteer {} with {} skills and {} events",
        request.volunteer.email,
        request.skills.len(),
        request.event_ids.len()
    );
    let id = state
        .writes
        .register_volunteer_with_skills_and_events(
            request.volunteer,
            request.skills,
            request.event_ids,
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success_with_message(
            CreatedResponse { id },
            "Volunteer registered",
        )),
    ))
}

/// GET /v1/volunteers/search?skill= - Skill search
async fn search_handler(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<SearchParams>,
) -> Result<impl IntoResponse, ConnectError> {
    debug!("Searching volunteers by skill: {}", params.skill);
    let matches = state.queries.search_volunteers_by_skill(params.skill).await?;
    Ok(Json(json!({
        "success": true,
        "count": matches.len(),
        "data": matches
    })))
}

async fn get_volunteer_handler(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ConnectError> {
    Ok(Json(ApiResponse::success(state.queries.get_volunteer(id).await?)))
}

async fn delete_volunteer_handler(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ConnectError> {
    state.writes.delete_volunteer(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /v1/volunteers/:id/contact - Phone only, or phone and address
async fn update_contact_handler(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<ContactRequest>,
) -> Result<impl IntoResponse, ConnectError> {
    match request.address {
        Some(address) => {
            state
                .writes
                .update_volunteer_contact(id, request.phone, address)
                .await?
        }
        None => state.writes.update_volunteer_phone(id, request.phone).await?,
    }
    Ok(Json(ApiResponse::success(state.queries.get_volunteer(id).await?)))
}

async fn add_volunteer_skill_handler(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(claim): ApiJson<SkillClaim>,
) -> Result<impl IntoResponse, ConnectError> {
    state.writes.add_volunteer_skill(id, claim).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success_with_message(claim, "Skill added")),
    ))
}

// ============================================================================
// Organisations
// ============================================================================

async fn list_organisations_handler(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ConnectError> {
    Ok(Json(ApiResponse::success(state.queries.list_organisations().await?)))
}

async fn create_organisation_handler(
    State(state): State<AppState>,
    ApiJson(organisation): ApiJson<NewOrganisation>,
) -> Result<impl IntoResponse, ConnectError> {
    let id = state.writes.create_organisation(organisation).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(CreatedResponse { id }))))
}

async fn get_organisation_handler(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ConnectError> {
    Ok(Json(ApiResponse::success(state.queries.get_organisation(id).await?)))
}

async fn delete_organisation_handler(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ConnectError> {
    state.writes.delete_organisation(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn organisation_volunteers_handler(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ConnectError> {
    let rows = state.queries.organisation_volunteers(id).await?;
    Ok(Json(json!({
        "success": true,
        "count": rows.len(),
        "data": rows
    })))
}

// ============================================================================
// Skills
// ============================================================================

async fn list_skills_handler(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ConnectError> {
    Ok(Json(ApiResponse::success(state.queries.list_skills().await?)))
}

async fn create_skill_handler(
    State(state): State<AppState>,
    ApiJson(skill): ApiJson<NewSkill>,
) -> Result<impl IntoResponse, ConnectError> {
    let id = state.writes.create_skill(skill).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(CreatedResponse { id }))))
}

// ============================================================================
// Events and registrations
// ============================================================================

async fn list_events_handler(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ConnectError> {
    Ok(Json(ApiResponse::success(state.queries.list_events().await?)))
}

async fn create_event_handler(
    State(state): State<AppState>,
    ApiJson(event): ApiJson<NewEvent>,
) -> Result<impl IntoResponse, ConnectError> {
    let id = state.writes.create_event(event).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(CreatedResponse { id }))))
}

async fn get_event_handler(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ConnectError> {
    Ok(Json(ApiResponse::success(state.queries.get_event(id).await?)))
}

async fn delete_event_handler(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ConnectError> {
    state.writes.delete_event(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_event_skill_handler(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<EventSkillRequest>,
) -> Result<impl IntoResponse, ConnectError> {
    state
        .writes
        .add_event_skill(id, request.skill_id, request.priority, request.min_proficiency)
        .await?;
    Ok(StatusCode::CREATED)
}

/// POST /v1/events/:id/registrations - Register an existing volunteer
async fn register_for_event_handler(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<RegistrationRequest>,
) -> Result<impl IntoResponse, ConnectError> {
    state.writes.register_for_event(request.volunteer_id, id).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "volunteer_id": request.volunteer_id,
            "event_id": id
        })),
    ))
}

async fn set_attendance_handler(
    State(state): State<AppState>,
    ApiPath((volunteer_id, event_id)): ApiPath<(i64, i64)>,
    ApiJson(request): ApiJson<AttendanceRequest>,
) -> Result<impl IntoResponse, ConnectError> {
    state
        .writes
        .set_attendance(volunteer_id, event_id, request.attendance_status)
        .await?;
    Ok(Json(json!({
        "success": true,
        "volunteer_id": volunteer_id,
        "event_id": event_id,
        "attendance_status": request.attendance_status
    })))
}

// ============================================================================
// Reports
// ============================================================================

async fn event_statistics_handler(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ConnectError> {
    Ok(Json(ApiResponse::success(state.queries.event_statistics().await?)))
}

async fn skill_distribution_handler(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ConnectError> {
    Ok(Json(ApiResponse::success(state.queries.skill_distribution().await?)))
}

async fn organisation_summary_handler(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ConnectError> {
    Ok(Json(ApiResponse::success(state.queries.organisation_summary().await?)))
}

async fn directory_handler(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ConnectError> {
    Ok(Json(ApiResponse::success(state.queries.volunteer_directory().await?)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::util::ServiceExt;

    async fn create_test_app() -> Router {
        let store = Arc::new(ConnectStore::in_memory().await.unwrap());
        seed::initialize(&store, true).await.unwrap();
        create_router(AppState::new(store))
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = create_test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["rows"]["volunteer"], 8);
    }

    #[tokio::test]
    async fn test_register_and_fetch_volunteer() {
        let app = create_test_app().await;

        let response = app
            .clone()
            .oneshot(post_json(
                "/v1/volunteers",
                json!({
                    "first_name": "Noah",
                    "last_name": "Lee",
                    "date_of_birth": "1994-04-04",
                    "email": "noah.lee@example.com",
                    "phone": "0411222333",
                    "address": "1 Test St, Sydney NSW 2000",
                    "skills": [{"skill_id": 1, "proficiency_level": "Advanced", "years_experience": 3}],
                    "event_ids": [6]
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let id = body_json(response).await["data"]["id"].as_i64().unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/v1/volunteers/{}", id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["email"], "noah.lee@example.com");
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let app = create_test_app().await;
        let response = app
            .oneshot(post_json(
                "/v1/volunteers",
                json!({
                    "first_name": "Amy",
                    "last_name": "Nguyen",
                    "date_of_birth": "1990-01-01",
                    "email": "amelia.nguyen@example.com",
                    "phone": "0411222333",
                    "address": "Sydney"
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "DUPLICATE_EMAIL");
    }

    #[tokio::test]
    async fn test_search_orders_results() {
        let app = create_test_app().await;
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1/volunteers/search?skill=First%20Aid")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["data"][0]["proficiency_level"], "Expert");
        assert_eq!(body["data"][0]["years_experience"], 8);
        assert_eq!(body["data"][1]["proficiency_level"], "Advanced");
        assert_eq!(body["data"][1]["years_experience"], 10);
    }

    #[tokio::test]
    async fn test_full_event_rejects_registration() {
        let app = create_test_app().await;
        // event 5 holds two volunteers and is already full
        let response = app
            .oneshot(post_json(
                "/v1/events/5/registrations",
                json!({ "volunteer_id": 8 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(response).await["error"]["code"], "CAPACITY_EXCEEDED");
    }

    #[tokio::test]
    async fn test_unknown_category_is_invalid_argument() {
        let app = create_test_app().await;
        let response = app
            .oneshot(post_json(
                "/v1/skills",
                json!({ "skill_name": "Juggling", "skill_category": "Circus" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "INVALID_ARGUMENT");
    }

    #[tokio::test]
    async fn test_malformed_requests_use_error_body() {
        let app = create_test_app().await;

        let broken_json = Request::builder()
            .method("POST")
            .uri("/v1/organisations")
            .header("content-type", "application/json")
            .body(Body::from("{\"org_name\": "))
            .unwrap();
        let bad_id = Request::builder()
            .uri("/v1/volunteers/abc")
            .body(Body::empty())
            .unwrap();
        let missing_param = Request::builder()
            .uri("/v1/volunteers/search")
            .body(Body::empty())
            .unwrap();

        for request in [broken_json, bad_id, missing_param] {
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(body_json(response).await["error"]["code"], "INVALID_ARGUMENT");
        }
    }

    #[tokio::test]
    async fn test_unknown_event_is_not_found() {
        let app = create_test_app().await;
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1/events/999")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_event_statistics_report() {
        let app = create_test_app().await;
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1/reports/event-statistics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        let rows = body["data"].as_array().unwrap();
        assert_eq!(rows.len(), 6);
        let sweep = rows
            .iter()
            .find(|r| r["event_name"] == "Spring Harbour Sweep")
            .unwrap();
        assert_eq!(sweep["volunteer_count"], 0);
        assert_eq!(sweep["occupancy"], "Empty");
    }
}
