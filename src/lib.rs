use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

// --- Module Structure ---

pub mod auth;
pub mod auth_provider;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod notify;
pub mod push;
pub mod repository;
pub mod storage;

// Routers split by access level.
pub mod routes;

use auth::AuthUser;
use error::AppError;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use auth_provider::{AuthProviderState, MockAuthProvider, SupabaseAuthClient};
pub use config::AppConfig;
pub use push::{DisabledPush, MockPushService, PushState, WebPushClient};
pub use repository::{Repositories, UserRepoState};
pub use storage::{MockStorageService, S3StorageClient, StorageState};

/// ApiDoc
///
/// OpenAPI document for every annotated handler, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::users::register_user, handlers::users::create_session, handlers::users::delete_session,
        handlers::users::get_me, handlers::users::update_me, handlers::users::get_my_communities,
        handlers::users::get_user_profile,
        handlers::posts::list_posts, handlers::posts::get_post, handlers::posts::create_post,
        handlers::posts::update_post, handlers::posts::delete_post, handlers::posts::like_post,
        handlers::posts::unlike_post, handlers::posts::list_comments, handlers::posts::add_comment,
        handlers::posts::delete_comment,
        handlers::communities::list_communities, handlers::communities::get_community,
        handlers::communities::create_community, handlers::communities::join_community,
        handlers::communities::leave_community, handlers::communities::list_members,
        handlers::communities::review_member, handlers::communities::remove_member,
        handlers::messages::list_conversations, handlers::messages::start_conversation,
        handlers::messages::list_messages, handlers::messages::send_message,
        handlers::messages::mark_conversation_read,
        handlers::notifications::get_notifications, handlers::notifications::get_unread_count,
        handlers::notifications::mark_notification_read,
        handlers::notifications::mark_all_notifications_read,
        handlers::notifications::get_vapid_public_key, handlers::notifications::subscribe_push,
        handlers::notifications::unsubscribe_push,
        handlers::reports::create_report,
        handlers::tags::list_tags,
        handlers::uploads::get_presigned_url,
        handlers::admin::get_admin_stats, handlers::admin::get_admin_posts,
        handlers::admin::update_post_status, handlers::admin::delete_post_admin,
        handlers::admin::delete_comment_admin, handlers::admin::get_reports,
        handlers::admin::resolve_report, handlers::admin::get_pending_memberships,
        handlers::admin::set_user_role
    ),
    components(
        schemas(
            models::User, models::PublicProfile, models::UserRole, models::RegisterUserRequest,
            models::UpdateProfileRequest, models::SetRoleRequest, models::AdminDashboardStats,
            handlers::users::CreateSessionRequest,
            models::Post, models::PostStatus, models::CreatePostRequest, models::UpdatePostRequest,
            models::SetPostStatusRequest, models::Comment, models::CreateCommentRequest,
            models::Community, models::CreateCommunityRequest, models::Membership, models::MemberView,
            models::MemberRole, models::MembershipStatus, models::ReviewAction,
            models::ReviewMembershipRequest,
            models::Conversation, models::ConversationSummary, models::Message,
            models::StartConversationRequest, models::SendMessageRequest, models::ConversationStarted,
            models::MarkedRead,
            models::NotificationResponse, models::NotificationKind, models::UnreadCount,
            models::PushSubscriptionRequest, models::PushSubscriptionKeys,
            models::SubscriptionResponse, models::VapidPublicKey,
            models::Report, models::ReportTarget, models::ReportTargetKind, models::ReportStatus,
            models::CreateReportRequest, models::ResolveReportRequest,
            models::TagCount,
            models::PresignedUrlRequest, models::PresignedUrlResponse, models::UploadPurpose,
        )
    ),
    tags(
        (name = "community-api", description = "Community platform API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Everything a handler may need, cloned cheaply per request: the service layer,
/// the outside services and the configuration.
#[derive(Clone)]
pub struct AppState {
    pub repos: Repositories,
    pub storage: StorageState,
    pub push: PushState,
    pub auth_provider: AuthProviderState,
    pub config: AppConfig,
}

// The auth extractors only need these two pieces of state.

impl FromRef<AppState> for UserRepoState {
    fn from_ref(app_state: &AppState) -> UserRepoState {
        app_state.repos.users.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// Rejects the request with 401 unless a session resolves.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// Rejects with 401 without a session and 403 without the admin role.
async fn admin_middleware(auth_user: AuthUser, request: Request, next: Next) -> Result<Response, AppError> {
    auth_user.require_admin()?;
    Ok(next.run(request).await)
}

/// create_router
///
/// Assembles the public, authenticated and admin routers with their guards, then
/// wraps everything in request-id, tracing and CORS layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        .nest(
            "/admin",
            admin::admin_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), admin_middleware)),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// One span per request, tagged with the `x-request-id` set by the outer layer so
/// every log line of a request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
