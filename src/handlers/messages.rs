use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, AppResult},
    models::{
        Conversation, ConversationStarted, ConversationSummary, MarkedRead, Message,
        NewNotification, PageParams, SendMessageRequest, StartConversationRequest,
        conversation_pair, validate_message_body,
    },
    notify::notify,
};

/// Conversations are invisible to non-participants.
async fn participant_conversation(state: &AppState, id: Uuid, user: &AuthUser) -> AppResult<Conversation> {
    state
        .repos
        .messages
        .get_conversation(id)
        .await?
        .filter(|conversation| conversation.has_participant(user.id))
        .ok_or(AppError::NotFound)
}

#[utoipa::path(
    get,
    path = "/conversations",
    params(PageParams),
    responses((status = 200, description = "Inbox", body = [ConversationSummary]))
)]
pub async fn list_conversations(
    user: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> AppResult<Json<Vec<ConversationSummary>>> {
    let page = params.pagination();
    Ok(Json(state.repos.messages.list_conversations(user.id, page).await?))
}

/// start_conversation
///
/// [Authenticated Route] Opens (or reuses) the conversation with `recipient_id` and
/// sends the first message.
#[utoipa::path(
    post,
    path = "/conversations",
    request_body = StartConversationRequest,
    responses(
        (status = 201, description = "Message sent", body = ConversationStarted),
        (status = 400, description = "Messaging yourself or invalid body"),
        (status = 404, description = "Recipient not found")
    )
)]
pub async fn start_conversation(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<StartConversationRequest>,
) -> AppResult<(StatusCode, Json<ConversationStarted>)> {
    let pair = conversation_pair(user.id, payload.recipient_id)?;
    let body = validate_message_body(&payload.body)?;
    state
        .repos
        .users
        .get_user(payload.recipient_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let conversation = state.repos.messages.find_or_create_conversation(pair).await?;
    let message = state.repos.messages.send_message(conversation.id, user.id, body).await?;
    notify(
        &state,
        NewNotification::about_conversation(payload.recipient_id, user.id, conversation.id),
    )
    .await;

    Ok((StatusCode::CREATED, Json(ConversationStarted { conversation, message })))
}

#[utoipa::path(
    get,
    path = "/conversations/{id}/messages",
    params(("id" = Uuid, Path, description = "Conversation ID"), PageParams),
    responses(
        (status = 200, description = "Messages, newest first", body = [Message]),
        (status = 404, description = "Not Found")
    )
)]
pub async fn list_messages(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<PageParams>,
) -> AppResult<Json<Vec<Message>>> {
    let conversation = participant_conversation(&state, id, &user).await?;
    let messages = state
        .repos
        .messages
        .list_messages(conversation.id, params.pagination())
        .await?;
    Ok(Json(messages))
}

#[utoipa::path(
    post,
    path = "/conversations/{id}/messages",
    params(("id" = Uuid, Path, description = "Conversation ID")),
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Sent", body = Message),
        (status = 404, description = "Not Found")
    )
)]
pub async fn send_message(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SendMessageRequest>,
) -> AppResult<(StatusCode, Json<Message>)> {
    let body = validate_message_body(&payload.body)?;
    let conversation = participant_conversation(&state, id, &user).await?;
    let message = state.repos.messages.send_message(conversation.id, user.id, body).await?;
    notify(
        &state,
        NewNotification::about_conversation(conversation.other_participant(user.id), user.id, conversation.id),
    )
    .await;
    Ok((StatusCode::CREATED, Json(message)))
}

/// mark_conversation_read
///
/// [Authenticated Route] Marks every message from the other participant as read.
#[utoipa::path(
    post,
    path = "/conversations/{id}/read",
    params(("id" = Uuid, Path, description = "Conversation ID")),
    responses(
        (status = 200, description = "Messages marked read", body = MarkedRead),
        (status = 404, description = "Not Found")
    )
)]
pub async fn mark_conversation_read(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MarkedRead>> {
    let conversation = participant_conversation(&state, id, &user).await?;
    let updated = state
        .repos
        .messages
        .mark_conversation_read(conversation.id, user.id)
        .await?;
    Ok(Json(MarkedRead { updated }))
}
