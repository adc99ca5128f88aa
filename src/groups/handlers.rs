use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{
        AddMembersRequest, CreateGroupRequest, MembersAddedResponse, RemoveMemberRequest,
        SendGroupMessageRequest,
    },
    repo,
    repo_types::{Group, GroupInfo},
    services::new_members,
};
use crate::{
    auth::{
        repo_types::{User, ROLE_COACH},
        CurrentUser,
    },
    chat::{
        self,
        repo_types::{Addressee, ChatMessage, NewMessage},
        services::{check_claimed_sender, require_content},
    },
    error::{parse_id, AppError, JsonBody},
    realtime::{notify_users, DispatchAction},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/group", post(create_group))
        .route("/group/send", post(send_group_message))
        .route("/group/remove/:groupId", delete(remove_member))
        .route("/group/:groupId", get(group_messages).delete(delete_group))
        .route("/group/:groupId/info", get(group_info))
        .route("/group/:groupId/members", post(add_members))
}

async fn load_group(state: &AppState, raw_id: &str) -> Result<Group, AppError> {
    let id = parse_id(raw_id, "Invalid group ID")?;
    repo::find(&state.db, id)
        .await?
        .ok_or_else(|| AppError::not_found("Group not found"))
}

fn require_manager(group: &Group, user: &User) -> Result<(), AppError> {
    if group.coach_id == user.id || user.is_admin() {
        Ok(())
    } else {
        warn!(group_id = %group.id, user_id = %user.id, "group management refused");
        Err(AppError::forbidden("Only the group's coach can do this"))
    }
}

fn require_participant(group: &Group, user: &User) -> Result<(), AppError> {
    if group.is_participant(user.id) || user.is_admin() {
        Ok(())
    } else {
        Err(AppError::forbidden("You are not part of this group"))
    }
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create_group(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    JsonBody(body): JsonBody<CreateGroupRequest>,
) -> Result<(StatusCode, Json<Group>), AppError> {
    let name = body.group_name.as_deref().map(str::trim).filter(|n| !n.is_empty());
    let coach = body.coach.as_deref().map(str::trim).filter(|c| !c.is_empty());
    let (Some(name), Some(coach)) = (name, coach) else {
        return Err(AppError::bad_request("Group name and coach are required"));
    };
    let coach_id = parse_id(coach, "Invalid coach ID")?;

    let coach = User::find_by_id(&state.db, coach_id)
        .await?
        .ok_or_else(|| AppError::bad_request("Coach not found"))?;
    if coach.role != ROLE_COACH && !coach.is_admin() {
        return Err(AppError::bad_request("The selected user is not a coach"));
    }

    let group = repo::create(&state.db, coach_id, name).await?;
    info!(group_id = %group.id, %coach_id, "group created");
    Ok((StatusCode::CREATED, Json(group)))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn group_messages(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(group_id): Path<String>,
) -> Result<Json<Vec<ChatMessage>>, AppError> {
    let group = load_group(&state, &group_id).await?;
    require_participant(&group, &user)?;
    Ok(Json(chat::repo::group_messages(&state.db, group.id).await?))
}

#[instrument(skip(state, _caller))]
pub async fn group_info(
    State(state): State<AppState>,
    _caller: CurrentUser,
    Path(group_id): Path<String>,
) -> Result<Json<GroupInfo>, AppError> {
    let group = load_group(&state, &group_id).await?;

    let mut ids = group.members.clone();
    ids.push(group.coach_id);
    let people = User::summaries(&state.db, &ids).await?;

    let coach = people.iter().find(|u| u.id == group.coach_id).cloned();
    let members = group
        .members
        .iter()
        .filter_map(|m| people.iter().find(|u| u.id == *m).cloned())
        .collect();

    Ok(Json(GroupInfo {
        id: group.id,
        name: group.name,
        coach,
        members,
        created_at: group.created_at,
    }))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn send_group_message(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    JsonBody(body): JsonBody<SendGroupMessageRequest>,
) -> Result<(StatusCode, Json<ChatMessage>), AppError> {
    check_claimed_sender(body.sender.as_deref(), user.id)?;
    let raw_group = body
        .group_id
        .as_deref()
        .ok_or_else(|| AppError::bad_request("groupId is required"))?;
    let content = require_content(body.content.as_deref())?;
    let group = load_group(&state, raw_group).await?;

    if !group.is_participant(user.id) {
        warn!(group_id = %group.id, "sender is not in the group");
        return Err(AppError::forbidden("You are not part of this group"));
    }

    let msg = chat::repo::insert(
        &state.db,
        NewMessage {
            sender_id: user.id,
            to: Addressee::Group(group.id),
            content,
            image_key: None,
        },
    )
    .await?;

    let recipients = group.recipients();
    info!(message_id = %msg.id, group_id = %group.id, recipients = recipients.len(), "group message sent");
    notify_users(state.presence.as_ref(), recipients, DispatchAction::Post, &msg).await;
    Ok((StatusCode::CREATED, Json(msg)))
}

#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn add_members(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(group_id): Path<String>,
    JsonBody(body): JsonBody<AddMembersRequest>,
) -> Result<Json<MembersAddedResponse>, AppError> {
    if body.members.is_empty() {
        return Err(AppError::bad_request("A non-empty members list is required"));
    }
    let incoming = body
        .members
        .iter()
        .map(|m| parse_id(m, "Invalid user ID"))
        .collect::<Result<Vec<Uuid>, _>>()?;

    let group = load_group(&state, &group_id).await?;
    require_manager(&group, &user)?;

    let added = new_members(&group.members, &incoming);
    if added.is_empty() {
        return Err(AppError::bad_request("All members are already in the group"));
    }
    if User::count_existing(&state.db, &added).await? != added.len() as i64 {
        return Err(AppError::bad_request("Unknown user in members list"));
    }

    let group = repo::add_members(&state.db, group.id, &added)
        .await?
        .ok_or_else(|| AppError::not_found("Group not found"))?;

    info!(group_id = %group.id, added = added.len(), "members added");
    Ok(Json(MembersAddedResponse {
        message: "Members added successfully".into(),
        group,
    }))
}

#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn remove_member(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(group_id): Path<String>,
    JsonBody(body): JsonBody<RemoveMemberRequest>,
) -> Result<Json<Value>, AppError> {
    let raw = body
        .user_id
        .as_deref()
        .ok_or_else(|| AppError::bad_request("userId is required"))?;
    let target = parse_id(raw, "Invalid user ID")?;

    let group = load_group(&state, &group_id).await?;
    if target != user.id {
        require_manager(&group, &user)?;
    }
    if repo::remove_member(&state.db, group.id, target).await?.is_none() {
        return Err(AppError::bad_request("The user is not a member of this group"));
    }

    info!(group_id = %group.id, %target, "member removed");
    Ok(Json(json!({ "message": "User removed from the group" })))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete_group(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(group_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let group = load_group(&state, &group_id).await?;
    require_manager(&group, &user)?;

    if !repo::delete(&state.db, group.id).await? {
        return Err(AppError::not_found("Group not found"));
    }
    info!(group_id = %group.id, "group deleted");
    Ok(Json(json!({ "message": "Group deleted successfully" })))
}
