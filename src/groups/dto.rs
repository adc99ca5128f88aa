use serde::{Deserialize, Serialize};

use super::repo_types::Group;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupRequest {
    pub group_name: Option<String>,
    pub coach: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendGroupMessageRequest {
    pub sender: Option<String>,
    pub group_id: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddMembersRequest {
    #[serde(default)]
    pub members: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveMemberRequest {
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MembersAddedResponse {
    pub message: String,
    pub group: Group,
}
