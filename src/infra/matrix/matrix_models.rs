// Wire types for the Matrix client-server API. Only the fields we read.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct JoinedRoomsResponse {
    #[serde(default)]
    pub joined_rooms: Vec<String>,
}

/// Member map of one room; values carry display names we don't need.
#[derive(Debug, Deserialize)]
pub struct JoinedMembersResponse {
    #[serde(default)]
    pub joined: HashMap<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct SyncResponse {
    pub next_batch: String,
    #[serde(default)]
    pub rooms: SyncRooms,
}

#[derive(Debug, Default, Deserialize)]
pub struct SyncRooms {
    #[serde(default)]
    pub join: HashMap<String, JoinedRoomSync>,
    /// Rooms the bot has a pending invite to. Only the keys matter.
    #[serde(default)]
    pub invite: HashMap<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct JoinedRoomSync {
    #[serde(default)]
    pub timeline: Timeline,
}

#[derive(Debug, Default, Deserialize)]
pub struct Timeline {
    #[serde(default)]
    pub events: Vec<TimelineEvent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimelineEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub sender: String,
    pub event_id: String,
    #[serde(default)]
    pub state_key: Option<String>,
    #[serde(default)]
    pub content: EventContent,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventContent {
    #[serde(default)]
    pub msgtype: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub formatted_body: Option<String>,
    #[serde(default)]
    pub membership: Option<String>,
    #[serde(rename = "m.mentions", default)]
    pub mentions: Option<Mentions>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Mentions {
    #[serde(default)]
    pub user_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct MessagesResponse {
    #[serde(default)]
    pub chunk: Vec<TimelineEvent>,
}
