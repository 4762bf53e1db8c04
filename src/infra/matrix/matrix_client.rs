// Minimal Matrix client-server API v3 client. It deliberately exposes only
// the calls the core layer needs, plus login/sync/join for the event loop.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::json;

use super::matrix_models::{
    JoinedMembersResponse, JoinedRoomsResponse, LoginResponse, MessagesResponse, SyncResponse,
};
use crate::core::enforcement::{MatrixError, MatrixModeration, RoomMessage};

pub struct MatrixHttpClient {
    client: Client,
    homeserver: String,
    access_token: String,
    user_id: String,
}

impl MatrixHttpClient {
    /// Password login. Callers treat failure as fatal: the process must not
    /// reach event dispatch without a valid session.
    pub async fn login(
        homeserver: &str,
        username: &str,
        password: &str,
        device_name: &str,
    ) -> Result<Self, MatrixError> {
        let homeserver = homeserver.trim_end_matches('/').to_string();
        let client = Client::new();

        let payload = json!({
            "type": "m.login.password",
            "identifier": { "type": "m.id.user", "user": username },
            "password": password,
            "initial_device_display_name": device_name,
        });
        let resp = client
            .post(format!("{homeserver}/_matrix/client/v3/login"))
            .json(&payload)
            .send()
            .await
            .map_err(|e| MatrixError::Api(e.to_string()))?;
        let resp = Self::check(resp).await?;
        let login: LoginResponse = resp
            .json()
            .await
            .map_err(|e| MatrixError::Api(e.to_string()))?;

        tracing::info!(user_id = %login.user_id, "logged in to matrix");
        Ok(Self {
            client,
            homeserver,
            access_token: login.access_token,
            user_id: login.user_id,
        })
    }

    /// The bot's own Matrix ID; its events are never moderated.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Long-polls the sync endpoint. `since: None` performs the initial
    /// sync whose backlog the caller discards.
    pub async fn sync(&self, since: Option<&str>, timeout_ms: u64) -> Result<SyncResponse, MatrixError> {
        let mut req = self
            .client
            .get(self.url("/_matrix/client/v3/sync"))
            .query(&[("timeout", timeout_ms.to_string())]);
        if let Some(since) = since {
            req = req.query(&[("since", since)]);
        }
        self.fetch(req).await
    }

    pub async fn join_room(&self, room_id: &str) -> Result<(), MatrixError> {
        let req = self
            .client
            .post(self.url(&format!("/_matrix/client/v3/rooms/{room_id}/join")))
            .json(&json!({}));
        self.execute(req).await
    }

    /// Current members of one room; used once at startup to seed the
    /// moderator set from the trusted room.
    pub async fn joined_members(&self, room_id: &str) -> Result<Vec<String>, MatrixError> {
        let req = self
            .client
            .get(self.url(&format!("/_matrix/client/v3/rooms/{room_id}/joined_members")));
        let resp: JoinedMembersResponse = self.fetch(req).await?;
        Ok(resp.joined.into_keys().collect())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.homeserver)
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, MatrixError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(MatrixError::Api(format!("{status}: {body}")))
    }

    async fn fetch<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, MatrixError> {
        let resp = req
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| MatrixError::Api(e.to_string()))?;
        let resp = Self::check(resp).await?;
        resp.json()
            .await
            .map_err(|e| MatrixError::Api(e.to_string()))
    }

    async fn execute(&self, req: RequestBuilder) -> Result<(), MatrixError> {
        let resp = req
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| MatrixError::Api(e.to_string()))?;
        Self::check(resp).await?;
        Ok(())
    }
}

#[async_trait]
impl MatrixModeration for MatrixHttpClient {
    async fn joined_rooms(&self) -> Result<Vec<String>, MatrixError> {
        let req = self.client.get(self.url("/_matrix/client/v3/joined_rooms"));
        let resp: JoinedRoomsResponse = self.fetch(req).await?;
        Ok(resp.joined_rooms)
    }

    async fn ban_user(&self, room_id: &str, user_id: &str, reason: &str) -> Result<(), MatrixError> {
        let req = self
            .client
            .post(self.url(&format!("/_matrix/client/v3/rooms/{room_id}/ban")))
            .json(&json!({ "user_id": user_id, "reason": reason }));
        self.execute(req).await
    }

    async fn kick_user(&self, room_id: &str, user_id: &str, reason: &str) -> Result<(), MatrixError> {
        let req = self
            .client
            .post(self.url(&format!("/_matrix/client/v3/rooms/{room_id}/kick")))
            .json(&json!({ "user_id": user_id, "reason": reason }));
        self.execute(req).await
    }

    async fn redact_event(
        &self,
        room_id: &str,
        event_id: &str,
        txn_id: &str,
        reason: &str,
    ) -> Result<(), MatrixError> {
        let req = self
            .client
            .request(
                Method::PUT,
                self.url(&format!(
                    "/_matrix/client/v3/rooms/{room_id}/redact/{event_id}/{txn_id}"
                )),
            )
            .json(&json!({ "reason": reason }));
        self.execute(req).await
    }

    async fn recent_messages(
        &self,
        room_id: &str,
        limit: u32,
    ) -> Result<Vec<RoomMessage>, MatrixError> {
        let req = self
            .client
            .get(self.url(&format!("/_matrix/client/v3/rooms/{room_id}/messages")))
            .query(&[("dir", "b"), ("limit", &limit.to_string())]);
        let resp: MessagesResponse = self.fetch(req).await?;
        Ok(resp
            .chunk
            .into_iter()
            .map(|event| RoomMessage {
                event_id: event.event_id,
                sender: event.sender,
                kind: event.kind,
            })
            .collect())
    }
}
