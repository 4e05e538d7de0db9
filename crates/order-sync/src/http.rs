/// REST remote
/// Talks to the admin API's container item endpoints
use async_trait::async_trait;
use ordering::{Item, ItemId, Sequence};
use reqwest::{Method, RequestBuilder, Url};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    Ack, ContainerId, InsertAck, RemoteError, RemoteStore, ReorderAck, Result, SyncConfig,
    SyncError,
};

pub struct HttpRemote {
    client: reqwest::Client,
    base_url: Url,
    api_token: Option<String>,
}

#[derive(Serialize)]
struct OrderBody<'a> {
    order: &'a [ItemId],
}

#[derive(Serialize)]
struct InsertBody<'a> {
    identity: ItemId,
    payload: &'a serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    at: Option<usize>,
}

impl HttpRemote {
    /// Requires `base_url`; the client enforces the configured timeout as well.
    pub fn new(config: &SyncConfig) -> Result<Self> {
        let raw = config
            .base_url
            .as_deref()
            .ok_or_else(|| SyncError::Config("HTTP remote requires base_url".to_string()))?;
        let base_url = Url::parse(raw)
            .map_err(|e| SyncError::Config(format!("invalid base_url {}: {}", raw, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(SyncError::Config(format!("base_url {} cannot take a path", raw)));
        }

        let client = reqwest::Client::builder()
            .timeout(config.remote_timeout())
            .build()
            .map_err(|e| SyncError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            api_token: config.api_token.clone(),
        })
    }

    /// `{base}/containers/{container}/{tail..}`, each segment percent-encoded.
    fn endpoint(&self, container: &ContainerId, tail: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push("containers")
                .push(container.as_str())
                .extend(tail);
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// 4xx is a rejection carrying the body; transport failures and 5xx are unreachable.
    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> std::result::Result<T, RemoteError> {
        let response = builder
            .send()
            .await
            .map_err(|e| RemoteError::Unreachable(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Rejected(format!("{} - {}", status, body)));
        }
        if !status.is_success() {
            return Err(RemoteError::Unreachable(format!("server error {}", status)));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| RemoteError::Unreachable(format!("malformed response: {}", e)))
    }
}

#[async_trait]
impl RemoteStore for HttpRemote {
    async fn fetch_sequence(&self, container: &ContainerId) -> std::result::Result<Sequence, RemoteError> {
        let url = self.endpoint(container, &["items"]);
        let items: Vec<Item> = self.send(self.request(Method::GET, url)).await?;
        Sequence::from_items(items)
            .map_err(|e| RemoteError::Rejected(format!("server sent an invalid sequence: {}", e)))
    }

    async fn persist_reorder(
        &self,
        container: &ContainerId,
        order: &[ItemId],
    ) -> std::result::Result<ReorderAck, RemoteError> {
        let url = self.endpoint(container, &["order"]);
        self.send(self.request(Method::PUT, url).json(&OrderBody { order }))
            .await
    }

    async fn persist_insert(
        &self,
        container: &ContainerId,
        item: &Item,
        at: Option<usize>,
    ) -> std::result::Result<InsertAck, RemoteError> {
        let url = self.endpoint(container, &["items"]);
        let body = InsertBody {
            identity: item.id,
            payload: &item.payload,
            at,
        };
        self.send(self.request(Method::POST, url).json(&body)).await
    }

    async fn persist_remove(
        &self,
        container: &ContainerId,
        id: ItemId,
    ) -> std::result::Result<Ack, RemoteError> {
        let url = self.endpoint(container, &["items", &id.to_string()]);
        self.send(self.request(Method::DELETE, url)).await
    }

    async fn persist_correspondence(
        &self,
        container: &ContainerId,
        order: &[ItemId],
    ) -> std::result::Result<Ack, RemoteError> {
        let url = self.endpoint(container, &["correct-order"]);
        self.send(self.request(Method::PUT, url).json(&OrderBody { order }))
            .await
    }
}
