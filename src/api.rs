//! Request/response endpoints of the rig server.
//!
//! [`RigApi`] is the seam the capture workflow and the console talk to.
//! [`HttpRigApi`] implements it with a shared `ureq` agent; each blocking
//! call runs on Tokio's blocking pool so the event loop keeps servicing
//! channels while a request is in flight.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

use crate::address::ServerAddress;
use crate::error::{ConsoleError, ConsoleResult};
use crate::model::{CaptureBatch, ClassificationResponse, ImageRef};

/// Endpoints consumed by the console.
#[async_trait]
pub trait RigApi: Send + Sync {
    /// `POST /cam/shot`: move through `setpoints`, shoot at each, return the images.
    async fn submit_capture(&self, setpoints: &[String]) -> ConsoleResult<CaptureBatch>;

    /// `GET /result/upload`: classify the last capture.
    async fn fetch_classification(&self) -> ConsoleResult<ClassificationResponse>;

    /// `GET /photo/{part}/{directory}`: full URLs of one item's reference images.
    async fn fetch_item_images(&self, part: &str, directory: &str) -> ConsoleResult<Vec<String>>;

    /// `GET /motor/spInit`: initial setpoint list.
    async fn initial_setpoints(&self) -> ConsoleResult<Vec<f64>>;

    /// `GET /motor/move/stop`
    async fn move_stop(&self) -> ConsoleResult<()>;

    /// `GET /motor/move/inc/{delta}`
    async fn move_increment(&self, delta: f64) -> ConsoleResult<()>;

    /// `GET /motor/move/abs/{target}`
    async fn move_absolute(&self, target: f64) -> ConsoleResult<()>;

    /// `POST /motor/move/sp`: visit every setpoint without shooting.
    async fn move_through_setpoints(&self, setpoints: &[String]) -> ConsoleResult<()>;

    /// `POST /correctLabel?correctLabel=...`: store the operator's label for the last run.
    async fn correct_label(&self, label: &str) -> ConsoleResult<bool>;
}

/// Join a listing path and the entries it returned.
#[must_use]
pub fn compose_image_urls(listing: &Url, refs: &[ImageRef]) -> Vec<String> {
    let base = listing.as_str().trim_end_matches('/');
    refs.iter()
        .map(|image| format!("{base}/{}", image.url.trim_start_matches('/')))
        .collect()
}

/// HTTP implementation of [`RigApi`].
#[derive(Clone)]
pub struct HttpRigApi {
    address: ServerAddress,
    agent: ureq::Agent,
}

impl HttpRigApi {
    /// Create a client for `address` with a per-request `timeout`.
    #[must_use]
    pub fn new(address: ServerAddress, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self { address, agent }
    }

    /// Server this client talks to.
    #[must_use]
    pub fn address(&self) -> &ServerAddress {
        &self.address
    }

    fn url(&self, path: &str) -> ConsoleResult<Url> {
        Ok(self.address.http_url(path)?)
    }

    /// `/photo/{part}/{directory}` with both segments percent-encoded.
    pub fn photo_listing_url(&self, part: &str, directory: &str) -> ConsoleResult<Url> {
        let mut url = self.url("/photo")?;
        url.path_segments_mut()
            .map_err(|()| ConsoleError::request("/photo", "address cannot carry a path"))?
            .push(part)
            .push(directory);
        Ok(url)
    }

    /// Run a blocking request on the blocking pool.
    async fn blocking<T, F>(&self, endpoint: String, call: F) -> ConsoleResult<T>
    where
        T: Send + 'static,
        F: FnOnce(ureq::Agent) -> ConsoleResult<T> + Send + 'static,
    {
        let agent = self.agent.clone();
        tokio::task::spawn_blocking(move || call(agent))
            .await
            .map_err(|e| ConsoleError::request(endpoint, e))?
    }

    async fn get_json<T>(&self, url: Url) -> ConsoleResult<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let endpoint = url.path().to_string();
        tracing::debug!(%url, "GET");
        self.blocking(endpoint.clone(), move |agent| {
            let response = agent
                .get(url.as_str())
                .set("Accept", "application/json")
                .call()
                .map_err(|e| ConsoleError::request(&endpoint, e))?;
            read_json(&endpoint, response)
        })
        .await
    }

    async fn get_ignore_body(&self, url: Url) -> ConsoleResult<()> {
        let endpoint = url.path().to_string();
        tracing::debug!(%url, "GET");
        self.blocking(endpoint.clone(), move |agent| {
            agent
                .get(url.as_str())
                .call()
                .map_err(|e| ConsoleError::request(&endpoint, e))?;
            Ok(())
        })
        .await
    }

    async fn post_json<B, T>(&self, url: Url, body: B) -> ConsoleResult<T>
    where
        B: serde::Serialize + Send + 'static,
        T: DeserializeOwned + Send + 'static,
    {
        let endpoint = url.path().to_string();
        tracing::debug!(%url, "POST");
        self.blocking(endpoint.clone(), move |agent| {
            let response = agent
                .post(url.as_str())
                .set("Accept", "application/json")
                .send_json(body)
                .map_err(|e| ConsoleError::request(&endpoint, e))?;
            read_json(&endpoint, response)
        })
        .await
    }
}

fn read_json<T: DeserializeOwned>(endpoint: &str, response: ureq::Response) -> ConsoleResult<T> {
    response
        .into_json()
        .map_err(|e| ConsoleError::request(endpoint, format!("invalid JSON body: {e}")))
}

#[async_trait]
impl RigApi for HttpRigApi {
    async fn submit_capture(&self, setpoints: &[String]) -> ConsoleResult<CaptureBatch> {
        self.post_json(self.url("/cam/shot")?, setpoints.to_vec()).await
    }

    async fn fetch_classification(&self) -> ConsoleResult<ClassificationResponse> {
        self.get_json(self.url("/result/upload")?).await
    }

    async fn fetch_item_images(&self, part: &str, directory: &str) -> ConsoleResult<Vec<String>> {
        let listing = self.photo_listing_url(part, directory)?;
        let refs: Vec<ImageRef> = self.get_json(listing.clone()).await?;
        Ok(compose_image_urls(&listing, &refs))
    }

    async fn initial_setpoints(&self) -> ConsoleResult<Vec<f64>> {
        self.get_json(self.url("/motor/spInit")?).await
    }

    async fn move_stop(&self) -> ConsoleResult<()> {
        self.get_ignore_body(self.url("/motor/move/stop")?).await
    }

    async fn move_increment(&self, delta: f64) -> ConsoleResult<()> {
        self.get_ignore_body(self.url(&format!("/motor/move/inc/{delta}"))?)
            .await
    }

    async fn move_absolute(&self, target: f64) -> ConsoleResult<()> {
        self.get_ignore_body(self.url(&format!("/motor/move/abs/{target}"))?)
            .await
    }

    async fn move_through_setpoints(&self, setpoints: &[String]) -> ConsoleResult<()> {
        let _: serde_json::Value = self
            .post_json(self.url("/motor/move/sp")?, setpoints.to_vec())
            .await?;
        Ok(())
    }

    async fn correct_label(&self, label: &str) -> ConsoleResult<bool> {
        let mut url = self.url("/correctLabel")?;
        url.query_pairs_mut().append_pair("correctLabel", label);
        let endpoint = url.path().to_string();
        tracing::debug!(%url, "POST");
        self.blocking(endpoint.clone(), move |agent| {
            let response = agent
                .post(url.as_str())
                .set("Accept", "application/json")
                .call()
                .map_err(|e| ConsoleError::request(&endpoint, e))?;
            let saved: serde_json::Value = read_json(&endpoint, response)?;
            Ok(saved.as_bool().unwrap_or(false))
        })
        .await
    }
}
