//! `SpinClient`: one handle over the spin backend.
//!
//! Owns the two sessions (primary story and comparison), the shared busy
//! counter and the stream driver. Streaming calls fold into a session;
//! the non-streaming siblings return their result directly.

use std::sync::Arc;

use crate::busy::BusyCounter;
use crate::config::Config;
use crate::driver::{StreamDriver, StreamSettings, StreamSummary};
use crate::error::CoreResult;
use crate::http_client::HttpClient;
use crate::model::{BinaryPayload, CompareScenariosRequest, Gender, GeneratedTextSources, SpinArguments};
use crate::normalizer::{normalize_compare, normalize_spin};
use crate::session::Session;
use crate::transport::SseTransport;

pub const STORY_STREAM_PATH: &str = "/api/spin/story/stream";
pub const COMPARE_STREAM_PATH: &str = "/api/spin/compare-scenarios/stream";
pub const STORY_PATH: &str = "/api/spin/story";
pub const COMPARE_PATH: &str = "/api/spin/compare-scenarios";
pub const IMAGE_PATH: &str = "/api/spin/image";
pub const PLACES_PATH: &str = "/api/parameterization/places";
pub const TIMES_PATH: &str = "/api/parameterization/times";
pub const GENDERS_PATH: &str = "/api/parameterization/genders";

#[derive(Debug, Clone)]
pub struct SpinClient {
    root_url: String,
    http: HttpClient,
    driver: StreamDriver,
    busy: BusyCounter,
    story: Session,
    comparison: Session,
}

impl SpinClient {
    /// Streams go over the same HTTP client as the JSON endpoints.
    pub fn from_config(cfg: &Config) -> CoreResult<Self> {
        let http = HttpClient::new(&cfg.http)?;
        let transport: Arc<dyn SseTransport> = Arc::new(http.clone());
        Self::with_transport(cfg, http, transport)
    }

    /// Use `transport` for the streaming endpoints (e.g. a recorded transcript).
    pub fn with_transport(
        cfg: &Config,
        http: HttpClient,
        transport: Arc<dyn SseTransport>,
    ) -> CoreResult<Self> {
        let busy = BusyCounter::new();
        let driver = StreamDriver::new(transport, busy.clone(), StreamSettings::from(&cfg.stream));
        Ok(Self {
            root_url: cfg.api.root_url.trim_end_matches('/').to_string(),
            http,
            driver,
            busy,
            story: Session::new("story"),
            comparison: Session::new("comparison"),
        })
    }

    pub fn story_session(&self) -> &Session {
        &self.story
    }

    pub fn comparison_session(&self) -> &Session {
        &self.comparison
    }

    pub fn busy(&self) -> &BusyCounter {
        &self.busy
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.root_url, path)
    }

    /// Stream a story into the story session. Invalid arguments fail before
    /// the session is touched.
    pub async fn stream_story(&self, args: SpinArguments) -> CoreResult<StreamSummary> {
        let args = normalize_spin(args)?;
        self.driver
            .run(&self.url(STORY_STREAM_PATH), &args, &self.story)
            .await
    }

    /// Stream a comparison into the comparison session; the story session is left alone.
    pub async fn stream_compare_scenarios(
        &self,
        req: CompareScenariosRequest,
    ) -> CoreResult<StreamSummary> {
        let req = normalize_compare(req)?;
        self.driver
            .run(&self.url(COMPARE_STREAM_PATH), &req, &self.comparison)
            .await
    }

    pub async fn generate_story(&self, args: SpinArguments) -> CoreResult<GeneratedTextSources> {
        let args = normalize_spin(args)?;
        let _busy = self.busy.enter();
        self.http.post_json(&self.url(STORY_PATH), &args).await
    }

    pub async fn compare_scenarios(
        &self,
        req: CompareScenariosRequest,
    ) -> CoreResult<GeneratedTextSources> {
        let req = normalize_compare(req)?;
        let _busy = self.busy.enter();
        self.http.post_json(&self.url(COMPARE_PATH), &req).await
    }

    pub async fn generate_image(&self, args: SpinArguments) -> CoreResult<BinaryPayload> {
        let args = normalize_spin(args)?;
        let _busy = self.busy.enter();
        self.http.post_for_bytes(&self.url(IMAGE_PATH), &args).await
    }

    pub async fn places(&self) -> CoreResult<Vec<String>> {
        let _busy = self.busy.enter();
        self.http.get_json(&self.url(PLACES_PATH)).await
    }

    pub async fn times(&self) -> CoreResult<Vec<i32>> {
        let _busy = self.busy.enter();
        self.http.get_json(&self.url(TIMES_PATH)).await
    }

    /// Blank descriptions from the backend are filled from the id.
    pub async fn genders(&self) -> CoreResult<Vec<Gender>> {
        let _busy = self.busy.enter();
        let mut genders: Vec<Gender> = self.http.get_json(&self.url(GENDERS_PATH)).await?;
        for g in &mut genders {
            if g.description.trim().is_empty() {
                g.description = g.id.description().to_string();
            }
        }
        Ok(genders)
    }
}
