//! Shared fakes for integration tests: a scripted stream connector and an
//! in-memory rig server.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use rig_console::api::RigApi;
use rig_console::channel::{FrameStream, StreamConnector};
use rig_console::model::{CaptureBatch, ClassificationItem, ClassificationResponse};
use rig_console::{ConsoleError, ConsoleResult};
use url::Url;

/// Outcome of one dial.
#[derive(Debug, Clone)]
pub enum Dial {
    /// Connection refused
    Refuse,
    /// Open, deliver `frames`, then end the stream
    Deliver(Vec<String>),
    /// Open, deliver `frames`, then stay open
    DeliverAndHold(Vec<String>),
}

/// What a dial with no script left does.
#[derive(Debug, Clone, Copy)]
pub enum Fallback {
    /// Refuse every dial
    Refuse,
    /// Open a silent stream that never ends
    Hold,
    /// Open, send the dialed URL as one frame, then hold
    Echo,
}

/// Stream connector driven by per-path scripts.
pub struct FakeConnector {
    fallback: Fallback,
    scripts: Mutex<HashMap<String, VecDeque<Dial>>>,
    dials: Mutex<HashMap<String, u32>>,
}

impl FakeConnector {
    pub fn new(fallback: Fallback) -> Self {
        Self {
            fallback,
            scripts: Mutex::new(HashMap::new()),
            dials: Mutex::new(HashMap::new()),
        }
    }

    /// Queue dial outcomes for URLs ending in `path`.
    pub fn script(self, path: &str, dials: Vec<Dial>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(path.to_string(), dials.into());
        self
    }

    /// Dials made to `path` so far.
    pub fn dials(&self, path: &str) -> u32 {
        self.dials.lock().unwrap().get(path).copied().unwrap_or(0)
    }
}

fn frames_stream(frames: Vec<String>, hold: bool) -> FrameStream {
    let frames = stream::iter(frames.into_iter().map(Ok));
    if hold {
        frames.chain(stream::pending()).boxed()
    } else {
        frames.boxed()
    }
}

#[async_trait]
impl StreamConnector for FakeConnector {
    async fn connect(&self, url: &Url) -> ConsoleResult<FrameStream> {
        let path = url.path().to_string();
        *self.dials.lock().unwrap().entry(path.clone()).or_default() += 1;

        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&path)
            .and_then(VecDeque::pop_front);

        let dial = match scripted {
            Some(dial) => dial,
            None => match self.fallback {
                Fallback::Refuse => Dial::Refuse,
                Fallback::Hold => Dial::DeliverAndHold(vec![]),
                Fallback::Echo => Dial::DeliverAndHold(vec![url.to_string()]),
            },
        };

        match dial {
            Dial::Refuse => Err(ConsoleError::Transport(format!("{url}: connection refused"))),
            Dial::Deliver(frames) => Ok(frames_stream(frames, false)),
            Dial::DeliverAndHold(frames) => Ok(frames_stream(frames, true)),
        }
    }
}

/// Telemetry frame JSON.
pub fn telemetry(position: f64, button: u8) -> String {
    format!(r#"{{"pos": {position}, "vel": 0, "btnShot": {button}}}"#)
}

/// Result item whose family is `family` and directory its lowercase form.
pub fn item(family: &str, probability: f64) -> ClassificationItem {
    ClassificationItem {
        part: "torque_converter".into(),
        family: family.into(),
        probability,
        make: "Aisin".into(),
        directory: family.to_lowercase(),
    }
}

/// In-memory rig server.
pub struct FakeApi {
    /// `None` makes capture submission fail
    pub batch: Option<CaptureBatch>,
    pub classification: ClassificationResponse,
    /// Directories whose image listing fails
    pub failing_directories: HashSet<String>,
    /// Per-directory listing latency
    pub listing_delays: HashMap<String, Duration>,
    pub capture_delay: Duration,
    pub classify_delay: Duration,
    /// `None` makes the seed request fail
    pub seed: Option<Vec<f64>>,
    pub label_saved: bool,
    /// Makes the classification request fail
    pub classify_fails: bool,
    /// Every call made, in order
    pub calls: Mutex<Vec<String>>,
    /// Bodies posted to the capture endpoint
    pub submitted: Mutex<Vec<Vec<String>>>,
}

impl Default for FakeApi {
    fn default() -> Self {
        Self {
            batch: Some(CaptureBatch {
                cam1: vec!["AA".into(), "BB".into()],
                cam2: vec!["CC".into(), "DD".into()],
            }),
            classification: ClassificationResponse {
                result: vec![item("TC-200", 0.15), item("TC-300", 0.09)],
                save_place: "20250101_120000".into(),
            },
            failing_directories: HashSet::new(),
            listing_delays: HashMap::new(),
            capture_delay: Duration::ZERO,
            classify_delay: Duration::ZERO,
            seed: Some(vec![0.0, 1000.0]),
            label_saved: true,
            classify_fails: false,
            calls: Mutex::new(Vec::new()),
            submitted: Mutex::new(Vec::new()),
        }
    }
}

impl FakeApi {
    /// Every call made, in order, e.g. `"shot"`, `"photo tc-200"`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls whose name starts with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    /// Bodies posted to the capture endpoint.
    pub fn submitted(&self) -> Vec<Vec<String>> {
        self.submitted.lock().unwrap().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

#[async_trait]
impl RigApi for FakeApi {
    async fn submit_capture(&self, setpoints: &[String]) -> ConsoleResult<CaptureBatch> {
        self.record("shot");
        self.submitted.lock().unwrap().push(setpoints.to_vec());
        pause(self.capture_delay).await;
        self.batch
            .clone()
            .ok_or_else(|| ConsoleError::request("/cam/shot", "500 Internal Server Error"))
    }

    async fn fetch_classification(&self) -> ConsoleResult<ClassificationResponse> {
        self.record("classify");
        pause(self.classify_delay).await;
        if self.classify_fails {
            return Err(ConsoleError::request("/result/upload", "502 Bad Gateway"));
        }
        Ok(self.classification.clone())
    }

    async fn fetch_item_images(&self, part: &str, directory: &str) -> ConsoleResult<Vec<String>> {
        self.record(format!("photo {directory}"));
        pause(self.listing_delays.get(directory).copied().unwrap_or_default()).await;
        if self.failing_directories.contains(directory) {
            return Err(ConsoleError::request(
                format!("/photo/{part}/{directory}"),
                "404 Not Found",
            ));
        }
        Ok(vec![format!("http://rig.test/photo/{part}/{directory}/1.webp")])
    }

    async fn initial_setpoints(&self) -> ConsoleResult<Vec<f64>> {
        self.record("seed");
        self.seed
            .clone()
            .ok_or_else(|| ConsoleError::request("/motor/spInit", "connection refused"))
    }

    async fn move_stop(&self) -> ConsoleResult<()> {
        self.record("stop");
        Ok(())
    }

    async fn move_increment(&self, delta: f64) -> ConsoleResult<()> {
        self.record(format!("inc {delta}"));
        Ok(())
    }

    async fn move_absolute(&self, target: f64) -> ConsoleResult<()> {
        self.record(format!("abs {target}"));
        Ok(())
    }

    async fn move_through_setpoints(&self, setpoints: &[String]) -> ConsoleResult<()> {
        self.record(format!("sp {}", setpoints.join(",")));
        Ok(())
    }

    async fn correct_label(&self, label: &str) -> ConsoleResult<bool> {
        self.record(format!("label {label}"));
        Ok(self.label_saved)
    }
}
