//! The operator console.
//!
//! [`Console`] is the single owner of the live console state: the channel
//! registry, the telemetry monitor, the setpoint list, the camera feeds and
//! the shot control. It runs one event loop over four sources:
//!
//! - channel events from the registry (telemetry and camera frames, state changes)
//! - operator commands
//! - the pending capture trigger, fired once its settle delay has passed
//! - reports from background requests (shots, classification, labels)
//!
//! Requests to the rig server run as spawned tasks and report back through a
//! queue, so channel frames keep flowing while a capture is in flight.
//! Operator-facing lines are handed to the caller of [`Console::run`]. The
//! gallery is shared with those tasks behind a `tokio::sync::Mutex`; each
//! render holds the lock for the whole teardown-and-mount.

pub mod camera;
pub mod command;

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{sleep_until, Instant};

pub use camera::CameraFeed;
pub use command::{OperatorCommand, USAGE};

use crate::address::{AddressSource, ServerAddress};
use crate::api::{HttpRigApi, RigApi};
use crate::channel::{
    ChannelEvent, ChannelId, ChannelRegistry, Delivery, StreamConnector, WsConnector,
};
use crate::config::ConsoleConfig;
use crate::error::{ConsoleError, ConsoleResult};
use crate::gallery::{GalleryPresenter, WidgetHost};
use crate::orchestrator::{CaptureOrchestrator, CaptureOutcome, ClassifyOutcome};
use crate::setpoints::SetpointList;
use crate::shot::{ShotControl, ShotPhase};
use crate::telemetry::TelemetryMonitor;

/// Builds the request client for a server address.
pub type ApiFactory = Arc<dyn Fn(&ServerAddress) -> Arc<dyn RigApi> + Send + Sync>;

/// Capacity of the background report queue.
const REPORT_QUEUE_CAPACITY: usize = 32;

/// Result of handling one operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Keep running; print the text if there is any
    Continue(Option<String>),
    /// Leave the event loop
    Quit,
}

impl Reply {
    fn text(text: impl Into<String>) -> Self {
        Self::Continue(Some(text.into()))
    }

    fn silent() -> Self {
        Self::Continue(None)
    }
}

/// What started a shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShotSource {
    /// Physical shot button on the rig
    Button,
    /// `shoot` command
    Operator,
}

/// Completion of a background request.
#[derive(Debug)]
pub enum Report {
    /// Capture-and-classify finished
    Shot(ConsoleResult<CaptureOutcome>),
    /// Capture-only run finished with this many slide pairs
    Captured(ConsoleResult<usize>),
    /// Classification-only run finished
    Classified(ConsoleResult<ClassifyOutcome>),
    /// Label correction finished
    Label(ConsoleResult<bool>),
    /// Fire-and-forget motor request failed
    Motor {
        /// Command that issued the request
        command: String,
        /// Failure
        error: ConsoleError,
    },
}

/// The console's event loop and the state it owns.
pub struct Console<H: WidgetHost + Send + 'static> {
    config: ConsoleConfig,
    address: ServerAddress,
    registry: ChannelRegistry,
    events_rx: mpsc::Receiver<ChannelEvent>,
    monitor: TelemetryMonitor,
    setpoints: SetpointList,
    cameras: BTreeMap<u8, CameraFeed>,
    api_factory: ApiFactory,
    api: Arc<dyn RigApi>,
    orchestrator: CaptureOrchestrator,
    gallery: Arc<Mutex<GalleryPresenter<H>>>,
    shot: ShotControl,
    pending_shot: Option<Instant>,
    reports_tx: mpsc::Sender<Report>,
    reports_rx: mpsc::Receiver<Report>,
}

impl<H: WidgetHost + Send + 'static> Console<H> {
    /// Console against the real rig: WebSocket channels and HTTP requests.
    pub fn connect_http(config: ConsoleConfig, address: ServerAddress, host: H) -> Self {
        let timeout = config.request_timeout();
        let factory: ApiFactory = Arc::new(move |address: &ServerAddress| {
            Arc::new(HttpRigApi::new(address.clone(), timeout)) as Arc<dyn RigApi>
        });
        Self::new(config, address, Arc::new(WsConnector), factory, host)
    }

    /// Console with explicit transport seams.
    ///
    /// No channel is opened until [`Console::connect_all`].
    pub fn new(
        config: ConsoleConfig,
        address: ServerAddress,
        connector: Arc<dyn StreamConnector>,
        api_factory: ApiFactory,
        host: H,
    ) -> Self {
        let (registry, events_rx) = ChannelRegistry::new(connector, config.channel_config());
        let (reports_tx, reports_rx) = mpsc::channel(REPORT_QUEUE_CAPACITY);
        let api = api_factory(&address);
        let monitor = TelemetryMonitor::new(config.monitor_config());

        Self {
            config,
            address,
            registry,
            events_rx,
            monitor,
            setpoints: SetpointList::new(),
            cameras: BTreeMap::new(),
            orchestrator: CaptureOrchestrator::new(Arc::clone(&api)),
            api_factory,
            api,
            gallery: Arc::new(Mutex::new(GalleryPresenter::new(host))),
            shot: ShotControl::new(),
            pending_shot: None,
            reports_tx,
            reports_rx,
        }
    }

    /// Shared gallery.
    #[must_use]
    pub fn gallery(&self) -> Arc<Mutex<GalleryPresenter<H>>> {
        Arc::clone(&self.gallery)
    }

    /// Shot control.
    #[must_use]
    pub fn shot_control(&self) -> ShotControl {
        self.shot.clone()
    }

    /// Current setpoints.
    #[must_use]
    pub fn setpoints(&self) -> &SetpointList {
        &self.setpoints
    }

    /// Telemetry monitor.
    #[must_use]
    pub fn monitor(&self) -> &TelemetryMonitor {
        &self.monitor
    }

    /// Server in use.
    #[must_use]
    pub fn address(&self) -> &ServerAddress {
        &self.address
    }

    /// Channel registry.
    #[must_use]
    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    /// Feed of camera `index`, once it has delivered a frame.
    #[must_use]
    pub fn camera(&self, index: u8) -> Option<&CameraFeed> {
        self.cameras.get(&index)
    }

    /// Seed the setpoint list from the server.
    ///
    /// A failing seed leaves the list empty.
    pub async fn seed_setpoints(&mut self) {
        match self.api.initial_setpoints().await {
            Ok(values) => {
                tracing::info!(count = values.len(), "Setpoints seeded");
                self.setpoints = SetpointList::from_seed(values);
            }
            Err(e) => {
                tracing::warn!("Setpoint seed failed, starting empty: {}", e);
                self.setpoints = SetpointList::new();
            }
        }
    }

    /// Open every channel at the current address.
    pub fn connect_all(&mut self) -> ConsoleResult<()> {
        self.registry.replace_all(&self.address)
    }

    /// Switch the whole console to a new server.
    ///
    /// The channel set is replaced atomically; nothing from the old channels
    /// is delivered afterwards.
    pub fn reconnect(&mut self, input: &str) -> ConsoleResult<()> {
        let policy = self.config.server.scheme_policy;
        let address = ServerAddress::parse(input, AddressSource::UserInput, policy)?;
        self.registry.replace_all(&address)?;

        self.api = (self.api_factory)(&address);
        self.orchestrator = CaptureOrchestrator::new(Arc::clone(&self.api));
        tracing::info!(address = %address, "Switched server");
        self.address = address;
        Ok(())
    }

    /// Run until `quit` or until the command queue closes.
    ///
    /// Every line meant for the operator (command replies, finished
    /// requests, exhausted channels) is passed to `emit`.
    pub async fn run<F>(mut self, mut commands: mpsc::Receiver<OperatorCommand>, mut emit: F)
    where
        F: FnMut(String) + Send,
    {
        tracing::info!(address = %self.address, "Console started");

        loop {
            let deadline = self.pending_shot.unwrap_or_else(Instant::now);
            tokio::select! {
                biased;

                Some(event) = self.events_rx.recv() => {
                    if let Some(line) = self
                        .registry
                        .accept(event)
                        .and_then(|delivery| self.handle_delivery(delivery))
                    {
                        emit(line);
                    }
                }

                () = sleep_until(deadline), if self.pending_shot.is_some() => {
                    self.pending_shot = None;
                    self.start_shot(ShotSource::Button);
                }

                Some(report) = self.reports_rx.recv() => {
                    if let Some(line) = self.handle_report(report) {
                        emit(line);
                    }
                }

                command = commands.recv() => {
                    let Some(command) = command else {
                        tracing::info!("Command input closed");
                        break;
                    };
                    match self.handle_command(command).await {
                        Reply::Continue(Some(text)) => emit(text),
                        Reply::Continue(None) => {}
                        Reply::Quit => break,
                    }
                }
            }
        }

        self.registry.close_all();
        tracing::info!("Console stopped");
    }

    /// Route one accepted channel event.
    ///
    /// Returns a line for the operator when a channel gives up.
    pub fn handle_delivery(&mut self, delivery: Delivery) -> Option<String> {
        match delivery {
            Delivery::Frame {
                channel: ChannelId::Telemetry,
                payload,
            } => match self.monitor.ingest(&payload, Instant::now()) {
                Ok(Some(request)) => {
                    if self.pending_shot.is_none() {
                        let settle =
                            request.fire_at.saturating_duration_since(request.requested_at);
                        tracing::debug!(
                            settle_ms = settle.as_millis() as u64,
                            "Capture scheduled"
                        );
                        self.pending_shot = Some(request.fire_at);
                    }
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(channel = "motor", "Dropping telemetry frame: {}", e),
            },
            Delivery::Frame {
                channel: ChannelId::Camera(index),
                payload,
            } => {
                let feed = self.cameras.entry(index).or_default();
                if let Err(e) = feed.push(&payload) {
                    tracing::warn!(camera = index, "Dropping camera frame: {}", e);
                }
            }
            Delivery::StateChanged { channel, state } => {
                tracing::info!(%channel, state = %state.label(), "Channel state changed");
            }
            Delivery::Exhausted { channel, error } => {
                tracing::error!(%channel, "{}", error);
                return Some(format!("{error}; enter `connect <address>` to retry"));
            }
        }
        None
    }

    /// Whether a button-triggered capture is waiting for its settle delay.
    #[must_use]
    pub fn has_pending_shot(&self) -> bool {
        self.pending_shot.is_some()
    }

    /// Start capture-and-classify in the background.
    ///
    /// Returns `false` if a shot is already running; the trigger is dropped.
    pub fn start_shot(&mut self, source: ShotSource) -> bool {
        let Some(guard) = self.shot.try_begin() else {
            tracing::debug!(?source, "Shot already in progress, trigger dropped");
            return false;
        };

        tracing::info!(?source, setpoints = self.setpoints.len(), "Starting shot");
        let orchestrator = self.orchestrator.clone();
        let setpoints = self.setpoints.clone();
        let gallery = Arc::clone(&self.gallery);
        let reports = self.reports_tx.clone();
        tokio::spawn(async move {
            let result = orchestrator.shoot_with(guard, &setpoints, &gallery).await;
            let _ = reports.send(Report::Shot(result)).await;
        });
        true
    }

    fn start_capture(&mut self) -> bool {
        let Some(guard) = self.shot.try_begin() else {
            return false;
        };

        tracing::info!(setpoints = self.setpoints.len(), "Starting capture");
        let orchestrator = self.orchestrator.clone();
        let setpoints = self.setpoints.clone();
        let gallery = Arc::clone(&self.gallery);
        let reports = self.reports_tx.clone();
        tokio::spawn(async move {
            let result = orchestrator.capture_with(guard, &setpoints, &gallery).await;
            let _ = reports.send(Report::Captured(result)).await;
        });
        true
    }

    fn start_classify(&mut self) -> bool {
        let Some(guard) = self.shot.try_begin() else {
            return false;
        };
        guard.set_phase(ShotPhase::Classifying);

        let orchestrator = self.orchestrator.clone();
        let gallery = Arc::clone(&self.gallery);
        let reports = self.reports_tx.clone();
        tokio::spawn(async move {
            let result = orchestrator.classify(&gallery).await;
            drop(guard);
            let _ = reports.send(Report::Classified(result)).await;
        });
        true
    }

    fn start_label(&self, label: String) {
        let orchestrator = self.orchestrator.clone();
        let gallery = Arc::clone(&self.gallery);
        let reports = self.reports_tx.clone();
        tokio::spawn(async move {
            let result = orchestrator.correct_label(&label, &gallery).await;
            let _ = reports.send(Report::Label(result)).await;
        });
    }

    fn spawn_motor<F>(&self, command: OperatorCommand, request: F)
    where
        F: FnOnce(Arc<dyn RigApi>) -> BoxFuture<'static, ConsoleResult<()>>
            + Send
            + 'static,
    {
        let api = Arc::clone(&self.api);
        let reports = self.reports_tx.clone();
        tokio::spawn(async move {
            if let Err(error) = request(api).await {
                let _ = reports
                    .send(Report::Motor {
                        command: command.to_string(),
                        error,
                    })
                    .await;
            }
        });
    }

    /// Turn a background report into an operator-facing line.
    pub fn handle_report(&mut self, report: Report) -> Option<String> {
        match report {
            Report::Shot(Ok(outcome)) => Some(format!(
                "shot: {} slide pairs, {} cards ({} dropped), saved to {}",
                outcome.slides,
                outcome.classification.cards.len(),
                outcome.classification.dropped,
                outcome.classification.save_place
            )),
            Report::Shot(Err(e)) => {
                tracing::error!("Shot failed: {}", e);
                Some(format!("shot failed: {e}"))
            }
            Report::Captured(Ok(slides)) => Some(format!("capture: {slides} slide pairs")),
            Report::Captured(Err(e)) => {
                tracing::error!("Capture failed: {}", e);
                Some(format!("capture failed: {e}"))
            }
            Report::Classified(Ok(outcome)) => Some(format!(
                "classified: {} cards ({} dropped), saved to {}",
                outcome.cards.len(),
                outcome.dropped,
                outcome.save_place
            )),
            Report::Classified(Err(e)) => {
                tracing::error!("Classification failed: {}", e);
                Some(format!("classification failed: {e}"))
            }
            Report::Label(Ok(true)) => Some("label saved".to_string()),
            Report::Label(Ok(false)) => Some("label not saved".to_string()),
            Report::Label(Err(e)) => {
                tracing::warn!("Label correction failed: {}", e);
                Some(format!("label save failed: {e}"))
            }
            Report::Motor { command, error } => {
                tracing::warn!(%command, "Motor request failed: {}", error);
                Some(format!("{command} failed: {error}"))
            }
        }
    }

    /// Apply one operator command.
    pub async fn handle_command(&mut self, command: OperatorCommand) -> Reply {
        match self.apply(command).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::debug!("Command rejected: {}", e);
                Reply::text(e.to_string())
            }
        }
    }

    async fn apply(&mut self, command: OperatorCommand) -> ConsoleResult<Reply> {
        let reply = match command {
            OperatorCommand::AddSetpoint(value) => {
                self.setpoints.append(value);
                Reply::text(self.format_setpoints())
            }
            OperatorCommand::RemoveSetpoint(index) => {
                self.setpoints.remove_at(index)?;
                Reply::text(self.format_setpoints())
            }
            OperatorCommand::SetSetpoint(index, value) => {
                self.setpoints.set_value_at(index, value)?;
                Reply::text(self.format_setpoints())
            }
            OperatorCommand::RecordPosition(index) => {
                let position = self
                    .setpoints
                    .record_position(index, self.monitor.last_position())?;
                Reply::text(format!("setpoint {index} = {position}"))
            }
            OperatorCommand::ListSetpoints => Reply::text(self.format_setpoints()),
            OperatorCommand::Stop => {
                self.spawn_motor(command, |api| async move { api.move_stop().await }.boxed());
                Reply::silent()
            }
            OperatorCommand::Increment(delta) => {
                self.spawn_motor(command, move |api| {
                    async move { api.move_increment(delta).await }.boxed()
                });
                Reply::silent()
            }
            OperatorCommand::Absolute(target) => {
                self.spawn_motor(command, move |api| {
                    async move { api.move_absolute(target).await }.boxed()
                });
                Reply::silent()
            }
            OperatorCommand::MoveThroughSetpoints => {
                let body = self.setpoints.request_body();
                self.spawn_motor(command, move |api| {
                    async move { api.move_through_setpoints(&body).await }.boxed()
                });
                Reply::silent()
            }
            OperatorCommand::Shoot => {
                if self.start_shot(ShotSource::Operator) {
                    Reply::text(ShotPhase::Capturing.label())
                } else {
                    Reply::text(format!("busy: {}", self.shot.status().phase))
                }
            }
            OperatorCommand::Capture => {
                if self.start_capture() {
                    Reply::text(ShotPhase::Capturing.label())
                } else {
                    Reply::text(format!("busy: {}", self.shot.status().phase))
                }
            }
            OperatorCommand::Classify => {
                if self.start_classify() {
                    Reply::text(ShotPhase::Classifying.label())
                } else {
                    Reply::text(format!("busy: {}", self.shot.status().phase))
                }
            }
            OperatorCommand::Label(text) => {
                self.start_label(text);
                Reply::silent()
            }
            OperatorCommand::Connect(input) => {
                self.reconnect(&input)?;
                Reply::text(format!("connecting to {}", self.address))
            }
            OperatorCommand::Status => {
                let gallery = Arc::clone(&self.gallery);
                let gallery = gallery.lock().await;
                Reply::text(self.status_report(&gallery))
            }
            OperatorCommand::Quit => Reply::Quit,
        };
        Ok(reply)
    }

    fn format_setpoints(&self) -> String {
        if self.setpoints.is_empty() {
            return "setpoints: (none)".to_string();
        }
        let entries: Vec<String> = self
            .setpoints
            .snapshot()
            .iter()
            .enumerate()
            .map(|(index, value)| format!("[{index}] {value}"))
            .collect();
        format!("setpoints: {}", entries.join(" "))
    }

    fn status_report(&self, gallery: &GalleryPresenter<H>) -> String {
        let mut lines = vec![format!(
            "server: {} ({})",
            self.address,
            self.address.source().label()
        )];
        for (channel, state) in self.registry.channels() {
            lines.push(format!("  {channel}: {}", state.label()));
        }

        let position = self
            .monitor
            .last_position()
            .map_or_else(|| "-".to_string(), |p| p.to_string());
        let velocity = self
            .monitor
            .last_velocity()
            .map_or_else(|| "-".to_string(), |v| v.to_string());
        lines.push(format!("motor: pos={position} vel={velocity}"));

        for index in [1u8, 2] {
            let frames = self.cameras.get(&index).map_or(0, CameraFeed::frames_received);
            lines.push(format!("  cam{index}: {frames} frames"));
        }

        lines.push(self.format_setpoints());
        lines.push(format!("shot: {}", self.shot.status().phase));

        lines.push(format!(
            "gallery: {} slide pairs, {} cards, status '{}'",
            gallery.slides().len(),
            gallery.cards().len(),
            gallery.status()
        ));
        lines.join("\n")
    }
}
