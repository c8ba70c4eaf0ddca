//! Capture-and-classify workflow.
//!
//! One run goes through these steps:
//!
//! 1. Submit the setpoint list to `/cam/shot` and wait for the capture batch.
//!    A failure here aborts the run with `CaptureFailed`; nothing is rendered.
//! 2. Show the raw batch in the gallery slides right away.
//! 3. Fetch the classification result set and the save location.
//! 4. Fetch every item's reference image listing concurrently. An item whose
//!    listing fails is logged and dropped; the others keep their order.
//! 5. Render the cards in one replacement and publish the save location.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Mutex;

use crate::api::RigApi;
use crate::error::{ConsoleError, ConsoleResult};
use crate::gallery::{GalleryPresenter, WidgetHost};
use crate::model::ResultCard;
use crate::setpoints::SetpointList;
use crate::shot::{ShotControl, ShotGuard, ShotPhase};

/// Status text when the operator submits an empty label.
pub const LABEL_REQUIRED: &str = "enter a label before saving";

/// Result of the classification half of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifyOutcome {
    /// Cards rendered, in result order
    pub cards: Vec<ResultCard>,
    /// Server-side archive location of this run
    pub save_place: String,
    /// Items dropped because their images could not be listed
    pub dropped: usize,
}

/// Result of a full run.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureOutcome {
    /// Slide pairs shown from the capture batch
    pub slides: usize,
    /// Classification half
    pub classification: ClassifyOutcome,
}

/// Sequences capture, classification and gallery updates.
#[derive(Clone)]
pub struct CaptureOrchestrator {
    api: Arc<dyn RigApi>,
}

impl CaptureOrchestrator {
    /// Create an orchestrator over `api`.
    pub fn new(api: Arc<dyn RigApi>) -> Self {
        Self { api }
    }

    /// Steps 1-2: shoot at every setpoint and show the raw batch.
    ///
    /// Returns the number of slide pairs shown.
    pub async fn capture<H>(
        &self,
        setpoints: &SetpointList,
        gallery: &Mutex<GalleryPresenter<H>>,
    ) -> ConsoleResult<usize>
    where
        H: WidgetHost + Send,
    {
        let body = setpoints.request_body();
        tracing::info!(setpoints = body.len(), "Submitting capture");

        let batch = self.api.submit_capture(&body).await.map_err(|e| {
            tracing::error!("Capture submission failed: {}", e);
            ConsoleError::CaptureFailed(e.to_string())
        })?;

        let shown = gallery.lock().await.render_batch(&batch);
        tracing::info!(slides = shown, "Capture batch received");
        Ok(shown)
    }

    /// Steps 3-5: classify the last capture and render the cards.
    pub async fn classify<H>(
        &self,
        gallery: &Mutex<GalleryPresenter<H>>,
    ) -> ConsoleResult<ClassifyOutcome>
    where
        H: WidgetHost + Send,
    {
        let response = self.api.fetch_classification().await?;
        tracing::info!(items = response.result.len(), "Classification received");

        let lookups = response.result.iter().enumerate().map(|(index, item)| {
            let api = Arc::clone(&self.api);
            async move {
                let images = api.fetch_item_images(&item.part, &item.directory).await;
                (index, item, images)
            }
        });
        let resolved = join_all(lookups).await;

        let mut cards = Vec::with_capacity(resolved.len());
        let mut dropped = 0;
        for (index, item, images) in resolved {
            match images {
                Ok(urls) => cards.push(ResultCard::from_item(item, urls)),
                Err(e) => {
                    tracing::warn!(
                        index,
                        part = %item.part,
                        directory = %item.directory,
                        "Dropping result item: {}",
                        e
                    );
                    dropped += 1;
                }
            }
        }

        {
            let mut gallery = gallery.lock().await;
            gallery.render(cards.clone());
            gallery.set_status(response.save_place.clone());
        }

        Ok(ClassifyOutcome {
            cards,
            save_place: response.save_place,
            dropped,
        })
    }

    /// The full workflow. Never mutates `setpoints`.
    pub async fn run_capture_and_classify<H>(
        &self,
        setpoints: &SetpointList,
        gallery: &Mutex<GalleryPresenter<H>>,
    ) -> ConsoleResult<CaptureOutcome>
    where
        H: WidgetHost + Send,
    {
        let slides = self.capture(setpoints, gallery).await?;
        let classification = self.classify(gallery).await?;
        Ok(CaptureOutcome {
            slides,
            classification,
        })
    }

    /// The full workflow behind the trigger control.
    ///
    /// Returns `Ok(None)` without doing anything if a shot is already
    /// running. The control is re-enabled however the run ends.
    pub async fn shoot_and_classify<H>(
        &self,
        control: &ShotControl,
        setpoints: &SetpointList,
        gallery: &Mutex<GalleryPresenter<H>>,
    ) -> ConsoleResult<Option<CaptureOutcome>>
    where
        H: WidgetHost + Send,
    {
        let Some(guard) = control.try_begin() else {
            tracing::debug!("Shot already in progress, trigger dropped");
            return Ok(None);
        };
        self.shoot_with(guard, setpoints, gallery).await.map(Some)
    }

    /// The full workflow under an already acquired shot guard.
    ///
    /// The guard is released when this returns, on success or error.
    pub async fn shoot_with<H>(
        &self,
        guard: ShotGuard,
        setpoints: &SetpointList,
        gallery: &Mutex<GalleryPresenter<H>>,
    ) -> ConsoleResult<CaptureOutcome>
    where
        H: WidgetHost + Send,
    {
        let slides = self.capture(setpoints, gallery).await?;
        guard.set_phase(ShotPhase::Classifying);
        let classification = self.classify(gallery).await?;
        drop(guard);

        Ok(CaptureOutcome {
            slides,
            classification,
        })
    }

    /// Steps 1-2 only, under an already acquired shot guard.
    ///
    /// Returns the number of slide pairs shown. The current cards stay
    /// mounted; the guard is released when this returns.
    pub async fn capture_with<H>(
        &self,
        guard: ShotGuard,
        setpoints: &SetpointList,
        gallery: &Mutex<GalleryPresenter<H>>,
    ) -> ConsoleResult<usize>
    where
        H: WidgetHost + Send,
    {
        let shown = self.capture(setpoints, gallery).await;
        drop(guard);
        shown
    }

    /// Store the operator's label for the last run.
    ///
    /// An empty label is rejected locally: the status line asks for one and
    /// `Ok(false)` is returned without contacting the server.
    pub async fn correct_label<H>(
        &self,
        label: &str,
        gallery: &Mutex<GalleryPresenter<H>>,
    ) -> ConsoleResult<bool>
    where
        H: WidgetHost + Send,
    {
        let label = label.trim();
        if label.is_empty() {
            gallery.lock().await.set_status(LABEL_REQUIRED);
            return Ok(false);
        }

        match self.api.correct_label(label).await {
            Ok(saved) => {
                let note = if saved { " label saved" } else { " label save failed" };
                gallery.lock().await.append_status(note);
                Ok(saved)
            }
            Err(e) => {
                gallery.lock().await.append_status(" label save failed");
                Err(e)
            }
        }
    }
}
