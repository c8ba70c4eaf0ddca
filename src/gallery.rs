//! Result gallery.
//!
//! [`GalleryPresenter`] owns everything currently shown to the operator: the
//! raw capture slides, the mounted result cards and the save-location status
//! line. Each render replaces the previous content wholesale. Every widget
//! mounted by the previous render is destroyed before the first new one is
//! mounted, so repeated renders never accumulate widget instances.
//!
//! Rendering goes through a [`WidgetHost`], the display surface. The console
//! binary uses [`MemoryHost`], which tracks live widgets in memory.

use std::collections::BTreeMap;

use crate::model::{CaptureBatch, ResultCard, SlidePair};

/// Handle of one mounted display widget.
pub type WidgetId = u64;

/// Display surface the gallery draws on.
pub trait WidgetHost {
    /// Mount `card` at `position` and return its widget handle.
    fn mount_card(&mut self, position: usize, card: &ResultCard) -> WidgetId;

    /// Destroy a widget previously returned by [`WidgetHost::mount_card`].
    fn destroy(&mut self, widget: WidgetId);

    /// Replace the raw capture slides.
    fn show_slides(&mut self, slides: &[SlidePair]);

    /// Replace the status line under the gallery.
    fn show_status(&mut self, text: &str);
}

/// Owns the gallery content and its mounted widgets.
pub struct GalleryPresenter<H: WidgetHost> {
    host: H,
    mounted: Vec<WidgetId>,
    cards: Vec<ResultCard>,
    slides: Vec<SlidePair>,
    status: String,
    renders: u64,
}

impl<H: WidgetHost> GalleryPresenter<H> {
    /// Create an empty gallery on `host`.
    pub fn new(host: H) -> Self {
        Self {
            host,
            mounted: Vec::new(),
            cards: Vec::new(),
            slides: Vec::new(),
            status: String::new(),
            renders: 0,
        }
    }

    /// Replace the result cards. `render(vec![])` clears them.
    pub fn render(&mut self, cards: Vec<ResultCard>) {
        self.teardown();

        for (position, card) in cards.iter().enumerate() {
            let widget = self.host.mount_card(position, card);
            self.mounted.push(widget);
        }
        self.cards = cards;
        self.renders += 1;
        tracing::debug!(cards = self.cards.len(), render = self.renders, "Gallery rendered");
    }

    /// Replace the raw slides with a fresh capture batch.
    ///
    /// Returns the number of slide pairs shown.
    pub fn render_batch(&mut self, batch: &CaptureBatch) -> usize {
        self.slides = batch.slide_pairs();
        self.host.show_slides(&self.slides);
        self.slides.len()
    }

    /// Remove cards and slides.
    pub fn clear(&mut self) {
        self.render(Vec::new());
        self.slides.clear();
        self.host.show_slides(&[]);
    }

    /// Replace the status line (save location or label feedback).
    pub fn set_status(&mut self, text: impl Into<String>) {
        self.status = text.into();
        self.host.show_status(&self.status);
    }

    /// Append to the status line.
    pub fn append_status(&mut self, text: &str) {
        self.status.push_str(text);
        self.host.show_status(&self.status);
    }

    /// Cards of the last render, in display order.
    #[must_use]
    pub fn cards(&self) -> &[ResultCard] {
        &self.cards
    }

    /// Slides of the last capture.
    #[must_use]
    pub fn slides(&self) -> &[SlidePair] {
        &self.slides
    }

    /// Widgets currently mounted, in display order.
    #[must_use]
    pub fn mounted(&self) -> &[WidgetId] {
        &self.mounted
    }

    /// Current status line.
    #[must_use]
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Completed card renders.
    #[must_use]
    pub fn render_count(&self) -> u64 {
        self.renders
    }

    /// Display surface.
    #[must_use]
    pub fn host(&self) -> &H {
        &self.host
    }

    fn teardown(&mut self) {
        for widget in self.mounted.drain(..) {
            self.host.destroy(widget);
        }
        self.cards.clear();
    }
}

/// In-memory display surface.
///
/// Keeps the set of live widgets so leaks and duplicates are observable.
#[derive(Debug, Default)]
pub struct MemoryHost {
    next_id: WidgetId,
    live: BTreeMap<WidgetId, String>,
    slides: usize,
    status: String,
    mounted_total: u64,
    destroyed_total: u64,
}

impl MemoryHost {
    /// Empty surface.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Titles of live widgets, by widget id.
    #[must_use]
    pub fn live(&self) -> &BTreeMap<WidgetId, String> {
        &self.live
    }

    /// Number of slide pairs on display.
    #[must_use]
    pub fn slide_count(&self) -> usize {
        self.slides
    }

    /// Status line on display.
    #[must_use]
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Widgets mounted since creation.
    #[must_use]
    pub fn mounted_total(&self) -> u64 {
        self.mounted_total
    }

    /// Widgets destroyed since creation.
    #[must_use]
    pub fn destroyed_total(&self) -> u64 {
        self.destroyed_total
    }
}

impl WidgetHost for MemoryHost {
    fn mount_card(&mut self, position: usize, card: &ResultCard) -> WidgetId {
        self.next_id += 1;
        let id = self.next_id;
        self.live.insert(id, card.title.clone());
        self.mounted_total += 1;
        tracing::trace!(widget = id, position, title = %card.title, "Mounted card");
        id
    }

    fn destroy(&mut self, widget: WidgetId) {
        if self.live.remove(&widget).is_some() {
            self.destroyed_total += 1;
        } else {
            tracing::warn!(widget, "Destroy of unknown widget");
        }
    }

    fn show_slides(&mut self, slides: &[SlidePair]) {
        self.slides = slides.len();
    }

    fn show_status(&mut self, text: &str) {
        self.status = text.to_string();
    }
}
