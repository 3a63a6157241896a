use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::blocks::BlockIndex;
use crate::geometry::{Point, Size, view_to_image_pixel};
use crate::japanese::{Annotation, Annotator, Dictionary, Tokenizer};
use crate::live_text::{Applied, Completion, LiveTextSession, TapOutcome, TextRecognizer};
use crate::mokuro::{Document, Page, Volume};
use crate::settings::{ReaderMode, Settings};
use crate::store::KeyValueStore;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum ReaderEvent {
    DocumentLoaded { id: String, title: String },
    PageChanged { img_path: String, file: Option<PathBuf> },
    SelectionChanged(Option<String>),
}

/// What a tap on the page did, depending on the reader mode.
#[derive(Debug, Clone, PartialEq)]
pub enum TapResult {
    /// Stored block lookup; the block text when one was hit.
    Block(Option<String>),
    Live(TapOutcome),
}

/// Everything the reader screen shows, owned by one task.
///
/// Changes are announced on a broadcast channel; see [`ReaderState::subscribe`].
pub struct ReaderState {
    settings: Settings,
    store: Box<dyn KeyValueStore>,
    volume: Option<Volume>,
    current_img_path: Option<String>,
    current_file: Option<PathBuf>,
    selection: Option<String>,
    live: Option<LiveTextSession>,
    events: broadcast::Sender<ReaderEvent>,
}

fn last_page_key(document: &Document) -> String {
    format!("last_page.{}", document.id())
}

impl ReaderState {
    pub fn new(settings: Settings, store: Box<dyn KeyValueStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            settings,
            store,
            volume: None,
            current_img_path: None,
            current_file: None,
            selection: None,
            live: None,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReaderEvent> {
        self.events.subscribe()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn view_size(&self) -> Size {
        Size::new(self.settings.view_width, self.settings.view_height)
    }

    pub fn set_view_size(&mut self, view: Size) {
        self.settings.view_width = view.width;
        self.settings.view_height = view.height;
        if let Some(session) = self.live.as_mut() {
            session.set_view_size(view);
        }
    }

    /// Loads `folder` off the async runtime and shows the resumed page.
    pub async fn open(&mut self, folder: PathBuf) -> Result<()> {
        let display = folder.display().to_string();
        let volume = tokio::task::spawn_blocking(move || Volume::load(&folder))
            .await
            .context("volume loader task failed")?
            .with_context(|| format!("failed to load volume: {}", display))?;
        self.set_volume(volume)
    }

    pub fn load_volume(&mut self, folder: &Path) -> Result<()> {
        let volume = Volume::load(folder)
            .with_context(|| format!("failed to load volume: {}", folder.display()))?;
        self.set_volume(volume)
    }

    fn set_volume(&mut self, volume: Volume) -> Result<()> {
        let document = &volume.document;
        info!("opened {} ({})", document.title, document.volume);
        let marker: Option<String> = self.store.get(&last_page_key(document), None);
        let resumed = marker.filter(|img_path| {
            let known = document.page(img_path).is_some()
                && volume.resolve_image_file(img_path).is_some();
            if !known {
                debug!("ignoring unresolvable resume marker {}", img_path);
            }
            known
        });
        let start = resumed.or_else(|| {
            document
                .pages_ordered()
                .first()
                .map(|page| page.img_path.clone())
        });
        let event = ReaderEvent::DocumentLoaded {
            id: document.id(),
            title: document.title.clone(),
        };

        self.volume = Some(volume);
        self.current_img_path = None;
        self.current_file = None;
        let _ = self.events.send(event);
        match start {
            Some(img_path) => self.show_page(img_path),
            None => {
                warn!("volume has no pages");
                Ok(())
            }
        }
    }

    pub fn volume(&self) -> Option<&Volume> {
        self.volume.as_ref()
    }

    pub fn document(&self) -> Option<&Document> {
        self.volume.as_ref().map(|volume| &volume.document)
    }

    pub fn pages_ordered(&self) -> Vec<&Page> {
        self.document()
            .map(Document::pages_ordered)
            .unwrap_or_default()
    }

    pub fn current_file(&self) -> Option<&Path> {
        self.current_file.as_deref()
    }

    pub fn current_file_name(&self) -> Option<String> {
        self.current_file
            .as_ref()
            .and_then(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
    }

    pub fn current_page(&self) -> Option<&Page> {
        let img_path = self.current_img_path.as_deref()?;
        self.document()?.page(img_path)
    }

    pub fn current_index(&self) -> Option<usize> {
        let img_path = self.current_img_path.as_deref()?;
        self.document()?.page_index(img_path)
    }

    pub fn selection(&self) -> Option<&str> {
        self.selection.as_deref()
    }

    /// Moves to the following page. Returns false at the last page.
    pub fn next(&mut self) -> Result<bool> {
        let target = self
            .current_img_path
            .as_deref()
            .and_then(|current| self.document()?.next_page(current))
            .map(|page| page.img_path.clone());
        self.move_to(target)
    }

    /// Moves to the preceding page. Returns false at the first page.
    pub fn previous(&mut self) -> Result<bool> {
        let target = self
            .current_img_path
            .as_deref()
            .and_then(|current| self.document()?.previous_page(current))
            .map(|page| page.img_path.clone());
        self.move_to(target)
    }

    /// Shows the first page whose `img_path` contains `name`.
    pub fn go_to_page(&mut self, name: &str) -> Result<bool> {
        let target = self
            .document()
            .and_then(|document| document.page(name))
            .map(|page| page.img_path.clone());
        self.move_to(target)
    }

    fn move_to(&mut self, target: Option<String>) -> Result<bool> {
        match target {
            Some(img_path) => {
                self.show_page(img_path)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn show_page(&mut self, img_path: String) -> Result<()> {
        let Some(volume) = self.volume.as_ref() else {
            return Ok(());
        };
        let file = volume.resolve_image_file(&img_path).map(Path::to_path_buf);
        if file.is_none() {
            warn!("no file found for page {}", img_path);
        }
        let key = last_page_key(&volume.document);
        self.store
            .set(&key, &img_path)
            .with_context(|| format!("failed to remember page {}", img_path))?;

        debug!("showing page {}", img_path);
        self.current_img_path = Some(img_path.clone());
        self.current_file = file.clone();
        self.set_selection(None);
        self.reload_live_image();
        let _ = self.events.send(ReaderEvent::PageChanged { img_path, file });
        Ok(())
    }

    fn set_selection(&mut self, selection: Option<String>) {
        if self.selection == selection {
            return;
        }
        self.selection = selection.clone();
        let _ = self.events.send(ReaderEvent::SelectionChanged(selection));
    }

    /// Selects the block under `point`, given in coordinates of a view of
    /// `view` size showing the current page.
    pub fn select_block_at(&mut self, point: Point, view: Size) -> Option<String> {
        let text = {
            let page = self.current_page()?;
            let pixel = view_to_image_pixel(point, view, page.image_size())?;
            let index = BlockIndex::build(page);
            index.block_containing(pixel)?.joined_lines()
        };
        self.set_selection(Some(text.clone()));
        Some(text)
    }

    /// Handles a tap in view coordinates. Live mode falls back to stored
    /// blocks until a recognizer is enabled.
    pub fn tap(&mut self, point: Point) -> TapResult {
        if self.settings.mode == ReaderMode::Live {
            if let Some(outcome) = self.tap_live(point) {
                return TapResult::Live(outcome);
            }
            warn!("live text is not enabled; using stored blocks");
        }
        TapResult::Block(self.select_block_at(point, self.view_size()))
    }

    /// An annotator using the configured lookup limit and palette.
    pub fn annotator(
        &self,
        tokenizer: Result<Box<dyn Tokenizer>>,
        dictionary: Option<Box<dyn Dictionary>>,
    ) -> Annotator {
        Annotator::new(tokenizer, dictionary).with_settings(&self.settings)
    }

    /// Annotates the selected text; empty when nothing is selected.
    pub fn annotate_selection(&self, annotator: &Annotator) -> Vec<Annotation> {
        self.selection
            .as_deref()
            .map(|text| annotator.annotate(text))
            .unwrap_or_default()
    }

    pub fn enable_live(&mut self, recognizer: Arc<dyn TextRecognizer>) {
        let mut session = LiveTextSession::new(recognizer);
        session.set_view_size(self.view_size());
        self.live = Some(session);
        self.reload_live_image();
    }

    pub fn live(&self) -> Option<&LiveTextSession> {
        self.live.as_ref()
    }

    fn reload_live_image(&mut self) {
        let Some(session) = self.live.as_mut() else {
            return;
        };
        let Some(file) = self.current_file.as_ref() else {
            session.clear_image();
            return;
        };
        match image::open(file) {
            Ok(image) => session.set_image(image),
            Err(err) => {
                warn!("failed to decode {}: {}", file.display(), err);
                session.clear_image();
            }
        }
    }

    /// Routes a tap to the live session. Returns None when live text is off.
    pub fn tap_live(&mut self, point: Point) -> Option<TapOutcome> {
        let outcome = self.live.as_mut()?.tap(point);
        if let TapOutcome::Selected(idx) = outcome {
            self.select_live_box(idx);
        }
        Some(outcome)
    }

    pub async fn next_live_completion(&mut self) -> Option<Completion> {
        self.live.as_mut()?.next_completion().await
    }

    pub fn apply_live_completion(&mut self, completion: Completion) -> Option<Applied> {
        let applied = self.live.as_mut()?.apply(completion);
        match &applied {
            Applied::BoxAdded(idx) => self.select_live_box(*idx),
            Applied::MaskReady(outcomes) => {
                let selected = outcomes.iter().rev().find_map(|outcome| match outcome {
                    TapOutcome::Selected(idx) => Some(*idx),
                    _ => None,
                });
                if let Some(idx) = selected {
                    self.select_live_box(idx);
                }
            }
            _ => {}
        }
        Some(applied)
    }

    /// Applies live completions until nothing is in flight.
    pub async fn settle_live(&mut self) -> Vec<Applied> {
        let mut applied = Vec::new();
        while self.live.as_ref().is_some_and(|session| session.in_flight() > 0) {
            let Some(completion) = self.next_live_completion().await else {
                break;
            };
            if let Some(result) = self.apply_live_completion(completion) {
                applied.push(result);
            }
        }
        applied
    }

    fn select_live_box(&mut self, idx: usize) {
        let text = self
            .live
            .as_ref()
            .and_then(|session| session.boxes().get(idx))
            .and_then(|text_box| text_box.text.clone());
        if text.is_some() {
            self.set_selection(text);
        }
    }
}
