mod region;

use anyhow::{Result, anyhow};
use image::{DynamicImage, GenericImageView};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::geometry::{Point, Rect, Size, crop_region, view_to_image_pixel};

pub use region::{BitMask, Region, TextMask, grow_region, region_at};
use region::ProjectedMask;

/// Result of running text recognition over an image.
#[derive(Clone)]
pub struct Analysis {
    pub transcript: String,
    pub mask: Arc<dyn TextMask>,
}

impl std::fmt::Debug for Analysis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analysis")
            .field("transcript", &self.transcript)
            .field("mask", &(self.mask.width(), self.mask.height()))
            .finish()
    }
}

pub type AnalysisFuture = Pin<Box<dyn Future<Output = Result<Analysis>> + Send>>;

/// On-device text recognition. The mask is in the analysed image's pixel
/// space (or any grid of the same aspect).
pub trait TextRecognizer: Send + Sync {
    fn analyze(&self, image: Arc<DynamicImage>) -> AnalysisFuture;
}

#[derive(Debug, Clone)]
pub struct LiveTextBox {
    pub frame_within_view: Rect,
    pub pixel_rect: Rect,
    pub image: Option<Arc<DynamicImage>>,
    pub text: Option<String>,
}

/// Identifies which displayed image an analysis was started for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImageToken(u64);

#[derive(Clone, Default)]
pub enum AnalysisState {
    #[default]
    Idle,
    AnalysisRequested,
    AnalysisComplete(Arc<dyn TextMask>),
    AnalysisFailed,
}

impl std::fmt::Debug for AnalysisState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AnalysisState::Idle => "Idle",
            AnalysisState::AnalysisRequested => "AnalysisRequested",
            AnalysisState::AnalysisComplete(_) => "AnalysisComplete",
            AnalysisState::AnalysisFailed => "AnalysisFailed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TapOutcome {
    NoImage,
    OutsideImage,
    /// Index into [`LiveTextSession::boxes`].
    Selected(usize),
    AnalysisRequested,
    Queued,
    Unavailable,
    NoText,
    Detecting(Rect),
}

#[derive(Debug)]
pub enum Applied {
    Stale,
    MaskReady(Vec<TapOutcome>),
    MaskFailed,
    BoxAdded(usize),
    BoxFailed,
}

pub struct Completion {
    token: ImageToken,
    kind: CompletionKind,
}

enum CompletionKind {
    Mask(Result<Analysis>),
    Transcript(LiveTextBox, Result<Analysis>),
}

/// Live text state for the image currently on screen.
///
/// All mutation happens through `&mut self` on the owning task. Recognition
/// runs in spawned tokio tasks whose results come back as [`Completion`]s
/// through [`LiveTextSession::next_completion`]; results for an image that is
/// no longer displayed are dropped.
pub struct LiveTextSession {
    recognizer: Arc<dyn TextRecognizer>,
    token: ImageToken,
    image: Option<Arc<DynamicImage>>,
    view: Size,
    state: AnalysisState,
    boxes: Vec<LiveTextBox>,
    pending_taps: Vec<Point>,
    tasks: Vec<JoinHandle<()>>,
    in_flight: usize,
    tx: mpsc::UnboundedSender<Completion>,
    rx: mpsc::UnboundedReceiver<Completion>,
}

impl LiveTextSession {
    pub fn new(recognizer: Arc<dyn TextRecognizer>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            recognizer,
            token: ImageToken::default(),
            image: None,
            view: Size::default(),
            state: AnalysisState::Idle,
            boxes: Vec::new(),
            pending_taps: Vec::new(),
            tasks: Vec::new(),
            in_flight: 0,
            tx,
            rx,
        }
    }

    /// Replaces the displayed image and forgets everything about the old one.
    pub fn set_image(&mut self, image: DynamicImage) {
        self.reset(Some(Arc::new(image)));
    }

    /// Drops the current image; taps report [`TapOutcome::NoImage`] until the
    /// next `set_image`.
    pub fn clear_image(&mut self) {
        self.reset(None);
    }

    fn reset(&mut self, image: Option<Arc<DynamicImage>>) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.token = ImageToken(self.token.0 + 1);
        self.image = image;
        self.state = AnalysisState::Idle;
        self.boxes.clear();
        self.pending_taps.clear();
        self.in_flight = 0;
        debug!("live text session reset (token {})", self.token.0);
    }

    pub fn set_view_size(&mut self, view: Size) {
        self.view = view;
    }

    pub fn token(&self) -> ImageToken {
        self.token
    }

    pub fn state(&self) -> &AnalysisState {
        &self.state
    }

    pub fn boxes(&self) -> &[LiveTextBox] {
        &self.boxes
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn box_containing(&self, point: Point) -> Option<&LiveTextBox> {
        self.box_index_at(point).map(|idx| &self.boxes[idx])
    }

    fn box_index_at(&self, point: Point) -> Option<usize> {
        self.boxes
            .iter()
            .position(|item| item.frame_within_view.contains(point))
    }

    /// Handles a tap in view coordinates. Must be called inside a tokio
    /// runtime since it may spawn recognition work.
    pub fn tap(&mut self, point: Point) -> TapOutcome {
        let Some(image) = self.image.clone() else {
            return TapOutcome::NoImage;
        };
        if let Some(idx) = self.box_index_at(point) {
            return TapOutcome::Selected(idx);
        }
        if view_to_image_pixel(point, self.view, image_size(&image)).is_none() {
            return TapOutcome::OutsideImage;
        }
        match &self.state {
            AnalysisState::Idle => {
                self.pending_taps.push(point);
                self.state = AnalysisState::AnalysisRequested;
                self.spawn_mask_analysis(image);
                TapOutcome::AnalysisRequested
            }
            AnalysisState::AnalysisRequested => {
                self.pending_taps.push(point);
                TapOutcome::Queued
            }
            AnalysisState::AnalysisFailed => TapOutcome::Unavailable,
            AnalysisState::AnalysisComplete(mask) => {
                let mask = Arc::clone(mask);
                self.detect(point, image, mask.as_ref())
            }
        }
    }

    fn detect(&mut self, point: Point, image: Arc<DynamicImage>, mask: &dyn TextMask) -> TapOutcome {
        let size = image_size(&image);
        let projected = ProjectedMask::new(mask, self.view, size);
        let Some(view_rect) = region_at(&projected, point) else {
            return TapOutcome::NoText;
        };
        let Some(pixel_rect) = crop_region(view_rect, self.view, size) else {
            return TapOutcome::NoText;
        };
        let Some(crop) = crop_image(&image, pixel_rect) else {
            return TapOutcome::NoText;
        };
        let crop = Arc::new(crop);
        let pending = LiveTextBox {
            frame_within_view: view_rect,
            pixel_rect,
            image: Some(Arc::clone(&crop)),
            text: None,
        };
        debug!("detected text region {:?} -> pixels {:?}", view_rect, pixel_rect);
        self.spawn(crop, move |result| CompletionKind::Transcript(pending, result));
        TapOutcome::Detecting(view_rect)
    }

    fn spawn_mask_analysis(&mut self, image: Arc<DynamicImage>) {
        self.spawn(image, CompletionKind::Mask);
    }

    fn spawn<F>(&mut self, image: Arc<DynamicImage>, wrap: F)
    where
        F: FnOnce(Result<Analysis>) -> CompletionKind + Send + 'static,
    {
        let future = self.recognizer.analyze(image);
        let sender = CompletionSender {
            tx: self.tx.clone(),
            token: self.token,
            wrap: Some(wrap),
        };
        let handle = tokio::spawn(async move {
            let result = future.await;
            sender.send(result);
        });
        self.tasks.retain(|task| !task.is_finished());
        self.tasks.push(handle);
        self.in_flight += 1;
    }

    pub async fn next_completion(&mut self) -> Option<Completion> {
        self.rx.recv().await
    }

    pub fn apply(&mut self, completion: Completion) -> Applied {
        if completion.token != self.token {
            debug!(
                "dropping live text result for stale image (token {} != {})",
                completion.token.0, self.token.0
            );
            return Applied::Stale;
        }
        self.in_flight = self.in_flight.saturating_sub(1);
        match completion.kind {
            CompletionKind::Mask(Ok(analysis)) => {
                self.state = AnalysisState::AnalysisComplete(Arc::clone(&analysis.mask));
                let Some(image) = self.image.clone() else {
                    return Applied::MaskReady(Vec::new());
                };
                let taps = std::mem::take(&mut self.pending_taps);
                let outcomes = taps
                    .into_iter()
                    .map(|point| match self.box_index_at(point) {
                        Some(idx) => TapOutcome::Selected(idx),
                        None => self.detect(point, Arc::clone(&image), analysis.mask.as_ref()),
                    })
                    .collect();
                Applied::MaskReady(outcomes)
            }
            CompletionKind::Mask(Err(err)) => {
                warn!("text analysis failed: {:#}", err);
                self.state = AnalysisState::AnalysisFailed;
                self.pending_taps.clear();
                Applied::MaskFailed
            }
            CompletionKind::Transcript(mut text_box, Ok(analysis)) => {
                text_box.text = Some(analysis.transcript);
                self.boxes.push(text_box);
                Applied::BoxAdded(self.boxes.len() - 1)
            }
            CompletionKind::Transcript(text_box, Err(err)) => {
                warn!(
                    "text recognition failed for region {:?}: {:#}",
                    text_box.frame_within_view, err
                );
                Applied::BoxFailed
            }
        }
    }

    /// Applies completions until nothing is in flight for the current image.
    pub async fn settle(&mut self) -> Vec<Applied> {
        let mut applied = Vec::new();
        while self.in_flight > 0 {
            let Some(completion) = self.next_completion().await else {
                break;
            };
            applied.push(self.apply(completion));
        }
        applied
    }
}

/// Delivers exactly one completion per spawned analysis. A task that panics
/// or is aborted before finishing reports a failure on drop.
struct CompletionSender<F>
where
    F: FnOnce(Result<Analysis>) -> CompletionKind,
{
    tx: mpsc::UnboundedSender<Completion>,
    token: ImageToken,
    wrap: Option<F>,
}

impl<F> CompletionSender<F>
where
    F: FnOnce(Result<Analysis>) -> CompletionKind,
{
    fn send(mut self, result: Result<Analysis>) {
        self.deliver(result);
    }

    fn deliver(&mut self, result: Result<Analysis>) {
        if let Some(wrap) = self.wrap.take() {
            let _ = self.tx.send(Completion {
                token: self.token,
                kind: wrap(result),
            });
        }
    }
}

impl<F> Drop for CompletionSender<F>
where
    F: FnOnce(Result<Analysis>) -> CompletionKind,
{
    fn drop(&mut self) {
        self.deliver(Err(anyhow!("text recognition ended without a result")));
    }
}

fn image_size(image: &DynamicImage) -> Size {
    let (width, height) = image.dimensions();
    Size::new(width as f64, height as f64)
}

/// Crops `rect` out of `image`, clamped to the image bounds.
pub fn crop_image(image: &DynamicImage, rect: Rect) -> Option<DynamicImage> {
    let bounds = Rect::new(0.0, 0.0, image.width() as f64, image.height() as f64);
    let clamped = rect.intersection(&bounds)?;
    let x = clamped.x.floor() as u32;
    let y = clamped.y.floor() as u32;
    let w = (clamped.max_x().ceil() as u32).saturating_sub(x);
    let h = (clamped.max_y().ceil() as u32).saturating_sub(y);
    if w == 0 || h == 0 {
        return None;
    }
    Some(image.crop_imm(x, y, w, h))
}
