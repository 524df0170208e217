//! Studio runtime: owns the session and executes its effects.
//!
//! The reducer in [`crate::session`] stays pure and produces effects; every
//! side effect (timers, the transform service, the preview surface, storage,
//! the clipboard, exports) happens here.
//!
//! ## Inbox Pattern
//!
//! Spawned work never touches state. Timers and network tasks send
//! `StudioEvent`s to `inbox_tx`; the runtime drains `inbox_rx` and feeds each
//! event back through the reducer.

mod timers;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use timers::TimerSet;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::clipboard::Clipboard;
use crate::export;
use crate::preview::{PreviewRenderer, RenderSurface};
use crate::session::{self, Studio, StudioEffect, StudioEvent, TimerKind};
use crate::storage::{KeyValueStore, StoredSession};
use crate::transform::TransformService;

pub type StudioEventSender = mpsc::UnboundedSender<StudioEvent>;
pub type StudioEventReceiver = mpsc::UnboundedReceiver<StudioEvent>;

pub struct StudioRuntime<S: TransformService, R: RenderSurface> {
    /// Session state. Only mutated through `dispatch`.
    pub state: Studio,
    service: Arc<S>,
    surface: R,
    renderer: PreviewRenderer,
    store: Box<dyn KeyValueStore>,
    clipboard: Clipboard,
    timers: TimerSet,
    inbox_tx: StudioEventSender,
    inbox_rx: StudioEventReceiver,
}

impl<S: TransformService, R: RenderSurface> fmt::Debug for StudioRuntime<S, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StudioRuntime")
            .field("renderer", &self.renderer)
            .field("clipboard", &self.clipboard)
            .finish_non_exhaustive()
    }
}

impl<S: TransformService, R: RenderSurface> StudioRuntime<S, R> {
    /// Creates a runtime around an existing session.
    ///
    /// Must be called inside a tokio runtime: timers and requests are spawned
    /// as tasks.
    pub fn new(state: Studio, service: S, surface: R, store: Box<dyn KeyValueStore>) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let mut runtime = Self {
            state,
            service: Arc::new(service),
            surface,
            renderer: PreviewRenderer::default(),
            store,
            clipboard: Clipboard::default(),
            timers: TimerSet::default(),
            inbox_tx,
            inbox_rx,
        };
        runtime.wire_clicks();
        runtime
    }

    #[must_use]
    pub fn with_renderer(mut self, renderer: PreviewRenderer) -> Self {
        self.renderer = renderer;
        self.wire_clicks();
        self
    }

    #[must_use]
    pub fn with_clipboard(mut self, clipboard: Clipboard) -> Self {
        self.clipboard = clipboard;
        self
    }

    /// Ctrl/Cmd clicks in the preview come back as `PreviewClicked`.
    fn wire_clicks(&mut self) {
        let tx = self.inbox_tx.clone();
        self.renderer.set_click_handler(Arc::new(move |click| {
            let _ = tx.send(StudioEvent::PreviewClicked(click));
        }));
    }

    /// Handle for feeding events from outside (file watchers, input).
    pub fn sender(&self) -> StudioEventSender {
        self.inbox_tx.clone()
    }

    pub fn surface(&self) -> &R {
        &self.surface
    }

    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    pub fn is_timer_live(&self, kind: TimerKind) -> bool {
        self.timers.is_live(kind)
    }

    /// Loads the stored session and runs the startup sequence.
    pub fn restore(&mut self) {
        let stored = match StoredSession::load(self.store.as_ref()) {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(error = %e, "stored session unreadable");
                self.dispatch(StudioEvent::StorageUnreadable(format!("{e:#}")));
                StoredSession::default()
            }
        };
        self.dispatch(StudioEvent::Restored(stored));
    }

    /// Runs one event through the reducer and executes the resulting effects.
    pub fn dispatch(&mut self, event: StudioEvent) {
        let effects = session::update(&mut self.state, event);
        for effect in effects {
            self.execute_effect(effect);
        }
    }

    /// Dispatches everything already waiting in the inbox.
    pub fn process_pending(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(event) = self.inbox_rx.try_recv() {
            self.dispatch(event);
            processed += 1;
        }
        processed
    }

    /// Waits for the next inbox event and dispatches it.
    pub async fn step(&mut self) -> bool {
        match self.inbox_rx.recv().await {
            Some(event) => {
                self.dispatch(event);
                true
            }
            None => false,
        }
    }

    /// Processes events until `cancel` fires.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<()> {
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::debug!("studio runtime stopping");
                    return Ok(());
                }
                event = self.inbox_rx.recv() => match event {
                    Some(event) => self.dispatch(event),
                    None => return Ok(()),
                },
            }
        }
    }

    fn spawn_effect<Fut>(&self, fut: Fut)
    where
        Fut: Future<Output = StudioEvent> + Send + 'static,
    {
        let tx = self.inbox_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(fut.await);
        });
    }

    fn report(&self, event: StudioEvent) {
        let _ = self.inbox_tx.send(event);
    }

    fn execute_effect(&mut self, effect: StudioEffect) {
        match effect {
            StudioEffect::ArmTimer {
                kind,
                generation,
                delay,
            } => self.timers.arm(kind, generation, delay, &self.inbox_tx),
            StudioEffect::CancelTimer(kind) => self.timers.cancel(kind),

            StudioEffect::SendTransform(request) => {
                let service = Arc::clone(&self.service);
                self.spawn_effect(async move {
                    let outcome = service.transform(&request).await;
                    if let Err(e) = &outcome {
                        tracing::warn!(seq = request.seq, error = %e, "transform request failed");
                    }
                    StudioEvent::TransformCompleted {
                        seq: request.seq,
                        version: request.version,
                        outcome,
                    }
                });
            }
            StudioEffect::FetchSample => {
                let service = Arc::clone(&self.service);
                self.spawn_effect(async move {
                    StudioEvent::SampleLoaded(service.fetch_sample().await)
                });
            }

            StudioEffect::RenderPreview { html, zoom, layout } => {
                if let Err(e) = self.renderer.render(&mut self.surface, &html, zoom, layout) {
                    tracing::warn!(error = %e, "preview write failed");
                    self.report(StudioEvent::PreviewFailed(format!("{e:#}")));
                }
            }
            StudioEffect::ApplyZoom(zoom) => {
                if let Err(e) = self.surface.apply_zoom(zoom) {
                    self.report(StudioEvent::PreviewFailed(format!("{e:#}")));
                }
            }
            StudioEffect::MeasurePreview => {
                let height = self.renderer.finish_measure(&mut self.surface);
                tracing::debug!(?height, "preview measured");
            }
            StudioEffect::ClearPreviewHeight => self.surface.set_height(None),

            StudioEffect::Persist(snapshot) => {
                if let Err(e) = self.store.set_many(&snapshot.entries()) {
                    tracing::warn!(error = %e, "state not persisted");
                    self.report(StudioEvent::StorageFailed(format!("{e:#}")));
                }
            }
            StudioEffect::CopyToClipboard(text) => {
                let result = self.clipboard.copy(&text);
                self.report(StudioEvent::ClipboardCopied { text, result });
            }
            StudioEffect::ExportFile { kind, dir, content } => {
                let result = export::export_to_dir(&dir, kind, &content).map_err(|e| format!("{e:#}"));
                self.report(StudioEvent::Exported { kind, result });
            }
        }
    }
}
