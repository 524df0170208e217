use std::sync::{Arc, Mutex};
use std::time::Duration;

use xstudio_core::buffer::{Edit, SourceKind};
use xstudio_core::clipboard::{Clipboard, Osc52Clipboard};
use xstudio_core::diagnostics::DiagnosticLevel;
use xstudio_core::navigator::HighlightKind;
use xstudio_core::preview::{HeadlessSurface, Modifiers, MouseButton, PreviewClick};
use xstudio_core::session::{Studio, StudioEvent, StudioOptions, TimerKind};
use xstudio_core::storage::{FileStore, KeyValueStore, MemoryStore};
use xstudio_core::transform::{
    EngineKind, SampleBundle, ServiceError, ServiceErrorKind, TransformRequest, TransformResult,
    TransformService,
};
use xstudio_core::tree::XmlViewMode;

const XSLT: &str = r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
<xsl:template match="/">
  <h1>Invoice summary</h1>
</xsl:template>
</xsl:stylesheet>"#;

/// Echoes the XML back as HTML. XML containing `slow` answers after 1s,
/// XML containing `broken` fails.
#[derive(Clone, Default)]
struct FakeService {
    requests: Arc<Mutex<Vec<TransformRequest>>>,
}

impl FakeService {
    fn requests(&self) -> Vec<TransformRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl TransformService for FakeService {
    async fn transform(&self, request: &TransformRequest) -> Result<TransformResult, ServiceError> {
        self.requests.lock().unwrap().push(request.clone());
        if request.xml.contains("slow") {
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        if request.xml.contains("offline") {
            return Err(ServiceError::new(ServiceErrorKind::Connect, "connection refused"));
        }
        if request.xml.contains("broken") {
            return Ok(TransformResult {
                ok: false,
                html: String::new(),
                engine: Some(EngineKind::Error),
                log: vec!["[ERROR] [SRC:xml L:1 C:2] unexpected token".into()],
            });
        }
        Ok(TransformResult {
            ok: true,
            html: format!("<p>{}</p>", request.xml),
            engine: Some(EngineKind::Lxml),
            log: vec!["Transformation completed.".into()],
        })
    }

    async fn fetch_sample(&self) -> Result<SampleBundle, ServiceError> {
        Ok(SampleBundle {
            ok: true,
            xml: "<Invoice><ID>SAXON-1</ID></Invoice>".into(),
            xslt: XSLT.replace("1.0", "3.0"),
            message: None,
        })
    }
}

type Runtime = xstudio_core::runtime::StudioRuntime<FakeService, HeadlessSurface>;

fn runtime_with(service: FakeService, store: Box<dyn KeyValueStore>, auto_update: bool) -> Runtime {
    let options = StudioOptions {
        auto_update,
        ..StudioOptions::default()
    };
    let mut runtime = Runtime::new(Studio::new(&options), service, HeadlessSurface::new(), store);
    runtime.dispatch(edit(SourceKind::Xslt, XSLT));
    runtime
}

fn edit(source: SourceKind, text: &str) -> StudioEvent {
    StudioEvent::Edited {
        source,
        edit: Edit::SetText(text.into()),
    }
}

async fn run_until(runtime: &mut Runtime, done: impl Fn(&Runtime) -> bool) {
    for _ in 0..32 {
        if done(runtime) {
            return;
        }
        runtime.step().await;
    }
    panic!("runtime did not settle");
}

#[tokio::test(start_paused = true)]
async fn test_debounced_edits_send_one_request() {
    let service = FakeService::default();
    let mut runtime = runtime_with(service.clone(), Box::new(MemoryStore::new()), true);

    runtime.dispatch(edit(SourceKind::Xml, "<a>1</a>"));
    tokio::time::sleep(Duration::from_millis(100)).await;
    runtime.process_pending();
    runtime.dispatch(edit(SourceKind::Xml, "<a>2</a>"));
    tokio::time::sleep(Duration::from_millis(100)).await;
    runtime.process_pending();
    runtime.dispatch(edit(SourceKind::Xml, "<a>3</a>"));

    run_until(&mut runtime, |rt| rt.state.scheduler.last_applied_seq() > 0).await;

    let requests = service.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].xml, "<a>3</a>");
    assert_eq!(runtime.surface().html(), "<p><a>3</a></p>");
    assert_eq!(
        runtime.store().get("xstudio.html").unwrap().as_deref(),
        Some("<p><a>3</a></p>")
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_transform_keeps_previous_preview() {
    let service = FakeService::default();
    let mut runtime = runtime_with(service, Box::new(MemoryStore::new()), false);

    runtime.dispatch(edit(SourceKind::Xml, "<a>ok</a>"));
    runtime.dispatch(StudioEvent::Generate);
    run_until(&mut runtime, |rt| rt.state.scheduler.last_applied_seq() == 1).await;
    let writes = runtime.surface().writes();

    runtime.dispatch(edit(SourceKind::Xml, "<a>broken</a>"));
    runtime.dispatch(StudioEvent::Generate);
    run_until(&mut runtime, |rt| rt.state.scheduler.last_applied_seq() == 2).await;

    assert_eq!(runtime.surface().html(), "<p><a>ok</a></p>");
    assert_eq!(runtime.surface().writes(), writes);
    assert_eq!(runtime.state.preview.last_html, "<p><a>ok</a></p>");
    assert_eq!(runtime.state.engine_label(), "Engine: error");

    let last = runtime.state.diagnostics.entries().last().unwrap();
    assert_eq!(last.message, "Transformation failed.");
    assert_eq!(last.level, DiagnosticLevel::Error);
}

#[tokio::test(start_paused = true)]
async fn test_network_error_becomes_diagnostic() {
    let service = FakeService::default();
    let mut runtime = runtime_with(service, Box::new(MemoryStore::new()), false);

    runtime.dispatch(edit(SourceKind::Xml, "<a>offline</a>"));
    runtime.dispatch(StudioEvent::Generate);
    run_until(&mut runtime, |rt| rt.state.scheduler.last_applied_seq() == 1).await;

    let last = runtime.state.diagnostics.entries().last().unwrap();
    assert_eq!(
        last.message,
        "Network error during transform: connection refused"
    );
    assert_eq!(runtime.surface().writes(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_stale_response_never_overwrites_newer_preview() {
    let service = FakeService::default();
    let mut runtime = runtime_with(service.clone(), Box::new(MemoryStore::new()), false);

    runtime.dispatch(edit(SourceKind::Xml, "<a>slow</a>"));
    runtime.dispatch(StudioEvent::Generate);
    runtime.dispatch(edit(SourceKind::Xml, "<a>fast</a>"));
    runtime.dispatch(StudioEvent::Generate);

    run_until(&mut runtime, |rt| rt.state.scheduler.in_flight() == 0).await;

    assert_eq!(service.requests().len(), 2);
    assert_eq!(runtime.state.scheduler.last_applied_seq(), 2);
    assert_eq!(runtime.surface().html(), "<p><a>fast</a></p>");
    assert_eq!(runtime.surface().writes(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_copy_xpath_reports_exactly_once() {
    let mut runtime = runtime_with(FakeService::default(), Box::new(MemoryStore::new()), false)
        .with_clipboard(Clipboard::new(
            Box::new(Osc52Clipboard::new(Vec::new())),
            None,
        ));
    runtime.dispatch(edit(SourceKind::Xml, "<r><a/><a/></r>"));
    runtime.dispatch(StudioEvent::SetViewMode(XmlViewMode::Tree));

    let second = {
        let tree = runtime.state.tree.tree().unwrap();
        tree.find_by_xpath("/r/a[2]").unwrap()
    };
    runtime.dispatch(StudioEvent::TreeNodeClicked(second));
    assert_eq!(runtime.state.selected_xpath(), Some("/r/a[2]"));

    let before = runtime.state.diagnostics.len();
    runtime.dispatch(StudioEvent::CopyXPath);
    runtime.process_pending();

    let entries = runtime.state.diagnostics.entries();
    assert_eq!(entries.len(), before + 1);
    assert_eq!(entries.last().unwrap().message, "Copied XPath: /r/a[2]");
}

#[tokio::test(start_paused = true)]
async fn test_preview_click_jumps_and_highlight_expires() {
    let service = FakeService::default();
    let mut runtime = runtime_with(service, Box::new(MemoryStore::new()), false);
    runtime.dispatch(edit(SourceKind::Xml, "<a>x</a>"));
    runtime.dispatch(StudioEvent::Generate);
    run_until(&mut runtime, |rt| rt.state.scheduler.last_applied_seq() == 1).await;

    let clicked = runtime.surface().click(PreviewClick {
        button: MouseButton::Primary,
        modifiers: Modifiers {
            meta: true,
            ..Modifiers::default()
        },
        text: "Invoice summary".into(),
    });
    assert!(clicked);
    runtime.process_pending();

    assert_eq!(runtime.state.buffers.xslt.cursor().line, 2);
    assert!(
        runtime
            .state
            .buffers
            .xslt
            .has_line_mark(2, HighlightKind::PreviewJump.class())
    );
    assert!(runtime.is_timer_live(TimerKind::Highlight(HighlightKind::PreviewJump)));

    tokio::time::sleep(Duration::from_millis(1001)).await;
    runtime.process_pending();
    assert!(
        !runtime
            .state
            .buffers
            .xslt
            .has_line_mark(2, HighlightKind::PreviewJump.class())
    );
}

#[tokio::test(start_paused = true)]
async fn test_storage_failure_keeps_memory_state() {
    let mut runtime = runtime_with(FakeService::default(), Box::new(MemoryStore::failing()), false);
    runtime.dispatch(edit(SourceKind::Xml, "<a/>"));
    runtime.process_pending();

    assert_eq!(runtime.state.buffers.xml.text(), "<a/>");
    let last = runtime.state.diagnostics.entries().last().unwrap();
    assert_eq!(last.level, DiagnosticLevel::Error);
    assert!(
        last.message
            .starts_with("Could not save state to storage: storage is read-only")
    );
}

#[tokio::test(start_paused = true)]
async fn test_vertical_layout_sizes_preview() {
    let options = StudioOptions {
        auto_update: false,
        ..StudioOptions::default()
    };
    let mut runtime = Runtime::new(
        Studio::new(&options),
        FakeService::default(),
        HeadlessSurface::new().with_content_height(500),
        Box::new(MemoryStore::new()),
    );
    runtime.state.preview.last_html = "<p>cached</p>".into();

    runtime.dispatch(StudioEvent::ToggleLayout);
    assert_eq!(runtime.surface().html(), "<p>cached</p>");
    assert_eq!(runtime.surface().height(), None);

    runtime.step().await;
    assert_eq!(runtime.surface().height(), Some(520));

    runtime.dispatch(StudioEvent::ToggleLayout);
    assert_eq!(runtime.surface().height(), None);
}

#[tokio::test(start_paused = true)]
async fn test_sample_fetch_replaces_buffers() {
    let service = FakeService::default();
    let mut runtime = runtime_with(service, Box::new(MemoryStore::new()), false);
    runtime.dispatch(StudioEvent::SampleRequested);
    run_until(&mut runtime, |rt| {
        rt.state.buffers.xml.text().contains("SAXON-1")
    })
    .await;

    assert_eq!(runtime.state.xslt_version.as_str(), "3.0");
    assert_eq!(runtime.state.doc_info.invoice_id.as_deref(), Some("SAXON-1"));
    assert!(
        runtime
            .state
            .diagnostics
            .entries()
            .iter()
            .any(|d| d.message == "Loaded Saxon PEPPOL sample from server.")
    );
}

#[tokio::test(start_paused = true)]
async fn test_session_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");

    {
        let store = FileStore::open(&path).unwrap();
        let mut runtime = runtime_with(FakeService::default(), Box::new(store), false);
        runtime.dispatch(edit(SourceKind::Xml, "<a>kept</a>"));
        runtime.dispatch(StudioEvent::SetZoom(1.5));
        runtime.dispatch(StudioEvent::Generate);
        run_until(&mut runtime, |rt| rt.state.scheduler.last_applied_seq() == 1).await;
    }

    let store = FileStore::open(&path).unwrap();
    let mut runtime = Runtime::new(
        Studio::default(),
        FakeService::default(),
        HeadlessSurface::new(),
        Box::new(store),
    );
    runtime.restore();

    assert_eq!(runtime.state.buffers.xml.text(), "<a>kept</a>");
    assert_eq!(runtime.state.buffers.xslt.text(), XSLT);
    assert_eq!(runtime.state.preview.zoom.factor(), 1.5);
    assert!(!runtime.state.auto_update);
    assert_eq!(runtime.surface().html(), "<p><a>kept</a></p>");
    assert_eq!(runtime.surface().zoom().map(|z| z.factor()), Some(1.5));
    let messages: Vec<_> = runtime
        .state
        .diagnostics
        .entries()
        .iter()
        .map(|d| d.message.as_str())
        .collect();
    assert_eq!(
        messages,
        [
            "Restored last HTML preview from storage.",
            "Application initialized."
        ]
    );
    assert!(runtime.state.scheduler.is_pending());
}
