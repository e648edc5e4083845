use std::time::Duration;

use folioview::notification::NotificationLevel;
use folioview::test_utils::{
    LETTER_HEIGHT, ScriptedDocument, ScriptedPage, ScriptedProvider, test_config,
};
use folioview::viewer::{Command, Viewer, ViewerError, ViewerEvent};

const DOC: &[u8] = b"%PDF-navigation";
const WAIT: Duration = Duration::from_secs(5);

fn fit_scale() -> f32 {
    660.0 / LETTER_HEIGHT
}

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-4
}

fn loaded(document: ScriptedDocument) -> Viewer {
    let provider = ScriptedProvider::new().with_document(DOC, document);
    let mut viewer = Viewer::spawn(provider, test_config()).unwrap();
    viewer.load_document(DOC.to_vec());
    assert!(viewer.wait_idle(WAIT).0);
    viewer
}

fn count_level(viewer: &Viewer, level: NotificationLevel) -> usize {
    viewer.notifications().with_level(level).count()
}

#[test]
fn load_fits_first_page_to_window() {
    let viewer = loaded(ScriptedDocument::letter_pages(3));

    assert!(viewer.state().is_ready());
    assert_eq!(viewer.page_count(), 3);
    assert_eq!(viewer.current_page(), 1);
    assert!(viewer.auto_fit());
    assert!(approx(viewer.scale(), fit_scale()));

    let painted = viewer.painted().unwrap();
    assert_eq!(painted.page, 1);
    assert!(approx(painted.scale, fit_scale()));
    assert!(viewer.surface().height().abs_diff(660) <= 1);
}

#[test]
fn navigation_and_zoom_repaint_only_on_change() {
    let mut viewer = loaded(ScriptedDocument::letter_pages(3));
    assert_eq!(viewer.presented_frames(), 1);

    viewer.apply_command(Command::ZoomIn);
    assert!(viewer.wait_idle(WAIT).0);
    assert!(!viewer.auto_fit());
    assert!(approx(viewer.scale(), fit_scale() * 1.25));
    assert_eq!(viewer.presented_frames(), 2);

    viewer.apply_command(Command::NextPage);
    assert!(viewer.wait_idle(WAIT).0);
    assert_eq!(viewer.painted().unwrap().page, 2);

    viewer.apply_command(Command::LastPage);
    assert!(viewer.wait_idle(WAIT).0);
    assert_eq!(viewer.current_page(), 3);
    assert_eq!(viewer.presented_frames(), 4);

    // Past the end and the page already shown are no-ops
    viewer.apply_command(Command::NextPage);
    viewer.apply_command(Command::GoToPage(3));
    viewer.apply_command(Command::GoToPage(0));
    assert!(viewer.wait_idle(WAIT).0);
    assert_eq!(viewer.current_page(), 3);
    assert_eq!(viewer.presented_frames(), 4);

    viewer.apply_command(Command::ResetZoom);
    assert!(viewer.wait_idle(WAIT).0);
    assert_eq!(viewer.painted().unwrap().scale, 1.0);
    assert_eq!(viewer.surface().height(), 792);

    viewer.apply_command(Command::FitToHeight);
    assert!(viewer.wait_idle(WAIT).0);
    assert!(viewer.auto_fit());
    assert!(approx(viewer.painted().unwrap().scale, fit_scale()));
    assert_eq!(viewer.presented_frames(), 6);
}

#[test]
fn zoom_is_clamped_to_policy_bounds() {
    let mut viewer = loaded(ScriptedDocument::letter_pages(1));

    for _ in 0..20 {
        viewer.apply_command(Command::ZoomOut);
    }
    assert!(viewer.wait_idle(WAIT).0);
    assert_eq!(viewer.scale(), 0.25);

    viewer.apply_command(Command::SetScale(50.0));
    assert!(viewer.wait_idle(WAIT).0);
    assert_eq!(viewer.scale(), 5.0);
    assert_eq!(viewer.painted().unwrap().scale, 5.0);
}

#[test]
fn resize_refits_while_auto_fit_is_on() {
    let mut viewer = loaded(ScriptedDocument::letter_pages(2));

    // 516 - 120 reserved = 396 = half a letter page
    viewer.resize(800.0, 516.0);
    assert!(viewer.wait_idle(WAIT).0);
    assert_eq!(viewer.scale(), 0.5);
    assert_eq!(viewer.surface().height(), 396);
    assert_eq!(viewer.surface().width(), 306);

    viewer.apply_command(Command::SetScale(1.0));
    assert!(viewer.wait_idle(WAIT).0);
    let frames = viewer.presented_frames();
    viewer.resize(800.0, 900.0);
    assert!(viewer.wait_idle(WAIT).0);
    assert_eq!(viewer.scale(), 1.0);
    assert_eq!(viewer.presented_frames(), frames);
}

#[test]
fn empty_document_stays_idle_with_warning() {
    let mut viewer = loaded(ScriptedDocument::new(vec![]));

    assert!(!viewer.state().is_ready());
    assert_eq!(viewer.page_count(), 0);
    assert!(viewer.painted().is_none());
    assert!(viewer.surface().is_blank());
    assert_eq!(count_level(&viewer, NotificationLevel::Warning), 1);

    viewer.apply_command(Command::NextPage);
    viewer.apply_command(Command::ZoomIn);
    assert!(viewer.is_idle());
    assert!(!viewer.is_busy());
    assert_eq!(viewer.presented_frames(), 0);
}

#[test]
fn unreadable_document_reports_load_error() {
    let mut viewer = Viewer::spawn(ScriptedProvider::new(), test_config()).unwrap();
    viewer.load_document(b"not a document".to_vec());
    let (idle, events) = viewer.wait_idle(WAIT);

    assert!(idle);
    assert!(
        events
            .iter()
            .any(|e| matches!(e, ViewerEvent::Failed(ViewerError::Load(_))))
    );
    assert!(!viewer.state().is_ready());
    assert!(!viewer.is_loading());
    assert!(viewer.painted().is_none());
    assert_eq!(count_level(&viewer, NotificationLevel::Error), 1);
}

#[test]
fn only_the_latest_load_is_applied() {
    let provider = ScriptedProvider::new()
        .with_document(b"first", ScriptedDocument::letter_pages(2))
        .with_document(b"second", ScriptedDocument::letter_pages(5));
    let counts = provider.counts();
    let mut viewer = Viewer::spawn(provider, test_config()).unwrap();

    viewer.load_document(b"first".to_vec());
    viewer.load_document(b"second".to_vec());
    let (idle, events) = viewer.wait_idle(WAIT);

    assert!(idle);
    assert_eq!(counts.opens(), 2);
    assert_eq!(viewer.page_count(), 5);
    let loads: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, ViewerEvent::DocumentLoaded { .. }))
        .collect();
    assert_eq!(loads, vec![&ViewerEvent::DocumentLoaded { page_count: 5 }]);
}

#[test]
fn failed_page_fetch_keeps_previous_frame() {
    let pages = vec![
        ScriptedPage::letter().with_color([200, 0, 0, 255]),
        ScriptedPage::letter().failing_fetch(),
    ];
    let mut viewer = loaded(ScriptedDocument::new(pages));
    assert_eq!(viewer.surface().pixel(0, 0), Some([200, 0, 0, 255]));

    viewer.apply_command(Command::GoToPage(2));
    let (idle, events) = viewer.wait_idle(WAIT);

    assert!(idle);
    assert!(events.iter().any(|e| matches!(
        e,
        ViewerEvent::Failed(ViewerError::PageFetch { page: 2, .. })
    )));
    assert_eq!(viewer.current_page(), 2);
    assert_eq!(viewer.painted().unwrap().page, 1);
    assert_eq!(viewer.surface().pixel(0, 0), Some([200, 0, 0, 255]));
    assert!(!viewer.is_busy());
    assert_eq!(count_level(&viewer, NotificationLevel::Error), 1);
}

#[test]
fn failed_rasterization_is_reported() {
    let pages = vec![ScriptedPage::letter(), ScriptedPage::letter().failing_render()];
    let mut viewer = loaded(ScriptedDocument::new(pages));
    viewer.apply_command(Command::SetScale(1.0));
    viewer.apply_command(Command::NextPage);
    let (idle, events) = viewer.wait_idle(WAIT);

    assert!(idle);
    assert!(events.iter().any(|e| matches!(
        e,
        ViewerEvent::Failed(ViewerError::Render { page: 2, .. })
    )));
    assert_eq!(viewer.painted().unwrap().page, 1);
    assert!(!viewer.is_busy());
}

#[test]
fn text_content_failure_is_reported_once() {
    let mut viewer = loaded(ScriptedDocument::new(vec![
        ScriptedPage::letter().failing_text(),
    ]));

    assert_eq!(viewer.painted().unwrap().page, 1);
    assert!(viewer.text_layer().is_empty());
    assert_eq!(count_level(&viewer, NotificationLevel::Warning), 1);
    assert_eq!(count_level(&viewer, NotificationLevel::Error), 0);

    let events = viewer.poll();
    assert!(events.is_empty());
    assert_eq!(count_level(&viewer, NotificationLevel::Warning), 1);
}
