// SPDX-License-Identifier: GPL-3.0-only

//! End-to-end flows: screens, navigation slots and the scanner together

mod common;

use bookscan::app::{App, HomeAction};
use bookscan::backends::camera::types::SensorRotation;
use bookscan::config::Config;
use bookscan::navigation::{Route, ScanStatus};
use bookscan::registry::BookRecord;
use bookscan::scanner::{ScanCommand, ScanExit, ScanOrchestrator, ScanState, spawn_scan_screen};
use common::{FakeBackend, ISBN_GOF, ISBN_KR, StillReply, label_frame};
use std::sync::Arc;

/// Run the scanner screen the app just opened: one capture, then whatever
/// the screen ends with
async fn scan_once(app: &mut App, backend: &Arc<FakeBackend>) -> ScanExit {
    assert_eq!(app.route(), Route::Scanner);
    let orchestrator =
        ScanOrchestrator::from_config(backend.clone(), &Config::default(), app.scan_symbologies());
    let handle = spawn_scan_screen(orchestrator);

    let mut view = handle.watch();
    view.wait_for(|v| v.state == ScanState::Ready).await.unwrap();
    handle.send(ScanCommand::Capture);
    view.wait_for(|v| v.notice_seq > 0).await.unwrap();

    // A failed attempt leaves the screen open; the user backs out
    handle.send(ScanCommand::Dismiss);
    let exit = handle.finished().await;
    app.finish_scan(&exit);
    exit
}

fn kr_record() -> BookRecord {
    BookRecord::new(
        ISBN_KR,
        "The C Programming Language",
        "Kernighan & Ritchie",
    )
}

#[test]
fn test_manual_registration() {
    let mut app = App::new();
    app.open(HomeAction::Register);
    let form = app.registration_mut();
    form.isbn = ISBN_KR.into();
    form.title = "The C Programming Language".into();
    form.author = "Kernighan & Ritchie".into();
    app.register().unwrap();

    assert_eq!(app.route(), Route::Home);
    assert_eq!(app.registry().get(ISBN_KR), Some(&kr_record()));
}

#[tokio::test]
async fn test_register_by_scanning() {
    let backend = FakeBackend::phone(StillReply::Frame(label_frame(
        ISBN_KR,
        SensorRotation::Rotate90,
    )));
    let mut app = App::new();
    app.open(HomeAction::Register);
    app.registration_mut().title = "The C Programming Language".into();
    assert!(app.request_scan());
    assert_eq!(app.registration().scan_button_label(), "Please wait");

    let exit = scan_once(&mut app, &backend).await;
    assert!(matches!(exit, ScanExit::Scanned(_)));
    assert_eq!(app.route(), Route::Registration);
    assert_eq!(app.registration().isbn, ISBN_KR);
    assert_eq!(app.registration().title, "The C Programming Language");
    assert!(!app.registration().is_busy());

    app.registration_mut().author = "Kernighan & Ritchie".into();
    app.register().unwrap();
    assert_eq!(app.registry().get(ISBN_KR), Some(&kr_record()));
    assert_eq!(backend.claims(), 0);
}

#[tokio::test]
async fn test_identify_registered_book() {
    let backend = FakeBackend::phone(StillReply::Frame(label_frame(
        ISBN_KR,
        SensorRotation::None,
    )));
    let mut registry = bookscan::registry::BookRegistry::new();
    registry.put(kr_record());
    let mut app = App::with_registry(registry);

    app.open(HomeAction::Identify);
    app.request_scan();
    scan_once(&mut app, &backend).await;

    assert_eq!(app.route(), Route::Identify);
    assert_eq!(
        app.identify_lines(),
        vec![
            "ISBN: 9780131103627",
            "Title: The C Programming Language",
            "Author: Kernighan & Ritchie",
        ]
    );
}

#[tokio::test]
async fn test_identify_unregistered_book() {
    let backend = FakeBackend::phone(StillReply::Frame(label_frame(
        ISBN_GOF,
        SensorRotation::Rotate180,
    )));
    let mut app = App::new();
    app.open(HomeAction::Identify);
    app.request_scan();
    scan_once(&mut app, &backend).await;

    assert_eq!(app.identify_lines(), vec!["ISBN: 9780201633610", "No Matches"]);
    assert!(!app.identify().is_busy());
}

#[tokio::test]
async fn test_capture_error_mid_flow_delivers_nothing() {
    let backend = FakeBackend::phone(StillReply::Fail("sensor fault".into()));
    let mut app = App::new();
    app.open(HomeAction::Identify);
    app.request_scan();
    assert_eq!(app.navigator().depth(), 3);

    let exit = scan_once(&mut app, &backend).await;
    assert_eq!(exit, ScanExit::Dismissed);
    assert_eq!(app.route(), Route::Identify);
    assert_eq!(app.navigator().scan_status(), ScanStatus::Idle);
    assert_eq!(app.identify().scanned_isbn(), "");
    assert!(!app.identify().is_busy());
    assert_eq!(backend.claims(), 0);
}

#[test]
fn test_stale_scan_result_is_dropped() {
    let mut app = App::new();
    app.open(HomeAction::Identify);
    app.request_scan();

    // The scanner closes without a result, then a late result arrives
    app.finish_scan(&ScanExit::Dismissed);
    app.finish_scan(&ScanExit::Scanned(bookscan::DecodedCode {
        value: ISBN_KR.to_string(),
        symbology: bookscan::Symbology::Ean13,
    }));
    assert_eq!(app.route(), Route::Identify);
    assert_eq!(app.identify().scanned_isbn(), "");
}
