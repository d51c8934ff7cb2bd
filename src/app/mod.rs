// SPDX-License-Identifier: MPL-2.0

//! Application model
//!
//! Front-end independent state of the book utility: the navigation stack,
//! the registry and the per-screen models. Front-ends translate input into
//! calls on [`App`] and render from its accessors.
//!
//! - `home`: Home menu entries
//! - `registration`: Registration form (ISBN, title, author)
//! - `identify`: Identify screen (scan and look up)

mod home;
mod identify;
mod registration;

pub use home::HomeAction;
pub use identify::IdentifyView;
pub use registration::{FormField, RegistrationForm};

use crate::barcode::SymbologySet;
use crate::errors::AppResult;
use crate::navigation::{Navigator, Route};
use crate::registry::{BookRecord, BookRegistry};
use crate::scanner::ScanExit;
use tracing::{debug, info};

/// Main application state
#[derive(Debug, Default)]
pub struct App {
    navigator: Navigator,
    registry: BookRegistry,
    registration: RegistrationForm,
    identify: IdentifyView,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(registry: BookRegistry) -> Self {
        Self {
            registry,
            ..Self::default()
        }
    }

    pub fn route(&self) -> Route {
        self.navigator.current()
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn registry(&self) -> &BookRegistry {
        &self.registry
    }

    pub fn registration(&self) -> &RegistrationForm {
        &self.registration
    }

    pub fn registration_mut(&mut self) -> &mut RegistrationForm {
        &mut self.registration
    }

    pub fn identify(&self) -> &IdentifyView {
        &self.identify
    }

    /// Symbologies the scanner looks for in this application
    pub fn scan_symbologies(&self) -> SymbologySet {
        SymbologySet::product_code()
    }

    /// Open a screen from the home menu with a fresh model
    pub fn open(&mut self, action: HomeAction) {
        match action {
            HomeAction::Register => self.registration.reset(),
            HomeAction::Identify => self.identify = IdentifyView::new(),
        }
        self.navigator.push(action.route());
    }

    /// Leave the current screen; `false` on the home screen
    pub fn back(&mut self) -> bool {
        if self.navigator.pop().is_none() {
            return false;
        }
        self.resume();
        true
    }

    /// Ask for a barcode on behalf of the current screen
    ///
    /// Returns `true` when the scanner screen was opened.
    pub fn request_scan(&mut self) -> bool {
        let started = match self.navigator.current() {
            Route::Registration => self.registration.begin_scan(),
            Route::Identify => self.identify.begin_scan(),
            other => {
                debug!(route = %other, "Scanning is not offered here");
                false
            }
        };
        if !started {
            return false;
        }
        self.navigator.request_scan()
    }

    /// The scanner screen finished; return to the requesting screen
    pub fn finish_scan(&mut self, exit: &ScanExit) {
        if self.navigator.current() != Route::Scanner {
            debug!("Scanner exit without an open scanner");
            return;
        }
        if let ScanExit::Scanned(code) = exit {
            self.navigator.deliver_scan_result(code.value.clone());
        }
        self.navigator.pop();
        self.resume();
    }

    /// Consume the current screen's scan slot
    fn resume(&mut self) {
        let status = self.navigator.take_scan_status();
        match self.navigator.current() {
            Route::Registration => self.registration.resume(status),
            Route::Identify => self.identify.resume(status),
            Route::Home | Route::Scanner => {}
        }
    }

    /// Register the book in the form and return to the home screen
    pub fn register(&mut self) -> AppResult<BookRecord> {
        let record = self.registration.to_record()?;
        info!(isbn = %record.isbn, title = %record.title, "Book registered");
        self.registry.put(record.clone());
        self.registration.reset();
        self.navigator.pop_to_root();
        Ok(record)
    }

    /// Lines shown on the identify screen
    pub fn identify_lines(&self) -> Vec<String> {
        self.identify.lines(&self.registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::barcode::{DecodedCode, Symbology};

    fn scanned(code: &str) -> ScanExit {
        ScanExit::Scanned(DecodedCode {
            value: code.to_string(),
            symbology: Symbology::Ean13,
        })
    }

    #[test]
    fn test_register_manually() {
        let mut app = App::new();
        app.open(HomeAction::Register);
        let form = app.registration_mut();
        form.isbn = "9780131103627".into();
        form.title = "The C Programming Language".into();
        form.author = "Kernighan & Ritchie".into();

        let record = app.register().unwrap();
        assert_eq!(record.title, "The C Programming Language");
        assert_eq!(app.route(), Route::Home);
        assert_eq!(app.registry().get("9780131103627"), Some(&record));
    }

    #[test]
    fn test_scan_into_registration() {
        let mut app = App::new();
        app.open(HomeAction::Register);
        assert!(app.request_scan());
        assert_eq!(app.route(), Route::Scanner);
        assert!(app.registration().is_busy());

        app.finish_scan(&scanned("9780131103627"));
        assert_eq!(app.route(), Route::Registration);
        assert_eq!(app.registration().isbn, "9780131103627");
        assert!(!app.registration().is_busy());
    }

    #[test]
    fn test_dismissed_scan_clears_busy() {
        let mut app = App::new();
        app.open(HomeAction::Identify);
        app.request_scan();
        app.finish_scan(&ScanExit::Dismissed);

        assert_eq!(app.route(), Route::Identify);
        assert!(!app.identify().is_busy());
        assert_eq!(app.identify().scanned_isbn(), "");
        assert_eq!(app.navigator().scan_status(), crate::navigation::ScanStatus::Idle);
    }

    #[test]
    fn test_no_scan_from_home() {
        let mut app = App::new();
        assert!(!app.request_scan());
        assert!(!app.back());
    }
}
