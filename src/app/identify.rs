// SPDX-License-Identifier: GPL-3.0-only

//! Identify screen model

use crate::navigation::ScanStatus;
use crate::registry::BookRegistry;

/// State of the identify screen
#[derive(Debug, Clone, Default)]
pub struct IdentifyView {
    scanned_isbn: String,
    busy: bool,
}

impl IdentifyView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scanned_isbn(&self) -> &str {
        &self.scanned_isbn
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn scan_button_label(&self) -> &'static str {
        if self.busy { "Please wait" } else { "Scan" }
    }

    /// Enter the busy state for a scan request; `false` if already busy
    pub fn begin_scan(&mut self) -> bool {
        if self.busy {
            return false;
        }
        self.busy = true;
        true
    }

    /// Apply the status taken from the navigation slot
    pub fn resume(&mut self, status: ScanStatus) {
        match status {
            ScanStatus::Idle => {}
            ScanStatus::Requested => self.busy = false,
            ScanStatus::Success(code) => {
                self.scanned_isbn = code;
                self.busy = false;
            }
        }
    }

    /// Text lines describing the scanned book
    pub fn lines(&self, registry: &BookRegistry) -> Vec<String> {
        match registry.get(&self.scanned_isbn) {
            Some(book) => vec![
                format!("ISBN: {}", book.isbn),
                format!("Title: {}", book.title),
                format!("Author: {}", book.author),
            ],
            None => vec![
                format!("ISBN: {}", self.scanned_isbn),
                "No Matches".to_string(),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::BookRecord;

    #[test]
    fn test_lines_for_known_and_unknown_books() {
        let mut registry = BookRegistry::new();
        registry.put(BookRecord::new(
            "9780131103627",
            "The C Programming Language",
            "Kernighan & Ritchie",
        ));

        let mut view = IdentifyView::new();
        assert_eq!(view.lines(&registry), vec!["ISBN: ", "No Matches"]);

        view.begin_scan();
        view.resume(ScanStatus::Success("9780131103627".into()));
        assert!(!view.is_busy());
        assert_eq!(
            view.lines(&registry),
            vec![
                "ISBN: 9780131103627",
                "Title: The C Programming Language",
                "Author: Kernighan & Ritchie",
            ]
        );

        view.resume(ScanStatus::Success("9780201633610".into()));
        assert_eq!(
            view.lines(&registry),
            vec!["ISBN: 9780201633610", "No Matches"]
        );
    }
}
