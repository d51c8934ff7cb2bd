// SPDX-License-Identifier: GPL-3.0-only

//! Registration form model

use crate::errors::{AppError, AppResult};
use crate::navigation::ScanStatus;
use crate::registry::BookRecord;
use tracing::debug;

/// Editable fields, in focus order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormField {
    #[default]
    Isbn,
    Title,
    Author,
}

impl FormField {
    pub const ALL: [FormField; 3] = [FormField::Isbn, FormField::Title, FormField::Author];

    pub fn label(&self) -> &'static str {
        match self {
            FormField::Isbn => "ISBN",
            FormField::Title => "Title",
            FormField::Author => "Author",
        }
    }

    pub fn next(self) -> Self {
        match self {
            FormField::Isbn => FormField::Title,
            FormField::Title => FormField::Author,
            FormField::Author => FormField::Isbn,
        }
    }

    pub fn previous(self) -> Self {
        match self {
            FormField::Isbn => FormField::Author,
            FormField::Title => FormField::Isbn,
            FormField::Author => FormField::Title,
        }
    }
}

/// State of the registration screen
#[derive(Debug, Clone, Default)]
pub struct RegistrationForm {
    pub isbn: String,
    pub title: String,
    pub author: String,
    focus: FormField,
    busy: bool,
}

impl RegistrationForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(&self, field: FormField) -> &str {
        match field {
            FormField::Isbn => &self.isbn,
            FormField::Title => &self.title,
            FormField::Author => &self.author,
        }
    }

    pub fn field_mut(&mut self, field: FormField) -> &mut String {
        match field {
            FormField::Isbn => &mut self.isbn,
            FormField::Title => &mut self.title,
            FormField::Author => &mut self.author,
        }
    }

    pub fn focus(&self) -> FormField {
        self.focus
    }

    pub fn set_focus(&mut self, field: FormField) {
        self.focus = field;
    }

    /// Waiting for the scanner to report back
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
    ///
    /// An empty slot changes nothing. Any other status ends the busy state;
    /// a successful scan also fills the ISBN field.
    pub fn resume(&mut self, status: ScanStatus) {
        match status {
            ScanStatus::Idle => {}
            ScanStatus::Requested => {
                debug!("Scan request abandoned");
                self.busy = false;
            }
            ScanStatus::Success(code) => {
                self.isbn = code;
                self.busy = false;
            }
        }
    }

    /// Build the record to register
    pub fn to_record(&self) -> AppResult<BookRecord> {
        let isbn = self.isbn.trim();
        if isbn.is_empty() {
            return Err(AppError::Other("ISBN is required".to_string()));
        }
        Ok(BookRecord::new(isbn, self.title.trim(), self.author.trim()))
    }

    /// Clear every field
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_result_fills_isbn() {
        let mut form = RegistrationForm::new();
        form.title = "The C Programming Language".into();
        assert!(form.begin_scan());
        assert!(!form.begin_scan());
        assert_eq!(form.scan_button_label(), "Please wait");

        form.resume(ScanStatus::Success("9780131103627".into()));
        assert_eq!(form.isbn, "9780131103627");
        assert_eq!(form.title, "The C Programming Language");
        assert!(!form.is_busy());
    }

    #[test]
    fn test_idle_slot_keeps_busy() {
        let mut form = RegistrationForm::new();
        form.begin_scan();
        form.resume(ScanStatus::Idle);
        assert!(form.is_busy());
        form.resume(ScanStatus::Requested);
        assert!(!form.is_busy());
        assert!(form.isbn.is_empty());
    }

    #[test]
    fn test_record_requires_isbn() {
        let mut form = RegistrationForm::new();
        assert!(form.to_record().is_err());
        form.field_mut(FormField::Isbn).push_str(" 9780131103627 ");
        assert_eq!(form.to_record().unwrap().isbn, "9780131103627");
        assert_eq!(FormField::Author.next(), FormField::Isbn);
    }
}
