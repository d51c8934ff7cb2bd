// SPDX-License-Identifier: GPL-3.0-only

//! In-memory book registry keyed by ISBN

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// A registered book
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookRecord {
    pub isbn: String,
    pub title: String,
    pub author: String,
}

impl BookRecord {
    pub fn new(
        isbn: impl Into<String>,
        title: impl Into<String>,
        author: impl Into<String>,
    ) -> Self {
        Self {
            isbn: isbn.into(),
            title: title.into(),
            author: author.into(),
        }
    }
}

/// ISBN → book store; lives for the process
#[derive(Debug, Default)]
pub struct BookRegistry {
    books: BTreeMap<String, BookRecord>,
}

impl BookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record, replacing any previous record with the same ISBN
    pub fn put(&mut self, record: BookRecord) -> Option<BookRecord> {
        debug!(isbn = %record.isbn, "Registering book");
        self.books.insert(record.isbn.clone(), record)
    }

    pub fn get(&self, isbn: &str) -> Option<&BookRecord> {
        self.books.get(isbn)
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    /// Records in ISBN order
    pub fn iter(&self) -> impl Iterator<Item = &BookRecord> {
        self.books.values()
    }
}
