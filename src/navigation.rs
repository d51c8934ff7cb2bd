// SPDX-License-Identifier: GPL-3.0-only

//! Screen back stack with per-entry scan result slots
//!
//! A screen that wants a barcode writes `Requested` into its own slot and
//! pushes the scanner. The scanner delivers its result into the slot of the
//! entry below it, and only if that slot still holds `Requested`. When the
//! requesting screen becomes current again it takes (reads and clears) its
//! slot, so every result is consumed at most once.

use tracing::{debug, warn};

/// Screens of the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Home,
    Registration,
    Identify,
    Scanner,
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Route::Home => write!(f, "Home"),
            Route::Registration => write!(f, "Registration"),
            Route::Identify => write!(f, "Identify ISBN"),
            Route::Scanner => write!(f, "Scanner"),
        }
    }
}

/// Contents of a scan result slot
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ScanStatus {
    /// Nothing pending (also what an empty slot reads as)
    #[default]
    Idle,
    /// A scan was requested and has not reported back
    Requested,
    Success(String),
}

#[derive(Debug)]
struct Entry {
    route: Route,
    scan_slot: Option<ScanStatus>,
}

impl Entry {
    fn new(route: Route) -> Self {
        Self {
            route,
            scan_slot: None,
        }
    }
}

/// Back stack of routes; the root is always Home
#[derive(Debug)]
pub struct Navigator {
    stack: Vec<Entry>,
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator {
    pub fn new() -> Self {
        Self {
            stack: vec![Entry::new(Route::Home)],
        }
    }

    pub fn current(&self) -> Route {
        self.stack.last().map(|e| e.route).unwrap_or(Route::Home)
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn push(&mut self, route: Route) {
        debug!(route = %route, depth = self.stack.len() + 1, "Navigate");
        self.stack.push(Entry::new(route));
    }

    /// Go back one screen; the root cannot be popped
    pub fn pop(&mut self) -> Option<Route> {
        if self.stack.len() <= 1 {
            return None;
        }
        let popped = self.stack.pop().map(|e| e.route);
        debug!(route = ?popped, current = %self.current(), "Navigate back");
        popped
    }

    /// Drop everything above the root
    pub fn pop_to_root(&mut self) {
        self.stack.truncate(1);
        debug!("Navigate to root");
    }

    /// Mark the current screen as waiting for a scan and open the scanner
    ///
    /// Returns `false` (and does nothing) when the scanner is already open.
    pub fn request_scan(&mut self) -> bool {
        let Some(entry) = self.stack.last_mut() else {
            return false;
        };
        if entry.route == Route::Scanner {
            warn!("Scan requested from the scanner itself");
            return false;
        }
        entry.scan_slot = Some(ScanStatus::Requested);
        self.push(Route::Scanner);
        true
    }

    /// Hand a scanned code to the screen that requested it
    ///
    /// Dropped (returns `false`) unless the scanner is current and the entry
    /// below it is still waiting.
    pub fn deliver_scan_result(&mut self, code: impl Into<String>) -> bool {
        let len = self.stack.len();
        if len < 2 || self.stack[len - 1].route != Route::Scanner {
            warn!("Scan result delivered while the scanner is not open");
            return false;
        }

        let requester = &mut self.stack[len - 2];
        if requester.scan_slot != Some(ScanStatus::Requested) {
            debug!(route = %requester.route, "Dropping stale scan result");
            return false;
        }
        requester.scan_slot = Some(ScanStatus::Success(code.into()));
        true
    }

    /// Read and clear the current screen's slot
    pub fn take_scan_status(&mut self) -> ScanStatus {
        self.stack
            .last_mut()
            .and_then(|e| e.scan_slot.take())
            .unwrap_or_default()
    }

    /// Read the current screen's slot without clearing it
    pub fn scan_status(&self) -> ScanStatus {
        self.stack
            .last()
            .and_then(|e| e.scan_slot.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_reaches_requester_once() {
        let mut nav = Navigator::new();
        nav.push(Route::Identify);
        assert!(nav.request_scan());
        assert_eq!(nav.current(), Route::Scanner);

        assert!(nav.deliver_scan_result("9780131103627"));
        // A second result for the same request is stale
        assert!(!nav.deliver_scan_result("9780000000002"));
        nav.pop();

        assert_eq!(
            nav.take_scan_status(),
            ScanStatus::Success("9780131103627".into())
        );
        assert_eq!(nav.take_scan_status(), ScanStatus::Idle);
    }

    #[test]
    fn test_abandoned_request_reads_requested() {
        let mut nav = Navigator::new();
        nav.push(Route::Registration);
        nav.request_scan();
        nav.pop();

        assert_eq!(nav.scan_status(), ScanStatus::Requested);
        assert_eq!(nav.take_scan_status(), ScanStatus::Requested);
        assert_eq!(nav.scan_status(), ScanStatus::Idle);
    }

    #[test]
    fn test_root_is_never_popped() {
        let mut nav = Navigator::new();
        assert_eq!(nav.pop(), None);
        nav.push(Route::Registration);
        nav.push(Route::Scanner);
        nav.pop_to_root();
        assert_eq!(nav.current(), Route::Home);
        assert_eq!(nav.depth(), 1);
    }

    #[test]
    fn test_result_without_scanner_is_dropped() {
        let mut nav = Navigator::new();
        nav.push(Route::Identify);
        assert!(!nav.deliver_scan_result("9780131103627"));
        assert_eq!(nav.take_scan_status(), ScanStatus::Idle);
    }
}
