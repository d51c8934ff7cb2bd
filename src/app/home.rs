// SPDX-License-Identifier: GPL-3.0-only

//! Home screen menu

use crate::navigation::Route;

/// Entries of the home menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomeAction {
    Register,
    Identify,
}

impl HomeAction {
    /// Get all actions in menu order
    pub const ALL: [HomeAction; 2] = [HomeAction::Register, HomeAction::Identify];

    pub fn label(&self) -> &'static str {
        match self {
            HomeAction::Register => "Register",
            HomeAction::Identify => "Identify ISBN",
        }
    }

    pub fn route(&self) -> Route {
        match self {
            HomeAction::Register => Route::Registration,
            HomeAction::Identify => Route::Identify,
        }
    }
}
