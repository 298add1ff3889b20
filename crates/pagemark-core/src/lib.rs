// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pagemark — Core types, configuration and error definitions shared across crates.

pub mod config;
pub mod error;
pub mod flags;
pub mod types;

pub use config::RenderParameters;
pub use error::{PagemarkError, Result, Stage};
pub use flags::{FeatureFlags, MessageProvider, StaticFeatureFlags, StaticMessages};
pub use types::*;
