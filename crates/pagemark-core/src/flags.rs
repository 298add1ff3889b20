// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Collaborator seams: feature toggles and localised watermark messages.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Runtime toggles consulted once per watermark call.
///
/// Implementations must be safe for concurrent reads.
pub trait FeatureFlags: Send + Sync {
    /// Pick text colours from the palette instead of flat dark gray.
    fn should_use_colors(&self) -> bool;
    /// Run the sharp text layer through the distortion filter.
    fn should_use_distortion(&self) -> bool;
}

/// Fixed flag values, typically deserialised from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticFeatureFlags {
    pub use_colors: bool,
    pub use_distortion: bool,
}

impl FeatureFlags for StaticFeatureFlags {
    fn should_use_colors(&self) -> bool {
        self.use_colors
    }

    fn should_use_distortion(&self) -> bool {
        self.use_distortion
    }
}

/// Resolves localised messages by key.
pub trait MessageProvider: Send + Sync {
    fn message(&self, key: &str, locale: &str) -> Option<String>;

    /// Look up `key`, falling back to `default` when nothing is configured.
    fn message_or(&self, key: &str, locale: &str, default: &str) -> String {
        self.message(key, locale)
            .unwrap_or_else(|| default.to_string())
    }
}

/// In-memory message table: locale -> key -> text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticMessages {
    messages: HashMap<String, HashMap<String, String>>,
}

impl StaticMessages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, locale: &str, key: &str, text: &str) -> Self {
        self.messages
            .entry(locale.to_string())
            .or_default()
            .insert(key.to_string(), text.to_string());
        self
    }
}

impl MessageProvider for StaticMessages {
    fn message(&self, key: &str, locale: &str) -> Option<String> {
        // Exact locale first, then its language ("fr-FR" -> "fr").
        let language = locale.split(['-', '_']).next().unwrap_or(locale);
        [locale, language]
            .into_iter()
            .find_map(|loc| self.messages.get(loc).and_then(|table| table.get(key)))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_flags_report_their_values() {
        let flags = StaticFeatureFlags {
            use_colors: true,
            use_distortion: false,
        };
        assert!(flags.should_use_colors());
        assert!(!flags.should_use_distortion());
    }

    #[test]
    fn messages_fall_back_to_language_then_default() {
        let messages = StaticMessages::new().with("fr", "tenant.pdf.watermark", "LOCATION");
        assert_eq!(
            messages.message("tenant.pdf.watermark", "fr-FR").as_deref(),
            Some("LOCATION")
        );
        assert_eq!(messages.message("tenant.pdf.watermark", "en"), None);
        assert_eq!(
            messages.message_or("tenant.pdf.watermark", "en", "fallback"),
            "fallback"
        );
    }
}
