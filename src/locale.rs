//! Locales the droid speaks: wake keyword mapping, service tags, voices.

use serde::{Deserialize, Serialize};

/// Spoken locales supported by the droid.
///
/// The locale of a dialogue session is selected by which wake phrase fired:
/// keyword index 0 maps to English, index 1 to Finnish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    /// English (recognized as en-US, spoken with a British voice).
    #[default]
    English,
    /// Finnish.
    Finnish,
}

impl Locale {
    /// Map a wake keyword index to the locale of the following session.
    ///
    /// Unknown indices fall back to English.
    #[must_use]
    pub fn from_keyword_index(index: usize) -> Self {
        match index {
            1 => Self::Finnish,
            _ => Self::English,
        }
    }

    /// BCP-47 tag sent to the speech recognizer.
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::English => "en-US",
            Self::Finnish => "fi-FI",
        }
    }

    /// Language code carried in the synthesis markup envelope.
    #[must_use]
    pub fn voice_lang(self) -> &'static str {
        match self {
            Self::English => "en-GB",
            Self::Finnish => "fi-FI",
        }
    }

    /// Fixed synthetic voice used for this locale.
    #[must_use]
    pub fn voice(self) -> &'static str {
        match self {
            Self::English => "en-GB-ThomasNeural",
            Self::Finnish => "fi-FI-HarriNeural",
        }
    }

    /// The summary marker this locale's replies carry.
    ///
    /// Marker *selection* when splitting a reply is not locale-driven; see
    /// [`crate::response::split_summary`] for the fixed precedence rule.
    #[must_use]
    pub fn summary_marker(self) -> &'static str {
        match self {
            Self::English => "Summary: ",
            Self::Finnish => "Yhteenveto: ",
        }
    }
}
