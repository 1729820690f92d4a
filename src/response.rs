//! Splitting a raw model reply into the spoken answer and its summary.
//!
//! The reasoning service embeds a short summary at the end of each reply
//! behind a locale-tagged marker. The spoken part is everything before the
//! marker; the status screen shows the part after it.

use crate::locale::Locale;

/// Sentinel summary used when a reply carries no marker.
pub const NO_SUMMARY: &str = "-";

/// A model reply split into its spoken answer and summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Text to hand to the synthesizer.
    pub spoken: String,
    /// Short summary for the status screen, or [`NO_SUMMARY`].
    pub summary: String,
}

/// Split `raw` at the first summary marker.
///
/// Marker precedence is fixed, not locale-selected: the English marker is
/// checked first regardless of `locale`, and the Finnish marker only if the
/// English one is absent. When a marker is present,
/// `spoken + marker + summary` reassembles `raw` exactly. With no marker the
/// whole reply is spoken and the summary is [`NO_SUMMARY`].
#[must_use]
pub fn split_summary(raw: &str, _locale: Locale) -> Reply {
    for marker in [
        Locale::English.summary_marker(),
        Locale::Finnish.summary_marker(),
    ] {
        if let Some(pos) = raw.find(marker) {
            return Reply {
                spoken: raw[..pos].to_owned(),
                summary: raw[pos + marker.len()..].to_owned(),
            };
        }
    }

    Reply {
        spoken: raw.to_owned(),
        summary: NO_SUMMARY.to_owned(),
    }
}
