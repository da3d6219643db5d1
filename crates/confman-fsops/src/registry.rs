//! Static table of the config kinds the store knows how to place.

use confman_config::ManagedRoot;

/// Ticker interval applied to process configs that do not set one.
pub const DEFAULT_TICKER_INTERVAL: u32 = 15;

/// Category suffixes recognised on plugin type names.
const CATEGORY_SUFFIXES: [&str; 6] = ["Input", "Decoder", "Filter", "Encoder", "Output", "Splitter"];

/// Whether a kind is driven by a ticker interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickerRule {
    /// No ticker; files live directly under the root.
    None,
    /// Files are nested under `<root>/<seconds>`.
    Interval {
        /// Interval used when the section omits `ticker_interval`.
        default: u32,
    },
}

impl TickerRule {
    /// Whether records for this kind carry a `Ticker` field.
    #[must_use]
    pub const fn is_interval(self) -> bool {
        matches!(self, Self::Interval { .. })
    }
}

/// One placeable config kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigKind {
    /// Declared type name.
    pub type_name: &'static str,
    /// Plugin category.
    pub category: &'static str,
    /// Root the kind is stored under.
    pub root: ManagedRoot,
    /// Ticker behaviour.
    pub ticker: TickerRule,
}

/// Every kind with a managed root.
pub const KINDS: [ConfigKind; 4] = [
    ConfigKind {
        type_name: "ProcessInput",
        category: "Input",
        root: ManagedRoot::Process,
        ticker: TickerRule::Interval {
            default: DEFAULT_TICKER_INTERVAL,
        },
    },
    ConfigKind {
        type_name: "LogstreamerInput",
        category: "Input",
        root: ManagedRoot::Logstreamer,
        ticker: TickerRule::None,
    },
    ConfigKind {
        type_name: "HttpInput",
        category: "Input",
        root: ManagedRoot::Http,
        ticker: TickerRule::None,
    },
    ConfigKind {
        type_name: "FilePollingInput",
        category: "Input",
        root: ManagedRoot::FilePolling,
        ticker: TickerRule::None,
    },
];

/// Kind registered for `type_name`.
#[must_use]
pub fn lookup(type_name: &str) -> Option<&'static ConfigKind> {
    KINDS.iter().find(|kind| kind.type_name == type_name)
}

/// Kind stored under `root`.
#[must_use]
pub fn for_root(root: ManagedRoot) -> &'static ConfigKind {
    match root {
        ManagedRoot::Process => &KINDS[0],
        ManagedRoot::Logstreamer => &KINDS[1],
        ManagedRoot::Http => &KINDS[2],
        ManagedRoot::FilePolling => &KINDS[3],
    }
}

/// Category for any type name: registry first, then the name suffix.
///
/// Returns an empty string when neither applies.
#[must_use]
pub fn category_for(type_name: &str) -> &'static str {
    if let Some(kind) = lookup(type_name) {
        return kind.category;
    }
    CATEGORY_SUFFIXES
        .iter()
        .find(|suffix| type_name.len() > suffix.len() && type_name.ends_with(*suffix))
        .copied()
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_maps_roots_both_ways() {
        for root in ManagedRoot::ALL {
            let kind = for_root(root);
            assert_eq!(kind.root, root);
            assert_eq!(lookup(kind.type_name), Some(kind));
        }
        assert!(lookup("TcpInput").is_none());
    }

    #[test]
    fn only_process_input_is_interval_driven() {
        let interval: Vec<&str> = KINDS
            .iter()
            .filter(|kind| kind.ticker.is_interval())
            .map(|kind| kind.type_name)
            .collect();
        assert_eq!(interval, vec!["ProcessInput"]);
    }

    #[test]
    fn category_falls_back_to_suffix() {
        assert_eq!(category_for("HttpInput"), "Input");
        assert_eq!(category_for("PayloadRegexDecoder"), "Decoder");
        assert_eq!(category_for("ElasticSearchOutput"), "Output");
        assert_eq!(category_for("Output"), "");
        assert_eq!(category_for("mystery"), "");
    }
}
