//! Decoding config text into ordered, named sections.
//!
//! A config document is a table of tables. Each top-level table is one plugin
//! section; its declared type is the `type` key, falling back to the section
//! name. Declaration order is preserved.

use toml::{Table, Value};

use crate::error::{FsOpsError, FsOpsResult};
use crate::registry::{self, ConfigKind, TickerRule};

const TYPE_KEY: &str = "type";
const TICKER_KEY: &str = "ticker_interval";

/// One named plugin section.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    name: String,
    config_type: String,
    table: Table,
}

impl Section {
    /// Section name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared plugin type.
    #[must_use]
    pub fn config_type(&self) -> &str {
        &self.config_type
    }

    /// Raw key/value table.
    #[must_use]
    pub const fn table(&self) -> &Table {
        &self.table
    }

    /// Registered kind for the declared type.
    #[must_use]
    pub fn kind(&self) -> Option<&'static ConfigKind> {
        registry::lookup(&self.config_type)
    }

    /// Category of the declared type.
    #[must_use]
    pub fn category(&self) -> &'static str {
        registry::category_for(&self.config_type)
    }

    /// Ticker interval under `rule`; `None` for kinds without a ticker.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::Validation`] if `ticker_interval` is not a
    /// non-negative integer that fits in `u32`.
    pub fn ticker(&self, rule: TickerRule) -> FsOpsResult<Option<u32>> {
        let TickerRule::Interval { default } = rule else {
            return Ok(None);
        };
        match self.table.get(TICKER_KEY) {
            None => Ok(Some(default)),
            Some(Value::Integer(seconds)) => u32::try_from(*seconds).map(Some).map_err(|_| {
                FsOpsError::validation(TICKER_KEY, "out_of_range", Some(seconds.to_string()))
            }),
            Some(other) => Err(FsOpsError::validation(
                TICKER_KEY,
                "not_an_integer",
                Some(other.to_string()),
            )),
        }
    }

    /// Ticker interval using the rule of the section's own kind.
    ///
    /// # Errors
    ///
    /// See [`Section::ticker`].
    pub fn own_ticker(&self) -> FsOpsResult<Option<u32>> {
        self.ticker(self.kind().map_or(TickerRule::None, |kind| kind.ticker))
    }
}

/// Decode config text into sections in declaration order.
///
/// # Errors
///
/// Returns [`FsOpsError::Decode`] on malformed TOML or when a top-level key is
/// not a table.
pub fn decode_sections(text: &str) -> FsOpsResult<Vec<Section>> {
    let document: Table =
        toml::from_str(text).map_err(|source| FsOpsError::decode("decode.parse", source))?;

    document
        .into_iter()
        .map(|(name, value)| match value {
            Value::Table(table) => {
                let config_type = table
                    .get(TYPE_KEY)
                    .and_then(Value::as_str)
                    .map_or_else(|| name.clone(), ToString::to_string);
                Ok(Section {
                    name,
                    config_type,
                    table,
                })
            }
            _ => Err(FsOpsError::Decode {
                operation: "decode.section",
                key: Some(name),
                source: None,
            }),
        })
        .collect()
}

/// First section whose declared type is allowed, honouring allow-list order.
#[must_use]
pub fn select_section<'a>(sections: &'a [Section], include_types: &[String]) -> Option<&'a Section> {
    include_types.iter().find_map(|allowed| {
        sections
            .iter()
            .find(|section| section.config_type == *allowed)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIXED: &str = r#"
[web]
type = "HttpInput"
address = ":8080"

[ProcessInput]
ticker_interval = 30
command = "uptime"

[decode_json]
type = "JsonDecoder"
"#;

    #[test]
    fn sections_keep_declaration_order_and_types() -> FsOpsResult<()> {
        let sections = decode_sections(MIXED)?;
        let names: Vec<&str> = sections.iter().map(Section::name).collect();
        let types: Vec<&str> = sections.iter().map(Section::config_type).collect();
        assert_eq!(names, vec!["web", "ProcessInput", "decode_json"]);
        assert_eq!(types, vec!["HttpInput", "ProcessInput", "JsonDecoder"]);
        assert_eq!(sections[2].category(), "Decoder");
        Ok(())
    }

    #[test]
    fn select_honours_allow_list_priority() -> FsOpsResult<()> {
        let sections = decode_sections(MIXED)?;
        let include = vec!["ProcessInput".to_string(), "HttpInput".to_string()];
        let chosen = select_section(&sections, &include).map(Section::name);
        assert_eq!(chosen, Some("ProcessInput"));

        let include = vec!["FilePollingInput".to_string()];
        assert!(select_section(&sections, &include).is_none());
        Ok(())
    }

    #[test]
    fn ticker_defaults_and_validates() -> FsOpsResult<()> {
        let rule = TickerRule::Interval { default: 15 };
        let sections = decode_sections(
            "[a]\ntype = \"ProcessInput\"\n[b]\ntype = \"ProcessInput\"\nticker_interval = 45\n[c]\ntype = \"ProcessInput\"\nticker_interval = \"soon\"\n[d]\ntype = \"ProcessInput\"\nticker_interval = -1\n",
        )?;
        assert_eq!(sections[0].ticker(rule)?, Some(15));
        assert_eq!(sections[1].own_ticker()?, Some(45));
        assert!(matches!(
            sections[2].ticker(rule),
            Err(FsOpsError::Validation {
                reason: "not_an_integer",
                ..
            })
        ));
        assert!(matches!(
            sections[3].ticker(rule),
            Err(FsOpsError::Validation {
                reason: "out_of_range",
                ..
            })
        ));
        assert_eq!(sections[1].ticker(TickerRule::None)?, None);
        Ok(())
    }

    #[test]
    fn malformed_documents_are_decode_errors() {
        assert!(matches!(
            decode_sections("[unterminated"),
            Err(FsOpsError::Decode { source: Some(_), .. })
        ));
        assert!(matches!(
            decode_sections("loose = 1\n[a]\ntype = \"HttpInput\"\n"),
            Err(FsOpsError::Decode { key: Some(ref key), .. }) if key == "loose"
        ));
    }

    #[test]
    fn empty_document_has_no_sections() -> FsOpsResult<()> {
        assert!(decode_sections("")?.is_empty());
        Ok(())
    }
}
