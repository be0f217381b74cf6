//! Resolution of display name, URL and logo from a raw record's legacy fields.
//!
//! Each value is looked up through an ordered key list; the first non-blank
//! string wins.

use toolscout_shared::RawRecord;

/// Keys consulted for the display name, highest precedence first.
pub const NAME_FIELDS: &[&str] = &["name", "tool_name", "toolName", "title"];

/// Keys consulted for the source URL, highest precedence first.
pub const URL_FIELDS: &[&str] = &["url", "website", "link", "source_url", "homepage"];

/// Keys consulted for the logo reference, highest precedence first.
pub const LOGO_FIELDS: &[&str] = &["logo", "logo_url", "image", "icon"];

/// Name used when none of [`NAME_FIELDS`] is present.
pub const UNKNOWN_TOOL: &str = "Unknown Tool";

/// URL used when none of [`URL_FIELDS`] is present.
pub const NO_URL: &str = "No URL provided";

/// Inputs handed to the analyzer for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTool {
    pub name: String,
    pub url: String,
    pub logo: Option<String>,
}

/// First non-blank string among `keys`, in order.
pub fn first_present<'a>(record: &'a RawRecord, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| record.text_field(key))
}

pub fn resolve_name(record: &RawRecord) -> String {
    first_present(record, NAME_FIELDS)
        .unwrap_or(UNKNOWN_TOOL)
        .to_string()
}

pub fn resolve_url(record: &RawRecord) -> String {
    first_present(record, URL_FIELDS).unwrap_or(NO_URL).to_string()
}

pub fn resolve_logo(record: &RawRecord) -> Option<String> {
    first_present(record, LOGO_FIELDS).map(str::to_string)
}

/// Resolve all analyzer inputs for `record`.
pub fn resolve(record: &RawRecord) -> ResolvedTool {
    ResolvedTool {
        name: resolve_name(record),
        url: resolve_url(record),
        logo: resolve_logo(record),
    }
}
