//! strftime templating for remote directories and file names.

use std::path::Path;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, TimeZone};
use davpush_remote::RemotePath;

use crate::events::EventError;

/// Expands a strftime template at `now`.
pub fn expand<Tz>(template: &str, now: &DateTime<Tz>) -> Result<String, EventError>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let items: Vec<Item<'_>> = StrftimeItems::new(template).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(EventError::Template(template.to_string()));
    }
    Ok(now.format_with_items(items.iter()).to_string())
}

/// Remote directory for a directory template.
pub fn remote_dir<Tz>(template: &str, now: &DateTime<Tz>) -> Result<RemotePath, EventError>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    Ok(RemotePath::parse(&expand(template, now)?)?)
}

/// Remote file name: the expanded template plus the source's extension,
/// or `fallback` when no template is configured.
pub fn file_name<Tz>(
    template: Option<&str>,
    source: &Path,
    fallback: &str,
    now: &DateTime<Tz>,
) -> Result<String, EventError>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let Some(template) = template.filter(|t| !t.is_empty()) else {
        return Ok(fallback.to_string());
    };

    let mut name = expand(template, now)?;
    if let Some(ext) = source.extension() {
        name.push('.');
        name.push_str(&ext.to_string_lossy());
    }
    Ok(name)
}
