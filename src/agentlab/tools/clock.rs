//! The `current_time` tool.

use crate::agentlab::tool_protocol::{
    parse_params, ToolError, ToolMetadata, ToolParameter, ToolParameterType, TIMESTAMP_FORMAT,
};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use std::fmt::Write;

pub const TOOL_NAME: &str = "current_time";

const READABLE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render `now` according to a named format (`iso`, `readable`, `timestamp`) or a
/// strftime pattern.  Invalid patterns fall back to `iso`.
pub fn format_time(now: &DateTime<Local>, format: &str) -> String {
    match format {
        "iso" => now.format(TIMESTAMP_FORMAT).to_string(),
        "readable" => now.format(READABLE_FORMAT).to_string(),
        "timestamp" => now.timestamp().to_string(),
        custom => format_custom(now, custom)
            .unwrap_or_else(|| now.format(TIMESTAMP_FORMAT).to_string()),
    }
}

fn format_custom(now: &DateTime<Local>, pattern: &str) -> Option<String> {
    let items: Vec<Item<'_>> = StrftimeItems::new(pattern).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return None;
    }
    let mut rendered = String::new();
    write!(rendered, "{}", now.format_with_items(items.into_iter())).ok()?;
    Some(rendered)
}

/// IANA name of the local zone, or its UTC offset when the name cannot be resolved.
pub fn local_timezone(now: &DateTime<Local>) -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|err| {
        log::debug!("current_time: falling back to UTC offset: {}", err);
        now.format("%:z").to_string()
    })
}

fn default_format() -> String {
    "iso".to_string()
}

#[derive(Deserialize)]
struct TimeParams {
    #[serde(default = "default_format")]
    format: String,
}

pub fn metadata() -> ToolMetadata {
    ToolMetadata::new(TOOL_NAME, "Get the current local time").with_parameter(
        ToolParameter::new("format", ToolParameterType::String)
            .with_description(
                "iso, readable, timestamp, or a strftime pattern such as %H:%M; iso by default",
            )
            .with_default(json!("iso")),
    )
}

/// Tool body: `{format?}` → `{current_time, format, timezone}`.
pub fn current_time(parameters: JsonValue) -> Result<JsonValue, ToolError> {
    let params: TimeParams = parse_params(parameters)?;
    let now = Local::now();
    Ok(json!({
        "current_time": format_time(&now, &params.format),
        "format": params.format,
        "timezone": local_timezone(&now),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).single().unwrap()
    }

    #[test]
    fn test_named_formats() {
        let now = fixed();
        assert_eq!(format_time(&now, "iso"), "2024-03-09T14:05:07.000000");
        assert_eq!(format_time(&now, "readable"), "2024-03-09 14:05:07");
        assert_eq!(format_time(&now, "timestamp"), now.timestamp().to_string());
    }

    #[test]
    fn test_custom_and_invalid_patterns() {
        let now = fixed();
        assert_eq!(format_time(&now, "%H:%M"), "14:05");
        assert_eq!(format_time(&now, "%Y/%m/%d"), "2024/03/09");
        assert_eq!(format_time(&now, "%Q"), format_time(&now, "iso"));
        assert_eq!(format_time(&now, "no specifiers"), "no specifiers");
    }

    #[test]
    fn test_tool_body_reports_timezone() {
        let out = current_time(json!({})).unwrap();
        assert_eq!(out["format"], "iso");
        assert!(!out["timezone"].as_str().unwrap().is_empty());
        assert!(out["current_time"].as_str().unwrap().contains('T'));

        let out = current_time(json!({"format": "timestamp"})).unwrap();
        assert!(out["current_time"].as_str().unwrap().parse::<i64>().is_ok());
    }
}
