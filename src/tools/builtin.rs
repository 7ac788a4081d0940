//! Tools that ship with the binary

use async_trait::async_trait;
use chrono::Local;
use chrono::format::{Item, StrftimeItems};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use super::{Tool, ToolArgs};
use crate::{Error, Result};

const DEFAULT_FORMAT: &str = "%A, %B %-d %Y, %H:%M %Z";

/// Reports the local date and time
#[derive(Debug, Clone, Copy, Default)]
pub struct CurrentTimeTool;

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "current_time"
    }

    fn description(&self) -> &str {
        "Get the current local date and time"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "format": {
                    "type": "string",
                    "description": "Optional strftime format, e.g. %H:%M"
                }
            }
        })
    }

    async fn execute(&self, args: ToolArgs, _cancel: &CancellationToken) -> Result<Value> {
        let format = args
            .get("format")
            .and_then(Value::as_str)
            .filter(|f| !f.trim().is_empty())
            .unwrap_or(DEFAULT_FORMAT);

        let items: Vec<Item<'_>> = StrftimeItems::new(format).collect();
        if items.contains(&Item::Error) {
            return Err(Error::Tool(format!("invalid time format: {format}")));
        }

        let now = Local::now();
        Ok(Value::String(now.format_with_items(items.into_iter()).to_string()))
    }
}
