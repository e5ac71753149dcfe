//! One-shot historical bootstrap for the activity feed.

use crate::errors::ClientError;
use crate::feed::entry::LogEntry;
use crate::gateway::{RequestDescriptor, RequestGateway};

/// Fetches the most recent `limit` entries through the gateway, once per
/// mount. The endpoint returns entries newest-first; this reverses them so
/// the feed is populated oldest-first and live entries append naturally
/// after the historical tail.
pub async fn fetch_recent(
    gateway: &RequestGateway,
    limit: usize,
) -> Result<Vec<LogEntry>, ClientError> {
    let req = RequestDescriptor::get("logs").with_query("limit", limit);
    let mut entries: Vec<LogEntry> = gateway.send_json(&req).await?;
    entries.reverse();
    tracing::debug!(count = entries.len(), "log bootstrap complete");
    Ok(entries)
}
