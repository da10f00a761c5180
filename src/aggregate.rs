//! Window aggregation into a single outbound text blob
//!
//! One display line per message, joined in arrival order. Embedded newlines
//! are escaped to the literal two-character sequence `\n` so the blob stays
//! single-line-safe for the transport payload; the same marker separates
//! lines. A pure left-to-right fold - join order is part of the output.

use crate::message::Message;
use crate::window::Window;
use chrono::DateTime;

/// Archive permalink prefix; a message id appended to this yields a link
/// back to the message in the room.
const PERMALINK_BASE: &str = "https://gitter.im/reactor/reactor?at=";

/// Literal backslash + 'n', not a newline.
const LINE_BREAK: &str = "\\n";

/// Re-render the source RFC 3339 timestamp as `d-MMM H:mm:ss`
/// (e.g. `5-Mar 14:07:03`). An unparseable timestamp falls back to the raw
/// source string; one odd message must not fail its whole window.
fn format_sent(sent_at: &str) -> String {
    match DateTime::parse_from_rfc3339(sent_at) {
        Ok(dt) => dt.format("%-d-%b %-H:%M:%S").to_string(),
        Err(_) => {
            log::warn!("unparseable sent timestamp '{}', using raw value", sent_at);
            sent_at.to_string()
        }
    }
}

fn escape_newlines(text: &str) -> String {
    text.replace('\n', LINE_BREAK)
}

/// One display line: permalink, author, short timestamp, escaped text.
pub fn format_line(message: &Message) -> String {
    format!(
        "<{}{}|{} [{}]>: {}",
        PERMALINK_BASE,
        message.id,
        message.author,
        format_sent(&message.sent_at),
        escape_newlines(&message.text)
    )
}

/// Reduce a window to its outbound batch. The empty window reduces to the
/// empty string.
pub fn aggregate(window: &Window) -> String {
    window.items().iter().fold(String::new(), |acc, message| {
        let line = format_line(message);
        if acc.is_empty() {
            line
        } else {
            acc + LINE_BREAK + &line
        }
    })
}
