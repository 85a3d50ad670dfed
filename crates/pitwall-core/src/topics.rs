//! Well-known dispatcher topics.
//!
//! Topic paths are dot-delimited: `message.endLap` names the `endLap` child of
//! the `message` node.

/// Separator between topic path segments.
pub const SEPARATOR: char = '.';

/// Fired when a connection (initial or reconnected) is established.
pub const OPEN: &str = "open";
/// Fired whenever the current connection closes, cleanly or not.
pub const CLOSE: &str = "close";
/// Fired on transport-level errors. Does not imply a close.
pub const ERROR: &str = "error";
/// Fired with the raw text of every inbound frame.
pub const MESSAGE: &str = "message";

/// Topic for inbound frames carrying the given `identifier`.
pub fn message_topic(identifier: &str) -> String {
    format!("{MESSAGE}{SEPARATOR}{identifier}")
}

/// Split a topic path into its segments.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_topic_prefixes_identifier() {
        assert_eq!(message_topic("endLap"), "message.endLap");
    }

    #[test]
    fn segments_split_on_dots() {
        let parts: Vec<&str> = segments("message.endLap").collect();
        assert_eq!(parts, vec!["message", "endLap"]);
    }

    #[test]
    fn single_segment_path() {
        let parts: Vec<&str> = segments(OPEN).collect();
        assert_eq!(parts, vec!["open"]);
    }
}
