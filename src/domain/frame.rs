//! Outbound SSE frames.

use std::fmt::Write;

/// One `text/event-stream` frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub id: Option<String>,
    pub event: Option<String>,
    pub data: String,
}

impl SseFrame {
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            id: None,
            event: None,
            data: data.into(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    /// Encode to the wire form, one `data:` line per payload line.
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(self.data.len() + 64);
        if let Some(id) = &self.id {
            let _ = writeln!(out, "id:{}", strip_newlines(id));
        }
        if let Some(event) = &self.event {
            let _ = writeln!(out, "event:{}", strip_newlines(event));
        }
        for line in self.data.split('\n') {
            let _ = writeln!(out, "data:{}", line.strip_suffix('\r').unwrap_or(line));
        }
        out.push('\n');
        out
    }
}

fn strip_newlines(value: &str) -> String {
    value.replace(['\r', '\n'], "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_full_frame() {
        let frame = SseFrame::new("{\"a\":1}").with_id("e1").with_event("alert");
        assert_eq!(frame.encode(), "id:e1\nevent:alert\ndata:{\"a\":1}\n\n");
    }

    #[test]
    fn test_encode_multiline_data() {
        let frame = SseFrame::new("one\r\ntwo");
        assert_eq!(frame.encode(), "data:one\ndata:two\n\n");
    }

    #[test]
    fn test_header_fields_cannot_break_framing() {
        let frame = SseFrame::new("x").with_event("bad\nname");
        assert_eq!(frame.encode(), "event:badname\ndata:x\n\n");
    }
}
