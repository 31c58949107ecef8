//! Detects whether an accumulated buffer opens a tool call region.

/// One accepted opening spelling and the canonical text it is rewritten to.
///
/// The first entry of a protocol's table is its canonical spelling and maps
/// to itself. Order is priority: the first full match wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolStart {
    pub spelling: &'static str,
    pub canonical: &'static str,
}

impl ToolStart {
    pub const fn new(spelling: &'static str, canonical: &'static str) -> Self {
        Self {
            spelling,
            canonical,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryMatch {
    /// The buffer definitely opens a tool call.
    pub is_in_tool_call: bool,
    /// The buffer is a strict prefix of some accepted spelling; keep buffering.
    pub is_in_partial_prefix: bool,
    /// The buffer with the matched spelling rewritten to its canonical form.
    pub normalized_buffer: String,
}

impl BoundaryMatch {
    /// Neither inside nor possibly entering a tool call.
    pub fn is_plain_text(&self) -> bool {
        !self.is_in_tool_call && !self.is_in_partial_prefix
    }
}

/// Pure function of `buffer` and `starts`; holds no state between calls.
pub fn detect_tool_call_start(buffer: &str, starts: &[ToolStart]) -> BoundaryMatch {
    let lower = buffer.to_ascii_lowercase();
    let mut is_in_partial_prefix = false;

    for (index, start) in starts.iter().enumerate() {
        let spelling = start.spelling.to_ascii_lowercase();
        if lower.starts_with(&spelling) {
            // Spellings are ASCII, so the byte length matches in `buffer`.
            let normalized_buffer = if index == 0 {
                buffer.to_string()
            } else {
                format!("{}{}", start.canonical, &buffer[spelling.len()..])
            };
            return BoundaryMatch {
                is_in_tool_call: true,
                is_in_partial_prefix: false,
                normalized_buffer,
            };
        }
        if !lower.is_empty() && spelling.starts_with(&lower) {
            is_in_partial_prefix = true;
        }
    }

    BoundaryMatch {
        is_in_tool_call: false,
        is_in_partial_prefix,
        normalized_buffer: buffer.to_string(),
    }
}
