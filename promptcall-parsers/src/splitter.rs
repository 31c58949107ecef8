//! Splits streamed text into atomic chunks.
//!
//! A chunk never straddles a fence marker, a newline, or (for the tag family)
//! a `<`/`>` boundary. Concatenating the chunks always reproduces the input.

pub const FENCE: &str = "```";

/// Which boundaries are significant for a protocol family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitPolicy {
    /// Fence markers and newlines.
    Codeblock,
    /// Fence markers, newlines, and tag boundaries.
    Xml,
}

pub fn split_chunks(text: &str, policy: SplitPolicy) -> Vec<&str> {
    let bytes = text.as_bytes();
    let fence = FENCE.as_bytes();
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i..].starts_with(fence) {
            push(&mut chunks, text, start, i);
            push(&mut chunks, text, i, i + fence.len());
            i += fence.len();
            start = i;
            continue;
        }
        match bytes[i] {
            b'\n' => {
                push(&mut chunks, text, start, i);
                push(&mut chunks, text, i, i + 1);
                i += 1;
                start = i;
            }
            b'<' if policy == SplitPolicy::Xml => {
                push(&mut chunks, text, start, i);
                start = i;
                i += 1;
            }
            b'>' if policy == SplitPolicy::Xml => {
                i += 1;
                push(&mut chunks, text, start, i);
                start = i;
            }
            _ => i += 1,
        }
    }
    push(&mut chunks, text, start, bytes.len());
    chunks
}

// All markers are ASCII, so every cut lands on a char boundary.
fn push<'a>(chunks: &mut Vec<&'a str>, text: &'a str, from: usize, to: usize) {
    if to > from {
        chunks.push(&text[from..to]);
    }
}
