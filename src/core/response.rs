//! Discord message size utilities
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.1.0: Add component label truncation
//! - 1.0.0: Message chunking for long reminder lists and broadcasts

/// Discord message content limit
pub const MESSAGE_LIMIT: usize = 2000;
/// Discord button / select option label limit
pub const LABEL_LIMIT: usize = 80;

/// Chunk text into pieces that fit `max_size` bytes (UTF-8 safe, line-aware)
///
/// Prefers splitting at newlines so a reminder line is never torn in half,
/// falling back to character splitting for lines that are longer than the limit.
pub fn chunk_text(text: &str, max_size: usize) -> Vec<String> {
    if text.len() <= max_size {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        if current.len() + line.len() + 1 > max_size {
            if !current.is_empty() {
                chunks.push(current.trim_end().to_string());
                current.clear();
            }
            if line.len() + 1 > max_size {
                chunks.extend(chunk_long_line(line, max_size));
                continue;
            }
        }
        current.push_str(line);
        current.push('\n');
    }
    if !current.trim().is_empty() {
        chunks.push(current.trim_end().to_string());
    }
    chunks
}

fn chunk_long_line(line: &str, max_size: usize) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = String::new();

    for ch in line.chars() {
        if current.len() + ch.len_utf8() > max_size && !current.is_empty() {
            result.push(std::mem::take(&mut current));
        }
        current.push(ch);
    }
    if !current.is_empty() {
        result.push(current);
    }
    result
}

/// Chunk text for message content (2000 character limit)
pub fn chunk_for_message(text: &str) -> Vec<String> {
    chunk_text(text, MESSAGE_LIMIT)
}

/// Truncate a component label, appending an ellipsis when shortened
pub fn truncate_label(label: &str) -> String {
    if label.chars().count() <= LABEL_LIMIT {
        return label.to_string();
    }
    let mut out: String = label.chars().take(LABEL_LIMIT - 1).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_single_chunk() {
        assert_eq!(chunk_text("hello", 10), vec!["hello".to_string()]);
    }

    #[test]
    fn test_chunks_split_on_lines() {
        let text = "aaaa\nbbbb\ncccc";
        let chunks = chunk_text(text, 10);
        assert_eq!(chunks, vec!["aaaa\nbbbb", "cccc"]);
        assert!(chunks.iter().all(|c| c.len() <= 10));
    }

    #[test]
    fn test_long_line_is_utf8_safe() {
        let text = "💊".repeat(10);
        let chunks = chunk_text(&text, 9);
        assert!(chunks.iter().all(|c| c.len() <= 9));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_truncate_label() {
        assert_eq!(truncate_label("short"), "short");
        let long = "x".repeat(100);
        let truncated = truncate_label(&long);
        assert_eq!(truncated.chars().count(), LABEL_LIMIT);
        assert!(truncated.ends_with('…'));
    }
}
