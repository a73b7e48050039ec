//! Paragraph chunking for raw documents.

/// Split documents into paragraph chunks.
///
/// A paragraph ends at a blank line (empty or whitespace only, `\r\n`
/// tolerated). Chunks are trimmed, empty chunks are dropped, and document
/// order followed by paragraph order is preserved.
///
/// ```
/// use halberd::retrieval::chunker::chunk_documents;
///
/// let chunks = chunk_documents(&["A\n\nB", "C"]);
/// assert_eq!(chunks, vec!["A", "B", "C"]);
/// ```
pub fn chunk_documents<S: AsRef<str>>(documents: &[S]) -> Vec<String> {
    documents
        .iter()
        .flat_map(|document| split_paragraphs(document.as_ref()))
        .collect()
}

fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            flush(&mut current, &mut paragraphs);
        } else {
            current.push(line);
        }
    }
    flush(&mut current, &mut paragraphs);

    paragraphs
}

fn flush(lines: &mut Vec<&str>, paragraphs: &mut Vec<String>) {
    if lines.is_empty() {
        return;
    }
    let paragraph = lines.join("\n");
    let trimmed = paragraph.trim();
    if !trimmed.is_empty() {
        paragraphs.push(trimmed.to_string());
    }
    lines.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_line_split() {
        assert_eq!(chunk_documents(&["A\n\nB", "C"]), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_whitespace_and_crlf() {
        let docs = ["  first line\r\nsecond line\r\n   \r\nnext  ", "\n\n\n", ""];
        assert_eq!(
            chunk_documents(&docs),
            vec!["first line\nsecond line", "next"]
        );
    }

    #[test]
    fn test_indented_document_is_one_chunk() {
        let doc = "\n    Smart lighting saves energy.\n    It adapts to daylight.\n    ";
        let chunks = chunk_documents(&[doc]);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].starts_with("Smart lighting"));
        assert!(chunks[0].ends_with("daylight."));
    }

    #[test]
    fn test_empty_input() {
        let docs: [&str; 0] = [];
        assert!(chunk_documents(&docs).is_empty());
    }
}
