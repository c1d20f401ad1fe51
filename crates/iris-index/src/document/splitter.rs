use super::types::{Document, Fragment};

#[derive(Debug, Clone)]
pub struct SplitterConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub sentence_aware: bool,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            sentence_aware: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextSplitter {
    config: SplitterConfig,
}

impl TextSplitter {
    #[must_use]
    pub fn new(config: SplitterConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &SplitterConfig {
        &self.config
    }

    /// Split a document into fragments. Whitespace-only documents yield nothing.
    #[must_use]
    pub fn split(&self, document: &Document) -> Vec<Fragment> {
        let text = document.text.as_str();
        if text.trim().is_empty() {
            return Vec::new();
        }

        let pieces = if self.config.sentence_aware {
            merge_sentences(
                &split_sentences(text),
                self.config.chunk_size,
                self.config.chunk_overlap,
            )
        } else {
            split_chars(text, self.config.chunk_size, self.config.chunk_overlap)
        };

        pieces
            .into_iter()
            .filter(|p| !p.trim().is_empty())
            .enumerate()
            .map(|(i, text)| Fragment {
                id: format!("{}:{i}", document.id),
                document_id: document.id.clone(),
                chunk_index: i,
                text,
                metadata: document.metadata.clone(),
            })
            .collect()
    }
}

/// Break text after `.`, `?` or `!` followed by a space, and after blank lines.
/// Every byte of the input lands in exactly one piece.
fn split_sentences(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let end = match bytes[i] {
            b'\n' if bytes.get(i + 1) == Some(&b'\n') => Some(i + 2),
            b'.' | b'?' | b'!' if bytes.get(i + 1) == Some(&b' ') => Some(i + 1),
            _ => None,
        };
        if let Some(end) = end {
            if !text[start..end].trim().is_empty() {
                pieces.push(&text[start..end]);
                start = end;
            }
            i = end;
        } else {
            i += 1;
        }
    }

    if start < text.len() && !text[start..].trim().is_empty() {
        pieces.push(&text[start..]);
    } else if start < text.len()
        && let Some(last) = pieces.last_mut()
    {
        // Trailing whitespace stays with the last sentence.
        *last = &text[start - last.len()..];
    }

    pieces
}

/// Pack sentences into chunks of at most `chunk_size` bytes (a single longer
/// sentence becomes its own chunk), repeating up to `chunk_overlap` bytes of
/// trailing sentences at the start of the next chunk.
fn merge_sentences(sentences: &[&str], chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut window: Vec<&str> = Vec::new();
    let mut window_len = 0;
    let mut fresh = 0;

    for sentence in sentences {
        if fresh > 0 && window_len + sentence.len() > chunk_size {
            chunks.push(window.concat());

            let mut keep = 0;
            let mut kept_len = 0;
            for s in window.iter().rev() {
                if kept_len + s.len() > chunk_overlap
                    || kept_len + s.len() + sentence.len() > chunk_size
                {
                    break;
                }
                kept_len += s.len();
                keep += 1;
            }
            window.drain(..window.len() - keep);
            window_len = kept_len;
            fresh = 0;
        }
        window.push(sentence);
        window_len += sentence.len();
        fresh += 1;
    }

    if fresh > 0 {
        chunks.push(window.concat());
    }
    chunks
}

fn split_chars(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let size = chunk_size.max(1);
    let step = size.saturating_sub(overlap).max(1);

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }
    chunks
}
