//! Recursive, overlap-aware text splitting.
//!
//! Text is first cut into pieces no longer than `chunk_size` characters,
//! preferring paragraph breaks, then line breaks, then sentence ends, then
//! spaces, and only as a last resort raw character windows. Pieces are then
//! merged greedily into chunks; each new chunk starts with the trailing
//! pieces of the previous one, up to `chunk_overlap` characters.
//!
//! Separators stay attached to the end of the piece they terminate and no
//! whitespace is stripped, so every chunk is an exact substring of its
//! document and the overlap can be removed using [`ChunkMetadata::start_char`].

use std::collections::VecDeque;

use tracing::{debug, info, instrument};

use rfpcheck_shared::{Chunk, ChunkMetadata, ChunkingConfig, Result, RfpCheckError, SourceDocument};

/// Separators tried in order, coarsest first. The empty separator means
/// "split anywhere".
pub const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " ", ""];

/// Location of a chunk inside the text it was split from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSpan {
    pub start_byte: usize,
    pub end_byte: usize,
    pub start_char: usize,
    pub char_len: usize,
}

impl TextSpan {
    /// Borrow the spanned text.
    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start_byte..self.end_byte]
    }

    /// Character offset one past the end.
    pub fn end_char(&self) -> usize {
        self.start_char + self.char_len
    }
}

/// A contiguous piece no longer than the chunk size.
#[derive(Debug, Clone, Copy)]
struct Piece {
    start: usize,
    end: usize,
    chars: usize,
    start_char: usize,
}

/// Splits documents into overlapping, size-bounded chunks.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl TextSplitter {
    /// Create a splitter. `chunk_overlap` must be smaller than `chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RfpCheckError::config("chunk_size must be greater than 0"));
        }
        if chunk_overlap >= chunk_size {
            return Err(RfpCheckError::config(format!(
                "chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }

        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Create a splitter from the `[chunking]` config section.
    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Replace the separator hierarchy (coarsest first).
    pub fn with_separators<I, S>(mut self, separators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.separators = separators.into_iter().map(Into::into).collect();
        self
    }

    /// Split documents in order; chunks never overlap across documents.
    #[instrument(skip_all, fields(documents = documents.len()))]
    pub fn split_documents(&self, documents: &[SourceDocument]) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        for doc in documents {
            let spans = self.split_spans(&doc.content);
            debug!(source = %doc.metadata.source, chunks = spans.len(), "split document");

            chunks.extend(spans.iter().enumerate().map(|(i, span)| Chunk {
                text: span.slice(&doc.content).to_string(),
                metadata: ChunkMetadata {
                    source: doc.metadata.source.clone(),
                    chunk_index: i,
                    start_char: span.start_char,
                },
            }));
        }

        info!(
            chunks = chunks.len(),
            chunk_size = self.chunk_size,
            chunk_overlap = self.chunk_overlap,
            "documents split"
        );
        chunks
    }

    /// Split a single text, returning borrowed chunk texts.
    pub fn split_text<'a>(&self, text: &'a str) -> Vec<&'a str> {
        self.split_spans(text)
            .into_iter()
            .map(|span| span.slice(text))
            .collect()
    }

    /// Split a single text into chunk spans.
    pub fn split_spans(&self, text: &str) -> Vec<TextSpan> {
        if text.is_empty() {
            return Vec::new();
        }

        let mut pieces = Vec::new();
        self.split_into(text, 0, text.len(), 0, &mut pieces);

        let mut start_char = 0;
        for piece in &mut pieces {
            piece.start_char = start_char;
            start_char += piece.chars;
        }

        self.merge(&pieces)
    }

    /// Cut `text[start..end]` into pieces of at most `chunk_size` characters.
    fn split_into(&self, text: &str, start: usize, end: usize, level: usize, out: &mut Vec<Piece>) {
        let span = &text[start..end];
        let chars = span.chars().count();
        if chars <= self.chunk_size {
            out.push(Piece {
                start,
                end,
                chars,
                start_char: 0,
            });
            return;
        }

        let found = self.separators[level.min(self.separators.len())..]
            .iter()
            .enumerate()
            .find(|(_, sep)| sep.is_empty() || span.contains(sep.as_str()));

        let Some((offset, separator)) = found.filter(|(_, sep)| !sep.is_empty()) else {
            self.split_windows(span, start, out);
            return;
        };
        let next_level = level + offset + 1;

        let mut piece_start = start;
        for (index, _) in span.match_indices(separator.as_str()) {
            let piece_end = start + index + separator.len();
            self.split_into(text, piece_start, piece_end, next_level, out);
            piece_start = piece_end;
        }
        if piece_start < end {
            self.split_into(text, piece_start, end, next_level, out);
        }
    }

    /// Last resort: fixed windows of `chunk_size` characters.
    fn split_windows(&self, span: &str, start: usize, out: &mut Vec<Piece>) {
        let mut window_start = start;
        let mut count = 0;

        for (index, _) in span.char_indices() {
            if count == self.chunk_size {
                out.push(Piece {
                    start: window_start,
                    end: start + index,
                    chars: count,
                    start_char: 0,
                });
                window_start = start + index;
                count = 0;
            }
            count += 1;
        }

        if count > 0 {
            out.push(Piece {
                start: window_start,
                end: start + span.len(),
                chars: count,
                start_char: 0,
            });
        }
    }

    /// Greedily pack pieces into chunks, carrying an overlap between them.
    fn merge(&self, pieces: &[Piece]) -> Vec<TextSpan> {
        let mut spans = Vec::new();
        let mut window: VecDeque<Piece> = VecDeque::new();
        let mut total = 0;

        for piece in pieces {
            if total + piece.chars > self.chunk_size && !window.is_empty() {
                spans.extend(span_of(&window, total));

                while total > self.chunk_overlap
                    || (total + piece.chars > self.chunk_size && total > 0)
                {
                    let Some(first) = window.pop_front() else {
                        break;
                    };
                    total -= first.chars;
                }
            }

            window.push_back(*piece);
            total += piece.chars;
        }

        spans.extend(span_of(&window, total));
        spans
    }
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self {
            chunk_size: 1500,
            chunk_overlap: 200,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

fn span_of(window: &VecDeque<Piece>, total: usize) -> Option<TextSpan> {
    let first = window.front()?;
    let last = window.back()?;
    Some(TextSpan {
        start_byte: first.start,
        end_byte: last.end,
        start_char: first.start_char,
        char_len: total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    const WORDS: &[&str] = &[
        "compliance", "audit", "encryption", "retention", "backup", "policy", "access",
        "control", "vendor", "incident", "response", "certified", "ISO", "SOC2", "região",
        "segurança", "dados", "is", "the", "of", "and", "a",
    ];

    /// Deterministic prose with paragraphs, lines, sentences and one long token.
    fn sample_text(paragraphs: usize) -> String {
        let mut text = String::new();
        let mut n = 7usize;
        for p in 0..paragraphs {
            for s in 0..(3 + p % 5) {
                for w in 0..(6 + (p + s) % 9) {
                    n = (n * 31 + 17) % 1009;
                    if w > 0 {
                        text.push(' ');
                    }
                    text.push_str(WORDS[n % WORDS.len()]);
                }
                text.push_str(if s % 4 == 3 { ".\n" } else { ". " });
            }
            if p == 5 {
                text.push_str(&"x".repeat(3200));
            }
            text.push_str("\n\n");
        }
        text
    }

    fn rebuild(text_chunks: &[(usize, &str)]) -> String {
        let mut out = String::new();
        let mut covered = 0;
        for (start_char, chunk) in text_chunks {
            let skip = covered - start_char;
            out.extend(chunk.chars().skip(skip));
            covered = start_char + chunk.chars().count();
        }
        out
    }

    #[test]
    fn short_text_is_one_chunk() {
        let splitter = TextSplitter::default();
        assert_eq!(splitter.split_text("A short note."), vec!["A short note."]);
    }

    #[test]
    fn empty_text_has_no_chunks() {
        assert!(TextSplitter::default().split_text("").is_empty());
    }

    #[test]
    fn rejects_invalid_settings() {
        assert!(TextSplitter::new(0, 0).is_err());
        assert!(TextSplitter::new(100, 100).is_err());
        assert!(TextSplitter::new(100, 150).is_err());
        assert!(TextSplitter::new(100, 99).is_ok());
    }

    #[test]
    fn prefers_paragraph_boundaries() {
        let para = |c: char| format!("{}\n\n", c.to_string().repeat(599));
        let text = format!("{}{}{}", para('a'), para('b'), para('c'));
        let chunks = TextSplitter::new(1500, 200).unwrap().split_text(&text);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], format!("{}{}", para('a'), para('b')));
        assert_eq!(chunks[1], para('c'));
    }

    #[test]
    fn falls_back_to_sentences_then_words() {
        let text = "One two three. Four five six. Seven eight nine.";
        let chunks = TextSplitter::new(20, 5).unwrap().split_text(text);
        assert!(chunks.iter().all(|c| c.chars().count() <= 20));
        assert_eq!(chunks[0], "One two three. ");
    }

    #[test]
    fn chunks_reconstruct_the_text() {
        let text = sample_text(40);
        let splitter = TextSplitter::new(1500, 200).unwrap();
        let spans = splitter.split_spans(&text);
        assert!(spans.len() > 3);

        for pair in spans.windows(2) {
            let overlap = pair[0].end_char().saturating_sub(pair[1].start_char);
            assert!(overlap <= 200, "overlap {overlap}");
            assert!(pair[1].start_char > pair[0].start_char);
            assert!(pair[1].end_char() > pair[0].end_char());
        }
        for span in &spans {
            assert!(span.char_len <= 1500, "chunk of {} chars", span.char_len);
            assert_eq!(span.slice(&text).chars().count(), span.char_len);
        }

        let parts: Vec<_> = spans.iter().map(|s| (s.start_char, s.slice(&text))).collect();
        assert_eq!(rebuild(&parts), text);
    }

    #[test]
    fn consecutive_chunks_share_text() {
        let text = (0..400)
            .map(|i| WORDS[(i * 7) % WORDS.len()])
            .collect::<Vec<_>>()
            .join(" ");
        let splitter = TextSplitter::new(300, 60).unwrap();
        let spans = splitter.split_spans(&text);
        let chars: Vec<char> = text.chars().collect();
        assert!(spans.len() > 2);

        // Word-sized pieces always leave room for an overlap
        for pair in spans.windows(2) {
            let overlap = pair[0].end_char() - pair[1].start_char;
            assert!(overlap > 0 && overlap <= 60, "overlap {overlap}");
        }

        for span in &spans {
            let expected: String = chars[span.start_char..span.end_char()].iter().collect();
            assert_eq!(span.slice(&text), expected);
        }
    }

    #[test]
    fn multibyte_text_without_separators() {
        let text = "ção".repeat(10);
        let splitter = TextSplitter::new(10, 3).unwrap();
        let spans = splitter.split_spans(&text);
        assert!(spans.iter().all(|s| s.char_len <= 10));

        let parts: Vec<_> = spans.iter().map(|s| (s.start_char, s.slice(&text))).collect();
        assert_eq!(rebuild(&parts), text);
    }

    #[test]
    fn custom_separators() {
        let text = "a|b|c|d";
        let chunks = TextSplitter::new(4, 0)
            .unwrap()
            .with_separators(["|", ""])
            .split_text(text);
        assert_eq!(chunks, vec!["a|b|", "c|d"]);
    }

    #[test]
    fn documents_keep_source_and_restart_indexes() {
        let doc = |path: &str, content: String| {
            SourceDocument::new(Url::parse(&format!("https://x.com/{path}")).unwrap(), None, content)
        };
        let docs = vec![doc("a", sample_text(6)), doc("b", sample_text(6))];
        let splitter = TextSplitter::new(400, 50).unwrap();
        let chunks = splitter.split_documents(&docs);

        let first_b = chunks
            .iter()
            .position(|c| c.metadata.source.path() == "/b")
            .expect("chunks for b");
        assert!(first_b > 0);
        assert_eq!(chunks[first_b].metadata.chunk_index, 0);
        assert_eq!(chunks[first_b].metadata.start_char, 0);
        assert!(docs[1].content.starts_with(&chunks[first_b].text));
        assert!(chunks[..first_b].iter().all(|c| c.metadata.source.path() == "/a"));
    }

    #[test]
    fn empty_document_produces_nothing() {
        let doc = SourceDocument::new(Url::parse("https://x.com/e").unwrap(), None, String::new());
        assert!(TextSplitter::default().split_documents(&[doc]).is_empty());
    }
}
