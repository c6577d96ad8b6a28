use serde::Serialize;

/// Characters per snippet used when nothing else is configured.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// A labeled slice of one page's extracted text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Chunk {
    pub title: String,
    pub snippet: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    #[error("cannot read '{path}': {reason}")]
    Unreadable { path: String, reason: String },

    #[error("extraction of '{path}' timed out after {secs}s")]
    Timeout { path: String, secs: u64 },

    #[error("extraction task failed: {0}")]
    Task(String),
}

/// Split every page into consecutive slices of at most `chunk_size` chars.
///
/// Pages are numbered from 1 in the order given and part numbers restart at
/// 1 on each page. A page with no text yields no chunks. Slicing is done on
/// `char` boundaries, so concatenating the snippets of a page gives back the
/// page text unchanged.
pub fn chunk_pages<S: AsRef<str>>(pages: &[S], chunk_size: usize) -> Vec<Chunk> {
    assert!(chunk_size > 0, "chunk_size must be greater than zero");

    let mut chunks = Vec::new();

    for (page_idx, page) in pages.iter().enumerate() {
        let page_number = page_idx + 1;
        for (part_idx, snippet) in split_chars(page.as_ref(), chunk_size).enumerate() {
            chunks.push(Chunk {
                title: format!("Page {page_number} Part {}", part_idx + 1),
                snippet: snippet.to_string(),
            });
        }
    }

    chunks
}

fn split_chars(text: &str, chunk_size: usize) -> impl Iterator<Item = &str> {
    let mut rest = text;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let end = rest
            .char_indices()
            .nth(chunk_size)
            .map(|(idx, _)| idx)
            .unwrap_or(rest.len());
        let (head, tail) = rest.split_at(end);
        rest = tail;
        Some(head)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(len: usize, fill: char) -> String {
        std::iter::repeat_n(fill, len).collect()
    }

    #[test]
    fn test_two_page_scenario() {
        let pages = vec![page(1500, 'a'), page(500, 'b')];
        let chunks = chunk_pages(&pages, DEFAULT_CHUNK_SIZE);

        let titles: Vec<&str> = chunks.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, ["Page 1 Part 1", "Page 1 Part 2", "Page 2 Part 1"]);

        let lens: Vec<usize> = chunks.iter().map(|c| c.snippet.chars().count()).collect();
        assert_eq!(lens, [1000, 500, 500]);
    }

    #[test]
    fn test_snippets_reconstruct_each_page() {
        let pages = vec![
            "Bus 7: Stanley Plaza, Tai Tam Road.\n".repeat(80),
            "Repulse Bay 4pm\n".to_string(),
            "Chung Hom Kok ".repeat(150),
        ];
        let chunks = chunk_pages(&pages, 100);

        for (idx, original) in pages.iter().enumerate() {
            let prefix = format!("Page {} Part ", idx + 1);
            let rebuilt: String = chunks
                .iter()
                .filter(|c| c.title.starts_with(&prefix))
                .map(|c| c.snippet.as_str())
                .collect();
            assert_eq!(&rebuilt, original);
        }
    }

    #[test]
    fn test_only_last_part_may_be_short() {
        let chunks = chunk_pages(&[page(2345, 'x')], 1000);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].snippet.len(), 1000);
        assert_eq!(chunks[1].snippet.len(), 1000);
        assert_eq!(chunks[2].snippet.len(), 345);
    }

    #[test]
    fn test_part_numbers_restart_per_page() {
        let chunks = chunk_pages(&[page(25, 'a'), page(25, 'b')], 10);
        let titles: Vec<&str> = chunks.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(
            titles,
            [
                "Page 1 Part 1",
                "Page 1 Part 2",
                "Page 1 Part 3",
                "Page 2 Part 1",
                "Page 2 Part 2",
                "Page 2 Part 3",
            ]
        );
    }

    #[test]
    fn test_empty_page_emits_nothing_but_keeps_numbering() {
        let chunks = chunk_pages(&["first", "", "third"], 1000);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].title, "Page 1 Part 1");
        assert_eq!(chunks[1].title, "Page 3 Part 1");
        assert_eq!(chunks[1].snippet, "third");
    }

    #[test]
    fn test_multibyte_text_is_split_on_char_boundaries() {
        let text = "巴士站🚌".repeat(10);
        let chunks = chunk_pages(&[text.as_str()], 3);
        assert!(chunks.iter().all(|c| c.snippet.chars().count() <= 3));
        let rebuilt: String = chunks.iter().map(|c| c.snippet.as_str()).collect();
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_exact_multiple_has_no_trailing_empty_part() {
        let chunks = chunk_pages(&[page(2000, 'z')], 1000);
        assert_eq!(chunks.len(), 2);
    }
}
