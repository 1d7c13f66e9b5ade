/// Split normalized text into slices of at most `max_chars` characters.
///
/// Paragraph boundaries (blank lines) are preferred; a paragraph longer than
/// the limit is split on whitespace, and a single run without whitespace is
/// split on character boundaries.
#[must_use]
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    if text.trim().is_empty() {
        return Vec::new();
    }
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut buffer = String::new();
    let mut buffer_len = 0;

    for para in split_paragraphs(text) {
        for piece in split_oversized(para, max_chars) {
            let piece_len = piece.chars().count();
            let joined_len = if buffer.is_empty() { piece_len } else { buffer_len + 2 + piece_len };

            if joined_len > max_chars && !buffer.is_empty() {
                chunks.push(std::mem::take(&mut buffer));
                buffer_len = 0;
            }
            if !buffer.is_empty() {
                buffer.push_str("\n\n");
                buffer_len += 2;
            }
            buffer.push_str(&piece);
            buffer_len += piece_len;
        }
    }

    if !buffer.trim().is_empty() {
        chunks.push(buffer);
    }

    chunks
}

fn split_paragraphs(text: &str) -> impl Iterator<Item = &str> {
    text.split("\n\n").map(str::trim).filter(|p| !p.is_empty())
}

fn split_oversized(para: &str, max_chars: usize) -> Vec<String> {
    if para.chars().count() <= max_chars {
        return vec![para.to_string()];
    }

    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in para.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > max_chars {
            if !current.is_empty() {
                pieces.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            pieces.extend(chars.chunks(max_chars).map(|c| c.iter().collect::<String>()));
            continue;
        }

        let joined_len = if current.is_empty() { word_len } else { current_len + 1 + word_len };
        if joined_len > max_chars {
            pieces.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }

    if !current.is_empty() {
        pieces.push(current);
    }

    pieces
}
