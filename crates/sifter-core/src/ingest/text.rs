use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use scraper::{Html, Node};
use serde::Serialize;

use super::detect::FileType;

/// Elements whose text never reaches a reader.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Convert a document of the given kind into readable prose.
///
/// Never fails: if the format-specific conversion cannot make sense of the
/// input, the original content is returned unchanged.
#[must_use]
pub fn extract_text(content: &str, file_type: FileType) -> String {
    match file_type {
        FileType::Json | FileType::StructuredProfile => pretty_json(content),
        FileType::Markdown => strip_markdown(content),
        FileType::Csv => delimited_rows(content, ','),
        FileType::Tsv => delimited_rows(content, '\t'),
        FileType::Html => strip_html(content),
        FileType::Plaintext | FileType::Pdf | FileType::Docx | FileType::ChatExport => {
            content.to_string()
        }
    }
}

fn pretty_json(content: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(content) else {
        tracing::debug!("JSON content did not parse, leaving text unchanged");
        return content.to_string();
    };

    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"  ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    if value.serialize(&mut serializer).is_err() {
        return content.to_string();
    }

    String::from_utf8(out).unwrap_or_else(|_| content.to_string())
}

/// Keep what a reader sees: text, inline code and link text. Images and raw
/// HTML are dropped, and each block ends up on its own line.
fn strip_markdown(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut image_depth = 0usize;

    for event in Parser::new_ext(content, Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH) {
        match event {
            Event::Start(Tag::Image { .. }) => image_depth += 1,
            Event::End(TagEnd::Image) => image_depth = image_depth.saturating_sub(1),
            Event::Text(text) | Event::Code(text) if image_depth == 0 => out.push_str(&text),
            Event::SoftBreak | Event::HardBreak => out.push('\n'),
            Event::Start(Tag::Item) => {
                if !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            Event::End(TagEnd::TableCell) => out.push(' '),
            Event::End(
                TagEnd::Paragraph
                | TagEnd::Heading(_)
                | TagEnd::CodeBlock
                | TagEnd::Item
                | TagEnd::TableHead
                | TagEnd::TableRow,
            ) => out.push('\n'),
            _ => {}
        }
    }

    out.lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// `Row N: header=value, ...` for every data row, header taken from line one.
fn delimited_rows(content: &str, delimiter: char) -> String {
    let mut lines = content.lines().filter(|l| !l.trim().is_empty());

    let Some(header_line) = lines.next() else {
        return content.to_string();
    };
    let headers: Vec<&str> = header_line.split(delimiter).map(str::trim).collect();

    let rows: Vec<String> = lines
        .enumerate()
        .map(|(i, line)| {
            let fields: Vec<String> = line
                .split(delimiter)
                .map(str::trim)
                .enumerate()
                .map(|(col, value)| {
                    let key = headers
                        .get(col)
                        .filter(|h| !h.is_empty())
                        .map_or_else(|| format!("column_{}", col + 1), |h| (*h).to_string());
                    format!("{key}={value}")
                })
                .collect();
            format!("Row {}: {}", i + 1, fields.join(", "))
        })
        .collect();

    if rows.is_empty() {
        return content.to_string();
    }

    rows.join("\n")
}

/// Visible text of an HTML document with whitespace collapsed. Entities are
/// decoded by the parser; comments and script or style bodies are skipped.
fn strip_html(content: &str) -> String {
    let document = Html::parse_document(content);
    let mut text = String::with_capacity(content.len());

    for node in document.tree.root().descendants() {
        let Node::Text(fragment) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|element| HIDDEN_ELEMENTS.contains(&element.name()))
        });
        if !hidden {
            text.push_str(fragment);
            text.push(' ');
        }
    }

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plaintext_passthrough() {
        let text = "  Alice met Bob.\n\n";
        assert_eq!(extract_text(text, FileType::Plaintext), text);
        assert_eq!(extract_text("%PDF-1.4", FileType::Pdf), "%PDF-1.4");
    }

    #[test]
    fn test_json_pretty_print_preserves_order() {
        let text = extract_text(r#"{"zeta":1,"alpha":{"b":"x","a":2.5}}"#, FileType::Json);
        assert_eq!(
            text,
            "{\n  \"zeta\": 1,\n  \"alpha\": {\n    \"b\": \"x\",\n    \"a\": 2.5\n  }\n}"
        );
    }

    #[test]
    fn test_malformed_json_is_unchanged() {
        let broken = r#"{"name": "Steve""#;
        assert_eq!(extract_text(broken, FileType::StructuredProfile), broken);
    }

    #[test]
    fn test_markdown_stripping() {
        let md = "# Title\n\nSome **bold** text and a [link](http://example.com).";
        let text = extract_text(md, FileType::Markdown);

        assert!(text.contains("bold"));
        assert!(text.contains("link"));
        assert!(text.contains("Title"));
        assert!(!text.contains("**"));
        assert!(!text.contains("](http"));
        assert!(!text.contains('#'));
    }

    #[test]
    fn test_markdown_images_rules_and_code() {
        let md = "Intro ![diagram](img.png) here\n---\nRun `cargo test` with _care_ and *focus*.";
        let text = extract_text(md, FileType::Markdown);

        assert!(!text.contains("diagram"));
        assert!(!text.contains("---"));
        assert!(text.contains("Run cargo test with care and focus."));
    }

    #[test]
    fn test_markdown_keeps_literal_asterisks_and_hashtags() {
        let text = extract_text("Compute 2 * 3 * 4 today\n#rust rocks", FileType::Markdown);
        assert_eq!(text, "Compute 2 * 3 * 4 today\n#rust rocks");
    }

    #[test]
    fn test_markdown_lists_and_code_blocks() {
        let md = "## Team\n\n- **Alice**, lead\n- [Bob](https://bob.dev)\n\n```\nlet x = 1;\n```\n";
        let text = extract_text(md, FileType::Markdown);
        assert_eq!(text, "Team\nAlice, lead\nBob\nlet x = 1;");
    }

    #[test]
    fn test_markdown_keeps_snake_case() {
        let text = extract_text("the user_id field", FileType::Markdown);
        assert_eq!(text, "the user_id field");
    }

    #[test]
    fn test_csv_rows() {
        let text = extract_text("Name,Role\nAlice,Engineer\n", FileType::Csv);
        assert!(text.contains("Row 1: Name=Alice, Role=Engineer"));
    }

    #[test]
    fn test_csv_multiple_rows_and_extra_columns() {
        let text = extract_text("Name,Role\nAlice,Engineer\nBob,Designer,Remote\n", FileType::Csv);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "Row 2: Name=Bob, Role=Designer, column_3=Remote");
    }

    #[test]
    fn test_tsv_rows() {
        let text = extract_text("Name\tCity\r\nAlice\tAtlanta\r\n", FileType::Tsv);
        assert_eq!(text, "Row 1: Name=Alice, City=Atlanta");
    }

    #[test]
    fn test_header_only_csv_is_unchanged() {
        assert_eq!(extract_text("Name,Role\n", FileType::Csv), "Name,Role\n");
    }

    #[test]
    fn test_html_stripping() {
        let html = "<html><head><style>p { color: red; }</style>\
                    <script>var x = '<b>';</script></head>\
                    <body><p>Tom &amp; Jerry&nbsp;&lt;3</p>\n\n<p>&quot;Hi&quot; it&#39;s me</p></body></html>";
        let text = extract_text(html, FileType::Html);

        assert_eq!(text, "Tom & Jerry <3 \"Hi\" it's me");
    }

    #[test]
    fn test_html_attributes_and_comments_with_angle_brackets() {
        let html = r#"<p title="a > b">Hello</p><!-- if x > 1 --><p>World</p>"#;
        assert_eq!(extract_text(html, FileType::Html), "Hello World");
    }

    #[test]
    fn test_html_numeric_entities_and_noscript() {
        let html = "<body><h1>Caf&#233; &mdash; menu</h1><noscript>enable js</noscript></body>";
        assert_eq!(extract_text(html, FileType::Html), "Caf\u{e9} \u{2014} menu");
    }

    #[test]
    fn test_json_number_text_preserved() {
        let text = extract_text(r#"{"budget":1e5,"ratio":0.10,"count":7}"#, FileType::Json);
        assert_eq!(text, "{\n  \"budget\": 1e5,\n  \"ratio\": 0.10,\n  \"count\": 7\n}");
    }
}
