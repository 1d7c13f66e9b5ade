use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

static MD_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]{0,3}#{1,6}[ \t]+\S").expect("valid heading regex"));
static MD_EMPHASIS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)\*\*[^*\n]+\*\*|__[^_\n]+__|(?:^|\s)[*_][^*_\s][^*_\n]*[*_](?:\s|[.,;:!?)]|$)")
        .expect("valid emphasis regex")
});
static MD_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]\n]+\]\([^)\s]+\)").expect("valid link regex"));

/// Canonical document kind resolved by [`detect_file_type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    Pdf,
    Docx,
    Csv,
    Tsv,
    Markdown,
    Html,
    Plaintext,
    Json,
    StructuredProfile,
    ChatExport,
}

impl FileType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Csv => "csv",
            Self::Tsv => "tsv",
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::Plaintext => "plaintext",
            Self::Json => "json",
            Self::StructuredProfile => "structured_profile",
            Self::ChatExport => "chat_export",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" | "doc" => Some(Self::Docx),
            "csv" => Some(Self::Csv),
            "tsv" => Some(Self::Tsv),
            "md" | "markdown" => Some(Self::Markdown),
            "htm" | "html" => Some(Self::Html),
            "txt" => Some(Self::Plaintext),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    pub fn from_filename(filename: &str) -> Option<Self> {
        Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FileType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pdf" => Ok(Self::Pdf),
            "docx" => Ok(Self::Docx),
            "csv" => Ok(Self::Csv),
            "tsv" => Ok(Self::Tsv),
            "markdown" => Ok(Self::Markdown),
            "html" => Ok(Self::Html),
            "plaintext" => Ok(Self::Plaintext),
            "json" => Ok(Self::Json),
            "structured_profile" => Ok(Self::StructuredProfile),
            "chat_export" => Ok(Self::ChatExport),
            _ => Err(crate::Error::InvalidFileType(s.to_string())),
        }
    }
}

/// Classify raw content plus filename into a [`FileType`].
///
/// A known extension always wins, except `.json`, which is refined by looking
/// at the parsed content. Anything undecidable is `Plaintext`.
#[must_use]
pub fn detect_file_type(content: &str, filename: &str) -> FileType {
    let detected = match FileType::from_filename(filename) {
        Some(FileType::Json) => match serde_json::from_str::<Value>(content) {
            Ok(value) => classify_json(&value),
            Err(e) => {
                tracing::debug!(filename, error = %e, "malformed JSON under .json extension");
                sniff_content(content)
            }
        },
        Some(by_extension) => by_extension,
        None => sniff_content(content),
    };

    tracing::debug!(filename, file_type = %detected, "detected file type");
    detected
}

fn classify_json(value: &Value) -> FileType {
    match value {
        Value::Object(object) => classify_object(object),
        Value::Array(items)
            if items
                .iter()
                .filter_map(Value::as_object)
                .any(|o| classify_object(o) == FileType::ChatExport) =>
        {
            FileType::ChatExport
        }
        _ => FileType::Json,
    }
}

fn classify_object(object: &Map<String, Value>) -> FileType {
    let nested = object.get("entity").and_then(Value::as_object);
    let candidates = || std::iter::once(object).chain(nested);

    if candidates().any(|o| is_populated(o.get("entity_type"))) {
        return FileType::StructuredProfile;
    }

    let has_name = candidates().any(|o| is_populated(o.get("name")));
    let has_details = candidates()
        .any(|o| is_populated(o.get("attributes")) || o.contains_key("type"));
    if has_name && has_details {
        return FileType::StructuredProfile;
    }

    let is_chat = object
        .get("mapping")
        .and_then(Value::as_object)
        .is_some_and(|mapping| mapping.values().any(|node| node.get("message").is_some()));
    if is_chat {
        return FileType::ChatExport;
    }

    FileType::Json
}

fn is_populated(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
        Some(_) => true,
    }
}

fn sniff_content(content: &str) -> FileType {
    if content.starts_with("%PDF") {
        return FileType::Pdf;
    }
    if content.starts_with("PK") {
        return FileType::Docx;
    }

    let trimmed = content.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
            return classify_json(&value);
        }
    }

    let lower = content.to_lowercase();
    if lower.contains("<html") || lower.contains("<!doctype html") {
        return FileType::Html;
    }

    if markdown_signals(content) >= 2 {
        return FileType::Markdown;
    }

    if is_delimited(content, ',') {
        return FileType::Csv;
    }
    if is_delimited(content, '\t') {
        return FileType::Tsv;
    }

    FileType::Plaintext
}

fn markdown_signals(content: &str) -> usize {
    [&*MD_HEADING, &*MD_EMPHASIS, &*MD_LINK]
        .iter()
        .filter(|re| re.is_match(content))
        .count()
}

/// Every non-blank line splits into the same number (at least two) of columns.
fn is_delimited(content: &str, delimiter: char) -> bool {
    let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.len() < 2 {
        return false;
    }

    let columns = lines[0].split(delimiter).count();
    columns >= 2 && lines.iter().all(|l| l.split(delimiter).count() == columns)
}
