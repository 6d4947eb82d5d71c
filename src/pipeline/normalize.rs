//! Normalizer — turns one raw mail file into the text block the model sees.
//!
//! Output is always
//! `From: <sender>\nDate: <date>\nSubject: <subject>\n\n<body>`, trimmed,
//! with missing headers rendered as empty strings.

use std::path::Path;
use std::sync::LazyLock;

use mail_parser::{Address, HeaderName, Message, MessageParser, MessagePart, MimeHeaders, PartType};
use regex::Regex;

use crate::error::IngestError;
use crate::pipeline::types::{DocumentId, NormalizedText, RawDocument};

static SCRIPT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script.*?>.*?</script>").unwrap());
static STYLE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style.*?>.*?</style>").unwrap());
static LINE_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());
static PARAGRAPH_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</p>").unwrap());
static ANY_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<.*?>").unwrap());
static HORIZONTAL_WS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+").unwrap());
static PADDED_NEWLINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*\n\s*").unwrap());

/// Read a mail file from disk. The file name becomes the document identity.
pub fn read_document(path: &Path) -> Result<RawDocument, IngestError> {
    let bytes = std::fs::read(path).map_err(|source| IngestError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(RawDocument::new(DocumentId::new(name), bytes))
}

/// Parse a raw document and render its canonical text.
pub fn normalize(document: &RawDocument) -> Result<NormalizedText, IngestError> {
    if document.bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(IngestError::Malformed {
            reason: "document is empty".to_string(),
        });
    }

    let message = MessageParser::default()
        .parse(document.bytes.as_slice())
        .ok_or_else(|| IngestError::Malformed {
            reason: "could not parse MIME structure".to_string(),
        })?;

    if message.parts.first().is_none_or(|root| root.headers.is_empty()) {
        return Err(IngestError::Malformed {
            reason: "no mail headers found".to_string(),
        });
    }

    let sender = render_sender(message.from());
    let date = render_date(&message);
    let subject = message.subject().unwrap_or_default();
    let body = best_body(&message);

    let unified = format!("From: {sender}\nDate: {date}\nSubject: {subject}\n\n{body}");
    Ok(NormalizedText::new(unified.trim()))
}

/// Pick the body text following the part priority rules.
fn best_body(message: &Message) -> String {
    let Some(root) = message.parts.first() else {
        return String::new();
    };

    if !matches!(root.body, PartType::Multipart(_) | PartType::Message(_)) {
        let content = part_text(root);
        return if declared_type(root) == "text/html" {
            strip_html(&content)
        } else {
            content
        };
    }

    if let Some(plain) = find_part(message, &|ct| ct == "text/plain") {
        return part_text(plain);
    }
    if let Some(html) = find_part(message, &|ct| ct == "text/html") {
        return strip_html(&part_text(html));
    }
    if let Some(text) = find_part(message, &|ct| ct.starts_with("text/")) {
        return part_text(text);
    }
    String::new()
}

/// Depth-first search for the first part whose declared type matches.
///
/// `parts` already lists a message's own MIME tree depth-first; attached
/// `message/rfc822` parts carry their own tree, which is searched in place.
fn find_part<'a, 'x>(
    message: &'a Message<'x>,
    matches: &dyn Fn(&str) -> bool,
) -> Option<&'a MessagePart<'x>> {
    for part in &message.parts {
        if let PartType::Message(inner) = &part.body {
            if let Some(found) = find_part(inner, matches) {
                return Some(found);
            }
            continue;
        }
        if matches(&declared_type(part)) {
            return Some(part);
        }
    }
    None
}

/// Parsed Date header in RFC 822 form, or the raw header text when the value
/// is present but not a valid RFC 5322 date.
fn render_date(message: &Message) -> String {
    match message.date() {
        Some(date) => date.to_rfc822(),
        None => message
            .header_raw(HeaderName::Date)
            .map(|raw| raw.trim().to_string())
            .unwrap_or_default(),
    }
}

/// Lowercased `type/subtype`; parts without a Content-Type are `text/plain`.
fn declared_type(part: &MessagePart) -> String {
    match MimeHeaders::content_type(part) {
        Some(ct) => match ct.subtype() {
            Some(sub) => format!("{}/{}", ct.ctype(), sub).to_ascii_lowercase(),
            None => ct.ctype().to_ascii_lowercase(),
        },
        None => "text/plain".to_string(),
    }
}

fn part_text(part: &MessagePart) -> String {
    match &part.body {
        PartType::Text(text) | PartType::Html(text) => text.to_string(),
        PartType::Binary(bytes) | PartType::InlineBinary(bytes) => {
            String::from_utf8_lossy(bytes).into_owned()
        }
        PartType::Message(_) | PartType::Multipart(_) => String::new(),
    }
}

/// Render the From header as `Name <address>` entries joined by ", ".
fn render_sender(address: Option<&Address>) -> String {
    let Some(address) = address else {
        return String::new();
    };

    let addrs: Vec<&mail_parser::Addr> = match address {
        Address::List(list) => list.iter().collect(),
        Address::Group(groups) => groups.iter().flat_map(|g| g.addresses.iter()).collect(),
    };

    addrs
        .into_iter()
        .filter_map(|a| match (a.name.as_deref(), a.address.as_deref()) {
            (Some(name), Some(addr)) => Some(format!("{name} <{addr}>")),
            (None, Some(addr)) => Some(addr.to_string()),
            (Some(name), None) => Some(name.to_string()),
            (None, None) => None,
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Convert HTML to plain text.
///
/// Drops script/style blocks, turns `<br>` and `</p>` into newlines, removes
/// remaining tags, decodes the five common entities and collapses whitespace.
pub fn strip_html(html: &str) -> String {
    let text = SCRIPT_BLOCK.replace_all(html, "");
    let text = STYLE_BLOCK.replace_all(&text, "");
    let text = LINE_BREAK.replace_all(&text, "\n");
    let text = PARAGRAPH_END.replace_all(&text, "\n");
    let text = ANY_TAG.replace_all(&text, "");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"");
    let text = HORIZONTAL_WS.replace_all(&text, " ");
    let text = PADDED_NEWLINE.replace_all(&text, "\n");
    text.trim().to_string()
}
