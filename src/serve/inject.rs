//! Console instrumentation for served HTML documents.
//!
//! The snippet forwards every `console.log` call of a document shown inside a
//! frame to the embedding window as a `{ type: "console-log", data: [...] }`
//! message, while still logging locally.

use std::borrow::Cow;

/// Attribute carried by the injected script tag
pub const INSTRUMENTATION_MARKER: &str = "data-handlefs-instrumentation";

/// Opening tag of the injected script; its presence means already instrumented.
pub const INSTRUMENTATION_TAG: &str = "<script data-handlefs-instrumentation>";

pub const INSTRUMENTATION_SNIPPET: &str = r#"<script data-handlefs-instrumentation>
(() => {
  const forwardConsoleLog = () => {
    const log = console.log;
    console.log = (...args) => {
      log(...args);
      window.parent.postMessage({ type: 'console-log', data: args }, '*');
    };
  };
  if (window.console) {
    forwardConsoleLog();
  } else {
    document.addEventListener('DOMContentLoaded', forwardConsoleLog);
  }
})();
</script>
"#;

/// True for the document name that receives instrumentation.
pub fn is_root_document(file_path: &str) -> bool {
    let name = crate::tree::path::basename(file_path);
    name.eq_ignore_ascii_case("index.html") || name.eq_ignore_ascii_case("index.htm")
}

pub fn is_instrumented(document: &[u8]) -> bool {
    find_ascii_ci(document, INSTRUMENTATION_TAG.as_bytes(), 0).is_some()
}

/// Insert the snippet into `document`.
///
/// Placement, in order of preference: just before `</head>`, just after the
/// opening `<head ...>` tag, or at the very start. A document that already
/// carries the snippet is returned unchanged.
pub fn inject_instrumentation(document: &[u8]) -> Cow<'_, [u8]> {
    if is_instrumented(document) {
        return Cow::Borrowed(document);
    }
    let at = find_ascii_ci(document, b"</head>", 0)
        .or_else(|| head_open_end(document))
        .unwrap_or(0);

    let snippet = INSTRUMENTATION_SNIPPET.as_bytes();
    let mut out = Vec::with_capacity(document.len() + snippet.len());
    out.extend_from_slice(&document[..at]);
    out.extend_from_slice(snippet);
    out.extend_from_slice(&document[at..]);
    Cow::Owned(out)
}

/// Offset just past the `>` of the first `<head>` or `<head ...>` tag.
fn head_open_end(document: &[u8]) -> Option<usize> {
    let mut from = 0;
    while let Some(start) = find_ascii_ci(document, b"<head", from) {
        let after = start + b"<head".len();
        match document.get(after) {
            Some(b'>') => return Some(after + 1),
            Some(c) if c.is_ascii_whitespace() => {
                return document[after..]
                    .iter()
                    .position(|&b| b == b'>')
                    .map(|pos| after + pos + 1);
            }
            // `<header>` and friends
            _ => from = after,
        }
    }
    None
}

fn find_ascii_ci(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() || from > haystack.len() - needle.len() {
        return None;
    }
    (from..=haystack.len() - needle.len())
        .find(|&i| haystack[i..i + needle.len()].eq_ignore_ascii_case(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occurrences(document: &[u8]) -> usize {
        let text = String::from_utf8_lossy(document);
        text.matches(INSTRUMENTATION_TAG).count()
    }

    #[test]
    fn test_snippet_opens_with_tag() {
        assert!(INSTRUMENTATION_SNIPPET.starts_with(INSTRUMENTATION_TAG));
        assert!(INSTRUMENTATION_TAG.contains(INSTRUMENTATION_MARKER));
    }

    #[test]
    fn test_marker_mentioned_in_text_is_not_a_snippet() {
        let html = b"<head></head><body><code>data-handlefs-instrumentation</code></body>";
        assert!(!is_instrumented(html));

        let out = inject_instrumentation(html);
        assert!(is_instrumented(&out));
        assert_eq!(occurrences(&out), 1);
    }

    #[test]
    fn test_inserts_before_closing_head() {
        let html = b"<html><head><title>t</title></head><body></body></html>";
        let out = inject_instrumentation(html);
        let text = String::from_utf8(out.to_vec()).unwrap();

        let snippet_at = text.find(INSTRUMENTATION_MARKER).unwrap();
        let close_at = text.find("</head>").unwrap();
        assert!(snippet_at < close_at);
        assert!(text.find("<title>").unwrap() < snippet_at);
        assert_eq!(occurrences(&out), 1);
    }

    #[test]
    fn test_closing_head_is_case_insensitive() {
        let out = inject_instrumentation(b"<HTML><HEAD></HEAD></HTML>");
        let text = String::from_utf8(out.to_vec()).unwrap();
        assert!(text.starts_with("<HTML><HEAD><script data-handlefs-instrumentation>"));
    }

    #[test]
    fn test_falls_back_to_after_open_head() {
        let out = inject_instrumentation(b"<html><header>x</header><head lang=\"en\"><body>");
        let text = String::from_utf8(out.to_vec()).unwrap();
        assert!(text.starts_with("<html><header>x</header><head lang=\"en\"><script"));
    }

    #[test]
    fn test_prepends_without_head() {
        let out = inject_instrumentation(b"<p>bare</p>");
        assert!(out.starts_with(INSTRUMENTATION_SNIPPET.as_bytes()));
        assert!(out.ends_with(b"<p>bare</p>"));
    }

    #[test]
    fn test_instrumented_document_is_left_alone() {
        let once = inject_instrumentation(b"<head></head>").into_owned();
        let twice = inject_instrumentation(&once);

        assert!(matches!(twice, Cow::Borrowed(_)));
        assert_eq!(occurrences(&twice), 1);
    }

    #[test]
    fn test_root_document_names() {
        assert!(is_root_document("/index.html"));
        assert!(is_root_document("/sub/INDEX.HTM"));
        assert!(!is_root_document("/myindex.html"));
        assert!(!is_root_document("/index.html.bak"));
    }
}
