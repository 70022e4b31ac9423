//! Filename hints from `Content-Disposition` headers.
use percent_encoding::percent_decode_str;
use tracing::debug;

/// Extracts a filename from a `Content-Disposition` value.
///
/// Handles `filename="foo.bin"`, `filename=foo.bin` and the RFC 5987
/// `filename*=UTF-8''foo%20bar.bin` form. The extended form wins when both
/// are present.
pub fn parse_content_disposition(content_disposition: &str) -> Option<String> {
    let lower = content_disposition.to_ascii_lowercase();

    if let Some(idx) = lower.find("filename*=") {
        let value = param_value(&content_disposition[idx + "filename*=".len()..]);
        // charset'lang'%XX
        let encoded = value.find("''").map_or(value, |pos| &value[pos + 2..]);
        match percent_decode_str(encoded).decode_utf8() {
            Ok(decoded) if !decoded.trim().is_empty() => {
                debug!(name = "download_name_extended", "Got extended download name.");
                return Some(decoded.trim().to_string());
            }
            _ => debug!("Can't decode extended filename in {content_disposition}"),
        }
    }

    let mut search_from = 0;
    while let Some(found) = lower[search_from..].find("filename=") {
        let idx = search_from + found;
        search_from = idx + "filename=".len();
        // skip the `filename=` inside a previous `filename*=` match
        if idx > 0 && lower.as_bytes()[idx - 1] == b'*' {
            continue;
        }
        let value = param_value(&content_disposition[search_from..])
            .trim_matches('\'')
            .trim();
        if !value.is_empty() {
            return Some(value.to_string());
        }
    }
    None
}

fn param_value(rest: &str) -> &str {
    let rest = rest.trim_start();
    rest.split(';').next().unwrap_or(rest).trim().trim_matches('"')
}
