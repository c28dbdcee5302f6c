use crate::{Error, Result};

pub(crate) fn validate_jid(input: &str) -> Result<String> {
    validate_no_control("jid", input)?;
    let input = input.trim();
    if input.is_empty() {
        return Err(Error::invalid_input("jid must not be empty"));
    }
    if input.contains(char::is_whitespace) {
        return Err(Error::invalid_input("jid must not contain whitespace"));
    }
    if input.starts_with('-') {
        return Err(Error::invalid_input(format!("invalid jid: {input}")));
    }
    if !input
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(Error::invalid_input(format!("invalid jid: {input}")));
    }
    Ok(input.to_string())
}

pub(crate) fn validate_no_control(context: &'static str, input: &str) -> Result<()> {
    if input.contains('\0') {
        return Err(Error::invalid_input(format!(
            "{context} must not contain NUL"
        )));
    }
    if input.contains('\n') || input.contains('\r') {
        return Err(Error::invalid_input(format!(
            "{context} must not contain newlines"
        )));
    }
    if input.chars().any(|c| c.is_control()) {
        return Err(Error::invalid_input(format!(
            "{context} must not contain control characters"
        )));
    }
    Ok(())
}

/// Pick the zero/one/many wording and substitute `{0}` with `n`.
pub(crate) fn txt_zero_one_many(n: usize, zero: &str, one: &str, many: &str) -> String {
    let template = match n {
        0 => zero,
        1 => one,
        _ => many,
    };
    template.replace("{0}", &n.to_string())
}

/// Find `name` in a `k=v&k2=v2` query string (a leading `?` is ignored) and URL-decode it.
pub(crate) fn query_param(query: &str, name: &str) -> Result<Option<String>> {
    let query = query.strip_prefix('?').unwrap_or(query);
    for pair in query.split('&') {
        let (key, value) = match pair.split_once('=') {
            Some((k, v)) => (k, v),
            None => (pair, ""),
        };
        if key == name {
            return decode_uri_component(value).map(Some);
        }
    }
    Ok(None)
}

/// Percent-decode like `decodeURIComponent`: `+` is kept, malformed escapes and invalid UTF-8
/// are rejected.
pub(crate) fn decode_uri_component(input: &str) -> Result<String> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'%' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        let hi = bytes.get(i + 1).and_then(|b| hex_value(*b));
        let lo = bytes.get(i + 2).and_then(|b| hex_value(*b));
        let (Some(hi), Some(lo)) = (hi, lo) else {
            return Err(Error::invalid_input(format!(
                "malformed percent escape at offset {i}"
            )));
        };
        out.push((hi << 4) | lo);
        i += 3;
    }
    String::from_utf8(out)
        .map_err(|_| Error::invalid_input("percent-decoded value is not valid UTF-8"))
}

/// Percent-encode like `encodeURIComponent`.
pub(crate) fn encode_uri_component(input: &str) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";

    let mut out = String::with_capacity(input.len());
    for b in input.bytes() {
        let unreserved = b.is_ascii_alphanumeric()
            || matches!(b, b'-' | b'_' | b'.' | b'!' | b'~' | b'*' | b'\'' | b'(' | b')');
        if unreserved {
            out.push(char::from(b));
        } else {
            out.push('%');
            out.push(char::from(HEX[usize::from(b >> 4)]));
            out.push(char::from(HEX[usize::from(b & 0x0f)]));
        }
    }
    out
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Render a raw payload the way error cells show it: strings as-is, everything else as JSON.
pub(crate) fn payload_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
