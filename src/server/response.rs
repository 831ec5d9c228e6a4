use may_minihttp::Response;
use serde_json::Value;

use crate::dispatcher::HeaderVec;

fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "OK",
    }
}

/// Serialize a handler's body value into its wire form.
///
/// Two-branch policy: a string body is written verbatim as `text/plain`,
/// UNLESS it begins with `[` - then it is JSON-encoded so a deliberately
/// returned `[`-leading string arrives quoted instead of masquerading as an
/// array. Every non-string value (arrays included) serializes as
/// `application/json`. Handlers can therefore return either plain text or
/// structured data without declaring which.
pub fn render_body(body: Value) -> (&'static str, Vec<u8>) {
    match body {
        Value::String(s) if !s.starts_with('[') => ("text/plain", s.into_bytes()),
        other => (
            "application/json",
            serde_json::to_vec(&other).unwrap_or_default(),
        ),
    }
}

/// Write a handler response to the wire: status line, custom headers, then
/// the rendered body with its content type.
pub fn write_handler_response(res: &mut Response, status: u16, headers: &HeaderVec, body: Value) {
    res.status_code(status as usize, status_reason(status));

    for (name, value) in headers {
        if name.eq_ignore_ascii_case("content-type") {
            continue;
        }
        // may_minihttp wants 'static header lines; responses carrying
        // dynamic headers (rotation) leak one small string each.
        let line = format!("{name}: {value}").into_boxed_str();
        res.header(Box::leak(line));
    }

    let (content_type, bytes) = render_body(body);
    match content_type {
        "text/plain" => res.header("Content-Type: text/plain"),
        _ => res.header("Content-Type: application/json"),
    };
    res.body_vec(bytes);
}
