//! Session cookie parsing and `s:`-prefixed HMAC cookie signatures.
//!
//! Signed values use the widely deployed `cookie-signature` layout:
//! `<value>.<base64(HMAC-SHA256(secret, value))>` with base64 padding
//! stripped. Signed session cookies additionally carry an `s:` prefix.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "token";

/// Marker prefix of a signed cookie value.
pub const SIGNED_PREFIX: &str = "s:";

/// Bytes escaped in cookie values; everything `encodeURIComponent` escapes.
const COOKIE_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

fn mac_for(value: &str, secret: &str) -> HmacSha256 {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(value.as_bytes());
    mac
}

/// Append an HMAC signature to `value`.
pub fn sign(value: &str, secret: &str) -> String {
    let signature = STANDARD_NO_PAD.encode(mac_for(value, secret).finalize().into_bytes());
    format!("{value}.{signature}")
}

/// Verify and strip the signature produced by [`sign`].
///
/// Returns `None` when the input has no signature or it does not match
/// `secret`. The comparison is constant-time.
pub fn unsign<'a>(input: &'a str, secret: &str) -> Option<&'a str> {
    let (value, signature) = input.rsplit_once('.')?;
    let expected = STANDARD_NO_PAD.decode(signature).ok()?;
    mac_for(value, secret).verify_slice(&expected).ok()?;
    Some(value)
}

/// Parse a `Cookie` header into name/value pairs. Values are percent-decoded;
/// the first occurrence of a name wins.
pub fn parse_cookie_header(header: &str) -> HashMap<String, String> {
    let mut cookies = HashMap::new();
    for pair in header.split(';') {
        let Some((name, value)) = pair.trim().split_once('=') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let value = value.trim().trim_matches('"');
        cookies
            .entry(name.to_string())
            .or_insert_with(|| decode_value(value));
    }
    cookies
}

/// Result of reading the session cookie out of a `Cookie` header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionCookie {
    /// Whether a `token` cookie was present at all.
    pub present: bool,
    /// Whether its value carried the `s:` signed marker.
    pub signed: bool,
    /// The usable token: the raw value, or the unsigned value when signed
    /// and the signature checked out.
    pub token: Option<String>,
}

/// Extract the session token from a `Cookie` header, unsigning `s:` values
/// with `secret`. A bad signature yields no token.
pub fn read_session_cookie(header: &str, secret: &str) -> SessionCookie {
    let cookies = parse_cookie_header(header);
    let Some(raw) = cookies.get(SESSION_COOKIE) else {
        return SessionCookie::default();
    };

    match raw.strip_prefix(SIGNED_PREFIX) {
        Some(signed) => SessionCookie {
            present: true,
            signed: true,
            token: unsign(signed, secret)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
        },
        None => SessionCookie {
            present: true,
            signed: false,
            token: Some(raw.clone()).filter(|t| !t.is_empty()),
        },
    }
}

/// Build the `Set-Cookie` value for a signed, HttpOnly session cookie that
/// expires together with the token it carries.
pub fn session_set_cookie(token: &str, secret: &str, secure: bool, max_age_secs: i64) -> String {
    let value = format!("{SIGNED_PREFIX}{}", sign(token, secret));
    let mut cookie = format!(
        "{SESSION_COOKIE}={}; Max-Age={max_age_secs}; Path=/; HttpOnly; SameSite=Strict",
        utf8_percent_encode(&value, COOKIE_VALUE)
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Build the `Set-Cookie` value that clears the session cookie.
pub fn session_clear_cookie(secure: bool) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE}=; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Path=/; HttpOnly; SameSite=Strict"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Percent-decode a cookie value. Malformed escapes pass through as-is and
/// values that do not decode to UTF-8 are kept raw.
fn decode_value(value: &str) -> String {
    percent_decode_str(value)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| value.to_string())
}
