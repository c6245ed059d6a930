//! # Admission Keys
//!
//! Helpers for turning request metadata into the opaque key the limiter
//! buckets by. The limiter itself never parses keys; any string works.

/// Picks the admission key for an HTTP request.
///
/// Returns the forwarded-for header value when it is present and non-empty,
/// otherwise the peer address. The header is used as-is: a proxy chain such
/// as `"1.2.3.4, 10.0.0.1"` becomes one key, and a client can choose its own
/// key by sending the header. Only trust it behind a proxy that overwrites it.
///
/// # Example
///
/// ```rust
/// use admitter::client_key;
///
/// assert_eq!(client_key(Some("203.0.113.9"), "10.0.0.1:5123"), "203.0.113.9");
/// assert_eq!(client_key(Some(""), "10.0.0.1:5123"), "10.0.0.1:5123");
/// assert_eq!(client_key(None, "10.0.0.1:5123"), "10.0.0.1:5123");
/// ```
#[inline]
pub fn client_key<'a>(forwarded_for: Option<&'a str>, remote_addr: &'a str) -> &'a str {
    match forwarded_for {
        Some(header) if !header.is_empty() => header,
        _ => remote_addr,
    }
}
