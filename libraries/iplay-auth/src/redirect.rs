//! Redirect target validation and loopback URL canonicalization.

use url::Url;

/// Origin used when a request carries no usable host information.
pub const DEFAULT_ORIGIN: &str = "http://127.0.0.1:3000";

const LOOPBACK_CANONICAL: &str = "127.0.0.1";

/// Accept `value` as a post-login path only if it stays on this origin.
///
/// Anything else (absolute URLs, protocol-relative `//host`, `/https:...`
/// tricks, embedded `://`) yields `default`.
pub fn safe_next_path(value: Option<&str>, default: &str) -> String {
    let Some(value) = value else {
        return default.to_string();
    };

    let lower = value.to_ascii_lowercase();
    let unsafe_path = !value.starts_with('/')
        || value.starts_with("//")
        || lower.starts_with("/http:")
        || lower.starts_with("/https:")
        || value.contains("://");

    if unsafe_path {
        default.to_string()
    } else {
        value.to_string()
    }
}

fn is_loopback_alias(host: &str) -> bool {
    matches!(
        host.to_ascii_lowercase().as_str(),
        "localhost" | "::1" | "[::1]"
    )
}

/// Canonicalize loopback aliases in a URL to `127.0.0.1`.
///
/// The provider compares redirect URIs byte for byte, so `localhost` and
/// `127.0.0.1` must not be mixed between authorize and exchange. Only the
/// host is rewritten; scheme, port, path and query keep their exact text.
/// Values that do not parse as URLs are returned unchanged.
pub fn normalize_loopback_url(value: &str) -> String {
    let Ok(url) = Url::parse(value) else {
        return value.to_string();
    };
    if !url.host_str().is_some_and(is_loopback_alias) {
        return value.to_string();
    }
    let Some((scheme, rest)) = value.split_once("://") else {
        return value.to_string();
    };

    let end = rest
        .find(|c| matches!(c, '/' | '?' | '#'))
        .unwrap_or(rest.len());
    let (authority, tail) = rest.split_at(end);
    let (userinfo, host_port) = match authority.rsplit_once('@') {
        Some((userinfo, host_port)) => (Some(userinfo), host_port),
        None => (None, authority),
    };

    let mut normalized = format!("{}://", scheme);
    if let Some(userinfo) = userinfo {
        normalized.push_str(userinfo);
        normalized.push('@');
    }
    normalized.push_str(&normalize_loopback_host(host_port));
    normalized.push_str(tail);
    normalized
}

/// Canonicalize a `host[:port]` authority.
pub fn normalize_loopback_host(authority: &str) -> String {
    let (host, port) = split_host(authority);
    let host = if is_loopback_alias(host) {
        LOOPBACK_CANONICAL
    } else {
        host
    };
    match port {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

fn split_host(authority: &str) -> (&str, Option<&str>) {
    if authority.starts_with('[') {
        // [v6]:port
        if let Some(end) = authority.find(']') {
            let host = &authority[..=end];
            let port = authority[end + 1..].strip_prefix(':');
            return (host, port);
        }
        return (authority, None);
    }

    // A bare IPv6 address has several colons and no port.
    if authority.matches(':').count() > 1 {
        return (authority, None);
    }

    match authority.rsplit_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (authority, None),
    }
}

/// Work out the externally visible origin of a request.
///
/// Forwarded headers win over `Host`; only the first value of a
/// comma-separated forwarded header is used.
pub fn preferred_origin(
    forwarded_proto: Option<&str>,
    forwarded_host: Option<&str>,
    host: Option<&str>,
) -> String {
    let first = |v: &str| v.split(',').next().unwrap_or_default().trim().to_string();

    let authority = forwarded_host
        .map(first)
        .filter(|h| !h.is_empty())
        .or_else(|| host.map(first).filter(|h| !h.is_empty()));

    let Some(authority) = authority else {
        return DEFAULT_ORIGIN.to_string();
    };

    let proto = forwarded_proto
        .map(first)
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| "http".to_string());

    format!("{}://{}", proto, normalize_loopback_host(&authority))
}
