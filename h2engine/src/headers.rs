//! The header model used on both sides of the engine: an
//! insertion-ordered multimap plus the request-specific splitting rules
//! (pseudo-headers, duplicate joining, authority and path parsing).

use std::fmt;

/// A single header field. Names are kept lowercase; HTTP/2 forbids
/// uppercase field names on the wire.
#[derive(Clone, PartialEq, Eq)]
pub struct Header {
    name: String,
    value: String,
}

impl Header {
    pub fn new<N: Into<String>, V: Into<String>>(name: N, value: V) -> Header {
        let mut name = name.into();
        name.make_ascii_lowercase();
        Header {
            name,
            value: value.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Debug for Header {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.value)
    }
}

/// An ordered list of header fields. Repeated names are legal; each entry
/// becomes its own HPACK field on the wire, which is what keeps
/// `set-cookie` values separate.
#[derive(Default, Clone, PartialEq, Eq)]
pub struct Headers(Vec<Header>);

impl Headers {
    pub fn new() -> Headers {
        Default::default()
    }

    pub fn from_vec(headers: Vec<Header>) -> Headers {
        Headers(headers)
    }

    pub fn add<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) {
        self.0.push(Header::new(name, value));
    }

    /// First value for the name, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|h| h.name == name)
            .map(|h| h.value.as_str())
    }

    /// All values for the name, in order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> {
        self.0
            .iter()
            .filter(move |h| h.name == name)
            .map(|h| h.value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Header> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Headers {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

/// The four request pseudo-headers of RFC 7540 section 8.1.2.3.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PseudoHeaders {
    pub method: Option<String>,
    pub scheme: Option<String>,
    pub authority: Option<String>,
    pub path: Option<String>,
}

/// Split a decoded field list into pseudo-headers and the regular header
/// map. Duplicate regular names are joined with `", "`, except `cookie`
/// whose crumbs are joined with `"; "` (RFC 7540 section 8.1.2.5).
pub fn split_pseudo_headers(fields: Vec<(String, String)>) -> (PseudoHeaders, Headers) {
    let mut pseudo = PseudoHeaders::default();
    let mut regular: Vec<Header> = Vec::new();

    for (name, value) in fields {
        match name.as_str() {
            ":method" => pseudo.method = Some(value),
            ":scheme" => pseudo.scheme = Some(value),
            ":authority" => pseudo.authority = Some(value),
            ":path" => pseudo.path = Some(value),
            _ => {
                let separator = if name == "cookie" { "; " } else { ", " };
                match regular.iter_mut().find(|h| h.name == name) {
                    Some(existing) => {
                        existing.value.push_str(separator);
                        existing.value.push_str(&value);
                    }
                    None => regular.push(Header::new(name, value)),
                }
            }
        }
    }

    (pseudo, Headers(regular))
}

/// Parse `:authority` into host and optional port. A missing or
/// unparseable port yields `None`; the caller falls back to the scheme
/// default.
pub fn parse_authority(authority: &str) -> (String, Option<u16>) {
    // bracketed IPv6 literal
    if let Some(rest) = authority.strip_prefix('[') {
        if let Some(end) = rest.find(']') {
            let host = format!("[{}]", &rest[..end]);
            let port = rest[end + 1..]
                .strip_prefix(':')
                .and_then(|p| p.parse().ok());
            return (host, port);
        }
    }

    match authority.rsplit_once(':') {
        Some((host, port)) => match port.parse() {
            Ok(port) => (host.to_owned(), Some(port)),
            Err(_) => (authority.to_owned(), None),
        },
        None => (authority.to_owned(), None),
    }
}

/// Default port of a scheme.
pub fn scheme_default_port(scheme: &str) -> u16 {
    match scheme {
        "https" => 443,
        _ => 80,
    }
}

/// Split `:path` into path and query string at the first `?`.
pub fn split_path(path: &str) -> (String, String) {
    match path.split_once('?') {
        Some((p, q)) => (p.to_owned(), q.to_owned()),
        None => (path.to_owned(), String::new()),
    }
}

/// Synthesise an `:authority` value for a pushed request: the port is
/// omitted when it is the scheme default.
pub fn synth_authority(scheme: &str, host: &str, port: u16) -> String {
    match (scheme, port) {
        ("http", 80) | ("https", 443) => host.to_owned(),
        _ => format!("{}:{}", host, port),
    }
}

/// Synthesise a `:path` value: path alone when the query string is empty.
pub fn synth_path(path: &str, query: &str) -> String {
    if query.is_empty() {
        path.to_owned()
    } else {
        format!("{}?{}", path, query)
    }
}

/// `:status` as the decimal ASCII triple. Status codes are three digits
/// by construction of the `Command` type.
pub fn status_value(status: u16) -> String {
    debug_assert!((100..1000).contains(&status));
    status.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_names_joined_with_comma() {
        let (_, headers) = split_pseudo_headers(vec![
            ("accept".to_owned(), "text/html".to_owned()),
            ("accept".to_owned(), "text/plain".to_owned()),
        ]);
        assert_eq!(Some("text/html, text/plain"), headers.get("accept"));
        assert_eq!(1, headers.len());
    }

    #[test]
    fn cookie_crumbs_joined_with_semicolon() {
        let (_, headers) = split_pseudo_headers(vec![
            ("cookie".to_owned(), "a=1".to_owned()),
            ("cookie".to_owned(), "b=2".to_owned()),
            ("cookie".to_owned(), "c=3".to_owned()),
        ]);
        assert_eq!(Some("a=1; b=2; c=3"), headers.get("cookie"));
    }

    #[test]
    fn pseudo_headers_stripped() {
        let (pseudo, headers) = split_pseudo_headers(vec![
            (":method".to_owned(), "GET".to_owned()),
            (":scheme".to_owned(), "https".to_owned()),
            (":authority".to_owned(), "example.com".to_owned()),
            (":path".to_owned(), "/".to_owned()),
            ("user-agent".to_owned(), "test".to_owned()),
        ]);
        assert_eq!(Some("GET"), pseudo.method.as_deref());
        assert_eq!(Some("https"), pseudo.scheme.as_deref());
        assert_eq!(1, headers.len());
        assert_eq!(None, headers.get(":method"));
    }

    #[test]
    fn authority_parsing() {
        assert_eq!(("example.com".to_owned(), None), parse_authority("example.com"));
        assert_eq!(
            ("example.com".to_owned(), Some(8443)),
            parse_authority("example.com:8443")
        );
        assert_eq!(("[::1]".to_owned(), Some(80)), parse_authority("[::1]:80"));
        assert_eq!(("[::1]".to_owned(), None), parse_authority("[::1]"));
    }

    #[test]
    fn authority_synthesis() {
        assert_eq!("example.com", synth_authority("http", "example.com", 80));
        assert_eq!("example.com", synth_authority("https", "example.com", 443));
        assert_eq!("example.com:8080", synth_authority("http", "example.com", 8080));
        assert_eq!("example.com:80", synth_authority("https", "example.com", 80));
    }

    #[test]
    fn path_splitting() {
        assert_eq!(("/".to_owned(), String::new()), split_path("/"));
        assert_eq!(
            ("/search".to_owned(), "q=rust".to_owned()),
            split_path("/search?q=rust")
        );
        assert_eq!("/search?q=rust", synth_path("/search", "q=rust"));
        assert_eq!("/search", synth_path("/search", ""));
    }

    #[test]
    fn names_lowercased() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "text/plain");
        assert_eq!(Some("text/plain"), headers.get("content-type"));
    }
}
