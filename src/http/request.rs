//! Zero-Copy Request Parser
//!
//! Parses one complete buffered request per invocation; the connection layer
//! guarantees a full request is available. Every token the parser produces is
//! a slice of the input buffer (method, path, query values, body), so the
//! success path performs no allocation. The only rewriting ever needed, the
//! id-placeholder substitution for route comparison, is done by slice
//! comparison around the digit run instead of building a rewritten path.

use super::route::Route;
use crate::error::{RequestError, RequestResult};
use std::ops::Range;

/// Upper bound on query pairs per request; the widest route uses five keys.
pub const MAX_QUERY_PARAMS: usize = 8;

/// Fixed-capacity key→value association list over input-buffer slices.
/// Filter key sets are small and known, so a dynamic map never pays off on
/// the hot path. Keys are not percent-decoded; consuming operations decode
/// the specific values that need it.
#[derive(Debug, Clone, Copy)]
pub struct QueryParams<'a> {
    pairs: [(&'a [u8], &'a [u8]); MAX_QUERY_PARAMS],
    len: usize,
}

impl<'a> QueryParams<'a> {
    pub fn empty() -> Self {
        Self {
            pairs: [(&[], &[]); MAX_QUERY_PARAMS],
            len: 0,
        }
    }

    /// Parse a raw `key=value&key=value` query string. A segment without
    /// `=`, an empty segment, or more pairs than the table holds is a
    /// BadRequest; malformed queries are rejected, not ignored.
    pub fn parse(raw: &'a [u8]) -> RequestResult<Self> {
        let mut params = Self::empty();

        for segment in raw.split(|&b| b == b'&') {
            if segment.is_empty() {
                return Err(RequestError::BadRequest);
            }
            let eq = segment
                .iter()
                .position(|&b| b == b'=')
                .ok_or(RequestError::BadRequest)?;
            if params.len == MAX_QUERY_PARAMS {
                return Err(RequestError::BadRequest);
            }
            params.pairs[params.len] = (&segment[..eq], &segment[eq + 1..]);
            params.len += 1;
        }

        Ok(params)
    }

    pub fn get(&self, key: &[u8]) -> Option<&'a [u8]> {
        self.pairs[..self.len]
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// One parsed request. Borrowed views into the connection's input buffer.
#[derive(Debug)]
pub struct Request<'a> {
    pub method: &'a [u8],
    /// Path as received, before any placeholder substitution.
    pub path: &'a [u8],
    /// First maximal ASCII digit run in the path, parsed as the entity id.
    /// Zero when the path holds no digits; saturated past `u32::MAX` so an
    /// oversized id stays a clean NotFound at lookup time.
    pub entity_id: u32,
    pub route: Route,
    pub query: QueryParams<'a>,
    /// For POST requests, everything from the first `{` onward.
    pub body: Option<&'a [u8]>,
}

/// Parse one buffered request and resolve its route.
///
/// Errors: `NotFound` when no route matches the rewritten path, `BadRequest`
/// for a torn request line, malformed query pair, or POST without a
/// locatable body. Callers must not execute a query after an error.
pub fn parse_request(buffer: &[u8]) -> RequestResult<Request<'_>> {
    let method_end = buffer
        .iter()
        .position(|&b| b == b' ')
        .ok_or(RequestError::BadRequest)?;
    let method = &buffer[..method_end];
    let rest = &buffer[method_end + 1..];

    let target_end = rest
        .iter()
        .position(|&b| b == b' ')
        .ok_or(RequestError::BadRequest)?;
    let target = &rest[..target_end];

    let (path, raw_query) = match target.iter().position(|&b| b == b'?') {
        Some(q) => (&target[..q], Some(&target[q + 1..])),
        None => (target, None),
    };

    let id_span = digit_run(path);
    let entity_id = parse_id(&path[id_span.clone()]);

    let route = Route::resolve(method, path, &id_span).ok_or(RequestError::NotFound)?;

    let query = match raw_query {
        Some(raw) => QueryParams::parse(raw)?,
        None => QueryParams::empty(),
    };

    let body = if method == b"POST" {
        let open = buffer
            .iter()
            .position(|&b| b == b'{')
            .ok_or(RequestError::BadRequest)?;
        Some(&buffer[open..])
    } else {
        None
    };

    Ok(Request {
        method,
        path,
        entity_id,
        route,
        query,
        body,
    })
}

/// First maximal run of ASCII digits in `path`; empty range at 0 when the
/// path holds no digits.
fn digit_run(path: &[u8]) -> Range<usize> {
    match path.iter().position(u8::is_ascii_digit) {
        Some(start) => {
            let len = path[start..]
                .iter()
                .take_while(|b| b.is_ascii_digit())
                .count();
            start..start + len
        }
        None => 0..0,
    }
}

fn parse_id(digits: &[u8]) -> u32 {
    let mut id: u64 = 0;
    for &b in digits {
        id = id * 10 + (b - b'0') as u64;
        if id > u32::MAX as u64 {
            return u32::MAX;
        }
    }
    id as u32
}

/// Decode a percent-encoded query value (`+` as space, `%XX` hex escapes).
/// `None` on a truncated or non-hex escape; consumers treat that as a
/// BadRequest rather than guessing.
pub fn percent_decode(value: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(value.len());
    let mut i = 0;
    while i < value.len() {
        match value[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => {
                let hi = (*value.get(i + 1)? as char).to_digit(16)?;
                let lo = (*value.get(i + 2)? as char).to_digit(16)?;
                out.push((hi * 16 + lo) as u8);
                i += 3;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BENCH_REQUEST: &[u8] = b"GET /users/752/visits?toDistance=49&toDate=1397433600&fromDate=1189209600 HTTP/1.1\r\nHost: localhost:8080\r\nConnection: keep-alive\r\n\r\n";

    #[test]
    fn parses_request_line_and_query() {
        let request = parse_request(BENCH_REQUEST).unwrap();
        assert_eq!(request.method, b"GET");
        assert_eq!(request.path, b"/users/752/visits");
        assert_eq!(request.entity_id, 752);
        assert_eq!(request.route, Route::GetUserVisits);
        assert_eq!(request.query.get(b"toDistance"), Some(&b"49"[..]));
        assert_eq!(request.query.get(b"toDate"), Some(&b"1397433600"[..]));
        assert_eq!(request.query.get(b"fromDate"), Some(&b"1189209600"[..]));
        assert_eq!(request.query.get(b"country"), None);
        assert!(request.body.is_none());
    }

    #[test]
    fn path_without_query_has_empty_params() {
        let request = parse_request(b"GET /users/1 HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(request.route, Route::GetUser);
        assert_eq!(request.entity_id, 1);
        assert!(request.query.is_empty());
    }

    #[test]
    fn digit_run_is_first_maximal_run() {
        assert_eq!(digit_run(b"/users/752/visits"), 7..10);
        assert_eq!(digit_run(b"/locations/9999999/avg"), 11..18);
        assert_eq!(digit_run(b"/users/new"), 0..0);
        assert_eq!(digit_run(b"/users/12a3"), 7..9);
    }

    #[test]
    fn id_saturates_instead_of_wrapping() {
        let request = parse_request(b"GET /users/99999999999999999999 HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(request.entity_id, u32::MAX);
    }

    #[test]
    fn path_without_digits_yields_id_zero() {
        let request = parse_request(b"POST /users/new HTTP/1.1\r\n\r\n{\"id\": 3}").unwrap();
        assert_eq!(request.entity_id, 0);
        assert_eq!(request.route, Route::CreateUser);
        assert_eq!(request.body.unwrap(), b"{\"id\": 3}");
    }

    #[test]
    fn unknown_route_is_not_found() {
        assert_eq!(
            parse_request(b"GET /unknown/5 HTTP/1.1\r\n\r\n").unwrap_err(),
            RequestError::NotFound
        );
        assert_eq!(
            parse_request(b"DELETE /users/5 HTTP/1.1\r\n\r\n").unwrap_err(),
            RequestError::NotFound
        );
        // Suffix after the id must match exactly.
        assert_eq!(
            parse_request(b"GET /users/12a3/visits HTTP/1.1\r\n\r\n").unwrap_err(),
            RequestError::NotFound
        );
    }

    #[test]
    fn malformed_query_pairs_are_bad_requests() {
        for raw in [
            &b"GET /users/1?fromDate HTTP/1.1\r\n\r\n"[..],
            b"GET /users/1?&fromDate=1 HTTP/1.1\r\n\r\n",
            b"GET /users/1?fromDate=1& HTTP/1.1\r\n\r\n",
        ] {
            assert_eq!(parse_request(raw).unwrap_err(), RequestError::BadRequest);
        }
    }

    #[test]
    fn post_without_body_is_bad_request() {
        assert_eq!(
            parse_request(b"POST /users/5 HTTP/1.1\r\nContent-Length: 0\r\n\r\n").unwrap_err(),
            RequestError::BadRequest
        );
    }

    #[test]
    fn percent_decoding() {
        assert_eq!(percent_decode(b"Russia").unwrap(), b"Russia");
        assert_eq!(percent_decode(b"%D0%A0%D1%84").unwrap(), "Рф".as_bytes());
        assert_eq!(percent_decode(b"New+Zealand").unwrap(), b"New Zealand");
        assert!(percent_decode(b"bad%2").is_none());
        assert!(percent_decode(b"bad%zz").is_none());
    }

    #[test]
    fn too_many_query_pairs_rejected() {
        let raw = b"GET /users/1?a=1&b=2&c=3&d=4&e=5&f=6&g=7&h=8&i=9 HTTP/1.1\r\n\r\n";
        assert_eq!(parse_request(raw).unwrap_err(), RequestError::BadRequest);
    }
}
