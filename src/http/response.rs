//! Response Builder
//!
//! Every response the service emits follows one template: status line,
//! `Content-Length`, `Content-Type`, `Connection: Keep-Alive`, blank line,
//! body. Entity and aggregate bodies are rendered directly into scratch
//! buffers as raw bytes; field order is a compatibility contract (JSON
//! projections below), so no serializer sits between the store and the wire.
//! The 400/404 and empty-result responses are pre-rendered literals that
//! involve no buffer pool interaction.
//!
//! JSON projections (fixed field order):
//! - user: `first_name,last_name,gender,email,birth_date,id`
//! - location: `distance,city,country,place,id`
//! - visit: `mark,visited_at,user,id,location`
//! - visit inside a visited-places list: `mark,visited_at,place`

use crate::error::RequestError;
use crate::store::{Location, User, Visit};

pub const NOT_FOUND: &[u8] = b"HTTP/1.1 404 Not Found\r\n\
Content-Length: 9\r\n\
Content-Type: text/plain\r\n\
Connection: Keep-Alive\r\n\
\r\n\
Not Found";

pub const BAD_REQUEST: &[u8] = b"HTTP/1.1 400 Bad Request\r\n\
Content-Length: 11\r\n\
Content-Type: text/plain\r\n\
Connection: Keep-Alive\r\n\
\r\n\
Bad Request";

pub const EMPTY_VISITS: &[u8] = b"HTTP/1.1 200 OK\r\n\
Content-Length: 14\r\n\
Content-Type: application/json\r\n\
Connection: Keep-Alive\r\n\
\r\n\
{\"visits\": []}";

pub const EMPTY_AVG: &[u8] = b"HTTP/1.1 200 OK\r\n\
Content-Length: 10\r\n\
Content-Type: application/json\r\n\
Connection: Keep-Alive\r\n\
\r\n\
{\"avg\": 0}";

/// The pre-rendered response for a request-level failure.
pub fn static_error(error: RequestError) -> &'static [u8] {
    match error {
        RequestError::BadRequest => BAD_REQUEST,
        RequestError::NotFound => NOT_FOUND,
    }
}

/// Wrap a rendered JSON body in the 200 response template.
pub fn write_json_ok(out: &mut Vec<u8>, body: &[u8]) {
    out.extend_from_slice(b"HTTP/1.1 200 OK\r\nContent-Length: ");
    append_uint(out, body.len() as u64);
    out.extend_from_slice(b"\r\nContent-Type: application/json\r\nConnection: Keep-Alive\r\n\r\n");
    out.extend_from_slice(body);
}

/// Append a decimal integer without going through the formatting machinery.
pub fn append_uint(buf: &mut Vec<u8>, mut value: u64) {
    let mut digits = [0u8; 20];
    let mut at = digits.len();
    loop {
        at -= 1;
        digits[at] = b'0' + (value % 10) as u8;
        value /= 10;
        if value == 0 {
            break;
        }
    }
    buf.extend_from_slice(&digits[at..]);
}

pub fn append_int(buf: &mut Vec<u8>, value: i64) {
    if value < 0 {
        buf.push(b'-');
        append_uint(buf, value.unsigned_abs());
    } else {
        append_uint(buf, value as u64);
    }
}

pub fn append_user(buf: &mut Vec<u8>, user: &User) {
    buf.extend_from_slice(b"{\"first_name\":\"");
    buf.extend_from_slice(user.first_name.as_bytes());
    buf.extend_from_slice(b"\",\"last_name\":\"");
    buf.extend_from_slice(user.last_name.as_bytes());
    buf.extend_from_slice(b"\",\"gender\":\"");
    buf.push(user.gender);
    buf.extend_from_slice(b"\",\"email\":\"");
    buf.extend_from_slice(user.email.as_bytes());
    buf.extend_from_slice(b"\",\"birth_date\":");
    append_int(buf, user.birth_date);
    buf.extend_from_slice(b",\"id\":");
    append_uint(buf, user.id as u64);
    buf.push(b'}');
}

pub fn append_location(buf: &mut Vec<u8>, location: &Location) {
    buf.extend_from_slice(b"{\"distance\":");
    append_uint(buf, location.distance as u64);
    buf.extend_from_slice(b",\"city\":\"");
    buf.extend_from_slice(location.city.as_bytes());
    buf.extend_from_slice(b"\",\"country\":\"");
    buf.extend_from_slice(location.country.as_bytes());
    buf.extend_from_slice(b"\",\"place\":\"");
    buf.extend_from_slice(location.place.as_bytes());
    buf.extend_from_slice(b"\",\"id\":");
    append_uint(buf, location.id as u64);
    buf.push(b'}');
}

pub fn append_visit(buf: &mut Vec<u8>, visit: &Visit) {
    buf.extend_from_slice(b"{\"mark\":");
    append_uint(buf, visit.mark as u64);
    buf.extend_from_slice(b",\"visited_at\":");
    append_int(buf, visit.visited_at);
    buf.extend_from_slice(b",\"user\":");
    append_uint(buf, visit.user as u64);
    buf.extend_from_slice(b",\"id\":");
    append_uint(buf, visit.id as u64);
    buf.extend_from_slice(b",\"location\":");
    append_uint(buf, visit.location as u64);
    buf.push(b'}');
}

/// The trimmed projection used inside a visited-places list; `place` comes
/// from the visit's location.
pub fn append_visited_place(buf: &mut Vec<u8>, visit: &Visit, place: &str) {
    buf.extend_from_slice(b"{\"mark\":");
    append_uint(buf, visit.mark as u64);
    buf.extend_from_slice(b",\"visited_at\":");
    append_int(buf, visit.visited_at);
    buf.extend_from_slice(b",\"place\":\"");
    buf.extend_from_slice(place.as_bytes());
    buf.extend_from_slice(b"\"}");
}

/// Render an average in the fixed compatibility form: six fractional digits,
/// scientific notation, sign and two-digit exponent, at f32 precision, as in
/// `4.666670e+00`. The exact byte shape is contractual, not stylistic.
pub fn append_avg(buf: &mut Vec<u8>, avg: f64) {
    let rendered = format!("{:.6e}", avg as f32);
    let (mantissa, exponent) = rendered.split_once('e').unwrap_or((rendered.as_str(), "0"));
    buf.extend_from_slice(mantissa.as_bytes());
    buf.push(b'e');
    let (sign, digits) = match exponent.strip_prefix('-') {
        Some(rest) => (b'-', rest),
        None => (b'+', exponent),
    };
    buf.push(sign);
    if digits.len() < 2 {
        buf.push(b'0');
    }
    buf.extend_from_slice(digits.as_bytes());
}
