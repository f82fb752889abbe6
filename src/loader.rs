//! Bulk Data Loader
//!
//! One-shot producer that populates a pre-sized [`EntityStore`] from a
//! directory tree of fixed-schema data files before serving begins. A file's
//! category is decided by its name (`user` / `location` / `visit`); each file
//! holds one JSON-like array with a known fixed-length prefix, and the loader
//! carves the next `{...}` object as one record rather than running a general
//! JSON parser. Named fields are extracted by value, ignoring field order and
//! any extra fields.
//!
//! Visit records additionally append the visit id to the referenced user's
//! and location's back-reference sequences. All failures here are fatal
//! startup errors; nothing is served from a partially loaded store.

use crate::error::{LoadError, LoadResult};
use crate::store::EntityStore;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Array prefix lengths per category: `{"users": [`, `{"visits": [`,
/// `{"locations": [`.
const USERS_PREFIX: usize = 11;
const VISITS_PREFIX: usize = 12;
const LOCATIONS_PREFIX: usize = 15;

/// Totals reported after a successful load.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoadSummary {
    pub files: usize,
    pub users: usize,
    pub locations: usize,
    pub visits: usize,
}

/// Walk `dir` and populate `store` from every recognized data file. The
/// placeholder-then-fill store makes traversal order irrelevant; a visit may
/// reference a user whose file has not been read yet.
pub fn load_directory(store: &mut EntityStore, dir: &Path) -> LoadResult<LoadSummary> {
    let mut files = Vec::new();
    collect_files(dir, &mut files)?;

    let mut summary = LoadSummary::default();

    for path in &files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        // Category check order: user, then location, then visit.
        if name.contains("user") {
            summary.users += load_file(store, path, Category::Users)?;
        } else if name.contains("location") {
            summary.locations += load_file(store, path, Category::Locations)?;
        } else if name.contains("visit") {
            summary.visits += load_file(store, path, Category::Visits)?;
        } else {
            warn!(file = %path.display(), "skipping unrecognized data file");
            continue;
        }
        summary.files += 1;
    }

    Ok(summary)
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> LoadResult<()> {
    let entries = fs::read_dir(dir).map_err(|source| LoadError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    for entry in entries {
        let entry = entry.map_err(|source| LoadError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    Users,
    Locations,
    Visits,
}

impl Category {
    fn prefix(self) -> usize {
        match self {
            Category::Users => USERS_PREFIX,
            Category::Locations => LOCATIONS_PREFIX,
            Category::Visits => VISITS_PREFIX,
        }
    }
}

fn load_file(store: &mut EntityStore, path: &Path, category: Category) -> LoadResult<usize> {
    let data = fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut records = RecordCarver::new(&data, category.prefix());
    let mut count = 0usize;

    while let Some((offset, record)) = records.next_record() {
        let ctx = RecordCtx { path, offset };
        match category {
            Category::Users => load_user(store, record, &ctx)?,
            Category::Locations => load_location(store, record, &ctx)?,
            Category::Visits => load_visit(store, record, &ctx)?,
        }
        count += 1;
    }

    debug!(file = %path.display(), records = count, "loaded data file");
    Ok(count)
}

fn load_user(store: &mut EntityStore, record: &[u8], ctx: &RecordCtx) -> LoadResult<()> {
    let id = entity_slot(ctx.int(record, "id")?, store.users.len(), ctx)?;
    let user = &mut store.users[id as usize - 1];
    user.id = id;
    user.birth_date = ctx.int(record, "birth_date")?;
    user.email = ctx.string(record, "email")?;
    user.first_name = ctx.string(record, "first_name")?;
    user.last_name = ctx.string(record, "last_name")?;
    user.gender = ctx
        .string(record, "gender")?
        .bytes()
        .next()
        .ok_or_else(|| ctx.malformed())?;
    Ok(())
}

fn load_location(store: &mut EntityStore, record: &[u8], ctx: &RecordCtx) -> LoadResult<()> {
    let id = entity_slot(ctx.int(record, "id")?, store.locations.len(), ctx)?;
    let location = &mut store.locations[id as usize - 1];
    location.id = id;
    location.city = ctx.string(record, "city")?;
    location.country = ctx.string(record, "country")?;
    location.place = ctx.string(record, "place")?;
    location.distance = ctx.int(record, "distance")? as u32;
    Ok(())
}

fn load_visit(store: &mut EntityStore, record: &[u8], ctx: &RecordCtx) -> LoadResult<()> {
    let id = entity_slot(ctx.int(record, "id")?, store.visits.len(), ctx)?;
    let user_id = ctx.int(record, "user")?;
    let location_id = ctx.int(record, "location")?;

    if user_id < 1 || user_id as usize > store.users.len() {
        return Err(LoadError::UnknownReference {
            visit: id,
            kind: "user",
            id: user_id.max(0) as u64,
        });
    }
    if location_id < 1 || location_id as usize > store.locations.len() {
        return Err(LoadError::UnknownReference {
            visit: id,
            kind: "location",
            id: location_id.max(0) as u64,
        });
    }

    let visit = &mut store.visits[id as usize - 1];
    visit.id = id;
    visit.user = user_id as u32;
    visit.location = location_id as u32;
    visit.visited_at = ctx.int(record, "visited_at")?;
    visit.mark = ctx.int(record, "mark")? as u8;

    store.users[user_id as usize - 1].visits.push(id);
    store.locations[location_id as usize - 1].visits.push(id);
    Ok(())
}

/// Validate a record id against the pre-sized array it must land in.
fn entity_slot(id: i64, len: usize, ctx: &RecordCtx) -> LoadResult<u32> {
    if id < 1 || id as usize > len {
        return Err(ctx.malformed());
    }
    Ok(id as u32)
}

/// Brace-delimited record scanner owned by the loading call; no global state.
struct RecordCarver<'a> {
    data: &'a [u8],
    cursor: usize,
}

impl<'a> RecordCarver<'a> {
    fn new(data: &'a [u8], prefix: usize) -> Self {
        Self {
            data,
            cursor: prefix.min(data.len()),
        }
    }

    /// Carve the next `{...}` object, returning its byte offset and slice.
    fn next_record(&mut self) -> Option<(usize, &'a [u8])> {
        let rest = &self.data[self.cursor..];
        let open = rest.iter().position(|&b| b == b'{')?;
        let start = self.cursor + open;
        let close = self.data[start..].iter().position(|&b| b == b'}')?;
        let end = start + close;
        self.cursor = end + 1;
        Some((start, &self.data[start..=end]))
    }
}

/// Error-construction context for one carved record.
struct RecordCtx<'a> {
    path: &'a Path,
    offset: usize,
}

impl RecordCtx<'_> {
    fn malformed(&self) -> LoadError {
        LoadError::MalformedRecord {
            path: self.path.to_path_buf(),
            offset: self.offset,
        }
    }

    fn int(&self, record: &[u8], field: &'static str) -> LoadResult<i64> {
        let value = find_value(record, field).ok_or(LoadError::MissingField {
            path: self.path.to_path_buf(),
            field,
        })?;
        parse_int_prefix(value).ok_or(LoadError::InvalidNumber {
            path: self.path.to_path_buf(),
            field,
        })
    }

    fn string(&self, record: &[u8], field: &'static str) -> LoadResult<String> {
        let value = find_value(record, field).ok_or(LoadError::MissingField {
            path: self.path.to_path_buf(),
            field,
        })?;
        parse_string(value).ok_or_else(|| self.malformed())
    }
}

/// Locate `"name"` inside a record and return the slice starting at its
/// value. Field order and unknown fields are irrelevant.
fn find_value<'r>(record: &'r [u8], name: &str) -> Option<&'r [u8]> {
    let mut pattern = Vec::with_capacity(name.len() + 2);
    pattern.push(b'"');
    pattern.extend_from_slice(name.as_bytes());
    pattern.push(b'"');

    let key_at = record
        .windows(pattern.len())
        .position(|window| window == pattern.as_slice())?;

    let mut rest = &record[key_at + pattern.len()..];
    rest = skip_ws(rest);
    rest = rest.strip_prefix(b":")?;
    Some(skip_ws(rest))
}

fn skip_ws(mut bytes: &[u8]) -> &[u8] {
    while let [b' ' | b'\t' | b'\n' | b'\r', rest @ ..] = bytes {
        bytes = rest;
    }
    bytes
}

/// Parse a leading (optionally signed) integer; `None` on no digits or
/// overflow.
fn parse_int_prefix(value: &[u8]) -> Option<i64> {
    let (negative, digits) = match value {
        [b'-', rest @ ..] => (true, rest),
        _ => (false, value),
    };

    let mut seen = false;
    let mut acc: i64 = 0;
    for &b in digits {
        if !b.is_ascii_digit() {
            break;
        }
        seen = true;
        acc = acc.checked_mul(10)?.checked_add((b - b'0') as i64)?;
    }

    if !seen {
        return None;
    }
    Some(if negative { -acc } else { acc })
}

/// Parse a quoted string value, resolving the escapes the source data uses
/// (`\"`, `\\`, `\/`, `\n`, `\r`, `\t`, `\uXXXX` with surrogate pairs). Raw
/// UTF-8 passes through byte-for-byte.
fn parse_string(value: &[u8]) -> Option<String> {
    let mut bytes = value.strip_prefix(b"\"")?.iter();
    let mut out: Vec<u8> = Vec::new();
    let mut utf8 = [0u8; 4];

    loop {
        match bytes.next()? {
            b'"' => return String::from_utf8(out).ok(),
            b'\\' => match bytes.next()? {
                b'"' => out.push(b'"'),
                b'\\' => out.push(b'\\'),
                b'/' => out.push(b'/'),
                b'n' => out.push(b'\n'),
                b'r' => out.push(b'\r'),
                b't' => out.push(b'\t'),
                b'u' => {
                    let unit = hex_unit(&mut bytes)?;
                    let decoded = if (0xD800..0xDC00).contains(&unit) {
                        // High surrogate; the low half must follow as \uXXXX.
                        if bytes.next()? != &b'\\' || bytes.next()? != &b'u' {
                            return None;
                        }
                        let low = hex_unit(&mut bytes)?;
                        if !(0xDC00..0xE000).contains(&low) {
                            return None;
                        }
                        let combined =
                            0x10000 + ((unit as u32 - 0xD800) << 10) + (low as u32 - 0xDC00);
                        char::from_u32(combined)?
                    } else {
                        char::from_u32(unit as u32)?
                    };
                    out.extend_from_slice(decoded.encode_utf8(&mut utf8).as_bytes());
                }
                _ => return None,
            },
            &b => out.push(b),
        }
    }
}

fn hex_unit(bytes: &mut std::slice::Iter<'_, u8>) -> Option<u16> {
    let mut unit: u16 = 0;
    for _ in 0..4 {
        let b = *bytes.next()?;
        let digit = (b as char).to_digit(16)? as u16;
        unit = (unit << 4) | digit;
    }
    Some(unit)
}
