//! Query Engine
//!
//! The five read operations over the finalized store: three point lookups
//! and two filtered scans over pre-sorted VisitsIndex sequences. Filters are
//! parsed into per-route structs of plain fields; the key sets are small
//! and known, so no dynamic map is built per request.
//!
//! The inherited `0 == unset` convention is preserved throughout: a date,
//! distance, or age filter whose value is zero disables that bound, so a
//! genuine boundary at epoch zero or age zero cannot be expressed. That is
//! the documented contract of the dataset's consumers, not an oversight to
//! fix here.

use crate::error::{RequestError, RequestResult};
use crate::http::request::{percent_decode, QueryParams};
use crate::http::response;
use crate::store::{EntityStore, Location, User, Visit};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use std::sync::Arc;

/// Read-only query executor bound to a finalized store and the dataset's
/// generation timestamp (the reference point for age filters).
#[derive(Debug, Clone)]
pub struct QueryEngine {
    store: Arc<EntityStore>,
    generated_at: DateTime<Utc>,
}

impl QueryEngine {
    pub fn new(store: Arc<EntityStore>, generated_at: DateTime<Utc>) -> Self {
        Self {
            store,
            generated_at,
        }
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn user(&self, id: u32) -> RequestResult<&User> {
        self.store.user(id).ok_or(RequestError::NotFound)
    }

    pub fn location(&self, id: u32) -> RequestResult<&Location> {
        self.store.location(id).ok_or(RequestError::NotFound)
    }

    pub fn visit(&self, id: u32) -> RequestResult<&Visit> {
        self.store.visit(id).ok_or(RequestError::NotFound)
    }

    /// Prepare the visited-places scan for one user: validates the id and
    /// filter set up front, so every error precedes any buffer work.
    pub fn visited_places(&self, id: u32, params: &QueryParams) -> RequestResult<VisitedPlaces<'_>> {
        let user = self.user(id)?;
        let filter = VisitsFilter::parse(params)?;
        Ok(VisitedPlaces {
            store: &self.store,
            visit_ids: &user.visits,
            filter,
        })
    }

    /// Average mark of a location's surviving visits, rounded to five
    /// decimal digits. `None` when no visit survives; the caller renders
    /// the fixed empty-average body.
    pub fn avg_mark(&self, id: u32, params: &QueryParams) -> RequestResult<Option<f64>> {
        let location = self.location(id)?;
        let filter = AvgFilter::parse(params, self)?;

        let mut visit_count = 0u64;
        let mut mark_sum = 0u64;

        for &vid in &location.visits {
            let visit = self.store.visit_by_index(vid);
            let user = self.store.user_by_index(visit.user);
            if filter.matches(visit, user) {
                mark_sum += visit.mark as u64;
                visit_count += 1;
            }
        }

        if visit_count == 0 {
            return Ok(None);
        }

        let avg = mark_sum as f64 / visit_count as f64;
        Ok(Some((avg * 100_000.0).round() / 100_000.0))
    }

    /// `generated_at` minus a whole number of calendar years, as a unix
    /// timestamp. Feb 29 normalizes to Mar 1 in non-leap target years. An
    /// unrepresentable target year collapses to `i64::MIN`, which keeps the
    /// comparison semantics deterministic for absurd age values.
    fn birth_date_years_before(&self, years: i64) -> i64 {
        let date = self.generated_at.date_naive();
        let target_year = date.year() as i64 - years;

        let shifted = i32::try_from(target_year).ok().and_then(|year| {
            date.with_year(year)
                .or_else(|| NaiveDate::from_ymd_opt(year, 3, 1))
        });

        match shifted {
            Some(day) => NaiveDateTime::new(day, self.generated_at.time())
                .and_utc()
                .timestamp(),
            None => i64::MIN,
        }
    }
}

/// Filter set of the visited-places scan. Zero-valued bounds are unset.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct VisitsFilter {
    pub from_date: i64,
    pub to_date: i64,
    pub to_distance: i64,
    /// Percent-decoded country bytes; `None` when the filter is absent.
    pub country: Option<Vec<u8>>,
}

impl VisitsFilter {
    pub fn parse(params: &QueryParams) -> RequestResult<Self> {
        let mut filter = VisitsFilter {
            from_date: optional_int(params, b"fromDate")?,
            to_date: optional_int(params, b"toDate")?,
            to_distance: optional_int(params, b"toDistance")?,
            country: None,
        };

        if let Some(raw) = params.get(b"country") {
            if raw.is_empty() {
                return Err(RequestError::BadRequest);
            }
            filter.country = Some(percent_decode(raw).ok_or(RequestError::BadRequest)?);
        }

        Ok(filter)
    }

    /// All active predicates must hold. `from_date` is an exclusive lower
    /// bound; `to_date` is inclusive; `to_distance` keeps strictly nearer
    /// locations only.
    pub fn matches(&self, visit: &Visit, location: &Location) -> bool {
        if self.from_date != 0 && visit.visited_at <= self.from_date {
            return false;
        }
        if self.to_date != 0 && visit.visited_at > self.to_date {
            return false;
        }
        if let Some(country) = &self.country {
            if location.country.as_bytes() != country.as_slice() {
                return false;
            }
        }
        if self.to_distance != 0 && (location.distance as i64) >= self.to_distance {
            return false;
        }
        true
    }
}

/// Filter set of the average-mark scan. Dates are inclusive on both ends
/// here; age bounds are pre-resolved to birth-date cutoffs once per request.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AvgFilter {
    pub from_date: i64,
    pub to_date: i64,
    /// `0` unset, otherwise `b'm'` or `b'f'`.
    pub gender: u8,
    /// Latest admissible birth date (from `fromAge`).
    pub max_birth_date: Option<i64>,
    /// Earliest admissible birth date (from `toAge`).
    pub min_birth_date: Option<i64>,
}

impl AvgFilter {
    pub fn parse(params: &QueryParams, engine: &QueryEngine) -> RequestResult<Self> {
        let mut filter = AvgFilter {
            from_date: optional_int(params, b"fromDate")?,
            to_date: optional_int(params, b"toDate")?,
            ..AvgFilter::default()
        };

        if let Some(gender) = params.get(b"gender") {
            if gender != b"m" && gender != b"f" {
                return Err(RequestError::BadRequest);
            }
            filter.gender = gender[0];
        }

        let from_age = optional_int(params, b"fromAge")?;
        if from_age != 0 {
            filter.max_birth_date = Some(engine.birth_date_years_before(from_age));
        }
        let to_age = optional_int(params, b"toAge")?;
        if to_age != 0 {
            filter.min_birth_date = Some(engine.birth_date_years_before(to_age));
        }

        Ok(filter)
    }

    pub fn matches(&self, visit: &Visit, user: &User) -> bool {
        if self.from_date != 0 && visit.visited_at < self.from_date {
            return false;
        }
        if self.to_date != 0 && visit.visited_at > self.to_date {
            return false;
        }
        if self.gender != 0 && user.gender != self.gender {
            return false;
        }
        if let Some(max) = self.max_birth_date {
            if user.birth_date > max {
                return false;
            }
        }
        if let Some(min) = self.min_birth_date {
            if user.birth_date < min {
                return false;
            }
        }
        true
    }
}

/// A validated visited-places scan, ready to render. Splitting preparation
/// from rendering keeps pool interaction out of the query layer: the caller
/// answers the no-visits case from a static literal and only acquires a
/// scratch buffer when a body will actually be built.
#[derive(Debug)]
pub struct VisitedPlaces<'s> {
    store: &'s EntityStore,
    visit_ids: &'s [u32],
    filter: VisitsFilter,
}

impl VisitedPlaces<'_> {
    /// True when the user has no visits at all (before filtering).
    pub fn index_is_empty(&self) -> bool {
        self.visit_ids.is_empty()
    }

    /// Render `{"visits": [...]}` over the surviving visits, in the index's
    /// chronological order.
    pub fn render(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(b"{\"visits\": [");
        let mut first = true;
        for &vid in self.visit_ids {
            let visit = self.store.visit_by_index(vid);
            let location = self.store.location_by_index(visit.location);
            if !self.filter.matches(visit, location) {
                continue;
            }
            if !first {
                buf.push(b',');
            }
            first = false;
            response::append_visited_place(buf, visit, &location.place);
        }
        buf.extend_from_slice(b"]}");
    }
}

/// An integer-valued filter: absent reads as the unset sentinel `0`;
/// present-but-empty or non-integer values are BadRequest.
fn optional_int(params: &QueryParams, key: &[u8]) -> RequestResult<i64> {
    match params.get(key) {
        None => Ok(0),
        Some(value) => parse_i64(value).ok_or(RequestError::BadRequest),
    }
}

/// Strict full-slice signed integer parse; empty input, stray characters,
/// or overflow are all `None`.
fn parse_i64(value: &[u8]) -> Option<i64> {
    let (negative, digits) = match value {
        [b'-', rest @ ..] => (true, rest),
        _ => (false, value),
    };
    if digits.is_empty() {
        return None;
    }

    // Accumulate on the negative side so i64::MIN parses without overflow.
    let mut acc: i64 = 0;
    for &b in digits {
        if !b.is_ascii_digit() {
            return None;
        }
        let digit = (b - b'0') as i64;
        acc = acc.checked_mul(10)?.checked_sub(digit)?;
    }
    if negative {
        Some(acc)
    } else {
        acc.checked_neg()
    }
}
