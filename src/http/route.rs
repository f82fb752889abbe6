//! Route Table
//!
//! The fixed set of request shapes this service answers, matched once per
//! request. Matching follows the id-placeholder rule: the path's digit run
//! compares as the literal `<id>` token, so `/users/752` and `/users/9999999`
//! resolve identically. Patterns are pre-split around the placeholder; no
//! rewritten path is ever materialized.

use std::ops::Range;

/// Placeholder token standing in for a path's digit run during comparison.
pub const ID_PLACEHOLDER: &[u8] = b"<id>";

/// Every route the service recognizes. The create/update routes exist
/// structurally: they resolve, but no handler mutates anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    GetUser,
    GetLocation,
    GetVisit,
    GetUserVisits,
    GetLocationAvg,
    CreateUser,
    CreateLocation,
    CreateVisit,
    UpdateUser,
    UpdateLocation,
    UpdateVisit,
}

struct RoutePattern {
    post: bool,
    /// Pattern bytes before the `<id>` placeholder (whole pattern when
    /// `has_id` is false).
    prefix: &'static [u8],
    /// Pattern bytes after the placeholder.
    suffix: &'static [u8],
    has_id: bool,
    route: Route,
}

const ROUTES: &[RoutePattern] = &[
    RoutePattern {
        post: false,
        prefix: b"/users/",
        suffix: b"",
        has_id: true,
        route: Route::GetUser,
    },
    RoutePattern {
        post: false,
        prefix: b"/locations/",
        suffix: b"",
        has_id: true,
        route: Route::GetLocation,
    },
    RoutePattern {
        post: false,
        prefix: b"/visits/",
        suffix: b"",
        has_id: true,
        route: Route::GetVisit,
    },
    RoutePattern {
        post: false,
        prefix: b"/users/",
        suffix: b"/visits",
        has_id: true,
        route: Route::GetUserVisits,
    },
    RoutePattern {
        post: false,
        prefix: b"/locations/",
        suffix: b"/avg",
        has_id: true,
        route: Route::GetLocationAvg,
    },
    RoutePattern {
        post: true,
        prefix: b"/users/new",
        suffix: b"",
        has_id: false,
        route: Route::CreateUser,
    },
    RoutePattern {
        post: true,
        prefix: b"/locations/new",
        suffix: b"",
        has_id: false,
        route: Route::CreateLocation,
    },
    RoutePattern {
        post: true,
        prefix: b"/visits/new",
        suffix: b"",
        has_id: false,
        route: Route::CreateVisit,
    },
    RoutePattern {
        post: true,
        prefix: b"/users/",
        suffix: b"",
        has_id: true,
        route: Route::UpdateUser,
    },
    RoutePattern {
        post: true,
        prefix: b"/locations/",
        suffix: b"",
        has_id: true,
        route: Route::UpdateLocation,
    },
    RoutePattern {
        post: true,
        prefix: b"/visits/",
        suffix: b"",
        has_id: true,
        route: Route::UpdateVisit,
    },
];

impl Route {
    /// Resolve `(method, path)` against the route table, treating the digit
    /// run named by `id_span` as the `<id>` placeholder. `None` means the
    /// caller must answer NotFound without executing any query.
    pub fn resolve(method: &[u8], path: &[u8], id_span: &Range<usize>) -> Option<Route> {
        let post = if method == b"GET" {
            false
        } else if method == b"POST" {
            true
        } else {
            return None;
        };

        ROUTES
            .iter()
            .find(|pattern| pattern.post == post && pattern.matches(path, id_span))
            .map(|pattern| pattern.route)
    }

    pub fn is_point_lookup(self) -> bool {
        matches!(self, Route::GetUser | Route::GetLocation | Route::GetVisit)
    }
}

impl RoutePattern {
    fn matches(&self, path: &[u8], id_span: &Range<usize>) -> bool {
        if id_span.is_empty() {
            // No digit run: the substituted path is the path itself. An
            // id-bearing pattern can still match its literal placeholder
            // spelling; lookups then see id 0, which is always a miss.
            return if self.has_id {
                path.len() == self.prefix.len() + ID_PLACEHOLDER.len() + self.suffix.len()
                    && path.starts_with(self.prefix)
                    && path.ends_with(self.suffix)
                    && &path[self.prefix.len()..self.prefix.len() + ID_PLACEHOLDER.len()]
                        == ID_PLACEHOLDER
            } else {
                path == self.prefix
            };
        }

        self.has_id && &path[..id_span.start] == self.prefix && &path[id_span.end..] == self.suffix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(method: &str, path: &str) -> Option<Route> {
        let bytes = path.as_bytes();
        let span = match bytes.iter().position(|b| b.is_ascii_digit()) {
            Some(start) => {
                let len = bytes[start..]
                    .iter()
                    .take_while(|b| b.is_ascii_digit())
                    .count();
                start..start + len
            }
            None => 0..0,
        };
        Route::resolve(method.as_bytes(), bytes, &span)
    }

    #[test]
    fn get_routes_resolve() {
        assert_eq!(resolve("GET", "/users/752"), Some(Route::GetUser));
        assert_eq!(resolve("GET", "/locations/3"), Some(Route::GetLocation));
        assert_eq!(resolve("GET", "/visits/100620"), Some(Route::GetVisit));
        assert_eq!(resolve("GET", "/users/752/visits"), Some(Route::GetUserVisits));
        assert_eq!(resolve("GET", "/locations/10/avg"), Some(Route::GetLocationAvg));
    }

    #[test]
    fn post_routes_resolve_structurally() {
        assert_eq!(resolve("POST", "/users/new"), Some(Route::CreateUser));
        assert_eq!(resolve("POST", "/locations/new"), Some(Route::CreateLocation));
        assert_eq!(resolve("POST", "/visits/new"), Some(Route::CreateVisit));
        assert_eq!(resolve("POST", "/users/752"), Some(Route::UpdateUser));
        assert_eq!(resolve("POST", "/locations/752"), Some(Route::UpdateLocation));
        assert_eq!(resolve("POST", "/visits/752"), Some(Route::UpdateVisit));
    }

    #[test]
    fn classification_is_stable_across_id_magnitudes() {
        for id in ["1", "42", "752", "10062", "9999999"] {
            assert_eq!(resolve("GET", &format!("/users/{id}")), Some(Route::GetUser));
            assert_eq!(
                resolve("GET", &format!("/users/{id}/visits")),
                Some(Route::GetUserVisits)
            );
            assert_eq!(
                resolve("GET", &format!("/locations/{id}/avg")),
                Some(Route::GetLocationAvg)
            );
        }
    }

    #[test]
    fn mismatches_do_not_resolve() {
        assert_eq!(resolve("GET", "/users/new"), None);
        assert_eq!(resolve("GET", "/users/5/avg"), None);
        assert_eq!(resolve("GET", "/locations/5/visits"), None);
        assert_eq!(resolve("POST", "/users/5/visits"), None);
        assert_eq!(resolve("PUT", "/users/5"), None);
        assert_eq!(resolve("GET", "/users"), None);
    }

    #[test]
    fn literal_placeholder_path_resolves_like_the_substituted_form() {
        assert_eq!(resolve("GET", "/users/<id>"), Some(Route::GetUser));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Substituting the digit run and comparing recovers the same
            /// classification for any id magnitude.
            #[test]
            fn classification_is_invariant_in_the_id(id in 1u64..=9_999_999) {
                prop_assert_eq!(resolve("GET", &format!("/users/{id}")), Some(Route::GetUser));
                prop_assert_eq!(resolve("GET", &format!("/locations/{id}")), Some(Route::GetLocation));
                prop_assert_eq!(resolve("GET", &format!("/visits/{id}")), Some(Route::GetVisit));
                prop_assert_eq!(
                    resolve("GET", &format!("/users/{id}/visits")),
                    Some(Route::GetUserVisits)
                );
                prop_assert_eq!(
                    resolve("GET", &format!("/locations/{id}/avg")),
                    Some(Route::GetLocationAvg)
                );
                prop_assert_eq!(resolve("POST", &format!("/users/{id}")), Some(Route::UpdateUser));
                prop_assert_eq!(resolve("GET", &format!("/users/{id}/avg")), None);
            }
        }
    }
}
