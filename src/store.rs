//! In-Memory Entity Store
//!
//! Arena-style storage for the three entity kinds. Every entity lives in a
//! flat array pre-sized to the known dataset cardinality, and an entity's
//! 1-based id is its position in that array, so point lookups are a single
//! bounds-checked index. Cross-entity references are stored as ids rather
//! than pointers: a visit loaded before its user exists still names the slot
//! the user file will later fill, which makes load order across file
//! categories irrelevant.
//!
//! After [`EntityStore::finalize`] the store is never mutated again, so all
//! event-loop workers read it concurrently without synchronization.

use crate::config::DatasetSize;

/// A registered user. `visits` is the VisitsIndex: ids of every visit naming
/// this user, sorted ascending by visited-at once the store is finalized.
#[derive(Debug, Default)]
pub struct User {
    pub id: u32,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// `b'm'` or `b'f'`.
    pub gender: u8,
    /// Seconds since epoch; negative for births before 1970.
    pub birth_date: i64,
    pub visits: Vec<u32>,
}

/// A visitable place. `visits` mirrors [`User::visits`].
#[derive(Debug, Default)]
pub struct Location {
    pub id: u32,
    pub place: String,
    pub country: String,
    pub city: String,
    pub distance: u32,
    pub visits: Vec<u32>,
}

/// One visit of one user to one location. `user` and `location` are 1-based
/// ids into the sibling arrays, never absent once load completes.
#[derive(Debug, Default)]
pub struct Visit {
    pub id: u32,
    pub user: u32,
    pub location: u32,
    pub visited_at: i64,
    pub mark: u8,
}

/// The immutable dataset. Built single-threaded by the loader, finalized
/// once, then shared read-only across workers.
#[derive(Debug)]
pub struct EntityStore {
    pub(crate) users: Vec<User>,
    pub(crate) locations: Vec<Location>,
    pub(crate) visits: Vec<Visit>,
}

impl EntityStore {
    /// Allocate placeholder entities for the full dataset up front. Visit
    /// records loaded at any point of the traversal can then reference slots
    /// that a later-processed file will populate.
    pub fn with_sizing(sizing: DatasetSize) -> Self {
        let mut users = Vec::with_capacity(sizing.users);
        users.resize_with(sizing.users, User::default);
        let mut locations = Vec::with_capacity(sizing.locations);
        locations.resize_with(sizing.locations, Location::default);
        let mut visits = Vec::with_capacity(sizing.visits);
        visits.resize_with(sizing.visits, Visit::default);

        Self {
            users,
            locations,
            visits,
        }
    }

    /// O(1) point lookup; id 0 and ids beyond the array are a miss.
    pub fn user(&self, id: u32) -> Option<&User> {
        id.checked_sub(1).and_then(|i| self.users.get(i as usize))
    }

    pub fn location(&self, id: u32) -> Option<&Location> {
        id.checked_sub(1)
            .and_then(|i| self.locations.get(i as usize))
    }

    pub fn visit(&self, id: u32) -> Option<&Visit> {
        id.checked_sub(1).and_then(|i| self.visits.get(i as usize))
    }

    /// Resolve a visit id already known to be in range (loader-validated).
    pub(crate) fn visit_by_index(&self, id: u32) -> &Visit {
        &self.visits[(id - 1) as usize]
    }

    pub(crate) fn location_by_index(&self, id: u32) -> &Location {
        &self.locations[(id - 1) as usize]
    }

    pub(crate) fn user_by_index(&self, id: u32) -> &User {
        &self.users[(id - 1) as usize]
    }

    /// Population-phase access for the loader and for test fixtures. Nothing
    /// may hold these borrows once serving starts; `finalize` is the last
    /// mutation of the store's lifetime.
    pub fn users_mut(&mut self) -> &mut [User] {
        &mut self.users
    }

    pub fn locations_mut(&mut self) -> &mut [Location] {
        &mut self.locations
    }

    pub fn visits_mut(&mut self) -> &mut [Visit] {
        &mut self.visits
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn location_count(&self) -> usize {
        self.locations.len()
    }

    pub fn visit_count(&self) -> usize {
        self.visits.len()
    }

    /// Sort every VisitsIndex ascending by visited-at. Invoked exactly once
    /// after the loader completes; the sort is stable, so visits sharing a
    /// timestamp keep their load order and repeat invocations cannot change
    /// the ordering.
    pub fn finalize(&mut self) {
        let visits = &self.visits;
        for user in &mut self.users {
            user.visits
                .sort_by_key(|&vid| visits[(vid - 1) as usize].visited_at);
        }
        for location in &mut self.locations {
            location
                .visits
                .sort_by_key(|&vid| visits[(vid - 1) as usize].visited_at);
        }
    }
}
