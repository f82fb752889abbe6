//! Request Pipeline Benchmarks
//!
//! Measures the hot path end to end: request parsing and the three query
//! shapes the benchmark workload hammers hardest. The fixture store is
//! synthetic but mirrors the real dataset's shape (one user with a long
//! VisitsIndex, marks in 0..=5, clustered timestamps).

use chrono::DateTime;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::sync::Arc;
use travels::cache::PointCaches;
use travels::config::DatasetSize;
use travels::http::parse_request;
use travels::pool::BufferPool;
use travels::{handle_request, EntityStore, QueryEngine, ServiceState};

const VISITS_REQUEST: &[u8] = b"GET /users/752/visits?toDistance=49&toDate=1397433600&fromDate=1189209600 HTTP/1.1\r\nHost: localhost:8080\r\nConnection: keep-alive\r\n\r\n";
const AVG_REQUEST: &[u8] =
    b"GET /locations/1/avg?gender=m&fromAge=4&fromDate=1253680000 HTTP/1.1\r\nHost: localhost:8080\r\n\r\n";
const USER_REQUEST: &[u8] = b"GET /users/752 HTTP/1.1\r\nHost: localhost:8080\r\n\r\n";

fn fixture_state(point_cache: bool) -> ServiceState {
    let mut store = EntityStore::with_sizing(DatasetSize {
        users: 1000,
        locations: 100,
        visits: 10_000,
    });

    for id in 1..=1000u32 {
        let user = &mut store.users_mut()[id as usize - 1];
        user.id = id;
        user.email = format!("user{id}@example.com");
        user.first_name = "Generated".into();
        user.last_name = format!("Visitor{id}");
        user.gender = if id % 2 == 0 { b'f' } else { b'm' };
        user.birth_date = 315_532_800 + (id as i64) * 86_400 * 30;
    }

    for id in 1..=100u32 {
        let location = &mut store.locations_mut()[id as usize - 1];
        location.id = id;
        location.place = format!("Place {id}");
        location.country = if id % 3 == 0 { "Russia" } else { "Egypt" }.into();
        location.city = format!("City {id}");
        location.distance = id % 120;
    }

    for id in 1..=10_000u32 {
        let user = (id % 1000) + 1;
        let location = (id % 100) + 1;
        let visit = &mut store.visits_mut()[id as usize - 1];
        visit.id = id;
        visit.user = user;
        visit.location = location;
        visit.visited_at = 1_150_000_000 + (id as i64) * 25_000;
        visit.mark = (id % 6) as u8;
        store.users_mut()[user as usize - 1].visits.push(id);
        store.locations_mut()[location as usize - 1].visits.push(id);
    }

    store.finalize();

    ServiceState {
        engine: QueryEngine::new(
            Arc::new(store),
            DateTime::from_timestamp(1_503_695_452, 0).expect("fixture timestamp"),
        ),
        buffers: BufferPool::default(),
        caches: point_cache.then(|| PointCaches::with_sizing(false)),
    }
}

fn bench_parse_request(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_request");
    group.throughput(Throughput::Elements(1));
    group.bench_function("visits_with_filters", |b| {
        b.iter(|| parse_request(black_box(VISITS_REQUEST)).unwrap())
    });
    group.bench_function("point_lookup", |b| {
        b.iter(|| parse_request(black_box(USER_REQUEST)).unwrap())
    });
    group.finish();
}

fn bench_queries(c: &mut Criterion) {
    let state = fixture_state(false);
    let mut out = Vec::with_capacity(4096);

    let mut group = c.benchmark_group("handle_request");
    group.throughput(Throughput::Elements(1));
    group.bench_function("get_user", |b| {
        b.iter(|| {
            out.clear();
            handle_request(&state, black_box(USER_REQUEST), &mut out);
            black_box(out.len())
        })
    });
    group.bench_function("get_visited_places", |b| {
        b.iter(|| {
            out.clear();
            handle_request(&state, black_box(VISITS_REQUEST), &mut out);
            black_box(out.len())
        })
    });
    group.bench_function("get_avg_mark", |b| {
        b.iter(|| {
            out.clear();
            handle_request(&state, black_box(AVG_REQUEST), &mut out);
            black_box(out.len())
        })
    });
    group.finish();
}

fn bench_cached_point_lookup(c: &mut Criterion) {
    let state = fixture_state(true);
    let mut out = Vec::with_capacity(4096);

    // Warm the cache entry once.
    handle_request(&state, USER_REQUEST, &mut out);

    c.bench_function("get_user_cached", |b| {
        b.iter(|| {
            out.clear();
            handle_request(&state, black_box(USER_REQUEST), &mut out);
            black_box(out.len())
        })
    });
}

criterion_group!(
    benches,
    bench_parse_request,
    bench_queries,
    bench_cached_point_lookup
);
criterion_main!(benches);
