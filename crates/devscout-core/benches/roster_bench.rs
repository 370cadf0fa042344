//! Benchmarks for the device roster fold.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use devscout_core::{DeviceRoster, Sighting};
use uuid::Uuid;

fn bench_observe_new_identities(c: &mut Criterion) {
    let sightings: Vec<Sighting> = (0..256)
        .map(|i| Sighting::ShortRange {
            peripheral_id: Uuid::new_v4(),
            local_name: Some(format!("device-{i}")),
            rssi: -60,
        })
        .collect();

    c.bench_function("roster_observe_256_new", |b| {
        b.iter(|| {
            let mut roster = DeviceRoster::new();
            for sighting in &sightings {
                roster.observe(black_box(sighting));
            }
            roster.len()
        })
    });
}

fn bench_observe_repeat_sightings(c: &mut Criterion) {
    let peripheral_id = Uuid::new_v4();

    c.bench_function("roster_observe_repeat_updates", |b| {
        b.iter(|| {
            let mut roster = DeviceRoster::new();
            for rssi in -90..-30 {
                roster.observe(black_box(&Sighting::ShortRange {
                    peripheral_id,
                    local_name: None,
                    rssi,
                }));
            }
            roster.len()
        })
    });
}

criterion_group!(benches, bench_observe_new_identities, bench_observe_repeat_sightings);
criterion_main!(benches);
