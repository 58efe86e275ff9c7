//! Criterion benchmarks for the two per-event hot paths.
//!
//! Every raw input event funnels through a key/button table lookup and then a
//! cell fold. Both run once per event, potentially thousands of times per
//! update tick when a gamepad streams axis data, so they need to stay in the
//! nanosecond range.
//!
//! # How to run
//!
//! ```bash
//! cargo bench --package unihid-core --bench cell_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use unihid_core::cell::InputCell;
use unihid_core::keymap;

/// A spread of native key codes covering mapped letters, function keys,
/// aliased codes, and the unmapped fallback path.
const BENCH_KEY_CODES: &[u16] = &[
    30,  // A
    44,  // Z
    28,  // Enter
    1,   // Esc
    57,  // Space
    59,  // F1
    88,  // F12
    96,  // keypad Enter (alias)
    103, // ArrowUp
    194, // F24
    84,  // unmapped
    255, // unmapped
];

fn bench_cell_fold(c: &mut Criterion) {
    let mut group = c.benchmark_group("cell");

    // Steady-state fold: the value alternates so the digital state flips on
    // every write, exercising the timestamp update path.
    group.bench_function("fold_alternating", |b| {
        let mut cell = InputCell::default();
        cell.set_threshold(0.5);
        let mut ts = 1u64;
        b.iter(|| {
            let value = if ts % 2 == 0 { 1.0 } else { 0.0 };
            ts += 1;
            black_box(cell.apply(black_box(value), ts))
        })
    });

    // Quiet fold: identical values, the common case between real presses.
    group.bench_function("fold_unchanged", |b| {
        let mut cell = InputCell::default();
        cell.set_threshold(0.5);
        cell.apply(0.0, 1);
        let mut ts = 2u64;
        b.iter(|| {
            ts += 1;
            black_box(cell.apply(black_box(0.0), ts))
        })
    });

    // The hysteresis band: values hovering right around the threshold.
    group.bench_function("fold_hovering", |b| {
        let mut cell = InputCell::default();
        cell.set_threshold(0.5);
        let values = [0.49f32, 0.5, 0.51, 0.5, 0.49];
        let mut i = 0usize;
        let mut ts = 1u64;
        b.iter(|| {
            let value = values[i % values.len()];
            i += 1;
            ts += 1;
            black_box(cell.apply(black_box(value), ts))
        })
    });

    group.finish();
}

fn bench_keymap_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("keymap");

    group.bench_function("key_from_code_single", |b| {
        b.iter(|| keymap::key_from_code(black_box(30)))
    });

    group.bench_function("key_from_code_batch_12", |b| {
        b.iter(|| {
            BENCH_KEY_CODES
                .iter()
                .filter_map(|&code| keymap::key_from_code(black_box(code)))
                .count()
        })
    });

    group.bench_function("button_from_code_single", |b| {
        b.iter(|| keymap::button_from_code(black_box(keymap::code::BTN_SOUTH)))
    });

    group.finish();
}

criterion_group!(benches, bench_cell_fold, bench_keymap_lookup);
criterion_main!(benches);
