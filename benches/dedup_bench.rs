//! Benchmarks the four-phase dedup pipeline (`dedup::deduplicate`) across
//! corpus sizes representative of a multi-day neurosurgical admission: a
//! few dozen progress notes with the template-driven repetition a real EHR
//! export carries (nursing notes repeating the same vitals phrasing day
//! over day) plus a handful of genuine near-duplicates and complementary
//! partial notes.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use discharge_synth::config::PipelineConfig;
use discharge_synth::dedup;
use discharge_synth::model::{ClinicalNote, NormalizedNote};
use discharge_synth::normalize;

fn corpus(note_count: usize) -> Vec<NormalizedNote> {
    let mut notes = Vec::with_capacity(note_count);
    for i in 0..note_count {
        let text = match i % 5 {
            0 => format!(
                "Progress note day {i}. Patient remains neurologically stable, tolerating diet, \
                 ambulating with assistance. Vital signs within normal limits."
            ),
            1 => format!(
                "Progress note day {i}. Patient remains neurologically stable, tolerating diet, \
                 ambulating with assistance. Vital signs within normal limits. Afebrile overnight."
            ),
            2 => format!("Nursing note day {i}. No acute events overnight. Pain controlled with oral medication."),
            3 => format!(
                "Progress note day {i}. Developed vasospasm on POD#{}, started on nimodipine and induced hypertension.",
                i % 10
            ),
            _ => format!("Consult note day {i}. Physical therapy evaluated, KPS 70, continues rehab goals."),
        };
        notes.push(ClinicalNote::new(text));
    }
    let (normalized, _) = normalize::normalize_notes(&notes);
    normalized
}

fn bench_deduplicate(c: &mut Criterion) {
    let config = PipelineConfig::default();
    let mut group = c.benchmark_group("dedup::deduplicate");
    for size in [10usize, 50, 200] {
        let notes = corpus(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &notes, |b, notes| {
            b.iter(|| dedup::deduplicate(notes.clone(), &config));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_deduplicate);
criterion_main!(benches);
