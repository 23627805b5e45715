//! Benchmarks `extraction::pattern::extract` — the regex-driven extraction
//! ladder that runs concurrently with the LLM ladder on every request —
//! across note counts from a single admission note up to a long multi-week
//! stay.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use discharge_synth::config::PipelineConfig;
use discharge_synth::extraction::pattern;
use discharge_synth::model::ClinicalNote;
use discharge_synth::normalize;

fn note_text(i: usize) -> String {
    format!(
        "Admission 10/{:02}/2025. Patient was diagnosed with subarachnoid hemorrhage. \
         Underwent coiling of right PCOM aneurysm on 10/{:02}/2025. Developed vasospasm on POD#{}. \
         Started on nimodipine. KPS 70. Discharged home on 10/{:02}/2025.",
        (i % 9) + 10,
        (i % 9) + 11,
        i % 10,
        (i % 9) + 15,
    )
}

fn bench_extract(c: &mut Criterion) {
    let config = PipelineConfig::default();
    let mut group = c.benchmark_group("pattern::extract");
    for note_count in [1usize, 10, 50] {
        let notes: Vec<ClinicalNote> = (0..note_count).map(|i| ClinicalNote::new(note_text(i))).collect();
        let (normalized, anchors) = normalize::normalize_notes(&notes);
        group.bench_with_input(BenchmarkId::from_parameter(note_count), &normalized, |b, normalized| {
            b.iter(|| pattern::extract(normalized, &anchors, &config));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_extract);
criterion_main!(benches);
