//! Diff and merge performance benchmarks.
//!
//! Measures the diff pass and remerge over generated annotator sets of
//! increasing size.

use annomerge::merge::{MergeEngine, MergedAnnotationSet};
use annomerge::model::{AnnotationLayer, AnnotationSet, Feature, Link, Schema, TextWindow};
use annomerge::{CasDiff, DiffConfig};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn schema() -> Schema {
    Schema::new()
        .with_layer(AnnotationLayer::span("Token").with_feature(Feature::primitive("pos")))
        .with_layer(AnnotationLayer::span("NamedEntity").with_feature(Feature::primitive("value")))
        .with_layer(
            AnnotationLayer::relation("Dependency", "Governor", "Dependent")
                .with_feature(Feature::primitive("DependencyType")),
        )
        .with_layer(
            AnnotationLayer::span("Event")
                .with_feature(Feature::primitive("type"))
                .with_feature(Feature::slot("args", "NamedEntity")),
        )
}

/// Generate one annotator's set over `tokens` tokens.
///
/// Annotators mostly agree; every seventh entity value and every eleventh
/// dependency label depends on the annotator.
fn generate_set(annotator: usize, tokens: usize) -> AnnotationSet {
    let values = ["ORG", "LOC", "PER", "MISC"];
    let labels = ["nsubj", "dobj", "amod"];
    let mut set = AnnotationSet::new(format!("annotator{annotator}"), "doc", schema());
    let mut previous = None;

    for i in 0..tokens {
        let begin = i * 6;
        let token = set.add_span("Token", begin, begin + 5).unwrap();
        set.set_feature(token, "pos", if i % 2 == 0 { "NOUN" } else { "VERB" }).unwrap();

        if let Some(governor) = previous {
            let relation = set.add_relation("Dependency", governor, token).unwrap();
            let label = if i % 11 == 0 { labels[annotator % labels.len()] } else { labels[i % labels.len()] };
            set.set_feature(relation, "DependencyType", label).unwrap();
        }
        previous = Some(token);

        if i % 3 == 0 {
            let entity = set.add_span("NamedEntity", begin, begin + 5).unwrap();
            let value = if i % 7 == 0 { values[annotator % values.len()] } else { values[i % values.len()] };
            set.set_feature(entity, "value", value).unwrap();

            let event = set.add_span("Event", begin, begin + 11).unwrap();
            set.set_feature(event, "type", "Attack").unwrap();
            set.push_link(event, "args", Link::new("agent", entity)).unwrap();
        }
    }

    set
}

fn differ() -> CasDiff {
    CasDiff::new(
        DiffConfig::new()
            .with_layers(["Token", "NamedEntity", "Dependency", "Event"])
            .with_window(TextWindow::unbounded()),
    )
}

/// Benchmark the diff pass over three annotators.
fn bench_diff(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff");

    for tokens in [100, 500, 2000].iter() {
        let sets: Vec<AnnotationSet> = (0..3).map(|a| generate_set(a, *tokens)).collect();
        let records: usize = sets.iter().map(AnnotationSet::len).sum();

        group.throughput(Throughput::Elements(records as u64));
        group.bench_with_input(BenchmarkId::new("three_annotators", tokens), &sets, |b, sets| {
            let refs: Vec<&AnnotationSet> = sets.iter().collect();
            b.iter(|| differ().diff(black_box(&refs)))
        });
    }

    group.finish();
}

/// Benchmark diffing with a growing number of annotators.
fn bench_annotator_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("annotator_scaling");

    for annotators in [2, 4, 8].iter() {
        let sets: Vec<AnnotationSet> = (0..*annotators).map(|a| generate_set(a, 500)).collect();

        group.bench_with_input(BenchmarkId::new("annotators", annotators), &sets, |b, sets| {
            let refs: Vec<&AnnotationSet> = sets.iter().collect();
            b.iter(|| differ().diff(black_box(&refs)))
        });
    }

    group.finish();
}

/// Benchmark remerging a seeded curator set.
fn bench_remerge(c: &mut Criterion) {
    let mut group = c.benchmark_group("remerge");

    for tokens in [100, 500, 2000].iter() {
        let sets: Vec<AnnotationSet> = (0..3).map(|a| generate_set(a, *tokens)).collect();
        let refs: Vec<&AnnotationSet> = sets.iter().collect();
        let diff = differ().diff(&refs);
        let engine = MergeEngine::default();

        group.throughput(Throughput::Elements(sets[0].len() as u64));
        group.bench_with_input(BenchmarkId::new("seeded", tokens), &diff, |b, diff| {
            b.iter_with_setup(
                || MergedAnnotationSet::from_seed(&sets[0], "curator"),
                |mut curator| engine.remerge(black_box(diff), &mut curator),
            )
        });
    }

    group.finish();
}

criterion_group!(benches, bench_diff, bench_annotator_scaling, bench_remerge);
criterion_main!(benches);
