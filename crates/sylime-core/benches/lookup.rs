use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use sylime_core::db::{Db, MemoryDb};
use sylime_core::graph::{SpellingProperties, SpellingType, SyllableGraph};
use sylime_core::settings::DictSettings;
use sylime_core::syllabary::StaticSyllabary;
use sylime_core::user_dict::codec::UserDbValue;
use sylime_core::user_dict::{UserDictEntryIterator, UserDictionary};

const SYLLABLES: &[&str] = &[
    "ba", "de", "guo", "hao", "ma", "men", "ni", "ren", "shi", "wo", "zhong",
];

fn title(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn seeded_dict() -> (UserDictionary, Arc<StaticSyllabary>) {
    let syllabary = Arc::new(StaticSyllabary::new(SYLLABLES.iter().copied()));
    let db = Arc::new(MemoryDb::ephemeral("bench-ud"));
    assert!(db.open());
    let mut stamp = 0u64;
    let mut seed = |key: String| {
        stamp += 1;
        let v = UserDbValue {
            commits: ((stamp * 7) % 20 + 1) as i32,
            dee: ((stamp % 10) + 1) as f64,
            tick: stamp % 50,
        };
        db.update(&key, &v.pack());
    };
    for a in SYLLABLES {
        seed(format!("{a} \t{}", title(a)));
        for b in SYLLABLES {
            seed(format!("{a} {b} \t{}{}", title(a), title(b)));
        }
    }
    for b in SYLLABLES {
        seed(format!("zhong guo {b} \tZhongGuo{}", title(b)));
    }
    db.meta_update("/tick", "60");

    let mut dict = UserDictionary::new(
        "bench-ud",
        Arc::clone(&db) as Arc<dyn Db>,
        &DictSettings::default(),
    );
    dict.attach(Arc::<StaticSyllabary>::downgrade(&syllabary));
    assert!(dict.load());
    (dict, syllabary)
}

fn chain_graph(syllabary: &StaticSyllabary, spellings: &[&str]) -> SyllableGraph {
    let mut graph = SyllableGraph::default();
    let mut pos = 0;
    for s in spellings {
        let end = pos + s.len();
        graph.indices.entry(pos).or_default().insert(
            syllabary.id_of(s).unwrap(),
            vec![SpellingProperties {
                kind: SpellingType::Normal,
                end_pos: end,
                credibility: 0.0,
            }],
        );
        pos = end;
    }
    graph.input_length = pos;
    graph.interpreted_length = pos;
    graph
}

fn bench_graph_lookup(c: &mut Criterion) {
    let (mut dict, syllabary) = seeded_dict();
    let mut group = c.benchmark_group("user_dict/graph_lookup");
    let graphs = [
        ("two_syllables", chain_graph(&syllabary, &["ni", "hao"])),
        (
            "three_syllables",
            chain_graph(&syllabary, &["zhong", "guo", "ren"]),
        ),
    ];
    for (label, graph) in &graphs {
        group.bench_with_input(
            BenchmarkId::new(*label, graph.input_length),
            graph,
            |b, graph| b.iter(|| dict.lookup(graph, 0, 0, 0.0)),
        );
    }
    group.finish();
}

fn bench_scan(c: &mut Criterion) {
    let (dict, _syllabary) = seeded_dict();
    let mut group = c.benchmark_group("user_dict/scan");
    static INPUTS: &[(&str, &str, bool)] = &[
        ("exact", "ni", false),
        ("predictive", "zh", true),
        ("deep", "zhong guo", true),
    ];
    for &(label, input, predictive) in INPUTS {
        group.bench_with_input(BenchmarkId::new(label, input.len()), &input, |b, &input| {
            b.iter(|| {
                let mut result = UserDictEntryIterator::default();
                dict.lookup_words(&mut result, input, predictive, 0, None);
                result.len()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_graph_lookup, bench_scan);
criterion_main!(benches);
