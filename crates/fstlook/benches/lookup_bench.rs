// Criterion benchmarks over a synthetic transducer.
//
// The model is generated in memory: a branching prefix fan followed by a
// suffix chain with flag diacritics, roughly the shape of a small
// morphological lexicon.
//
// Run: cargo bench -p fstlook

use criterion::{Criterion, criterion_group, criterion_main};

use fstlook::lookup::Lookup;
use fstlook::{FlagStrategy, Transducer, Width};

/// A lexicon of `n` words sharing a suffix state with flag-guarded
/// continuations.
fn synthetic_att(n: usize) -> String {
    let mut text = String::new();
    let alphabet = ["a", "b", "c", "d", "e", "f", "g", "h"];
    let mut next_state = 2;
    // branching prefixes: word k is three characters drawn from the alphabet
    let mut from_zero = String::new();
    for k in 0..n {
        let chars = [
            alphabet[k % 8],
            alphabet[(k / 8) % 8],
            alphabet[(k / 64) % 8],
        ];
        from_zero.push_str(&format!("0\t{next_state}\t{}\t{}\n", chars[0], chars[0]));
        let mid = next_state;
        text.push_str(&format!("{mid}\t{}\t{}\t{}\n", mid + 1, chars[1], chars[1]));
        text.push_str(&format!("{}\t1\t{}\t{}\t0.5\n", mid + 1, chars[2], chars[2]));
        next_state += 2;
    }
    // shared suffix state: a flag-guarded case ending and a final
    let tail = format!(
        concat!(
            "1\t{s}\t@U.Case.Nom@\t@U.Case.Nom@\n",
            "1\t{t}\t@U.Case.Acc@\t@U.Case.Acc@\n",
            "{s}\t0.25\n",
            "{t}\t{u}\ts\t[Acc]\n",
            "{u}\n",
        ),
        s = next_state,
        t = next_state + 1,
        u = next_state + 2,
    );
    format!("{from_zero}{text}{tail}")
}

fn bench_load(c: &mut Criterion) {
    let text = synthetic_att(512);
    c.bench_function("load_512_entries", |b| {
        b.iter(|| {
            std::hint::black_box(
                Transducer::parse_att(&text, '\t', Width::W32).unwrap(),
            );
        });
    });
}

fn bench_lookup(c: &mut Criterion) {
    let text = synthetic_att(512);
    let fst = Transducer::parse_att(&text, '\t', Width::W32).unwrap();
    let words = ["aaa", "baas", "hghs", "cbaq", "xyz", "dda"];

    for strategy in [FlagStrategy::Obey, FlagStrategy::Ignore] {
        c.bench_function(&format!("lookup_{strategy:?}"), |b| {
            let mut lookup = Lookup::new(&fst);
            lookup.strategy = strategy;
            b.iter(|| {
                for word in &words {
                    let mut n = 0usize;
                    lookup.analyze(word, |path, _| n += path.len());
                    std::hint::black_box(n);
                }
            });
        });
    }
}

criterion_group!(benches, bench_load, bench_lookup);
criterion_main!(benches);
