//! End-to-end behavior of the lookup engine over small AT&T models:
//! wildcard resolution, flag strategies, bounds, dangling edges and
//! snapshot round-trips.

use fstlook::lookup::{Lookup, PathValue, interpret_output, path_weight};
use fstlook::{Encoding, FlagStrategy, Transducer, Width, snapshot};

fn load(text: &str) -> Transducer {
    Transducer::parse_att(text, '\t', Width::W32).unwrap()
}

fn analyses(fst: &Transducer, word: &str, strategy: FlagStrategy) -> Vec<(String, f32)> {
    let mut lookup = Lookup::new(fst);
    lookup.strategy = strategy;
    let mut out = Vec::new();
    lookup.analyze(word, |path, segments| {
        out.push((interpret_output(fst, path, segments), path_weight(path)));
    });
    out
}

#[test]
fn identity_resolves_to_the_consumed_character() {
    let text = concat!(
        "0\t1\ta\tA\t0\n",
        "1\t2\t@_IDENTITY_SYMBOL_@\t@_IDENTITY_SYMBOL_@\t0\n",
        "2\t0\n",
    );
    let fst = load(text);
    let results = analyses(&fst, "ab", FlagStrategy::Obey);
    assert_eq!(results, vec![("Ab".to_string(), 0.0)]);
}

#[test]
fn unified_flag_rejection_only_passes_under_negative() {
    let text = concat!(
        "0\t1\tx\tx\t0\n",
        "1\t2\t@U.Case.Nom@\t@U.Case.Nom@\t0\n",
        "2\t3\t@U.Case.Acc@\t@U.Case.Acc@\t0\n",
        "3\t0\n",
    );
    let fst = load(text);
    assert!(analyses(&fst, "x", FlagStrategy::Obey).is_empty());
    let negative = analyses(&fst, "x", FlagStrategy::Negative);
    assert!(!negative.is_empty());
    // ignoring the flags entirely also walks the path
    assert_eq!(analyses(&fst, "x", FlagStrategy::Ignore).len(), 1);
}

#[test]
fn weights_sum_over_the_path() {
    let text = "0\t1\ta\ta\t0.5\n1\t2\tb\tb\t0.25\n2\t1.0\n";
    let fst = load(text);
    let results = analyses(&fst, "ab", FlagStrategy::Obey);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].1, 1.75);
}

#[test]
fn result_and_depth_bounds() {
    // ten parallel analyses of "aa", each three frames deep
    let mut text = String::new();
    for k in 0..10 {
        text.push_str(&format!("0\t1\ta\to{k}\n"));
    }
    text.push_str("1\t2\ta\ta\n2\n");
    let fst = load(&text);

    assert_eq!(analyses(&fst, "aa", FlagStrategy::Obey).len(), 10);

    let mut lookup = Lookup::new(&fst);
    lookup.max_results = 3;
    let mut n = 0;
    lookup.analyze("aa", |_, _| n += 1);
    assert_eq!(n, 3);

    let mut lookup = Lookup::new(&fst);
    lookup.max_depth = 2;
    let mut n = 0;
    lookup.analyze("aa", |_, _| n += 1);
    assert_eq!(n, 0);
}

#[test]
fn dangling_edge_is_tolerated() {
    let fst = load("0\t9\ta\ta\n");
    assert!(analyses(&fst, "a", FlagStrategy::Obey).is_empty());
    assert!(analyses(&fst, "", FlagStrategy::Obey).is_empty());
}

#[test]
fn snapshot_round_trip_preserves_result_sequences() {
    let text = concat!(
        "0\t1\ta\tA\t0\n",
        "0\t2\t@U.F.x@\t@U.F.x@\t0\n",
        "1\t3\t@_IDENTITY_SYMBOL_@\t@_IDENTITY_SYMBOL_@\t0\n",
        "2\t3\ta\tB\t0.5\n",
        "3\t0.25\n",
    );
    let fst = load(text);
    let mut buf = Vec::new();
    snapshot::write_snapshot(&fst, Encoding::Utf8, &mut buf).unwrap();
    let reloaded = snapshot::read_snapshot(&buf, Encoding::Utf8, Width::W32).unwrap();

    for strategy in [FlagStrategy::Obey, FlagStrategy::Ignore, FlagStrategy::Negative] {
        for word in ["ab", "a", "", "zz"] {
            assert_eq!(
                analyses(&fst, word, strategy),
                analyses(&reloaded, word, strategy),
                "word {word:?} under {strategy:?}"
            );
        }
    }
}

#[test]
fn obey_paths_replay_their_flag_operations() {
    let text = concat!(
        "0\t1\t@P.A.x@\t@P.A.x@\n",
        "1\t2\t@U.B.y@\t@U.B.y@\n",
        "2\t3\ta\ta\n",
        "3\t4\t@R.A.x@\t@R.A.x@\n",
        "4\n",
    );
    let fst = load(text);
    let base = fst.specials().flag_base;
    let mut paths: Vec<Vec<PathValue>> = Vec::new();
    let mut lookup = Lookup::new(&fst);
    lookup.analyze("a", |p, _| paths.push(p.to_vec()));
    assert!(!paths.is_empty());

    for path in &paths {
        let mut state = Default::default();
        for frame in path {
            if frame.input >= base {
                let (ok, next) = fst.flags().apply((frame.input - base) as usize, state);
                assert!(ok, "flag op of transition {} must replay", frame.id);
                state = next;
                assert_eq!(state, frame.flags);
            }
        }
    }
}

#[test]
fn ignore_results_are_a_superset_of_obey_results() {
    let text = concat!(
        "0\t1\t@U.C.x@\t@U.C.x@\n",
        "0\t1\t@U.C.y@\t@U.C.y@\n",
        "1\t2\ta\ta\n",
        "2\t3\t@R.C.x@\t@R.C.x@\n",
        "3\n",
    );
    let fst = load(text);
    let obey: Vec<String> = analyses(&fst, "a", FlagStrategy::Obey)
        .into_iter()
        .map(|(s, _)| s)
        .collect();
    let ignore: Vec<String> = analyses(&fst, "a", FlagStrategy::Ignore)
        .into_iter()
        .map(|(s, _)| s)
        .collect();
    assert!(ignore.len() > obey.len());
    for o in &obey {
        assert!(ignore.contains(o));
    }
}

#[test]
fn zero_result_word_never_invokes_the_sink() {
    let fst = load("0\t1\ta\ta\n1\n");
    let mut lookup = Lookup::new(&fst);
    let mut called = false;
    lookup.analyze("b", |_, _| called = true);
    assert!(!called);
    assert_eq!(lookup.result_count(), 0);
}

#[test]
fn unknown_characters_traverse_wildcard_edges() {
    let text = concat!(
        "0\t1\t@_UNKNOWN_SYMBOL_@\t@_UNKNOWN_SYMBOL_@\n",
        "1\t2\t@_IDENTITY_SYMBOL_@\t@_IDENTITY_SYMBOL_@\n",
        "2\n",
    );
    let fst = load(text);
    let results = analyses(&fst, "\u{00FF}q", FlagStrategy::Obey);
    assert_eq!(results.len(), 1);
    // unknown passes through as its literal token, identity as the input
    assert_eq!(results[0].0, "@_UNKNOWN_SYMBOL_@q");
}

#[test]
fn repeated_lookups_are_identical() {
    let fst = load("0\t1\ta\tX\n0\t1\ta\tY\n0\t2\ta\tZ\n1\n2\n");
    let first = analyses(&fst, "a", FlagStrategy::Obey);
    let second = analyses(&fst, "a", FlagStrategy::Obey);
    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
}
