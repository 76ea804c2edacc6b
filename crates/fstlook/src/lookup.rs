// Recursive lookup over an encoded input word.
//
// The engine walks the transition array depth first. Within one state
// block the loader's sort order is also the traversal order: final
// transitions, then epsilon, flags, ordinary symbols and the wildcards.
// Results are therefore deterministic for a given strategy and bounds.

use std::time::Instant;

use crate::flags::FlagState;
use crate::loader::Transducer;
use crate::symbols::{EPSILON, SymId};
use crate::transition::FINAL;
use crate::FlagStrategy;

/// One traversed transition of an analysis path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathValue {
    pub input: SymId,
    pub output: SymId,
    /// Index of the transition in the transition array.
    pub id: u32,
    pub from_state: u32,
    pub weight: f32,
    /// Flag state after this transition.
    pub flags: FlagState,
    /// Tape position before this transition; the frame of a consuming
    /// transition consumed the tape symbol at this position.
    pub tape_pos: u32,
}

/// Sum of the weights along a path.
pub fn path_weight(path: &[PathValue]) -> f32 {
    path.iter().map(|v| v.weight).sum()
}

/// Per-instance lookup state over a borrowed model.
///
/// A `Lookup` is cheap to keep around: the path buffer and tape are
/// reused between words. It is not reentrant; one lookup must finish
/// before the next starts, which the `&mut self` receiver enforces.
pub struct Lookup<'a> {
    fst: &'a Transducer,
    pub strategy: FlagStrategy,
    /// Stop after this many results; 0 means unlimited.
    pub max_results: usize,
    /// Do not grow the path beyond this many frames; 0 means unlimited.
    pub max_depth: usize,
    /// Wall-clock budget in seconds; 0 means unlimited.
    pub time_limit: f64,

    tape: Vec<SymId>,
    /// Character substrings of the current word, parallel to `tape`.
    chunks: Vec<String>,
    path: Vec<PathValue>,
    pos: usize,
    n_results: usize,
    started: Instant,
    flag_failed: bool,
}

impl<'a> Lookup<'a> {
    pub fn new(fst: &'a Transducer) -> Self {
        Self {
            fst,
            strategy: FlagStrategy::default(),
            max_results: 0,
            max_depth: 0,
            time_limit: 0.0,
            tape: Vec::new(),
            chunks: Vec::new(),
            path: Vec::new(),
            pos: 0,
            n_results: 0,
            started: Instant::now(),
            flag_failed: false,
        }
    }

    /// Enumerate every analysis of `word`, invoking `sink` once per
    /// accepted path. The sink receives the path and the carved character
    /// substrings of the word; neither reference may be retained, the
    /// path buffer is reused as the traversal continues.
    pub fn analyze<F>(&mut self, word: &str, mut sink: F)
    where
        F: FnMut(&[PathValue], &[String]),
    {
        self.path.clear();
        self.n_results = 0;
        self.flag_failed = false;
        self.started = Instant::now();
        self.segment(word);
        self.pos = 0;
        self.walk(0, &mut sink);
    }

    /// Number of results the previous `analyze` call produced.
    pub fn result_count(&self) -> usize {
        self.n_results
    }

    /// Carve the word into characters and intern each against the
    /// alphabet; characters outside the alphabet become the unknown ID.
    fn segment(&mut self, word: &str) {
        self.tape.clear();
        self.chunks.clear();
        let mut buf = [0u8; 4];
        for ch in word.chars() {
            let s: &str = ch.encode_utf8(&mut buf);
            let id = self
                .fst
                .symbols()
                .id_of(s)
                .unwrap_or(self.fst.specials().unknown);
            self.tape.push(id);
            self.chunks.push(s.to_string());
        }
    }

    fn walk<F>(&mut self, i: usize, sink: &mut F)
    where
        F: FnMut(&[PathValue], &[String]),
    {
        if (self.max_results > 0 && self.n_results >= self.max_results)
            || (self.max_depth > 0 && self.path.len() >= self.max_depth)
            || (self.time_limit > 0.0
                && self.started.elapsed().as_secs_f64() >= self.time_limit)
        {
            return;
        }
        let transitions = self.fst.transitions();
        let n = transitions.len();
        if i >= n {
            // dangling target: an empty block
            return;
        }
        let state = transitions[i].from;
        let sp = self.fst.specials();

        let mut j = i;
        while j < n && self.fst.transitions()[j].from == state {
            let t = self.fst.transitions()[j];
            let flag_state = self.path.last().map_or(FlagState::default(), |f| f.flags);
            let frame = PathValue {
                input: t.input,
                output: t.output,
                id: j as u32,
                from_state: state,
                weight: t.weight,
                flags: flag_state,
                tape_pos: self.pos as u32,
            };

            if t.to == FINAL {
                if self.pos == self.tape.len()
                    && (self.strategy != FlagStrategy::Negative || self.flag_failed)
                {
                    self.n_results += 1;
                    self.path.push(PathValue {
                        input: EPSILON,
                        output: EPSILON,
                        ..frame
                    });
                    sink(&self.path, &self.chunks);
                    self.path.pop();
                }
            } else if t.input == EPSILON {
                self.path.push(PathValue { input: EPSILON, ..frame });
                self.walk(t.to as usize, sink);
                self.path.pop();
            } else if t.input >= sp.flag_base {
                match self.strategy {
                    FlagStrategy::Ignore => {
                        // go with it, the flag symbol fills both tapes
                        self.path.push(PathValue { output: t.input, ..frame });
                        self.walk(t.to as usize, sink);
                        self.path.pop();
                    }
                    FlagStrategy::Obey | FlagStrategy::Negative => {
                        let idx = (t.input - sp.flag_base) as usize;
                        let (ok, next) = self.fst.flags().apply(idx, flag_state);
                        if ok {
                            self.path.push(PathValue { flags: next, ..frame });
                            self.walk(t.to as usize, sink);
                            self.path.pop();
                        } else if self.strategy == FlagStrategy::Negative {
                            let previous_fail = self.flag_failed;
                            self.flag_failed = true;
                            self.path.push(PathValue { flags: next, ..frame });
                            self.walk(t.to as usize, sink);
                            self.path.pop();
                            self.flag_failed = previous_fail;
                        }
                    }
                }
            } else if t.input == sp.identity || t.input == sp.unknown {
                // wildcards consume any one remaining symbol
                if self.pos < self.tape.len() {
                    self.path.push(frame);
                    self.pos += 1;
                    self.walk(t.to as usize, sink);
                    self.pos -= 1;
                    self.path.pop();
                }
            } else if self.pos < self.tape.len() && self.tape[self.pos] == t.input {
                self.path.push(frame);
                self.pos += 1;
                self.walk(t.to as usize, sink);
                self.pos -= 1;
                self.path.pop();
            }
            j += 1;
        }
    }
}

/// The raw output tape: symbol texts concatenated, flag tokens included.
pub fn output_text(fst: &Transducer, path: &[PathValue]) -> String {
    let mut out = String::new();
    for v in path {
        out.push_str(fst.symbol_text(v.output));
    }
    out
}

/// The interpreted output tape: the identity wildcard renders as the
/// character it consumed, the unknown wildcard passes through as its
/// literal token, and flag diacritics disappear.
pub fn interpret_output(fst: &Transducer, path: &[PathValue], segments: &[String]) -> String {
    let sp = fst.specials();
    let mut out = String::new();
    for v in path {
        if v.output >= sp.flag_base {
            continue;
        }
        if v.output == sp.identity {
            match segments.get(v.tape_pos as usize) {
                Some(consumed) => out.push_str(consumed),
                None => out.push_str(fst.symbol_text(v.output)),
            }
        } else {
            out.push_str(fst.symbol_text(v.output));
        }
    }
    out
}

/// The input tape, one symbol per frame joined by `|`. With
/// `strip_flags`, flag diacritics render as empty segments.
pub fn input_text(fst: &Transducer, path: &[PathValue], strip_flags: bool) -> String {
    let sp = fst.specials();
    let mut out = String::new();
    for (k, v) in path.iter().enumerate() {
        if k > 0 {
            out.push('|');
        }
        if strip_flags && v.input >= sp.flag_base {
            continue;
        }
        out.push_str(fst.symbol_text(v.input));
    }
    out
}
