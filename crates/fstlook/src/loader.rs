// AT&T text parsing and construction of the in-memory model.
//
// The text lists one transition per line, columns separated by a single
// code unit (tab by default):
//
//   state                        final state, weight 0
//   state weight                 final state with weight
//   from to input output         transition, weight 0
//   from to input output weight  fully specified transition
//
// States are interned in order of first appearance; the first source
// state is the start state. All transitions of a state must form one
// contiguous run of lines.

use hashbrown::HashMap;

use crate::encoding::Encoding;
use crate::flags::{self, FlagDiacritics};
use crate::symbols::{EPSILON, SymId, SymbolTable};
use crate::transition::{FINAL, SpecialIds, Transition, group_rank};
use crate::{FstError, Width};

pub const UNKNOWN_SYMBOL: &str = "@_UNKNOWN_SYMBOL_@";
pub const IDENTITY_SYMBOL: &str = "@_IDENTITY_SYMBOL_@";

/// Tokens that denote the empty symbol on either tape.
const EPSILON_TOKENS: [&str; 2] = ["@0@", "@_EPSILON_SYMBOL_@"];

/// Loading parameters, typically filled in from the command line.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub encoding: Encoding,
    /// Column separator; must be a single code unit of `encoding`.
    pub separator: char,
    pub width: Width,
    /// Whether a leading byte-order mark should be consumed.
    pub bom: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            encoding: Encoding::default(),
            separator: '\t',
            width: Width::default(),
            bom: false,
        }
    }
}

/// A compiled transducer: the immutable output of the loader, shared by
/// any number of consecutive lookups.
#[derive(Debug)]
pub struct Transducer {
    pub(crate) transitions: Vec<Transition>,
    pub(crate) symbols: SymbolTable,
    pub(crate) flags: FlagDiacritics,
    pub(crate) specials: SpecialIds,
    pub(crate) width: Width,
    pub(crate) n_states: usize,
}

/// Input or output column of a parsed row, before flag IDs exist.
#[derive(Clone, Copy)]
enum PendingSym {
    Sym(SymId),
    Flag(u32),
}

impl Transducer {
    /// Load from raw bytes of an AT&T text file.
    pub fn from_att_bytes(data: &[u8], opts: &LoadOptions) -> Result<Self, FstError> {
        if !opts.encoding.valid_separator(opts.separator) {
            return Err(FstError::Parse {
                line: 0,
                msg: format!(
                    "separator {:?} is not a single {:?} code unit",
                    opts.separator, opts.encoding
                ),
            });
        }
        let data = if opts.bom {
            opts.encoding.strip_bom(data)
        } else {
            data
        };
        let text = opts.encoding.decode(data)?;
        Self::parse_att(&text, opts.separator, opts.width)
    }

    /// Load from an AT&T text file on disk.
    pub fn from_att_file(path: &std::path::Path, opts: &LoadOptions) -> Result<Self, FstError> {
        let data = std::fs::read(path)?;
        Self::from_att_bytes(&data, opts)
    }

    /// Parse decoded AT&T text into a compiled model.
    pub fn parse_att(text: &str, separator: char, width: Width) -> Result<Self, FstError> {
        let mut symbols = SymbolTable::new();
        let mut fd = FlagDiacritics::new();
        let mut states: HashMap<String, u32> = HashMap::new();
        // Transition-array offset of each state's block, by state ID.
        let mut starts: Vec<Option<u32>> = Vec::new();
        let mut flag_ids: HashMap<String, u32> = HashMap::new();
        let mut flag_names: Vec<String> = Vec::new();
        let mut rows: Vec<(u32, u32, PendingSym, PendingSym, f32)> = Vec::new();
        let mut prev_from: Option<u32> = None;

        for (line_no, line) in text.lines().enumerate() {
            let line_no = line_no + 1;
            if line.is_empty() {
                break;
            }
            if rows.len() >= (u32::MAX - 1) as usize {
                return Err(FstError::Overflow(format!(
                    "transition count exceeds the ID range at line {line_no}"
                )));
            }
            let cols: Vec<&str> = line.split(separator).collect();
            // The source column is interned first: the start state is the
            // first `from` value of the file and must get ID 0.
            let from = intern_state(&mut states, &mut starts, cols[0], line_no)?;
            let (to, input, output, weight) = match cols.len() {
                1 => (FINAL, PendingSym::Sym(EPSILON), PendingSym::Sym(EPSILON), 0.0),
                2 => (
                    FINAL,
                    PendingSym::Sym(EPSILON),
                    PendingSym::Sym(EPSILON),
                    parse_weight(cols[1], line_no)?,
                ),
                4 | 5 => {
                    let weight = if cols.len() == 5 {
                        parse_weight(cols[4], line_no)?
                    } else {
                        0.0
                    };
                    let to = intern_state(&mut states, &mut starts, cols[1], line_no)?;
                    let (input, output) = if flags::is_flag(cols[2]) {
                        fd.memorize(cols[2])?;
                        let idx = match flag_ids.get(cols[2]) {
                            Some(&idx) => idx,
                            None => {
                                let idx = flag_names.len() as u32;
                                flag_ids.insert(cols[2].to_string(), idx);
                                flag_names.push(cols[2].to_string());
                                idx
                            }
                        };
                        (PendingSym::Flag(idx), PendingSym::Flag(idx))
                    } else {
                        let input = symbols.intern(normalize(cols[2]))?;
                        let output = symbols.intern(normalize(cols[3]))?;
                        (PendingSym::Sym(input), PendingSym::Sym(output))
                    };
                    (to, input, output, weight)
                }
                n => {
                    return Err(FstError::Parse {
                        line: line_no,
                        msg: format!("wrong number of columns ({n})"),
                    });
                }
            };

            if prev_from != Some(from) {
                if starts[from as usize].is_some() {
                    return Err(FstError::StateOrder {
                        line: line_no,
                        state: cols[0].to_string(),
                    });
                }
                starts[from as usize] = Some(rows.len() as u32);
                prev_from = Some(from);
            }
            rows.push((from, to, input, output, weight));
        }

        // The wildcards are always part of the alphabet so that tape
        // segmentation has a fallback ID for unmatched characters.
        let unknown = symbols.intern(UNKNOWN_SYMBOL)?;
        let identity = symbols.intern(IDENTITY_SYMBOL)?;
        let flag_base = symbols.freeze();

        for name in &flag_names {
            let id = symbols.intern(name)?;
            if id < flag_base {
                return Err(FstError::Parse {
                    line: 0,
                    msg: format!("flag diacritic {name:?} also occurs as a plain symbol"),
                });
            }
            let op = fd.compile(name)?;
            fd.push_op(op);
        }
        fd.calculate_offsets(width.bits())?;

        let mut transitions: Vec<Transition> = rows
            .iter()
            .map(|&(from, to, input, output, weight)| Transition {
                from,
                to,
                input: resolve_sym(input, flag_base),
                output: resolve_sym(output, flag_base),
                weight,
            })
            .collect();

        let specials = SpecialIds {
            unknown,
            identity,
            empty: EPSILON,
            flag_base,
        };

        // Sort each state block into its traversal order. Block boundaries
        // come from `starts`, which is ascending in insertion order.
        let end = transitions.len() as u32;
        let mut block_starts: Vec<u32> = starts.iter().filter_map(|&s| s).collect();
        block_starts.sort_unstable();
        for (k, &begin) in block_starts.iter().enumerate() {
            let stop = block_starts.get(k + 1).copied().unwrap_or(end);
            transitions[begin as usize..stop as usize]
                .sort_by_key(|t| group_rank(t, &specials));
        }

        // Turn target state IDs into transition-array offsets; states that
        // never occur as a source become dangling offsets past the end.
        for t in &mut transitions {
            if t.to != FINAL {
                t.to = starts
                    .get(t.to as usize)
                    .copied()
                    .flatten()
                    .unwrap_or(end);
            }
        }

        Ok(Self {
            transitions,
            symbols,
            flags: fd,
            specials,
            width,
            n_states: states.len(),
        })
    }

    /// Number of states, dangling targets included.
    pub fn num_states(&self) -> usize {
        self.n_states
    }

    /// Number of transitions, final markers included.
    pub fn num_transitions(&self) -> usize {
        self.transitions.len()
    }

    /// Approximate heap footprint of the compiled model in bytes.
    pub fn allocated_bytes(&self) -> usize {
        let (arena, offsets) = self.symbols.raw_parts();
        self.transitions.len() * size_of::<Transition>()
            + arena.len()
            + offsets.len() * size_of::<u32>()
            + self.flags.ops().len() * size_of::<crate::flags::FlagOp>()
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn flags(&self) -> &FlagDiacritics {
        &self.flags
    }

    pub fn specials(&self) -> SpecialIds {
        self.specials
    }

    pub fn width(&self) -> Width {
        self.width
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// The symbol text of `id`, empty for epsilon.
    pub fn symbol_text(&self, id: SymId) -> &str {
        self.symbols.text_of(id)
    }
}

fn parse_weight(tok: &str, line: usize) -> Result<f32, FstError> {
    tok.trim().parse::<f32>().map_err(|_| FstError::Parse {
        line,
        msg: format!("unparseable weight {tok:?}"),
    })
}

fn normalize(tok: &str) -> &str {
    if EPSILON_TOKENS.contains(&tok) { "" } else { tok }
}

fn resolve_sym(sym: PendingSym, flag_base: SymId) -> SymId {
    match sym {
        PendingSym::Sym(id) => id,
        PendingSym::Flag(idx) => flag_base + idx,
    }
}

fn intern_state(
    states: &mut HashMap<String, u32>,
    starts: &mut Vec<Option<u32>>,
    tok: &str,
    line: usize,
) -> Result<u32, FstError> {
    if let Some(&id) = states.get(tok) {
        return Ok(id);
    }
    if states.len() >= (FINAL - 1) as usize {
        return Err(FstError::Overflow(format!(
            "state count exceeds the ID range at line {line}"
        )));
    }
    let id = states.len() as u32;
    states.insert(tok.to_string(), id);
    starts.push(None);
    Ok(id)
}
