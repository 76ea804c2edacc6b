// Flag diacritics: feature-unification constraints along a lookup path.
//
// A token of the form `@X.FEATURE.VALUE@` (value optional) encodes one of
// six operations on a per-path feature store. The store is a signed
// bit-packed word: each feature owns a contiguous bit field holding
// 0 (unset), +v (set to value index v) or -v (negatively set). Features
// and values are numbered in order of first appearance in the source
// file, which keeps compiled models reproducible.

use hashbrown::HashMap;

use crate::FstError;

/// One pre-compiled flag diacritic operation.
///
/// `feature` is 1-based; `value` 0 means the operand was empty.
/// The layout is fixed because the snapshot codec writes these records
/// verbatim.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FlagOp {
    /// Operation letter: one of `P N R D C U`.
    pub op: u8,
    pub feature: u8,
    pub value: u8,
    pub _pad: u8,
}

const _: () = assert!(size_of::<FlagOp>() == 4);

/// Bit-packed per-path feature store.
///
/// Backed by an `i64` word regardless of the configured width; the width
/// only caps how many bits [`FlagDiacritics::calculate_offsets`] may hand
/// out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlagState(i64);

impl FlagState {
    /// Read the signed value of the bit field `[i, j)`.
    pub fn get(self, i: u8, j: u8) -> i64 {
        let width = j - i;
        let mut x = (self.0 >> i) & ((1i64 << width) - 1);
        if x >> (width - 1) != 0 {
            // sign extend
            x |= -1i64 << width;
        }
        x
    }

    /// Overwrite the bit field `[i, j)` with the low bits of `value`.
    pub fn set(&mut self, i: u8, j: u8, value: i64) {
        let mask = ((1i64 << (j - i)) - 1) << i;
        self.0 = (self.0 & !mask) | (mask & (value << i));
    }

    pub fn raw(self) -> i64 {
        self.0
    }
}

/// Parse `@X.FEATURE@` or `@X.FEATURE.VALUE@`. The feature must be
/// non-empty and dot-free; the value (possibly empty, possibly dotted)
/// is everything after the first dot.
pub fn parse_flag(token: &str) -> Option<(u8, &str, &str)> {
    let bytes = token.as_bytes();
    if bytes.len() < 5 || bytes[0] != b'@' || bytes[bytes.len() - 1] != b'@' {
        return None;
    }
    if !matches!(bytes[1], b'P' | b'N' | b'R' | b'D' | b'C' | b'U') || bytes[2] != b'.' {
        return None;
    }
    let inner = &token[3..token.len() - 1];
    let (feature, value) = match inner.find('.') {
        Some(dot) => (&inner[..dot], &inner[dot + 1..]),
        None => (inner, ""),
    };
    if feature.is_empty() || feature.contains('@') || value.contains('@') {
        return None;
    }
    Some((bytes[1], feature, value))
}

/// Whether `token` is a flag diacritic.
pub fn is_flag(token: &str) -> bool {
    parse_flag(token).is_some()
}

/// The flag diacritic engine of one transducer.
///
/// Built up during loading (`memorize` per token, then `compile` and
/// `calculate_offsets` once the alphabet is frozen), immutable afterwards.
#[derive(Debug)]
pub struct FlagDiacritics {
    /// Features in order of first appearance, each with its observed
    /// values in order of first appearance.
    features: Vec<(String, Vec<String>)>,
    feature_ids: HashMap<String, usize>,
    /// Operation per flag symbol, indexed by `flag_id - flag_base`.
    ops: Vec<FlagOp>,
    /// Bit offset per feature; `offsets[k]..offsets[k + 1]` is the field
    /// of 1-based feature `k + 1`. Length is `features.len() + 1`.
    offsets: Vec<u8>,
}

impl FlagDiacritics {
    pub fn new() -> Self {
        Self {
            features: Vec::new(),
            feature_ids: HashMap::new(),
            ops: Vec::new(),
            offsets: vec![0],
        }
    }

    pub fn num_features(&self) -> usize {
        self.features.len()
    }

    pub fn ops(&self) -> &[FlagOp] {
        &self.ops
    }

    pub fn offsets(&self) -> &[u8] {
        &self.offsets
    }

    /// Record the feature and value of one flag token during loading.
    pub fn memorize(&mut self, token: &str) -> Result<(), FstError> {
        let Some((_, feature, value)) = parse_flag(token) else {
            return Err(FstError::Parse {
                line: 0,
                msg: format!("malformed flag diacritic {token:?}"),
            });
        };
        let idx = match self.feature_ids.get(feature) {
            Some(&idx) => idx,
            None => {
                let idx = self.features.len();
                self.features.push((feature.to_string(), Vec::new()));
                self.feature_ids.insert(feature.to_string(), idx);
                idx
            }
        };
        if !value.is_empty() {
            let values = &mut self.features[idx].1;
            if !values.iter().any(|v| v == value) {
                values.push(value.to_string());
            }
        }
        Ok(())
    }

    /// Compile the operation of one flag token. Valid only after every
    /// token has been memorized.
    pub fn compile(&self, token: &str) -> Result<FlagOp, FstError> {
        let Some((op, feature, value)) = parse_flag(token) else {
            return Err(FstError::Parse {
                line: 0,
                msg: format!("malformed flag diacritic {token:?}"),
            });
        };
        let feat_idx = self.feature_ids.get(feature).copied().ok_or_else(|| {
            FstError::Parse {
                line: 0,
                msg: format!("flag feature {feature:?} was never memorized"),
            }
        })?;
        let val_idx = if value.is_empty() {
            0
        } else {
            self.features[feat_idx]
                .1
                .iter()
                .position(|v| v == value)
                .map_or(0, |p| p + 1)
        };
        if feat_idx + 1 > u8::MAX as usize || val_idx > u8::MAX as usize {
            return Err(FstError::Overflow(format!(
                "flag feature or value index of {token:?} does not fit one byte"
            )));
        }
        Ok(FlagOp {
            op,
            feature: (feat_idx + 1) as u8,
            value: val_idx as u8,
            _pad: 0,
        })
    }

    /// Record the compiled operation for the next flag ID.
    pub fn push_op(&mut self, op: FlagOp) {
        self.ops.push(op);
    }

    /// Compute per-feature bit fields and validate that they fit the
    /// configured width.
    pub fn calculate_offsets(&mut self, width_bits: u8) -> Result<(), FstError> {
        self.offsets.clear();
        let mut bits: u32 = 0;
        for (_, values) in &self.features {
            self.offsets.push(bits as u8);
            bits += int_log2(2 * (values.len() + 1)) as u32;
        }
        if bits > width_bits as u32 {
            return Err(FstError::Overflow(format!(
                "flag diacritic state needs {bits} bits, but only {width_bits} are available"
            )));
        }
        self.offsets.push(bits as u8);
        Ok(())
    }

    /// Apply the operation of `flag_index` (= `flag_id - flag_base`) to
    /// `state`. Returns whether the transition is admissible together with
    /// the resulting state; on rejection the state is returned unchanged.
    pub fn apply(&self, flag_index: usize, state: FlagState) -> (bool, FlagState) {
        let op = self.ops[flag_index];
        let i = self.offsets[op.feature as usize - 1];
        let j = self.offsets[op.feature as usize];
        let current = state.get(i, j);
        let value = op.value as i64;
        let mut next = state;
        match op.op {
            b'P' => {
                next.set(i, j, value);
                (true, next)
            }
            b'N' => {
                next.set(i, j, -value);
                (true, next)
            }
            b'C' => {
                next.set(i, j, 0);
                (true, next)
            }
            b'R' => {
                let ok = if value == 0 { current != 0 } else { current == value };
                (ok, state)
            }
            b'D' => {
                let ok = if value == 0 { current == 0 } else { current != value };
                (ok, state)
            }
            b'U' => {
                if current == 0 || current == value || (current < 0 && -current != value) {
                    next.set(i, j, value);
                    (true, next)
                } else {
                    (false, state)
                }
            }
            _ => (false, state),
        }
    }

    /// Unpack a state into one signed value per feature, in feature order.
    pub fn values(&self, state: FlagState) -> Vec<i64> {
        (0..self.features.len())
            .map(|k| state.get(self.offsets[k], self.offsets[k + 1]))
            .collect()
    }

    /// Rebuild the engine from snapshot parts. Feature and value names are
    /// not stored in a snapshot; `apply` and `values` only need the
    /// offsets and the compiled operations.
    pub fn from_raw_parts(offsets: Vec<u8>, ops: Vec<FlagOp>) -> Result<Self, FstError> {
        if offsets.is_empty() {
            return Err(FstError::SnapshotMismatch(
                "flag offset table must not be empty".into(),
            ));
        }
        for op in &ops {
            if !matches!(op.op, b'P' | b'N' | b'R' | b'D' | b'C' | b'U') {
                return Err(FstError::SnapshotMismatch(format!(
                    "unknown flag operation {:?}",
                    op.op as char
                )));
            }
            if op.feature == 0 || op.feature as usize >= offsets.len() {
                return Err(FstError::SnapshotMismatch(format!(
                    "flag operation references feature {} of {}",
                    op.feature,
                    offsets.len() - 1
                )));
            }
        }
        let features = (1..offsets.len())
            .map(|_| (String::new(), Vec::new()))
            .collect();
        Ok(Self {
            features,
            feature_ids: HashMap::new(),
            ops,
            offsets,
        })
    }
}

impl Default for FlagDiacritics {
    fn default() -> Self {
        Self::new()
    }
}

/// Ceiling of log2, with `int_log2(1) == 0`.
fn int_log2(mut s: usize) -> u8 {
    s -= 1;
    let mut r = 0;
    while s != 0 {
        r += 1;
        s >>= 1;
    }
    r
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(tokens: &[&str]) -> FlagDiacritics {
        let mut fd = FlagDiacritics::new();
        for t in tokens {
            fd.memorize(t).unwrap();
        }
        for t in tokens {
            let op = fd.compile(t).unwrap();
            fd.push_op(op);
        }
        fd.calculate_offsets(32).unwrap();
        fd
    }

    #[test]
    fn parse_accepts_valid_tokens() {
        assert_eq!(parse_flag("@P.CASE.NOM@"), Some((b'P', "CASE", "NOM")));
        assert_eq!(parse_flag("@C.CASE@"), Some((b'C', "CASE", "")));
        assert_eq!(parse_flag("@U.V.a.b@"), Some((b'U', "V", "a.b")));
        assert_eq!(parse_flag("@R.F.@"), Some((b'R', "F", "")));
    }

    #[test]
    fn parse_rejects_malformed_tokens() {
        assert!(!is_flag(""));
        assert!(!is_flag("@0@"));
        assert!(!is_flag("@X.F.V@"));
        assert!(!is_flag("@P.@"));
        assert!(!is_flag("@PC@"));
        assert!(!is_flag("@_EPSILON_SYMBOL_@"));
        assert!(!is_flag("@_UNKNOWN_SYMBOL_@"));
    }

    #[test]
    fn signed_bitfield_get_set() {
        let mut state = FlagState::default();
        state.set(0, 3, -2);
        state.set(3, 7, 5);
        assert_eq!(state.get(0, 3), -2);
        assert_eq!(state.get(3, 7), 5);
        state.set(0, 3, 1);
        assert_eq!(state.get(0, 3), 1);
        assert_eq!(state.get(3, 7), 5);
    }

    #[test]
    fn bitfield_sign_extends_full_width() {
        let mut state = FlagState::default();
        state.set(60, 64, -1);
        assert_eq!(state.get(60, 64), -1);
        assert_eq!(state.get(0, 4), 0);
    }

    #[test]
    fn feature_and_value_indices_follow_first_appearance() {
        let fd = engine(&["@P.CASE.NOM@", "@P.NUM.SG@", "@R.CASE.GEN@", "@U.CASE.NOM@"]);
        assert_eq!(fd.num_features(), 2);
        assert_eq!(fd.ops()[0], FlagOp { op: b'P', feature: 1, value: 1, _pad: 0 });
        assert_eq!(fd.ops()[1], FlagOp { op: b'P', feature: 2, value: 1, _pad: 0 });
        assert_eq!(fd.ops()[2], FlagOp { op: b'R', feature: 1, value: 2, _pad: 0 });
        assert_eq!(fd.ops()[3], FlagOp { op: b'U', feature: 1, value: 1, _pad: 0 });
    }

    #[test]
    fn offsets_are_prefix_sums_of_field_widths() {
        // CASE has 2 values -> ceil(log2(6)) = 3 bits; NUM has 1 -> 2 bits
        let fd = engine(&["@P.CASE.NOM@", "@R.CASE.GEN@", "@P.NUM.SG@"]);
        assert_eq!(fd.offsets(), &[0, 3, 5]);
    }

    #[test]
    fn offsets_overflow_is_rejected() {
        let mut fd = FlagDiacritics::new();
        // 17 features of one value each need 17 * 2 = 34 bits
        let tokens: Vec<String> = (0..17).map(|k| format!("@P.F{k}.x@")).collect();
        for t in &tokens {
            fd.memorize(t).unwrap();
        }
        assert!(matches!(fd.calculate_offsets(32), Err(FstError::Overflow(_))));
        assert!(fd.calculate_offsets(64).is_ok());
    }

    #[test]
    fn positive_and_negative_set() {
        let fd = engine(&["@P.F.x@", "@N.F.x@", "@C.F@"]);
        let (ok, s) = fd.apply(0, FlagState::default());
        assert!(ok);
        assert_eq!(fd.values(s), vec![1]);
        let (ok, s) = fd.apply(1, s);
        assert!(ok);
        assert_eq!(fd.values(s), vec![-1]);
        let (ok, s) = fd.apply(2, s);
        assert!(ok);
        assert_eq!(fd.values(s), vec![0]);
    }

    #[test]
    fn require_with_and_without_value() {
        let fd = engine(&["@P.F.x@", "@R.F.x@", "@R.F@", "@P.F.y@"]);
        let zero = FlagState::default();
        // empty require: accepted iff the feature is set at all
        assert!(!fd.apply(2, zero).0);
        let (_, set) = fd.apply(0, zero);
        assert!(fd.apply(2, set).0);
        // valued require: exact match
        assert!(fd.apply(1, set).0);
        let (_, set_y) = fd.apply(3, zero);
        assert!(!fd.apply(1, set_y).0);
        // rejection leaves the state unchanged
        assert_eq!(fd.apply(1, set_y).1, set_y);
    }

    #[test]
    fn disallow_with_and_without_value() {
        let fd = engine(&["@P.F.x@", "@D.F.x@", "@D.F@", "@P.F.y@"]);
        let zero = FlagState::default();
        assert!(fd.apply(2, zero).0);
        assert!(fd.apply(1, zero).0);
        let (_, set) = fd.apply(0, zero);
        assert!(!fd.apply(2, set).0);
        assert!(!fd.apply(1, set).0);
        let (_, set_y) = fd.apply(3, zero);
        assert!(fd.apply(1, set_y).0);
    }

    #[test]
    fn unification_rules() {
        let fd = engine(&["@U.F.x@", "@U.F.y@", "@N.F.x@", "@N.F.y@"]);
        let zero = FlagState::default();
        // unset: set and accept
        let (ok, s) = fd.apply(0, zero);
        assert!(ok);
        assert_eq!(fd.values(s), vec![1]);
        // same value: accept
        assert!(fd.apply(0, s).0);
        // different value: reject
        assert!(!fd.apply(1, s).0);
        // negatively set to another value: accept and overwrite
        let (_, neg_y) = fd.apply(3, zero);
        let (ok, s) = fd.apply(0, neg_y);
        assert!(ok);
        assert_eq!(fd.values(s), vec![1]);
        // negatively set to the same value: reject
        let (_, neg_x) = fd.apply(2, zero);
        assert!(!fd.apply(0, neg_x).0);
    }

    #[test]
    fn raw_parts_round_trip() {
        let fd = engine(&["@P.CASE.NOM@", "@U.NUM.SG@"]);
        let rebuilt =
            FlagDiacritics::from_raw_parts(fd.offsets().to_vec(), fd.ops().to_vec()).unwrap();
        let (ok, s) = rebuilt.apply(0, FlagState::default());
        assert!(ok);
        assert_eq!(rebuilt.values(s), fd.values(s));
    }

    #[test]
    fn from_raw_parts_rejects_bad_feature() {
        let err = FlagDiacritics::from_raw_parts(
            vec![0, 2],
            vec![FlagOp { op: b'P', feature: 2, value: 0, _pad: 0 }],
        )
        .unwrap_err();
        assert!(matches!(err, FstError::SnapshotMismatch(_)));
    }
}
