// Transition records and their intra-state ordering.

use crate::symbols::{EPSILON, SymId};

/// Sentinel `to` value marking a final transition.
pub const FINAL: u32 = u32::MAX;

/// One transition of the compiled model.
///
/// After loading, `to` is no longer a state ID but the transition-array
/// offset of the target state's first transition (or [`FINAL`], or a
/// dangling offset one past the end of the array for targets that never
/// appeared as a source state).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub from: u32,
    pub to: u32,
    pub input: SymId,
    pub output: SymId,
    pub weight: f32,
}

/// The four special symbol IDs of a compiled model.
///
/// `unknown` and `identity` are always interned, even when the source
/// text never mentions them, so that tape segmentation has a stable
/// fallback ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialIds {
    pub unknown: SymId,
    pub identity: SymId,
    pub empty: SymId,
    pub flag_base: SymId,
}

/// Sort key within a state block: finals first, then epsilon, flags,
/// ordinary symbols ascending, and the identity/unknown wildcards last.
/// The lookup walks a block in exactly this order.
pub fn group_rank(t: &Transition, specials: &SpecialIds) -> (u8, SymId) {
    if t.to == FINAL {
        (0, 0)
    } else if t.input == EPSILON {
        (1, 0)
    } else if t.input >= specials.flag_base {
        (2, 0)
    } else if t.input == specials.identity || t.input == specials.unknown {
        (4, 0)
    } else {
        (3, t.input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specials() -> SpecialIds {
        SpecialIds {
            unknown: 8,
            identity: 9,
            empty: EPSILON,
            flag_base: 10,
        }
    }

    fn t(to: u32, input: SymId) -> Transition {
        Transition {
            from: 0,
            to,
            input,
            output: input,
            weight: 0.0,
        }
    }

    #[test]
    fn rank_orders_groups() {
        let sp = specials();
        let final_t = t(FINAL, EPSILON);
        let eps = t(1, EPSILON);
        let flag = t(1, 11);
        let ord_a = t(1, 3);
        let ord_b = t(1, 5);
        let ident = t(1, sp.identity);
        let unk = t(1, sp.unknown);

        let mut block = vec![unk, ord_b, flag, ident, eps, ord_a, final_t];
        block.sort_by_key(|t| group_rank(t, &sp));
        let ranks: Vec<SymId> = block.iter().map(|t| t.input).collect();
        assert_eq!(ranks, vec![EPSILON, EPSILON, 11, 3, 5, sp.unknown, sp.identity]);
        assert_eq!(block[0].to, FINAL);
    }

    #[test]
    fn sort_is_stable_within_a_group() {
        let sp = specials();
        let mut block = vec![
            Transition { from: 0, to: 7, input: 3, output: 1, weight: 0.5 },
            Transition { from: 0, to: 9, input: 3, output: 2, weight: 0.25 },
        ];
        block.sort_by_key(|t| group_rank(t, &sp));
        assert_eq!(block[0].output, 1);
        assert_eq!(block[1].output, 2);
    }
}
