// Binary snapshot of a compiled model.
//
// Layout, in order: the BOM of the configured encoding, a width word
// (32 or 64), the packed symbol arena, the ID-to-offset table, the flag
// engine dump (base ID, bit offsets, operations), the four special IDs
// (unknown, identity, empty, flag base) and the transition array.
// Integers and lengths are width-sized words, weights are floats of the
// same width; byte order is native to the host. A reader configured with
// a different encoding or width must fail.

use std::io::Write;

use crate::encoding::{Encoding, prefix_match};
use crate::flags::{FlagDiacritics, FlagOp};
use crate::loader::Transducer;
use crate::symbols::SymbolTable;
use crate::transition::{SpecialIds, Transition};
use crate::{FstError, Width};

/// Serialize a compiled model.
pub fn write_snapshot<W: Write>(
    fst: &Transducer,
    encoding: Encoding,
    out: &mut W,
) -> Result<(), FstError> {
    let width = fst.width();
    out.write_all(encoding.bom())?;
    out.write_all(&width.tag().to_ne_bytes())?;

    let (arena, offsets) = fst.symbols().raw_parts();
    write_word(out, width, arena.len() as u64)?;
    out.write_all(arena)?;
    write_word(out, width, offsets.len() as u64)?;
    match width {
        Width::W32 => out.write_all(bytemuck::cast_slice(offsets))?,
        Width::W64 => {
            for &o in offsets {
                write_word(out, width, o as u64)?;
            }
        }
    }

    let sp = fst.specials();
    write_word(out, width, sp.flag_base as u64)?;
    let flag_offsets = fst.flags().offsets();
    write_word(out, width, flag_offsets.len() as u64)?;
    out.write_all(flag_offsets)?;
    let ops = fst.flags().ops();
    write_word(out, width, ops.len() as u64)?;
    out.write_all(bytemuck::cast_slice(ops))?;

    for id in [sp.unknown, sp.identity, sp.empty, sp.flag_base] {
        write_word(out, width, id as u64)?;
    }

    write_word(out, width, fst.num_transitions() as u64)?;
    for t in fst.transitions() {
        write_word(out, width, t.from as u64)?;
        write_word(out, width, t.to as u64)?;
        write_word(out, width, t.input as u64)?;
        write_word(out, width, t.output as u64)?;
        write_float(out, width, t.weight)?;
    }
    Ok(())
}

/// Read a model back from snapshot bytes. The configured encoding and
/// width must match what the snapshot was written with.
pub fn read_snapshot(data: &[u8], encoding: Encoding, width: Width) -> Result<Transducer, FstError> {
    let bom = encoding.bom();
    let data = if bom.is_empty() {
        data
    } else {
        prefix_match(data, bom).ok_or_else(|| {
            FstError::SnapshotMismatch(format!("missing {encoding:?} byte-order mark"))
        })?
    };

    let mut r = Reader { data, pos: 0, width };
    let tag_bytes = r.take(4)?;
    let tag = u32::from_ne_bytes([tag_bytes[0], tag_bytes[1], tag_bytes[2], tag_bytes[3]]);
    match Width::from_tag(tag) {
        Some(w) if w == width => {}
        _ => {
            return Err(FstError::SnapshotMismatch(format!(
                "width word {tag} does not match the configured {} bits",
                width.bits()
            )));
        }
    }

    let arena_len = r.word()? as usize;
    let arena = r.take(arena_len)?.to_vec();
    let offset_count = r.len_of(4)?;
    let offsets: Vec<u32> = match width {
        Width::W32 => {
            let bytes = r.take(offset_count * 4)?;
            bytemuck::pod_collect_to_vec(bytes)
        }
        Width::W64 => {
            let mut v = Vec::with_capacity(offset_count);
            for _ in 0..offset_count {
                v.push(r.id()?);
            }
            v
        }
    };

    let flag_base = r.id()?;
    let flag_offset_count = r.len_of(1)?;
    let flag_offsets = r.take(flag_offset_count)?.to_vec();
    let op_count = r.len_of(size_of::<FlagOp>())?;
    let op_bytes = r.take(op_count * size_of::<FlagOp>())?;
    let ops: Vec<FlagOp> = bytemuck::pod_collect_to_vec(op_bytes);

    let specials = SpecialIds {
        unknown: r.id()?,
        identity: r.id()?,
        empty: r.id()?,
        flag_base: r.id()?,
    };
    if specials.flag_base != flag_base {
        return Err(FstError::SnapshotMismatch(
            "flag base of the engine dump disagrees with the special IDs".into(),
        ));
    }

    let record_size = match width {
        Width::W32 => 20,
        Width::W64 => 40,
    };
    let n_transitions = r.len_of(record_size)?;
    let mut transitions = Vec::with_capacity(n_transitions);
    for _ in 0..n_transitions {
        transitions.push(Transition {
            from: r.id()?,
            to: r.id()?,
            input: r.id()?,
            output: r.id()?,
            weight: r.float()?,
        });
    }

    let symbols = SymbolTable::from_raw_parts(arena, offsets, flag_base)?;
    if (specials.flag_base as usize) > symbols.len()
        || specials.unknown as usize >= symbols.len()
        || specials.identity as usize >= symbols.len()
    {
        return Err(FstError::SnapshotMismatch(
            "special IDs are outside the alphabet".into(),
        ));
    }
    let flags = FlagDiacritics::from_raw_parts(flag_offsets, ops)?;

    // The state count is not part of the layout; the number of contiguous
    // source blocks is what load statistics report after a reload.
    let mut n_states = 0;
    let mut prev = None;
    for t in &transitions {
        if prev != Some(t.from) {
            n_states += 1;
            prev = Some(t.from);
        }
    }

    Ok(Transducer {
        transitions,
        symbols,
        flags,
        specials,
        width,
        n_states,
    })
}

fn write_word<W: Write>(out: &mut W, width: Width, v: u64) -> Result<(), FstError> {
    match width {
        Width::W32 => out.write_all(&(v as u32).to_ne_bytes())?,
        Width::W64 => out.write_all(&v.to_ne_bytes())?,
    }
    Ok(())
}

fn write_float<W: Write>(out: &mut W, width: Width, v: f32) -> Result<(), FstError> {
    match width {
        Width::W32 => out.write_all(&v.to_ne_bytes())?,
        Width::W64 => out.write_all(&(v as f64).to_ne_bytes())?,
    }
    Ok(())
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    width: Width,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], FstError> {
        let end = self.pos.checked_add(n).filter(|&e| e <= self.data.len());
        let Some(end) = end else {
            return Err(FstError::SnapshotMismatch(format!(
                "truncated snapshot: wanted {n} bytes at offset {}",
                self.pos
            )));
        };
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// An element count whose `element_size` payload must still fit the
    /// remaining data; keeps corrupt lengths from over-allocating.
    fn len_of(&mut self, element_size: usize) -> Result<usize, FstError> {
        let count = self.word()? as usize;
        if count
            .checked_mul(element_size)
            .is_none_or(|b| b > self.data.len() - self.pos)
        {
            return Err(FstError::SnapshotMismatch(format!(
                "implausible element count {count} at offset {}",
                self.pos
            )));
        }
        Ok(count)
    }

    fn word(&mut self) -> Result<u64, FstError> {
        match self.width {
            Width::W32 => {
                let b = self.take(4)?;
                Ok(u32::from_ne_bytes([b[0], b[1], b[2], b[3]]) as u64)
            }
            Width::W64 => {
                let b = self.take(8)?;
                Ok(u64::from_ne_bytes([
                    b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
                ]))
            }
        }
    }

    /// A word that must fit a 32-bit ID.
    fn id(&mut self) -> Result<u32, FstError> {
        let v = self.word()?;
        u32::try_from(v).map_err(|_| {
            FstError::SnapshotMismatch(format!("ID {v} does not fit 32 bits"))
        })
    }

    fn float(&mut self) -> Result<f32, FstError> {
        match self.width {
            Width::W32 => {
                let b = self.take(4)?;
                Ok(f32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
            }
            Width::W64 => {
                let b = self.take(8)?;
                Ok(f64::from_ne_bytes([
                    b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
                ]) as f32)
            }
        }
    }
}
