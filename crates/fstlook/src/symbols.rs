// Symbol table: interning of tape symbols into dense integer IDs.
//
// Symbol texts live in one packed arena of zero-terminated UTF-8 strings;
// an offset table maps IDs back into the arena. ID 0 is always the empty
// (epsilon) symbol. Ordinary symbols are assigned IDs in interning order;
// flag diacritics are appended after the table is frozen, so that
// `epsilon < ordinary symbols < flag_base <= flag IDs` holds.

use hashbrown::HashMap;

use crate::FstError;

/// A symbol ID: index into the alphabet.
pub type SymId = u32;

/// Epsilon, the empty symbol. Always interned first.
pub const EPSILON: SymId = 0;

#[derive(Debug)]
pub struct SymbolTable {
    /// Zero-terminated symbol strings, packed back to back.
    arena: Vec<u8>,
    /// ID to arena offset of the symbol's first byte.
    offsets: Vec<u32>,
    ids: HashMap<String, SymId>,
    /// First flag ID; equals the alphabet size until flags are appended.
    flag_base: SymId,
}

impl SymbolTable {
    pub fn new() -> Self {
        let mut table = Self {
            arena: Vec::new(),
            offsets: Vec::new(),
            ids: HashMap::new(),
            flag_base: 0,
        };
        // Interning order guarantees epsilon gets ID 0.
        let _ = table.intern("");
        table.flag_base = 1;
        table
    }

    /// Number of symbols, flags included.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Intern a symbol, returning its existing or newly assigned ID.
    pub fn intern(&mut self, text: &str) -> Result<SymId, FstError> {
        if let Some(&id) = self.ids.get(text) {
            return Ok(id);
        }
        if self.offsets.len() >= (u32::MAX - 1) as usize || self.arena.len() > u32::MAX as usize {
            return Err(FstError::Overflow(format!(
                "alphabet of {} symbols exceeds the ID range",
                self.offsets.len()
            )));
        }
        let id = self.offsets.len() as SymId;
        self.offsets.push(self.arena.len() as u32);
        self.arena.extend_from_slice(text.as_bytes());
        self.arena.push(0);
        self.ids.insert(text.to_string(), id);
        Ok(id)
    }

    pub fn id_of(&self, text: &str) -> Option<SymId> {
        self.ids.get(text).copied()
    }

    /// The symbol text of `id`. Stable for the lifetime of the table.
    pub fn text_of(&self, id: SymId) -> &str {
        let Some(&start) = self.offsets.get(id as usize) else {
            return "";
        };
        let start = start as usize;
        let end = self.arena[start..]
            .iter()
            .position(|&b| b == 0)
            .map_or(self.arena.len(), |n| start + n);
        std::str::from_utf8(&self.arena[start..end]).unwrap_or("")
    }

    /// Freeze the ordinary alphabet: every later `intern` call appends a
    /// flag symbol, and IDs at or above the returned base are flags.
    pub fn freeze(&mut self) -> SymId {
        self.flag_base = self.offsets.len() as SymId;
        self.flag_base
    }

    pub fn flag_base(&self) -> SymId {
        self.flag_base
    }

    pub fn is_flag_id(&self, id: SymId) -> bool {
        id >= self.flag_base
    }

    /// The packed arena and offset table, for the snapshot codec.
    pub fn raw_parts(&self) -> (&[u8], &[u32]) {
        (&self.arena, &self.offsets)
    }

    /// Rebuild a table from snapshot parts. The interning map is
    /// reconstructed from the arena contents.
    pub fn from_raw_parts(
        arena: Vec<u8>,
        offsets: Vec<u32>,
        flag_base: SymId,
    ) -> Result<Self, FstError> {
        let mut ids = HashMap::with_capacity(offsets.len());
        for (id, &start) in offsets.iter().enumerate() {
            let start = start as usize;
            if start > arena.len() {
                return Err(FstError::SnapshotMismatch(format!(
                    "symbol {id} offset {start} is outside the arena"
                )));
            }
            let end = arena[start..]
                .iter()
                .position(|&b| b == 0)
                .map(|n| start + n)
                .ok_or_else(|| {
                    FstError::SnapshotMismatch("unterminated symbol in arena".into())
                })?;
            let text = std::str::from_utf8(&arena[start..end]).map_err(|_| {
                FstError::SnapshotMismatch(format!("symbol {id} is not valid UTF-8"))
            })?;
            ids.insert(text.to_string(), id as SymId);
        }
        Ok(Self {
            arena,
            offsets,
            ids,
            flag_base,
        })
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}
