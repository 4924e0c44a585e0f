//! Vocabulary: bidirectional word <-> token id mapping.
//!
//! Ids are dense and contiguous. Two ids are reserved:
//! - `NULL_ID` (0) for the empty word,
//! - `UNK_ID` (1) for words a closed vocabulary does not know.
//!
//! A vocabulary is either *dynamic* (unseen words get fresh ids) or *closed*
//! (unseen words map to `UNK_ID`). It never shrinks.
//!
//! On disk the vocabulary is the list of words in id order (each word
//! length-prefixed by bincode); the reverse index is rebuilt on load.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use crate::persist;

/// Token id type used by tracks and suffix arrays.
pub type TokenId = u32;

pub const NULL_ID: TokenId = 0;
pub const UNK_ID: TokenId = 1;

const NULL_WORD: &str = "NULL";
const UNK_WORD: &str = "UNK";

#[derive(Debug, Clone)]
pub struct Vocabulary {
    words: Vec<String>,
    ids: AHashMap<String, TokenId>,
    dynamic: bool,
}

#[derive(Serialize, Deserialize)]
struct VocabFile {
    words: Vec<String>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Vocabulary {
    /// Create a vocabulary holding only the reserved words.
    pub fn new(dynamic: bool) -> Self {
        let mut v = Self {
            words: Vec::new(),
            ids: AHashMap::new(),
            dynamic,
        };
        v.push_word(NULL_WORD);
        v.push_word(UNK_WORD);
        v
    }

    fn push_word(&mut self, word: &str) -> TokenId {
        let id = self.words.len() as TokenId;
        self.words.push(word.to_string());
        self.ids.insert(word.to_string(), id);
        id
    }

    /// Look up a word without modifying the vocabulary.
    pub fn get(&self, word: &str) -> Option<TokenId> {
        self.ids.get(word).copied()
    }

    /// Id for `word`, or `UNK_ID` if unknown.
    pub fn id_or_unk(&self, word: &str) -> TokenId {
        self.get(word).unwrap_or(UNK_ID)
    }

    /// Id for `word`, assigning a fresh id if the vocabulary is dynamic.
    pub fn intern(&mut self, word: &str) -> TokenId {
        match self.get(word) {
            Some(id) => id,
            None if self.dynamic => self.push_word(word),
            None => UNK_ID,
        }
    }

    /// Word for an id, if the id is in range.
    pub fn word(&self, id: TokenId) -> Option<&str> {
        self.words.get(id as usize).map(String::as_str)
    }

    /// Render a token sequence as a space-separated string.
    pub fn render(&self, tokens: &[TokenId]) -> String {
        tokens
            .iter()
            .map(|&t| self.word(t).unwrap_or(UNK_WORD))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    pub fn set_dynamic(&mut self, dynamic: bool) {
        self.dynamic = dynamic;
    }

    /// Number of ids, including the reserved ones.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// True when only the reserved words are present.
    pub fn is_empty(&self) -> bool {
        self.words.len() <= 2
    }

    /// Save to a `.tdx` file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        persist::save_blob(
            path,
            &VocabFile {
                words: self.words.clone(),
            },
        )
    }

    /// Load a `.tdx` file. Loaded vocabularies are closed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file: VocabFile = persist::load_blob(path)?;
        let ids = file
            .words
            .iter()
            .enumerate()
            .map(|(i, w)| (w.clone(), i as TokenId))
            .collect();
        Ok(Self {
            words: file.words,
            ids,
            dynamic: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_ids() {
        let v = Vocabulary::new(true);
        assert_eq!(v.get("NULL"), Some(NULL_ID));
        assert_eq!(v.get("UNK"), Some(UNK_ID));
        assert!(v.is_empty());
    }

    #[test]
    fn dynamic_assigns_dense_ids() {
        let mut v = Vocabulary::new(true);
        let a = v.intern("house");
        let b = v.intern("garden");
        assert_eq!(a, 2);
        assert_eq!(b, 3);
        assert_eq!(v.intern("house"), a);
        assert_eq!(v.word(b), Some("garden"));
    }

    #[test]
    fn closed_maps_unknown_to_unk() {
        let mut v = Vocabulary::new(false);
        assert_eq!(v.intern("house"), UNK_ID);
        assert_eq!(v.len(), 2);
    }

    #[test]
    fn save_and_load_rebuilds_reverse_index() {
        let tmp = std::env::temp_dir().join("sapt_vocab_test.tdx");
        let mut v = Vocabulary::new(true);
        v.intern("das");
        v.intern("haus");
        v.save(&tmp).unwrap();
        let loaded = Vocabulary::load(&tmp).unwrap();
        assert_eq!(loaded.len(), 4);
        assert_eq!(loaded.get("haus"), Some(3));
        assert!(!loaded.is_dynamic());
        assert_eq!(loaded.render(&[2, 3]), "das haus");
        let _ = std::fs::remove_file(tmp);
    }
}
