//! Document map: assigns each sentence of the corpus to a named document.
//!
//! The text format is one line per document, `name count`, listing the
//! documents in corpus order. Counts must sum to the corpus size. The
//! reserved name `-` marks a run of sentences that belong to no document
//! (sentences appended to a dynamic bitext end up there).

use ahash::AHashMap;
use std::path::Path;
use tracing::info;

use crate::error::{BitextError, Result};

const NO_DOC: u32 = u32::MAX;
const NO_DOC_NAME: &str = "-";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMap {
    names: Vec<String>,
    ids: AHashMap<String, u32>,
    sid2did: Vec<u32>,
}

impl DocumentMap {
    /// Build from `(name, sentence count)` pairs in corpus order.
    pub fn from_documents<'a, I>(docs: I, expected: usize) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, usize)>,
    {
        let mut map = Self {
            names: Vec::new(),
            ids: AHashMap::new(),
            sid2did: Vec::with_capacity(expected),
        };
        for (line, (name, count)) in docs.into_iter().enumerate() {
            map.push_document(name, count, line + 1)?;
        }
        map.check_size(expected)?;
        Ok(map)
    }

    fn push_document(&mut self, name: &str, count: usize, line: usize) -> Result<()> {
        if name == NO_DOC_NAME {
            self.sid2did.extend(std::iter::repeat(NO_DOC).take(count));
            return Ok(());
        }
        if self.ids.contains_key(name) {
            return Err(BitextError::DocumentMapSyntax {
                line,
                message: format!("duplicate document name '{name}'"),
            });
        }
        let did = self.names.len() as u32;
        self.names.push(name.to_string());
        self.ids.insert(name.to_string(), did);
        self.sid2did.extend(std::iter::repeat(did).take(count));
        Ok(())
    }

    fn check_size(&self, expected: usize) -> Result<()> {
        if self.sid2did.len() != expected {
            return Err(BitextError::DocumentMapMismatch {
                expected,
                found: self.sid2did.len(),
            });
        }
        Ok(())
    }

    /// Parse the `name count` text format.
    pub fn parse(text: &str, expected: usize) -> Result<Self> {
        let mut map = Self {
            names: Vec::new(),
            ids: AHashMap::new(),
            sid2did: Vec::with_capacity(expected),
        };
        for (i, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            let mut fields = line.split_whitespace();
            let (Some(name), Some(count), None) = (fields.next(), fields.next(), fields.next())
            else {
                return Err(BitextError::DocumentMapSyntax {
                    line: i + 1,
                    message: format!("expected 'name count', got '{line}'"),
                });
            };
            let count: usize = count.parse().map_err(|_| BitextError::DocumentMapSyntax {
                line: i + 1,
                message: format!("bad sentence count '{count}'"),
            })?;
            map.push_document(name, count, i + 1)?;
        }
        map.check_size(expected)?;
        Ok(map)
    }

    /// Load a document map file for a corpus of `expected` sentences.
    pub fn load<P: AsRef<Path>>(path: P, expected: usize) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| BitextError::io(path, e))?;
        let map = Self::parse(&text, expected)?;
        info!(path = %path.display(), docs = map.num_docs(), "loaded document map");
        Ok(map)
    }

    /// Render in the text format, one line per run of sentences.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        // documents are contiguous and numbered in corpus order; empty ones
        // are written where they were declared
        let mut next_doc = 0usize;
        let mut i = 0;
        while i < self.sid2did.len() {
            let did = self.sid2did[i];
            let run = self.sid2did[i..].iter().take_while(|&&d| d == did).count();
            if did != NO_DOC {
                for name in &self.names[next_doc.min(did as usize)..did as usize] {
                    out.push_str(&format!("{name} 0\n"));
                }
                next_doc = did as usize + 1;
            }
            let name = self.docid2name(did).unwrap_or(NO_DOC_NAME);
            out.push_str(&format!("{name} {run}\n"));
            i += run;
        }
        for name in self.names.iter().skip(next_doc) {
            out.push_str(&format!("{name} 0\n"));
        }
        out
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_text()).map_err(|e| BitextError::io(path, e))
    }

    /// Copy of this map covering `extra` appended sentences that belong to
    /// no document.
    pub fn extended(&self, extra: usize) -> Self {
        let mut map = self.clone();
        map.sid2did.extend(std::iter::repeat(NO_DOC).take(extra));
        map
    }

    pub fn num_docs(&self) -> usize {
        self.names.len()
    }

    /// Number of sentences covered, including unassigned ones.
    pub fn num_sentences(&self) -> usize {
        self.sid2did.len()
    }

    pub fn sid2did(&self, sid: u32) -> Option<u32> {
        match self.sid2did.get(sid as usize) {
            Some(&did) if did != NO_DOC => Some(did),
            _ => None,
        }
    }

    pub fn docid2name(&self, did: u32) -> Option<&str> {
        self.names.get(did as usize).map(String::as_str)
    }

    pub fn docname2docid(&self, name: &str) -> Option<u32> {
        self.ids.get(name).copied()
    }

    pub fn sid2docname(&self, sid: u32) -> Option<&str> {
        self.sid2did(sid).and_then(|did| self.docid2name(did))
    }

    /// Iterate `(sid, did)` over assigned sentences.
    pub fn assignments(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.sid2did
            .iter()
            .enumerate()
            .filter(|&(_, &did)| did != NO_DOC)
            .map(|(sid, &did)| (sid as u32, did))
    }
}
