//! Bitext: a word-aligned parallel corpus with a suffix array per side.
//!
//! A `Bitext` is immutable once built. Growing a dynamic corpus produces a
//! new value (a new *generation*, see [`Bitext::add`]) that shares nothing
//! mutable with the old one, so readers holding an `Arc<Bitext>` are never
//! disturbed by an append.

use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::alignment::{parse_alignment_line, AlignmentPoint, AlignmentTrack};
use crate::docmap::DocumentMap;
use crate::error::{BitextError, Result};
use crate::orientation::{PhraseOrientation, SentenceLinks};
use crate::persist::with_suffix;
use crate::suffix_array::{Cursor, Span, SuffixArray};
use crate::track::{Track, MAX_SENTENCE_LEN};
use crate::utils;
use crate::vocab::{TokenId, Vocabulary};

/// Which half of the bitext a cursor or lookup refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Side {
    Source,
    Target,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::Source => Side::Target,
            Side::Target => Side::Source,
        }
    }
}

/// Result of projecting a phrase occurrence through the word alignment.
///
/// Any target phrase starting in `soft_start..=hard_start` and ending
/// (exclusive) in `hard_end..=soft_end` is consistent with the alignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhraseBounds {
    pub soft_start: u16,
    pub hard_start: u16,
    pub hard_end: u16,
    pub soft_end: u16,
    pub po_fwd: PhraseOrientation,
    pub po_bwd: PhraseOrientation,
    /// `(source offset, target offset)` relative to the phrase start and
    /// `hard_start`, in source order.
    pub core_alignment: Vec<AlignmentPoint>,
}

#[derive(Debug)]
pub struct Bitext {
    revision: u64,
    v1: Arc<Vocabulary>,
    v2: Arc<Vocabulary>,
    t1: Arc<Track>,
    t2: Arc<Track>,
    tx: Arc<AlignmentTrack>,
    i1: Arc<SuffixArray>,
    i2: Arc<SuffixArray>,
    docmap: Option<Arc<DocumentMap>>,
}

fn tokenize(vocab: &mut Vocabulary, line: &str) -> Vec<TokenId> {
    utils::normalize(line)
        .split_whitespace()
        .map(|w| vocab.intern(w))
        .collect()
}

impl Bitext {
    #[allow(clippy::too_many_arguments)]
    fn assemble(
        revision: u64,
        v1: Arc<Vocabulary>,
        v2: Arc<Vocabulary>,
        t1: Arc<Track>,
        t2: Arc<Track>,
        tx: Arc<AlignmentTrack>,
        i1: Arc<SuffixArray>,
        i2: Arc<SuffixArray>,
        docmap: Option<Arc<DocumentMap>>,
    ) -> Result<Self> {
        tx.validate(&t1, &t2)?;
        if let Some(dm) = &docmap {
            if dm.num_sentences() != t1.len() {
                return Err(BitextError::DocumentMapMismatch {
                    expected: t1.len(),
                    found: dm.num_sentences(),
                });
            }
        }
        Ok(Self {
            revision,
            v1,
            v2,
            t1,
            t2,
            tx,
            i1,
            i2,
            docmap,
        })
    }

    /// Open the files written by [`Bitext::save`] for `prefix`, `l1`, `l2`:
    /// `{prefix}{l}.tdx`, `.mct`, `.sfa` per language, the alignment
    /// `{prefix}{l1}-{l2}.mam`, and the optional document map `{prefix}dmp`.
    pub fn open<P: AsRef<Path>>(prefix: P, l1: &str, l2: &str) -> Result<Self> {
        let prefix = prefix.as_ref();
        let load_side = |l: &str| -> Result<(Vocabulary, Arc<Track>, SuffixArray)> {
            let vocab = Vocabulary::load(with_suffix(prefix, &format!("{l}.tdx")))?;
            let track = Arc::new(Track::load(with_suffix(prefix, &format!("{l}.mct")))?);
            let index = SuffixArray::load(with_suffix(prefix, &format!("{l}.sfa")), track.clone())?;
            Ok((vocab, track, index))
        };
        let (v1, t1, i1) = load_side(l1)?;
        let (v2, t2, i2) = load_side(l2)?;
        let tx = AlignmentTrack::load(with_suffix(prefix, &format!("{l1}-{l2}.mam")))?;

        let dmp = with_suffix(prefix, "dmp");
        let docmap = if dmp.exists() {
            Some(Arc::new(DocumentMap::load(&dmp, t1.len())?))
        } else {
            None
        };

        let bitext = Self::assemble(
            0,
            Arc::new(v1),
            Arc::new(v2),
            t1,
            t2,
            Arc::new(tx),
            Arc::new(i1),
            Arc::new(i2),
            docmap,
        )?;
        info!(
            prefix = %prefix.display(),
            sentences = bitext.num_sentences(),
            source_tokens = bitext.t1.num_tokens(),
            target_tokens = bitext.t2.num_tokens(),
            "opened bitext"
        );
        Ok(bitext)
    }

    /// Write all components so that [`Bitext::open`] restores an
    /// equivalent bitext.
    pub fn save<P: AsRef<Path>>(&self, prefix: P, l1: &str, l2: &str) -> Result<()> {
        let prefix = prefix.as_ref();
        for (l, v, t, i) in [(l1, &self.v1, &self.t1, &self.i1), (l2, &self.v2, &self.t2, &self.i2)] {
            v.save(with_suffix(prefix, &format!("{l}.tdx")))?;
            t.save(with_suffix(prefix, &format!("{l}.mct")))?;
            i.save(with_suffix(prefix, &format!("{l}.sfa")))?;
        }
        self.tx.save(with_suffix(prefix, &format!("{l1}-{l2}.mam")))?;
        if let Some(dm) = &self.docmap {
            dm.save(with_suffix(prefix, "dmp"))?;
        }
        info!(prefix = %prefix.display(), revision = self.revision, "saved bitext");
        Ok(())
    }

    /// Build the next generation with `pairs` appended.
    ///
    /// Each pair is `(source line, target line, alignment line)`. Unknown
    /// words get fresh ids; existing sentences, ids and phrase ids are
    /// unchanged. Appended sentences belong to no document.
    pub fn add<S: AsRef<str>>(&self, pairs: &[(S, S, S)]) -> Result<Self> {
        let mut v1 = (*self.v1).clone();
        let mut v2 = (*self.v2).clone();
        v1.set_dynamic(true);
        v2.set_dynamic(true);
        let mut t1 = (*self.t1).clone();
        let mut t2 = (*self.t2).clone();
        let mut tx = (*self.tx).clone();
        for (src, trg, aln) in pairs {
            let sid = t1.len();
            t1.push_sentence(&tokenize(&mut v1, src.as_ref()))?;
            t2.push_sentence(&tokenize(&mut v2, trg.as_ref()))?;
            tx.push_sentence(&parse_alignment_line(aln.as_ref(), sid)?);
        }
        v1.set_dynamic(self.v1.is_dynamic());
        v2.set_dynamic(self.v2.is_dynamic());

        let t1 = Arc::new(t1);
        let t2 = Arc::new(t2);
        let i1 = Arc::new(self.i1.extended(t1.clone())?);
        let i2 = Arc::new(self.i2.extended(t2.clone())?);
        let docmap = self
            .docmap
            .as_ref()
            .map(|dm| Arc::new(dm.extended(pairs.len())));
        let next = Self::assemble(
            self.revision + 1,
            Arc::new(v1),
            Arc::new(v2),
            t1,
            t2,
            Arc::new(tx),
            i1,
            i2,
            docmap,
        )?;
        info!(
            revision = next.revision,
            added = pairs.len(),
            sentences = next.num_sentences(),
            "built bitext generation"
        );
        Ok(next)
    }

    /// Generation number; 0 for a freshly opened or built bitext.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn num_sentences(&self) -> usize {
        self.t1.len()
    }

    pub fn vocab(&self, side: Side) -> &Arc<Vocabulary> {
        match side {
            Side::Source => &self.v1,
            Side::Target => &self.v2,
        }
    }

    pub fn track(&self, side: Side) -> &Arc<Track> {
        match side {
            Side::Source => &self.t1,
            Side::Target => &self.t2,
        }
    }

    pub fn index(&self, side: Side) -> &Arc<SuffixArray> {
        match side {
            Side::Source => &self.i1,
            Side::Target => &self.i2,
        }
    }

    pub fn alignment(&self) -> &Arc<AlignmentTrack> {
        &self.tx
    }

    pub fn docmap(&self) -> Option<&Arc<DocumentMap>> {
        self.docmap.as_ref()
    }

    /// Root cursor on one side.
    pub fn cursor(&self, side: Side) -> Cursor {
        Cursor::new(self.index(side).clone())
    }

    /// Which side of *this* generation `cursor` was created on, if any.
    pub fn side_of(&self, cursor: &Cursor) -> Option<Side> {
        if Arc::ptr_eq(cursor.index(), &self.i1) {
            Some(Side::Source)
        } else if Arc::ptr_eq(cursor.index(), &self.i2) {
            Some(Side::Target)
        } else {
            None
        }
    }

    /// Map words to ids on one side without growing the vocabulary.
    pub fn encode(&self, side: Side, text: &str) -> Vec<TokenId> {
        let vocab = self.vocab(side);
        utils::normalize(text)
            .split_whitespace()
            .map(|w| vocab.id_or_unk(w))
            .collect()
    }

    /// Cursor for a whitespace-tokenized phrase, if it occurs.
    pub fn find(&self, side: Side, text: &str) -> Option<Cursor> {
        Cursor::for_phrase(self.index(side).clone(), &self.encode(side, text))
    }

    /// Render a token sequence from one side.
    pub fn phrase_to_string(&self, side: Side, tokens: &[TokenId]) -> String {
        self.vocab(side).render(tokens)
    }

    /// Render the phrase occurrence `span` from one side.
    pub fn span_to_string(&self, side: Side, span: &Span) -> String {
        self.phrase_to_string(side, span.tokens(self.track(side)))
    }

    /// Project source span `[start, stop)` of sentence pair `sid` onto the
    /// other side. With `flip` the roles of source and target are swapped.
    ///
    /// Returns `None` when the span has no aligned words or when a word
    /// aligned to something outside the span falls inside the hard target
    /// range.
    pub fn find_target_phrase_bounds(
        &self,
        sid: u32,
        start: u16,
        stop: u16,
        flip: bool,
    ) -> Option<PhraseBounds> {
        let (t1, t2) = if flip { (&self.t2, &self.t1) } else { (&self.t1, &self.t2) };
        let len1 = t1.sentence_len(sid);
        let len2 = t2.sentence_len(sid);
        let (start, stop) = (start as usize, stop as usize);
        if start >= stop || stop > len1 {
            return None;
        }
        let links = SentenceLinks::new(self.tx.sentence(sid), len1, len2, flip);

        // Target positions linked to source positions outside the span.
        let mut forbidden = vec![false; len2];
        let mut lft = usize::MAX;
        let mut rgt = 0usize;
        for (i, targets) in links.src.iter().enumerate() {
            let inside = (start..stop).contains(&i);
            for &j in targets {
                let j = j as usize;
                if inside {
                    lft = lft.min(j);
                    rgt = rgt.max(j);
                } else {
                    forbidden[j] = true;
                }
            }
        }
        if lft > rgt {
            return None;
        }
        if forbidden[lft..=rgt].iter().any(|&f| f) {
            return None;
        }

        let mut soft_start = lft;
        while soft_start > 0 && !forbidden[soft_start - 1] {
            soft_start -= 1;
        }
        let mut soft_end = rgt + 1;
        while soft_end < len2 && !forbidden[soft_end] {
            soft_end += 1;
        }

        let mut core_alignment = Vec::new();
        for i in start..stop {
            for &j in &links.src[i] {
                core_alignment.push(((i - start) as u16, (j as usize - lft) as u16));
            }
        }

        let soft = (soft_start, soft_end);
        Some(PhraseBounds {
            soft_start: soft_start as u16,
            hard_start: lft as u16,
            hard_end: (rgt + 1) as u16,
            soft_end: soft_end as u16,
            po_fwd: links.forward(start, stop, soft),
            po_bwd: links.backward(start, stop, soft),
            core_alignment,
        })
    }
}

/// Builds a [`Bitext`] in memory from tokenized text.
///
/// Lines are NFC-normalized and split on whitespace; alignments use the
/// `i-j` notation (source position, target position).
#[derive(Debug, Default)]
pub struct BitextBuilder {
    v1: Vocabulary,
    v2: Vocabulary,
    t1: Track,
    t2: Track,
    tx: AlignmentTrack,
    documents: Vec<(String, usize)>,
}

impl BitextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one sentence pair and return its sentence id. On error
    /// nothing is appended to either side.
    pub fn add_pair(&mut self, source: &str, target: &str, alignment: &str) -> Result<u32> {
        let sid = self.t1.len();
        let points = parse_alignment_line(alignment, sid)?;
        let s = tokenize(&mut self.v1, source);
        let t = tokenize(&mut self.v2, target);
        if let Some(len) = [s.len(), t.len()].into_iter().find(|&n| n > MAX_SENTENCE_LEN) {
            return Err(BitextError::SentenceTooLong { sid, len });
        }
        self.t1.push_sentence(&s)?;
        self.t2.push_sentence(&t)?;
        self.tx.push_sentence(&points);
        Ok(sid as u32)
    }

    /// Append a whole document; the pairs are recorded in the document map.
    pub fn add_document<S: AsRef<str>>(&mut self, name: &str, pairs: &[(S, S, S)]) -> Result<()> {
        self.close_gap();
        for (src, trg, aln) in pairs {
            self.add_pair(src.as_ref(), trg.as_ref(), aln.as_ref())?;
        }
        self.documents.push((name.to_string(), pairs.len()));
        Ok(())
    }

    /// Record pairs added outside any document as an unassigned run.
    fn close_gap(&mut self) {
        let covered: usize = self.documents.iter().map(|(_, n)| n).sum();
        if covered < self.t1.len() {
            self.documents.push(("-".to_string(), self.t1.len() - covered));
        }
    }

    /// Index both sides and validate the alignment.
    pub fn build(mut self) -> Result<Bitext> {
        let docmap = if self.documents.is_empty() {
            None
        } else {
            self.close_gap();
            let docs = self.documents.iter().map(|(n, c)| (n.as_str(), *c));
            Some(Arc::new(DocumentMap::from_documents(docs, self.t1.len())?))
        };
        let t1 = Arc::new(self.t1);
        let t2 = Arc::new(self.t2);
        let i1 = Arc::new(SuffixArray::build(t1.clone()));
        let i2 = Arc::new(SuffixArray::build(t2.clone()));
        let bitext = Bitext::assemble(
            0,
            Arc::new(self.v1),
            Arc::new(self.v2),
            t1,
            t2,
            Arc::new(self.tx),
            i1,
            i2,
            docmap,
        )?;
        info!(sentences = bitext.num_sentences(), "built bitext");
        Ok(bitext)
    }
}
