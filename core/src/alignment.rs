//! Alignment track: per-sentence word alignment points.
//!
//! Entry `i` holds the `(source position, target position)` pairs of
//! sentence pair `i`. Points are stored flat with an offset table, the same
//! way [`Track`] stores tokens, and persisted with varint encoding.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{BitextError, Result};
use crate::persist;
use crate::track::Track;

/// One alignment point: (source position, target position).
pub type AlignmentPoint = (u16, u16);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignmentTrack {
    starts: Vec<usize>,
    points: Vec<AlignmentPoint>,
}

impl Default for AlignmentTrack {
    fn default() -> Self {
        Self::new()
    }
}

impl AlignmentTrack {
    pub fn new() -> Self {
        Self {
            starts: vec![0],
            points: Vec::new(),
        }
    }

    /// Append the alignment of the next sentence pair.
    pub fn push_sentence(&mut self, points: &[AlignmentPoint]) -> u32 {
        let sid = self.len() as u32;
        self.points.extend_from_slice(points);
        self.starts.push(self.points.len());
        sid
    }

    /// Alignment points of sentence pair `sid`.
    pub fn sentence(&self, sid: u32) -> &[AlignmentPoint] {
        let sid = sid as usize;
        &self.points[self.starts[sid]..self.starts[sid + 1]]
    }

    /// Number of sentence pairs.
    pub fn len(&self) -> usize {
        self.starts.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check that this alignment matches the two tracks it links: same
    /// number of sentences and every point inside its sentence pair.
    pub fn validate(&self, source: &Track, target: &Track) -> Result<()> {
        if self.len() != source.len() {
            return Err(BitextError::SentenceCountMismatch {
                left_name: "alignment",
                left: self.len(),
                right_name: "source track",
                right: source.len(),
            });
        }
        if source.len() != target.len() {
            return Err(BitextError::SentenceCountMismatch {
                left_name: "source track",
                left: source.len(),
                right_name: "target track",
                right: target.len(),
            });
        }
        for sid in 0..self.len() as u32 {
            let len1 = source.sentence_len(sid);
            let len2 = target.sentence_len(sid);
            for &(s, t) in self.sentence(sid) {
                if s as usize >= len1 || t as usize >= len2 {
                    return Err(BitextError::Alignment {
                        sid: sid as usize,
                        message: format!("point {s}-{t} outside {len1}x{len2} sentence pair"),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        persist::save_blob(path, self)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let track: Self = persist::load_blob(path)?;
        if track.starts.first() != Some(&0)
            || track.starts.last() != Some(&track.points.len())
            || track.starts.windows(2).any(|w| w[0] > w[1])
        {
            return Err(BitextError::MalformedTrack(
                "alignment offset table is not monotonic".to_string(),
            ));
        }
        Ok(track)
    }
}

/// Parse a Pharaoh-style alignment line (`"0-0 1-2 2-1"`).
///
/// `sid` is only used for error reporting.
pub fn parse_alignment_line(line: &str, sid: usize) -> Result<Vec<AlignmentPoint>> {
    line.split_whitespace()
        .map(|pair| {
            let bad = || BitextError::Alignment {
                sid,
                message: format!("cannot parse alignment point '{pair}'"),
            };
            let (s, t) = pair.split_once('-').ok_or_else(bad)?;
            let s: u16 = s.parse().map_err(|_| bad())?;
            let t: u16 = t.parse().map_err(|_| bad())?;
            Ok((s, t))
        })
        .collect()
}
