//! Sampling biases: per-sentence weights that steer which occurrences of a
//! phrase end up in the sample.

use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::bitext::Bitext;
use crate::docmap::DocumentMap;
use crate::error::{BitextError, Result};

/// A weighting of the corpus sentences.
///
/// Implementations are shared between threads behind an `Arc`; the
/// address of that `Arc` identifies the bias in the sampling agenda.
pub trait SamplingBias: Send + Sync + Debug {
    /// Non-negative weight of sentence `sid`.
    fn weight(&self, sid: u32) -> f32;

    /// Class (document) of sentence `sid`, if the bias groups sentences.
    fn class(&self, _sid: u32) -> Option<u32> {
        None
    }
}

/// One explicit weight per sentence.
#[derive(Debug, Clone)]
pub struct SentenceBias {
    weights: Vec<f32>,
}

impl SentenceBias {
    pub fn new(weights: Vec<f32>, num_sentences: usize) -> Result<Self> {
        if weights.len() != num_sentences {
            return Err(BitextError::BiasMismatch {
                expected: num_sentences,
                found: weights.len(),
            });
        }
        if let Some((index, w)) = weights
            .iter()
            .enumerate()
            .find(|(_, w)| !w.is_finite() || **w < 0.0)
        {
            return Err(BitextError::BiasSyntax {
                index,
                message: format!("weight {w} is not a non-negative number"),
            });
        }
        Ok(Self { weights })
    }

    /// Parse whitespace-separated weights.
    pub fn parse(text: &str, num_sentences: usize) -> Result<Self> {
        let weights = text
            .split_whitespace()
            .enumerate()
            .map(|(index, tok)| {
                tok.parse::<f32>().map_err(|_| BitextError::BiasSyntax {
                    index,
                    message: format!("cannot parse '{tok}'"),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(weights, num_sentences)
    }

    pub fn load<P: AsRef<Path>>(path: P, num_sentences: usize) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| BitextError::io(path, e))?;
        let bias = Self::parse(&text, num_sentences)?;
        info!(path = %path.display(), sentences = num_sentences, "loaded sentence bias");
        Ok(bias)
    }
}

impl SamplingBias for SentenceBias {
    fn weight(&self, sid: u32) -> f32 {
        self.weights.get(sid as usize).copied().unwrap_or(0.0)
    }
}

/// Weights assigned per document; every sentence gets the weight of its
/// document. Weights are normalized to sum to one.
#[derive(Debug, Clone)]
pub struct DocumentBias {
    docmap: Arc<DocumentMap>,
    doc_weights: Vec<f32>,
}

impl DocumentBias {
    /// Build from `(document name, weight)` pairs. Unknown names and
    /// negative weights are ignored with a warning.
    pub fn new<'a, I>(docmap: Arc<DocumentMap>, weights: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, f32)>,
    {
        let mut doc_weights = vec![0.0f32; docmap.num_docs()];
        for (name, w) in weights {
            match docmap.docname2docid(name) {
                Some(did) if w.is_finite() && w >= 0.0 => doc_weights[did as usize] = w,
                Some(_) => warn!(doc = name, weight = w, "ignoring invalid document weight"),
                None => warn!(doc = name, "ignoring weight for unknown document"),
            }
        }
        let total: f32 = doc_weights.iter().sum();
        if total > 0.0 {
            doc_weights.iter_mut().for_each(|w| *w /= total);
        }
        Self {
            docmap,
            doc_weights,
        }
    }

    /// Document bias over the document map of `bitext`.
    pub fn for_bitext<'a, I>(bitext: &Bitext, weights: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, f32)>,
    {
        let docmap = bitext.docmap().ok_or(BitextError::NoDocumentMap)?;
        Ok(Self::new(docmap.clone(), weights))
    }

    /// Normalized weight of a document.
    pub fn doc_weight(&self, did: u32) -> f32 {
        self.doc_weights.get(did as usize).copied().unwrap_or(0.0)
    }
}

impl SamplingBias for DocumentBias {
    fn weight(&self, sid: u32) -> f32 {
        self.docmap
            .sid2did(sid)
            .map(|did| self.doc_weight(did))
            .unwrap_or(0.0)
    }

    fn class(&self, sid: u32) -> Option<u32> {
        self.docmap.sid2did(sid)
    }
}
