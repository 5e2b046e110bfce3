//! Read-only mapping from stable card IDs to cache artifacts, built once
//! after the transcoder finishes. The room engine holds a shared reference
//! to iterate over for deck construction but never mutates it.

use crate::error::PipelineError;
use crate::loader::SourceRef;
use crate::transcoder::CardCache;
use crate::transcoder::TransformSpec;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use talespin_core::CardFormat;

#[derive(Debug, Clone)]
pub struct Card {
    pub id: String,
    pub source_path: PathBuf,
    pub artifact_path: PathBuf,
    pub format: CardFormat,
}

#[derive(Debug, Clone)]
pub struct CardRegistry {
    cards: Vec<Card>,
    by_id: HashMap<String, usize>,
}

impl CardRegistry {
    /// Transcodes every source with a bounded worker pool and assembles the
    /// registry. IDs are assigned in path-sorted order so the mapping is
    /// reproducible across restarts given identical inputs. A per-source
    /// failure drops that source from the final set; the boot fails only if
    /// every source fails.
    pub async fn build(
        sources: Vec<SourceRef>,
        cache: &CardCache,
        spec: &TransformSpec,
        validate: bool,
        concurrency: usize,
    ) -> Result<Self, PipelineError> {
        let total = sources.len();
        let semaphore = Arc::new(tokio::sync::Semaphore::new(concurrency.max(1)));
        let mut tasks = Vec::with_capacity(total);

        for source in sources {
            let permit = semaphore.clone();
            let spec = *spec;
            tasks.push(async move {
                let _permit = permit.acquire_owned().await.expect("semaphore open");
                let path = source.path.clone();
                match cache.ensure(&source, &spec, validate).await {
                    Ok(artifact_path) => Some((path, artifact_path)),
                    Err(e) => {
                        log::warn!("dropping source {} after transcode failure: {e}", path.display());
                        None
                    }
                }
            });
        }

        let mut results: Vec<(PathBuf, PathBuf)> =
            futures::future::join_all(tasks).await.into_iter().flatten().collect();
        results.sort_by(|a, b| a.0.cmp(&b.0));

        if results.is_empty() {
            return Err(if total == 0 {
                PipelineError::NoImagesFound
            } else {
                PipelineError::AllSourcesFailed
            });
        }

        let mut cards = Vec::with_capacity(results.len());
        let mut by_id = HashMap::with_capacity(results.len());
        for (idx, (source_path, artifact_path)) in results.into_iter().enumerate() {
            let id = short_id(idx);
            by_id.insert(id.clone(), cards.len());
            cards.push(Card {
                id,
                source_path,
                artifact_path,
                format: spec.format,
            });
        }

        log::info!("card registry built with {} card(s)", cards.len());
        Ok(Self { cards, by_id })
    }

    pub fn get(&self, id: &str) -> Option<&Card> {
        self.by_id.get(id).map(|&i| &self.cards[i])
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub async fn read(&self, id: &str) -> Result<(Vec<u8>, &'static str), PipelineError> {
        let card = self
            .get(id)
            .ok_or_else(|| PipelineError::UnknownCardId(id.to_string()))?;
        let bytes = tokio::fs::read(&card.artifact_path)
            .await
            .map_err(|e| PipelineError::io(&card.artifact_path, e))?;
        Ok((bytes, card.format.mime()))
    }
}

impl<'a> IntoIterator for &'a CardRegistry {
    type Item = &'a Card;
    type IntoIter = std::slice::Iter<'a, Card>;

    fn into_iter(self) -> Self::IntoIter {
        self.cards.iter()
    }
}

/// Short opaque base-36 identifier, stable for a given ordinal.
fn short_id(mut ordinal: usize) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if ordinal == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while ordinal > 0 {
        digits.push(ALPHABET[ordinal % 36]);
        ordinal /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).expect("base36 alphabet is ascii")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_ids_are_distinct_and_deterministic() {
        let ids: Vec<String> = (0..40).map(short_id).collect();
        let unique: std::collections::HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
        assert_eq!(short_id(0), "0");
        assert_eq!(short_id(35), "z");
        assert_eq!(short_id(36), "10");
    }
}
