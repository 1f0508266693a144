/// HNSW vector index for dense passage retrieval
use super::{IndexError, PassageStore, VectorIndex};
use crate::retrieval::Passage;
use ahash::AHashMap;
use hnsw_rs::prelude::*;

/// Upper bound on HNSW layers
const MAX_LAYERS: usize = 16;

/// HNSW construction and search parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HnswParams {
    /// Connections per node (M)
    pub max_connections: usize,
    /// Candidate list size while building (higher = better recall, slower build)
    pub ef_construction: usize,
    /// Candidate list size while searching (higher = better recall, slower search)
    pub ef_search: usize,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            max_connections: 16,
            ef_construction: 200,
            ef_search: 64,
        }
    }
}

/// In-memory HNSW index that also stores the passages it indexes
///
/// Uses cosine distance; reported scores are `1 - distance`.
pub struct HnswIndex {
    hnsw: Hnsw<'static, f32, DistCosine>,
    passages: Vec<Passage>,
    positions: AHashMap<String, usize>,
    dimension: usize,
    ef_search: usize,
}

impl HnswIndex {
    /// Build an index over `passages` with their precomputed embeddings.
    ///
    /// # Arguments
    /// * `passages` - Passages, in the same order as `vectors`
    /// * `vectors` - One embedding per passage, all of the same dimension
    /// * `params` - HNSW parameters
    pub fn build(
        passages: Vec<Passage>,
        vectors: Vec<Vec<f32>>,
        params: HnswParams,
    ) -> Result<Self, IndexError> {
        if passages.len() != vectors.len() {
            return Err(IndexError::InsertError(format!(
                "{} passages but {} vectors",
                passages.len(),
                vectors.len()
            )));
        }

        let dimension = vectors.first().map(Vec::len).unwrap_or(0);
        let hnsw = Hnsw::<f32, DistCosine>::new(
            params.max_connections,
            passages.len().max(1),
            MAX_LAYERS,
            params.ef_construction,
            DistCosine,
        );

        let mut kept = Vec::with_capacity(passages.len());
        let mut positions = AHashMap::with_capacity(passages.len());

        for (passage, vector) in passages.into_iter().zip(vectors) {
            if vector.len() != dimension {
                return Err(IndexError::InvalidDimension {
                    expected: dimension,
                    actual: vector.len(),
                });
            }
            if positions.contains_key(&passage.id) {
                tracing::debug!("Skipping duplicate passage id: {}", passage.id);
                continue;
            }

            let position = kept.len();
            hnsw.insert((vector.as_slice(), position));
            positions.insert(passage.id.clone(), position);
            kept.push(passage);
        }

        tracing::info!(
            "Built HNSW index: {} vectors of dimension {}",
            kept.len(),
            dimension
        );

        Ok(Self {
            hnsw,
            passages: kept,
            positions,
            dimension,
            ef_search: params.ef_search,
        })
    }
}

impl PassageStore for HnswIndex {
    fn get(&self, ids: &[String]) -> Result<Vec<Passage>, IndexError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.positions.get(id))
            .map(|&pos| self.passages[pos].clone())
            .collect())
    }
}

impl VectorIndex for HnswIndex {
    fn search(&self, vector: &[f32], k: usize) -> Result<Vec<(String, f32)>, IndexError> {
        if self.passages.is_empty() {
            return Err(IndexError::NotBuilt("vector index is empty".to_string()));
        }
        if vector.len() != self.dimension {
            return Err(IndexError::InvalidDimension {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let neighbours = self.hnsw.search(vector, k, self.ef_search.max(k));

        let mut results: Vec<(String, f32)> = neighbours
            .into_iter()
            .filter_map(|n| {
                self.passages
                    .get(n.d_id)
                    .map(|p| (p.id.clone(), 1.0 - n.distance))
            })
            .collect();

        results.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        results.truncate(k);
        Ok(results)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.passages.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::SourceMetadata;

    fn unit(dim: usize, axis: usize) -> Vec<f32> {
        let mut v = vec![0.0; dim];
        v[axis] = 1.0;
        v
    }

    fn sample() -> (Vec<Passage>, Vec<Vec<f32>>) {
        let passages = ["нефть", "газ", "нефть и газ"]
            .iter()
            .map(|t| Passage::new(*t, SourceMetadata::default()))
            .collect();

        let mut mixed = vec![0.0; 8];
        mixed[0] = 0.9;
        mixed[1] = 0.1;

        (passages, vec![unit(8, 0), unit(8, 1), mixed])
    }

    #[test]
    fn test_build_and_search() {
        let (passages, vectors) = sample();
        let index = HnswIndex::build(passages, vectors, HnswParams::default()).unwrap();

        assert_eq!(index.len(), 3);
        assert_eq!(index.dimension(), 8);

        let results = index.search(&unit(8, 0), 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, Passage::content_id("нефть"));
        assert!(results[0].1 > 0.99);
        assert_eq!(results[1].0, Passage::content_id("нефть и газ"));
    }

    #[test]
    fn test_dimension_validation() {
        let (passages, mut vectors) = sample();
        vectors[2] = vec![1.0; 4];
        assert!(matches!(
            HnswIndex::build(passages, vectors, HnswParams::default()),
            Err(IndexError::InvalidDimension { expected: 8, actual: 4 })
        ));

        let (passages, vectors) = sample();
        let index = HnswIndex::build(passages, vectors, HnswParams::default()).unwrap();
        assert!(index.search(&[1.0; 3], 1).is_err());
    }

    #[test]
    fn test_mismatched_lengths() {
        let (passages, mut vectors) = sample();
        vectors.pop();
        assert!(HnswIndex::build(passages, vectors, HnswParams::default()).is_err());
    }

    #[test]
    fn test_empty_index_is_not_built() {
        let index = HnswIndex::build(Vec::new(), Vec::new(), HnswParams::default()).unwrap();
        assert!(matches!(
            index.search(&[], 3),
            Err(IndexError::NotBuilt(_))
        ));
    }

    #[test]
    fn test_get() {
        let (passages, vectors) = sample();
        let index = HnswIndex::build(passages, vectors, HnswParams::default()).unwrap();
        let found = index.get(&[Passage::content_id("газ")]).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].text, "газ");
    }
}
