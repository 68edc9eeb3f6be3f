//! Similarity merging: union-find over the concept cosine-similarity graph
//! collapses near-duplicates into groups. The group-level similarity matrix
//! that falls out drives both layout attraction and visualization edges.

use tracing::info;

use crate::core::types::Concept;

/// Concept pairs above this cosine similarity collapse into one group.
pub const MERGE_THRESHOLD: f64 = 0.70;

/// Group pairs above this centroid similarity become visualization edges.
pub const CONNECTION_THRESHOLD: f64 = 0.4;

/// One merged component: members ordered by descending importance plus the
/// arithmetic-mean centroid (not renormalized).
#[derive(Debug, Clone)]
pub struct MergedGroup {
    pub members: Vec<Concept>,
    pub centroid: Vec<f64>,
}

#[derive(Debug)]
pub struct MergeOutcome {
    pub groups: Vec<MergedGroup>,
    /// Symmetric centroid cosine matrix, diagonal 1.0. Unthresholded: the
    /// layout engine consumes the raw values.
    pub group_similarity: Vec<Vec<f64>>,
    /// Per group, the sorted indices of its above-threshold neighbors.
    pub connections: Vec<Vec<usize>>,
}

/// Cosine similarity, clamped to [-1, 1]; zero when either vector has zero
/// magnitude or the lengths disagree.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let mag_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let mag_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    (dot / (mag_a * mag_b)).clamp(-1.0, 1.0)
}

struct UnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        // Size ties break toward the smaller index for determinism.
        let (big, small) = if self.size[ra] > self.size[rb] || (self.size[ra] == self.size[rb] && ra < rb)
        {
            (ra, rb)
        } else {
            (rb, ra)
        };
        self.parent[small] = big;
        self.size[big] += self.size[small];
    }
}

/// Merge near-duplicate concepts into groups.
///
/// `concepts[i]` corresponds to `embeddings[i]`; the caller guarantees equal
/// lengths and uniform embedding dimension. Group order follows union-find
/// component discovery order when scanning concepts by original index;
/// members within a group are ordered by descending importance (original
/// index breaks ties).
pub fn merge_concepts(concepts: &[Concept], embeddings: &[Vec<f32>]) -> MergeOutcome {
    debug_assert_eq!(concepts.len(), embeddings.len());
    let n = concepts.len();
    let vectors: Vec<Vec<f64>> = embeddings
        .iter()
        .map(|v| v.iter().map(|&x| f64::from(x)).collect())
        .collect();

    // Upper-triangular similarity scan drives the unions.
    let mut uf = UnionFind::new(n);
    for i in 0..n {
        for j in (i + 1)..n {
            if cosine_similarity(&vectors[i], &vectors[j]) > MERGE_THRESHOLD {
                uf.union(i, j);
            }
        }
    }

    // Components in discovery order by original index.
    let mut component_of_root: Vec<(usize, usize)> = Vec::new(); // (root, group index)
    let mut member_indices: Vec<Vec<usize>> = Vec::new();
    for i in 0..n {
        let root = uf.find(i);
        let group = match component_of_root.iter().find(|(r, _)| *r == root) {
            Some(&(_, g)) => g,
            None => {
                component_of_root.push((root, member_indices.len()));
                member_indices.push(Vec::new());
                member_indices.len() - 1
            }
        };
        member_indices[group].push(i);
    }

    let mut groups: Vec<MergedGroup> = Vec::with_capacity(member_indices.len());
    for indices in &member_indices {
        let mut members: Vec<Concept> = indices.iter().map(|&i| concepts[i].clone()).collect();
        // Stable sort: equal importances keep original index order.
        members.sort_by(|a, b| {
            b.importance
                .partial_cmp(&a.importance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let dim = vectors[indices[0]].len();
        let mut centroid = vec![0.0f64; dim];
        for &i in indices {
            for (c, x) in centroid.iter_mut().zip(&vectors[i]) {
                *c += x;
            }
        }
        for c in centroid.iter_mut() {
            *c /= indices.len() as f64;
        }

        groups.push(MergedGroup { members, centroid });
    }

    let g = groups.len();
    let mut group_similarity = vec![vec![0.0f64; g]; g];
    for a in 0..g {
        group_similarity[a][a] = 1.0;
        for b in (a + 1)..g {
            let sim = cosine_similarity(&groups[a].centroid, &groups[b].centroid);
            group_similarity[a][b] = sim;
            group_similarity[b][a] = sim;
        }
    }

    let connections = (0..g)
        .map(|a| {
            (0..g)
                .filter(|&b| b != a && group_similarity[a][b] > CONNECTION_THRESHOLD)
                .collect()
        })
        .collect();

    info!("merged {} concepts into {} groups", n, g);
    MergeOutcome {
        groups,
        group_similarity,
        connections,
    }
}
