use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use sonority_core::FEATURE_COUNT;

use super::distance::{angular_distance, dot, norm, normalized, Vector};

/// Maximum number of ids held by a leaf.
pub const DEFAULT_LEAF_SIZE: usize = 16;

/// Sampling rounds used to pick each split hyperplane.
const TWO_MEANS_ITERATIONS: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf(Vec<u32>),
    /// A hyperplane through the origin. Points with a positive margin go
    /// right. A zero normal marks a split that could not separate its
    /// points, so queries treat both sides as equally close.
    Split {
        normal: Vector,
        left: u32,
        right: u32,
    },
}

/// A forest of random-projection trees over angular distance.
///
/// Items are addressed by their position in the vector list. The index is
/// immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnIndex {
    leaf_size: usize,
    seed: u64,
    vectors: Vec<Vector>,
    nodes: Vec<Node>,
    roots: Vec<u32>,
}

impl AnnIndex {
    /// Build `tree_count` trees over `vectors` with the default leaf size.
    ///
    /// Tree `t` draws its randomness from `seed + t`, so the same inputs
    /// and seed always produce the same index regardless of how many
    /// threads did the work.
    #[must_use]
    pub fn build(vectors: Vec<[f32; FEATURE_COUNT]>, tree_count: usize, seed: u64) -> Self {
        Self::build_with_leaf_size(vectors, tree_count, seed, DEFAULT_LEAF_SIZE)
    }

    #[must_use]
    pub fn build_with_leaf_size(
        vectors: Vec<[f32; FEATURE_COUNT]>,
        tree_count: usize,
        seed: u64,
        leaf_size: usize,
    ) -> Self {
        let leaf_size = leaf_size.max(1);
        let count = u32::try_from(vectors.len()).unwrap_or(u32::MAX);

        let trees: Vec<(u32, Vec<Node>)> = (0..tree_count)
            .into_par_iter()
            .map(|tree| {
                let builder = TreeBuilder {
                    vectors: &vectors,
                    leaf_size,
                    rng: StdRng::seed_from_u64(seed.wrapping_add(tree as u64)),
                    nodes: Vec::new(),
                };
                builder.build((0..count).collect())
            })
            .collect();

        let mut nodes = Vec::new();
        let mut roots = Vec::with_capacity(trees.len());
        for (root, tree_nodes) in trees {
            let offset = nodes.len() as u32;
            roots.push(root + offset);
            nodes.extend(tree_nodes.into_iter().map(|node| match node {
                Node::Split {
                    normal,
                    left,
                    right,
                } => Node::Split {
                    normal,
                    left: left + offset,
                    right: right + offset,
                },
                leaf @ Node::Leaf(_) => leaf,
            }));
        }

        log::debug!(
            "Built {} trees with {} nodes over {} items",
            roots.len(),
            nodes.len(),
            vectors.len()
        );

        Self {
            leaf_size,
            seed,
            vectors,
            nodes,
            roots,
        }
    }

    /// Number of indexed items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    #[must_use]
    pub fn tree_count(&self) -> usize {
        self.roots.len()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub const fn leaf_size(&self) -> usize {
        self.leaf_size
    }

    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// The indexed vector for `id`.
    #[must_use]
    pub fn vector(&self, id: u32) -> Option<&[f32; FEATURE_COUNT]> {
        self.vectors.get(id as usize)
    }

    /// Find up to `k` items closest to `query`.
    ///
    /// Walks the trees best-first until at least `search_k` candidate ids
    /// have been collected (never fewer than `k`), then ranks the distinct
    /// candidates by exact angular distance, ties broken by id. Results are
    /// `(id, distance)` pairs in ascending distance order.
    #[must_use]
    pub fn query(
        &self,
        query: &[f32; FEATURE_COUNT],
        k: usize,
        search_k: usize,
    ) -> Vec<(u32, f32)> {
        if k == 0 || self.vectors.is_empty() {
            return Vec::new();
        }
        let search_k = search_k.max(k);

        let mut queue: BinaryHeap<Pending> = self
            .roots
            .iter()
            .map(|&node| Pending {
                priority: f32::INFINITY,
                node,
            })
            .collect();

        let mut candidates: Vec<u32> = Vec::with_capacity(search_k);
        while candidates.len() < search_k {
            let Some(Pending { priority, node }) = queue.pop() else {
                break;
            };
            match &self.nodes[node as usize] {
                Node::Leaf(ids) => candidates.extend_from_slice(ids),
                Node::Split {
                    normal,
                    left,
                    right,
                } => {
                    let margin = dot(normal, query);
                    queue.push(Pending {
                        priority: priority.min(margin),
                        node: *right,
                    });
                    queue.push(Pending {
                        priority: priority.min(-margin),
                        node: *left,
                    });
                }
            }
        }

        candidates.sort_unstable();
        candidates.dedup();

        let mut scored: Vec<(u32, f32)> = candidates
            .into_iter()
            .map(|id| (id, angular_distance(query, &self.vectors[id as usize])))
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);
        scored
    }

    /// Check structural invariants of an index read from untrusted bytes.
    ///
    /// Every child precedes its parent in the node list, which rules out
    /// cycles; every leaf id and root must be in range.
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.leaf_size == 0 {
            return Err("leaf size is zero".to_string());
        }
        if self.roots.is_empty() {
            return Err("index has no trees".to_string());
        }
        if let Some(position) = self
            .vectors
            .iter()
            .position(|v| v.iter().any(|x| !x.is_finite()))
        {
            return Err(format!("vector {position} is not finite"));
        }
        for &root in &self.roots {
            if root as usize >= self.nodes.len() {
                return Err(format!("root {root} is out of range"));
            }
        }
        for (position, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Leaf(ids) => {
                    if let Some(id) = ids.iter().find(|&&id| id as usize >= self.vectors.len()) {
                        return Err(format!("leaf {position} references unknown item {id}"));
                    }
                }
                Node::Split { left, right, .. } => {
                    if *left as usize >= position || *right as usize >= position {
                        return Err(format!("split {position} has an invalid child"));
                    }
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    priority: f32,
    node: u32,
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .total_cmp(&other.priority)
            .then_with(|| other.node.cmp(&self.node))
    }
}

struct TreeBuilder<'a> {
    vectors: &'a [Vector],
    leaf_size: usize,
    rng: StdRng,
    nodes: Vec<Node>,
}

impl TreeBuilder<'_> {
    /// Returns the root position and the tree's nodes, children first.
    fn build(mut self, ids: Vec<u32>) -> (u32, Vec<Node>) {
        let root = self.make_node(ids);
        (root, self.nodes)
    }

    fn push(&mut self, node: Node) -> u32 {
        self.nodes.push(node);
        (self.nodes.len() - 1) as u32
    }

    fn make_node(&mut self, mut ids: Vec<u32>) -> u32 {
        if ids.len() <= self.leaf_size {
            return self.push(Node::Leaf(ids));
        }

        let mut normal = self.two_means(&ids);
        let (mut left, mut right): (Vec<u32>, Vec<u32>) = ids
            .iter()
            .copied()
            .partition(|&id| dot(&normal, &self.vectors[id as usize]) <= 0.0);

        if left.is_empty() || right.is_empty() {
            normal = [0.0; FEATURE_COUNT];
            right = ids.split_off(ids.len() / 2);
            left = ids;
        }

        let left = self.make_node(left);
        let right = self.make_node(right);
        self.push(Node::Split {
            normal,
            left,
            right,
        })
    }

    /// Pick a split normal by running a tiny two-centroid clustering over
    /// sampled points and taking the difference of the centroids.
    ///
    /// `ids` holds at least two items.
    fn two_means(&mut self, ids: &[u32]) -> Vector {
        let count = ids.len();
        let i = self.rng.gen_range(0..count);
        let mut j = self.rng.gen_range(0..count - 1);
        if j >= i {
            j += 1;
        }

        let mut p = normalized(&self.vectors[ids[i] as usize]);
        let mut q = normalized(&self.vectors[ids[j] as usize]);
        let mut p_count = 1.0_f32;
        let mut q_count = 1.0_f32;

        for _ in 0..TWO_MEANS_ITERATIONS {
            let pick = ids[self.rng.gen_range(0..count)] as usize;
            let v = &self.vectors[pick];
            let length = norm(v);
            if length <= 0.0 {
                continue;
            }
            let dp = p_count * angular_distance(&p, v);
            let dq = q_count * angular_distance(&q, v);
            if dp < dq {
                for d in 0..FEATURE_COUNT {
                    p[d] = (p[d] * p_count + v[d] / length) / (p_count + 1.0);
                }
                p_count += 1.0;
            } else if dq < dp {
                for d in 0..FEATURE_COUNT {
                    q[d] = (q[d] * q_count + v[d] / length) / (q_count + 1.0);
                }
                q_count += 1.0;
            }
        }

        let mut difference = [0.0; FEATURE_COUNT];
        for d in 0..FEATURE_COUNT {
            difference[d] = p[d] - q[d];
        }
        normalized(&difference)
    }
}
