//! Nearest-neighbour queries over dot positions.
//!
//! A 2D k-d tree answers "closest other dot" for every dot, which is all the
//! spacing estimate needs.


use glam::DVec2;

use crate::error::{Result, UnwarpError};
use crate::geometry::PointSet;

/// A 2D k-d tree over `DVec2` positions (`x = col`, `y = row`).
#[derive(Debug)]
pub struct KdTree {
    nodes: Vec<KdNode>,
    points: Vec<DVec2>,
}

#[derive(Debug, Clone)]
struct KdNode {
    point_idx: usize,
    left: Option<usize>,
    right: Option<usize>,
    /// 0 = x, 1 = y
    split_dim: usize,
}

/// Result of a nearest-neighbour query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub dist_sq: f64,
}

impl KdTree {
    /// Build a balanced tree by median splits. Returns `None` for no points.
    pub fn build(points: &[DVec2]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }

        let mut indices: Vec<usize> = (0..points.len()).collect();
        let mut nodes = Vec::with_capacity(points.len());
        Self::build_recursive(points, &mut indices, 0, &mut nodes);

        Some(Self {
            nodes,
            points: points.to_vec(),
        })
    }

    fn build_recursive(
        points: &[DVec2],
        indices: &mut [usize],
        depth: usize,
        nodes: &mut Vec<KdNode>,
    ) -> Option<usize> {
        if indices.is_empty() {
            return None;
        }

        let split_dim = depth % 2;
        indices.sort_by(|&a, &b| axis(points[a], split_dim).total_cmp(&axis(points[b], split_dim)));

        let median = indices.len() / 2;
        let node_idx = nodes.len();
        nodes.push(KdNode {
            point_idx: indices[median],
            left: None,
            right: None,
            split_dim,
        });

        let (left_indices, right_part) = indices.split_at_mut(median);
        let left = Self::build_recursive(points, left_indices, depth + 1, nodes);
        let right = Self::build_recursive(points, &mut right_part[1..], depth + 1, nodes);

        nodes[node_idx].left = left;
        nodes[node_idx].right = right;

        Some(node_idx)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Closest point to `query`, skipping the point stored at `exclude`.
    ///
    /// Other points at the same position still count, at distance 0.
    pub fn nearest_excluding(&self, query: DVec2, exclude: Option<usize>) -> Option<Neighbor> {
        let mut best = None;
        self.nearest_recursive(0, query, exclude, &mut best);
        best
    }

    fn nearest_recursive(
        &self,
        node_idx: usize,
        query: DVec2,
        exclude: Option<usize>,
        best: &mut Option<Neighbor>,
    ) {
        let node = &self.nodes[node_idx];
        let point = self.points[node.point_idx];

        if exclude != Some(node.point_idx) {
            let dist_sq = query.distance_squared(point);
            if best.is_none_or(|b| dist_sq < b.dist_sq) {
                *best = Some(Neighbor {
                    index: node.point_idx,
                    dist_sq,
                });
            }
        }

        let diff = axis(query, node.split_dim) - axis(point, node.split_dim);
        let (first, second) = if diff < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        if let Some(first_idx) = first {
            self.nearest_recursive(first_idx, query, exclude, best);
        }

        // The far side can only help if the splitting plane is closer than the current best.
        if let Some(second_idx) = second
            && best.is_none_or(|b| diff * diff < b.dist_sq)
        {
            self.nearest_recursive(second_idx, query, exclude, best);
        }
    }
}

#[inline]
fn axis(p: DVec2, dim: usize) -> f64 {
    if dim == 0 { p.x } else { p.y }
}

/// Distance from every point to its nearest other point, in input order.
pub fn nearest_neighbor_distances(points: &PointSet) -> Result<Vec<f64>> {
    if points.len() < 2 {
        return Err(UnwarpError::invalid(
            "points",
            format!("need at least 2 points for spacing, got {}", points.len()),
        ));
    }

    let positions = points.to_dvec2();
    let tree = KdTree::build(&positions).expect("non-empty point set");

    Ok(positions
        .iter()
        .enumerate()
        .map(|(i, &p)| {
            tree.nearest_excluding(p, Some(i))
                .map(|n| n.dist_sq.sqrt())
                .expect("at least one other point")
        })
        .collect())
}

/// Median nearest-neighbour spacing of a dot pattern, in pixels.
pub fn median_spacing(points: &PointSet) -> Result<f64> {
    let mut distances = nearest_neighbor_distances(points)?;
    let spacing = median_f64_mut(&mut distances);
    tracing::debug!("median spacing of {} points: {:.2} px", points.len(), spacing);
    Ok(spacing)
}

/// Median of a non-empty slice; averages the two middle values for even lengths.
///
/// Mutates the input buffer (partial sort via quickselect).
pub(crate) fn median_f64_mut(data: &mut [f64]) -> f64 {
    debug_assert!(!data.is_empty());

    let len = data.len();
    let mid = len / 2;
    let (left_part, median, _) = data.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
    let upper = *median;

    if len % 2 == 1 {
        upper
    } else {
        let lower = left_part.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        (lower + upper) * 0.5
    }
}
