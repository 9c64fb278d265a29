//! Piecewise-affine dewarping.
//!
//! The idealised (target) points are triangulated once; the same index
//! triples connect the user-marked (source) points. Each output pixel inside
//! a target triangle reads the input image at the barycentric combination of
//! that triangle's source vertices, so the transform is affine per triangle
//! and continuous across shared edges. Output pixels outside the convex hull
//! of the target points are 0.

pub mod interpolation;
pub mod triangulation;

#[cfg(test)]
mod tests;

use common::Buffer2;
use glam::DVec2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::InterpolationMethod;
use crate::error::{GeometryError, Result, UnwarpError};
use crate::geometry::PointSet;

pub use triangulation::{Triangle, triangulate};

/// Number of output rows per parallel chunk.
const ROWS_PER_CHUNK: usize = 32;

/// Barycentric slack for pixels on triangle edges.
const EDGE_EPSILON: f64 = 1e-9;

/// One triangle of the transform: target vertices and their source images.
#[derive(Debug, Clone, Copy)]
struct AffinePiece {
    origin: DVec2,
    edge_b: DVec2,
    edge_c: DVec2,
    inv_det: f64,
    source: [DVec2; 3],
    min: DVec2,
    max: DVec2,
}

impl AffinePiece {
    fn new(triangle: Triangle, target: &[DVec2], source: &[DVec2]) -> Self {
        let [a, b, c] = triangle.map(|i| target[i]);
        let edge_b = b - a;
        let edge_c = c - a;
        Self {
            origin: a,
            edge_b,
            edge_c,
            inv_det: 1.0 / edge_b.perp_dot(edge_c),
            source: triangle.map(|i| source[i]),
            min: a.min(b).min(c),
            max: a.max(b).max(c),
        }
    }

    /// Source position of target point `p`, or `None` if `p` lies outside the triangle.
    #[inline]
    fn map(&self, p: DVec2) -> Option<DVec2> {
        let d = p - self.origin;
        let lb = d.perp_dot(self.edge_c) * self.inv_det;
        let lc = self.edge_b.perp_dot(d) * self.inv_det;
        let la = 1.0 - lb - lc;
        if la < -EDGE_EPSILON || lb < -EDGE_EPSILON || lc < -EDGE_EPSILON {
            return None;
        }
        let [sa, sb, sc] = self.source;
        Some(sa + lb * (sb - sa) + lc * (sc - sa))
    }
}

/// Piecewise-affine map from target (output) coordinates to source (input) coordinates.
#[derive(Debug, Clone)]
pub struct PiecewiseAffine {
    pieces: Vec<AffinePiece>,
}

impl PiecewiseAffine {
    /// Build the transform taking `target[i]` to `source[i]`.
    pub fn estimate(source: &PointSet, target: &PointSet) -> std::result::Result<Self, GeometryError> {
        if source.len() != target.len() {
            return Err(GeometryError::CountMismatch {
                source_len: source.len(),
                target_len: target.len(),
            });
        }

        let target = target.to_dvec2();
        let source = source.to_dvec2();
        let triangles = triangulate(&target)?;
        let pieces = triangles
            .into_iter()
            .map(|t| AffinePiece::new(t, &target, &source))
            .collect();

        Ok(Self { pieces })
    }

    pub fn triangle_count(&self) -> usize {
        self.pieces.len()
    }

    /// Source position of a target point, `None` outside the triangulated hull.
    pub fn apply(&self, target: DVec2) -> Option<DVec2> {
        self.pieces.iter().find_map(|piece| {
            let inside_box = target.cmpge(piece.min - EDGE_EPSILON).all()
                && target.cmple(piece.max + EDGE_EPSILON).all();
            if inside_box { piece.map(target) } else { None }
        })
    }

    /// Resample `image` onto a canvas of the same shape.
    pub fn warp(&self, image: &Buffer2<f32>, method: InterpolationMethod) -> Buffer2<f32> {
        let (height, width) = image.shape();
        let mut output = Buffer2::new_default(height, width);
        if output.is_empty() {
            return output;
        }

        // Pieces whose bounding box crosses each output row.
        let mut row_pieces: Vec<Vec<usize>> = vec![Vec::new(); height];
        for (idx, piece) in self.pieces.iter().enumerate() {
            let first = (piece.min.y - EDGE_EPSILON).ceil().max(0.0) as usize;
            let last = (piece.max.y + EDGE_EPSILON).floor();
            if last < 0.0 {
                continue;
            }
            let last = (last as usize).min(height - 1);
            for pieces in row_pieces.iter_mut().take(last + 1).skip(first) {
                pieces.push(idx);
            }
        }

        output
            .pixels_mut()
            .par_chunks_mut(width * ROWS_PER_CHUNK)
            .enumerate()
            .for_each(|(chunk_idx, chunk): (usize, &mut [f32])| {
                let start_row = chunk_idx * ROWS_PER_CHUNK;
                for (row_in_chunk, out_row) in chunk.chunks_mut(width).enumerate() {
                    let row = start_row + row_in_chunk;
                    for &idx in &row_pieces[row] {
                        let piece = &self.pieces[idx];
                        let first = (piece.min.x - EDGE_EPSILON).ceil().max(0.0) as usize;
                        let last = (piece.max.x + EDGE_EPSILON).floor();
                        if last < 0.0 {
                            continue;
                        }
                        let last = (last as usize).min(width - 1);
                        for col in first..=last {
                            if let Some(src) = piece.map(DVec2::new(col as f64, row as f64)) {
                                out_row[col] =
                                    interpolation::interpolate(image, src.y, src.x, method);
                            }
                        }
                    }
                }
            });

        output
    }
}

/// Which border lines of a warped image consist entirely of zero fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorderCheck {
    pub top: bool,
    pub bottom: bool,
    pub left: bool,
    pub right: bool,
}

impl BorderCheck {
    pub fn of(image: &Buffer2<f32>) -> Self {
        if image.is_empty() {
            return Self {
                top: true,
                bottom: true,
                left: true,
                right: true,
            };
        }
        let (height, width) = image.shape();
        Self {
            top: image.row(0).iter().all(|&v| v == 0.0),
            bottom: image.row(height - 1).iter().all(|&v| v == 0.0),
            left: image.column(0).all(|&v| v == 0.0),
            right: image.column(width - 1).all(|&v| v == 0.0),
        }
    }

    /// All four borders are zero fill: the warp left room on every side.
    #[inline]
    pub fn is_clear(&self) -> bool {
        self.top && self.bottom && self.left && self.right
    }

    /// Image content reaches at least one border.
    #[inline]
    pub fn touches_border(&self) -> bool {
        !self.is_clear()
    }
}

/// Warped image together with its border state.
#[derive(Debug, Clone)]
pub struct UnwarpResult {
    pub image: Buffer2<f32>,
    pub border: BorderCheck,
}

impl UnwarpResult {
    #[inline]
    pub fn touches_border(&self) -> bool {
        self.border.touches_border()
    }
}

/// Warp `image` so that `source` points land on `target` points.
///
/// `source` holds the marked dot positions in `image`; `target` the
/// idealised grid, index-aligned with `source`. The output has the shape of
/// `image`.
pub fn unwarp(
    source: &PointSet,
    target: &PointSet,
    image: &Buffer2<f32>,
    method: InterpolationMethod,
) -> Result<UnwarpResult> {
    if image.is_empty() {
        return Err(UnwarpError::invalid(
            "image",
            format!("must not be empty, got {}x{}", image.height(), image.width()),
        ));
    }

    let transform = PiecewiseAffine::estimate(source, target)?;
    let warped = transform.warp(image, method);
    let border = BorderCheck::of(&warped);

    tracing::trace!(
        triangles = transform.triangle_count(),
        touches = border.touches_border(),
        "unwarped {}x{} image",
        image.height(),
        image.width()
    );

    Ok(UnwarpResult {
        image: warped,
        border,
    })
}
