//! Delaunay triangulation by incremental Bowyer-Watson insertion.

use glam::DVec2;

use crate::error::GeometryError;

/// Vertex indices into the triangulated point slice, counter-clockwise.
pub type Triangle = [usize; 3];

/// Super-triangle size relative to the point bounding box.
const SUPER_SCALE: f64 = 20.0;

/// In-circle and collinearity tolerance relative to the squared extent.
const REL_TOLERANCE: f64 = 1e-10;

#[derive(Debug, Clone, Copy)]
struct Circumscribed {
    vertices: Triangle,
    center: DVec2,
    radius_sq: f64,
}

impl Circumscribed {
    /// `None` for a degenerate (zero-area) triangle.
    fn new(vertices: Triangle, points: &[DVec2]) -> Option<Self> {
        let [a, b, c] = vertices.map(|i| points[i]);
        let ab = b - a;
        let ac = c - a;
        let cross = ab.perp_dot(ac);
        if cross == 0.0 {
            return None;
        }

        let d = 2.0 * cross;
        let ab2 = ab.length_squared();
        let ac2 = ac.length_squared();
        let offset = DVec2::new(
            (ac.y * ab2 - ab.y * ac2) / d,
            (ab.x * ac2 - ac.x * ab2) / d,
        );

        let vertices = if cross > 0.0 {
            vertices
        } else {
            [vertices[0], vertices[2], vertices[1]]
        };

        Some(Self {
            vertices,
            center: a + offset,
            radius_sq: offset.length_squared(),
        })
    }

    /// Strictly inside the circumcircle; cocircular points are outside.
    #[inline]
    fn encloses(&self, p: DVec2, tolerance: f64) -> bool {
        self.center.distance_squared(p) < self.radius_sq - tolerance
    }

    fn edges(&self) -> [[usize; 2]; 3] {
        let [a, b, c] = self.vertices;
        [[a, b], [b, c], [c, a]]
    }
}

/// Triangulate `points`.
///
/// Fails for fewer than three points, repeated points and point sets
/// without three non-collinear members.
pub fn triangulate(points: &[DVec2]) -> Result<Vec<Triangle>, GeometryError> {
    let n = points.len();
    if n < 3 {
        return Err(GeometryError::TooFewPoints { found: n });
    }
    check_duplicates(points)?;

    let (min, max) = points
        .iter()
        .fold((points[0], points[0]), |(lo, hi), &p| (lo.min(p), hi.max(p)));
    let extent = (max - min).max_element();
    let tolerance = REL_TOLERANCE * extent * extent;
    check_collinear(points, tolerance)?;

    let mid = (min + max) * 0.5;
    let mut all = points.to_vec();
    all.push(mid + DVec2::new(-SUPER_SCALE * extent, -extent));
    all.push(mid + DVec2::new(0.0, SUPER_SCALE * extent));
    all.push(mid + DVec2::new(SUPER_SCALE * extent, -extent));

    let mut triangles: Vec<Circumscribed> = Circumscribed::new([n, n + 1, n + 2], &all)
        .into_iter()
        .collect();

    let mut cavity: Vec<[usize; 2]> = Vec::new();
    for (i, &p) in points.iter().enumerate() {
        cavity.clear();
        triangles.retain(|t| {
            if t.encloses(p, tolerance) {
                cavity.extend(t.edges().map(|[a, b]| [a.min(b), a.max(b)]));
                false
            } else {
                true
            }
        });

        // Edges shared by two removed triangles are interior to the cavity.
        cavity.sort_unstable();
        let mut k = 0;
        while k < cavity.len() {
            let edge = cavity[k];
            let mut run = 1;
            while k + run < cavity.len() && cavity[k + run] == edge {
                run += 1;
            }
            if run == 1
                && let Some(t) = Circumscribed::new([edge[0], edge[1], i], &all)
            {
                triangles.push(t);
            }
            k += run;
        }
    }

    let result: Vec<Triangle> = triangles
        .into_iter()
        .filter(|t| t.vertices.iter().all(|&v| v < n))
        .filter(|t| {
            let [a, b, c] = t.vertices.map(|v| points[v]);
            (b - a).perp_dot(c - a) > tolerance
        })
        .map(|t| t.vertices)
        .collect();

    if result.is_empty() {
        return Err(GeometryError::Collinear);
    }

    tracing::debug!("triangulated {} points into {} triangles", n, result.len());
    Ok(result)
}

/// Report the later index of the first exactly repeated point.
fn check_duplicates(points: &[DVec2]) -> Result<(), GeometryError> {
    let mut order: Vec<usize> = (0..points.len()).collect();
    order.sort_unstable_by(|&a, &b| {
        points[a]
            .x
            .total_cmp(&points[b].x)
            .then(points[a].y.total_cmp(&points[b].y))
            .then(a.cmp(&b))
    });

    let duplicate = order
        .windows(2)
        .filter(|w| points[w[0]] == points[w[1]])
        .map(|w| w[0].max(w[1]))
        .min();

    match duplicate {
        Some(index) => Err(GeometryError::DuplicatePoint { index }),
        None => Ok(()),
    }
}

fn check_collinear(points: &[DVec2], tolerance: f64) -> Result<(), GeometryError> {
    let origin = points[0];
    let far = points
        .iter()
        .copied()
        .max_by(|a, b| {
            a.distance_squared(origin)
                .total_cmp(&b.distance_squared(origin))
        })
        .unwrap_or(origin);
    let axis = far - origin;
    let scale = axis.length();

    // |cross| / |axis| is the distance of p from the line through origin and far.
    let spread = points
        .iter()
        .map(|&p| axis.perp_dot(p - origin).abs() / scale)
        .fold(0.0, f64::max);

    if spread * spread <= tolerance {
        return Err(GeometryError::Collinear);
    }
    Ok(())
}
