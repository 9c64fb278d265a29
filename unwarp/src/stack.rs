//! Depth stacks of calibration images.

use common::Buffer2;
use serde::{Deserialize, Serialize};

use crate::error::{Result, UnwarpError};
use crate::geometry::ImageShape;

/// Acquisition metadata of one plane. Used for ordering only.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PlaneMetadata {
    /// Physical focus depth (e.g. microns).
    pub depth: Option<f64>,
    /// Scan zoom factor.
    pub zoom: Option<f64>,
}

/// Ordered planes of equal shape, indexed `0..len()`.
#[derive(Debug, Clone)]
pub struct ImageStack {
    planes: Vec<Buffer2<f32>>,
    metadata: Vec<PlaneMetadata>,
    shape: ImageShape,
}

impl ImageStack {
    /// Stack planes in the given order without metadata.
    pub fn new(planes: Vec<Buffer2<f32>>) -> Result<Self> {
        let metadata = vec![PlaneMetadata::default(); planes.len()];
        Self::with_metadata(planes, metadata)
    }

    /// Stack planes in the given order. Every plane must have the shape of the first.
    pub fn with_metadata(planes: Vec<Buffer2<f32>>, metadata: Vec<PlaneMetadata>) -> Result<Self> {
        if metadata.len() != planes.len() {
            return Err(UnwarpError::invalid(
                "metadata",
                format!("{} entries for {} planes", metadata.len(), planes.len()),
            ));
        }

        let shape = planes
            .first()
            .map(ImageShape::of)
            .unwrap_or(ImageShape::new(0, 0));
        for plane in &planes {
            shape.check(plane)?;
        }

        Ok(Self {
            planes,
            metadata,
            shape,
        })
    }

    /// Stack planes acquired at different focus depths, shallowest first.
    ///
    /// Every plane needs a depth; depths must be unique and all planes must
    /// share one zoom level and one shape.
    pub fn from_depth_planes(mut planes: Vec<(PlaneMetadata, Buffer2<f32>)>) -> Result<Self> {
        let mut zoom = None;
        for (meta, _) in &planes {
            let depth = meta
                .depth
                .ok_or_else(|| UnwarpError::invalid("depth", "every plane needs a depth"))?;
            if !depth.is_finite() {
                return Err(UnwarpError::invalid(
                    "depth",
                    format!("must be finite, got {}", depth),
                ));
            }
            match (zoom, meta.zoom) {
                (None, z) => zoom = Some(z),
                (Some(expected), z) if expected != z => {
                    return Err(UnwarpError::invalid(
                        "zoom",
                        format!("planes mix zoom levels {:?} and {:?}", expected, z),
                    ));
                }
                _ => {}
            }
        }

        planes.sort_by(|a, b| a.0.depth.unwrap_or(0.0).total_cmp(&b.0.depth.unwrap_or(0.0)));
        if let Some(pair) = planes.windows(2).find(|w| w[0].0.depth == w[1].0.depth) {
            return Err(UnwarpError::invalid(
                "depth",
                format!("duplicate depth {:?}", pair[0].0.depth),
            ));
        }

        let (metadata, planes): (Vec<_>, Vec<_>) = planes.into_iter().unzip();
        tracing::info!(
            "assembled stack of {} planes, depths {:?}",
            planes.len(),
            metadata.iter().filter_map(|m| m.depth).collect::<Vec<_>>()
        );
        Self::with_metadata(planes, metadata)
    }

    pub fn len(&self) -> usize {
        self.planes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }

    /// Shape shared by all planes; `0 x 0` for an empty stack.
    pub fn shape(&self) -> ImageShape {
        self.shape
    }

    pub fn plane(&self, index: usize) -> &Buffer2<f32> {
        &self.planes[index]
    }

    pub fn planes(&self) -> &[Buffer2<f32>] {
        &self.planes
    }

    pub fn metadata(&self, index: usize) -> &PlaneMetadata {
        &self.metadata[index]
    }
}

/// Average a burst of frames of one plane into a single image.
pub fn mean_projection(frames: &[Buffer2<f32>]) -> Result<Buffer2<f32>> {
    let first = frames
        .first()
        .ok_or_else(|| UnwarpError::invalid("frames", "need at least one frame"))?;
    let shape = ImageShape::of(first);

    let mut sum = vec![0.0f64; first.len()];
    for frame in frames {
        shape.check(frame)?;
        for (acc, &v) in sum.iter_mut().zip(frame.iter()) {
            *acc += v as f64;
        }
    }

    let inv = 1.0 / frames.len() as f64;
    Ok(Buffer2::new(
        shape.height,
        shape.width,
        sum.into_iter().map(|v| (v * inv) as f32).collect(),
    ))
}
