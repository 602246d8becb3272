use ndarray::Array3;
use wgpu::Device;
use wgpu::Queue;

/// Dimensions of a loaded volume in texture order (width, height, depth).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VolumeDims {
    pub width: usize,
    pub height: usize,
    pub depth: usize,
}

/// A scalar density field assembled from a stack of 2D slices.
///
/// Densities are stored normalized to [0, 1]. The array is indexed in
/// (depth, height, width) order so that a contiguous `as_slice()` view
/// matches the row layout expected by a 3D texture upload.
#[derive(Default)]
pub struct Volume {
    pub data: Array3<f32>,
    pub spacing: (f32, f32, f32),
}

/// Device/queue pair supplied by the host. The host owns the GPU context;
/// this crate only ever borrows it through this handle.
pub struct WGPU {
    pub device: Device,
    pub queue: Queue,
}

impl Volume {
    pub fn new(data: Array3<f32>, spacing: (f32, f32, f32)) -> Self {
        Self { data, spacing }
    }

    /// Get the dimensions of the volume (depth, height, width)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    pub fn dims(&self) -> VolumeDims {
        let (depth, height, width) = self.data.dim();
        VolumeDims {
            width,
            height,
            depth,
        }
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    /// Maximum density in the field, 0.0 for an empty volume.
    pub fn max_intensity(&self) -> f32 {
        self.data.iter().copied().fold(0.0_f32, f32::max)
    }

    /// Per-axis scale factors in (x, y, z) order, normalized so the
    /// largest physical extent maps to 1.0. The host applies these to the
    /// [-1,1] bounding cube; the ray marcher itself always works in the
    /// normalized cube.
    pub fn scale(&self) -> [f32; 3] {
        let (depth, height, width) = self.data.dim();
        let (sx, sy, sz) = self.spacing;
        let extent = [
            width as f32 * sx,
            height as f32 * sy,
            depth as f32 * sz,
        ];
        let max = extent[0].max(extent[1]).max(extent[2]);
        if max <= 0.0 {
            return [1.0, 1.0, 1.0];
        }
        [extent[0] / max, extent[1] / max, extent[2] / max]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dims_follow_array_layout() {
        let volume = Volume::new(Array3::zeros((10, 64, 32)), (1.0, 1.0, 1.0));
        assert_eq!(volume.dim(), (10, 64, 32));
        let dims = volume.dims();
        assert_eq!((dims.width, dims.height, dims.depth), (32, 64, 10));
    }

    #[test]
    fn scale_normalizes_largest_extent() {
        // 64 slices of 1mm against a 128x128 grid of 0.5mm pixels.
        let volume = Volume::new(Array3::zeros((64, 128, 128)), (0.5, 0.5, 1.0));
        let scale = volume.scale();
        assert_eq!(scale, [1.0, 1.0, 1.0]);

        let volume = Volume::new(Array3::zeros((16, 128, 128)), (0.5, 0.5, 1.0));
        let scale = volume.scale();
        assert_eq!(scale[0], 1.0);
        assert_eq!(scale[1], 1.0);
        assert!((scale[2] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn max_intensity_of_empty_volume_is_zero() {
        let volume = Volume::default();
        assert_eq!(volume.max_intensity(), 0.0);
    }
}
