use log::debug;
use wgpu::{Device, Queue};

/// Resolution of the resampled lookup table and its 1D texture.
pub const RAMP_COLORS: usize = 256;

/// A color/opacity transfer function authored as control points.
///
/// Control points map a density in [0, 1] to an RGBA color. Between
/// points the color is linearly interpolated; outside the outermost
/// points it clamps. The editable curve lives host-side; this type is the
/// resampling bridge between the curve and the 1D lookup texture.
#[derive(Clone, Debug, PartialEq)]
pub struct ColorRamp {
    points: Vec<(f32, [f32; 4])>,
}

impl Default for ColorRamp {
    /// Black and fully transparent at 0, white and opaque at 1.
    fn default() -> Self {
        Self {
            points: vec![(0.0, [0.0, 0.0, 0.0, 0.0]), (1.0, [1.0, 1.0, 1.0, 1.0])],
        }
    }
}

impl ColorRamp {
    /// Replace the control points. Positions are clamped to [0, 1] and
    /// sorted; an empty set falls back to the default ramp.
    pub fn set_points(&mut self, points: Vec<(f32, [f32; 4])>) {
        if points.is_empty() {
            *self = Self::default();
            return;
        }
        let mut points: Vec<_> = points
            .into_iter()
            .map(|(pos, color)| (pos.clamp(0.0, 1.0), color))
            .collect();
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        self.points = points;
    }

    pub fn points(&self) -> &[(f32, [f32; 4])] {
        &self.points
    }

    /// Evaluate the ramp at `t`, clamping beyond the outermost points.
    pub fn evaluate(&self, t: f32) -> [f32; 4] {
        let first = self.points[0];
        let last = self.points[self.points.len() - 1];
        if t <= first.0 {
            return first.1;
        }
        if t >= last.0 {
            return last.1;
        }

        for window in self.points.windows(2) {
            let (p0, c0) = window[0];
            let (p1, c1) = window[1];
            if t >= p0 && t <= p1 {
                let span = p1 - p0;
                if span <= f32::EPSILON {
                    return c1;
                }
                let f = (t - p0) / span;
                return [
                    c0[0] + (c1[0] - c0[0]) * f,
                    c0[1] + (c1[1] - c0[1]) * f,
                    c0[2] + (c1[2] - c0[2]) * f,
                    c0[3] + (c1[3] - c0[3]) * f,
                ];
            }
        }
        last.1
    }

    /// Resample the curve into `RAMP_COLORS` RGBA8 entries at evenly
    /// spaced positions `x / (RAMP_COLORS - 1)`.
    pub fn resample(&self) -> Vec<u8> {
        let step = 1.0 / (RAMP_COLORS as f32 - 1.0);
        let mut lookup = Vec::with_capacity(RAMP_COLORS * 4);
        for x in 0..RAMP_COLORS {
            let rgba = self.evaluate(x as f32 * step);
            for channel in rgba {
                lookup.push((channel.clamp(0.0, 1.0) * 255.0).round() as u8);
            }
        }
        lookup
    }
}

/// GPU-side 1D lookup texture fed by a [`ColorRamp`].
pub struct RampTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

impl RampTexture {
    /// Create the lookup texture once and upload an initial resample.
    /// Valid before any volume is loaded; the default ramp simply shades
    /// nothing visible.
    pub fn init(device: &Device, queue: &Queue, ramp: &ColorRamp) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Ramp 1D Texture"),
            size: wgpu::Extent3d {
                width: RAMP_COLORS as u32,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D1,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Ramp Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let ramp_texture = Self {
            texture,
            view,
            sampler,
        };
        ramp_texture.update(queue, ramp);
        ramp_texture
    }

    /// Push a fresh resample into the existing texture. A sub-image
    /// write, the texture itself is never re-created.
    pub fn update(&self, queue: &Queue, ramp: &ColorRamp) {
        let lookup = ramp.resample();
        debug!("ramp resampled, {} entries", RAMP_COLORS);
        queue.write_texture(
            wgpu::TexelCopyTextureInfoBase {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &lookup,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some((RAMP_COLORS * 4) as u32),
                rows_per_image: None,
            },
            wgpu::Extent3d {
                width: RAMP_COLORS as u32,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }

    /// Release the GPU memory. Safe to call more than once.
    pub fn destroy(&self) {
        self.texture.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ramp_endpoints() {
        let ramp = ColorRamp::default();
        assert_eq!(ramp.evaluate(0.0), [0.0, 0.0, 0.0, 0.0]);
        assert_eq!(ramp.evaluate(1.0), [1.0, 1.0, 1.0, 1.0]);
        let mid = ramp.evaluate(0.5);
        for channel in mid {
            assert!((channel - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn evaluate_clamps_outside_control_points() {
        let mut ramp = ColorRamp::default();
        ramp.set_points(vec![
            (0.2, [1.0, 0.0, 0.0, 1.0]),
            (0.8, [0.0, 0.0, 1.0, 1.0]),
        ]);
        assert_eq!(ramp.evaluate(0.0), [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(ramp.evaluate(1.0), [0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn set_points_sorts_and_clamps() {
        let mut ramp = ColorRamp::default();
        ramp.set_points(vec![
            (0.9, [0.0, 1.0, 0.0, 1.0]),
            (-0.5, [1.0, 0.0, 0.0, 1.0]),
        ]);
        assert_eq!(ramp.points()[0].0, 0.0);
        assert_eq!(ramp.points()[1].0, 0.9);
    }

    #[test]
    fn resample_has_fixed_size_and_is_idempotent() {
        let mut ramp = ColorRamp::default();
        ramp.set_points(vec![
            (0.0, [0.0, 0.0, 0.0, 0.0]),
            (0.3, [0.8, 0.2, 0.1, 0.5]),
            (1.0, [1.0, 1.0, 0.9, 1.0]),
        ]);
        let first = ramp.resample();
        let second = ramp.resample();
        assert_eq!(first.len(), RAMP_COLORS * 4);
        assert_eq!(first, second);
    }
}
