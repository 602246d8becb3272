//! CPU mirror of the ray-marching math in `shaders/raymarch_frag.wgsl`.
//!
//! The fragment program is the production path; this module repeats its
//! arithmetic step for step so the marching, clipping and compositing
//! behavior can be verified without a GPU. Constants here and in the
//! shader must stay in sync.

use crate::enums::ShadingMode;
use crate::params::RenderParameters;
use crate::ramp::{ColorRamp, RAMP_COLORS};

use glam::{Vec3, Vec4};

/// Fixed sample budget per ray.
pub const NUM_SAMPLES: u32 = 256;

/// Longest diagonal of the [0,1] texture cube is sqrt(2) in the marcher's
/// metric; one step covers an equal share of it.
pub const STEP_SIZE: f32 = std::f32::consts::SQRT_2 / NUM_SAMPLES as f32;

#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub origin: Vec3,
    pub dir: Vec3,
}

/// Slab-method intersection with the [-1,1] cube. Returns (near, far)
/// without clamping; no intersection when near > far.
pub fn intersect_box(ray: &Ray) -> (f32, f32) {
    let inv = ray.dir.recip();
    let tbot = inv * (Vec3::splat(-1.0) - ray.origin);
    let ttop = inv * (Vec3::splat(1.0) - ray.origin);
    let tmin = ttop.min(tbot);
    let tmax = ttop.max(tbot);
    let near = tmin.x.max(tmin.y).max(tmin.z);
    let far = tmax.x.min(tmax.y).min(tmax.z);
    (near, far)
}

/// Clip-plane normal from spherical angles in degrees.
pub fn p2cart(azimuth: f32, elevation: f32) -> Vec3 {
    let ele = -elevation.to_radians();
    let azi = (azimuth + 90.0).to_radians();
    let k = ele.cos();
    Vec3::new(azi.cos() * k, ele.sin(), azi.sin() * k)
}

/// Screen-space hash used to jitter the march start position.
pub fn dither_offset(frag_x: f32, frag_y: f32) -> f32 {
    let v = (frag_x * 12.9898 + frag_y * 78.233).sin() * 43758.5453;
    v - v.floor()
}

/// Result of marching one ray. `color` is `None` when the fragment is
/// discarded (missed box, clipped away, or fully transparent).
#[derive(Clone, Copy, Debug)]
pub struct MarchResult {
    pub color: Option<Vec4>,
    pub steps: u32,
}

impl MarchResult {
    fn discard(steps: u32) -> Self {
        Self { color: None, steps }
    }
}

/// March a single ray through a density field.
///
/// `camera` and `surface_pos` are in the cube's [-1,1] object space;
/// `density` samples the field in [0,1] texture space. `frag_coord` only
/// matters when dithering is enabled.
pub fn march(
    camera: Vec3,
    surface_pos: Vec3,
    params: &RenderParameters,
    frag_coord: (f32, f32),
    density: &dyn Fn(Vec3) -> f32,
    ramp: &ColorRamp,
) -> MarchResult {
    let ray = Ray {
        origin: camera,
        dir: (surface_pos - camera).normalize(),
    };

    let (tnear, tfar) = intersect_box(&ray);
    if tnear > tfar {
        return MarchResult::discard(0);
    }
    let tnear = tnear.max(0.0);

    // Object [-1,1] to texture [0,1] space.
    let mut ray_start = 0.5 * (ray.origin + ray.dir * tnear + Vec3::ONE);
    let mut ray_stop = 0.5 * (ray.origin + ray.dir * tfar + Vec3::ONE);

    let dir = (ray_stop - ray_start).normalize_or_zero();
    let len = ray_start.distance(ray_stop);

    if params.clip {
        let plane = p2cart(params.azimuth, params.elevation);
        let frontface = dir.dot(plane) > 0.0;
        let denom = dir.dot(plane);
        let mut dis = denom;
        if denom != 0.0 {
            dis = (-params.clip_plane_depth - plane.dot(ray_start - Vec3::splat(0.5))) / denom;
        }
        if !frontface && dis < 0.0 {
            return MarchResult::discard(0);
        }
        if frontface && dis > len {
            return MarchResult::discard(0);
        }
        if dis > 0.0 && dis < len {
            if frontface {
                ray_start += dir * dis;
            } else {
                ray_stop = ray_start + dir * dis;
            }
        }
    }

    let step = (ray_stop - ray_start).normalize_or_zero() * STEP_SIZE;
    let mut travel = ray_start.distance(ray_stop);
    let mut pos = ray_start;

    if params.dither {
        pos += step * dither_offset(frag_coord.0, frag_coord.1);
    }

    let mut accum = Vec4::ZERO;
    let mut max_density = 0.0_f32;
    let mut steps = 0;

    for _ in 0..NUM_SAMPLES {
        if travel <= 0.0 {
            break;
        }
        steps += 1;
        let d = density(pos);

        match params.shading_mode {
            ShadingMode::MaximumIntensity => {
                max_density = max_density.max(d);
            }
            ShadingMode::Isosurface => {
                if d >= iso_threshold(params) {
                    let rgba = ramp.evaluate(d);
                    accum = Vec4::new(
                        rgba[0] * params.light_factor,
                        rgba[1] * params.light_factor,
                        rgba[2] * params.light_factor,
                        1.0,
                    );
                    break;
                }
            }
            mode => {
                let sample = shade_sample(mode, d, params, ramp);
                accum.x += (1.0 - accum.w) * sample.x;
                accum.y += (1.0 - accum.w) * sample.y;
                accum.z += (1.0 - accum.w) * sample.z;
                accum.w += sample.w;
                if accum.w >= 1.0 {
                    break;
                }
            }
        }

        pos += step;
        travel -= STEP_SIZE;
    }

    if params.shading_mode == ShadingMode::MaximumIntensity {
        if max_density < iso_threshold(params) {
            return MarchResult::discard(steps);
        }
        return MarchResult {
            color: Some(Vec4::new(max_density, max_density, max_density, 1.0)),
            steps,
        };
    }

    if accum == Vec4::ZERO {
        return MarchResult::discard(steps);
    }
    MarchResult {
        color: Some(accum),
        steps,
    }
}

fn iso_threshold(params: &RenderParameters) -> f32 {
    params.opacity_factor / RAMP_COLORS as f32
}

/// Per-sample color/alpha law for the compositing modes.
pub fn shade_sample(
    mode: ShadingMode,
    density: f32,
    params: &RenderParameters,
    ramp: &ColorRamp,
) -> Vec4 {
    let threshold = params.opacity_factor * STEP_SIZE;
    match mode {
        ShadingMode::Luminance => {
            let rgba = ramp.evaluate(density);
            let alpha = rgba[3] * params.opacity_factor * STEP_SIZE;
            Vec4::new(
                rgba[0] * alpha * params.light_factor,
                rgba[1] * alpha * params.light_factor,
                rgba[2] * alpha * params.light_factor,
                alpha,
            )
        }
        ShadingMode::Brightness => {
            let rgba = ramp.evaluate(density);
            let alpha = density * STEP_SIZE * threshold * params.light_factor;
            Vec4::new(rgba[0], rgba[1], rgba[2], alpha)
        }
        ShadingMode::Density => {
            let rgba = ramp.evaluate(threshold + density);
            let alpha = density * STEP_SIZE * threshold * params.light_factor;
            Vec4::new(rgba[0], rgba[1], rgba[2], alpha)
        }
        ShadingMode::Color => {
            let recentered = density + threshold - 0.5;
            let rgba = ramp.evaluate(recentered * recentered * recentered);
            let alpha = density * STEP_SIZE * threshold * params.light_factor;
            Vec4::new(rgba[0], rgba[1], rgba[2], alpha)
        }
        ShadingMode::TransparentIsosurface => {
            if density < params.opacity_factor / RAMP_COLORS as f32 {
                return Vec4::ZERO;
            }
            let rgba = ramp.evaluate(density);
            let alpha = density * params.opacity_factor * STEP_SIZE;
            Vec4::new(
                rgba[0] * alpha * params.light_factor,
                rgba[1] * alpha * params.light_factor,
                rgba[2] * alpha * params.light_factor,
                alpha,
            )
        }
        ShadingMode::Isosurface | ShadingMode::MaximumIntensity => Vec4::ZERO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::ShadingMode;

    fn opaque_ramp() -> ColorRamp {
        let mut ramp = ColorRamp::default();
        ramp.set_points(vec![
            (0.0, [1.0, 1.0, 1.0, 1.0]),
            (1.0, [1.0, 1.0, 1.0, 1.0]),
        ]);
        ramp
    }

    #[test]
    fn slab_intersection_along_z() {
        let ray = Ray {
            origin: Vec3::new(0.0, 0.0, -5.0),
            dir: Vec3::Z,
        };
        let (near, far) = intersect_box(&ray);
        assert!((near - 4.0).abs() < 1e-5);
        assert!((far - 6.0).abs() < 1e-5);
    }

    #[test]
    fn slab_miss_is_rejected() {
        let ray = Ray {
            origin: Vec3::new(5.0, 5.0, -5.0),
            dir: Vec3::Z,
        };
        let (near, far) = intersect_box(&ray);
        assert!(near > far);
    }

    #[test]
    fn p2cart_points_along_x_for_neutral_angles() {
        let normal = p2cart(-90.0, 0.0);
        assert!((normal - Vec3::X).length() < 1e-5);
    }

    #[test]
    fn early_termination_stops_before_the_sample_budget() {
        let mut params = RenderParameters::default();
        params.set_shading_mode(ShadingMode::Luminance);
        params.set_opacity_factor(36.0);
        params.set_light_factor(1.0);
        let ramp = opaque_ramp();

        let result = march(
            Vec3::new(0.0, 0.0, -5.0),
            Vec3::new(0.0, 0.0, -1.0),
            &params,
            (0.0, 0.0),
            &|_| 1.0,
            &ramp,
        );

        // alpha per step = opacity * step size, so the accumulator
        // saturates at ceil(1 / alpha) samples.
        let per_step = params.opacity_factor * STEP_SIZE;
        let expected = (1.0 / per_step).ceil() as u32;
        assert!(result.color.is_some());
        assert_eq!(result.steps, expected);
        assert!(result.steps < NUM_SAMPLES);
    }

    #[test]
    fn mip_projects_flat_gray_inside_silhouette() {
        let mut params = RenderParameters::default();
        params.set_shading_mode(ShadingMode::MaximumIntensity);
        params.set_opacity_factor(1.0);
        let ramp = ColorRamp::default();

        let hit = march(
            Vec3::new(0.0, 0.0, -5.0),
            Vec3::new(0.0, 0.0, -1.0),
            &params,
            (0.0, 0.0),
            &|_| 0.5,
            &ramp,
        );
        assert_eq!(hit.color, Some(Vec4::new(0.5, 0.5, 0.5, 1.0)));

        let miss = march(
            Vec3::new(5.0, 5.0, -5.0),
            Vec3::new(5.0, 5.0, -1.0),
            &params,
            (0.0, 0.0),
            &|_| 0.5,
            &ramp,
        );
        assert!(miss.color.is_none());
    }

    #[test]
    fn mip_below_threshold_discards() {
        let mut params = RenderParameters::default();
        params.set_shading_mode(ShadingMode::MaximumIntensity);
        params.set_opacity_factor(256.0);
        let ramp = ColorRamp::default();

        let result = march(
            Vec3::new(0.0, 0.0, -5.0),
            Vec3::new(0.0, 0.0, -1.0),
            &params,
            (0.0, 0.0),
            &|_| 0.5,
            &ramp,
        );
        assert!(result.color.is_none());
    }

    #[test]
    fn clip_plane_halves_the_marched_segment() {
        let mut params = RenderParameters::default();
        params.set_shading_mode(ShadingMode::Luminance);
        params.set_opacity_factor(1.0);
        params.set_azimuth(-90.0);
        params.set_elevation(0.0);
        params.set_clip_plane_depth(0.0);
        let ramp = opaque_ramp();

        let full = march(
            Vec3::new(-5.0, 0.0, 0.0),
            Vec3::new(-1.0, 0.0, 0.0),
            &params,
            (0.0, 0.0),
            &|_| 0.1,
            &ramp,
        );

        params.set_clip(true);
        // Plane normal is +X; a ray marching toward +X sees the front
        // face and gets its near end trimmed.
        let toward = march(
            Vec3::new(-5.0, 0.0, 0.0),
            Vec3::new(-1.0, 0.0, 0.0),
            &params,
            (0.0, 0.0),
            &|_| 0.1,
            &ramp,
        );
        // The opposite direction sees the back face and gets the far end
        // trimmed instead.
        let away = march(
            Vec3::new(5.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            &params,
            (0.0, 0.0),
            &|_| 0.1,
            &ramp,
        );

        assert!(toward.steps < full.steps);
        assert!(away.steps < full.steps);
        let half = full.steps / 2;
        assert!(toward.steps.abs_diff(half) <= 2);
        assert!(away.steps.abs_diff(half) <= 2);
    }

    #[test]
    fn remapping_modes_share_the_brightness_alpha_law() {
        let mut params = RenderParameters::default();
        params.set_opacity_factor(10.0);
        params.set_light_factor(2.0);
        let ramp = opaque_ramp();

        let density = 0.4;
        let threshold = params.opacity_factor * STEP_SIZE;
        let expected_alpha = density * STEP_SIZE * threshold * params.light_factor;
        for mode in [
            ShadingMode::Brightness,
            ShadingMode::Density,
            ShadingMode::Color,
        ] {
            let sample = shade_sample(mode, density, &params, &ramp);
            assert!((sample.w - expected_alpha).abs() < 1e-7, "{mode:?}");
            // The ramp is white everywhere, so only alpha varies.
            assert_eq!(sample.x, 1.0, "{mode:?}");
        }
    }

    #[test]
    fn transparent_isosurface_gates_on_the_threshold() {
        let mut params = RenderParameters::default();
        params.set_shading_mode(ShadingMode::TransparentIsosurface);
        params.set_opacity_factor(25.6);
        let ramp = opaque_ramp();

        let below = shade_sample(ShadingMode::TransparentIsosurface, 0.05, &params, &ramp);
        assert_eq!(below, Vec4::ZERO);

        let above = shade_sample(ShadingMode::TransparentIsosurface, 0.5, &params, &ramp);
        assert!(above.w > 0.0);
    }

    #[test]
    fn isosurface_stops_at_the_first_hit() {
        let mut params = RenderParameters::default();
        params.set_shading_mode(ShadingMode::Isosurface);
        params.set_opacity_factor(25.6);
        params.set_light_factor(1.0);
        let ramp = opaque_ramp();

        let result = march(
            Vec3::new(0.0, 0.0, -5.0),
            Vec3::new(0.0, 0.0, -1.0),
            &params,
            (0.0, 0.0),
            &|_| 0.5,
            &ramp,
        );
        assert_eq!(result.steps, 1);
        assert_eq!(result.color, Some(Vec4::new(1.0, 1.0, 1.0, 1.0)));
    }

    #[test]
    fn fully_transparent_ray_is_discarded() {
        let params = RenderParameters::default();
        let ramp = ColorRamp::default();
        let result = march(
            Vec3::new(0.0, 0.0, -5.0),
            Vec3::new(0.0, 0.0, -1.0),
            &params,
            (0.0, 0.0),
            &|_| 0.0,
            &ramp,
        );
        assert!(result.color.is_none());
    }

    #[test]
    fn dither_offset_is_a_unit_fraction() {
        for (x, y) in [(0.5, 0.5), (12.0, 800.0), (1919.5, 1079.5)] {
            let offset = dither_offset(x, y);
            assert!((0.0..1.0).contains(&offset));
        }
    }
}
