use crate::enums::{ShadingMode, SliceMode};

use glam::{Mat4, Vec3};

/// Host-facing rendering parameters.
///
/// Every field has a dedicated clamped setter; setters are idempotent and
/// take effect on the next rendered frame. Azimuth and elevation orient
/// the clip plane, not the camera.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderParameters {
    pub azimuth: f32,
    pub elevation: f32,
    pub clip_plane_depth: f32,
    pub clip: bool,
    pub dither: bool,
    pub opacity_factor: f32,
    pub light_factor: f32,
    pub shading_mode: ShadingMode,
    pub slice_mode: SliceMode,
    pub slice_position: f32,
}

impl Default for RenderParameters {
    fn default() -> Self {
        Self {
            azimuth: 90.0,
            elevation: 125.0,
            clip_plane_depth: 0.03,
            clip: false,
            dither: false,
            opacity_factor: 25.0,
            light_factor: 1.2,
            shading_mode: ShadingMode::default(),
            slice_mode: SliceMode::default(),
            slice_position: 0.5,
        }
    }
}

impl RenderParameters {
    pub fn set_azimuth(&mut self, degrees: f32) {
        self.azimuth = degrees.clamp(-360.0, 360.0);
    }

    pub fn set_elevation(&mut self, degrees: f32) {
        self.elevation = degrees.clamp(-360.0, 360.0);
    }

    pub fn set_clip_plane_depth(&mut self, depth: f32) {
        self.clip_plane_depth = depth.clamp(-1.0, 1.0);
    }

    pub fn set_clip(&mut self, enabled: bool) {
        self.clip = enabled;
    }

    pub fn set_dither(&mut self, enabled: bool) {
        self.dither = enabled;
    }

    pub fn set_opacity_factor(&mut self, factor: f32) {
        self.opacity_factor = factor.clamp(0.0, 256.0);
    }

    pub fn set_light_factor(&mut self, factor: f32) {
        self.light_factor = factor.clamp(0.0, 100.0);
    }

    pub fn set_shading_mode(&mut self, mode: ShadingMode) {
        self.shading_mode = mode;
    }

    pub fn set_slice_mode(&mut self, mode: SliceMode) {
        self.slice_mode = mode;
    }

    pub fn set_slice_position(&mut self, position: f32) {
        self.slice_position = position.clamp(0.0, 1.0);
    }
}

/// View transform for a frame, supplied by the host.
#[derive(Clone, Copy, Debug)]
pub struct ViewState {
    /// Combined model-view-projection matrix for the [-1,1] bounding cube.
    pub view_proj: Mat4,
    /// Camera position in the cube's object space.
    pub camera_pos: Vec3,
}

impl ViewState {
    /// Orbit camera around the volume center.
    ///
    /// `theta`/`phi` are in radians, `scale` the per-axis cube scale from
    /// [`crate::volume::Volume::scale`].
    pub fn orbit(theta: f32, phi: f32, radius: f32, aspect: f32, scale: [f32; 3]) -> Self {
        let eye = Vec3::new(
            radius * phi.sin() * theta.cos(),
            radius * phi.cos(),
            radius * phi.sin() * theta.sin(),
        );
        let model = Mat4::from_scale(Vec3::from_array(scale));
        let view = Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y);
        let proj = Mat4::perspective_rh(45_f32.to_radians(), aspect, 0.1, 100.0);

        // The ray marcher wants the camera in the cube's object space.
        let camera_pos = model.inverse().transform_point3(eye);
        Self {
            view_proj: proj * view * model,
            camera_pos,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setters_clamp_to_documented_ranges() {
        let mut params = RenderParameters::default();
        params.set_azimuth(400.0);
        assert_eq!(params.azimuth, 360.0);
        params.set_elevation(-720.0);
        assert_eq!(params.elevation, -360.0);
        params.set_clip_plane_depth(2.0);
        assert_eq!(params.clip_plane_depth, 1.0);
        params.set_opacity_factor(300.0);
        assert_eq!(params.opacity_factor, 256.0);
        params.set_light_factor(150.0);
        assert_eq!(params.light_factor, 100.0);
        params.set_slice_position(-0.25);
        assert_eq!(params.slice_position, 0.0);
    }

    #[test]
    fn setters_are_idempotent() {
        let mut params = RenderParameters::default();
        params.set_azimuth(45.0);
        let once = params;
        params.set_azimuth(45.0);
        assert_eq!(params, once);
    }
}
