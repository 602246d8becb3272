//! # volume-render library
//!
//! This crate is a direct-volume-rendering engine: it loads a stack of 2D
//! grayscale slices (generic images or a DICOM series) into a 3D scalar
//! density field, uploads it as a GPU-resident 3D texture, and renders it
//! with single-pass ray marching in a fragment program.

//!
//! Slices can be loaded from an explicit ordered file list or from a
//! directory (sorted lexicographically). DICOM files are read through the
//! dicom-rs ecosystem; anything without a ".dcm" extension in a DICOM
//! stack is skipped. Colors come from a user-editable transfer function
//! ("ramp") resampled into a 256-entry 1D lookup texture, and several
//! compositing modes are available: front-to-back alpha blending,
//! maximum-intensity projection, isosurface thresholding, and
//! brightness/density/color remappings. An alternate path renders a
//! single axis-aligned slice of the volume texture as a 2D overlay.
//!
//! The host owns the GPU context and hands a device/queue pair to the
//! renderer; all resources (volume texture, ramp texture, programs,
//! offscreen target) live in one [`renderer::VolumeRenderer`] value, so
//! multiple independent renderers can coexist.
//!
//!  Contributions are highly welcome!
//!
//! # Examples
//!
//! ## Rendering a DICOM series with maximum-intensity projection
//!
//! Read all DICOM files from the dicom/ directory, upload them as a
//! volume, and ray-march one frame.
//!
//! ```no_run
//! # use volume_render::enums::ShadingMode;
//! # use volume_render::params::ViewState;
//! # use volume_render::renderer::VolumeRenderer;
//! # use volume_render::volume::WGPU;
//! # use volume_render::volume_loader::{LoadOptions, VolumeLoader};
//! # use std::path::PathBuf;
//! # async fn run() {
//! let volume = VolumeLoader::load_dicom_from_directory(
//!     PathBuf::from("dicom"),
//!     &LoadOptions::default(),
//! )
//! .expect("should have loaded files from directory");
//!
//! let wgpu = WGPU::request().await.expect("should have found an adapter");
//! let mut renderer = VolumeRenderer::new(wgpu, 512, 512)
//!     .await
//!     .expect("should have compiled the built-in programs");
//! renderer.upload_volume(&volume).await.expect("should have uploaded");
//! renderer.set_shading_mode(ShadingMode::MaximumIntensity);
//!
//! let view = ViewState::orbit(0.8, 1.1, 4.0, 1.0, volume.scale());
//! renderer.render_frame(&view).expect("should have rendered");
//! # }
//! ```

pub mod enums;
pub mod params;
pub mod ramp;
pub mod raycast;
pub mod renderer;
pub mod shader;
pub mod volume;
pub mod volume_loader;
