use std::path::PathBuf;

use volume_render::{
    params::ViewState,
    renderer::VolumeRenderer,
    volume::WGPU,
    volume_loader::{LoadOptions, VolumeLoader},
};
use web_time::Instant;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::init();

    let dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("dicom"));

    let volume = VolumeLoader::load_dicom_from_directory(&dir, &LoadOptions::default())
        .expect("should have loaded files from directory");

    let wgpu = WGPU::request()
        .await
        .expect("should have found a GPU adapter");
    let mut renderer = VolumeRenderer::new(wgpu, 512, 512)
        .await
        .expect("should have compiled the built-in programs");
    renderer
        .upload_volume(&volume)
        .await
        .expect("should have uploaded the volume");

    let started = Instant::now();
    let view = ViewState::orbit(0.8, 1.1, 4.0, 1.0, volume.scale());
    renderer
        .render_frame(&view)
        .expect("should have rendered a frame");
    let pixels = renderer
        .read_frame()
        .await
        .expect("should have read the frame back");
    log::info!("frame rendered in {:.2?}", started.elapsed());

    let (width, height) = renderer.target_size();
    let image = image::RgbaImage::from_raw(width, height, pixels)
        .expect("frame buffer matches target dimensions");
    image.save("result.png").expect("should have saved result");

    renderer.teardown();
}
