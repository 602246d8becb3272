use crate::enums::Normalization;
use crate::volume::Volume;

use dicom::{
    object::{FileDicomObject, InMemDicomObject, open_file},
    pixeldata::{ConvertOptions, PixelDecoder, VoiLutOption},
};
use dicom_dictionary_std::tags;
use log::{info, warn};
use ndarray::{Array2, Array3, s};
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;
use web_time::Instant;

#[derive(Debug, Error)]
pub enum VolumeLoaderError {
    #[error("No valid slices found")]
    EmptyVolume,

    #[error("Slice {path:?} is {found:?}, expected {expected:?}")]
    DimensionMismatch {
        path: PathBuf,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("Failed to decode {path:?}: {source}")]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("Missing spacing information")]
    MissingSpacing,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DICOM error: {0}")]
    Dicom(#[from] dicom::object::ReadError),
}

/// Options applied to a stack load.
#[derive(Clone, Debug)]
pub struct LoadOptions {
    /// Skip the first N files of the ordered list.
    pub start_slice: usize,
    /// Stop after N accepted slices.
    pub max_slices: Option<usize>,
    /// Voxel spacing (pixel width, pixel height, slice thickness) for
    /// generic image stacks. DICOM stacks derive spacing from metadata.
    pub spacing: (f32, f32, f32),
    /// Intensity normalization policy for DICOM stacks.
    pub normalization: Normalization,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            start_slice: 0,
            max_slices: None,
            spacing: (1.0, 1.0, 1.0),
            normalization: Normalization::default(),
        }
    }
}

pub struct VolumeLoader;

impl VolumeLoader {
    /// Load a volume from a directory of generic grayscale images.
    ///
    /// Files are ordered lexicographically. The first slice establishes
    /// the (width, height) every following slice must match.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory holds no files, a file cannot be
    /// decoded, or a slice's dimensions differ from the first slice. No
    /// partial volume is ever produced.
    pub fn load_images_from_directory(
        path: impl AsRef<Path>,
        options: &LoadOptions,
    ) -> Result<Volume, VolumeLoaderError> {
        let paths = Self::sorted_entries(path.as_ref())?;
        Self::load_images_from_paths(&paths, options)
    }

    /// Load a volume from an explicit ordered list of image files.
    pub fn load_images_from_paths(
        paths: &[impl AsRef<Path>],
        options: &LoadOptions,
    ) -> Result<Volume, VolumeLoaderError> {
        let started = Instant::now();
        let mut slices: Vec<Array2<f32>> = Vec::new();
        let mut expected: Option<(usize, usize)> = None;

        for path in Self::window(paths, options) {
            let path = path.as_ref();
            let decoded = image::open(path).map_err(|source| VolumeLoaderError::Decode {
                path: path.to_path_buf(),
                source,
            })?;
            let luma = decoded.to_luma32f();
            let (width, height) = (luma.width() as usize, luma.height() as usize);

            match expected {
                None => expected = Some((width, height)),
                Some(first) if first != (width, height) => {
                    return Err(VolumeLoaderError::DimensionMismatch {
                        path: path.to_path_buf(),
                        expected: first,
                        found: (width, height),
                    });
                }
                Some(_) => {}
            }

            let slice = Array2::from_shape_vec((height, width), luma.into_raw())
                .expect("luma buffer matches its reported dimensions");
            slices.push(slice);

            if Self::reached_limit(slices.len(), options) {
                break;
            }
        }

        let volume = Self::stack_slices(slices, options.spacing)?;
        let dims = volume.dims();
        info!(
            "loaded image stack: {}x{}x{} in {:.2?}",
            dims.width,
            dims.height,
            dims.depth,
            started.elapsed()
        );
        Ok(volume)
    }

    /// Load a volume from a directory containing `.dcm` files.
    ///
    /// Non-DICOM files are skipped with a warning; the accepted slices
    /// must agree on dimensions exactly as for generic stacks. Spacing is
    /// taken from the first object carrying PixelSpacing and
    /// SliceThickness.
    pub fn load_dicom_from_directory(
        path: impl AsRef<Path>,
        options: &LoadOptions,
    ) -> Result<Volume, VolumeLoaderError> {
        let paths = Self::sorted_entries(path.as_ref())?;
        Self::load_dicom_from_paths(&paths, options)
    }

    /// Load a volume from an explicit ordered list of DICOM files.
    pub fn load_dicom_from_paths(
        paths: &[impl AsRef<Path>],
        options: &LoadOptions,
    ) -> Result<Volume, VolumeLoaderError> {
        let started = Instant::now();
        let accepted = Self::filter_dicom_paths(Self::window(paths, options));

        let mut objects = Vec::with_capacity(accepted.len());
        for path in &accepted {
            objects.push(open_file(path)?);
            if let Some(max) = options.max_slices
                && objects.len() >= max
            {
                break;
            }
        }

        let volume = Self::load_from_dicom_objects(&objects, options)?;
        let dims = volume.dims();
        info!(
            "loaded DICOM stack: {}x{}x{} in {:.2?}",
            dims.width,
            dims.height,
            dims.depth,
            started.elapsed()
        );
        Ok(volume)
    }

    /// Load a volume from already-opened DICOM objects.
    ///
    /// # Errors
    ///
    /// Returns an error if no objects decode to pixel data, dimensions
    /// are inconsistent, or spacing metadata is missing from every object.
    pub fn load_from_dicom_objects(
        dicom_objects: &[FileDicomObject<InMemDicomObject>],
        options: &LoadOptions,
    ) -> Result<Volume, VolumeLoaderError> {
        let mut slices: Vec<Array2<f32>> = Vec::new();
        let mut expected: Option<(usize, usize)> = None;

        for dicom_object in dicom_objects {
            let Some(raw) = Self::decode_image(dicom_object) else {
                warn!("skipping DICOM object without decodable pixel data");
                continue;
            };
            let dim = raw.dim();
            match expected {
                None => expected = Some(dim),
                Some(first) if first != dim => {
                    return Err(VolumeLoaderError::DimensionMismatch {
                        path: PathBuf::new(),
                        expected: first,
                        found: dim,
                    });
                }
                Some(_) => {}
            }
            slices.push(Self::normalize_slice(&raw, options.normalization));
        }

        let spacing =
            Self::get_spacing(dicom_objects).ok_or(VolumeLoaderError::MissingSpacing)?;
        let mut volume = Self::stack_slices(slices, spacing)?;

        if options.normalization == Normalization::Global {
            let max = volume.max_intensity();
            if max > 0.0 {
                volume.data.par_mapv_inplace(|v| v / max);
            }
        }

        Ok(volume)
    }

    fn sorted_entries(path: &Path) -> Result<Vec<PathBuf>, VolumeLoaderError> {
        info!("loading slices from: {}", path.display());
        let mut paths: Vec<_> = fs::read_dir(path)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        paths.sort();
        Ok(paths)
    }

    fn window<'a, P: AsRef<Path>>(paths: &'a [P], options: &LoadOptions) -> &'a [P] {
        if options.start_slice >= paths.len() {
            return &[];
        }
        &paths[options.start_slice..]
    }

    /// Keep only `.dcm` files, warning about everything else.
    pub(crate) fn filter_dicom_paths(paths: &[impl AsRef<Path>]) -> Vec<PathBuf> {
        paths
            .iter()
            .map(AsRef::as_ref)
            .filter(|path| {
                let is_dicom = path
                    .extension()
                    .and_then(|s| s.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("dcm"));
                if !is_dicom {
                    warn!("skipping junk file: {}", path.display());
                }
                is_dicom
            })
            .map(Path::to_path_buf)
            .collect()
    }

    fn reached_limit(accepted: usize, options: &LoadOptions) -> bool {
        options.max_slices.is_some_and(|max| accepted >= max)
    }

    fn decode_image(dicom_object: &FileDicomObject<InMemDicomObject>) -> Option<Array2<u16>> {
        let pixel_data = dicom_object.decode_pixel_data().ok()?;
        let options = ConvertOptions::new().with_voi_lut(VoiLutOption::First);
        pixel_data
            .to_ndarray_with_options::<u16>(&options)
            .ok()
            .map(|arr| arr.slice_move(s![0, .., .., 0]))
    }

    fn normalize_slice(raw: &Array2<u16>, normalization: Normalization) -> Array2<f32> {
        match normalization {
            Normalization::PerSlice => {
                let max = raw.iter().copied().max().unwrap_or(0);
                if max == 0 {
                    return raw.mapv(|_| 0.0);
                }
                let inv = 1.0 / max as f32;
                raw.mapv(|v| v as f32 * inv)
            }
            // Raw 16-bit range here; the global pass rescales after the
            // whole stack is assembled.
            Normalization::Global => raw.mapv(|v| v as f32 / 65535.0),
        }
    }

    fn stack_slices(
        slices: Vec<Array2<f32>>,
        spacing: (f32, f32, f32),
    ) -> Result<Volume, VolumeLoaderError> {
        if slices.is_empty() {
            return Err(VolumeLoaderError::EmptyVolume);
        }

        let (height, width) = slices[0].dim();
        let depth = slices.len();
        let mut data = Array3::<f32>::zeros((depth, height, width));
        for (i, slice) in slices.iter().enumerate() {
            data.slice_mut(s![i, .., ..]).assign(slice);
        }

        Ok(Volume::new(data, spacing))
    }

    fn get_spacing(dicom_objects: &[FileDicomObject<InMemDicomObject>]) -> Option<(f32, f32, f32)> {
        dicom_objects.iter().find_map(|dicom_object| {
            let pixel_spacing = dicom_object
                .element(tags::PIXEL_SPACING)
                .ok()?
                .to_multi_float32()
                .ok()?;

            let slice_thickness = dicom_object
                .element(tags::SLICE_THICKNESS)
                .ok()?
                .to_float32()
                .ok()?;

            Some((pixel_spacing[0], pixel_spacing[1], slice_thickness))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write_gray_png(dir: &Path, name: &str, width: u32, height: u32, value: u8) -> PathBuf {
        let path = dir.join(name);
        let pixels = vec![value; (width * height) as usize];
        image::save_buffer(
            &path,
            &pixels,
            width,
            height,
            image::ExtendedColorType::L8,
        )
        .expect("should write test slice");
        path
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join("volume_render_tests")
            .join(name)
            .join(format!("{}", std::process::id()));
        fs::create_dir_all(&dir).expect("should create test dir");
        dir
    }

    #[test]
    fn uniform_stack_yields_matching_dims() {
        let dir = temp_dir("uniform_stack");
        for i in 0..10 {
            write_gray_png(&dir, &format!("slice_{i:03}.png"), 64, 64, 128);
        }

        let volume = VolumeLoader::load_images_from_directory(&dir, &LoadOptions::default())
            .expect("uniform stack should load");
        let dims = volume.dims();
        assert_eq!((dims.width, dims.height, dims.depth), (64, 64, 10));
        // 8-bit 128 gray normalizes to ~0.5.
        let sample = volume.data[[5, 32, 32]];
        assert!((sample - 128.0 / 255.0).abs() < 1e-3);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn mismatched_slice_aborts_load() {
        let dir = temp_dir("mismatched_stack");
        write_gray_png(&dir, "a.png", 64, 64, 10);
        write_gray_png(&dir, "b.png", 32, 64, 10);

        let result = VolumeLoader::load_images_from_directory(&dir, &LoadOptions::default());
        assert!(matches!(
            result,
            Err(VolumeLoaderError::DimensionMismatch { .. })
        ));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = temp_dir("empty_stack");
        let result = VolumeLoader::load_images_from_directory(&dir, &LoadOptions::default());
        assert!(matches!(result, Err(VolumeLoaderError::EmptyVolume)));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn start_and_max_slice_windowing() {
        let dir = temp_dir("windowed_stack");
        for i in 0..8 {
            write_gray_png(&dir, &format!("slice_{i}.png"), 16, 16, (i * 20) as u8);
        }

        let options = LoadOptions {
            start_slice: 2,
            max_slices: Some(3),
            ..LoadOptions::default()
        };
        let volume = VolumeLoader::load_images_from_directory(&dir, &options)
            .expect("windowed stack should load");
        assert_eq!(volume.dims().depth, 3);
        // First accepted slice is slice_2 (value 40).
        let sample = volume.data[[0, 8, 8]];
        assert!((sample - 40.0 / 255.0).abs() < 1e-3);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn junk_files_are_skipped_for_dicom() {
        let paths = [
            PathBuf::from("a.dcm"),
            PathBuf::from("b.txt"),
            PathBuf::from("c.dcm"),
        ];
        let accepted = VolumeLoader::filter_dicom_paths(&paths);
        assert_eq!(accepted, vec![PathBuf::from("a.dcm"), PathBuf::from("c.dcm")]);
    }

    #[test]
    fn per_slice_normalization_uses_slice_maximum() {
        let raw = Array2::from_shape_vec((1, 4), vec![0u16, 100, 200, 400]).unwrap();
        let normalized = VolumeLoader::normalize_slice(&raw, Normalization::PerSlice);
        assert!((normalized[[0, 3]] - 1.0).abs() < 1e-6);
        assert!((normalized[[0, 1]] - 0.25).abs() < 1e-6);
        assert_eq!(normalized[[0, 0]], 0.0);
    }
}
