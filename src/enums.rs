/// Per-sample color/alpha law applied during ray marching.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ShadingMode {
    #[default]
    Luminance,
    Brightness,
    Color,
    Density,
    Isosurface,
    TransparentIsosurface,
    MaximumIntensity,
}

impl ShadingMode {
    /// Selector value written into the uniform block.
    pub fn selector(self) -> u32 {
        match self {
            ShadingMode::Luminance => 0,
            ShadingMode::Brightness => 1,
            ShadingMode::Color => 2,
            ShadingMode::Density => 3,
            ShadingMode::Isosurface => 4,
            ShadingMode::TransparentIsosurface => 5,
            ShadingMode::MaximumIntensity => 6,
        }
    }
}

/// Volume axis sampled by the slice renderer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SliceAxis {
    X,
    Y,
    Z,
}

impl SliceAxis {
    pub fn selector(self) -> u32 {
        match self {
            SliceAxis::X => 0,
            SliceAxis::Y => 1,
            SliceAxis::Z => 2,
        }
    }
}

/// Active rendering path.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SliceMode {
    #[default]
    Volume,
    Slice(SliceAxis),
}

/// Intensity normalization policy for DICOM stacks.
///
/// Per-slice scaling divides each slice by its own maximum, which can
/// introduce contrast steps between neighboring slices. Global scaling
/// divides by the maximum of the whole stack once loading is complete.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Normalization {
    #[default]
    PerSlice,
    Global,
}
