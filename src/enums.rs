/// The three principal axes of a volume.
///
/// Slices along `Z` are the axial planes of a scan, `Y` the coronal and `X`
/// the sagittal ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Position of this axis in `[x, y, z]` ordered arrays.
    pub const fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// Payload encoding declared by the header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Raw,
    Gzip,
}

/// Byte order of multi-byte samples. `Big` selects the swapped readers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

/// How a volume is presented to the renderer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// One cross-sectional slice per axis.
    #[default]
    Slicing,
    /// A whole stack of slices along one axis.
    VolumeRendering,
}
