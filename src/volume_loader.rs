use std::{fs, path::Path, sync::Arc, time::Instant};

use futures::future::try_join_all;
use log::{debug, info};
use thiserror::Error;

use crate::{
    color_table::ColorTable,
    decompressor::{GzipDecompressor, StreamDecompressor},
    enums::Encoding,
    header::{FormatError, VolumeDescriptor, parse_header, split_header},
    reslicer::{ResliceError, Reslicer, SliceStacks},
    volume::{RangeError, VolumeModel},
};

#[derive(Debug, Error)]
pub enum VolumeLoaderError {
    #[error("Header is not terminated by an empty line")]
    MissingHeaderTerminator,

    #[error("Invalid header: {0}")]
    Format(#[from] FormatError),

    #[error("Payload holds {actual} bytes, header requires {expected}")]
    TruncatedData { expected: usize, actual: usize },

    #[error("Decompression failed: {0}")]
    Decompression(#[source] std::io::Error),

    #[error("Reslicing failed: {0}")]
    Reslice(#[from] ResliceError),

    #[error("Invalid volume geometry: {0}")]
    Geometry(#[from] RangeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

/// Decoded samples in storage order (x fastest, then y, then z) together
/// with their extremes.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarField {
    pub values: Vec<f32>,
    pub min: f32,
    pub max: f32,
}

impl ScalarField {
    pub fn range(&self) -> (f32, f32) {
        (self.min, self.max)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Output of the decode step: the samples and the header they came from.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedVolume {
    pub field: ScalarField,
    pub descriptor: VolumeDescriptor,
    /// Physical distance between samples along x, y and z.
    pub spacing: [f32; 3],
}

impl DecodedVolume {
    pub fn dimensions(&self) -> [usize; 3] {
        self.descriptor.sizes
    }
}

/// Options shared by the loading entry points.
#[derive(Clone)]
pub struct LoadOptions {
    center: [f32; 3],
    borders: bool,
    color_table: Option<ColorTable>,
    decompressor: Arc<dyn StreamDecompressor>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            center: [0.0; 3],
            borders: true,
            color_table: None,
            decompressor: Arc::new(GzipDecompressor),
        }
    }
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// World-space center of the created volume.
    pub fn with_center(mut self, center: [f32; 3]) -> Self {
        self.center = center;
        self
    }

    pub fn with_borders(mut self, borders: bool) -> Self {
        self.borders = borders;
        self
    }

    /// Map samples through `color_table` instead of the gray ramp. When a
    /// label map is loaded alongside, the table applies to the label map.
    pub fn with_color_table(mut self, color_table: ColorTable) -> Self {
        self.color_table = Some(color_table);
        self
    }

    pub fn with_decompressor(mut self, decompressor: impl StreamDecompressor + 'static) -> Self {
        self.decompressor = Arc::new(decompressor);
        self
    }

    pub fn color_table(&self) -> Option<&ColorTable> {
        self.color_table.as_ref()
    }
}

pub struct VolumeLoader;

impl VolumeLoader {
    /// Decode a header and its payload into a scalar field.
    ///
    /// # Arguments
    ///
    /// * `header` - Header text without the terminating blank line
    /// * `payload` - Bytes following the blank line
    /// * `decompressor` - Used when the header declares gzip encoding
    ///
    /// # Errors
    ///
    /// Returns error if the header is invalid, decompression fails or the
    /// payload is shorter than the declared sizes require
    pub fn decode(
        header: &str,
        payload: &[u8],
        decompressor: &dyn StreamDecompressor,
    ) -> Result<DecodedVolume, VolumeLoaderError> {
        let descriptor = parse_header(header)?;

        let decompressed;
        let data = match descriptor.encoding {
            Encoding::Gzip => {
                decompressed = decompressor
                    .decompress(payload)
                    .map_err(VolumeLoaderError::Decompression)?;
                decompressed.as_slice()
            }
            Encoding::Raw => payload,
        };

        let field = Self::decode_samples(&descriptor, data)?;
        let spacing = descriptor.spacing();
        info!(
            "decoded {:?} volume of {:?} {:?}, scalar range [{}, {}]",
            descriptor.encoding, descriptor.sizes, descriptor.element_type, field.min, field.max
        );

        Ok(DecodedVolume {
            field,
            descriptor,
            spacing,
        })
    }

    /// Decode a complete file: header, blank line, payload.
    pub fn decode_bytes(
        data: &[u8],
        decompressor: &dyn StreamDecompressor,
    ) -> Result<DecodedVolume, VolumeLoaderError> {
        let (header, payload) =
            split_header(data).ok_or(VolumeLoaderError::MissingHeaderTerminator)?;
        Self::decode(&header, payload, decompressor)
    }

    fn decode_samples(
        descriptor: &VolumeDescriptor,
        data: &[u8],
    ) -> Result<ScalarField, VolumeLoaderError> {
        let count = descriptor
            .element_count()
            .ok_or_else(|| FormatError::InvalidValue {
                field: "sizes",
                value: format!("{:?}", descriptor.sizes),
            })?;
        let width = descriptor.element_type.byte_size();
        let expected = count
            .checked_mul(width)
            .ok_or(VolumeLoaderError::TruncatedData {
                expected: usize::MAX,
                actual: data.len(),
            })?;
        if data.len() < expected {
            return Err(VolumeLoaderError::TruncatedData {
                expected,
                actual: data.len(),
            });
        }
        if data.len() > expected {
            debug!("ignoring {} trailing payload bytes", data.len() - expected);
        }

        let read = descriptor.element_type.reader(descriptor.byte_order);
        let mut values = Vec::with_capacity(count);
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;

        for i in 0..count {
            let value = read(data, i * width);
            min = min.min(value);
            max = max.max(value);
            values.push(value);
        }

        Ok(ScalarField { values, min, max })
    }

    /// Decode and reslice a volume into a ready-to-display model
    ///
    /// # Errors
    ///
    /// Returns error if the data cannot be decoded
    pub fn load(data: &[u8], options: &LoadOptions) -> Result<VolumeModel, VolumeLoaderError> {
        let decoded = Self::decode_bytes(data, options.decompressor.as_ref())?;
        let stacks = Self::reslice(&decoded, options.color_table(), None)?;
        Self::build_model(VolumeModel::new(), &decoded, stacks, options)
    }

    /// Load a volume together with its label map.
    ///
    /// The label map is decoded and resliced (through the color table of
    /// `options`) while the image is decoded; the image planes are then
    /// paired with the label planes of the same axis and index.
    ///
    /// # Errors
    ///
    /// Returns error if either volume cannot be decoded or their extents
    /// differ
    pub fn load_with_label_map(
        data: &[u8],
        label_data: &[u8],
        options: &LoadOptions,
    ) -> Result<VolumeModel, VolumeLoaderError> {
        let decompressor = options.decompressor.as_ref();
        let (label, image) = rayon::join(
            || -> Result<_, VolumeLoaderError> {
                let decoded = Self::decode_bytes(label_data, decompressor)?;
                let stacks = Self::reslice(&decoded, options.color_table(), None)?;
                Ok((decoded, stacks))
            },
            || Self::decode_bytes(data, decompressor),
        );
        let (label_decoded, label_stacks) = label?;
        let decoded = image?;

        let stacks = Self::reslice(&decoded, None, Some(&label_stacks))?;
        let label_model =
            Self::build_model(VolumeModel::new_label_map(), &label_decoded, label_stacks, options)?;

        let mut volume = Self::build_model(VolumeModel::new(), &decoded, stacks, options)?;
        volume.set_label_map(label_model);
        Ok(volume)
    }

    /// Load a volume from a .nrrd file
    pub fn load_from_file(
        path: impl AsRef<Path>,
        options: &LoadOptions,
    ) -> Result<VolumeModel, VolumeLoaderError> {
        let data = fs::read(path.as_ref())?;
        debug!("read {} bytes from {}", data.len(), path.as_ref().display());
        Self::load(&data, options)
    }

    /// Run [`VolumeLoader::load`] on the blocking thread pool.
    pub async fn load_async(
        data: Vec<u8>,
        options: LoadOptions,
    ) -> Result<VolumeModel, VolumeLoaderError> {
        tokio::task::spawn_blocking(move || Self::load(&data, &options)).await?
    }

    /// Load several volumes concurrently, failing on the first error.
    pub async fn load_many_async(
        inputs: Vec<Vec<u8>>,
        options: LoadOptions,
    ) -> Result<Vec<VolumeModel>, VolumeLoaderError> {
        try_join_all(
            inputs
                .into_iter()
                .map(|data| Self::load_async(data, options.clone())),
        )
        .await
    }

    fn reslice(
        decoded: &DecodedVolume,
        color_table: Option<&ColorTable>,
        label_map: Option<&SliceStacks>,
    ) -> Result<SliceStacks, ResliceError> {
        Reslicer::reslice(
            &decoded.field.values,
            decoded.dimensions(),
            decoded.field.max,
            color_table,
            label_map,
        )
    }

    fn build_model(
        mut volume: VolumeModel,
        decoded: &DecodedVolume,
        stacks: SliceStacks,
        options: &LoadOptions,
    ) -> Result<VolumeModel, VolumeLoaderError> {
        let started = Instant::now();
        volume.set_center(options.center);
        volume.set_borders(options.borders);
        volume.create(
            decoded.dimensions(),
            decoded.spacing,
            decoded.field.range(),
            stacks,
        )?;
        debug!("created volume model in {:?}", started.elapsed());
        Ok(volume)
    }
}
