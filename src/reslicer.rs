//! Reslicing of a flat scalar field into RGBA plane stacks along X, Y and Z.
//!
//! The Z pass walks the field in storage order and fills a `[z][y][x]` array
//! on the way. The Y and X passes then read that array instead of recomputing
//! strided offsets into the flat buffer.

use std::sync::Arc;
use std::time::Instant;

use image::{Rgba, RgbaImage};
use log::debug;
use ndarray::{Array3, s};
use thiserror::Error;

use crate::color_table::ColorTable;
use crate::enums::Axis;
use crate::header::checked_product;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResliceError {
    #[error("Scalar field holds {actual} samples, extents require {expected}")]
    FieldLength { expected: usize, actual: usize },

    #[error("Label map extents {label:?} do not match volume extents {volume:?}")]
    LabelMapMismatch { volume: [usize; 3], label: [usize; 3] },
}

/// One resliced image plane, optionally paired with the label map plane at
/// the same position.
#[derive(Debug, Clone)]
pub struct SlicePlane {
    texture: Arc<RgbaImage>,
    label_map: Option<Arc<RgbaImage>>,
}

impl SlicePlane {
    pub fn width(&self) -> u32 {
        self.texture.width()
    }

    pub fn height(&self) -> u32 {
        self.texture.height()
    }

    pub fn texture(&self) -> &Arc<RgbaImage> {
        &self.texture
    }

    /// RGBA bytes, `4 * width * height` long.
    pub fn pixels(&self) -> &[u8] {
        self.texture.as_raw()
    }

    pub fn label_map(&self) -> Option<&Arc<RgbaImage>> {
        self.label_map.as_ref()
    }
}

/// The three plane stacks of a volume, one plane per index along each axis.
#[derive(Debug, Clone, Default)]
pub struct SliceStacks {
    pub x: Vec<SlicePlane>,
    pub y: Vec<SlicePlane>,
    pub z: Vec<SlicePlane>,
}

impl SliceStacks {
    pub fn axis(&self, axis: Axis) -> &[SlicePlane] {
        match axis {
            Axis::X => &self.x,
            Axis::Y => &self.y,
            Axis::Z => &self.z,
        }
    }

    /// Number of planes along x, y and z.
    pub fn extents(&self) -> [usize; 3] {
        [self.x.len(), self.y.len(), self.z.len()]
    }

    fn label_texture(&self, axis: Axis, index: usize) -> Option<Arc<RgbaImage>> {
        self.axis(axis)
            .get(index)
            .map(|plane| Arc::clone(&plane.texture))
    }
}

/// Rule turning a scalar into an RGBA pixel.
#[derive(Clone, Copy)]
enum PixelMapping<'a> {
    /// Gray ramp over `[0, max]` with full opacity.
    Grayscale { max: f32 },
    Lookup(&'a ColorTable),
}

impl PixelMapping<'_> {
    #[inline]
    fn rgba(&self, value: f32) -> Rgba<u8> {
        match self {
            Self::Grayscale { max } => {
                let gray = (255.0 * (f64::from(value) / f64::from(*max))) as u8;
                Rgba([gray, gray, gray, 255])
            }
            Self::Lookup(table) => Rgba(table.rgba_bytes(value)),
        }
    }
}

pub struct Reslicer;

impl Reslicer {
    /// Reslice `field` into stacks along all three axes.
    ///
    /// `field` is row-major with x varying fastest and `extents` is
    /// `[nx, ny, nz]`. Without a color table every sample is scaled by
    /// `max_value` onto a gray ramp; thresholding is left to the renderer.
    /// With a color table each sample is mapped through
    /// [`ColorTable::rgba_bytes`]. When `label_map` holds the already
    /// resliced stacks of a label volume, each produced plane is paired with
    /// the label plane at the same axis and index.
    ///
    /// # Errors
    ///
    /// Returns an error if `field` does not hold `nx * ny * nz` samples or
    /// the label stacks have different extents.
    pub fn reslice(
        field: &[f32],
        extents: [usize; 3],
        max_value: f32,
        color_table: Option<&ColorTable>,
        label_map: Option<&SliceStacks>,
    ) -> Result<SliceStacks, ResliceError> {
        let [nx, ny, nz] = extents;
        let expected = checked_product(&extents).unwrap_or(usize::MAX);
        if field.len() != expected {
            return Err(ResliceError::FieldLength {
                expected,
                actual: field.len(),
            });
        }
        if let Some(label) = label_map {
            if label.extents() != extents {
                return Err(ResliceError::LabelMapMismatch {
                    volume: extents,
                    label: label.extents(),
                });
            }
        }

        let started = Instant::now();
        let mapping = match color_table {
            Some(table) => PixelMapping::Lookup(table),
            None => PixelMapping::Grayscale { max: max_value },
        };
        let pair = |axis: Axis, index: usize| label_map.and_then(|l| l.label_texture(axis, index));

        let pixels_per_slice = nx * ny;
        let mut image = Array3::<f32>::zeros((nz, ny, nx));

        let mut stack_z = Vec::with_capacity(nz);
        for z in 0..nz {
            let current = &field[z * pixels_per_slice..(z + 1) * pixels_per_slice];
            let mut texture = RgbaImage::new(nx as u32, ny as u32);
            let mut plane = image.slice_mut(s![z, .., ..]);

            for ((pixel, slot), &value) in texture.pixels_mut().zip(plane.iter_mut()).zip(current) {
                *pixel = mapping.rgba(value);
                *slot = value;
            }

            stack_z.push(SlicePlane {
                texture: Arc::new(texture),
                label_map: pair(Axis::Z, z),
            });
        }

        // rows run along z, columns along x
        let stack_y = (0..ny)
            .map(|y| {
                let plane = image.slice(s![.., y, ..]);
                let texture = RgbaImage::from_fn(nx as u32, nz as u32, |col, row| {
                    mapping.rgba(plane[[row as usize, col as usize]])
                });
                SlicePlane {
                    texture: Arc::new(texture),
                    label_map: pair(Axis::Y, y),
                }
            })
            .collect();

        // rows run along z, columns along y
        let stack_x = (0..nx)
            .map(|x| {
                let plane = image.slice(s![.., .., x]);
                let texture = RgbaImage::from_fn(ny as u32, nz as u32, |col, row| {
                    mapping.rgba(plane[[row as usize, col as usize]])
                });
                SlicePlane {
                    texture: Arc::new(texture),
                    label_map: pair(Axis::X, x),
                }
            })
            .collect();

        debug!(
            "resliced {nx}x{ny}x{nz} volume in {:?} ({})",
            started.elapsed(),
            if color_table.is_some() { "color table" } else { "grayscale" }
        );

        Ok(SliceStacks {
            x: stack_x,
            y: stack_y,
            z: stack_z,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(extents: [usize; 3]) -> Vec<f32> {
        (0..extents.iter().product::<usize>())
            .map(|i| i as f32)
            .collect()
    }

    #[test]
    fn grayscale_single_slice() {
        let stacks = Reslicer::reslice(&[0.0, 1.0, 2.0, 3.0], [2, 2, 1], 3.0, None, None).unwrap();
        assert_eq!(stacks.extents(), [2, 2, 1]);

        let plane = &stacks.z[0];
        assert_eq!((plane.width(), plane.height()), (2, 2));
        assert_eq!(
            plane.pixels(),
            &[
                0, 0, 0, 255, 85, 85, 85, 255, 170, 170, 170, 255, 255, 255, 255, 255
            ]
        );
        assert!(plane.label_map().is_none());
    }

    #[test]
    fn stack_lengths_and_buffer_sizes() {
        let extents = [3, 4, 5];
        let field = ramp(extents);
        let stacks = Reslicer::reslice(&field, extents, 59.0, None, None).unwrap();

        assert_eq!(stacks.x.len(), 3);
        assert_eq!(stacks.y.len(), 4);
        assert_eq!(stacks.z.len(), 5);
        for axis in Axis::ALL {
            for plane in stacks.axis(axis) {
                let expected = 4 * plane.width() as usize * plane.height() as usize;
                assert_eq!(plane.pixels().len(), expected);
            }
        }
        assert_eq!((stacks.z[0].width(), stacks.z[0].height()), (3, 4));
        assert_eq!((stacks.y[0].width(), stacks.y[0].height()), (3, 5));
        assert_eq!((stacks.x[0].width(), stacks.x[0].height()), (4, 5));
    }

    #[test]
    fn planes_are_transposes_of_the_field() {
        let extents = [3, 4, 5];
        let [nx, ny, nz] = extents;
        let field = ramp(extents);
        let max = 59.0;
        let stacks = Reslicer::reslice(&field, extents, max, None, None).unwrap();

        for z in 0..nz {
            for y in 0..ny {
                for x in 0..nx {
                    let value = field[z * nx * ny + y * nx + x];
                    let gray = (255.0 * (f64::from(value) / f64::from(max))) as u8;
                    let expected = Rgba([gray, gray, gray, 255]);
                    let (x32, y32, z32) = (x as u32, y as u32, z as u32);

                    assert_eq!(*stacks.z[z].texture().get_pixel(x32, y32), expected);
                    assert_eq!(*stacks.y[y].texture().get_pixel(x32, z32), expected);
                    assert_eq!(*stacks.x[x].texture().get_pixel(y32, z32), expected);
                }
            }
        }
    }

    #[test]
    fn reslicing_is_deterministic() {
        let extents = [4, 3, 2];
        let field: Vec<f32> = ramp(extents).into_iter().map(|v| v * 1.7).collect();
        let first = Reslicer::reslice(&field, extents, 40.0, None, None).unwrap();
        let second = Reslicer::reslice(&field, extents, 40.0, None, None).unwrap();
        for axis in Axis::ALL {
            for (a, b) in first.axis(axis).iter().zip(second.axis(axis)) {
                assert_eq!(a.pixels(), b.pixels());
            }
        }
    }

    #[test]
    fn color_lookup_falls_back_to_last_entry() {
        let mut table = ColorTable::new();
        table.add(0, "background", [0.0, 0.0, 0.0, 0.0]);
        table.add(1, "tissue", [1.0, 0.0, 0.0, 1.0]);
        table.add(2, "bone", [1.0, 1.0, 1.0, 1.0]);

        let stacks =
            Reslicer::reslice(&[0.0, 1.4, 2.0, 9.0], [4, 1, 1], 9.0, Some(&table), None).unwrap();
        assert_eq!(
            stacks.z[0].pixels(),
            &[0, 0, 0, 0, 255, 0, 0, 255, 255, 255, 255, 255, 255, 255, 255, 255]
        );
    }

    #[test]
    fn pairs_planes_with_label_map() {
        let extents = [2, 3, 2];
        let mut table = ColorTable::new();
        table.add(1, "label", [0.0, 1.0, 0.0, 1.0]);
        let labels = Reslicer::reslice(&[1.0; 12], extents, 1.0, Some(&table), None).unwrap();
        let stacks = Reslicer::reslice(&ramp(extents), extents, 11.0, None, Some(&labels)).unwrap();

        for axis in Axis::ALL {
            for (plane, label) in stacks.axis(axis).iter().zip(labels.axis(axis)) {
                assert!(Arc::ptr_eq(plane.label_map().unwrap(), label.texture()));
            }
        }
    }

    #[test]
    fn rejects_mismatched_inputs() {
        assert_eq!(
            Reslicer::reslice(&[1.0; 5], [2, 2, 1], 1.0, None, None).unwrap_err(),
            ResliceError::FieldLength {
                expected: 4,
                actual: 5
            }
        );

        let labels = Reslicer::reslice(&[1.0; 4], [2, 2, 1], 1.0, None, None).unwrap();
        assert_eq!(
            Reslicer::reslice(&[1.0; 4], [4, 1, 1], 1.0, None, Some(&labels)).unwrap_err(),
            ResliceError::LabelMapMismatch {
                volume: [4, 1, 1],
                label: [2, 2, 1]
            }
        );
    }

    #[test]
    fn rejects_overflowing_extents() {
        assert_eq!(
            Reslicer::reslice(&[], [usize::MAX / 2, 4, 1], 1.0, None, None).unwrap_err(),
            ResliceError::FieldLength {
                expected: usize::MAX,
                actual: 0
            }
        );
    }
}
