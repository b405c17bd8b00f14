//! # NRRD-volume library
//!
//! This crate decodes scan volumes stored as NRRD files and reslices them
//! into stacks of RGBA image planes, ready to be uploaded as textures.

//!
//! A file consists of a textual `key: value` header followed by a binary
//! payload, optionally gzip compressed. The payload is decoded into a flat
//! scalar field which is then resliced along the three principal axes:
//!  - X (sagittal)
//!  - Y (coronal)
//!  - Z (axial)
//!
//!  Samples are mapped onto a gray ramp over the scalar range, or through a
//!  [`ColorTable`] for label volumes. A label volume can be loaded next to an
//!  image so that each image plane carries the label plane at the same
//!  position. The resulting [`VolumeModel`] keeps track of the selected slice
//!  per axis, the threshold window and whether the volume is shown as slices
//!  or volume rendered.
//!
//!  Supported sample types:
//!   - 8-bit signed and unsigned integers
//!   - 16-bit integers (always read as unsigned)
//!   - 32-bit signed and unsigned integers
//!   - 32-bit floats
//!
//! # Examples
//!
//! ## Loading a volume and picking a slice
//!
//! Load `head.nrrd`, move to the last axial slice and save it.
//!
//! ```no_run
//! # use nrrd_volume::{Axis, LoadOptions, VolumeLoader};
//! let mut volume = VolumeLoader::load_from_file("head.nrrd", &LoadOptions::new())
//!     .expect("should have loaded the volume");
//! volume.set_index_z(volume.dimensions()[2] - 1);
//! volume.apply_pending_changes();
//! let slice = volume
//!     .current_slice(Axis::Z)
//!     .and_then(|slice| slice.plane())
//!     .expect("should have a slice at the selected index");
//! slice.texture().save("result.png");
//! ```
//!
//! [`ColorTable`]: color_table::ColorTable
//! [`VolumeModel`]: volume::VolumeModel

pub mod byte_decoder;
pub mod color_table;
pub mod decompressor;
pub mod enums;
pub mod header;
pub mod reslicer;
pub mod volume;
pub mod volume_loader;

pub use color_table::ColorTable;
pub use enums::{Axis, ByteOrder, Encoding, RenderMode};
pub use volume::VolumeModel;
pub use volume_loader::{LoadOptions, VolumeLoader, VolumeLoaderError};
