use thiserror::Error;

use crate::enums::{Axis, RenderMode};
use crate::reslicer::{SlicePlane, SliceStacks};

#[derive(Debug, Error, PartialEq)]
pub enum RangeError {
    #[error("Invalid threshold range [{lower}, {upper}] for scalar range [{min}, {max}]")]
    Threshold {
        lower: f32,
        upper: f32,
        min: f32,
        max: f32,
    },

    #[error("Slice stacks with extents {actual:?} do not fit volume dimensions {expected:?}")]
    StackExtents {
        expected: [usize; 3],
        actual: [usize; 3],
    },
}

/// World-space placement of one slice.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceGeometry {
    pub center: [f32; 3],
    /// Normal of the slice plane.
    pub front: [f32; 3],
    pub up: [f32; 3],
    pub width: f32,
    pub height: f32,
    pub borders: bool,
    pub border_color: [f32; 3],
}

#[derive(Debug, Clone)]
pub struct Slice {
    pub geometry: SliceGeometry,
    plane: Option<SlicePlane>,
    visible: bool,
}

impl Slice {
    /// The resliced texture shown on this slice.
    pub fn plane(&self) -> Option<&SlicePlane> {
        self.plane.as_ref()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }
}

/// All slices along one axis. The stack itself is only shown as a whole
/// while volume rendering along its axis.
#[derive(Debug, Clone, Default)]
pub struct SliceStack {
    slices: Vec<Slice>,
    visible: bool,
}

impl SliceStack {
    pub fn slices(&self) -> &[Slice] {
        &self.slices
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    fn set_slice_visible(&mut self, index: usize, visible: bool) {
        if let Some(slice) = self.slices.get_mut(index) {
            slice.visible = visible;
        }
    }
}

/// A displayable volume made of slice stacks along X, Y and Z that can be
/// shown either one slice per axis or volume rendered along one axis.
///
/// Index, threshold and mode changes are recorded immediately but only
/// reflected in slice visibility by [`VolumeModel::apply_pending_changes`].
#[derive(Debug, Clone)]
pub struct VolumeModel {
    center: [f32; 3],
    dimensions: [usize; 3],
    spacing: [f32; 3],
    index: [usize; 3],
    index_old: [usize; 3],
    scalar_range: (f32, f32),
    lower_threshold: f32,
    upper_threshold: f32,
    requested_mode: RenderMode,
    applied_mode: RenderMode,
    volume_rendering_direction: Axis,
    stacks: Vec<SliceStack>,
    label_map: Option<Box<VolumeModel>>,
    is_label_map: bool,
    borders: bool,
    dirty: bool,
}

impl Default for VolumeModel {
    fn default() -> Self {
        Self {
            center: [0.0; 3],
            dimensions: [10, 10, 10],
            spacing: [1.0; 3],
            index: [0; 3],
            index_old: [0; 3],
            scalar_range: (0.0, 1000.0),
            lower_threshold: 0.0,
            upper_threshold: 1000.0,
            requested_mode: RenderMode::Slicing,
            applied_mode: RenderMode::Slicing,
            volume_rendering_direction: Axis::X,
            stacks: Vec::new(),
            label_map: None,
            is_label_map: false,
            borders: true,
            dirty: false,
        }
    }
}

impl VolumeModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty model for a label volume. Label maps never draw borders.
    pub fn new_label_map() -> Self {
        Self {
            is_label_map: true,
            borders: false,
            ..Self::default()
        }
    }

    /// Populate the model with decoded geometry and resliced planes.
    ///
    /// Builds one slice per index along every axis, resets the threshold to
    /// the full scalar range and shows the middle slice of each axis.
    pub fn create(
        &mut self,
        dimensions: [usize; 3],
        spacing: [f32; 3],
        scalar_range: (f32, f32),
        stacks: SliceStacks,
    ) -> Result<(), RangeError> {
        if stacks.extents() != dimensions {
            return Err(RangeError::StackExtents {
                expected: dimensions,
                actual: stacks.extents(),
            });
        }

        self.dimensions = dimensions;
        self.spacing = spacing;
        self.scalar_range = scalar_range;
        self.lower_threshold = scalar_range.0;
        self.upper_threshold = scalar_range.1;

        let SliceStacks { x, y, z } = stacks;
        self.stacks = Axis::ALL
            .into_iter()
            .zip([x, y, z])
            .map(|(axis, planes)| self.build_stack(axis, planes))
            .collect();

        for axis in Axis::ALL {
            let middle = self.dimensions[axis.index()].saturating_sub(1) / 2;
            self.index[axis.index()] = middle;
            self.index_old[axis.index()] = middle;
        }

        self.dirty = true;
        Ok(())
    }

    fn build_stack(&self, axis: Axis, planes: Vec<SlicePlane>) -> SliceStack {
        let a = axis.index();
        let half_dimension = self.dimensions[a].saturating_sub(1) as f32 / 2.0;
        let middle = self.dimensions[a].saturating_sub(1) / 2;
        let [d0, d1, d2] = self.dimensions.map(|d| d.saturating_sub(1) as f32);
        let [s0, s1, s2] = self.spacing;

        let (front, up, width, height, border_color) = match axis {
            Axis::X => ([1.0, 0.0, 0.0], [0.0, 1.0, 0.0], d2 * s2, d1 * s1, [1.0, 1.0, 0.0]),
            Axis::Y => ([0.0, 1.0, 0.0], [0.0, 0.0, -1.0], d0 * s0, d2 * s2, [1.0, 0.0, 0.0]),
            Axis::Z => ([0.0, 0.0, 1.0], [0.0, 1.0, 0.0], d0 * s0, d1 * s1, [0.0, 1.0, 0.0]),
        };

        let slices = planes
            .into_iter()
            .enumerate()
            .map(|(i, plane)| {
                let position = (i as f32 - half_dimension) * self.spacing[a];
                let mut center = self.center;
                center[a] += position;

                Slice {
                    geometry: SliceGeometry {
                        center,
                        front,
                        up,
                        width,
                        height,
                        borders: self.borders && !self.is_label_map,
                        border_color,
                    },
                    plane: Some(plane),
                    visible: i == middle,
                }
            })
            .collect();

        SliceStack {
            slices,
            visible: false,
        }
    }

    /// Whether [`VolumeModel::create`] has populated the slice stacks.
    pub fn is_created(&self) -> bool {
        !self.stacks.is_empty()
    }

    /// Get the dimensions of the volume (x, y, z)
    pub fn dimensions(&self) -> [usize; 3] {
        self.dimensions
    }

    pub fn spacing(&self) -> [f32; 3] {
        self.spacing
    }

    pub fn center(&self) -> [f32; 3] {
        self.center
    }

    /// Set the world-space center. Only affects slices built by a later
    /// [`VolumeModel::create`].
    pub fn set_center(&mut self, center: [f32; 3]) {
        self.center = center;
    }

    pub fn borders(&self) -> bool {
        self.borders
    }

    /// Enable or disable slice borders. Must be set before `create`.
    pub fn set_borders(&mut self, borders: bool) {
        self.borders = borders;
    }

    pub fn scalar_range(&self) -> (f32, f32) {
        self.scalar_range
    }

    pub fn threshold(&self) -> (f32, f32) {
        (self.lower_threshold, self.upper_threshold)
    }

    /// Restrict the displayed scalar window to `[lower, upper]`.
    ///
    /// # Errors
    ///
    /// Fails without changing the model if `lower > upper`, if either bound
    /// lies outside the scalar range, or if a bound is NaN.
    pub fn set_threshold(&mut self, lower: f32, upper: f32) -> Result<(), RangeError> {
        let (min, max) = self.scalar_range;
        let valid = lower >= min && upper <= max && lower <= upper;
        if !valid {
            return Err(RangeError::Threshold {
                lower,
                upper,
                min,
                max,
            });
        }

        self.lower_threshold = lower;
        self.upper_threshold = upper;
        Ok(())
    }

    pub fn index(&self, axis: Axis) -> usize {
        self.index[axis.index()]
    }

    /// Select the slice shown along `axis`, clamped to the axis extent.
    pub fn set_index(&mut self, axis: Axis, index: usize) {
        let last = self.dimensions[axis.index()].saturating_sub(1);
        self.index[axis.index()] = index.min(last);
    }

    pub fn set_index_x(&mut self, index: usize) {
        self.set_index(Axis::X, index);
    }

    pub fn set_index_y(&mut self, index: usize) {
        self.set_index(Axis::Y, index);
    }

    pub fn set_index_z(&mut self, index: usize) {
        self.set_index(Axis::Z, index);
    }

    pub fn volume_rendering(&self) -> bool {
        self.requested_mode == RenderMode::VolumeRendering
    }

    /// Request volume rendering or slicing. Takes effect on the next
    /// [`VolumeModel::apply_pending_changes`].
    pub fn set_volume_rendering(&mut self, volume_rendering: bool) {
        self.requested_mode = if volume_rendering {
            RenderMode::VolumeRendering
        } else {
            RenderMode::Slicing
        };
    }

    /// The mode currently reflected in slice visibility.
    pub fn mode(&self) -> RenderMode {
        self.applied_mode
    }

    pub fn volume_rendering_direction(&self) -> Axis {
        self.volume_rendering_direction
    }

    /// Volume render along `axis`. Switches the shown stack right away when
    /// volume rendering is active, otherwise remembers the axis.
    pub fn set_volume_rendering_direction(&mut self, axis: Axis) {
        if self.applied_mode == RenderMode::VolumeRendering {
            self.show_volume_rendering_stack(axis);
        } else {
            self.volume_rendering_direction = axis;
        }
    }

    /// Bring slice visibility in line with the requested mode and indices.
    ///
    /// Entering volume rendering hides the selected slice of every axis;
    /// leaving it hides the rendered stack. In slicing mode the previously
    /// selected slice of each axis is hidden and the current one shown.
    pub fn apply_pending_changes(&mut self) {
        if !self.is_created() {
            return;
        }

        if self.requested_mode != self.applied_mode {
            match self.requested_mode {
                RenderMode::VolumeRendering => {
                    for axis in Axis::ALL {
                        let current = self.index[axis.index()];
                        self.stacks[axis.index()].set_slice_visible(current, false);
                    }
                }
                RenderMode::Slicing => {
                    self.stacks[self.volume_rendering_direction.index()].visible = false;
                }
            }
            self.dirty = true;
            self.applied_mode = self.requested_mode;
        }

        match self.applied_mode {
            RenderMode::VolumeRendering => {
                self.show_volume_rendering_stack(self.volume_rendering_direction)
            }
            RenderMode::Slicing => self.show_current_slices(),
        }
    }

    fn show_volume_rendering_stack(&mut self, direction: Axis) {
        if !self.is_created() || (!self.dirty && direction == self.volume_rendering_direction) {
            return;
        }

        self.stacks[self.volume_rendering_direction.index()].visible = false;
        self.stacks[direction.index()].visible = true;
        self.volume_rendering_direction = direction;
        self.dirty = false;
    }

    fn show_current_slices(&mut self) {
        for axis in Axis::ALL {
            let a = axis.index();
            let (current, old) = (self.index[a], self.index_old[a]);
            self.index_old[a] = current;

            let stack = &mut self.stacks[a];
            stack.set_slice_visible(old, false);
            stack.set_slice_visible(current, true);
        }
        self.dirty = false;
    }

    /// Whether visibility still has to catch up with recorded changes.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn stack(&self, axis: Axis) -> Option<&SliceStack> {
        self.stacks.get(axis.index())
    }

    /// The slice selected by the current index along `axis`.
    pub fn current_slice(&self, axis: Axis) -> Option<&Slice> {
        self.stack(axis)?.slices.get(self.index(axis))
    }

    /// Slices a renderer should draw in the applied mode.
    pub fn visible_slices(&self) -> impl Iterator<Item = (Axis, &Slice)> {
        let mode = self.applied_mode;
        Axis::ALL
            .into_iter()
            .zip(&self.stacks)
            .flat_map(move |(axis, stack)| {
                stack
                    .slices
                    .iter()
                    .filter(move |slice| match mode {
                        RenderMode::Slicing => slice.visible,
                        RenderMode::VolumeRendering => stack.visible,
                    })
                    .map(move |slice| (axis, slice))
            })
    }

    pub fn label_map(&self) -> Option<&VolumeModel> {
        self.label_map.as_deref()
    }

    pub fn label_map_mut(&mut self) -> Option<&mut VolumeModel> {
        self.label_map.as_deref_mut()
    }

    /// Attach the label volume whose planes are paired with this volume's.
    pub fn set_label_map(&mut self, mut label_map: VolumeModel) {
        label_map.is_label_map = true;
        label_map.borders = false;
        self.label_map = Some(Box::new(label_map));
    }

    pub fn is_label_map(&self) -> bool {
        self.is_label_map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reslicer::Reslicer;

    fn created(dimensions: [usize; 3]) -> VolumeModel {
        let count = dimensions.iter().product::<usize>();
        let field: Vec<f32> = (0..count).map(|i| i as f32).collect();
        let max = (count - 1) as f32;
        let stacks = Reslicer::reslice(&field, dimensions, max, None, None).unwrap();

        let mut volume = VolumeModel::new();
        volume
            .create(dimensions, [1.0, 2.0, 0.5], (0.0, max), stacks)
            .unwrap();
        volume
    }

    fn visible_indices(volume: &VolumeModel, axis: Axis) -> Vec<usize> {
        volume
            .stack(axis)
            .unwrap()
            .slices()
            .iter()
            .enumerate()
            .filter(|(_, slice)| slice.is_visible())
            .map(|(i, _)| i)
            .collect()
    }

    #[test]
    fn placeholder_geometry() {
        let volume = VolumeModel::new();
        assert_eq!(volume.dimensions(), [10, 10, 10]);
        assert_eq!(volume.scalar_range(), (0.0, 1000.0));
        assert_eq!(volume.threshold(), (0.0, 1000.0));
        assert!(!volume.is_created());
        assert_eq!(volume.mode(), RenderMode::Slicing);
    }

    #[test]
    fn threshold_must_lie_within_scalar_range() {
        let mut volume = VolumeModel::new();
        assert!(volume.set_threshold(-1.0, 500.0).is_err());
        assert!(volume.set_threshold(600.0, 500.0).is_err());
        assert!(volume.set_threshold(100.0, 1001.0).is_err());
        assert!(volume.set_threshold(f32::NAN, 500.0).is_err());
        assert_eq!(volume.threshold(), (0.0, 1000.0));

        assert!(volume.set_threshold(100.0, 500.0).is_ok());
        assert_eq!(volume.threshold(), (100.0, 500.0));
        assert!(volume.set_threshold(0.0, 1000.0).is_ok());
    }

    #[test]
    fn create_resets_threshold_and_shows_middle_slices() {
        let volume = created([4, 3, 5]);
        assert_eq!(volume.threshold(), (0.0, 59.0));
        assert_eq!(volume.index(Axis::X), 1);
        assert_eq!(volume.index(Axis::Y), 1);
        assert_eq!(volume.index(Axis::Z), 2);
        assert_eq!(visible_indices(&volume, Axis::X), vec![1]);
        assert_eq!(visible_indices(&volume, Axis::Z), vec![2]);
        assert!(volume.is_dirty());
    }

    #[test]
    fn create_lays_out_slice_geometry() {
        let mut volume = VolumeModel::new();
        volume.set_center([10.0, 0.0, 0.0]);
        let stacks = Reslicer::reslice(&[0.0; 24], [4, 3, 2], 1.0, None, None).unwrap();
        volume
            .create([4, 3, 2], [1.0, 2.0, 0.5], (0.0, 1.0), stacks)
            .unwrap();

        let x_slices = volume.stack(Axis::X).unwrap().slices();
        assert_eq!(x_slices[0].geometry.center, [8.5, 0.0, 0.0]);
        assert_eq!(x_slices[3].geometry.center, [11.5, 0.0, 0.0]);
        assert_eq!(x_slices[0].geometry.width, 0.5);
        assert_eq!(x_slices[0].geometry.height, 4.0);
        assert_eq!(x_slices[0].geometry.border_color, [1.0, 1.0, 0.0]);

        let y_slice = &volume.stack(Axis::Y).unwrap().slices()[2];
        assert_eq!(y_slice.geometry.center, [10.0, 2.0, 0.0]);
        assert_eq!(y_slice.geometry.up, [0.0, 0.0, -1.0]);
        assert_eq!((y_slice.geometry.width, y_slice.geometry.height), (3.0, 0.5));

        let z_slice = &volume.stack(Axis::Z).unwrap().slices()[0];
        assert_eq!(z_slice.geometry.center, [10.0, 0.0, -0.25]);
        assert!(z_slice.geometry.borders);
        assert_eq!(z_slice.plane().unwrap().width(), 4);
    }

    #[test]
    fn create_rejects_mismatched_stacks() {
        let stacks = Reslicer::reslice(&[0.0; 8], [2, 2, 2], 1.0, None, None).unwrap();
        let mut volume = VolumeModel::new();
        let err = volume
            .create([2, 2, 3], [1.0; 3], (0.0, 1.0), stacks)
            .unwrap_err();
        assert_eq!(
            err,
            RangeError::StackExtents {
                expected: [2, 2, 3],
                actual: [2, 2, 2]
            }
        );
        assert!(!volume.is_created());
    }

    #[test]
    fn label_maps_have_no_borders() {
        let stacks = Reslicer::reslice(&[0.0; 8], [2, 2, 2], 1.0, None, None).unwrap();
        let mut label = VolumeModel::new_label_map();
        label.create([2, 2, 2], [1.0; 3], (0.0, 1.0), stacks).unwrap();
        assert!(
            label
                .stack(Axis::Z)
                .unwrap()
                .slices()
                .iter()
                .all(|s| !s.geometry.borders)
        );

        let mut volume = created([2, 2, 2]);
        volume.set_label_map(label);
        assert!(volume.label_map().unwrap().is_label_map());
    }

    #[test]
    fn index_setters_clamp() {
        let mut volume = created([4, 3, 5]);
        volume.set_index_x(100);
        volume.set_index_y(2);
        volume.set_index_z(5);
        assert_eq!(volume.index(Axis::X), 3);
        assert_eq!(volume.index(Axis::Y), 2);
        assert_eq!(volume.index(Axis::Z), 4);
    }

    #[test]
    fn slicing_moves_visibility_on_apply() {
        let mut volume = created([4, 3, 5]);
        volume.apply_pending_changes();
        assert!(!volume.is_dirty());

        volume.set_index_z(4);
        assert_eq!(visible_indices(&volume, Axis::Z), vec![2]);

        volume.apply_pending_changes();
        assert_eq!(visible_indices(&volume, Axis::Z), vec![4]);
        assert_eq!(visible_indices(&volume, Axis::X), vec![1]);
        assert_eq!(volume.visible_slices().count(), 3);
        assert!(volume.current_slice(Axis::Z).unwrap().is_visible());
    }

    #[test]
    fn volume_rendering_round_trip() {
        let mut volume = created([4, 3, 5]);
        volume.apply_pending_changes();

        volume.set_volume_rendering(true);
        assert_eq!(volume.mode(), RenderMode::Slicing);
        volume.apply_pending_changes();
        assert_eq!(volume.mode(), RenderMode::VolumeRendering);
        for axis in Axis::ALL {
            assert!(visible_indices(&volume, axis).is_empty());
        }
        assert!(volume.stack(Axis::X).unwrap().is_visible());
        assert_eq!(volume.visible_slices().count(), 4);

        volume.set_volume_rendering_direction(Axis::Z);
        assert!(!volume.stack(Axis::X).unwrap().is_visible());
        assert!(volume.stack(Axis::Z).unwrap().is_visible());
        assert_eq!(volume.visible_slices().count(), 5);

        volume.set_index_y(0);
        volume.set_volume_rendering(false);
        volume.apply_pending_changes();
        assert_eq!(volume.mode(), RenderMode::Slicing);
        assert!(!volume.stack(Axis::Z).unwrap().is_visible());
        assert_eq!(visible_indices(&volume, Axis::Y), vec![0]);
        assert_eq!(visible_indices(&volume, Axis::Z), vec![2]);
        assert!(!volume.is_dirty());
    }

    #[test]
    fn apply_before_create_is_a_no_op() {
        let mut volume = VolumeModel::new();
        volume.set_volume_rendering(true);
        volume.apply_pending_changes();
        assert_eq!(volume.mode(), RenderMode::Slicing);
        assert!(volume.volume_rendering());
    }
}
