use std::collections::BTreeMap;

use glam::{Vec2, Vec3};
use rand::Rng;

use crate::{Result, SceneError};

/// Vertex data for a mesh.
///
/// Plane geometry is generated in full. Geometry that comes from a model file
/// only records its vertex count.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    vertex_count: usize,
    positions: Vec<Vec3>,
    uvs: Vec<Vec2>,
    attributes: BTreeMap<String, Vec<f32>>,
}

/// Upper bound on plane segments along either axis.
pub const MAX_PLANE_SEGMENTS: u32 = 4096;

impl Geometry {
    /// Grid of `(width_segments + 1) * (height_segments + 1)` vertices in the
    /// XY plane, centred on the origin, rows running top to bottom.
    ///
    /// Segment counts above [`MAX_PLANE_SEGMENTS`] are rejected.
    pub fn plane(width: f32, height: f32, width_segments: u32, height_segments: u32) -> Result<Self> {
        if width_segments > MAX_PLANE_SEGMENTS || height_segments > MAX_PLANE_SEGMENTS {
            return Err(SceneError::msg(format!(
                "plane of {width_segments}x{height_segments} segments exceeds {MAX_PLANE_SEGMENTS} per side"
            )));
        }
        let grid_x = width_segments.max(1);
        let grid_y = height_segments.max(1);
        let segment_width = width / grid_x as f32;
        let segment_height = height / grid_y as f32;

        let capacity = (grid_x as usize + 1) * (grid_y as usize + 1);
        let mut positions = Vec::with_capacity(capacity);
        let mut uvs = Vec::with_capacity(capacity);

        for iy in 0..=grid_y {
            let y = iy as f32 * segment_height - height / 2.0;
            for ix in 0..=grid_x {
                let x = ix as f32 * segment_width - width / 2.0;
                positions.push(Vec3::new(x, -y, 0.0));
                uvs.push(Vec2::new(
                    ix as f32 / grid_x as f32,
                    1.0 - iy as f32 / grid_y as f32,
                ));
            }
        }

        Ok(Self {
            vertex_count: positions.len(),
            positions,
            uvs,
            attributes: BTreeMap::new(),
        })
    }

    /// Geometry whose buffers live outside this crate.
    pub fn external(vertex_count: usize) -> Self {
        Self {
            vertex_count,
            positions: Vec::new(),
            uvs: Vec::new(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn uvs(&self) -> &[Vec2] {
        &self.uvs
    }

    /// Attaches a one-component per-vertex attribute.
    pub fn set_attribute(&mut self, name: impl Into<String>, values: Vec<f32>) -> Result<()> {
        let name = name.into();
        if values.len() != self.vertex_count {
            return Err(SceneError::msg(format!(
                "attribute `{name}` has {} values for {} vertices",
                values.len(),
                self.vertex_count
            )));
        }

        self.attributes.insert(name, values);
        Ok(())
    }

    pub fn attribute(&self, name: &str) -> Option<&[f32]> {
        self.attributes.get(name).map(Vec::as_slice)
    }
}

/// One independent uniform draw in `[0, 1)` per vertex.
pub fn random_attribute<R: Rng>(count: usize, rng: &mut R) -> Vec<f32> {
    (0..count).map(|_| rng.gen::<f32>()).collect()
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    #[test]
    fn plane_has_grid_vertex_count() {
        let plane = Geometry::plane(1.0, 1.0, 32, 32).unwrap();
        assert_eq!(plane.vertex_count(), 33 * 33);
        assert_eq!(plane.positions().len(), plane.uvs().len());
    }

    #[test]
    fn oversized_planes_are_rejected() {
        assert!(Geometry::plane(1.0, 1.0, u32::MAX, u32::MAX).is_err());
        assert!(Geometry::plane(1.0, 1.0, 8, MAX_PLANE_SEGMENTS + 1).is_err());
        let edge = Geometry::plane(1.0, 1.0, MAX_PLANE_SEGMENTS, 1).unwrap();
        assert_eq!(edge.vertex_count(), (MAX_PLANE_SEGMENTS as usize + 1) * 2);
    }

    #[test]
    fn plane_spans_its_extent() {
        let plane = Geometry::plane(2.0, 4.0, 2, 2).unwrap();
        let positions = plane.positions();

        assert_eq!(positions[0], Vec3::new(-1.0, 2.0, 0.0));
        assert_eq!(positions[positions.len() - 1], Vec3::new(1.0, -2.0, 0.0));
        assert_eq!(plane.uvs()[0], Vec2::new(0.0, 1.0));
        assert_eq!(plane.uvs()[positions.len() - 1], Vec2::new(1.0, 0.0));
    }

    #[test]
    fn random_attribute_stays_in_unit_interval() {
        let mut rng = StdRng::seed_from_u64(11);
        for count in [0, 1, 1089, 5000] {
            let values = random_attribute(count, &mut rng);
            assert_eq!(values.len(), count);
            assert!(values.iter().all(|value| (0.0..1.0).contains(value)));
        }
    }

    #[test]
    fn rejects_attribute_of_wrong_length() {
        let mut plane = Geometry::plane(1.0, 1.0, 1, 1).unwrap();
        assert!(plane.set_attribute("aRandom", vec![0.5; 3]).is_err());
        plane.set_attribute("aRandom", vec![0.5; 4]).unwrap();
        assert_eq!(plane.attribute("aRandom").unwrap().len(), 4);
    }
}
