//! GPU-resident tetra batch
//!
//! Uploads a [`TetraBatchData`] into four vertex streams plus an indirect
//! command table:
//!
//! | Slot | Step | Content | Locations |
//! |---|---|---|---|
//! | 0 | vertex | exploded face positions | 0 |
//! | 1 | vertex | face normals | 1 |
//! | 2 | instance | cell centroid | 2 |
//! | 3 | instance | cell model matrix | 3..=6 |
//!
//! Each indirect command selects its cell's instance row through
//! `first_instance`. With `MULTI_DRAW_INDIRECT` the whole mesh is one
//! `multi_draw_indirect` call; [`DrawStrategy`] covers devices without it.

use std::mem::size_of;

use tetra_core::{DrawIndirectArgs, TetraBatchData, VERTICES_PER_CELL};
use tetra_math::{Mat4, Vec3};
use wgpu::util::DeviceExt;

use crate::scope::try_create;
use crate::RenderError;

const POSITION_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];
const NORMAL_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![1 => Float32x3];
const CENTROID_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![2 => Float32x3];
const MODEL_ATTRIBUTES: [wgpu::VertexAttribute; 4] =
    wgpu::vertex_attr_array![3 => Float32x4, 4 => Float32x4, 5 => Float32x4, 6 => Float32x4];

/// Byte stride of one indirect command
pub const DRAW_COMMAND_SIZE: wgpu::BufferAddress = size_of::<DrawIndirectArgs>() as wgpu::BufferAddress;

/// How a batch is submitted, chosen from the device's features
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawStrategy {
    /// One `multi_draw_indirect` over the whole command table
    MultiDrawIndirect,
    /// One `draw_indirect` per command
    Indirect,
    /// One direct `draw` per cell with the ranges the table holds
    Direct,
}

struct BatchBuffers {
    positions: wgpu::Buffer,
    normals: wgpu::Buffer,
    centroids: wgpu::Buffer,
    model_matrices: wgpu::Buffer,
    draw_commands: wgpu::Buffer,
}

/// Buffers of one uploaded batch
///
/// An empty batch holds no buffers and draws nothing.
#[derive(Default)]
pub struct TetraBatch {
    buffers: Option<BatchBuffers>,
    model_matrices: Vec<Mat4>,
    cell_count: u32,
    dirty: bool,
}

impl TetraBatch {
    /// A batch that draws nothing
    pub fn empty() -> Self {
        Self::default()
    }

    /// Upload batch data
    ///
    /// Empty data yields an empty batch. Allocation failures are reported and
    /// leave nothing allocated.
    pub fn upload(device: &wgpu::Device, data: &TetraBatchData) -> Result<Self, RenderError> {
        if data.is_empty() {
            log::info!("Uploaded empty tetra batch");
            return Ok(Self::empty());
        }

        let cell_count = u32::try_from(data.cell_count()).map_err(|_| RenderError::Allocation {
            what: "tetra batch".to_string(),
            reason: format!("{} cells exceed the indirect draw range", data.cell_count()),
        })?;

        let buffers = try_create(device, "tetra batch", || {
            let vertex = |label, contents: &[u8], usage| {
                device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(label),
                    contents,
                    usage,
                })
            };
            BatchBuffers {
                positions: vertex(
                    "Tetra Positions",
                    bytemuck::cast_slice(&data.vertices),
                    wgpu::BufferUsages::VERTEX,
                ),
                normals: vertex(
                    "Tetra Normals",
                    bytemuck::cast_slice(&data.normals),
                    wgpu::BufferUsages::VERTEX,
                ),
                centroids: vertex(
                    "Tetra Centroids",
                    bytemuck::cast_slice(&data.centroids),
                    wgpu::BufferUsages::VERTEX,
                ),
                model_matrices: vertex(
                    "Tetra Model Matrices",
                    bytemuck::cast_slice(&data.model_matrices),
                    wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                ),
                draw_commands: vertex(
                    "Tetra Draw Commands",
                    bytemuck::cast_slice(&data.draw_commands),
                    wgpu::BufferUsages::INDIRECT,
                ),
            }
        })?;

        log::info!(
            "Uploaded tetra batch: {} cells, {} vertices",
            cell_count,
            data.vertices.len()
        );

        Ok(Self {
            buffers: Some(buffers),
            model_matrices: data.model_matrices.clone(),
            cell_count,
            dirty: false,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_none()
    }

    pub fn cell_count(&self) -> usize {
        self.cell_count as usize
    }

    pub fn model_matrix(&self, index: usize) -> Option<&Mat4> {
        self.model_matrices.get(index)
    }

    /// Replace one cell's model matrix
    ///
    /// Takes effect on the next [`upload_model_matrices`](Self::upload_model_matrices).
    pub fn set_model_matrix(&mut self, index: usize, matrix: Mat4) {
        match self.model_matrices.get_mut(index) {
            Some(slot) => {
                *slot = matrix;
                self.dirty = true;
            }
            None => log::warn!(
                "Model matrix index {} out of range ({} cells), ignored",
                index,
                self.cell_count
            ),
        }
    }

    /// Write edited model matrices to the GPU
    ///
    /// Returns whether anything was written.
    pub fn upload_model_matrices(&mut self, queue: &wgpu::Queue) -> bool {
        if !self.dirty {
            return false;
        }
        self.dirty = false;
        match &self.buffers {
            Some(buffers) => {
                queue.write_buffer(
                    &buffers.model_matrices,
                    0,
                    bytemuck::cast_slice(&self.model_matrices),
                );
                true
            }
            None => false,
        }
    }

    /// Record every cell into `pass`
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>, strategy: DrawStrategy) {
        let Some(buffers) = &self.buffers else {
            return;
        };

        pass.set_vertex_buffer(0, buffers.positions.slice(..));
        pass.set_vertex_buffer(1, buffers.normals.slice(..));
        pass.set_vertex_buffer(2, buffers.centroids.slice(..));
        pass.set_vertex_buffer(3, buffers.model_matrices.slice(..));

        match strategy {
            DrawStrategy::MultiDrawIndirect => {
                pass.multi_draw_indirect(&buffers.draw_commands, 0, self.cell_count);
            }
            DrawStrategy::Indirect => {
                for cell in 0..self.cell_count {
                    pass.draw_indirect(
                        &buffers.draw_commands,
                        cell as wgpu::BufferAddress * DRAW_COMMAND_SIZE,
                    );
                }
            }
            DrawStrategy::Direct => {
                for cell in 0..self.cell_count {
                    let args = DrawIndirectArgs::for_cell(cell);
                    pass.draw(
                        args.first_vertex..args.first_vertex + args.vertex_count,
                        args.first_instance..args.first_instance + args.instance_count,
                    );
                }
            }
        }
    }

    /// Vertex buffer layouts consumed by the tetra G-buffer program
    pub fn vertex_layouts() -> [wgpu::VertexBufferLayout<'static>; 4] {
        [
            wgpu::VertexBufferLayout {
                array_stride: size_of::<Vec3>() as wgpu::BufferAddress,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &POSITION_ATTRIBUTES,
            },
            wgpu::VertexBufferLayout {
                array_stride: size_of::<Vec3>() as wgpu::BufferAddress,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &NORMAL_ATTRIBUTES,
            },
            wgpu::VertexBufferLayout {
                array_stride: size_of::<Vec3>() as wgpu::BufferAddress,
                step_mode: wgpu::VertexStepMode::Instance,
                attributes: &CENTROID_ATTRIBUTES,
            },
            wgpu::VertexBufferLayout {
                array_stride: size_of::<Mat4>() as wgpu::BufferAddress,
                step_mode: wgpu::VertexStepMode::Instance,
                attributes: &MODEL_ATTRIBUTES,
            },
        ]
    }

    /// Vertices covered by one indirect command
    pub const VERTICES_PER_DRAW: u32 = VERTICES_PER_CELL as u32;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tetra_math::mat4;

    #[test]
    fn test_vertex_layout_strides() {
        let [positions, normals, centroids, models] = TetraBatch::vertex_layouts();
        assert_eq!(positions.array_stride, 12);
        assert_eq!(normals.array_stride, 12);
        assert_eq!(centroids.array_stride, 12);
        assert_eq!(models.array_stride, 64);
        assert_eq!(centroids.step_mode, wgpu::VertexStepMode::Instance);
        assert_eq!(models.step_mode, wgpu::VertexStepMode::Instance);
    }

    #[test]
    fn test_model_matrix_columns() {
        let offsets: Vec<u64> = MODEL_ATTRIBUTES.iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 16, 32, 48]);
        assert_eq!(MODEL_ATTRIBUTES[0].shader_location, 3);
    }

    #[test]
    fn test_empty_batch() {
        let batch = TetraBatch::empty();
        assert!(batch.is_empty());
        assert_eq!(batch.cell_count(), 0);
        assert!(batch.model_matrix(0).is_none());
    }

    #[test]
    fn test_set_model_matrix_out_of_range() {
        let mut batch = TetraBatch::empty();
        batch.set_model_matrix(3, mat4::IDENTITY);
        assert!(!batch.dirty);
    }

    #[test]
    fn test_set_model_matrix_marks_dirty() {
        let mut batch = TetraBatch {
            model_matrices: vec![mat4::IDENTITY; 2],
            cell_count: 2,
            ..Default::default()
        };
        let m = mat4::translation(Vec3::new(1.0, 0.0, 0.0));
        batch.set_model_matrix(1, m);
        assert!(batch.dirty);
        assert_eq!(batch.model_matrix(1), Some(&m));
        assert_eq!(batch.model_matrix(0), Some(&mat4::IDENTITY));
    }

    #[test]
    fn test_draw_command_stride() {
        assert_eq!(DRAW_COMMAND_SIZE, 16);
        // Cell i's command starts i strides into the table
        let table = [DrawIndirectArgs::for_cell(0), DrawIndirectArgs::for_cell(1)];
        let bytes: &[u8] = bytemuck::cast_slice(&table);
        let second: &[DrawIndirectArgs] =
            bytemuck::cast_slice(&bytes[DRAW_COMMAND_SIZE as usize..]);
        assert_eq!(second[0], DrawIndirectArgs::for_cell(1));
    }

    #[test]
    fn test_draw_ranges_match_table() {
        assert_eq!(TetraBatch::VERTICES_PER_DRAW, 12);
        let args = DrawIndirectArgs::for_cell(5);
        assert_eq!(args.first_vertex, 5 * TetraBatch::VERTICES_PER_DRAW);
        assert_eq!(args.first_instance, 5);
    }
}
