use bytemuck::NoUninit;
use wgpu::util::DeviceExt;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, NoUninit)]
pub struct Vertex {
    pub pos: [f32; 3],
    pub normal: [f32; 3],
}

pub struct MeshBuffer {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
}

/// CPU-side geometry. Every primitive is unit-sized and centred on the origin;
/// the per-instance model matrix scales it to the body it draws.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn upload(&self, device: &wgpu::Device, label: &str) -> MeshBuffer {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} vertices")),
            contents: bytemuck::cast_slice(&self.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} indices")),
            contents: bytemuck::cast_slice(&self.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        MeshBuffer {
            vertex_buffer,
            index_buffer,
            index_count: self.indices.len() as u32,
        }
    }

    /// Cube spanning -1..1 on every axis, so scaling by half extents gives the box
    pub fn unit_cube() -> Self {
        // (normal, tangent u, tangent v) per face, u x v == normal
        let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
            ([1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
            ([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([0.0, 0.0, -1.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]),
        ];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (n, u, v) in faces {
            let base = vertices.len() as u32;
            for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                let pos = [
                    n[0] + u[0] * su + v[0] * sv,
                    n[1] + u[1] * su + v[1] * sv,
                    n[2] + u[2] * su + v[2] * sv,
                ];
                vertices.push(Vertex { pos, normal: n });
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
        }

        Self { vertices, indices }
    }

    /// Unit-radius UV sphere
    pub fn uv_sphere(segments: u32, rings: u32) -> Self {
        let segments = segments.max(3);
        let rings = rings.max(2);
        let mut vertices = Vec::with_capacity(((segments + 1) * (rings + 1)) as usize);
        let mut indices = Vec::with_capacity((segments * rings * 6) as usize);

        for ring in 0..=rings {
            let theta = ring as f32 / rings as f32 * std::f32::consts::PI;
            let (sin_t, cos_t) = theta.sin_cos();
            for seg in 0..=segments {
                let phi = seg as f32 / segments as f32 * std::f32::consts::TAU;
                let (sin_p, cos_p) = phi.sin_cos();
                let p = [sin_t * cos_p, cos_t, sin_t * sin_p];
                vertices.push(Vertex { pos: p, normal: p });
            }
        }

        let stride = segments + 1;
        for ring in 0..rings {
            for seg in 0..segments {
                let a = ring * stride + seg;
                let b = a + stride;
                // counter-clockwise seen from outside
                indices.extend_from_slice(&[a, a + 1, b, b, a + 1, b + 1]);
            }
        }

        Self { vertices, indices }
    }

    /// Upward-facing square spanning -1..1 on X and Z
    pub fn ground_plane() -> Self {
        let normal = [0.0, 1.0, 0.0];
        let vertices = vec![
            Vertex { pos: [-1.0, 0.0, -1.0], normal },
            Vertex { pos: [-1.0, 0.0, 1.0], normal },
            Vertex { pos: [1.0, 0.0, 1.0], normal },
            Vertex { pos: [1.0, 0.0, -1.0], normal },
        ];
        Self { vertices, indices: vec![0, 1, 2, 2, 3, 0] }
    }
}
