use std::ops::Range;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use wgpu::*;

use crate::model::{MeshShape, Rgb, Scene};
use crate::view::mesh::{Mesh, MeshBuffer, Vertex};

pub const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
    pub eye: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct LightingUniform {
    pub key: [f32; 4],
    pub fog_color: [f32; 4],
    pub fog_range: [f32; 4],
}

/// Per-instance model matrix (column-major) and colour
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceData {
    pub model: [[f32; 4]; 4],
    pub color: [f32; 4],
}

/// Which shared primitive an instance is drawn with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Ground,
    Cube,
    Sphere,
}

const PRIMITIVES: [Primitive; 3] = [Primitive::Ground, Primitive::Cube, Primitive::Sphere];

/// Instances grouped by primitive, one contiguous range each
#[derive(Debug, Default)]
pub struct InstanceBatches {
    pub instances: Vec<InstanceData>,
    pub ranges: Vec<(Primitive, Range<u32>)>,
}

fn surface_color(color: Rgb, srgb_target: bool) -> [f32; 4] {
    if srgb_target {
        color.to_linear(1.0)
    } else {
        [color.r as f32 / 255.0, color.g as f32 / 255.0, color.b as f32 / 255.0, 1.0]
    }
}

fn primitive_and_scale(shape: MeshShape) -> (Primitive, Vec3) {
    match shape {
        MeshShape::Ground { size } => (Primitive::Ground, Vec3::new(size / 2.0, 1.0, size / 2.0)),
        MeshShape::Cuboid { half_extents } => (Primitive::Cube, half_extents),
        MeshShape::Sphere { radius } => (Primitive::Sphere, Vec3::splat(radius)),
    }
}

/// Flatten the scene's meshes into instance data, batched by primitive
pub fn build_instances(scene: &Scene, srgb_target: bool) -> InstanceBatches {
    let mut batches = InstanceBatches::default();
    for primitive in PRIMITIVES {
        let start = batches.instances.len() as u32;
        for (_, mesh) in scene.meshes() {
            let (kind, scale) = primitive_and_scale(mesh.shape);
            if kind != primitive {
                continue;
            }
            let model = Mat4::from_scale_rotation_translation(scale, mesh.rotation, mesh.position);
            batches.instances.push(InstanceData {
                model: model.to_cols_array_2d(),
                color: surface_color(mesh.color, srgb_target),
            });
        }
        let end = batches.instances.len() as u32;
        if end > start {
            batches.ranges.push((primitive, start..end));
        }
    }
    batches
}

pub struct CameraResources {
    pub camera_buffer: Buffer,
    pub lighting_buffer: Buffer,
    pub bind_group_layout: BindGroupLayout,
    pub bind_group: BindGroup,
}

pub fn create_depth_texture(device: &Device, width: u32, height: u32) -> (Texture, TextureView) {
    let depth_texture = device.create_texture(&TextureDescriptor {
        label: Some("depth_texture"),
        size: Extent3d { width: width.max(1), height: height.max(1), depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let depth_view = depth_texture.create_view(&TextureViewDescriptor::default());
    (depth_texture, depth_view)
}

pub fn create_camera_resources(device: &Device) -> CameraResources {
    let camera_buffer = device.create_buffer(&BufferDescriptor {
        label: Some("camera_buffer"),
        size: std::mem::size_of::<CameraUniform>() as BufferAddress,
        usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let lighting_buffer = device.create_buffer(&BufferDescriptor {
        label: Some("lighting_buffer"),
        size: std::mem::size_of::<LightingUniform>() as BufferAddress,
        usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let uniform_entry = |binding| BindGroupLayoutEntry {
        binding,
        visibility: ShaderStages::VERTEX | ShaderStages::FRAGMENT,
        ty: BindingType::Buffer {
            ty: BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    };
    let bind_group_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
        label: Some("camera_bind_group_layout"),
        entries: &[uniform_entry(0), uniform_entry(1)],
    });

    let bind_group = device.create_bind_group(&BindGroupDescriptor {
        label: Some("camera_bind_group"),
        layout: &bind_group_layout,
        entries: &[
            BindGroupEntry { binding: 0, resource: camera_buffer.as_entire_binding() },
            BindGroupEntry { binding: 1, resource: lighting_buffer.as_entire_binding() },
        ],
    });

    CameraResources { camera_buffer, lighting_buffer, bind_group_layout, bind_group }
}

pub fn create_mesh_pipeline(device: &Device, format: TextureFormat, bind_group_layout: &BindGroupLayout) -> RenderPipeline {
    let shader = device.create_shader_module(ShaderModuleDescriptor {
        label: Some("mesh_shader"),
        source: ShaderSource::Wgsl(include_str!("shaders/mesh.wgsl").into()),
    });

    let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
        label: Some("mesh_pipeline_layout"),
        bind_group_layouts: &[bind_group_layout],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&RenderPipelineDescriptor {
        label: Some("mesh_pipeline"),
        layout: Some(&pipeline_layout),
        vertex: VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[
                VertexBufferLayout {
                    array_stride: std::mem::size_of::<Vertex>() as BufferAddress,
                    step_mode: VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3],
                },
                VertexBufferLayout {
                    array_stride: std::mem::size_of::<InstanceData>() as BufferAddress,
                    step_mode: VertexStepMode::Instance,
                    attributes: &wgpu::vertex_attr_array![
                        2 => Float32x4,
                        3 => Float32x4,
                        4 => Float32x4,
                        5 => Float32x4,
                        6 => Float32x4,
                    ],
                },
            ],
            compilation_options: Default::default(),
        },
        fragment: Some(FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(ColorTargetState { format, blend: Some(BlendState::REPLACE), write_mask: ColorWrites::ALL })],
            compilation_options: Default::default(),
        }),
        primitive: PrimitiveState {
            topology: PrimitiveTopology::TriangleList,
            front_face: FrontFace::Ccw,
            cull_mode: Some(Face::Back),
            ..Default::default()
        },
        depth_stencil: Some(DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: CompareFunction::Less,
            stencil: StencilState::default(),
            bias: DepthBiasState::default(),
        }),
        multisample: MultisampleState { count: 1, mask: !0, alpha_to_coverage_enabled: false },
        multiview: None,
        cache: None,
    })
}

/// egui output for one frame, tessellated and ready to paint
pub struct UiFrame {
    pub primitives: Vec<egui::ClippedPrimitive>,
    pub textures_delta: egui::TexturesDelta,
    pub pixels_per_point: f32,
}

/// All GPU state needed to draw a `Scene` plus the egui overlay
pub struct RenderState {
    pub format: TextureFormat,
    pub alpha_mode: CompositeAlphaMode,
    pub width: u32,
    pub height: u32,

    pipeline: RenderPipeline,
    camera: CameraResources,
    depth_view: TextureView,

    ground_mesh: MeshBuffer,
    cube_mesh: MeshBuffer,
    sphere_mesh: MeshBuffer,

    instance_buffer: Buffer,
    instance_capacity: usize,
    batches: Vec<(Primitive, Range<u32>)>,

    pub egui_renderer: egui_wgpu::Renderer,
}

const INITIAL_INSTANCES: usize = 128;

fn create_instance_buffer(device: &Device, capacity: usize) -> Buffer {
    device.create_buffer(&BufferDescriptor {
        label: Some("instance_buffer"),
        size: (capacity * std::mem::size_of::<InstanceData>()) as BufferAddress,
        usage: BufferUsages::VERTEX | BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

impl RenderState {
    pub fn new(device: &Device, format: TextureFormat, alpha_mode: CompositeAlphaMode, width: u32, height: u32) -> Self {
        let camera = create_camera_resources(device);
        let pipeline = create_mesh_pipeline(device, format, &camera.bind_group_layout);
        let (_, depth_view) = create_depth_texture(device, width, height);

        Self {
            format,
            alpha_mode,
            width,
            height,
            pipeline,
            camera,
            depth_view,
            ground_mesh: Mesh::ground_plane().upload(device, "ground"),
            cube_mesh: Mesh::unit_cube().upload(device, "cube"),
            sphere_mesh: Mesh::uv_sphere(32, 16).upload(device, "sphere"),
            instance_buffer: create_instance_buffer(device, INITIAL_INSTANCES),
            instance_capacity: INITIAL_INSTANCES,
            batches: Vec::new(),
            egui_renderer: egui_wgpu::Renderer::new(device, format, egui_wgpu::RendererOptions::default()),
        }
    }

    fn surface_config(&self) -> SurfaceConfiguration {
        SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format: self.format,
            width: self.width,
            height: self.height,
            present_mode: PresentMode::Fifo,
            alpha_mode: self.alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        }
    }

    /// Reconfigure the surface and depth buffer. No-op if the size is unchanged or zero.
    pub fn resize(&mut self, device: &Device, surface: &Surface, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 || (width == self.width && height == self.height) {
            return false;
        }
        self.width = width;
        self.height = height;
        surface.configure(device, &self.surface_config());
        self.depth_view = create_depth_texture(device, width, height).1;
        tracing::debug!(width, height, "surface resized");
        true
    }

    /// Upload camera, lighting and every mesh instance for this frame
    pub fn prepare(&mut self, device: &Device, queue: &Queue, scene: &Scene) {
        let srgb = self.format.is_srgb();
        let camera = &scene.camera;
        let camera_uniform = CameraUniform {
            view_proj: camera.view_proj().to_cols_array_2d(),
            eye: camera.eye.extend(1.0).to_array(),
        };
        queue.write_buffer(&self.camera.camera_buffer, 0, bytemuck::bytes_of(&camera_uniform));

        let lighting = &scene.lighting;
        let key = lighting.key_direction();
        let fog = surface_color(scene.clear_color, srgb);
        let lighting_uniform = LightingUniform {
            key: [key.x, key.y, key.z, lighting.key_intensity],
            fog_color: [fog[0], fog[1], fog[2], lighting.ambient],
            fog_range: [lighting.fog_near, lighting.fog_far, 0.0, 0.0],
        };
        queue.write_buffer(&self.camera.lighting_buffer, 0, bytemuck::bytes_of(&lighting_uniform));

        let batches = build_instances(scene, srgb);
        if batches.instances.len() > self.instance_capacity {
            self.instance_capacity = batches.instances.len().next_power_of_two();
            self.instance_buffer = create_instance_buffer(device, self.instance_capacity);
            tracing::debug!(capacity = self.instance_capacity, "grew instance buffer");
        }
        queue.write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&batches.instances));
        self.batches = batches.ranges;
    }

    fn mesh_for(&self, primitive: Primitive) -> &MeshBuffer {
        match primitive {
            Primitive::Ground => &self.ground_mesh,
            Primitive::Cube => &self.cube_mesh,
            Primitive::Sphere => &self.sphere_mesh,
        }
    }

    /// Draw the prepared scene, then the UI on top. A lost or outdated surface is
    /// reconfigured and the frame skipped.
    pub fn draw_frame(&mut self, device: &Device, queue: &Queue, surface: &Surface, clear_color: Rgb, ui: UiFrame) {
        let frame = match surface.get_current_texture() {
            Ok(frame) => frame,
            Err(SurfaceError::Lost | SurfaceError::Outdated) => {
                surface.configure(device, &self.surface_config());
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "skipping frame");
                return;
            }
        };

        let view = frame.texture.create_view(&TextureViewDescriptor::default());
        let mut encoder = device.create_command_encoder(&CommandEncoderDescriptor { label: Some("encoder") });

        let clear = surface_color(clear_color, self.format.is_srgb());
        {
            let mut rp = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("scene_pass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(Color {
                            r: clear[0] as f64,
                            g: clear[1] as f64,
                            b: clear[2] as f64,
                            a: 1.0,
                        }),
                        store: StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(Operations { load: LoadOp::Clear(1.0), store: StoreOp::Store }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            rp.set_pipeline(&self.pipeline);
            rp.set_bind_group(0, &self.camera.bind_group, &[]);
            rp.set_vertex_buffer(1, self.instance_buffer.slice(..));
            for (primitive, range) in &self.batches {
                let mesh = self.mesh_for(*primitive);
                rp.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                rp.set_index_buffer(mesh.index_buffer.slice(..), IndexFormat::Uint32);
                rp.draw_indexed(0..mesh.index_count, 0, range.clone());
            }
        }

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.width, self.height],
            pixels_per_point: ui.pixels_per_point,
        };

        for (id, image_delta) in &ui.textures_delta.set {
            self.egui_renderer.update_texture(device, queue, *id, image_delta);
        }
        self.egui_renderer
            .update_buffers(device, queue, &mut encoder, &ui.primitives, &screen_descriptor);

        {
            let egui_pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("egui_render_pass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: Operations { load: LoadOp::Load, store: StoreOp::Store },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            self.egui_renderer
                .render(&mut egui_pass.forget_lifetime(), &ui.primitives, &screen_descriptor);
        }

        for id in &ui.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }

        queue.submit(std::iter::once(encoder.finish()));
        frame.present();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SceneConfig;
    use crate::model::VisualMesh;
    use glam::Quat;

    #[test]
    fn test_instances_batch_by_primitive() {
        let mut scene = Scene::new(&SceneConfig::default(), 800, 600);
        let red = Rgb::from_hex(0xff0000);
        scene.add_mesh(VisualMesh::sphere(0.2, Vec3::ONE, red));
        scene.add_mesh(VisualMesh::cuboid(Vec3::ONE, Vec3::ZERO, red));
        scene.add_mesh(VisualMesh::sphere(0.2, Vec3::ZERO, red));

        let batches = build_instances(&scene, false);
        assert_eq!(batches.instances.len(), 4);
        assert_eq!(
            batches.ranges,
            vec![(Primitive::Ground, 0..1), (Primitive::Cube, 1..2), (Primitive::Sphere, 2..4)]
        );
        assert_eq!(batches.instances[2].color, [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_instance_model_scales_unit_primitive() {
        let mut scene = Scene::new(&SceneConfig::default(), 800, 600);
        let rotation = Quat::from_rotation_y(0.5);
        let id = scene.add_mesh(VisualMesh::sphere(0.2, Vec3::new(1.0, 2.0, 3.0), Rgb::from_hex(0xffffff)));
        scene.mesh_mut(id).unwrap().rotation = rotation;

        let batches = build_instances(&scene, true);
        let model = Mat4::from_cols_array_2d(&batches.instances[1].model);
        // a point on the unit sphere lands at radius 0.2 around the body
        let p = model.transform_point3(Vec3::X);
        assert!(((p - Vec3::new(1.0, 2.0, 3.0)).length() - 0.2).abs() < 1e-5);

        let ground = Mat4::from_cols_array_2d(&batches.instances[0].model);
        assert!(ground.transform_point3(Vec3::new(1.0, 0.0, 1.0)).abs_diff_eq(Vec3::new(150.0, 0.0, 150.0), 1e-4));
    }
}
