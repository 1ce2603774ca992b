use std::collections::BTreeMap;

use glam::{Quat, Vec3};

use crate::config::SceneConfig;
use crate::model::{Camera, Rgb};

/// Handle to a mesh in the scene graph; stays valid until the mesh is removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(u64);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MeshShape {
    /// Square on the XZ plane through the origin
    Ground { size: f32 },
    Cuboid { half_extents: Vec3 },
    Sphere { radius: f32 },
}

/// What the renderer draws. Dynamic meshes mirror a rigid body's pose.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualMesh {
    pub shape: MeshShape,
    pub position: Vec3,
    pub rotation: Quat,
    pub color: Rgb,
    pub cast_shadow: bool,
}

impl VisualMesh {
    pub fn cuboid(half_extents: Vec3, position: Vec3, color: Rgb) -> Self {
        Self {
            shape: MeshShape::Cuboid { half_extents },
            position,
            rotation: Quat::IDENTITY,
            color,
            cast_shadow: true,
        }
    }

    pub fn sphere(radius: f32, position: Vec3, color: Rgb) -> Self {
        Self {
            shape: MeshShape::Sphere { radius },
            position,
            rotation: Quat::IDENTITY,
            color,
            cast_shadow: true,
        }
    }

    pub fn ground(size: f32, color: Rgb) -> Self {
        Self {
            shape: MeshShape::Ground { size },
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            color,
            cast_shadow: false,
        }
    }
}

/// Scene lighting: an ambient term plus one spot light used as the key light
#[derive(Debug, Clone, Copy)]
pub struct Lighting {
    pub ambient: f32,
    pub key_position: Vec3,
    pub key_target: Vec3,
    pub key_intensity: f32,
    pub fog_near: f32,
    pub fog_far: f32,
}

impl Lighting {
    /// Direction toward the key light
    pub fn key_direction(&self) -> Vec3 {
        (self.key_position - self.key_target).normalize_or_zero()
    }
}

/// Camera, meshes, lights and the aim indicator. Pure data; `view::RenderState` draws it.
pub struct Scene {
    pub camera: Camera,
    pub lighting: Lighting,
    pub clear_color: Rgb,
    meshes: BTreeMap<MeshId, VisualMesh>,
    next_id: u64,
    aim_color: Rgb,
    aim_default: Rgb,
    pub aim_opacity: f32,
    pub aim_radius_fraction: f32,
}

impl Scene {
    pub fn new(config: &SceneConfig, width: u32, height: u32) -> Self {
        let mut scene = Self {
            camera: Camera::new(width, height, config.fov_y_degrees, config.z_near, config.z_far),
            lighting: Lighting {
                ambient: config.ambient,
                key_position: config.spot_position,
                key_target: config.spot_target,
                key_intensity: config.spot_intensity,
                fog_near: config.fog_near,
                fog_far: config.fog_far,
            },
            clear_color: config.clear_color,
            meshes: BTreeMap::new(),
            next_id: 0,
            aim_color: config.aim_color,
            aim_default: config.aim_color,
            aim_opacity: config.aim_opacity,
            aim_radius_fraction: config.aim_radius_fraction,
        };
        scene.add_mesh(VisualMesh::ground(config.ground_size, config.ground_color));
        scene
    }

    pub fn add_mesh(&mut self, mesh: VisualMesh) -> MeshId {
        let id = MeshId(self.next_id);
        self.next_id += 1;
        self.meshes.insert(id, mesh);
        id
    }

    pub fn remove_mesh(&mut self, id: MeshId) -> Option<VisualMesh> {
        self.meshes.remove(&id)
    }

    pub fn mesh(&self, id: MeshId) -> Option<&VisualMesh> {
        self.meshes.get(&id)
    }

    pub fn mesh_mut(&mut self, id: MeshId) -> Option<&mut VisualMesh> {
        self.meshes.get_mut(&id)
    }

    /// In insertion order
    pub fn meshes(&self) -> impl Iterator<Item = (MeshId, &VisualMesh)> {
        self.meshes.iter().map(|(id, mesh)| (*id, mesh))
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    /// `None` restores the default color
    pub fn set_aim_color(&mut self, color: Option<Rgb>) {
        self.aim_color = color.unwrap_or(self.aim_default);
    }

    pub fn aim_color(&self) -> Rgb {
        self.aim_color
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.camera.set_aspect(width, height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_scene_has_ground_only() {
        let scene = Scene::new(&SceneConfig::default(), 800, 600);
        assert_eq!(scene.mesh_count(), 1);
        let (_, ground) = scene.meshes().next().unwrap();
        assert!(matches!(ground.shape, MeshShape::Ground { size } if size == 300.0));
    }

    #[test]
    fn test_add_remove_mesh() {
        let mut scene = Scene::new(&SceneConfig::default(), 800, 600);
        let a = scene.add_mesh(VisualMesh::sphere(0.2, Vec3::ONE, Rgb::from_hex(0xff0000)));
        let b = scene.add_mesh(VisualMesh::sphere(0.2, Vec3::ZERO, Rgb::from_hex(0x00ff00)));
        assert_ne!(a, b);
        assert_eq!(scene.remove_mesh(a).map(|m| m.position), Some(Vec3::ONE));
        assert!(scene.mesh(a).is_none());
        assert!(scene.remove_mesh(a).is_none());
        assert!(scene.mesh(b).is_some());
        assert_eq!(scene.mesh_count(), 2);
    }

    #[test]
    fn test_aim_color_defaults_when_cleared() {
        let config = SceneConfig::default();
        let mut scene = Scene::new(&config, 800, 600);
        scene.set_aim_color(Some(Rgb::from_hex(0xccff33)));
        assert_eq!(scene.aim_color().to_hex(), 0xccff33);
        scene.set_aim_color(None);
        assert_eq!(scene.aim_color(), config.aim_color);
    }

    #[test]
    fn test_resize_updates_aspect() {
        let mut scene = Scene::new(&SceneConfig::default(), 800, 600);
        scene.resize(1920, 1080);
        assert!((scene.camera.aspect - 16.0 / 9.0).abs() < 1e-6);
    }
}
