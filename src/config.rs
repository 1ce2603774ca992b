use glam::Vec3;

use crate::controller::KeyBindings;
use crate::model::Rgb;

/// Everything tunable about the playground, grouped by the part that reads it.
#[derive(Debug, Clone, Default)]
pub struct PlaygroundConfig {
    pub physics: PhysicsConfig,
    pub shoot: ShootConfig,
    pub recoil: RecoilConfig,
    pub controls: ControlConfig,
    pub scene: SceneConfig,
}

/// World setup: gravity, the player sphere and the box field
#[derive(Debug, Clone)]
pub struct PhysicsConfig {
    pub gravity: Vec3,
    /// Fixed simulation sub-step in seconds, advanced once per frame
    pub timestep: f32,
    pub player_radius: f32,
    pub player_mass: f32,
    pub player_start: Vec3,
    /// Fraction of the player's velocity lost per second
    pub player_linear_damping: f32,
    pub box_half_extent: f32,
    pub box_mass: f32,
    /// Side length of the square the boxes are scattered in, centred on the origin
    pub box_spawn_extent: f32,
    /// Height of the band boxes are dropped in, centred on `box_spawn_height`
    pub box_spawn_jitter: f32,
    pub box_spawn_height: f32,
    pub box_count: usize,
    /// Contact material for every pair except player against ground, which is slippery and dead
    pub contact_friction: f32,
    pub contact_restitution: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -20.0, 0.0),
            timestep: 1.0 / 60.0,
            player_radius: 1.3,
            player_mass: 1.0,
            player_start: Vec3::new(0.0, 5.0, 0.0),
            player_linear_damping: 0.9,
            box_half_extent: 1.0,
            box_mass: 3.0,
            box_spawn_extent: 20.0,
            box_spawn_jitter: 1.0,
            box_spawn_height: 1.0,
            box_count: 3,
            contact_friction: 0.3,
            contact_restitution: 0.3,
        }
    }
}

impl PhysicsConfig {
    /// Rapier damping coefficient that loses `player_linear_damping` of the
    /// velocity each second at the configured `timestep`
    pub fn player_damping_coefficient(&self) -> f32 {
        let kept_per_step = (1.0 - self.player_linear_damping)
            .max(f32::EPSILON)
            .powf(self.timestep);
        (1.0 / kept_per_step - 1.0) / self.timestep
    }
}

/// Charge-and-release projectile settings
#[derive(Debug, Clone)]
pub struct ShootConfig {
    /// Energy is converted 1:1 into launch speed up to this cap
    pub max_velocity: f32,
    pub ball_radius: f32,
    pub ball_mass: f32,
    pub max_balls: usize,
    /// Balls spawn at `player_radius * spawn_clearance + ball_radius` from the player centre
    pub spawn_clearance: f32,
    pub base_color: Rgb,
    pub charged_color: Rgb,
}

impl Default for ShootConfig {
    fn default() -> Self {
        Self {
            max_velocity: 30.0,
            ball_radius: 0.2,
            ball_mass: 1.0,
            max_balls: 100,
            spawn_clearance: 1.02,
            base_color: Rgb::from_hex(0x999933),
            charged_color: Rgb::from_hex(0xccff33),
        }
    }
}

/// Camera kick after a shot. The numbers have no physical meaning, they just feel right.
#[derive(Debug, Clone)]
pub struct RecoilConfig {
    pub divisor: i32,
    pub pitch_per_unit: f32,
    pub rebound: f32,
}

impl Default for RecoilConfig {
    fn default() -> Self {
        Self {
            divisor: 3,
            pitch_per_unit: 0.001,
            rebound: -0.9,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ControlConfig {
    pub mouse_sensitivity: f32,
    pub velocity_factor: f32,
    pub jump_velocity: f32,
    pub bindings: KeyBindings,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            mouse_sensitivity: 0.002,
            velocity_factor: 0.2,
            jump_velocity: 20.0,
            bindings: KeyBindings::default(),
        }
    }
}

/// Camera, lights and static scenery
#[derive(Debug, Clone)]
pub struct SceneConfig {
    pub fov_y_degrees: f32,
    pub z_near: f32,
    pub z_far: f32,
    pub ground_size: f32,
    pub ground_color: Rgb,
    pub box_color: Rgb,
    pub aim_color: Rgb,
    pub aim_opacity: f32,
    /// Aim disk radius as a fraction of the viewport height
    pub aim_radius_fraction: f32,
    pub ambient: f32,
    pub spot_position: Vec3,
    pub spot_target: Vec3,
    pub spot_intensity: f32,
    pub clear_color: Rgb,
    pub fog_near: f32,
    pub fog_far: f32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            fov_y_degrees: 75.0,
            z_near: 0.1,
            z_far: 1000.0,
            ground_size: 300.0,
            ground_color: Rgb::from_hex(0xdddddd),
            box_color: Rgb::from_hex(0x888999),
            aim_color: Rgb::from_hex(0x999933),
            aim_opacity: 0.7,
            aim_radius_fraction: 0.0237,
            ambient: 0.4,
            spot_position: Vec3::new(10.0, 30.0, 20.0),
            spot_target: Vec3::ZERO,
            spot_intensity: 0.99,
            clear_color: Rgb::from_hex(0x000000),
            fog_near: 0.0,
            fog_far: 500.0,
        }
    }
}
