use glam::{Quat, Vec3};
use rand::Rng;
use rapier3d::prelude::*;

use crate::config::{PhysicsConfig, PlaygroundConfig, RecoilConfig, ShootConfig};
use crate::controller::FirstPersonController;
use crate::model::{BoundedQueue, Charge, MeshId, Recoil, Rgb, Scene, VisualMesh};

/// A simulated body and the mesh that mirrors it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyPair {
    pub body: RigidBodyHandle,
    pub mesh: MeshId,
}

/// Result of a successful `fire`
#[derive(Debug, Clone, Copy)]
pub struct Shot {
    pub pair: BodyPair,
    pub energy: u32,
    pub direction: Vec3,
    /// Speed along `direction` on top of the velocity inherited from the player
    pub launch_speed: f32,
}

fn to_vector(v: Vec3) -> Vector<Real> {
    vector![v.x, v.y, v.z]
}

fn to_vec3(v: &Vector<Real>) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

fn to_quat(r: &Rotation<Real>) -> Quat {
    let q = r.quaternion();
    Quat::from_xyzw(q.i, q.j, q.k, q.w)
}

/// Logs how hard each ball hits whatever it touches
struct ImpactLogger;

impl EventHandler for ImpactLogger {
    fn handle_collision_event(
        &self,
        bodies: &RigidBodySet,
        colliders: &ColliderSet,
        event: CollisionEvent,
        contact_pair: Option<&ContactPair>,
    ) {
        if !event.started() {
            return;
        }
        let Some(pair) = contact_pair else { return };
        let Some(manifold) = pair.manifolds.first() else { return };

        let velocity = |handle: ColliderHandle| {
            colliders
                .get(handle)
                .and_then(|c| c.parent())
                .and_then(|b| bodies.get(b))
                .map(|b| *b.linvel())
                .unwrap_or_else(Vector::zeros)
        };
        let relative = velocity(pair.collider1) - velocity(pair.collider2);
        let impact = relative.dot(&manifold.data.normal);
        tracing::debug!(impact, "ball impact");
    }

    fn handle_contact_force_event(
        &self,
        _dt: Real,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        _contact_pair: &ContactPair,
        _total_force_magnitude: Real,
    ) {
    }
}

/// Rigid-body world: player sphere, ground, boxes and shot balls, plus the
/// charge/fire mechanic and the pose sync into scene meshes.
pub struct PhysicsWorld {
    physics: PhysicsConfig,
    shoot: ShootConfig,
    recoil_config: RecoilConfig,
    box_color: Rgb,

    gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    impacts: ImpactLogger,

    player: RigidBodyHandle,
    player_collider: ColliderHandle,
    boxes: Vec<BodyPair>,
    balls: BoundedQueue<BodyPair>,
    charge: Charge,
    recoil: Recoil,
}

impl PhysicsWorld {
    pub fn new(config: &PlaygroundConfig) -> Self {
        let physics = config.physics.clone();
        let mut bodies = RigidBodySet::new();
        let mut colliders = ColliderSet::new();

        // Player: a sphere that never spins, with the default material against everything but the ground
        let player = bodies.insert(
            RigidBodyBuilder::dynamic()
                .translation(to_vector(physics.player_start))
                .linear_damping(physics.player_damping_coefficient())
                .lock_rotations()
                .build(),
        );
        let player_collider = colliders.insert_with_parent(
            ColliderBuilder::ball(physics.player_radius)
                .mass(physics.player_mass)
                .friction(physics.contact_friction)
                .restitution(physics.contact_restitution)
                .build(),
            player,
            &mut bodies,
        );

        // Ground: static half-space at y = 0. `Min` makes it slippery and dead under the
        // player; boxes and balls combine with `Max` and keep their own material.
        colliders.insert(
            ColliderBuilder::halfspace(Vector::y_axis())
                .friction(0.0)
                .friction_combine_rule(CoefficientCombineRule::Min)
                .restitution(0.0)
                .restitution_combine_rule(CoefficientCombineRule::Min)
                .build(),
        );

        let integration_parameters = IntegrationParameters {
            dt: physics.timestep,
            ..IntegrationParameters::default()
        };

        tracing::info!(
            gravity = ?physics.gravity,
            timestep = physics.timestep,
            max_balls = config.shoot.max_balls,
            "physics world created"
        );

        Self {
            gravity: to_vector(physics.gravity),
            physics,
            shoot: config.shoot.clone(),
            recoil_config: config.recoil.clone(),
            box_color: config.scene.box_color,
            integration_parameters,
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies,
            colliders,
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            impacts: ImpactLogger,
            player,
            player_collider,
            boxes: Vec::new(),
            balls: BoundedQueue::new(config.shoot.max_balls),
            charge: Charge::default(),
            recoil: Recoil::Idle,
        }
    }

    /// One frame: recoil, a fixed simulation sub-step, charge, then pose sync.
    /// Nothing moves while the controller is not engaged.
    pub fn step(&mut self, scene: &mut Scene, controller: &mut FirstPersonController) {
        if !controller.is_enabled() {
            return;
        }

        let up = self.recoil.advance(&self.recoil_config);
        if up != 0 {
            controller.nudge_pitch(up as f32 * self.recoil_config.pitch_per_unit);
        }

        self.simulate();

        if self.charge.tick() {
            scene.set_aim_color(Some(self.aim_color()));
        }

        self.sync_meshes(scene);
    }

    fn simulate(&mut self) {
        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            None,
            &(),
            &self.impacts,
        );
    }

    /// Copy every box and ball pose into its mesh
    fn sync_meshes(&self, scene: &mut Scene) {
        for pair in self.boxes.iter().chain(self.balls.iter()) {
            let (Some(body), Some(mesh)) = (self.bodies.get(pair.body), scene.mesh_mut(pair.mesh)) else {
                continue;
            };
            mesh.position = to_vec3(body.translation());
            mesh.rotation = to_quat(body.rotation());
        }
    }

    /// Scatter `count` boxes over the spawn square, dropped from just above the ground
    pub fn spawn_boxes<R: Rng + ?Sized>(&mut self, scene: &mut Scene, count: usize, rng: &mut R) {
        let half = self.physics.box_half_extent;
        let extent = self.physics.box_spawn_extent;
        for _ in 0..count {
            let position = Vec3::new(
                (rng.gen::<f32>() - 0.5) * extent,
                (rng.gen::<f32>() - 0.5) * self.physics.box_spawn_jitter + self.physics.box_spawn_height,
                (rng.gen::<f32>() - 0.5) * extent,
            );

            let body = self.bodies.insert(
                RigidBodyBuilder::dynamic()
                    .translation(to_vector(position))
                    .build(),
            );
            self.colliders.insert_with_parent(
                self.with_contact_material(ColliderBuilder::cuboid(half, half, half))
                    .mass(self.physics.box_mass)
                    .build(),
                body,
                &mut self.bodies,
            );
            let mesh = scene.add_mesh(VisualMesh::cuboid(Vec3::splat(half), position, self.box_color));
            self.boxes.push(BodyPair { body, mesh });
        }
        tracing::info!(count, total = self.boxes.len(), "spawned boxes");
    }

    /// Primary button pressed. Ignored unless the controller is engaged.
    pub fn begin_charge(&mut self, controller: &FirstPersonController) -> bool {
        if !controller.is_enabled() {
            return false;
        }
        let started = self.charge.begin();
        if started {
            tracing::trace!("charging");
        }
        started
    }

    /// Primary button released: turn the charge into a ball launched along the crosshair ray.
    pub fn fire(&mut self, scene: &mut Scene, controller: &FirstPersonController) -> Option<Shot> {
        if !controller.is_enabled() {
            return None;
        }
        let energy = self.charge.release()?;

        self.recoil = Recoil::start(energy as i32);
        scene.set_aim_color(None);

        let origin = self.player_position();
        let direction = scene.camera.shoot_direction(origin);
        let launch_speed = (energy as f32).min(self.shoot.max_velocity);
        let velocity = direction * launch_speed + self.player_velocity();

        // Spawn just outside the player sphere so the ball doesn't hit its shooter
        let clearance = self.physics.player_radius * self.shoot.spawn_clearance + self.shoot.ball_radius;
        let position = origin + direction * clearance;

        let body = self.bodies.insert(
            RigidBodyBuilder::dynamic()
                .translation(to_vector(position))
                .linvel(to_vector(velocity))
                .build(),
        );
        self.colliders.insert_with_parent(
            self.with_contact_material(ColliderBuilder::ball(self.shoot.ball_radius))
                .mass(self.shoot.ball_mass)
                .active_events(ActiveEvents::COLLISION_EVENTS)
                .build(),
            body,
            &mut self.bodies,
        );
        let mesh = scene.add_mesh(VisualMesh::sphere(self.shoot.ball_radius, position, self.aim_color()));

        let pair = BodyPair { body, mesh };
        if let Some(evicted) = self.balls.push(pair) {
            self.remove_pair(scene, evicted);
        }

        tracing::debug!(energy, launch_speed, balls = self.balls.len(), "fired");
        Some(Shot { pair, energy, direction, launch_speed })
    }

    fn with_contact_material(&self, builder: ColliderBuilder) -> ColliderBuilder {
        builder
            .friction(self.physics.contact_friction)
            .friction_combine_rule(CoefficientCombineRule::Max)
            .restitution(self.physics.contact_restitution)
            .restitution_combine_rule(CoefficientCombineRule::Max)
    }

    fn remove_pair(&mut self, scene: &mut Scene, pair: BodyPair) {
        self.bodies.remove(
            pair.body,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
        scene.remove_mesh(pair.mesh);
    }

    /// Aim indicator / next ball color, from the live charge or the recoil left over from the last shot
    pub fn aim_color(&self) -> Rgb {
        let source = if self.charge.is_charging() {
            self.charge.energy() as f32
        } else {
            self.recoil.remaining() as f32
        };
        self.shoot
            .base_color
            .lerp(self.shoot.charged_color, (source / self.shoot.max_velocity).min(1.0))
    }

    pub fn player_position(&self) -> Vec3 {
        self.bodies.get(self.player).map(|b| to_vec3(b.translation())).unwrap_or(Vec3::ZERO)
    }

    pub fn player_velocity(&self) -> Vec3 {
        self.bodies.get(self.player).map(|b| to_vec3(b.linvel())).unwrap_or(Vec3::ZERO)
    }

    /// Add to the player's velocity (movement input)
    pub fn push_player(&mut self, delta: Vec3) {
        if let Some(body) = self.bodies.get_mut(self.player) {
            let v = *body.linvel() + to_vector(delta);
            body.set_linvel(v, true);
        }
    }

    pub fn set_player_vertical_velocity(&mut self, vy: f32) {
        if let Some(body) = self.bodies.get_mut(self.player) {
            let mut v = *body.linvel();
            v.y = vy;
            body.set_linvel(v, true);
        }
    }

    /// Standing on something: an active contact whose normal points up at the player
    pub fn player_grounded(&self) -> bool {
        let player = self.player_collider;
        self.narrow_phase.contact_pairs_with(player).any(|pair| {
            pair.has_any_active_contact
                && pair.manifolds.iter().any(|m| {
                    let normal = if pair.collider1 == player { -m.data.normal } else { m.data.normal };
                    normal.y > 0.5
                })
        })
    }

    pub fn player_radius(&self) -> f32 {
        self.physics.player_radius
    }

    pub fn energy(&self) -> u32 {
        self.charge.energy()
    }

    pub fn recoil(&self) -> Recoil {
        self.recoil
    }

    pub fn ball_count(&self) -> usize {
        self.balls.len()
    }

    pub fn box_count(&self) -> usize {
        self.boxes.len()
    }

    /// Oldest first
    pub fn balls(&self) -> impl Iterator<Item = &BodyPair> {
        self.balls.iter()
    }

    pub fn boxes(&self) -> impl Iterator<Item = &BodyPair> {
        self.boxes.iter()
    }

    pub fn body_position(&self, handle: RigidBodyHandle) -> Option<Vec3> {
        self.bodies.get(handle).map(|b| to_vec3(b.translation()))
    }

    pub fn body_velocity(&self, handle: RigidBodyHandle) -> Option<Vec3> {
        self.bodies.get(handle).map(|b| to_vec3(b.linvel()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControlConfig;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn setup() -> (PhysicsWorld, Scene, FirstPersonController) {
        let config = PlaygroundConfig::default();
        let world = PhysicsWorld::new(&config);
        let mut scene = Scene::new(&config.scene, 800, 600);
        scene.camera.eye = world.player_position();
        let mut controller = FirstPersonController::new(ControlConfig::default());
        controller.set_pointer_locked(true);
        (world, scene, controller)
    }

    fn charge(world: &mut PhysicsWorld, scene: &mut Scene, controller: &mut FirstPersonController, steps: usize) {
        assert!(world.begin_charge(controller));
        for _ in 0..steps {
            world.step(scene, controller);
        }
    }

    #[test]
    fn test_energy_counts_steps_while_charging() {
        let (mut world, mut scene, mut controller) = setup();
        world.begin_charge(&controller);
        for expected in 2..20 {
            world.begin_charge(&controller);
            world.step(&mut scene, &mut controller);
            assert_eq!(world.energy(), expected);
        }
    }

    #[test]
    fn test_charge_and_fire_need_engaged_controller() {
        let (mut world, mut scene, mut controller) = setup();
        controller.set_pointer_locked(false);
        assert!(!world.begin_charge(&controller));
        assert_eq!(world.energy(), 0);

        controller.set_pointer_locked(true);
        charge(&mut world, &mut scene, &mut controller, 3);
        controller.set_pointer_locked(false);
        assert!(world.fire(&mut scene, &controller).is_none());
        assert_eq!(world.energy(), 4);
        assert_eq!(world.ball_count(), 0);
    }

    #[test]
    fn test_fire_without_energy_is_noop() {
        let (mut world, mut scene, controller) = setup();
        let meshes = scene.mesh_count();
        assert!(world.fire(&mut scene, &controller).is_none());
        assert_eq!(world.ball_count(), 0);
        assert_eq!(scene.mesh_count(), meshes);
        assert!(world.recoil().is_idle());
    }

    #[test]
    fn test_fire_launches_ball_at_charge_speed() {
        let (mut world, mut scene, mut controller) = setup();
        charge(&mut world, &mut scene, &mut controller, 14);
        assert_eq!(world.energy(), 15);
        assert_ne!(scene.aim_color(), PlaygroundConfig::default().scene.aim_color);

        let player_velocity = world.player_velocity();
        let player_position = world.player_position();
        let shot = world.fire(&mut scene, &controller).expect("shot");

        assert_eq!(world.energy(), 0);
        assert_eq!(world.ball_count(), 1);
        assert_eq!(shot.energy, 15);
        assert_eq!(shot.launch_speed, 15.0);
        assert_eq!(scene.aim_color(), PlaygroundConfig::default().scene.aim_color);
        assert_eq!(world.recoil(), Recoil::Recoiling { remaining: 15, shot: 15 });

        let velocity = world.body_velocity(shot.pair.body).unwrap();
        let along = (velocity - player_velocity).dot(shot.direction);
        assert!((along - 15.0).abs() < 1e-3, "launch speed {along}");

        let position = world.body_position(shot.pair.body).unwrap();
        let expected = 1.3 * 1.02 + 0.2;
        assert!(((position - player_position).length() - expected).abs() < 1e-4);
        assert!(scene.mesh(shot.pair.mesh).is_some());
    }

    #[test]
    fn test_launch_speed_is_capped() {
        let (mut world, mut scene, mut controller) = setup();
        charge(&mut world, &mut scene, &mut controller, 60);
        let shot = world.fire(&mut scene, &controller).unwrap();
        assert_eq!(shot.energy, 61);
        assert_eq!(shot.launch_speed, 30.0);
        // the ball takes the fully charged color
        let ball = scene.mesh(shot.pair.mesh).unwrap();
        assert_eq!(ball.color, PlaygroundConfig::default().shoot.charged_color);
    }

    #[test]
    fn test_ball_cap_evicts_oldest_first() {
        let (mut world, mut scene, mut controller) = setup();
        let mut shots = Vec::new();
        for _ in 0..105 {
            charge(&mut world, &mut scene, &mut controller, 0);
            shots.push(world.fire(&mut scene, &controller).unwrap().pair);
        }
        assert_eq!(world.ball_count(), 100);
        for evicted in &shots[..5] {
            assert!(world.body_position(evicted.body).is_none());
            assert!(scene.mesh(evicted.mesh).is_none());
        }
        for kept in &shots[5..] {
            assert!(world.body_position(kept.body).is_some());
            assert!(scene.mesh(kept.mesh).is_some());
        }
        let remaining: Vec<BodyPair> = world.balls().copied().collect();
        assert_eq!(remaining, shots[5..].to_vec());
        // ground + 100 balls
        assert_eq!(scene.mesh_count(), 101);
    }

    #[test]
    fn test_spawned_boxes_land_in_bounds() {
        let (mut world, mut scene, _) = setup();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        world.spawn_boxes(&mut scene, 3, &mut rng);
        assert_eq!(world.box_count(), 3);
        for pair in world.boxes() {
            let p = world.body_position(pair.body).unwrap();
            assert!((0.5..=1.5).contains(&p.y), "y = {}", p.y);
            assert!((-10.0..=10.0).contains(&p.x), "x = {}", p.x);
            assert!((-10.0..=10.0).contains(&p.z), "z = {}", p.z);
            assert_eq!(scene.mesh(pair.mesh).unwrap().position, p);
        }
    }

    #[test]
    fn test_meshes_follow_bodies() {
        let (mut world, mut scene, mut controller) = setup();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        world.spawn_boxes(&mut scene, 4, &mut rng);
        charge(&mut world, &mut scene, &mut controller, 10);
        let shot = world.fire(&mut scene, &controller).unwrap();
        for _ in 0..30 {
            world.step(&mut scene, &mut controller);
        }
        for pair in world.boxes().chain(world.balls()) {
            let body = world.body_position(pair.body).unwrap();
            let mesh = scene.mesh(pair.mesh).unwrap();
            assert!(mesh.position.abs_diff_eq(body, 1e-6));
        }
        assert!(world.body_position(shot.pair.body).is_some());
    }

    #[test]
    fn test_step_is_frozen_while_unlocked() {
        let (mut world, mut scene, mut controller) = setup();
        controller.set_pointer_locked(false);
        let start = world.player_position();
        for _ in 0..10 {
            world.step(&mut scene, &mut controller);
        }
        assert_eq!(world.player_position(), start);
    }

    #[test]
    fn test_player_falls_and_rests_on_ground() {
        let (mut world, mut scene, mut controller) = setup();
        assert!(!world.player_grounded());
        for _ in 0..180 {
            world.step(&mut scene, &mut controller);
        }
        let y = world.player_position().y;
        assert!((y - world.player_radius()).abs() < 0.1, "resting at {y}");
        assert!(world.player_grounded());
    }

    #[test]
    fn test_player_keeps_a_tenth_of_its_velocity_after_a_second() {
        let (mut world, mut scene, mut controller) = setup();
        world.push_player(Vec3::new(10.0, 0.0, 0.0));
        for _ in 0..60 {
            world.step(&mut scene, &mut controller);
        }
        // damping alone: the ground under the player is frictionless
        let vx = world.player_velocity().x;
        assert!((vx - 1.0).abs() < 0.05, "vx after 1s = {vx}");
    }

    #[test]
    fn test_boxes_grip_the_ground() {
        let (mut world, mut scene, mut controller) = setup();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        world.spawn_boxes(&mut scene, 1, &mut rng);
        let pair = world.boxes().next().copied().unwrap();
        // clear of the player, sliding away from it
        world.bodies.get_mut(pair.body).unwrap().set_translation(vector![5.0, 1.0, 5.0], true);
        for _ in 0..60 {
            world.step(&mut scene, &mut controller);
        }

        world.bodies.get_mut(pair.body).unwrap().set_linvel(vector![5.0, 0.0, 0.0], true);
        for _ in 0..60 {
            world.step(&mut scene, &mut controller);
        }
        // 0.3 friction under 20 m/s^2 stops 5 m/s in well under a second
        let speed = world.body_velocity(pair.body).unwrap().x.abs();
        assert!(speed < 0.5, "box still sliding at {speed}");
    }

    #[test]
    fn test_recoil_kicks_pitch_then_settles() {
        let (mut world, mut scene, mut controller) = setup();
        charge(&mut world, &mut scene, &mut controller, 9);
        world.fire(&mut scene, &controller).unwrap();
        let before = controller.pitch();

        world.step(&mut scene, &mut controller);
        assert!(controller.pitch() > before);

        for _ in 0..50 {
            world.step(&mut scene, &mut controller);
        }
        assert!(world.recoil().is_idle());
        // +10 up, -9 back down
        assert!((controller.pitch() - before - 0.001).abs() < 1e-5);
    }

    #[test]
    fn test_aim_color_tracks_energy() {
        let (mut world, mut scene, mut controller) = setup();
        let shoot = ShootConfig::default();
        assert_eq!(world.aim_color(), shoot.base_color);

        world.begin_charge(&controller);
        let mut last = world.aim_color();
        for _ in 0..40 {
            world.step(&mut scene, &mut controller);
            let color = world.aim_color();
            assert!(color.r >= last.r && color.g >= last.g && color.b >= last.b);
            assert_eq!(scene.aim_color(), color);
            last = color;
        }
        assert_eq!(last, shoot.charged_color);
    }
}
