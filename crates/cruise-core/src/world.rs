//! The persistent world: ground, road, lights, the vehicle rig and the active
//! decoration set.

use std::f32::consts::{FRAC_PI_2, FRAC_PI_6};

use glam::Quat;
use rand::Rng;

use crate::{
    decorations::{DecorationGenerator, DecorationSet},
    scene::{
        Disposal, Fog, Geometry, Material, MaterialId, Node, NodeId, NodeKind, Rgb, SceneGraph,
        Transform,
    },
    theme::ThemeId,
    vehicle::{VehicleState, VehicleVisuals},
};

const GROUND_Y: f32 = -1.0;
const ROAD_Y: f32 = -0.9;
const LANE_MARKING_Y: f32 = -0.89;
const LANE_MARKING_X: [f32; 3] = [-4.5, 0.0, 4.5];
const TRACK_LENGTH: f32 = 1000.0;

/// Wheel mount points in rig space, front pair first.
const WHEEL_MOUNTS: [[f32; 3]; 4] = [
    [-1.0, 0.4, -1.2],
    [1.0, 0.4, -1.2],
    [-1.0, 0.4, 1.2],
    [1.0, 0.4, 1.2],
];
/// How far a hub sits from its wheel's centre along the axle.
const HUB_OFFSET: f32 = 0.11;

/// Handles to the parts of the vehicle that change at runtime.
///
/// The rig faces -Z: headlights at the front (-Z), taillights at the back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VehicleRig {
    pub root: NodeId,
    pub body: NodeId,
    pub cabin: NodeId,
    pub windshield: NodeId,
    pub wheels: [NodeId; 4],
    pub hubs: [NodeId; 4],
    pub headlights: [NodeId; 2],
    pub taillights: [NodeId; 2],
    /// Shared by both taillights; its emissive intensity tracks the brake.
    pub taillight_material: MaterialId,
}

impl VehicleRig {
    fn build(scene: &mut SceneGraph) -> Self {
        let root = scene.spawn(scene.root(), Node::group().named("car"));

        let body_geometry = scene.add_geometry(Geometry::Cuboid {
            width: 2.0,
            height: 0.5,
            depth: 4.0,
        });
        let body_material =
            scene.add_material(Material::colored(Rgb::from_hex(0x3b_82_f6)).with_surface(0.2, 0.6));
        let body = scene.spawn(
            root,
            Node::mesh(body_geometry, body_material)
                .named("body")
                .at(0.0, 0.5, 0.0)
                .shadows(true, true),
        );

        let cabin_geometry = scene.add_geometry(Geometry::Cuboid {
            width: 1.5,
            height: 0.6,
            depth: 2.0,
        });
        let cabin_material = scene.add_material(
            Material::colored(Rgb::from_hex(0x2c_3e_50))
                .with_surface(0.2, 0.7)
                .with_opacity(0.7),
        );
        let cabin = scene.spawn(
            root,
            Node::mesh(cabin_geometry, cabin_material)
                .named("cabin")
                .at(0.0, 1.1, 0.5)
                .shadows(true, true),
        );

        let windshield_geometry = scene.add_geometry(Geometry::Cuboid {
            width: 1.4,
            height: 0.01,
            depth: 0.8,
        });
        let windshield_material = scene.add_material(
            Material::colored(Rgb::from_hex(0xa3_e0_ff))
                .with_surface(0.1, 0.9)
                .with_opacity(0.7),
        );
        let windshield = scene.spawn(
            root,
            Node::mesh(windshield_geometry, windshield_material)
                .named("windshield")
                .at(0.0, 1.2, -0.5)
                .rotated(Quat::from_rotation_x(-FRAC_PI_6)),
        );

        let wheel_geometry = scene.add_geometry(Geometry::Cylinder {
            radius_top: 0.4,
            radius_bottom: 0.4,
            height: 0.2,
            segments: 32,
        });
        let wheel_material =
            scene.add_material(Material::colored(Rgb::from_hex(0x33_33_33)).with_surface(0.7, 0.5));
        let hub_geometry = scene.add_geometry(Geometry::Cylinder {
            radius_top: 0.15,
            radius_bottom: 0.15,
            height: 0.05,
            segments: 16,
        });
        let hub_material =
            scene.add_material(Material::colored(Rgb::from_hex(0x88_88_88)).with_surface(0.2, 0.8));

        let mut wheels = [root; 4];
        let mut hubs = [root; 4];
        for (index, [x, y, z]) in WHEEL_MOUNTS.into_iter().enumerate() {
            let wheel = scene.spawn(
                root,
                Node::mesh(wheel_geometry, wheel_material)
                    .named("wheel")
                    .at(x, y, z)
                    .rotated(wheel_rotation(0.0))
                    .shadows(true, true),
            );
            // The cylinder's local +Y points to rig -X after the mount
            // rotation, so the outward face is -Y on the right side.
            let hub_y = if x > 0.0 { -HUB_OFFSET } else { HUB_OFFSET };
            hubs[index] = scene.spawn(
                wheel,
                Node::mesh(hub_geometry, hub_material)
                    .named("hub")
                    .at(0.0, hub_y, 0.0),
            );
            wheels[index] = wheel;
        }

        let headlight_geometry = scene.add_geometry(Geometry::Sphere {
            radius: 0.2,
            segments: 16,
        });
        let headlight_material = scene.add_material(
            Material::colored(Rgb::WHITE).with_emissive(Rgb::from_hex(0xff_ff_00), 2.0),
        );
        let headlights = [-0.6, 0.6].map(|x| {
            scene.spawn(
                root,
                Node::mesh(headlight_geometry, headlight_material)
                    .named("headlight")
                    .at(x, 0.5, -2.0),
            )
        });

        let taillight_geometry = scene.add_geometry(Geometry::Sphere {
            radius: 0.15,
            segments: 16,
        });
        let red = Rgb::from_hex(0xff_00_00);
        let taillight_material =
            scene.add_material(Material::colored(red).with_emissive(red, 1.0));
        let taillights = [-0.6, 0.6].map(|x| {
            scene.spawn(
                root,
                Node::mesh(taillight_geometry, taillight_material)
                    .named("taillight")
                    .at(x, 0.5, 2.0),
            )
        });

        Self {
            root,
            body,
            cabin,
            windshield,
            wheels,
            hubs,
            headlights,
            taillights,
            taillight_material,
        }
    }
}

/// Lay the wheel cylinder along the axle, then spin it about the axle.
///
/// Rolling toward -Z turns the top of the wheel forward, which is a negative
/// rotation about +X.
fn wheel_rotation(spin: f32) -> Quat {
    Quat::from_rotation_x(-spin) * Quat::from_rotation_z(FRAC_PI_2)
}

/// Everything the simulation keeps in the scene between frames.
#[derive(Debug)]
pub struct SceneResources<R: Rng> {
    scene: SceneGraph,
    generator: DecorationGenerator<R>,
    ground_material: MaterialId,
    ambient_light: NodeId,
    rig: VehicleRig,
    decorations: Option<DecorationSet>,
    theme: ThemeId,
    disposed: bool,
}

impl<R: Rng> SceneResources<R> {
    /// Build the static world and vehicle rig, then apply `theme`.
    pub fn build(generator: DecorationGenerator<R>, theme: ThemeId) -> Self {
        let mut scene = SceneGraph::new();
        let root = scene.root();
        let config = theme.theme();

        let ground_geometry = scene.add_geometry(Geometry::Plane {
            width: TRACK_LENGTH,
            depth: TRACK_LENGTH,
        });
        let ground_material =
            scene.add_material(Material::colored(config.ground_color).with_surface(0.8, 0.2));
        scene.spawn(
            root,
            Node::mesh(ground_geometry, ground_material)
                .named("ground")
                .at(0.0, GROUND_Y, 0.0)
                .shadows(false, true),
        );

        let road_geometry = scene.add_geometry(Geometry::Plane {
            width: 10.0,
            depth: TRACK_LENGTH,
        });
        let road_material = scene.add_material(Material::colored(Rgb::from_hex(0x33_33_33)));
        scene.spawn(
            root,
            Node::mesh(road_geometry, road_material)
                .named("road")
                .at(0.0, ROAD_Y, 0.0)
                .shadows(false, true),
        );

        let lane_geometry = scene.add_geometry(Geometry::Plane {
            width: 0.2,
            depth: TRACK_LENGTH,
        });
        let lane_material = scene.add_material(Material::colored(Rgb::WHITE));
        for x in LANE_MARKING_X {
            scene.spawn(
                root,
                Node::mesh(lane_geometry, lane_material)
                    .named("lane_marking")
                    .at(x, LANE_MARKING_Y, 0.0)
                    .shadows(false, true),
            );
        }

        let ambient_light = scene.spawn(
            root,
            Node::new(NodeKind::AmbientLight {
                color: Rgb::from_hex(0x40_40_40),
                intensity: config.ambient_light,
            })
            .named("ambient_light"),
        );
        scene.spawn(
            root,
            Node::new(NodeKind::DirectionalLight {
                color: Rgb::WHITE,
                intensity: 1.0,
            })
            .named("sun")
            .at(5.0, 10.0, 7.5)
            .shadows(true, false),
        );

        let rig = VehicleRig::build(&mut scene);

        let mut resources = Self {
            scene,
            generator,
            ground_material,
            ambient_light,
            rig,
            decorations: None,
            theme,
            disposed: false,
        };
        resources.apply_theme(theme);
        resources
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut SceneGraph {
        &mut self.scene
    }

    pub fn rig(&self) -> &VehicleRig {
        &self.rig
    }

    pub fn decorations(&self) -> Option<&DecorationSet> {
        self.decorations.as_ref()
    }

    pub fn theme(&self) -> ThemeId {
        self.theme
    }

    pub fn ground_material(&self) -> MaterialId {
        self.ground_material
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Replace the decoration set and restyle the environment for `theme`.
    ///
    /// Always rebuilds, even when `theme` is already active. Returns `None`
    /// once the resources have been disposed.
    pub fn apply_theme(&mut self, theme: ThemeId) -> Option<DecorationSet> {
        if self.disposed {
            tracing::warn!(%theme, "Ignoring theme change on disposed scene");
            return None;
        }

        if let Some(old) = self.decorations.take() {
            let released = self.scene.despawn_recursive(old.root);
            tracing::debug!(theme = %old.theme, ?released, "Released decorations");
        }

        let config = theme.theme();
        if let Some(material) = self.scene.material_mut(self.ground_material) {
            material.base_color = config.ground_color;
        }
        self.scene.set_environment(
            config.sky_color,
            Some(Fog {
                color: config.fog_color,
                density: config.fog_density,
            }),
        );
        self.scene
            .set_light_intensity(self.ambient_light, config.ambient_light);

        let root = self.scene.root();
        let set = self.generator.generate(&mut self.scene, root, theme);
        self.decorations = Some(set);
        self.theme = theme;
        Some(set)
    }

    /// Pose the rig and update the parts driven by the drivetrain.
    pub fn sync_vehicle(&mut self, state: &VehicleState, visuals: &VehicleVisuals) {
        if self.disposed {
            return;
        }

        self.scene.set_transform(
            self.rig.root,
            Transform {
                translation: state.position,
                rotation: Quat::from_rotation_y(state.heading),
                ..Transform::IDENTITY
            },
        );

        let rotation = wheel_rotation(visuals.wheel_angle);
        for wheel in self.rig.wheels {
            if let Some(node) = self.scene.node(wheel) {
                let transform = Transform {
                    rotation,
                    ..node.transform
                };
                self.scene.set_transform(wheel, transform);
            }
        }

        let current = self
            .scene
            .material(self.rig.taillight_material)
            .map(|m| m.emissive_intensity);
        if current.is_some_and(|value| (value - visuals.taillight_intensity).abs() > f32::EPSILON)
            && let Some(material) = self.scene.material_mut(self.rig.taillight_material)
        {
            material.emissive_intensity = visuals.taillight_intensity;
        }
    }

    /// Release every node, geometry and material. Safe to call repeatedly;
    /// later calls release nothing.
    pub fn dispose(&mut self) -> Disposal {
        if self.disposed {
            return Disposal::default();
        }
        self.disposed = true;
        self.decorations = None;
        let disposal = self.scene.clear();
        tracing::debug!(?disposal, "Disposed scene resources");
        disposal
    }
}
