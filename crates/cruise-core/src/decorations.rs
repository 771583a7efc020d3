//! Procedural roadside decorations.
//!
//! Each theme lays props out on a fixed lattice along the road and keeps a
//! random subset of lattice cells. All randomness comes from the generator's
//! own source, so a seeded generator reproduces the same set.

use std::f32::consts::{FRAC_PI_2, PI};

use glam::{EulerRot, Quat};
use rand::Rng;

use crate::{
    scene::{Geometry, Material, Node, NodeId, NodeKind, Rgb, SceneGraph},
    theme::ThemeId,
};

/// Name of the group node holding one decoration set.
pub const DECORATION_GROUP_NAME: &str = "track_decorations";

// Lattice half-widths (inclusive).
const ROADSIDE_SPAN: i32 = 20;
const FIELD_SPAN: i32 = 10;
/// Field columns with `|i|` below this are kept clear for the road.
const CORRIDOR_HALF_WIDTH: i32 = 3;

const SIDES: [f32; 2] = [-1.0, 1.0];

/// Per-kind prop counts for one generated set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecorationStats {
    pub buildings: usize,
    pub light_poles: usize,
    pub mountains: usize,
    pub trees: usize,
    pub cacti: usize,
    pub cactus_arms: usize,
    pub rocks: usize,
    pub dunes: usize,
}

impl DecorationStats {
    /// Nodes in the decoration subtree, including its group node.
    ///
    /// A light pole carries a bulb and a point light; a tree is a trunk plus
    /// foliage.
    pub fn node_count(&self) -> usize {
        1 + self.buildings
            + self.light_poles * 3
            + self.mountains
            + self.trees * 2
            + self.cacti
            + self.cactus_arms
            + self.rocks
            + self.dunes
    }
}

/// A generated decoration subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecorationSet {
    pub theme: ThemeId,
    pub root: NodeId,
    pub stats: DecorationStats,
}

/// Builds decoration subtrees from an injectable random source.
#[derive(Debug)]
pub struct DecorationGenerator<R: Rng> {
    rng: R,
}

impl<R: Rng> DecorationGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Spawn a new decoration group for `theme` under `parent`.
    ///
    /// Does not touch any previously generated set; removing the old one is
    /// the caller's job.
    pub fn generate(&mut self, scene: &mut SceneGraph, parent: NodeId, theme: ThemeId) -> DecorationSet {
        let root = scene.spawn(parent, Node::group().named(DECORATION_GROUP_NAME));
        let mut stats = DecorationStats::default();

        match theme {
            ThemeId::City => self.city(scene, root, &mut stats),
            ThemeId::Mountain => self.mountain(scene, root, &mut stats),
            ThemeId::Desert => self.desert(scene, root, &mut stats),
        }

        tracing::debug!(%theme, ?stats, nodes = stats.node_count(), "Generated decorations");
        DecorationSet { theme, root, stats }
    }

    /// Strictly-greater presence test against a uniform sample.
    fn passes(&mut self, threshold: f32) -> bool {
        self.rng.random::<f32>() > threshold
    }

    // ========================================================================
    // City
    // ========================================================================

    fn city(&mut self, scene: &mut SceneGraph, root: NodeId, stats: &mut DecorationStats) {
        for i in (-10..=10).step_by(2) {
            for side in SIDES {
                let height = self.rng.random_range(5.0..20.0);
                let width = self.rng.random_range(3.0..5.0);
                let depth = self.rng.random_range(3.0..5.0);
                let tint = Rgb::new(
                    self.rng.random_range(0.2..0.3),
                    self.rng.random_range(0.2..0.3),
                    self.rng.random_range(0.3..0.4),
                );
                let x = side * self.rng.random_range(10.0..15.0);

                let geometry = scene.add_geometry(Geometry::Cuboid { width, height, depth });
                let material = scene.add_material(Material::colored(tint).with_surface(0.7, 0.2));
                scene.spawn(
                    root,
                    Node::mesh(geometry, material)
                        .named("building")
                        .at(x, height / 2.0 - 1.0, i as f32 * 10.0)
                        .shadows(true, true),
                );
                stats.buildings += 1;
            }
        }

        // Every pole cell is filled, so the shared pole resources always have
        // users. Other themes allocate theirs on first use.
        let pole_geometry = scene.add_geometry(Geometry::Cylinder {
            radius_top: 0.1,
            radius_bottom: 0.1,
            height: 4.0,
            segments: 8,
        });
        let pole_material = scene.add_material(Material::colored(Rgb::from_hex(0x88_88_88)));
        let bulb_geometry = scene.add_geometry(Geometry::Sphere {
            radius: 0.2,
            segments: 16,
        });
        let bulb_material = scene.add_material(
            Material::colored(Rgb::WHITE).with_emissive(Rgb::from_hex(0xff_ff_cc), 2.0),
        );

        for i in (-ROADSIDE_SPAN..=ROADSIDE_SPAN).step_by(4) {
            for side in SIDES {
                let pole = scene.spawn(
                    root,
                    Node::mesh(pole_geometry, pole_material)
                        .named("light_pole")
                        .at(side * 6.0, 1.0, i as f32 * 5.0)
                        .shadows(true, false),
                );
                scene.spawn(
                    pole,
                    Node::mesh(bulb_geometry, bulb_material)
                        .named("bulb")
                        .at(0.0, 2.0, 0.0),
                );
                scene.spawn(
                    pole,
                    Node::new(NodeKind::PointLight {
                        color: Rgb::from_hex(0xff_ff_cc),
                        intensity: 0.5,
                        range: 10.0,
                    })
                    .named("street_light")
                    .at(0.0, 2.0, 0.0),
                );
                stats.light_poles += 1;
            }
        }
    }

    // ========================================================================
    // Mountain
    // ========================================================================

    fn mountain(&mut self, scene: &mut SceneGraph, root: NodeId, stats: &mut DecorationStats) {
        for i in -FIELD_SPAN..=FIELD_SPAN {
            if i.abs() < CORRIDOR_HALF_WIDTH {
                continue;
            }
            for j in -FIELD_SPAN..=FIELD_SPAN {
                if !self.passes(0.8) {
                    continue;
                }
                let radius = self.rng.random_range(5.0..10.0);
                let height = self.rng.random_range(5.0..25.0);
                let segments = self.rng.random_range(4..8);
                let tint = Rgb::new(
                    self.rng.random_range(0.1..0.2),
                    self.rng.random_range(0.3..0.5),
                    self.rng.random_range(0.1..0.2),
                );

                let geometry = scene.add_geometry(Geometry::Cone {
                    radius,
                    height,
                    segments,
                });
                let material = scene.add_material(Material::colored(tint).with_surface(0.9, 0.1));
                scene.spawn(
                    root,
                    Node::mesh(geometry, material)
                        .named("mountain")
                        .at(i as f32 * 10.0, height / 2.0 - 1.0, j as f32 * 20.0)
                        .shadows(true, true),
                );
                stats.mountains += 1;
            }
        }

        let mut tree_resources = None;
        for i in -ROADSIDE_SPAN..=ROADSIDE_SPAN {
            for side in SIDES {
                if !self.passes(0.7) {
                    continue;
                }
                let x = side * self.rng.random_range(7.0..17.0);
                let (trunk_geometry, trunk_material, foliage_geometry, foliage_material) =
                    *tree_resources.get_or_insert_with(|| {
                        (
                            scene.add_geometry(Geometry::Cylinder {
                                radius_top: 0.2,
                                radius_bottom: 0.3,
                                height: 2.0,
                                segments: 8,
                            }),
                            scene.add_material(Material::colored(Rgb::from_hex(0x8b_45_13))),
                            scene.add_geometry(Geometry::Cone {
                                radius: 1.0,
                                height: 3.0,
                                segments: 8,
                            }),
                            scene.add_material(
                                Material::colored(Rgb::from_hex(0x2e_cc_71)).with_surface(0.8, 0.0),
                            ),
                        )
                    });
                let trunk = scene.spawn(
                    root,
                    Node::mesh(trunk_geometry, trunk_material)
                        .named("tree")
                        .at(x, 0.0, i as f32 * 5.0)
                        .shadows(true, false),
                );
                scene.spawn(
                    trunk,
                    Node::mesh(foliage_geometry, foliage_material)
                        .named("foliage")
                        .at(0.0, 2.0, 0.0)
                        .shadows(true, false),
                );
                stats.trees += 1;
            }
        }
    }

    // ========================================================================
    // Desert
    // ========================================================================

    fn desert(&mut self, scene: &mut SceneGraph, root: NodeId, stats: &mut DecorationStats) {
        let mut arm_geometry = None;
        for i in -ROADSIDE_SPAN..=ROADSIDE_SPAN {
            for side in SIDES {
                if !self.passes(0.8) {
                    continue;
                }
                let height = self.rng.random_range(2.0..5.0);
                let x = side * self.rng.random_range(8.0..23.0);
                let geometry = scene.add_geometry(Geometry::Cylinder {
                    radius_top: 0.3,
                    radius_bottom: 0.4,
                    height,
                    segments: 8,
                });
                // The arm reuses its cactus's material.
                let material = scene.add_material(Material::colored(Rgb::from_hex(0x2d_6a_4f)));
                let cactus = scene.spawn(
                    root,
                    Node::mesh(geometry, material)
                        .named("cactus")
                        .at(x, 1.0, i as f32 * 5.0)
                        .shadows(true, false),
                );
                stats.cacti += 1;

                if self.passes(0.5) {
                    let arm_geometry = *arm_geometry.get_or_insert_with(|| {
                        scene.add_geometry(Geometry::Cylinder {
                            radius_top: 0.2,
                            radius_bottom: 0.2,
                            height: 1.0,
                            segments: 8,
                        })
                    });
                    scene.spawn(
                        cactus,
                        Node::mesh(arm_geometry, material)
                            .named("cactus_arm")
                            .at(0.5, 0.5, 0.0)
                            .rotated(Quat::from_rotation_z(FRAC_PI_2)),
                    );
                    stats.cactus_arms += 1;
                }
            }
        }

        let mut rock_material = None;
        for i in -ROADSIDE_SPAN..=ROADSIDE_SPAN {
            for side in SIDES {
                if !self.passes(0.7) {
                    continue;
                }
                let radius = self.rng.random_range(1.0..3.0);
                let x = side * self.rng.random_range(10.0..20.0);
                let rotation = Quat::from_euler(
                    EulerRot::XYZ,
                    self.rng.random_range(0.0..PI),
                    self.rng.random_range(0.0..PI),
                    self.rng.random_range(0.0..PI),
                );
                let geometry = scene.add_geometry(Geometry::Dodecahedron { radius });
                let rock_material = *rock_material.get_or_insert_with(|| {
                    scene.add_material(Material::colored(Rgb::from_hex(0xa8_99_68)).with_surface(0.9, 0.0))
                });
                scene.spawn(
                    root,
                    Node::mesh(geometry, rock_material)
                        .named("rock")
                        .at(x, 0.0, i as f32 * 5.0)
                        .rotated(rotation)
                        .shadows(true, true),
                );
                stats.rocks += 1;
            }
        }

        let mut dune_material = None;
        for i in -FIELD_SPAN..=FIELD_SPAN {
            if i.abs() < CORRIDOR_HALF_WIDTH {
                continue;
            }
            for j in -FIELD_SPAN..=FIELD_SPAN {
                if !self.passes(0.8) {
                    continue;
                }
                let radius = self.rng.random_range(5.0..10.0);
                let geometry = scene.add_geometry(Geometry::Dome { radius, segments: 7 });
                let dune_material = *dune_material.get_or_insert_with(|| {
                    scene.add_material(Material::colored(Rgb::from_hex(0xf5_de_b3)).with_surface(1.0, 0.0))
                });
                scene.spawn(
                    root,
                    Node::mesh(geometry, dune_material)
                        .named("dune")
                        .at(i as f32 * 15.0, -1.0, j as f32 * 20.0)
                        .shadows(false, true),
                );
                stats.dunes += 1;
            }
        }
    }
}
