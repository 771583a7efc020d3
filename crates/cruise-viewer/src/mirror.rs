//! Mirrors the core scene graph into Bevy entities and assets.
//!
//! Each frame the queued [`MirrorOp`]s are drained from the backend and
//! applied in order: geometries become `Mesh` assets, materials become
//! `StandardMaterial`s, nodes become entities parented with `ChildOf`. The
//! latest views recorded by the backend then drive the two cameras.

use std::collections::HashMap;

use bevy::{
    camera::{ClearColorConfig, ScalingMode, Viewport},
    ecs::system::EntityCommands,
    light::{GlobalAmbientLight, NotShadowCaster, NotShadowReceiver, light_consts::lux},
    mesh::{Indices, VertexAttributeValues},
    pbr::{DistanceFog, FogFalloff},
    prelude::*,
    window::PrimaryWindow,
};
use cruise_core::{
    SurfaceRole, SurfaceSize, View,
    render::Projection as ViewProjection,
    scene::{
        Fog, Geometry, GeometryId, Material, MaterialId, Node, NodeId, NodeKind, Rgb,
        Transform as NodeTransform,
    },
};

use crate::{DriveSet, backend::MirrorOp, host::SimulationHost};

/// Lumens per unit of core point-light intensity.
const POINT_LIGHT_LUMENS: f32 = 100_000.0;
/// Ambient brightness per unit of core ambient intensity.
const AMBIENT_BRIGHTNESS: f32 = 400.0;
/// Margin between the minimap overlay and the bottom-left window corner, in
/// physical pixels.
const MINIMAP_MARGIN: u32 = 16;

// ============================================================================
// Components & resources
// ============================================================================

/// The full-window chase camera.
#[derive(Component)]
pub struct MainCamera;

/// The top-down overlay camera.
#[derive(Component)]
pub struct MinimapCamera;

/// Bevy-side handles for every live scene object.
#[derive(Resource, Default)]
pub struct SceneMirror {
    nodes: HashMap<NodeId, Entity>,
    meshes: HashMap<GeometryId, Handle<Mesh>>,
    materials: HashMap<MaterialId, Handle<StandardMaterial>>,
    ambient: Option<NodeId>,
}

impl SceneMirror {
    pub fn entity_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }
}

// ============================================================================
// Plugin
// ============================================================================

/// Plugin that keeps Bevy in step with the simulation's scene.
pub struct SceneMirrorPlugin;

impl Plugin for SceneMirrorPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SceneMirror>()
            .add_systems(Startup, spawn_cameras)
            .add_systems(
                Update,
                (apply_mirror_ops, sync_cameras)
                    .chain()
                    .in_set(DriveSet::Mirror),
            )
            // Teardown in `Last` queues despawns that still need applying.
            .add_systems(Last, apply_mirror_ops);
    }
}

fn spawn_cameras(mut commands: Commands) {
    commands.spawn((
        Name::new("Main camera"),
        MainCamera,
        Camera3d::default(),
        Camera {
            clear_color: ClearColorConfig::Custom(Color::BLACK),
            ..default()
        },
        Transform::default(),
        Projection::Perspective(PerspectiveProjection::default()),
    ));

    commands.spawn((
        Name::new("Minimap camera"),
        MinimapCamera,
        Camera3d::default(),
        Camera {
            order: 1,
            clear_color: ClearColorConfig::Custom(Color::BLACK),
            // Hidden until the first minimap view arrives.
            is_active: false,
            ..default()
        },
        Transform::default(),
        Projection::Orthographic(OrthographicProjection::default_3d()),
    ));
}

// ============================================================================
// Scene ops
// ============================================================================

#[allow(clippy::too_many_arguments)]
pub(crate) fn apply_mirror_ops(
    mut commands: Commands,
    mut host: ResMut<SimulationHost>,
    mut mirror: ResMut<SceneMirror>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut ambient: ResMut<GlobalAmbientLight>,
    mut cameras: Query<&mut Camera>,
    main_camera: Single<Entity, With<MainCamera>>,
) {
    let ops = host.sim.backend_mut().drain_ops();
    if ops.is_empty() {
        return;
    }

    for op in ops {
        match op {
            MirrorOp::AddGeometry(id, geometry) => {
                mirror.meshes.insert(id, meshes.add(geometry_mesh(geometry)));
            }
            MirrorOp::ReleaseGeometry(id) => {
                // Dropping the strong handle frees the asset.
                mirror.meshes.remove(&id);
            }
            MirrorOp::UpsertMaterial(id, material) => {
                let value = standard_material(&material);
                if let Some(handle) = mirror.materials.get(&id)
                    && let Some(existing) = materials.get_mut(handle)
                {
                    *existing = value;
                } else {
                    mirror.materials.insert(id, materials.add(value));
                }
            }
            MirrorOp::ReleaseMaterial(id) => {
                mirror.materials.remove(&id);
            }
            MirrorOp::Spawn { id, parent, node } => {
                let entity =
                    spawn_node(&mut commands, &mut mirror, &mut ambient, id, parent, &node);
                mirror.nodes.insert(id, entity);
            }
            MirrorOp::Move { id, transform } => {
                if let Some(&entity) = mirror.nodes.get(&id) {
                    commands.entity(entity).insert(to_bevy_transform(&transform));
                }
            }
            MirrorOp::Light { id, kind } => {
                if let Some(&entity) = mirror.nodes.get(&id) {
                    insert_light(&mut commands.entity(entity), &mut ambient, kind);
                }
            }
            MirrorOp::Despawn(id) => {
                if mirror.ambient == Some(id) {
                    mirror.ambient = None;
                    ambient.brightness = 0.0;
                }
                if let Some(entity) = mirror.nodes.remove(&id) {
                    commands.entity(entity).try_despawn();
                }
            }
            MirrorOp::Environment { background, fog } => {
                for mut camera in &mut cameras {
                    camera.clear_color = ClearColorConfig::Custom(srgb(background));
                }
                apply_fog(&mut commands.entity(*main_camera), fog);
            }
        }
    }

    tracing::trace!(
        entities = mirror.nodes.len(),
        meshes = mirror.meshes.len(),
        materials = mirror.materials.len(),
        "Scene mirror updated"
    );
}

fn spawn_node(
    commands: &mut Commands,
    mirror: &mut SceneMirror,
    ambient: &mut GlobalAmbientLight,
    id: NodeId,
    parent: Option<NodeId>,
    node: &Node,
) -> Entity {
    let mut transform = to_bevy_transform(&node.transform);
    if matches!(node.kind, NodeKind::DirectionalLight { .. }) {
        // Directional lights shine from their position toward the origin.
        transform = transform.looking_at(Vec3::ZERO, Vec3::Y);
    }

    let mut entity = commands.spawn((
        Name::new(node.name.unwrap_or("node")),
        transform,
        Visibility::default(),
    ));
    if let Some(&parent) = parent.and_then(|parent| mirror.nodes.get(&parent)) {
        entity.insert(ChildOf(parent));
    }

    match node.kind {
        NodeKind::Group => {}
        NodeKind::Mesh { geometry, material } => {
            let (Some(mesh), Some(material)) = (
                mirror.meshes.get(&geometry),
                mirror.materials.get(&material),
            ) else {
                tracing::warn!(name = node.name, "Mesh node references a released resource");
                return entity.id();
            };
            entity.insert((Mesh3d(mesh.clone()), MeshMaterial3d(material.clone())));
            if !node.cast_shadows {
                entity.insert(NotShadowCaster);
            }
            if !node.receive_shadows {
                entity.insert(NotShadowReceiver);
            }
        }
        NodeKind::AmbientLight { .. } => {
            mirror.ambient = Some(id);
            insert_light(&mut entity, ambient, node.kind);
        }
        NodeKind::PointLight { .. } | NodeKind::DirectionalLight { .. } => {
            insert_light(&mut entity, ambient, node.kind);
        }
    }
    entity.id()
}

fn insert_light(entity: &mut EntityCommands, ambient: &mut GlobalAmbientLight, kind: NodeKind) {
    match kind {
        NodeKind::PointLight {
            color,
            intensity,
            range,
        } => {
            entity.insert(PointLight {
                color: srgb(color),
                intensity: intensity * POINT_LIGHT_LUMENS,
                range,
                ..default()
            });
        }
        NodeKind::DirectionalLight { color, intensity } => {
            entity.insert(DirectionalLight {
                color: srgb(color),
                illuminance: intensity * lux::AMBIENT_DAYLIGHT,
                shadows_enabled: true,
                ..default()
            });
        }
        NodeKind::AmbientLight { color, intensity } => {
            ambient.color = srgb(color);
            ambient.brightness = intensity * AMBIENT_BRIGHTNESS;
        }
        NodeKind::Group | NodeKind::Mesh { .. } => {}
    }
}

fn apply_fog(camera: &mut EntityCommands, fog: Option<Fog>) {
    match fog {
        Some(fog) => {
            camera.insert(DistanceFog {
                color: srgb(fog.color),
                falloff: FogFalloff::Exponential {
                    density: fog.density,
                },
                ..default()
            });
        }
        None => {
            camera.remove::<DistanceFog>();
        }
    }
}

// ============================================================================
// Cameras
// ============================================================================

fn sync_cameras(
    host: Res<SimulationHost>,
    window: Single<&Window, With<PrimaryWindow>>,
    mut main_camera: Single<
        (&mut Transform, &mut Projection),
        (With<MainCamera>, Without<MinimapCamera>),
    >,
    mut minimap_camera: Single<
        (&mut Camera, &mut Transform, &mut Projection),
        (With<MinimapCamera>, Without<MainCamera>),
    >,
) {
    let backend = host.sim.backend();

    if let Some(view) = backend.view(SurfaceRole::Main) {
        let (transform, projection) = &mut *main_camera;
        apply_view(transform, projection, view);
    }

    let (camera, transform, projection) = &mut *minimap_camera;
    match (backend.view(SurfaceRole::Minimap), backend.minimap_size()) {
        (Some(view), Some(size)) => {
            apply_view(transform, projection, view);
            camera.is_active = true;
            camera.viewport = Some(minimap_viewport(window.physical_height(), size));
        }
        _ => camera.is_active = false,
    }
}

/// Overlay viewport pinned to the bottom-left corner, clear of the dashboard.
fn minimap_viewport(window_height: u32, size: SurfaceSize) -> Viewport {
    let physical_size = UVec2::new(size.width.max(1), size.height.max(1));
    let top = window_height.saturating_sub(physical_size.y + MINIMAP_MARGIN);
    Viewport {
        physical_position: UVec2::new(MINIMAP_MARGIN, top),
        physical_size,
        ..default()
    }
}

fn apply_view(transform: &mut Transform, projection: &mut Projection, view: &View) {
    *transform = Transform::from_translation(view.position).looking_at(view.look_target, view.up);
    *projection = match view.projection {
        ViewProjection::Perspective {
            fov_y, near, far, ..
        } => Projection::Perspective(PerspectiveProjection {
            fov: fov_y,
            near,
            far,
            ..default()
        }),
        ViewProjection::Orthographic {
            half_extent,
            near,
            far,
        } => Projection::Orthographic(OrthographicProjection {
            scaling_mode: ScalingMode::Fixed {
                width: half_extent * 2.0,
                height: half_extent * 2.0,
            },
            near,
            far,
            ..OrthographicProjection::default_3d()
        }),
    };
}

// ============================================================================
// Conversions
// ============================================================================

fn srgb(color: Rgb) -> Color {
    Color::srgb(color.r, color.g, color.b)
}

fn to_bevy_transform(transform: &NodeTransform) -> Transform {
    Transform {
        translation: transform.translation,
        rotation: transform.rotation,
        scale: transform.scale,
    }
}

fn standard_material(material: &Material) -> StandardMaterial {
    let base = material.base_color;
    StandardMaterial {
        base_color: Color::srgba(base.r, base.g, base.b, material.opacity),
        emissive: srgb(material.emissive).to_linear() * material.emissive_intensity,
        perceptual_roughness: material.roughness,
        metallic: material.metalness,
        alpha_mode: if material.opacity < 1.0 {
            AlphaMode::Blend
        } else {
            AlphaMode::Opaque
        },
        ..default()
    }
}

fn geometry_mesh(geometry: Geometry) -> Mesh {
    match geometry {
        Geometry::Plane { width, depth } => {
            Plane3d::new(Vec3::Y, Vec2::new(width / 2.0, depth / 2.0)).into()
        }
        Geometry::Cuboid {
            width,
            height,
            depth,
        } => Cuboid::new(width, height, depth).into(),
        Geometry::Cylinder {
            radius_top,
            radius_bottom,
            height,
            segments,
        } => {
            if (radius_top - radius_bottom).abs() <= f32::EPSILON {
                Cylinder::new(radius_top, height)
                    .mesh()
                    .resolution(segments)
                    .build()
            } else {
                ConicalFrustum {
                    radius_top,
                    radius_bottom,
                    height,
                }
                .mesh()
                .resolution(segments)
                .build()
            }
        }
        Geometry::Cone {
            radius,
            height,
            segments,
        } => Cone { radius, height }.mesh().resolution(segments).build(),
        Geometry::Sphere { radius, segments } => {
            Sphere::new(radius).mesh().uv(segments, (segments / 2).max(2))
        }
        Geometry::Dome { radius, segments } => dome_mesh(radius, segments),
        // Icosphere at subdivision zero: a faceted twelve-vertex rock.
        Geometry::Dodecahedron { radius } => match Sphere::new(radius).mesh().ico(0) {
            Ok(mesh) => mesh,
            Err(error) => {
                tracing::warn!(%error, "Falling back to a UV sphere");
                Sphere::new(radius).mesh().uv(6, 4)
            }
        },
    }
}

/// UV sphere with every triangle below the equator dropped.
fn dome_mesh(radius: f32, segments: u32) -> Mesh {
    // An even stack count puts a vertex ring exactly on the equator.
    let stacks = 2 * (segments / 4).max(1);
    let mut mesh = Sphere::new(radius).mesh().uv(segments, stacks);

    let upper = match (mesh.attribute(Mesh::ATTRIBUTE_POSITION), mesh.indices()) {
        (Some(VertexAttributeValues::Float32x3(positions)), Some(indices)) => {
            let indices: Vec<usize> = indices.iter().collect();
            let floor = -radius * 1e-4;
            let kept: Vec<u32> = indices
                .chunks_exact(3)
                .filter(|triangle| triangle.iter().all(|&i| positions[i][1] >= floor))
                .flatten()
                .map(|&i| i as u32)
                .collect();
            Some(kept)
        }
        _ => None,
    };
    if let Some(upper) = upper {
        mesh.insert_indices(Indices::U32(upper));
    }
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex_count(mesh: &Mesh) -> usize {
        match mesh.attribute(Mesh::ATTRIBUTE_POSITION) {
            Some(VertexAttributeValues::Float32x3(positions)) => positions.len(),
            _ => 0,
        }
    }

    #[test]
    fn test_every_geometry_builds_a_mesh() {
        let geometries = [
            Geometry::Plane {
                width: 100.0,
                depth: 1000.0,
            },
            Geometry::Cuboid {
                width: 2.0,
                height: 1.0,
                depth: 4.0,
            },
            Geometry::Cylinder {
                radius_top: 0.4,
                radius_bottom: 0.4,
                height: 0.3,
                segments: 16,
            },
            Geometry::Cylinder {
                radius_top: 0.1,
                radius_bottom: 0.2,
                height: 4.0,
                segments: 8,
            },
            Geometry::Cone {
                radius: 8.0,
                height: 20.0,
                segments: 5,
            },
            Geometry::Sphere {
                radius: 0.3,
                segments: 16,
            },
            Geometry::Dome {
                radius: 5.0,
                segments: 7,
            },
            Geometry::Dodecahedron { radius: 1.0 },
        ];
        for geometry in geometries {
            assert!(vertex_count(&geometry_mesh(geometry)) > 0, "{geometry:?}");
        }
    }

    #[test]
    fn test_dome_has_no_triangles_below_ground() {
        let radius = 5.0;
        let dome = dome_mesh(radius, 7);
        let sphere = Sphere::new(radius).mesh().uv(7, 2);
        let Some(VertexAttributeValues::Float32x3(positions)) =
            dome.attribute(Mesh::ATTRIBUTE_POSITION)
        else {
            panic!("dome has no positions");
        };
        let indices: Vec<usize> = dome.indices().unwrap().iter().collect();

        assert!(!indices.is_empty());
        assert_eq!(indices.len() % 3, 0);
        assert!(indices.len() < sphere.indices().unwrap().len());
        assert!(indices.iter().all(|&i| positions[i][1] >= -1e-3));
        assert!(indices.iter().any(|&i| positions[i][1] > radius * 0.99));
    }

    #[test]
    fn test_minimap_sits_in_bottom_left_corner() {
        let viewport = minimap_viewport(720, SurfaceSize::new(150, 150));
        assert_eq!(viewport.physical_position, UVec2::new(16, 720 - 150 - 16));
        assert_eq!(viewport.physical_size, UVec2::new(150, 150));

        // A window shorter than the overlay pins it to the top instead of underflowing.
        let cramped = minimap_viewport(100, SurfaceSize::new(150, 150));
        assert_eq!(cramped.physical_position, UVec2::new(16, 0));
    }

    #[test]
    fn test_translucent_materials_blend() {
        let glass = standard_material(&Material::colored(Rgb::WHITE).with_opacity(0.7));
        assert!(matches!(glass.alpha_mode, AlphaMode::Blend));
        assert!((glass.base_color.to_srgba().alpha - 0.7).abs() < 1e-6);

        let paint = standard_material(&Material::colored(Rgb::from_hex(0xff_00_00)));
        assert!(matches!(paint.alpha_mode, AlphaMode::Opaque));
    }

    #[test]
    fn test_emissive_scales_with_intensity() {
        let dim = standard_material(&Material::default().with_emissive(Rgb::WHITE, 1.0));
        let bright = standard_material(&Material::default().with_emissive(Rgb::WHITE, 6.0));
        assert!(bright.emissive.red > dim.emissive.red * 5.0);
    }

    #[test]
    fn test_orthographic_view_covers_extent() {
        let mut transform = Transform::default();
        let mut projection = Projection::Perspective(PerspectiveProjection::default());
        let view = View {
            position: Vec3::new(3.0, 100.0, -7.0),
            look_target: Vec3::new(3.0, 0.0, -7.0),
            up: Vec3::NEG_Z,
            projection: ViewProjection::Orthographic {
                half_extent: 50.0,
                near: 1.0,
                far: 1000.0,
            },
        };
        apply_view(&mut transform, &mut projection, &view);

        assert!((transform.forward().as_vec3() - Vec3::NEG_Y).length() < 1e-5);
        assert!((transform.up().as_vec3() - Vec3::NEG_Z).length() < 1e-5);
        let Projection::Orthographic(ortho) = projection else {
            panic!("expected an orthographic projection");
        };
        assert!(matches!(
            ortho.scaling_mode,
            ScalingMode::Fixed { width, height } if (width - 100.0).abs() < f32::EPSILON && (height - 100.0).abs() < f32::EPSILON
        ));
    }
}
