//! Arena-backed scene graph.
//!
//! Nodes, geometries and materials live in generational arenas and refer to
//! each other by key. Parent/child edges are explicit on each node, and a node
//! never owns a geometry or material directly: resources are reference counted
//! by the mesh nodes using them and released exactly once, when the last user
//! is despawned.
//!
//! Every structural change is queued as a [`SceneEvent`] so a render backend
//! can mirror the graph into GPU resources without the graph knowing about it.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use slotmap::{SlotMap, new_key_type};

new_key_type! {
    /// Stable handle to a scene node.
    pub struct NodeId;
    /// Stable handle to a geometry resource.
    pub struct GeometryId;
    /// Stable handle to a material resource.
    pub struct MaterialId;
}

// ============================================================================
// Value types
// ============================================================================

/// Linear-ish RGB colour with components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0.0, 0.0, 0.0);
    pub const WHITE: Rgb = Rgb::new(1.0, 1.0, 1.0);

    #[must_use]
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Build a colour from a `0xRRGGBB` literal.
    #[must_use]
    pub const fn from_hex(hex: u32) -> Self {
        Self {
            r: ((hex >> 16) & 0xff) as f32 / 255.0,
            g: ((hex >> 8) & 0xff) as f32 / 255.0,
            b: (hex & 0xff) as f32 / 255.0,
        }
    }

    #[must_use]
    pub fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }
}

/// Shape description for a mesh. Dimensions are in world units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Geometry {
    /// Horizontal plane in XZ facing +Y.
    Plane { width: f32, depth: f32 },
    /// Axis-aligned box centred on the origin.
    Cuboid { width: f32, height: f32, depth: f32 },
    /// Cylinder along Y; unequal radii give a frustum.
    Cylinder {
        radius_top: f32,
        radius_bottom: f32,
        height: f32,
        segments: u32,
    },
    /// Cone along Y with its base centred below the origin.
    Cone { radius: f32, height: f32, segments: u32 },
    Sphere { radius: f32, segments: u32 },
    /// Upper half of a sphere, flat side down.
    Dome { radius: f32, segments: u32 },
    Dodecahedron { radius: f32 },
}

/// Surface description for a mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub base_color: Rgb,
    pub emissive: Rgb,
    pub emissive_intensity: f32,
    pub roughness: f32,
    pub metalness: f32,
    /// 1.0 is opaque.
    pub opacity: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            base_color: Rgb::WHITE,
            emissive: Rgb::BLACK,
            emissive_intensity: 1.0,
            roughness: 1.0,
            metalness: 0.0,
            opacity: 1.0,
        }
    }
}

impl Material {
    #[must_use]
    pub fn colored(base_color: Rgb) -> Self {
        Self {
            base_color,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_surface(mut self, roughness: f32, metalness: f32) -> Self {
        self.roughness = roughness;
        self.metalness = metalness;
        self
    }

    #[must_use]
    pub fn with_emissive(mut self, emissive: Rgb, intensity: f32) -> Self {
        self.emissive = emissive;
        self.emissive_intensity = intensity;
        self
    }

    #[must_use]
    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }
}

/// Local transform of a node relative to its parent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    #[must_use]
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    #[must_use]
    pub fn from_xyz(x: f32, y: f32, z: f32) -> Self {
        Self::from_translation(Vec3::new(x, y, z))
    }
}

/// Exponential fog settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fog {
    pub color: Rgb,
    pub density: f32,
}

/// What a node is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeKind {
    /// Pure transform node with children.
    Group,
    Mesh {
        geometry: GeometryId,
        material: MaterialId,
    },
    PointLight {
        color: Rgb,
        intensity: f32,
        range: f32,
    },
    AmbientLight {
        color: Rgb,
        intensity: f32,
    },
    DirectionalLight {
        color: Rgb,
        intensity: f32,
    },
}

/// A scene node.
#[derive(Debug, Clone)]
pub struct Node {
    pub name: Option<&'static str>,
    pub kind: NodeKind,
    pub transform: Transform,
    pub cast_shadows: bool,
    pub receive_shadows: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    #[must_use]
    pub fn new(kind: NodeKind) -> Self {
        Self {
            name: None,
            kind,
            transform: Transform::IDENTITY,
            cast_shadows: false,
            receive_shadows: false,
            parent: None,
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn group() -> Self {
        Self::new(NodeKind::Group)
    }

    #[must_use]
    pub fn mesh(geometry: GeometryId, material: MaterialId) -> Self {
        Self::new(NodeKind::Mesh { geometry, material })
    }

    #[must_use]
    pub fn named(mut self, name: &'static str) -> Self {
        self.name = Some(name);
        self
    }

    #[must_use]
    pub fn at(mut self, x: f32, y: f32, z: f32) -> Self {
        self.transform.translation = Vec3::new(x, y, z);
        self
    }

    #[must_use]
    pub fn rotated(mut self, rotation: Quat) -> Self {
        self.transform.rotation = rotation;
        self
    }

    #[must_use]
    pub fn shadows(mut self, cast: bool, receive: bool) -> Self {
        self.cast_shadows = cast;
        self.receive_shadows = receive;
        self
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Structural change queued for the render backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneEvent {
    GeometryAdded(GeometryId),
    GeometryReleased(GeometryId),
    MaterialAdded(MaterialId),
    MaterialChanged(MaterialId),
    MaterialReleased(MaterialId),
    NodeSpawned(NodeId),
    NodeMoved(NodeId),
    /// A light node's intensity changed.
    LightChanged(NodeId),
    /// Emitted children-first when a subtree is despawned.
    NodeDespawned(NodeId),
    /// Background or fog changed.
    EnvironmentChanged,
}

/// Counts of what a disposal released.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Disposal {
    pub nodes: usize,
    pub geometries: usize,
    pub materials: usize,
}

impl Disposal {
    pub fn is_empty(&self) -> bool {
        self.nodes == 0 && self.geometries == 0 && self.materials == 0
    }

    pub fn merge(&mut self, other: Disposal) {
        self.nodes += other.nodes;
        self.geometries += other.geometries;
        self.materials += other.materials;
    }
}

// ============================================================================
// Scene graph
// ============================================================================

/// A resource together with the number of mesh nodes referencing it.
#[derive(Debug)]
struct Shared<T> {
    value: T,
    users: usize,
}

/// The renderable world graph.
#[derive(Debug)]
pub struct SceneGraph {
    nodes: SlotMap<NodeId, Node>,
    geometries: SlotMap<GeometryId, Shared<Geometry>>,
    materials: SlotMap<MaterialId, Shared<Material>>,
    root: NodeId,
    background: Rgb,
    fog: Option<Fog>,
    events: Vec<SceneEvent>,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    /// Create an empty graph containing only the root group.
    #[must_use]
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(Node::group().named("scene"));
        Self {
            nodes,
            geometries: SlotMap::with_key(),
            materials: SlotMap::with_key(),
            root,
            background: Rgb::BLACK,
            fog: None,
            events: vec![SceneEvent::NodeSpawned(root)],
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    // ------------------------------------------------------------------------
    // Resources
    // ------------------------------------------------------------------------

    pub fn add_geometry(&mut self, geometry: Geometry) -> GeometryId {
        let id = self.geometries.insert(Shared {
            value: geometry,
            users: 0,
        });
        self.events.push(SceneEvent::GeometryAdded(id));
        id
    }

    pub fn add_material(&mut self, material: Material) -> MaterialId {
        let id = self.materials.insert(Shared {
            value: material,
            users: 0,
        });
        self.events.push(SceneEvent::MaterialAdded(id));
        id
    }

    pub fn geometry(&self, id: GeometryId) -> Option<&Geometry> {
        self.geometries.get(id).map(|shared| &shared.value)
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id).map(|shared| &shared.value)
    }

    /// Mutable access to a material; queues a change event.
    pub fn material_mut(&mut self, id: MaterialId) -> Option<&mut Material> {
        let shared = self.materials.get_mut(id)?;
        self.events.push(SceneEvent::MaterialChanged(id));
        Some(&mut shared.value)
    }

    pub fn geometry_count(&self) -> usize {
        self.geometries.len()
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    // ------------------------------------------------------------------------
    // Nodes
    // ------------------------------------------------------------------------

    /// Attach `node` under `parent` and return its handle.
    ///
    /// A stale parent handle attaches the node to the root instead.
    pub fn spawn(&mut self, parent: NodeId, mut node: Node) -> NodeId {
        let parent = if self.nodes.contains_key(parent) {
            parent
        } else {
            tracing::warn!("spawn under a despawned parent; attaching to the scene root");
            self.root
        };

        if let NodeKind::Mesh { geometry, material } = node.kind {
            if let Some(shared) = self.geometries.get_mut(geometry) {
                shared.users += 1;
            }
            if let Some(shared) = self.materials.get_mut(material) {
                shared.users += 1;
            }
        }

        node.parent = Some(parent);
        node.children.clear();
        let id = self.nodes.insert(node);
        if let Some(parent_node) = self.nodes.get_mut(parent) {
            parent_node.children.push(id);
        }
        self.events.push(SceneEvent::NodeSpawned(id));
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter()
    }

    /// Replace a node's local transform; queues a move event.
    pub fn set_transform(&mut self, id: NodeId, transform: Transform) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.transform = transform;
            self.events.push(SceneEvent::NodeMoved(id));
        }
    }

    /// Change the intensity of a light node. Non-light nodes are left alone.
    pub fn set_light_intensity(&mut self, id: NodeId, value: f32) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        match &mut node.kind {
            NodeKind::PointLight { intensity, .. }
            | NodeKind::AmbientLight { intensity, .. }
            | NodeKind::DirectionalLight { intensity, .. } => {
                *intensity = value;
                self.events.push(SceneEvent::LightChanged(id));
            }
            NodeKind::Group | NodeKind::Mesh { .. } => {}
        }
    }

    /// Find a direct child of `parent` by name.
    pub fn find_child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.nodes
            .get(parent)?
            .children
            .iter()
            .copied()
            .find(|child| self.nodes.get(*child).and_then(|n| n.name) == Some(name))
    }

    /// Number of nodes in the subtree rooted at `id`, including `id`.
    pub fn subtree_len(&self, id: NodeId) -> usize {
        self.post_order(id).len()
    }

    /// Children-first ordering of the subtree rooted at `id`.
    fn post_order(&self, id: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        if !self.nodes.contains_key(id) {
            return order;
        }
        let mut stack = vec![(id, false)];
        while let Some((current, expanded)) = stack.pop() {
            if expanded {
                order.push(current);
                continue;
            }
            stack.push((current, true));
            if let Some(node) = self.nodes.get(current) {
                stack.extend(node.children.iter().rev().map(|child| (*child, false)));
            }
        }
        order
    }

    /// Detach and destroy the subtree rooted at `id`.
    ///
    /// Each node is removed once; each geometry or material is released when
    /// its last user goes. Resources still used outside the subtree survive.
    /// The root itself cannot be despawned; use [`SceneGraph::clear`].
    pub fn despawn_recursive(&mut self, id: NodeId) -> Disposal {
        let mut disposal = Disposal::default();
        if id == self.root {
            return disposal;
        }

        let order = self.post_order(id);
        if order.is_empty() {
            return disposal;
        }

        if let Some(parent) = self.nodes.get(id).and_then(|n| n.parent)
            && let Some(parent_node) = self.nodes.get_mut(parent)
        {
            parent_node.children.retain(|child| *child != id);
        }

        for node_id in order {
            let Some(node) = self.nodes.remove(node_id) else {
                continue;
            };
            if let NodeKind::Mesh { geometry, material } = node.kind {
                self.release_geometry_user(geometry, &mut disposal);
                self.release_material_user(material, &mut disposal);
            }
            self.events.push(SceneEvent::NodeDespawned(node_id));
            disposal.nodes += 1;
        }
        disposal
    }

    /// Destroy everything below the root and release every remaining resource.
    pub fn clear(&mut self) -> Disposal {
        let mut disposal = Disposal::default();
        let children = self
            .nodes
            .get(self.root)
            .map(|root| root.children.clone())
            .unwrap_or_default();
        for child in children {
            disposal.merge(self.despawn_recursive(child));
        }

        // Resources created but never attached to a node.
        for id in self.geometries.keys().collect::<Vec<_>>() {
            self.geometries.remove(id);
            self.events.push(SceneEvent::GeometryReleased(id));
            disposal.geometries += 1;
        }
        for id in self.materials.keys().collect::<Vec<_>>() {
            self.materials.remove(id);
            self.events.push(SceneEvent::MaterialReleased(id));
            disposal.materials += 1;
        }
        if self.fog.take().is_some() {
            self.events.push(SceneEvent::EnvironmentChanged);
        }
        disposal
    }

    fn release_geometry_user(&mut self, id: GeometryId, disposal: &mut Disposal) {
        let Some(shared) = self.geometries.get_mut(id) else {
            return;
        };
        shared.users = shared.users.saturating_sub(1);
        if shared.users == 0 {
            self.geometries.remove(id);
            self.events.push(SceneEvent::GeometryReleased(id));
            disposal.geometries += 1;
        }
    }

    fn release_material_user(&mut self, id: MaterialId, disposal: &mut Disposal) {
        let Some(shared) = self.materials.get_mut(id) else {
            return;
        };
        shared.users = shared.users.saturating_sub(1);
        if shared.users == 0 {
            self.materials.remove(id);
            self.events.push(SceneEvent::MaterialReleased(id));
            disposal.materials += 1;
        }
    }

    // ------------------------------------------------------------------------
    // Environment
    // ------------------------------------------------------------------------

    pub fn background(&self) -> Rgb {
        self.background
    }

    pub fn fog(&self) -> Option<Fog> {
        self.fog
    }

    pub fn set_environment(&mut self, background: Rgb, fog: Option<Fog>) {
        self.background = background;
        self.fog = fog;
        self.events.push(SceneEvent::EnvironmentChanged);
    }

    // ------------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------------

    /// Take all queued events, oldest first.
    pub fn drain_events(&mut self) -> Vec<SceneEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn has_pending_events(&self) -> bool {
        !self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube() -> Geometry {
        Geometry::Cuboid {
            width: 1.0,
            height: 1.0,
            depth: 1.0,
        }
    }

    #[test]
    fn test_hex_color() {
        let c = Rgb::from_hex(0xff_80_00);
        assert!((c.r - 1.0).abs() < f32::EPSILON);
        assert!((c.g - 128.0 / 255.0).abs() < f32::EPSILON);
        assert!(c.b.abs() < f32::EPSILON);
    }

    #[test]
    fn test_spawn_links_parent_and_child() {
        let mut scene = SceneGraph::new();
        let group = scene.spawn(scene.root(), Node::group().named("car"));
        let g = scene.add_geometry(cube());
        let m = scene.add_material(Material::default());
        let body = scene.spawn(group, Node::mesh(g, m).named("body"));

        assert_eq!(scene.node(body).unwrap().parent(), Some(group));
        assert_eq!(scene.node(group).unwrap().children(), &[body]);
        assert_eq!(scene.find_child(scene.root(), "car"), Some(group));
        assert_eq!(scene.find_child(group, "body"), Some(body));
        assert_eq!(scene.subtree_len(group), 2);
    }

    #[test]
    fn test_shared_resources_released_once() {
        let mut scene = SceneGraph::new();
        let group = scene.spawn(scene.root(), Node::group());
        let g = scene.add_geometry(cube());
        let m = scene.add_material(Material::default());
        for _ in 0..4 {
            scene.spawn(group, Node::mesh(g, m));
        }
        scene.drain_events();

        let disposal = scene.despawn_recursive(group);
        assert_eq!(
            disposal,
            Disposal {
                nodes: 5,
                geometries: 1,
                materials: 1,
            }
        );

        let events = scene.drain_events();
        let geometry_releases = events
            .iter()
            .filter(|e| matches!(e, SceneEvent::GeometryReleased(_)))
            .count();
        let material_releases = events
            .iter()
            .filter(|e| matches!(e, SceneEvent::MaterialReleased(_)))
            .count();
        assert_eq!(geometry_releases, 1);
        assert_eq!(material_releases, 1);
        assert_eq!(scene.geometry_count(), 0);
        assert_eq!(scene.material_count(), 0);
    }

    #[test]
    fn test_resource_used_outside_subtree_survives() {
        let mut scene = SceneGraph::new();
        let g = scene.add_geometry(cube());
        let m = scene.add_material(Material::default());
        let a = scene.spawn(scene.root(), Node::mesh(g, m));
        let b = scene.spawn(scene.root(), Node::mesh(g, m));

        let first = scene.despawn_recursive(a);
        assert_eq!(first.geometries, 0);
        assert!(scene.geometry(g).is_some());

        let second = scene.despawn_recursive(b);
        assert_eq!(second.geometries, 1);
        assert_eq!(second.materials, 1);
        assert!(scene.geometry(g).is_none());
    }

    #[test]
    fn test_despawn_is_children_first_and_detaches() {
        let mut scene = SceneGraph::new();
        let parent = scene.spawn(scene.root(), Node::group());
        let child = scene.spawn(parent, Node::group());
        let grandchild = scene.spawn(child, Node::group());
        scene.drain_events();

        scene.despawn_recursive(parent);
        let despawned: Vec<_> = scene
            .drain_events()
            .into_iter()
            .filter_map(|e| match e {
                SceneEvent::NodeDespawned(id) => Some(id),
                _ => None,
            })
            .collect();
        assert_eq!(despawned, vec![grandchild, child, parent]);
        assert!(scene.node(scene.root()).unwrap().children().is_empty());
        assert_eq!(scene.node_count(), 1);
    }

    #[test]
    fn test_stale_handle_is_a_no_op() {
        let mut scene = SceneGraph::new();
        let g = scene.add_geometry(cube());
        let m = scene.add_material(Material::default());
        let node = scene.spawn(scene.root(), Node::mesh(g, m));

        assert!(!scene.despawn_recursive(node).is_empty());
        assert!(scene.despawn_recursive(node).is_empty());
        assert!(scene.despawn_recursive(scene.root()).is_empty());
    }

    #[test]
    fn test_clear_releases_orphans() {
        let mut scene = SceneGraph::new();
        let g = scene.add_geometry(cube());
        let m = scene.add_material(Material::default());
        scene.spawn(scene.root(), Node::mesh(g, m));
        scene.add_geometry(Geometry::Dodecahedron { radius: 1.0 });

        let disposal = scene.clear();
        assert_eq!(disposal.nodes, 1);
        assert_eq!(disposal.geometries, 2);
        assert_eq!(disposal.materials, 1);
        assert_eq!(scene.node_count(), 1);
        assert!(scene.clear().is_empty());
    }

    #[test]
    fn test_clear_drops_fog_and_reports_it() {
        let mut scene = SceneGraph::new();
        scene.set_environment(
            Rgb::WHITE,
            Some(Fog {
                color: Rgb::WHITE,
                density: 0.01,
            }),
        );
        scene.drain_events();

        scene.clear();
        assert!(scene.fog().is_none());
        assert!(scene.drain_events().contains(&SceneEvent::EnvironmentChanged));

        // Nothing left to report the second time round.
        scene.clear();
        assert!(!scene.drain_events().contains(&SceneEvent::EnvironmentChanged));
    }

    #[test]
    fn test_light_intensity_only_touches_lights() {
        let mut scene = SceneGraph::new();
        let light = scene.spawn(
            scene.root(),
            Node::new(NodeKind::AmbientLight {
                color: Rgb::WHITE,
                intensity: 0.5,
            }),
        );
        let group = scene.spawn(scene.root(), Node::group());
        scene.drain_events();

        scene.set_light_intensity(light, 0.9);
        scene.set_light_intensity(group, 0.9);
        assert_eq!(scene.drain_events(), vec![SceneEvent::LightChanged(light)]);
        assert!(matches!(
            scene.node(light).unwrap().kind,
            NodeKind::AmbientLight { intensity, .. } if (intensity - 0.9).abs() < f32::EPSILON
        ));
    }

    #[test]
    fn test_material_mut_queues_change() {
        let mut scene = SceneGraph::new();
        let m = scene.add_material(Material::default());
        scene.drain_events();

        scene.material_mut(m).unwrap().emissive_intensity = 6.0;
        assert_eq!(scene.drain_events(), vec![SceneEvent::MaterialChanged(m)]);
        assert!((scene.material(m).unwrap().emissive_intensity - 6.0).abs() < f32::EPSILON);
    }
}
