//! Render backend that queues scene changes for the ECS.
//!
//! The simulation lives inside a Bevy resource and cannot touch `Commands` or
//! asset storage while it ticks. [`BevyBackend`] snapshots each scene event
//! into an owned [`MirrorOp`] instead; the mirror systems drain the queue later
//! in the same frame and apply it to entities and assets.

use cruise_core::{
    RenderBackend, SurfaceRole, SurfaceSize, View,
    scene::{
        Fog, Geometry, GeometryId, Material, MaterialId, Node, NodeId, NodeKind, Rgb, SceneEvent,
        SceneGraph, Transform,
    },
};

/// One scene change, detached from the graph it came from.
#[derive(Debug, Clone)]
pub enum MirrorOp {
    AddGeometry(GeometryId, Geometry),
    ReleaseGeometry(GeometryId),
    /// New or changed material.
    UpsertMaterial(MaterialId, Material),
    ReleaseMaterial(MaterialId),
    Spawn {
        id: NodeId,
        parent: Option<NodeId>,
        node: Node,
    },
    Move {
        id: NodeId,
        transform: Transform,
    },
    Light {
        id: NodeId,
        kind: NodeKind,
    },
    Despawn(NodeId),
    Environment {
        background: Rgb,
        fog: Option<Fog>,
    },
}

/// Backend that records scene changes and views for the mirror systems.
#[derive(Debug, Default)]
pub struct BevyBackend {
    ops: Vec<MirrorOp>,
    main_view: Option<View>,
    minimap_view: Option<View>,
    minimap_size: Option<SurfaceSize>,
    released: bool,
}

impl BevyBackend {
    /// Take every queued op, oldest first.
    pub fn drain_ops(&mut self) -> Vec<MirrorOp> {
        std::mem::take(&mut self.ops)
    }

    /// The view most recently rendered into `role`.
    pub fn view(&self, role: SurfaceRole) -> Option<&View> {
        match role {
            SurfaceRole::Main => self.main_view.as_ref(),
            SurfaceRole::Minimap => self.minimap_view.as_ref(),
        }
    }

    pub fn minimap_size(&self) -> Option<SurfaceSize> {
        self.minimap_size
    }

    /// Whether the host surfaces have been handed back.
    pub fn is_released(&self) -> bool {
        self.released
    }

    fn snapshot(event: SceneEvent, scene: &SceneGraph) -> Option<MirrorOp> {
        // Anything created and released within one batch no longer resolves.
        let op = match event {
            SceneEvent::GeometryAdded(id) => MirrorOp::AddGeometry(id, *scene.geometry(id)?),
            SceneEvent::GeometryReleased(id) => MirrorOp::ReleaseGeometry(id),
            SceneEvent::MaterialAdded(id) | SceneEvent::MaterialChanged(id) => {
                MirrorOp::UpsertMaterial(id, *scene.material(id)?)
            }
            SceneEvent::MaterialReleased(id) => MirrorOp::ReleaseMaterial(id),
            SceneEvent::NodeSpawned(id) => {
                let node = scene.node(id)?;
                MirrorOp::Spawn {
                    id,
                    parent: node.parent(),
                    node: node.clone(),
                }
            }
            SceneEvent::NodeMoved(id) => MirrorOp::Move {
                id,
                transform: scene.node(id)?.transform,
            },
            SceneEvent::LightChanged(id) => MirrorOp::Light {
                id,
                kind: scene.node(id)?.kind,
            },
            SceneEvent::NodeDespawned(id) => MirrorOp::Despawn(id),
            SceneEvent::EnvironmentChanged => MirrorOp::Environment {
                background: scene.background(),
                fog: scene.fog(),
            },
        };
        Some(op)
    }
}

impl RenderBackend for BevyBackend {
    fn apply_events(&mut self, events: &[SceneEvent], scene: &SceneGraph) {
        self.ops.extend(
            events
                .iter()
                .filter_map(|event| Self::snapshot(*event, scene)),
        );
    }

    fn render(&mut self, role: SurfaceRole, _scene: &SceneGraph, view: &View) {
        match role {
            SurfaceRole::Main => self.main_view = Some(*view),
            SurfaceRole::Minimap => self.minimap_view = Some(*view),
        }
    }

    fn resize(&mut self, role: SurfaceRole, size: SurfaceSize) {
        // The window drives the main camera's viewport; only the overlay needs sizing.
        if role == SurfaceRole::Minimap {
            self.minimap_size = Some(size);
        }
    }

    fn release_surfaces(&mut self) {
        self.released = true;
        self.main_view = None;
        self.minimap_view = None;
    }
}

#[cfg(test)]
mod tests {
    use cruise_core::{HostSurfaces, Simulation, SimulationConfig};

    use super::*;

    fn surfaces() -> HostSurfaces {
        HostSurfaces {
            main: Some(SurfaceSize::new(1280, 720)),
            minimap: Some(SurfaceSize::new(150, 150)),
        }
    }

    fn mounted() -> Simulation<BevyBackend> {
        let mut sim = Simulation::new(
            BevyBackend::default(),
            SimulationConfig {
                seed: Some(11),
                ..Default::default()
            },
        );
        sim.mount(&surfaces()).unwrap();
        sim
    }

    #[test]
    fn test_mount_queues_resources_before_nodes() {
        let mut sim = mounted();
        let ops = sim.backend_mut().drain_ops();

        let first_spawn = ops
            .iter()
            .position(|op| matches!(op, MirrorOp::Spawn { .. }))
            .unwrap();
        let last_geometry = ops
            .iter()
            .rposition(|op| matches!(op, MirrorOp::AddGeometry(..)))
            .unwrap();
        // The scene root is spawned when the graph is created.
        assert!(matches!(ops[first_spawn], MirrorOp::Spawn { parent: None, .. }));
        assert!(
            ops.iter()
                .skip(last_geometry)
                .any(|op| matches!(op, MirrorOp::Spawn { parent: Some(_), .. }))
        );
        assert!(ops.iter().any(|op| matches!(op, MirrorOp::Environment { .. })));
        assert_eq!(sim.backend().minimap_size(), Some(SurfaceSize::new(150, 150)));
    }

    #[test]
    fn test_spawns_follow_their_parents() {
        let mut sim = mounted();
        let ops = sim.backend_mut().drain_ops();

        let mut seen = Vec::new();
        for op in &ops {
            if let MirrorOp::Spawn { id, parent, .. } = op {
                if let Some(parent) = parent {
                    assert!(seen.contains(parent), "child spawned before its parent");
                }
                seen.push(*id);
            }
        }
    }

    #[test]
    fn test_tick_records_both_views() {
        let mut sim = mounted();
        assert!(sim.backend().view(SurfaceRole::Main).is_none());

        sim.tick(1.0 / 60.0);
        let main = sim.backend().view(SurfaceRole::Main).copied().unwrap();
        let minimap = sim.backend().view(SurfaceRole::Minimap).copied().unwrap();
        assert_eq!(main.look_target, sim.vehicle_state().position);
        assert!(minimap.position.y > main.position.y);
    }

    #[test]
    fn test_unmount_releases_surfaces_and_queues_despawns() {
        let mut sim = mounted();
        sim.tick(1.0 / 60.0);
        sim.backend_mut().drain_ops();

        sim.unmount().unwrap();
        let ops = sim.backend_mut().drain_ops();
        assert!(sim.backend().is_released());
        assert!(sim.backend().view(SurfaceRole::Main).is_none());
        assert!(ops.iter().any(|op| matches!(op, MirrorOp::Despawn(_))));
        assert!(ops.iter().any(|op| matches!(op, MirrorOp::ReleaseGeometry(_))));
        assert!(ops.iter().any(|op| matches!(op, MirrorOp::ReleaseMaterial(_))));
    }

    #[test]
    fn test_stale_events_are_skipped() {
        let mut scene = SceneGraph::new();
        let geometry = scene.add_geometry(Geometry::Sphere {
            radius: 1.0,
            segments: 8,
        });
        let material = scene.add_material(Material::default());
        let node = scene.spawn(scene.root(), Node::mesh(geometry, material));
        let _ = scene.despawn_recursive(node);

        let mut backend = BevyBackend::default();
        let events = scene.drain_events();
        backend.apply_events(&events, &scene);
        let ops = backend.drain_ops();

        assert!(!ops.iter().any(|op| matches!(op, MirrorOp::AddGeometry(..))));
        assert!(!ops.iter().any(|op| matches!(op, MirrorOp::Spawn { id, .. } if *id == node)));
        assert!(ops.iter().any(|op| matches!(op, MirrorOp::Despawn(id) if *id == node)));
    }
}
