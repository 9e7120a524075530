//! Bevy side of the render and guide backends.
//!
//! [`SceneQueue`] and [`LabelQueue`] implement the backend traits by recording
//! operations. Flush systems replay them into meshes, materials and UI text
//! once per frame, so the core never touches the ECS directly.

use bevy::color::Alpha;
use bevy::prelude::*;
use bevy::render::mesh::PrimitiveTopology;
use bevy::render::render_asset::RenderAssetUsages;
use mobility_events::AgentId;
use std::collections::{HashMap, HashSet};

use crate::camera::MainCamera;
use crate::labels::{
    GuideBackend, LabelKind, LabelTextureFactory, LineSegment, SceneLayer, TextLabel,
};
use crate::plugin::VizContext;
use crate::render_objects::{RenderBackend, RenderStyle, BASE_RADIUS};

/// Plugin for render-object and guide flushing.
pub struct ScenePlugin;

impl Plugin for ScenePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SceneEntities>()
            .add_systems(Startup, setup_scene_assets)
            .add_systems(
                Update,
                (advance_frame, flush_scene_queue, flush_guide_queue, position_world_labels).chain(),
            );
    }
}

/// Handle of one render object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectHandle(pub u64);

/// Recorded render-object operation.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneOp {
    Spawn {
        handle: ObjectHandle,
        agent: AgentId,
        position: Vec3,
        style: RenderStyle,
    },
    Move {
        handle: ObjectHandle,
        position: Vec3,
    },
    Restyle {
        handle: ObjectHandle,
        style: RenderStyle,
    },
    Despawn(ObjectHandle),
}

/// Folds moves, restyles and despawns aimed at an object spawned earlier in
/// the same batch into that spawn, so nothing targets an entity that does not
/// exist yet.
pub fn coalesce_spawns(ops: impl IntoIterator<Item = SceneOp>) -> Vec<SceneOp> {
    let mut out: Vec<Option<SceneOp>> = Vec::new();
    let mut spawned: HashMap<ObjectHandle, usize> = HashMap::new();

    for op in ops {
        let pending = match &op {
            SceneOp::Spawn { .. } => None,
            SceneOp::Move { handle, .. }
            | SceneOp::Restyle { handle, .. }
            | SceneOp::Despawn(handle) => spawned.get(handle).copied(),
        };
        let Some(index) = pending else {
            if let SceneOp::Spawn { handle, .. } = &op {
                spawned.insert(*handle, out.len());
            }
            out.push(Some(op));
            continue;
        };

        let leftover = match (op, &mut out[index]) {
            (SceneOp::Move { position: new, .. }, Some(SceneOp::Spawn { position, .. })) => {
                *position = new;
                None
            }
            (SceneOp::Restyle { style: new, .. }, Some(SceneOp::Spawn { style, .. })) => {
                *style = new;
                None
            }
            (SceneOp::Despawn(handle), slot) => {
                spawned.remove(&handle);
                *slot = None;
                None
            }
            (op, _) => Some(op),
        };
        out.extend(leftover.map(Some));
    }

    out.into_iter().flatten().collect()
}

/// Render backend that queues operations for the flush system.
#[derive(Debug, Default)]
pub struct SceneQueue {
    next: u64,
    live: HashSet<ObjectHandle>,
    ops: Vec<SceneOp>,
}

impl SceneQueue {
    /// Number of objects created and not yet disposed.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn pending(&self) -> &[SceneOp] {
        &self.ops
    }

    pub fn drain(&mut self) -> std::vec::Drain<'_, SceneOp> {
        self.ops.drain(..)
    }
}

impl RenderBackend for SceneQueue {
    type Handle = ObjectHandle;

    fn create(&mut self, id: AgentId, position: Vec3, style: &RenderStyle) -> ObjectHandle {
        self.next += 1;
        let handle = ObjectHandle(self.next);
        self.live.insert(handle);
        self.ops.push(SceneOp::Spawn {
            handle,
            agent: id,
            position,
            style: *style,
        });
        handle
    }

    fn set_position(&mut self, handle: &ObjectHandle, position: Vec3) {
        self.ops.push(SceneOp::Move {
            handle: *handle,
            position,
        });
    }

    fn set_style(&mut self, handle: &ObjectHandle, style: &RenderStyle) {
        self.ops.push(SceneOp::Restyle {
            handle: *handle,
            style: *style,
        });
    }

    fn dispose(&mut self, handle: ObjectHandle) {
        if self.live.remove(&handle) {
            self.ops.push(SceneOp::Despawn(handle));
        }
    }
}

/// Handle of one guide object (line batch or label).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GuideHandle(pub u64);

/// Recorded guide operation.
#[derive(Debug, Clone, PartialEq)]
pub enum GuideOp {
    SpawnLines {
        handle: GuideHandle,
        layer: SceneLayer,
        lines: Vec<LineSegment>,
    },
    SpawnLabel {
        handle: GuideHandle,
        label: TextLabel,
    },
    Despawn(GuideHandle),
}

/// Guide backend that queues operations for the flush system.
#[derive(Debug, Default)]
pub struct LabelQueue {
    next: u64,
    live: HashSet<GuideHandle>,
    ops: Vec<GuideOp>,
}

impl LabelQueue {
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn pending(&self) -> &[GuideOp] {
        &self.ops
    }

    pub fn drain(&mut self) -> std::vec::Drain<'_, GuideOp> {
        self.ops.drain(..)
    }

    fn allocate(&mut self) -> GuideHandle {
        self.next += 1;
        let handle = GuideHandle(self.next);
        self.live.insert(handle);
        handle
    }

    fn release(&mut self, handle: GuideHandle) {
        if self.live.remove(&handle) {
            self.ops.push(GuideOp::Despawn(handle));
        }
    }
}

impl LabelTextureFactory for LabelQueue {
    type Texture = GuideHandle;

    fn rasterize(&mut self, label: &TextLabel) -> GuideHandle {
        let handle = self.allocate();
        self.ops.push(GuideOp::SpawnLabel {
            handle,
            label: label.clone(),
        });
        handle
    }

    fn release_texture(&mut self, texture: GuideHandle) {
        self.release(texture);
    }
}

impl GuideBackend for LabelQueue {
    type Lines = GuideHandle;

    fn create_lines(&mut self, layer: SceneLayer, lines: &[LineSegment]) -> GuideHandle {
        let handle = self.allocate();
        self.ops.push(GuideOp::SpawnLines {
            handle,
            layer,
            lines: lines.to_vec(),
        });
        handle
    }

    fn release_lines(&mut self, lines: GuideHandle) {
        self.release(lines);
    }
}

/// Tags every spawned scene entity with the layer that owns it.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerTag(pub SceneLayer);

/// Component for an agent's sphere.
#[derive(Component, Debug, Clone, Copy)]
pub struct AgentMarker(pub AgentId);

/// Component for a UI label that follows a world position.
#[derive(Component, Debug, Clone, Copy)]
pub struct WorldLabel {
    pub anchor: Vec3,
}

/// Shared mesh for agent spheres.
#[derive(Resource)]
pub struct SceneAssets {
    pub sphere: Handle<Mesh>,
}

/// Resource mapping backend handles to their entities.
#[derive(Resource, Default)]
pub struct SceneEntities {
    pub objects: HashMap<ObjectHandle, Entity>,
    pub guides: HashMap<GuideHandle, Entity>,
}

fn setup_scene_assets(mut commands: Commands, mut meshes: ResMut<Assets<Mesh>>) {
    commands.insert_resource(ClearColor(Color::srgb_u8(0x0a, 0x0a, 0x0a)));
    commands.insert_resource(SceneAssets {
        sphere: meshes.add(Sphere::new(BASE_RADIUS).mesh().uv(32, 16)),
    });
}

fn agent_material(style: &RenderStyle) -> StandardMaterial {
    StandardMaterial {
        base_color: style.color.with_alpha(style.opacity()),
        emissive: style.emissive(),
        alpha_mode: AlphaMode::Blend,
        perceptual_roughness: 0.3,
        reflectance: 0.6,
        ..default()
    }
}

/// System to step the context one frame.
fn advance_frame(time: Res<Time>, mut ctx: ResMut<VizContext>) {
    ctx.tick(time.elapsed_seconds());
}

/// System to replay queued render-object operations into the world.
pub fn flush_scene_queue(
    mut commands: Commands,
    mut ctx: ResMut<VizContext>,
    assets: Option<Res<SceneAssets>>,
    mut entities: ResMut<SceneEntities>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut agents: Query<(&mut Transform, &Handle<StandardMaterial>), With<AgentMarker>>,
) {
    let Some(assets) = assets else {
        return;
    };

    for op in coalesce_spawns(ctx.objects_mut().backend_mut().drain()) {
        match op {
            SceneOp::Spawn {
                handle,
                agent,
                position,
                style,
            } => {
                let entity = commands
                    .spawn((
                        PbrBundle {
                            mesh: assets.sphere.clone(),
                            material: materials.add(agent_material(&style)),
                            transform: Transform::from_translation(position)
                                .with_scale(Vec3::splat(style.scale)),
                            ..default()
                        },
                        AgentMarker(agent),
                        LayerTag(SceneLayer::Entities),
                    ))
                    .id();
                entities.objects.insert(handle, entity);
            }
            SceneOp::Move { handle, position } => {
                let Some(&entity) = entities.objects.get(&handle) else {
                    continue;
                };
                if let Ok((mut transform, _)) = agents.get_mut(entity) {
                    transform.translation = position;
                }
            }
            SceneOp::Restyle { handle, style } => {
                let Some(&entity) = entities.objects.get(&handle) else {
                    continue;
                };
                if let Ok((mut transform, material)) = agents.get_mut(entity) {
                    transform.scale = Vec3::splat(style.scale);
                    if let Some(material) = materials.get_mut(material) {
                        *material = agent_material(&style);
                    }
                }
            }
            SceneOp::Despawn(handle) => {
                let Some(entity) = entities.objects.remove(&handle) else {
                    continue;
                };
                if let Ok((_, material)) = agents.get(entity) {
                    materials.remove(material);
                }
                commands.entity(entity).despawn_recursive();
            }
        }
    }
}

fn label_font_size(kind: LabelKind) -> f32 {
    match kind {
        LabelKind::AxisTitle => 18.0,
        LabelKind::Tick | LabelKind::Category => 14.0,
    }
}

fn line_mesh(lines: &[LineSegment]) -> Mesh {
    let mut positions = Vec::with_capacity(lines.len() * 2);
    let mut colors = Vec::with_capacity(lines.len() * 2);
    for line in lines {
        let c = LinearRgba::from(line.color);
        let color = [c.red, c.green, c.blue, c.alpha];
        positions.push(line.start.to_array());
        positions.push(line.end.to_array());
        colors.push(color);
        colors.push(color);
    }
    Mesh::new(PrimitiveTopology::LineList, RenderAssetUsages::default())
        .with_inserted_attribute(Mesh::ATTRIBUTE_POSITION, positions)
        .with_inserted_attribute(Mesh::ATTRIBUTE_COLOR, colors)
}

/// System to replay queued guide operations into the world.
pub fn flush_guide_queue(
    mut commands: Commands,
    mut ctx: ResMut<VizContext>,
    mut entities: ResMut<SceneEntities>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    guide_assets: Query<(&Handle<Mesh>, &Handle<StandardMaterial>), With<LayerTag>>,
) {
    for op in ctx.layers_mut().backend_mut().drain() {
        match op {
            GuideOp::SpawnLines {
                handle,
                layer,
                lines,
            } => {
                let entity = commands
                    .spawn((
                        PbrBundle {
                            mesh: meshes.add(line_mesh(&lines)),
                            material: materials.add(StandardMaterial {
                                base_color: Color::WHITE,
                                unlit: true,
                                ..default()
                            }),
                            ..default()
                        },
                        LayerTag(layer),
                    ))
                    .id();
                entities.guides.insert(handle, entity);
            }
            GuideOp::SpawnLabel { handle, label } => {
                let entity = commands
                    .spawn((
                        TextBundle::from_section(
                            label.text,
                            TextStyle {
                                font_size: label_font_size(label.kind),
                                color: Color::WHITE,
                                ..default()
                            },
                        )
                        .with_style(Style {
                            position_type: PositionType::Absolute,
                            ..default()
                        }),
                        WorldLabel {
                            anchor: label.anchor,
                        },
                        LayerTag(SceneLayer::Labels),
                    ))
                    .id();
                entities.guides.insert(handle, entity);
            }
            GuideOp::Despawn(handle) => {
                let Some(entity) = entities.guides.remove(&handle) else {
                    continue;
                };
                if let Ok((mesh, material)) = guide_assets.get(entity) {
                    meshes.remove(mesh);
                    materials.remove(material);
                }
                commands.entity(entity).despawn_recursive();
            }
        }
    }
}

/// System to keep labels over their world anchors.
fn position_world_labels(
    camera_query: Query<(&Camera, &GlobalTransform), With<MainCamera>>,
    mut labels: Query<(&WorldLabel, &mut Style, &mut Visibility)>,
) {
    let Ok((camera, camera_transform)) = camera_query.get_single() else {
        return;
    };

    for (label, mut style, mut visibility) in labels.iter_mut() {
        match camera.world_to_viewport(camera_transform, label.anchor) {
            Some(position) => {
                style.left = Val::Px(position.x);
                style.top = Val::Px(position.y);
                *visibility = Visibility::Inherited;
            }
            None => *visibility = Visibility::Hidden,
        }
    }
}
