use crate::{web::BoardReceived, Settings};
use bevy::prelude::*;
use bevy_chess_board::{
    board::{Piece, PieceColor, PieceKind},
    placement::{BoardLayout, BoardPlacer, PlacementService, CELL_SPACING},
};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Cells per side of the drawn board.
const BOARD_CELLS: usize = 8;
const TILE_HEIGHT: f32 = 0.1;

pub struct BoardRenderPlugin;

impl Plugin for BoardRenderPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<ClearPieces>()
            .insert_resource(Placer(BoardPlacer::default()))
            .add_systems(Startup, (setup_assets, setup_scene))
            .add_systems(Update, (follow_layout, place_pieces).chain());
    }
}

/// Removes every placed piece.
#[derive(Event)]
pub struct ClearPieces;

#[derive(Resource, Deref, DerefMut)]
pub struct Placer(BoardPlacer<Entity>);

#[allow(dead_code)]
#[derive(Component)]
pub struct ChessPiece {
    pub piece: Piece,
}

#[derive(Component)]
pub struct BoardTile {
    row: usize,
    col: usize,
}

/// Per-kind spawn parameters, the same for both colors.
#[derive(Debug, Clone, Copy, PartialEq, Reflect, Serialize, Deserialize)]
#[serde(default)]
pub struct PieceClass {
    pub scale: f32,
    /// Height of the mesh origin above the board surface.
    pub lift: f32,
}

impl Default for PieceClass {
    fn default() -> Self {
        Self {
            scale: 1.0,
            lift: 0.0,
        }
    }
}

/// Mesh asset paths for one color, e.g. `"pieces.glb#Mesh0/Primitive0"`.
/// Empty slots use a generated placeholder mesh.
#[derive(Debug, Clone, Default, PartialEq, Reflect, Serialize, Deserialize)]
#[serde(default)]
pub struct PieceMeshes {
    pub pawn: Option<String>,
    pub knight: Option<String>,
    pub bishop: Option<String>,
    pub rook: Option<String>,
    pub queen: Option<String>,
    pub king: Option<String>,
}

impl PieceMeshes {
    pub fn get(&self, kind: PieceKind) -> Option<&str> {
        match kind {
            PieceKind::Pawn => &self.pawn,
            PieceKind::Knight => &self.knight,
            PieceKind::Bishop => &self.bishop,
            PieceKind::Rook => &self.rook,
            PieceKind::Queen => &self.queen,
            PieceKind::King => &self.king,
        }
        .as_deref()
        .filter(|path| !path.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Reflect, Serialize, Deserialize)]
#[serde(default)]
pub struct PieceClasses {
    pub pawn: PieceClass,
    pub knight: PieceClass,
    pub bishop: PieceClass,
    pub rook: PieceClass,
    pub queen: PieceClass,
    pub king: PieceClass,
}

impl Default for PieceClasses {
    fn default() -> Self {
        // lifts rest the placeholder meshes on the board
        let class = |lift| PieceClass { scale: 1.0, lift };
        Self {
            pawn: class(0.2),
            knight: class(0.355),
            bishop: class(0.35),
            rook: class(0.3),
            queen: class(0.4),
            king: class(0.45),
        }
    }
}

impl PieceClasses {
    pub fn get(&self, kind: PieceKind) -> PieceClass {
        match kind {
            PieceKind::Pawn => self.pawn,
            PieceKind::Knight => self.knight,
            PieceKind::Bishop => self.bishop,
            PieceKind::Rook => self.rook,
            PieceKind::Queen => self.queen,
            PieceKind::King => self.king,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Reflect, Serialize, Deserialize)]
#[serde(default)]
pub struct PieceSlots {
    pub white: PieceMeshes,
    pub black: PieceMeshes,
    pub classes: PieceClasses,
}

#[derive(Resource)]
pub struct PieceAssets {
    meshes: [[Handle<Mesh>; 6]; 2],
    materials: [Handle<StandardMaterial>; 2],
    classes: PieceClasses,
}

impl PieceAssets {
    fn mesh(&self, piece: Piece) -> Handle<Mesh> {
        self.meshes[color_index(piece.color)][piece.kind.index()].clone()
    }

    fn material(&self, color: PieceColor) -> Handle<StandardMaterial> {
        self.materials[color_index(color)].clone()
    }
}

fn color_index(color: PieceColor) -> usize {
    match color {
        PieceColor::White => 0,
        PieceColor::Black => 1,
    }
}

fn placeholder_mesh(kind: PieceKind) -> Mesh {
    match kind {
        PieceKind::Pawn => Cylinder::new(0.2, 0.4).into(),
        PieceKind::Knight => Capsule3d::new(0.18, 0.35).into(),
        PieceKind::Bishop => Cone {
            radius: 0.22,
            height: 0.7,
        }
        .into(),
        PieceKind::Rook => Cuboid::new(0.4, 0.6, 0.4).into(),
        PieceKind::Queen => Cylinder::new(0.25, 0.8).into(),
        PieceKind::King => Cuboid::new(0.3, 0.9, 0.3).into(),
    }
}

/// Board space is x right, y down the rows, z up, in [`CELL_SPACING`] units.
/// The scene uses one unit per cell with y up.
pub fn board_to_world(position: Vec3) -> Vec3 {
    Vec3::new(position.x, position.z, position.y) / CELL_SPACING
}

fn board_center(layout: &BoardLayout) -> Vec3 {
    let half = (BOARD_CELLS as f32 - 1.0) / 2.0 * CELL_SPACING;
    board_to_world(Vec3::new(layout.x + half, layout.y + half, 0.0))
}

fn setup_assets(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    asset_server: Res<AssetServer>,
    settings: Res<Settings>,
) {
    let mut load = |slots: &PieceMeshes| {
        PieceKind::ALL.map(|kind| match slots.get(kind) {
            Some(path) => asset_server.load(path.to_string()),
            None => meshes.add(placeholder_mesh(kind)),
        })
    };
    let white = load(&settings.pieces.white);
    let black = load(&settings.pieces.black);

    commands.insert_resource(PieceAssets {
        meshes: [white, black],
        materials: [
            materials.add(StandardMaterial {
                base_color: Color::srgb(0.9, 0.88, 0.82),
                perceptual_roughness: 0.4,
                ..default()
            }),
            materials.add(StandardMaterial {
                base_color: Color::srgb(0.12, 0.1, 0.1),
                perceptual_roughness: 0.4,
                ..default()
            }),
        ],
        classes: settings.pieces.classes.clone(),
    });
}

fn setup_scene(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    settings: Res<Settings>,
) {
    let center = board_center(&settings.layout);

    commands.spawn((
        Camera3d::default(),
        Transform::from_translation(center + Vec3::new(0.0, 9.0, 7.0)).looking_at(center, Vec3::Y),
    ));
    commands.spawn((
        DirectionalLight {
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(4.0, 8.0, 4.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    let tile = meshes.add(Cuboid::new(1.0, TILE_HEIGHT, 1.0));
    let light = materials.add(Color::srgb(0.78, 0.7, 0.56));
    let dark = materials.add(Color::srgb(0.42, 0.3, 0.2));

    for row in 0..BOARD_CELLS {
        for col in 0..BOARD_CELLS {
            let material = if (row + col) % 2 == 0 { &light } else { &dark };
            commands.spawn((
                BoardTile { row, col },
                Mesh3d(tile.clone()),
                MeshMaterial3d(material.clone()),
                Transform::from_translation(tile_translation(&settings.layout, row, col)),
            ));
        }
    }
}

fn tile_translation(layout: &BoardLayout, row: usize, col: usize) -> Vec3 {
    board_to_world(layout.cell_position(row, col)) - Vec3::Y * TILE_HEIGHT / 2.0
}

/// Moves the board when the layout changes. Placed pieces are cleared and
/// come back with the next board.
fn follow_layout(
    mut tiles: Query<(&BoardTile, &mut Transform)>,
    mut clear: EventWriter<ClearPieces>,
    mut last_layout: Local<Option<BoardLayout>>,
    settings: Res<Settings>,
) {
    let layout = settings.layout;
    match *last_layout {
        Some(last) if last == layout => return,
        Some(_) => {
            clear.send(ClearPieces);
        }
        None => {}
    }
    *last_layout = Some(layout);

    for (tile, mut transform) in tiles.iter_mut() {
        transform.translation = tile_translation(&layout, tile.row, tile.col);
    }
}

struct PieceSpawner<'a, 'w, 's> {
    commands: &'a mut Commands<'w, 's>,
    assets: &'a PieceAssets,
}

impl PlacementService for PieceSpawner<'_, '_, '_> {
    type Handle = Entity;

    fn place(&mut self, piece: Piece, position: Vec3) -> Entity {
        let class = self.assets.classes.get(piece.kind);
        let facing = match piece.color {
            PieceColor::White => Quat::IDENTITY,
            PieceColor::Black => Quat::from_rotation_y(PI),
        };

        self.commands
            .spawn((
                ChessPiece { piece },
                Name::new(format!("{:?} {:?}", piece.color, piece.kind)),
                Mesh3d(self.assets.mesh(piece)),
                MeshMaterial3d(self.assets.material(piece.color)),
                Transform::from_translation(board_to_world(position) + Vec3::Y * class.lift)
                    .with_rotation(facing)
                    .with_scale(Vec3::splat(class.scale)),
            ))
            .id()
    }

    fn remove(&mut self, entity: Entity) {
        if let Some(entity) = self.commands.get_entity(entity) {
            entity.despawn_recursive();
        }
    }
}

fn place_pieces(
    mut commands: Commands,
    mut boards: EventReader<BoardReceived>,
    mut clears: EventReader<ClearPieces>,
    mut placer: ResMut<Placer>,
    assets: Res<PieceAssets>,
    settings: Res<Settings>,
) {
    placer.set_mode(settings.placement);

    let mut spawner = PieceSpawner {
        commands: &mut commands,
        assets: assets.as_ref(),
    };

    if !clears.is_empty() {
        clears.clear();
        let removed = placer.clear(&mut spawner);
        info!("cleared {} pieces", removed);
    }

    for BoardReceived(snapshot) in boards.read() {
        let report = placer.apply(snapshot, &settings.layout, &mut spawner);
        if report.placed > 0 || report.removed > 0 {
            info!(
                "board updated: {} placed, {} removed, {} kept",
                report.placed, report.removed, report.kept
            );
        }
    }
}
