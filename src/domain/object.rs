/// Static tile content: walls, fruit and ephemeral ice.
///
/// The set of kinds is closed (`ObjectKind`). Behavior is reached through
/// capability traits rather than by matching on the kind at every call
/// site, so tile semantics stay centralized here:
///
///   - `Solid`        : blocks dynamic entities from entering the cell
///   - `Destructible` : loses hit points / lifetime, removed at zero
///   - `Collectible`  : awards points once
///
/// Objects do not know their own cell; the grid owns that mapping.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct ObjectId(pub u32);

// ── Capabilities ──

pub trait Solid {
    fn is_solid(&self) -> bool;
}

pub trait Destructible {
    /// Apply one unit of damage. Returns true when this hit brought the
    /// object to zero; an object already at zero ignores further hits.
    fn take_hit(&mut self) -> bool;

    /// Remaining hit points (walls) or lifetime (ice).
    fn remaining(&self) -> u32;

    fn is_destroyed(&self) -> bool {
        self.remaining() == 0
    }
}

pub trait Collectible {
    /// Mark collected and return the points, or `None` if already taken.
    fn collect(&mut self) -> Option<u32>;

    fn is_collected(&self) -> bool;
}

// ── Breakable wall ──

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BreakableWall {
    hit_points: u32,
}

impl BreakableWall {
    pub fn new(hit_points: u32) -> Self {
        BreakableWall { hit_points: hit_points.max(1) }
    }

    pub fn hit_points(&self) -> u32 {
        self.hit_points
    }
}

impl Destructible for BreakableWall {
    fn take_hit(&mut self) -> bool {
        if self.hit_points == 0 {
            return false;
        }
        self.hit_points -= 1;
        self.hit_points == 0
    }

    fn remaining(&self) -> u32 {
        self.hit_points
    }
}

// ── Fruit ──

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FruitKind {
    Grape,
    Banana,
    Pineapple,
    Cherry,
}

impl FruitKind {
    pub fn name(self) -> &'static str {
        match self {
            FruitKind::Grape => "grape",
            FruitKind::Banana => "banana",
            FruitKind::Pineapple => "pineapple",
            FruitKind::Cherry => "cherry",
        }
    }

    /// Points awarded when a level descriptor does not override them.
    pub fn default_points(self) -> u32 {
        match self {
            FruitKind::Grape => 100,
            FruitKind::Banana => 150,
            FruitKind::Pineapple => 200,
            FruitKind::Cherry => 300,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fruit {
    kind: FruitKind,
    points: u32,
    collected: bool,
}

impl Fruit {
    pub fn new(kind: FruitKind, points: u32) -> Self {
        Fruit { kind, points, collected: false }
    }

    pub fn kind(&self) -> FruitKind {
        self.kind
    }

    pub fn points(&self) -> u32 {
        self.points
    }
}

impl Collectible for Fruit {
    fn collect(&mut self) -> Option<u32> {
        if self.collected {
            return None;
        }
        self.collected = true;
        Some(self.points)
    }

    fn is_collected(&self) -> bool {
        self.collected
    }
}

// ── Ice block ──

/// Player-made block. Melts on its own when `lifetime` runs out, or
/// shatters at once when hit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IceBlock {
    lifetime: u32,
}

impl IceBlock {
    pub fn new(lifetime: u32) -> Self {
        IceBlock { lifetime: lifetime.max(1) }
    }

    pub fn lifetime(&self) -> u32 {
        self.lifetime
    }

    /// Advance one tick. Returns true if the block just melted.
    pub fn tick(&mut self) -> bool {
        if self.lifetime == 0 {
            return false;
        }
        self.lifetime -= 1;
        self.lifetime == 0
    }
}

impl Destructible for IceBlock {
    fn take_hit(&mut self) -> bool {
        if self.lifetime == 0 {
            return false;
        }
        self.lifetime = 0;
        true
    }

    fn remaining(&self) -> u32 {
        self.lifetime
    }
}

// ── Tagged variant ──

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    IndestructibleWall,
    BreakableWall(BreakableWall),
    Fruit(Fruit),
    IceBlock(IceBlock),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StaticObject {
    id: ObjectId,
    kind: ObjectKind,
}

impl StaticObject {
    pub fn new(id: ObjectId, kind: ObjectKind) -> Self {
        StaticObject { id, kind }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn kind(&self) -> &ObjectKind {
        &self.kind
    }

    /// Short label for event payloads and logs.
    pub fn label(&self) -> &'static str {
        match self.kind {
            ObjectKind::IndestructibleWall => "indestructible-wall",
            ObjectKind::BreakableWall(_) => "breakable-wall",
            ObjectKind::Fruit(_) => "fruit",
            ObjectKind::IceBlock(_) => "ice-block",
        }
    }

    pub fn is_ice(&self) -> bool {
        matches!(self.kind, ObjectKind::IceBlock(_))
    }

    pub fn is_uncollected_fruit(&self) -> bool {
        self.as_collectible().is_some_and(|c| !c.is_collected())
    }

    pub fn as_destructible(&self) -> Option<&dyn Destructible> {
        match &self.kind {
            ObjectKind::BreakableWall(w) => Some(w),
            ObjectKind::IceBlock(ice) => Some(ice),
            _ => None,
        }
    }

    pub fn as_destructible_mut(&mut self) -> Option<&mut dyn Destructible> {
        match &mut self.kind {
            ObjectKind::BreakableWall(w) => Some(w),
            ObjectKind::IceBlock(ice) => Some(ice),
            _ => None,
        }
    }

    pub fn as_collectible(&self) -> Option<&dyn Collectible> {
        match &self.kind {
            ObjectKind::Fruit(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_collectible_mut(&mut self) -> Option<&mut dyn Collectible> {
        match &mut self.kind {
            ObjectKind::Fruit(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_ice_mut(&mut self) -> Option<&mut IceBlock> {
        match &mut self.kind {
            ObjectKind::IceBlock(ice) => Some(ice),
            _ => None,
        }
    }
}

impl Solid for StaticObject {
    fn is_solid(&self) -> bool {
        !matches!(self.kind, ObjectKind::Fruit(_))
    }
}
