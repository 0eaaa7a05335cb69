use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct Vec3 {
    pub(crate) x: f32,
    pub(crate) y: f32,
    pub(crate) z: f32,
}

impl Vec3 {
    pub(crate) const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub(crate) const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub(crate) fn dot(self, o: Vec3) -> f32 {
        self.x * o.x + self.y * o.y + self.z * o.z
    }

    pub(crate) fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    pub(crate) fn distance(self, o: Vec3) -> f32 {
        (self - o).length()
    }

    pub(crate) fn lerp(self, o: Vec3, t: f32) -> Vec3 {
        self + (o - self) * t
    }

    pub(crate) fn rot_y(self, ang: f32) -> Vec3 {
        let (s, c) = ang.sin_cos();
        Vec3::new(self.x * c + self.z * s, self.y, -self.x * s + self.z * c)
    }

    pub(crate) fn rot_x(self, ang: f32) -> Vec3 {
        let (s, c) = ang.sin_cos();
        Vec3::new(self.x, self.y * c - self.z * s, self.y * s + self.z * c)
    }
}

impl Add for Vec3 {
    type Output = Vec3;
    fn add(self, o: Vec3) -> Vec3 {
        Vec3::new(self.x + o.x, self.y + o.y, self.z + o.z)
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, o: Vec3) {
        self.x += o.x;
        self.y += o.y;
        self.z += o.z;
    }
}

impl Sub for Vec3 {
    type Output = Vec3;
    fn sub(self, o: Vec3) -> Vec3 {
        Vec3::new(self.x - o.x, self.y - o.y, self.z - o.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;
    fn mul(self, s: f32) -> Vec3 {
        Vec3::new(self.x * s, self.y * s, self.z * s)
    }
}

/// Constellation nodes are addressed by shape and position in the shape,
/// scattered nodes by a running index that continues after them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum NodeId {
    Star { shape: usize, index: usize },
    Scattered(usize),
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Star { shape, index } => write!(f, "c{shape}-{index}"),
            NodeId::Scattered(i) => write!(f, "{i}"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct NodeFlags {
    pub(crate) active: bool,
    pub(crate) pulsing: bool,
    pub(crate) glow: bool,
    pub(crate) bright: bool,
}

#[derive(Clone, Debug)]
pub(crate) struct Node {
    pub(crate) id: NodeId,
    pub(crate) pos: Vec3,
    pub(crate) vel: Vec3,
    pub(crate) flags: NodeFlags,
    pub(crate) size: f32,
    /// Set for nodes belonging to a constellation shape; those never move.
    pub(crate) fixed: bool,
    // Hover hook; nothing assigns text yet.
    pub(crate) tooltip: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Phase {
    Forming,
    Steady,
    Dissolving,
}

#[derive(Clone, Debug)]
pub(crate) struct Connection {
    pub(crate) id: String,
    pub(crate) start: Vec3,
    pub(crate) end: Vec3,
    /// Offset midpoint for branching lines, fixed at creation.
    pub(crate) mid: Option<Vec3>,
    pub(crate) opacity: f32,
    pub(crate) thickness: f32,
    pub(crate) fixed: bool,
    pub(crate) phase: Phase,
    /// 0 = collapsed onto `start`, 1 = full length.
    pub(crate) growth: f32,
}

impl Connection {
    pub(crate) fn branching(&self) -> bool {
        self.mid.is_some()
    }

    #[cfg(test)]
    pub(crate) fn forming(&self) -> bool {
        self.phase == Phase::Forming
    }

    pub(crate) fn dissolving(&self) -> bool {
        self.phase == Phase::Dissolving
    }

    pub(crate) fn visible_opacity(&self) -> f32 {
        self.opacity * self.growth
    }

    /// Polyline for the current growth, always starting at `start`.
    pub(crate) fn path(&self) -> Vec<Vec3> {
        let g = self.growth.clamp(0.0, 1.0);
        let end = self.start.lerp(self.end, g);
        match self.mid {
            Some(mid) => vec![self.start, self.start.lerp(mid, g), end],
            None => vec![self.start, end],
        }
    }
}
