use crate::model::{Connection, Node, NodeFlags, NodeId, Phase, Vec3};
use rand::Rng;
use std::f32::consts::TAU;

pub(crate) const DEFAULT_SCATTERED: usize = 150;
pub(crate) const FIELD_RADIUS: f32 = 10.0;
/// Velocity components are drawn from ±VELOCITY_BOUND.
pub(crate) const VELOCITY_BOUND: f32 = 0.0005;

const PLANAR_BIAS: f32 = 0.3;
const Z_FLATTEN: f32 = 0.3;
const STAR_OPACITY: f32 = 0.6;
const STAR_THICKNESS: f32 = 1.2;

// Dipper, hunter, and the W.
pub(crate) const CONSTELLATIONS: [&[[f32; 3]]; 3] = [
    &[
        [0.0, 2.0, 0.0],
        [1.0, 1.5, 0.0],
        [2.0, 1.2, 0.0],
        [3.0, 1.0, 0.0],
        [3.5, 0.0, 0.0],
        [2.5, -0.5, 0.0],
        [1.5, -1.0, 0.0],
    ],
    &[
        [-2.0, 2.0, 0.0],
        [-1.5, 1.0, 0.0],
        [-2.0, 0.0, 0.0],
        [-1.0, -1.0, 0.0],
        [-2.0, -2.0, 0.0],
        [-3.0, -1.0, 0.0],
        [-3.0, 1.0, 0.0],
    ],
    &[
        [0.0, -2.0, 1.0],
        [1.0, -2.5, 1.0],
        [2.0, -2.0, 1.0],
        [3.0, -2.5, 1.0],
        [4.0, -2.0, 1.0],
    ],
];

pub(crate) struct Field {
    pub(crate) nodes: Vec<Node>,
    pub(crate) connections: Vec<Connection>,
}

pub(crate) fn random_velocity<R: Rng + ?Sized>(rng: &mut R) -> Vec3 {
    Vec3::new(
        rng.gen_range(-VELOCITY_BOUND..VELOCITY_BOUND),
        rng.gen_range(-VELOCITY_BOUND..VELOCITY_BOUND),
        rng.gen_range(-VELOCITY_BOUND..VELOCITY_BOUND),
    )
}

fn constellation_nodes<R: Rng + ?Sized>(rng: &mut R) -> Vec<Node> {
    let mut out = Vec::new();
    for (shape, points) in CONSTELLATIONS.iter().enumerate() {
        for (index, p) in points.iter().enumerate() {
            out.push(Node {
                id: NodeId::Star { shape, index },
                pos: Vec3::new(p[0], p[1], p[2]),
                vel: Vec3::ZERO,
                flags: NodeFlags {
                    active: true,
                    pulsing: index % 3 == 0,
                    glow: index % 4 == 0,
                    bright: true,
                },
                size: 0.08 + rng.gen::<f32>() * 0.04,
                fixed: true,
                tooltip: None,
            });
        }
    }
    out
}

fn scattered_size(roll: f32) -> f32 {
    if roll > 0.98 {
        0.06
    } else if roll > 0.9 {
        0.04
    } else if roll > 0.7 {
        0.03
    } else {
        0.02
    }
}

fn scattered_node<R: Rng + ?Sized>(id: usize, rng: &mut R) -> Node {
    // flattened sphere: polar angle pulled toward the equator, radius toward the center
    let theta = rng.gen::<f32>() * TAU;
    let phi = ((rng.gen::<f32>() * 2.0 - 1.0) * PLANAR_BIAS).acos();
    let r = FIELD_RADIUS * rng.gen::<f32>().sqrt();

    let pos = Vec3::new(
        r * phi.sin() * theta.cos(),
        r * phi.sin() * theta.sin(),
        r * phi.cos() * Z_FLATTEN,
    );

    let size = scattered_size(rng.gen());
    let bright = rng.gen::<f32>() > 0.9;
    let flags = NodeFlags {
        active: rng.gen::<f32>() > 0.7,
        pulsing: rng.gen::<f32>() > 0.8,
        glow: rng.gen::<f32>() > 0.9,
        bright,
    };

    Node {
        id: NodeId::Scattered(id),
        pos,
        vel: random_velocity(rng),
        flags,
        size,
        fixed: false,
        tooltip: None,
    }
}

/// Links every shape's stars in order; these lines are permanent.
fn constellation_connections(nodes: &[Node]) -> Vec<Connection> {
    let mut out = Vec::new();
    for pair in nodes.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        let same_shape = matches!(
            (a.id, b.id),
            (NodeId::Star { shape: sa, .. }, NodeId::Star { shape: sb, .. }) if sa == sb
        );
        if !same_shape {
            continue;
        }
        out.push(Connection {
            id: format!("const-{}-{}", a.id, b.id),
            start: a.pos,
            end: b.pos,
            mid: None,
            opacity: STAR_OPACITY,
            thickness: STAR_THICKNESS,
            fixed: true,
            phase: Phase::Steady,
            growth: 1.0,
        });
    }
    out
}

pub(crate) fn generate<R: Rng + ?Sized>(scattered: usize, rng: &mut R) -> Field {
    let mut nodes = constellation_nodes(rng);
    let connections = constellation_connections(&nodes);

    let base = nodes.len();
    nodes.reserve(scattered);
    for i in 0..scattered {
        nodes.push(scattered_node(base + i, rng));
    }

    log::debug!(
        "generated field: {} nodes ({} fixed), {} connections",
        nodes.len(),
        base,
        connections.len()
    );

    Field { nodes, connections }
}
