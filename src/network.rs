use crate::field::{random_velocity, Field};
use crate::model::{Connection, Node, Phase, Vec3};
use rand::seq::SliceRandom;
use rand::Rng;

/// Scattered nodes turn back once they drift past this distance from the origin.
const BOUNDARY_RADIUS: f32 = 12.0;
/// Group spin in radians per elapsed second.
const GROUP_SPIN: f32 = 0.01;
const REROLL_CHANCE: f32 = 0.005;

const DISSOLVE_INTERVAL: f32 = 1.0;
const DISSOLVE_CHANCE: f32 = 0.3;

const SPAWN_INTERVAL: f32 = 0.5;
const SAMPLE_CHANCE: f32 = 0.2;
const SKIP_CHANCE: f32 = 0.8;
const LINK_DISTANCE: f32 = 1.5;
const BRANCH_CHANCE: f32 = 0.4;
const BRANCH_JITTER: f32 = 0.25;

/// Growth per second while forming (full length in 0.5 s).
const FORM_RATE: f32 = 2.0;
/// Shrink per second while dissolving (gone in ~0.67 s).
const DISSOLVE_RATE: f32 = 1.5;
/// Dissolving connections at or below this growth are dropped.
const GONE_THRESHOLD: f32 = 0.02;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct FrameReport {
    pub(crate) spawned: usize,
    pub(crate) marked: usize,
    pub(crate) removed: usize,
}

/// Simulation state for the particle field. Owns every node and connection
/// and is advanced by `frame` once per rendered frame while mounted.
pub(crate) struct Network {
    pub(crate) nodes: Vec<Node>,
    pub(crate) connections: Vec<Connection>,
    pub(crate) rotation: f32,
    last_reconfig: f32,
    last_spawn: f32,
    mounted: bool,
}

impl Network {
    pub(crate) fn mount(field: Field) -> Self {
        Self {
            nodes: field.nodes,
            connections: field.connections,
            rotation: 0.0,
            last_reconfig: 0.0,
            last_spawn: 0.0,
            mounted: true,
        }
    }

    pub(crate) fn unmount(&mut self) {
        if self.mounted {
            log::debug!(
                "network unmounted with {} live connections",
                self.connections.len()
            );
        }
        self.mounted = false;
    }

    /// `elapsed` is seconds since mount, `delta` the seconds since the last frame.
    pub(crate) fn frame<R: Rng + ?Sized>(
        &mut self,
        elapsed: f32,
        delta: f32,
        rng: &mut R,
    ) -> FrameReport {
        let mut report = FrameReport::default();
        if !self.mounted {
            return report;
        }

        self.rotation = elapsed * GROUP_SPIN;
        self.drift(rng);

        if elapsed - self.last_reconfig > DISSOLVE_INTERVAL {
            self.last_reconfig = elapsed;
            report.marked = self.mark_dissolving(rng);
        }

        if elapsed - self.last_spawn > SPAWN_INTERVAL {
            self.last_spawn = elapsed;
            report.spawned = self.spawn(elapsed, rng);
        }

        report.removed = self.advance_phases(delta);
        report
    }

    fn drift<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for node in self.nodes.iter_mut().filter(|n| !n.fixed) {
            node.pos += node.vel;

            if rng.gen::<f32>() < REROLL_CHANCE {
                node.vel = random_velocity(rng);
            }

            // only flip while heading outward, otherwise a node just past the
            // edge would flip back and forth in place
            if node.pos.length() > BOUNDARY_RADIUS && node.pos.dot(node.vel) > 0.0 {
                node.vel = node.vel * -1.0;
            }
        }
    }

    fn mark_dissolving<R: Rng + ?Sized>(&mut self, rng: &mut R) -> usize {
        let mut marked = 0;
        for conn in self.connections.iter_mut().filter(|c| !c.fixed) {
            if rng.gen::<f32>() < DISSOLVE_CHANCE && conn.phase == Phase::Steady {
                conn.phase = Phase::Dissolving;
                marked += 1;
            }
        }
        marked
    }

    fn spawn<R: Rng + ?Sized>(&mut self, elapsed: f32, rng: &mut R) -> usize {
        let mut fresh = Vec::new();

        for (i, node) in self.nodes.iter().enumerate() {
            if rng.gen::<f32>() >= SAMPLE_CHANCE {
                continue;
            }
            if rng.gen::<f32>() < SKIP_CHANCE {
                continue;
            }

            let mut nearby: Vec<&Node> = self
                .nodes
                .iter()
                .enumerate()
                .filter(|(j, other)| *j != i && node.pos.distance(other.pos) < LINK_DISTANCE)
                .map(|(_, other)| other)
                .collect();
            if nearby.is_empty() {
                continue;
            }
            nearby.shuffle(rng);

            let want = rng.gen_range(1..=2usize);
            for other in nearby.into_iter().take(want) {
                fresh.push(link(node, other, elapsed, rng));
            }
        }

        let n = fresh.len();
        self.connections.extend(fresh);
        n
    }

    fn advance_phases(&mut self, delta: f32) -> usize {
        for conn in &mut self.connections {
            match conn.phase {
                Phase::Forming => {
                    conn.growth = (conn.growth + delta * FORM_RATE).min(1.0);
                    if conn.growth >= 1.0 {
                        conn.phase = Phase::Steady;
                    }
                }
                Phase::Dissolving => {
                    conn.growth = (conn.growth - delta * DISSOLVE_RATE).max(0.0);
                }
                Phase::Steady => {}
            }
        }

        let before = self.connections.len();
        self.connections
            .retain(|c| c.fixed || !(c.dissolving() && c.growth <= GONE_THRESHOLD));
        before - self.connections.len()
    }
}

fn link<R: Rng + ?Sized>(a: &Node, b: &Node, elapsed: f32, rng: &mut R) -> Connection {
    let d = a.pos.distance(b.pos);
    let strength = 1.0 - d / LINK_DISTANCE;

    let mid = if rng.gen::<f32>() < BRANCH_CHANCE {
        let jitter = Vec3::new(
            rng.gen_range(-BRANCH_JITTER..BRANCH_JITTER),
            rng.gen_range(-BRANCH_JITTER..BRANCH_JITTER),
            rng.gen_range(-BRANCH_JITTER..BRANCH_JITTER),
        );
        Some(a.pos.lerp(b.pos, 0.5) + jitter)
    } else {
        None
    };

    Connection {
        id: format!("{}-{}-{:.1}", a.id, b.id, elapsed),
        start: a.pos,
        end: b.pos,
        mid,
        opacity: (strength * 0.3).max(0.03),
        thickness: if rng.gen::<f32>() > 0.9 { 0.8 } else { 0.5 },
        fixed: false,
        phase: Phase::Forming,
        growth: 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{generate, DEFAULT_SCATTERED, VELOCITY_BOUND};
    use crate::model::NodeId;
    use rand::{rngs::StdRng, SeedableRng};
    use std::collections::HashMap;

    const DT: f32 = 1.0 / 60.0;

    fn max_step() -> f32 {
        Vec3::new(VELOCITY_BOUND, VELOCITY_BOUND, VELOCITY_BOUND).length()
    }

    fn run(net: &mut Network, rng: &mut StdRng, frames: usize, start: usize) {
        for f in start..start + frames {
            let t = f as f32 * DT;
            net.frame(t, DT, rng);
        }
    }

    fn seeded(seed: u64) -> (Network, StdRng) {
        let mut rng = StdRng::seed_from_u64(seed);
        let net = Network::mount(generate(DEFAULT_SCATTERED, &mut rng));
        (net, rng)
    }

    #[test]
    fn constellation_nodes_never_move() {
        let (mut net, mut rng) = seeded(11);
        let before: Vec<Vec3> = net.nodes.iter().filter(|n| n.fixed).map(|n| n.pos).collect();
        run(&mut net, &mut rng, 3000, 1);
        let after: Vec<Vec3> = net.nodes.iter().filter(|n| n.fixed).map(|n| n.pos).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn scattered_nodes_move() {
        let (mut net, mut rng) = seeded(12);
        let before = net.nodes.last().map(|n| n.pos);
        run(&mut net, &mut rng, 10, 1);
        assert_ne!(before, net.nodes.last().map(|n| n.pos));
    }

    #[test]
    fn boundary_keeps_nodes_close() {
        let (mut net, mut rng) = seeded(13);
        // park a few nodes right on the edge heading outward
        for (k, node) in net.nodes.iter_mut().filter(|n| !n.fixed).take(20).enumerate() {
            let dir = Vec3::new((k as f32).cos(), (k as f32).sin(), 0.1);
            let dir = dir * (1.0 / dir.length());
            node.pos = dir * (BOUNDARY_RADIUS - 0.0001);
            node.vel = dir * VELOCITY_BOUND;
        }

        let limit = BOUNDARY_RADIUS + max_step() + 1e-4;
        for f in 1..20_000 {
            let t = f as f32 * DT;
            net.frame(t, DT, &mut rng);
            for n in net.nodes.iter().filter(|n| !n.fixed) {
                assert!(n.pos.length() <= limit, "node {} at {}", n.id, n.pos.length());
            }
        }
    }

    #[test]
    fn spawned_connections_start_forming_and_snapshot_endpoints() {
        let (mut net, mut rng) = seeded(14);
        // a tight cluster guarantees neighbours
        for node in net.nodes.iter_mut().filter(|n| !n.fixed) {
            node.pos = node.pos * 0.05;
        }
        let fixed_links = net.connections.len();

        let mut spawned = 0;
        for f in 1..=120 {
            let report = net.frame(f as f32 * DT, 0.0, &mut rng);
            spawned += report.spawned;
        }
        assert!(spawned > 0);

        let fresh: Vec<&Connection> = net.connections.iter().filter(|c| !c.fixed).collect();
        assert_eq!(fresh.len() + fixed_links, net.connections.len());
        for c in fresh {
            // zero delta: nothing has grown yet
            assert!(c.forming());
            assert_eq!(c.growth, 0.0);
            assert!(c.opacity >= 0.03 && c.opacity <= 0.3);
            assert!(c.thickness == 0.5 || c.thickness == 0.8);
            assert!(c.start.distance(c.end) < LINK_DISTANCE);
        }

        // endpoints are snapshots, not live links
        let snap: Vec<Vec3> = net.connections.iter().map(|c| c.end).collect();
        for node in net.nodes.iter_mut().filter(|n| !n.fixed) {
            node.pos += Vec3::new(1.0, 0.0, 0.0);
        }
        let later: Vec<Vec3> = net.connections.iter().map(|c| c.end).collect();
        assert_eq!(snap, later);
    }

    #[test]
    fn forming_becomes_steady_after_half_a_second() {
        let (mut net, mut rng) = seeded(15);
        let a = net.nodes[0].clone();
        let b = net.nodes[1].clone();
        net.connections.push(link(&a, &b, 0.0, &mut rng));
        let idx = net.connections.len() - 1;

        net.advance_phases(0.25);
        assert!(net.connections[idx].forming());
        assert!((net.connections[idx].growth - 0.5).abs() < 1e-6);

        net.advance_phases(0.25);
        assert_eq!(net.connections[idx].phase, Phase::Steady);
        assert_eq!(net.connections[idx].growth, 1.0);
    }

    #[test]
    fn dissolving_connection_is_removed_at_threshold() {
        let (mut net, mut rng) = seeded(16);
        let a = net.nodes[0].clone();
        let b = net.nodes[1].clone();
        let mut c = link(&a, &b, 0.0, &mut rng);
        c.id = "probe".into();
        c.phase = Phase::Dissolving;
        c.growth = 1.0;
        net.connections.push(c);

        let mut t = 0.0;
        loop {
            let removed = net.advance_phases(DT);
            t += DT;
            let live = net.connections.iter().find(|c| c.id == "probe");
            match live {
                Some(c) => {
                    assert!(c.growth > GONE_THRESHOLD);
                    assert_eq!(removed, 0);
                }
                None => {
                    assert_eq!(removed, 1);
                    break;
                }
            }
            assert!(t < 1.0, "never removed");
        }
        // 1 / 1.5 s give or take the threshold
        assert!(t > 0.6 && t < 0.7);
    }

    #[test]
    fn fixed_connections_never_dissolve() {
        let (mut net, mut rng) = seeded(17);
        run(&mut net, &mut rng, 1200, 1);
        let fixed: Vec<&Connection> = net.connections.iter().filter(|c| c.fixed).collect();
        assert_eq!(fixed.len(), 16);
        assert!(fixed.iter().all(|c| c.phase == Phase::Steady));
    }

    #[test]
    fn marking_only_touches_steady_links() {
        let (mut net, mut rng) = seeded(18);
        let a = net.nodes[0].clone();
        let b = net.nodes[1].clone();
        for _ in 0..50 {
            let mut c = link(&a, &b, 0.0, &mut rng);
            c.growth = 0.3;
            net.connections.push(c);
        }
        let marked = net.mark_dissolving(&mut rng);
        assert_eq!(marked, 0);
        assert!(net.connections.iter().all(|c| !(c.forming() && c.dissolving())));
    }

    #[test]
    fn periodic_work_is_rate_limited() {
        let (mut net, mut rng) = seeded(19);
        // cluster so that spawns are likely whenever the window opens
        for node in net.nodes.iter_mut().filter(|n| !n.fixed) {
            node.pos = node.pos * 0.05;
        }
        let mut spawn_frames = Vec::new();
        for f in 1..=180 {
            let t = f as f32 * DT;
            let before = net.last_spawn;
            net.frame(t, DT, &mut rng);
            if net.last_spawn != before {
                spawn_frames.push(t);
            }
        }
        for pair in spawn_frames.windows(2) {
            assert!(pair[1] - pair[0] > SPAWN_INTERVAL - 1e-4);
        }
        assert!(spawn_frames.len() >= 5);
    }

    #[test]
    fn dissolve_marking_runs_at_most_once_a_second() {
        let (mut net, mut rng) = seeded(23);
        for node in net.nodes.iter_mut().filter(|n| !n.fixed) {
            node.pos = node.pos * 0.05;
        }
        let mut mark_frames = Vec::new();
        for f in 1..=600 {
            let t = f as f32 * DT;
            let before = net.last_reconfig;
            net.frame(t, DT, &mut rng);
            if net.last_reconfig != before {
                mark_frames.push(t);
            }
        }
        for pair in mark_frames.windows(2) {
            assert!(pair[1] - pair[0] > DISSOLVE_INTERVAL, "{pair:?}");
        }
        assert!(mark_frames.len() >= 8);
    }

    #[test]
    fn each_sampled_node_gets_one_or_two_links() {
        let mut total = 0;
        for seed in 30..40 {
            let (mut net, mut rng) = seeded(seed);
            // everyone has plenty of neighbours
            for node in net.nodes.iter_mut().filter(|n| !n.fixed) {
                node.pos = node.pos * 0.05;
            }
            let before = net.connections.len();
            let spawned = net.spawn(1.0, &mut rng);
            assert_eq!(net.connections.len() - before, spawned);
            total += spawned;

            // links from one node share its position as their start
            let mut per_source: HashMap<[u32; 3], usize> = HashMap::new();
            for c in &net.connections[before..] {
                let key = [c.start.x.to_bits(), c.start.y.to_bits(), c.start.z.to_bits()];
                *per_source.entry(key).or_default() += 1;
            }
            assert!(per_source.values().all(|&n| (1..=2).contains(&n)), "{per_source:?}");
        }
        assert!(total > 0);
    }

    #[test]
    fn rotation_tracks_elapsed_time() {
        let (mut net, mut rng) = seeded(20);
        net.frame(10.0, DT, &mut rng);
        assert!((net.rotation - 0.1).abs() < 1e-6);
    }

    #[test]
    fn unmount_stops_all_mutation() {
        let (mut net, mut rng) = seeded(21);
        run(&mut net, &mut rng, 120, 1);
        net.unmount();

        let pos: Vec<Vec3> = net.nodes.iter().map(|n| n.pos).collect();
        let links: Vec<(String, f32)> =
            net.connections.iter().map(|c| (c.id.clone(), c.growth)).collect();
        let rot = net.rotation;

        for f in 121..600 {
            let report = net.frame(f as f32 * DT, DT, &mut rng);
            assert_eq!(report, FrameReport::default());
        }

        assert_eq!(pos, net.nodes.iter().map(|n| n.pos).collect::<Vec<_>>());
        assert_eq!(
            links,
            net.connections
                .iter()
                .map(|c| (c.id.clone(), c.growth))
                .collect::<Vec<_>>()
        );
        assert_eq!(rot, net.rotation);
    }

    #[test]
    fn spawned_ids_name_both_endpoints() {
        let mut rng = StdRng::seed_from_u64(22);
        let field = generate(0, &mut rng);
        let a = &field.nodes[0];
        let b = &field.nodes[1];
        assert_eq!(a.id, NodeId::Star { shape: 0, index: 0 });
        let c = link(a, b, 3.14159, &mut rng);
        assert_eq!(c.id, "c0-0-c0-1-3.1");
    }
}
