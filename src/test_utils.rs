use std::collections::HashMap;

use itertools::iproduct;

use crate::config::{NetworkConfig, Period, UserClass};
use crate::geometry::Point2d;
use crate::link_performance::TurnPenalty;
use crate::network::NetworkGraph;
use crate::tables::{LinkRow, NodeRow, TurnRow};
use crate::vdf::VolumeDelayFunction;


/// Nodes laid out along a diagonal so every node has distinct coordinates.
pub fn node_rows(ids: &[u32]) -> Vec<NodeRow> {
    ids.iter().
        map(|&id| NodeRow { node: id, position: Point2d::new(id as f64, 2.0 * id as f64) }).
        collect()
}

/// Function 1 is the standard BPR curve, function 2 a constant time.
pub fn default_vdfs() -> HashMap<u32, VolumeDelayFunction> {
    let mut vdfs = HashMap::new();
    vdfs.insert(1, VolumeDelayFunction::Bpr { alpha: 0.15, beta: 4.0 });
    vdfs.insert(2, VolumeDelayFunction::Constant);
    vdfs
}

pub fn single_class_cfg(max_centroid: u32) -> NetworkConfig {
    NetworkConfig::new(Period::Peak, 1.0, max_centroid,
                       vec![UserClass::new('a', 1.0, 15.0, 10.0, 0.1)])
}

fn build(cfg: &NetworkConfig, links: &[LinkRow], turns: &[TurnRow]) -> NetworkGraph {
    let mut ids: Vec<u32> = links.iter().flat_map(|ll| vec![ll.anode, ll.bnode]).collect();
    ids.sort_unstable();
    ids.dedup();
    NetworkGraph::build(cfg, &node_rows(&ids), links, &[], turns).unwrap()
}

//        3
//  1 ---------> 2       1 -> 3 -> 2 is 2 miles,
//   \          ^        1 -> 4 -> 2 is 4 miles.
//    \-- 4 ---/
pub fn turn_ban_network(ban: bool) -> NetworkGraph {
    turn_penalty_network(match ban {
        true => Some(TurnPenalty::Prohibited),
        false => None,
    })
}

/// The same network with `penalty`, if any, on the 1-3-2 turn.
pub fn turn_penalty_network(penalty: Option<TurnPenalty>) -> NetworkGraph {
    let links = vec![
        LinkRow::new(1, 3, "a", 30.0, 1.0, 1.0, 1),
        LinkRow::new(3, 2, "a", 30.0, 1.0, 1.0, 1),
        LinkRow::new(1, 4, "a", 30.0, 2.0, 1.0, 1),
        LinkRow::new(4, 2, "a", 30.0, 2.0, 1.0, 1),
    ];
    let turns: Vec<TurnRow> = penalty.into_iter().
        map(|penalty| TurnRow { from_node: 1, via_node: 3, to_node: 2, penalty }).
        collect();
    build(&single_class_cfg(2), &links, &turns)
}

/// An `nx` by `ny` grid of two-way streets with uneven lengths.  Zones
/// `1..=ny` hang off the left column and `ny+1..=2*ny` off the right.
pub fn grid_network(nx: u32, ny: u32) -> NetworkGraph {
    let grid_id = |xx: u32, yy: u32| 100 + yy * nx + xx;
    let mut links = vec![];
    for (xx, yy) in iproduct!(0..nx, 0..ny) {
        let mut add_street = |to: u32| {
            let dist = 1.0 + ((xx * 7 + yy * 3) % 5) as f64 * 0.3;
            links.push(LinkRow::new(grid_id(xx, yy), to, "a", 35.0, dist, 1.0, 1));
            links.push(LinkRow::new(to, grid_id(xx, yy), "a", 35.0, dist, 1.0, 1));
        };
        if xx + 1 < nx {
            add_street(grid_id(xx + 1, yy));
        }
        if yy + 1 < ny {
            add_street(grid_id(xx, yy + 1));
        }
    }
    for yy in 0..ny {
        for &(zone, xx) in [(yy + 1, 0), (ny + yy + 1, nx - 1)].iter() {
            links.push(LinkRow::new(zone, grid_id(xx, yy), "a", 25.0, 0.2, 1.0, 2));
            links.push(LinkRow::new(grid_id(xx, yy), zone, "a", 25.0, 0.2, 1.0, 2));
        }
    }
    build(&single_class_cfg(2 * ny), &links, &[])
}

/// Zones 1, 2 and 3 in a row with a bypass through node 10.
pub fn through_zone_network() -> NetworkGraph {
    let links = vec![
        LinkRow::new(1, 2, "a", 30.0, 0.5, 1.0, 1),
        LinkRow::new(2, 3, "a", 30.0, 0.5, 1.0, 1),
        LinkRow::new(1, 10, "a", 30.0, 2.0, 1.0, 1),
        LinkRow::new(10, 3, "a", 30.0, 2.0, 1.0, 1),
    ];
    build(&single_class_cfg(3), &links, &[])
}

/// Two identical paths from zone 1 to zone 2, via 20 and via 10.
pub fn diamond_network() -> NetworkGraph {
    let links = vec![
        LinkRow::new(1, 20, "a", 30.0, 1.0, 1.0, 1),
        LinkRow::new(20, 2, "a", 30.0, 1.0, 1.0, 1),
        LinkRow::new(1, 10, "a", 30.0, 1.0, 1.0, 1),
        LinkRow::new(10, 2, "a", 30.0, 1.0, 1.0, 1),
    ];
    build(&single_class_cfg(2), &links, &[])
}

//        3 ====(1 lane)==== 4
//       /                    \
//  zone 1                    zone 2
//       \                    /
//        5 ====(2 lanes)=== 6
//
// Every link has a twin in the opposite direction.  Connectors have constant
// times, so only the two middle links respond to volume.
pub fn two_route_network() -> NetworkGraph {
    build_two_route(&single_class_cfg(2), "a")
}

/// Autos (pce 1) and trucks (pce 2) sharing the two-route network.
pub fn two_class_cfg() -> NetworkConfig {
    NetworkConfig::new(Period::Peak, 1.0, 2, vec![
        UserClass::new('a', 1.0, 15.0, 10.0, 0.1),
        UserClass::new('e', 2.0, 30.0, 30.0, 0.2),
    ])
}

pub fn two_class_two_route_network() -> NetworkGraph {
    build_two_route(&two_class_cfg(), "ae")
}

fn build_two_route(cfg: &NetworkConfig, modes: &str) -> NetworkGraph {
    let mut links = vec![];
    let specs = [(1, 3, 25.0, 0.5, 1.0, 2), (3, 4, 35.0, 3.5, 1.0, 1), (4, 2, 25.0, 0.5, 1.0, 2),
                 (1, 5, 25.0, 0.5, 1.0, 2), (5, 6, 35.0, 3.5, 2.0, 1), (6, 2, 25.0, 0.5, 1.0, 2)];
    for &(aa, bb, speed, dist, lanes, vdf) in specs.iter() {
        links.push(LinkRow::new(aa, bb, modes, speed, dist, lanes, vdf));
        links.push(LinkRow::new(bb, aa, modes, speed, dist, lanes, vdf));
    }
    build(cfg, &links, &[])
}
