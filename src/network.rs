//! The highway network: dense node numbering with zone centroids first,
//! forward and backward stars, per-class link validity and the turn table.
//!
//! Internal node indices `0..num_centroids()` are the zones, ordered by
//! external id.  Remaining nodes follow in order of first appearance in the
//! link table.  Link indices follow the input order of the link table.

use std::collections::HashMap;

use crate::config::{NetworkConfig, UserClass};
use crate::error::{AssignResult, ConfigurationError};
use crate::geometry::Point2d;
use crate::link_performance::TurnPenalty;
use crate::tables::{LinkAttributeRow, LinkRow, NodeRow, TurnRow};


/// Set of user classes, one bit per class index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ClassMask(u32);

impl ClassMask {
    pub const EMPTY: ClassMask = ClassMask(0);

    /// A link carries a class when its mode string contains the class's mode character.
    pub fn from_modes(modes: &str, user_classes: &[UserClass]) -> ClassMask {
        let mut mask = ClassMask::EMPTY;
        for (ii, class) in user_classes.iter().enumerate() {
            if modes.contains(class.mode) {
                mask.insert(ii);
            }
        }
        return mask;
    }

    pub fn contains(self, class: usize) -> bool {
        self.0 & (1 << class) != 0
    }

    pub fn insert(&mut self, class: usize) {
        self.0 |= 1 << class;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}


#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub external_id: u32,
    pub position: Point2d,
    pub is_centroid: bool,
}


#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub anode: usize,
    pub bnode: usize,
    pub ext_anode: u32,
    pub ext_bnode: u32,
    pub modes: String,
    pub dist: f64,
    pub lanes: f64,
    pub free_flow_speed: f64,
    /// Minutes.
    pub free_flow_time: f64,
    /// Per-lane capacity before the volume factor is applied.
    pub original_capacity: f64,
    /// Per-lane capacity after the volume factor is applied.
    pub capacity: f64,
    pub total_capacity: f64,
    pub vdf: u32,
    /// Set by a fixed-time override; the link then ignores its vdf.
    pub fixed_time: bool,
    pub class_mask: ClassMask,
    pub valid_mask: ClassMask,
    pub oneway_mask: ClassMask,
    pub dropped: bool,
    pub centroid_connector: bool,
    pub taz: Option<u32>,
    pub unique_id: Option<u32>,
    /// Monetized cost per user class.
    pub class_costs: Vec<f64>,
    /// Volume that is on the link before any demand is assigned.
    pub preload: f64,
}

fn default_speed(row: &LinkRow, class_mask: ClassMask) -> f64 {
    if row.speed > 0.0 {
        return row.speed;
    }
    match class_mask.is_empty() {
        false => 15.0,
        true => 5.0,
    }
}

/// Per-lane capacity implied by the coded free-flow speed.
fn default_capacity(speed: f64, centroid_connector: bool) -> f64 {
    if centroid_connector {
        return 9999.0;
    }
    if speed > 15.0 && speed <= 30.0 {
        800.0
    } else if speed > 30.0 && speed <= 40.0 {
        1200.0
    } else if speed > 40.0 && speed <= 50.0 {
        1400.0
    } else if speed > 50.0 && speed <= 60.0 {
        1600.0
    } else if speed > 60.0 && speed <= 70.0 {
        1800.0
    } else if speed > 70.0 {
        2000.0
    } else {
        600.0
    }
}

impl Link {
    fn from_row(row: &LinkRow, anode: usize, bnode: usize, cfg: &NetworkConfig) -> Link {
        let class_mask = ClassMask::from_modes(&row.modes, &cfg.user_classes);
        let centroid_connector = cfg.is_centroid(row.anode) || cfg.is_centroid(row.bnode);
        let speed = default_speed(row, class_mask);
        let dist = if row.dist == 0.0 { 0.001 } else { row.dist };
        let original_capacity = default_capacity(speed, centroid_connector);
        let capacity = original_capacity / cfg.volume_factor;
        Link {
            anode,
            bnode,
            ext_anode: row.anode,
            ext_bnode: row.bnode,
            modes: row.modes.clone(),
            dist,
            lanes: row.lanes,
            free_flow_speed: speed,
            free_flow_time: dist / speed * 60.0,
            original_capacity,
            capacity,
            total_capacity: capacity * row.lanes,
            vdf: row.vdf,
            fixed_time: false,
            class_mask,
            valid_mask: class_mask,
            oneway_mask: ClassMask::EMPTY,
            dropped: false,
            centroid_connector,
            taz: None,
            unique_id: None,
            class_costs: vec![0.0; cfg.user_classes.len()],
            preload: 0.0,
        }
    }

    pub fn is_valid(&self, class: usize) -> bool {
        self.valid_mask.contains(class)
    }

    pub fn is_valid_for_any(&self) -> bool {
        !self.valid_mask.is_empty()
    }
}


/// Links grouped by one endpoint: `links(node)` is a slice of link indices,
/// in link-index order.
#[derive(Debug, Clone, PartialEq)]
pub struct StarIndex {
    offsets: Vec<usize>,
    sorted_links: Vec<usize>,
}

impl StarIndex {
    /// Stable bucket sort of link indices by `keys[link]`.
    fn build(keys: &[usize], num_nodes: usize) -> StarIndex {
        let mut offsets = vec![0; num_nodes + 1];
        for &key in keys {
            offsets[key + 1] += 1;
        }
        for ii in 0..num_nodes {
            offsets[ii + 1] += offsets[ii];
        }
        let mut next = offsets.clone();
        let mut sorted_links = vec![0; keys.len()];
        for (link, &key) in keys.iter().enumerate() {
            sorted_links[next[key]] = link;
            next[key] += 1;
        }
        return StarIndex { offsets, sorted_links };
    }

    pub fn links(&self, node: usize) -> &[usize] {
        &self.sorted_links[self.offsets[node]..self.offsets[node + 1]]
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub fn sorted_links(&self) -> &[usize] {
        &self.sorted_links
    }
}


#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TurnEntry {
    pub via_node: usize,
    pub from_node: usize,
    pub upstream_link: usize,
    pub penalty: TurnPenalty,
}

/// Turn penalties and prohibitions, keyed by the downstream link.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnTable {
    by_downstream: Vec<Vec<TurnEntry>>,
    num_entries: usize,
}

impl TurnTable {
    pub fn penalty(&self, upstream_link: Option<usize>, downstream_link: usize) -> TurnPenalty {
        let upstream_link = match upstream_link {
            Some(ul) => ul,
            None => return TurnPenalty::NoPenalty,
        };
        return self.by_downstream[downstream_link].iter().
            find(|entry| entry.upstream_link == upstream_link).
            map(|entry| entry.penalty).
            unwrap_or(TurnPenalty::NoPenalty);
    }

    pub fn entries_into(&self, downstream_link: usize) -> &[TurnEntry] {
        &self.by_downstream[downstream_link]
    }

    pub fn len(&self) -> usize {
        self.num_entries
    }

    pub fn is_empty(&self) -> bool {
        self.num_entries == 0
    }
}


pub struct NetworkGraph {
    cfg: NetworkConfig,
    nodes: Vec<Node>,
    node_index: HashMap<u32, usize>,
    num_centroids: usize,
    links: Vec<Link>,
    forward_star: StarIndex,
    backward_star: StarIndex,
    turns: TurnTable,
    // assignment state, written only by the solver's update step
    flows: Vec<Vec<f64>>,
    volumes: Vec<f64>,
    congested_time: Vec<f64>,
    degraded: bool,
}

impl NetworkGraph {
    pub fn build(cfg: &NetworkConfig, node_rows: &[NodeRow], link_rows: &[LinkRow],
                 overrides: &[LinkAttributeRow], turn_rows: &[TurnRow])
                 -> AssignResult<NetworkGraph> {
        cfg.validate()?;

        let mut positions = HashMap::with_capacity(node_rows.len());
        for row in node_rows {
            if positions.insert(row.node, row.position).is_some() {
                return Err(ConfigurationError::invalid_parameter(
                    "nodes", format!("node {} appears more than once", row.node)));
            }
        }

        for row in link_rows {
            if row.anode == row.bnode {
                return Err(ConfigurationError::UnresolvedLink {
                    anode: row.anode, bnode: row.bnode, reason: String::from("is a self-loop"),
                });
            }
            if !(row.dist >= 0.0) || !(row.lanes > 0.0) || !(row.speed >= 0.0) {
                return Err(ConfigurationError::UnresolvedLink {
                    anode: row.anode, bnode: row.bnode,
                    reason: format!("has bad dist {}, lanes {} or speed {}", row.dist, row.lanes, row.speed),
                });
            }
        }

        // zones come first, in external id order
        let mut centroid_ids: Vec<u32> = link_rows.iter().
            flat_map(|row| vec![row.anode, row.bnode]).
            filter(|&ext| cfg.is_centroid(ext)).
            collect();
        centroid_ids.sort_unstable();
        centroid_ids.dedup();
        let mut nodes = Vec::new();
        let mut node_index = HashMap::new();
        let endpoints = link_rows.iter().flat_map(|row| vec![row.anode, row.bnode]);
        for ext in centroid_ids.iter().copied().chain(endpoints) {
            if node_index.contains_key(&ext) {
                continue;
            }
            let position = *positions.get(&ext).ok_or(ConfigurationError::UnresolvedNode(ext))?;
            node_index.insert(ext, nodes.len());
            nodes.push(Node { external_id: ext, position, is_centroid: cfg.is_centroid(ext) });
        }
        let num_centroids = centroid_ids.len();

        let links: Vec<Link> = link_rows.iter().
            map(|row| Link::from_row(row, node_index[&row.anode], node_index[&row.bnode], cfg)).
            collect();
        let anodes: Vec<usize> = links.iter().map(|ll| ll.anode).collect();
        let bnodes: Vec<usize> = links.iter().map(|ll| ll.bnode).collect();
        let forward_star = StarIndex::build(&anodes, nodes.len());
        let backward_star = StarIndex::build(&bnodes, nodes.len());

        let num_links = links.len();
        let mut network = NetworkGraph {
            cfg: cfg.clone(),
            nodes,
            node_index,
            num_centroids,
            links,
            forward_star,
            backward_star,
            turns: TurnTable { by_downstream: vec![vec![]; num_links], num_entries: 0 },
            flows: vec![vec![0.0; num_links]; cfg.user_classes.len()],
            volumes: vec![],
            congested_time: vec![],
            degraded: false,
        };

        for row in overrides {
            network.apply_override(row)?;
        }
        network.set_validity();
        network.turns = network.build_turn_table(turn_rows)?;
        network.reset_assignment();

        for link in network.links.iter().filter(|ll| ll.is_valid_for_any()) {
            if !(link.total_capacity > 0.0) {
                log::warn!("link ({}, {}) is open to traffic but has capacity {}",
                           link.ext_anode, link.ext_bnode, link.total_capacity);
            }
        }
        log::info!("built network with {} nodes ({} zones), {} links and {} turn entries",
                   network.num_nodes(), network.num_centroids, network.num_links(),
                   network.turns.len());
        return Ok(network);
    }

    fn resolve_unique_link(&self, anode: u32, bnode: u32) -> AssignResult<usize> {
        let unresolved = |reason: String| ConfigurationError::UnresolvedLink { anode, bnode, reason };
        if !self.node_index.contains_key(&anode) {
            return Err(unresolved(String::from("starts at a node not on any link")));
        }
        let matches = self.matching_links(anode, bnode);
        match matches.len() {
            1 => Ok(matches[0]),
            0 => Err(unresolved(String::from("is not in the network"))),
            nn => Err(unresolved(format!("is ambiguous, {} parallel links match", nn))),
        }
    }

    fn apply_override(&mut self, row: &LinkAttributeRow) -> AssignResult<()> {
        let kk = self.resolve_unique_link(row.anode, row.bnode)?;
        if let Some(taz) = row.taz {
            if taz != 0 && self.zone_index(taz).is_none() {
                return Err(ConfigurationError::UnresolvedZone(taz));
            }
        }
        let bad_value = |name: &str, value: f64| ConfigurationError::UnresolvedLink {
            anode: row.anode,
            bnode: row.bnode,
            reason: format!("override has bad {} {}", name, value),
        };

        let mut class_costs = self.links[kk].class_costs.clone();
        for &(mode, cost) in row.costs.iter() {
            match self.cfg.class_index(mode) {
                Some(class) => class_costs[class] = cost,
                None => log::warn!("link ({}, {}) has a cost for unknown class {}",
                                   row.anode, row.bnode, mode),
            }
        }
        let class_mask = row.revised_modes.as_ref().
            map(|modes| ClassMask::from_modes(modes, &self.cfg.user_classes));
        let volume_factor = self.cfg.volume_factor;

        let link = &mut self.links[kk];
        if let Some(capacity) = row.capacity {
            if !(capacity >= 0.0) {
                return Err(bad_value("capacity", capacity));
            }
            link.original_capacity = capacity;
            link.capacity = capacity / volume_factor;
            link.total_capacity = link.capacity * link.lanes;
        }
        if let Some(time) = row.fixed_time {
            if !(time >= 0.0) || !time.is_finite() {
                return Err(bad_value("fixed time", time));
            }
            link.fixed_time = true;
            link.free_flow_time = time;
        }
        if let Some(preload) = row.preload {
            if !(preload >= 0.0) {
                return Err(bad_value("preload", preload));
            }
            link.preload = preload;
        }
        if let (Some(modes), Some(mask)) = (row.revised_modes.as_ref(), class_mask) {
            link.modes = modes.clone();
            link.class_mask = mask;
        }
        link.dropped |= row.drop;
        link.taz = row.taz.or(link.taz);
        link.unique_id = row.unique_id.or(link.unique_id);
        link.class_costs = class_costs;
        Ok(())
    }

    fn set_validity(&mut self) {
        for link in self.links.iter_mut() {
            link.valid_mask = match link.dropped {
                true => ClassMask::EMPTY,
                false => link.class_mask,
            };
        }
        let num_classes = self.cfg.user_classes.len();
        let oneway_masks: Vec<ClassMask> = self.links.iter().map(|link| {
            let mut mask = ClassMask::EMPTY;
            for class in (0..num_classes).filter(|&cc| link.is_valid(cc)) {
                let has_reverse = self.out_links(link.bnode).iter().any(|&rr| {
                    self.links[rr].bnode == link.anode && self.links[rr].is_valid(class)
                });
                if !has_reverse {
                    mask.insert(class);
                }
            }
            mask
        }).collect();
        for (link, mask) in self.links.iter_mut().zip(oneway_masks) {
            link.oneway_mask = mask;
        }
    }

    fn matching_links(&self, anode: u32, bnode: u32) -> Vec<usize> {
        match self.node_index.get(&anode) {
            Some(&ia) => self.out_links(ia).iter().
                copied().
                filter(|&kk| self.links[kk].ext_bnode == bnode).
                collect(),
            None => vec![],
        }
    }

    fn build_turn_table(&self, turn_rows: &[TurnRow]) -> AssignResult<TurnTable> {
        let mut table = TurnTable { by_downstream: vec![vec![]; self.num_links()], num_entries: 0 };
        for row in turn_rows {
            let penalty = match row.penalty {
                TurnPenalty::Penalty(value) if value.is_nan() => {
                    return Err(ConfigurationError::invalid_parameter(
                        "turns", format!("turn {}-{}-{} has an undefined penalty",
                                         row.from_node, row.via_node, row.to_node)));
                }
                TurnPenalty::Penalty(value) if value < 0.0 => {
                    log::warn!("turn {}-{}-{} has negative penalty {}, using 0",
                               row.from_node, row.via_node, row.to_node, value);
                    TurnPenalty::Penalty(0.0)
                }
                other => other,
            };
            let upstream = self.matching_links(row.from_node, row.via_node);
            let downstream = self.matching_links(row.via_node, row.to_node);
            for (&(anode, bnode), found) in [(row.from_node, row.via_node), (row.via_node, row.to_node)].
                    iter().zip([&upstream, &downstream].iter()) {
                if found.is_empty() {
                    return Err(ConfigurationError::UnresolvedLink {
                        anode, bnode, reason: String::from("is referenced by a turn but not in the network"),
                    });
                }
            }
            for &down in downstream.iter() {
                for &up in upstream.iter() {
                    let entry = TurnEntry {
                        via_node: self.links[down].anode,
                        from_node: self.links[up].anode,
                        upstream_link: up,
                        penalty,
                    };
                    let entries = &mut table.by_downstream[down];
                    match entries.iter_mut().find(|ee| ee.upstream_link == up) {
                        Some(existing) => {
                            log::warn!("turn {}-{}-{} is given more than once, keeping the last",
                                       row.from_node, row.via_node, row.to_node);
                            *existing = entry;
                        }
                        None => {
                            entries.push(entry);
                            table.num_entries += 1;
                        }
                    }
                }
            }
        }
        return Ok(table);
    }

    /// Clears all assigned flow and puts every link back at its preload volume.
    pub(crate) fn reset_assignment(&mut self) {
        for class_flows in self.flows.iter_mut() {
            class_flows.iter_mut().for_each(|ff| *ff = 0.0);
        }
        self.volumes = self.links.iter().map(|ll| ll.preload).collect();
        self.congested_time = self.links.iter().map(|ll| ll.free_flow_time).collect();
        self.degraded = false;
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.cfg
    }

    pub fn user_classes(&self) -> &[UserClass] {
        &self.cfg.user_classes
    }

    pub fn num_user_classes(&self) -> usize {
        self.cfg.user_classes.len()
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_links(&self) -> usize {
        self.links.len()
    }

    pub fn num_centroids(&self) -> usize {
        self.num_centroids
    }

    pub fn node(&self, node: usize) -> &Node {
        &self.nodes[node]
    }

    pub fn link(&self, link: usize) -> &Link {
        &self.links[link]
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn internal_node(&self, external_id: u32) -> Option<usize> {
        self.node_index.get(&external_id).copied()
    }

    pub fn external_node(&self, node: usize) -> u32 {
        self.nodes[node].external_id
    }

    pub fn is_centroid(&self, node: usize) -> bool {
        node < self.num_centroids
    }

    /// Internal index of a zone given its external centroid id.
    pub fn zone_index(&self, external_id: u32) -> Option<usize> {
        self.internal_node(external_id).filter(|&ii| self.is_centroid(ii))
    }

    pub fn is_valid(&self, link: usize, class: usize) -> bool {
        self.links[link].is_valid(class)
    }

    pub fn is_oneway(&self, link: usize, class: usize) -> bool {
        self.links[link].oneway_mask.contains(class)
    }

    pub fn forward_star(&self) -> &StarIndex {
        &self.forward_star
    }

    pub fn backward_star(&self) -> &StarIndex {
        &self.backward_star
    }

    pub fn out_links(&self, node: usize) -> &[usize] {
        self.forward_star.links(node)
    }

    pub fn in_links(&self, node: usize) -> &[usize] {
        self.backward_star.links(node)
    }

    pub fn links_exiting_node(&self, external_id: u32) -> Option<&[usize]> {
        self.internal_node(external_id).map(|ii| self.out_links(ii))
    }

    pub fn links_entering_node(&self, external_id: u32) -> Option<&[usize]> {
        self.internal_node(external_id).map(|ii| self.in_links(ii))
    }

    /// The first link from `anode` to `bnode`, by external ids.
    pub fn get_link_index(&self, anode: u32, bnode: u32) -> Option<usize> {
        let ia = self.internal_node(anode)?;
        return self.out_links(ia).iter().copied().find(|&kk| self.links[kk].ext_bnode == bnode);
    }

    pub fn turn_table(&self) -> &TurnTable {
        &self.turns
    }

    pub fn turn_penalty(&self, upstream_link: Option<usize>, downstream_link: usize) -> TurnPenalty {
        self.turns.penalty(upstream_link, downstream_link)
    }

    pub fn link_coords(&self, link: usize) -> (Point2d, Point2d) {
        let link = &self.links[link];
        (self.nodes[link.anode].position, self.nodes[link.bnode].position)
    }

    pub fn distances(&self) -> Vec<f64> {
        self.links.iter().map(|ll| ll.dist).collect()
    }

    pub fn free_flow_times(&self) -> Vec<f64> {
        self.links.iter().map(|ll| ll.free_flow_time).collect()
    }

    pub fn flows(&self, class: usize) -> &[f64] {
        &self.flows[class]
    }

    pub fn volumes(&self) -> &[f64] {
        &self.volumes
    }

    pub fn congested_times(&self) -> &[f64] {
        &self.congested_time
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// PCE-weighted link volumes for a set of per-class flows, preload included.
    pub fn volumes_for(&self, class_flows: &[Vec<f64>]) -> Vec<f64> {
        let mut volumes: Vec<f64> = self.links.iter().map(|ll| ll.preload).collect();
        for (class, flows) in self.cfg.user_classes.iter().zip(class_flows.iter()) {
            for (volume, flow) in volumes.iter_mut().zip(flows.iter()) {
                *volume += class.pce * flow;
            }
        }
        return volumes;
    }

    pub(crate) fn flows_mut(&mut self, class: usize) -> &mut [f64] {
        &mut self.flows[class]
    }

    pub(crate) fn refresh_volumes(&mut self) {
        self.volumes = self.volumes_for(&self.flows);
    }

    pub(crate) fn congested_times_mut(&mut self) -> &mut [f64] {
        &mut self.congested_time
    }

    pub(crate) fn mark_degraded(&mut self) {
        self.degraded = true;
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Period;
    use crate::test_utils;
    use approx::assert_abs_diff_eq;

    fn two_class_cfg() -> NetworkConfig {
        NetworkConfig::new(Period::Peak, 1.0, 2, vec![
            UserClass::new('a', 1.0, 12.0, 8.0, 0.1),
            UserClass::new('e', 2.0, 30.0, 30.0, 0.2),
        ])
    }

    //   1 ---- 10 ---- 11 ---- 2
    //   (11 -> 10 only carries class e)
    fn line_links() -> Vec<LinkRow> {
        vec![
            LinkRow::new(10, 11, "ae", 35.0, 2.0, 2.0, 1),
            LinkRow::new(11, 10, "e", 35.0, 2.0, 2.0, 1),
            LinkRow::new(1, 10, "ae", 0.0, 0.0, 1.0, 2),
            LinkRow::new(10, 1, "ae", 0.0, 0.0, 1.0, 2),
            LinkRow::new(11, 2, "ae", 25.0, 1.0, 1.0, 2),
            LinkRow::new(2, 11, "ae", 25.0, 1.0, 1.0, 2),
        ]
    }

    fn build_line(overrides: &[LinkAttributeRow], turns: &[TurnRow]) -> AssignResult<NetworkGraph> {
        let nodes = test_utils::node_rows(&[1, 2, 10, 11, 99]);
        NetworkGraph::build(&two_class_cfg(), &nodes, &line_links(), overrides, turns)
    }

    #[test]
    fn test_centroids_numbered_first() {
        let network = build_line(&[], &[]).unwrap();
        assert_eq!(network.num_centroids(), 2);
        assert_eq!(network.num_nodes(), 4);
        let order: Vec<u32> = (0..network.num_nodes()).map(|ii| network.external_node(ii)).collect();
        assert_eq!(order, vec![1, 2, 10, 11]);
        assert!(network.is_centroid(0) && network.is_centroid(1));
        assert!(!network.is_centroid(2));
        // node 99 is on no link
        assert_eq!(network.internal_node(99), None);
        assert_eq!(network.zone_index(2), Some(1));
        assert_eq!(network.zone_index(10), None);
    }

    #[test]
    fn test_stars_are_consistent() {
        let network = build_line(&[], &[]).unwrap();
        let fstar = network.forward_star();
        assert_eq!(fstar.offsets().len(), network.num_nodes() + 1);
        assert_eq!(fstar.sorted_links().len(), network.num_links());
        for node in 0..network.num_nodes() {
            let outs = network.out_links(node);
            assert!(outs.windows(2).all(|ww| ww[0] < ww[1]));
            for &kk in outs {
                assert_eq!(network.link(kk).anode, node);
            }
            for &kk in network.in_links(node) {
                assert_eq!(network.link(kk).bnode, node);
            }
        }
        let ext_out: Vec<u32> = network.links_exiting_node(10).unwrap().iter().
            map(|&kk| network.link(kk).ext_bnode).collect();
        assert_eq!(ext_out, vec![11, 1]);
        assert_eq!(network.links_entering_node(1).unwrap(), &[3]);
        assert!(network.links_exiting_node(42).is_none());
    }

    #[test]
    fn test_get_link_index() {
        let network = build_line(&[], &[]).unwrap();
        assert_eq!(network.get_link_index(10, 11), Some(0));
        assert_eq!(network.get_link_index(2, 11), Some(5));
        assert_eq!(network.get_link_index(1, 2), None);
        assert_eq!(network.get_link_index(77, 2), None);
    }

    #[test]
    fn test_default_attributes() {
        let network = build_line(&[], &[]).unwrap();
        let link = network.link(0);
        assert_eq!(link.free_flow_speed, 35.0);
        assert_eq!(link.capacity, 1200.0);
        assert_eq!(link.total_capacity, 2400.0);
        assert_abs_diff_eq!(link.free_flow_time, 2.0 / 35.0 * 60.0, epsilon = 1e-12);
        assert!(!link.centroid_connector);

        // coded speed zero on a class-carrying link, and zero distance
        let connector = network.link(2);
        assert_eq!(connector.free_flow_speed, 15.0);
        assert_eq!(connector.dist, 0.001);
        assert_eq!(connector.capacity, 9999.0);
        assert!(connector.centroid_connector);

        assert_eq!(default_capacity(15.0, false), 600.0);
        assert_eq!(default_capacity(30.0, false), 800.0);
        assert_eq!(default_capacity(45.0, false), 1400.0);
        assert_eq!(default_capacity(55.0, false), 1600.0);
        assert_eq!(default_capacity(65.0, false), 1800.0);
        assert_eq!(default_capacity(75.0, false), 2000.0);
        let bare = LinkRow::new(10, 11, "z", 0.0, 1.0, 1.0, 1);
        assert_eq!(default_speed(&bare, ClassMask::EMPTY), 5.0);
    }

    #[test]
    fn test_volume_factor_scales_capacity() {
        let mut cfg = two_class_cfg();
        cfg.volume_factor = 4.0;
        let nodes = test_utils::node_rows(&[1, 2, 10, 11]);
        let network = NetworkGraph::build(&cfg, &nodes, &line_links(), &[], &[]).unwrap();
        assert_eq!(network.link(0).original_capacity, 1200.0);
        assert_eq!(network.link(0).capacity, 300.0);
        assert_eq!(network.link(0).total_capacity, 600.0);
    }

    #[test]
    fn test_validity_and_oneway() {
        let network = build_line(&[], &[]).unwrap();
        // class a can only go 10 -> 11
        assert!(network.is_valid(0, 0) && network.is_valid(0, 1));
        assert!(!network.is_valid(1, 0) && network.is_valid(1, 1));
        assert!(network.is_oneway(0, 0));
        assert!(!network.is_oneway(0, 1));
        assert!(!network.is_oneway(2, 0));
    }

    #[test]
    fn test_overrides() {
        let mut drop = LinkAttributeRow::new(11, 10);
        drop.drop = true;
        let mut revise = LinkAttributeRow::new(10, 11);
        revise.capacity = Some(900.0);
        revise.taz = Some(2);
        revise.unique_id = Some(4001);
        revise.costs = vec![('a', 0.75), ('q', 3.0)];
        revise.revised_modes = Some(String::from("a"));
        revise.preload = Some(50.0);
        let mut fixed = LinkAttributeRow::new(1, 10);
        fixed.fixed_time = Some(1.5);
        let network = build_line(&[drop, revise, fixed], &[]).unwrap();

        assert!(network.link(1).dropped);
        assert!(!network.is_valid(1, 1));
        let link = network.link(0);
        assert_eq!(link.total_capacity, 1800.0);
        assert_eq!(link.taz, Some(2));
        assert_eq!(link.unique_id, Some(4001));
        assert_eq!(link.class_costs, vec![0.75, 0.0]);
        assert!(network.is_valid(0, 0) && !network.is_valid(0, 1));
        assert_eq!(network.volumes()[0], 50.0);
        assert!(network.link(2).fixed_time);
        assert_eq!(network.congested_times()[2], 1.5);
    }

    #[test]
    fn test_unresolved_references_are_fatal() {
        let missing = LinkAttributeRow::new(1, 2);
        assert!(matches!(build_line(&[missing], &[]),
                         Err(ConfigurationError::UnresolvedLink { anode: 1, bnode: 2, .. })));
        match build_line(&[LinkAttributeRow::new(77, 10)], &[]) {
            Err(ConfigurationError::UnresolvedLink { anode: 77, reason, .. }) => {
                assert!(reason.contains("not on any link"));
            }
            _ => panic!("override from an unknown node should not resolve"),
        }

        let mut bad_zone = LinkAttributeRow::new(10, 11);
        bad_zone.taz = Some(10);
        assert!(matches!(build_line(&[bad_zone], &[]), Err(ConfigurationError::UnresolvedZone(10))));

        let turn = TurnRow { from_node: 1, via_node: 10, to_node: 2, penalty: TurnPenalty::Prohibited };
        assert!(matches!(build_line(&[], &[turn]), Err(ConfigurationError::UnresolvedLink { .. })));

        let nodes = test_utils::node_rows(&[1, 2, 10]);
        let result = NetworkGraph::build(&two_class_cfg(), &nodes, &line_links(), &[], &[]);
        assert!(matches!(result, Err(ConfigurationError::UnresolvedNode(11))));
    }

    #[test]
    fn test_parallel_links_make_overrides_ambiguous() {
        let mut links = line_links();
        links.push(LinkRow::new(10, 11, "a", 50.0, 2.0, 1.0, 1));
        let nodes = test_utils::node_rows(&[1, 2, 10, 11]);
        let cfg = two_class_cfg();
        let network = NetworkGraph::build(&cfg, &nodes, &links, &[], &[]).unwrap();
        assert_eq!(network.get_link_index(10, 11), Some(0));
        let result = NetworkGraph::build(&cfg, &nodes, &links, &[LinkAttributeRow::new(10, 11)], &[]);
        assert!(matches!(result, Err(ConfigurationError::UnresolvedLink { .. })));
    }

    #[test]
    fn test_turn_table() {
        let turns = vec![
            TurnRow { from_node: 1, via_node: 10, to_node: 11, penalty: TurnPenalty::Penalty(0.5) },
            TurnRow { from_node: 11, via_node: 10, to_node: 1, penalty: TurnPenalty::Prohibited },
            TurnRow { from_node: 2, via_node: 11, to_node: 10, penalty: TurnPenalty::Penalty(-3.0) },
        ];
        let network = build_line(&[], &turns).unwrap();
        let up = network.get_link_index(1, 10);
        assert_eq!(network.turn_penalty(up, 0), TurnPenalty::Penalty(0.5));
        assert_eq!(network.turn_penalty(Some(1), 3), TurnPenalty::Prohibited);
        assert_eq!(network.turn_penalty(Some(5), 1), TurnPenalty::Penalty(0.0));
        assert_eq!(network.turn_penalty(None, 0), TurnPenalty::NoPenalty);
        assert_eq!(network.turn_penalty(Some(5), 0), TurnPenalty::NoPenalty);
        assert_eq!(network.turn_table().len(), 3);
        let entry = network.turn_table().entries_into(0)[0];
        assert_eq!(network.external_node(entry.via_node), 10);
        assert_eq!(network.external_node(entry.from_node), 1);
    }

    #[test]
    fn test_rebuild_is_deterministic() {
        let first = build_line(&[], &[]).unwrap();
        let second = build_line(&[], &[]).unwrap();
        assert_eq!(first.nodes, second.nodes);
        assert_eq!(first.links, second.links);
        assert_eq!(first.forward_star, second.forward_star);
        assert_eq!(first.backward_star, second.backward_star);
        assert_eq!(first.turns, second.turns);
    }

    #[test]
    fn test_volumes_for_weights_by_pce() {
        let network = build_line(&[], &[]).unwrap();
        let mut flows = vec![vec![0.0; network.num_links()]; 2];
        flows[0][0] = 100.0;
        flows[1][0] = 10.0;
        let volumes = network.volumes_for(&flows);
        assert_eq!(volumes[0], 120.0);
        assert_eq!(volumes[1], 0.0);
    }
}
