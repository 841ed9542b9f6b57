use std::cmp::Ordering;

use ndarray::prelude::*;
use priority_queue::PriorityQueue;

use crate::link_performance::TurnPenalty;
use crate::network::NetworkGraph;

/// A relaxation must improve a label by more than this to count.
pub const COMPARE_EPSILON: f64 = 1.0e-7;


#[derive(Debug, Clone, Copy)]
struct HeapLabel {
    label: f64,
    external_id: u32,
}

impl HeapLabel {
    /// The label on a grid of `COMPARE_EPSILON`, so round-off never decides
    /// between two equally good nodes.
    fn quantized(&self) -> f64 {
        (self.label / COMPARE_EPSILON).round()
    }
}

impl Ord for HeapLabel {
    fn cmp(&self, other: &Self) -> Ordering {
        // reverse the ordering so the max-priority queue pops the smallest label,
        // ties going to the smaller external node id
        let (mine, theirs) = (self.quantized(), other.quantized());
        if mine < theirs {
            return Ordering::Greater;
        }
        else if mine > theirs {
            return Ordering::Less;
        }
        else {
            return other.external_id.cmp(&self.external_id);
        }
    }
}

// Implementing Ord requires all of the below traits
impl PartialOrd for HeapLabel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        return Some(self.cmp(other));
    }
}

impl PartialEq for HeapLabel {
    fn eq(&self, other: &Self) -> bool {
        return self.cmp(other) == Ordering::Equal;
    }
}

impl Eq for HeapLabel {}


/// What happened when one origin's demand was loaded onto its tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadSummary {
    pub loaded: f64,
    pub dropped: f64,
    /// (destination zone, trips) pairs with no path.
    pub unreachable: Vec<(usize, f64)>,
}


/// A single-origin shortest path tree over the links valid for one class.
/// Buffers are reused from one `build_tree` to the next.
pub struct ShortestPathTree<'a> {
    network: &'a NetworkGraph,
    user_class: usize,
    link_cost: &'a [f64],
    origin: Option<usize>,
    labels: Vec<f64>,
    predecessor_link: Vec<Option<usize>>,
    settled: Vec<bool>,
    candidates: PriorityQueue<usize, HeapLabel>,
}

impl<'a> ShortestPathTree<'a> {
    pub fn new(network: &'a NetworkGraph, user_class: usize, link_cost: &'a [f64])
               -> ShortestPathTree<'a> {
        let num_nodes = network.num_nodes();
        ShortestPathTree {
            network,
            user_class,
            link_cost,
            origin: None,
            labels: vec![f64::INFINITY; num_nodes],
            predecessor_link: vec![None; num_nodes],
            settled: vec![false; num_nodes],
            candidates: PriorityQueue::new(),
        }
    }

    pub fn build_tree(&mut self, origin: usize) {
        self.labels.iter_mut().for_each(|ll| *ll = f64::INFINITY);
        self.predecessor_link.iter_mut().for_each(|pl| *pl = None);
        self.settled.iter_mut().for_each(|ss| *ss = false);
        self.candidates.clear();

        self.origin = Some(origin);
        self.labels[origin] = 0.0;
        self.settled[origin] = true;
        self.relax_links_from(origin);
        while let Some((node, _)) = self.candidates.pop() {
            self.settled[node] = true;
            self.relax_links_from(node);
        }
    }

    fn relax_links_from(&mut self, root: usize) {
        let network = self.network;
        let in_link = self.predecessor_link[root];
        for &kk in network.out_links(root) {
            if !network.is_valid(kk, self.user_class) {
                continue;
            }
            let head = network.link(kk).bnode;
            if self.settled[head] {
                continue;
            }
            let turn_cost = match network.turn_penalty(in_link, kk) {
                TurnPenalty::Prohibited => continue,
                penalty => penalty.cost().unwrap_or(0.0),
            };
            let label = self.labels[root] + self.link_cost[kk] + turn_cost;
            if label - self.labels[head] < -COMPARE_EPSILON {
                self.labels[head] = label;
                self.predecessor_link[head] = Some(kk);
                // zones other than the origin are labelled but never passed through
                if !network.is_centroid(head) {
                    let priority = HeapLabel { label, external_id: network.external_node(head) };
                    if self.candidates.change_priority(&head, priority).is_none() {
                        self.candidates.push(head, priority);
                    }
                }
            }
        }
    }

    pub fn origin(&self) -> Option<usize> {
        self.origin
    }

    pub fn user_class(&self) -> usize {
        self.user_class
    }

    pub fn labels(&self) -> &[f64] {
        &self.labels
    }

    pub fn label(&self, node: usize) -> f64 {
        self.labels[node]
    }

    pub fn predecessor_link(&self, node: usize) -> Option<usize> {
        self.predecessor_link[node]
    }

    /// Links on the tree path from the origin to `node`, in travel order.
    pub fn path_links(&self, node: usize) -> Option<Vec<usize>> {
        let origin = self.origin?;
        let mut links = vec![];
        let mut current = node;
        while current != origin {
            let kk = self.predecessor_link[current]?;
            links.push(kk);
            current = self.network.link(kk).anode;
        }
        links.reverse();
        return Some(links);
    }

    pub fn log_path(&self, node: usize) {
        let network = self.network;
        match self.path_links(node) {
            Some(links) => {
                let mut total = 0.0;
                for kk in links {
                    let link = network.link(kk);
                    total += self.link_cost[kk];
                    let (start, end) = network.link_coords(kk);
                    log::info!("  {:>8} -> {:<8} cost {:>10.4} cumulative {:>10.4} crow-fly {:.3}",
                               link.ext_anode, link.ext_bnode, self.link_cost[kk], total,
                               start.euclidean_distance(&end));
                }
                log::info!("  label at {} is {:.4}", network.external_node(node), self.labels[node]);
            }
            None => log::info!("  no path to {}", network.external_node(node)),
        }
    }

    /// Adds the demand in `demand_row` (indexed by destination zone) to
    /// `flow` along the tree's paths.
    pub fn load_tree(&self, demand_row: ArrayView1<f64>, flow: &mut [f64]) -> LoadSummary {
        let mut summary = LoadSummary::default();
        let origin = match self.origin {
            Some(origin) => origin,
            None => return summary,
        };
        for (dest, &trips) in demand_row.iter().enumerate() {
            if dest == origin || !(trips > 0.0) {
                continue;
            }
            if self.predecessor_link[dest].is_none() {
                summary.dropped += trips;
                summary.unreachable.push((dest, trips));
                continue;
            }
            let mut node = dest;
            while node != origin {
                match self.predecessor_link[node] {
                    Some(kk) => {
                        flow[kk] += trips;
                        node = self.network.link(kk).anode;
                    }
                    None => {
                        log::error!("tree from {} broken at node {}",
                                    self.network.external_node(origin),
                                    self.network.external_node(node));
                        break;
                    }
                }
            }
            summary.loaded += trips;
        }
        return summary;
    }

    /// Sums each attribute along the tree path to every zone.  Row `ii` of the
    /// result holds attribute `ii`; unreachable zones get negative infinity.
    pub fn get_skims(&self, attributes: &[&[f64]]) -> Array2<f64> {
        let num_zones = self.network.num_centroids();
        let mut skims = Array2::from_elem((attributes.len(), num_zones), f64::NEG_INFINITY);
        let origin = match self.origin {
            Some(origin) => origin,
            None => return skims,
        };
        for dest in 0..num_zones {
            let links = match self.path_links(dest) {
                Some(links) => links,
                None => continue,
            };
            for (ii, values) in attributes.iter().enumerate() {
                skims[[ii, dest]] = links.iter().map(|&kk| values[kk]).sum();
            }
        }
        if origin < num_zones {
            skims.column_mut(origin).mapv_inplace(|_| 0.0);
        }
        return skims;
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils;
    use approx::assert_abs_diff_eq;

    fn free_flow_costs(network: &NetworkGraph) -> Vec<f64> {
        network.free_flow_times()
    }

    #[test]
    fn test_heap_order() {
        let mut queue = PriorityQueue::new();
        queue.push(0, HeapLabel { label: 3.0, external_id: 7 });
        queue.push(1, HeapLabel { label: 1.0, external_id: 9 });
        queue.push(2, HeapLabel { label: 1.0, external_id: 4 });
        queue.push(3, HeapLabel { label: 2.0, external_id: 1 });
        queue.change_priority(&0, HeapLabel { label: 0.5, external_id: 7 });
        let order: Vec<usize> = std::iter::from_fn(|| queue.pop().map(|(nn, _)| nn)).collect();
        assert_eq!(order, vec![0, 2, 1, 3]);

        let near = HeapLabel { label: 1.0 + 1e-9, external_id: 4 };
        assert_eq!(near.cmp(&HeapLabel { label: 1.0, external_id: 9 }), Ordering::Greater);
        assert_eq!(near.cmp(&HeapLabel { label: 1.0, external_id: 2 }), Ordering::Less);
    }

    #[test]
    fn test_prohibited_turn_forces_longer_path() {
        let network = test_utils::turn_ban_network(true);
        let costs = free_flow_costs(&network);
        let mut tree = ShortestPathTree::new(&network, 0, &costs);
        let origin = network.zone_index(1).unwrap();
        let dest = network.zone_index(2).unwrap();
        tree.build_tree(origin);

        let path: Vec<(u32, u32)> = tree.path_links(dest).unwrap().iter().
            map(|&kk| (network.link(kk).ext_anode, network.link(kk).ext_bnode)).
            collect();
        assert_eq!(path, vec![(1, 4), (4, 2)]);
        assert_abs_diff_eq!(tree.label(dest), 8.0, epsilon = 1e-9);

        // without the ban the 1-3-2 path wins
        let network = test_utils::turn_ban_network(false);
        let mut tree = ShortestPathTree::new(&network, 0, &costs);
        tree.build_tree(origin);
        let path: Vec<(u32, u32)> = tree.path_links(dest).unwrap().iter().
            map(|&kk| (network.link(kk).ext_anode, network.link(kk).ext_bnode)).
            collect();
        assert_eq!(path, vec![(1, 3), (3, 2)]);
        assert_abs_diff_eq!(tree.label(dest), 4.0, epsilon = 1e-9);
    }

    #[test]
    fn test_turn_penalty_forces_longer_path() {
        let route = |penalty: f64| {
            let network = test_utils::turn_penalty_network(Some(TurnPenalty::Penalty(penalty)));
            let costs = free_flow_costs(&network);
            let mut tree = ShortestPathTree::new(&network, 0, &costs);
            let dest = network.zone_index(2).unwrap();
            tree.build_tree(network.zone_index(1).unwrap());
            let path: Vec<(u32, u32)> = tree.path_links(dest).unwrap().iter().
                map(|&kk| (network.link(kk).ext_anode, network.link(kk).ext_bnode)).
                collect();
            (path, tree.label(dest))
        };

        // 1 -> 3 -> 2 takes 4 minutes plus the penalty, 1 -> 4 -> 2 takes 8
        let (path, label) = route(5.0);
        assert_eq!(path, vec![(1, 4), (4, 2)]);
        assert_abs_diff_eq!(label, 8.0, epsilon = 1e-9);

        let (path, label) = route(1.0);
        assert_eq!(path, vec![(1, 3), (3, 2)]);
        assert_abs_diff_eq!(label, 5.0, epsilon = 1e-9);
    }

    #[test]
    fn test_tree_properties() {
        let network = test_utils::grid_network(4, 3);
        let costs = free_flow_costs(&network);
        let mut tree = ShortestPathTree::new(&network, 0, &costs);
        for origin in 0..network.num_centroids() {
            tree.build_tree(origin);
            assert_eq!(tree.label(origin), 0.0);
            assert_eq!(tree.predecessor_link(origin), None);
            for node in 0..network.num_nodes() {
                // following predecessors reaches the origin without revisiting a node
                let mut seen = vec![false; network.num_nodes()];
                let mut current = node;
                while let Some(kk) = tree.predecessor_link(current) {
                    assert!(!seen[current]);
                    seen[current] = true;
                    let link = network.link(kk);
                    assert_abs_diff_eq!(tree.label(link.bnode),
                                        tree.label(link.anode) + costs[kk], epsilon = 1e-9);
                    current = link.anode;
                }
                assert_eq!(current, origin);
            }
        }
    }

    #[test]
    fn test_centroids_not_passed_through() {
        // 1 -> 2 -> 3 is short, but 2 is a zone; 1 -> 10 -> 3 is the only legal path
        let network = test_utils::through_zone_network();
        let costs = free_flow_costs(&network);
        let mut tree = ShortestPathTree::new(&network, 0, &costs);
        tree.build_tree(network.zone_index(1).unwrap());
        let dest = network.zone_index(3).unwrap();
        let first = network.link(tree.path_links(dest).unwrap()[0]);
        assert_eq!(first.ext_bnode, 10);
        // zone 2 itself is still reached
        assert!(tree.predecessor_link(network.zone_index(2).unwrap()).is_some());
    }

    #[test]
    fn test_ties_break_on_external_id() {
        // two equal paths 1 -> 20 -> 2 and 1 -> 10 -> 2; 10 is settled first
        let network = test_utils::diamond_network();
        let costs = free_flow_costs(&network);
        let mut tree = ShortestPathTree::new(&network, 0, &costs);
        tree.build_tree(network.zone_index(1).unwrap());
        let dest = network.zone_index(2).unwrap();
        let last = network.link(tree.predecessor_link(dest).unwrap());
        assert_eq!(last.ext_anode, 10);

        // round-off in the labels does not count as a difference
        let mut costs = free_flow_costs(&network);
        let link = |aa: u32, bb: u32| network.get_link_index(aa, bb).unwrap();
        costs[link(1, 10)] = 0.1 + 0.2;
        costs[link(1, 20)] = 0.3;
        assert!(costs[link(1, 20)] < costs[link(1, 10)]);
        let mut tree = ShortestPathTree::new(&network, 0, &costs);
        tree.build_tree(network.zone_index(1).unwrap());
        let last = network.link(tree.predecessor_link(dest).unwrap());
        assert_eq!(last.ext_anode, 10);
    }

    #[test]
    fn test_load_tree_conserves_flow() {
        let network = test_utils::grid_network(3, 3);
        let costs = free_flow_costs(&network);
        let mut tree = ShortestPathTree::new(&network, 0, &costs);
        let num_zones = network.num_centroids();
        let origin = 0;
        tree.build_tree(origin);
        let demand = Array1::from_shape_fn(num_zones, |jj| 10.0 * jj as f64);
        let mut flow = vec![0.0; network.num_links()];
        let summary = tree.load_tree(demand.view(), &mut flow);
        assert_abs_diff_eq!(summary.loaded, demand.sum(), epsilon = 1e-9);
        assert_eq!(summary.dropped, 0.0);

        for node in 0..network.num_nodes() {
            let inflow: f64 = network.in_links(node).iter().map(|&kk| flow[kk]).sum();
            let outflow: f64 = network.out_links(node).iter().map(|&kk| flow[kk]).sum();
            let expected = if node == origin {
                -demand.sum()
            } else if network.is_centroid(node) {
                demand[node]
            } else {
                0.0
            };
            assert_abs_diff_eq!(inflow - outflow, expected, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_unreachable_demand_dropped() {
        let network = test_utils::turn_ban_network(true);
        let costs = free_flow_costs(&network);
        let mut tree = ShortestPathTree::new(&network, 0, &costs);
        // no links leave zone 2
        tree.build_tree(network.zone_index(2).unwrap());
        let mut demand = Array1::zeros(network.num_centroids());
        demand[network.zone_index(1).unwrap()] = 25.0;
        let mut flow = vec![0.0; network.num_links()];
        let summary = tree.load_tree(demand.view(), &mut flow);
        assert_eq!(summary.loaded, 0.0);
        assert_eq!(summary.dropped, 25.0);
        assert_eq!(summary.unreachable, vec![(network.zone_index(1).unwrap(), 25.0)]);
        assert!(flow.iter().all(|&ff| ff == 0.0));
    }

    #[test]
    fn test_skims() {
        let network = test_utils::turn_ban_network(true);
        let costs = free_flow_costs(&network);
        let dist = network.distances();
        let mut tree = ShortestPathTree::new(&network, 0, &costs);
        let origin = network.zone_index(1).unwrap();
        let dest = network.zone_index(2).unwrap();
        tree.build_tree(origin);
        let skims = tree.get_skims(&[&costs, &dist]);
        assert_eq!(skims.shape(), &[2, 2]);
        assert_eq!(skims[[0, origin]], 0.0);
        assert_abs_diff_eq!(skims[[0, dest]], 8.0, epsilon = 1e-9);
        assert_abs_diff_eq!(skims[[1, dest]], 4.0, epsilon = 1e-9);

        tree.build_tree(dest);
        let skims = tree.get_skims(&[&costs]);
        assert_eq!(skims[[0, origin]], f64::NEG_INFINITY);
        assert_eq!(skims[[0, dest]], 0.0);
    }
}
