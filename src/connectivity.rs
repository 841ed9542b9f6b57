use std::collections::HashSet;

use itertools::Itertools;
use petgraph::algo::kosaraju_scc;
use petgraph::graphmap::DiGraphMap;

use crate::diagnostics::ConnectivityWarning;
use crate::network::NetworkGraph;


impl NetworkGraph {
    fn valid_out_links(&self, node: usize, class: usize) -> Vec<usize> {
        self.out_links(node).iter().copied().filter(|&kk| self.is_valid(kk, class)).collect()
    }

    fn valid_in_links(&self, node: usize, class: usize) -> Vec<usize> {
        self.in_links(node).iter().copied().filter(|&kk| self.is_valid(kk, class)).collect()
    }

    /// Looks, per class, for link pairs that can only be driven back and forth
    /// and for dead-end nodes reached only by a two-way stub.  Findings are
    /// logged and returned; none of them stops a run.
    pub fn check_for_isolated_links(&self) -> Vec<ConnectivityWarning> {
        let mut warnings = vec![];
        for (class, user_class) in self.user_classes().iter().enumerate() {
            let mut pairs = HashSet::new();
            let mut dangling = HashSet::new();
            for kk in (0..self.num_links()).filter(|&kk| self.is_valid(kk, class)) {
                let link = self.link(kk);
                let a_exits = self.valid_out_links(link.anode, class);
                if a_exits.len() != 1 {
                    continue;
                }
                let b_exits = self.valid_out_links(link.bnode, class);
                if b_exits.len() == 1 && self.link(b_exits[0]).bnode == link.anode {
                    pairs.insert((kk.min(b_exits[0]), kk.max(b_exits[0])));
                }
                let a_enters = self.valid_in_links(link.anode, class);
                if a_enters.len() == 1 && self.link(a_enters[0]).anode == link.bnode &&
                   !link.centroid_connector {
                    dangling.insert(link.anode);
                }
            }

            for (first, second) in pairs.into_iter().sorted() {
                let first = self.link(first);
                let second = self.link(second);
                warnings.push(ConnectivityWarning::IsolatedLinkPair {
                    class: user_class.mode,
                    first: (first.ext_anode, first.ext_bnode),
                    second: (second.ext_anode, second.ext_bnode),
                });
            }
            for node in dangling.into_iter().map(|nn| self.external_node(nn)).sorted() {
                warnings.push(ConnectivityWarning::DanglingNode { class: user_class.mode, node });
            }
        }

        for warning in warnings.iter() {
            log::warn!("{}", warning);
        }
        if warnings.is_empty() {
            log::info!("no isolated links or dangling nodes found");
        }
        return warnings;
    }

    /// Strongly connected components of the subnetwork valid for `class`,
    /// as lists of external node ids.
    pub fn strong_components(&self, class: usize) -> Vec<Vec<u32>> {
        let mut graph = DiGraphMap::new();
        for node in 0..self.num_nodes() {
            graph.add_node(self.external_node(node));
        }
        for link in self.links().iter().filter(|ll| ll.is_valid(class)) {
            graph.add_edge(link.ext_anode, link.ext_bnode, ());
        }
        let mut comps: Vec<Vec<u32>> = kosaraju_scc(&graph).into_iter().
            map(|comp| comp.into_iter().sorted().collect()).
            collect();
        comps.sort_by(|aa, bb| bb.len().cmp(&aa.len()).then_with(|| aa.cmp(bb)));

        log::info!("class {} has {} strongly connected components", self.user_classes()[class].mode,
                   comps.len());
        for comp in comps.iter().skip(1) {
            let zones: Vec<u32> = comp.iter().copied().
                filter(|&ext| self.zone_index(ext).is_some()).
                collect();
            if !zones.is_empty() {
                log::warn!("zones {:?} are cut off from the main component", zones);
            }
        }
        return comps;
    }
}
