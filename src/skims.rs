//! Zone-to-zone skims, traced along the shortest path trees of one class.

use ndarray::prelude::*;
use rayon::prelude::*;

use crate::demand::MulticlassDemand;
use crate::diagnostics::ConnectivityWarning;
use crate::link_performance::LinkPerformanceModel;
use crate::network::NetworkGraph;
use crate::shortest_path::ShortestPathTree;


/// Sums each link attribute along the paths chosen at `link_cost`.  Returns
/// one zone-by-zone matrix per attribute; pairs with no path hold negative
/// infinity.
pub fn build_skim_matrices(network: &NetworkGraph, class: usize, link_cost: &[f64],
                           attributes: &[&[f64]]) -> Vec<Array2<f64>> {
    let num_zones = network.num_centroids();
    let rows: Vec<Array2<f64>> = (0..num_zones).into_par_iter().
        map_init(|| ShortestPathTree::new(network, class, link_cost),
                 |tree, origin| {
                     tree.build_tree(origin);
                     tree.get_skims(attributes)
                 }).
        collect();

    let mut matrices = vec![Array2::from_elem((num_zones, num_zones), f64::NEG_INFINITY);
                            attributes.len()];
    for (origin, origin_rows) in rows.iter().enumerate() {
        for (ii, matrix) in matrices.iter_mut().enumerate() {
            matrix.row_mut(origin).assign(&origin_rows.row(ii));
        }
    }
    return matrices;
}


/// Congested time, distance and generalized cost between every pair of
/// zones for one class, all along the least generalized cost path.
#[derive(Debug, Clone, PartialEq)]
pub struct HighwaySkims {
    pub time: Array2<f64>,
    pub distance: Array2<f64>,
    pub cost: Array2<f64>,
}

impl HighwaySkims {
    pub fn build(network: &NetworkGraph, performance: &LinkPerformanceModel, class: usize)
                 -> HighwaySkims {
        let cost = performance.generalized_cost(network, class);
        let distances = network.distances();
        let attributes = [network.congested_times(), &distances[..], &cost[..]];
        let mut matrices = build_skim_matrices(network, class, &cost, &attributes).into_iter();
        let mut next = || matrices.next().unwrap_or_else(|| Array2::zeros((0, 0)));
        let time = next();
        let distance = next();
        let cost = next();
        log::info!("built skims for class {} over {} zones",
                   network.user_classes()[class].mode, network.num_centroids());
        return HighwaySkims { time, distance, cost };
    }
}


#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TripAverage {
    /// Trip-weighted mean over connected pairs; none if no connected pair has trips.
    pub average: Option<f64>,
    pub disconnected_pairs: usize,
    pub disconnected_trips: f64,
}

/// Trip-weighted average of a skim over all pairs with trips.
pub fn average_trip_skim(trips: &Array2<f64>, skim: &Array2<f64>) -> TripAverage {
    let mut weighted = 0.0;
    let mut total_trips = 0.0;
    let mut disconnected_pairs = 0;
    let mut disconnected_trips = 0.0;
    for (&tt, &ss) in trips.iter().zip(skim.iter()) {
        if !(tt > 0.0) {
            continue;
        }
        if ss.is_finite() {
            weighted += tt * ss;
            total_trips += tt;
        } else {
            disconnected_pairs += 1;
            disconnected_trips += tt;
        }
    }
    let average = if total_trips > 0.0 { Some(weighted / total_trips) } else { None };
    return TripAverage { average, disconnected_pairs, disconnected_trips };
}


/// Finds every o/d pair with demand that has no path at the current costs,
/// before any demand is assigned.
pub fn check_od_connectivity(network: &NetworkGraph, performance: &LinkPerformanceModel,
                             demand: &MulticlassDemand) -> Vec<ConnectivityWarning> {
    let mut warnings = vec![];
    for class in 0..demand.num_classes() {
        let cost = performance.generalized_cost(network, class);
        let mode = network.user_classes()[class].mode;
        let per_origin: Vec<Vec<ConnectivityWarning>> = demand.active_origins(class).
            into_par_iter().
            map_init(|| ShortestPathTree::new(network, class, &cost),
                     |tree, origin| {
                         tree.build_tree(origin);
                         demand.row(class, origin).iter().enumerate().
                             filter(|&(dest, &trips)| {
                                 dest != origin && trips > 0.0 && tree.predecessor_link(dest).is_none()
                             }).
                             map(|(dest, &trips)| ConnectivityWarning::Unreachable {
                                 class: mode,
                                 origin: network.external_node(origin),
                                 destination: network.external_node(dest),
                                 demand: trips,
                             }).
                             collect()
                     }).
            collect();
        warnings.extend(per_origin.into_iter().flatten());
    }

    for warning in warnings.iter() {
        log::debug!("{}", warning);
    }
    if !warnings.is_empty() {
        log::warn!("{} o/d pairs with demand are not connected", warnings.len());
    }
    return warnings;
}
