use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{AssignResult, ConfigurationError};
use crate::link_performance::LinkPerformanceModel;
use crate::network::NetworkGraph;


/// Writes one row per link with its midpoint, capacity, congested time,
/// per-class flow and per-class generalized cost.
pub fn write_assignment_results(network: &NetworkGraph, performance: &LinkPerformanceModel,
                                path: &Path) -> AssignResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    let modes: Vec<char> = network.user_classes().iter().map(|uc| uc.mode).collect();
    let mut header = vec![String::from("id"), String::from("anode"), String::from("bnode"),
                          String::from("uniqueId"), String::from("midX"), String::from("midY"),
                          String::from("capacity"),
                          String::from("volume"), String::from("assignmentTime")];
    header.extend(modes.iter().map(|mode| format!("assignmentFlow_{}", mode)));
    header.extend(modes.iter().map(|mode| format!("linkCost_{}", mode)));
    writer.write_record(&header)?;

    let costs: Vec<Vec<f64>> = (0..modes.len()).
        map(|class| performance.generalized_cost(network, class)).
        collect();
    for (kk, link) in network.links().iter().enumerate() {
        let (start, end) = network.link_coords(kk);
        let middle = start.midpoint(&end);
        let mut record = vec![
            kk.to_string(),
            link.ext_anode.to_string(),
            link.ext_bnode.to_string(),
            link.unique_id.map(|id| id.to_string()).unwrap_or_default(),
            middle.x_coord.to_string(),
            middle.y_coord.to_string(),
            link.total_capacity.to_string(),
            network.volumes()[kk].to_string(),
            network.congested_times()[kk].to_string(),
        ];
        record.extend((0..modes.len()).map(|class| network.flows(class)[kk].to_string()));
        record.extend(costs.iter().map(|class_costs| class_costs[kk].to_string()));
        writer.write_record(&record)?;
    }
    writer.flush().map_err(|source| {
        ConfigurationError::Io { path: path.display().to_string(), source }
    })?;
    log::info!("wrote results for {} links to {}", network.num_links(), path.display());
    return Ok(());
}


#[derive(Debug, Clone, Default, PartialEq)]
pub struct VdfSummary {
    pub num_links: usize,
    pub lane_miles: f64,
    pub vehicle_miles: f64,
    pub vehicle_hours: f64,
}

/// Totals over the valid links of each volume-delay function, keyed by
/// function id.
pub fn link_summary_report(network: &NetworkGraph) -> BTreeMap<u32, VdfSummary> {
    let mut summaries: BTreeMap<u32, VdfSummary> = BTreeMap::new();
    for (kk, link) in network.links().iter().enumerate() {
        if !link.is_valid_for_any() {
            continue;
        }
        let volume = network.volumes()[kk];
        let summary = summaries.entry(link.vdf).or_default();
        summary.num_links += 1;
        summary.lane_miles += link.lanes * link.dist;
        summary.vehicle_miles += volume * link.dist;
        summary.vehicle_hours += volume * network.congested_times()[kk] / 60.0;
    }

    log::info!("{:>5} {:>8} {:>12} {:>14} {:>12}", "vdf", "links", "lane miles", "veh miles", "veh hours");
    for (vdf, summary) in summaries.iter() {
        log::info!("{:>5} {:>8} {:>12.1} {:>14.1} {:>12.1}", vdf, summary.num_links,
                   summary.lane_miles, summary.vehicle_miles, summary.vehicle_hours);
    }
    return summaries;
}


/// Counts of free-flow link times by order of magnitude: exactly zero, at
/// most 1, 10, 100 and 1000 minutes, longer, and anything negative or not
/// finite.
pub fn log_link_time_freqs(network: &NetworkGraph) -> [usize; 7] {
    let mut counts = [0; 7];
    for link in network.links() {
        let time = link.free_flow_time;
        let bucket = if time == 0.0 {
            0
        } else if time > 0.0 && time <= 1.0 {
            1
        } else if time > 1.0 && time <= 10.0 {
            2
        } else if time > 10.0 && time <= 100.0 {
            3
        } else if time > 100.0 && time <= 1000.0 {
            4
        } else if time > 1000.0 && time.is_finite() {
            5
        } else {
            6
        };
        counts[bucket] += 1;
    }

    let labels = ["0", "<= 1", "<= 10", "<= 100", "<= 1000", "> 1000", "other"];
    log::info!("free-flow link times (minutes):");
    for (label, count) in labels.iter().zip(counts.iter()) {
        log::info!("  {:>8}: {}", label, count);
    }
    return counts;
}
