use std::collections::HashMap;

use crate::diagnostics::NumericalAnomaly;
use crate::error::{AssignResult, ConfigurationError};
use crate::network::{Link, NetworkGraph};
use crate::vdf::VolumeDelayFunction;
use crate::ClassCostConfig;


/// What it costs to turn from one link onto the next.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TurnPenalty {
    NoPenalty,
    Prohibited,
    /// Extra minutes.
    Penalty(f64),
}

impl TurnPenalty {
    /// The added cost of the turn, or `None` if the turn may not be made.
    pub fn cost(self) -> Option<f64> {
        match self {
            TurnPenalty::NoPenalty => Some(0.0),
            TurnPenalty::Prohibited => None,
            TurnPenalty::Penalty(value) => Some(value),
        }
    }
}


/// Turns link volumes into congested times and per-class costs.
pub struct LinkPerformanceModel {
    vdfs: HashMap<u32, VolumeDelayFunction>,
}

impl LinkPerformanceModel {
    pub fn new(vdfs: HashMap<u32, VolumeDelayFunction>, network: &NetworkGraph)
               -> AssignResult<LinkPerformanceModel> {
        for vdf in vdfs.values() {
            vdf.validate()?;
        }
        for link in network.links() {
            if link.is_valid_for_any() && !link.fixed_time && !vdfs.contains_key(&link.vdf) {
                return Err(ConfigurationError::UnknownVdf {
                    vdf: link.vdf, anode: link.ext_anode, bnode: link.ext_bnode,
                });
            }
        }
        return Ok(LinkPerformanceModel { vdfs });
    }

    fn function(&self, link: &Link) -> VolumeDelayFunction {
        if link.fixed_time {
            return VolumeDelayFunction::Constant;
        }
        // only links closed to every class can lack a registered function
        self.vdfs.get(&link.vdf).copied().unwrap_or(VolumeDelayFunction::Constant)
    }

    pub fn link_time(&self, link: &Link, volume: f64) -> f64 {
        self.function(link).time(link.free_flow_time, volume, link.total_capacity)
    }

    fn evaluate(&self, network: &NetworkGraph, volumes: &[f64]) -> (Vec<f64>, Vec<NumericalAnomaly>) {
        let previous = network.congested_times();
        let mut anomalies = vec![];
        let times = network.links().iter().enumerate().map(|(kk, link)| {
            if !link.is_valid_for_any() {
                return previous[kk];
            }
            let time = self.link_time(link, volumes[kk]);
            if time.is_finite() && time >= 0.0 {
                return time;
            }
            anomalies.push(NumericalAnomaly {
                link: kk,
                anode: link.ext_anode,
                bnode: link.ext_bnode,
                value: time,
                volume: volumes[kk],
                capacity: link.total_capacity,
            });
            previous[kk]
        }).collect();
        return (times, anomalies);
    }

    /// Congested times at the given volumes, without touching the network.
    /// Anomalous links keep their current time.
    pub fn link_times(&self, network: &NetworkGraph, volumes: &[f64]) -> Vec<f64> {
        self.evaluate(network, volumes).0
    }

    /// Recomputes every valid link's congested time from its current volume.
    pub fn apply_volume_delay(&self, network: &mut NetworkGraph) -> Vec<NumericalAnomaly> {
        let (times, anomalies) = self.evaluate(network, network.volumes());
        network.congested_times_mut().copy_from_slice(&times);
        if !anomalies.is_empty() {
            for anomaly in anomalies.iter() {
                log::error!("numerical anomaly on {}, keeping the previous time", anomaly);
            }
            network.mark_degraded();
        }
        return anomalies;
    }

    /// Sum of the vdf integrals over valid links at the given volumes.
    pub fn vdf_integral_sum(&self, network: &NetworkGraph, volumes: &[f64]) -> f64 {
        let mut total = 0.0;
        for (kk, link) in network.links().iter().enumerate() {
            if !link.is_valid_for_any() {
                continue;
            }
            let integral = self.function(link).
                integral(link.free_flow_time, volumes[kk], link.total_capacity);
            if integral.is_finite() {
                total += integral;
            } else {
                log::warn!("vdf integral on link ({}, {}) is {}, leaving it out",
                           link.ext_anode, link.ext_bnode, integral);
            }
        }
        return total;
    }

    pub fn apply_volume_delay_integral(&self, network: &NetworkGraph) -> f64 {
        self.vdf_integral_sum(network, network.volumes())
    }

    /// Penalty for arriving at `via_node` from `from_node` and leaving on
    /// `out_link`.  Nodes are internal indices.
    pub fn turn_penalty(&self, network: &NetworkGraph, via_node: usize, from_node: usize,
                        out_link: usize) -> TurnPenalty {
        let in_link = network.in_links(via_node).iter().copied().
            find(|&kk| network.link(kk).anode == from_node);
        match in_link {
            Some(_) => network.turn_penalty(in_link, out_link),
            None => TurnPenalty::NoPenalty,
        }
    }

    /// The money part of each link's cost for `class`, converted to minutes.
    pub fn monetized_times(&self, network: &NetworkGraph, class: usize) -> Vec<f64> {
        let cfg = network.config();
        network.links().iter().
            map(|link| cfg.link_cost_minutes(class, link.class_costs[class], link.dist)).
            collect()
    }

    /// Congested time plus monetized cost for `class`, in minutes.  Negative
    /// totals are clamped to zero.
    pub fn generalized_cost(&self, network: &NetworkGraph, class: usize) -> Vec<f64> {
        let mut num_clamped = 0;
        let costs = network.congested_times().iter().
            zip(self.monetized_times(network, class)).
            map(|(time, money)| {
                let cost = time + money;
                if cost < 0.0 {
                    num_clamped += 1;
                    return 0.0;
                }
                cost
            }).
            collect();
        if num_clamped > 0 {
            log::warn!("{} links had negative cost for class {} and were set to 0",
                       num_clamped, network.user_classes()[class].mode);
        }
        return costs;
    }
}
