//! Frank-Wolfe user equilibrium assignment.
//!
//! Each iteration builds one shortest path tree per class and origin at the
//! current generalized costs and loads that origin's demand all-or-nothing.
//! Trees run in parallel over groups of origins, each group loading into its
//! own flow buffer; the buffers are summed in a fixed order once the sweep is
//! complete.  The network is then moved
//! a step `lambda` towards the all-or-nothing flows, with `lambda` found by
//! bisection on the derivative of the objective.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use rayon::prelude::*;

use crate::config::SolverConfig;
use crate::demand::MulticlassDemand;
use crate::diagnostics::ConnectivityWarning;
use crate::error::{AssignResult, ConfigurationError};
use crate::link_performance::LinkPerformanceModel;
use crate::network::NetworkGraph;
use crate::shortest_path::{LoadSummary, ShortestPathTree};

/// Origins of one class are split into this many groups per sweep, each
/// group summing into its own flow buffer.
const SWEEP_CHUNKS: usize = 64;


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    Converged,
    IterationBudgetExhausted,
    DeadlineReached,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IterationReport {
    pub iteration: usize,
    /// Objective after this iteration's update.
    pub objective: f64,
    /// Gap measured before this iteration's update; none on the first iteration.
    pub relative_gap: Option<f64>,
    pub step_size: f64,
    pub dropped_demand: f64,
    pub num_anomalies: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentSummary {
    pub termination: TerminationReason,
    pub iterations: usize,
    pub final_gap: Option<f64>,
    pub history: Vec<IterationReport>,
    /// Unreachable o/d pairs found in the last complete sweep.
    pub unreachable: Vec<ConnectivityWarning>,
    pub degraded: bool,
}


/// All-or-nothing flows for every class at one set of costs.
struct Sweep {
    class_flows: Vec<Vec<f64>>,
    dropped: f64,
    unreachable: Vec<ConnectivityWarning>,
}


pub struct EquilibriumSolver {
    network: NetworkGraph,
    performance: LinkPerformanceModel,
    cfg: SolverConfig,
    pool: Option<rayon::ThreadPool>,
}

impl EquilibriumSolver {
    pub fn new(network: NetworkGraph, performance: LinkPerformanceModel, cfg: SolverConfig)
               -> AssignResult<EquilibriumSolver> {
        cfg.validate()?;
        let pool = match cfg.num_threads {
            Some(num_threads) => {
                let pool = rayon::ThreadPoolBuilder::new().num_threads(num_threads).build().
                    map_err(|err| ConfigurationError::invalid_parameter("num_threads", err.to_string()))?;
                Some(pool)
            }
            None => None,
        };
        return Ok(EquilibriumSolver { network, performance, cfg, pool });
    }

    pub fn network(&self) -> &NetworkGraph {
        &self.network
    }

    pub fn performance(&self) -> &LinkPerformanceModel {
        &self.performance
    }

    pub fn into_network(self) -> NetworkGraph {
        self.network
    }

    /// Runs the assignment from an empty network until the gap target, the
    /// iteration budget or the deadline is reached.
    pub fn solve(&mut self, demand: &MulticlassDemand) -> AssignResult<AssignmentSummary> {
        if demand.num_classes() != self.network.num_user_classes() ||
           demand.num_zones() != self.network.num_centroids() {
            return Err(ConfigurationError::invalid_parameter("demand", format!(
                "{} classes by {} zones does not match the network's {} by {}",
                demand.num_classes(), demand.num_zones(),
                self.network.num_user_classes(), self.network.num_centroids())));
        }
        let start = Instant::now();
        let deadline = self.cfg.max_wall_time.map(|limit| start + limit);

        self.network.reset_assignment();
        self.performance.apply_volume_delay(&mut self.network);

        let mut history: Vec<IterationReport> = vec![];
        let mut unreachable = vec![];
        let mut termination = TerminationReason::IterationBudgetExhausted;
        let mut final_gap = None;
        for iteration in 0..self.cfg.max_iterations {
            let costs: Vec<Vec<f64>> = (0..self.network.num_user_classes()).
                map(|class| self.performance.generalized_cost(&self.network, class)).
                collect();
            let sweep = match self.run_parallel(|| self.sweep(demand, &costs, deadline)) {
                Some(sweep) => sweep,
                None => {
                    log::warn!("deadline reached during iteration {}, keeping the last complete flows",
                               iteration);
                    termination = TerminationReason::DeadlineReached;
                    break;
                }
            };
            if sweep.dropped > 0.0 {
                log::warn!("{} o/d pairs unreachable, {:.2} trips dropped",
                           sweep.unreachable.len(), sweep.dropped);
            }

            let relative_gap = match iteration {
                0 => None,
                _ => Some(self.relative_gap(&costs, &sweep.class_flows)),
            };
            final_gap = relative_gap.or(final_gap);
            unreachable = sweep.unreachable.clone();
            if let Some(gap) = relative_gap {
                if gap <= self.cfg.relative_gap {
                    log::info!("converged at iteration {} with relative gap {:e}", iteration, gap);
                    termination = TerminationReason::Converged;
                    break;
                }
            }

            let step_size = match iteration {
                0 => 1.0,
                _ => self.line_search(&sweep.class_flows),
            };
            let num_anomalies = self.update(&sweep.class_flows, step_size);
            let objective = self.objective();
            log::info!("iteration {}: objective {:.6}, gap {:?}, step {:.6}, {:.2}s elapsed",
                       iteration, objective, relative_gap, step_size,
                       start.elapsed().as_secs_f64());
            history.push(IterationReport {
                iteration,
                objective,
                relative_gap,
                step_size,
                dropped_demand: sweep.dropped,
                num_anomalies,
            });
        }
        if termination == TerminationReason::IterationBudgetExhausted {
            log::warn!("stopped after {} iterations with relative gap {:?}",
                       history.len(), final_gap);
        }

        return Ok(AssignmentSummary {
            termination,
            iterations: history.len(),
            final_gap,
            history,
            unreachable,
            degraded: self.network.is_degraded(),
        });
    }

    fn run_parallel<RR, FF>(&self, op: FF) -> RR
        where RR: Send, FF: FnOnce() -> RR + Send
    {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }

    /// Loads every class's demand all-or-nothing at `costs`.  Returns `None` if
    /// the deadline passed before every tree was built.
    fn sweep(&self, demand: &MulticlassDemand, costs: &[Vec<f64>], deadline: Option<Instant>)
             -> Option<Sweep> {
        let network = &self.network;
        let num_links = network.num_links();
        let cancelled = AtomicBool::new(false);
        let mut sweep = Sweep { class_flows: vec![], dropped: 0.0, unreachable: vec![] };

        for (class, link_cost) in costs.iter().enumerate() {
            let origins = demand.active_origins(class);
            // fixed chunking keeps the summation order independent of the thread count
            let chunk_size = ((origins.len() + SWEEP_CHUNKS - 1) / SWEEP_CHUNKS).max(1);
            let partials: Vec<(Vec<f64>, Vec<(usize, LoadSummary)>)> = origins.par_chunks(chunk_size).
                map(|chunk| {
                    let mut flow = vec![0.0; num_links];
                    let mut summaries = vec![];
                    let mut tree = ShortestPathTree::new(network, class, link_cost);
                    for &origin in chunk {
                        // deadline is checked between trees
                        if cancelled.load(Ordering::Relaxed) {
                            break;
                        }
                        if deadline.map_or(false, |dl| Instant::now() >= dl) {
                            cancelled.store(true, Ordering::Relaxed);
                            break;
                        }
                        tree.build_tree(origin);
                        let summary = tree.load_tree(demand.row(class, origin), &mut flow);
                        if !summary.unreachable.is_empty() {
                            summaries.push((origin, summary));
                        }
                    }
                    (flow, summaries)
                }).
                collect();
            if cancelled.load(Ordering::Relaxed) {
                return None;
            }

            let mut flow = vec![0.0; num_links];
            let mut summaries = vec![];
            for (partial, more) in partials {
                flow.iter_mut().zip(partial).for_each(|(ff, pp)| *ff += pp);
                summaries.extend(more);
            }
            let mode = network.user_classes()[class].mode;
            for (origin, summary) in summaries {
                sweep.dropped += summary.dropped;
                for (dest, trips) in summary.unreachable {
                    log::debug!("no path from {} to {} for class {}",
                                network.external_node(origin), network.external_node(dest), mode);
                    sweep.unreachable.push(ConnectivityWarning::Unreachable {
                        class: mode,
                        origin: network.external_node(origin),
                        destination: network.external_node(dest),
                        demand: trips,
                    });
                }
            }
            sweep.class_flows.push(flow);
        }
        return Some(sweep);
    }

    /// `(sum c.x - sum c.y) / sum c.x` over all classes.
    fn relative_gap(&self, costs: &[Vec<f64>], aux_flows: &[Vec<f64>]) -> f64 {
        let mut current = 0.0;
        let mut shortest = 0.0;
        for (class, class_costs) in costs.iter().enumerate() {
            let flows = self.network.flows(class);
            for kk in 0..class_costs.len() {
                current += class_costs[kk] * flows[kk];
                shortest += class_costs[kk] * aux_flows[class][kk];
            }
        }
        if current <= 0.0 {
            return 0.0;
        }
        return (current - shortest) / current;
    }

    /// Monetized part of the objective for the given per-class flows.
    fn linear_cost_term(&self, monetized: &[Vec<f64>], class_flows: &[Vec<f64>]) -> f64 {
        let mut total = 0.0;
        for (class, user_class) in self.network.user_classes().iter().enumerate() {
            let class_total: f64 = monetized[class].iter().zip(class_flows[class].iter()).
                map(|(mm, xx)| mm * xx).
                sum();
            total += user_class.pce * class_total;
        }
        return total;
    }

    /// The convex objective: vdf integrals plus PCE-weighted monetized costs.
    pub fn objective(&self) -> f64 {
        let network = &self.network;
        let monetized: Vec<Vec<f64>> = (0..network.num_user_classes()).
            map(|class| self.performance.monetized_times(network, class)).
            collect();
        let flows: Vec<Vec<f64>> = (0..network.num_user_classes()).
            map(|class| network.flows(class).to_vec()).
            collect();
        return self.performance.apply_volume_delay_integral(network) +
            self.linear_cost_term(&monetized, &flows);
    }

    /// Step size in [0, 1] towards `aux_flows` that minimizes the objective.
    fn line_search(&self, aux_flows: &[Vec<f64>]) -> f64 {
        let network = &self.network;
        let current_volumes = network.volumes();
        let aux_volumes = network.volumes_for(aux_flows);
        let direction: Vec<f64> = aux_volumes.iter().zip(current_volumes.iter()).
            map(|(ww, vv)| ww - vv).
            collect();
        let monetized: Vec<Vec<f64>> = (0..network.num_user_classes()).
            map(|class| self.performance.monetized_times(network, class)).
            collect();
        let flow_change: Vec<Vec<f64>> = aux_flows.iter().enumerate().
            map(|(class, aux)| aux.iter().zip(network.flows(class)).map(|(yy, xx)| yy - xx).collect()).
            collect();
        let linear_slope = self.linear_cost_term(&monetized, &flow_change);

        let derivative = |lambda: f64| -> f64 {
            let volumes: Vec<f64> = current_volumes.iter().zip(direction.iter()).
                map(|(vv, dd)| vv + lambda * dd).
                collect();
            let times = self.performance.link_times(network, &volumes);
            let slope: f64 = times.iter().zip(direction.iter()).map(|(tt, dd)| tt * dd).sum();
            slope + linear_slope
        };

        if derivative(1.0) <= 0.0 {
            return 1.0;
        }
        if derivative(0.0) >= 0.0 {
            return 0.0;
        }
        // the objective falls on [0, lo] and rises past hi
        let mut lo = 0.0;
        let mut hi = 1.0;
        let mut steps = 0;
        while hi - lo > self.cfg.line_search_tolerance && steps < self.cfg.max_line_search_steps {
            let mid = 0.5 * (lo + hi);
            if derivative(mid) > 0.0 {
                hi = mid;
            } else {
                lo = mid;
            }
            steps += 1;
        }
        return lo;
    }

    /// Moves every class's flows `step_size` of the way to `aux_flows` and
    /// recomputes congested times.  Returns the number of numerical anomalies.
    fn update(&mut self, aux_flows: &[Vec<f64>], step_size: f64) -> usize {
        for (class, aux) in aux_flows.iter().enumerate() {
            let flows = self.network.flows_mut(class);
            for (xx, yy) in flows.iter_mut().zip(aux.iter()) {
                *xx += step_size * (yy - *xx);
            }
        }
        self.network.refresh_volumes();
        return self.performance.apply_volume_delay(&mut self.network).len();
    }
}
