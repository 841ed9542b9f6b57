// standard library imports
use std::path::{Path, PathBuf};

// imports of other modules from this crate
mod error;
pub use error::{AssignResult, ConfigurationError};

mod diagnostics;
pub use diagnostics::{ConnectivityWarning, NumericalAnomaly};

mod config_utils;

mod config;
pub use config::{AssignConfig, InputPaths, NetworkConfig, Period, SolverConfig, UserClass,
                 MAX_USER_CLASSES};

mod geometry;
pub use geometry::Point2d;

mod tables;
pub use tables::{LinkAttributeRow, LinkRow, NodeRow, OdRow, TurnRow};

mod vdf;
pub use vdf::VolumeDelayFunction;

mod network;
pub use network::{ClassMask, Link, NetworkGraph, Node, StarIndex, TurnEntry, TurnTable};

mod connectivity;

mod link_performance;
pub use link_performance::{LinkPerformanceModel, TurnPenalty};

mod shortest_path;
pub use shortest_path::{LoadSummary, ShortestPathTree, COMPARE_EPSILON};

mod demand;
pub use demand::MulticlassDemand;

mod equilibrium;
pub use equilibrium::{AssignmentSummary, EquilibriumSolver, IterationReport, TerminationReason};

mod skims;
pub use skims::{average_trip_skim, build_skim_matrices, check_od_connectivity, HighwaySkims,
                TripAverage};

mod report;
pub use report::{link_summary_report, log_link_time_freqs, write_assignment_results, VdfSummary};

#[cfg(test)]
mod test_utils;


/// Defines how every part of the model turns money into minutes for a class.
pub trait ClassCostConfig {
    fn get_user_classes(&self) -> &[UserClass];
    fn get_period(&self) -> Period;

    fn get_value_of_time(&self, class: usize) -> f64 {
        return self.get_user_classes()[class].value_of_time(self.get_period());
    }

    /// Minutes equivalent to `cost` for `class`; value of time is per hour.
    fn money_to_minutes(&self, class: usize, cost: f64) -> f64 {
        return 60.0 * cost / self.get_value_of_time(class);
    }

    /// A link's toll plus its distance-based operating cost, in minutes.
    fn link_cost_minutes(&self, class: usize, link_cost: f64, dist: f64) -> f64 {
        let op_cost = self.get_user_classes()[class].op_cost;
        return self.money_to_minutes(class, link_cost + op_cost * dist);
    }
}


/// One period's assignment, from input tables to written results.
pub struct HighwayAssignment {
    solver: EquilibriumSolver,
    demand: MulticlassDemand,
    link_results: Option<PathBuf>,
    connectivity_warnings: Vec<ConnectivityWarning>,
}

impl HighwayAssignment {
    pub fn from_cfg(config_path_str: &str) -> AssignResult<HighwayAssignment> {
        let mut config_path = PathBuf::new();
        config_path.push(config_path_str);
        let cfg = AssignConfig::from_path(&config_path)?;
        return HighwayAssignment::from_config(cfg);
    }

    pub fn from_config(cfg: AssignConfig) -> AssignResult<HighwayAssignment> {
        let inputs = &cfg.inputs;
        let node_rows = NodeRow::all_from_csv(&inputs.nodes)?;
        let link_rows = LinkRow::all_from_csv(&inputs.links)?;
        let overrides = read_optional(&inputs.link_attributes, LinkAttributeRow::all_from_csv)?;
        let turn_rows = read_optional(&inputs.turns, TurnRow::all_from_csv)?;
        let od_rows = OdRow::all_from_csv(&inputs.demand)?;

        let network = NetworkGraph::build(&cfg.network, &node_rows, &link_rows, &overrides,
                                          &turn_rows)?;
        log_link_time_freqs(&network);
        let performance = LinkPerformanceModel::new(cfg.vdfs.clone(), &network)?;
        let demand = MulticlassDemand::from_od_rows(&network, &od_rows)?;

        let mut connectivity_warnings = vec![];
        if cfg.check_connectivity {
            connectivity_warnings.extend(network.check_for_isolated_links());
            for class in 0..network.num_user_classes() {
                network.strong_components(class);
            }
            connectivity_warnings.extend(check_od_connectivity(&network, &performance, &demand));
        }

        let solver = EquilibriumSolver::new(network, performance, cfg.solver.clone())?;
        return Ok(HighwayAssignment {
            solver,
            demand,
            link_results: cfg.link_results.clone(),
            connectivity_warnings,
        });
    }

    /// Solves for equilibrium, logs the link summary and writes link results
    /// if an output path was configured.
    pub fn run(&mut self) -> AssignResult<AssignmentSummary> {
        let summary = self.solver.solve(&self.demand)?;
        link_summary_report(self.solver.network());
        if let Some(path) = &self.link_results {
            write_assignment_results(self.solver.network(), self.solver.performance(), path)?;
        }
        if summary.degraded {
            log::warn!("numerical anomalies occurred during the assignment");
        }
        return Ok(summary);
    }

    pub fn network(&self) -> &NetworkGraph {
        self.solver.network()
    }

    pub fn performance(&self) -> &LinkPerformanceModel {
        self.solver.performance()
    }

    pub fn demand(&self) -> &MulticlassDemand {
        &self.demand
    }

    /// Findings of the pre-assignment connectivity check, empty if it was
    /// not requested.
    pub fn connectivity_warnings(&self) -> &[ConnectivityWarning] {
        &self.connectivity_warnings
    }

    /// Skims for `class` at the network's current congested times.
    pub fn skims(&self, class: usize) -> HighwaySkims {
        HighwaySkims::build(self.network(), self.performance(), class)
    }
}

fn read_optional<TT>(path: &Option<PathBuf>, read: fn(&Path) -> AssignResult<Vec<TT>>)
                     -> AssignResult<Vec<TT>> {
    match path {
        Some(path) => read(path),
        None => Ok(vec![]),
    }
}
