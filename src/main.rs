use rust_highway_assignment::{HighwayAssignment, TerminationReason};
use env_logger;


fn main () {
    env_logger::init();
    let config_path = match std::env::args().nth(1) {
        Some(path) => path,
        None => {
            eprintln!("usage: rust_highway_assignment <config.yaml>");
            std::process::exit(2);
        }
    };

    let mut assignment = match HighwayAssignment::from_cfg(&config_path) {
        Ok(assignment) => assignment,
        Err(err) => {
            log::error!("could not set up the assignment: {}", err);
            std::process::exit(1);
        }
    };
    match assignment.run() {
        Ok(summary) => {
            log::info!("finished after {} iterations ({:?}), final gap {:?}",
                       summary.iterations, summary.termination, summary.final_gap);
            if summary.termination != TerminationReason::Converged {
                log::warn!("assignment did not reach the target gap");
            }
        }
        Err(err) => {
            log::error!("assignment failed: {}", err);
            std::process::exit(1);
        }
    }
}
