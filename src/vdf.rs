//! Volume-delay functions and their closed-form integrals.
//!
//! | type       | time                                        | parameters  |
//! |------------|---------------------------------------------|-------------|
//! | `bpr`      | `t0 * (1 + alpha * (v/c)^beta)`             | alpha, beta |
//! | `conical`  | `t0 * f(v/c)`, Spiess' conical function     | alpha > 1   |
//! | `constant` | `t0`                                        |             |
//!
//! `t0` is the free-flow time in minutes, `v` the PCE volume and `c` the total
//! capacity of the link.

use std::collections::HashMap;

use yaml_rust::Yaml;

use crate::config_utils;
use crate::error::{AssignResult, ConfigurationError};


#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VolumeDelayFunction {
    Bpr { alpha: f64, beta: f64 },
    Conical { alpha: f64 },
    Constant,
}

impl VolumeDelayFunction {
    pub fn from_yaml(yaml_cfg: &Yaml) -> AssignResult<(u32, VolumeDelayFunction)> {
        let id = match yaml_cfg["id"].as_i64() {
            Some(id) if id >= 0 => id as u32,
            _ => return Err(ConfigurationError::MissingEntry(String::from("vdfs.id"))),
        };
        let vdf = match config_utils::required_str(yaml_cfg, "type")? {
            "bpr" => VolumeDelayFunction::Bpr {
                alpha: config_utils::optional_f64(yaml_cfg, "alpha", 0.15)?,
                beta: config_utils::optional_f64(yaml_cfg, "beta", 4.0)?,
            },
            "conical" => VolumeDelayFunction::Conical {
                alpha: config_utils::required_f64(yaml_cfg, "alpha")?,
            },
            "constant" => VolumeDelayFunction::Constant,
            other => return Err(ConfigurationError::invalid_parameter(
                "vdfs.type", format!("unknown function type '{}'", other))),
        };
        vdf.validate()?;
        return Ok((id, vdf));
    }

    pub fn validate(&self) -> AssignResult<()> {
        match *self {
            VolumeDelayFunction::Bpr { alpha, beta } => {
                if !(alpha >= 0.0) || !(beta >= 0.0) {
                    return Err(ConfigurationError::invalid_parameter(
                        "bpr", format!("alpha {} and beta {} must be non-negative", alpha, beta)));
                }
            }
            VolumeDelayFunction::Conical { alpha } => {
                if !(alpha > 1.0) {
                    return Err(ConfigurationError::invalid_parameter(
                        "conical", format!("alpha {} must exceed 1", alpha)));
                }
            }
            VolumeDelayFunction::Constant => (),
        }
        Ok(())
    }

    /// Congested time in minutes.
    pub fn time(&self, free_flow_time: f64, volume: f64, capacity: f64) -> f64 {
        match *self {
            VolumeDelayFunction::Bpr { alpha, beta } => {
                let vc_ratio = volume / capacity;
                free_flow_time * (1.0 + alpha * vc_ratio.powf(beta))
            }
            VolumeDelayFunction::Conical { alpha } => {
                free_flow_time * conical(alpha, volume / capacity)
            }
            VolumeDelayFunction::Constant => free_flow_time,
        }
    }

    /// Integral of `time` over volume from 0 to `volume`.
    pub fn integral(&self, free_flow_time: f64, volume: f64, capacity: f64) -> f64 {
        match *self {
            VolumeDelayFunction::Bpr { alpha, beta } => {
                if volume == 0.0 {
                    return 0.0;
                }
                let vc_ratio = volume / capacity;
                free_flow_time * volume * (1.0 + alpha / (beta + 1.0) * vc_ratio.powf(beta))
            }
            VolumeDelayFunction::Conical { alpha } => {
                if volume == 0.0 {
                    return 0.0;
                }
                free_flow_time * capacity * conical_integral(alpha, volume / capacity)
            }
            VolumeDelayFunction::Constant => free_flow_time * volume,
        }
    }
}

fn conical_beta(alpha: f64) -> f64 {
    (2.0 * alpha - 1.0) / (2.0 * alpha - 2.0)
}

fn conical(alpha: f64, xx: f64) -> f64 {
    let beta = conical_beta(alpha);
    let slack = alpha * (1.0 - xx);
    2.0 + (slack.powi(2) + beta.powi(2)).sqrt() - slack - beta
}

/// Antiderivative of `sqrt(u^2 + beta^2)` in `u`.
fn hyperbolic_area(uu: f64, beta: f64) -> f64 {
    let root = (uu.powi(2) + beta.powi(2)).sqrt();
    0.5 * uu * root + 0.5 * beta.powi(2) * (uu + root).ln()
}

fn conical_integral(alpha: f64, xx: f64) -> f64 {
    let beta = conical_beta(alpha);
    let linear = (2.0 - beta - alpha) * xx + 0.5 * alpha * xx.powi(2);
    let root_part = (hyperbolic_area(alpha, beta) -
                     hyperbolic_area(alpha * (1.0 - xx), beta)) / alpha;
    linear + root_part
}

/// Parses the `vdfs` list of the run config into a registry keyed by id.
pub fn vdfs_from_yaml(yaml_cfg: &Yaml) -> AssignResult<HashMap<u32, VolumeDelayFunction>> {
    let entries = yaml_cfg.as_vec().
        ok_or_else(|| ConfigurationError::MissingEntry(String::from("vdfs")))?;
    let mut vdfs = HashMap::new();
    for entry in entries {
        let (id, vdf) = VolumeDelayFunction::from_yaml(entry)?;
        if vdfs.insert(id, vdf).is_some() {
            return Err(ConfigurationError::invalid_parameter(
                "vdfs.id", format!("function {} defined twice", id)));
        }
    }
    return Ok(vdfs);
}
