use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use yaml_rust::{Yaml, YamlLoader};

use crate::config_utils;
use crate::error::{AssignResult, ConfigurationError};
use crate::vdf::{self, VolumeDelayFunction};
use crate::ClassCostConfig;

/// The most user classes a link's class bitmask can hold.
pub const MAX_USER_CLASSES: usize = 32;


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Peak,
    Offpeak,
}

impl FromStr for Period {
    type Err = ConfigurationError;

    fn from_str(ss: &str) -> Result<Period, ConfigurationError> {
        match ss.to_lowercase().as_str() {
            "peak" | "pk" => Ok(Period::Peak),
            "offpeak" | "op" => Ok(Period::Offpeak),
            _ => Err(ConfigurationError::invalid_parameter(
                "period", format!("'{}' is neither peak nor offpeak", ss))),
        }
    }
}


/// A highway user class, identified on links by its mode character.
#[derive(Debug, Clone, PartialEq)]
pub struct UserClass {
    pub mode: char,
    pub pce: f64,
    pub vot_peak: f64,
    pub vot_offpeak: f64,
    /// Operating cost per unit distance, in the same currency as the values of time.
    pub op_cost: f64,
}

impl UserClass {
    pub fn new(mode: char, pce: f64, vot_peak: f64, vot_offpeak: f64, op_cost: f64) -> UserClass {
        UserClass { mode, pce, vot_peak, vot_offpeak, op_cost }
    }

    fn from_yaml(yaml_cfg: &Yaml) -> AssignResult<UserClass> {
        let mode = config_utils::required_char(yaml_cfg, "mode")?;
        let class = UserClass {
            mode,
            pce: config_utils::optional_f64(yaml_cfg, "pce", 1.0)?,
            vot_peak: config_utils::required_f64(yaml_cfg, "vot_peak")?,
            vot_offpeak: config_utils::required_f64(yaml_cfg, "vot_offpeak")?,
            op_cost: config_utils::required_f64(yaml_cfg, "op_cost")?,
        };
        return Ok(class);
    }

    pub fn value_of_time(&self, period: Period) -> f64 {
        match period {
            Period::Peak => self.vot_peak,
            Period::Offpeak => self.vot_offpeak,
        }
    }

    pub fn validate(&self) -> AssignResult<()> {
        let checks = [("pce", self.pce), ("vot_peak", self.vot_peak),
                      ("vot_offpeak", self.vot_offpeak), ("op_cost", self.op_cost)];
        for (name, value) in checks.iter() {
            // NaN fails this test too
            if !(*value > 0.0) {
                return Err(ConfigurationError::InvalidUserClass {
                    class: self.mode,
                    reason: format!("{} must be positive, got {}", name, value),
                });
            }
        }
        Ok(())
    }
}


/// Everything the network build needs beyond the input tables.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub period: Period,
    pub volume_factor: f64,
    /// Nodes with external ids in `1..=max_centroid` are zone centroids.
    pub max_centroid: u32,
    pub user_classes: Vec<UserClass>,
}

impl NetworkConfig {
    pub fn new(period: Period, volume_factor: f64, max_centroid: u32, user_classes: Vec<UserClass>)
               -> NetworkConfig {
        NetworkConfig { period, volume_factor, max_centroid, user_classes }
    }

    pub fn is_centroid(&self, external_id: u32) -> bool {
        return external_id >= 1 && external_id <= self.max_centroid;
    }

    pub fn class_index(&self, mode: char) -> Option<usize> {
        self.user_classes.iter().position(|uc| uc.mode == mode)
    }

    pub fn validate(&self) -> AssignResult<()> {
        if self.user_classes.is_empty() {
            return Err(ConfigurationError::invalid_parameter("user_classes", "at least one class is required"));
        }
        if self.user_classes.len() > MAX_USER_CLASSES {
            return Err(ConfigurationError::invalid_parameter(
                "user_classes", format!("at most {} classes are supported", MAX_USER_CLASSES)));
        }
        for (ii, class) in self.user_classes.iter().enumerate() {
            class.validate()?;
            if self.user_classes[..ii].iter().any(|other| other.mode == class.mode) {
                return Err(ConfigurationError::InvalidUserClass {
                    class: class.mode,
                    reason: String::from("mode character used by more than one class"),
                });
            }
        }
        if !(self.volume_factor > 0.0) {
            return Err(ConfigurationError::invalid_parameter(
                "volume_factor", format!("must be positive, got {}", self.volume_factor)));
        }
        Ok(())
    }
}

impl ClassCostConfig for NetworkConfig {
    fn get_user_classes(&self) -> &[UserClass] {
        return &self.user_classes;
    }

    fn get_period(&self) -> Period {
        return self.period;
    }
}


#[derive(Debug, Clone)]
pub struct SolverConfig {
    pub max_iterations: usize,
    pub relative_gap: f64,
    pub line_search_tolerance: f64,
    pub max_line_search_steps: usize,
    pub max_wall_time: Option<Duration>,
    /// Size of a dedicated worker pool; the global rayon pool is used if unset.
    pub num_threads: Option<usize>,
}

impl Default for SolverConfig {
    fn default() -> SolverConfig {
        SolverConfig {
            max_iterations: 100,
            relative_gap: 1e-4,
            line_search_tolerance: 1e-8,
            max_line_search_steps: 60,
            max_wall_time: None,
            num_threads: None,
        }
    }
}

impl SolverConfig {
    fn from_yaml(yaml_cfg: &Yaml) -> AssignResult<SolverConfig> {
        let default = SolverConfig::default();
        if yaml_cfg.is_badvalue() {
            return Ok(default);
        }
        let max_wall_time = match yaml_cfg["max_wall_time_s"].is_badvalue() {
            true => None,
            false => {
                let secs = config_utils::required_f64(yaml_cfg, "max_wall_time_s")?;
                if !(secs >= 0.0) || !secs.is_finite() {
                    return Err(ConfigurationError::invalid_parameter(
                        "max_wall_time_s", "must be a non-negative number of seconds"));
                }
                Some(Duration::from_secs_f64(secs))
            }
        };
        let cfg = SolverConfig {
            max_iterations: config_utils::optional_usize(yaml_cfg, "max_iterations")?.
                unwrap_or(default.max_iterations),
            relative_gap: config_utils::optional_f64(yaml_cfg, "relative_gap", default.relative_gap)?,
            line_search_tolerance: config_utils::optional_f64(
                yaml_cfg, "line_search_tolerance", default.line_search_tolerance)?,
            max_line_search_steps: config_utils::optional_usize(yaml_cfg, "max_line_search_steps")?.
                unwrap_or(default.max_line_search_steps),
            max_wall_time,
            num_threads: config_utils::optional_usize(yaml_cfg, "num_threads")?,
        };
        cfg.validate()?;
        return Ok(cfg);
    }

    pub fn validate(&self) -> AssignResult<()> {
        if self.max_iterations == 0 {
            return Err(ConfigurationError::invalid_parameter("max_iterations", "must be at least 1"));
        }
        if !(self.relative_gap >= 0.0) {
            return Err(ConfigurationError::invalid_parameter("relative_gap", "must be non-negative"));
        }
        if !(self.line_search_tolerance > 0.0) {
            return Err(ConfigurationError::invalid_parameter("line_search_tolerance", "must be positive"));
        }
        if self.num_threads == Some(0) {
            return Err(ConfigurationError::invalid_parameter("num_threads", "must be at least 1"));
        }
        Ok(())
    }
}


#[derive(Debug, Clone)]
pub struct InputPaths {
    pub nodes: PathBuf,
    pub links: PathBuf,
    pub link_attributes: Option<PathBuf>,
    pub turns: Option<PathBuf>,
    pub demand: PathBuf,
}


/// The complete configuration of one assignment run.
#[derive(Debug, Clone)]
pub struct AssignConfig {
    pub network: NetworkConfig,
    pub vdfs: HashMap<u32, VolumeDelayFunction>,
    pub solver: SolverConfig,
    pub check_connectivity: bool,
    pub inputs: InputPaths,
    pub link_results: Option<PathBuf>,
}

impl AssignConfig {
    pub fn from_path(config_path: &Path) -> AssignResult<AssignConfig> {
        let file_contents = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigurationError::Io { path: config_path.display().to_string(), source }
        })?;
        let docs = YamlLoader::load_from_str(&file_contents)?;
        let yaml_cfg = docs.get(0).
            ok_or_else(|| ConfigurationError::MissingEntry(String::from("config document")))?;
        let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
        return AssignConfig::from_yaml(yaml_cfg, base_dir);
    }

    /// Input paths in the yaml are resolved relative to `base_dir`.
    pub fn from_yaml(yaml_cfg: &Yaml, base_dir: &Path) -> AssignResult<AssignConfig> {
        let period: Period = match yaml_cfg["period"].as_str() {
            Some(ss) => ss.parse()?,
            None => Period::Peak,
        };
        let max_centroid = match yaml_cfg["max_centroid"].as_i64() {
            Some(mc) if mc >= 0 => mc as u32,
            _ => return Err(ConfigurationError::MissingEntry(String::from("max_centroid"))),
        };
        let class_entries = yaml_cfg["user_classes"].as_vec().
            ok_or_else(|| ConfigurationError::MissingEntry(String::from("user_classes")))?;
        let user_classes = class_entries.iter().
            map(UserClass::from_yaml).
            collect::<AssignResult<Vec<UserClass>>>()?;
        let network = NetworkConfig {
            period,
            volume_factor: config_utils::optional_f64(yaml_cfg, "volume_factor", 1.0)?,
            max_centroid,
            user_classes,
        };
        network.validate()?;

        let inputs_cfg = &yaml_cfg["inputs"];
        let required_path = |key: &str| -> AssignResult<PathBuf> {
            config_utils::optional_path(inputs_cfg, key, base_dir).
                ok_or_else(|| ConfigurationError::MissingEntry(format!("inputs.{}", key)))
        };
        let inputs = InputPaths {
            nodes: required_path("nodes")?,
            links: required_path("links")?,
            link_attributes: config_utils::optional_path(inputs_cfg, "link_attributes", base_dir),
            turns: config_utils::optional_path(inputs_cfg, "turns", base_dir),
            demand: required_path("demand")?,
        };

        return Ok(AssignConfig {
            network,
            vdfs: vdf::vdfs_from_yaml(&yaml_cfg["vdfs"])?,
            solver: SolverConfig::from_yaml(&yaml_cfg["solver"])?,
            check_connectivity: yaml_cfg["check_connectivity"].as_bool().unwrap_or(false),
            inputs,
            link_results: config_utils::optional_path(&yaml_cfg["output"], "link_results", base_dir),
        });
    }
}
