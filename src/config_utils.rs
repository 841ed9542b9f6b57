use std::path::Path;
use std::path::PathBuf;

use yaml_rust::Yaml;

use crate::error::{AssignResult, ConfigurationError};


pub fn str_to_absolute_path(path_str: &str, default_base_dir: &Path) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        return path;
    } else {
        return [default_base_dir, Path::new(&path)].iter().collect();
    }
}

/// Reads a number that may have been written as an integer in the yaml.
pub fn yaml_as_f64(value: &Yaml) -> Option<f64> {
    match value {
        Yaml::Real(_) => value.as_f64(),
        Yaml::Integer(ii) => Some(*ii as f64),
        _ => None,
    }
}

pub fn required_f64(yaml_cfg: &Yaml, key: &str) -> AssignResult<f64> {
    return yaml_as_f64(&yaml_cfg[key]).
        ok_or_else(|| ConfigurationError::MissingEntry(String::from(key)));
}

pub fn optional_f64(yaml_cfg: &Yaml, key: &str, default: f64) -> AssignResult<f64> {
    if yaml_cfg[key].is_badvalue() {
        return Ok(default);
    }
    return yaml_as_f64(&yaml_cfg[key]).
        ok_or_else(|| ConfigurationError::invalid_parameter(key, "expected a number"));
}

pub fn optional_usize(yaml_cfg: &Yaml, key: &str) -> AssignResult<Option<usize>> {
    if yaml_cfg[key].is_badvalue() {
        return Ok(None);
    }
    match yaml_cfg[key].as_i64() {
        Some(vv) if vv >= 0 => Ok(Some(vv as usize)),
        _ => Err(ConfigurationError::invalid_parameter(key, "expected a non-negative integer")),
    }
}

pub fn required_str<'a>(yaml_cfg: &'a Yaml, key: &str) -> AssignResult<&'a str> {
    return yaml_cfg[key].as_str().
        ok_or_else(|| ConfigurationError::MissingEntry(String::from(key)));
}

pub fn optional_path(yaml_cfg: &Yaml, key: &str, base_dir: &Path) -> Option<PathBuf> {
    yaml_cfg[key].as_str().map(|ss| str_to_absolute_path(ss, base_dir))
}

/// Reads a one-character mode code, which yaml may hand back as a string or
/// (for digit codes) an integer.
pub fn required_char(yaml_cfg: &Yaml, key: &str) -> AssignResult<char> {
    let text = match &yaml_cfg[key] {
        Yaml::String(ss) => ss.clone(),
        Yaml::Integer(ii) => ii.to_string(),
        _ => return Err(ConfigurationError::MissingEntry(String::from(key))),
    };
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(cc), None) => Ok(cc),
        _ => Err(ConfigurationError::invalid_parameter(key, format!("'{}' is not a single character", text))),
    }
}
