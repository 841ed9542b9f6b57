use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use crate::error::{AssignResult, ConfigurationError};
use crate::geometry::Point2d;
use crate::link_performance::TurnPenalty;

// A convenience type for parsing csv data
type Row = HashMap<String, String>;


#[derive(Debug, Clone, PartialEq)]
pub struct NodeRow {
    pub node: u32,
    pub position: Point2d,
}

/// One directed link as found in the network table.  `speed` is the coded
/// free-flow speed, zero meaning "use the default for the link's modes".
#[derive(Debug, Clone, PartialEq)]
pub struct LinkRow {
    pub anode: u32,
    pub bnode: u32,
    pub modes: String,
    pub speed: f64,
    pub dist: f64,
    pub lanes: f64,
    pub vdf: u32,
}

impl LinkRow {
    pub fn new(anode: u32, bnode: u32, modes: &str, speed: f64, dist: f64, lanes: f64, vdf: u32)
               -> LinkRow {
        LinkRow { anode, bnode, modes: String::from(modes), speed, dist, lanes, vdf }
    }
}

/// Per-link attribute overrides.  Only the fields that are set are applied.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LinkAttributeRow {
    pub anode: u32,
    pub bnode: u32,
    pub capacity: Option<f64>,
    pub drop: bool,
    pub taz: Option<u32>,
    pub unique_id: Option<u32>,
    /// Monetized cost per user class, keyed by mode character.
    pub costs: Vec<(char, f64)>,
    pub revised_modes: Option<String>,
    pub fixed_time: Option<f64>,
    pub preload: Option<f64>,
}

impl LinkAttributeRow {
    pub fn new(anode: u32, bnode: u32) -> LinkAttributeRow {
        LinkAttributeRow { anode, bnode, ..Default::default() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TurnRow {
    pub from_node: u32,
    pub via_node: u32,
    pub to_node: u32,
    pub penalty: TurnPenalty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OdRow {
    pub origin: u32,
    pub destination: u32,
    pub class: char,
    pub trips: f64,
}


struct TableReader {
    table: String,
    reader: csv::Reader<Box<dyn Read>>,
}

impl TableReader {
    fn open(path: &Path) -> AssignResult<TableReader> {
        let file = File::open(path).map_err(|source| {
            ConfigurationError::Io { path: path.display().to_string(), source }
        })?;
        let table = path.file_name().map(|ff| ff.to_string_lossy().into_owned()).
            unwrap_or_else(|| path.display().to_string());
        Ok(TableReader::from_reader(&table, Box::new(file)))
    }

    fn from_reader(table: &str, reader: Box<dyn Read>) -> TableReader {
        let reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        TableReader { table: String::from(table), reader }
    }

    fn rows(&mut self) -> AssignResult<Vec<Row>> {
        let mut rows = vec![];
        for result in self.reader.deserialize() {
            let row: Row = result?;
            rows.push(row);
        }
        Ok(rows)
    }

    fn malformed(&self, row: usize, column: &str, reason: &str) -> ConfigurationError {
        ConfigurationError::MalformedRow {
            table: self.table.clone(),
            row,
            column: String::from(column),
            reason: String::from(reason),
        }
    }

    fn field<T: FromStr>(&self, row: &Row, row_idx: usize, column: &str) -> AssignResult<T> {
        match self.optional_field(row, row_idx, column)? {
            Some(value) => Ok(value),
            None => Err(self.malformed(row_idx, column, "missing value")),
        }
    }

    fn optional_field<T: FromStr>(&self, row: &Row, row_idx: usize, column: &str)
                                  -> AssignResult<Option<T>> {
        match row.get(column) {
            None => Ok(None),
            Some(text) if text.is_empty() => Ok(None),
            Some(text) => match text.parse() {
                Ok(value) => Ok(Some(value)),
                Err(_) => Err(self.malformed(row_idx, column, &format!("cannot parse '{}'", text))),
            },
        }
    }
}


impl NodeRow {
    pub fn all_from_csv(csvpath: &Path) -> AssignResult<Vec<NodeRow>> {
        NodeRow::from_table(TableReader::open(csvpath)?)
    }

    fn from_table(mut table: TableReader) -> AssignResult<Vec<NodeRow>> {
        let mut nodes = vec![];
        for (ii, row) in table.rows()?.iter().enumerate() {
            nodes.push(NodeRow {
                node: table.field(row, ii, "node")?,
                position: Point2d::new(table.field(row, ii, "x")?, table.field(row, ii, "y")?),
            });
        }
        Ok(nodes)
    }
}

impl LinkRow {
    pub fn all_from_csv(csvpath: &Path) -> AssignResult<Vec<LinkRow>> {
        LinkRow::from_table(TableReader::open(csvpath)?)
    }

    fn from_table(mut table: TableReader) -> AssignResult<Vec<LinkRow>> {
        let mut links = vec![];
        for (ii, row) in table.rows()?.iter().enumerate() {
            links.push(LinkRow {
                anode: table.field(row, ii, "anode")?,
                bnode: table.field(row, ii, "bnode")?,
                modes: row.get("mode").cloned().unwrap_or_default(),
                speed: table.field(row, ii, "speed")?,
                dist: table.field(row, ii, "dist")?,
                lanes: table.optional_field(row, ii, "lanes")?.unwrap_or(1.0),
                vdf: table.optional_field(row, ii, "vdf")?.unwrap_or(1),
            });
        }
        Ok(links)
    }
}

fn parse_flag(text: &str) -> Option<bool> {
    match text.to_lowercase().as_str() {
        "" | "0" | "false" | "no" => Some(false),
        "1" | "true" | "yes" => Some(true),
        _ => None,
    }
}

impl LinkAttributeRow {
    pub fn all_from_csv(csvpath: &Path) -> AssignResult<Vec<LinkAttributeRow>> {
        LinkAttributeRow::from_table(TableReader::open(csvpath)?)
    }

    fn from_table(mut table: TableReader) -> AssignResult<Vec<LinkAttributeRow>> {
        let mut attributes = vec![];
        for (ii, row) in table.rows()?.iter().enumerate() {
            let drop = match row.get("drop") {
                Some(text) => parse_flag(text).
                    ok_or_else(|| table.malformed(ii, "drop", "expected a 0/1 flag"))?,
                None => false,
            };
            // cost columns are named cost_<mode>, one per user class
            let mut costs = vec![];
            for column in row.keys() {
                if let Some(mode) = column.strip_prefix("cost_") {
                    let mut chars = mode.chars();
                    let mode = match (chars.next(), chars.next()) {
                        (Some(cc), None) => cc,
                        _ => return Err(table.malformed(ii, column, "expected cost_<mode character>")),
                    };
                    if let Some(cost) = table.optional_field::<f64>(row, ii, column)? {
                        costs.push((mode, cost));
                    }
                }
            }
            costs.sort_by(|aa, bb| aa.0.cmp(&bb.0));
            attributes.push(LinkAttributeRow {
                anode: table.field(row, ii, "anode")?,
                bnode: table.field(row, ii, "bnode")?,
                capacity: table.optional_field(row, ii, "capacity")?,
                drop,
                taz: table.optional_field(row, ii, "taz")?,
                unique_id: table.optional_field(row, ii, "unique_id")?,
                costs,
                revised_modes: row.get("revised_modes").filter(|mm| !mm.is_empty()).cloned(),
                fixed_time: table.optional_field(row, ii, "fixed_time")?,
                preload: table.optional_field(row, ii, "preload")?,
            });
        }
        Ok(attributes)
    }
}

impl TurnRow {
    pub fn all_from_csv(csvpath: &Path) -> AssignResult<Vec<TurnRow>> {
        TurnRow::from_table(TableReader::open(csvpath)?)
    }

    fn from_table(mut table: TableReader) -> AssignResult<Vec<TurnRow>> {
        let mut turns = vec![];
        for (ii, row) in table.rows()?.iter().enumerate() {
            let text = row.get("penalty").map(|ss| ss.to_lowercase()).unwrap_or_default();
            let penalty = match text.as_str() {
                "" | "none" => TurnPenalty::NoPenalty,
                "prohibited" | "x" => TurnPenalty::Prohibited,
                _ => TurnPenalty::Penalty(table.field(row, ii, "penalty")?),
            };
            turns.push(TurnRow {
                from_node: table.field(row, ii, "from_node")?,
                via_node: table.field(row, ii, "via_node")?,
                to_node: table.field(row, ii, "to_node")?,
                penalty,
            });
        }
        Ok(turns)
    }
}

impl OdRow {
    pub fn all_from_csv(csvpath: &Path) -> AssignResult<Vec<OdRow>> {
        OdRow::from_table(TableReader::open(csvpath)?)
    }

    fn from_table(mut table: TableReader) -> AssignResult<Vec<OdRow>> {
        let mut rows = vec![];
        for (ii, row) in table.rows()?.iter().enumerate() {
            rows.push(OdRow {
                origin: table.field(row, ii, "origin")?,
                destination: table.field(row, ii, "destination")?,
                class: table.field(row, ii, "class")?,
                trips: table.field(row, ii, "trips")?,
            });
        }
        Ok(rows)
    }
}
