use ndarray::prelude::*;

use crate::error::{AssignResult, ConfigurationError};
use crate::network::NetworkGraph;
use crate::tables::OdRow;


/// Trips per user class as dense zone-by-zone tables, indexed by internal
/// zone index (row origin, column destination).
#[derive(Debug, Clone, PartialEq)]
pub struct MulticlassDemand {
    tables: Vec<Array2<f64>>,
}

impl MulticlassDemand {
    pub fn zeros(num_classes: usize, num_zones: usize) -> MulticlassDemand {
        MulticlassDemand { tables: vec![Array2::zeros((num_zones, num_zones)); num_classes] }
    }

    /// Builds the tables from o/d rows keyed by external zone id and class
    /// mode character.  Rows for the same pair accumulate.
    pub fn from_od_rows(network: &NetworkGraph, rows: &[OdRow]) -> AssignResult<MulticlassDemand> {
        let mut demand = MulticlassDemand::zeros(network.num_user_classes(), network.num_centroids());
        for row in rows {
            let class = network.config().class_index(row.class).ok_or_else(|| {
                ConfigurationError::invalid_parameter(
                    "demand", format!("trips given for unknown class '{}'", row.class))
            })?;
            let origin = network.zone_index(row.origin).
                ok_or(ConfigurationError::UnresolvedZone(row.origin))?;
            let destination = network.zone_index(row.destination).
                ok_or(ConfigurationError::UnresolvedZone(row.destination))?;
            if !(row.trips >= 0.0) || !row.trips.is_finite() {
                return Err(ConfigurationError::invalid_parameter(
                    "demand", format!("{} trips from {} to {}", row.trips, row.origin, row.destination)));
            }
            demand.tables[class][[origin, destination]] += row.trips;
        }
        for (class, table) in demand.tables.iter().enumerate() {
            log::info!("class {} demand: {:.1} trips", network.user_classes()[class].mode, table.sum());
        }
        return Ok(demand);
    }

    pub fn num_classes(&self) -> usize {
        self.tables.len()
    }

    pub fn num_zones(&self) -> usize {
        self.tables.get(0).map(|tt| tt.nrows()).unwrap_or(0)
    }

    pub fn table(&self, class: usize) -> &Array2<f64> {
        &self.tables[class]
    }

    pub fn table_mut(&mut self, class: usize) -> &mut Array2<f64> {
        &mut self.tables[class]
    }

    pub fn row(&self, class: usize, origin: usize) -> ArrayView1<f64> {
        self.tables[class].row(origin)
    }

    pub fn total(&self, class: usize) -> f64 {
        self.tables[class].sum()
    }

    /// Origins with any trips for `class`, ascending.
    pub fn active_origins(&self, class: usize) -> Vec<usize> {
        self.tables[class].outer_iter().
            enumerate().
            filter(|(_, row)| row.iter().any(|&trips| trips > 0.0)).
            map(|(origin, _)| origin).
            collect()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils;

    fn od(origin: u32, destination: u32, class: char, trips: f64) -> OdRow {
        OdRow { origin, destination, class, trips }
    }

    #[test]
    fn test_from_od_rows() {
        let network = test_utils::grid_network(2, 2);
        let rows = vec![od(1, 3, 'a', 10.0), od(1, 3, 'a', 5.0), od(4, 2, 'a', 7.5)];
        let demand = MulticlassDemand::from_od_rows(&network, &rows).unwrap();
        assert_eq!(demand.num_classes(), 1);
        assert_eq!(demand.num_zones(), 4);
        let (z1, z3) = (network.zone_index(1).unwrap(), network.zone_index(3).unwrap());
        assert_eq!(demand.table(0)[[z1, z3]], 15.0);
        assert_eq!(demand.total(0), 22.5);
        assert_eq!(demand.active_origins(0), vec![z1, network.zone_index(4).unwrap()]);
    }

    #[test]
    fn test_bad_references() {
        let network = test_utils::grid_network(2, 2);
        let unknown_zone = MulticlassDemand::from_od_rows(&network, &[od(1, 100, 'a', 1.0)]);
        assert!(matches!(unknown_zone, Err(ConfigurationError::UnresolvedZone(100))));
        let unknown_class = MulticlassDemand::from_od_rows(&network, &[od(1, 2, 'x', 1.0)]);
        assert!(unknown_class.is_err());
        let negative = MulticlassDemand::from_od_rows(&network, &[od(1, 2, 'a', -1.0)]);
        assert!(negative.is_err());
    }
}
