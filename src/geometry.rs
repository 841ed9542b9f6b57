/// A node position in the network's own coordinate system.
#[derive(PartialEq, Debug, Clone, Copy, Default)]
pub struct Point2d {
    pub x_coord: f64,
    pub y_coord: f64,
}

impl Point2d {
    pub fn new(x_coord: f64, y_coord: f64) -> Point2d {
        Point2d{x_coord, y_coord}
    }

    pub fn minus(&self, other: &Point2d) -> Point2d {
        Point2d::new(self.x_coord - other.x_coord, self.y_coord - other.y_coord)
    }

    pub fn midpoint(&self, other: &Point2d) -> Point2d {
        Point2d::new((self.x_coord + other.x_coord) / 2.0, (self.y_coord + other.y_coord) / 2.0)
    }

    /// Crow-fly distance, in coordinate units.
    pub fn euclidean_distance(&self, other: &Point2d) -> f64 {
        let diff = self.minus(other);
        diff.x_coord.hypot(diff.y_coord)
    }
}
