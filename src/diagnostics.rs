use std::fmt;


/// A volume-delay evaluation that produced a negative or non-finite time on a
/// valid link.  The link keeps its previous congested time.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericalAnomaly {
    pub link: usize,
    pub anode: u32,
    pub bnode: u32,
    pub value: f64,
    pub volume: f64,
    pub capacity: f64,
}

impl fmt::Display for NumericalAnomaly {
    fn fmt(&self, ff: &mut fmt::Formatter) -> fmt::Result {
        write!(ff, "link {} ({}, {}): vdf returned {} for volume {} and capacity {}",
               self.link, self.anode, self.bnode, self.value, self.volume, self.capacity)
    }
}


/// Non-fatal findings about the reachability of the network.  Node ids are
/// external ids.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectivityWarning {
    IsolatedLinkPair { class: char, first: (u32, u32), second: (u32, u32) },
    DanglingNode { class: char, node: u32 },
    Unreachable { class: char, origin: u32, destination: u32, demand: f64 },
}

impl fmt::Display for ConnectivityWarning {
    fn fmt(&self, ff: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConnectivityWarning::IsolatedLinkPair { class, first, second } =>
                write!(ff, "isolated link pair for class {}: {:?} and {:?}", class, first, second),
            ConnectivityWarning::DanglingNode { class, node } =>
                write!(ff, "dangling node {} for class {}", node, class),
            ConnectivityWarning::Unreachable { class, origin, destination, demand } =>
                write!(ff, "no path from {} to {} for class {}, {} trips dropped",
                       origin, destination, class, demand),
        }
    }
}
