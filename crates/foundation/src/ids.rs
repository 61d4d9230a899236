/// Identifies a marker within the dataset currently drawn on a map.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MarkerId(u64);

impl MarkerId {
    pub fn new(n: u64) -> Self {
        MarkerId(n)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

/// Identifies a travel route.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RouteId(u64);

impl RouteId {
    pub fn new(n: u64) -> Self {
        RouteId(n)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}
