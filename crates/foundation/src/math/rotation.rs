/// Globe orientation in degrees: the `(longitude, latitude, roll)` triple a
/// rotatable projection is rotated by.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Rotation {
    pub longitude: f64,
    pub latitude: f64,
    pub roll: f64,
}

/// Lower (exclusive) and upper (inclusive) bounds of the roll band.
pub const ROLL_MIN_EXCLUSIVE: f64 = -90.0;
pub const ROLL_MAX: f64 = 270.0;

impl Rotation {
    pub fn new(longitude: f64, latitude: f64, roll: f64) -> Self {
        Self {
            longitude,
            latitude,
            roll,
        }
    }

    /// Brings every component into its canonical band:
    /// - longitude wraps into `(-180, 180]`
    /// - latitude reflects at the poles into `[-90, 90]`
    /// - roll wraps into `(-90, 270]`
    ///
    /// Non-finite components collapse to 0. Components already in range are
    /// returned untouched, which keeps the function idempotent under
    /// floating point.
    pub fn normalize(self) -> Self {
        Self {
            longitude: wrap_longitude(self.longitude),
            latitude: reflect_latitude(self.latitude),
            roll: wrap_roll(self.roll),
        }
    }

    pub fn apply_delta(self, d_lon: f64, d_lat: f64, d_roll: f64) -> Self {
        Self::new(
            self.longitude + d_lon,
            self.latitude + d_lat,
            self.roll + d_roll,
        )
        .normalize()
    }

    pub fn as_array(self) -> [f64; 3] {
        [self.longitude, self.latitude, self.roll]
    }
}

pub fn wrap_longitude(lon: f64) -> f64 {
    if !lon.is_finite() {
        return 0.0;
    }
    if lon > -180.0 && lon <= 180.0 {
        return lon;
    }
    // rem_euclid can round up to exactly 360, which lands on 180 (in range).
    let w = (lon + 180.0).rem_euclid(360.0) - 180.0;
    if w <= -180.0 { 180.0 } else { w }
}

pub fn reflect_latitude(lat: f64) -> f64 {
    if !lat.is_finite() {
        return 0.0;
    }
    if (-90.0..=90.0).contains(&lat) {
        return lat;
    }
    // Triangle wave with period 360 peaking at +90.
    let m = (lat + 90.0).rem_euclid(360.0);
    if m <= 180.0 { m - 90.0 } else { 270.0 - m }
}

pub fn wrap_roll(roll: f64) -> f64 {
    if !roll.is_finite() {
        return 0.0;
    }
    if roll > ROLL_MIN_EXCLUSIVE && roll <= ROLL_MAX {
        return roll;
    }
    let r = (roll - ROLL_MIN_EXCLUSIVE).rem_euclid(360.0) + ROLL_MIN_EXCLUSIVE;
    if r <= ROLL_MIN_EXCLUSIVE { ROLL_MAX } else { r }
}
