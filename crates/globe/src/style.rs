//! Map styles and the registry they are looked up in.
//!
//! A style names a projection and carries the few facts the engine needs
//! about it: whether it can spin, what outline it fills, and how to scale it
//! for a given map width. The projection itself is created by a
//! [`ProjectionSource`](crate::projection::ProjectionSource).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Map width the flat-projection scale is calibrated against.
pub const REFERENCE_WIDTH: f64 = 960.0;
/// Flat-projection scale at [`REFERENCE_WIDTH`].
pub const REFERENCE_SCALE: f64 = 150.0;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    Sphere,
    Rectangle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionStyle {
    /// Canonical registry key.
    pub id: String,
    /// Display name.
    pub name: String,
    pub rotatable: bool,
    pub shape: Shape,
    /// Standard parallels for conic projections.
    pub parallels: Option<[f64; 2]>,
}

impl ProjectionStyle {
    pub fn flat(id: &str, name: &str) -> Self {
        Self {
            id: canonical_id(id),
            name: name.to_string(),
            rotatable: false,
            shape: Shape::Rectangle,
            parallels: None,
        }
    }

    pub fn sphere(id: &str, name: &str) -> Self {
        Self {
            id: canonical_id(id),
            name: name.to_string(),
            rotatable: true,
            shape: Shape::Sphere,
            parallels: None,
        }
    }

    pub fn with_parallels(mut self, parallels: [f64; 2]) -> Self {
        self.parallels = Some(parallels);
        self
    }

    /// Scale for a map `width` pixels wide: spheres fill the width, flat
    /// projections scale linearly from the 960px reference (floored).
    pub fn default_scale(&self, width: f64) -> f64 {
        match self.shape {
            Shape::Sphere => width / 2.0,
            Shape::Rectangle => (REFERENCE_SCALE * width / REFERENCE_WIDTH).floor(),
        }
    }
}

/// ASCII-lowercase, alphanumerics only: `"Eckert IV"` becomes `"eckertiv"`.
pub fn canonical_id(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Exact-match style registry keyed by canonical id.
#[derive(Debug, Clone, Default)]
pub struct StyleRegistry {
    styles: BTreeMap<String, ProjectionStyle>,
    aliases: BTreeMap<String, String>,
}

impl StyleRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The globe and the flat projections a world map offers out of the box.
    pub fn builtin() -> Self {
        let mut reg = Self::empty();
        for style in [
            ProjectionStyle::flat("aitoff", "Aitoff"),
            ProjectionStyle::flat("albers", "Albers").with_parallels([20.0, 50.0]),
            ProjectionStyle::flat("baker", "Baker"),
            ProjectionStyle::flat("boggs", "Boggs"),
            ProjectionStyle::flat("bonne", "Bonne"),
            ProjectionStyle::flat("bromley", "Bromley"),
            ProjectionStyle::flat("crasterparabolic", "Craster Parabolic"),
            ProjectionStyle::flat("eckerti", "Eckert I"),
            ProjectionStyle::flat("eckertii", "Eckert II"),
            ProjectionStyle::flat("eckertiii", "Eckert III"),
            ProjectionStyle::flat("eckertiv", "Eckert IV"),
            ProjectionStyle::flat("eckertv", "Eckert V"),
            ProjectionStyle::flat("eckertvi", "Eckert VI"),
            ProjectionStyle::flat("equirectangular", "Equirectangular (Plate Carree)"),
            ProjectionStyle::sphere("globe", "Globe"),
            ProjectionStyle::flat("goodehomolosine", "Goode Homolosine"),
            ProjectionStyle::flat("hammer", "Hammer"),
            ProjectionStyle::flat("hill", "Hill"),
            ProjectionStyle::flat("kavrayskiyvii", "Kavrayskiy VII"),
            ProjectionStyle::flat("lagrange", "Lagrange"),
            ProjectionStyle::flat(
                "lambertcylindricalequalarea",
                "Lambert cylindrical equal-area",
            ),
            ProjectionStyle::flat("larrivee", "Larrivee"),
            ProjectionStyle::flat("laskowski", "Laskowski"),
            ProjectionStyle::flat("loximuthal", "Loximuthal"),
            ProjectionStyle::flat(
                "mcbrydethomasflatpolarparabolic",
                "McBryde-Thomas Flat-Polar Parabolic",
            ),
            ProjectionStyle::flat(
                "mcbrydethomasflatpolarquartic",
                "McBryde-Thomas Flat-Polar Quartic",
            ),
            ProjectionStyle::flat(
                "mcbrydethomasflatpolarsinusoidal",
                "McBryde-Thomas Flat-Polar Sinusoidal",
            ),
            ProjectionStyle::flat("miller", "Miller"),
            ProjectionStyle::flat("mollweide", "Mollweide"),
            ProjectionStyle::flat("naturalearth", "Natural Earth"),
            ProjectionStyle::flat("nellhammer", "Nell-Hammer"),
            ProjectionStyle::sphere("orthographic", "Orthographic"),
            ProjectionStyle::flat("polyconic", "Polyconic"),
            ProjectionStyle::flat("robinson", "Robinson"),
            ProjectionStyle::flat("sinusoidal", "Sinusoidal"),
            ProjectionStyle::flat("vandergrinten", "van der Grinten"),
            ProjectionStyle::flat("vandergrinteniv", "van der Grinten IV"),
            ProjectionStyle::flat("wagneriv", "Wagner IV"),
            ProjectionStyle::flat("wagnervi", "Wagner VI"),
            ProjectionStyle::flat("wagnervii", "Wagner VII"),
            ProjectionStyle::flat("winkeltripel", "Winkel Tripel"),
        ] {
            reg.register(style);
        }
        // Older embeddings asked for a flat map as "2D".
        reg.alias("2D", "equirectangular");
        reg
    }

    /// Adds or replaces a style. The canonical form of its display name is
    /// registered as an alias when it differs from the id.
    pub fn register(&mut self, style: ProjectionStyle) -> Option<ProjectionStyle> {
        let id = style.id.clone();
        let by_name = canonical_id(&style.name);
        if by_name != id && !self.styles.contains_key(&by_name) {
            self.aliases.insert(by_name, id.clone());
        }
        self.styles.insert(id, style)
    }

    /// Returns `false` when `target` is not a registered id.
    pub fn alias(&mut self, alias: &str, target: &str) -> bool {
        let target = canonical_id(target);
        if !self.styles.contains_key(&target) {
            return false;
        }
        self.aliases.insert(canonical_id(alias), target);
        true
    }

    pub fn lookup(&self, name: &str) -> Option<&ProjectionStyle> {
        let key = canonical_id(name);
        if key.is_empty() {
            return None;
        }
        self.styles.get(&key).or_else(|| {
            self.aliases
                .get(&key)
                .and_then(|target| self.styles.get(target))
        })
    }

    /// Display names of every registered style, ordered by id.
    pub fn names(&self) -> Vec<&str> {
        self.styles.values().map(|s| s.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }
}
