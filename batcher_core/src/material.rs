//! Weighed materials and per-material containers.
use serde::Serialize;
use std::fmt;
use std::ops::{Index, IndexMut};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Material {
    /// Sand
    Pasir,
    /// Stone
    Batu,
    /// Cement
    Semen,
    /// Water
    Air,
}

impl Material {
    pub const ALL: [Material; 4] = [
        Material::Pasir,
        Material::Batu,
        Material::Semen,
        Material::Air,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Material::Pasir => "pasir",
            Material::Batu => "batu",
            Material::Semen => "semen",
            Material::Air => "air",
        }
    }

    #[inline]
    pub fn is_aggregate(self) -> bool {
        matches!(self, Material::Pasir | Material::Batu)
    }
}

impl fmt::Display for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One value per weighed material.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PerMaterial<T> {
    pub pasir: T,
    pub batu: T,
    pub semen: T,
    pub air: T,
}

impl<T: Copy> PerMaterial<T> {
    pub fn splat(v: T) -> Self {
        Self {
            pasir: v,
            batu: v,
            semen: v,
            air: v,
        }
    }

    pub fn map<U>(&self, mut f: impl FnMut(Material, T) -> U) -> PerMaterial<U> {
        PerMaterial {
            pasir: f(Material::Pasir, self.pasir),
            batu: f(Material::Batu, self.batu),
            semen: f(Material::Semen, self.semen),
            air: f(Material::Air, self.air),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Material, T)> + '_ {
        Material::ALL.into_iter().map(move |m| (m, self[m]))
    }
}

impl PerMaterial<f64> {
    pub fn total(&self) -> f64 {
        self.pasir + self.batu + self.semen + self.air
    }
}

impl PerMaterial<bool> {
    pub fn all(&self) -> bool {
        self.pasir && self.batu && self.semen && self.air
    }
}

impl<T> Index<Material> for PerMaterial<T> {
    type Output = T;
    fn index(&self, m: Material) -> &T {
        match m {
            Material::Pasir => &self.pasir,
            Material::Batu => &self.batu,
            Material::Semen => &self.semen,
            Material::Air => &self.air,
        }
    }
}

impl<T> IndexMut<Material> for PerMaterial<T> {
    fn index_mut(&mut self, m: Material) -> &mut T {
        match m {
            Material::Pasir => &mut self.pasir,
            Material::Batu => &mut self.batu,
            Material::Semen => &mut self.semen,
            Material::Air => &mut self.air,
        }
    }
}

impl From<batcher_traits::Weights> for PerMaterial<f64> {
    fn from(w: batcher_traits::Weights) -> Self {
        Self {
            pasir: w.pasir,
            batu: w.batu,
            semen: w.semen,
            air: w.air,
        }
    }
}
