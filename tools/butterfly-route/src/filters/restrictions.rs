//! Domain restriction filters
//!
//! Pure predicates over edge metadata. They never look at levels, so the
//! same instances serve both the general search and the inside-core phase.

use serde::{Deserialize, Serialize};

use super::{EdgeFilter, SearchDirection};
use crate::graph::{EdgeFlags, EdgeView};

/// Vehicles above this gross weight count as heavy goods vehicles.
pub const HGV_WEIGHT_THRESHOLD_T: f32 = 3.5;

/// Restriction options attached to a matrix request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteOptions {
    pub avoid_borders: Option<BorderPolicy>,
    pub avoid_features: Vec<AvoidFeature>,
    pub vehicle: Option<VehicleDimensions>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BorderPolicy {
    /// Never cross a national border
    All,
    /// Cross only where there is no border control
    Controlled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AvoidFeature {
    Highways,
    Tollways,
    Ferries,
    Tunnels,
    Unpaved,
}

impl AvoidFeature {
    fn flags(self) -> EdgeFlags {
        match self {
            AvoidFeature::Highways => EdgeFlags::HIGHWAY,
            AvoidFeature::Tollways => EdgeFlags::TOLL,
            AvoidFeature::Ferries => EdgeFlags::FERRY,
            AvoidFeature::Tunnels => EdgeFlags::TUNNEL,
            AvoidFeature::Unpaved => EdgeFlags::UNPAVED,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleDimensions {
    pub weight_t: Option<f32>,
    pub height_m: Option<f32>,
    pub width_m: Option<f32>,
    /// Treat as HGV regardless of weight
    pub hgv: bool,
}

impl VehicleDimensions {
    fn is_hgv(&self) -> bool {
        self.hgv || self.weight_t.is_some_and(|w| w > HGV_WEIGHT_THRESHOLD_T)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AvoidBordersFilter {
    mask: EdgeFlags,
}

impl AvoidBordersFilter {
    pub fn new(policy: BorderPolicy) -> Self {
        let mask = match policy {
            BorderPolicy::All => EdgeFlags::BORDER_CONTROLLED | EdgeFlags::BORDER_OPEN,
            BorderPolicy::Controlled => EdgeFlags::BORDER_CONTROLLED,
        };
        Self { mask }
    }
}

impl EdgeFilter for AvoidBordersFilter {
    #[inline]
    fn accept(&self, edge: &EdgeView<'_>, _direction: SearchDirection) -> bool {
        !edge.flags().intersects(self.mask)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AvoidFeaturesFilter {
    mask: EdgeFlags,
}

impl AvoidFeaturesFilter {
    pub fn new(features: &[AvoidFeature]) -> Self {
        let mask = features
            .iter()
            .fold(EdgeFlags::NONE, |acc, f| acc | f.flags());
        Self { mask }
    }
}

impl EdgeFilter for AvoidFeaturesFilter {
    #[inline]
    fn accept(&self, edge: &EdgeView<'_>, _direction: SearchDirection) -> bool {
        !edge.flags().intersects(self.mask)
    }
}

/// Rejects edges whose legal limits the vehicle exceeds.
#[derive(Debug, Clone, Copy)]
pub struct VehicleRestrictionFilter {
    vehicle: VehicleDimensions,
    hgv: bool,
}

impl VehicleRestrictionFilter {
    pub fn new(vehicle: VehicleDimensions) -> Self {
        Self {
            vehicle,
            hgv: vehicle.is_hgv(),
        }
    }
}

fn exceeds(value: Option<f32>, limit: Option<f32>) -> bool {
    matches!((value, limit), (Some(v), Some(l)) if v > l)
}

impl EdgeFilter for VehicleRestrictionFilter {
    fn accept(&self, edge: &EdgeView<'_>, _direction: SearchDirection) -> bool {
        let attrs = edge.attributes();
        if self.hgv && attrs.flags.contains(EdgeFlags::HGV_FORBIDDEN) {
            return false;
        }
        !(exceeds(self.vehicle.weight_t, attrs.max_weight_t)
            || exceeds(self.vehicle.height_m, attrs.max_height_m)
            || exceeds(self.vehicle.width_m, attrs.max_width_m))
    }
}
