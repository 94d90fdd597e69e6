//! Edge filter chain
//!
//! A filter decides whether a search may traverse an edge in a given
//! direction. Filters compose by logical AND; an empty chain accepts
//! everything.
//!
//! - [`BoundaryFilter`]: CH level ordering toward (or within) the core
//! - [`CoreMatrixFilter`]: switches between the outside-core and inside-core
//!   rules for the phases of the hierarchy-restricted search
//! - [`restrictions`]: domain predicates over edge metadata (borders,
//!   vehicle dimensions, avoided road features)
//!
//! Any `Fn(&EdgeView, SearchDirection) -> bool + Send + Sync` closure is a
//! filter as well.

pub mod hierarchy;
pub mod restrictions;

pub use hierarchy::{restrictions_confined_to_core, BoundaryFilter, CoreMatrixFilter};
pub use restrictions::{
    AvoidBordersFilter, AvoidFeature, AvoidFeaturesFilter, BorderPolicy, RouteOptions,
    VehicleDimensions, VehicleRestrictionFilter,
};

pub use crate::graph::SearchDirection;
use crate::graph::EdgeView;

pub trait EdgeFilter: Send + Sync {
    fn accept(&self, edge: &EdgeView<'_>, direction: SearchDirection) -> bool;
}

impl<F> EdgeFilter for F
where
    F: Fn(&EdgeView<'_>, SearchDirection) -> bool + Send + Sync,
{
    #[inline]
    fn accept(&self, edge: &EdgeView<'_>, direction: SearchDirection) -> bool {
        self(edge, direction)
    }
}

/// AND-composition of filters, assembled per request.
#[derive(Default)]
pub struct EdgeFilterChain {
    filters: Vec<Box<dyn EdgeFilter>>,
}

impl EdgeFilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, filter: impl EdgeFilter + 'static) -> Self {
        self.add(filter);
        self
    }

    pub fn add(&mut self, filter: impl EdgeFilter + 'static) {
        self.filters.push(Box::new(filter));
    }

    /// Build the domain restriction chain selected by `options`.
    pub fn from_options(options: &RouteOptions) -> Self {
        let mut chain = Self::new();
        if let Some(policy) = options.avoid_borders {
            chain.add(AvoidBordersFilter::new(policy));
        }
        if !options.avoid_features.is_empty() {
            chain.add(AvoidFeaturesFilter::new(&options.avoid_features));
        }
        if let Some(vehicle) = options.vehicle {
            chain.add(VehicleRestrictionFilter::new(vehicle));
        }
        chain
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl EdgeFilter for EdgeFilterChain {
    #[inline]
    fn accept(&self, edge: &EdgeView<'_>, direction: SearchDirection) -> bool {
        self.filters.iter().all(|f| f.accept(edge, direction))
    }
}

impl std::fmt::Debug for EdgeFilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgeFilterChain")
            .field("filters", &self.filters.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeAccess, EdgeAttributes, EdgeFlags, GraphBuilder};

    #[test]
    fn test_empty_chain_accepts_everything() {
        let mut b = GraphBuilder::new(2);
        b.add_edge(0, 1, 1.0, EdgeAccess::Forward, EdgeAttributes::default())
            .unwrap();
        let g = b.build().unwrap();
        let chain = EdgeFilterChain::new();
        assert!(chain.is_empty());
        for view in g.edges_from(1) {
            assert!(chain.accept(&view, SearchDirection::Forward));
            assert!(chain.accept(&view, SearchDirection::Backward));
        }
    }

    #[test]
    fn test_chain_is_logical_and() {
        let mut b = GraphBuilder::new(3);
        let ferry = EdgeAttributes {
            flags: EdgeFlags::FERRY,
            ..Default::default()
        };
        b.add_edge(0, 1, 1.0, EdgeAccess::Both, ferry).unwrap();
        b.add_edge(1, 2, 5000.0, EdgeAccess::Both, EdgeAttributes::default())
            .unwrap();
        let g = b.build().unwrap();

        let chain = EdgeFilterChain::new()
            .with(AvoidFeaturesFilter::new(&[AvoidFeature::Ferries]))
            .with(|e: &EdgeView<'_>, _: SearchDirection| e.distance() < 1000.0);
        assert_eq!(chain.len(), 2);

        let verdicts: Vec<bool> = g
            .edges_from(1)
            .map(|v| chain.accept(&v, SearchDirection::Forward))
            .collect();
        // ferry rejected by the first filter, long edge by the closure
        assert_eq!(verdicts, vec![false, false]);
    }

    #[test]
    fn test_from_options_skips_unset_restrictions() {
        assert!(EdgeFilterChain::from_options(&RouteOptions::default()).is_empty());

        let options = RouteOptions {
            avoid_borders: Some(BorderPolicy::All),
            avoid_features: vec![AvoidFeature::Tollways],
            vehicle: None,
        };
        assert_eq!(EdgeFilterChain::from_options(&options).len(), 2);
    }
}
