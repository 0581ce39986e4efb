//! Station routing.
//!
//! Groups annotated subsets by the station key of the chosen identifier
//! scheme. Identifier records are read by position: the first N records of a
//! subset must be the scheme's identifier keys in order.

use crate::error::{Result, SynopError};
use crate::models::{Record, RecordValue, Skip, StationScheme, StationScope, Subset};

use std::collections::HashMap;
use tracing::{debug, warn};

/// Compute the station key of one subset.
///
/// Returns `Ok(None)` when the subset does not start with the scheme's first
/// identifier key, which means it was reported under another scheme.
pub fn route_subset(subset: &[Record], scheme: StationScheme) -> Result<Option<String>> {
    let keys = scheme.identifier_keys();

    match subset.first() {
        Some(first) if first.key == keys[0] => {}
        _ => return Ok(None),
    }

    let mut values: Vec<&RecordValue> = Vec::with_capacity(keys.len());
    for (position, expected) in keys.iter().enumerate() {
        let partial = scheme.station_key(&values);
        let Some(record) = subset.get(position) else {
            return Err(SynopError::malformed(
                partial,
                format!(
                    "subset has {} records, {} identifier fields expected",
                    subset.len(),
                    keys.len()
                ),
            ));
        };
        if record.key != *expected {
            return Err(SynopError::malformed(
                partial,
                format!(
                    "expected {} at position {}, found {}",
                    expected, position, record.key
                ),
            ));
        }
        if record.value.is_missing() {
            return Err(SynopError::malformed(
                partial,
                format!("identifier {} is missing", expected),
            ));
        }
        values.push(&record.value);
    }

    Ok(Some(scheme.station_key(&values)))
}

/// Subsets grouped per station, in first-seen (or requested) order
#[derive(Debug, Default)]
pub struct StationGroups {
    order: Vec<String>,
    subsets: HashMap<String, Vec<Subset>>,
}

impl StationGroups {
    fn push(&mut self, station: String, subset: Subset) {
        match self.subsets.get_mut(&station) {
            Some(bucket) => bucket.push(subset),
            None => {
                self.order.push(station.clone());
                self.subsets.insert(station, vec![subset]);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn stations(&self) -> &[String] {
        &self.order
    }

    pub fn get(&self, station: &str) -> Option<&[Subset]> {
        self.subsets.get(station).map(Vec::as_slice)
    }

    /// Consume the groups in station order
    pub fn into_iter_ordered(mut self) -> impl Iterator<Item = (String, Vec<Subset>)> {
        let order = std::mem::take(&mut self.order);
        order.into_iter().filter_map(move |station| {
            let subsets = self.subsets.remove(&station)?;
            Some((station, subsets))
        })
    }
}

/// Result of routing every decoded subset
#[derive(Debug, Default)]
pub struct RoutedStations {
    pub groups: StationGroups,
    pub routed: usize,
    pub unrouted: usize,
    pub malformed: Vec<Skip>,
    pub without_data: Vec<Skip>,
}

/// Incremental router, fed one decoded file at a time
#[derive(Debug)]
pub struct StationRouter {
    scheme: StationScheme,
    scope: StationScope,
    routed: RoutedStations,
}

impl StationRouter {
    pub fn new(scheme: StationScheme, scope: StationScope) -> Self {
        Self {
            scheme,
            scope,
            routed: RoutedStations::default(),
        }
    }

    pub fn push(&mut self, subset: Subset) {
        match route_subset(&subset, self.scheme) {
            Ok(Some(station)) => {
                if self.scope.includes(&station) {
                    self.routed.routed += 1;
                    self.routed.groups.push(station, subset);
                }
            }
            Ok(None) => self.routed.unrouted += 1,
            Err(SynopError::MalformedSubset { station, reason }) => {
                warn!("Malformed subset for station '{}': {}", station, reason);
                self.routed.malformed.push(Skip { station, reason });
            }
            Err(other) => {
                warn!("Unexpected routing failure: {}", other);
                self.routed.malformed.push(Skip {
                    station: String::new(),
                    reason: other.to_string(),
                });
            }
        }
    }

    pub fn extend(&mut self, subsets: impl IntoIterator<Item = Subset>) {
        for subset in subsets {
            self.push(subset);
        }
    }

    /// Close routing and record requested stations that matched nothing
    pub fn finish(self) -> RoutedStations {
        let StationRouter {
            scheme,
            scope,
            mut routed,
        } = self;

        if let StationScope::Only(requested) = scope {
            let mut ordered = StationGroups::default();
            for station in requested {
                match routed.groups.subsets.remove(&station) {
                    Some(subsets) => {
                        ordered.order.push(station.clone());
                        ordered.subsets.insert(station, subsets);
                    }
                    None => {
                        let reason = SynopError::NoData {
                            station: station.clone(),
                        }
                        .to_string();
                        warn!("{}", reason);
                        routed.without_data.push(Skip { station, reason });
                    }
                }
            }
            routed.groups = ordered;
        }

        debug!(
            "Routed {} subsets to {} {} stations ({} unrouted, {} malformed)",
            routed.routed,
            routed.groups.len(),
            scheme,
            routed.unrouted,
            routed.malformed.len()
        );
        routed
    }
}
