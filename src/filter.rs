//! Row filtering driven by the sidebar controls.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::debug;

use crate::{Dataset, Record};

/// An inclusive range of total costs.
#[derive(Copy, Clone, Debug, Default, PartialEq, PartialOrd, Serialize)]
pub struct CostRange {
    pub min: f64,
    pub max: f64,
}

impl CostRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Both bounds are inclusive. A range with `min > max` contains nothing.
    pub fn contains(&self, cost: f64) -> bool {
        self.min <= cost && cost <= self.max
    }

    /// Whether every cost of `other` is also within `self`.
    pub fn covers(&self, other: &CostRange) -> bool {
        self.min <= other.min && other.max <= self.max
    }
}

/// The choices offered by the sidebar, derived from the full dataset. A `None` field means the
/// underlying column is absent and its control is not shown.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FilterOptions {
    /// Distinct element types, in order of first appearance.
    pub element_types: Option<Vec<String>>,
    /// Distinct materials, in order of first appearance.
    pub materials: Option<Vec<String>>,
    /// `[0, max]` over the parsed costs, `[0, 0]` when none parse.
    pub cost_bounds: Option<CostRange>,
}

impl FilterOptions {
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let columns = dataset.columns();
        let distinct = |index: Option<usize>| {
            index.map(|index| {
                let mut seen = BTreeSet::new();
                dataset
                    .records()
                    .iter()
                    .map(|record| record.get(index).unwrap_or_default())
                    .filter(|value| seen.insert(*value))
                    .map(str::to_owned)
                    .collect::<Vec<_>>()
            })
        };
        let cost_bounds = columns.total_cost.map(|_| {
            let max = dataset
                .elements()
                .filter_map(|element| element.total_cost)
                .fold(0.0, f64::max);
            CostRange::new(0.0, max)
        });
        Self {
            element_types: distinct(columns.element_type),
            materials: distinct(columns.material),
            cost_bounds,
        }
    }
}

/// The user's current selection. Each predicate is optional and only applies when its column is
/// present in the filtered dataset.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FilterCriteria {
    pub element_types: Option<BTreeSet<String>>,
    pub materials: Option<BTreeSet<String>>,
    pub cost_range: Option<CostRange>,
    /// The full range offered by the sidebar. Rows without a usable cost are only kept while
    /// `cost_range` still covers it.
    pub cost_bounds: Option<CostRange>,
}

impl FilterCriteria {
    /// Every option selected, full cost range: the sidebar's initial state.
    pub fn select_all(options: &FilterOptions) -> Self {
        let all = |values: &Option<Vec<String>>| {
            values
                .as_ref()
                .map(|values| values.iter().cloned().collect())
        };
        Self {
            element_types: all(&options.element_types),
            materials: all(&options.materials),
            cost_range: options.cost_bounds,
            cost_bounds: options.cost_bounds,
        }
    }

    pub fn with_element_types<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.element_types = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_materials<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.materials = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_cost_range(mut self, range: CostRange) -> Self {
        self.cost_range = Some(range);
        self
    }

    /// Whether a record of `dataset` passes every applicable predicate.
    ///
    /// Categories compare on the raw cell text. A record whose cost is missing or malformed passes
    /// the range predicate only while the range is not narrowed below the sidebar's bounds.
    pub fn matches(&self, dataset: &Dataset, record: &Record) -> bool {
        let columns = dataset.columns();
        let in_set = |index: Option<usize>, selected: &Option<BTreeSet<String>>| {
            match (index, selected) {
                (Some(index), Some(selected)) => {
                    selected.contains(record.get(index).unwrap_or_default())
                }
                _ => true,
            }
        };
        let in_range = match (columns.total_cost, &self.cost_range) {
            (Some(_), Some(range)) => match record.element().total_cost {
                Some(cost) => range.contains(cost),
                None => self
                    .cost_bounds
                    .map_or(false, |bounds| range.covers(&bounds)),
            },
            _ => true,
        };
        in_set(columns.element_type, &self.element_types)
            && in_set(columns.material, &self.materials)
            && in_range
    }
}

/// Keep the rows of `dataset` matching `criteria`, in their original order.
pub fn filter(dataset: &Dataset, criteria: &FilterCriteria) -> Dataset {
    let filtered = dataset.retain(|record| criteria.matches(dataset, record));
    debug!("filter kept {} of {} rows", filtered.len(), dataset.len());
    filtered
}
