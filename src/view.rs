//! The presentation layer: everything shown on the dashboard, derived from a filtered [Dataset].
//!
//! [render] is a pure function of the full dataset and the current [FilterCriteria]; a host calls
//! it again on every interaction and draws the resulting [DashboardView].

use serde::Serialize;

use crate::{
    filter, Columns, Dataset, FilterCriteria, FilterOptions, AREA, CLASH_STATUS, ELEMENT_TYPE,
    IS_HIGH_VALUE, MATERIAL, PREDICTED_COST, ROOM_NAME, TOTAL_COST, VOLUME,
};

pub const TITLE: &str = "BIM Data Automation & Prediction Dashboard";
/// Shown in place of a metric whose source column is absent.
pub const PLACEHOLDER: &str = "N/A";
pub const HISTOGRAM_BINS: usize = 50;
pub const EXPORT_FILE_NAME: &str = "bim_filtered.csv";
pub const EXPORT_MIME: &str = "text/csv";
pub const NO_SIGNAL_NOTE: &str =
    "No separate anomaly/clash columns found, using IsHighValue & ClashStatus instead.";

const HIGH_VALUE_PROJECTION: [&str; 4] = [ELEMENT_TYPE, MATERIAL, TOTAL_COST, IS_HIGH_VALUE];
const CLASH_PROJECTION: [&str; 3] = [ELEMENT_TYPE, ROOM_NAME, CLASH_STATUS];

/// A single summary number. `value` is `None` when the metric cannot be computed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Metric {
    pub label: &'static str,
    pub value: Option<usize>,
}

impl Metric {
    /// The value with thousands separators, or the placeholder.
    pub fn display_value(&self) -> String {
        match self.value {
            Some(value) => group_thousands(&value.to_string()),
            None => PLACEHOLDER.to_owned(),
        }
    }
}

/// The metrics row at the top of the dashboard.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Metrics {
    pub total: Metric,
    pub predicted: Metric,
    pub high_value: Metric,
    pub clashes: Metric,
}

impl Metrics {
    pub fn compute(dataset: &Dataset) -> Self {
        let columns = dataset.columns();
        let count = |present: Option<usize>, pred: fn(&crate::Element) -> bool| {
            present.map(|_| dataset.elements().filter(|&element| pred(element)).count())
        };
        Self {
            total: Metric {
                label: "Total Elements",
                value: Some(dataset.len()),
            },
            predicted: Metric {
                label: "Predicted Costs",
                value: count(columns.predicted_cost, |element| {
                    element.predicted_cost.is_some()
                }),
            },
            high_value: Metric {
                label: "High Value Items",
                value: count(columns.is_high_value, crate::Element::is_high_value),
            },
            clashes: Metric {
                label: "Flagged Clashes",
                value: count(columns.clash_status, crate::Element::is_flagged_clash),
            },
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Metric> {
        [&self.total, &self.predicted, &self.high_value, &self.clashes].into_iter()
    }
}

/// One histogram bar, covering `[lo, hi)`; the last bar also includes `hi`.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct Bin {
    pub lo: f64,
    pub hi: f64,
    pub count: usize,
}

/// Distribution of total costs over [HISTOGRAM_BINS] equal-width bins.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Histogram {
    pub title: &'static str,
    pub column: &'static str,
    /// Number of rows with a usable cost.
    pub samples: usize,
    /// Empty when no row has a usable cost.
    pub bins: Vec<Bin>,
}

impl Histogram {
    pub fn compute(dataset: &Dataset) -> Option<Self> {
        dataset.columns().total_cost?;
        let values: Vec<f64> = dataset
            .elements()
            .filter_map(|element| element.total_cost)
            .collect();
        Some(Self {
            title: "Total Cost Distribution (ETB)",
            column: TOTAL_COST,
            samples: values.len(),
            bins: bin_values(&values, HISTOGRAM_BINS),
        })
    }
}

fn bin_values(values: &[f64], n_bins: usize) -> Vec<Bin> {
    let Some(min) = values.iter().copied().reduce(f64::min) else {
        return vec![];
    };
    let max = values.iter().copied().fold(min, f64::max);
    let width = if max > min {
        (max - min) / n_bins as f64
    } else {
        1.0
    };
    let mut bins: Vec<Bin> = (0..n_bins)
        .map(|i| Bin {
            lo: min + width * i as f64,
            hi: min + width * (i + 1) as f64,
            count: 0,
        })
        .collect();
    for value in values {
        let index = (((value - min) / width).floor() as usize).min(n_bins - 1);
        bins[index].count += 1;
    }
    bins
}

/// Extra information attached to a scatter point, shown on inspection.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PointDetail {
    pub element_type: Option<String>,
    pub material: Option<String>,
    pub room_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScatterPoint {
    pub actual: f64,
    pub predicted: f64,
    /// The colour group, i.e. the element type when that column exists.
    pub color: Option<String>,
    pub detail: PointDetail,
}

/// Predicted against actual total cost, one point per row having both.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Scatter {
    pub title: &'static str,
    pub x: &'static str,
    pub y: &'static str,
    pub color_by: Option<&'static str>,
    pub points: Vec<ScatterPoint>,
}

impl Scatter {
    pub fn compute(dataset: &Dataset) -> Option<Self> {
        let columns = dataset.columns();
        columns.total_cost?;
        columns.predicted_cost?;
        let color_by = columns.element_type.map(|_| ELEMENT_TYPE);
        let points = dataset
            .records()
            .iter()
            .filter_map(|record| {
                let element = record.element();
                Some(ScatterPoint {
                    actual: element.total_cost?,
                    predicted: element.predicted_cost?,
                    color: columns
                        .element_type
                        .map(|index| record.get(index).unwrap_or_default().to_owned()),
                    detail: PointDetail {
                        element_type: element.element_type.clone(),
                        material: element.material.clone(),
                        room_name: element.room_name.clone(),
                    },
                })
            })
            .collect();
        Some(Self {
            title: "Predicted vs Actual Total Cost",
            x: TOTAL_COST,
            y: PREDICTED_COST,
            color_by,
            points,
        })
    }
}

/// The charts tab.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Overview {
    pub histogram: Option<Histogram>,
    pub scatter: Option<Scatter>,
}

/// A downloadable artifact.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Export {
    pub file_name: &'static str,
    pub mime: &'static str,
    pub rows: usize,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

/// The full filtered grid, display-formatted, plus its CSV export.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TableView {
    pub caption: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub export: Export,
}

impl TableView {
    pub fn compute(dataset: &Dataset) -> csv::Result<Self> {
        let formats: Vec<CellFormat> = dataset
            .headers()
            .iter()
            .map(CellFormat::for_column)
            .collect();
        let rows = dataset
            .records()
            .iter()
            .map(|record| {
                record
                    .raw()
                    .iter()
                    .zip(&formats)
                    .map(|(cell, format)| format.apply(cell))
                    .collect()
            })
            .collect();
        Ok(Self {
            caption: format!("Showing {} filtered elements", dataset.len()),
            headers: dataset.headers().iter().map(str::to_owned).collect(),
            rows,
            export: Export {
                file_name: EXPORT_FILE_NAME,
                mime: EXPORT_MIME,
                rows: dataset.len(),
                bytes: dataset.to_csv_bytes()?,
            },
        })
    }
}

/// Display rules per column. Cells that do not parse are shown as they are.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum CellFormat {
    Verbatim,
    /// Rounded to an integer, with thousands separators.
    Currency,
    Fixed(usize),
}

impl CellFormat {
    fn for_column(name: &str) -> Self {
        match name {
            TOTAL_COST | PREDICTED_COST => Self::Currency,
            AREA => Self::Fixed(2),
            VOLUME => Self::Fixed(3),
            _ => Self::Verbatim,
        }
    }

    fn apply(self, cell: &str) -> String {
        let value = match self {
            Self::Verbatim => None,
            _ => cell.parse::<f64>().ok().filter(|v| v.is_finite()),
        };
        match (self, value) {
            (Self::Currency, Some(value)) => group_thousands(&format!("{:.0}", value)),
            (Self::Fixed(places), Some(value)) => format!("{:.*}", places, value),
            _ => cell.to_owned(),
        }
    }
}

/// Insert `,` every three digits of the integer part of a formatted number.
pub(crate) fn group_thousands(number: &str) -> String {
    let (sign, digits) = match number.strip_prefix('-') {
        Some(digits) => ("-", digits),
        None => ("", number),
    };
    let (int, frac) = match digits.find('.') {
        Some(dot) => digits.split_at(dot),
        None => (digits, ""),
    };
    let mut grouped = String::with_capacity(number.len() + int.len() / 3);
    grouped.push_str(sign);
    for (i, c) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped.push_str(frac);
    grouped
}

/// A projection of some rows onto a few columns, cells verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SubTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl SubTable {
    /// Project the rows of `dataset` accepted by `keep` onto those of `names` which exist.
    fn project<F>(dataset: &Dataset, names: &[&str], keep: F) -> Self
    where
        F: Fn(&crate::Element) -> bool,
    {
        let columns: &Columns = dataset.columns();
        let projected: Vec<(&str, usize)> = names
            .iter()
            .filter_map(|name| Some((*name, columns.index_of(name)?)))
            .collect();
        Self {
            headers: projected.iter().map(|(name, _)| (*name).to_owned()).collect(),
            rows: dataset
                .records()
                .iter()
                .filter(|record| keep(record.element()))
                .map(|record| {
                    projected
                        .iter()
                        .map(|(_, index)| record.get(*index).unwrap_or_default().to_owned())
                        .collect()
                })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// The issues & predictions tab.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IssuesView {
    /// Number of high-value rows, when the flag column exists.
    pub high_value_count: Option<usize>,
    /// Only present when at least one row is high value.
    pub high_value: Option<SubTable>,
    /// Number of clash rows, when the status column exists.
    pub clash_count: Option<usize>,
    /// Only present when at least one row is a clash.
    pub clashes: Option<SubTable>,
    /// Explanation shown when neither sub-table has rows.
    pub note: Option<&'static str>,
}

impl IssuesView {
    pub fn compute(dataset: &Dataset) -> Self {
        let columns = dataset.columns();
        let high_value = columns.is_high_value.map(|_| {
            SubTable::project(
                dataset,
                &HIGH_VALUE_PROJECTION,
                crate::Element::is_high_value,
            )
        });
        let clashes = columns.clash_status.map(|_| {
            SubTable::project(dataset, &CLASH_PROJECTION, crate::Element::is_flagged_clash)
        });
        let high_value_count = high_value.as_ref().map(|table| table.rows.len());
        let clash_count = clashes.as_ref().map(|table| table.rows.len());
        let high_value = high_value.filter(|table| !table.is_empty());
        let clashes = clashes.filter(|table| !table.is_empty());
        let note = (high_value.is_none() && clashes.is_none()).then_some(NO_SIGNAL_NOTE);
        Self {
            high_value_count,
            high_value,
            clash_count,
            clashes,
            note,
        }
    }
}

/// Everything the dashboard shows for one state of the sidebar.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DashboardView {
    pub title: &'static str,
    pub options: FilterOptions,
    pub criteria: FilterCriteria,
    pub metrics: Metrics,
    pub overview: Overview,
    pub table: TableView,
    pub issues: IssuesView,
}

impl DashboardView {
    /// Derive every output from an already filtered dataset.
    pub fn from_filtered(
        filtered: &Dataset,
        options: FilterOptions,
        criteria: FilterCriteria,
    ) -> csv::Result<Self> {
        Ok(Self {
            title: TITLE,
            options,
            criteria,
            metrics: Metrics::compute(filtered),
            overview: Overview {
                histogram: Histogram::compute(filtered),
                scatter: Scatter::compute(filtered),
            },
            table: TableView::compute(filtered)?,
            issues: IssuesView::compute(filtered),
        })
    }
}

/// Filter `dataset` with `criteria` and derive the whole dashboard from the result.
pub fn render(dataset: &Dataset, criteria: &FilterCriteria) -> csv::Result<DashboardView> {
    let filtered = filter(dataset, criteria);
    DashboardView::from_filtered(
        &filtered,
        FilterOptions::from_dataset(dataset),
        criteria.clone(),
    )
}
