//! Plain-text rendering of a [DashboardView], one section per tab.

use std::fmt::{self, Display, Formatter, Write};

use crate::view::group_thousands;
use crate::{DashboardView, Histogram, Scatter, SubTable, TableView};

impl Display for DashboardView {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        writeln!(f)?;
        self.write_filters(f)?;
        let metrics: Vec<_> = self
            .metrics
            .iter()
            .map(|metric| format!("{}: {}", metric.label, metric.display_value()))
            .collect();
        writeln!(f, "{}", metrics.join(" | "))?;

        writeln!(f)?;
        writeln!(f, "== Overview ==")?;
        if let Some(histogram) = &self.overview.histogram {
            write_histogram(f, histogram)?;
        }
        if let Some(scatter) = &self.overview.scatter {
            write_scatter(f, scatter)?;
        }

        writeln!(f)?;
        writeln!(f, "== Data Table ==")?;
        write_data_table(f, &self.table)?;

        writeln!(f)?;
        writeln!(f, "== Issues & Predictions ==")?;
        let issues = &self.issues;
        if let Some(count) = issues.high_value_count {
            writeln!(f, "High Value Items: {}", count)?;
            if let Some(table) = &issues.high_value {
                write_sub_table(f, table)?;
            }
        }
        if let Some(count) = issues.clash_count {
            writeln!(f, "Flagged Clashes: {}", count)?;
            if let Some(table) = &issues.clashes {
                write_sub_table(f, table)?;
            }
        }
        if let Some(note) = issues.note {
            writeln!(f, "{}", note)?;
        }
        Ok(())
    }
}

impl DashboardView {
    fn write_filters(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let options = &self.options;
        let criteria = &self.criteria;
        if options.element_types.is_none()
            && options.materials.is_none()
            && options.cost_bounds.is_none()
        {
            return Ok(());
        }
        writeln!(f, "Filters")?;
        if let Some(all) = &options.element_types {
            let selected = criteria.element_types.as_ref().map_or(all.len(), |s| s.len());
            writeln!(f, "  Element Types: {} of {} selected", selected, all.len())?;
        }
        if let Some(all) = &options.materials {
            let selected = criteria.materials.as_ref().map_or(all.len(), |s| s.len());
            writeln!(f, "  Materials: {} of {} selected", selected, all.len())?;
        }
        if let Some(bounds) = &options.cost_bounds {
            let range = criteria.cost_range.unwrap_or(*bounds);
            writeln!(
                f,
                "  Total Cost (ETB): {} to {}",
                group_thousands(&format!("{:.0}", range.min)),
                group_thousands(&format!("{:.0}", range.max)),
            )?;
        }
        writeln!(f)
    }
}

fn write_histogram(f: &mut Formatter<'_>, histogram: &Histogram) -> fmt::Result {
    writeln!(
        f,
        "{}: {} values in {} bins",
        histogram.title,
        histogram.samples,
        histogram.bins.len()
    )?;
    for bin in histogram.bins.iter().filter(|bin| bin.count > 0) {
        writeln!(f, "  {:.2} .. {:.2}: {}", bin.lo, bin.hi, bin.count)?;
    }
    Ok(())
}

fn write_scatter(f: &mut Formatter<'_>, scatter: &Scatter) -> fmt::Result {
    writeln!(f, "{}: {} points", scatter.title, scatter.points.len())?;
    for point in &scatter.points {
        write!(f, "  {} vs {}", point.actual, point.predicted)?;
        let detail: Vec<&str> = [
            &point.detail.element_type,
            &point.detail.material,
            &point.detail.room_name,
        ]
        .into_iter()
        .filter_map(Option::as_deref)
        .collect();
        if !detail.is_empty() {
            write!(f, " ({})", detail.join(", "))?;
        }
        writeln!(f)?;
    }
    Ok(())
}

fn write_data_table(f: &mut Formatter<'_>, table: &TableView) -> fmt::Result {
    writeln!(f, "{}", table.caption)?;
    write_grid(f, &table.headers, &table.rows)?;
    writeln!(
        f,
        "Download: {} ({}, {} rows)",
        table.export.file_name, table.export.mime, table.export.rows
    )
}

fn write_sub_table(f: &mut Formatter<'_>, table: &SubTable) -> fmt::Result {
    write_grid(f, &table.headers, &table.rows)
}

/// Left-aligned columns separated by two spaces.
fn write_grid(f: &mut Formatter<'_>, headers: &[String], rows: &[Vec<String>]) -> fmt::Result {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }
    let mut line = String::new();
    for row in std::iter::once(headers).chain(rows.iter().map(Vec::as_slice)) {
        line.clear();
        for (cell, width) in row.iter().zip(&widths) {
            write!(line, "{:<width$}  ", cell, width = *width)?;
        }
        writeln!(f, "{}", line.trim_end())?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use crate::dataset::test::{inline_csv, parse_dataset};
    use crate::{render, CostRange, FilterCriteria, FilterOptions};
    use expect_test::expect;

    #[test]
    fn full_report() {
        let dataset = parse_dataset(inline_csv!(
            "ElementType,Material,RoomName,TotalCost_ETB,TotalCost_ETB_pred,IsHighValue,ClashStatus,Area_m2",
            "Wall,Concrete,Hall,1500,1450.4,True,Clash A,12.5",
            "Door,Wood,Kitchen,200,,False,OK,1.8",
            "Wall,Brick,Hall,9000,8800,True,OK,20",
        ));
        let criteria = FilterCriteria::select_all(&FilterOptions::from_dataset(&dataset))
            .with_cost_range(CostRange::new(0.0, 2000.0));
        let view = render(&dataset, &criteria).unwrap();
        expect![[r#"
            BIM Data Automation & Prediction Dashboard

            Filters
              Element Types: 2 of 2 selected
              Materials: 3 of 3 selected
              Total Cost (ETB): 0 to 2,000

            Total Elements: 2 | Predicted Costs: 1 | High Value Items: 1 | Flagged Clashes: 1

            == Overview ==
            Total Cost Distribution (ETB): 2 values in 50 bins
              200.00 .. 226.00: 1
              1474.00 .. 1500.00: 1
            Predicted vs Actual Total Cost: 1 points
              1500 vs 1450.4 (Wall, Concrete, Hall)

            == Data Table ==
            Showing 2 filtered elements
            ElementType  Material  RoomName  TotalCost_ETB  TotalCost_ETB_pred  IsHighValue  ClashStatus  Area_m2
            Wall         Concrete  Hall      1,500          1,450               True         Clash A      12.50
            Door         Wood      Kitchen   200                                False        OK           1.80
            Download: bim_filtered.csv (text/csv, 2 rows)

            == Issues & Predictions ==
            High Value Items: 1
            ElementType  Material  TotalCost_ETB  IsHighValue
            Wall         Concrete  1500           True
            Flagged Clashes: 1
            ElementType  RoomName  ClashStatus
            Wall         Hall      Clash A
        "#]]
        .assert_eq(&view.to_string());
    }

    #[test]
    fn bare_report() {
        let dataset = parse_dataset(inline_csv!("Id", "1"));
        let view = render(&dataset, &FilterCriteria::default()).unwrap();
        expect![[r#"
            BIM Data Automation & Prediction Dashboard

            Total Elements: 1 | Predicted Costs: N/A | High Value Items: N/A | Flagged Clashes: N/A

            == Overview ==

            == Data Table ==
            Showing 1 filtered elements
            Id
            1
            Download: bim_filtered.csv (text/csv, 1 rows)

            == Issues & Predictions ==
            No separate anomaly/clash columns found, using IsHighValue & ClashStatus instead.
        "#]]
        .assert_eq(&view.to_string());
    }
}
