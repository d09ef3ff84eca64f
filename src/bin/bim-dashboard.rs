use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use thiserror::Error;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use bim_dashboard::{
    render, CostRange, DashboardView, FilterCriteria, FilterOptions, LoadError, Loader, Session,
    DEFAULT_DATA_DIR,
};

/// Any kind of error in the pipeline dataset discovery -> filtering -> dashboard output.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("error during CSV processing: {0}")]
    Csv(#[from] csv::Error),
    #[error("error while writing output: {0}")]
    Io(#[from] std::io::Error),
    #[error("error during JSON serialization: {0}")]
    Json(#[from] serde_json::Error),
}

/// Filter a BIM element dataset and print the dashboard.
#[derive(Parser, Debug)]
#[command(author, version, about = "BIM data automation & prediction dashboard", long_about = None)]
struct Cli {
    /// Directory holding the dataset CSV files; the newest match is used
    #[arg(long, env = "BIM_DATA_DIR", default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    /// Element types to keep (repeatable, defaults to all)
    #[arg(long = "element-type", value_name = "TYPE")]
    element_types: Vec<String>,

    /// Materials to keep (repeatable, defaults to all)
    #[arg(long = "material", value_name = "MATERIAL")]
    materials: Vec<String>,

    /// Minimum total cost in ETB, inclusive
    #[arg(long)]
    min_cost: Option<f64>,

    /// Maximum total cost in ETB, inclusive
    #[arg(long)]
    max_cost: Option<f64>,

    /// Write the filtered rows as CSV. With `-` the CSV goes to stdout and the dashboard itself is
    /// printed to stderr, so stdout carries nothing but the CSV
    #[arg(long, value_name = "PATH")]
    export: Option<PathBuf>,

    /// Print the dashboard as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Turn the sidebar flags into criteria, starting from "everything selected".
    fn criteria(&self, options: &FilterOptions) -> FilterCriteria {
        let mut criteria = FilterCriteria::select_all(options);
        if !self.element_types.is_empty() {
            criteria = criteria.with_element_types(self.element_types.iter().cloned());
        }
        if !self.materials.is_empty() {
            criteria = criteria.with_materials(self.materials.iter().cloned());
        }
        if self.min_cost.is_some() || self.max_cost.is_some() {
            match options.cost_bounds {
                Some(bounds) => {
                    criteria = criteria.with_cost_range(CostRange::new(
                        self.min_cost.unwrap_or(bounds.min),
                        self.max_cost.unwrap_or(bounds.max),
                    ))
                }
                None => warn!("dataset has no TotalCost_ETB column, ignoring cost range"),
            }
        }
        criteria
    }

    fn exports_to_stdout(&self) -> bool {
        matches!(&self.export, Some(path) if path.as_os_str() == "-")
    }
}

/// Print the dashboard and write the export. The dashboard goes to `out`, unless the export is
/// written there, in which case it goes to `side`.
fn emit<O, S>(cli: &Cli, view: &DashboardView, out: &mut O, side: &mut S) -> Result<(), Error>
where
    O: Write,
    S: Write,
{
    let dashboard: &mut dyn Write = if cli.exports_to_stdout() {
        &mut *side
    } else {
        &mut *out
    };
    if cli.json {
        serde_json::to_writer_pretty(&mut *dashboard, view)?;
        writeln!(dashboard)?;
    } else {
        write!(dashboard, "{}", view)?;
    }
    dashboard.flush()?;

    if let Some(path) = &cli.export {
        let export = &view.table.export;
        if cli.exports_to_stdout() {
            out.write_all(&export.bytes)?;
        } else {
            std::fs::write(path, &export.bytes)?;
            info!("Wrote {} rows to {}", export.rows, path.display());
        }
    }
    out.flush()?;
    Ok(())
}

fn run(cli: &Cli) -> Result<(), Error> {
    let mut session = Session::new(Loader::new(&cli.data_dir));
    let dataset = session.dataset()?;

    let options = FilterOptions::from_dataset(&dataset);
    let criteria = cli.criteria(&options);
    let view = render(&dataset, &criteria)?;

    emit(
        cli,
        &view,
        &mut std::io::stdout().lock(),
        &mut std::io::stderr().lock(),
    )?;
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use bim_dashboard::Dataset;

    fn sample_view(cli: &Cli) -> DashboardView {
        let input = "ElementType,TotalCost_ETB\nWall,100\nDoor,50\n";
        let dataset = Dataset::from_csv(
            &mut Dataset::configured_csv_reader_builder().from_reader(input.as_bytes()),
        )
        .unwrap();
        render(&dataset, &cli.criteria(&FilterOptions::from_dataset(&dataset))).unwrap()
    }

    fn emit_to_buffers(args: &[&str]) -> (String, String) {
        let cli = Cli::parse_from(std::iter::once("bim-dashboard").chain(args.iter().copied()));
        let view = sample_view(&cli);
        let (mut out, mut side) = (vec![], vec![]);
        emit(&cli, &view, &mut out, &mut side).unwrap();
        (
            String::from_utf8(out).unwrap(),
            String::from_utf8(side).unwrap(),
        )
    }

    #[test]
    fn stdout_export_carries_only_csv() {
        let (out, side) = emit_to_buffers(&["--export", "-", "--max-cost", "75"]);
        assert_eq!(out, "ElementType,TotalCost_ETB\nDoor,50\n");
        assert!(side.starts_with("BIM Data Automation & Prediction Dashboard\n"));

        let reparsed = Dataset::from_csv(
            &mut Dataset::configured_csv_reader_builder().from_reader(out.as_bytes()),
        )
        .unwrap();
        let cli = Cli::parse_from(["bim-dashboard", "--max-cost", "75"]);
        let dataset = Dataset::from_csv(
            &mut Dataset::configured_csv_reader_builder()
                .from_reader("ElementType,TotalCost_ETB\nWall,100\nDoor,50\n".as_bytes()),
        )
        .unwrap();
        let criteria = cli.criteria(&FilterOptions::from_dataset(&dataset));
        assert_eq!(reparsed, bim_dashboard::filter(&dataset, &criteria));
    }

    #[test]
    fn stdout_export_with_json_keeps_json_off_stdout() {
        let (out, side) = emit_to_buffers(&["--json", "--export", "-"]);
        assert_eq!(out, "ElementType,TotalCost_ETB\nWall,100\nDoor,50\n");
        let json: serde_json::Value = serde_json::from_str(&side).unwrap();
        assert_eq!(json["table"]["export"]["rows"], 2);
    }

    #[test]
    fn dashboard_on_stdout_without_stdout_export() {
        let (out, side) = emit_to_buffers(&[]);
        assert!(out.starts_with("BIM Data Automation & Prediction Dashboard\n"));
        assert!(out.contains("Showing 2 filtered elements"));
        assert!(side.is_empty());
    }

    #[test]
    fn file_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bim_filtered.csv");
        let path_arg = path.to_str().unwrap();
        let (out, side) = emit_to_buffers(&["--export", path_arg, "--element-type", "Wall"]);
        assert!(out.contains("Showing 1 filtered elements"));
        assert!(side.is_empty());
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "ElementType,TotalCost_ETB\nWall,100\n"
        );
    }
}
