use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use testmatrix::probe::CommandProbe;
use testmatrix::runner::SystemRunner;
use testmatrix::style::Markdown;
use testmatrix::{TemplateEngine, loader, schema};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "testmatrix")]
#[command(about = "Run declarative CLI tests and render the results through a template")]
#[command(version)]
struct Cli {
    /// Path to the test spec file (.yaml, .yml or .toml)
    #[arg(long, value_name = "PATH", required_unless_present = "print_schema")]
    tests: Option<PathBuf>,
    /// Path to the report template
    #[arg(long, value_name = "PATH", required_unless_present = "print_schema")]
    template: Option<PathBuf>,
    /// Directory the report is written to
    #[arg(long, value_name = "DIR", default_value = "Results")]
    results_dir: PathBuf,
    /// Run only the tests with this label (repeatable, in the given order)
    #[arg(long = "label", value_name = "LABEL")]
    labels: Vec<String>,
    /// Show debug logging
    #[arg(short, long)]
    verbose: bool,
    /// Print the JSON schema of a test record and exit
    #[arg(long)]
    print_schema: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if cli.print_schema {
        match serde_json::to_string_pretty(&schema::generate_schema()) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Error serializing schema: {e}"),
        }
        return;
    }

    // clap enforces both paths unless --print-schema was given.
    let (Some(tests), Some(template)) = (cli.tests, cli.template) else {
        return;
    };

    let catalog = loader::load_catalog(&tests);

    println!("Running tests...");
    let runner = SystemRunner;
    let outcomes = if cli.labels.is_empty() {
        catalog.run_all(&runner)
    } else {
        cli.labels
            .iter()
            .flat_map(|label| catalog.run(label, &runner))
            .collect()
    };

    let probe = CommandProbe::new(&runner);
    let engine = TemplateEngine::new(&Markdown, &probe);
    let report = match engine.render_file(&outcomes, &template) {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(error = %e, "report not written");
            eprintln!("Error rendering report: {e}");
            return;
        }
    };

    let output_path = report_path(&cli.results_dir, &tests);
    if let Err(e) = write_report(&output_path, &report) {
        tracing::error!(path = %output_path.display(), error = %e, "report not written");
        eprintln!("Error writing {}: {e}", output_path.display());
        return;
    }
    println!("Wrote {}", output_path.display());
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// `<results_dir>/<tests file stem>.md`
fn report_path(results_dir: &Path, tests: &Path) -> PathBuf {
    let file_name = tests
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("report"));
    results_dir.join(file_name.with_extension("md"))
}

fn write_report(path: &Path, report: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_path_replaces_extension() {
        assert_eq!(
            report_path(Path::new("Results"), Path::new("specs/kubectl.yaml")),
            PathBuf::from("Results/kubectl.md")
        );
        assert_eq!(
            report_path(Path::new("out"), Path::new("curl.toml")),
            PathBuf::from("out/curl.md")
        );
        assert_eq!(
            report_path(Path::new("out"), Path::new("plain")),
            PathBuf::from("out/plain.md")
        );
    }

    #[test]
    fn both_paths_are_required() {
        assert!(Cli::try_parse_from(["testmatrix", "--tests", "a.yaml"]).is_err());
        assert!(Cli::try_parse_from(["testmatrix", "--template", "t.md"]).is_err());
        assert!(Cli::try_parse_from(["testmatrix", "--print-schema"]).is_ok());

        let cli = Cli::try_parse_from([
            "testmatrix",
            "--tests",
            "a.yaml",
            "--template",
            "t.md",
            "--label",
            "x",
            "--label",
            "y",
        ])
        .unwrap();
        assert_eq!(cli.labels, vec!["x", "y"]);
        assert_eq!(cli.results_dir, PathBuf::from("Results"));
    }
}
