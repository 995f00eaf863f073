//! pagesnap CLI - PDF page info and screenshots

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{CommandFactory, Parser};

use pagesnap::diagnostics::{self, DiagnosticFilter};
use pagesnap::{
    CaptureOptions, EncodeOptions, PdfDocument, SnapError, capture_pages, expand_output_paths,
    inspect_document, parse_page_list,
};

#[derive(Parser)]
#[command(name = "pagesnap")]
#[command(version)]
#[command(about = "Show PDF document info or capture pages as PNG/JPEG images", long_about = None)]
#[command(after_help = "Examples:\n  \
    pagesnap report.pdf                  show document info\n  \
    pagesnap report.pdf 1 page.png       capture page 1\n  \
    pagesnap report.pdf 1,3,5 shot.jpg   capture pages 1, 3 and 5 to shot-1.jpg, shot-3.jpg, shot-5.jpg")]
struct Cli {
    /// Input PDF file
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Comma-separated page numbers, starting at 1
    #[arg(value_name = "PAGES", allow_hyphen_values = true)]
    pages: Option<String>,

    /// Output image; .jpg/.jpeg writes JPEG, anything else PNG
    #[arg(value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// Render scale; 1.0 is one pixel per point
    #[arg(long, default_value_t = 1.0)]
    scale: f32,

    /// JPEG quality (1-100)
    #[arg(long, default_value_t = pagesnap::DEFAULT_JPEG_QUALITY,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Pages rendered in parallel; 0 uses every core
    #[arg(long, default_value_t = 1)]
    jobs: usize,

    /// More log output (-v info, -vv debug); also shows suppressed font warnings
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose > 0 {
        DiagnosticFilter::default()
    } else {
        DiagnosticFilter::with_default_deny()
    };
    diagnostics::install(cli.verbose, filter);

    let Some(input) = cli.input.as_deref() else {
        let mut command = Cli::command();
        if let Err(err) = command.print_help() {
            eprintln!("Error: {err}");
            return ExitCode::FAILURE;
        }
        println!();
        return ExitCode::SUCCESS;
    };

    let result = match (cli.pages.as_deref(), cli.output.as_deref()) {
        (None, _) => cmd_info(input),
        (Some(_), None) => Err(SnapError::InvalidArgument(
            "please provide both page number(s) and an output file".to_string(),
        )),
        (Some(pages), Some(output)) => {
            let options = CaptureOptions {
                scale: cli.scale,
                jobs: cli.jobs,
                encode: EncodeOptions {
                    jpeg_quality: cli.quality,
                },
                ..CaptureOptions::default()
            };
            cmd_capture(input, pages, output, &options)
        }
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn cmd_info(input: &Path) -> Result<bool, SnapError> {
    let doc = PdfDocument::open_path(input)?;
    let name = input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.display().to_string());
    let info = inspect_document(&doc, &name)?;
    print!("{}", info.render_report());
    doc.close();
    Ok(true)
}

/// Returns `Ok(false)` when at least one page failed; those failures are
/// already reported on stderr. Argument errors are raised before the input is
/// read.
fn cmd_capture(
    input: &Path,
    pages: &str,
    output: &Path,
    options: &CaptureOptions,
) -> Result<bool, SnapError> {
    let pages = parse_page_list(pages)?;
    options.validate()?;
    expand_output_paths(output, &pages)?;
    let doc = PdfDocument::open_path(input)?;
    let report = capture_pages(&doc, &pages, output, options)?;
    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(page) => println!(
                "Captured page {} to {} ({}x{}px)",
                outcome.page,
                page.path.display(),
                page.width,
                page.height
            ),
            Err(err) => eprintln!("Error: {err}"),
        }
    }
    doc.close();
    Ok(report.succeeded())
}
