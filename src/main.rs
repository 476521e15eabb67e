use anyhow::{anyhow, bail, Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use gradesheet::export::{self, FILTERED_STUDENTS_SHEET};
use gradesheet::{
    filter_multi, filter_single, parse_roll_list, Config, Dataset, DatasetCache, ResultStats, Sheet,
    View,
};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("gradesheet")
        .version("0.1.0")
        .about("Converts exam result reports into filtered Excel workbooks")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("gradesheet.toml")
                .global(true),
        )
        .arg(
            Arg::new("output-dir")
                .short('o')
                .long("output-dir")
                .value_name("DIR")
                .help("Directory for generated workbooks (overrides config)")
                .global(true),
        )
        .arg(
            Arg::new("csv")
                .long("csv")
                .help("Also write one CSV file per sheet")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("process")
                .about("Export every candidate, with an optional filtered sheet")
                .arg(
                    Arg::new("input")
                        .value_name("REPORT")
                        .required(true)
                        .num_args(1..)
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("filter")
                        .short('f')
                        .long("filter")
                        .value_name("ROLLS")
                        .help("Comma or newline separated roll numbers"),
                ),
        )
        .subcommand(
            Command::new("filter")
                .about("Export only the given roll numbers")
                .arg(
                    Arg::new("input")
                        .value_name("REPORT")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("rolls")
                        .short('r')
                        .long("rolls")
                        .value_name("ROLLS")
                        .conflicts_with("rolls-file")
                        .required_unless_present("rolls-file"),
                )
                .arg(
                    Arg::new("rolls-file")
                        .long("rolls-file")
                        .value_name("FILE")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            Command::new("multi")
                .about("Export one sheet per roll-number set")
                .arg(
                    Arg::new("input")
                        .value_name("REPORT")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("set")
                        .short('s')
                        .long("set")
                        .value_name("ROLLS")
                        .required(true)
                        .action(ArgAction::Append),
                ),
        )
        .subcommand(
            Command::new("preview")
                .about("Show the first rows of an exported workbook")
                .arg(
                    Arg::new("workbook")
                        .value_name("XLSX")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("rows")
                        .short('n')
                        .long("rows")
                        .value_name("N")
                        .value_parser(clap::value_parser!(usize)),
                ),
        )
        .subcommand(Command::new("init").about("Write a default configuration file"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    let config_file = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or("gradesheet.toml");

    if let Some(("init", _)) = matches.subcommand() {
        if Path::new(config_file).exists() {
            println!("📋 Configuration already exists: {}", config_file);
        } else {
            Config::default().save_to_file(config_file)?;
            println!("📝 Created default configuration file: {}", config_file);
        }
        return Ok(());
    }

    let mut config = if Path::new(config_file).exists() {
        Config::load_from_file(config_file)
            .with_context(|| format!("Failed to load config: {}", config_file))?
    } else {
        Config::default()
    };
    if let Some(dir) = matches.get_one::<String>("output-dir") {
        config.output_directory = Some(dir.clone());
    }
    if matches.get_flag("csv") {
        config.write_csv = true;
    }

    init_logging(&config);

    let output_dir = PathBuf::from(config.output_dir());
    let cache = DatasetCache::new(config.cache_capacity);

    match matches.subcommand() {
        Some(("process", sub)) => run_process(sub, &config, cache, &output_dir).await,
        Some(("filter", sub)) => run_filter(sub, &config, &cache, &output_dir),
        Some(("multi", sub)) => run_multi(sub, &config, &cache, &output_dir),
        Some(("preview", sub)) => run_preview(sub, &config),
        _ => unreachable!("subcommand_required is set"),
    }
}

fn init_logging(config: &Config) {
    let default_filter = config.log_filter.as_deref().unwrap_or("info");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

struct ProcessSummary {
    input: PathBuf,
    output: PathBuf,
    stats_file: PathBuf,
    stats: ResultStats,
    filtered_count: usize,
}

async fn run_process(
    matches: &ArgMatches,
    config: &Config,
    cache: DatasetCache,
    output_dir: &Path,
) -> Result<()> {
    let inputs: Vec<PathBuf> = matches
        .get_many::<PathBuf>("input")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let rolls = matches
        .get_one::<String>("filter")
        .map(|text| parse_roll_list(text))
        .unwrap_or_default();

    let bases = output_bases(&inputs);

    // Each report is parsed and exported on its own blocking task; the cache is shared.
    let mut handles = Vec::new();
    for (input, base) in inputs.into_iter().zip(bases) {
        let cache = cache.clone();
        let rolls = rolls.clone();
        let output_dir = output_dir.to_path_buf();
        let write_csv = config.write_csv;
        handles.push(tokio::task::spawn_blocking(move || {
            process_report(&cache, &input, &rolls, &output_dir, &base, write_csv)
                .with_context(|| format!("Failed to process {}", input.display()))
        }));
    }

    let mut failures = 0;
    for handle in handles {
        match handle.await? {
            Ok(summary) => print_process_summary(&summary, !rolls.is_empty()),
            Err(e) => {
                failures += 1;
                println!("❌ {:#}", e);
            }
        }
    }

    if failures > 0 {
        bail!("{} report(s) failed to process", failures);
    }
    println!("\n✅ Processing complete!");
    Ok(())
}

/// `processed_<stem>_complete` per input. Inputs sharing a stem get a counter
/// (`processed_<stem>_2_complete`, ...) so no two reports write the same files.
fn output_bases(inputs: &[PathBuf]) -> Vec<String> {
    let mut used = HashSet::new();
    inputs
        .iter()
        .map(|input| {
            let stem = input
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("report");
            let mut base = format!("processed_{}_complete", stem);
            let mut n = 2;
            while !used.insert(base.clone()) {
                base = format!("processed_{}_{}_complete", stem, n);
                n += 1;
            }
            base
        })
        .collect()
}

fn process_report(
    cache: &DatasetCache,
    input: &Path,
    rolls: &[String],
    output_dir: &Path,
    base: &str,
    write_csv: bool,
) -> Result<ProcessSummary> {
    let dataset = cache.get_or_parse_file(input)?;

    let filtered = if rolls.is_empty() {
        None
    } else {
        filter_single(&dataset, rolls)
    };
    let filtered_count = filtered.as_ref().map(View::len).unwrap_or(0);
    if !rolls.is_empty() && filtered.is_none() {
        warn!(input = %input.display(), "no candidates matched the filter");
    }

    let sheets = export::dataset_sheets(&dataset, filtered);
    let output = output_dir.join(format!("{}.xlsx", base));
    save_sheets(&sheets, &output, output_dir, write_csv)?;

    let stats_file = output_dir.join(format!("{}_stats.toml", base));
    dataset
        .stats
        .save_to_file(&stats_file)
        .with_context(|| format!("Failed to write statistics: {}", stats_file.display()))?;

    Ok(ProcessSummary {
        input: input.to_path_buf(),
        output,
        stats_file,
        stats: dataset.stats,
        filtered_count,
    })
}

fn print_process_summary(summary: &ProcessSummary, filtered: bool) {
    println!("\n📄 {}", summary.input.display());
    for (label, count) in summary.stats.buckets() {
        println!("   {:<18} {}", label, count);
    }
    if filtered {
        println!("   🔎 {}: {}", FILTERED_STUDENTS_SHEET, summary.filtered_count);
    }
    println!("   💾 Saved: {}", summary.output.display());
    println!("   📊 Stats: {}", summary.stats_file.display());
}

fn run_filter(
    matches: &ArgMatches,
    config: &Config,
    cache: &DatasetCache,
    output_dir: &Path,
) -> Result<()> {
    let input = required_path(matches, "input")?;
    let roll_text = match matches.get_one::<PathBuf>("rolls-file") {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read roll numbers: {}", path.display()))?,
        None => matches.get_one::<String>("rolls").cloned().unwrap_or_default(),
    };
    let rolls = parse_roll_list(&roll_text);
    if rolls.is_empty() {
        return Err(gradesheet::ReportError::NoRollNumbers.into());
    }

    let dataset = cache.get_or_parse_file(input)?;
    let view = filter_single(&dataset, &rolls).ok_or_else(|| anyhow!("No matching students found"))?;
    let count = view.len();
    let sheets = vec![Sheet::new(format!("Filtered_{}_Rolls", rolls.len()), view)];

    let output = output_dir.join(format!("filtered_{}_students.xlsx", count));
    save_sheets(&sheets, &output, output_dir, config.write_csv)?;

    println!("🔎 Found {} matching students", count);
    println!("💾 Saved: {}", output.display());
    Ok(())
}

fn run_multi(
    matches: &ArgMatches,
    config: &Config,
    cache: &DatasetCache,
    output_dir: &Path,
) -> Result<()> {
    let input = required_path(matches, "input")?;
    let id_sets: Vec<Vec<String>> = matches
        .get_many::<String>("set")
        .map(|values| values.map(|text| parse_roll_list(text)).collect())
        .unwrap_or_default();

    let dataset = cache.get_or_parse_file(input)?;
    let filtered = filter_multi(&dataset, &id_sets);
    if filtered.is_empty() {
        bail!("No matching students found in any set");
    }

    let sheets_created = filtered.len();
    let total_filtered: usize = filtered.iter().map(|sheet| sheet.view.len()).sum();
    let sheets = all_students_then(&dataset, filtered);

    let output = output_dir.join(format!("multi_filter_{}_sheets.xlsx", sheets_created));
    save_sheets(&sheets, &output, output_dir, config.write_csv)?;

    println!(
        "📑 Created {} filtered sheets with {} total students",
        sheets_created, total_filtered
    );
    for sheet in &sheets {
        println!("   - {} ({} rows)", sheet.name, sheet.view.len());
    }
    println!("💾 Saved: {}", output.display());
    Ok(())
}

fn all_students_then<'a>(dataset: &'a Dataset, filtered: Vec<Sheet<'a>>) -> Vec<Sheet<'a>> {
    let mut sheets = export::dataset_sheets(dataset, None);
    sheets.extend(filtered);
    sheets
}

fn run_preview(matches: &ArgMatches, config: &Config) -> Result<()> {
    let workbook = required_path(matches, "workbook")?;
    let rows = matches
        .get_one::<usize>("rows")
        .copied()
        .unwrap_or(config.preview_rows);

    let preview = export::preview_workbook(workbook, rows)
        .with_context(|| format!("Failed to read workbook: {}", workbook.display()))?;

    println!("📑 Sheets: {}", preview.sheet_names.join(", "));
    println!("👥 Total students: {}", preview.total_rows);
    println!("{}", preview.columns.join(" | "));
    for row in &preview.rows {
        println!("{}", row.join(" | "));
    }
    Ok(())
}

fn required_path<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a Path> {
    matches
        .get_one::<PathBuf>(name)
        .map(PathBuf::as_path)
        .ok_or_else(|| anyhow!("missing argument: {}", name))
}

/// Writes the workbook and, when asked, one `<workbook stem>_<sheet>.csv` per sheet.
/// The output directory is created here so read-only commands never touch it.
fn save_sheets(sheets: &[Sheet<'_>], output: &Path, output_dir: &Path, write_csv: bool) -> Result<()> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;
    export::write_workbook(sheets, output)?;
    if write_csv {
        let prefix = output
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        for sheet in sheets {
            export::write_csv(sheet, output_dir, prefix)?;
        }
    }
    Ok(())
}
