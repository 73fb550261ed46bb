use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use syscim::cli::{Cli, Commands, ConfigAction};
use syscim::config::Config;
use syscim::syslog::FieldMap;
use syscim::taxonomy::{self, AliasSuppression, FieldNormalizer, FieldValidator, Taxonomy};
use syscim::SyslogParser;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse_args();

    // Logs go to stderr; stdout carries records only
    init_logging(cli.verbose);

    match cli.command {
        Commands::Parse {
            ref file,
            fail_fast,
            raw_fields,
        } => cmd_parse(&cli, file.as_deref(), fail_fast, raw_fields),
        Commands::Normalize {
            ref file,
            tombstone,
        } => cmd_normalize(&cli, file.as_deref(), tombstone),
        Commands::Validate {
            ref file,
            allow_unknown,
            ref required,
        } => cmd_validate(&cli, file.as_deref(), allow_unknown, required),
        Commands::Config { ref action } => cmd_config(&cli, action),
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "syscim=debug" } else { "syscim=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn cmd_parse(cli: &Cli, file: Option<&Path>, fail_fast: bool, raw_fields: bool) -> Result<ExitCode> {
    let mut config = load_config(cli)?;
    if raw_fields {
        config.normalization.apply_on_parse = false;
    }

    let parser = SyslogParser::new(&config).context("Failed to initialize syslog parser")?;
    let reader = open_input(file)?;
    let mut out = BufWriter::new(io::stdout().lock());

    let mut parsed = 0usize;
    let mut failed = 0usize;

    for line in reader.split(b'\n') {
        let line = line.context("Failed to read input")?;
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        match parser.parse(&line) {
            Ok(record) => {
                serde_json::to_writer(&mut out, &record).context("Failed to write record")?;
                writeln!(out)?;
                parsed += 1;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to parse message");
                failed += 1;
                if fail_fast {
                    out.flush()?;
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
    }

    out.flush()?;
    tracing::info!(parsed, failed, "Parse complete");
    Ok(ExitCode::SUCCESS)
}

fn cmd_normalize(cli: &Cli, file: Option<&Path>, tombstone: bool) -> Result<ExitCode> {
    let config = load_config(cli)?;
    let suppression = if tombstone {
        AliasSuppression::Tombstone
    } else {
        config.normalization.alias_suppression
    };
    let normalizer = FieldNormalizer::new(load_taxonomy(&config)?).with_suppression(suppression);

    let mut out = BufWriter::new(io::stdout().lock());
    let mut skipped = 0usize;

    for (number, fields) in read_objects(open_input(file)?) {
        let Some(fields) = fields? else {
            skipped += 1;
            continue;
        };
        let normalized = normalizer.normalize(&fields);
        serde_json::to_writer(&mut out, &normalized)
            .with_context(|| format!("Failed to write object from line {number}"))?;
        writeln!(out)?;
    }

    out.flush()?;
    if skipped > 0 {
        tracing::warn!(skipped, "Lines that were not JSON objects were skipped");
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_validate(
    cli: &Cli,
    file: Option<&Path>,
    allow_unknown: bool,
    required: &[String],
) -> Result<ExitCode> {
    let config = load_config(cli)?;
    let required = if required.is_empty() {
        config.validation.required.clone()
    } else {
        required.to_vec()
    };
    let validator = FieldValidator::new(load_taxonomy(&config)?)
        .non_existent_ok(allow_unknown || config.validation.non_existent_ok)
        .require(required);

    let mut out = BufWriter::new(io::stdout().lock());
    let mut failures = 0usize;

    for (number, fields) in read_objects(open_input(file)?) {
        let Some(fields) = fields? else {
            failures += 1;
            writeln!(out, "line {number}: FAIL not a JSON object")?;
            continue;
        };

        let report = validator.validate_fields(&fields);
        if report.is_valid() {
            writeln!(out, "line {number}: PASS")?;
        } else {
            failures += 1;
            let mut problems = Vec::new();
            if !report.unknown.is_empty() {
                problems.push(format!("unknown: {}", report.unknown.join(", ")));
            }
            if !report.missing.is_empty() {
                problems.push(format!("missing: {}", report.missing.join(", ")));
            }
            writeln!(out, "line {number}: FAIL {}", problems.join("; "))?;
        }
    }

    out.flush()?;
    if failures > 0 {
        tracing::warn!(failures, "Validation failed");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_config(cli: &Cli, action: &ConfigAction) -> Result<ExitCode> {
    match action {
        ConfigAction::Show { section } => {
            let config = load_config(cli)?;
            let mut value =
                serde_json::to_value(&config).context("Failed to serialize config")?;

            if let Some(section) = section {
                value = value
                    .get(section.as_str())
                    .cloned()
                    .with_context(|| format!("No config section named '{section}'"))?;
            }

            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        ConfigAction::Validate { file } => {
            let path = match file.clone().or_else(|| cli.config.clone()) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)
                .with_context(|| format!("Invalid configuration: {}", path.display()))?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match &cli.config {
                Some(path) => path.clone(),
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(ExitCode::SUCCESS);
            }

            let config_dir = path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            let taxonomy_path = install_taxonomy(&config_dir, *force)?;

            let mut config = Config::default();
            config.taxonomy.path = taxonomy_path;
            config.save(&path)?;

            println!("✓ Configuration initialized at: {}", path.display());
            println!("  - taxonomy: {}", config.taxonomy.path.display());
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load_or_default(cli.config.as_deref())
        .context("Failed to load configuration")?;

    if let Some(zone) = &cli.time_zone {
        config.device.time_zone = Some(zone.clone());
    }
    config.taxonomy.path = expand_path(&config.taxonomy.path)?;

    Ok(config)
}

fn load_taxonomy(config: &Config) -> Result<Arc<Taxonomy>> {
    let taxonomy = Taxonomy::load(&config.taxonomy.path)
        .with_context(|| format!("Failed to load taxonomy: {}", config.taxonomy.path.display()))?;
    Ok(Arc::new(taxonomy))
}

/// Write the bundled taxonomy next to the config file
fn install_taxonomy(config_dir: &Path, force: bool) -> Result<PathBuf> {
    let name = Path::new(taxonomy::DEFAULT_TAXONOMY_PATH)
        .file_name()
        .context("Default taxonomy path has no file name")?;
    let target = config_dir.join(name);

    if force || !target.exists() {
        let content = name
            .to_str()
            .and_then(taxonomy::bundled_resource)
            .context("No bundled taxonomy resource")?;
        std::fs::create_dir_all(config_dir)
            .with_context(|| format!("Failed to create {}", config_dir.display()))?;
        std::fs::write(&target, content)
            .with_context(|| format!("Failed to write {}", target.display()))?;
    }

    Ok(target)
}

fn open_input(file: Option<&Path>) -> Result<Box<dyn BufRead>> {
    match file {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open input: {}", path.display()))?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => Ok(Box::new(BufReader::new(io::stdin()))),
    }
}

/// Numbered JSON objects from a line-oriented reader
///
/// Read errors are fatal; lines that are not JSON objects yield `None`.
fn read_objects(reader: Box<dyn BufRead>) -> impl Iterator<Item = (usize, Result<Option<FieldMap>>)> {
    reader
        .lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line))
        .filter(|(_, line)| line.as_ref().map_or(true, |l| !l.trim().is_empty()))
        .map(|(number, line)| {
            let parsed = line.context("Failed to read input").map(|line| {
                match serde_json::from_str::<FieldMap>(&line) {
                    Ok(fields) => Some(fields),
                    Err(e) => {
                        tracing::error!(line = number, error = %e, "Not a JSON object");
                        None
                    }
                }
            });
            (number, parsed)
        })
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    let path_str = path.to_str().context("Invalid path encoding")?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir().context("Cannot determine home directory")?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}
