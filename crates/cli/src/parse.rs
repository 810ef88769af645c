//! Turn parsed arguments into a validated harness config.
//!
//! Precedence, lowest first: built-in defaults, config file, command line
//! (including the environment variables clap reads for some flags).

use clap::ArgMatches;
use std::path::{Path, PathBuf};
use txchaos_core::config::CONFIG_FILE_NAME;
use txchaos_core::{ConfigError, HarnessConfig, InterruptPolicy, ValueSource};

use crate::format::OutputMode;

/// Everything `main` needs to start a run.
#[derive(Debug)]
pub struct CliAction {
    pub config: HarnessConfig,
    pub config_path: Option<PathBuf>,
    pub output: OutputMode,
    pub fail_on_violation: bool,
}

/// Resolve `matches` against `cwd`.
pub fn matches_to_action(matches: &ArgMatches, cwd: &Path) -> Result<CliAction, ConfigError> {
    let config_path = match matches.get_one::<String>("config") {
        Some(path) => Some(PathBuf::from(path)),
        None => {
            let default = cwd.join(CONFIG_FILE_NAME);
            default.is_file().then_some(default)
        }
    };

    let mut config = match &config_path {
        Some(path) => HarnessConfig::from_file(path)?,
        None => HarnessConfig::default(),
    };
    apply_overrides(&mut config, matches);
    config.validate()?;

    let output = if matches.get_flag("json") {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    Ok(CliAction {
        config,
        config_path,
        output,
        fail_on_violation: matches.get_flag("fail-on-violation"),
    })
}

fn apply_overrides(config: &mut HarnessConfig, matches: &ArgMatches) {
    if let Some(url) = matches.get_one::<String>("database-url") {
        config.database_url = url.clone();
    }
    if let Some(workers) = matches.get_one::<usize>("workers") {
        config.workers = *workers;
    }
    if let Some(iterations) = matches.get_one::<u64>("iterations") {
        config.iterations = *iterations;
        config.until_cancelled = false;
    }
    if matches.get_flag("until-cancelled") {
        config.until_cancelled = true;
    }
    if let Some(ms) = matches.get_one::<u64>("duration-ms") {
        config.run_duration_ms = Some(*ms);
    }
    if let Some(p) = matches.get_one::<f64>("drop-probability") {
        config.drop_probability = *p;
    }
    if matches.get_flag("random-values") {
        config.value_source = ValueSource::Random;
    }
    if let Some(seed) = matches.get_one::<u64>("seed") {
        config.seed = Some(*seed);
    }
    if matches.get_flag("ignore-interrupts") {
        config.interrupt = InterruptPolicy::Ignore;
    }
    if let Some(binary) = matches.get_one::<String>("iptables") {
        config.faults.command = binary.clone();
    }
    if let Some(port) = matches.get_one::<u16>("port") {
        config.faults.port = *port;
    }
}
