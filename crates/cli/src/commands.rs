//! Clap command tree definition.

use clap::{Arg, ArgAction, Command};

/// Build the complete CLI command tree.
pub fn build_cli() -> Command {
    Command::new("txchaos")
        .about("Echo transactions against a database while dropping its return traffic")
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_name("PATH")
                .env("TXCHAOS_CONFIG")
                .help("Config file (default: ./txchaos.toml when present)"),
        )
        .arg(
            Arg::new("database-url")
                .long("database-url")
                .value_name("URL")
                .env("CONNECTION_STRING")
                .hide_env_values(true)
                .help("Connection string for the database under test"),
        )
        .arg(
            Arg::new("workers")
                .long("workers")
                .short('w')
                .value_parser(clap::value_parser!(usize))
                .help("Concurrent workers (default: 4000)"),
        )
        .arg(
            Arg::new("iterations")
                .long("iterations")
                .short('n')
                .value_parser(clap::value_parser!(u64))
                .conflicts_with("until-cancelled")
                .help("Round-trips per worker (default: 200)"),
        )
        .arg(
            Arg::new("until-cancelled")
                .long("until-cancelled")
                .action(ArgAction::SetTrue)
                .help("Keep going until interrupted or the run duration elapses"),
        )
        .arg(
            Arg::new("duration-ms")
                .long("duration-ms")
                .value_parser(clap::value_parser!(u64))
                .help("Stop the workload after this many milliseconds"),
        )
        .arg(
            Arg::new("drop-probability")
                .long("drop-probability")
                .short('p')
                .value_parser(clap::value_parser!(f64))
                .help("Fraction of return packets dropped (default: 0.1)"),
        )
        .arg(
            Arg::new("random-values")
                .long("random-values")
                .action(ArgAction::SetTrue)
                .help("Echo random values instead of worker identities"),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_parser(clap::value_parser!(u64))
                .help("Seed for --random-values"),
        )
        .arg(
            Arg::new("ignore-interrupts")
                .long("ignore-interrupts")
                .action(ArgAction::SetTrue)
                .help("Log Ctrl-C instead of stopping the workers"),
        )
        .arg(
            Arg::new("iptables")
                .long("iptables")
                .value_name("BINARY")
                .help("Packet-filter binary (default: iptables)"),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .value_parser(clap::value_parser!(u16))
                .help("Database port matched by the fault rules (default: 5432)"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .help("Print the final report as JSON"),
        )
        .arg(
            Arg::new("fail-on-violation")
                .long("fail-on-violation")
                .action(ArgAction::SetTrue)
                .help("Exit 1 when any reply was missing or wrong"),
        )
}
