use anyhow::Context;
use chrono::NaiveDate;
use clap::{Arg, ArgAction, ArgMatches, Command};
use log::LevelFilter;
use std::io::Read;
use std::process;
use std::str::FromStr;
use threat_analyzer::config::Config;
use threat_analyzer::pipeline::ThreatAnalyzer;
use threat_analyzer::report::DashboardSummary;
use threat_analyzer::scoring::score_breakdown;
use threat_analyzer::store::{RecordFilter, ResultStore};

fn cli() -> Command {
    Command::new("threat-analyzer")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Scores messages for phishing and social-engineering risk")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value(Config::default_path())
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable debug logging")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Write a default configuration file and exit")
                .action(ArgAction::Set),
        )
        .subcommand(
            Command::new("analyze")
                .about("Analyze a message body")
                .arg(Arg::new("text").help("Message text (reads stdin when omitted)"))
                .arg(
                    Arg::new("file")
                        .short('f')
                        .long("file")
                        .value_name("FILE")
                        .help("Read the message body from a file")
                        .conflicts_with("text"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Print the result as JSON")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("no-save")
                        .long("no-save")
                        .help("Do not store the result")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("report")
                .about("Summarize stored analyses")
                .arg(date_arg("since", "First day to include (YYYY-MM-DD)"))
                .arg(date_arg("until", "Last day to include (YYYY-MM-DD)"))
                .arg(score_arg("min-score", "Lowest score to include"))
                .arg(score_arg("max-score", "Highest score to include"))
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Print the summary as JSON")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(Command::new("reset").about("Delete all stored analyses"))
}

fn date_arg(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .value_name("DATE")
        .help(help)
        .value_parser(|s: &str| NaiveDate::from_str(s).map_err(|e| e.to_string()))
}

fn score_arg(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .value_name("SCORE")
        .help(help)
        .value_parser(clap::value_parser!(u32))
}

#[tokio::main]
async fn main() {
    let matches = cli().get_matches();

    // Global args are always visible from the innermost matches
    let scope = matches.subcommand().map(|(_, sub)| sub).unwrap_or(&matches);
    let config_path = scope
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or(Config::default_path());

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        generate_default_config(generate_path);
        return;
    }

    let config = match Config::load_or_default(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            process::exit(1);
        }
    };

    init_logging(&config, scope.get_flag("verbose"));

    let result = match matches.subcommand() {
        Some(("analyze", sub)) => analyze(&config, sub).await,
        Some(("report", sub)) => report(&config, sub),
        Some(("reset", _)) => reset(&config),
        _ => {
            let _ = cli().print_help();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("❌ {e:#}");
        process::exit(1);
    }
}

fn init_logging(config: &Config, verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        config
            .logging
            .as_ref()
            .and_then(|logging| LevelFilter::from_str(&logging.level).ok())
            .unwrap_or(LevelFilter::Info)
    };

    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
}

fn generate_default_config(path: &str) {
    let written = Config::default()
        .to_yaml()
        .map_err(anyhow::Error::from)
        .and_then(|yaml| std::fs::write(path, yaml).map_err(anyhow::Error::from));
    match written {
        Ok(()) => {
            println!("Default configuration written to: {path}");
            println!("Please edit the configuration file to suit your needs.");
        }
        Err(e) => {
            eprintln!("Error writing configuration file: {e}");
            process::exit(1);
        }
    }
}

fn read_message(sub: &ArgMatches) -> anyhow::Result<String> {
    if let Some(text) = sub.get_one::<String>("text") {
        return Ok(text.clone());
    }
    if let Some(path) = sub.get_one::<String>("file") {
        return std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read message file {path}"));
    }
    let mut body = String::new();
    std::io::stdin().read_to_string(&mut body)?;
    Ok(body)
}

async fn analyze(config: &Config, sub: &ArgMatches) -> anyhow::Result<()> {
    let body = read_message(sub)?;
    let analyzer = ThreatAnalyzer::from_config(config);
    let analysis = analyzer.run_full_analysis(&body).await;

    if !sub.get_flag("no-save") {
        let store = ResultStore::open(&config.database_path)?;
        let id = store.save(&body, analysis.score, &analysis.findings)?;
        log::info!("Stored analysis {id} in {}", config.database_path);
    }

    if sub.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
        return Ok(());
    }

    println!("🔍 Analysis Report");
    println!("═══════════════════════════════════════");
    println!(
        "  Threat score: {} ({})",
        analysis.score,
        analysis.risk_level()
    );
    println!();
    if analysis.findings.is_empty() {
        println!("✅ No suspicious findings were detected.");
    } else {
        println!("Detected findings:");
        for finding in &analysis.findings {
            println!("  ⚠️  {}", finding.label());
        }
        println!();
        println!("Score breakdown:");
        for contribution in score_breakdown(&analysis.findings) {
            println!("  {:<36} {:>4}", contribution.kind, contribution.points);
        }
    }
    Ok(())
}

fn report(config: &Config, sub: &ArgMatches) -> anyhow::Result<()> {
    let filter = RecordFilter {
        since: sub.get_one::<NaiveDate>("since").copied(),
        until: sub.get_one::<NaiveDate>("until").copied(),
        min_score: sub.get_one::<u32>("min-score").copied(),
        max_score: sub.get_one::<u32>("max-score").copied(),
    };

    let store = ResultStore::open(&config.database_path)?;
    let records = store.load(&filter)?;
    let summary = DashboardSummary::from_records(
        &records,
        config.report.high_risk_threshold,
        config.report.top_findings,
    );

    if sub.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", summary.render());
    }
    Ok(())
}

fn reset(config: &Config) -> anyhow::Result<()> {
    let store = ResultStore::open(&config.database_path)?;
    let removed = store.clear()?;
    println!("✅ Removed {removed} stored analyses");
    Ok(())
}
