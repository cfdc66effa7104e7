use clap::{Arg, ArgAction, Command};
use dfrc_analysis::analyzer::{analyse_with_progress, analysis_progress_bar};
use dfrc_analysis::codec::{encode_position, uid_to_pair, NUM_PAIRS};
use dfrc_analysis::config::{AnalysisConfigs, DEFAULT_CONFIG_FILE};
use dfrc_analysis::logging;
use dfrc_analysis::results::{AnalysisData, AnalysisParams};
use dfrc_analysis::stockfish::{StockfishConfig, StockfishEngine};
use dfrc_analysis::DfrcBoard;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

/// Leave two cores for the rest of the machine
fn default_threads() -> usize {
    num_cpus::get().saturating_sub(2).max(1)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = Command::new("DFRC Analyzer")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Explore DFRC start positions with Stockfish and write analysis units as JSON")
        .arg(
            Arg::new("dfrc-id")
                .value_name("DFRC_ID")
                .help("First pair id to analyse (0 <= id < 921600)")
                .value_parser(clap::value_parser!(u32))
                .required(true),
        )
        .arg(
            Arg::new("count")
                .short('n')
                .long("count")
                .value_name("N")
                .help("Number of consecutive pair ids to analyse")
                .value_parser(clap::value_parser!(u32))
                .default_value("1"),
        )
        .arg(
            Arg::new("config-id")
                .short('c')
                .long("config-id")
                .value_name("ID")
                .help("Analysis configuration to use")
                .default_value("XS"),
        )
        .arg(
            Arg::new("config-file")
                .long("config-file")
                .value_name("PATH")
                .help("TOML file with the analysis configurations")
                .default_value(DEFAULT_CONFIG_FILE),
        )
        .arg(
            Arg::new("engine")
                .short('e')
                .long("engine")
                .value_name("PATH")
                .help("Stockfish executable")
                .default_value("stockfish"),
        )
        .arg(
            Arg::new("threads")
                .short('t')
                .long("threads")
                .value_name("THREADS")
                .help("Engine threads (default: CPU count - 2)")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("hash")
                .long("hash")
                .value_name("MB")
                .help("Engine hash table size in MB")
                .value_parser(clap::value_parser!(usize))
                .default_value("1024"),
        )
        .arg(
            Arg::new("analyzer")
                .short('a')
                .long("analyzer")
                .value_name("NAME")
                .help("Name recorded as the author of the analysis")
                .default_value("local"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("DIR")
                .help("Directory for the JSON analysis units")
                .default_value("analysis"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Log engine traffic")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    logging::init_tracing(matches.get_flag("verbose"));

    let first_id = matches.get_one::<u32>("dfrc-id").copied().unwrap_or_default();
    let count = matches.get_one::<u32>("count").copied().unwrap_or(1);
    let cfg_id = matches.get_one::<String>("config-id").cloned().unwrap_or_default();
    let config_file = matches.get_one::<String>("config-file").cloned().unwrap_or_default();
    let threads = matches.get_one::<usize>("threads").copied().unwrap_or_else(default_threads);
    let hash_size = matches.get_one::<usize>("hash").copied().unwrap_or(1024);
    let analyzer = matches.get_one::<String>("analyzer").cloned().unwrap_or_default();
    let output_dir = PathBuf::from(matches.get_one::<String>("output").cloned().unwrap_or_default());

    let configs = AnalysisConfigs::load(&config_file)?;
    let cfg = configs.get(&cfg_id)?;
    fs::create_dir_all(&output_dir)?;

    let mut engine = StockfishEngine::new(&StockfishConfig {
        stockfish_path: matches.get_one::<String>("engine").cloned().unwrap_or_default(),
        threads,
        hash_size_mb: hash_size,
    })?;

    let last_id = first_id.saturating_add(count).min(NUM_PAIRS);
    println!("🔍 Analyzing pair ids {}..{} with config {}", first_id, last_id, cfg_id);

    for dfrc_id in first_id..last_id {
        let (white_id, black_id) = uid_to_pair(dfrc_id)?;
        let params = AnalysisParams {
            white_id,
            black_id,
            threads,
            hash_size,
            cfg_id: cfg_id.clone(),
        };

        let start = Instant::now();
        let progress = analysis_progress_bar(cfg)?;
        progress.set_message(format!("{} vs {}", encode_position(white_id)?, encode_position(black_id)?));
        let tree = analyse_with_progress::<DfrcBoard, _>(&params, cfg, &mut engine, progress)?;

        let data = AnalysisData {
            params,
            analyzer: analyzer.clone(),
            analysis_tree: tree,
        };
        let path = output_dir.join(format!("{}.json", dfrc_id));
        data.save(&path)?;

        info!(dfrc_id, path = %path.display(), "analysis saved");
        println!(
            "✅ {} ({} nodes) in {:.1}s -> {}",
            dfrc_id,
            data.analysis_tree.node_count(),
            start.elapsed().as_secs_f64(),
            path.display()
        );
    }

    engine.close()?;
    Ok(())
}
