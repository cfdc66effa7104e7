use clap::{Arg, ArgAction, Command};
use dfrc_analysis::config::{AnalysisConfigs, DEFAULT_CONFIG_FILE};
use dfrc_analysis::logging;
use dfrc_analysis::nested_set::{flatten, write_csv, TreeNode};
use dfrc_analysis::persistence::ResultStore;
use dfrc_analysis::results::{build_analysis_result, AnalysisData};
use std::fs::File;
use std::io::BufWriter;
use tracing::{info, warn};

fn fmt_score(score: Option<f64>) -> String {
    score.map_or_else(|| "-".to_string(), |s| format!("{:.3}", s))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = Command::new("DFRC Scorer")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Score JSON analysis units and store trees and results in SQLite")
        .arg(
            Arg::new("files")
                .value_name("FILE")
                .help("Analysis units written by `analyze`")
                .num_args(1..)
                .required(true),
        )
        .arg(
            Arg::new("db")
                .long("db")
                .value_name("PATH")
                .help("SQLite database for tree nodes and results")
                .default_value("dfrc_results.db"),
        )
        .arg(
            Arg::new("csv")
                .long("csv")
                .value_name("PATH")
                .help("Also export all tree rows as CSV"),
        )
        .arg(
            Arg::new("config-file")
                .long("config-file")
                .value_name("PATH")
                .help("TOML file with the analysis configurations")
                .default_value(DEFAULT_CONFIG_FILE),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Debug logging")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    logging::init_tracing(matches.get_flag("verbose"));

    let config_file = matches.get_one::<String>("config-file").cloned().unwrap_or_default();
    let db_path = matches.get_one::<String>("db").cloned().unwrap_or_default();
    let files: Vec<String> = matches
        .get_many::<String>("files")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();

    let configs = AnalysisConfigs::load(&config_file)?;
    let store = ResultStore::open(&db_path)?;
    let mut all_nodes: Vec<TreeNode> = Vec::new();

    for file in &files {
        let data = AnalysisData::load(file)?;
        let cfg = match configs.get(&data.params.cfg_id) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(file = %file, "skipping: {}", e);
                continue;
            }
        };

        let result = build_analysis_result(&data, cfg)?;
        let nodes = flatten(&data.analysis_tree, result.dfrc_id, &result.cfg_id);
        store.save_tree(&nodes)?;
        store.save_result(&result)?;
        info!(dfrc_id = result.dfrc_id, nodes = nodes.len(), "stored {}", file);

        println!(
            "{:>6} {}/{} [{}] balance={:.3} sharpness(w/b/total)={}/{}/{} playability={}",
            result.dfrc_id,
            result.white,
            result.black,
            result.cfg_id,
            result.balance_score,
            fmt_score(result.white_sharpness),
            fmt_score(result.black_sharpness),
            fmt_score(result.total_sharpness),
            fmt_score(result.playability_score)
        );

        if matches.contains_id("csv") {
            all_nodes.extend(nodes);
        }
    }

    if let Some(csv_path) = matches.get_one::<String>("csv") {
        write_csv(&all_nodes, BufWriter::new(File::create(csv_path)?))?;
        println!("📄 Exported {} tree rows to {}", all_nodes.len(), csv_path);
    }

    println!("💾 {} results in {}", store.result_count()?, db_path);
    Ok(())
}
