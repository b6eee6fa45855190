use std::{collections::BTreeMap, fs::File, path::PathBuf};

use anyhow::Context;
use glob::glob;
use indicatif::{ParallelProgressIterator, ProgressBar};
use rayon::prelude::*;
use sans_iq::{AzimuthalAverage, ReductionConfig, WeightedRadialAverage, Workspace};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "iq-batch", about = "Batch azimuthal averaging of SANS workspaces")]
struct Opt {
    /// Workspace JSON files glob pattern
    #[structopt(default_value = "data/*.json")]
    pattern: String,
    /// Path to the reduction configuration JSON file, defaults to `$SANS_IQ_CONFIG` if set
    #[structopt(short, long)]
    config: Option<String>,
    /// Path to the batch report
    #[structopt(short, long, default_value = "iq-batch.json")]
    report: String,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::from_args();

    let config = match opt.config {
        Some(path) => ReductionConfig::from_path(path)?,
        None => ReductionConfig::from_env().unwrap_or_default(),
    };
    let reduction = AzimuthalAverage::from(&config);
    let store = config.property_manager();

    let data_paths: Vec<PathBuf> = glob(&opt.pattern)?.collect::<Result<_, _>>()?;
    log::info!("{} workspace(s) matching {}", data_paths.len(), opt.pattern);

    let pb = ProgressBar::new(data_paths.len() as u64);
    let report: BTreeMap<String, String> = data_paths
        .par_iter()
        .progress_with(pb)
        .map(|path| {
            let key = path.display().to_string();
            let outcome = Workspace::from_json(path)
                .map_err(anyhow::Error::from)
                .and_then(|workspace| {
                    let result = reduction.reduce(&workspace, &WeightedRadialAverage, &store)?;
                    result.profile.to_csv(path.with_extension("csv"))?;
                    Ok(result.message)
                })
                .unwrap_or_else(|e| {
                    log::error!("{key}: {e:#}");
                    format!("failed: {e:#}")
                });
            (key, outcome)
        })
        .collect();

    let file = File::create(&opt.report).with_context(|| format!("cannot create {}", opt.report))?;
    serde_json::to_writer_pretty(file, &report)?;
    Ok(())
}
