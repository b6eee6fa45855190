use sans_iq::{
    AzimuthalAverage, BinningSpec, DirectBeamResolution, ReductionConfig, WedgeParameters,
    WeightedRadialAverage, Workspace,
};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "sans-iq", about = "SANS azimuthal averaging: I(Q) from a detector workspace")]
struct Opt {
    /// Path to the workspace JSON file
    workspace: String,
    /// Path to the reduction configuration JSON file, defaults to `$SANS_IQ_CONFIG` if set
    #[structopt(short, long)]
    config: Option<String>,
    /// Q binning "qmin, qstep, qmax": positive step is linear bins, negative is logarithmic
    #[structopt(short, long)]
    binning: Option<BinningSpec>,
    /// Number of Q bins to use if the binning is not supplied
    #[structopt(short, long)]
    n_bins: Option<usize>,
    /// Logarithmic binning in Q when the binning is not supplied
    #[structopt(long)]
    log: bool,
    /// Number of sub-pixels per side of a detector pixel
    #[structopt(long)]
    subpixels: Option<usize>,
    /// Weight the pixels with their inverse variance
    #[structopt(long)]
    error_weighting: bool,
    /// Number of wedges
    #[structopt(long)]
    wedges: Option<usize>,
    /// Angular opening of each wedge [deg]
    #[structopt(long)]
    wedge_angle: Option<f64>,
    /// Angular offset of the wedges [deg]
    #[structopt(long)]
    wedge_offset: Option<f64>,
    /// Q resolution "wavelength[A] relative-wavelength-resolution beam-width[rad]"
    #[structopt(long, number_of_values = 3)]
    resolution: Option<Vec<f64>>,
    /// Save I(Q) to CSV file
    #[structopt(long)]
    csv: Option<String>,
    /// Save the wedges I(Q) to CSV files with the given prefix
    #[structopt(long)]
    wedges_csv: Option<String>,
    /// Plot I(Q) to SVG file
    #[cfg(feature = "plot")]
    #[structopt(short, long)]
    plot: Option<String>,
    /// Display I(Q) table summary
    #[structopt(short, long)]
    summary: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::from_args();

    let mut config = match opt.config {
        Some(path) => ReductionConfig::from_path(path)?,
        None => ReductionConfig::from_env().unwrap_or_else(|e| {
            log::debug!("default reduction configuration: {e}");
            ReductionConfig::default()
        }),
    };
    if let Some(arg) = opt.binning {
        config.binning = arg;
    }
    if let Some(arg) = opt.n_bins {
        config.number_of_bins = arg;
    }
    if opt.log {
        config.log_binning = true;
    }
    if let Some(arg) = opt.subpixels {
        config.number_of_subpixels = arg;
    }
    if opt.error_weighting {
        config.error_weighting = true;
    }
    config.wedges = WedgeParameters {
        number: opt.wedges.unwrap_or(config.wedges.number),
        angle: opt.wedge_angle.unwrap_or(config.wedges.angle),
        offset: opt.wedge_offset.unwrap_or(config.wedges.offset),
    };
    config.validate()?;

    let mut reduction = AzimuthalAverage::from(&config);
    if let Some(arg) = opt.resolution {
        reduction = reduction.compute_resolution(DirectBeamResolution::new(arg[0], arg[1], arg[2]));
    }

    let workspace = Workspace::from_json(&opt.workspace)?;
    let result = reduction.reduce(
        &workspace,
        &WeightedRadialAverage,
        &config.property_manager(),
    )?;
    println!("{}", result.message);
    println!("Binning: {}", result.binning);

    if opt.summary {
        result.profile.summary();
    }
    if let Some(filename) = opt.csv {
        result.profile.to_csv(filename)?;
    }
    if let Some(prefix) = opt.wedges_csv {
        for (k, wedge) in result.wedges.iter().enumerate() {
            wedge.to_csv(format!("{}_wedge{}.csv", prefix, k))?;
        }
    }
    #[cfg(feature = "plot")]
    if let Some(filename) = opt.plot {
        sans_iq::plot::plot_iq(&result.profile, &result.wedges, filename)
            .map_err(|e| anyhow::anyhow!("failed to plot I(Q): {e}"))?;
    }

    Ok(())
}
