use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use instance_sampler::{InstanceSampler, ManifestLoader};
use instance_sampler_tools::{DistributionRecord, SampleLine, ToolConfig};
use log::info;

#[derive(Parser, Debug)]
#[command(
    name = "sample_frames",
    about = "Draw contextual training/inference samples from an annotated corpus"
)]
struct Args {
    /// Corpus manifest (JSON); defaults to the tools config value.
    #[arg(long)]
    manifest: Option<PathBuf>,
    /// Number of training samples to emit.
    #[arg(long, default_value_t = 10)]
    count: usize,
    /// RNG seed for reproducible output.
    #[arg(long)]
    seed: Option<u64>,
    /// Draw candidate boxes uniformly instead of from the corpus distribution.
    #[arg(long, default_value_t = false)]
    random_box: bool,
    /// Negative/positive balance (1.0 = one class worth of negatives).
    #[arg(long)]
    neg_bias: Option<f64>,
    /// Frames generated per candidate box in inference samples.
    #[arg(long)]
    neighborhoods: Option<usize>,
    /// Emit one inference sample for this image instead of training samples.
    #[arg(long)]
    test_image: Option<String>,
    /// Frames in the inference sample.
    #[arg(long)]
    candidates: Option<usize>,
    /// Print the scale/aspect histogram and exit.
    #[arg(long, default_value_t = false)]
    distribution: bool,
    /// Output file; stdout when omitted.
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let tool_cfg = ToolConfig::load();

    let mut cfg = tool_cfg.sampler.clone();
    cfg.random_box |= args.random_box;
    if let Some(seed) = args.seed {
        cfg.seed = Some(seed);
    }
    if let Some(neg_bias) = args.neg_bias {
        cfg.neg_bias = neg_bias;
    }
    if let Some(n) = args.neighborhoods {
        cfg.n_neighborhoods = n;
    }
    // the histogram is only kept by the distribution drawer
    if args.distribution {
        cfg.random_box = false;
    }

    let manifest = args.manifest.unwrap_or(tool_cfg.manifest);
    let loader = ManifestLoader::load(&manifest)
        .with_context(|| format!("load manifest {}", manifest.display()))?;
    let mut sampler = InstanceSampler::new(loader, cfg).context("build sampler")?;

    let output = args.output.or(tool_cfg.output);
    let mut out: Box<dyn Write> = match &output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    if args.distribution {
        let record = DistributionRecord::from(sampler.distribution()?);
        serde_json::to_writer(&mut out, &record)?;
        writeln!(out)?;
        out.flush()?;
        return Ok(());
    }

    if let Some(name) = args.test_image.as_deref() {
        let candidates = args.candidates.unwrap_or(tool_cfg.test_candidates);
        let sample = sampler
            .get_test_sample(name, candidates)
            .with_context(|| format!("test sample for {name}"))?;
        info!("{name}: {} frames", sample.len());
        serde_json::to_writer(&mut out, &SampleLine::Test(sample.descriptor()))?;
        writeln!(out)?;
        out.flush()?;
        return Ok(());
    }

    let mut negatives = 0usize;
    for i in 0..args.count {
        let sample = sampler
            .get_sample(None)
            .with_context(|| format!("training sample {i}"))?;
        if sample.label == instance_sampler::NEGATIVE_LABEL {
            negatives += 1;
        }
        serde_json::to_writer(&mut out, &SampleLine::Train(sample.descriptor()))?;
        writeln!(out)?;
    }
    out.flush()?;
    info!(
        "wrote {} samples ({negatives} negatives){}",
        args.count,
        output
            .map(|p| format!(" to {}", p.display()))
            .unwrap_or_default()
    );
    Ok(())
}
