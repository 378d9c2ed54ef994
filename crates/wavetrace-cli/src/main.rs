use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow};
use wavetrace_engine::device::{AdapterPreference, ComputeInit};
use wavetrace_engine::logging::{LoggingConfig, init_logging};
use wavetrace_engine::render::{RenderSettings, RenderingContext};

const USAGE: &str = "usage: wavetrace <scene-file>";

/// Options taken from the environment.
#[derive(Debug, Clone, PartialEq)]
struct Options {
    adapter: AdapterPreference,
    output: PathBuf,
}

impl Options {
    fn from_env() -> Result<Self> {
        Self::parse(
            std::env::var("WAVETRACE_ADAPTER").ok().as_deref(),
            std::env::var_os("WAVETRACE_OUTPUT").map(PathBuf::from),
        )
    }

    fn parse(adapter: Option<&str>, output: Option<PathBuf>) -> Result<Self> {
        let adapter = match adapter {
            Some(name) => AdapterPreference::from_name(name).ok_or_else(|| {
                anyhow!(
                    "WAVETRACE_ADAPTER must be high-performance, low-power or fallback, got '{}'",
                    name
                )
            })?,
            None => AdapterPreference::default(),
        };
        let output = output.unwrap_or_else(|| PathBuf::from("output.png"));
        Ok(Self { adapter, output })
    }
}

fn run(scene_path: &str) -> Result<()> {
    let options = Options::from_env()?;

    let scene = wavetrace_scene::load(scene_path)?;
    log::info!(
        "loaded {}: {}x{}, {} spheres, {} materials",
        scene_path,
        scene.image_width,
        scene.image_height,
        scene.spheres.len(),
        scene.materials.len()
    );

    let init = ComputeInit { adapter: options.adapter, ..ComputeInit::default() };
    let renderer = RenderingContext::new(init, RenderSettings::default())
        .context("failed to set up the compute device")?;
    renderer
        .render(&scene, &options.output)
        .with_context(|| format!("failed to render {}", scene_path))?;
    Ok(())
}

fn main() -> ExitCode {
    init_logging(LoggingConfig::default());

    let args: Vec<String> = std::env::args().collect();
    let [_, scene_path] = args.as_slice() else {
        eprintln!("{}", USAGE);
        return ExitCode::FAILURE;
    };

    match run(scene_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
