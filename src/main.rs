use anyhow::{Context, bail};

use mapcanvas::viewer::{ViewerBuilder, ViewerConfig};

const USAGE: &str = "usage: mapcanvas [--map <file.json>] [--sprites <dir>] [--config <file.json>]";

#[derive(Default)]
struct Args {
    map: Option<String>,
    sprites: Option<String>,
    config: Option<String>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        let slot = match arg.as_str() {
            "--map" => &mut args.map,
            "--sprites" => &mut args.sprites,
            "--config" => &mut args.config,
            "-h" | "--help" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            other => bail!("unknown argument '{other}'\n{USAGE}"),
        };
        *slot = Some(it.next().with_context(|| format!("{arg} needs a value\n{USAGE}"))?);
    }
    Ok(args)
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = parse_args()?;

    let config = match &args.config {
        Some(path) => ViewerConfig::load(path).with_context(|| format!("failed to read config {path}"))?,
        None => ViewerConfig::default(),
    };

    let mut viewer = ViewerBuilder::default().with_config(config);
    if let Some(dir) = &args.sprites {
        viewer = viewer.with_sprite_folder(dir);
    }
    if let Some(map) = args.map {
        viewer = viewer.with_map(map);
    }
    viewer.run()
}
