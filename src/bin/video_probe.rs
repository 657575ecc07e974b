//! video_probe - print the metadata an evidence package would record

use anyhow::Result;
use clap::Parser;

use evidence_scanner::VideoMetadata;

#[derive(Parser, Debug)]
#[command(name = "video_probe", about = "Print video metadata")]
struct Args {
    /// Video file (or a stub:// synthetic source)
    #[arg(value_name = "VIDEO")]
    video: String,

    /// Emit JSON instead of key: value lines
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let metadata = VideoMetadata::probe(&args.video)?;
    if args.json {
        let pairs: Vec<serde_json::Value> = metadata
            .pairs()
            .iter()
            .map(|(key, value)| serde_json::json!({ "key": key, "value": value }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&pairs)?);
    } else {
        for (key, value) in metadata.pairs() {
            println!("{}: {}", key, value);
        }
    }
    Ok(())
}
