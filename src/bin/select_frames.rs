// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 分层抽帧: 从原始帧里均匀挑出一批供人工标注
///
/// cargo run --bin select_frames -- --frames-dir data/frames --out-dir fine_tuning/manual_subset
use anyhow::Result;
use clap::Parser;
use person_finetune::config::SelectFramesArgs;
use person_finetune::init_tracing;
use person_finetune::sampler::run_selection;

fn main() -> Result<()> {
    init_tracing();
    let args = SelectFramesArgs::parse();
    run_selection(&args.frames_dir, &args.out_dir, args.count, args.seed)?;
    Ok(())
}
