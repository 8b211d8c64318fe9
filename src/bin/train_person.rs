// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 用人工 + 伪标签数据微调单类 person 检测器, 并导出 ONNX
///
/// cargo run --bin train_person -- --root fine_tuning --onnx-out data/models/person01.onnx
use anyhow::Result;
use clap::Parser;
use tracing::info;

use person_finetune::config::TrainArgs;
use person_finetune::dataset::{assemble, DatasetLayout};
use person_finetune::init_tracing;
use person_finetune::trainer::{run_training, UltralyticsCli};

fn main() -> Result<()> {
    init_tracing();
    let args = TrainArgs::parse();

    if args.prepare_only {
        let dataset = assemble(&DatasetLayout::new(&args.root), args.val_ratio, args.seed)?;
        info!(
            "数据集已准备: train {} / val {}, {}",
            dataset.train.copied,
            dataset.val.copied,
            dataset.data_yaml.display()
        );
        return Ok(());
    }

    let mut trainer = UltralyticsCli::new(&args.trainer_bin, args.logs_dir.join("runs"));
    run_training(&mut trainer, &args)?;
    Ok(())
}
