// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 伪标签生成: YOLOv8 person 检测 + 座位占用合成框
///
/// cargo run --bin pseudo_label --release -- --root fine_tuning --frames-dir data/frames
use anyhow::Result;
use clap::Parser;
use tracing::info;

use person_finetune::config::PseudoLabelArgs;
use person_finetune::dataset::DatasetLayout;
use person_finetune::init_tracing;
use person_finetune::pseudo::PseudoLabeler;
use person_finetune::seats::{SeatJsonDir, Synthesizer};
use person_finetune::YoloPersonDetector;

fn main() -> Result<()> {
    init_tracing();
    let args = PseudoLabelArgs::parse();

    let detector = YoloPersonDetector::new(&args.detector_config())?;
    let mut labeler = PseudoLabeler::new(detector, DatasetLayout::new(&args.root), args.conf)
        .with_synthesizer(Synthesizer::new(args.synth_config()))
        .with_max_images(args.max_images);
    if let Some(dir) = &args.seat_json_dir {
        info!("🪑 座位状态目录: {}", dir.display());
        labeler = labeler.with_seat_source(SeatJsonDir::new(dir));
    }

    let summary = labeler.run(&args.frames_dir)?;
    info!(
        "✅ {} 张伪标签图片, 检测框 {}, 合成框 {}, 平均推理 {:.1} ms",
        summary.images_written,
        summary.det_boxes_total,
        summary.synth_boxes_total,
        labeler.detector().mean_ms()
    );
    Ok(())
}
