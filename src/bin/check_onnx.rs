// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// ONNX 模型自检: 打印输入输出节点, 用随机张量跑一次推理
///
/// cargo run --bin check_onnx -- --model data/models/yolov8n_640.onnx
use anyhow::Result;
use clap::Parser;
use ndarray::Array;
use rand::{distributions::Uniform, rngs::StdRng, Rng, SeedableRng};
use tracing::info;

use person_finetune::config::CheckOnnxArgs;
use person_finetune::{init_tracing, OrtBackend, OrtConfig, OrtEP};

fn main() -> Result<()> {
    init_tracing();
    let args = CheckOnnxArgs::parse();

    let mut engine = OrtBackend::build(OrtConfig {
        f: args.model.clone(),
        ep: if args.cuda { OrtEP::CUDA(0) } else { OrtEP::CPU },
        image_size: args.imgsz,
        intra_threads: 4,
    })?;

    info!("============ ONNX Model Info ============");
    for node in engine.inputs() {
        info!("input  {}: {}", node.name, node.value_type);
    }
    for node in engine.outputs() {
        info!("output {}: {}", node.name, node.value_type);
    }

    let s = args.imgsz as usize;
    let mut rng = StdRng::seed_from_u64(args.seed);
    let dist = Uniform::new(-1.0f32, 1.0);
    let xs = Array::from_shape_simple_fn((1, 3, s, s), || rng.sample(dist)).into_dyn();

    let ys = engine.run(xs, true)?;
    for (i, y) in ys.iter().enumerate() {
        info!("output[{}] shape: {:?}", i, y.shape());
    }
    info!("✅ Inference successful! Model is usable.");
    Ok(())
}
