// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! ONNX Runtime 推理后端
//!
//! 只负责会话构建与张量进出, 模型相关的预处理/后处理在 `models` 里。

use anyhow::{Context, Result};
use ndarray::{Array, IxDyn};
use ort::{
    execution_providers::CUDAExecutionProvider,
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};
use tracing::{debug, info};

/// 执行设备
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrtEP {
    CPU,
    CUDA(i32),
}

#[derive(Debug, Clone)]
pub struct OrtConfig {
    pub f: String,
    pub ep: OrtEP,
    /// 方形输入边长
    pub image_size: u32,
    pub intra_threads: usize,
}

/// 输入/输出节点描述 (name, type)
#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub name: String,
    pub value_type: String,
}

pub struct OrtBackend {
    session: Session,
    input_name: String,
    output_names: Vec<String>,
    image_size: u32,
    ep: OrtEP,
}

impl OrtBackend {
    pub fn build(config: OrtConfig) -> Result<Self> {
        info!("Loading ONNX model: {}", config.f);

        let mut builder = Session::builder()?;
        if let OrtEP::CUDA(device_id) = config.ep {
            info!("Enabling CUDA execution provider (device {})", device_id);
            builder = builder.with_execution_providers([CUDAExecutionProvider::default()
                .with_device_id(device_id)
                .build()])?;
        }
        let session = builder
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(config.intra_threads)?
            .commit_from_file(&config.f)
            .with_context(|| format!("Failed to load model {}", config.f))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .context("model has no inputs")?;
        let output_names = session.outputs.iter().map(|o| o.name.clone()).collect();

        info!("✓ ONNX session ready");
        Ok(Self {
            session,
            input_name,
            output_names,
            image_size: config.image_size,
            ep: config.ep,
        })
    }

    pub fn height(&self) -> u32 {
        self.image_size
    }

    pub fn width(&self) -> u32 {
        self.image_size
    }

    pub fn ep(&self) -> OrtEP {
        self.ep
    }

    pub fn inputs(&self) -> Vec<NodeInfo> {
        self.session
            .inputs
            .iter()
            .map(|i| NodeInfo {
                name: i.name.clone(),
                value_type: format!("{:?}", i.input_type),
            })
            .collect()
    }

    pub fn outputs(&self) -> Vec<NodeInfo> {
        self.session
            .outputs
            .iter()
            .map(|o| NodeInfo {
                name: o.name.clone(),
                value_type: format!("{:?}", o.output_type),
            })
            .collect()
    }

    /// NCHW 张量进, 全部输出按声明顺序出
    pub fn run(&mut self, xs: Array<f32, IxDyn>, profile: bool) -> Result<Vec<Array<f32, IxDyn>>> {
        let t = std::time::Instant::now();

        let shape: Vec<usize> = xs.shape().to_vec();
        let data: Vec<f32> = xs.iter().copied().collect();
        let input = Tensor::from_array((shape.as_slice(), data.into_boxed_slice()))?;

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input])?;

        let mut ys = Vec::with_capacity(self.output_names.len());
        for name in &self.output_names {
            let (dims, data) = outputs[name.as_str()].try_extract_tensor::<f32>()?;
            let dims: Vec<usize> = dims.iter().map(|&d| d as usize).collect();
            ys.push(Array::from_shape_vec(IxDyn(&dims), data.to_vec())?);
        }

        if profile {
            debug!("[ORT Inference]: {:?}", t.elapsed());
        }
        Ok(ys)
    }
}
