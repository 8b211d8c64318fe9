// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 命令行参数与可调参数
//!
//! 每个可执行文件一个 `Args`; 合成框参数可以通过 JSON 文件覆盖。

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Scheme B 合成框参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthConfig {
    /// 外接矩形每边向内收缩的比例
    pub shrink: f32,
    /// 与检测框 IoU 达到该值即认为座位已被检测覆盖
    pub suppress_iou: f32,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            shrink: 0.05,
            suppress_iou: 0.05,
        }
    }
}

impl SynthConfig {
    /// 从JSON文件加载配置; 文件不存在用默认值, 解析失败告警后用默认值
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(config) => {
                    info!("✅ 合成框参数已从 {} 加载", path.display());
                    config
                }
                Err(e) => {
                    warn!("⚠️  合成框参数解析失败: {}, 使用默认值", e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("📝 {} 不存在, 使用默认合成框参数", path.display());
                Self::default()
            }
        }
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("failed to save {}", path.display()))
    }
}

/// 检测器参数 (ONNX Runtime YOLOv8)
#[derive(Clone, Debug)]
pub struct DetectorConfig {
    pub model: String,
    pub imgsz: u32,
    pub conf: f32,
    pub iou: f32,
    pub cuda: bool,
    pub device_id: i32,
    pub intra_threads: usize,
    pub profile: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model: "yolov8n.onnx".to_string(),
            imgsz: 640,
            conf: 0.25,
            iou: 0.45,
            cuda: false,
            device_id: 0,
            intra_threads: 4,
            profile: false,
        }
    }
}

/// 伪标签生成参数
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "为无人工标注的帧生成 person 伪标签 (检测 + 座位占用合成框)", long_about = None)]
pub struct PseudoLabelArgs {
    /// fine_tuning 根目录
    #[arg(long)]
    pub root: PathBuf,

    /// 原始帧目录
    #[arg(long)]
    pub frames_dir: PathBuf,

    /// ONNX 检测模型
    #[arg(long, default_value = "yolov8n.onnx")]
    pub model: String,

    /// 检测置信度阈值
    #[arg(long, default_value_t = 0.25)]
    pub conf: f32,

    /// NMS IoU 阈值
    #[arg(long, default_value_t = 0.45)]
    pub iou: f32,

    /// 推理输入尺寸
    #[arg(long, default_value_t = 640)]
    pub imgsz: u32,

    /// 座位状态 JSON 目录 (可选, 文件名 <stem>.json)
    #[arg(long)]
    pub seat_json_dir: Option<PathBuf>,

    /// 合成框参数 JSON (可选)
    #[arg(long)]
    pub synth_config: Option<PathBuf>,

    /// 最多写出的图片数, 0 表示不限 (调试用)
    #[arg(long, default_value_t = 0)]
    pub max_images: usize,

    /// 使用 CUDA
    #[arg(long)]
    pub cuda: bool,

    /// CUDA 设备号
    #[arg(long, default_value_t = 0)]
    pub device_id: i32,

    /// 打印各阶段耗时
    #[arg(long)]
    pub profile: bool,
}

impl PseudoLabelArgs {
    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            model: self.model.clone(),
            imgsz: self.imgsz,
            conf: self.conf,
            iou: self.iou,
            cuda: self.cuda,
            device_id: self.device_id,
            profile: self.profile,
            ..Default::default()
        }
    }

    pub fn synth_config(&self) -> SynthConfig {
        self.synth_config
            .as_deref()
            .map(SynthConfig::load)
            .unwrap_or_default()
    }
}

/// 分层抽帧参数
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "分层抽取原始帧供人工标注", long_about = None)]
pub struct SelectFramesArgs {
    /// 原始帧目录 (f_XXXXXX.jpg)
    #[arg(long)]
    pub frames_dir: PathBuf,

    /// 输出目录
    #[arg(long)]
    pub out_dir: PathBuf,

    /// 抽取数量
    #[arg(long, default_value_t = 60)]
    pub count: usize,

    /// 随机种子
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

/// 训练参数
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "人工 + 伪标签数据微调单类 person 检测器并导出ONNX", long_about = None)]
pub struct TrainArgs {
    /// fine_tuning 根目录
    #[arg(long)]
    pub root: PathBuf,

    /// 基础权重
    #[arg(long, default_value = "yolov8n.pt")]
    pub model: String,

    #[arg(long, default_value_t = 8)]
    pub epochs: u32,

    #[arg(long, default_value_t = 640)]
    pub imgsz: u32,

    #[arg(long, default_value_t = 16)]
    pub batch: u32,

    /// 验证集比例
    #[arg(long, default_value_t = 0.2)]
    pub val_ratio: f64,

    /// 划分随机种子
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// 导出的ONNX目标路径 (如 person01.onnx)
    #[arg(long)]
    pub onnx_out: PathBuf,

    #[arg(long, default_value = "cpu")]
    pub device: String,

    /// 训练日志目录
    #[arg(long, default_value = "logs/fine-tuning")]
    pub logs_dir: PathBuf,

    /// 外部训练器可执行文件
    #[arg(long, default_value = "yolo")]
    pub trainer_bin: String,

    /// 只划分数据集, 不训练
    #[arg(long)]
    pub prepare_only: bool,
}

/// ONNX 自检参数
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "加载ONNX模型并用随机输入跑一次推理", long_about = None)]
pub struct CheckOnnxArgs {
    /// ONNX 模型路径
    #[arg(long, default_value = "data/models/yolov8n_640.onnx")]
    pub model: String,

    #[arg(long, default_value_t = 640)]
    pub imgsz: u32,

    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    #[arg(long)]
    pub cuda: bool,
}
