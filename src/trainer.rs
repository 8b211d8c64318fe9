// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 外部训练器驱动
//!
//! 训练本身交给 Ultralytics 的 `yolo` 命令行; 这里负责拼参数、读回指标、
//! 拷贝导出的 ONNX 并写运行日志。

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::config::TrainArgs;
use crate::dataset::{assemble, DatasetLayout};
use crate::utils::list_files;

/// 一次训练请求
#[derive(Debug, Clone, PartialEq)]
pub struct TrainRequest {
    pub data_yaml: PathBuf,
    pub base_model: String,
    pub epochs: u32,
    pub imgsz: u32,
    pub batch: u32,
    pub device: String,
}

impl TrainRequest {
    pub fn from_args(args: &TrainArgs, data_yaml: PathBuf) -> Self {
        Self {
            data_yaml,
            base_model: args.model.clone(),
            epochs: args.epochs,
            imgsz: args.imgsz,
            batch: args.batch,
            device: args.device.clone(),
        }
    }
}

/// 训练结果: 训练器报告的指标 + 导出的 ONNX (如果有)
#[derive(Debug, Clone, Default)]
pub struct TrainOutcome {
    pub metrics: Map<String, Value>,
    pub exported_onnx: Option<PathBuf>,
}

pub trait Trainer {
    /// 训练并导出 ONNX; 训练器失败即返回错误
    fn train(&mut self, request: &TrainRequest) -> Result<TrainOutcome>;
}

/// 调用 `yolo` 可执行文件
#[derive(Debug, Clone)]
pub struct UltralyticsCli {
    bin: String,
    project: PathBuf,
    name: String,
}

impl UltralyticsCli {
    pub fn new(bin: impl Into<String>, project: impl Into<PathBuf>) -> Self {
        Self {
            bin: bin.into(),
            project: project.into(),
            name: "person".to_string(),
        }
    }

    /// `<project>/<name>`, 训练产物所在目录
    pub fn run_dir(&self) -> PathBuf {
        self.project.join(&self.name)
    }

    pub fn train_args(&self, request: &TrainRequest) -> Vec<String> {
        vec![
            "detect".to_string(),
            "train".to_string(),
            format!("data={}", request.data_yaml.display()),
            format!("model={}", request.base_model),
            format!("epochs={}", request.epochs),
            format!("imgsz={}", request.imgsz),
            format!("batch={}", request.batch),
            format!("device={}", request.device),
            "optimizer=SGD".to_string(),
            "verbose=True".to_string(),
            format!("project={}", self.project.display()),
            format!("name={}", self.name),
            "exist_ok=True".to_string(),
        ]
    }

    pub fn export_args(&self, weights: &Path, imgsz: u32) -> Vec<String> {
        vec![
            "export".to_string(),
            format!("model={}", weights.display()),
            "format=onnx".to_string(),
            format!("imgsz={imgsz}"),
            "simplify=True".to_string(),
        ]
    }

    fn invoke(&self, args: &[String]) -> Result<()> {
        info!("🚀 {} {}", self.bin, args.join(" "));
        let status = Command::new(&self.bin)
            .args(args)
            .status()
            .with_context(|| format!("failed to launch trainer `{}`", self.bin))?;
        if !status.success() {
            bail!("`{} {}` exited with {}", self.bin, args[0], status);
        }
        Ok(())
    }

    fn trained_weights(&self) -> Result<PathBuf> {
        let weights = self.run_dir().join("weights");
        ["best.pt", "last.pt"]
            .iter()
            .map(|f| weights.join(f))
            .find(|p| p.is_file())
            .with_context(|| format!("no trained weights under {}", weights.display()))
    }
}

impl Trainer for UltralyticsCli {
    fn train(&mut self, request: &TrainRequest) -> Result<TrainOutcome> {
        self.invoke(&self.train_args(request))?;
        let metrics = read_results_csv(&self.run_dir().join("results.csv"))?;

        let weights = self.trained_weights()?;
        self.invoke(&self.export_args(&weights, request.imgsz))?;
        let exported_onnx = match weights.parent() {
            Some(dir) => list_files(dir, &["onnx"])?.into_iter().next(),
            None => None,
        };

        Ok(TrainOutcome {
            metrics,
            exported_onnx,
        })
    }
}

/// Ultralytics 列名 → 摘要里的指标名
fn metric_key(column: &str) -> Option<&'static str> {
    match column {
        "epoch" => Some("epoch"),
        "metrics/precision(B)" => Some("precision"),
        "metrics/recall(B)" => Some("recall"),
        "metrics/mAP50(B)" => Some("map50"),
        "metrics/mAP50-95(B)" => Some("map"),
        "fitness" => Some("fitness"),
        _ => None,
    }
}

/// 读取 `results.csv` 最后一行; 文件不存在时返回空指标
pub fn read_results_csv(path: &Path) -> Result<Map<String, Value>> {
    let mut metrics = Map::new();
    if !path.is_file() {
        warn!("{} not found, no trainer metrics", path.display());
        return Ok(metrics);
    }

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let headers = reader.headers()?.clone();

    let mut last = None;
    for (row_idx, record) in reader.records().enumerate() {
        last = Some(record.with_context(|| format!("failed to parse row {} of {}", row_idx + 1, path.display()))?);
    }
    let Some(last) = last else {
        return Ok(metrics);
    };

    for (column, value) in headers.iter().zip(last.iter()) {
        let (Some(key), Ok(v)) = (metric_key(column), value.parse::<f64>()) else {
            continue;
        };
        metrics.insert(key.to_string(), json!(v));
    }

    let p = metrics.get("precision").and_then(Value::as_f64);
    let r = metrics.get("recall").and_then(Value::as_f64);
    if let (Some(p), Some(r)) = (p, r) {
        if p + r > 0.0 {
            metrics.insert("f1".to_string(), json!(2.0 * p * r / (p + r)));
        }
    }
    Ok(metrics)
}

/// `run_summary.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainSummary {
    pub time_elapsed_s: f64,
    pub onnx_exported_from: Option<String>,
    pub onnx_target: String,
    pub metrics: Map<String, Value>,
}

fn write_json(path: &Path, value: &impl Serialize) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

/// 划分数据集 → 训练 → 写日志 → 拷贝 ONNX
pub fn run_training(trainer: &mut impl Trainer, args: &TrainArgs) -> Result<TrainSummary> {
    let start = Instant::now();
    fs::create_dir_all(&args.logs_dir)
        .with_context(|| format!("failed to create {}", args.logs_dir.display()))?;

    let layout = DatasetLayout::new(&args.root);
    let dataset = assemble(&layout, args.val_ratio, args.seed)?;

    let request = TrainRequest::from_args(args, dataset.data_yaml.clone());
    let outcome = trainer.train(&request)?;

    let mut metrics = Map::new();
    metrics.insert("train_images".into(), json!(dataset.plan.train.len()));
    metrics.insert("val_images".into(), json!(dataset.plan.val.len()));
    metrics.insert("epochs".into(), json!(args.epochs));
    metrics.insert("imgsz".into(), json!(args.imgsz));
    metrics.insert("batch".into(), json!(args.batch));
    metrics.insert("device".into(), json!(args.device));
    metrics.extend(outcome.metrics);
    write_json(&args.logs_dir.join("train_metrics.json"), &metrics)?;

    if let Some(parent) = args.onnx_out.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    let onnx_exported_from = match &outcome.exported_onnx {
        Some(src) => {
            fs::copy(src, &args.onnx_out).with_context(|| {
                format!("failed to copy {} to {}", src.display(), args.onnx_out.display())
            })?;
            info!("✅ ONNX 已导出: {}", args.onnx_out.display());
            Some(src.display().to_string())
        }
        None => {
            warn!("⚠️  训练器没有导出 ONNX");
            None
        }
    };

    let elapsed = start.elapsed().as_secs_f64();
    let summary = TrainSummary {
        time_elapsed_s: (elapsed * 100.0).round() / 100.0,
        onnx_exported_from,
        onnx_target: args.onnx_out.display().to_string(),
        metrics,
    };
    write_json(&args.logs_dir.join("run_summary.json"), &summary)?;
    info!("Run summary: {:?}", summary);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_results_csv_last_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        fs::write(
            &path,
            "                  epoch,      train/box_loss,   metrics/precision(B),      metrics/recall(B),       metrics/mAP50(B),    metrics/mAP50-95(B)\n\
             1, 1.2, 0.5, 0.5, 0.6, 0.3\n\
             2, 1.1, 0.8, 0.6, 0.7, 0.4\n",
        )
        .unwrap();

        let m = read_results_csv(&path).unwrap();
        assert_eq!(m["epoch"], json!(2.0));
        assert_eq!(m["precision"], json!(0.8));
        assert_eq!(m["map50"], json!(0.7));
        assert_eq!(m["map"], json!(0.4));
        assert!(!m.contains_key("train/box_loss"));
        let f1 = m["f1"].as_f64().unwrap();
        assert!((f1 - 0.96 / 1.4).abs() < 1e-9);
    }

    #[test]
    fn test_results_csv_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_results_csv(&dir.path().join("results.csv")).unwrap().is_empty());
    }

    #[test]
    fn test_cli_args() {
        let cli = UltralyticsCli::new("yolo", "runs");
        let req = TrainRequest {
            data_yaml: PathBuf::from("data_person.yaml"),
            base_model: "yolov8n.pt".into(),
            epochs: 8,
            imgsz: 640,
            batch: 16,
            device: "cpu".into(),
        };
        let args = cli.train_args(&req);
        assert_eq!(&args[..2], ["detect", "train"]);
        assert!(args.contains(&"optimizer=SGD".to_string()));
        assert!(args.contains(&"epochs=8".to_string()));

        let export = cli.export_args(Path::new("runs/person/weights/best.pt"), 640);
        assert_eq!(export[0], "export");
        assert!(export.contains(&"format=onnx".to_string()));
        assert!(export.contains(&"simplify=True".to_string()));
    }

    struct StubTrainer {
        onnx: Option<PathBuf>,
        seen: Option<TrainRequest>,
    }

    impl Trainer for StubTrainer {
        fn train(&mut self, request: &TrainRequest) -> Result<TrainOutcome> {
            self.seen = Some(request.clone());
            let mut metrics = Map::new();
            metrics.insert("map50".into(), json!(0.5));
            Ok(TrainOutcome {
                metrics,
                exported_onnx: self.onnx.clone(),
            })
        }
    }

    #[test]
    fn test_run_training_writes_logs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("fine_tuning");
        let layout = DatasetLayout::new(&root);
        fs::create_dir_all(layout.images_manual()).unwrap();
        fs::create_dir_all(layout.labels_manual()).unwrap();
        for i in 0..5 {
            fs::write(layout.images_manual().join(format!("m{i}.jpg")), b"x").unwrap();
            fs::write(layout.labels_manual().join(format!("m{i}.txt")), "0 0.5 0.5 0.1 0.1").unwrap();
        }
        let exported = dir.path().join("best.onnx");
        fs::write(&exported, b"onnx").unwrap();

        let logs = dir.path().join("logs");
        let onnx_out = dir.path().join("models").join("person01.onnx");
        let args = TrainArgs::parse_from([
            "train_person",
            "--root",
            root.to_str().unwrap(),
            "--onnx-out",
            onnx_out.to_str().unwrap(),
            "--logs-dir",
            logs.to_str().unwrap(),
        ]);

        let mut trainer = StubTrainer {
            onnx: Some(exported.clone()),
            seen: None,
        };
        let summary = run_training(&mut trainer, &args).unwrap();

        assert_eq!(fs::read(&onnx_out).unwrap(), b"onnx");
        assert_eq!(summary.metrics["train_images"], json!(4));
        assert_eq!(summary.metrics["val_images"], json!(1));
        assert_eq!(summary.metrics["map50"], json!(0.5));
        assert_eq!(summary.onnx_exported_from, Some(exported.display().to_string()));
        assert_eq!(trainer.seen.unwrap().epochs, 8);

        let written: Value =
            serde_json::from_str(&fs::read_to_string(logs.join("run_summary.json")).unwrap()).unwrap();
        assert!(written["time_elapsed_s"].is_number());
        assert!(logs.join("train_metrics.json").is_file());
    }

    #[test]
    fn test_run_training_without_export() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("ft");
        let layout = DatasetLayout::new(&root);
        fs::create_dir_all(layout.images_manual()).unwrap();
        fs::write(layout.images_manual().join("a.jpg"), b"x").unwrap();

        let onnx_out = dir.path().join("out.onnx");
        let args = TrainArgs::parse_from([
            "train_person",
            "--root",
            root.to_str().unwrap(),
            "--onnx-out",
            onnx_out.to_str().unwrap(),
            "--logs-dir",
            dir.path().join("logs").to_str().unwrap(),
        ]);
        let mut trainer = StubTrainer { onnx: None, seen: None };
        let summary = run_training(&mut trainer, &args).unwrap();
        assert!(summary.onnx_exported_from.is_none());
        assert!(!onnx_out.exists());
    }
}
