// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 数据集目录约定与训练/验证划分
//!
//! ```text
//! <root>/images_manual   <root>/labels_manual    人工标注
//! <root>/images_pseudo   <root>/labels_pseudo    伪标签
//! <root>/images/{train,val}  <root>/labels/{train,val}  训练器输入
//! ```
//!
//! 伪标签图片只进训练集, 验证集只含人工标注。

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use tracing::{info, warn};

use crate::error::DatasetError;
use crate::labels::CLASS_NAMES;
use crate::utils::{copy_into, file_stem, list_files, DATASET_EXTENSIONS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Val,
}

impl Split {
    pub fn dir_name(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
        }
    }
}

/// fine_tuning 根目录下的固定布局
#[derive(Debug, Clone)]
pub struct DatasetLayout {
    root: PathBuf,
}

impl DatasetLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn images_manual(&self) -> PathBuf {
        self.root.join("images_manual")
    }

    pub fn labels_manual(&self) -> PathBuf {
        self.root.join("labels_manual")
    }

    pub fn images_pseudo(&self) -> PathBuf {
        self.root.join("images_pseudo")
    }

    pub fn labels_pseudo(&self) -> PathBuf {
        self.root.join("labels_pseudo")
    }

    pub fn images(&self, split: Split) -> PathBuf {
        self.root.join("images").join(split.dir_name())
    }

    pub fn labels(&self, split: Split) -> PathBuf {
        self.root.join("labels").join(split.dir_name())
    }

    pub fn pseudo_summary(&self) -> PathBuf {
        self.root.join("pseudo_summary.json")
    }

    pub fn data_yaml(&self) -> PathBuf {
        self.root.join("data_person.yaml")
    }

    /// 各划分的标签来源, 按优先级排列 (人工优先)
    pub fn label_resolver(&self, split: Split) -> LabelResolver {
        let mut resolver = LabelResolver::new().with(LabelDir::new(self.labels_manual()));
        if split == Split::Train {
            resolver = resolver.with(LabelDir::new(self.labels_pseudo()));
        }
        resolver
    }
}

/// 按 stem 查找标签文件
pub trait LabelProvider {
    fn find(&self, stem: &str) -> Option<PathBuf>;
}

/// 目录下的 `<stem>.txt`
#[derive(Debug, Clone)]
pub struct LabelDir {
    dir: PathBuf,
}

impl LabelDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl LabelProvider for LabelDir {
    fn find(&self, stem: &str) -> Option<PathBuf> {
        let cand = self.dir.join(format!("{stem}.txt"));
        cand.is_file().then_some(cand)
    }
}

/// 有序的标签来源列表, 第一个命中的生效
#[derive(Default)]
pub struct LabelResolver {
    providers: Vec<Box<dyn LabelProvider>>,
}

impl LabelResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: impl LabelProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    pub fn resolve(&self, stem: &str) -> Option<PathBuf> {
        self.providers.iter().find_map(|p| p.find(stem))
    }
}

/// 划分结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplitPlan {
    pub train: Vec<PathBuf>,
    pub val: Vec<PathBuf>,
    /// 其中来自伪标签的训练图片数
    pub pseudo_in_train: usize,
}

/// 验证集数量: `max(1, floor(r * count))`
pub fn val_count(count: usize, val_ratio: f64) -> usize {
    ((count as f64 * val_ratio).floor() as usize).max(1)
}

/// 打乱人工图片并按比例切出验证集, 伪标签图片全部追加到训练集
///
/// 与任一人工图片 stem 相同的伪标签图片会被丢弃, 伪标签之间同 stem 只保留第一张。
pub fn plan_split(
    mut manual: Vec<PathBuf>,
    pseudo: Vec<PathBuf>,
    val_ratio: f64,
    rng: &mut StdRng,
) -> Result<SplitPlan, DatasetError> {
    if !(val_ratio > 0.0 && val_ratio < 1.0) {
        return Err(DatasetError::InvalidRatio(val_ratio));
    }
    manual.shuffle(rng);

    let n_val = val_count(manual.len(), val_ratio).min(manual.len());
    let train_manual = manual.split_off(n_val);
    let val = manual;

    // 目标目录按文件名落盘, 同 stem 会互相覆盖
    let mut taken: HashSet<String> = val
        .iter()
        .chain(&train_manual)
        .filter_map(|p| file_stem(p))
        .collect();
    let mut train = train_manual;
    let mut pseudo_in_train = 0;
    for p in pseudo {
        if file_stem(&p).is_some_and(|s| !taken.insert(s)) {
            warn!("pseudo image {} shares a stem with another image, skipped", p.display());
            continue;
        }
        train.push(p);
        pseudo_in_train += 1;
    }

    Ok(SplitPlan {
        train,
        val,
        pseudo_in_train,
    })
}

/// 扫描目录并划分; 没有人工图片时中止
pub fn prepare_split(layout: &DatasetLayout, val_ratio: f64, seed: u64) -> Result<SplitPlan> {
    let manual = list_files(&layout.images_manual(), &DATASET_EXTENSIONS)?;
    if manual.is_empty() {
        return Err(DatasetError::NoManualImages(layout.images_manual()).into());
    }
    let pseudo = list_files(&layout.images_pseudo(), &DATASET_EXTENSIONS)?;

    let mut rng = StdRng::seed_from_u64(seed);
    let plan = plan_split(manual, pseudo, val_ratio, &mut rng)?;
    info!(
        "split: {} train ({} pseudo), {} val",
        plan.train.len(),
        plan.pseudo_in_train,
        plan.val.len()
    );
    Ok(plan)
}

/// 复制统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyReport {
    pub copied: usize,
    pub labeled: usize,
    pub unlabeled: usize,
}

/// 复制图片, 并按优先级复制找到的第一个标签文件; 找不到标签的图片照常复制
pub fn copy_split(
    images: &[PathBuf],
    dst_img_dir: &Path,
    resolver: &LabelResolver,
    dst_lbl_dir: &Path,
) -> Result<CopyReport> {
    fs::create_dir_all(dst_img_dir)
        .with_context(|| format!("failed to create {}", dst_img_dir.display()))?;
    fs::create_dir_all(dst_lbl_dir)
        .with_context(|| format!("failed to create {}", dst_lbl_dir.display()))?;

    let mut report = CopyReport::default();
    for img in images {
        copy_into(img, dst_img_dir)?;
        report.copied += 1;

        let Some(stem) = file_stem(img) else { continue };
        match resolver.resolve(&stem) {
            Some(lbl) => {
                fs::copy(&lbl, dst_lbl_dir.join(format!("{stem}.txt")))
                    .with_context(|| format!("failed to copy label {}", lbl.display()))?;
                report.labeled += 1;
            }
            None => report.unlabeled += 1,
        }
    }
    Ok(report)
}

/// 写训练器的数据集描述文件
pub fn write_data_yaml(layout: &DatasetLayout) -> Result<PathBuf> {
    let abs = |p: PathBuf| -> Result<String> {
        let p = p
            .canonicalize()
            .with_context(|| format!("failed to resolve {}", p.display()))?;
        Ok(p.to_string_lossy().replace('\\', "/"))
    };
    let names = CLASS_NAMES
        .iter()
        .map(|n| format!("'{n}'"))
        .collect::<Vec<_>>()
        .join(", ");
    let yaml = format!(
        "train: {}\nval: {}\nnames: [{}]\n",
        abs(layout.images(Split::Train))?,
        abs(layout.images(Split::Val))?,
        names
    );
    let path = layout.data_yaml();
    fs::write(&path, yaml).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

/// 组装完成的数据集
#[derive(Debug, Clone)]
pub struct AssembledDataset {
    pub plan: SplitPlan,
    pub train: CopyReport,
    pub val: CopyReport,
    pub data_yaml: PathBuf,
}

/// 划分 + 复制 + 写 yaml
pub fn assemble(layout: &DatasetLayout, val_ratio: f64, seed: u64) -> Result<AssembledDataset> {
    let plan = prepare_split(layout, val_ratio, seed)?;

    let train = copy_split(
        &plan.train,
        &layout.images(Split::Train),
        &layout.label_resolver(Split::Train),
        &layout.labels(Split::Train),
    )?;
    let val = copy_split(
        &plan.val,
        &layout.images(Split::Val),
        &layout.label_resolver(Split::Val),
        &layout.labels(Split::Val),
    )?;
    for (split, report) in [(Split::Train, &train), (Split::Val, &val)] {
        if report.unlabeled > 0 {
            warn!(
                "{}: {} of {} images have no label file",
                split.dir_name(),
                report.unlabeled,
                report.copied
            );
        }
    }

    let data_yaml = write_data_yaml(layout)?;
    info!("✅ dataset ready: {}", data_yaml.display());
    Ok(AssembledDataset {
        plan,
        train,
        val,
        data_yaml,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(prefix: &str, n: usize) -> Vec<PathBuf> {
        (0..n)
            .map(|i| PathBuf::from(format!("{prefix}/f_{i:06}.jpg")))
            .collect()
    }

    #[test]
    fn test_val_count() {
        assert_eq!(val_count(50, 0.2), 10);
        assert_eq!(val_count(3, 0.2), 1);
        assert_eq!(val_count(1, 0.5), 1);
        assert_eq!(val_count(9, 0.25), 2);
    }

    #[test]
    fn test_plan_split_ratio_and_isolation() {
        let manual = paths("manual", 50);
        let pseudo: Vec<PathBuf> = (100..130)
            .map(|i| PathBuf::from(format!("pseudo/f_{i:06}.jpg")))
            .collect();
        let mut rng = StdRng::seed_from_u64(42);
        let plan = plan_split(manual, pseudo.clone(), 0.2, &mut rng).unwrap();

        assert_eq!(plan.val.len(), 10);
        assert_eq!(plan.train.len(), 40 + 30);
        assert_eq!(plan.pseudo_in_train, 30);
        assert!(plan.val.iter().all(|p| !pseudo.contains(p)));

        let val_stems: HashSet<_> = plan.val.iter().filter_map(|p| file_stem(p)).collect();
        assert!(plan
            .train
            .iter()
            .all(|p| !val_stems.contains(&file_stem(p).unwrap())));
    }

    #[test]
    fn test_plan_split_deterministic() {
        let a = plan_split(paths("m", 20), vec![], 0.2, &mut StdRng::seed_from_u64(7)).unwrap();
        let b = plan_split(paths("m", 20), vec![], 0.2, &mut StdRng::seed_from_u64(7)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_plan_split_drops_conflicting_pseudo() {
        let manual = paths("manual", 2);
        let pseudo = paths("pseudo", 2); // 同名 stem
        let mut rng = StdRng::seed_from_u64(1);
        let plan = plan_split(manual, pseudo, 0.5, &mut rng).unwrap();
        assert_eq!(plan.val.len(), 1);
        assert_eq!(plan.pseudo_in_train, 0);
        assert_eq!(plan.train.len(), 1);
        assert!(plan.train[0].starts_with("manual"));
    }

    #[test]
    fn test_plan_split_dedups_pseudo_stems() {
        let manual = paths("manual", 4);
        let pseudo = vec![
            PathBuf::from("pseudo/p_000001.jpg"),
            PathBuf::from("pseudo/p_000001.png"),
            PathBuf::from("pseudo/f_000003.jpg"),
        ];
        let mut rng = StdRng::seed_from_u64(3);
        let plan = plan_split(manual, pseudo, 0.25, &mut rng).unwrap();
        assert_eq!(plan.pseudo_in_train, 1);
        assert_eq!(plan.train.len(), 4);

        let stems: HashSet<_> = plan.train.iter().filter_map(|p| file_stem(p)).collect();
        assert_eq!(stems.len(), plan.train.len());
    }

    #[test]
    fn test_plan_split_rejects_bad_ratio() {
        let mut rng = StdRng::seed_from_u64(1);
        for r in [0.0, 1.0, -0.1, 1.5] {
            assert!(matches!(
                plan_split(paths("m", 5), vec![], r, &mut rng),
                Err(DatasetError::InvalidRatio(_))
            ));
        }
    }

    #[test]
    fn test_label_resolver_priority() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DatasetLayout::new(dir.path());
        fs::create_dir_all(layout.labels_manual()).unwrap();
        fs::create_dir_all(layout.labels_pseudo()).unwrap();
        fs::write(layout.labels_manual().join("both.txt"), "manual").unwrap();
        fs::write(layout.labels_pseudo().join("both.txt"), "pseudo").unwrap();
        fs::write(layout.labels_pseudo().join("only_pseudo.txt"), "pseudo").unwrap();

        let train = layout.label_resolver(Split::Train);
        assert_eq!(train.resolve("both"), Some(layout.labels_manual().join("both.txt")));
        assert_eq!(
            train.resolve("only_pseudo"),
            Some(layout.labels_pseudo().join("only_pseudo.txt"))
        );
        assert_eq!(train.resolve("missing"), None);

        let val = layout.label_resolver(Split::Val);
        assert_eq!(val.resolve("only_pseudo"), None);
    }

    #[test]
    fn test_prepare_split_without_manual_images() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DatasetLayout::new(dir.path());
        let err = prepare_split(&layout, 0.2, 42).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DatasetError>(),
            Some(DatasetError::NoManualImages(_))
        ));
    }
}
