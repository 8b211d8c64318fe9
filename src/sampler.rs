// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 分层抽帧: 在帧序号范围内均匀挑出 k 帧供人工标注
//!
//! 每个分层取中点并加 [-2, 2] 的随机抖动; 抖动造成的重复在去重后
//! 从剩余帧中随机补齐 (补齐部分不保证均匀)。

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use regex::Regex;
use tracing::info;

use crate::error::DatasetError;
use crate::utils::{copy_into, file_stem, list_files};

/// 帧文件名 `f_000123[...]`
static FRAME_INDEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^f_(\d+)").unwrap());

/// 抖动幅度 (帧)
pub const JITTER: i64 = 2;

/// 解析帧序号, 不符合命名约定时返回 -1 (排在最前)
pub fn parse_frame_index(stem: &str) -> i64 {
    FRAME_INDEX
        .captures(stem)
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(-1)
}

/// 一个被选中的帧
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FrameSample {
    pub index: i64,
    pub path: PathBuf,
}

impl FrameSample {
    pub fn from_path(path: PathBuf) -> Self {
        let index = file_stem(&path).map_or(-1, |s| parse_frame_index(&s));
        Self { index, path }
    }
}

/// 原始帧: `f_*.jpg` 或 `*_annotated.jpg`
fn is_raw_frame(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.ends_with("_annotated.jpg") || name.starts_with("f_")
}

/// 扫描帧目录并按帧序号排序 (序号相同保持文件名顺序)
pub fn discover_frames(dir: &Path) -> Result<Vec<FrameSample>> {
    let mut frames: Vec<FrameSample> = list_files(dir, &["jpg"])?
        .into_iter()
        .filter(|p| is_raw_frame(p))
        .map(FrameSample::from_path)
        .collect();
    frames.sort_by_key(|f| f.index);
    Ok(frames)
}

/// 在 `[0, n)` 中选出 `k` 个互不相同的位置
///
/// 先按分层中点加抖动选取, 去重后从未选中的位置里随机补齐,
/// 补齐过程有界: 未选中位置打乱后取前 `k - 已选` 个。
pub fn stratified_indices(n: usize, k: usize, rng: &mut impl Rng) -> Vec<usize> {
    let k = k.min(n);
    if k == n {
        return (0..n).collect();
    }

    let step = n as f64 / k as f64;
    let max_idx = n as i64 - 1;
    let mut seen = HashSet::with_capacity(k);
    let mut chosen = Vec::with_capacity(k);
    for i in 0..k {
        let base = (i as f64 * step + step / 2.0) as i64;
        let jitter = rng.gen_range(-JITTER..=JITTER);
        let idx = (base + jitter).clamp(0, max_idx) as usize;
        if seen.insert(idx) {
            chosen.push(idx);
        }
    }

    if chosen.len() < k {
        let mut rest: Vec<usize> = (0..n).filter(|i| !seen.contains(i)).collect();
        rest.shuffle(rng);
        chosen.extend(rest.into_iter().take(k - seen.len()));
    }
    chosen
}

/// 按固定种子抽取 `count` 帧 (超过总数时全选)
pub fn select_frames(frames: &[FrameSample], count: usize, seed: u64) -> Vec<FrameSample> {
    let mut rng = StdRng::seed_from_u64(seed);
    stratified_indices(frames.len(), count, &mut rng)
        .into_iter()
        .map(|i| frames[i].clone())
        .collect()
}

/// 完整流程: 扫描 → 抽取 → 复制到输出目录
pub fn run_selection(frames_dir: &Path, out_dir: &Path, count: usize, seed: u64) -> Result<Vec<FrameSample>> {
    if count == 0 {
        return Err(DatasetError::InvalidCount(count).into());
    }
    let frames = discover_frames(frames_dir)?;
    if frames.is_empty() {
        return Err(DatasetError::NoFrames(frames_dir.to_path_buf()).into());
    }

    let selected = select_frames(&frames, count, seed);
    fs::create_dir_all(out_dir).with_context(|| format!("failed to create {}", out_dir.display()))?;
    for f in &selected {
        copy_into(&f.path, out_dir)?;
    }
    info!(
        "Selected {} frames out of {}. Written to {}",
        selected.len(),
        frames.len(),
        out_dir.display()
    );
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_index() {
        assert_eq!(parse_frame_index("f_000123"), 123);
        assert_eq!(parse_frame_index("f_000010_annotated"), 10);
        assert_eq!(parse_frame_index("frame_12"), -1);
        assert_eq!(parse_frame_index("abc_annotated"), -1);
    }

    #[test]
    fn test_select_all_when_k_equals_n() {
        let mut rng = StdRng::seed_from_u64(42);
        assert_eq!(stratified_indices(5, 5, &mut rng), vec![0, 1, 2, 3, 4]);
        assert_eq!(stratified_indices(5, 9, &mut rng), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_stratified_spread() {
        let (n, k) = (100, 20);
        let step = n as f64 / k as f64;
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut idx = stratified_indices(n, k, &mut rng);
            assert_eq!(idx.len(), k);
            idx.sort_unstable();
            idx.dedup();
            assert_eq!(idx.len(), k);
            // 第一个落在首个分层中点附近
            assert!(idx[0] as f64 <= step / 2.0 + JITTER as f64);
            for w in idx.windows(2) {
                assert!((w[1] - w[0]) as f64 <= step + 2.0 * JITTER as f64);
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let a = stratified_indices(100, 20, &mut StdRng::seed_from_u64(42));
        let b = stratified_indices(100, 20, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_backfill_when_dense() {
        // step < 1 时抖动碰撞很多, 必须靠补齐
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let idx = stratified_indices(10, 9, &mut rng);
            let unique: HashSet<_> = idx.iter().collect();
            assert_eq!(idx.len(), 9);
            assert_eq!(unique.len(), 9);
            assert!(idx.iter().all(|&i| i < 10));
        }
    }

    #[test]
    fn test_discover_and_sort() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["f_000010.jpg", "f_000002.jpg", "x_annotated.jpg", "other.jpg", "f_000001.png"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        let frames = discover_frames(dir.path()).unwrap();
        let names: Vec<_> = frames
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["x_annotated.jpg", "f_000002.jpg", "f_000010.jpg"]);
        assert_eq!(frames[0].index, -1);
    }

    #[test]
    fn test_run_selection_copies() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        for i in 0..30 {
            fs::write(src.path().join(format!("f_{i:06}.jpg")), b"x").unwrap();
        }
        let selected = run_selection(src.path(), &out.path().join("subset"), 6, 42).unwrap();
        assert_eq!(selected.len(), 6);
        for f in &selected {
            assert!(out.path().join("subset").join(f.path.file_name().unwrap()).exists());
        }
    }

    #[test]
    fn test_run_selection_no_frames() {
        let src = tempfile::tempdir().unwrap();
        let err = run_selection(src.path(), src.path(), 6, 42).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DatasetError>(),
            Some(DatasetError::NoFrames(_))
        ));
    }
}
