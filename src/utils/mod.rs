// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 文件系统工具: 按扩展名列出图片、取 stem、复制文件

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// 伪标签候选帧扩展名
pub const FRAME_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// 数据集图片扩展名
pub const DATASET_EXTENSIONS: [&str; 2] = ["jpg", "png"];

/// 文件名去掉扩展名
pub fn file_stem(path: &Path) -> Option<String> {
    path.file_stem().map(|s| s.to_string_lossy().into_owned())
}

/// 扩展名是否在列表中 (不区分大小写)
pub fn has_extension(path: &Path, exts: &[&str]) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|e| exts.contains(&e.as_str()))
}

/// 列出目录下指定扩展名的普通文件, 按文件名字典序排序
///
/// 目录不存在时返回空列表。
pub fn list_files(dir: &Path, exts: &[&str]) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))? {
        let path = entry?.path();
        if path.is_file() && has_extension(&path, exts) {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// 目录下某扩展名文件的 stem 集合
pub fn stems_in(dir: &Path, ext: &str) -> Result<HashSet<String>> {
    Ok(list_files(dir, &[ext])?
        .iter()
        .filter_map(|p| file_stem(p))
        .collect())
}

/// 复制文件到目录, 保持文件名
pub fn copy_into(src: &Path, dst_dir: &Path) -> Result<PathBuf> {
    let name = src
        .file_name()
        .with_context(|| format!("{} has no file name", src.display()))?;
    let dst = dst_dir.join(name);
    fs::copy(src, &dst)
        .with_context(|| format!("failed to copy {} → {}", src.display(), dst.display()))?;
    Ok(dst)
}
