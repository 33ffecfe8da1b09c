// 该文件是 Biaozhu （标注） 项目的一部分。
// src/locator/probe.rs - 候选存储根目录探测
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::path::{Path, PathBuf};

use tracing::debug;

const SYSTEM_ROOTS: [&str; 3] = ["/data", "/app/data", "/opt/heartex/data"];
const HOME_ROOTS: [&str; 2] = ["label-studio-data", ".local/share/label-studio/media/upload"];

/// 内置的候选根目录，按优先级排列
pub fn default_roots(home: Option<&Path>) -> Vec<PathBuf> {
  let mut roots: Vec<PathBuf> = SYSTEM_ROOTS.iter().map(PathBuf::from).collect();
  if let Some(home) = home {
    roots.extend(HOME_ROOTS.iter().map(|dir| home.join(dir)));
  }
  roots
}

/// 按顺序返回第一个存在 `root/relative` 的路径
pub fn probe_roots(roots: &[PathBuf], relative: &Path) -> Option<PathBuf> {
  roots.iter().map(|root| root.join(relative)).find(|candidate| {
    let exists = candidate.exists();
    debug!("尝试路径: {} ({})", candidate.display(), exists);
    exists
  })
}
