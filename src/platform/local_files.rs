// 该文件是 Biaozhu （标注） 项目的一部分。
// src/platform/local_files.rs - 平台本地文件引用解析
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

use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

use crate::{locator::managed_relative_path, platform::ManagedPathResolver, task::TaskId};

#[derive(Error, Debug)]
pub enum LocalFilesError {
  #[error("未配置本地文件根目录 (LOCAL_FILES_DOCUMENT_ROOT)")]
  NoDocumentRoot,
  #[error("无法识别的本地文件引用: {0}")]
  Malformed(String),
}

/// 按平台的约定，把 `/data/local-files/?d=<rel>` 映射到 `<document_root>/<rel>`
#[derive(Debug, Clone, Default)]
pub struct LocalFilesResolver {
  document_root: Option<PathBuf>,
}

impl LocalFilesResolver {
  pub fn new(document_root: Option<PathBuf>) -> Self {
    Self { document_root }
  }
}

impl ManagedPathResolver for LocalFilesResolver {
  type Error = LocalFilesError;

  fn resolve_managed_path(
    &self,
    reference: &str,
    task_id: Option<&TaskId>,
  ) -> Result<PathBuf, Self::Error> {
    let root = self
      .document_root
      .as_ref()
      .ok_or(LocalFilesError::NoDocumentRoot)?;
    let relative = managed_relative_path(reference)
      .ok_or_else(|| LocalFilesError::Malformed(reference.to_string()))?;

    let path = root.join(relative);
    debug!(
      "任务 {:?}: {} -> {}",
      task_id.map(ToString::to_string),
      reference,
      path.display()
    );
    Ok(path)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn joins_document_root() {
    let resolver = LocalFilesResolver::new(Some(PathBuf::from("/storage")));
    let path = resolver
      .resolve_managed_path("/data/local-files/?d=ComfyUI/output/a.png", None)
      .unwrap();
    assert_eq!(path, PathBuf::from("/storage/ComfyUI/output/a.png"));
  }

  #[test]
  fn without_root_it_fails() {
    let resolver = LocalFilesResolver::default();
    assert!(matches!(
      resolver.resolve_managed_path("/data/local-files/?d=a.png", None),
      Err(LocalFilesError::NoDocumentRoot)
    ));
  }

  #[test]
  fn malformed_reference_fails() {
    let resolver = LocalFilesResolver::new(Some(PathBuf::from("/storage")));
    assert!(matches!(
      resolver.resolve_managed_path("/data/local-files/", Some(&TaskId::Number(3))),
      Err(LocalFilesError::Malformed(_))
    ));
  }
}
