// 该文件是 Biaozhu （标注） 项目的一部分。
// src/locator.rs - 任务图像定位
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

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
  platform::{Downloader, ManagedPathResolver},
  task::LabelTask,
};

mod probe;
mod reference;

pub use self::probe::{default_roots, probe_roots};
pub use self::reference::{
  ImageReference, MANAGED_PATH_MARKER, MANAGED_PATH_QUERY, managed_relative_path,
};

/// 主字段缺失时依次尝试的字段
pub const FALLBACK_FIELDS: [&str; 4] = ["image", "image_url", "img", "photo"];

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum LocateError {
  #[error("任务数据中没有图像字段, 现有字段: {0:?}")]
  NoImageField(Vec<String>),
  #[error("远程图像下载失败: {url}")]
  DownloadFailed {
    url: String,
    #[source]
    source: BoxError,
  },
  #[error("图像文件不存在: {0}")]
  NotFound(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocatorConfig {
  pub primary_field: String,
  /// 平台解析失败后按顺序探测的根目录
  pub candidate_roots: Vec<PathBuf>,
}

impl Default for LocatorConfig {
  fn default() -> Self {
    Self {
      primary_field: "image".to_string(),
      candidate_roots: default_roots(None),
    }
  }
}

pub struct ImageLocator<D, R> {
  config: LocatorConfig,
  downloader: D,
  resolver: R,
}

impl<D: Downloader, R: ManagedPathResolver> ImageLocator<D, R> {
  pub fn new(config: LocatorConfig, downloader: D, resolver: R) -> Self {
    Self {
      config,
      downloader,
      resolver,
    }
  }

  /// 先找配置的主字段，再按固定顺序找备用字段
  pub fn select_field<'a>(&'a self, task: &'a LabelTask) -> Result<(&'a str, &'a str), LocateError> {
    std::iter::once(self.config.primary_field.as_str())
      .chain(FALLBACK_FIELDS)
      .find_map(|key| task.text_field(key).map(|value| (key, value)))
      .ok_or_else(|| LocateError::NoImageField(task.data.keys().cloned().collect()))
  }

  /// 返回一个已确认存在的本地图像路径。
  ///
  /// 三种引用互斥：一旦选定分支，失败就直接返回，不会换用其他分支。
  pub fn resolve(&self, task: &LabelTask) -> Result<PathBuf, LocateError> {
    let (key, value) = self.select_field(task)?;
    let reference = ImageReference::classify(value);
    info!(
      "任务 {}: 字段 '{}' -> {} ({})",
      task.display_id(),
      key,
      value,
      reference.kind()
    );

    match reference {
      ImageReference::RemoteUrl(url) => self.resolve_remote(url, task),
      ImageReference::PlatformManaged(reference) => self.resolve_managed(reference, task),
      ImageReference::DirectPath(path) => resolve_direct(path),
    }
  }

  fn resolve_remote(&self, url: &str, task: &LabelTask) -> Result<PathBuf, LocateError> {
    let path = self
      .downloader
      .fetch_local(url, task.id.as_ref())
      .map_err(|e| {
        error!("下载失败: {}: {}", url, e);
        LocateError::DownloadFailed {
          url: url.to_string(),
          source: Box::new(e),
        }
      })?;
    info!("已下载到本地: {}", path.display());
    Ok(path)
  }

  fn resolve_managed(&self, reference: &str, task: &LabelTask) -> Result<PathBuf, LocateError> {
    match self.resolver.resolve_managed_path(reference, task.id.as_ref()) {
      Ok(path) if path.exists() => {
        info!("平台解析路径: {}", path.display());
        return Ok(path);
      }
      Ok(path) => warn!("平台解析出的文件不存在: {}", path.display()),
      Err(e) => warn!("平台路径解析失败: {}", e),
    }

    info!("尝试在候选根目录中查找...");
    let relative = managed_relative_path(reference).ok_or_else(|| {
      warn!("无法从引用中取出相对路径: {}", reference);
      LocateError::NotFound(reference.to_string())
    })?;
    debug!("相对路径: {}", relative.display());

    match probe_roots(&self.config.candidate_roots, &relative) {
      Some(path) => {
        info!("在候选根目录中找到文件: {}", path.display());
        Ok(path)
      }
      None => {
        warn!(
          "{} 个候选根目录中都没有 {}",
          self.config.candidate_roots.len(),
          relative.display()
        );
        Err(LocateError::NotFound(reference.to_string()))
      }
    }
  }
}

fn resolve_direct(value: &str) -> Result<PathBuf, LocateError> {
  let path = Path::new(value);
  if path.exists() {
    Ok(path.to_path_buf())
  } else {
    error!("文件不存在: {}", value);
    Err(LocateError::NotFound(value.to_string()))
  }
}
