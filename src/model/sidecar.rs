// 该文件是 Biaozhu （标注） 项目的一部分。
// src/model/sidecar.rs - 读取旁路 JSON 的检测器
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{DetectionResultSet, Detector, InferenceParams},
};

#[derive(Error, Debug)]
pub enum SidecarError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("找不到检测结果文件: {0}")]
  Missing(PathBuf),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("检测结果解析错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

const DEFAULT_EXTENSION: &str = "json";

/// 从 JSON 文件回放检测器输出。
///
/// `sidecar:///srv/detections` 在该目录下查找 `<文件名>.json`，
/// 路径为空时（`sidecar:`）在图像旁边查找 `<图像文件>.json`。
/// 查询参数 `ext` 可以修改扩展名。
#[derive(Debug, Clone)]
pub struct SidecarDetector {
  directory: Option<PathBuf>,
  extension: String,
}

impl FromUrlWithScheme for SidecarDetector {
  const SCHEME: &'static str = "sidecar";
}

impl FromUrl for SidecarDetector {
  type Error = SidecarError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(SidecarError::SchemeMismatch);
    }

    let extension = url
      .query_pairs()
      .find(|(k, _)| k == "ext")
      .map(|(_, v)| v.trim_start_matches('.').to_string())
      .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());

    let directory = match url.path() {
      "" => None,
      path => Some(PathBuf::from(urlencoding::decode(path).map_or_else(
        |_| path.to_string(),
        |decoded| decoded.into_owned(),
      ))),
    };

    Ok(SidecarDetector {
      directory,
      extension,
    })
  }
}

impl SidecarDetector {
  pub fn in_directory(directory: impl Into<PathBuf>) -> Self {
    Self {
      directory: Some(directory.into()),
      extension: DEFAULT_EXTENSION.to_string(),
    }
  }

  pub fn beside_image() -> Self {
    Self {
      directory: None,
      extension: DEFAULT_EXTENSION.to_string(),
    }
  }

  pub fn sidecar_path(&self, image: &Path) -> PathBuf {
    match &self.directory {
      Some(directory) => {
        let stem = image.file_stem().unwrap_or(image.as_os_str());
        let mut name = stem.to_os_string();
        name.push(".");
        name.push(&self.extension);
        directory.join(name)
      }
      None => {
        let mut name = image.as_os_str().to_os_string();
        name.push(".");
        name.push(&self.extension);
        PathBuf::from(name)
      }
    }
  }
}

impl Detector for SidecarDetector {
  type Error = SidecarError;

  fn detect(
    &self,
    image: &Path,
    params: &InferenceParams,
  ) -> Result<Option<DetectionResultSet>, Self::Error> {
    let path = self.sidecar_path(image);
    if !path.exists() {
      return Err(SidecarError::Missing(path));
    }

    debug!("读取检测结果: {}", path.display());
    let content = std::fs::read_to_string(&path)?;
    let result: Option<DetectionResultSet> = serde_json::from_str(&content)?;

    Ok(result.map(|mut result| {
      result.truncate(params.max_detections);
      debug!("回放检测结果: {} 个实例", result.instance_count());
      result
    }))
  }
}
