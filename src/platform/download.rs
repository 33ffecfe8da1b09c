// 该文件是 Biaozhu （标注） 项目的一部分。
// src/platform/download.rs - 远程图像下载与本地缓存
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

use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::Instant;

use reqwest::blocking::Client;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{platform::Downloader, task::TaskId};

#[derive(Error, Debug)]
pub enum DownloadError {
  #[error("URL 无效: {0}")]
  InvalidUrl(#[from] url::ParseError),
  #[error("HTTP 错误: {0}")]
  HttpError(#[from] reqwest::Error),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 平台自身的地址与令牌，只对同源请求携带
#[derive(Debug, Clone)]
struct PlatformAuth {
  origin: url::Origin,
  token: String,
}

/// 阻塞式下载器，文件缓存为 `<cache_dir>/<hash>__<文件名>`，命中缓存时不再请求
pub struct HttpDownloader {
  client: Client,
  cache_dir: PathBuf,
  auth: Option<PlatformAuth>,
}

impl HttpDownloader {
  pub fn new(cache_dir: impl Into<PathBuf>) -> Result<Self, DownloadError> {
    Ok(Self {
      client: Client::builder().build()?,
      cache_dir: cache_dir.into(),
      auth: None,
    })
  }

  /// 访问平台自身的文件时带上 `Authorization: Token <key>`
  pub fn with_platform(mut self, platform_url: &Url, api_key: Option<String>) -> Self {
    self.auth = api_key.filter(|key| !key.is_empty()).map(|token| PlatformAuth {
      origin: platform_url.origin(),
      token,
    });
    self
  }

  /// 缓存键来自标准库的 `DefaultHasher`，其输出不保证跨 Rust 版本稳定，
  /// 升级工具链后旧缓存可能不再命中，只会导致重新下载。
  pub fn cache_path(&self, url: &Url) -> PathBuf {
    let mut hasher = DefaultHasher::new();
    url.as_str().hash(&mut hasher);

    let name = url
      .path_segments()
      .and_then(|mut segments| segments.next_back())
      .filter(|name| !name.is_empty())
      .unwrap_or("download");
    let name: String = name
      .chars()
      .map(|c| {
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
          c
        } else {
          '_'
        }
      })
      .collect();

    self
      .cache_dir
      .join(format!("{:016x}__{}", hasher.finish(), name))
  }
}

impl Downloader for HttpDownloader {
  type Error = DownloadError;

  fn fetch_local(&self, url: &str, task_id: Option<&TaskId>) -> Result<PathBuf, Self::Error> {
    let url = Url::parse(url)?;
    let path = self.cache_path(&url);
    if path.exists() {
      debug!("命中缓存: {}", path.display());
      return Ok(path);
    }

    std::fs::create_dir_all(&self.cache_dir)?;

    let mut request = self.client.get(url.clone());
    if let Some(auth) = self.auth.as_ref().filter(|auth| auth.origin == url.origin()) {
      request = request.header(
        reqwest::header::AUTHORIZATION,
        format!("Token {}", auth.token),
      );
    }

    let now = Instant::now();
    let bytes = request.send()?.error_for_status()?.bytes()?;
    store(&path, &bytes)?;
    info!(
      "任务 {:?}: 下载 {} ({} 字节), 耗时: {:.2?}",
      task_id.map(ToString::to_string),
      url,
      bytes.len(),
      now.elapsed()
    );

    Ok(path)
  }
}

/// 先写入同目录下的临时文件再改名，中断的写入不会留下半个缓存文件
fn store(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
  let mut partial = path.as_os_str().to_owned();
  partial.push(".part");
  let partial = PathBuf::from(partial);

  if let Err(e) = std::fs::write(&partial, bytes) {
    let _ = std::fs::remove_file(&partial);
    return Err(e);
  }
  std::fs::rename(&partial, path)
}
