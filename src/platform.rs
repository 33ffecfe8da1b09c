// 该文件是 Biaozhu （标注） 项目的一部分。
// src/platform.rs - 标注平台协作接口
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

use crate::task::TaskId;

/// 把远程图像缓存到本地
pub trait Downloader {
  type Error: std::error::Error + Send + Sync + 'static;
  fn fetch_local(&self, url: &str, task_id: Option<&TaskId>) -> Result<PathBuf, Self::Error>;
}

/// 解析平台管理的文件引用，返回的路径不保证存在
pub trait ManagedPathResolver {
  type Error: std::error::Error + Send + Sync + 'static;
  fn resolve_managed_path(
    &self,
    reference: &str,
    task_id: Option<&TaskId>,
  ) -> Result<PathBuf, Self::Error>;
}

mod local_files;
pub use self::local_files::{LocalFilesError, LocalFilesResolver};

#[cfg(feature = "http_download")]
mod download;
#[cfg(feature = "http_download")]
pub use self::download::{DownloadError, HttpDownloader};
