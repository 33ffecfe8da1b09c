// 该文件是 Biaozhu （标注） 项目的一部分。
// src/locator/reference.rs - 图像引用分类
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

use std::path::{Component, Path, PathBuf};

pub const REMOTE_SCHEMES: [&str; 2] = ["http://", "https://"];

/// 平台本地文件引用，例如 `/data/local-files/?d=ComfyUI/output/flux_00376_.png`
pub const MANAGED_PATH_MARKER: &str = "/data/local-files/";
pub const MANAGED_PATH_QUERY: &str = "?d=";

/// 图像字段取值的三种解释，分类只看字符串本身
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageReference<'a> {
  RemoteUrl(&'a str),
  PlatformManaged(&'a str),
  DirectPath(&'a str),
}

impl<'a> ImageReference<'a> {
  pub fn classify(value: &'a str) -> Self {
    if REMOTE_SCHEMES.iter().any(|scheme| value.starts_with(scheme)) {
      ImageReference::RemoteUrl(value)
    } else if value.starts_with(MANAGED_PATH_MARKER) {
      ImageReference::PlatformManaged(value)
    } else {
      ImageReference::DirectPath(value)
    }
  }

  pub fn kind(&self) -> &'static str {
    match self {
      ImageReference::RemoteUrl(_) => "remote-url",
      ImageReference::PlatformManaged(_) => "platform-managed",
      ImageReference::DirectPath(_) => "direct-path",
    }
  }
}

/// 取出 `?d=` 之后的相对路径。
///
/// 路径会做百分号解码并去掉开头的 `/`；没有 `?d=`、为空或含有 `..` 时返回 `None`。
pub fn managed_relative_path(reference: &str) -> Option<PathBuf> {
  let (_, raw) = reference.split_once(MANAGED_PATH_QUERY)?;
  let decoded = urlencoding::decode(raw)
    .map(|decoded| decoded.into_owned())
    .unwrap_or_else(|_| raw.to_string());
  let relative = decoded.trim_start_matches('/');
  if relative.is_empty() {
    return None;
  }

  let path = Path::new(relative);
  if path
    .components()
    .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
  {
    return None;
  }
  Some(path.to_path_buf())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn https_is_remote_regardless_of_suffix() {
    for value in [
      "https://host/img.png",
      "https://host/data/local-files/?d=a.png",
      "http://host/whatever",
    ] {
      assert_eq!(
        ImageReference::classify(value),
        ImageReference::RemoteUrl(value)
      );
    }
  }

  #[test]
  fn marker_is_platform_managed() {
    let value = "/data/local-files/?d=sub/file.png";
    assert_eq!(
      ImageReference::classify(value),
      ImageReference::PlatformManaged(value)
    );
    assert_eq!(ImageReference::classify(value).kind(), "platform-managed");
  }

  #[test]
  fn marker_inside_a_path_is_still_direct() {
    for value in [
      "/srv/x/data/local-files/a.png",
      "data/local-files/?d=a.png",
    ] {
      assert_eq!(
        ImageReference::classify(value),
        ImageReference::DirectPath(value)
      );
    }
  }

  #[test]
  fn everything_else_is_a_direct_path() {
    for value in ["/abs/local/exists.png", "relative.png", "ftp://host/a.png", ""] {
      assert_eq!(
        ImageReference::classify(value),
        ImageReference::DirectPath(value)
      );
    }
  }

  #[test]
  fn relative_path_is_extracted_and_decoded() {
    assert_eq!(
      managed_relative_path("/data/local-files/?d=ComfyUI/output/flux_00376_.png"),
      Some(PathBuf::from("ComfyUI/output/flux_00376_.png"))
    );
    assert_eq!(
      managed_relative_path("/data/local-files/?d=%2Fmy%20dir%2Fa.png"),
      Some(PathBuf::from("my dir/a.png"))
    );
  }

  #[test]
  fn malformed_references_have_no_relative_path() {
    assert_eq!(managed_relative_path("/data/local-files/"), None);
    assert_eq!(managed_relative_path("/data/local-files/?d="), None);
    assert_eq!(managed_relative_path("/data/local-files/?d=../etc/passwd"), None);
  }
}
