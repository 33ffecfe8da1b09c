// 该文件是 Biaozhu （标注） 项目的一部分。
// src/config.rs - 后端参数配置
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::{Args, ValueEnum};
use url::Url;

use crate::{
  locator::{LocatorConfig, default_roots},
  model::{ClassMapping, InferenceParams},
  normalize::{CoordinateUnits, NormalizerConfig},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Device {
  #[default]
  Auto,
  Cpu,
  Cuda,
}

impl fmt::Display for Device {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Device::Auto => "auto",
      Device::Cpu => "cpu",
      Device::Cuda => "cuda",
    })
  }
}

/// `id=label` 形式的类别映射项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassEntry {
  pub id: u32,
  pub label: String,
}

impl FromStr for ClassEntry {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let (id, label) = s
      .split_once('=')
      .ok_or_else(|| format!("类别映射应为 id=label 形式: {}", s))?;
    let id = id
      .trim()
      .parse()
      .map_err(|e| format!("类别 id 无效 '{}': {}", id, e))?;
    let label = label.trim();
    if label.is_empty() {
      return Err(format!("类别 {} 的标签为空", id));
    }
    Ok(ClassEntry {
      id,
      label: label.to_string(),
    })
  }
}

fn unit_interval(s: &str) -> Result<f64, String> {
  let value: f64 = s.parse().map_err(|e| format!("{}", e))?;
  if (0.0..=1.0).contains(&value) {
    Ok(value)
  } else {
    Err(format!("取值应在 0.0 - 1.0 之间, 实际为 {}", value))
  }
}

fn positive<T: FromStr + PartialOrd + Default>(s: &str) -> Result<T, String>
where
  T::Err: fmt::Display,
{
  let value: T = s.parse().map_err(|e: T::Err| e.to_string())?;
  if value > T::default() {
    Ok(value)
  } else {
    Err("取值必须大于 0".to_string())
  }
}

/// 预测后端配置，命令行参数优先，其次是环境变量
#[derive(Args, Debug, Clone)]
pub struct BackendConfig {
  /// 模型版本标记
  #[arg(long, env = "MODEL_VERSION", default_value = "1.0.0")]
  pub model_version: String,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, env = "CONFIDENCE_THRESHOLD", default_value = "0.25", value_parser = unit_interval)]
  pub confidence_threshold: f64,

  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, env = "IOU_THRESHOLD", default_value = "0.7", value_parser = unit_interval)]
  pub iou_threshold: f64,

  /// 推理输入尺寸
  #[arg(long, env = "IMAGE_SIZE", default_value = "640", value_parser = positive::<u32>)]
  pub image_size: u32,

  /// 每张图像最多检测数
  #[arg(long, env = "MAX_DETECTIONS", default_value = "300", value_parser = positive::<usize>)]
  pub max_detections: usize,

  /// 推理设备
  #[arg(long, env = "DEVICE", value_enum, default_value_t = Device::Auto)]
  pub device: Device,

  /// 任务数据中图像所在的字段
  #[arg(long, env = "LABEL_STUDIO_TASK_DATA_KEY", default_value = "image")]
  pub task_data_key: String,

  /// 标注配置中的 from_name
  #[arg(long, env = "LABEL_STUDIO_FROM_NAME", default_value = "label")]
  pub from_name: String,

  /// 标注配置中的 to_name
  #[arg(long, env = "LABEL_STUDIO_TO_NAME", default_value = "image")]
  pub to_name: String,

  /// 类别映射，逗号分隔的 id=label
  #[arg(
    long,
    env = "CLASS_MAPPING",
    value_delimiter = ',',
    default_value = "0=arm_injection_area"
  )]
  pub class_mapping: Vec<ClassEntry>,

  /// 额外的候选根目录，优先于内置目录
  #[arg(long = "storage-root", env = "STORAGE_ROOTS", value_delimiter = ':')]
  pub storage_roots: Vec<PathBuf>,

  /// 不使用内置的候选根目录
  #[arg(long)]
  pub no_default_roots: bool,

  /// 平台本地文件根目录
  #[arg(long, env = "LOCAL_FILES_DOCUMENT_ROOT")]
  pub local_files_document_root: Option<PathBuf>,

  /// 平台地址，用于判断下载时是否携带令牌
  #[arg(long, env = "LABEL_STUDIO_URL")]
  pub label_studio_url: Option<Url>,

  /// 平台 API 令牌
  #[arg(long, env = "LABEL_STUDIO_API_KEY", hide_env_values = true)]
  pub label_studio_api_key: Option<String>,

  /// 远程图像缓存目录
  #[arg(long, env = "CACHE_DIR")]
  pub cache_dir: Option<PathBuf>,
}

impl BackendConfig {
  pub fn inference_params(&self) -> InferenceParams {
    InferenceParams {
      confidence_threshold: self.confidence_threshold,
      iou_threshold: self.iou_threshold,
      image_size: self.image_size,
      max_detections: self.max_detections,
    }
  }

  pub fn class_mapping(&self) -> ClassMapping {
    self
      .class_mapping
      .iter()
      .map(|entry| (entry.id, entry.label.clone()))
      .collect()
  }

  pub fn normalizer_config(&self) -> NormalizerConfig {
    NormalizerConfig {
      model_version: self.model_version.clone(),
      confidence_threshold: self.confidence_threshold,
      from_name: self.from_name.clone(),
      to_name: self.to_name.clone(),
      class_mapping: self.class_mapping(),
      units: CoordinateUnits::Percent,
    }
  }

  /// `home` 用于展开内置目录中的用户目录
  pub fn locator_config(&self, home: Option<&Path>) -> LocatorConfig {
    let mut candidate_roots = self.storage_roots.clone();
    if !self.no_default_roots {
      candidate_roots.extend(default_roots(home));
    }
    LocatorConfig {
      primary_field: self.task_data_key.clone(),
      candidate_roots,
    }
  }

  pub fn cache_dir(&self) -> PathBuf {
    self
      .cache_dir
      .clone()
      .unwrap_or_else(|| std::env::temp_dir().join("biaozhu-cache"))
  }
}
