// 该文件是 Biaozhu （标注） 项目的一部分。
// src/model.rs - 检测器接口与原始检测结果
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::normalize::NormalizeError;

/// 推理参数，原样传给检测器
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InferenceParams {
  pub confidence_threshold: f64,
  pub iou_threshold: f64,
  pub image_size: u32,
  pub max_detections: usize,
}

impl Default for InferenceParams {
  fn default() -> Self {
    Self {
      confidence_threshold: 0.25,
      iou_threshold: 0.7,
      image_size: 640,
      max_detections: 300,
    }
  }
}

pub trait Detector {
  type Error: std::error::Error + Send + Sync + 'static;

  /// 对单张图像做推理，`None` 表示检测器没有给出结果
  fn detect(
    &self,
    image: &Path,
    params: &InferenceParams,
  ) -> Result<Option<DetectionResultSet>, Self::Error>;
}

impl<D: Detector + ?Sized> Detector for &D {
  type Error = D::Error;

  fn detect(
    &self,
    image: &Path,
    params: &InferenceParams,
  ) -> Result<Option<DetectionResultSet>, Self::Error> {
    (**self).detect(image, params)
  }
}

/// 检测框输出，各数组按实例下标对齐
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoxOutput {
  #[serde(default)]
  pub conf: Option<Vec<f64>>,
  /// 类别 id，也接受 `[0.0, 2.0]` 这样的浮点导出
  #[serde(default, deserialize_with = "class_ids")]
  pub cls: Option<Vec<u32>>,
  /// 归一化的 [cx, cy, w, h]
  #[serde(default)]
  pub xywhn: Vec<[f64; 4]>,
}

fn class_ids<'de, D>(deserializer: D) -> Result<Option<Vec<u32>>, D::Error>
where
  D: serde::Deserializer<'de>,
{
  let Some(values) = Option::<Vec<f64>>::deserialize(deserializer)? else {
    return Ok(None);
  };
  values
    .into_iter()
    .map(|value| {
      if value.fract() == 0.0 && (0.0..=u32::MAX as f64).contains(&value) {
        Ok(value as u32)
      } else {
        Err(serde::de::Error::custom(format!("类别 id 无效: {}", value)))
      }
    })
    .collect::<Result<Vec<_>, _>>()
    .map(Some)
}

/// 实例分割输出，每个实例一条归一化轮廓
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaskOutput {
  #[serde(default)]
  pub xyn: Vec<Vec<[f64; 2]>>,
}

/// 检测器对单张图像的原始输出
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionResultSet {
  /// 检测器自带的类别名称表
  #[serde(default)]
  pub names: BTreeMap<u32, String>,
  #[serde(default)]
  pub boxes: Option<BoxOutput>,
  #[serde(default)]
  pub masks: Option<MaskOutput>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modality {
  Polygon,
  Rectangle,
}

/// 单个检测实例，由原始输出一次性构建
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
  pub index: usize,
  pub class_id: u32,
  pub confidence: f64,
  pub bbox: Option<[f64; 4]>,
  pub polygon: Option<Vec<[f64; 2]>>,
}

impl DetectionResultSet {
  pub fn is_empty(&self) -> bool {
    self.instance_count() == 0
  }

  /// 有非空轮廓时按多边形处理，否则有检测框时按矩形处理
  pub fn modality(&self) -> Option<Modality> {
    match (&self.masks, &self.boxes) {
      (Some(masks), _) if !masks.xyn.is_empty() => Some(Modality::Polygon),
      (_, Some(_)) => Some(Modality::Rectangle),
      _ => None,
    }
  }

  pub fn instance_count(&self) -> usize {
    match self.modality() {
      Some(Modality::Polygon) => self.masks.as_ref().map_or(0, |m| m.xyn.len()),
      Some(Modality::Rectangle) => self.boxes.as_ref().map_or(0, |b| b.xywhn.len()),
      None => 0,
    }
  }

  /// 把并列数组展开成逐实例的值，长度不一致时报错
  pub fn instances(&self) -> Result<Vec<RawDetection>, NormalizeError> {
    let Some(modality) = self.modality() else {
      return Ok(Vec::new());
    };
    let count = self.instance_count();
    let empty = BoxOutput::default();
    let boxes = self.boxes.as_ref().unwrap_or(&empty);

    let confidences = aligned("boxes.conf", boxes.conf.as_deref(), count)?;
    let classes = aligned("boxes.cls", boxes.cls.as_deref(), count)?;
    let bboxes = match modality {
      Modality::Rectangle => Some(boxes.xywhn.as_slice()),
      Modality::Polygon if boxes.xywhn.is_empty() => None,
      Modality::Polygon => aligned("boxes.xywhn", Some(boxes.xywhn.as_slice()), count)?,
    };
    let polygons = match modality {
      Modality::Polygon => self.masks.as_ref().map(|m| m.xyn.as_slice()),
      Modality::Rectangle => None,
    };

    Ok(
      (0..count)
        .map(|index| RawDetection {
          index,
          class_id: classes.map_or(0, |c| c[index]),
          confidence: confidences.map_or(0.0, |c| c[index]),
          bbox: bboxes.map(|b| b[index]),
          polygon: polygons.map(|p| p[index].clone()),
        })
        .collect(),
    )
  }

  /// 只保留前 `max` 个实例
  pub fn truncate(&mut self, max: usize) {
    if let Some(boxes) = self.boxes.as_mut() {
      boxes.xywhn.truncate(max);
      if let Some(conf) = boxes.conf.as_mut() {
        conf.truncate(max);
      }
      if let Some(cls) = boxes.cls.as_mut() {
        cls.truncate(max);
      }
    }
    if let Some(masks) = self.masks.as_mut() {
      masks.xyn.truncate(max);
    }
  }
}

fn aligned<'a, T>(
  field: &'static str,
  values: Option<&'a [T]>,
  expected: usize,
) -> Result<Option<&'a [T]>, NormalizeError> {
  match values {
    Some(values) if values.len() != expected => Err(NormalizeError::ShapeMismatch {
      field,
      expected,
      found: values.len(),
    }),
    other => Ok(other),
  }
}

/// 类别 id 到标签名的固定映射，优先于检测器自带的名称表
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassMapping {
  labels: BTreeMap<u32, String>,
}

impl ClassMapping {
  pub fn get(&self, class_id: u32) -> Option<&str> {
    self.labels.get(&class_id).map(String::as_str)
  }

  /// 映射表 -> 检测器名称表 -> `class_<id>`，总能得到标签
  pub fn resolve(&self, class_id: u32, names: &BTreeMap<u32, String>) -> String {
    self
      .get(class_id)
      .or_else(|| names.get(&class_id).map(String::as_str))
      .map(str::to_string)
      .unwrap_or_else(|| format!("class_{}", class_id))
  }
}

impl FromIterator<(u32, String)> for ClassMapping {
  fn from_iter<I: IntoIterator<Item = (u32, String)>>(iter: I) -> Self {
    Self {
      labels: iter.into_iter().collect(),
    }
  }
}

#[cfg(feature = "model_sidecar")]
mod sidecar;
#[cfg(feature = "model_sidecar")]
pub use self::sidecar::{SidecarDetector, SidecarError};
