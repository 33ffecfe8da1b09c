// 该文件是 Biaozhu （标注） 项目的一部分。
// src/normalize.rs - 检测结果到标注记录的转换
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  annotation::{AnnotationRecord, TaskPrediction},
  model::{ClassMapping, DetectionResultSet, Modality, RawDetection},
};

#[derive(Error, Debug)]
pub enum NormalizeError {
  #[error("检测输出形状不一致: {field} 期望 {expected} 个, 实际 {found} 个")]
  ShapeMismatch {
    field: &'static str,
    expected: usize,
    found: usize,
  },
}

/// 输出坐标单位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoordinateUnits {
  /// 0-100，平台使用的单位
  #[default]
  Percent,
  /// 0-1
  Normalized,
}

impl CoordinateUnits {
  pub fn factor(self) -> f64 {
    match self {
      CoordinateUnits::Percent => 100.0,
      CoordinateUnits::Normalized => 1.0,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizerConfig {
  pub model_version: String,
  pub confidence_threshold: f64,
  pub from_name: String,
  pub to_name: String,
  pub class_mapping: ClassMapping,
  pub units: CoordinateUnits,
}

impl Default for NormalizerConfig {
  fn default() -> Self {
    Self {
      model_version: "1.0.0".to_string(),
      confidence_threshold: 0.25,
      from_name: "label".to_string(),
      to_name: "image".to_string(),
      class_mapping: ClassMapping::default(),
      units: CoordinateUnits::Percent,
    }
  }
}

pub struct AnnotationNormalizer {
  config: NormalizerConfig,
}

impl AnnotationNormalizer {
  pub fn new(config: NormalizerConfig) -> Self {
    Self { config }
  }

  pub fn empty_prediction(&self) -> TaskPrediction {
    TaskPrediction::empty(&self.config.model_version)
  }

  pub fn normalize(
    &self,
    result: Option<&DetectionResultSet>,
  ) -> Result<TaskPrediction, NormalizeError> {
    let Some(result) = result.filter(|r| !r.is_empty()) else {
      info!("没有可转换的检测结果");
      return Ok(self.empty_prediction());
    };
    let Some(modality) = result.modality() else {
      warn!("检测结果中既没有轮廓也没有检测框");
      return Ok(self.empty_prediction());
    };

    let instances = result.instances()?;
    debug!("{:?} 模式, 共 {} 个实例", modality, instances.len());

    let records: Vec<AnnotationRecord> = instances
      .iter()
      .filter(|det| self.keep(det))
      .filter_map(|det| {
        let label = self.config.class_mapping.resolve(det.class_id, &result.names);
        match modality {
          Modality::Polygon => self.polygon_record(det, label),
          Modality::Rectangle => self.rectangle_record(det, label),
        }
      })
      .collect();

    let prediction = TaskPrediction::from_records(&self.config.model_version, records);
    info!(
      "转换完成: {} 条记录, 平均分数 {:.3}",
      prediction.result.len(),
      prediction.score
    );
    Ok(prediction)
  }

  /// 只有严格低于阈值时才丢弃
  fn keep(&self, det: &RawDetection) -> bool {
    if det.confidence < self.config.confidence_threshold {
      debug!(
        "跳过实例 {}: 置信度 {:.3} < 阈值 {}",
        det.index, det.confidence, self.config.confidence_threshold
      );
      return false;
    }
    true
  }

  fn polygon_record(&self, det: &RawDetection, label: String) -> Option<AnnotationRecord> {
    let points = match det.polygon.as_deref() {
      Some(points) if !points.is_empty() => points,
      _ => {
        warn!("实例 {} 没有轮廓点, 已跳过", det.index);
        return None;
      }
    };

    debug!(
      "实例 {}: {} ({:.3}), {} 个轮廓点",
      det.index,
      label,
      det.confidence,
      points.len()
    );
    Some(AnnotationRecord::polygon(
      &self.config.from_name,
      &self.config.to_name,
      label,
      scale_polygon(points, self.config.units.factor()),
      det.confidence,
    ))
  }

  fn rectangle_record(&self, det: &RawDetection, label: String) -> Option<AnnotationRecord> {
    let Some(bbox) = det.bbox else {
      warn!("实例 {} 没有检测框坐标, 已跳过", det.index);
      return None;
    };

    let rect = center_to_corner(bbox, self.config.units.factor());
    debug!(
      "实例 {}: {} ({:.3}), x={:.1} y={:.1} w={:.1} h={:.1}",
      det.index, label, det.confidence, rect[0], rect[1], rect[2], rect[3]
    );
    Some(AnnotationRecord::rectangle(
      &self.config.from_name,
      &self.config.to_name,
      label,
      rect,
      det.confidence,
    ))
  }
}

/// 逐点缩放，保持点的顺序
pub fn scale_polygon(points: &[[f64; 2]], factor: f64) -> Vec<[f64; 2]> {
  points
    .iter()
    .map(|[x, y]| [x * factor, y * factor])
    .collect()
}

/// 中心点形式 [cx, cy, w, h] 转为左上角形式 [x, y, w, h]
pub fn center_to_corner([cx, cy, w, h]: [f64; 4], factor: f64) -> [f64; 4] {
  [
    (cx - w / 2.0) * factor,
    (cy - h / 2.0) * factor,
    w * factor,
    h * factor,
  ]
}
