// 该文件是 Biaozhu （标注） 项目的一部分。
// src/annotation.rs - 标注记录输出格式
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

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShapeKind {
  #[serde(rename = "polygonlabels")]
  Polygon,
  #[serde(rename = "rectanglelabels")]
  Rectangle,
}

/// 多边形，坐标为百分比单位
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonValue {
  pub polygonlabels: Vec<String>,
  pub points: Vec<[f64; 2]>,
  pub closed: bool,
}

/// 矩形，左上角原点，百分比单位
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RectangleValue {
  pub rectanglelabels: Vec<String>,
  pub x: f64,
  pub y: f64,
  pub width: f64,
  pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ShapeValue {
  Polygon(PolygonValue),
  Rectangle(RectangleValue),
}

impl ShapeValue {
  pub fn kind(&self) -> ShapeKind {
    match self {
      ShapeValue::Polygon(_) => ShapeKind::Polygon,
      ShapeValue::Rectangle(_) => ShapeKind::Rectangle,
    }
  }

  pub fn labels(&self) -> &[String] {
    match self {
      ShapeValue::Polygon(polygon) => &polygon.polygonlabels,
      ShapeValue::Rectangle(rect) => &rect.rectanglelabels,
    }
  }
}

/// 单条标注记录，创建后不再修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
  pub from_name: String,
  pub to_name: String,
  #[serde(rename = "type")]
  pub kind: ShapeKind,
  pub value: ShapeValue,
  pub score: f64,
}

impl AnnotationRecord {
  pub fn polygon(
    from_name: &str,
    to_name: &str,
    label: String,
    points: Vec<[f64; 2]>,
    score: f64,
  ) -> Self {
    Self {
      from_name: from_name.to_string(),
      to_name: to_name.to_string(),
      kind: ShapeKind::Polygon,
      value: ShapeValue::Polygon(PolygonValue {
        polygonlabels: vec![label],
        points,
        closed: true,
      }),
      score,
    }
  }

  pub fn rectangle(
    from_name: &str,
    to_name: &str,
    label: String,
    [x, y, width, height]: [f64; 4],
    score: f64,
  ) -> Self {
    Self {
      from_name: from_name.to_string(),
      to_name: to_name.to_string(),
      kind: ShapeKind::Rectangle,
      value: ShapeValue::Rectangle(RectangleValue {
        rectanglelabels: vec![label],
        x,
        y,
        width,
        height,
      }),
      score,
    }
  }
}

/// 单个任务的预测结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPrediction {
  pub model_version: String,
  pub score: f64,
  pub result: Vec<AnnotationRecord>,
}

impl TaskPrediction {
  /// 空结果，分数为 0
  pub fn empty(model_version: &str) -> Self {
    Self {
      model_version: model_version.to_string(),
      score: 0.0,
      result: Vec::new(),
    }
  }

  /// 以保留记录的置信度均值作为任务分数
  pub fn from_records(model_version: &str, result: Vec<AnnotationRecord>) -> Self {
    let score = if result.is_empty() {
      0.0
    } else {
      result.iter().map(|record| record.score).sum::<f64>() / result.len() as f64
    };

    Self {
      model_version: model_version.to_string(),
      score,
      result,
    }
  }

  pub fn is_empty(&self) -> bool {
    self.result.is_empty()
  }
}
