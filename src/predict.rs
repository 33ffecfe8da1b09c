// 该文件是 Biaozhu （标注） 项目的一部分。
// src/predict.rs - 批量预测流程
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::time::Instant;

use thiserror::Error;
use tracing::{error, info};

use crate::{
  annotation::TaskPrediction,
  locator::{BoxError, ImageLocator, LocateError},
  model::{Detector, InferenceParams},
  normalize::{AnnotationNormalizer, NormalizeError},
  platform::{Downloader, ManagedPathResolver},
  task::LabelTask,
};

#[derive(Error, Debug)]
pub enum PredictError {
  #[error("图像定位失败: {0}")]
  Locate(#[from] LocateError),
  #[error("检测器调用失败: {0}")]
  DetectorInvocation(#[source] BoxError),
  #[error("结果转换失败: {0}")]
  Normalization(#[from] NormalizeError),
}

/// 定位 -> 推理 -> 转换，逐个任务顺序执行
pub struct Predictor<M, D, R> {
  locator: ImageLocator<D, R>,
  detector: M,
  normalizer: AnnotationNormalizer,
  params: InferenceParams,
}

impl<M, D, R> Predictor<M, D, R>
where
  M: Detector,
  D: Downloader,
  R: ManagedPathResolver,
{
  pub fn new(
    locator: ImageLocator<D, R>,
    detector: M,
    normalizer: AnnotationNormalizer,
    params: InferenceParams,
  ) -> Self {
    Self {
      locator,
      detector,
      normalizer,
      params,
    }
  }

  /// 处理单个任务，失败原因保留在错误中
  pub fn predict_task(&self, task: &LabelTask) -> Result<TaskPrediction, PredictError> {
    let image = self.locator.resolve(task)?;

    info!(
      "开始推理: conf={}, iou={}, imgsz={}, max_det={}",
      self.params.confidence_threshold,
      self.params.iou_threshold,
      self.params.image_size,
      self.params.max_detections
    );
    let now = Instant::now();
    let result = self
      .detector
      .detect(&image, &self.params)
      .map_err(|e| PredictError::DetectorInvocation(Box::new(e)))?;
    info!(
      "推理完成，耗时: {:.2?}, 实例数: {}",
      now.elapsed(),
      result.as_ref().map_or(0, |r| r.instance_count())
    );

    Ok(self.normalizer.normalize(result.as_ref())?)
  }

  /// 输出与输入按下标一一对应，失败的任务得到空结果
  pub fn predict(&self, tasks: &[LabelTask]) -> Vec<TaskPrediction> {
    info!("收到 {} 个任务", tasks.len());
    let predictions: Vec<TaskPrediction> = tasks
      .iter()
      .enumerate()
      .map(|(i, task)| {
        info!("处理任务 {}/{}: {}", i + 1, tasks.len(), task.display_id());
        self.predict_task(task).unwrap_or_else(|e| {
          error!("任务 {} 处理失败: {}", task.display_id(), e);
          self.normalizer.empty_prediction()
        })
      })
      .collect();
    info!("预测完成，共 {} 个结果", predictions.len());
    predictions
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::cell::RefCell;
  use std::path::{Path, PathBuf};

  use crate::locator::LocatorConfig;
  use crate::model::{BoxOutput, DetectionResultSet};
  use crate::normalize::NormalizerConfig;
  use crate::task::TaskId;

  #[derive(Debug, thiserror::Error)]
  #[error("{0}")]
  struct FakeError(&'static str);

  struct Offline;

  impl Downloader for Offline {
    type Error = FakeError;
    fn fetch_local(&self, _: &str, _: Option<&TaskId>) -> Result<PathBuf, FakeError> {
      Err(FakeError("offline"))
    }
  }

  impl ManagedPathResolver for Offline {
    type Error = FakeError;
    fn resolve_managed_path(&self, _: &str, _: Option<&TaskId>) -> Result<PathBuf, FakeError> {
      Err(FakeError("offline"))
    }
  }

  /// 文件名包含 "boom" 时报错，包含 "ragged" 时给出长度不一致的数组，
  /// 否则给出一个置信度为 0.5 的检测框
  #[derive(Default)]
  struct ScriptedDetector {
    seen: RefCell<Vec<PathBuf>>,
  }

  impl Detector for ScriptedDetector {
    type Error = FakeError;

    fn detect(
      &self,
      image: &Path,
      _params: &InferenceParams,
    ) -> Result<Option<DetectionResultSet>, FakeError> {
      self.seen.borrow_mut().push(image.to_path_buf());
      if image.to_string_lossy().contains("boom") {
        return Err(FakeError("cuda out of memory"));
      }
      if image.to_string_lossy().contains("ragged") {
        return Ok(Some(DetectionResultSet {
          boxes: Some(BoxOutput {
            conf: Some(vec![0.5]),
            cls: Some(vec![0, 1]),
            xywhn: vec![[0.5, 0.5, 0.2, 0.2]; 2],
          }),
          ..Default::default()
        }));
      }
      Ok(Some(DetectionResultSet {
        boxes: Some(BoxOutput {
          conf: Some(vec![0.5]),
          cls: Some(vec![0]),
          xywhn: vec![[0.5, 0.5, 0.2, 0.2]],
        }),
        ..Default::default()
      }))
    }
  }

  fn predictor(detector: ScriptedDetector) -> Predictor<ScriptedDetector, Offline, Offline> {
    Predictor::new(
      ImageLocator::new(
        LocatorConfig {
          primary_field: "image".to_string(),
          candidate_roots: Vec::new(),
        },
        Offline,
        Offline,
      ),
      detector,
      AnnotationNormalizer::new(NormalizerConfig::default()),
      InferenceParams::default(),
    )
  }

  #[test]
  fn failures_keep_positional_correspondence() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.png");
    let boom = dir.path().join("boom.png");
    std::fs::write(&good, b"png").unwrap();
    std::fs::write(&boom, b"png").unwrap();

    let tasks = vec![
      LabelTask::new(1).with_field("image", good.to_str().unwrap()),
      LabelTask::new(2).with_field("text", "no image"),
      LabelTask::new(3).with_field("image", boom.to_str().unwrap()),
      LabelTask::new(4).with_field("image", "https://host/img.png"),
      LabelTask::new(5).with_field("image", good.to_str().unwrap()),
    ];

    let p = predictor(ScriptedDetector::default());
    let predictions = p.predict(&tasks);

    assert_eq!(predictions.len(), tasks.len());
    let kept: Vec<usize> = predictions.iter().map(|p| p.result.len()).collect();
    assert_eq!(kept, vec![1, 0, 0, 0, 1]);
    assert_eq!(predictions[1].score, 0.0);
    assert_eq!(predictions[2].score, 0.0);
    assert!(predictions.iter().all(|p| p.model_version == "1.0.0"));
    assert_eq!(p.detector.seen.borrow().len(), 3);
  }

  #[test]
  fn predict_task_exposes_failure_kind() {
    let dir = tempfile::tempdir().unwrap();
    let boom = dir.path().join("boom.png");
    std::fs::write(&boom, b"png").unwrap();

    let p = predictor(ScriptedDetector::default());
    assert!(matches!(
      p.predict_task(&LabelTask::new(1)),
      Err(PredictError::Locate(LocateError::NoImageField(_)))
    ));
    assert!(matches!(
      p.predict_task(&LabelTask::new(2).with_field("image", "https://host/a.png")),
      Err(PredictError::Locate(LocateError::DownloadFailed { .. }))
    ));
    assert!(matches!(
      p.predict_task(&LabelTask::new(3).with_field("image", boom.to_str().unwrap())),
      Err(PredictError::DetectorInvocation(_))
    ));
  }

  #[test]
  fn shape_mismatch_only_empties_its_own_task() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.png");
    let ragged = dir.path().join("ragged.png");
    std::fs::write(&good, b"png").unwrap();
    std::fs::write(&ragged, b"png").unwrap();

    let p = predictor(ScriptedDetector::default());
    assert!(matches!(
      p.predict_task(&LabelTask::new(1).with_field("image", ragged.to_str().unwrap())),
      Err(PredictError::Normalization(NormalizeError::ShapeMismatch {
        field: "boxes.conf",
        expected: 2,
        found: 1,
      }))
    ));

    let tasks = vec![
      LabelTask::new(1).with_field("image", good.to_str().unwrap()),
      LabelTask::new(2).with_field("image", ragged.to_str().unwrap()),
      LabelTask::new(3).with_field("image", good.to_str().unwrap()),
    ];
    let predictions = p.predict(&tasks);
    let kept: Vec<usize> = predictions.iter().map(|p| p.result.len()).collect();
    assert_eq!(kept, vec![1, 0, 1]);
    assert_eq!(predictions[1], p.normalizer.empty_prediction());
    assert_eq!(predictions[0].score, 0.5);
  }

  #[test]
  fn empty_batch_is_empty() {
    let p = predictor(ScriptedDetector::default());
    assert!(p.predict(&[]).is_empty());
  }
}
