// 该文件是 Biaozhu （标注） 项目的一部分。
// src/task.rs - 标注任务与预测请求定义
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

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::annotation::TaskPrediction;

/// 任务标识，平台一般给出整数，这里也接受字符串
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskId {
  Number(u64),
  Text(String),
}

impl fmt::Display for TaskId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TaskId::Number(id) => write!(f, "{}", id),
      TaskId::Text(id) => f.write_str(id),
    }
  }
}

impl From<u64> for TaskId {
  fn from(id: u64) -> Self {
    TaskId::Number(id)
  }
}

/// 平台下发的单个标注任务，在一次预测调用中保持不变
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelTask {
  #[serde(default)]
  pub id: Option<TaskId>,
  #[serde(default)]
  pub data: Map<String, Value>,
}

impl LabelTask {
  pub fn new(id: impl Into<TaskId>) -> Self {
    Self {
      id: Some(id.into()),
      data: Map::new(),
    }
  }

  pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
    self.data.insert(key.to_string(), value.into());
    self
  }

  /// 读取字符串类型的数据字段，其他类型视为不存在
  pub fn text_field(&self, key: &str) -> Option<&str> {
    self.data.get(key).and_then(Value::as_str)
  }

  /// 日志用的任务标识
  pub fn display_id(&self) -> String {
    self
      .id
      .as_ref()
      .map(ToString::to_string)
      .unwrap_or_else(|| "unknown".to_string())
  }
}

/// `/predict` 请求体，只关心任务列表，其余字段忽略
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PredictRequest {
  #[serde(default)]
  pub tasks: Vec<LabelTask>,
  #[serde(default)]
  pub project: Option<Value>,
}

/// `/predict` 响应体，`results` 与请求中的任务一一对应
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictResponse {
  pub results: Vec<TaskPrediction>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_request_ignores_unknown_fields() {
    let body = r#"{
      "tasks": [{
        "id": 999,
        "data": {"image": "/tmp/a.png"},
        "meta": {},
        "is_labeled": false,
        "annotations": []
      }],
      "project": "3.1747795083",
      "label_config": "<View/>",
      "params": {"login": null}
    }"#;

    let request: PredictRequest = serde_json::from_str(body).unwrap();
    assert_eq!(request.tasks.len(), 1);
    assert_eq!(request.tasks[0].id, Some(TaskId::Number(999)));
    assert_eq!(request.tasks[0].text_field("image"), Some("/tmp/a.png"));
    assert_eq!(
      request.project.as_ref().and_then(Value::as_str),
      Some("3.1747795083")
    );
  }

  #[test]
  fn non_string_fields_are_not_text() {
    let task = LabelTask::new(1).with_field("image", 42);
    assert_eq!(task.text_field("image"), None);
    assert_eq!(task.text_field("photo"), None);
  }

  #[test]
  fn task_id_accepts_strings() {
    let task: LabelTask = serde_json::from_str(r#"{"id": "abc", "data": {}}"#).unwrap();
    assert_eq!(task.display_id(), "abc");
    assert_eq!(LabelTask::default().display_id(), "unknown");
  }
}
