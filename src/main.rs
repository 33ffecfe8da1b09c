// 该文件是 Biaozhu （标注） 项目的一部分。
// src/main.rs - 项目主程序
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::io::{Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

use biaozhu::{
  FromUrl,
  config::BackendConfig,
  locator::ImageLocator,
  model::SidecarDetector,
  normalize::AnnotationNormalizer,
  platform::{HttpDownloader, LocalFilesResolver},
  predict::Predictor,
  task::{PredictRequest, PredictResponse},
};

/// Biaozhu 预测后端：读取预测请求，输出标注结果
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 检测器地址，例如 sidecar:///srv/detections
  #[arg(long, env = "MODEL_URL", value_name = "MODEL")]
  pub model: Url,
  /// 预测请求文件，`-` 表示标准输入
  #[arg(long, default_value = "-", value_name = "REQUEST")]
  pub input: String,
  /// 预测结果文件，`-` 表示标准输出
  #[arg(long, default_value = "-", value_name = "OUTPUT")]
  pub output: String,

  #[command(flatten)]
  pub backend: BackendConfig,
}

fn read_request(input: &str) -> Result<PredictRequest> {
  let content = if input == "-" {
    let mut content = String::new();
    std::io::stdin()
      .read_to_string(&mut content)
      .context("无法读取标准输入")?;
    content
  } else {
    std::fs::read_to_string(input).with_context(|| format!("无法读取请求文件: {}", input))?
  };
  serde_json::from_str(&content).context("预测请求格式错误")
}

fn write_response(output: &str, response: &PredictResponse) -> Result<()> {
  let body = serde_json::to_string_pretty(response)?;
  if output == "-" {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", body)?;
  } else {
    std::fs::write(output, body).with_context(|| format!("无法写入结果文件: {}", output))?;
  }
  Ok(())
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();
  let backend = &args.backend;

  info!("检测器地址: {}", args.model);
  info!("模型版本: {}", backend.model_version);
  info!("置信度阈值: {}", backend.confidence_threshold);
  info!("IOU 阈值: {}", backend.iou_threshold);
  info!("输入尺寸: {}", backend.image_size);
  info!("最大检测数: {}", backend.max_detections);
  info!("推理设备: {}", backend.device);
  info!("类别映射: {:?}", backend.class_mapping);

  let detector = SidecarDetector::from_url(&args.model)?;

  let mut downloader = HttpDownloader::new(backend.cache_dir())?;
  if let Some(platform_url) = &backend.label_studio_url {
    downloader = downloader.with_platform(platform_url, backend.label_studio_api_key.clone());
  }
  let resolver = LocalFilesResolver::new(backend.local_files_document_root.clone());

  let home = std::env::var_os("HOME").map(PathBuf::from);
  let locator_config = backend.locator_config(home.as_deref());
  info!("候选根目录: {:?}", locator_config.candidate_roots);

  let predictor = Predictor::new(
    ImageLocator::new(locator_config, downloader, resolver),
    detector,
    AnnotationNormalizer::new(backend.normalizer_config()),
    backend.inference_params(),
  );

  let request = read_request(&args.input)?;
  if let Some(project) = &request.project {
    info!("项目: {}", project);
  }
  let response = PredictResponse {
    results: predictor.predict(&request.tasks),
  };
  write_response(&args.output, &response)?;

  Ok(())
}
