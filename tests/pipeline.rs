// 该文件是 Chepai （车牌） 项目的一部分。
// tests/pipeline.rs - 流水线与批处理集成测试
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

use std::collections::VecDeque;
use std::sync::Mutex;

use image::{Rgb, RgbImage};

use chepai::{
  codec::CharacterCodec,
  geometry::BBox,
  model::{DetectItem, DetectResult, Model},
  pipeline::{DetectionRecognitionPipeline, PipelineConfig, Stage},
  task::{BatchOutcome, BatchRunner, MediaOutcome, OneShotTask, TaskError},
};

#[derive(Debug, thiserror::Error)]
#[error("mock failure")]
struct MockError;

/// 每次调用依次返回预设结果，队列耗尽后返回空结果
struct MockModel {
  script: Mutex<VecDeque<Vec<DetectItem>>>,
}

impl MockModel {
  fn new(script: Vec<Vec<DetectItem>>) -> Self {
    Self {
      script: Mutex::new(script.into()),
    }
  }

  fn repeat(items: Vec<DetectItem>, times: usize) -> Self {
    Self::new(vec![items; times])
  }
}

impl Model for MockModel {
  type Input = RgbImage;
  type Output = DetectResult;
  type Error = MockError;

  fn infer(&self, _input: &RgbImage) -> Result<DetectResult, MockError> {
    let mut script = self.script.lock().map_err(|_| MockError)?;
    Ok(script.pop_front().unwrap_or_default().into())
  }
}

fn item(class_id: u32, x1: f32, y1: f32, x2: f32, y2: f32) -> DetectItem {
  DetectItem::new(class_id, 0.9, BBox::new(x1, y1, x2, y2))
}

fn codec() -> CharacterCodec {
  CharacterCodec::from_symbols(["A", "B", "C", "D"]).unwrap()
}

fn sample_image() -> RgbImage {
  RgbImage::from_fn(160, 120, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]))
}

#[test]
fn no_plates_leaves_image_untouched() {
  let pipeline = DetectionRecognitionPipeline::new(
    MockModel::new(vec![]),
    MockModel::new(vec![]),
    codec(),
    PipelineConfig::default(),
  );
  let image = sample_image();
  let reading = pipeline.process_image(&image).unwrap();
  assert_eq!(reading.text, "");
  assert!(reading.plates.is_empty());
  assert_eq!(reading.image, image);
}

#[test]
fn characters_are_read_left_to_right() {
  let pipeline = DetectionRecognitionPipeline::new(
    MockModel::new(vec![vec![item(0, 20.0, 60.0, 120.0, 100.0)]]),
    MockModel::new(vec![vec![
      item(0, 50.0, 5.0, 60.0, 30.0),
      item(1, 10.0, 5.0, 20.0, 30.0),
      item(2, 30.0, 5.0, 40.0, 30.0),
    ]]),
    CharacterCodec::from_symbols(["A", "B", "C"]).unwrap(),
    PipelineConfig::default(),
  );
  let image = sample_image();
  let reading = pipeline.process_image(&image).unwrap();
  assert_eq!(reading.text, "BCA");
  assert_eq!(reading.plates.len(), 1);
  assert_eq!(reading.image.dimensions(), image.dimensions());
  assert_ne!(reading.image, image);
  // 框外的像素不受影响
  assert_eq!(reading.image.get_pixel(150, 110), image.get_pixel(150, 110));
}

#[test]
fn plates_are_joined_in_detector_order() {
  let pipeline = DetectionRecognitionPipeline::new(
    MockModel::new(vec![vec![
      item(0, 90.0, 70.0, 150.0, 100.0),
      item(0, 10.0, 70.0, 70.0, 100.0),
    ]]),
    MockModel::new(vec![
      vec![item(1, 20.0, 2.0, 30.0, 20.0), item(0, 5.0, 2.0, 15.0, 20.0)],
      vec![item(3, 30.0, 2.0, 40.0, 20.0), item(2, 5.0, 2.0, 15.0, 20.0)],
    ]),
    codec(),
    PipelineConfig::default(),
  );
  let reading = pipeline.process_image(&sample_image()).unwrap();
  assert_eq!(reading.text, "AB CD");
  assert_eq!(reading.plates[0].region.crop.x, 90);
  assert_eq!(reading.plates[1].region.crop.x, 10);
}

#[test]
fn plate_boxes_past_the_frame_are_clipped() {
  let pipeline = DetectionRecognitionPipeline::new(
    MockModel::new(vec![vec![
      item(0, 10.0, 10.0, 200000.0, 200000.0),
      item(0, -3e9, 100.0, 3e9, 110.0),
    ]]),
    MockModel::new(vec![
      vec![item(1, 5.0, 5.0, 15.0, 30.0)],
      vec![item(2, 5.0, 1.0, 15.0, 8.0)],
    ]),
    codec(),
    PipelineConfig::default(),
  );
  let image = sample_image();
  let reading = pipeline.process_image(&image).unwrap();
  assert_eq!(reading.text, "B C");
  assert_eq!(reading.image.dimensions(), image.dimensions());
  let crop = &reading.plates[0].region.crop;
  assert_eq!((crop.x, crop.y, crop.width, crop.height), (10, 10, 150, 110));
}

#[test]
fn batch_contains_per_file_failures() {
  let input = tempfile::tempdir().unwrap();
  let output = tempfile::tempdir().unwrap();
  sample_image().save(input.path().join("a.png")).unwrap();
  std::fs::write(input.path().join("b.jpg"), b"definitely not a jpeg").unwrap();
  sample_image().save(input.path().join("c.png")).unwrap();
  std::fs::write(input.path().join("notes.txt"), b"ignored").unwrap();

  let pipeline = DetectionRecognitionPipeline::new(
    MockModel::repeat(vec![item(0, 20.0, 60.0, 120.0, 100.0)], 2),
    MockModel::repeat(vec![item(3, 5.0, 5.0, 15.0, 30.0)], 2),
    codec(),
    PipelineConfig::default(),
  );
  let out_dir = output.path().join("annotated");
  let report = BatchRunner::default()
    .with_workers(2)
    .run(input.path(), &out_dir, &pipeline)
    .unwrap();

  let names: Vec<&str> = report.items.iter().map(|i| i.file_name.as_str()).collect();
  assert_eq!(names, ["a.png", "b.jpg", "c.png"]);
  assert_eq!(report.succeeded(), 2);
  assert_eq!(report.failed(), 1);

  match &report.items[1].outcome {
    BatchOutcome::Failed { stage, .. } => assert_eq!(stage, &Stage::LoadImage.to_string()),
    other => panic!("unexpected outcome: {other:?}"),
  }
  assert_eq!(report.items[0].text(), Some("D"));
  assert_eq!(report.items[2].text(), Some("D"));
  assert!(out_dir.join("a.png").is_file());
  assert!(!out_dir.join("b.jpg").exists());
  assert!(out_dir.join("c.png").is_file());

  let report_path = output.path().join("report.json");
  report.write_json(&report_path).unwrap();
  let json: serde_json::Value =
    serde_json::from_str(&std::fs::read_to_string(report_path).unwrap()).unwrap();
  assert_eq!(json["total"], 3);
  assert_eq!(json["failed"], 1);
  assert_eq!(json["items"][0]["text"], "D");
  assert_eq!(json["items"][1]["file"], "b.jpg");
  assert!(json["items"][1]["error"].is_string());
}

#[test]
fn batch_fails_on_missing_input_directory() {
  let dir = tempfile::tempdir().unwrap();
  let pipeline = DetectionRecognitionPipeline::new(
    MockModel::new(vec![]),
    MockModel::new(vec![]),
    codec(),
    PipelineConfig::default(),
  );
  let result = BatchRunner::default().run(
    &dir.path().join("missing"),
    &dir.path().join("out"),
    &pipeline,
  );
  assert!(matches!(result, Err(TaskError::Input(_))));
}

#[test]
fn oneshot_dispatches_by_extension() {
  let dir = tempfile::tempdir().unwrap();
  let input = dir.path().join("car.png");
  sample_image().save(&input).unwrap();
  let pipeline = DetectionRecognitionPipeline::new(
    MockModel::new(vec![vec![item(0, 20.0, 60.0, 120.0, 100.0)]]),
    MockModel::new(vec![vec![item(2, 5.0, 5.0, 15.0, 30.0)]]),
    codec(),
    PipelineConfig::default(),
  );

  let output = dir.path().join("out/car.png");
  let outcome = OneShotTask::default()
    .run(&input, &output, &pipeline)
    .unwrap();
  assert_eq!(
    outcome,
    MediaOutcome::Image {
      text: "C".to_string(),
      output: output.clone(),
    }
  );
  assert!(output.is_file());

  let text = dir.path().join("car.gif");
  std::fs::write(&text, b"").unwrap();
  assert!(matches!(
    OneShotTask::default().run(&text, &output, &pipeline),
    Err(TaskError::Input(_))
  ));
}
