// 该文件是 Chepai （车牌） 项目的一部分。
// tests/dataset.rs - 数据集工具集成测试
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

use chepai::dataset::{
  LabelDeriver, PLATE_REGION_NAME, YoloConverter, convert_yolo_dir, generate_label_csv,
};

fn annotation(region: [u32; 4], characters: &[(&str, [u32; 4])], with_size: bool) -> String {
  let mut xml = String::from("<?xml version=\"1.0\"?>\n<annotation>\n");
  if with_size {
    xml.push_str("  <size><width>200</width><height>100</height><depth>3</depth></size>\n");
  }
  let mut push = |name: &str, b: [u32; 4]| {
    xml.push_str(&format!(
      "  <object>\n    <name>{}</name>\n    <difficult>0</difficult>\n    <bndbox><xmin>{}</xmin><ymin>{}</ymin><xmax>{}</xmax><ymax>{}</ymax></bndbox>\n  </object>\n",
      name, b[0], b[1], b[2], b[3]
    ));
  };
  push(PLATE_REGION_NAME, region);
  for (name, b) in characters {
    push(name, *b);
  }
  xml.push_str("</annotation>\n");
  xml
}

#[test]
fn dataset_directory_to_csv_and_yolo() {
  let root = tempfile::tempdir().unwrap();
  let xml_dir = root.path().join("xml");
  std::fs::create_dir(&xml_dir).unwrap();

  std::fs::write(
    xml_dir.join("p1.xml"),
    annotation(
      [40, 20, 160, 80],
      &[
        ("۳", [100, 30, 110, 70]),
        ("ب", [70, 30, 90, 70]),
        ("۱", [50, 30, 60, 70]),
        ("۹", [170, 30, 180, 70]),
      ],
      true,
    ),
  )
  .unwrap();
  std::fs::write(
    xml_dir.join("p2.xml"),
    annotation([0, 0, 50, 20], &[("D", [5, 5, 15, 15])], false),
  )
  .unwrap();
  image::RgbImage::new(100, 40)
    .save(xml_dir.join("p2.jpg"))
    .unwrap();
  std::fs::write(xml_dir.join("broken.xml"), "<annotation><object><name>x</name></object></annotation>").unwrap();

  let csv = root.path().join("labels.csv");
  let count = generate_label_csv(
    std::slice::from_ref(&xml_dir),
    &csv,
    &LabelDeriver::default(),
  )
  .unwrap();
  assert_eq!(count, 2);
  assert_eq!(
    std::fs::read_to_string(&csv).unwrap(),
    "image_filename,plate_label\np1.jpg,۱ب۳\np2.jpg,D\n"
  );

  let labels = root.path().join("labels");
  let written = convert_yolo_dir(&xml_dir, &labels, &YoloConverter::default()).unwrap();
  assert_eq!(written, 2);
  assert_eq!(
    std::fs::read_to_string(labels.join("p1.txt")).unwrap(),
    "0 0.500000 0.500000 0.600000 0.600000"
  );
  assert_eq!(
    std::fs::read_to_string(labels.join("p2.txt")).unwrap(),
    "0 0.250000 0.250000 0.500000 0.500000"
  );
  assert!(!labels.join("broken.txt").exists());
}
