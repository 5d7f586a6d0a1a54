// 该文件是 Chepai （车牌） 项目的一部分。
// src/codec.rs - 字符类别编解码
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

//! 识别模型类别编号与车牌字符之间的双向映射。
//!
//! 正向表是 `编号 -> 符号` 的有序列表，反向表在构造时一次性生成且之后不再修改。
//! 解码时遇到未知编号返回空字符串：一次误检只会让结果少一个字符，
//! 不会中断整个流程。

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;
use tracing::debug;

/// 训练识别模型时使用的伊朗车牌字符表，下标即类别编号
pub const PERSIAN_PLATE_SYMBOLS: [&str; 39] = [
  "۰",
  "۱",
  "۲",
  "۳",
  "۴",
  "۵",
  "۶",
  "۷",
  "۸",
  "۹",
  "D",
  "S",
  "الف",
  "ب",
  "ت",
  "تشریفات",
  "ث",
  "ج",
  "د",
  "ز",
  "س",
  "ش",
  "ص",
  "ط",
  "ظ",
  "ع",
  "ف",
  "ق",
  "ل",
  "م",
  "ن",
  "ه",
  "ه\u{200d}",
  "و",
  "پ",
  "ژ (معلولین و جانبازان)",
  "ک",
  "گ",
  "ی",
];

#[derive(Error, Debug)]
pub enum CodecError {
  #[error("字符表中存在重复符号 '{symbol}'（编号 {first} 与 {second}）")]
  DuplicateSymbol {
    symbol: String,
    first: u32,
    second: u32,
  },
  #[error("字符表为空")]
  Empty,
  #[error("无法读取字符表文件: {0}")]
  IoError(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct CharacterCodec {
  symbols: Vec<String>,
  index: HashMap<String, u32>,
}

impl Default for CharacterCodec {
  fn default() -> Self {
    Self::persian()
  }
}

impl CharacterCodec {
  /// 默认的波斯车牌字符表
  pub fn persian() -> Self {
    let symbols: Vec<String> = PERSIAN_PLATE_SYMBOLS.iter().map(|s| s.to_string()).collect();
    // 内置表没有重复项
    let index = build_index(&symbols).unwrap_or_default();
    Self { symbols, index }
  }

  /// 由有序符号列表构造，第 i 个符号对应类别 i。重复符号会破坏双射，直接拒绝。
  pub fn from_symbols<I, S>(symbols: I) -> Result<Self, CodecError>
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let symbols: Vec<String> = symbols.into_iter().map(Into::into).collect();
    if symbols.is_empty() {
      return Err(CodecError::Empty);
    }
    let index = build_index(&symbols)?;
    Ok(Self { symbols, index })
  }

  /// 从文本文件加载字符表，每行一个符号，忽略空行
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CodecError> {
    let content = std::fs::read_to_string(path.as_ref())?;
    let codec = Self::from_symbols(
      content
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty()),
    )?;
    debug!(
      "从 {} 加载字符表，共 {} 个符号",
      path.as_ref().display(),
      codec.len()
    );
    Ok(codec)
  }

  /// 类别编号 -> 符号，未知编号返回空字符串
  pub fn decode(&self, class_index: u32) -> &str {
    self
      .symbols
      .get(class_index as usize)
      .map(String::as_str)
      .unwrap_or("")
  }

  /// 符号 -> 类别编号，仅供数据集工具使用
  pub fn encode(&self, symbol: &str) -> Option<u32> {
    self.index.get(symbol).copied()
  }

  pub fn len(&self) -> usize {
    self.symbols.len()
  }

  pub fn is_empty(&self) -> bool {
    self.symbols.is_empty()
  }

  pub fn symbols(&self) -> impl Iterator<Item = &str> {
    self.symbols.iter().map(String::as_str)
  }
}

fn build_index(symbols: &[String]) -> Result<HashMap<String, u32>, CodecError> {
  let mut index = HashMap::with_capacity(symbols.len());
  for (i, symbol) in symbols.iter().enumerate() {
    if let Some(first) = index.insert(symbol.clone(), i as u32) {
      return Err(CodecError::DuplicateSymbol {
        symbol: symbol.clone(),
        first,
        second: i as u32,
      });
    }
  }
  Ok(index)
}
