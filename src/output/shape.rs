// 该文件是 Chepai （车牌） 项目的一部分。
// src/output/shape.rs - 文本整形
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

//! 阿拉伯字母文字的连写整形。
//!
//! `ab_glyph` 只做逐字形排版，不处理上下文连写，因此在测量与绘制之前
//! 把字母替换为表现形式区（U+FB50..U+FEFF）中对应的独立、词首、词中、词尾字形。

/// 文本整形选项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextShaping {
  /// 替换为上下文连写字形
  pub reshape: bool,
  /// 把从右向左的字母段倒序，以便按从左到右逐字绘制
  pub visual_order: bool,
}

impl Default for TextShaping {
  fn default() -> Self {
    Self {
      reshape: true,
      visual_order: false,
    }
  }
}

impl TextShaping {
  pub fn identity() -> Self {
    Self {
      reshape: false,
      visual_order: false,
    }
  }

  pub fn apply(&self, text: &str) -> String {
    let mut out = if self.reshape {
      reshape(text)
    } else {
      text.to_string()
    };
    if self.visual_order {
      out = visual_order(&out);
    }
    out
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Joining {
  /// 两侧都可连写
  Dual,
  /// 只与前一个字母连写
  Right,
  /// 零宽连接符，强制两侧连写
  Causing,
  /// 附标，查找相邻字母时跳过
  Transparent,
  None,
}

/// `(字母, 独立, 词尾, 词首, 词中)`，只与前字连写的字母没有词首和词中形式
type Forms = (char, char, char, Option<char>, Option<char>);

const fn dual(c: char, base: u32) -> Forms {
  match (
    char::from_u32(base),
    char::from_u32(base + 1),
    char::from_u32(base + 2),
    char::from_u32(base + 3),
  ) {
    (Some(i), Some(f), Some(s), Some(m)) => (c, i, f, Some(s), Some(m)),
    _ => (c, c, c, None, None),
  }
}

const fn right(c: char, base: u32) -> Forms {
  match (char::from_u32(base), char::from_u32(base + 1)) {
    (Some(i), Some(f)) => (c, i, f, None, None),
    _ => (c, c, c, None, None),
  }
}

const FORMS: &[Forms] = &[
  right('\u{0622}', 0xfe81),
  right('\u{0623}', 0xfe83),
  right('\u{0624}', 0xfe85),
  right('\u{0625}', 0xfe87),
  dual('\u{0626}', 0xfe89),
  right('\u{0627}', 0xfe8d),
  dual('\u{0628}', 0xfe8f),
  right('\u{0629}', 0xfe93),
  dual('\u{062a}', 0xfe95),
  dual('\u{062b}', 0xfe99),
  dual('\u{062c}', 0xfe9d),
  dual('\u{062d}', 0xfea1),
  dual('\u{062e}', 0xfea5),
  right('\u{062f}', 0xfea9),
  right('\u{0630}', 0xfeab),
  right('\u{0631}', 0xfead),
  right('\u{0632}', 0xfeaf),
  dual('\u{0633}', 0xfeb1),
  dual('\u{0634}', 0xfeb5),
  dual('\u{0635}', 0xfeb9),
  dual('\u{0636}', 0xfebd),
  dual('\u{0637}', 0xfec1),
  dual('\u{0638}', 0xfec5),
  dual('\u{0639}', 0xfec9),
  dual('\u{063a}', 0xfecd),
  dual('\u{0641}', 0xfed1),
  dual('\u{0642}', 0xfed5),
  dual('\u{0643}', 0xfed9),
  dual('\u{0644}', 0xfedd),
  dual('\u{0645}', 0xfee1),
  dual('\u{0646}', 0xfee5),
  dual('\u{0647}', 0xfee9),
  right('\u{0648}', 0xfeed),
  right('\u{0649}', 0xfeef),
  dual('\u{064a}', 0xfef1),
  dual('\u{067e}', 0xfb56),
  dual('\u{0686}', 0xfb7a),
  right('\u{0698}', 0xfb8a),
  dual('\u{06a9}', 0xfb8e),
  dual('\u{06af}', 0xfb92),
  dual('\u{06cc}', 0xfbfc),
];

const LAM: char = '\u{0644}';
const ZWJ: char = '\u{200d}';

/// 拉姆与各种阿里夫的合字 `(阿里夫, 独立, 词尾)`
const LAM_ALEF: &[(char, char, char)] = &[
  ('\u{0622}', '\u{fef5}', '\u{fef6}'),
  ('\u{0623}', '\u{fef7}', '\u{fef8}'),
  ('\u{0625}', '\u{fef9}', '\u{fefa}'),
  ('\u{0627}', '\u{fefb}', '\u{fefc}'),
];

fn forms(c: char) -> Option<&'static Forms> {
  FORMS.iter().find(|f| f.0 == c)
}

fn joining(c: char) -> Joining {
  match c {
    ZWJ => Joining::Causing,
    '\u{064b}'..='\u{065f}' | '\u{0670}' => Joining::Transparent,
    _ => match forms(c) {
      Some((_, _, _, Some(_), _)) => Joining::Dual,
      Some(_) => Joining::Right,
      None => Joining::None,
    },
  }
}

fn joins_forward(j: Joining) -> bool {
  matches!(j, Joining::Dual | Joining::Causing)
}

fn joins_backward(j: Joining) -> bool {
  matches!(j, Joining::Dual | Joining::Right | Joining::Causing)
}

/// 把阿拉伯字母替换为上下文表现形式，并合成拉姆-阿里夫合字。
/// 零宽连接符参与连写判断，之后被移除。
pub fn reshape(text: &str) -> String {
  let chars: Vec<char> = text.chars().collect();
  let kinds: Vec<Joining> = chars.iter().map(|&c| joining(c)).collect();

  let neighbour = |from: usize, forward: bool| -> Option<usize> {
    if forward {
      (from + 1..chars.len()).find(|&j| kinds[j] != Joining::Transparent)
    } else {
      (0..from).rev().find(|&j| kinds[j] != Joining::Transparent)
    }
  };

  let mut out = String::with_capacity(text.len());
  let mut i = 0;
  while i < chars.len() {
    let c = chars[i];
    let kind = kinds[i];
    let Some(&(_, isolated, last, initial, middle)) = forms(c) else {
      if c != ZWJ {
        out.push(c);
      }
      i += 1;
      continue;
    };

    let prev = neighbour(i, false).map(|j| kinds[j]);
    let joined_before = prev.is_some_and(joins_forward) && joins_backward(kind);

    if c == LAM
      && let Some(j) = neighbour(i, true)
      && let Some(&(_, lig_isolated, lig_final)) = LAM_ALEF.iter().find(|l| l.0 == chars[j])
    {
      out.push(if joined_before { lig_final } else { lig_isolated });
      chars[i + 1..j].iter().for_each(|&m| out.push(m));
      i = j + 1;
      continue;
    }

    let next = neighbour(i, true).map(|j| kinds[j]);
    let joined_after = joins_forward(kind) && next.is_some_and(joins_backward);

    let shaped = match (joined_before, joined_after) {
      (false, false) => isolated,
      (true, false) => last,
      (false, true) => initial.unwrap_or(isolated),
      (true, true) => middle.unwrap_or(last),
    };
    out.push(shaped);
    i += 1;
  }
  out
}

fn is_rtl(c: char) -> bool {
  let is_digit = matches!(c, '\u{0660}'..='\u{0669}' | '\u{06f0}'..='\u{06f9}');
  !is_digit
    && matches!(
      c,
      '\u{0590}'..='\u{08ff}' | '\u{fb1d}'..='\u{fdff}' | '\u{fe70}'..='\u{feff}'
    )
}

/// 从左到右的段落中，把连续的从右向左字母段倒序。
/// 段内夹着的空白随段一起倒序，数字保持原有顺序。
pub fn visual_order(text: &str) -> String {
  let chars: Vec<char> = text.chars().collect();
  let mut out = String::with_capacity(text.len());
  let mut i = 0;
  while i < chars.len() {
    if !is_rtl(chars[i]) {
      out.push(chars[i]);
      i += 1;
      continue;
    }

    let mut end = i + 1;
    let mut last_rtl = i;
    while end < chars.len() && (is_rtl(chars[end]) || chars[end].is_whitespace()) {
      if is_rtl(chars[end]) {
        last_rtl = end;
      }
      end += 1;
    }
    chars[i..=last_rtl].iter().rev().for_each(|&c| out.push(c));
    i = last_rtl + 1;
  }
  out
}
