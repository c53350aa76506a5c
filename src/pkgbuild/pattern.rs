//! Shell pattern operators: `${name#pat}`, `${name%pat}` and `${name/pat/rep}`

use glob::Pattern;

/// Where `${name/pat/rep}` is allowed to match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
  Anywhere,
  /// `${name/#pat/rep}`
  Start,
  /// `${name/%pat/rep}`
  End,
}

/// Byte offsets of every char boundary, including the end
fn boundaries(value: &str) -> Vec<usize> {
  value.char_indices().map(|(i, _)| i).chain(std::iter::once(value.len())).collect()
}

/// `${name#pat}` (shortest) and `${name##pat}` (longest)
pub fn strip_prefix(value: &str, pattern: &Pattern, longest: bool) -> String {
  let bounds = boundaries(value);
  let hit = |i: &usize| pattern.matches(&value[..*i]);
  let found = if longest {
    bounds.iter().rev().copied().find(|i| hit(i))
  } else {
    bounds.iter().copied().find(|i| hit(i))
  };
  match found {
    Some(i) => value[i..].to_string(),
    None => value.to_string(),
  }
}

/// `${name%pat}` (shortest) and `${name%%pat}` (longest)
pub fn strip_suffix(value: &str, pattern: &Pattern, longest: bool) -> String {
  let bounds = boundaries(value);
  let hit = |i: &usize| pattern.matches(&value[*i..]);
  let found = if longest {
    bounds.iter().copied().find(|i| hit(i))
  } else {
    bounds.iter().rev().copied().find(|i| hit(i))
  };
  match found {
    Some(i) => value[..i].to_string(),
    None => value.to_string(),
  }
}

/// `${name/pat/rep}` and `${name//pat/rep}`; each match is the longest one
/// starting at the leftmost position
pub fn replace(value: &str, pattern: &Pattern, anchor: Anchor, all: bool, replacement: &str) -> String {
  let bounds = boundaries(value);
  match anchor {
    Anchor::Start => match bounds.iter().rev().find(|&&i| pattern.matches(&value[..i])) {
      Some(&i) => format!("{}{}", replacement, &value[i..]),
      None => value.to_string(),
    },
    Anchor::End => match bounds.iter().find(|&&i| pattern.matches(&value[i..])) {
      Some(&i) => format!("{}{}", &value[..i], replacement),
      None => value.to_string(),
    },
    Anchor::Anywhere => {
      let mut out = String::with_capacity(value.len());
      let mut k = 0;
      while k + 1 < bounds.len() {
        let start = bounds[k];
        let end = bounds[k + 1..]
          .iter()
          .rposition(|&e| pattern.matches(&value[start..e]))
          .map(|offset| k + 1 + offset);
        match end {
          Some(e) => {
            out.push_str(replacement);
            k = e;
            if !all {
              out.push_str(&value[bounds[k]..]);
              return out;
            }
          }
          None => {
            out.push_str(&value[start..bounds[k + 1]]);
            k += 1;
          }
        }
      }
      out
    }
  }
}
