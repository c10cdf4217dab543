use std::cmp::Ordering;
use std::cmp::Ordering::{Equal, Greater, Less};

/// Tolerance used when comparing parsed floats.
pub(crate) const EPSILON: f32 = 0.00001;

/// Extensions to orderings.
pub(crate) trait OrderingExt {
  /// Lexicographically chains comparisions.
  fn lexico<F: FnOnce() -> Ordering>(self, f: F) -> Self;
}

impl OrderingExt for Ordering {
  fn lexico<F: FnOnce() -> Ordering>(self, f: F) -> Ordering {
    match self {
      Less | Greater => self,
      Equal => f(),
    }
  }
}

pub(crate) fn fuzzy_cmp(a: f32, b: f32, delta: f32) -> Ordering {
  if (a - b).abs() <= delta {
    Equal
  } else if a < b {
    Less
  } else {
    Greater
  }
}

/// Compares two equally sized float tuples element by element.
pub(crate) fn fuzzy_cmp_slice(a: &[f32], b: &[f32]) -> Ordering {
  a.iter()
    .zip(b)
    .fold(a.len().cmp(&b.len()), |ord, (&x, &y)| {
      ord.lexico(|| fuzzy_cmp(x, y, EPSILON))
    })
}

#[test]
fn test_fuzzy_cmp_slice() {
  assert_eq!(fuzzy_cmp_slice(&[1., 2.], &[1., 2.000001]), Equal);
  assert_eq!(fuzzy_cmp_slice(&[1., 2.], &[1., 3.]), Less);
  assert_eq!(fuzzy_cmp_slice(&[2., 0.], &[1., 3.]), Greater);
}
