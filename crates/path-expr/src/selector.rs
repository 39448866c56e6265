use crate::path::Segment;

/// One step of a compiled path expression.
///
/// Each selector consumes zero or more segments of a concrete [`Path`] when
/// it matches; see [`Selector::consume`].
///
/// [`Path`]: crate::Path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// `$`: matches the synthetic root segment.
    Root,
    /// `.name`, `.*` or `['name']`, optionally followed by a subscript that
    /// selects positions inside the sequence stored under that key.
    Child {
        name: ChildName,
        subscript: Option<Subscript>,
    },
    /// A subscript that is not attached to a named child, e.g. `$.a[0][1]`.
    Subscript(Subscript),
    /// `['a','b']`: matches any of the listed keys.
    Union(Vec<String>),
    /// `..x`: matches the inner selector at any depth below the current one.
    RecursiveDescent(Box<Selector>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildName {
    Key(String),
    /// `*` matches any key and any sequence position.
    Wildcard,
}

/// A sequence subscript with Python-slice semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subscript {
    /// `[*]`
    Wildcard,
    /// `[n]` or `[-n]`
    Index(i64),
    /// `[start:end:step]`. Negative bounds are stored verbatim and resolved
    /// against the concrete sequence length when matching.
    Range { start: i64, end: i64, step: i64 },
}

pub(crate) const DEFAULT_START: i64 = 0;
pub(crate) const DEFAULT_END: i64 = -1;
pub(crate) const DEFAULT_STEP: i64 = 1;

impl Selector {
    /// Try to match this selector at the front of `path`.
    ///
    /// Returns the number of segments consumed on success.
    pub fn consume(&self, path: &[Segment]) -> Option<usize> {
        match self {
            Selector::Root => matches!(path.first(), Some(Segment::Root)).then_some(1),
            Selector::Child { name, subscript } => {
                if !name.matches(path.first()?) {
                    return None;
                }
                match subscript {
                    None => Some(1),
                    Some(subscript) => subscript.matches_segment(path.get(1)?).then_some(2),
                }
            }
            Selector::Subscript(subscript) => subscript.matches_segment(path.first()?).then_some(1),
            Selector::Union(names) => match path.first()? {
                Segment::Key(key) => names.iter().any(|name| name == key).then_some(1),
                _ => None,
            },
            // First depth wins; later depths are never retried.
            Selector::RecursiveDescent(inner) => (0..path.len())
                .find_map(|skip| inner.consume(&path[skip..]).map(|taken| skip + taken)),
        }
    }
}

impl ChildName {
    fn matches(&self, segment: &Segment) -> bool {
        match (self, segment) {
            (ChildName::Key(name), Segment::Key(key)) => name == key,
            (ChildName::Wildcard, Segment::Key(_) | Segment::Index { .. }) => true,
            _ => false,
        }
    }
}

impl Subscript {
    fn matches_segment(&self, segment: &Segment) -> bool {
        match segment {
            Segment::Index { index, len } => self.matches(*index, *len),
            _ => false,
        }
    }

    /// Whether position `index` of a sequence of length `len` is selected.
    pub fn matches(&self, index: usize, len: usize) -> bool {
        let Ok(position) = i64::try_from(index) else {
            return false;
        };
        match *self {
            Subscript::Wildcard => true,
            Subscript::Index(n) if n >= 0 => position == n,
            Subscript::Index(n) => {
                let back = n.unsigned_abs();
                let len = len as u64;
                back <= len && index as u64 == len - back
            }
            Subscript::Range { start, end, step } => {
                let (Some(start), Some(end)) = (resolve(start, len, 0), resolve(end, len, 1)) else {
                    return false;
                };
                step > 0 && start <= position && position < end && (position - start) % step == 0
            }
        }
    }
}

/// Resolve a slice bound. Negative `n` becomes `len - (-n % len) + bias`.
fn resolve(n: i64, len: usize, bias: i64) -> Option<i64> {
    if n >= 0 {
        return Some(n);
    }
    let len = i64::try_from(len).ok().filter(|len| *len > 0)?;
    let back = i64::try_from(n.unsigned_abs() % len.unsigned_abs()).ok()?;
    Some(len - back + bias)
}
