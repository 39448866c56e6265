/// One step of a concrete walk from the root of a tree to a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Synthetic marker for the tree root. Always the first segment.
    Root,
    /// A key inside an object.
    Key(String),
    /// A position inside a sequence, together with that sequence's length
    /// so negative subscripts can be resolved at match time.
    Index { index: usize, len: usize },
}

/// The concrete location of a node inside a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    segments: Vec<Segment>,
}

impl Path {
    /// A path pointing at the tree root.
    pub fn root() -> Self {
        Self {
            segments: vec![Segment::Root],
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl Default for Path {
    fn default() -> Self {
        Self::root()
    }
}

/// Incrementally builds a [`Path`].
///
/// The mutator pushes and pops segments as it recurses; tests usually use
/// the chained [`key`](Self::key) / [`index`](Self::index) form instead.
#[derive(Debug, Clone, Default)]
pub struct PathBuilder {
    path: Path,
}

impl PathBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.push_key(key);
        self
    }

    pub fn index(mut self, index: usize, len: usize) -> Self {
        self.push_index(index, len);
        self
    }

    pub fn build(self) -> Path {
        self.path
    }

    pub fn push_key(&mut self, key: impl Into<String>) {
        self.path.segments.push(Segment::Key(key.into()));
    }

    pub fn push_index(&mut self, index: usize, len: usize) {
        self.path.segments.push(Segment::Index { index, len });
    }

    /// Remove the deepest segment. The root marker is never removed.
    pub fn pop(&mut self) {
        if self.path.segments.len() > 1 {
            self.path.segments.pop();
        }
    }

    pub fn current(&self) -> &Path {
        &self.path
    }
}
