use serde::Serialize;

/// Modal viewer cursor over the gallery list. Every transition takes the
/// gallery length at the moment it is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Carousel {
    #[default]
    Closed,
    Open {
        index: usize,
    },
}

impl Carousel {
    pub fn is_open(&self) -> bool {
        matches!(self, Carousel::Open { .. })
    }

    pub fn current_index(&self) -> Option<usize> {
        match self {
            Carousel::Open { index } => Some(*index),
            Carousel::Closed => None,
        }
    }

    /// Out-of-range indices leave the state untouched.
    pub fn open(&mut self, index: usize, len: usize) -> bool {
        if index < len {
            *self = Carousel::Open { index };
            true
        } else {
            false
        }
    }

    pub fn next(&mut self, len: usize) {
        if let Carousel::Open { index } = *self {
            if len == 0 {
                *self = Carousel::Closed;
            } else {
                *self = Carousel::Open {
                    index: (index + 1) % len,
                };
            }
        }
    }

    pub fn prev(&mut self, len: usize) {
        if let Carousel::Open { index } = *self {
            if len == 0 {
                *self = Carousel::Closed;
            } else {
                let index = index.min(len - 1);
                *self = Carousel::Open {
                    index: if index == 0 { len - 1 } else { index - 1 },
                };
            }
        }
    }

    pub fn close(&mut self) {
        *self = Carousel::Closed;
    }

    /// Applied after every change to the gallery list.
    pub fn reconcile(&mut self, len: usize) {
        if let Carousel::Open { index } = *self {
            if len == 0 {
                *self = Carousel::Closed;
            } else {
                *self = Carousel::Open {
                    index: index.min(len - 1),
                };
            }
        }
    }
}
