use crate::constants::Word;

/// Value stack, used by `push`/`pop` and for `call` return addresses.
///
/// Unlike memory it is unbounded, and popping from it when empty yields
/// nothing rather than a default value.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Stack {
    inner: Vec<Word>,
}

impl Stack {
    pub fn push(&mut self, value: Word) {
        self.inner.push(value);
    }

    pub fn pop(&mut self) -> Option<Word> {
        self.inner.pop()
    }

    #[must_use]
    pub fn peek(&self) -> Option<Word> {
        self.inner.last().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Iterate from the bottom of the stack to the top
    pub fn iter(&self) -> impl Iterator<Item = Word> + '_ {
        self.inner.iter().copied()
    }
}
