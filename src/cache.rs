use crate::{
    cursor::Cursor,
    error::{Error, Result},
};

/// A saved cursor range for an in-progress multi-character token.
///
/// A layer sets the cache on the first character of a token, extends it on
/// every further character, and takes the covered range when it broadcasts
/// the finished token. The cache is either empty or holds exactly one range:
/// setting a non-empty cache and reading an empty one are errors, which keeps
/// layer state machines honest about token boundaries.
#[derive(Clone, Debug, Default)]
pub struct FilePositionCache {
    pos: Option<Cursor>,
}

impl FilePositionCache {
    /// Creates an empty cache.
    #[inline]
    pub fn new() -> Self {
        FilePositionCache::default()
    }

    /// Whether the cache holds a position.
    #[inline]
    pub fn is_set(&self) -> bool {
        self.pos.is_some()
    }

    /// Saves the start of a token.
    pub fn set(&mut self, position: Cursor) -> Result<()> {
        if self.pos.is_some() {
            return Err(Error::FilePositionCacheAlreadySet);
        }
        self.pos = Some(position);
        Ok(())
    }

    /// Extends the saved range to cover `position`'s end.
    pub fn extend(&mut self, position: &Cursor) -> Result<()> {
        match &mut self.pos {
            Some(pos) => {
                pos.extend(position);
                Ok(())
            }
            None => Err(Error::FilePositionCacheNotSet),
        }
    }

    /// The saved range.
    pub fn position(&self) -> Result<&Cursor> {
        self.pos.as_ref().ok_or(Error::FilePositionCacheNotSet)
    }

    /// The file name of the saved range.
    pub fn file(&self) -> Result<&str> {
        self.position().map(Cursor::file)
    }

    /// Takes the saved range out, leaving the cache empty.
    pub fn take(&mut self) -> Result<Cursor> {
        self.pos.take().ok_or(Error::FilePositionCacheNotSet)
    }

    /// Forgets the saved range.
    #[inline]
    pub fn clear(&mut self) {
        self.pos = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor_after(bytes: &[u8]) -> Cursor {
        let mut cursor = Cursor::new("t.c".into());
        for &byte in bytes {
            cursor.advance(byte);
        }
        cursor
    }

    #[test]
    fn set_extend_take_round_trip() {
        let mut cache = FilePositionCache::new();
        cache.set(cursor_after(b"a")).unwrap();
        cache.extend(&cursor_after(b"abc")).unwrap();
        let range = cache.take().unwrap();
        assert_eq!((range.begin_line, range.begin_col), (1, 1));
        assert_eq!((range.end_line, range.end_col), (1, 4));
        assert!(!cache.is_set());
    }

    #[test]
    fn double_set_is_an_error() {
        let mut cache = FilePositionCache::new();
        cache.set(cursor_after(b"a")).unwrap();
        assert!(matches!(
            cache.set(cursor_after(b"b")),
            Err(Error::FilePositionCacheAlreadySet),
        ));
    }

    #[test]
    fn reading_empty_cache_is_an_error() {
        let mut cache = FilePositionCache::new();
        assert!(matches!(cache.position(), Err(Error::FilePositionCacheNotSet)));
        assert!(matches!(cache.take(), Err(Error::FilePositionCacheNotSet)));
        assert!(matches!(
            cache.extend(&cursor_after(b"a")),
            Err(Error::FilePositionCacheNotSet),
        ));
    }

    #[test]
    fn clear_is_idempotent() {
        let mut cache = FilePositionCache::new();
        cache.clear();
        cache.set(cursor_after(b"a")).unwrap();
        cache.clear();
        cache.clear();
        assert!(!cache.is_set());
    }
}
