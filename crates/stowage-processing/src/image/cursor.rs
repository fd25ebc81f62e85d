//! Scoped stream position

use std::io::{self, Read, Seek, SeekFrom};
use std::ops::{Deref, DerefMut};

/// Restores a stream's position when dropped.
///
/// The position is captured on creation and written back on every exit path,
/// including early returns and panics unwinding through the owner.
pub struct CursorGuard<'a, S: Seek + ?Sized> {
    inner: &'a mut S,
    position: u64,
}

impl<'a, S: Seek + ?Sized> CursorGuard<'a, S> {
    pub fn new(inner: &'a mut S) -> io::Result<Self> {
        let position = inner.stream_position()?;
        Ok(Self { inner, position })
    }
}

impl<S: Read + Seek + ?Sized> CursorGuard<'_, S> {
    /// Rewind to the start and read the whole stream.
    pub fn read_from_start(&mut self) -> io::Result<Vec<u8>> {
        self.inner.seek(SeekFrom::Start(0))?;
        let mut data = Vec::new();
        self.inner.read_to_end(&mut data)?;
        Ok(data)
    }
}

impl<S: Seek + ?Sized> Deref for CursorGuard<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.inner
    }
}

impl<S: Seek + ?Sized> DerefMut for CursorGuard<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.inner
    }
}

impl<S: Seek + ?Sized> Drop for CursorGuard<'_, S> {
    fn drop(&mut self) {
        if let Err(e) = self.inner.seek(SeekFrom::Start(self.position)) {
            tracing::warn!(
                error = %e,
                position = self.position,
                "Failed to restore stream position"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_restores_position_on_drop() {
        let mut stream = Cursor::new(b"0123456789".to_vec());
        stream.set_position(4);

        {
            let mut guard = CursorGuard::new(&mut stream).unwrap();
            let data = guard.read_from_start().unwrap();
            assert_eq!(data, b"0123456789");
            assert_eq!(guard.stream_position().unwrap(), 10);
        }

        assert_eq!(stream.position(), 4);
    }

    #[test]
    fn test_restores_position_on_early_return() {
        fn fails(stream: &mut Cursor<Vec<u8>>) -> io::Result<()> {
            let mut guard = CursorGuard::new(stream)?;
            guard.seek(SeekFrom::End(0))?;
            Err(io::Error::other("boom"))
        }

        let mut stream = Cursor::new(vec![0u8; 16]);
        stream.set_position(7);
        assert!(fails(&mut stream).is_err());
        assert_eq!(stream.position(), 7);
    }
}
