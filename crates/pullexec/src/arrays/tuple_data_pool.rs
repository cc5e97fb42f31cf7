use bytes::Bytes;

/// Auxiliary memory attached to a row batch.
///
/// Producers that hand memory to a consumer attach the backing buffers here,
/// at which point the buffers live as long as the batch (or whichever batch
/// acquires them next). Producers that retain memory themselves must not
/// attach it, and must keep it valid until their own Close.
#[derive(Debug, Default)]
pub struct TupleDataPool {
    chunks: Vec<Bytes>,
    total_bytes: usize,
}

impl TupleDataPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a buffer to this pool.
    pub fn attach(&mut self, chunk: Bytes) {
        self.total_bytes += chunk.len();
        self.chunks.push(chunk);
    }

    /// Move all buffers from `other` into this pool, leaving `other` empty.
    pub fn acquire_data(&mut self, other: &mut TupleDataPool) {
        self.total_bytes += other.total_bytes;
        self.chunks.append(&mut other.chunks);
        other.total_bytes = 0;
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    pub fn num_chunks(&self) -> usize {
        self.chunks.len()
    }

    pub fn chunks(&self) -> &[Bytes] {
        &self.chunks
    }

    /// Release all attached buffers.
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.total_bytes = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_moves_everything() {
        let mut a = TupleDataPool::new();
        a.attach(Bytes::from_static(b"hello"));

        let mut b = TupleDataPool::new();
        b.attach(Bytes::from_static(b"abc"));
        b.acquire_data(&mut a);

        assert_eq!(8, b.total_bytes());
        assert_eq!(2, b.num_chunks());
        assert_eq!(0, a.total_bytes());
        assert_eq!(0, a.num_chunks());
    }
}
