use std::sync::Mutex;

const MAX_POOLED: usize = 16;
const MAX_RETAINED_CAPACITY: usize = 64 * 1024;

/// Scratch-string pool for the tokenizer hot path.
///
/// Buffers are cleared before being handed back to the pool, and callers
/// only ever receive owned `String`s taken out of it, so a pooled buffer is
/// never aliased. Oversized buffers are dropped instead of retained.
pub(crate) struct BufferPool {
    buffers: Mutex<Vec<String>>,
}

impl BufferPool {
    pub(crate) const fn new() -> BufferPool {
        BufferPool {
            buffers: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn get(&self) -> String {
        self.buffers.lock().unwrap().pop().unwrap_or_default()
    }

    pub(crate) fn put(&self, mut buffer: String) {
        if buffer.capacity() > MAX_RETAINED_CAPACITY {
            return;
        }
        buffer.clear();
        let mut buffers = self.buffers.lock().unwrap();
        if buffers.len() < MAX_POOLED {
            buffers.push(buffer);
        }
    }
}
