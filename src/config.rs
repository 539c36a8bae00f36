//! Environment tunables (§6), exposed the way `heed`'s `EnvOpenOptions`
//! exposes LMDB's own knobs.

/// Constants governing how an [`crate::env::Env`] opens its native store and
/// sizes its scratch buffers.
#[derive(Debug, Clone, Copy)]
pub struct EnvOptions {
    /// Upper bound on an encoded key, in bytes. Also the size of every
    /// fixed key-shaped [`crate::buffer::BufferCell`] (DBI key buffer, RTX
    /// range-start/range-stop buffers).
    pub max_key_size: usize,
    /// Initial size of a growable value buffer, before any grow-on-overflow
    /// cycle.
    pub default_val_size: usize,
    /// How many RTXs the pool lazily allocates before it starts blocking
    /// callers on a freed slot.
    pub use_readers: usize,
    /// Native reader-slot cap (`mdb_env_set_maxreaders`). Must be `>=
    /// use_readers`.
    pub max_readers: u32,
    /// Native max-DBI cap (`mdb_env_set_maxdbs`).
    pub max_dbs: u32,
    /// Initial map size, in MiB.
    pub init_db_size_mb: usize,
}

impl Default for EnvOptions {
    fn default() -> EnvOptions {
        EnvOptions {
            max_key_size: 511,
            default_val_size: 16 * 1024,
            use_readers: 126,
            max_readers: 126,
            max_dbs: 128,
            init_db_size_mb: 100,
        }
    }
}

impl EnvOptions {
    pub fn init_map_size_bytes(&self) -> usize {
        self.init_db_size_mb * 1024 * 1024
    }

    pub fn max_key_size(mut self, size: usize) -> Self {
        self.max_key_size = size;
        self
    }

    pub fn default_val_size(mut self, size: usize) -> Self {
        self.default_val_size = size;
        self
    }

    pub fn use_readers(mut self, n: usize) -> Self {
        self.use_readers = n;
        self
    }

    pub fn max_readers(mut self, n: u32) -> Self {
        self.max_readers = n;
        self
    }

    pub fn max_dbs(mut self, n: u32) -> Self {
        self.max_dbs = n;
        self
    }

    pub fn init_db_size_mb(mut self, mb: usize) -> Self {
        self.init_db_size_mb = mb;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let opts = EnvOptions::default().use_readers(8).max_dbs(16);
        assert_eq!(opts.use_readers, 8);
        assert_eq!(opts.max_dbs, 16);
        assert_eq!(opts.max_key_size, EnvOptions::default().max_key_size);
    }

    #[test]
    fn init_map_size_converts_mb_to_bytes() {
        let opts = EnvOptions::default().init_db_size_mb(5);
        assert_eq!(opts.init_map_size_bytes(), 5 * 1024 * 1024);
    }
}
