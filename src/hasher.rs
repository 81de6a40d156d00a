//! The hash-function collaborator interface (spec.md §6: "MD5, SHA1,
//! SHA224/256/384/512 ... a transcript-hash object with update/copy/finalise
//! semantics"). The actual digest algorithms are out of scope for this crate (spec.md
//! §1); callers plug in real implementations (e.g. the teacher lineage's own
//! `md5`/`sha256`/... modules) by implementing `Hasher` and handing a `HasherFactory`
//! to `ServerConfig`.
//!
//! Trimmed from the teacher's `hasher.rs`: the `Factory<T>`-based indirection,
//! `HashReader`, and `TruncatedHasher` utilities lived in the wider crypto crate for
//! uses unrelated to the handshake (bulk-cipher key derivation, streaming checksums)
//! and have no counterpart here.

/// Encapsulates an algorithm for creating hashes (MD5, SHA1, SHA-2 family, ...).
pub trait Hasher: Send {
    fn block_size(&self) -> usize;

    /// The size, in bytes, of the digest `finish` produces.
    fn output_size(&self) -> usize;

    /// Appends data to the running digest.
    fn update(&mut self, data: &[u8]);

    /// Finalizes and returns the digest of everything seen by `update` so far. Valid
    /// to call `update` again afterwards; the digest remains cumulative.
    fn finish(&self) -> Vec<u8>;

    /// Produces an independent copy of this hasher with the same accumulated state,
    /// so the transcript can be hashed mid-handshake without disturbing the running
    /// accumulator (needed by `CertificateVerify`'s `calc_verify`-style snapshot).
    fn box_clone(&self) -> Box<dyn Hasher>;
}

/// A factory that produces a fresh `Hasher` instance for a given algorithm. Stored on
/// the negotiated ciphersuite / `ServerConfig` rather than constructing a concrete
/// hasher type by name, so the core never needs to know which concrete hash crate the
/// embedder linked in.
pub type HasherFactory = std::sync::Arc<dyn Fn() -> Box<dyn Hasher> + Send + Sync>;
