//! # Gallery Ingest
//!
//! Turns user-uploaded image files into a gallery's stored assets: validated,
//! de-duplicated per owner, re-encoded in their own format at a set of
//! configured sizes, written to disk, and registered.
//!
//! # Architecture: One Pipeline, Explicit Rollback
//!
//! ```text
//! upload ─▶ validate ─▶ hash ─▶ dedupe ─▶ transcode ─▶ write ─▶ register
//!           (read-only)                   (in memory)    │          │
//!                                                        └─rollback─┘
//! ```
//!
//! Everything up to transcoding is read-only and every rendition is encoded in
//! memory, so the first filesystem change happens only once all bytes are
//! ready. From there, a failed write or a failed registration deletes every
//! file the attempt produced. A rejected upload never leaves a file or a row
//! behind.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`upload`] | Upload request type and the ordered validation checks |
//! | [`digest`] | SHA-256 content hash used for per-owner de-duplication |
//! | [`imaging`] | Pure-Rust decode, orientation, contain-fit resize, encode |
//! | [`storage`] | Token-named file layout, all-or-nothing writes, rollback |
//! | [`registry`] | [`AssetRegistrar`](registry::AssetRegistrar) trait, memory and JSON registrars |
//! | [`prune`] | Deletion: rows, then files, then the empty owner directory |
//! | [`pipeline`] | [`Gallery`](pipeline::Gallery) service tying it all together |
//! | [`config`] | `gallery.toml` loading, validation, and the upload [`Policy`](config::Policy) |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Same Format In, Same Format Out
//!
//! JPEG stays JPEG, PNG stays PNG, GIF stays GIF. The stored extension always
//! comes from the sniffed bytes; a filename that claims otherwise is rejected
//! instead of renamed. Animated GIFs keep their first frame only.
//!
//! ## Pure-Rust Imaging
//!
//! The [`imaging`] module uses the `image` crate (Lanczos3 resampling) for
//! every codec and `img-parts` to splice EXIF/ICC back in when metadata is
//! kept. No system libraries are involved.
//!
//! ## The Registrar Has The Last Word On Duplicates
//!
//! The pipeline checks for an existing hash before doing any work, but two
//! concurrent uploads of the same bytes can both pass that check. The
//! registrar refuses the second insert, and the pipeline reports it as a
//! duplicate after rolling back its files.

pub mod config;
pub mod digest;
pub mod imaging;
pub mod output;
pub mod pipeline;
pub mod prune;
pub mod registry;
pub mod storage;
pub mod upload;

#[cfg(test)]
pub(crate) mod test_helpers;
