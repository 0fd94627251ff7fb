//! Pipeline stages for chapter ingestion.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and swapped without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! intake ──▶ pool ─┬─▶ transform ──▶ upload ─┬─▶ commit
//! (fields,   (C     │   (decode,      (one     │   (chapter doc,
//!  files)   workers)│    resize,       remote   │    comic link)
//!                   │    re-encode)    call)    │
//!                   └──────── per page ─────────┘
//! ```
//!
//! 1. [`intake`]    : pure validation of fields and attachments
//! 2. [`pool`]      : bounded worker pool; keeps output aligned with input
//! 3. [`transform`] : CPU-bound normalisation on the blocking pool
//! 4. [`upload`]    : storage options, unique ids, single remote attempt
//! 5. [`commit`]    : persist the chapter and link it into its comic

pub mod commit;
pub mod intake;
pub mod pool;
pub mod transform;
pub mod upload;
