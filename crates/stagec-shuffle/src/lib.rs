#![forbid(unsafe_code)]
//! stagec-shuffle: everything that crosses the exchange.
//!
//! `ShuffleAnalyzer` turns the rendezvous elements behind a stage's reduce
//! inputs into an ordered list of `Segment`s. Every codec artifact (key
//! schema, partitioner, sort and grouping comparators, dispatch table) is
//! derived from one shared `Arc<[Segment]>`, so they agree on the port tag
//! set by construction.
//!
//! Key layout: `port id (i32 BE) | term* ` where each term is a presence byte
//! followed by the value encoding of its property type (see `codec`).

pub mod analyze;
pub mod artifacts;
pub mod codec;
pub mod combine;
pub mod compare;
pub mod dispatch;
pub mod error;
pub mod key;
pub mod model;
pub mod partition;

pub use analyze::ShuffleAnalyzer;
pub use artifacts::ShuffleCodec;
pub use compare::{ByteComparator, GroupingComparator, ObjectComparator, SortComparator};
pub use dispatch::{DispatchTable, Route};
pub use error::{CodecError, Result, ShuffleError};
pub use key::{KeySchema, ShuffleKey, ShuffleValue};
pub use model::{Arrangement, Segment, ShuffleModel, Term};
pub use partition::Partitioner;
