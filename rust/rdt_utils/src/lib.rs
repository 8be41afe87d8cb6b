// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! # Utility collection for RDT resource-allocation consoles
//!
//! Intel RDT lets an operator split the last level caches and memory
//! bandwidth of a host between "pools" of CPU cores. A control plane
//! daemon exposes this over a REST API; consoles in front of it mostly move
//! JSON around, but two pieces of logic recur everywhere and are easy to get
//! subtly wrong:
//!
//! - Core and PID lists typed by operators in range notation (`"0-3,8"`),
//!   handled by [`RangeList`].
//! - Capacity bitmasks (CBMs), which are integers on the wire but edited one
//!   cache way at a time, handled by [`Bitmask`].
//!
//! The rest of the crate is plain data plumbing built on those two: input
//! validation, serde models of the backend's replies, builders for request
//! bodies and topology grouping for display. Nothing here performs I/O other
//! than reading the optional config file.

mod error;
pub use error::CodecError;

mod rangelist;
pub use rangelist::read_rangelist;
pub use rangelist::RangeList;

mod bitmask;
pub use bitmask::from_bitmask;
pub use bitmask::full_cbm;
pub use bitmask::to_bitmask;
pub use bitmask::toggle;
pub use bitmask::Bitmask;
pub use bitmask::MAX_WAYS;

pub mod config;
pub use config::Config;

mod validate;
pub use validate::parse_validated;
pub use validate::validate;
pub use validate::validate_mba_bw;
pub use validate::validate_mba_percent;
pub use validate::validate_name;
pub use validate::Constraints;
pub use validate::ValidationResult;
pub use validate::Violation;

mod caps;
pub use caps::App;
pub use caps::CacheAllocation;
pub use caps::Capability;
pub use caps::Caps;
pub use caps::Mba;
pub use caps::MbaCtrl;
pub use caps::Pool;
pub use caps::RdtIface;
pub use caps::ResMessage;
pub use caps::Sstbf;

mod pool;
pub use pool::AllocCaps;
pub use pool::CacheLevel;
pub use pool::CbmEdit;
pub use pool::NewApp;
pub use pool::NewPool;
pub use pool::PoolUpdate;
pub use pool::MBA_DEFAULT_PERCENT;

pub mod topology;

mod power;
pub use power::Epp;
pub use power::NewPowerProfile;
pub use power::PowerProfile;
