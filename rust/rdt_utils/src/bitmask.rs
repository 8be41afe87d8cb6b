// Copyright (c) Meta Platforms, Inc. and affiliates.

// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! # Cache Allocation Bitmasks
//!
//! The backend reports a pool's capacity bitmask (CBM) as a plain integer and
//! the number of cache ways it addresses as `cw_num`. For per-way editing the
//! integer is expanded into a fixed-width Bitmask whose index 0 is the most
//! significant bit, i.e. the highest cache way:
//!
//!```
//!     use rdt_utils::Bitmask;
//!     let mut mask = Bitmask::from_cbm(2047, 12).unwrap();
//!     assert_eq!(mask.to_vec(), vec![0, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1]);
//!
//!     mask.toggle(0);
//!     assert_eq!(mask.to_cbm(), 4095);
//!```
//!
//! The Bitmask knows nothing about CDP. With CDP enabled, callers keep one
//! Bitmask for code and one for data.

use crate::error::CodecError;
use crate::error::Result;
use bitvec::prelude::*;
use log::debug;
use std::fmt;

/// Widest CBM an integer can carry.
pub const MAX_WAYS: usize = u64::BITS as usize;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Bitmask {
    bits: BitVec<u64, Lsb0>,
}

fn check_width(width: usize) -> Result<()> {
    if width == 0 || width > MAX_WAYS {
        return Err(CodecError::OutOfRange {
            what: "cache way count",
            value: width as u64,
            max: MAX_WAYS as u64,
        });
    }
    Ok(())
}

/// The CBM with every one of `width` ways set, as given to new pools.
pub fn full_cbm(width: usize) -> Result<u64> {
    check_width(width)?;
    Ok(u64::MAX >> (MAX_WAYS - width))
}

impl Bitmask {
    /// Expand `cbm` to `width` bits, most significant first. Fails if `cbm`
    /// needs more than `width` bits.
    pub fn from_cbm(cbm: u64, width: usize) -> Result<Bitmask> {
        let max = full_cbm(width)?;
        if cbm > max {
            return Err(CodecError::OutOfRange {
                what: "cbm",
                value: cbm,
                max,
            });
        }

        let mut bits = bitvec![u64, Lsb0; 0; width];
        for index in 0..width {
            bits.set(index, (cbm >> (width - 1 - index)) & 1 == 1);
        }

        let mask = Bitmask { bits };
        debug!("cbm {:#x} over {} ways -> {}", cbm, width, mask);
        Ok(mask)
    }

    /// A Bitmask with all `width` ways set.
    pub fn full(width: usize) -> Result<Bitmask> {
        Bitmask::from_cbm(full_cbm(width)?, width)
    }

    /// Build a Bitmask from a sequence of 0/1 values, most significant first.
    pub fn from_bits(values: &[u8]) -> Result<Bitmask> {
        check_width(values.len())?;

        let mut bits = BitVec::with_capacity(values.len());
        for (index, &value) in values.iter().enumerate() {
            match value {
                0 => bits.push(false),
                1 => bits.push(true),
                v => {
                    return Err(CodecError::InvalidFormat(format!(
                        "bit {} has value {}, expected 0 or 1",
                        index, v
                    )));
                }
            }
        }

        Ok(Bitmask { bits })
    }

    /// Number of cache ways the Bitmask spans.
    pub fn width(&self) -> usize {
        self.bits.len()
    }

    /// Collapse the bits back into the integer the backend expects.
    pub fn to_cbm(&self) -> u64 {
        self.bits
            .iter()
            .fold(0, |cbm, bit| (cbm << 1) | u64::from(*bit))
    }

    /// Like [`Bitmask::to_cbm`], but fail if the Bitmask does not span
    /// exactly `ways` cache ways.
    pub fn to_cbm_checked(&self, ways: usize) -> Result<u64> {
        if self.width() != ways {
            return Err(CodecError::DimensionMismatch {
                expected: ways,
                actual: self.width(),
            });
        }
        Ok(self.to_cbm())
    }

    /// Flip the bit at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not below [`Bitmask::width`]. Indices always come
    /// from the same width the Bitmask was built with.
    pub fn toggle(&mut self, index: usize) {
        assert!(
            index < self.width(),
            "way index {} out of range for {} ways",
            index,
            self.width()
        );
        let bit = self.bits[index];
        self.bits.set(index, !bit);
    }

    /// Return a copy with the bit at `index` flipped.
    pub fn toggled(&self, index: usize) -> Bitmask {
        let mut new = self.clone();
        new.toggle(index);
        new
    }

    /// Test the bit at `index`. Out of range indices read as unset.
    pub fn test(&self, index: usize) -> bool {
        self.bits.get(index).map(|bit| *bit).unwrap_or(false)
    }

    /// Count the number of ways set.
    pub fn weight(&self) -> usize {
        self.bits.count_ones()
    }

    /// The bits as 0/1 values, most significant first.
    pub fn to_vec(&self) -> Vec<u8> {
        self.bits.iter().map(|bit| u8::from(*bit)).collect()
    }
}

/// Expand `cbm` to a `width` bit Bitmask.
pub fn to_bitmask(cbm: u64, width: usize) -> Result<Bitmask> {
    Bitmask::from_cbm(cbm, width)
}

/// Collapse a Bitmask into its integer CBM.
pub fn from_bitmask(bits: &Bitmask) -> u64 {
    bits.to_cbm()
}

/// Return `bits` with the way at `index` flipped.
pub fn toggle(bits: &Bitmask, index: usize) -> Bitmask {
    bits.toggled(index)
}

impl fmt::Display for Bitmask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for bit in self.bits.iter() {
            write!(f, "{}", u8::from(*bit))?;
        }
        Ok(())
    }
}
