use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// How the database file is going to be used.
///
/// Both modes create the database if it is missing. A read-only open serves an
/// external asset in place instead of copying it into private storage, and the
/// returned handle refuses the writer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OpenFlags {
   #[default]
   ReadWrite,
   ReadOnly,
}

impl OpenFlags {
   pub const OPEN_READWRITE: i32 = 0x0000_0000;
   pub const OPEN_READONLY: i32 = 0x0000_0001;
   pub const CREATE_IF_NECESSARY: i32 = 0x1000_0000;

   /// Read-write, create if missing.
   pub const WRITABLE: i32 = Self::OPEN_READWRITE | Self::CREATE_IF_NECESSARY;
   /// Read-only, create if missing.
   pub const READONLY: i32 = Self::OPEN_READONLY | Self::CREATE_IF_NECESSARY;

   /// Parse the integer flag combination a host passes across the bridge.
   ///
   /// `CREATE_IF_NECESSARY` is implied and may be omitted. Any bit outside the
   /// three known flags is rejected.
   pub fn from_bits(bits: i32) -> Result<Self> {
      if bits & !(Self::OPEN_READONLY | Self::CREATE_IF_NECESSARY) != 0 {
         return Err(Error::InvalidOpenFlags(bits));
      }

      if bits & Self::OPEN_READONLY != 0 {
         Ok(OpenFlags::ReadOnly)
      } else {
         Ok(OpenFlags::ReadWrite)
      }
   }

   pub fn bits(self) -> i32 {
      match self {
         OpenFlags::ReadWrite => Self::WRITABLE,
         OpenFlags::ReadOnly => Self::READONLY,
      }
   }

   pub fn is_read_only(self) -> bool {
      self == OpenFlags::ReadOnly
   }
}
