//! Small declarative macros for defining TLS wire-format enums.
//!
//! Grounded on the teacher's `tls_enum_u8!`/`tls_struct!` pair (see `DESIGN.md`), but
//! rebased onto this crate's own `Reader` abstraction instead of a parser-combinator
//! crate, per the REDESIGN FLAGS in spec.md §9 ("a small reader abstraction that
//! returns remaining-length errors").

/// Defines a `u8`-backed TLS enum with an open-ended `Unknown(u8)` catch-all, the way
/// TLS itself treats unassigned values in most of these registries.
macro_rules! tls_enum_u8 {
    ($name:ident => { $( $case:ident ( $val:expr ) ),* , (255) }) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
        pub enum $name {
            $(
                $case,
            )*
            Unknown(u8),
        }

        impl $name {
            pub fn to_u8(&self) -> u8 {
                match self {
                    $(
                        $name::$case => $val,
                    )*
                    $name::Unknown(v) => *v,
                }
            }

            pub fn from_u8(v: u8) -> Self {
                match v {
                    $(
                        $val => $name::$case,
                    )*
                    _ => $name::Unknown(v),
                }
            }

            pub fn read(reader: &mut crate::reader::Reader) -> crate::error::Result<Self> {
                Ok(Self::from_u8(reader.u8()?))
            }

            pub fn write(&self, out: &mut Vec<u8>) {
                out.push(self.to_u8());
            }
        }
    };
}

/// Defines a `u16`-backed TLS enum (e.g. ciphersuite ids, named groups).
macro_rules! tls_enum_u16 {
    ($name:ident => { $( $case:ident ( $val:expr ) ),* , (0xffff) }) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
        pub enum $name {
            $(
                $case,
            )*
            Unknown(u16),
        }

        impl $name {
            pub fn to_u16(&self) -> u16 {
                match self {
                    $(
                        $name::$case => $val,
                    )*
                    $name::Unknown(v) => *v,
                }
            }

            pub fn from_u16(v: u16) -> Self {
                match v {
                    $(
                        $val => $name::$case,
                    )*
                    _ => $name::Unknown(v),
                }
            }

            pub fn read(reader: &mut crate::reader::Reader) -> crate::error::Result<Self> {
                Ok(Self::from_u16(reader.u16()?))
            }

            pub fn write(&self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_u16().to_be_bytes());
            }
        }
    };
}
