//! Endian-tagged fixed-width integers.
//!
//! `U16<E>`, `U32<E>` and `U64<E>` are `repr(transparent)` wrappers around a
//! byte array; the wrapped bytes are always in the byte order named by `E`.
//! They derive `bytemuck::Pod`/`Zeroable` so they can be embedded directly
//! in `#[repr(C, packed)]` structs and cast to/from raw bytes with
//! `bytemuck::bytes_of`/`bytemuck::cast`.

use core::marker::PhantomData;

use crate::endian::Endianness;

macro_rules! endian_number {
    ($name:ident, $inner:ty, $width:literal, $read:ident, $write:ident) => {
        #[repr(transparent)]
        #[derive(Clone, Copy, bytemuck::Zeroable, bytemuck::Pod)]
        pub struct $name<E: Endianness> {
            bytes: [u8; $width],
            _marker: PhantomData<E>,
        }

        impl<E: Endianness> $name<E> {
            pub const ZERO: Self = Self {
                bytes: [0; $width],
                _marker: PhantomData,
            };

            pub fn new(value: $inner) -> Self {
                Self {
                    bytes: E::$write(value),
                    _marker: PhantomData,
                }
            }

            pub fn get(&self) -> $inner {
                E::$read(self.bytes)
            }

            pub fn set(&mut self, value: $inner) {
                self.bytes = E::$write(value);
            }

            pub fn to_bytes(self) -> [u8; $width] {
                self.bytes
            }
        }

        impl<E: Endianness> Default for $name<E> {
            fn default() -> Self {
                Self::ZERO
            }
        }

        impl<E: Endianness> core::fmt::Debug for $name<E> {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}({:?})", stringify!($name), self.get())
            }
        }

        impl<E: Endianness> PartialEq for $name<E> {
            fn eq(&self, other: &Self) -> bool {
                self.get() == other.get()
            }
        }
        impl<E: Endianness> Eq for $name<E> {}
    };
}

endian_number!(U16, u16, 2, read_u16, write_u16);
endian_number!(U32, u32, 4, read_u32, write_u32);
endian_number!(U64, u64, 8, read_u64, write_u64);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endian::{BigEndian, LittleEndian};

    #[test]
    fn round_trip_le() {
        let v: U32<LittleEndian> = U32::new(0x0102_0304);
        assert_eq!(v.to_bytes(), [0x04, 0x03, 0x02, 0x01]);
        assert_eq!(v.get(), 0x0102_0304);
    }

    #[test]
    fn round_trip_be() {
        let v: U16<BigEndian> = U16::new(0x0102);
        assert_eq!(v.to_bytes(), [0x01, 0x02]);
        assert_eq!(v.get(), 0x0102);
    }

    #[test]
    fn set_mutates() {
        let mut v: U64<LittleEndian> = U64::ZERO;
        v.set(0xDEAD_BEEF);
        assert_eq!(v.get(), 0xDEAD_BEEF);
    }

    static_assertions::assert_eq_size!(U16<LittleEndian>, [u8; 2]);
    static_assertions::assert_eq_size!(U32<LittleEndian>, [u8; 4]);
    static_assertions::assert_eq_size!(U64<LittleEndian>, [u8; 8]);
}
