/// Opaque handle to a host object. `0` is the null object.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct ObjectHandle(pub u64);

impl ObjectHandle {
    pub const NULL: ObjectHandle = ObjectHandle(0);

    #[inline]
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

// Type handles index the host's type tables (1-based, `0` is null).
macro_rules! type_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[repr(transparent)]
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
        pub struct $name(pub u32);

        impl $name {
            pub const NULL: $name = $name(0);

            #[inline]
            pub fn is_null(self) -> bool {
                self.0 == 0
            }

            #[inline]
            pub(crate) fn index(self) -> Option<usize> {
                (self.0 as usize).checked_sub(1)
            }

            #[inline]
            pub(crate) fn from_index(index: usize) -> Self {
                $name(index as u32 + 1)
            }
        }
    };
}

type_handle!(
    /// Opaque handle to a class record.
    ClassHandle
);
type_handle!(
    /// Opaque handle to a script struct record.
    StructHandle
);
type_handle!(
    /// Opaque handle to an enum record.
    EnumHandle
);

/// Any of the three reflected type kinds.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TypeHandle {
    Class(ClassHandle),
    Struct(StructHandle),
    Enum(EnumHandle),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_handles() {
        assert!(ObjectHandle::NULL.is_null());
        assert!(ClassHandle::default().is_null());
        assert!(!StructHandle(3).is_null());
    }

    #[test]
    fn index_round_trip_skips_null() {
        let h = EnumHandle::from_index(0);
        assert_eq!(h, EnumHandle(1));
        assert_eq!(h.index(), Some(0));
        assert_eq!(EnumHandle::NULL.index(), None);
    }
}
