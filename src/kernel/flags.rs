macro_rules! impl_bitflags {
    ($ty:ident) => {
        impl $ty {
            pub const NONE: Self = Self(0);

            #[inline(always)]
            pub const fn bits(self) -> u32 {
                self.0
            }

            #[inline(always)]
            pub const fn contains(self, other: Self) -> bool {
                (self.0 & other.0) == other.0
            }
        }

        impl core::fmt::Debug for $ty {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}(0x{:X})", stringify!($ty), self.0)
            }
        }

        impl core::ops::BitOr for $ty {
            type Output = Self;

            #[inline(always)]
            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }
    };
}

/// Represents process access rights.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessAccess(u32);

impl ProcessAccess {
    pub const DUP_HANDLE: Self = Self(0x0040);
    pub const QUERY_LIMITED_INFORMATION: Self = Self(0x1000);
}

impl_bitflags!(ProcessAccess);

/// Represents access rights on an access token.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenAccess(u32);

impl TokenAccess {
    pub const QUERY: Self = Self(0x0008);
    pub const ADJUST_PRIVILEGES: Self = Self(0x0020);
}

impl_bitflags!(TokenAccess);

/// Options passed to `NtDuplicateObject`.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DuplicateOptions(u32);

impl DuplicateOptions {
    /// Closes the source handle in the source process, even if duplication fails.
    pub const CLOSE_SOURCE: Self = Self(0x1);
}

impl_bitflags!(DuplicateOptions);

#[cfg(test)]
mod tests {
    use super::{DuplicateOptions, ProcessAccess, TokenAccess};

    #[test]
    fn combined_rights() {
        let access = ProcessAccess::DUP_HANDLE | ProcessAccess::QUERY_LIMITED_INFORMATION;
        assert_eq!(access.bits(), 0x1040);
        assert!(access.contains(ProcessAccess::DUP_HANDLE));
        assert!(!ProcessAccess::DUP_HANDLE.contains(access));

        let token = TokenAccess::ADJUST_PRIVILEGES | TokenAccess::QUERY;
        assert_eq!(token.bits(), 0x28);

        assert_eq!(DuplicateOptions::NONE.bits(), 0);
        assert!(!DuplicateOptions::NONE.contains(DuplicateOptions::CLOSE_SOURCE));
        assert_eq!(format!("{:?}", DuplicateOptions::CLOSE_SOURCE), "DuplicateOptions(0x1)");
    }
}
