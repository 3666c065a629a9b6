macro_rules! flag_type {
    ($name:ident { $($method:ident => $bit:expr),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name(u16);

        impl $name {
            pub fn new(raw: u16) -> Self {
                Self(raw)
            }

            pub fn raw(self) -> u16 {
                self.0
            }

            $(
                pub fn $method(self) -> bool {
                    self.0 & $bit != 0
                }
            )+
        }
    };
}

flag_type!(ClassFlags {
    is_public => 0x0001,
    is_final => 0x0010,
    is_super => 0x0020,
    is_interface => 0x0200,
    is_abstract => 0x0400,
});

flag_type!(FieldFlags {
    is_public => 0x0001,
    is_private => 0x0002,
    is_protected => 0x0004,
    is_static => 0x0008,
    is_final => 0x0010,
    is_volatile => 0x0040,
    is_transient => 0x0080,
});

flag_type!(MethodFlags {
    is_public => 0x0001,
    is_private => 0x0002,
    is_protected => 0x0004,
    is_static => 0x0008,
    is_final => 0x0010,
    is_synchronized => 0x0020,
    is_native => 0x0100,
    is_abstract => 0x0400,
});

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_NATIVE: u16 = 0x0100;
