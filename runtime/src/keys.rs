use lasso::ThreadedRodeo;

/// Interned string handle; class names, member names and descriptors are
/// all symbols.
pub type Symbol = lasso::Spur;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(u32);

impl ClassId {
    pub fn from_usize(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodId(u32);

impl MethodId {
    pub fn from_usize(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadId(u32);

impl ThreadId {
    pub fn from_usize(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// `name|descriptor` field key; static and instance lookups both use it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldKey {
    pub name: Symbol,
    pub desc: Symbol,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodKey {
    pub name: Symbol,
    pub desc: Symbol,
}

/// Key of a native binding: `class|name|descriptor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FullyQualifiedMethodKey {
    pub class: Symbol,
    pub name: Symbol,
    pub desc: Symbol,
}

impl FullyQualifiedMethodKey {
    pub fn new(class: Symbol, name: Symbol, desc: Symbol) -> Self {
        Self { class, name, desc }
    }

    pub fn new_with_str(class: &str, name: &str, desc: &str, interner: &ThreadedRodeo) -> Self {
        Self {
            class: interner.get_or_intern(class),
            name: interner.get_or_intern(name),
            desc: interner.get_or_intern(desc),
        }
    }
}

/// Memo key for virtual dispatch: the declared class of the call site plus
/// the member key. Validated against the receiver chain before reuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallSiteKey {
    pub class: Symbol,
    pub name: Symbol,
    pub desc: Symbol,
}
