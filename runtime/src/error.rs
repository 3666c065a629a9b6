use crate::heap::HeapRef;
use crate::keys::{MethodKey, Symbol};
use cldc_classfile::ClassFileError;
use cldc_common::cursor::CursorError;
use cldc_common::descriptor::{DescriptorError, MethodDescriptor};
use cldc_common::instruction::InstructionError;
use lasso::ThreadedRodeo;
use std::fmt::Display;

#[derive(Debug)]
pub enum VmError {
    /// Fatal at resolution time; not catchable by bytecode.
    ClassNotFound(String),
    MalformedClass(ClassFileError),
    BadClassName(String),
    ClassHierarchyCycle(String),

    Cursor(CursorError),
    Descriptor(DescriptorError),
    Instruction(InstructionError),
    ConstantPool { index: u16, expected: &'static str },

    StackOverflow,
    FrameStackIsEmpty,
    OperandStackIsEmpty,
    LocalVariableNotFound(u16),
    LocalVariableNotInitialized(u16),
    UnexpectedType(&'static str),
    WrongHeapAddress(HeapRef),
    MethodIsAbstract(String),
    MethodHasNoCode(String),
    ClassInitializationFailed(String),

    /// Host-level failure; propagates out of the interpreter unmapped.
    HostFatal(String),

    /// An in-flight exception object unwinding through frames.
    JavaThrow(HeapRef),
    /// An exception described by kind and message, not yet materialised.
    JavaException(PendingException),
}

impl From<CursorError> for VmError {
    fn from(value: CursorError) -> Self {
        VmError::Cursor(value)
    }
}

impl From<DescriptorError> for VmError {
    fn from(value: DescriptorError) -> Self {
        VmError::Descriptor(value)
    }
}

impl From<InstructionError> for VmError {
    fn from(value: InstructionError) -> Self {
        VmError::Instruction(value)
    }
}

impl From<ClassFileError> for VmError {
    fn from(value: ClassFileError) -> Self {
        VmError::MalformedClass(value)
    }
}

impl Display for VmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl VmError {
    pub fn into_pretty_string(self, interner: &ThreadedRodeo) -> String {
        match self {
            VmError::JavaException(ex) => {
                let mut result = ex.kind.class_name().replace('/', ".");
                if let Some(message) = ex.message {
                    result.push_str(": ");
                    result.push_str(&message.into_resolved(interner));
                }
                result
            }
            other => format!("{other:?}"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ExceptionMessage {
    Resolved(String),
    MethodNotFound(MethodKey, Symbol),
}

impl ExceptionMessage {
    pub fn into_resolved(self, interner: &ThreadedRodeo) -> String {
        match self {
            ExceptionMessage::Resolved(s) => s,
            ExceptionMessage::MethodNotFound(method_key, class_sym) => {
                let desc_str = interner.resolve(&method_key.desc);
                let class_name = interner.resolve(&class_sym);
                let method_name = interner.resolve(&method_key.name);
                match MethodDescriptor::try_from(desc_str) {
                    Ok(md) => md.to_java_signature(class_name, method_name),
                    Err(_) => format!("{class_name}.{method_name}{desc_str}"),
                }
            }
        }
    }
}

/// The bytecode-level exceptions the core itself raises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JavaExceptionKind {
    ArithmeticException,
    ArrayIndexOutOfBoundsException,
    ClassCastException,
    NegativeArraySizeException,
    NullPointerException,
    InterruptedException,
    IOException,
    UnsatisfiedLinkError,
    NoSuchMethodError,
    NoSuchFieldError,
    InternalError,
    OutOfMemoryError,
}

impl JavaExceptionKind {
    pub const fn class_name(self) -> &'static str {
        match self {
            Self::ArithmeticException => "java/lang/ArithmeticException",
            Self::ArrayIndexOutOfBoundsException => "java/lang/ArrayIndexOutOfBoundsException",
            Self::ClassCastException => "java/lang/ClassCastException",
            Self::NegativeArraySizeException => "java/lang/NegativeArraySizeException",
            Self::NullPointerException => "java/lang/NullPointerException",
            Self::InterruptedException => "java/lang/InterruptedException",
            Self::IOException => "java/io/IOException",
            Self::UnsatisfiedLinkError => "java/lang/UnsatisfiedLinkError",
            Self::NoSuchMethodError => "java/lang/NoSuchMethodError",
            Self::NoSuchFieldError => "java/lang/NoSuchFieldError",
            Self::InternalError => "java/lang/InternalError",
            Self::OutOfMemoryError => "java/lang/OutOfMemoryError",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PendingException {
    pub kind: JavaExceptionKind,
    pub message: Option<ExceptionMessage>,
}

impl PendingException {
    pub fn new(kind: JavaExceptionKind) -> Self {
        Self { kind, message: None }
    }

    pub fn with_message(kind: JavaExceptionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: Some(ExceptionMessage::Resolved(message.into())),
        }
    }

    pub fn with_method_not_found(kind: JavaExceptionKind, key: MethodKey, class_sym: Symbol) -> Self {
        Self {
            kind,
            message: Some(ExceptionMessage::MethodNotFound(key, class_sym)),
        }
    }
}

#[macro_export]
macro_rules! build_exception {
    ($kind:ident) => {
        $crate::error::VmError::JavaException($crate::error::PendingException::new(
            $crate::error::JavaExceptionKind::$kind,
        ))
    };
    ($kind:ident, method_key: $key:expr, class_sym: $class:expr) => {
        $crate::error::VmError::JavaException(
            $crate::error::PendingException::with_method_not_found(
                $crate::error::JavaExceptionKind::$kind,
                $key,
                $class,
            ),
        )
    };
    ($kind:ident, $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::error::VmError::JavaException($crate::error::PendingException::with_message(
            $crate::error::JavaExceptionKind::$kind,
            format!($fmt $(, $arg)*),
        ))
    };
}

#[macro_export]
macro_rules! throw_exception {
    ($($arg:tt)+) => {
        Err($crate::build_exception!($($arg)+))
    };
}
