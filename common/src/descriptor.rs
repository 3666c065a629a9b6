use crate::jtype::{JavaType, PrimitiveType};
use itertools::Itertools;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorError {
    Empty,
    UnexpectedEnd,
    InvalidTypeChar(char),
    MissingOpenParen,
    MissingCloseParen,
    TrailingChars,
}

impl std::fmt::Display for DescriptorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DescriptorError::Empty => write!(f, "empty descriptor"),
            DescriptorError::UnexpectedEnd => write!(f, "descriptor ends mid-type"),
            DescriptorError::InvalidTypeChar(c) => write!(f, "invalid type character '{c}'"),
            DescriptorError::MissingOpenParen => write!(f, "method descriptor must start with '('"),
            DescriptorError::MissingCloseParen => write!(f, "method descriptor is missing ')'"),
            DescriptorError::TrailingChars => write!(f, "trailing characters after descriptor"),
        }
    }
}

/// The one descriptor scanner in the workspace. Every consumer of field or
/// method descriptors goes through here.
struct Scanner<'a> {
    chars: std::str::Chars<'a>,
}

impl<'a> Scanner<'a> {
    fn new(s: &'a str) -> Self {
        Self { chars: s.chars() }
    }

    fn peek(&self) -> Option<char> {
        self.chars.clone().next()
    }

    fn next_type(&mut self) -> Result<JavaType, DescriptorError> {
        let c = self.chars.next().ok_or(DescriptorError::UnexpectedEnd)?;
        match c {
            'Z' => Ok(JavaType::Primitive(PrimitiveType::Boolean)),
            'B' => Ok(JavaType::Primitive(PrimitiveType::Byte)),
            'C' => Ok(JavaType::Primitive(PrimitiveType::Char)),
            'S' => Ok(JavaType::Primitive(PrimitiveType::Short)),
            'I' => Ok(JavaType::Primitive(PrimitiveType::Int)),
            'J' => Ok(JavaType::Primitive(PrimitiveType::Long)),
            'F' => Ok(JavaType::Primitive(PrimitiveType::Float)),
            'D' => Ok(JavaType::Primitive(PrimitiveType::Double)),
            '[' => Ok(JavaType::Array(Box::new(self.next_type()?))),
            'L' => {
                let mut name = String::new();
                loop {
                    match self.chars.next() {
                        Some(';') => break,
                        Some(c) => name.push(c),
                        None => return Err(DescriptorError::UnexpectedEnd),
                    }
                }
                Ok(JavaType::Instance(name))
            }
            other => Err(DescriptorError::InvalidTypeChar(other)),
        }
    }
}

pub fn parse_field_descriptor(desc: &str) -> Result<JavaType, DescriptorError> {
    if desc.is_empty() {
        return Err(DescriptorError::Empty);
    }
    let mut scanner = Scanner::new(desc);
    let ty = scanner.next_type()?;
    if scanner.peek().is_some() {
        return Err(DescriptorError::TrailingChars);
    }
    Ok(ty)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub params: Vec<JavaType>,
    /// `None` for a `V` return.
    pub ret: Option<JavaType>,
}

impl MethodDescriptor {
    /// Number of argument values on the operand stack (a long is one value).
    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Number of local-variable slots the arguments occupy (a long is two).
    pub fn param_slots(&self) -> usize {
        self.params.iter().map(JavaType::slot_width).sum()
    }

    pub fn to_java_signature(&self, class_name: &str, method_name: &str) -> String {
        let params = self.params.iter().map(JavaType::java_name).join(", ");
        let ret = self
            .ret
            .as_ref()
            .map(JavaType::java_name)
            .unwrap_or_else(|| "void".to_string());
        format!("{ret} {}.{method_name}({params})", class_name.replace('/', "."))
    }
}

impl TryFrom<&str> for MethodDescriptor {
    type Error = DescriptorError;

    fn try_from(desc: &str) -> Result<Self, Self::Error> {
        let mut scanner = Scanner::new(desc);
        if scanner.chars.next() != Some('(') {
            return Err(DescriptorError::MissingOpenParen);
        }
        let mut params = Vec::new();
        loop {
            match scanner.peek() {
                Some(')') => {
                    scanner.chars.next();
                    break;
                }
                Some(_) => params.push(scanner.next_type()?),
                None => return Err(DescriptorError::MissingCloseParen),
            }
        }
        let ret = match scanner.peek() {
            Some('V') => {
                scanner.chars.next();
                None
            }
            Some(_) => Some(scanner.next_type()?),
            None => return Err(DescriptorError::UnexpectedEnd),
        };
        if scanner.peek().is_some() {
            return Err(DescriptorError::TrailingChars);
        }
        Ok(MethodDescriptor { params, ret })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("()V", 0, 0)]
    #[case("(I)V", 1, 1)]
    #[case("(JD)V", 2, 4)]
    #[case("(Ljava/lang/String;I)V", 2, 2)]
    #[case("([Ljava/lang/String;)V", 1, 1)]
    #[case("([[IJLjava/lang/Object;)Ljava/lang/String;", 3, 4)]
    fn counts_params_and_slots(#[case] desc: &str, #[case] count: usize, #[case] slots: usize) {
        let md = MethodDescriptor::try_from(desc).unwrap();
        assert_eq!(md.param_count(), count);
        assert_eq!(md.param_slots(), slots);
    }

    #[test]
    fn array_params_are_single_values() {
        let md = MethodDescriptor::try_from("([B[[Ljava/lang/String;)I").unwrap();
        assert_eq!(md.param_count(), 2);
        assert_eq!(md.param_slots(), 2);
    }

    #[test]
    fn field_descriptor_round_trip() {
        assert_eq!(
            parse_field_descriptor("[C").unwrap(),
            JavaType::Array(Box::new(JavaType::Primitive(PrimitiveType::Char)))
        );
        assert_eq!(
            parse_field_descriptor("Ljava/lang/String;").unwrap(),
            JavaType::Instance("java/lang/String".to_string())
        );
        assert!(parse_field_descriptor("II").is_err());
        assert!(parse_field_descriptor("L").is_err());
    }

    #[test]
    fn renders_java_signature() {
        let md = MethodDescriptor::try_from("(Ljava/lang/String;I)V").unwrap();
        assert_eq!(
            md.to_java_signature("java/lang/System", "exit"),
            "void java.lang.System.exit(java.lang.String, int)"
        );
    }
}
