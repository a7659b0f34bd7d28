//! Deploy-time values
//!
//! A `Token` is either a literal known at composition time or a reference
//! to something the deployment engine resolves later (another construct's
//! id or attribute, a template parameter, a pseudo parameter).

use crate::context::ConstructId;

/// CloudFormation pseudo parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pseudo {
    AccountId,
    Region,
    Partition,
}

impl Pseudo {
    pub fn name(&self) -> &'static str {
        match self {
            Pseudo::AccountId => "AWS::AccountId",
            Pseudo::Region => "AWS::Region",
            Pseudo::Partition => "AWS::Partition",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Literal(String),
    /// The primary identifier of another construct
    Ref(ConstructId),
    /// A named attribute of another construct
    Attr(ConstructId, &'static str),
    /// A template parameter, by name
    Parameter(String),
    Pseudo(Pseudo),
    /// The `n`th availability zone of the deployment region
    AvailabilityZone(usize),
    /// Concatenation without separator
    Join(Vec<Token>),
    Base64(Box<Token>),
}

impl Token {
    pub fn literal(value: impl Into<String>) -> Self {
        Token::Literal(value.into())
    }

    /// Returns the literal value if this token is known at composition time
    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Token::Literal(value) => Some(value),
            _ => None,
        }
    }

    /// Constructs this token depends on
    pub fn references(&self) -> Vec<ConstructId> {
        match self {
            Token::Ref(id) | Token::Attr(id, _) => vec![*id],
            Token::Join(parts) => parts.iter().flat_map(Token::references).collect(),
            Token::Base64(inner) => inner.references(),
            Token::Literal(_)
            | Token::Parameter(_)
            | Token::Pseudo(_)
            | Token::AvailabilityZone(_) => Vec::new(),
        }
    }
}
