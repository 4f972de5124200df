//! Tuple schemas shared by the public encoding strings and the ABI codec.
//!
//! A [`Schema`] is the single source of truth for a state or resolver
//! shape: it renders the `tuple(...)` string published in the registry and
//! builds the [`ParamType`] used to decode payloads, so the two cannot drift.

use ethers::abi::{self, ParamType, Token};
use ethers::types::{Address, Bytes, H256, U256};

use crate::error::CodecError;

/// ABI kind of a single schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Address,
    Uint256,
    Bytes32,
    Bytes,
    /// Fixed-size array, e.g. `uint256[2]`.
    FixedArray(&'static Kind, usize),
    /// Nested tuple.
    Tuple(&'static Schema),
}

impl Kind {
    fn type_name(&self) -> String {
        match self {
            Self::Address => "address".to_string(),
            Self::Uint256 => "uint256".to_string(),
            Self::Bytes32 => "bytes32".to_string(),
            Self::Bytes => "bytes".to_string(),
            Self::FixedArray(inner, len) => format!("{}[{}]", inner.type_name(), len),
            Self::Tuple(schema) => schema.encoding(),
        }
    }

    fn param_type(&self) -> ParamType {
        match self {
            Self::Address => ParamType::Address,
            Self::Uint256 => ParamType::Uint(256),
            Self::Bytes32 => ParamType::FixedBytes(32),
            Self::Bytes => ParamType::Bytes,
            Self::FixedArray(inner, len) => {
                ParamType::FixedArray(Box::new(inner.param_type()), *len)
            }
            Self::Tuple(schema) => schema.param_type(),
        }
    }
}

/// Named field of a tuple schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub kind: Kind,
}

/// Ordered list of named fields forming an ABI tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schema {
    pub fields: &'static [Field],
}

impl Schema {
    /// Human-readable encoding, e.g. `tuple(uint256 amount, bytes32 UUID)`.
    pub fn encoding(&self) -> String {
        let fields = self
            .fields
            .iter()
            .map(|f| format!("{} {}", f.kind.type_name(), f.name))
            .collect::<Vec<_>>()
            .join(", ");
        format!("tuple({})", fields)
    }

    pub fn param_type(&self) -> ParamType {
        ParamType::Tuple(self.fields.iter().map(|f| f.kind.param_type()).collect())
    }
}

/// A value with a fixed tuple schema that round-trips through ABI encoding.
pub trait AbiTuple: Sized {
    /// Field layout; its order is part of the public contract.
    const SCHEMA: Schema;

    /// Tokens for each schema field, in order.
    fn to_tokens(&self) -> Vec<Token>;

    /// Rebuild the value from the tokens of a decoded tuple.
    fn from_tokens(tokens: Vec<Token>) -> Result<Self, CodecError>;

    fn to_token(&self) -> Token {
        Token::Tuple(self.to_tokens())
    }

    fn from_token(token: Token) -> Result<Self, CodecError> {
        match token {
            Token::Tuple(tokens) => Self::from_tokens(tokens),
            other => Err(unexpected("tuple", &other)),
        }
    }

    /// `abi.encode(value)` of the tuple.
    fn abi_encode(&self) -> Bytes {
        abi::encode(&[self.to_token()]).into()
    }

    /// Inverse of [`AbiTuple::abi_encode`].
    ///
    /// Only the canonical encoding of exactly one tuple is accepted: a
    /// payload with trailing bytes, dirty padding or a different field
    /// layout is rejected rather than partially read.
    fn abi_decode(data: &[u8]) -> Result<Self, CodecError> {
        let token = abi::decode(&[Self::SCHEMA.param_type()], data)?
            .pop()
            .ok_or(CodecError::MissingField("tuple"))?;
        if abi::encode(std::slice::from_ref(&token)) != data {
            return Err(CodecError::NonCanonical {
                encoding: Self::SCHEMA.encoding(),
            });
        }
        Self::from_token(token)
    }
}

fn unexpected(expected: &'static str, found: &Token) -> CodecError {
    CodecError::UnexpectedToken {
        expected,
        found: format!("{:?}", found),
    }
}

/// Sequential reader over the tokens of a decoded tuple.
pub(crate) struct Fields {
    schema: Schema,
    index: usize,
    tokens: std::vec::IntoIter<Token>,
}

impl Fields {
    pub(crate) fn new(schema: Schema, tokens: Vec<Token>) -> Self {
        Self {
            schema,
            index: 0,
            tokens: tokens.into_iter(),
        }
    }

    fn next(&mut self) -> Result<Token, CodecError> {
        let name = self
            .schema
            .fields
            .get(self.index)
            .map(|f| f.name)
            .unwrap_or("<extra>");
        self.index += 1;
        self.tokens.next().ok_or(CodecError::MissingField(name))
    }

    pub(crate) fn address(&mut self) -> Result<Address, CodecError> {
        match self.next()? {
            Token::Address(a) => Ok(a),
            other => Err(unexpected("address", &other)),
        }
    }

    pub(crate) fn uint(&mut self) -> Result<U256, CodecError> {
        match self.next()? {
            Token::Uint(v) => Ok(v),
            other => Err(unexpected("uint256", &other)),
        }
    }

    pub(crate) fn bytes32(&mut self) -> Result<H256, CodecError> {
        match self.next()? {
            Token::FixedBytes(b) if b.len() == 32 => Ok(H256::from_slice(&b)),
            other => Err(unexpected("bytes32", &other)),
        }
    }

    pub(crate) fn bytes(&mut self) -> Result<Bytes, CodecError> {
        match self.next()? {
            Token::Bytes(b) => Ok(b.into()),
            other => Err(unexpected("bytes", &other)),
        }
    }

    pub(crate) fn tuple<T: AbiTuple>(&mut self) -> Result<T, CodecError> {
        T::from_token(self.next()?)
    }

    pub(crate) fn array(&mut self) -> Result<Vec<Token>, CodecError> {
        match self.next()? {
            Token::FixedArray(items) => Ok(items),
            other => Err(unexpected("fixed array", &other)),
        }
    }
}

pub(crate) fn bytes32_token(value: &H256) -> Token {
    Token::FixedBytes(value.as_bytes().to_vec())
}

pub(crate) fn bytes_token(value: &Bytes) -> Token {
    Token::Bytes(value.to_vec())
}
