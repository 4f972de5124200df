//! Two-party escrow balance and its conservation invariant.

use ethers::abi::Token;
use ethers::types::{Address, U256};
#[cfg(feature = "json")]
use serde::{Deserialize, Serialize};

use crate::codec::{AbiTuple, Field, Fields, Kind, Schema};
use crate::error::{CodecError, TransferError};
use crate::Result;

/// Index of the payer (initiator) entry.
pub const PAYER: usize = 0;
/// Index of the payee (responder) entry.
pub const PAYEE: usize = 1;

/// Value locked in a transfer, split between payer and payee.
#[cfg_attr(feature = "json", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Balance {
    /// Amounts owed to `to[0]` and `to[1]` respectively.
    pub amount: [U256; 2],
    pub to: [Address; 2],
}

impl Balance {
    pub fn new(payer: Address, payer_amount: U256, payee: Address, payee_amount: U256) -> Self {
        Self {
            amount: [payer_amount, payee_amount],
            to: [payer, payee],
        }
    }

    pub fn payer_amount(&self) -> U256 {
        self.amount[PAYER]
    }

    pub fn payee_amount(&self) -> U256 {
        self.amount[PAYEE]
    }

    /// Total locked value.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::BalanceOverflow`] if the sum exceeds `U256::MAX`.
    pub fn total(&self) -> Result<U256> {
        self.amount[PAYER]
            .checked_add(self.amount[PAYEE])
            .ok_or(TransferError::BalanceOverflow)
    }

    /// Move `amount` from the payer to the payee.
    pub fn transfer(&self, amount: U256) -> Result<Self> {
        let payer = self.amount[PAYER]
            .checked_sub(amount)
            .ok_or(TransferError::ExceedsAllocation {
                amount,
                allocation: self.amount[PAYER],
            })?;
        let payee = self.amount[PAYEE]
            .checked_add(amount)
            .ok_or(TransferError::BalanceOverflow)?;
        Ok(Self {
            amount: [payer, payee],
            to: self.to,
        })
    }

    /// Move everything the payer holds to the payee.
    pub fn transfer_all(&self) -> Result<Self> {
        self.transfer(self.amount[PAYER])
    }

    /// Check that `after` redistributes exactly the value of `self`
    /// between the same two parties.
    pub fn ensure_conserved(&self, after: &Balance) -> Result<()> {
        if self.to != after.to || self.total()? != after.total()? {
            return Err(TransferError::BalanceNotConserved);
        }
        Ok(())
    }
}

const AMOUNT_KIND: Kind = Kind::FixedArray(&Kind::Uint256, 2);
const TO_KIND: Kind = Kind::FixedArray(&Kind::Address, 2);

impl AbiTuple for Balance {
    const SCHEMA: Schema = Schema {
        fields: &[
            Field {
                name: "amount",
                kind: AMOUNT_KIND,
            },
            Field {
                name: "to",
                kind: TO_KIND,
            },
        ],
    };

    fn to_tokens(&self) -> Vec<Token> {
        vec![
            Token::FixedArray(self.amount.iter().map(|a| Token::Uint(*a)).collect()),
            Token::FixedArray(self.to.iter().map(|a| Token::Address(*a)).collect()),
        ]
    }

    fn from_tokens(tokens: Vec<Token>) -> std::result::Result<Self, CodecError> {
        let mut fields = Fields::new(Self::SCHEMA, tokens);
        let amount = pair(fields.array()?, |t| match t {
            Token::Uint(v) => Some(v),
            _ => None,
        })?;
        let to = pair(fields.array()?, |t| match t {
            Token::Address(a) => Some(a),
            _ => None,
        })?;
        Ok(Self { amount, to })
    }
}

fn pair<T: Copy + std::fmt::Debug>(
    items: Vec<Token>,
    f: impl Fn(Token) -> Option<T>,
) -> std::result::Result<[T; 2], CodecError> {
    let values = items.into_iter().map(f).collect::<Option<Vec<T>>>();
    match values.as_deref() {
        Some(&[a, b]) => Ok([a, b]),
        _ => Err(CodecError::UnexpectedToken {
            expected: "pair",
            found: format!("{:?}", values),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balance(payer: u64, payee: u64) -> Balance {
        Balance::new(
            Address::repeat_byte(0xaa),
            U256::from(payer),
            Address::repeat_byte(0xbb),
            U256::from(payee),
        )
    }

    #[test]
    fn transfer_conserves_total() {
        let before = balance(10_000, 0);
        let after = before.transfer(U256::from(4_000)).unwrap();
        assert_eq!(after.amount, [U256::from(6_000), U256::from(4_000)]);
        assert!(before.ensure_conserved(&after).is_ok());

        let all = before.transfer_all().unwrap();
        assert_eq!(all.amount, [U256::zero(), U256::from(10_000)]);
    }

    #[test]
    fn transfer_rejects_overdraw() {
        assert!(matches!(
            balance(10, 0).transfer(U256::from(11)),
            Err(TransferError::ExceedsAllocation { .. })
        ));
    }

    #[test]
    fn detects_created_value_and_swapped_parties() {
        let before = balance(10, 0);
        assert_eq!(
            before.ensure_conserved(&balance(10, 1)),
            Err(TransferError::BalanceNotConserved)
        );

        let mut swapped = before;
        swapped.to.swap(0, 1);
        assert_eq!(
            before.ensure_conserved(&swapped),
            Err(TransferError::BalanceNotConserved)
        );
    }

    #[test]
    fn total_overflow_is_an_error() {
        let b = Balance::new(Address::zero(), U256::MAX, Address::zero(), 1.into());
        assert_eq!(b.total(), Err(TransferError::BalanceOverflow));
    }

    #[test]
    fn schema_and_codec() {
        assert_eq!(
            Balance::SCHEMA.encoding(),
            "tuple(uint256[2] amount, address[2] to)"
        );
        let b = balance(7, 3);
        assert_eq!(Balance::abi_decode(&b.abi_encode()).unwrap(), b);
    }
}
