use core::fmt;

use alloy_primitives::{keccak256, Address, Bytes, B256};
use alloy_sol_types::SolCall;

use crate::abi::IPublicResolver;
use crate::chain::ForkedChain;
use crate::error::ChainError;

/// EIP-137 namehash of a dot-separated ENS name.
pub fn namehash(name: &str) -> B256 {
    name.rsplit('.')
        .filter(|label| !label.is_empty())
        .fold(B256::ZERO, |node, label| {
            let label_hash = keccak256(label.as_bytes());
            keccak256([node.as_slice(), label_hash.as_slice()].concat())
        })
}

/// A text record on the public resolver, addressed by `(node, key)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LicenseRecord {
    pub node: B256,
    pub key: String,
}

impl LicenseRecord {
    pub fn new(ens_name: &str, key: impl Into<String>) -> Self {
        Self {
            node: namehash(ens_name),
            key: key.into(),
        }
    }
}

impl fmt::Display for LicenseRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "text({}, {:?})", self.node, self.key)
    }
}

pub struct PublicResolverClient<'a, C: ?Sized> {
    chain: &'a C,
    pub address: Address,
}

impl<'a, C> PublicResolverClient<'a, C>
where
    C: ForkedChain + ?Sized,
{
    pub const fn new(chain: &'a C, address: Address) -> Self {
        Self { chain, address }
    }

    pub async fn text(&self, node: B256, key: &str) -> Result<String, ChainError> {
        let input = IPublicResolver::textCall {
            node,
            key: key.to_owned(),
        }
        .abi_encode();

        let output = self.chain.call(self.address, input.into()).await?;

        Ok(IPublicResolver::textCall::abi_decode_returns(&output, true)?._0)
    }
}

/// Calldata for `setText`. The resolver is never written to directly; the
/// call only ever runs as an executed proposal action.
pub fn set_text_calldata(node: B256, key: &str, value: &str) -> Bytes {
    IPublicResolver::setTextCall {
        node,
        key: key.to_owned(),
        value: value.to_owned(),
    }
    .abi_encode()
    .into()
}
