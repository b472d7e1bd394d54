use serde::{Deserialize, Serialize};

/// ENS name whose text records hold Uniswap v3 Additional Use Grants.
pub const LICENSE_GRANTS_ENS_NAME: &str = "v3-core-license-grants.uniswap.eth";

/// A Uniswap v3 Core Additional Use Grant for one grantee and one chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LicenseGrant {
    pub grantee: String,
    pub chain_name: String,
}

impl LicenseGrant {
    pub fn new(grantee: impl Into<String>, chain_name: impl Into<String>) -> Self {
        Self {
            grantee: grantee.into(),
            chain_name: chain_name.into(),
        }
    }

    /// Text record key under [`LICENSE_GRANTS_ENS_NAME`].
    pub fn record_key(&self) -> String {
        format!("{} Uni v3 Additional Use Grant", self.grantee)
    }

    /// Text record value, byte-exact with previously executed grants.
    pub fn record_value(&self) -> String {
        let grantee = &self.grantee;
        let chain = &self.chain_name;

        format!(
            "\n    {grantee} Uni v3 Additional Use Grant\n    {grantee} are granted an additional use grant to use the Uniswap V3 Core software code (which is made available to {grantee} subject to license available at https://github.com/Uniswap/v3-core/blob/main/LICENSE (the \u{201c}Uniswap Code\u{201d})). As part of this additional use grant, {grantee} receives license to use the Uniswap Code for the purposes of a full deployment of the Uniswap Protocol v3 onto {chain}. {grantee} is permitted to use subcontractors to do this work. This license is conditional on {grantee} complying with the terms of the Business Source License 1.1, made available at https://github.com/Uniswap/v3-core/blob/main/LICENSE."
        )
    }
}

impl Default for LicenseGrant {
    fn default() -> Self {
        Self::new("Illusory Systems, Inc.", "the Moonbeam blockchain")
    }
}
