//! Identifier minting for workflow entities

use bech32::Bech32m;
use uuid7::uuid7;

// mint a unique uuid7 then encode using bech32 with the entity's prefix
pub fn new_bech32_id(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

pub fn new_request_id() -> anyhow::Result<String> {
    new_bech32_id("req_")
}

pub fn new_product_id() -> anyhow::Result<String> {
    new_bech32_id("prod_")
}

pub fn new_bom_id() -> anyhow::Result<String> {
    new_bech32_id("bom_")
}

pub fn new_actor_id() -> anyhow::Result<String> {
    new_bech32_id("user_")
}
