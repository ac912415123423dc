//! Crockford-style base32 ("c32") and the c32check address format used for
//! Stacks principals.

use color_eyre::eyre::{
    Result,
    eyre,
};
use sha2::{
    Digest,
    Sha256,
};

const C32_ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";
const CHECKSUM_LEN: usize = 4;
pub const HASH160_LEN: usize = 20;

pub fn c32_encode(data: &[u8]) -> String {
    let mut digits: Vec<u8> = Vec::with_capacity(data.len() * 8 / 5 + 1);
    let mut acc: u32 = 0;
    let mut bits = 0;
    for byte in data.iter().rev() {
        acc |= u32::from(*byte) << bits;
        bits += 8;
        while bits >= 5 {
            digits.push(C32_ALPHABET[(acc & 0x1f) as usize]);
            acc >>= 5;
            bits -= 5;
        }
    }
    if bits > 0 {
        digits.push(C32_ALPHABET[(acc & 0x1f) as usize]);
    }
    while digits.last() == Some(&C32_ALPHABET[0]) {
        digits.pop();
    }
    let leading_zero_bytes = data.iter().take_while(|b| **b == 0).count();
    digits.extend(std::iter::repeat_n(C32_ALPHABET[0], leading_zero_bytes));
    digits.reverse();
    digits.into_iter().map(char::from).collect()
}

pub fn c32_decode(input: &str) -> Result<Vec<u8>> {
    let normalized = normalize(input);
    let values = normalized
        .chars()
        .map(|c| {
            C32_ALPHABET
                .iter()
                .position(|a| char::from(*a) == c)
                .map(|p| p as u32)
                .ok_or_else(|| eyre!("invalid c32 character '{c}' in '{input}'"))
        })
        .collect::<Result<Vec<_>>>()?;

    let leading_zero_digits = values.iter().take_while(|v| **v == 0).count();
    let mut bytes: Vec<u8> = Vec::with_capacity(values.len() * 5 / 8 + 1);
    let mut acc: u32 = 0;
    let mut bits = 0;
    for value in values.iter().rev() {
        acc |= value << bits;
        bits += 5;
        while bits >= 8 {
            bytes.push((acc & 0xff) as u8);
            acc >>= 8;
            bits -= 8;
        }
    }
    if bits > 0 {
        bytes.push((acc & 0xff) as u8);
    }
    while bytes.last() == Some(&0) {
        bytes.pop();
    }
    bytes.extend(std::iter::repeat_n(0u8, leading_zero_digits));
    bytes.reverse();
    Ok(bytes)
}

pub fn c32check_encode(version: u8, data: &[u8]) -> Result<String> {
    if version >= 32 {
        return Err(eyre!("c32check version {version} is out of range"));
    }
    let mut payload = data.to_vec();
    payload.extend_from_slice(&checksum(version, data));
    let mut encoded = String::with_capacity(payload.len() * 2);
    encoded.push(char::from(C32_ALPHABET[version as usize]));
    encoded.push_str(&c32_encode(&payload));
    Ok(encoded)
}

pub fn c32check_decode(input: &str) -> Result<(u8, Vec<u8>)> {
    let normalized = normalize(input);
    let mut chars = normalized.chars();
    let version_char = chars
        .next()
        .ok_or_else(|| eyre!("empty c32check string"))?;
    let version = C32_ALPHABET
        .iter()
        .position(|a| char::from(*a) == version_char)
        .ok_or_else(|| eyre!("invalid c32check version character '{version_char}'"))?
        as u8;
    let payload = c32_decode(chars.as_str())?;
    if payload.len() < CHECKSUM_LEN {
        return Err(eyre!("c32check string '{input}' is too short"));
    }
    let (data, expected) = payload.split_at(payload.len() - CHECKSUM_LEN);
    if checksum(version, data) != expected {
        return Err(eyre!("c32check checksum mismatch for '{input}'"));
    }
    Ok((version, data.to_vec()))
}

/// Encodes `S` + c32check(version, hash160), the textual form of a standard principal.
pub fn encode_address(version: u8, hash160: &[u8; HASH160_LEN]) -> Result<String> {
    Ok(format!("S{}", c32check_encode(version, hash160)?))
}

pub fn decode_address(address: &str) -> Result<(u8, [u8; HASH160_LEN])> {
    let body = address
        .strip_prefix('S')
        .ok_or_else(|| eyre!("address '{address}' does not start with 'S'"))?;
    let (version, data) = c32check_decode(body)?;
    let hash160: [u8; HASH160_LEN] = data.as_slice().try_into().map_err(|_| {
        eyre!(
            "address '{address}' carries {} bytes, expected {HASH160_LEN}",
            data.len()
        )
    })?;
    Ok((version, hash160))
}

fn checksum(version: u8, data: &[u8]) -> [u8; CHECKSUM_LEN] {
    let mut hasher = Sha256::new();
    hasher.update([version]);
    hasher.update(data);
    let first = hasher.finalize();
    let second = Sha256::digest(first);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&second[..CHECKSUM_LEN]);
    out
}

fn normalize(input: &str) -> String {
    input
        .to_ascii_uppercase()
        .chars()
        .map(|c| match c {
            'O' => '0',
            'L' | 'I' => '1',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn encode_address__zero_hash_mainnet_matches_boot_address() {
        // when
        let address = encode_address(22, &[0u8; HASH160_LEN]).unwrap();

        // then
        assert_eq!(address, "SP000000000000000000002Q6VF78");
    }

    #[test]
    fn encode_address__zero_hash_testnet_matches_boot_address() {
        // when
        let address = encode_address(26, &[0u8; HASH160_LEN]).unwrap();

        // then
        assert_eq!(address, "ST000000000000000000002AMW42H");
    }

    #[test]
    fn decode_address__round_trips_known_addresses() {
        for address in [
            "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM",
            "SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7",
            "SP000000000000000000002Q6VF78",
        ] {
            // when
            let (version, hash160) = decode_address(address).unwrap();
            let encoded = encode_address(version, &hash160).unwrap();

            // then
            assert_eq!(encoded, address);
        }
    }

    #[test]
    fn decode_address__reports_version_byte() {
        let (version, _) =
            decode_address("ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM").unwrap();
        assert_eq!(version, 26);
    }

    #[test]
    fn decode_address__rejects_corrupted_checksum() {
        // given
        let corrupted = "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGN";

        // when
        let result = decode_address(corrupted);

        // then
        assert!(result.is_err());
    }

    #[test]
    fn decode_address__rejects_invalid_characters() {
        assert!(decode_address("ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZG!").is_err());
        assert!(decode_address("XP000000000000000000002Q6VF78").is_err());
    }

    #[test]
    fn c32_decode__accepts_lowercase_and_ambiguous_characters() {
        assert_eq!(c32_decode("o1").unwrap(), c32_decode("01").unwrap());
        assert_eq!(c32_decode("l").unwrap(), c32_decode("1").unwrap());
    }

    proptest! {
        #[test]
        fn c32_encode__decode_is_identity(data in proptest::collection::vec(any::<u8>(), 0..40)) {
            let encoded = c32_encode(&data);
            prop_assert_eq!(c32_decode(&encoded).unwrap(), data);
        }

        #[test]
        fn encode_address__decode_is_identity(version in 0u8..32, hash in any::<[u8; 20]>()) {
            let address = encode_address(version, &hash).unwrap();
            prop_assert_eq!(decode_address(&address).unwrap(), (version, hash));
        }
    }
}
