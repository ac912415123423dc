//! Clarity values: the tagged representation contracts exchange with clients,
//! and their consensus binary serialization.

use crate::c32;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use std::{
    collections::BTreeMap,
    fmt,
    str::FromStr,
};

/// Nesting deeper than this is rejected while deserializing.
pub const MAX_VALUE_DEPTH: usize = 32;
const MAX_NAME_LEN: usize = 128;

const TYPE_INT: u8 = 0x00;
const TYPE_UINT: u8 = 0x01;
const TYPE_BUFFER: u8 = 0x02;
const TYPE_TRUE: u8 = 0x03;
const TYPE_FALSE: u8 = 0x04;
const TYPE_STANDARD_PRINCIPAL: u8 = 0x05;
const TYPE_CONTRACT_PRINCIPAL: u8 = 0x06;
const TYPE_RESPONSE_OK: u8 = 0x07;
const TYPE_RESPONSE_ERR: u8 = 0x08;
const TYPE_NONE: u8 = 0x09;
const TYPE_SOME: u8 = 0x0a;
const TYPE_LIST: u8 = 0x0b;
const TYPE_TUPLE: u8 = 0x0c;
const TYPE_STRING_ASCII: u8 = 0x0d;
const TYPE_STRING_UTF8: u8 = 0x0e;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct StandardPrincipal {
    pub version: u8,
    pub hash160: [u8; c32::HASH160_LEN],
}

impl StandardPrincipal {
    pub fn new(version: u8, hash160: [u8; c32::HASH160_LEN]) -> Self {
        Self { version, hash160 }
    }
}

impl fmt::Display for StandardPrincipal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded =
            c32::encode_address(self.version, &self.hash160).map_err(|_| fmt::Error)?;
        f.write_str(&encoded)
    }
}

impl FromStr for StandardPrincipal {
    type Err = color_eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        let (version, hash160) = c32::decode_address(s)?;
        Ok(Self { version, hash160 })
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum PrincipalData {
    Standard(StandardPrincipal),
    Contract {
        issuer: StandardPrincipal,
        name: String,
    },
}

impl fmt::Display for PrincipalData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrincipalData::Standard(p) => write!(f, "{p}"),
            PrincipalData::Contract { issuer, name } => write!(f, "{issuer}.{name}"),
        }
    }
}

impl FromStr for PrincipalData {
    type Err = color_eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('.') {
            Some((issuer, name)) => {
                validate_name(name)?;
                Ok(PrincipalData::Contract {
                    issuer: issuer.parse()?,
                    name: name.to_string(),
                })
            }
            None => Ok(PrincipalData::Standard(s.parse()?)),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ClarityValue {
    Int(i128),
    UInt(u128),
    Bool(bool),
    Buffer(Vec<u8>),
    Principal(PrincipalData),
    ResponseOk(Box<ClarityValue>),
    ResponseErr(Box<ClarityValue>),
    OptionalNone,
    OptionalSome(Box<ClarityValue>),
    List(Vec<ClarityValue>),
    Tuple(BTreeMap<String, ClarityValue>),
    StringAscii(String),
    StringUtf8(String),
}

impl ClarityValue {
    pub fn uint(value: impl Into<u128>) -> Self {
        ClarityValue::UInt(value.into())
    }

    pub fn some(value: ClarityValue) -> Self {
        ClarityValue::OptionalSome(Box::new(value))
    }

    pub fn ok(value: ClarityValue) -> Self {
        ClarityValue::ResponseOk(Box::new(value))
    }

    pub fn principal(address: &str) -> Result<Self> {
        Ok(ClarityValue::Principal(address.parse()?))
    }

    pub fn tuple<K: Into<String>>(fields: impl IntoIterator<Item = (K, ClarityValue)>) -> Self {
        ClarityValue::Tuple(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Field lookup on a tuple; `None` for every other shape.
    pub fn field(&self, name: &str) -> Option<&ClarityValue> {
        match self {
            ClarityValue::Tuple(fields) => fields.get(name),
            _ => None,
        }
    }

    /// Consensus encoding. Fails only when a length does not fit its prefix.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.serialize_into(&mut out)?;
        Ok(out)
    }

    pub fn serialize_into(&self, out: &mut Vec<u8>) -> Result<()> {
        match self {
            ClarityValue::Int(v) => {
                out.push(TYPE_INT);
                out.extend_from_slice(&v.to_be_bytes());
            }
            ClarityValue::UInt(v) => {
                out.push(TYPE_UINT);
                out.extend_from_slice(&v.to_be_bytes());
            }
            ClarityValue::Bool(true) => out.push(TYPE_TRUE),
            ClarityValue::Bool(false) => out.push(TYPE_FALSE),
            ClarityValue::Buffer(bytes) => {
                out.push(TYPE_BUFFER);
                write_len_prefixed(out, bytes)?;
            }
            ClarityValue::Principal(PrincipalData::Standard(p)) => {
                out.push(TYPE_STANDARD_PRINCIPAL);
                write_standard_principal(out, p);
            }
            ClarityValue::Principal(PrincipalData::Contract { issuer, name }) => {
                out.push(TYPE_CONTRACT_PRINCIPAL);
                write_standard_principal(out, issuer);
                write_name(out, name)?;
            }
            ClarityValue::ResponseOk(inner) => {
                out.push(TYPE_RESPONSE_OK);
                inner.serialize_into(out)?;
            }
            ClarityValue::ResponseErr(inner) => {
                out.push(TYPE_RESPONSE_ERR);
                inner.serialize_into(out)?;
            }
            ClarityValue::OptionalNone => out.push(TYPE_NONE),
            ClarityValue::OptionalSome(inner) => {
                out.push(TYPE_SOME);
                inner.serialize_into(out)?;
            }
            ClarityValue::List(items) => {
                out.push(TYPE_LIST);
                write_count(out, items.len(), "list")?;
                for item in items {
                    item.serialize_into(out)?;
                }
            }
            ClarityValue::Tuple(fields) => {
                out.push(TYPE_TUPLE);
                write_count(out, fields.len(), "tuple")?;
                for (name, value) in fields {
                    write_name(out, name)?;
                    value.serialize_into(out)?;
                }
            }
            ClarityValue::StringAscii(s) => {
                out.push(TYPE_STRING_ASCII);
                write_len_prefixed(out, s.as_bytes())?;
            }
            ClarityValue::StringUtf8(s) => {
                out.push(TYPE_STRING_UTF8);
                write_len_prefixed(out, s.as_bytes())?;
            }
        }
        Ok(())
    }

    pub fn to_hex(&self) -> Result<String> {
        Ok(format!("0x{}", hex::encode(self.serialize()?)))
    }

    /// Deserializes exactly one value; trailing bytes are an error.
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader { bytes, pos: 0 };
        let value = reader.read_value(0)?;
        if reader.pos != bytes.len() {
            return Err(eyre!(
                "{} trailing bytes after clarity value",
                bytes.len() - reader.pos
            ));
        }
        Ok(value)
    }

    pub fn from_hex(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = hex::decode(digits).wrap_err("clarity value is not valid hex")?;
        Self::deserialize(&bytes)
    }
}

fn write_count(out: &mut Vec<u8>, len: usize, what: &str) -> Result<()> {
    let len = u32::try_from(len)
        .map_err(|_| eyre!("{what} of {len} elements exceeds the u32 length prefix"))?;
    out.extend_from_slice(&len.to_be_bytes());
    Ok(())
}

fn write_len_prefixed(out: &mut Vec<u8>, bytes: &[u8]) -> Result<()> {
    write_count(out, bytes.len(), "byte sequence")?;
    out.extend_from_slice(bytes);
    Ok(())
}

fn write_standard_principal(out: &mut Vec<u8>, p: &StandardPrincipal) {
    out.push(p.version);
    out.extend_from_slice(&p.hash160);
}

fn write_name(out: &mut Vec<u8>, name: &str) -> Result<()> {
    validate_name(name)?;
    let len = u8::try_from(name.len())
        .map_err(|_| eyre!("clarity name '{name}' exceeds the u8 length prefix"))?;
    out.push(len);
    out.extend_from_slice(name.as_bytes());
    Ok(())
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(eyre!("clarity name '{name}' must be 1..={MAX_NAME_LEN} bytes"));
    }
    if !name.is_ascii() {
        return Err(eyre!("clarity name '{name}' must be ascii"));
    }
    Ok(())
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| {
                eyre!(
                    "unexpected end of clarity value: wanted {n} bytes at offset {}",
                    self.pos
                )
            })?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(u32::from_be_bytes(buf))
    }

    fn read_16(&mut self) -> Result<[u8; 16]> {
        let mut buf = [0u8; 16];
        buf.copy_from_slice(self.take(16)?);
        Ok(buf)
    }

    fn read_len_prefixed(&mut self) -> Result<&'a [u8]> {
        let len = self.read_u32()? as usize;
        self.take(len)
    }

    fn read_standard_principal(&mut self) -> Result<StandardPrincipal> {
        let version = self.read_u8()?;
        let mut hash160 = [0u8; c32::HASH160_LEN];
        hash160.copy_from_slice(self.take(c32::HASH160_LEN)?);
        Ok(StandardPrincipal { version, hash160 })
    }

    fn read_name(&mut self) -> Result<String> {
        let len = self.read_u8()? as usize;
        let raw = self.take(len)?;
        let name = std::str::from_utf8(raw)
            .wrap_err("clarity name is not utf-8")?
            .to_string();
        validate_name(&name)?;
        Ok(name)
    }

    fn read_value(&mut self, depth: usize) -> Result<ClarityValue> {
        if depth > MAX_VALUE_DEPTH {
            return Err(eyre!("clarity value nested deeper than {MAX_VALUE_DEPTH}"));
        }
        let type_id = self.read_u8()?;
        let value = match type_id {
            TYPE_INT => ClarityValue::Int(i128::from_be_bytes(self.read_16()?)),
            TYPE_UINT => ClarityValue::UInt(u128::from_be_bytes(self.read_16()?)),
            TYPE_BUFFER => ClarityValue::Buffer(self.read_len_prefixed()?.to_vec()),
            TYPE_TRUE => ClarityValue::Bool(true),
            TYPE_FALSE => ClarityValue::Bool(false),
            TYPE_STANDARD_PRINCIPAL => ClarityValue::Principal(PrincipalData::Standard(
                self.read_standard_principal()?,
            )),
            TYPE_CONTRACT_PRINCIPAL => {
                let issuer = self.read_standard_principal()?;
                let name = self.read_name()?;
                ClarityValue::Principal(PrincipalData::Contract { issuer, name })
            }
            TYPE_RESPONSE_OK => {
                ClarityValue::ResponseOk(Box::new(self.read_value(depth + 1)?))
            }
            TYPE_RESPONSE_ERR => {
                ClarityValue::ResponseErr(Box::new(self.read_value(depth + 1)?))
            }
            TYPE_NONE => ClarityValue::OptionalNone,
            TYPE_SOME => ClarityValue::OptionalSome(Box::new(self.read_value(depth + 1)?)),
            TYPE_LIST => {
                let len = self.read_u32()? as usize;
                // every item takes at least one byte
                if len > self.bytes.len() - self.pos {
                    return Err(eyre!("clarity list length {len} exceeds payload"));
                }
                let mut items = Vec::with_capacity(len);
                for _ in 0..len {
                    items.push(self.read_value(depth + 1)?);
                }
                ClarityValue::List(items)
            }
            TYPE_TUPLE => {
                let len = self.read_u32()? as usize;
                let mut fields = BTreeMap::new();
                for _ in 0..len {
                    let name = self.read_name()?;
                    let value = self.read_value(depth + 1)?;
                    if fields.insert(name.clone(), value).is_some() {
                        return Err(eyre!("duplicate tuple field '{name}'"));
                    }
                }
                ClarityValue::Tuple(fields)
            }
            TYPE_STRING_ASCII => {
                let raw = self.read_len_prefixed()?;
                if !raw.is_ascii() {
                    return Err(eyre!("string-ascii value contains non-ascii bytes"));
                }
                ClarityValue::StringAscii(String::from_utf8_lossy(raw).into_owned())
            }
            TYPE_STRING_UTF8 => {
                let raw = self.read_len_prefixed()?;
                let s = std::str::from_utf8(raw).wrap_err("string-utf8 value is not utf-8")?;
                ClarityValue::StringUtf8(s.to_string())
            }
            other => return Err(eyre!("unknown clarity type id 0x{other:02x}")),
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    const DEPLOYER: &str = "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM";

    #[test]
    fn serialize__uint_is_type_byte_then_sixteen_big_endian_bytes() {
        // given
        let value = ClarityValue::uint(1u8);

        // when
        let hex = value.to_hex().unwrap();

        // then
        assert_eq!(hex, "0x0100000000000000000000000000000001");
    }

    #[test]
    fn serialize__int_uses_twos_complement() {
        assert_eq!(
            ClarityValue::Int(-1).to_hex().unwrap(),
            "0x00ffffffffffffffffffffffffffffffff"
        );
    }

    #[test]
    fn serialize__single_byte_values() {
        assert_eq!(ClarityValue::Bool(true).to_hex().unwrap(), "0x03");
        assert_eq!(ClarityValue::Bool(false).to_hex().unwrap(), "0x04");
        assert_eq!(ClarityValue::OptionalNone.to_hex().unwrap(), "0x09");
    }

    #[test]
    fn serialize__some_wraps_inner_value() {
        assert_eq!(
            ClarityValue::some(ClarityValue::uint(5u8)).to_hex().unwrap(),
            "0x0a0100000000000000000000000000000005"
        );
    }

    #[test]
    fn serialize__standard_principal_is_version_then_hash() {
        // given
        let value = ClarityValue::principal(DEPLOYER).unwrap();

        // when
        let bytes = value.serialize().unwrap();

        // then
        assert_eq!(bytes.len(), 22);
        assert_eq!(bytes[0], 0x05);
        assert_eq!(bytes[1], 26);
    }

    #[test]
    fn serialize__tuple_fields_are_sorted_by_name() {
        // given
        let value = ClarityValue::tuple([
            ("score", ClarityValue::uint(2u8)),
            ("alive", ClarityValue::Bool(true)),
        ]);

        // when
        let bytes = value.serialize().unwrap();

        // then
        let expected = [
            vec![0x0c, 0, 0, 0, 2],
            vec![5],
            b"alive".to_vec(),
            vec![0x03],
            vec![5],
            b"score".to_vec(),
            ClarityValue::uint(2u8).serialize().unwrap(),
        ]
        .concat();
        assert_eq!(bytes, expected);
    }

    #[test]
    fn deserialize__reads_back_nested_values() {
        // given
        let value = ClarityValue::some(ClarityValue::tuple([
            ("x", ClarityValue::uint(5u8)),
            ("y", ClarityValue::uint(5u8)),
            ("who", ClarityValue::principal(&format!("{DEPLOYER}.reflex")).unwrap()),
            (
                "tags",
                ClarityValue::List(vec![
                    ClarityValue::StringAscii("a".into()),
                    ClarityValue::StringUtf8("ü".into()),
                    ClarityValue::Buffer(vec![1, 2, 3]),
                    ClarityValue::ResponseErr(Box::new(ClarityValue::Int(-7))),
                ]),
            ),
        ]));

        // when
        let decoded = ClarityValue::from_hex(&value.to_hex().unwrap()).unwrap();

        // then
        assert_eq!(decoded, value);
    }

    #[test]
    fn serialize__rejects_names_too_long_for_their_prefix() {
        // given
        let issuer: StandardPrincipal = DEPLOYER.parse().unwrap();
        let contract = ClarityValue::Principal(PrincipalData::Contract {
            issuer,
            name: "c".repeat(300),
        });
        let tuple = ClarityValue::tuple([("k".repeat(256), ClarityValue::Bool(true))]);

        // when
        let contract_result = contract.serialize();
        let tuple_result = ClarityValue::some(tuple).to_hex();

        // then
        assert!(contract_result.is_err());
        assert!(tuple_result.is_err());
    }

    #[test]
    fn serialize__accepts_longest_valid_name() {
        let tuple = ClarityValue::tuple([("k".repeat(MAX_NAME_LEN), ClarityValue::Bool(false))]);
        let bytes = tuple.serialize().unwrap();
        assert_eq!(bytes[5] as usize, MAX_NAME_LEN);
        assert_eq!(ClarityValue::deserialize(&bytes).unwrap(), tuple);
    }

    #[test]
    fn deserialize__rejects_trailing_bytes() {
        assert!(ClarityValue::deserialize(&[0x03, 0x03]).is_err());
    }

    #[test]
    fn deserialize__rejects_truncated_payload() {
        assert!(ClarityValue::deserialize(&[0x01, 0x00, 0x00]).is_err());
        assert!(ClarityValue::deserialize(&[]).is_err());
    }

    #[test]
    fn deserialize__rejects_unknown_type_id() {
        assert!(ClarityValue::deserialize(&[0x42]).is_err());
    }

    #[test]
    fn deserialize__rejects_excessive_nesting() {
        // given
        let mut bytes = vec![0x0a; MAX_VALUE_DEPTH + 2];
        bytes.push(0x09);

        // when
        let result = ClarityValue::deserialize(&bytes);

        // then
        assert!(result.is_err());
    }

    #[test]
    fn deserialize__rejects_oversized_list_length() {
        assert!(ClarityValue::deserialize(&[0x0b, 0xff, 0xff, 0xff, 0xff]).is_err());
    }

    #[test]
    fn principal_data__displays_contract_identifier() {
        // given
        let raw = format!("{DEPLOYER}.activity");

        // when
        let principal: PrincipalData = raw.parse().unwrap();

        // then
        assert_eq!(principal.to_string(), raw);
    }
}
